use std::collections::BTreeMap;

use crate::models::{Role, SessionStatus};
use crate::session::SessionManager;

pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const LANDING_PATH: &str = "/";

/// Who may open a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Reachable without a session (sign-in and sign-up).
    Public,
    /// Any signed-in role.
    Authenticated,
    /// Only the listed roles.
    Roles(&'static [Role]),
}

impl Access {
    pub fn allows(self, role: Role) -> bool {
        match self {
            Access::Public | Access::Authenticated => true,
            Access::Roles(roles) => roles.contains(&role),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDef {
    /// `/`-separated segments; a segment starting with `:` captures.
    pub pattern: &'static str,
    pub access: Access,
}

const fn route(pattern: &'static str, access: Access) -> RouteDef {
    RouteDef { pattern, access }
}

const PATIENT_ADMIN: &[Role] = &[Role::Patient, Role::Admin];
const PATIENT: &[Role] = &[Role::Patient];
const ADMIN: &[Role] = &[Role::Admin];

/// Every view of the application and who may open it. The guard consults
/// nothing else.
pub const ROUTES: &[RouteDef] = &[
    route(LOGIN_PATH, Access::Public),
    route(REGISTER_PATH, Access::Public),
    route(LANDING_PATH, Access::Authenticated),
    route("/doctors", Access::Roles(PATIENT_ADMIN)),
    route("/doctors/:id", Access::Roles(PATIENT_ADMIN)),
    route("/appointments", Access::Authenticated),
    route("/find-hospital", Access::Roles(PATIENT_ADMIN)),
    route("/book-appointment/:doctorId", Access::Roles(PATIENT)),
    route("/nurses", Access::Roles(PATIENT_ADMIN)),
    route("/book-nurse/:nurseId", Access::Roles(PATIENT)),
    route("/ai-chatbot", Access::Roles(PATIENT)),
    route("/admin", Access::Roles(ADMIN)),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub route: RouteDef,
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteDef>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(ROUTES.to_vec())
    }
}

impl RouteTable {
    pub fn new(routes: Vec<RouteDef>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &[RouteDef] {
        &self.routes
    }

    /// First route whose pattern matches `path`. Query string and fragment
    /// are ignored, as is a trailing slash.
    pub fn resolve(&self, path: &str) -> Option<RouteMatch> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments = split(path);
        self.routes.iter().find_map(|route| {
            match_pattern(route.pattern, &segments).map(|params| RouteMatch {
                route: *route,
                params,
            })
        })
    }
}

fn split(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn match_pattern(pattern: &str, segments: &[&str]) -> Option<BTreeMap<String, String>> {
    let parts = split(pattern);
    if parts.len() != segments.len() {
        return None;
    }
    let mut params = BTreeMap::new();
    for (part, segment) in parts.iter().zip(segments) {
        match part.strip_prefix(':') {
            Some(name) => {
                params.insert(name.to_string(), (*segment).to_string());
            }
            None if part == segment => {}
            None => return None,
        }
    }
    Some(params)
}

/// Where a navigation stands with respect to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Loading,
    Unauthenticated,
    AuthenticatedAllowed,
    AuthenticatedDenied,
}

/// What the view layer should do with a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Session not resolved yet: show nothing (or a spinner), do not redirect.
    Wait,
    Render(RouteMatch),
    Redirect(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub state: GuardState,
    pub decision: Decision,
}

#[derive(Debug, Clone, Default)]
pub struct RouteGuard {
    table: RouteTable,
}

impl RouteGuard {
    pub fn new(table: RouteTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn evaluate(&self, status: SessionStatus, path: &str) -> Navigation {
        let state = |allowed: bool| match status {
            SessionStatus::Resolving => GuardState::Loading,
            SessionStatus::Anonymous => GuardState::Unauthenticated,
            SessionStatus::Authenticated(_) if allowed => GuardState::AuthenticatedAllowed,
            SessionStatus::Authenticated(_) => GuardState::AuthenticatedDenied,
        };

        let Some(matched) = self.table.resolve(path) else {
            return Navigation {
                state: state(false),
                decision: Decision::Redirect(LANDING_PATH),
            };
        };

        if matched.route.access == Access::Public {
            return Navigation {
                state: state(true),
                decision: Decision::Render(matched),
            };
        }

        match status {
            SessionStatus::Resolving => Navigation {
                state: GuardState::Loading,
                decision: Decision::Wait,
            },
            SessionStatus::Anonymous => Navigation {
                state: GuardState::Unauthenticated,
                decision: Decision::Redirect(LOGIN_PATH),
            },
            SessionStatus::Authenticated(role) if matched.route.access.allows(role) => Navigation {
                state: GuardState::AuthenticatedAllowed,
                decision: Decision::Render(matched),
            },
            SessionStatus::Authenticated(_) => Navigation {
                state: GuardState::AuthenticatedDenied,
                decision: Decision::Redirect(LANDING_PATH),
            },
        }
    }

    pub fn decide(&self, status: SessionStatus, path: &str) -> Decision {
        self.evaluate(status, path).decision
    }

    /// Decide once the session has settled; never returns `Decision::Wait`
    /// for a protected route.
    pub async fn navigate(&self, session: &SessionManager, path: &str) -> Navigation {
        let status = session.wait_resolved().await;
        let nav = self.evaluate(status, path);
        tracing::debug!(path, state = ?nav.state, decision = ?nav.decision, "navigation");
        nav
    }

    /// Whether `role` may open `path`. Unknown paths are never reachable.
    pub fn can_access(&self, role: Role, path: &str) -> bool {
        self.table
            .resolve(path)
            .is_some_and(|m| m.route.access.allows(role))
    }
}
