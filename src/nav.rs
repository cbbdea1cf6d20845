use crate::guard::{LANDING_PATH, LOGIN_PATH, REGISTER_PATH, RouteGuard};
use crate::models::SessionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuItem {
    pub label: &'static str,
    pub path: &'static str,
}

const fn item(label: &'static str, path: &'static str) -> MenuItem {
    MenuItem { label, path }
}

/// Candidate entries of the signed-in menu, in display order.
const SIGNED_IN: &[MenuItem] = &[
    item("Home", LANDING_PATH),
    item("Find Doctors", "/doctors"),
    item("Find Nurses", "/nurses"),
    item("Find Hospital", "/find-hospital"),
    item("AI Assistant", "/ai-chatbot"),
    item("Appointments", "/appointments"),
    item("Admin", "/admin"),
];

const SIGNED_OUT: &[MenuItem] = &[item("Login", LOGIN_PATH), item("Register", REGISTER_PATH)];

/// Menu for the current session. Signed-in entries are filtered through the
/// guard's route table, so the menu never links somewhere the guard would
/// bounce.
pub fn menu(guard: &RouteGuard, status: SessionStatus) -> Vec<MenuItem> {
    match status {
        SessionStatus::Resolving => Vec::new(),
        SessionStatus::Anonymous => SIGNED_OUT.to_vec(),
        SessionStatus::Authenticated(role) => SIGNED_IN
            .iter()
            .copied()
            .filter(|entry| guard.can_access(role, entry.path))
            .collect(),
    }
}
