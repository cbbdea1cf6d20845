use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/* -------------------------
   Roles
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Nurse,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Patient, Role::Doctor, Role::Nurse, Role::Admin];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Nurse => "nurse",
            Role::Admin => "admin",
        }
    }

    /// Registration endpoint for the role. Admin accounts are not self-service.
    pub fn registration_path(self) -> Option<&'static str> {
        match self {
            Role::Patient => Some("/api/auth/register/patient/"),
            Role::Doctor => Some("/api/auth/register/doctor/"),
            Role::Nurse => Some("/api/auth/register/nurse/"),
            Role::Admin => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "nurse" => Ok(Role::Nurse),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(rename = "user_type")]
    pub role: Role,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl UserProfile {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// Profile envelope returned by the backend: the account plus whichever
/// role-specific record exists for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user: UserProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nurse: Option<serde_json::Value>,
}

impl Profile {
    pub fn role(&self) -> Role {
        self.user.role
    }
}

/// Body of a successful login or registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub tokens: TokenPair,
    #[serde(flatten)]
    pub profile: Profile,
}

/* -------------------------
   Client session
--------------------------*/

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub tokens: TokenPair,
    pub profile: Option<Profile>,
    pub established_at: DateTime<Utc>,
}

impl Session {
    pub fn new(tokens: TokenPair, profile: Option<Profile>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tokens,
            profile,
            established_at: Utc::now(),
        }
    }

    /// Role of a verified session. A session without a fetched profile has none.
    pub fn role(&self) -> Option<Role> {
        self.profile.as_ref().map(Profile::role)
    }
}

/// What the route guard sees of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Resolving,
    Anonymous,
    Authenticated(Role),
}

impl SessionStatus {
    pub fn is_resolved(self) -> bool {
        !matches!(self, SessionStatus::Resolving)
    }

    pub fn role(self) -> Option<Role> {
        match self {
            SessionStatus::Authenticated(role) => Some(role),
            _ => None,
        }
    }
}
