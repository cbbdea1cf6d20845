use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::models::{Role, TokenPair, UserProfile};

use super::auth::{hash_token, issue_token_pair};

const REFRESH_TOKEN_TTL_DAYS: i64 = 1;

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    pub password_hash: String,
    /// Role-specific record (doctor / patient / nurse), as served.
    pub details: Option<Value>,
}

impl UserRecord {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            role: self.role,
            is_active: self.is_active,
        }
    }

    /// `{user, <role>: details}` as returned by login, registration and profile.
    pub fn envelope(&self) -> Value {
        let mut body = json!({ "user": self.profile() });
        if let Some(details) = &self.details {
            body[self.role.as_str()] = details.clone();
        }
        body
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub session_id: Uuid,
    pub user_id: i64,
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub password_hash: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Conflict {
    Username,
    Email,
}

/// Accounts and issued tokens. Only digests of tokens are kept.
#[derive(Debug, Default)]
pub struct Store {
    users: Vec<UserRecord>,
    tokens: HashMap<String, TokenRecord>,
}

impl Store {
    pub fn find_by_username(&self, username: &str) -> Option<&UserRecord> {
        self.users.iter().find(|u| u.username == username)
    }

    pub fn find_by_id(&self, id: i64) -> Option<&UserRecord> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn insert_user(
        &mut self,
        new: NewUser,
        details: impl FnOnce(i64, &UserProfile) -> Option<Value>,
    ) -> Result<&UserRecord, Conflict> {
        if self.find_by_username(&new.username).is_some() {
            return Err(Conflict::Username);
        }
        if self
            .users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(&new.email))
        {
            return Err(Conflict::Email);
        }

        let id = self.users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        let mut record = UserRecord {
            id,
            username: new.username,
            email: new.email,
            first_name: new.first_name,
            last_name: new.last_name,
            role: new.role,
            is_active: true,
            password_hash: new.password_hash,
            details: None,
        };
        record.details = details(id, &record.profile());
        self.users.push(record);
        Ok(&self.users[self.users.len() - 1])
    }

    /// Mint a token pair for `user_id`. Entries already past their expiry are
    /// swept first so the map only grows with live sessions.
    pub fn issue_tokens(&mut self, user_id: i64, access_ttl: Duration) -> TokenPair {
        let now = Utc::now();
        self.tokens.retain(|_, record| record.expires_at > now);

        let session_id = Uuid::new_v4();
        let pair = issue_token_pair();

        self.tokens.insert(
            hash_token(&pair.access),
            TokenRecord {
                session_id,
                user_id,
                kind: TokenKind::Access,
                expires_at: now + access_ttl,
            },
        );
        self.tokens.insert(
            hash_token(&pair.refresh),
            TokenRecord {
                session_id,
                user_id,
                kind: TokenKind::Refresh,
                expires_at: now + Duration::days(REFRESH_TOKEN_TTL_DAYS),
            },
        );
        pair
    }

    /// Live access token -> its record. Expired entries are dropped on sight.
    pub fn verify_access(&mut self, token: &str) -> Option<TokenRecord> {
        let digest = hash_token(token);
        let record = self.tokens.get(&digest)?.clone();
        if record.expires_at <= Utc::now() {
            self.tokens.remove(&digest);
            return None;
        }
        (record.kind == TokenKind::Access).then_some(record)
    }

    /// Expire every issued token, as if the server had been idle past their TTL.
    pub fn expire_all(&mut self) {
        let past = Utc::now() - Duration::seconds(1);
        for record in self.tokens.values_mut() {
            record.expires_at = past;
        }
    }
}
