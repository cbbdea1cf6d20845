use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::catalog::{Location, Specialist};
use crate::models::{Role, UserProfile};

use super::{
    AppState,
    auth::{hash_password, verify_password},
    auth_context::AuthContext,
    error::ApiError,
    store::{Conflict, NewUser},
};

const REQUIRED: &str = "This field is required.";
const MIN_PASSWORD_LEN: usize = 8;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login/", post(login))
        .route("/register/{kind}/", post(register))
        .route("/profile/", get(profile))
}

/* -------------------------
   Request bodies
--------------------------*/

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AccountFields {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
    password_confirm: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RegisterRequest {
    user: Option<AccountFields>,
    specialist: Option<String>,
    location: Option<String>,
    phone: Option<String>,
    experience_years: Option<i64>,
    consultation_fee: Option<f64>,
    bio: Option<String>,
    date_of_birth: Option<String>,
    address: Option<String>,
    emergency_contact: Option<String>,
}

/* -------------------------
   Validation helpers
--------------------------*/

#[derive(Default)]
struct Errors(Map<String, Value>);

impl Errors {
    fn add(&mut self, field: &str, message: impl Into<String>) {
        let entry = self
            .0
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = entry {
            items.push(Value::String(message.into()));
        }
    }

    fn nest(&mut self, field: &str, inner: Errors) {
        if !inner.0.is_empty() {
            self.0.insert(field.to_string(), Value::Object(inner.0));
        }
    }

    fn into_result(self) -> Result<(), ApiError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(Value::Object(self.0)))
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse<T: for<'de> Deserialize<'de>>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::non_field(format!("Invalid data: {e}")))
}

struct Account {
    username: String,
    email: String,
    password: String,
    first_name: String,
    last_name: String,
}

fn validate_account(fields: Option<&AccountFields>, errors: &mut Errors) -> Option<Account> {
    let Some(fields) = fields else {
        errors.add("user", REQUIRED);
        return None;
    };

    let mut inner = Errors::default();
    let username = present(&fields.username);
    let email = present(&fields.email);
    let password = fields.password.as_deref().filter(|p| !p.is_empty());

    if username.is_none() {
        inner.add("username", REQUIRED);
    }
    match email {
        None => inner.add("email", REQUIRED),
        Some(e) if !e.contains('@') => inner.add("email", "Enter a valid email address."),
        Some(_) => {}
    }
    match password {
        None => inner.add("password", REQUIRED),
        Some(p) if p.chars().count() < MIN_PASSWORD_LEN => inner.add(
            "password",
            format!("Ensure this field has at least {MIN_PASSWORD_LEN} characters."),
        ),
        Some(_) => {}
    }
    if fields.password_confirm.is_none() {
        inner.add("password_confirm", REQUIRED);
    } else if fields.password.is_some() && fields.password != fields.password_confirm {
        inner.add("non_field_errors", "Passwords don't match");
    }

    let ok = inner.0.is_empty();
    errors.nest("user", inner);
    if !ok {
        return None;
    }

    Some(Account {
        username: username?.to_string(),
        email: email?.to_string(),
        password: password?.to_string(),
        first_name: fields.first_name.clone().unwrap_or_default(),
        last_name: fields.last_name.clone().unwrap_or_default(),
    })
}

fn validate_choice(
    errors: &mut Errors,
    field: &str,
    value: &Option<String>,
    required: &str,
    known: impl Fn(&str) -> bool,
) {
    match present(value) {
        None => errors.add(field, required),
        Some(v) if !known(v) => errors.add(field, format!("\"{v}\" is not a valid choice.")),
        Some(_) => {}
    }
}

fn role_details(role: Role, id: i64, user: &UserProfile, req: &RegisterRequest) -> Value {
    let fee = format!("{:.2}", req.consultation_fee.unwrap_or(0.0));
    let created_at = Utc::now();
    match role {
        Role::Doctor => json!({
            "id": id,
            "user": user,
            "specialist": req.specialist,
            "location": req.location,
            "phone": req.phone.clone().unwrap_or_default(),
            "experience_years": req.experience_years.unwrap_or(0),
            "consultation_fee": fee,
            "bio": req.bio.clone().unwrap_or_default(),
            "is_available": true,
            "created_at": created_at,
        }),
        Role::Nurse => json!({
            "id": id,
            "user": user,
            "location": req.location,
            "phone": req.phone.clone().unwrap_or_default(),
            "experience_years": req.experience_years.unwrap_or(0),
            "consultation_fee": fee,
            "bio": req.bio.clone().unwrap_or_default(),
            "is_available": true,
            "created_at": created_at,
        }),
        Role::Patient | Role::Admin => json!({
            "id": id,
            "user": user,
            "phone": req.phone.clone().unwrap_or_default(),
            "date_of_birth": present(&req.date_of_birth),
            "address": req.address.clone().unwrap_or_default(),
            "emergency_contact": req.emergency_contact.clone().unwrap_or_default(),
            "created_at": created_at,
        }),
    }
}

/* -------------------------
   Handlers
--------------------------*/

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let req: LoginRequest = parse(body)?;

    let mut errors = Errors::default();
    let username = present(&req.username);
    let password = req.password.as_deref().filter(|p| !p.is_empty());
    if username.is_none() {
        errors.add("username", REQUIRED);
    }
    if password.is_none() {
        errors.add("password", REQUIRED);
    }
    errors.into_result()?;
    let (Some(username), Some(password)) = (username, password) else {
        return Err(ApiError::non_field("Must include username and password"));
    };

    let mut store = state.store.write().await;
    let user = store
        .find_by_username(username)
        .filter(|u| verify_password(password, &u.password_hash))
        .cloned()
        .ok_or_else(|| ApiError::non_field("Invalid credentials"))?;

    if !user.is_active {
        return Err(ApiError::non_field("User account is disabled"));
    }

    let tokens = store.issue_tokens(user.id, state.access_token_ttl);
    tracing::info!(username = %user.username, role = %user.role, "login");

    let mut body = user.envelope();
    body["tokens"] = json!(tokens);
    Ok(Json(body))
}

pub async fn register(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let role = match kind.as_str() {
        "patient" => Role::Patient,
        "doctor" => Role::Doctor,
        "nurse" => Role::Nurse,
        _ => return Err(ApiError::NotFound("Not found.".into())),
    };
    let req: RegisterRequest = parse(body)?;

    let mut errors = Errors::default();
    let account = validate_account(req.user.as_ref(), &mut errors);
    match role {
        Role::Doctor => {
            validate_choice(&mut errors, "specialist", &req.specialist, "Specialist is required", |v| {
                Specialist::from_code(v).is_some()
            });
            validate_choice(&mut errors, "location", &req.location, "Location is required", |v| {
                Location::from_code(v).is_some()
            });
        }
        Role::Nurse => {
            validate_choice(&mut errors, "location", &req.location, "Location is required", |v| {
                Location::from_code(v).is_some()
            });
        }
        Role::Patient | Role::Admin => {}
    }
    errors.into_result()?;
    let Some(account) = account else {
        return Err(ApiError::non_field("Invalid data"));
    };

    let password_hash = hash_password(&account.password).map_err(ApiError::Internal)?;

    let mut store = state.store.write().await;
    let new_user = NewUser {
        username: account.username,
        email: account.email,
        first_name: account.first_name,
        last_name: account.last_name,
        role,
        password_hash,
    };
    let user = store
        .insert_user(new_user, |id, profile| Some(role_details(role, id, profile, &req)))
        .map_err(|conflict| {
            let (field, message) = match conflict {
                Conflict::Username => ("username", "A user with that username already exists."),
                Conflict::Email => ("email", "user with this email already exists."),
            };
            ApiError::Validation(json!({ "user": { field: [message] } }))
        })?
        .clone();

    let tokens = store.issue_tokens(user.id, state.access_token_ttl);
    tracing::info!(username = %user.username, %role, "registered");

    let mut body = user.envelope();
    body["tokens"] = json!(tokens);
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn profile(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Value>, ApiError> {
    let store = state.store.read().await;
    let user = store
        .find_by_id(auth.user_id)
        .ok_or_else(ApiError::token_not_valid)?;
    tracing::debug!(user_id = auth.user_id, session_id = %auth.session_id, "profile");
    Ok(Json(user.envelope()))
}
