use serde_json::{Map, Value, json};

use crate::error::AuthError;
use crate::models::Role;

/// Everything the sign-up form collects. Which fields are sent depends on
/// the role being registered.
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: String,
    pub last_name: String,

    // doctor / nurse
    pub specialist: String,
    pub location: String,
    pub experience_years: String,
    pub consultation_fee: String,
    pub bio: String,

    // all roles
    pub phone: String,

    // patient
    pub date_of_birth: String,
    pub address: String,
    pub emergency_contact: String,
}

impl RegistrationForm {
    /// Checks that can be made without the backend. Errors use the same
    /// shape the backend returns so callers render both the same way.
    pub fn validate(&self, role: Role) -> Result<(), AuthError> {
        let mut errors = Map::new();

        require(&mut errors, "username", &self.username, "This field is required.");
        require(&mut errors, "email", &self.email, "This field is required.");
        require(&mut errors, "password", &self.password, "This field is required.");

        match role {
            Role::Doctor => {
                require(&mut errors, "specialist", &self.specialist, "Specialist is required");
                require(&mut errors, "location", &self.location, "Location is required");
            }
            Role::Nurse => require(&mut errors, "location", &self.location, "Location is required"),
            Role::Patient => {}
            Role::Admin => {
                errors.insert(
                    "user_type".into(),
                    json!(["Admin accounts cannot be registered"]),
                );
            }
        }

        if !self.password.is_empty() && self.password != self.password_confirm {
            errors.insert("password_confirm".into(), json!(["Passwords do not match"]));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AuthError::validation(Value::Object(errors)))
        }
    }

    /// Request body for the role's registration endpoint.
    pub fn payload(&self, role: Role) -> Value {
        let mut body = Map::new();
        body.insert(
            "user".into(),
            json!({
                "username": self.username.trim(),
                "email": self.email.trim(),
                "password": self.password,
                "password_confirm": self.password_confirm,
                "first_name": self.first_name.trim(),
                "last_name": self.last_name.trim(),
                "user_type": role.as_str(),
            }),
        );
        body.insert("phone".into(), json!(self.phone));

        match role {
            Role::Doctor | Role::Nurse => {
                if role == Role::Doctor {
                    body.insert("specialist".into(), json!(self.specialist));
                }
                body.insert("location".into(), json!(self.location));
                body.insert(
                    "experience_years".into(),
                    json!(lenient_int(&self.experience_years)),
                );
                body.insert(
                    "consultation_fee".into(),
                    json!(lenient_float(&self.consultation_fee)),
                );
                body.insert("bio".into(), json!(self.bio));
            }
            Role::Patient | Role::Admin => {
                body.insert("date_of_birth".into(), optional(&self.date_of_birth));
                body.insert("address".into(), json!(self.address));
                body.insert("emergency_contact".into(), json!(self.emergency_contact));
            }
        }

        Value::Object(body)
    }
}

fn require(errors: &mut Map<String, Value>, field: &str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.insert(field.to_string(), json!([message]));
    }
}

// blank date goes out as null, the backend rejects ""
fn optional(value: &str) -> Value {
    let value = value.trim();
    if value.is_empty() {
        Value::Null
    } else {
        json!(value)
    }
}

/// Leading integer of the input, 0 when there is none.
fn lenient_int(value: &str) -> i64 {
    let value = value.trim();
    let end = value
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    value[..end].parse().unwrap_or(0)
}

/// Longest leading decimal number of the input, 0 when there is none.
fn lenient_float(value: &str) -> f64 {
    let value = value.trim();
    let numeric = value
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
        .unwrap_or(value.len());
    (1..=numeric)
        .rev()
        .find_map(|end| value[..end].parse::<f64>().ok())
        .filter(|f| f.is_finite())
        .unwrap_or(0.0)
}
