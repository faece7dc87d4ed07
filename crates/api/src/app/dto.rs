use std::str::FromStr;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Json, Query};
use serde::Deserialize;

use warden_core::{PageRequest, RoleId, ServiceError, UserId};
use warden_infra::{Registration, RoleDefinition};

pub const MIN_PASSWORD_LEN: usize = 8;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl RegisterRequest {
    pub fn validate(self) -> Result<Registration, ServiceError> {
        validate_email(&self.email)?;
        validate_password_strength(&self.password)?;
        Ok(Registration {
            email: self.email,
            password: self.password,
            first_name: self.first_name,
            last_name: self.last_name,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), ServiceError> {
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(ServiceError::validation("password must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub permissions: Vec<String>,
}

impl From<CreateRoleRequest> for RoleDefinition {
    fn from(value: CreateRoleRequest) -> Self {
        RoleDefinition {
            name: value.name,
            permissions: value.permissions,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleRequest {
    pub id: String,
    pub role_id: i32,
}

impl AssignRoleRequest {
    pub fn ids(&self) -> Result<(UserId, RoleId), ServiceError> {
        Ok((UserId::from_str(self.id.trim())?, RoleId::new(self.role_id)))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn to_request(&self) -> Result<PageRequest, ServiceError> {
        PageRequest::new(
            self.page.unwrap_or(PageRequest::DEFAULT_PAGE),
            self.limit.unwrap_or(PageRequest::DEFAULT_LIMIT),
        )
    }
}

// -------------------------
// Extraction helpers
// -------------------------

/// Unwrap a JSON body, turning axum's rejection into a validation error.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ServiceError::validation(rejection.body_text()))
}

pub fn page_query(query: Result<Query<PageQuery>, QueryRejection>) -> Result<PageRequest, ServiceError> {
    let Query(query) = query.map_err(|_| {
        ServiceError::validation("page and limit must be positive integers")
    })?;
    query.to_request()
}

// -------------------------
// Field validation
// -------------------------

pub fn validate_email(email: &str) -> Result<(), ServiceError> {
    let invalid = || ServiceError::validation("email must be a valid email address");

    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

/// At least 8 characters with a lowercase letter, an uppercase letter, a digit
/// and a symbol.
pub fn validate_password_strength(password: &str) -> Result<(), ServiceError> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LEN;
    let lower = password.chars().any(|c| c.is_lowercase());
    let upper = password.chars().any(|c| c.is_uppercase());
    let digit = password.chars().any(|c| c.is_ascii_digit());
    let symbol = password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());

    if long_enough && lower && upper && digit && symbol {
        Ok(())
    } else {
        Err(ServiceError::validation("password is not strong enough"))
    }
}
