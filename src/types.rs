use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use serde_derive::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::error;

pub trait Validate
where
    Self: Sized,
{
    fn validate(self) -> Result<Self, ValidationError>;
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(ValidationError),

    #[error("validation failed: {0}")]
    Validation(ValidationError),

    #[error("{0}")]
    AuthInvalid(String),

    #[error("inconsistent state: {0}")]
    Inconsistent(String),

    #[error("database error: {0}")]
    Diesel(DieselError),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("internal error")]
    Internal,
}

impl ApiError {
    pub fn auth<S: Into<String>>(reason: S) -> ApiError {
        ApiError::AuthInvalid(reason.into())
    }

    pub fn conflict<K: Into<String>, V: Into<String>>(key: K, val: V) -> ApiError {
        ApiError::Conflict(ValidationError::from(key, val))
    }

    pub fn status(&self) -> Status {
        match self {
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Conflict(_) | ApiError::Validation(_) => Status::UnprocessableEntity,
            ApiError::AuthInvalid(_) => Status::Forbidden,
            ApiError::Inconsistent(_)
            | ApiError::Diesel(_)
            | ApiError::Pool(_)
            | ApiError::Internal => Status::InternalServerError,
        }
    }
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> ApiError {
        match err {
            DieselError::NotFound => ApiError::NotFound("entity".into()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                // sqlite reports "UNIQUE constraint failed: users.email"
                let field = info
                    .message()
                    .rsplit('.')
                    .next()
                    .and_then(|column| column.split(',').next())
                    .unwrap_or("entity")
                    .trim()
                    .to_string();
                ApiError::conflict(field, "has already been taken")
            }
            other => ApiError::Diesel(other),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> ApiError {
        ApiError::Validation(err)
    }
}

#[derive(Debug, Serialize, Default, PartialEq)]
pub struct ValidationError(BTreeMap<String, Vec<String>>);

impl ValidationError {
    pub fn add_error<K: Into<String>, V: Into<String>>(&mut self, key: K, val: V) {
        self.0.entry(key.into()).or_default().push(val.into());
    }

    pub fn from<K: Into<String>, V: Into<String>>(key: K, val: V) -> Self {
        let mut error = ValidationError::default();
        error.add_error(key, val);
        error
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: ValidationError) {
        for (key, errors) in other.0.into_iter() {
            self.0.entry(key).or_default().extend(errors);
        }
    }

    pub fn empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Turns the collected errors into a result, `Ok` when nothing was added.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationError> {
        if self.empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "{}", fields.join(", "))
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

impl ApiError {
    fn body(&self) -> Value {
        match self {
            ApiError::NotFound(what) => json!({ "errors": { "body": [format!("{} not found", what)] } }),
            ApiError::Conflict(errors) | ApiError::Validation(errors) => json!({ "errors": errors }),
            ApiError::AuthInvalid(reason) => json!({ "errors": { "token": [reason] } }),
            _ => json!({ "errors": { "body": ["internal server error"] } }),
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        if status.code >= 500 {
            error!(error = %self, path = %req.uri(), "request failed");
        }
        (status, Json(self.body())).respond_to(req)
    }
}
