use lazy_static::lazy_static;
use regex::Regex;

use crate::types::ValidationError;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 5;

lazy_static! {
    static ref EMAIL_RE: Regex = {
        let pattern = r"(?i)\A[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\z";
        Regex::new(pattern).expect("email pattern compiles")
    };
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if !EMAIL_RE.is_match(email) {
        Err(ValidationError::from("email", format!("Invalid email: {}", email)))
    } else {
        Ok(())
    }
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.trim().chars().count() < MIN_USERNAME_LEN {
        Err(ValidationError::from(
            "username",
            format!("is too short (minimum is {} characters)", MIN_USERNAME_LEN),
        ))
    } else {
        Ok(())
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        Err(ValidationError::from(
            "password",
            format!("is too short (minimum is {} characters)", MIN_PASSWORD_LEN),
        ))
    } else {
        Ok(())
    }
}

/// Runs every check and keeps all failures, not just the first one.
pub fn collect(checks: Vec<Result<(), ValidationError>>) -> ValidationError {
    let mut errors = ValidationError::default();
    for check in checks {
        if let Err(e) = check {
            errors.merge(e);
        }
    }
    errors
}
