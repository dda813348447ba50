use rocket::http::{CookieJar, Status};
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest, Request};
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::State;
use serde_derive::{Deserialize, Serialize};
use tracing::{debug, info};

pub mod credentials;
pub mod identity;
pub mod models;
pub mod token;
mod utils;

use crate::state::AppState;
use crate::types::{ApiError, ApiResult, Validate, ValidationError};
use crate::utils::non_empty;

use self::identity::{Credentials, NewAccount};
use self::models::{User, UserPatch, UserResponse};
use self::utils::*;

/// Cookie holding the captcha answer the client was shown.
pub const CAPTCHA_COOKIE: &str = "cap";

/// An authenticated caller together with the token it presented.
#[derive(Debug)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

/// Routes that require a caller take this, so the precise rejection
/// reaches the responder instead of a catcher.
pub type CurrentUser = Result<AuthUser, ApiError>;

/// Anonymous callers are fine; a malformed or stale token is not.
#[derive(Debug)]
pub struct MaybeUser(pub Option<AuthUser>);

impl MaybeUser {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref().map(|auth| &auth.user)
    }
}

pub type Viewer = Result<MaybeUser, ApiError>;

fn reject<T>(e: ApiError) -> request::Outcome<T, ApiError> {
    Outcome::Error((e.status(), e))
}

async fn resolve(req: &Request<'_>, token: &str) -> Result<AuthUser, ApiError> {
    let state = req.rocket().state::<AppState>().ok_or(ApiError::Internal)?;
    let claims = state.tokens.verify(token)?;
    let user = state
        .identity
        .find_by_username(&claims.username)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {}", claims.username)))?;
    Ok(AuthUser {
        user,
        token: token.to_string(),
    })
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = ApiError;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let header = req.headers().get_one("Authorization");
        let token = match token::extract_bearer(header) {
            Ok(token) => token,
            Err(e) => return reject(e),
        };
        match resolve(req, token).await {
            Ok(auth) => Outcome::Success(auth),
            Err(e) => reject(e),
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for MaybeUser {
    type Error = ApiError;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let header = req.headers().get_one("Authorization");
        let token = match token::extract_bearer_optional(header) {
            Ok(Some(token)) => token,
            Ok(None) => return Outcome::Success(MaybeUser(None)),
            Err(e) => return reject(e),
        };
        match resolve(req, token).await {
            Ok(auth) => Outcome::Success(MaybeUser(Some(auth))),
            Err(e) => reject(e),
        }
    }
}

fn check_captcha(cookies: &CookieJar<'_>, vcode: &str) -> Result<(), ValidationError> {
    match cookies.get(CAPTCHA_COOKIE) {
        Some(cookie) if cookie.value() == vcode => Ok(()),
        _ => Err(ValidationError::from("vcode", "is invalid")),
    }
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    user: UserResponse,
}

impl UserEnvelope {
    fn new(user: &User, token: String) -> Self {
        UserEnvelope {
            user: user.with_token(token),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegistrationDetails {
    username: String,
    email: String,
    password: String,
    vcode: String,
}

#[derive(Debug, Deserialize)]
pub struct Registration {
    user: RegistrationDetails,
}

impl Registration {
    /// Surrounding whitespace is never part of a username or an email.
    fn trimmed(mut self) -> Self {
        self.user.username = self.user.username.trim().to_string();
        self.user.email = self.user.email.trim().to_string();
        self
    }
}

impl Validate for Registration {
    fn validate(self) -> Result<Self, ValidationError> {
        collect(vec![
            validate_email(&self.user.email),
            validate_username(&self.user.username),
            validate_password(&self.user.password),
        ])
        .into_result(self)
    }
}

#[post("/", format = "json", data = "<registration>")]
pub async fn register(
    state: &State<AppState>,
    cookies: &CookieJar<'_>,
    registration: Json<Registration>,
) -> Result<status::Custom<Json<UserEnvelope>>, ApiError> {
    let registration = registration.into_inner();
    check_captcha(cookies, &registration.user.vcode)?;
    let details = registration.trimmed().validate()?.user;

    state
        .identity
        .ensure_username_and_email_free(Some(&details.username), Some(&details.email))
        .await?;
    let account = NewAccount::new(&details.username, &details.email, details.password);
    let (user, token) = state
        .identity
        .register(account, &state.tokens, state.token_ttl)
        .await?;

    Ok(status::Custom(Status::Created, Json(UserEnvelope::new(&user, token))))
}

#[derive(Debug, Deserialize)]
struct LoginDetails {
    email: String,
    password: String,
    vcode: String,
    /// Present only when the client wants an unknown email registered on
    /// the spot.
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Login {
    user: LoginDetails,
}

fn invalid_login() -> ApiError {
    ValidationError::from("email or password", "is invalid").into()
}

#[post("/login", format = "json", data = "<login>")]
pub async fn login(
    state: &State<AppState>,
    cookies: &CookieJar<'_>,
    login: Json<Login>,
) -> ApiResult<UserEnvelope> {
    let details = login.into_inner().user;
    check_captcha(cookies, &details.vcode)?;
    let email = details.email.trim();

    match state.identity.authenticate(email, &details.password).await? {
        Credentials::Valid(user) => {
            let token = state.tokens.issue(&user.username, Some(state.token_ttl))?;
            info!(username = %user.username, "user logged in");
            return Ok(Json(UserEnvelope::new(&user, token)));
        }
        Credentials::WrongPassword => {
            debug!(email = %email, "wrong password");
            return Err(invalid_login());
        }
        Credentials::UnknownEmail => {}
    }

    let username = match non_empty(details.username) {
        Some(username) => username.trim().to_string(),
        None => return Err(invalid_login()),
    };
    collect(vec![
        validate_email(email),
        validate_username(&username),
        validate_password(&details.password),
    ])
    .into_result(())?;
    state
        .identity
        .ensure_username_and_email_free(Some(&username), None)
        .await?;
    let account = NewAccount::new(&username, email, details.password);
    let (user, token) = state
        .identity
        .register(account, &state.tokens, state.token_ttl)
        .await?;
    info!(username = %user.username, "first login registered a new account");
    Ok(Json(UserEnvelope::new(&user, token)))
}

#[get("/user")]
pub fn current(current_user: CurrentUser) -> ApiResult<UserEnvelope> {
    let auth = current_user?;
    Ok(Json(UserEnvelope::new(&auth.user, auth.token)))
}

#[derive(Debug, Deserialize)]
pub struct Update {
    user: UserPatch,
}

impl Validate for Update {
    fn validate(self) -> Result<Self, ValidationError> {
        let mut checks = Vec::new();
        if let Some(email) = non_empty(self.user.email.clone()) {
            checks.push(validate_email(&email));
        }
        if let Some(password) = non_empty(self.user.password.clone()) {
            checks.push(validate_password(&password));
        }
        collect(checks).into_result(self)
    }
}

#[put("/user", format = "json", data = "<update>")]
pub async fn update(
    state: &State<AppState>,
    current_user: CurrentUser,
    update: Json<Update>,
) -> ApiResult<UserEnvelope> {
    let auth = current_user?;
    let patch = update.into_inner().validate()?.user;
    let user = state.identity.update(&auth.user.username, patch).await?;
    info!(username = %user.username, "user updated");
    Ok(Json(UserEnvelope::new(&user, auth.token)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(username: &str, email: &str, password: &str) -> Registration {
        Registration {
            user: RegistrationDetails {
                username: username.into(),
                email: email.into(),
                password: password.into(),
                vcode: "1234".into(),
            },
        }
    }

    #[test]
    fn registration_reports_every_bad_field() {
        assert!(registration("alice", "a@x.com", "pw123").validate().is_ok());

        let errors = registration("al", "nope", "pw").validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn registration_is_trimmed_before_validation() {
        let padded = registration(" al ", " a@x.com ", "pw123").trimmed();
        assert_eq!(padded.user.username, "al");
        assert_eq!(padded.user.email, "a@x.com");
        assert!(padded.validate().unwrap_err().contains("username"));
    }

    #[test]
    fn update_ignores_blank_fields() {
        let update = Update {
            user: UserPatch {
                email: Some("".into()),
                password: Some("  ".into()),
                ..UserPatch::default()
            },
        };
        assert!(update.validate().is_ok());

        let update = Update {
            user: UserPatch {
                email: Some("bad".into()),
                ..UserPatch::default()
            },
        };
        assert!(update.validate().unwrap_err().contains("email"));
    }
}
