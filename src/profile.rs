use rocket::serde::json::Json;
use rocket::State;
use serde_derive::Serialize;
use tracing::info;

use crate::state::AppState;
use crate::types::{ApiError, ApiResult};
use crate::users::models::User;
use crate::users::{CurrentUser, Viewer};

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    profile: Profile,
}

/// Public view of a user. `following` is relative to whoever is asking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub username: String,
    pub bio: String,
    pub image: Option<String>,
    pub following: bool,
}

async fn load_target(state: &AppState, name: &str) -> Result<User, ApiError> {
    state
        .identity
        .find_by_username(name)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {}", name)))
}

#[get("/profiles/<name>")]
pub async fn profile(state: &State<AppState>, viewer: Viewer, name: &str) -> ApiResult<ProfileResponse> {
    let viewer = viewer?;
    let profile = state.identity.profile_for(name, viewer.user()).await?;
    Ok(Json(ProfileResponse { profile }))
}

#[post("/profiles/<name>/follow")]
pub async fn follow(state: &State<AppState>, current_user: CurrentUser, name: &str) -> ApiResult<ProfileResponse> {
    let current = current_user?;
    let target = load_target(state, name).await?;
    state.follows.follow(current.user.id, target.id).await?;
    info!(follower = %current.user.username, following = %target.username, "followed");

    Ok(Json(ProfileResponse {
        profile: target.profile(true),
    }))
}

#[delete("/profiles/<name>/follow")]
pub async fn unfollow(state: &State<AppState>, current_user: CurrentUser, name: &str) -> ApiResult<ProfileResponse> {
    let current = current_user?;
    let target = load_target(state, name).await?;
    state.follows.unfollow(current.user.id, target.id).await?;
    info!(follower = %current.user.username, following = %target.username, "unfollowed");

    Ok(Json(ProfileResponse {
        profile: target.profile(false),
    }))
}
