use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::State;

pub mod engine;
pub mod models;

use crate::state::AppState;
use crate::types::{ApiError, ApiResult, Validate};
use crate::users::{CurrentUser, Viewer};

use self::models::{ArticleFilters, ArticleResponse, ArticlesResponse, CreateArticle, DEFAULT_LIMIT};

#[get("/?<tag>&<author>&<favorited>&<limit>&<offset>")]
pub async fn list(
    state: &State<AppState>,
    viewer: Viewer,
    tag: Option<String>,
    author: Option<String>,
    favorited: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> ApiResult<ArticlesResponse> {
    let viewer = viewer?;
    let filters = ArticleFilters {
        tag,
        author,
        favorited,
        limit: limit.unwrap_or(DEFAULT_LIMIT),
        offset: offset.unwrap_or(0),
    }
    .validate()?;

    let articles = state.articles.list(filters, viewer.user()).await?;
    Ok(Json(ArticlesResponse {
        articles_count: articles.len(),
        articles,
    }))
}

#[get("/<slug>")]
pub async fn get(state: &State<AppState>, viewer: Viewer, slug: &str) -> ApiResult<ArticleResponse> {
    let viewer = viewer?;
    let article = state
        .articles
        .get_by_slug(slug, viewer.user())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("article {}", slug)))?;
    Ok(Json(ArticleResponse { article }))
}

#[post("/", format = "json", data = "<create>")]
pub async fn create(
    state: &State<AppState>,
    current_user: CurrentUser,
    create: Json<CreateArticle>,
) -> Result<status::Custom<Json<ArticleResponse>>, ApiError> {
    let auth = current_user?;
    let details = create.into_inner().article.validate()?;
    let article = state.articles.create(&auth.user, details).await?;
    Ok(status::Custom(Status::Created, Json(ArticleResponse { article })))
}

#[post("/<slug>/favorite")]
pub async fn favorite(state: &State<AppState>, current_user: CurrentUser, slug: &str) -> ApiResult<ArticleResponse> {
    let auth = current_user?;
    let article = state.articles.favorite(slug, &auth.user).await?;
    Ok(Json(ArticleResponse { article }))
}

#[delete("/<slug>/favorite")]
pub async fn unfavorite(state: &State<AppState>, current_user: CurrentUser, slug: &str) -> ApiResult<ArticleResponse> {
    let auth = current_user?;
    let article = state.articles.unfavorite(slug, &auth.user).await?;
    Ok(Json(ArticleResponse { article }))
}
