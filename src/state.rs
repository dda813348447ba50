use chrono::Duration;

use crate::article::engine::ArticleEngine;
use crate::config::Config;
use crate::db::Store;
use crate::favorite::FavoriteGraph;
use crate::follow::FollowGraph;
use crate::tag::TagIndex;
use crate::types::ApiError;
use crate::users::identity::Identity;
use crate::users::token::TokenService;

/// Everything a request handler needs, built once at startup around a
/// single store handle and managed by Rocket.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub tokens: TokenService,
    /// Lifetime of tokens issued at registration and login.
    pub token_ttl: Duration,
    pub identity: Identity,
    pub follows: FollowGraph,
    pub favorites: FavoriteGraph,
    pub tags: TagIndex,
    pub articles: ArticleEngine,
}

impl AppState {
    pub fn new(store: Store, config: &Config) -> Result<Self, ApiError> {
        let tokens = TokenService::new(config.secret_key.as_bytes())?;
        let follows = FollowGraph::new(store.clone());
        let favorites = FavoriteGraph::new(store.clone());
        let tags = TagIndex::new(store.clone());
        let identity = Identity::new(store.clone(), follows.clone());
        let articles = ArticleEngine::new(
            store.clone(),
            identity.clone(),
            favorites.clone(),
            tags.clone(),
            config.list_concurrency,
        );

        Ok(AppState {
            store,
            tokens,
            token_ttl: Duration::minutes(config.token_ttl_minutes),
            identity,
            follows,
            favorites,
            tags,
            articles,
        })
    }
}
