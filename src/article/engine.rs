use diesel::prelude::*;
use diesel::sqlite::Sqlite;
use diesel::insert_into;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{error, info};

use crate::db::schema::{article_tags, articles, favorites, users};
use crate::db::Store;
use crate::favorite::FavoriteGraph;
use crate::tag::TagIndex;
use crate::types::{ApiError, ValidationError};
use crate::users::identity::Identity;
use crate::users::models::User;
use crate::utils::{self, slug_for};

use super::models::{Article, ArticleDetails, ArticleFilters, ArticleView, NewArticle, NewArticleTag};

/// Owns article creation and assembles read models from the article row,
/// the favorite edges, the author's profile and the tag rows.
#[derive(Clone)]
pub struct ArticleEngine {
    store: Store,
    identity: Identity,
    favorites: FavoriteGraph,
    tags: TagIndex,
    list_concurrency: usize,
    #[cfg(test)]
    in_flight: std::sync::Arc<InFlight>,
}

/// Counts article enrichments running at the same time.
#[cfg(test)]
#[derive(Debug, Default)]
struct InFlight {
    now: std::sync::atomic::AtomicUsize,
    peak: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl InFlight {
    fn enter(&self) -> InFlightGuard<'_> {
        use std::sync::atomic::Ordering::SeqCst;
        let now = self.now.fetch_add(1, SeqCst) + 1;
        self.peak.fetch_max(now, SeqCst);
        InFlightGuard(self)
    }

    fn peak(&self) -> usize {
        self.peak.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
struct InFlightGuard<'a>(&'a InFlight);

#[cfg(test)]
impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.now.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
    }
}

impl ArticleEngine {
    pub fn new(
        store: Store,
        identity: Identity,
        favorites: FavoriteGraph,
        tags: TagIndex,
        list_concurrency: usize,
    ) -> Self {
        ArticleEngine {
            store,
            identity,
            favorites,
            tags,
            list_concurrency: list_concurrency.max(1),
            #[cfg(test)]
            in_flight: Default::default(),
        }
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Article>, ApiError> {
        let slug = slug.to_string();
        self.store
            .run(move |conn| {
                Ok(articles::table
                    .filter(articles::slug.eq(slug))
                    .select(Article::as_select())
                    .first::<Article>(conn)
                    .optional()?)
            })
            .await
    }

    /// The new article is reported as favorited once, by its author. No
    /// favorite edge is written; later reads show the real edge state.
    pub async fn create(&self, author: &User, details: ArticleDetails) -> Result<ArticleView, ApiError> {
        let slug = slug_for(&details.title);
        if slug.is_empty() {
            return Err(ValidationError::from("title", "must contain letters or digits").into());
        }
        if let Some(existing) = self.find_by_slug(&slug).await? {
            return Err(ApiError::conflict(
                "slug",
                format!("article already exists slug='{}'", existing.slug),
            ));
        }

        let now = utils::now();
        let tag_list = details.tag_list;
        let new_article = NewArticle {
            author_id: author.id,
            slug,
            title: details.title,
            description: details.description,
            body: details.body,
            created_at: now,
            updated_at: now,
        };

        let stored_tags = tag_list.clone();
        let article = self
            .store
            .run(move |conn| {
                conn.transaction::<_, ApiError, _>(|conn| {
                    insert_into(articles::table).values(&new_article).execute(conn)?;
                    let article = articles::table
                        .filter(articles::slug.eq(&new_article.slug))
                        .select(Article::as_select())
                        .first::<Article>(conn)?;
                    let rows: Vec<NewArticleTag> = stored_tags
                        .iter()
                        .enumerate()
                        .map(|(position, tag)| NewArticleTag {
                            article_id: article.id,
                            position: position as i32,
                            tag: tag.as_str(),
                        })
                        .collect();
                    for row in &rows {
                        insert_into(article_tags::table).values(row).execute(conn)?;
                    }
                    Ok(article)
                })
            })
            .await?;

        if !tag_list.is_empty() {
            self.tags.ensure_exist(tag_list.iter().cloned()).await?;
        }
        info!(slug = %article.slug, author = %author.username, "article created");

        let profile = self.identity.profile_for(&author.username, None).await?;
        Ok(ArticleView::from(article, tag_list, profile, 1, true))
    }

    pub async fn get_by_slug(&self, slug: &str, viewer: Option<&User>) -> Result<Option<ArticleView>, ApiError> {
        match self.find_by_slug(slug).await? {
            Some(article) => self.assemble(article, viewer).await.map(Some),
            None => Ok(None),
        }
    }

    /// Matching articles newest first, each enriched with at most
    /// `list_concurrency` articles in flight. Output keeps query order.
    pub async fn list(&self, filters: ArticleFilters, viewer: Option<&User>) -> Result<Vec<ArticleView>, ApiError> {
        let rows = self
            .store
            .run(move |conn| filtered_articles(conn, &filters))
            .await?;

        let pending: Vec<_> = rows
            .into_iter()
            .map(|article| self.assemble(article, viewer))
            .collect();
        stream::iter(pending)
            .buffered(self.list_concurrency)
            .try_collect()
            .await
    }

    /// The four lookups are independent, so they are issued together.
    async fn assemble(&self, article: Article, viewer: Option<&User>) -> Result<ArticleView, ApiError> {
        #[cfg(test)]
        let _running = self.in_flight.enter();
        let (favorites_count, favorited, author, tag_list) = tokio::try_join!(
            self.favorites.count_for_article(article.id),
            self.favorites.is_favorited(viewer.map(|user| user.id), article.id),
            self.identity.author_profile(article.author_id, &article.slug, viewer),
            self.tags.for_article(article.id),
        )?;
        Ok(ArticleView::from(article, tag_list, author, favorites_count, favorited))
    }

    /// The caller has already checked the article exists, so a miss here is
    /// an internal inconsistency rather than a 404.
    pub async fn favorites_count_for(&self, slug: &str) -> Result<i64, ApiError> {
        let article = self.find_by_slug(slug).await?.ok_or_else(|| {
            error!(slug = %slug, "no article for slug");
            ApiError::Inconsistent(format!("article not found slug={}", slug))
        })?;
        self.favorites.count_for_article(article.id).await
    }

    /// Looks up both the article and the user before judging either, and
    /// names whichever is missing.
    pub async fn is_favorited_by(&self, slug: &str, username: &str) -> Result<bool, ApiError> {
        let (user, article) = tokio::try_join!(
            self.identity.find_by_username(username),
            self.find_by_slug(slug),
        )?;
        match (user, article) {
            (Some(user), Some(article)) => self.favorites.is_favorited(Some(user.id), article.id).await,
            (user, article) => {
                let mut missing = Vec::new();
                if user.is_none() {
                    missing.push(format!("user username={}", username));
                }
                if article.is_none() {
                    missing.push(format!("article slug={}", slug));
                }
                let missing = missing.join(" and ");
                error!(slug = %slug, username = %username, "favorite lookup missing {}", missing);
                Err(ApiError::Inconsistent(format!("not found: {}", missing)))
            }
        }
    }

    pub async fn favorite(&self, slug: &str, user: &User) -> Result<ArticleView, ApiError> {
        let article = self.require(slug).await?;
        self.favorites.favorite(user.id, article.id).await?;
        info!(slug = %slug, username = %user.username, "article favorited");
        self.assemble(article, Some(user)).await
    }

    pub async fn unfavorite(&self, slug: &str, user: &User) -> Result<ArticleView, ApiError> {
        let article = self.require(slug).await?;
        self.favorites.unfavorite(user.id, article.id).await?;
        info!(slug = %slug, username = %user.username, "article unfavorited");
        self.assemble(article, Some(user)).await
    }

    async fn require(&self, slug: &str) -> Result<Article, ApiError> {
        self.find_by_slug(slug)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("article {}", slug)))
    }
}

fn filtered_articles(conn: &mut SqliteConnection, filters: &ArticleFilters) -> Result<Vec<Article>, ApiError> {
    let mut query: articles::BoxedQuery<'static, Sqlite> = articles::table.into_boxed();

    if let Some(tag) = &filters.tag {
        let tagged = article_tags::table
            .select(article_tags::article_id)
            .filter(article_tags::tag.eq(tag))
            .load::<i32>(conn)?;
        query = query.filter(articles::id.eq_any(tagged));
    }

    if let Some(author) = &filters.author {
        match user_id(conn, author)? {
            Some(author_id) => query = query.filter(articles::author_id.eq(author_id)),
            None => return Ok(Vec::new()),
        }
    }

    if let Some(fan) = &filters.favorited {
        match user_id(conn, fan)? {
            Some(fan_id) => {
                let favorited = favorites::table
                    .select(favorites::article_id)
                    .filter(favorites::user_id.eq(fan_id))
                    .load::<i32>(conn)?;
                query = query.filter(articles::id.eq_any(favorited));
            }
            None => return Ok(Vec::new()),
        }
    }

    Ok(query
        .order((articles::created_at.desc(), articles::id.desc()))
        .limit(filters.limit)
        .offset(filters.offset)
        .select(Article::as_select())
        .load::<Article>(conn)?)
}

fn user_id(conn: &mut SqliteConnection, username: &str) -> Result<Option<i32>, ApiError> {
    Ok(users::table
        .filter(users::username.eq(username))
        .select(users::id)
        .first::<i32>(conn)
        .optional()?)
}
