use diesel::prelude::*;
use diesel::insert_or_ignore_into;
use rocket::serde::json::Json;
use rocket::State;
use serde_derive::Serialize;
use std::collections::BTreeSet;

use crate::db::schema::{article_tags, tags};
use crate::db::Store;
use crate::state::AppState;
use crate::types::{ApiError, ApiResult};

/// Registry of every tag string ever attached to an article.
#[derive(Clone)]
pub struct TagIndex {
    store: Store,
}

impl TagIndex {
    pub fn new(store: Store) -> Self {
        TagIndex { store }
    }

    /// Inserts the tags that are not registered yet. Existing ones are left
    /// alone, so calling this twice with the same set is harmless.
    pub async fn ensure_exist<I>(&self, names: I) -> Result<(), ApiError>
    where
        I: IntoIterator<Item = String>,
    {
        let wanted: BTreeSet<String> = names.into_iter().collect();
        if wanted.is_empty() {
            return Ok(());
        }
        self.store
            .run(move |conn| {
                conn.transaction::<_, ApiError, _>(|conn| {
                    for tag in wanted {
                        insert_or_ignore_into(tags::table)
                            .values(tags::tag.eq(tag))
                            .execute(conn)?;
                    }
                    Ok(())
                })
            })
            .await
    }

    pub async fn all(&self) -> Result<Vec<String>, ApiError> {
        self.store
            .run(|conn| Ok(tags::table.select(tags::tag).load::<String>(conn)?))
            .await
    }

    /// The ordered tag list of one article, duplicates included.
    pub async fn for_article(&self, article_id: i32) -> Result<Vec<String>, ApiError> {
        self.store
            .run(move |conn| {
                Ok(article_tags::table
                    .filter(article_tags::article_id.eq(article_id))
                    .order((article_tags::position.asc(), article_tags::id.asc()))
                    .select(article_tags::tag)
                    .load::<String>(conn)?)
            })
            .await
    }
}

#[derive(Debug, Serialize)]
pub struct TagsResponse {
    tags: Vec<String>,
}

#[get("/tags")]
pub async fn list(state: &State<AppState>) -> ApiResult<TagsResponse> {
    let tags = state.tags.all().await?;
    Ok(Json(TagsResponse { tags }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_store;

    #[tokio::test]
    async fn ensure_exist_is_idempotent() {
        let (store, _dir) = test_store();
        let index = TagIndex::new(store);

        index
            .ensure_exist(vec!["rust".to_string(), "web".to_string(), "rust".to_string()])
            .await
            .unwrap();
        index
            .ensure_exist(vec!["web".to_string(), "diesel".to_string()])
            .await
            .unwrap();
        index.ensure_exist(Vec::new()).await.unwrap();

        let mut all = index.all().await.unwrap();
        all.sort();
        assert_eq!(all, vec!["diesel", "rust", "web"]);
    }
}
