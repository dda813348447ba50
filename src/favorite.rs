use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::{delete, insert_or_ignore_into, select};

use crate::db::schema::favorites;
use crate::db::Store;
use crate::types::ApiError;

/// `(user, article)` favorite edges. Counts are always computed from the
/// edges at read time, never cached on the article.
#[derive(Clone)]
pub struct FavoriteGraph {
    store: Store,
}

impl FavoriteGraph {
    pub fn new(store: Store) -> Self {
        FavoriteGraph { store }
    }

    pub async fn count_for_article(&self, article_id: i32) -> Result<i64, ApiError> {
        self.store
            .run(move |conn| {
                Ok(favorites::table
                    .filter(favorites::article_id.eq(article_id))
                    .count()
                    .get_result::<i64>(conn)?)
            })
            .await
    }

    pub async fn is_favorited(&self, user_id: Option<i32>, article_id: i32) -> Result<bool, ApiError> {
        let user_id = match user_id {
            Some(id) => id,
            None => return Ok(false),
        };
        self.store
            .run(move |conn| {
                let edge = favorites::table
                    .filter(favorites::user_id.eq(user_id))
                    .filter(favorites::article_id.eq(article_id));
                Ok(select(exists(edge)).get_result::<bool>(conn)?)
            })
            .await
    }

    pub async fn favorite(&self, user_id: i32, article_id: i32) -> Result<(), ApiError> {
        self.store
            .run(move |conn| {
                insert_or_ignore_into(favorites::table)
                    .values((
                        favorites::user_id.eq(user_id),
                        favorites::article_id.eq(article_id),
                    ))
                    .execute(conn)?;
                Ok(())
            })
            .await
    }

    pub async fn unfavorite(&self, user_id: i32, article_id: i32) -> Result<(), ApiError> {
        self.store
            .run(move |conn| {
                delete(
                    favorites::table
                        .filter(favorites::user_id.eq(user_id))
                        .filter(favorites::article_id.eq(article_id)),
                )
                .execute(conn)?;
                Ok(())
            })
            .await
    }
}
