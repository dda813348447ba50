use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::{delete, insert_or_ignore_into, select};
use tracing::debug;

use crate::db::schema::followers;
use crate::db::Store;
use crate::types::ApiError;

/// Directed `follower -> following` edges between users.
#[derive(Clone)]
pub struct FollowGraph {
    store: Store,
}

impl FollowGraph {
    pub fn new(store: Store) -> Self {
        FollowGraph { store }
    }

    pub async fn is_following(&self, follower: i32, target: i32) -> Result<bool, ApiError> {
        self.store
            .run(move |conn| {
                let edge = followers::table
                    .filter(followers::follower_id.eq(follower))
                    .filter(followers::following_id.eq(target));
                Ok(select(exists(edge)).get_result::<bool>(conn)?)
            })
            .await
    }

    pub async fn count_following(&self, follower: i32) -> Result<i64, ApiError> {
        self.store
            .run(move |conn| {
                Ok(followers::table
                    .filter(followers::follower_id.eq(follower))
                    .count()
                    .get_result::<i64>(conn)?)
            })
            .await
    }

    pub async fn count_followers(&self, target: i32) -> Result<i64, ApiError> {
        self.store
            .run(move |conn| {
                Ok(followers::table
                    .filter(followers::following_id.eq(target))
                    .count()
                    .get_result::<i64>(conn)?)
            })
            .await
    }

    /// Idempotent; following yourself is refused.
    pub async fn follow(&self, follower: i32, target: i32) -> Result<(), ApiError> {
        if follower == target {
            return Err(ApiError::conflict("username", "cannot follow yourself"));
        }
        self.store
            .run(move |conn| {
                insert_or_ignore_into(followers::table)
                    .values((
                        followers::follower_id.eq(follower),
                        followers::following_id.eq(target),
                    ))
                    .execute(conn)?;
                Ok(())
            })
            .await?;
        debug!(follower, target, "follow edge stored");
        Ok(())
    }

    pub async fn unfollow(&self, follower: i32, target: i32) -> Result<(), ApiError> {
        self.store
            .run(move |conn| {
                delete(
                    followers::table
                        .filter(followers::follower_id.eq(follower))
                        .filter(followers::following_id.eq(target)),
                )
                .execute(conn)?;
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_store;
    use crate::users::identity::tests::seed_user;

    #[tokio::test]
    async fn edges_are_directed_and_unique() {
        let (store, _dir) = test_store();
        let graph = FollowGraph::new(store.clone());
        let alice = seed_user(&store, "alice").await;
        let bob = seed_user(&store, "bob").await;

        assert!(!graph.is_following(bob.id, alice.id).await.unwrap());

        graph.follow(bob.id, alice.id).await.unwrap();
        graph.follow(bob.id, alice.id).await.unwrap();

        assert!(graph.is_following(bob.id, alice.id).await.unwrap());
        assert!(!graph.is_following(alice.id, bob.id).await.unwrap());
        assert_eq!(graph.count_followers(alice.id).await.unwrap(), 1);
        assert_eq!(graph.count_following(bob.id).await.unwrap(), 1);
        assert_eq!(graph.count_following(alice.id).await.unwrap(), 0);

        graph.unfollow(bob.id, alice.id).await.unwrap();
        assert!(!graph.is_following(bob.id, alice.id).await.unwrap());
        assert_eq!(graph.count_followers(alice.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn self_follow_is_refused() {
        let (store, _dir) = test_store();
        let graph = FollowGraph::new(store.clone());
        let alice = seed_user(&store, "alice").await;

        let result = graph.follow(alice.id, alice.id).await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));
        assert!(!graph.is_following(alice.id, alice.id).await.unwrap());
    }
}
