use chrono::Duration;
use diesel::prelude::*;
use diesel::{insert_into, update};
use tracing::{error, info};

use crate::db::schema::users;
use crate::db::Store;
use crate::follow::FollowGraph;
use crate::profile::Profile;
use crate::types::ApiError;
use crate::utils::{self, non_empty};

use super::credentials;
use super::models::{NewUser, User, UserChanges, UserPatch};
use super::token::TokenService;

/// What a caller supplies to open an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl NewAccount {
    /// Username and email are stored trimmed, so padded lookalikes of an
    /// existing account hit the same unique index.
    pub fn new(username: &str, email: &str, password: String) -> Self {
        NewAccount {
            username: username.trim().to_string(),
            email: email.trim().to_string(),
            password,
        }
    }
}

/// Result of checking an email/password pair against the store.
#[derive(Debug)]
pub enum Credentials {
    Valid(User),
    WrongPassword,
    UnknownEmail,
}

/// Users, their uniqueness rules, and viewer-relative profiles.
#[derive(Clone)]
pub struct Identity {
    store: Store,
    follows: FollowGraph,
}

fn load_by_username(conn: &mut SqliteConnection, name: &str) -> Result<Option<User>, ApiError> {
    Ok(users::table
        .filter(users::username.eq(name))
        .select(User::as_select())
        .first::<User>(conn)
        .optional()?)
}

impl Identity {
    pub fn new(store: Store, follows: FollowGraph) -> Self {
        Identity { store, follows }
    }

    pub async fn find_by_username(&self, name: &str) -> Result<Option<User>, ApiError> {
        let name = name.to_string();
        self.store.run(move |conn| load_by_username(conn, &name)).await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let email = email.to_string();
        self.store
            .run(move |conn| {
                Ok(users::table
                    .filter(users::email.eq(email))
                    .select(User::as_select())
                    .first::<User>(conn)
                    .optional()?)
            })
            .await
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<User>, ApiError> {
        self.store
            .run(move |conn| {
                Ok(users::table
                    .find(id)
                    .select(User::as_select())
                    .first::<User>(conn)
                    .optional()?)
            })
            .await
    }

    /// Fails with `Conflict` when either value is already taken.
    pub async fn ensure_username_and_email_free(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<(), ApiError> {
        if let Some(username) = username {
            if self.find_by_username(username).await?.is_some() {
                return Err(ApiError::conflict(
                    "username",
                    "user with this username already exists",
                ));
            }
        }
        if let Some(email) = email {
            if self.find_by_email(email).await?.is_some() {
                return Err(ApiError::conflict("email", "user with this email already exists"));
            }
        }
        Ok(())
    }

    pub async fn create(&self, account: NewAccount) -> Result<User, ApiError> {
        self.store
            .run(move |conn| conn.transaction::<_, ApiError, _>(|conn| insert_account(conn, account)))
            .await
    }

    /// Creates the account and issues its first token inside one transaction,
    /// so a caller never sees a stored user without a token or the reverse.
    pub async fn register(
        &self,
        account: NewAccount,
        tokens: &TokenService,
        ttl: Duration,
    ) -> Result<(User, String), ApiError> {
        let tokens = tokens.clone();
        let (user, token) = self
            .store
            .run(move |conn| {
                conn.transaction::<_, ApiError, _>(|conn| {
                    let user = insert_account(conn, account)?;
                    let token = tokens.issue(&user.username, Some(ttl))?;
                    Ok((user, token))
                })
            })
            .await?;
        info!(username = %user.username, "user registered");
        Ok((user, token))
    }

    /// Email/password check with a single lookup. Callers decide whether an
    /// unknown email and a wrong password should look different.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Credentials, ApiError> {
        Ok(match self.find_by_email(email.trim()).await? {
            Some(user) if user.check_password(password) => Credentials::Valid(user),
            Some(_) => Credentials::WrongPassword,
            None => Credentials::UnknownEmail,
        })
    }

    /// Writes the non-empty fields of `patch`. A new password gets a new salt.
    pub async fn update(&self, username: &str, patch: UserPatch) -> Result<User, ApiError> {
        let current = self
            .find_by_username(username)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("user {}", username)))?;

        let email = non_empty(patch.email)
            .map(|email| email.trim().to_string())
            .filter(|email| *email != current.email);
        self.ensure_username_and_email_free(None, email.as_deref()).await?;

        let (salt, hashed_password) = match non_empty(patch.password) {
            Some(password) => {
                let salt = credentials::generate_salt();
                let hashed = credentials::hash(&password, &salt);
                (Some(salt), Some(hashed))
            }
            None => (None, None),
        };
        let changes = UserChanges {
            email,
            bio: non_empty(patch.bio),
            image: non_empty(patch.image),
            salt,
            hashed_password,
            updated_at: utils::now(),
        };

        let id = current.id;
        let username = current.username;
        self.store
            .run(move |conn| {
                update(users::table.find(id)).set(&changes).execute(conn)?;
                load_by_username(conn, &username)?.ok_or_else(|| {
                    error!(username = %username, "user vanished during update");
                    ApiError::Inconsistent(format!("user {} missing after update", username))
                })
            })
            .await
    }

    pub async fn is_following(&self, follower: Option<&User>, target: &User) -> Result<bool, ApiError> {
        match follower {
            Some(follower) => self.follows.is_following(follower.id, target.id).await,
            None => Ok(false),
        }
    }

    pub async fn profile_for(&self, target: &str, viewer: Option<&User>) -> Result<Profile, ApiError> {
        let user = self
            .find_by_username(target)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("user {}", target)))?;
        let following = self.is_following(viewer, &user).await?;
        Ok(user.profile(following))
    }

    /// Profile of the author of the article at `slug`. The author row must
    /// exist, a missing one means the store lost a reference.
    pub async fn author_profile(
        &self,
        author_id: i32,
        slug: &str,
        viewer: Option<&User>,
    ) -> Result<Profile, ApiError> {
        let author = self.find_by_id(author_id).await?.ok_or_else(|| {
            error!(author_id, slug = %slug, "article references a missing author");
            ApiError::Inconsistent(format!("author {} of article slug={} not found", author_id, slug))
        })?;
        let following = self.is_following(viewer, &author).await?;
        Ok(author.profile(following))
    }
}

fn insert_account(conn: &mut SqliteConnection, account: NewAccount) -> Result<User, ApiError> {
    let new_user = NewUser::new(
        account.username.trim().to_string(),
        account.email.trim().to_string(),
        &account.password,
        utils::now(),
    );
    insert_into(users::table).values(&new_user).execute(conn)?;
    load_by_username(conn, &new_user.username)?.ok_or_else(|| {
        error!(username = %new_user.username, "inserted user could not be read back");
        ApiError::Inconsistent(format!("user {} missing after insert", new_user.username))
    })
}
