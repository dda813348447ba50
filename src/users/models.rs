use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde_derive::{Deserialize, Serialize};

use crate::db::schema::users;
use crate::profile::Profile;
use crate::utils::serialize_date;

use super::credentials;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub bio: String,
    pub image: Option<String>,
    pub salt: String,
    pub hashed_password: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    pub fn check_password(&self, password: &str) -> bool {
        credentials::verify(password, &self.salt, &self.hashed_password)
    }

    pub fn profile(&self, following: bool) -> Profile {
        Profile {
            username: self.username.clone(),
            bio: self.bio.clone(),
            image: self.image.clone(),
            following,
        }
    }

    /// The shape handed back to the account owner, with their token.
    pub fn with_token(&self, token: String) -> UserResponse {
        UserResponse {
            username: self.username.clone(),
            email: self.email.clone(),
            bio: self.bio.clone(),
            image: self.image.clone(),
            token,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub bio: String,
    pub image: Option<String>,
    pub salt: String,
    pub hashed_password: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl NewUser {
    /// Salts and hashes `password`; timestamps are the insert time.
    pub fn new(username: String, email: String, password: &str, now: NaiveDateTime) -> Self {
        let salt = credentials::generate_salt();
        let hashed_password = credentials::hash(password, &salt);
        NewUser {
            username,
            email,
            bio: String::new(),
            image: None,
            salt,
            hashed_password,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial profile update. Only the `Some` fields are written.
#[derive(Debug, Default, Deserialize)]
pub struct UserPatch {
    pub email: Option<String>,
    pub password: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = users)]
pub struct UserChanges {
    pub email: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub salt: Option<String>,
    pub hashed_password: Option<String>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub username: String,
    pub email: String,
    pub bio: String,
    pub image: Option<String>,
    pub token: String,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: NaiveDateTime,
}
