diesel::table! {
    articles (id) {
        id -> Integer,
        author_id -> Integer,
        slug -> Text,
        title -> Text,
        description -> Text,
        body -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    article_tags (id) {
        id -> Integer,
        article_id -> Integer,
        position -> Integer,
        tag -> Text,
    }
}

diesel::table! {
    favorites (id) {
        id -> Integer,
        user_id -> Integer,
        article_id -> Integer,
    }
}

diesel::table! {
    followers (id) {
        id -> Integer,
        follower_id -> Integer,
        following_id -> Integer,
    }
}

diesel::table! {
    tags (id) {
        id -> Integer,
        tag -> Text,
    }
}

diesel::table! {
    users (id) {
        id -> Integer,
        username -> Text,
        email -> Text,
        bio -> Text,
        image -> Nullable<Text>,
        salt -> Text,
        hashed_password -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    articles,
    article_tags,
    favorites,
    followers,
    tags,
    users,
);

pub(crate) const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    username TEXT NOT NULL,
    email TEXT NOT NULL,
    bio TEXT NOT NULL DEFAULT '',
    image TEXT,
    salt TEXT NOT NULL,
    hashed_password TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL,
    updated_at TIMESTAMP NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS users_username_key ON users (username);
CREATE UNIQUE INDEX IF NOT EXISTS users_email_key ON users (email);

CREATE TABLE IF NOT EXISTS followers (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    follower_id INTEGER NOT NULL REFERENCES users (id),
    following_id INTEGER NOT NULL REFERENCES users (id)
);
CREATE UNIQUE INDEX IF NOT EXISTS followers_pair_key ON followers (follower_id, following_id);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    tag TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS tags_tag_key ON tags (tag);

CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    author_id INTEGER NOT NULL REFERENCES users (id),
    slug TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    body TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL,
    updated_at TIMESTAMP NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS articles_slug_key ON articles (slug);

CREATE TABLE IF NOT EXISTS article_tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    article_id INTEGER NOT NULL REFERENCES articles (id),
    position INTEGER NOT NULL,
    tag TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS article_tags_article_idx ON article_tags (article_id);
CREATE INDEX IF NOT EXISTS article_tags_tag_idx ON article_tags (tag);

CREATE TABLE IF NOT EXISTS favorites (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users (id),
    article_id INTEGER NOT NULL REFERENCES articles (id)
);
CREATE UNIQUE INDEX IF NOT EXISTS favorites_pair_key ON favorites (user_id, article_id);
"#;
