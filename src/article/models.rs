use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde_derive::{Deserialize, Serialize};

use crate::db::schema::{article_tags, articles};
use crate::profile::Profile;
use crate::types::{Validate, ValidationError};
use crate::utils::serialize_date;

pub const DEFAULT_LIMIT: i64 = 20;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = articles)]
pub struct Article {
    pub id: i32,
    pub author_id: i32,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = articles)]
pub struct NewArticle {
    pub author_id: i32,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = article_tags)]
pub struct NewArticleTag<'a> {
    pub article_id: i32,
    pub position: i32,
    pub tag: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDetails {
    pub title: String,
    pub description: String,
    pub body: String,
    #[serde(default)]
    pub tag_list: Vec<String>,
}

impl Validate for ArticleDetails {
    fn validate(self) -> Result<Self, ValidationError> {
        let mut error = ValidationError::default();
        if self.body.trim().is_empty() {
            error.add_error("body", "can't be blank");
        }
        if self.title.trim().is_empty() {
            error.add_error("title", "can't be blank");
        }
        if self.description.trim().is_empty() {
            error.add_error("description", "can't be blank");
        }
        if self.tag_list.iter().any(|tag| tag.trim().is_empty()) {
            error.add_error("tagList", "tags can't be blank");
        }
        error.into_result(self)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateArticle {
    pub article: ArticleDetails,
}

/// The viewer-relative article handed to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleView {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: NaiveDateTime,
    pub favorited: bool,
    pub favorites_count: i64,
    pub author: Profile,
}

impl ArticleView {
    pub fn from(
        article: Article,
        tag_list: Vec<String>,
        author: Profile,
        favorites_count: i64,
        favorited: bool,
    ) -> Self {
        ArticleView {
            slug: article.slug,
            title: article.title,
            description: article.description,
            body: article.body,
            tag_list,
            created_at: article.created_at,
            updated_at: article.updated_at,
            favorited,
            favorites_count,
            author,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ArticleResponse {
    pub article: ArticleView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlesResponse {
    pub articles: Vec<ArticleView>,
    pub articles_count: usize,
}

/// Listing constraints. `None` filters are not applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleFilters {
    pub tag: Option<String>,
    pub author: Option<String>,
    pub favorited: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ArticleFilters {
    fn default() -> Self {
        ArticleFilters {
            tag: None,
            author: None,
            favorited: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Validate for ArticleFilters {
    fn validate(self) -> Result<Self, ValidationError> {
        let mut error = ValidationError::default();
        if self.limit <= 0 {
            error.add_error("limit", "must be greater than 0");
        }
        if self.offset < 0 {
            error.add_error("offset", "must be greater than or equal to 0");
        }
        error.into_result(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(title: &str) -> ArticleDetails {
        ArticleDetails {
            title: title.into(),
            description: "d".into(),
            body: "b".into(),
            tag_list: vec!["intro".into()],
        }
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert!(details("Hello World").validate().is_ok());

        let error = details("   ").validate().unwrap_err();
        assert!(error.contains("title"));

        let mut blank_tag = details("Hello");
        blank_tag.tag_list.push(" ".into());
        assert!(blank_tag.validate().unwrap_err().contains("tagList"));
    }

    #[test]
    fn pagination_bounds() {
        assert!(ArticleFilters::default().validate().is_ok());

        let zero = ArticleFilters { limit: 0, ..ArticleFilters::default() };
        assert!(zero.validate().unwrap_err().contains("limit"));

        let negative = ArticleFilters { offset: -1, ..ArticleFilters::default() };
        assert!(negative.validate().unwrap_err().contains("offset"));
    }

    #[test]
    fn tag_list_deserializes_from_camel_case() {
        let parsed: ArticleDetails = serde_json::from_str(
            r#"{"title":"t","description":"d","body":"b","tagList":["a","b"]}"#,
        )
        .unwrap();
        assert_eq!(parsed.tag_list, vec!["a", "b"]);

        let without: ArticleDetails =
            serde_json::from_str(r#"{"title":"t","description":"d","body":"b"}"#).unwrap();
        assert!(without.tag_list.is_empty());
    }
}
