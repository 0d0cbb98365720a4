use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{Category, Tag};

/// Fully-populated card value object. Relations are loaded by explicit
/// queries in the store, never lazily across a request boundary.
#[derive(Debug, Clone, Serialize)]
pub struct Card {
    pub id: i64,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub content: Option<String>,
    pub owner_id: i64,
    pub category: Option<Category>,
    pub tags: Vec<Tag>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Flat row shape produced by the card/category join
#[derive(Debug, Clone, FromRow)]
pub struct CardRow {
    pub id: i64,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub content: Option<String>,
    pub owner_id: i64,
    pub category_id: Option<i64>,
    pub cat_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CardRow {
    pub fn into_card(self, tags: Vec<Tag>) -> Card {
        let category = match (self.category_id, self.cat_name) {
            (Some(id), Some(cat_name)) => Some(Category { id, cat_name }),
            _ => None,
        };

        Card {
            id: self.id,
            title: self.title,
            subtitle: self.subtitle,
            content: self.content,
            owner_id: self.owner_id,
            category,
            tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Card content fields, used both for creation and as a partial patch.
/// When patching, only present fields are applied; an absent field never
/// overwrites an existing value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardContent {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub content: Option<String>,
}

impl CardContent {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.subtitle.is_none() && self.content.is_none()
    }
}

/// Category/tag attachment for create and update. A present `tags` list is
/// the complete desired set; an absent list leaves existing tags untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardMeta {
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_without_category_yields_none() {
        let row = CardRow {
            id: 1,
            title: Some("t".to_string()),
            subtitle: None,
            content: None,
            owner_id: 2,
            category_id: None,
            cat_name: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let card = row.into_card(vec![]);
        assert!(card.category.is_none());
        assert!(card.tags.is_empty());
    }

    #[test]
    fn row_with_category_populates_it() {
        let row = CardRow {
            id: 1,
            title: None,
            subtitle: None,
            content: None,
            owner_id: 2,
            category_id: Some(9),
            cat_name: Some("work".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let card = row.into_card(vec![Tag { id: 3, tag_name: "x".to_string() }]);
        assert_eq!(card.category, Some(Category { id: 9, cat_name: "work".to_string() }));
        assert_eq!(card.tags.len(), 1);
    }
}
