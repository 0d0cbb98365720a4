use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::{info, warn};

use crate::filter::ListParams;

use super::lookup::{get_or_create_category, get_or_create_tag};
use super::models::{Card, CardContent, CardMeta, CardRow, Tag};
use super::StoreError;

pub const TITLE_MAX: usize = 30;
pub const SUBTITLE_MAX: usize = 30;

const CARD_COLUMNS: &str = "c.id, c.title, c.subtitle, c.content, c.owner_id, c.category_id, \
                            cat.cat_name, c.created_at, c.updated_at";

#[derive(Clone)]
pub struct CardStore {
    pool: PgPool,
}

impl CardStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a card with its category and tags resolved in one transaction.
    /// Returns the persisted card with relations populated.
    pub async fn create(&self, owner_id: i64, content: CardContent, meta: CardMeta) -> Result<Card, StoreError> {
        check_content(&content)?;
        let mut tx = self.pool.begin().await?;

        let category = match &meta.category {
            Some(name) => Some(get_or_create_category(&mut *tx, name).await?),
            None => None,
        };

        let mut tags = Vec::new();
        if let Some(names) = &meta.tags {
            for name in dedup_names(names) {
                tags.push(get_or_create_tag(&mut *tx, &name).await?);
            }
        }

        let (id, created_at, updated_at): (i64, DateTime<Utc>, DateTime<Utc>) = sqlx::query_as(
            "INSERT INTO cards (title, subtitle, content, owner_id, category_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id, created_at, updated_at",
        )
        .bind(&content.title)
        .bind(&content.subtitle)
        .bind(&content.content)
        .bind(owner_id)
        .bind(category.as_ref().map(|c| c.id))
        .fetch_one(&mut *tx)
        .await?;

        for tag in &tags {
            sqlx::query("INSERT INTO card_tags (card_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(id)
                .bind(tag.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!("Card {} created for user {}", id, owner_id);

        Ok(Card {
            id,
            title: content.title,
            subtitle: content.subtitle,
            content: content.content,
            owner_id,
            category,
            tags,
            created_at,
            updated_at,
        })
    }

    /// Ownership is part of the lookup predicate: a card belonging to
    /// another user is indistinguishable from a missing one.
    pub async fn get_by_id(&self, card_id: i64, owner_id: i64) -> Result<Card, StoreError> {
        let row = sqlx::query_as::<_, CardRow>(&format!(
            "SELECT {CARD_COLUMNS} FROM cards c \
             LEFT JOIN categories cat ON cat.id = c.category_id \
             WHERE c.id = $1 AND c.owner_id = $2"
        ))
        .bind(card_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound("card not found".to_string()))?;

        let mut tags = self.load_tags(&[card_id]).await?;
        Ok(row.into_card(tags.remove(&card_id).unwrap_or_default()))
    }

    /// Filtered, sorted listing. Category and tag filters compose with AND;
    /// joining the tag relation can multiply rows, hence the DISTINCT.
    pub async fn list(&self, owner_id: i64, params: &ListParams) -> Result<Vec<Card>, StoreError> {
        let mut sql = format!(
            "SELECT DISTINCT {CARD_COLUMNS} FROM cards c \
             LEFT JOIN categories cat ON cat.id = c.category_id"
        );
        if params.tag.is_some() {
            sql.push_str(" JOIN card_tags ct ON ct.card_id = c.id JOIN tags t ON t.id = ct.tag_id");
        }
        sql.push_str(" WHERE c.owner_id = $1");
        if params.category.is_some() {
            sql.push_str(" AND cat.cat_name = $2");
        }
        if params.tag.is_some() {
            let n = if params.category.is_some() { 3 } else { 2 };
            sql.push_str(&format!(" AND t.tag_name = ${}", n));
        }
        sql.push(' ');
        sql.push_str(&params.order_clause("c"));
        sql.push(' ');
        sql.push_str(&params.limit_clause());

        let mut query = sqlx::query_as::<_, CardRow>(&sql).bind(owner_id);
        if let Some(cat) = &params.category {
            query = query.bind(cat);
        }
        if let Some(tag) = &params.tag {
            query = query.bind(tag);
        }

        let rows = query.fetch_all(&self.pool).await?;
        self.assemble(rows).await
    }

    /// Partial update. Returns false when no owned card matches; the content
    /// patch applies only fields that are present, a provided tag list is
    /// the complete desired set, and `updated_at` refreshes either way.
    pub async fn update(
        &self,
        card_id: i64,
        owner_id: i64,
        content: CardContent,
        meta: CardMeta,
    ) -> Result<bool, StoreError> {
        check_content(&content)?;
        let mut tx = self.pool.begin().await?;

        let found = sqlx::query_scalar::<_, i64>("SELECT id FROM cards WHERE id = $1 AND owner_id = $2 FOR UPDATE")
            .bind(card_id)
            .bind(owner_id)
            .fetch_optional(&mut *tx)
            .await?;
        if found.is_none() {
            warn!("Card {} not found for update", card_id);
            return Ok(false);
        }

        if let Some(name) = &meta.category {
            let category = get_or_create_category(&mut *tx, name).await?;
            sqlx::query("UPDATE cards SET category_id = $1 WHERE id = $2")
                .bind(category.id)
                .bind(card_id)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(desired) = &meta.tags {
            reconcile_tags(&mut *tx, card_id, desired).await?;
        }

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE cards SET updated_at = now()");
        if let Some(title) = &content.title {
            builder.push(", title = ").push_bind(title);
        }
        if let Some(subtitle) = &content.subtitle {
            builder.push(", subtitle = ").push_bind(subtitle);
        }
        if let Some(text) = &content.content {
            builder.push(", content = ").push_bind(text);
        }
        builder.push(" WHERE id = ").push_bind(card_id);
        builder.build().execute(&mut *tx).await?;

        tx.commit().await?;
        info!("Card {} updated", card_id);
        Ok(true)
    }

    /// Delete an owned card, returning its last known state
    pub async fn delete(&self, card_id: i64, owner_id: i64) -> Result<Card, StoreError> {
        let card = self.get_by_id(card_id, owner_id).await?;

        let result = sqlx::query("DELETE FROM cards WHERE id = $1 AND owner_id = $2")
            .bind(card_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            warn!("Card {} vanished before delete", card_id);
            return Err(StoreError::NotFound("card not found".to_string()));
        }

        info!("Card {} deleted", card_id);
        Ok(card)
    }

    /// Case-insensitive substring search across title, subtitle, content,
    /// category name and tag name, scoped to the owner.
    pub async fn search(&self, query_text: &str, owner_id: i64) -> Result<Vec<Card>, StoreError> {
        let pattern = format!("%{}%", query_text);

        let rows = sqlx::query_as::<_, CardRow>(&format!(
            "SELECT DISTINCT {CARD_COLUMNS} FROM cards c \
             LEFT JOIN categories cat ON cat.id = c.category_id \
             LEFT JOIN card_tags ct ON ct.card_id = c.id \
             LEFT JOIN tags t ON t.id = ct.tag_id \
             WHERE c.owner_id = $1 AND (c.title ILIKE $2 OR c.subtitle ILIKE $2 \
               OR c.content ILIKE $2 OR cat.cat_name ILIKE $2 OR t.tag_name ILIKE $2)"
        ))
        .bind(owner_id)
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        self.assemble(rows).await
    }

    /// Batch-load tags for a page of cards in one query
    async fn load_tags(&self, card_ids: &[i64]) -> Result<HashMap<i64, Vec<Tag>>, StoreError> {
        if card_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, (i64, i64, String)>(
            "SELECT ct.card_id, t.id, t.tag_name FROM card_tags ct \
             JOIN tags t ON t.id = ct.tag_id WHERE ct.card_id = ANY($1) ORDER BY t.tag_name",
        )
        .bind(card_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_card: HashMap<i64, Vec<Tag>> = HashMap::new();
        for (card_id, id, tag_name) in rows {
            by_card.entry(card_id).or_default().push(Tag { id, tag_name });
        }
        Ok(by_card)
    }

    async fn assemble(&self, rows: Vec<CardRow>) -> Result<Vec<Card>, StoreError> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut tags = self.load_tags(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let card_tags = tags.remove(&row.id).unwrap_or_default();
                row.into_card(card_tags)
            })
            .collect())
    }
}

/// Replace semantics: link the tags newly requested, unlink the ones no
/// longer requested, leave the intersection alone.
async fn reconcile_tags(conn: &mut PgConnection, card_id: i64, desired: &[String]) -> Result<(), StoreError> {
    let current: Vec<Tag> = sqlx::query_as(
        "SELECT t.id, t.tag_name FROM card_tags ct JOIN tags t ON t.id = ct.tag_id WHERE ct.card_id = $1",
    )
    .bind(card_id)
    .fetch_all(&mut *conn)
    .await?;

    let desired_set: HashSet<&str> = desired.iter().map(String::as_str).collect();
    let current_names: HashSet<&str> = current.iter().map(|t| t.tag_name.as_str()).collect();

    for name in desired_set.difference(&current_names) {
        let tag = get_or_create_tag(conn, name).await?;
        sqlx::query("INSERT INTO card_tags (card_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(card_id)
            .bind(tag.id)
            .execute(&mut *conn)
            .await?;
    }

    for tag in current.iter().filter(|t| !desired_set.contains(t.tag_name.as_str())) {
        sqlx::query("DELETE FROM card_tags WHERE card_id = $1 AND tag_id = $2")
            .bind(card_id)
            .bind(tag.id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

fn check_content(content: &CardContent) -> Result<(), StoreError> {
    check_len("title", &content.title, TITLE_MAX)?;
    check_len("subtitle", &content.subtitle, SUBTITLE_MAX)?;
    Ok(())
}

fn check_len(field: &str, value: &Option<String>, max: usize) -> Result<(), StoreError> {
    if let Some(v) = value {
        if v.chars().count() > max {
            return Err(StoreError::InvalidArgument(format!("{} exceeds {} characters", field, max)));
        }
    }
    Ok(())
}

fn dedup_names(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names.iter().filter(|n| seen.insert(n.as_str())).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_tag_names_collapse_preserving_order() {
        let names = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(dedup_names(&names), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn oversized_title_is_invalid() {
        let content = CardContent {
            title: Some("x".repeat(TITLE_MAX + 1)),
            ..Default::default()
        };
        assert!(matches!(check_content(&content), Err(StoreError::InvalidArgument(_))));

        let content = CardContent {
            title: Some("x".repeat(TITLE_MAX)),
            ..Default::default()
        };
        assert!(check_content(&content).is_ok());
    }

    #[test]
    fn absent_fields_are_not_patched() {
        let content = CardContent::default();
        assert!(content.is_empty());
        assert!(check_content(&content).is_ok());
    }
}
