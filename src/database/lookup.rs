use sqlx::PgConnection;
use tracing::warn;

use super::models::{Category, Tag};
use super::{is_unique_violation, StoreError};

/// Category and tag names share the same length limit
pub const NAME_MAX: usize = 12;

fn check_name(kind: &str, name: &str) -> Result<(), StoreError> {
    let len = name.chars().count();
    if len == 0 || len > NAME_MAX {
        return Err(StoreError::InvalidArgument(format!(
            "{} name must be 1-{} characters",
            kind, NAME_MAX
        )));
    }
    Ok(())
}

/// Look up a category by unique name, inserting a new row when absent.
/// Runs inside the caller's transaction; an insert lost to a concurrent
/// transaction surfaces as a retryable `Conflict` from the unique
/// constraint.
pub async fn get_or_create_category(conn: &mut PgConnection, name: &str) -> Result<Category, StoreError> {
    check_name("category", name)?;

    if let Some(category) =
        sqlx::query_as::<_, Category>("SELECT id, cat_name FROM categories WHERE cat_name = $1")
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?
    {
        return Ok(category);
    }

    sqlx::query_as::<_, Category>("INSERT INTO categories (cat_name) VALUES ($1) RETURNING id, cat_name")
        .bind(name)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                warn!("Category {:?} created concurrently", name);
                StoreError::Conflict(format!("category {:?} was created concurrently, retry", name))
            } else {
                StoreError::from(e)
            }
        })
}

pub async fn get_or_create_tag(conn: &mut PgConnection, name: &str) -> Result<Tag, StoreError> {
    check_name("tag", name)?;

    if let Some(tag) = sqlx::query_as::<_, Tag>("SELECT id, tag_name FROM tags WHERE tag_name = $1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
    {
        return Ok(tag);
    }

    sqlx::query_as::<_, Tag>("INSERT INTO tags (tag_name) VALUES ($1) RETURNING id, tag_name")
        .bind(name)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                warn!("Tag {:?} created concurrently", name);
                StoreError::Conflict(format!("tag {:?} was created concurrently, retry", name))
            } else {
                StoreError::from(e)
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_oversized_names_are_rejected() {
        assert!(matches!(check_name("tag", ""), Err(StoreError::InvalidArgument(_))));
        assert!(matches!(
            check_name("category", "much-too-long-name"),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(check_name("tag", "rust").is_ok());
    }

    #[test]
    fn name_limit_counts_characters_not_bytes() {
        let name = "é".repeat(NAME_MAX);
        assert!(name.len() > NAME_MAX);
        assert!(check_name("tag", &name).is_ok());
        assert!(check_name("tag", &"é".repeat(NAME_MAX + 1)).is_err());
    }
}
