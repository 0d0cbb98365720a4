use serde::Deserialize;

use super::error::FilterError;
use super::types::{SortColumn, SortDirection};

/// Raw, unvalidated card listing parameters as they arrive on the query
/// string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub order: Option<String>,
    pub sort_by: Option<String>,
    pub cat: Option<String>,
    pub tag: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Validated listing parameters. Construction is the only path from client
/// input to the card listing query.
#[derive(Debug, Clone)]
pub struct ListParams {
    pub sort_by: SortColumn,
    pub order: SortDirection,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl ListParams {
    pub fn from_query(query: ListQuery, default_limit: i64, max_limit: i64) -> Result<Self, FilterError> {
        let sort_by = match query.sort_by.as_deref() {
            Some(s) => SortColumn::parse(s)?,
            None => SortColumn::default(),
        };
        let order = match query.order.as_deref() {
            Some(s) => SortDirection::parse(s)?,
            None => SortDirection::default(),
        };

        let limit = query.limit.unwrap_or(default_limit);
        if limit < 0 {
            return Err(FilterError::InvalidLimit(limit));
        }
        let offset = query.offset.unwrap_or(0);
        if offset < 0 {
            return Err(FilterError::InvalidOffset(offset));
        }

        Ok(Self {
            sort_by,
            order,
            category: query.cat,
            tag: query.tag,
            limit: limit.min(max_limit),
            offset,
        })
    }

    /// ORDER BY fragment for the card listing query; `alias` is the card
    /// table alias used by the caller.
    pub fn order_clause(&self, alias: &str) -> String {
        format!("ORDER BY {}.\"{}\" {}", alias, self.sort_by.as_sql(), self.order.to_sql())
    }

    pub fn limit_clause(&self) -> String {
        format!("LIMIT {} OFFSET {}", self.limit, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_created_at_desc() {
        let params = ListParams::from_query(ListQuery::default(), 20, 100).unwrap();
        assert_eq!(params.sort_by, SortColumn::CreatedAt);
        assert_eq!(params.order, SortDirection::Desc);
        assert_eq!(params.limit, 20);
        assert_eq!(params.offset, 0);
    }

    #[test]
    fn unknown_sort_column_is_rejected() {
        let query = ListQuery { sort_by: Some("bogus_column".to_string()), ..Default::default() };
        let err = ListParams::from_query(query, 20, 100).unwrap_err();
        assert!(matches!(err, FilterError::InvalidSortColumn(_)));
    }

    #[test]
    fn order_is_case_insensitive() {
        let query = ListQuery { order: Some("ASC".to_string()), ..Default::default() };
        let params = ListParams::from_query(query, 20, 100).unwrap();
        assert_eq!(params.order, SortDirection::Asc);
    }

    #[test]
    fn limit_is_capped_and_negative_rejected() {
        let query = ListQuery { limit: Some(500), ..Default::default() };
        let params = ListParams::from_query(query, 20, 100).unwrap();
        assert_eq!(params.limit, 100);

        let query = ListQuery { limit: Some(-1), ..Default::default() };
        assert!(matches!(
            ListParams::from_query(query, 20, 100).unwrap_err(),
            FilterError::InvalidLimit(-1)
        ));
    }

    #[test]
    fn order_clause_quotes_the_column() {
        let query = ListQuery {
            sort_by: Some("title".to_string()),
            order: Some("asc".to_string()),
            ..Default::default()
        };
        let params = ListParams::from_query(query, 20, 100).unwrap();
        assert_eq!(params.order_clause("c"), "ORDER BY c.\"title\" ASC");
        assert_eq!(params.limit_clause(), "LIMIT 20 OFFSET 0");
    }
}
