use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Unknown sort column: {0}")]
    InvalidSortColumn(String),

    #[error("Invalid sort order: {0}")]
    InvalidOrder(String),

    #[error("Limit must be non-negative: {0}")]
    InvalidLimit(i64),

    #[error("Offset must be non-negative: {0}")]
    InvalidOffset(i64),
}
