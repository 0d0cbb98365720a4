pub mod error;
pub mod list_query;
pub mod types;

pub use error::FilterError;
pub use list_query::{ListParams, ListQuery};
pub use types::{SortColumn, SortDirection};
