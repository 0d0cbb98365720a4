use super::error::FilterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn parse(s: &str) -> Result<Self, FilterError> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(FilterError::InvalidOrder(other.to_string())),
        }
    }

    pub fn to_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// The sortable columns of the card table. Anything else is rejected before
/// SQL generation, so sort input can never reach the query as raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    Id,
    Title,
    Subtitle,
    Content,
    OwnerId,
    CategoryId,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl SortColumn {
    pub fn parse(s: &str) -> Result<Self, FilterError> {
        match s {
            "id" => Ok(SortColumn::Id),
            "title" => Ok(SortColumn::Title),
            "subtitle" => Ok(SortColumn::Subtitle),
            "content" => Ok(SortColumn::Content),
            "owner_id" => Ok(SortColumn::OwnerId),
            "category_id" => Ok(SortColumn::CategoryId),
            "created_at" => Ok(SortColumn::CreatedAt),
            "updated_at" => Ok(SortColumn::UpdatedAt),
            other => Err(FilterError::InvalidSortColumn(other.to_string())),
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortColumn::Id => "id",
            SortColumn::Title => "title",
            SortColumn::Subtitle => "subtitle",
            SortColumn::Content => "content",
            SortColumn::OwnerId => "owner_id",
            SortColumn::CategoryId => "category_id",
            SortColumn::CreatedAt => "created_at",
            SortColumn::UpdatedAt => "updated_at",
        }
    }
}
