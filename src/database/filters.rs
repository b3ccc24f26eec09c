use serde::Serialize;
use std::collections::HashMap;

pub const MAX_PAGE: i64 = 10_000_000;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Paging and sort options for a listing
#[derive(Debug, Clone)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
    pub sort_safelist: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl Filters {
    /// Field errors keyed by query parameter; empty when valid
    pub fn validate(&self) -> HashMap<String, String> {
        let mut errors = HashMap::new();

        if self.page <= 0 {
            errors.insert("page".to_string(), "must be greater than zero".to_string());
        } else if self.page > MAX_PAGE {
            errors.insert("page".to_string(), "must be a maximum of 10 million".to_string());
        }

        if self.page_size <= 0 {
            errors.insert("page_size".to_string(), "must be greater than zero".to_string());
        } else if self.page_size > MAX_PAGE_SIZE {
            errors.insert("page_size".to_string(), "must be a maximum of 100".to_string());
        }

        if !self.sort_safelist.contains(&self.sort.as_str()) {
            errors.insert("sort".to_string(), "invalid sort value".to_string());
        }

        errors
    }

    /// Column named by `sort`, taken from the safelist so it is safe to splice into SQL.
    /// Falls back to `id` when `sort` was never validated.
    pub fn sort_column(&self) -> &'static str {
        self.sort_safelist
            .iter()
            .find(|safe| **safe == self.sort)
            .map(|safe| safe.trim_start_matches('-'))
            .unwrap_or("id")
    }

    pub fn sort_direction(&self) -> SortDirection {
        if self.sort.starts_with('-') {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

/// Pagination summary returned alongside a listing. All zero (and serialized
/// as `{}`) when there are no matching records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "is_zero")]
    pub current_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub page_size: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub first_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub last_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub total_records: i64,
}

impl Metadata {
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records == 0 || page_size <= 0 {
            return Self::default();
        }

        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }
}
