use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::concurrency::Versioned;

/// Stored work item. The same field names are used on the wire and in the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, Validate)]
pub struct Item {
    pub id: i64,
    pub created_on: DateTime<Utc>,
    #[validate(length(min = 1, max = 300, message = "must be between 1 and 300 characters"))]
    pub summary: String,
    #[validate(length(min = 1, max = 1000, message = "must be between 1 and 1000 characters"))]
    pub description: String,
    #[validate(length(max = 100, message = "must not be more than 100 characters"))]
    pub priority: String,
    #[validate(length(max = 100, message = "must not be more than 100 characters"))]
    pub status: String,
    #[validate(length(max = 300, message = "must not be more than 300 characters"))]
    pub assigned_to: String,
    #[validate(length(min = 1, max = 200, message = "must be between 1 and 200 characters"))]
    pub category: String,
    #[validate(length(min = 1, max = 200, message = "must be between 1 and 200 characters"))]
    pub department: String,
    #[validate(length(min = 1, max = 300, message = "must be between 1 and 300 characters"))]
    pub created_by: String,
    pub due_on: Option<DateTime<Utc>>,
    pub closed_on: Option<DateTime<Utc>>,
    pub version: i32,
}

impl Versioned for Item {
    fn id(&self) -> i64 {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn set_version(&mut self, version: i32) {
        self.version = version;
    }
}

fn default_priority() -> String {
    "normal".to_string()
}

fn default_status() -> String {
    "open".to_string()
}

/// Create payload. Missing strings decode as empty so validation reports them.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewItem {
    #[serde(default)]
    #[validate(length(min = 1, max = 300, message = "must be between 1 and 300 characters"))]
    pub summary: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 1000, message = "must be between 1 and 1000 characters"))]
    pub description: String,
    #[serde(default = "default_priority")]
    #[validate(length(max = 100, message = "must not be more than 100 characters"))]
    pub priority: String,
    #[serde(default = "default_status")]
    #[validate(length(max = 100, message = "must not be more than 100 characters"))]
    pub status: String,
    #[serde(default)]
    #[validate(length(max = 300, message = "must not be more than 300 characters"))]
    pub assigned_to: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "must be between 1 and 200 characters"))]
    pub category: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "must be between 1 and 200 characters"))]
    pub department: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 300, message = "must be between 1 and 300 characters"))]
    pub created_by: String,
    #[serde(default)]
    pub due_on: Option<DateTime<Utc>>,
}

/// Partial update payload; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemPatch {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub assigned_to: Option<String>,
    pub category: Option<String>,
    pub department: Option<String>,
    pub created_by: Option<String>,
    pub due_on: Option<DateTime<Utc>>,
    pub closed_on: Option<DateTime<Utc>>,
}

impl ItemPatch {
    pub fn apply(self, item: &mut Item) {
        if let Some(v) = self.summary {
            item.summary = v;
        }
        if let Some(v) = self.description {
            item.description = v;
        }
        if let Some(v) = self.priority {
            item.priority = v;
        }
        if let Some(v) = self.status {
            item.status = v;
        }
        if let Some(v) = self.assigned_to {
            item.assigned_to = v;
        }
        if let Some(v) = self.category {
            item.category = v;
        }
        if let Some(v) = self.department {
            item.department = v;
        }
        if let Some(v) = self.created_by {
            item.created_by = v;
        }
        if self.due_on.is_some() {
            item.due_on = self.due_on;
        }
        if self.closed_on.is_some() {
            item.closed_on = self.closed_on;
        }
    }
}

/// Full-text listing filters; empty strings match everything
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub created_by: String,
    pub assigned_to: String,
    pub priority: String,
    pub status: String,
}
