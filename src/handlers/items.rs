// Work item handlers: /v1/coltech_items[/:id]
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use validator::Validate;

use super::{bad_json, parse_id};
use crate::app::AppState;
use crate::concurrency::{self, VersionedStore};
use crate::database::models::{Item, ItemFilter, ItemPatch, NewItem};
use crate::database::{Filters, ItemStore};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

pub const EXPECTED_VERSION_HEADER: &str = "x-expected-version";

const SORT_SAFELIST: &[&str] = &[
    "id",
    "created_by",
    "priority",
    "assigned_to",
    "status",
    "-id",
    "-created_by",
    "-priority",
    "-assigned_to",
    "-status",
];

const DEFAULT_PAGE_SIZE: i64 = 20;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub assigned_to: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub status: String,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort: Option<String>,
}

impl ListQuery {
    /// Split into full-text filters and validated paging
    fn into_parts(self) -> Result<(ItemFilter, Filters), ApiError> {
        let mut errors = HashMap::new();
        let page = read_int(self.page.as_deref(), 1, "page", &mut errors);
        let page_size = read_int(self.page_size.as_deref(), DEFAULT_PAGE_SIZE, "page_size", &mut errors);

        let filters = Filters {
            page,
            page_size,
            sort: self.sort.unwrap_or_else(|| "id".to_string()),
            sort_safelist: SORT_SAFELIST,
        };
        for (field, message) in filters.validate() {
            errors.entry(field).or_insert(message);
        }
        if !errors.is_empty() {
            return Err(ApiError::validation_failed(errors));
        }

        let filter = ItemFilter {
            created_by: self.created_by,
            assigned_to: self.assigned_to,
            priority: self.priority,
            status: self.status,
        };
        Ok((filter, filters))
    }
}

fn read_int(raw: Option<&str>, default: i64, key: &str, errors: &mut HashMap<String, String>) -> i64 {
    match raw {
        None | Some("") => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            errors.insert(key.to_string(), "must be an integer value".to_string());
            default
        }),
    }
}

/// `X-Expected-Version`, when the client sent one
fn expected_version(headers: &HeaderMap) -> Result<Option<i32>, ApiError> {
    let Some(value) = headers.get(EXPECTED_VERSION_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<i32>().ok())
        .map(Some)
        .ok_or_else(|| ApiError::bad_request("X-Expected-Version must be an integer"))
}

/// GET /v1/coltech_items
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(query) = query.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let (filter, filters) = query.into_parts()?;

    let (items, metadata) = state.models.items.list(&filter, &filters).await?;

    Ok(ApiResponse::success(json!({
        "coltech_items": items,
        "metadata": metadata,
    })))
}

/// POST /v1/coltech_items
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NewItem>, JsonRejection>,
) -> ApiResult<Item> {
    let Json(input) = payload.map_err(bad_json)?;
    input.validate()?;

    let item = state.models.items.insert(&input).await?;
    tracing::info!(id = item.id, "created coltech item");

    let location = format!("/v1/coltech_items/{}", item.id);
    Ok(ApiResponse::created(item).with_location(location))
}

/// GET /v1/coltech_items/:id
pub async fn show(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Item> {
    let id = parse_id(&id)?;
    let item = state.models.items.fetch(id).await?;
    Ok(ApiResponse::success(item))
}

/// PATCH /v1/coltech_items/:id
///
/// Read, apply the present fields, validate, then write conditionally on the
/// version that was read. A concurrent writer in between yields 409.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<ItemPatch>, JsonRejection>,
) -> ApiResult<Item> {
    let id = parse_id(&id)?;
    let expected = expected_version(&headers)?;
    let Json(patch) = payload.map_err(bad_json)?;

    let item = concurrency::update_with(state.models.items.as_ref(), id, |item: &mut Item| -> Result<(), ApiError> {
        if let Some(expected) = expected {
            if item.version != expected {
                tracing::debug!(id, expected, current = item.version, "stale expected version");
                return Err(ApiError::EditConflict);
            }
        }
        patch.apply(item);
        item.validate()?;
        Ok(())
    })
    .await?;

    Ok(ApiResponse::success(item))
}

/// DELETE /v1/coltech_items/:id
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    state.models.items.delete(id).await?;
    tracing::info!(id, "deleted coltech item");
    Ok(ApiResponse::success(json!({ "message": "coltech item successfully deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::filters::SortDirection;

    fn query(pairs: &[(&str, &str)]) -> ListQuery {
        let encoded = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let uri: axum::http::Uri = format!("/v1/coltech_items?{}", encoded).parse().unwrap();
        Query::<ListQuery>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn test_defaults() {
        let (filter, filters) = query(&[]).into_parts().unwrap();
        assert_eq!(filters.page, 1);
        assert_eq!(filters.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(filters.sort_column(), "id");
        assert!(filter.priority.is_empty());
    }

    #[test]
    fn test_descending_sort_and_filters() {
        let (filter, filters) = query(&[("sort", "-priority"), ("status", "open"), ("priority", "high")])
            .into_parts()
            .unwrap();
        assert_eq!(filters.sort_column(), "priority");
        assert_eq!(filters.sort_direction(), SortDirection::Desc);
        assert_eq!(filter.status, "open");
        assert_eq!(filter.priority, "high");
    }

    #[test]
    fn test_invalid_paging_reports_every_field() {
        let err = query(&[("page", "abc"), ("page_size", "500"), ("sort", "summary")])
            .into_parts()
            .unwrap_err();
        match err {
            ApiError::ValidationFailed { field_errors } => {
                assert_eq!(field_errors["page"], "must be an integer value");
                assert!(field_errors.contains_key("page_size"));
                assert!(field_errors.contains_key("sort"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_expected_version_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(expected_version(&headers).unwrap(), None);
        headers.insert(EXPECTED_VERSION_HEADER, "4".parse().unwrap());
        assert_eq!(expected_version(&headers).unwrap(), Some(4));
        headers.insert(EXPECTED_VERSION_HEADER, "four".parse().unwrap());
        assert!(matches!(expected_version(&headers), Err(ApiError::BadRequest(_))));
    }
}
