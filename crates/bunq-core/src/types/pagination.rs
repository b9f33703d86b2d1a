/*
[INPUT]:  Navigation links from a paged list response, optional count override
[OUTPUT]: Composable query-string transformers for the next/previous page
[POS]:    Data layer - cursor model for paged list endpoints
[UPDATE]: When pagination field names or link semantics change
*/

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::http::{BunqError, PaginationError};

const NEWER_ID_FIELD: &str = "newer_id";
const OLDER_ID_FIELD: &str = "older_id";
const COUNT_FIELD: &str = "count";

/// Query string of an outgoing request, keyed by parameter name
pub type QueryMap = BTreeMap<String, String>;

type Transform = dyn Fn(&mut QueryMap) -> Result<(), PaginationError> + Send + Sync;

/// A single, independently failing transformation of the query string
#[derive(Clone)]
pub struct QueryParam(Arc<Transform>);

impl QueryParam {
    pub fn new<F>(transform: F) -> Self
    where
        F: Fn(&mut QueryMap) -> Result<(), PaginationError> + Send + Sync + 'static,
    {
        Self(Arc::new(transform))
    }

    /// Sets `name=value`
    pub fn set(name: impl Into<String>, value: impl ToString) -> Self {
        let name = name.into();
        let value = value.to_string();
        Self::new(move |query| {
            query.insert(name.clone(), value.clone());
            Ok(())
        })
    }

    /// A transformer that always fails with `err`
    pub fn failing(err: PaginationError) -> Self {
        Self::new(move |_| Err(err.clone()))
    }

    pub fn apply(&self, query: &mut QueryMap) -> Result<(), PaginationError> {
        (self.0)(query)
    }
}

impl fmt::Debug for QueryParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueryParam(..)")
    }
}

/// Apply `params` left to right, stopping at the first failure
pub fn apply_all(params: &[QueryParam], query: &mut QueryMap) -> Result<(), BunqError> {
    for param in params {
        param.apply(query)?;
    }
    Ok(())
}

/// Limit the number of results per page
pub fn count(count: u32) -> QueryParam {
    QueryParam::set(COUNT_FIELD, count)
}

/// Only return results newer than `id`
pub fn newer_than(id: u64) -> QueryParam {
    QueryParam::set(NEWER_ID_FIELD, id)
}

/// Only return results older than `id`
pub fn older_than(id: u64) -> QueryParam {
    QueryParam::set(OLDER_ID_FIELD, id)
}

/// Navigation links of one paged response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub future_url: Option<String>,
    #[serde(default)]
    pub newer_url: Option<String>,
    #[serde(default)]
    pub older_url: Option<String>,
    #[serde(skip)]
    count_override: Option<u32>,
}

impl Pagination {
    /// True if a newer page exists
    pub fn has_next(&self) -> bool {
        present(&self.newer_url).is_some()
    }

    /// True if there is no newer page yet, but future pages may appear
    pub fn has_future(&self) -> bool {
        present(&self.future_url).is_some()
    }

    /// True if an older page exists
    pub fn has_previous(&self) -> bool {
        present(&self.older_url).is_some()
    }

    /// Override the page size used by derived transformers.
    ///
    /// Takes precedence over any `count` embedded in the server links.
    pub fn set_count(&mut self, count: u32) -> &mut Self {
        self.count_override = Some(count);
        self
    }

    pub fn count_override(&self) -> Option<u32> {
        self.count_override
    }

    /// Query parameters for the next page.
    ///
    /// Uses the newer link, falls back to the future link, and otherwise
    /// yields a transformer that fails with [`PaginationError::NoNextPage`].
    pub fn next_page(&self) -> QueryParam {
        match present(&self.newer_url).or_else(|| present(&self.future_url)) {
            Some(link) => self.page_param(link, NEWER_ID_FIELD),
            None => QueryParam::failing(PaginationError::NoNextPage),
        }
    }

    /// Query parameters for the previous page (older link only).
    pub fn previous_page(&self) -> QueryParam {
        match present(&self.older_url) {
            Some(link) => self.page_param(link, OLDER_ID_FIELD),
            None => QueryParam::failing(PaginationError::NoPreviousPage),
        }
    }

    fn page_param(&self, link: &str, field: &'static str) -> QueryParam {
        let values = match link_query(link) {
            Ok(values) => values,
            Err(reason) => {
                return QueryParam::failing(PaginationError::InvalidLink {
                    link: link.to_string(),
                    reason,
                });
            }
        };

        let Some(id) = values.get(field).cloned() else {
            return QueryParam::failing(PaginationError::NoPaginationId);
        };
        let count = self
            .count_override
            .map(|count| count.to_string())
            .or_else(|| values.get(COUNT_FIELD).cloned());

        QueryParam::new(move |query| {
            query.insert(field.to_string(), id.clone());
            if let Some(count) = &count {
                query.insert(COUNT_FIELD.to_string(), count.clone());
            }
            Ok(())
        })
    }
}

fn present(link: &Option<String>) -> Option<&str> {
    link.as_deref().map(str::trim).filter(|link| !link.is_empty())
}

/// Links are usually relative (`/v1/user/1/...?newer_id=2`); resolve them
/// against a placeholder origin just to read the query.
fn link_query(link: &str) -> Result<QueryMap, String> {
    let base = Url::parse("http://localhost/").map_err(|e| e.to_string())?;
    let url = base.join(link).map_err(|e| e.to_string())?;
    Ok(url.query_pairs().into_owned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applied(param: &QueryParam) -> Result<QueryMap, PaginationError> {
        let mut query = QueryMap::new();
        param.apply(&mut query)?;
        Ok(query)
    }

    fn map(pairs: &[(&str, &str)]) -> QueryMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_next_page_uses_newer_link() {
        let pagination = Pagination {
            newer_url: Some("/v1/user/1/monetary-account/2/payment?count=10&newer_id=42".into()),
            ..Default::default()
        };

        let query = applied(&pagination.next_page()).unwrap();
        assert_eq!(query, map(&[("newer_id", "42"), ("count", "10")]));
    }

    #[test]
    fn test_count_override_wins_over_link() {
        let mut pagination = Pagination {
            newer_url: Some("/v1/user/1/monetary-account/2/payment?count=10&newer_id=42".into()),
            ..Default::default()
        };
        pagination.set_count(5);

        let query = applied(&pagination.next_page()).unwrap();
        assert_eq!(query, map(&[("newer_id", "42"), ("count", "5")]));
    }

    #[test]
    fn test_override_applies_when_link_has_no_count() {
        let mut pagination = Pagination {
            older_url: Some("/v1/user/1/monetary-account/2/payment?older_id=7".into()),
            ..Default::default()
        };
        pagination.set_count(25);

        let query = applied(&pagination.previous_page()).unwrap();
        assert_eq!(query, map(&[("older_id", "7"), ("count", "25")]));
    }

    #[test]
    fn test_next_page_without_links_fails_on_apply() {
        let pagination = Pagination::default();
        let param = pagination.next_page();
        assert_eq!(applied(&param), Err(PaginationError::NoNextPage));
    }

    #[test]
    fn test_next_page_falls_back_to_future_link() {
        let pagination = Pagination {
            future_url: Some("/v1/user/1/monetary-account/2/payment?count=200&newer_id=99".into()),
            older_url: Some("/v1/user/1/monetary-account/2/payment?count=200&older_id=1".into()),
            ..Default::default()
        };
        assert!(!pagination.has_next());
        assert!(pagination.has_future());

        let query = applied(&pagination.next_page()).unwrap();
        assert_eq!(query, map(&[("newer_id", "99"), ("count", "200")]));
    }

    #[test]
    fn test_previous_page_has_no_fallback() {
        let pagination = Pagination {
            future_url: Some("/v1/payment?newer_id=99".into()),
            newer_url: Some("/v1/payment?newer_id=98".into()),
            ..Default::default()
        };
        assert_eq!(
            applied(&pagination.previous_page()),
            Err(PaginationError::NoPreviousPage)
        );
    }

    #[test]
    fn test_link_without_id_fails() {
        let pagination = Pagination {
            newer_url: Some("/v1/payment?count=10".into()),
            ..Default::default()
        };
        assert_eq!(
            applied(&pagination.next_page()),
            Err(PaginationError::NoPaginationId)
        );
    }

    #[test]
    fn test_transformer_does_not_observe_later_cursor_changes() {
        let mut pagination = Pagination {
            newer_url: Some("/v1/payment?count=10&newer_id=42".into()),
            ..Default::default()
        };
        let param = pagination.next_page();
        pagination.set_count(3);
        pagination.newer_url = None;

        let query = applied(&param).unwrap();
        assert_eq!(query, map(&[("newer_id", "42"), ("count", "10")]));
        assert_eq!(pagination.count_override(), Some(3));
    }

    #[test]
    fn test_apply_all_stops_at_first_failure() {
        let params = vec![
            count(10),
            Pagination::default().previous_page(),
            newer_than(5),
        ];
        let mut query = QueryMap::new();

        let err = apply_all(&params, &mut query).unwrap_err();
        assert!(matches!(
            err,
            BunqError::Pagination(PaginationError::NoPreviousPage)
        ));
        assert_eq!(query, map(&[("count", "10")]));
    }

    #[test]
    fn test_helpers_compose_left_to_right() {
        let params = vec![count(10), older_than(3), count(50)];
        let mut query = QueryMap::new();
        apply_all(&params, &mut query).unwrap();
        assert_eq!(query, map(&[("count", "50"), ("older_id", "3")]));
    }

    #[test]
    fn test_deserialize_null_links() {
        let pagination: Pagination = serde_json::from_str(
            r#"{"future_url":null,"newer_url":null,"older_url":"/v1/payment?older_id=1"}"#,
        )
        .unwrap();
        assert!(!pagination.has_next());
        assert!(pagination.has_previous());
    }
}
