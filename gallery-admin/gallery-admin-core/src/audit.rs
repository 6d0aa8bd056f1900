//! Append-only audit log of privileged actions.

use crate::error::{LogError, StoreError};
use crate::identity::Actor;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{error, info};

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// One row of the `logs` table. `user_*` always name the actor.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    pub action: String,
    pub created_at: DateTime<Utc>,
    pub user_name: String,
    pub user_email: String,
}

#[async_trait]
pub trait LogStore: Send + Sync {
    async fn append_log(&self, entry: LogEntry) -> Result<(), StoreError>;
    /// Every entry, newest first.
    async fn list_logs(&self) -> Result<Vec<LogEntry>, StoreError>;
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    CreatedAt,
    UserName,
    UserEmail,
    Action,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LogQuery {
    pub search: Option<String>,
    pub sort: SortField,
    pub direction: SortDirection,
    /// 1-based.
    pub page: usize,
    pub per_page: usize,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            search: None,
            sort: SortField::default(),
            direction: SortDirection::default(),
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct LogPage {
    pub logs: Vec<LogEntry>,
    pub page: usize,
    pub total: usize,
    pub total_pages: usize,
}

#[derive(Clone)]
pub struct ActionLogger {
    store: Arc<dyn LogStore>,
}

impl ActionLogger {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }

    /// Append `action` attributed to `actor`.
    ///
    /// A failure is reported on the operator channel and handed back to the
    /// caller as a warning; whatever triggered the log entry stands.
    pub async fn record(
        &self,
        action: impl Into<String>,
        actor: &Actor,
    ) -> Result<LogEntry, LogError> {
        let entry = LogEntry {
            action: action.into(),
            created_at: Utc::now(),
            user_name: actor.name.clone(),
            user_email: actor.email.clone(),
        };
        match self.store.append_log(entry.clone()).await {
            Ok(()) => {
                info!(actor = %entry.user_email, action = %entry.action, "audit");
                Ok(entry)
            }
            Err(err) => {
                error!(
                    actor = %entry.user_email,
                    action = %entry.action,
                    error = %err,
                    "audit append failed"
                );
                Err(err.into())
            }
        }
    }

    pub async fn query(&self, query: &LogQuery) -> Result<LogPage, StoreError> {
        let logs = self.store.list_logs().await?;
        Ok(paginate(logs, query))
    }
}

fn entry_matches(entry: &LogEntry, needle: &str) -> bool {
    [
        entry.action.as_str(),
        entry.user_name.as_str(),
        entry.user_email.as_str(),
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(needle))
        || entry.created_at.to_rfc3339().to_lowercase().contains(needle)
}

fn compare(a: &LogEntry, b: &LogEntry, field: SortField) -> Ordering {
    match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UserName => a.user_name.cmp(&b.user_name),
        SortField::UserEmail => a.user_email.cmp(&b.user_email),
        SortField::Action => a.action.cmp(&b.action),
    }
}

/// Filter, sort and slice an already-fetched log listing.
pub fn paginate(mut logs: Vec<LogEntry>, query: &LogQuery) -> LogPage {
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let needle = search.to_lowercase();
        logs.retain(|entry| entry_matches(entry, &needle));
    }
    // stable, so ties keep the store's newest-first order
    logs.sort_by(|a, b| match query.direction {
        SortDirection::Asc => compare(a, b, query.sort),
        SortDirection::Desc => compare(b, a, query.sort),
    });

    let per_page = query.per_page.max(1);
    let page = query.page.max(1);
    let total = logs.len();
    let total_pages = total.div_ceil(per_page);
    let logs = logs
        .into_iter()
        .skip((page - 1).saturating_mul(per_page))
        .take(per_page)
        .collect();
    LogPage {
        logs,
        page,
        total,
        total_pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(action: &str, name: &str, minute: u32) -> LogEntry {
        LogEntry {
            action: action.into(),
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, minute, 0).unwrap(),
            user_name: name.into(),
            user_email: format!("{}@example.com", name.to_lowercase()),
        }
    }

    fn sample() -> Vec<LogEntry> {
        (0..25)
            .map(|i| entry(&format!("action {i}"), if i % 2 == 0 { "Ann" } else { "Bob" }, i))
            .collect()
    }

    #[test]
    fn default_query_is_newest_first_first_page() {
        let page = paginate(sample(), &LogQuery::default());
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.logs.len(), DEFAULT_PAGE_SIZE);
        assert_eq!(page.logs[0].action, "action 24");
        assert!(page.logs.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn last_page_is_partial() {
        let query = LogQuery {
            page: 3,
            ..Default::default()
        };
        let page = paginate(sample(), &query);
        assert_eq!(page.logs.len(), 5);
        assert_eq!(page.logs.last().unwrap().action, "action 0");
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let query = LogQuery {
            search: Some("BOB@EXAMPLE".into()),
            per_page: 100,
            ..Default::default()
        };
        let page = paginate(sample(), &query);
        assert_eq!(page.total, 12);
        assert!(page.logs.iter().all(|e| e.user_name == "Bob"));
    }

    #[test]
    fn sort_by_name_ascending() {
        let query = LogQuery {
            sort: SortField::UserName,
            direction: SortDirection::Asc,
            per_page: 100,
            ..Default::default()
        };
        let page = paginate(sample(), &query);
        assert_eq!(page.logs.first().unwrap().user_name, "Ann");
        assert_eq!(page.logs.last().unwrap().user_name, "Bob");
    }

    #[test]
    fn huge_page_number_is_an_empty_page() {
        let query = LogQuery {
            page: usize::MAX,
            per_page: usize::MAX,
            ..Default::default()
        };
        let page = paginate(sample(), &query);
        assert_eq!(page.total, 25);
        assert_eq!(page.page, usize::MAX);
        assert!(page.logs.is_empty());
    }

    #[test]
    fn empty_listing_has_zero_pages() {
        let page = paginate(Vec::new(), &LogQuery::default());
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
        assert!(page.logs.is_empty());
    }
}
