//! Query parameters and paginated query responses.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::event::Event;
use crate::error::{HyreLogError, Result};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 20;

/// Filters for event queries. All set filters are combined with AND.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryOptions {
    /// 1-indexed page number
    pub page: u32,
    /// Items per page
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            from: None,
            to: None,
            action: None,
            category: None,
            actor_id: None,
            actor_email: None,
            workspace_id: None,
            project_id: None,
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn from_date(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn to_date(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn actor_id(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn actor_email(mut self, actor_email: impl Into<String>) -> Self {
        self.actor_email = Some(actor_email.into());
        self
    }

    pub fn workspace_id(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = Some(workspace_id.into());
        self
    }

    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.page < 1 {
            return Err(HyreLogError::validation("page", "must be at least 1"));
        }
        if self.limit < 1 {
            return Err(HyreLogError::validation("limit", "must be at least 1"));
        }
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(HyreLogError::validation("from", "must not be after `to`"));
            }
        }
        Ok(())
    }

    /// Query-string pairs using the wire's camelCase names. Unset filters are skipped.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".to_string(), self.page.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ];
        let dates = [("from", self.from), ("to", self.to)];
        for (key, date) in dates {
            if let Some(date) = date {
                pairs.push((
                    key.to_string(),
                    date.to_rfc3339_opts(SecondsFormat::Millis, true),
                ));
            }
        }
        let filters = [
            ("action", &self.action),
            ("category", &self.category),
            ("actorId", &self.actor_id),
            ("actorEmail", &self.actor_email),
            ("workspaceId", &self.workspace_id),
            ("projectId", &self.project_id),
        ];
        for (key, value) in filters {
            if let Some(value) = value {
                pairs.push((key.to_string(), value.clone()));
            }
        }
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    /// Pagination for `total` matches, `ceil(total / limit)` pages.
    pub fn compute(page: u32, limit: u32, total: u64) -> Self {
        let limit_u64 = u64::from(limit.max(1));
        Self {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit_u64),
        }
    }
}

/// One page of events, newest first by `createdAt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub data: Vec<Event>,
    pub pagination: Pagination,
    /// Set when the service truncated results to the plan's retention window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_applied: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_window_start: Option<String>,
}

impl QueryResponse {
    /// Validate the response shape and parse it.
    pub fn from_value(value: Value) -> Result<Self> {
        let excerpt_src = value.to_string();
        let obj = value
            .as_object()
            .ok_or_else(|| HyreLogError::malformed("query response is not an object", &excerpt_src))?;
        match obj.get("data") {
            Some(Value::Array(_)) => {}
            _ => {
                return Err(HyreLogError::malformed(
                    "query response `data` is not an array",
                    &excerpt_src,
                ))
            }
        }
        if !obj.contains_key("pagination") {
            return Err(HyreLogError::malformed(
                "query response has no `pagination`",
                &excerpt_src,
            ));
        }
        serde_json::from_value(value).map_err(|e| {
            HyreLogError::malformed(format!("invalid query response: {}", e), &excerpt_src)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn has_next_page(&self) -> bool {
        u64::from(self.pagination.page) < self.pagination.total_pages
    }
}
