//! Relay wire messages

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// Actions understood by the background process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Read the options record.
    GetOpts,
    /// Flip membership of `category` in the safe list.
    ToggleCategorySafeness,
    /// Add `category` to the safe list.
    MarkCategoryAsSafe,
    /// Remove `category` from the safe list.
    UnmarkCategoryAsSafe,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Self::GetOpts,
        Self::ToggleCategorySafeness,
        Self::MarkCategoryAsSafe,
        Self::UnmarkCategoryAsSafe,
    ];

    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetOpts => "get-opts",
            Self::ToggleCategorySafeness => "toggle-category-safeness",
            Self::MarkCategoryAsSafe => "mark-category-as-safe",
            Self::UnmarkCategoryAsSafe => "unmark-category-as-safe",
        }
    }

    /// Look up an action by wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == name)
    }
}

/// Request sent from a page context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct RelayRequest {
    /// Correlation id. Absent on requests from legacy senders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "number")]
    pub id: Option<u64>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub category: Option<String>,
}

/// Reply sent by the background process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct RelayReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "number")]
    pub id: Option<u64>,
    /// Always equal to the triggering request's action.
    pub action: String,
    /// Action result; `null` for unknown actions and for mutations.
    #[serde(default)]
    #[ts(type = "unknown")]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub error: Option<String>,
}

impl RelayRequest {
    pub fn new(id: u64, action: &str, category: Option<&str>) -> Self {
        Self {
            id: Some(id),
            action: action.to_string(),
            category: category.map(str::to_string),
        }
    }
}

impl RelayReply {
    /// Reply carrying `data` for `request`.
    pub fn to(request: &RelayRequest, data: Value) -> Self {
        Self {
            id: request.id,
            action: request.action.clone(),
            data,
            error: None,
        }
    }

    /// Reply reporting a handler failure for `request`.
    pub fn failed(request: &RelayRequest, error: String) -> Self {
        Self {
            id: request.id,
            action: request.action.clone(),
            data: Value::Null,
            error: Some(error),
        }
    }
}
