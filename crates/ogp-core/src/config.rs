//! Configuration
//!
//! Every marker the engine reads from or writes into the host page, plus the
//! timing of polling waits. All fields default to the values the live host
//! page uses, so a partial JSON document only needs to name what differs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::options::UNCATEGORIZED;
use crate::wait::{WaitPolicy, DEFAULT_INTERVAL, DEFAULT_TIMEOUT};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Poll interval must be non-zero")]
    ZeroInterval,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub markers: Markers,
    /// Waits inside bulk remediation.
    pub wait: WaitSettings,
    /// Wait for the host list to exist before the first pass.
    pub startup: WaitSettings,
    /// Queue one follow-up pass for host mutations that arrive mid-pass.
    /// When false, such mutations are dropped.
    pub coalesce_mutations: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            markers: Markers::default(),
            wait: WaitSettings::default(),
            startup: WaitSettings {
                interval_ms: DEFAULT_INTERVAL.as_millis() as u64,
                timeout_ms: None,
            },
            coalesce_mutations: true,
        }
    }
}

impl Config {
    /// Parse a (possibly partial) JSON config.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wait.interval_ms == 0 || self.startup.interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}

/// Poll timing in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WaitSettings {
    pub interval_ms: u64,
    /// `null` waits without bound.
    pub timeout_ms: Option<u64>,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL.as_millis() as u64,
            timeout_ms: Some(DEFAULT_TIMEOUT.as_millis() as u64),
        }
    }
}

impl WaitSettings {
    pub fn policy(&self) -> WaitPolicy {
        WaitPolicy {
            interval: Duration::from_millis(self.interval_ms),
            timeout: self.timeout_ms.map(Duration::from_millis),
        }
    }
}

/// All DOM markers, grouped by owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Markers {
    pub host: HostMarkers,
    pub injected: InjectedMarkers,
    pub popup: PopupMarkers,
}

/// Markers owned by the host page. Read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HostMarkers {
    pub list_container_id: String,
    pub list_title_id: String,
    pub category_header_class: String,
    pub category_container_class: String,
    pub list_item_class: String,
    pub item_value_class: String,
    pub edit_class: String,
    pub dialog_tag: String,
    pub category_label: String,
    pub submit_class: String,
    pub uncategorized_value: String,
    pub settings_dialog_class: String,
    pub danger_button_class: String,
    pub delete_label: String,
    /// Display name of the catch-all category.
    pub uncategorized: String,
    /// Query parameter present on the categories settings page.
    pub categories_page_param: String,
    /// List title of the categories settings page.
    pub categories_page_title: String,
}

impl Default for HostMarkers {
    fn default() -> Self {
        Self {
            list_container_id: "listDiv".to_string(),
            list_title_id: "listName".to_string(),
            category_header_class: "category-header".to_string(),
            category_container_class: "category-container".to_string(),
            list_item_class: "list-item".to_string(),
            item_value_class: "value".to_string(),
            edit_class: "edit".to_string(),
            dialog_tag: "dialog".to_string(),
            category_label: "Category:".to_string(),
            submit_class: "submit-button".to_string(),
            uncategorized_value: "uncategorized".to_string(),
            settings_dialog_class: "ui-dialog".to_string(),
            danger_button_class: "danger-button".to_string(),
            delete_label: "Delete Category".to_string(),
            uncategorized: UNCATEGORIZED.to_string(),
            categories_page_param: "fromShoppingListId".to_string(),
            categories_page_title: "Categories".to_string(),
        }
    }
}

/// Markers this extension injects. Must not collide with host markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InjectedMarkers {
    pub checkbox_container_class: String,
    pub checkbox_class: String,
    pub button_container_class: String,
    pub checkbox_label: String,
    pub button_label: String,
    pub icon_path: String,
}

impl Default for InjectedMarkers {
    fn default() -> Self {
        Self {
            checkbox_container_class: "og+-checkbox-container".to_string(),
            checkbox_class: "og+-checkbox".to_string(),
            button_container_class: "og+-button-container".to_string(),
            checkbox_label: "Safe".to_string(),
            button_label: " Remove categories that haven't been marked as 'safe'".to_string(),
            icon_path: "/res/icon/48.png".to_string(),
        }
    }
}

impl InjectedMarkers {
    /// Classes of the top-level fragments this extension inserts.
    pub fn fragment_classes(&self) -> [&str; 2] {
        [self.checkbox_container_class.as_str(), self.button_container_class.as_str()]
    }
}

/// Markers of the popup page, which this extension owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PopupMarkers {
    pub loading_id: String,
    pub loaded_id: String,
    pub list_id: String,
    pub empty_id: String,
    pub row_class: String,
    pub delete_class: String,
}

impl Default for PopupMarkers {
    fn default() -> Self {
        Self {
            loading_id: "loading".to_string(),
            loaded_id: "loaded".to_string(),
            list_id: "safe-category-list".to_string(),
            empty_id: "safe-category-list-empty".to_string(),
            row_class: "category".to_string(),
            delete_class: "delete-btn".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_json(
            r#"{"markers": {"host": {"listContainerId": "list"}}, "wait": {"timeoutMs": null}}"#,
        )
        .unwrap();
        assert_eq!(config.markers.host.list_container_id, "list");
        assert_eq!(config.markers.host.category_header_class, "category-header");
        assert_eq!(config.wait.interval_ms, 250);
        assert_eq!(config.wait.policy().timeout, None);
        assert!(config.coalesce_mutations);
    }

    #[test]
    fn test_default_policies() {
        let config = Config::default();
        assert_eq!(config.wait.policy(), WaitPolicy::default());
        assert_eq!(config.startup.policy(), WaitPolicy::unbounded(DEFAULT_INTERVAL));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = Config::from_json(r#"{"wait": {"intervalMs": 0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroInterval));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(Config::from_json("{"), Err(ConfigError::Parse(_))));
    }
}
