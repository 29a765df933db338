//! Category registry.
//!
//! Built once at startup from a JSON payload mapping category keys to ordered
//! lists of item records. A broken payload never aborts startup: `Registry::load`
//! hands back an empty registry together with the reason so the menu can show it.

use crate::model::{InvocationTarget, LaunchableItem};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no script list configured (set SCRIPTS_LIST or pass --registry-file)")]
    Missing,

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in script list: {0}")]
    Json(#[from] serde_json::Error),

    #[error("script list must be a JSON object mapping categories to lists")]
    NotAnObject,

    #[error("category '{category}' must be a list of script records")]
    NotAList { category: String },

    #[error("category '{category}', item {index}: {reason}")]
    InvalidItem {
        category: String,
        index: usize,
        reason: String,
    },
}

/// One record as written in the configuration payload.
#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(alias = "display_name")]
    name: Option<String>,
    module: Option<String>,
    path: Option<PathBuf>,
    program: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    open: Option<String>,
    timeout: Option<String>,
}

impl RawItem {
    fn into_item(self) -> Result<LaunchableItem, String> {
        let display_name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| "missing or empty \"name\"".to_string())?;

        let mut targets = Vec::new();
        if let Some(module) = self.module {
            targets.push(InvocationTarget::Module { module });
        }
        if let Some(path) = self.path {
            targets.push(InvocationTarget::Script { path });
        }
        if let Some(program) = self.program {
            targets.push(InvocationTarget::Program {
                program,
                args: self.args,
            });
        } else if !self.args.is_empty() {
            return Err("\"args\" requires \"program\"".into());
        }
        if let Some(target) = self.open {
            targets.push(InvocationTarget::Open { target });
        }

        let target = match targets.len() {
            0 => return Err("needs one of \"module\", \"path\", \"program\" or \"open\"".into()),
            1 => targets.remove(0),
            _ => {
                return Err(
                    "only one of \"module\", \"path\", \"program\" or \"open\" may be set".into(),
                )
            }
        };

        let timeout = self
            .timeout
            .map(|t| humantime::parse_duration(&t).map_err(|e| format!("bad timeout '{t}': {e}")))
            .transpose()?;
        if timeout == Some(Duration::ZERO) {
            return Err("timeout must be greater than zero".into());
        }

        Ok(LaunchableItem {
            display_name,
            target,
            timeout,
        })
    }
}

#[derive(Debug, Clone)]
struct Category {
    key: String,
    items: Vec<LaunchableItem>,
}

/// Read-only mapping from category key to its ordered items.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    categories: Vec<Category>,
}

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a JSON payload. Category order follows the payload.
    pub fn from_json(payload: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(payload)?;
        let map = value.as_object().ok_or(ConfigError::NotAnObject)?;

        let mut categories = Vec::with_capacity(map.len());
        for (key, list) in map {
            let records = list.as_array().ok_or_else(|| ConfigError::NotAList {
                category: key.clone(),
            })?;
            let mut items = Vec::with_capacity(records.len());
            for (index, record) in records.iter().enumerate() {
                let raw: RawItem = serde_json::from_value(record.clone()).map_err(|e| {
                    ConfigError::InvalidItem {
                        category: key.clone(),
                        index,
                        reason: e.to_string(),
                    }
                })?;
                let item = raw.into_item().map_err(|reason| ConfigError::InvalidItem {
                    category: key.clone(),
                    index,
                    reason,
                })?;
                items.push(item);
            }
            categories.push(Category {
                key: key.clone(),
                items,
            });
        }

        Ok(Self { categories })
    }

    /// Build from an optional payload, degrading to an empty registry on any error.
    pub fn load(payload: Option<&str>) -> (Self, Option<ConfigError>) {
        let res = match payload {
            Some(p) if !p.trim().is_empty() => Self::from_json(p),
            _ => Err(ConfigError::Missing),
        };
        match res {
            Ok(reg) => {
                info!(
                    categories = reg.categories.len(),
                    items = reg.item_count(),
                    "registry loaded"
                );
                (reg, None)
            }
            Err(e) => {
                warn!(error = %e, "registry unavailable, continuing with an empty menu");
                (Self::empty(), Some(e))
            }
        }
    }

    /// Items for `key`; empty when the key is unknown or has no items.
    pub fn categories(&self, key: &str) -> &[LaunchableItem] {
        self.categories
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.items.as_slice())
            .unwrap_or(&[])
    }

    pub fn category_keys(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.key.as_str())
    }

    pub fn find(&self, key: &str, display_name: &str) -> Option<&LaunchableItem> {
        self.categories(key)
            .iter()
            .find(|i| i.display_name == display_name)
    }

    pub fn item_count(&self) -> usize {
        self.categories.iter().map(|c| c.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Title-case a category key for display: `morning_routine` -> `Morning Routine`.
pub fn category_label(key: &str) -> String {
    key.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve the configuration payload.
///
/// An explicit file wins over the inline payload; without either, the default
/// file under the user's config directory is used when present.
pub fn read_source(file: Option<&Path>, inline: Option<&str>) -> Result<Option<String>, ConfigError> {
    if let Some(path) = file {
        return read_file(path).map(Some);
    }
    if let Some(payload) = inline {
        return Ok(Some(payload.to_string()));
    }
    match default_registry_path() {
        Some(path) if path.exists() => read_file(&path).map(Some),
        _ => Ok(None),
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

pub fn default_registry_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("script-launcher").join("scripts.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PAYLOAD: &str = r#"{
        "study": [
            {"name": "Current course", "module": "scripts_list.study_current"},
            {"name": "Notes", "open": "/home/me/notes"}
        ],
        "coding": [
            {"name": "Claude UI", "path": "scripts_list/start_claude_web_ui.py", "timeout": "90s"},
            {"display_name": "Status", "program": "git", "args": ["status"]}
        ],
        "finances": []
    }"#;

    #[test]
    fn returns_configured_items_in_order() {
        let reg = Registry::from_json(PAYLOAD).unwrap();
        let names: Vec<_> = reg
            .categories("coding")
            .iter()
            .map(|i| i.display_name.as_str())
            .collect();
        assert_eq!(names, ["Claude UI", "Status"]);
        assert_eq!(
            reg.categories("coding")[1].target,
            InvocationTarget::Program {
                program: "git".into(),
                args: vec!["status".into()],
            }
        );
        assert_eq!(
            reg.categories("coding")[0].timeout,
            Some(Duration::from_secs(90))
        );
    }

    #[test]
    fn category_order_follows_payload() {
        let reg = Registry::from_json(PAYLOAD).unwrap();
        let keys: Vec<_> = reg.category_keys().collect();
        assert_eq!(keys, ["study", "coding", "finances"]);
    }

    #[test]
    fn unknown_and_empty_categories_are_empty() {
        let reg = Registry::from_json(PAYLOAD).unwrap();
        assert!(reg.categories("morning").is_empty());
        assert!(reg.categories("finances").is_empty());
        assert_eq!(reg.item_count(), 4);
    }

    #[test]
    fn malformed_json_degrades_to_empty() {
        let (reg, err) = Registry::load(Some("{not json"));
        assert!(matches!(err, Some(ConfigError::Json(_))));
        assert!(reg.categories("study").is_empty());
        assert!(reg.is_empty());
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let (reg, err) = Registry::load(Some(r#"["study"]"#));
        assert!(matches!(err, Some(ConfigError::NotAnObject)));
        assert!(reg.categories("study").is_empty());
    }

    #[test]
    fn absent_payload_is_missing() {
        let (reg, err) = Registry::load(None);
        assert!(matches!(err, Some(ConfigError::Missing)));
        assert!(reg.categories("coding").is_empty());

        let (_, err) = Registry::load(Some("   "));
        assert!(matches!(err, Some(ConfigError::Missing)));
    }

    #[test]
    fn category_must_be_a_list() {
        let err = Registry::from_json(r#"{"study": {"name": "x"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::NotAList { category } if category == "study"));
    }

    #[test]
    fn item_with_two_targets_is_rejected() {
        let err = Registry::from_json(
            r#"{"coding": [{"name": "ok", "module": "a"}, {"name": "both", "module": "a", "path": "b.py"}]}"#,
        )
        .unwrap_err();
        match err {
            ConfigError::InvalidItem {
                category, index, ..
            } => {
                assert_eq!(category, "coding");
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn item_without_target_or_name_is_rejected() {
        assert!(matches!(
            Registry::from_json(r#"{"coding": [{"name": "nothing"}]}"#),
            Err(ConfigError::InvalidItem { .. })
        ));
        assert!(matches!(
            Registry::from_json(r#"{"coding": [{"name": "  ", "module": "a"}]}"#),
            Err(ConfigError::InvalidItem { .. })
        ));
        assert!(matches!(
            Registry::from_json(r#"{"coding": ["just a string"]}"#),
            Err(ConfigError::InvalidItem { .. })
        ));
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let err =
            Registry::from_json(r#"{"coding": [{"name": "x", "module": "a", "timeout": "soon"}]}"#)
                .unwrap_err();
        assert!(err.to_string().contains("bad timeout"));
    }

    #[test]
    fn find_by_display_name() {
        let reg = Registry::from_json(PAYLOAD).unwrap();
        assert!(reg.find("study", "Notes").is_some());
        assert!(reg.find("study", "Status").is_none());
    }

    #[test]
    fn labels_are_title_cased() {
        assert_eq!(category_label("morning"), "Morning");
        assert_eq!(category_label("daily_websites"), "Daily Websites");
        assert_eq!(category_label("side-projects"), "Side Projects");
    }

    #[test]
    fn explicit_file_wins_over_inline_payload() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"planning": [{{"name": "Annual", "module": "plan"}}]}}"#).unwrap();
        let src = read_source(Some(f.path()), Some("{}")).unwrap().unwrap();
        let reg = Registry::from_json(&src).unwrap();
        assert_eq!(reg.categories("planning").len(), 1);
    }

    #[test]
    fn unreadable_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let err = read_source(Some(&missing), None).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
