//! Registry listing for `--list`.
//!
//! Formats categories and their items as text lines or as a JSON document.

use crate::registry::{category_label, Registry};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// One block per category, items indented beneath it.
pub(crate) fn build_listing(registry: &Registry) -> TextSummary {
    let mut lines = Vec::new();

    if registry.is_empty() {
        lines.push("No scripts configured.".to_string());
        return TextSummary { lines };
    }

    for key in registry.category_keys() {
        let items = registry.categories(key);
        lines.push(format!("{} [{key}] ({} scripts)", category_label(key), items.len()));
        if items.is_empty() {
            lines.push("  (none)".to_string());
        }
        for item in items {
            let mut line = format!("  {:<28} {}", item.display_name, item.target.describe());
            if let Some(t) = item.timeout {
                line.push_str(&format!(" (timeout {})", humantime::format_duration(t)));
            }
            lines.push(line);
        }
    }

    TextSummary { lines }
}

/// Ordered JSON object: category key -> list of items.
pub(crate) fn listing_json(registry: &Registry) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = registry
        .category_keys()
        .map(|key| {
            let items = serde_json::to_value(registry.categories(key))
                .unwrap_or_else(|_| serde_json::Value::Array(Vec::new()));
            (key.to_string(), items)
        })
        .collect();
    serde_json::Value::Object(map)
}
