use anyhow::{bail, Result};
use serde::Serialize;
use std::str::FromStr;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One `key: value` line per field
    #[default]
    Text,
    /// JSON - machine-parseable
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => bail!("Invalid format '{s}'. Use: text or json"),
        }
    }
}

impl OutputFormat {
    /// Render `data` in this format.
    ///
    /// Text output flattens one level of JSON object into `key: value`
    /// lines; arrays become blank-line separated blocks.
    pub fn render<T: Serialize>(self, data: &T) -> Result<String> {
        let value = serde_json::to_value(data)
            .map_err(|e| anyhow::anyhow!("serialization failed: {e}"))?;
        match self {
            Self::Json => serde_json::to_string_pretty(&value)
                .map_err(|e| anyhow::anyhow!("JSON serialization failed: {e}")),
            Self::Text => Ok(match value {
                serde_json::Value::Array(items) => items
                    .iter()
                    .map(text_block)
                    .collect::<Vec<_>>()
                    .join("\n\n"),
                other => text_block(&other),
            }),
        }
    }
}

fn text_block(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}: {}", scalar(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        other => scalar(other),
    }
}

fn scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "-".to_owned(),
        other => other.to_string(),
    }
}
