//! Recipient import from CSV and JSON files.
//!
//! CSV files need a header row; the first of `number`, `phone`, `mobile` or
//! `contact` (any case) that has a value in a row is used for that row.
//!
//! JSON files may take any of these shapes:
//! ```json
//! {"numbers": ["9876543210", 9876543211], "message": "optional body"}
//! {"contacts": ["9876543210"]}
//! ["9876543210", {"phone": "9876543211"}]
//! ```

use std::path::Path;

use serde_json::Value;
use thiserror::Error;

/// Column names and object keys that hold a phone number, in priority order
const NUMBER_KEYS: [&str; 4] = ["number", "phone", "mobile", "contact"];

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No phone number column found (expected one of: {})", NUMBER_KEYS.join(", "))]
    NoNumberColumn,

    #[error("No phone numbers found")]
    Empty,

    #[error("Unsupported file type {0:?}, expected .csv or .json")]
    UnsupportedFormat(String),
}

/// Recipients (and possibly a message) read from a file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Imported {
    /// Raw tokens, not yet normalized
    pub recipients: Vec<String>,
    pub message: Option<String>,
}

impl Imported {
    /// Recipients in the comma separated form the normalizer expects
    #[must_use]
    pub fn raw(&self) -> String {
        self.recipients.join(", ")
    }
}

/// Read `path`, choosing the parser from its extension.
///
/// # Errors
/// If the file cannot be read, has an unknown extension, or holds no numbers
pub async fn import_file(path: &Path) -> Result<Imported, ImportError> {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ImportError::Read {
            path: path.display().to_string(),
            source,
        })?;

    match extension.as_str() {
        "csv" => parse_csv(&content),
        "json" => parse_json(&content),
        _ => Err(ImportError::UnsupportedFormat(extension)),
    }
}

/// # Errors
/// If the CSV is malformed, there is no number column, or no row has a number
pub fn parse_csv(content: &str) -> Result<Imported, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.trim_start_matches('\u{feff}').as_bytes());

    let header = reader.headers()?.clone();
    let columns: Vec<usize> = NUMBER_KEYS
        .iter()
        .filter_map(|key| header.iter().position(|name| name.eq_ignore_ascii_case(key)))
        .collect();

    if columns.is_empty() {
        return Err(ImportError::NoNumberColumn);
    }

    let mut recipients = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(value) = columns
            .iter()
            .filter_map(|&index| record.get(index))
            .find(|value| !value.is_empty())
        {
            recipients.push(value.to_string());
        }
    }

    if recipients.is_empty() {
        return Err(ImportError::Empty);
    }

    Ok(Imported {
        recipients,
        message: None,
    })
}

/// Render a scalar JSON value as a recipient token
fn token(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    (!text.is_empty()).then_some(text)
}

/// # Errors
/// If `content` is not JSON, or none of the known shapes yields a number
pub fn parse_json(content: &str) -> Result<Imported, ImportError> {
    let data: Value = serde_json::from_str(content)?;

    let imported = match &data {
        Value::Object(map) => {
            let list = map
                .get("numbers")
                .or_else(|| map.get("contacts"))
                .and_then(Value::as_array);

            Imported {
                recipients: list
                    .map(|items| items.iter().filter_map(token).collect())
                    .unwrap_or_default(),
                message: map
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string),
            }
        }
        Value::Array(items) => Imported {
            recipients: items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(map) => NUMBER_KEYS
                        .iter()
                        .find_map(|key| map.get(*key))
                        .and_then(token),
                    Value::String(_) => token(item),
                    _ => None,
                })
                .collect(),
            message: None,
        },
        _ => Imported::default(),
    };

    if imported.recipients.is_empty() {
        return Err(ImportError::Empty);
    }

    Ok(imported)
}
