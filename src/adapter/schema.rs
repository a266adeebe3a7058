//! Label schemas
//!
//! The closed set of annotation layouts a dataset directory may use.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, ShardError};

/// How labels are located and extracted for a content file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSchema {
    /// `<stem>.json`: array of `{ "text": .. }`; a missing or bad file fails the item
    SceneText,

    /// `<filename>.json`: array of `{ "text": .. }`; lenient
    LayoutLlm,

    /// `<stem>.json`: `{ "LINE": [ { "Text": .. } ] }`; lenient
    AwsTextract,

    /// `<stem>.json`: `{ "recognitionResults": [ { "lines": [ { "text": .. } ] } ] }`; lenient
    AzureRead,
}

#[derive(Deserialize)]
struct TextSpan {
    text: String,
}

#[derive(Deserialize)]
struct TextractDocument {
    #[serde(rename = "LINE")]
    lines: Vec<TextractLine>,
}

#[derive(Deserialize)]
struct TextractLine {
    #[serde(rename = "Text")]
    text: String,
}

#[derive(Deserialize)]
struct AzureDocument {
    #[serde(rename = "recognitionResults")]
    recognition_results: Vec<AzurePage>,
}

#[derive(Deserialize)]
struct AzurePage {
    lines: Vec<TextSpan>,
}

impl LabelSchema {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelSchema::SceneText => "scene_text",
            LabelSchema::LayoutLlm => "layoutllm",
            LabelSchema::AwsTextract => "aws_textract",
            LabelSchema::AzureRead => "azure_read",
        }
    }

    /// Whether a missing or unreadable label fails the item
    ///
    /// Lenient schemas log the problem and fall back to an empty label.
    pub fn is_strict(&self) -> bool {
        matches!(self, LabelSchema::SceneText)
    }

    /// Label filename for a content filename
    pub fn label_filename(&self, content_filename: &str) -> String {
        match self {
            LabelSchema::LayoutLlm => format!("{}.json", content_filename),
            _ => {
                let stem = Path::new(content_filename)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| content_filename.to_string());
                format!("{}.json", stem)
            }
        }
    }

    /// Extract the label text from a parsed annotation document
    ///
    /// Empty documents (`null`, `[]`, `{}`) produce an empty label.
    pub fn extract(&self, document: Value) -> Result<String> {
        let empty = match &document {
            Value::Null => true,
            Value::Array(items) => items.is_empty(),
            Value::Object(fields) => fields.is_empty(),
            _ => false,
        };
        if empty {
            return Ok(String::new());
        }

        let parts: Vec<String> = match self {
            LabelSchema::SceneText | LabelSchema::LayoutLlm => {
                let spans: Vec<TextSpan> = serde_json::from_value(document)?;
                spans.into_iter().map(|s| s.text).collect()
            }
            LabelSchema::AwsTextract => {
                let doc: TextractDocument = serde_json::from_value(document)?;
                doc.lines.into_iter().map(|l| l.text).collect()
            }
            LabelSchema::AzureRead => {
                let doc: AzureDocument = serde_json::from_value(document)?;
                doc.recognition_results
                    .into_iter()
                    .next()
                    .map(|page| page.lines.into_iter().map(|l| l.text).collect())
                    .unwrap_or_default()
            }
        };
        Ok(parts.join(" "))
    }
}

impl FromStr for LabelSchema {
    type Err = ShardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scene_text" => Ok(LabelSchema::SceneText),
            "layoutllm" => Ok(LabelSchema::LayoutLlm),
            "aws_textract" | "aws" => Ok(LabelSchema::AwsTextract),
            "azure_read" | "azure" => Ok(LabelSchema::AzureRead),
            other => Err(ShardError::UnsupportedSchema(other.to_string())),
        }
    }
}

impl fmt::Display for LabelSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
