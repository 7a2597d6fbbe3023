use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::sheet::address::CellAddress;

pub const DEFAULT_FONT_COLOR: &str = "#000000";
pub const DEFAULT_FILL_COLOR: &str = "#FFFFFF";

/// Scalar content of a cell. Serialises untagged: `null`, `true`, `42`, `"x"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// Point-in-time view of one cell, as reported back to the model and the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellSnapshot {
    pub address: CellAddress,
    pub value: CellValue,
    pub formula: String,
    pub font_color: String,
    pub fill_color: String,
}

/// Requested changes to a single cell. Absent fields are left untouched.
///
/// Models are loose with types, so `bold` and `fontSize` decode leniently
/// (`"true"`, `1`, `"12"` are all accepted).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellPatch {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present_value")]
    pub value: Option<CellValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_bool")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number")]
    pub font_size: Option<f64>,
}

impl CellPatch {
    pub fn value(value: impl Into<CellValue>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn formula(formula: impl Into<String>) -> Self {
        Self {
            formula: Some(formula.into()),
            ..Self::default()
        }
    }

    /// Patch that blanks the cell's content.
    pub fn cleared() -> Self {
        Self::value(CellValue::Text(String::new()))
    }

    /// Resolve model quirks into the changes a host should apply.
    ///
    /// `fontColor: "bold"` means bold, not a colour; empty strings and a zero
    /// font size mean "no change".
    pub fn resolved(&self) -> ResolvedPatch {
        let font_color = self
            .font_color
            .as_deref()
            .filter(|c| !c.is_empty() && *c != "bold")
            .map(str::to_string);
        let bold = if self.font_color.as_deref() == Some("bold") {
            Some(true)
        } else {
            self.bold
        };
        ResolvedPatch {
            value: self.value.clone(),
            formula: self.formula.clone(),
            bold,
            font_color,
            fill_color: self.fill_color.clone().filter(|c| !c.is_empty()),
            font_name: self.font_name.clone().filter(|n| !n.is_empty()),
            font_size: self.font_size.filter(|s| *s > 0.0),
        }
    }
}

/// A `CellPatch` with the quirks resolved; what a host actually writes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedPatch {
    pub value: Option<CellValue>,
    pub formula: Option<String>,
    pub bold: Option<bool>,
    pub font_color: Option<String>,
    pub fill_color: Option<String>,
    pub font_name: Option<String>,
    pub font_size: Option<f64>,
}

// ── Lenient decoders ──────────────────────────────────────────────────────────

/// Distinguishes `"value": null` (write an empty cell) from an absent key.
fn present_value<'de, D>(deserializer: D) -> Result<Option<CellValue>, D::Error>
where
    D: Deserializer<'de>,
{
    CellValue::deserialize(deserializer).map(Some)
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(match raw {
        serde_json::Value::Bool(b) => Some(b),
        serde_json::Value::Number(n) => Some(n.as_f64().unwrap_or(0.0) != 0.0),
        serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" | "false" | "0" | "no" => Some(false),
            _ => Some(true),
        },
        serde_json::Value::Null => None,
        _ => Some(true),
    })
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(match raw {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().trim_end_matches("pt").trim().parse().ok(),
        _ => None,
    })
}
