//! Field definitions and dataset rows
//!
//! Fields arrive from the visual editor in its JSON format (camelCase keys)
//! and are read-only to the engine. Rows arrive from spreadsheet ingestion.

use crate::constants::{DEFAULT_FIELD_COLOR, DEFAULT_FONT_SIZE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Horizontal alignment of a field around its stored x position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    #[default]
    Center,
    Right,
}

/// A placeable text element on the template.
///
/// Positions are millimeters from the page's top-left corner, y growing
/// downward. Font sizes and letter spacing are points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    #[serde(default)]
    pub label: String,
    /// Dataset column; wins over `value` when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Static text used when no column is bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub align: Align,
    /// Degrees, clockwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f32>,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default)]
    pub letter_spacing: f32,
    /// Reserved; single-line fields never use it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_height: Option<f32>,
    #[serde(default)]
    pub underline: bool,
    #[serde(
        default,
        rename = "maxWidth_mm",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_width_mm: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_font_size: Option<f32>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_font_size() -> f32 {
    DEFAULT_FONT_SIZE
}

fn default_color() -> String {
    DEFAULT_FIELD_COLOR.to_string()
}

fn default_opacity() -> f32 {
    1.0
}

fn default_enabled() -> bool {
    true
}

impl Field {
    /// A field pulling its text from `column` on every row
    pub fn bound(id: impl Into<String>, column: impl Into<String>) -> Self {
        let column = column.into();
        Self {
            label: column.clone(),
            column: Some(column),
            ..Self::blank(id)
        }
    }

    /// A field drawing the same text on every page
    pub fn fixed(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::blank(id)
        }
    }

    fn blank(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: String::new(),
            column: None,
            value: None,
            x: 0.0,
            y: 0.0,
            font_size: DEFAULT_FONT_SIZE,
            color: default_color(),
            align: Align::Center,
            rotation: None,
            opacity: 1.0,
            letter_spacing: 0.0,
            line_height: None,
            underline: false,
            max_width_mm: None,
            min_font_size: None,
            enabled: true,
        }
    }

    pub fn at(mut self, x_mm: f32, y_mm: f32) -> Self {
        self.x = x_mm;
        self.y = y_mm;
        self
    }

    pub fn sized(mut self, font_size: f32) -> Self {
        self.font_size = font_size;
        self
    }

    pub fn aligned(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    /// The bound column, ignoring the editor's empty-string placeholder
    pub fn bound_column(&self) -> Option<&str> {
        self.column.as_deref().filter(|c| !c.is_empty())
    }

    /// Text this field shows for `row`, trimmed. Empty means draw nothing.
    pub fn resolve_text(&self, row: &Row) -> String {
        let raw = match self.bound_column() {
            Some(column) => row.get(column).map(|cell| cell.to_string()).unwrap_or_default(),
            None => self.value.clone().unwrap_or_default(),
        };
        raw.trim().to_string()
    }
}

/// One spreadsheet cell
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(b) => write!(f, "{b}"),
            // Whole numbers print without a trailing ".0", the way a
            // spreadsheet shows them
            CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
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

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// One dataset row: column name to cell
pub type Row = HashMap<String, CellValue>;

/// Build a row from `(column, value)` pairs
pub fn row<K, V>(cells: impl IntoIterator<Item = (K, V)>) -> Row
where
    K: Into<String>,
    V: Into<CellValue>,
{
    cells
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
