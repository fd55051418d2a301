use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ReaderError;

pub const NULL_MARKER: &str = "<i>NULL</i>";
pub const BINARY_MARKER: &str = "<i>BINARY DATA</i>";

/// Storage class of one cell, decided per row. Serialized as its numeric
/// code; code 1 is unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    Binary = 0,
    Null = 2,
    Text = 3,
    Integer = 4,
    Float = 5,
}

impl CellType {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(CellType::Binary),
            2 => Some(CellType::Null),
            3 => Some(CellType::Text),
            4 => Some(CellType::Integer),
            5 => Some(CellType::Float),
            _ => None,
        }
    }
}

impl Serialize for CellType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for CellType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        CellType::from_code(code)
            .ok_or_else(|| de::Error::custom(format!("unknown cell type code {}", code)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct Cell {
    pub name: String,
    #[serde(rename = "Type")]
    #[schema(value_type = i32)]
    pub cell_type: CellType,
    pub value: String,
}

impl Cell {
    pub fn null(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cell_type: CellType::Null,
            value: NULL_MARKER.to_string(),
        }
    }

    pub fn binary(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cell_type: CellType::Binary,
            value: BINARY_MARKER.to_string(),
        }
    }

    pub fn integer(name: &str, value: i64) -> Self {
        Self {
            name: name.to_string(),
            cell_type: CellType::Integer,
            value: value.to_string(),
        }
    }

    pub fn float(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            cell_type: CellType::Float,
            value: format!("{:.4}", value),
        }
    }

    pub fn text(name: &str, value: String) -> Self {
        Self {
            name: name.to_string(),
            cell_type: CellType::Text,
            value,
        }
    }

    pub fn is_null(&self) -> bool {
        self.cell_type == CellType::Null
    }
}

/// A bounded page of rows read from one table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ResultSet {
    pub col_names: Vec<String>,
    pub col_count: usize,
    pub row_count: usize,
    /// Rows in the whole table, regardless of the page size
    pub total_rows: i64,
    pub tablename: String,
    pub records: Vec<Vec<Cell>>,
}

impl ResultSet {
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// JSON body for the table view. An empty page is `[]` rather than an
    /// object with no records.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        if self.is_empty() {
            return Ok("[]".to_string());
        }
        serde_json::to_string(self)
    }

    /// Header-less CSV with one record per row, using the decoded cell text
    pub fn to_csv(&self) -> Result<String, ReaderError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in &self.records {
            writer.write_record(row.iter().map(|cell| cell.value.as_str()))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| ReaderError::Io(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| ReaderError::Task(e.to_string()))
    }
}
