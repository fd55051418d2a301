use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Comparison operators accepted in a row filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    GtEq,
}

impl FilterOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterOp::Like => "LIKE",
            FilterOp::Eq => "=",
            FilterOp::NotEq => "!=",
            FilterOp::Lt => "<",
            FilterOp::LtEq => "<=",
            FilterOp::Gt => ">",
            FilterOp::GtEq => ">=",
        }
    }
}

impl FromStr for FilterOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LIKE" => Ok(FilterOp::Like),
            "=" => Ok(FilterOp::Eq),
            "!=" => Ok(FilterOp::NotEq),
            "<" => Ok(FilterOp::Lt),
            "<=" => Ok(FilterOp::LtEq),
            ">" => Ok(FilterOp::Gt),
            ">=" => Ok(FilterOp::GtEq),
            other => Err(format!("unsupported filter operator '{}'", other)),
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Single `column op value` condition. The value is always bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: String,
}

/// Column restriction for a read. Column names here are unvalidated
/// candidates; the reader whitelists them against the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub columns: Vec<String>,
    pub filter: Option<Filter>,
    /// Drop rows where any projected column is NULL
    pub skip_nulls: bool,
    /// Drop rows where any projected column holds a BLOB
    pub skip_binary: bool,
}

impl Projection {
    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Only keep rows where every projected column has a plottable value
    pub fn plottable(mut self) -> Self {
        self.skip_nulls = true;
        self.skip_binary = true;
        self
    }
}
