use std::fmt;

use serde::{Deserialize, Serialize};

/// The base name of an input or column type.
///
/// Names the model does not know are preserved in [`TypeName::Other`]; values of those types pass
/// through coercion untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TypeName {
    String,
    Boolean,
    Integer,
    Number,
    Decimal,
    Percent,
    Currency,
    Date,
    Datetime,
    Other(String),
}

impl TypeName {
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            "string" => Self::String,
            "boolean" => Self::Boolean,
            "integer" => Self::Integer,
            "number" => Self::Number,
            "decimal" => Self::Decimal,
            "percent" => Self::Percent,
            "currency" => Self::Currency,
            "date" => Self::Date,
            "datetime" => Self::Datetime,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Decimal => "decimal",
            Self::Percent => "percent",
            Self::Currency => "currency",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::Other(name) => name,
        }
    }

    /// `number`, `decimal`, `percent` and `currency` all hold a finite `f64`.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Number | Self::Decimal | Self::Percent | Self::Currency
        )
    }
}

impl From<String> for TypeName {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<TypeName> for String {
    fn from(name: TypeName) -> Self {
        name.as_str().to_string()
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A type annotation such as `integer` or `currency(USD)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnType {
    pub name: TypeName,
    pub args: Vec<String>,
    /// The annotation as written (trimmed).
    pub raw: String,
}

impl ColumnType {
    /// Parses `name` or `name(arg, arg, ...)`.
    ///
    /// Malformed parentheses are not an error: the whole text becomes the type name.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let parens = trimmed.find('(').and_then(|open| {
            trimmed
                .rfind(')')
                .filter(|close| *close > open)
                .map(|close| (open, close))
        });
        let Some((open, close)) = parens else {
            return Self {
                name: TypeName::parse(trimmed),
                args: Vec::new(),
                raw: trimmed.to_string(),
            };
        };
        let args = trimmed[open + 1..close]
            .split(',')
            .map(str::trim)
            .filter(|arg| !arg.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            name: TypeName::parse(trimmed[..open].trim()),
            args,
            raw: trimmed.to_string(),
        }
    }

    #[must_use]
    pub fn of(name: TypeName) -> Self {
        let raw = name.as_str().to_string();
        Self {
            name,
            args: Vec::new(),
            raw,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
