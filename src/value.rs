//! Auxiliary attribute values carried by entity records.
//!
//! Records carry an open map of named attributes (location fields, numeric
//! fields, date fields). Only the discovery pass reads them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single auxiliary attribute value.
///
/// # Examples
///
/// ```
/// use groupscope::AttributeValue;
///
/// let city = AttributeValue::from("Recife");
/// let revenue = AttributeValue::from(1250.5);
///
/// assert_eq!(city.as_text(), Some("Recife"));
/// assert!(revenue.is_number());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    /// Free text.
    Text(String),
    /// Numeric value.
    Number(f64),
    /// Calendar date.
    Date(NaiveDate),
}

impl AttributeValue {
    /// True for text values.
    pub const fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// True for numeric values.
    pub const fn is_number(&self) -> bool {
        matches!(self, Self::Number(_))
    }

    /// True for dates.
    pub const fn is_date(&self) -> bool {
        matches!(self, Self::Date(_))
    }

    /// The text, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// The number, if this is a numeric value.
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// The date, if this is a date value.
    pub const fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Number(_) => "number",
            Self::Date(_) => "date",
        }
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Number(v) => write!(f, "{v}"),
            Self::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
        }
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        Self::Number(v as f64)
    }
}

impl From<NaiveDate> for AttributeValue {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_text() {
        let val = AttributeValue::Text("Recife".to_string());
        assert!(val.is_text());
        assert_eq!(val.as_text(), Some("Recife"));
        assert_eq!(val.type_name(), "text");
    }

    #[test]
    fn test_value_number() {
        let val = AttributeValue::from(42i64);
        assert!(val.is_number());
        assert_eq!(val.as_number(), Some(42.0));
        assert!(val.as_text().is_none());
    }

    #[test]
    fn test_value_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let val = AttributeValue::from(date);
        assert!(val.is_date());
        assert_eq!(val.as_date(), Some(date));
        assert_eq!(format!("{val}"), "2024-03-01");
    }

    #[test]
    fn test_value_serialization() {
        let val = AttributeValue::Date(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
        let json = serde_json::to_string(&val).unwrap();
        assert!(json.contains("\"date\""));
        let back: AttributeValue = serde_json::from_str(&json).unwrap();
        assert_eq!(val, back);
    }
}
