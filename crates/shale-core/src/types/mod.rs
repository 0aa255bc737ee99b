//! Column data types and runtime values.
//!
//! Every runtime value is one case of the closed [`Value`] sum type. All
//! operators dispatch on the tag; comparisons between unrelated types fall
//! back to comparing the rendered string form.

use core::cmp::Ordering;
use core::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde::ser::SerializeMap;

/// Date rendering format.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Timestamp rendering format.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// ISO-8601 timestamp input format.
const TIMESTAMP_ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A type-system error: a value cannot be interpreted as its declared type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TypeError {
    /// Human-readable description of the failure.
    pub message: String,
}

impl TypeError {
    /// Creates a new type error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Prefixes the error with the column it occurred in.
    #[must_use]
    pub fn for_column(self, column: &str) -> Self {
        Self {
            message: format!("column '{}': {}", column, self.message),
        }
    }
}

/// Supported column data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Float,
    Varchar,
    Text,
    Boolean,
    Date,
    Timestamp,
}

impl DataType {
    /// Returns the canonical SQL name of the type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Varchar => "VARCHAR",
            Self::Text => "TEXT",
            Self::Boolean => "BOOLEAN",
            Self::Date => "DATE",
            Self::Timestamp => "TIMESTAMP",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column type with an optional size constraint (VARCHAR only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnType {
    /// The underlying data type.
    pub dtype: DataType,
    /// Maximum length in characters, for `VARCHAR(n)`.
    pub size: Option<usize>,
}

impl ColumnType {
    /// Creates a column type without a size constraint.
    #[must_use]
    pub const fn new(dtype: DataType) -> Self {
        Self { dtype, size: None }
    }

    /// Creates a sized `VARCHAR(n)` column type.
    #[must_use]
    pub const fn varchar(size: usize) -> Self {
        Self {
            dtype: DataType::Varchar,
            size: Some(size),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.dtype, self.size) {
            (DataType::Varchar, Some(n)) => write!(f, "VARCHAR({n})"),
            (dtype, _) => write!(f, "{dtype}"),
        }
    }
}

/// Parses a SQL type name (with aliases) into a [`ColumnType`].
///
/// # Errors
///
/// Returns a [`TypeError`] for unknown type names.
pub fn parse_type(text: &str) -> Result<ColumnType, TypeError> {
    let upper = text.trim().to_ascii_uppercase();

    if let Some(rest) = upper.strip_prefix("VARCHAR") {
        let rest = rest.trim();
        if rest.is_empty() {
            return Ok(ColumnType::new(DataType::Varchar));
        }
        if let Some(inner) = rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
            if let Ok(size) = inner.trim().parse::<usize>() {
                return Ok(ColumnType::varchar(size));
            }
        }
        return Err(TypeError::new(format!("unknown data type: {text}")));
    }

    let dtype = match upper.as_str() {
        "INTEGER" | "INT" => DataType::Integer,
        "FLOAT" | "REAL" | "DOUBLE" => DataType::Float,
        "TEXT" | "STRING" => DataType::Text,
        "BOOLEAN" | "BOOL" => DataType::Boolean,
        "DATE" => DataType::Date,
        "TIMESTAMP" | "DATETIME" => DataType::Timestamp,
        _ => return Err(TypeError::new(format!("unknown data type: {text}"))),
    };
    Ok(ColumnType::new(dtype))
}

/// A runtime SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// IEEE-754 double.
    Float(f64),
    /// Bounded string.
    Varchar(String),
    /// Unbounded string.
    Text(String),
    /// Boolean.
    Boolean(bool),
    /// Calendar date.
    Date(NaiveDate),
    /// Timestamp with second precision.
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Returns the SQL name of this value's type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Integer(_) => "INTEGER",
            Self::Float(_) => "FLOAT",
            Self::Varchar(_) => "VARCHAR",
            Self::Text(_) => "TEXT",
            Self::Boolean(_) => "BOOLEAN",
            Self::Date(_) => "DATE",
            Self::Timestamp(_) => "TIMESTAMP",
        }
    }

    /// Returns true for NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Truthiness for WHERE/HAVING predicates and logical operators.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Integer(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Varchar(s) | Self::Text(s) => !s.is_empty(),
            Self::Boolean(b) => *b,
            Self::Date(_) | Self::Timestamp(_) => true,
        }
    }

    /// Numeric view of the value, if it has one.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Boolean(b) => Some(f64::from(u8::from(*b))),
            _ => None,
        }
    }

    /// Integer view of the value, if it is integral.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Boolean(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// String view of the value, if it is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Varchar(s) | Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Total ordering over values.
    ///
    /// NULL sorts lowest; like-typed values use natural ordering (the two
    /// string variants and the two numeric variants are interchangeable);
    /// unrelated types compare by their rendered string form.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Null, _) => Ordering::Less,
            (_, Self::Null) => Ordering::Greater,
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (a, b) if a.as_f64().is_some() && b.as_f64().is_some() => {
                let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (Self::Varchar(a) | Self::Text(a), Self::Varchar(b) | Self::Text(b)) => a.cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            (a, b) => a.to_string().cmp(&b.to_string()),
        }
    }

    /// Equality as used by `=` predicates and uniqueness checks.
    ///
    /// Values of unrelated types are never equal; NULL equals only NULL
    /// (predicate-level NULL handling happens in the evaluator).
    #[must_use]
    pub fn loosely_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Null, _) | (_, Self::Null) => false,
            (Self::Varchar(a) | Self::Text(a), Self::Varchar(b) | Self::Text(b)) => a == b,
            (a, b) if a.as_f64().is_some() && b.as_f64().is_some() => a.as_f64() == b.as_f64(),
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            _ => false,
        }
    }

    /// A canonical string key: equal keys mean values that group together.
    ///
    /// Used for GROUP BY partitioning and DISTINCT deduplication, where
    /// NULLs are treated as equal to each other.
    #[must_use]
    pub fn canonical_key(&self) -> String {
        match self {
            Self::Null => String::from("null"),
            Self::Integer(i) => format!("n:{i}"),
            Self::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64
                {
                    format!("n:{}", *f as i64)
                } else {
                    format!("n:{f}")
                }
            }
            Self::Varchar(s) | Self::Text(s) => format!("s:{s}"),
            Self::Boolean(b) => format!("b:{b}"),
            Self::Date(d) => format!("d:{}", d.format(DATE_FORMAT)),
            Self::Timestamp(t) => format!("ts:{}", t.format(TIMESTAMP_FORMAT)),
        }
    }

    /// Serializes the value to its storage string form.
    #[must_use]
    pub fn serialize_text(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Varchar(s) | Self::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Deserializes a storage string back into a value of the given type.
    ///
    /// Inverse of [`Value::serialize_text`] for all non-NULL values.
    ///
    /// # Errors
    ///
    /// Returns a [`TypeError`] when the text does not parse as the type.
    pub fn deserialize_text(text: &str, col_type: &ColumnType) -> Result<Self, TypeError> {
        if text == "NULL" {
            return Ok(Self::Null);
        }
        match col_type.dtype {
            DataType::Integer => text
                .parse::<i64>()
                .map(Self::Integer)
                .map_err(|e| TypeError::new(format!("cannot parse '{text}' as INTEGER: {e}"))),
            DataType::Float => text
                .parse::<f64>()
                .map(Self::Float)
                .map_err(|e| TypeError::new(format!("cannot parse '{text}' as FLOAT: {e}"))),
            DataType::Boolean => Ok(Self::Boolean(text.eq_ignore_ascii_case("true"))),
            DataType::Date => NaiveDate::parse_from_str(text, DATE_FORMAT)
                .map(Self::Date)
                .map_err(|e| TypeError::new(format!("cannot parse '{text}' as DATE: {e}"))),
            DataType::Timestamp => NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
                .map(Self::Timestamp)
                .map_err(|e| TypeError::new(format!("cannot parse '{text}' as TIMESTAMP: {e}"))),
            DataType::Varchar => Ok(Self::Varchar(text.to_string())),
            DataType::Text => Ok(Self::Text(text.to_string())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) if v.fract() == 0.0 && v.is_finite() => write!(f, "{v:.1}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Varchar(s) | Self::Text(s) => f.write_str(s),
            Self::Boolean(b) => f.write_str(if *b { "true" } else { "false" }),
            Self::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Self::Timestamp(t) => write!(f, "{}", t.format(TIMESTAMP_FORMAT)),
        }
    }
}

/// Validates a value against a column type, coercing where the type system
/// allows it.
///
/// Numeric values convert between INTEGER and FLOAT, strings parse into
/// numerics, booleans, dates, and timestamps, and anything stringifies into
/// VARCHAR/TEXT (subject to the VARCHAR size limit).
///
/// # Errors
///
/// Returns a [`TypeError`] naming the offending value when no coercion
/// applies or a VARCHAR limit is exceeded.
pub fn validate_and_convert(value: Value, col_type: &ColumnType) -> Result<Value, TypeError> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    match col_type.dtype {
        DataType::Integer => match &value {
            Value::Integer(_) => Ok(value),
            Value::Boolean(b) => Ok(Value::Integer(i64::from(*b))),
            Value::Float(f) => Ok(Value::Integer(*f as i64)),
            Value::Varchar(s) | Value::Text(s) => s.trim().parse::<i64>().map(Value::Integer).map_err(
                |_| TypeError::new(format!("cannot convert '{s}' to INTEGER")),
            ),
            other => Err(cannot_convert(other, DataType::Integer)),
        },
        DataType::Float => match &value {
            Value::Float(_) => Ok(value),
            Value::Integer(i) => Ok(Value::Float(*i as f64)),
            Value::Boolean(b) => Ok(Value::Float(f64::from(u8::from(*b)))),
            Value::Varchar(s) | Value::Text(s) => s.trim().parse::<f64>().map(Value::Float).map_err(
                |_| TypeError::new(format!("cannot convert '{s}' to FLOAT")),
            ),
            other => Err(cannot_convert(other, DataType::Float)),
        },
        DataType::Varchar => {
            let text = value.to_string();
            if let Some(limit) = col_type.size {
                if text.chars().count() > limit {
                    return Err(TypeError::new(format!(
                        "value '{text}' exceeds VARCHAR({limit}) limit"
                    )));
                }
            }
            Ok(Value::Varchar(text))
        }
        DataType::Text => Ok(Value::Text(value.to_string())),
        DataType::Boolean => match &value {
            Value::Boolean(_) => Ok(value),
            Value::Integer(i) => Ok(Value::Boolean(*i != 0)),
            Value::Float(f) => Ok(Value::Boolean(*f != 0.0)),
            Value::Varchar(s) | Value::Text(s) => {
                let upper = s.trim().to_ascii_uppercase();
                match upper.as_str() {
                    "TRUE" | "1" | "YES" => Ok(Value::Boolean(true)),
                    "FALSE" | "0" | "NO" => Ok(Value::Boolean(false)),
                    _ => Ok(Value::Boolean(!s.is_empty())),
                }
            }
            other => Err(cannot_convert(other, DataType::Boolean)),
        },
        DataType::Date => match &value {
            Value::Date(_) => Ok(value),
            Value::Timestamp(t) => Ok(Value::Date(t.date())),
            Value::Varchar(s) | Value::Text(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                .map(Value::Date)
                .map_err(|_| TypeError::new(format!("cannot convert '{s}' to DATE"))),
            other => Err(cannot_convert(other, DataType::Date)),
        },
        DataType::Timestamp => match &value {
            Value::Timestamp(_) => Ok(value),
            Value::Varchar(s) | Value::Text(s) => {
                let text = s.trim();
                NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
                    .or_else(|_| NaiveDateTime::parse_from_str(text, TIMESTAMP_ISO_FORMAT))
                    .or_else(|_| {
                        NaiveDate::parse_from_str(text, DATE_FORMAT)
                            .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
                    })
                    .map(Value::Timestamp)
                    .map_err(|_| TypeError::new(format!("cannot convert '{s}' to TIMESTAMP")))
            }
            other => Err(cannot_convert(other, DataType::Timestamp)),
        },
    }
}

fn cannot_convert(value: &Value, target: DataType) -> TypeError {
    TypeError::new(format!(
        "cannot convert '{value}' ({}) to {target}",
        value.type_name()
    ))
}

// ===================================================================
// JSON serialization
// ===================================================================
//
// NULL, numbers, strings, and booleans map onto their native JSON
// counterparts. DATE and TIMESTAMP serialize as single-entry objects
// ({"__date__": ...} / {"__datetime__": ...}) so they survive the trip
// through plain JSON. A bare JSON string deserializes as TEXT; table
// loading re-validates values against their column types, which restores
// the VARCHAR tag.

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Varchar(s) | Self::Text(s) => serializer.serialize_str(s),
            Self::Boolean(b) => serializer.serialize_bool(*b),
            Self::Date(d) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("__date__", &d.format(DATE_FORMAT).to_string())?;
                map.end()
            }
            Self::Timestamp(t) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("__datetime__", &t.format(TIMESTAMP_FORMAT).to_string())?;
                map.end()
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a SQL value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Boolean(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        i64::try_from(v).map_or(Ok(Value::Float(v as f64)), |i| Ok(Value::Integer(i)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::Text(v))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let Some((key, text)) = map.next_entry::<String, String>()? else {
            return Err(de::Error::custom("empty object in value position"));
        };
        match key.as_str() {
            "__date__" => NaiveDate::parse_from_str(&text, DATE_FORMAT)
                .map(Value::Date)
                .map_err(de::Error::custom),
            "__datetime__" => NaiveDateTime::parse_from_str(&text, TIMESTAMP_FORMAT)
                .map(Value::Timestamp)
                .map_err(de::Error::custom),
            other => Err(de::Error::custom(format!(
                "unexpected key '{other}' in value position"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}
