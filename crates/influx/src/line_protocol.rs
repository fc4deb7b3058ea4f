use std::collections::BTreeMap;
use std::fmt::Write;

/// A single time-series point forwarded to `InfluxDB`.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    /// Nanoseconds since the UNIX epoch; the server assigns one when absent.
    pub timestamp_ns: Option<u128>,
}

impl Point {
    pub fn new(measurement: impl Into<String>) -> Point {
        Point {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp_ns: None,
        }
    }

    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Point {
        self.tags.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Point {
        self.fields.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn timestamp_ns(mut self, timestamp_ns: u128) -> Point {
        self.timestamp_ns = Some(timestamp_ns);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    UInteger(u64),
    Boolean(bool),
    String(String),
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::UInteger(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

/// Appends `point` as one line to `buf`.
///
/// Non-finite float fields are dropped. Returns `false` (writing nothing) when
/// no field is left to write.
pub(crate) fn write_point(buf: &mut String, point: &Point) -> bool {
    let mut fields = point
        .fields
        .iter()
        .filter(|(_, value)| !matches!(value, FieldValue::Float(v) if !v.is_finite()))
        .peekable();
    if fields.peek().is_none() {
        return false;
    }

    escape_measurement(buf, &point.measurement);
    // Empty tag keys or values are not valid line protocol.
    for (key, value) in point.tags.iter().filter(|(k, v)| !k.is_empty() && !v.is_empty()) {
        buf.push(',');
        escape_key_value(buf, key);
        buf.push('=');
        escape_key_value(buf, value);
    }

    let mut separator = ' ';
    for (key, value) in fields {
        buf.push(separator);
        separator = ',';

        escape_key_value(buf, key);
        buf.push('=');
        write_field_value(buf, value);
    }

    if let Some(timestamp_ns) = point.timestamp_ns {
        let _ = write!(buf, " {timestamp_ns}");
    }
    buf.push('\n');

    true
}

fn write_field_value(buf: &mut String, value: &FieldValue) {
    let _ = match value {
        FieldValue::Float(v) => write!(buf, "{v}"),
        FieldValue::Integer(v) => write!(buf, "{v}i"),
        FieldValue::UInteger(v) => write!(buf, "{v}u"),
        FieldValue::Boolean(v) => write!(buf, "{v}"),
        FieldValue::String(v) => {
            buf.push('"');
            for c in v.chars() {
                if matches!(c, '"' | '\\') {
                    buf.push('\\');
                }
                buf.push(c);
            }
            buf.push('"');

            Ok(())
        }
    };
}

fn escape_measurement(buf: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            ',' | ' ' | '\\' => {
                buf.push('\\');
                buf.push(c);
            }
            _ => buf.push(c),
        }
    }
}

fn escape_key_value(buf: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            ',' | '=' | ' ' | '\\' => {
                buf.push('\\');
                buf.push(c);
            }
            _ => buf.push(c),
        }
    }
}
