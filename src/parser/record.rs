use chrono::{DateTime, Local};
use indexmap::IndexMap;
use serde::ser::{Serialize, Serializer};

/// Field names that carry numeric performance data. Records whose value for
/// one of these fields cannot be coerced to a number are dropped entirely.
pub const NUMERIC_FIELDS: &[&str] = &[
    "time_s",
    "response_bytes",
    "response_bytes_clf",
    "time_us",
    "num_keepalives",
    "bytes_rx",
    "bytes_tx",
];

/// A single typed field extracted from a log line or a status page.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Float(f64),
    Time(DateTime<Local>),
}

impl FieldValue {
    /// Numeric view of the value, if it has one. Strings are not parsed here;
    /// coercion is an explicit, separate step.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(n) => Some(*n as f64),
            FieldValue::Float(f) => Some(*f),
            FieldValue::Str(_) | FieldValue::Time(_) => None,
        }
    }

    pub const fn as_time(&self) -> Option<DateTime<Local>> {
        match self {
            FieldValue::Time(t) => Some(*t),
            FieldValue::Str(_) | FieldValue::Int(_) | FieldValue::Float(_) => None,
        }
    }

    /// Parse a raw string into a numeric value, integers preferred.
    pub fn coerce_numeric(raw: &str) -> Option<FieldValue> {
        if let Ok(n) = raw.parse::<i64>() {
            return Some(FieldValue::Int(n));
        }
        raw.parse::<f64>().ok().map(FieldValue::Float)
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Str(a), FieldValue::Str(b)) => a == b,
            (FieldValue::Int(a), FieldValue::Int(b)) => a == b,
            // Bit equality keeps float keys usable in hash maps
            (FieldValue::Float(a), FieldValue::Float(b)) => a.to_bits() == b.to_bits(),
            (FieldValue::Time(a), FieldValue::Time(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

impl std::hash::Hash for FieldValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            FieldValue::Str(s) => {
                0u8.hash(state);
                s.hash(state);
            }
            FieldValue::Int(n) => {
                1u8.hash(state);
                n.hash(state);
            }
            FieldValue::Float(f) => {
                2u8.hash(state);
                f.to_bits().hash(state);
            }
            FieldValue::Time(t) => {
                3u8.hash(state);
                t.timestamp_micros().hash(state);
            }
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Str(s) => write!(f, "{s}"),
            FieldValue::Int(n) => write!(f, "{n}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::Time(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Str(s) => serializer.serialize_str(s),
            FieldValue::Int(n) => serializer.serialize_i64(*n),
            FieldValue::Float(f) => serializer.serialize_f64(*f),
            // Timestamps serialize as epoch seconds for downstream writers
            FieldValue::Time(t) => {
                serializer.serialize_f64(t.timestamp_micros() as f64 / 1_000_000.0)
            }
        }
    }
}

/// One parsed log entry: an ordered mapping from field name to typed value.
/// Entries produced by the line parser always contain `time_received`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct LogRecord {
    #[serde(flatten)]
    fields: IndexMap<String, FieldValue>,
}

impl LogRecord {
    pub fn new() -> Self {
        LogRecord {
            fields: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// The entry's timestamp. Present on every record the parser emits.
    pub fn time_received(&self) -> Option<DateTime<Local>> {
        self.fields.get("time_received").and_then(FieldValue::as_time)
    }

    /// Coerce the record's known numeric fields in place. Returns false if a
    /// present value does not parse as a number, in which case the whole
    /// record is to be dropped (row-level drop, not field-level null).
    pub fn coerce_numeric_fields(&mut self) -> bool {
        for name in NUMERIC_FIELDS {
            let Some(value) = self.fields.get_mut(*name) else {
                continue;
            };
            match value {
                FieldValue::Int(_) | FieldValue::Float(_) => {}
                FieldValue::Str(raw) => match FieldValue::coerce_numeric(raw) {
                    Some(coerced) => *value = coerced,
                    None => return false,
                },
                FieldValue::Time(_) => return false,
            }
        }
        true
    }
}

/// Coerce numeric fields across a scan result, dropping records that carry
/// non-numeric values in a numeric field.
pub fn coerce_records(records: Vec<LogRecord>) -> Vec<LogRecord> {
    let before = records.len();
    let records: Vec<LogRecord> = records
        .into_iter()
        .filter_map(|mut record| record.coerce_numeric_fields().then_some(record))
        .collect();
    if records.len() < before {
        log::debug!(
            "Dropped {} records with non-numeric values in numeric fields",
            before - records.len()
        );
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> LogRecord {
        let mut r = LogRecord::new();
        for (k, v) in pairs {
            r.insert(*k, FieldValue::Str((*v).to_string()));
        }
        r
    }

    #[test]
    fn test_coerce_turns_numeric_strings_into_numbers() {
        let mut r = record(&[("time_us", "1534"), ("remote_host", "10.0.0.1")]);
        assert!(r.coerce_numeric_fields());
        assert_eq!(r.get("time_us"), Some(&FieldValue::Int(1534)));
        // Non-numeric fields stay untouched
        assert_eq!(
            r.get("remote_host"),
            Some(&FieldValue::Str("10.0.0.1".to_string()))
        );
    }

    #[test]
    fn test_row_level_drop_on_bad_numeric_value() {
        let good = record(&[("time_us", "250")]);
        let bad = record(&[("time_us", "250"), ("response_bytes_clf", "-")]);
        let kept = coerce_records(vec![good, bad]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].get("time_us"), Some(&FieldValue::Int(250)));
    }

    #[test]
    fn test_missing_numeric_field_does_not_drop() {
        let r = record(&[("remote_host", "10.0.0.1")]);
        assert_eq!(coerce_records(vec![r]).len(), 1);
    }

    #[test]
    fn test_float_coercion() {
        let mut r = record(&[("time_s", "0.125")]);
        assert!(r.coerce_numeric_fields());
        assert_eq!(r.get("time_s"), Some(&FieldValue::Float(0.125)));
    }
}
