//! Base implementation of records.
use crate::error::TunerError;
use chrono::prelude::{DateTime, Local};
use std::{
    collections::{
        hash_map::{IntoIter, Iter, Keys},
        HashMap,
    },
    fmt,
};

/// Represents possible types of values that can be stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single floating-point value, e.g. a reward.
    Scalar(f64),

    /// An integer, e.g. an episode id or a count.
    Integer(i64),

    /// A boolean flag.
    Flag(bool),

    /// A timestamp with local timezone.
    DateTime(DateTime<Local>),

    /// A 1-dimensional array of floating-point values, e.g. parameter values.
    Array1(Vec<f64>),

    /// A text value.
    String(String),
}

impl fmt::Display for RecordValue {
    /// Formats the value the way text sinks write it. Arrays are separated by `;`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordValue::Scalar(v) => write!(f, "{}", v),
            RecordValue::Integer(v) => write!(f, "{}", v),
            RecordValue::Flag(v) => write!(f, "{}", v),
            RecordValue::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            RecordValue::Array1(v) => {
                let s = v.iter().map(|x| x.to_string()).collect::<Vec<_>>();
                write!(f, "{}", s.join(";"))
            }
            RecordValue::String(v) => write!(f, "{}", v),
        }
    }
}

/// A container for storing key-value pairs of various data types.
///
/// # Examples
///
/// ```rust
/// use qtune_core::record::{Record, RecordValue};
///
/// let mut record = Record::from_scalar("best_reward", -3.0);
/// record.insert("aborted", RecordValue::Flag(false));
///
/// assert_eq!(record.get_scalar("best_reward").unwrap(), -3.0);
/// assert!(record.get_scalar("aborted").is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(HashMap<String, RecordValue>);

macro_rules! getter {
    ($(#[$m:meta])* $name:ident, $variant:ident, $ty:ty) => {
        $(#[$m])*
        pub fn $name(&self, k: &str) -> Result<$ty, TunerError> {
            match self.0.get(k) {
                Some(RecordValue::$variant(v)) => Ok(v.clone()),
                Some(_) => Err(TunerError::RecordValueTypeError(stringify!($variant).to_string())),
                None => Err(TunerError::RecordKeyError(k.to_string())),
            }
        }
    };
}

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record containing a single scalar value.
    pub fn from_scalar(name: impl Into<String>, value: f64) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from a slice of key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Returns an iterator over the keys in the record.
    pub fn keys(&self) -> Keys<String, RecordValue> {
        self.0.keys()
    }

    /// Inserts a key-value pair into the record.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Returns an iterator over the key-value pairs in the record.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Returns an iterator that consumes the record.
    pub fn into_iter_in_record(self) -> IntoIter<String, RecordValue> {
        self.0.into_iter()
    }

    /// Gets a reference to the value associated with the given key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Merges two records, consuming both.
    ///
    /// If both records contain the same key, the value from the second record
    /// will overwrite the value from the first record.
    pub fn merge(self, record: Record) -> Self {
        Record(self.0.into_iter().chain(record.0).collect())
    }

    /// Merges another record into this one in place.
    pub fn merge_inplace(&mut self, record: Record) {
        self.0.extend(record.0);
    }

    getter!(
        /// Gets a scalar value from the record.
        get_scalar, Scalar, f64
    );

    getter!(
        /// Gets an integer from the record.
        get_integer, Integer, i64
    );

    getter!(
        /// Gets a boolean flag from the record.
        get_flag, Flag, bool
    );

    getter!(
        /// Gets a 1-dimensional array from the record.
        get_array1, Array1, Vec<f64>
    );

    getter!(
        /// Gets a string value from the record.
        get_string, String, String
    );

    /// Checks if the record is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of key-value pairs.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_getters() {
        let record = Record::from_slice(&[
            ("id", RecordValue::Integer(7)),
            ("params", RecordValue::Array1(vec![0.5, 1.5])),
            ("reason", RecordValue::String("stall".to_string())),
        ]);
        assert_eq!(record.get_integer("id"), Ok(7));
        assert_eq!(record.get_array1("params"), Ok(vec![0.5, 1.5]));
        assert_eq!(
            record.get_scalar("id"),
            Err(TunerError::RecordValueTypeError("Scalar".to_string()))
        );
        assert_eq!(
            record.get_flag("missing"),
            Err(TunerError::RecordKeyError("missing".to_string()))
        );
    }

    #[test]
    fn test_merge_overwrites() {
        let a = Record::from_scalar("x", 1.0);
        let b = Record::from_slice(&[
            ("x", RecordValue::Scalar(2.0)),
            ("y", RecordValue::Flag(true)),
        ]);
        let merged = a.merge(b);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get_scalar("x"), Ok(2.0));
    }

    #[test]
    fn test_display() {
        assert_eq!(RecordValue::Array1(vec![1.0, 0.25]).to_string(), "1;0.25");
        assert_eq!(RecordValue::Flag(true).to_string(), "true");
    }
}
