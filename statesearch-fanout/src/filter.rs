//! Structured filters and their rendering into provider filter expressions.
//!
//! A [`FilterMap`] maps field names to either a literal (equality) or a
//! range constraint. [`build_filter`] renders it as an OData `$filter`
//! expression, one clause per equality or per present range bound, joined
//! with `and`.
//!
//! Entry order is preserved end to end, including when deserialising from
//! a JSON object, so identical input always renders the identical string.
//!
//! Literal values are embedded verbatim: embedded quotes are **not**
//! escaped and value types are not validated. Filters are expected to come
//! from trusted callers.

use std::fmt;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Conjunction placed between clauses.
const CONJUNCTION: &str = " and ";

/// Bounds of a range constraint on one field. Any subset may be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeBounds {
    /// Inclusive lower bound (`ge`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    /// Inclusive upper bound (`le`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
    /// Exclusive lower bound (`gt`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    /// Exclusive upper bound (`lt`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
}

impl RangeBounds {
    /// Present bounds paired with their OData operator, in rendering order.
    fn clauses(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        [
            ("ge", self.gte.as_ref()),
            ("le", self.lte.as_ref()),
            ("gt", self.gt.as_ref()),
            ("lt", self.lt.as_ref()),
        ]
        .into_iter()
        .filter_map(|(op, bound)| bound.map(|v| (op, v)))
    }
}

/// Constraint on a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// `field eq '<literal>'`.
    Equals(Value),
    /// One clause per present bound.
    Range(RangeBounds),
}

impl From<Value> for FilterValue {
    /// JSON objects become ranges (unknown keys are ignored); everything
    /// else is an equality literal.
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => {
                let bound = |key: &str| map.get(key).cloned();
                Self::Range(RangeBounds {
                    gte: bound("gte"),
                    lte: bound("lte"),
                    gt: bound("gt"),
                    lt: bound("lt"),
                })
            }
            other => Self::Equals(other),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Equals(Value::String(value.to_owned()))
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Equals(Value::String(value))
    }
}

impl From<RangeBounds> for FilterValue {
    fn from(bounds: RangeBounds) -> Self {
        Self::Range(bounds)
    }
}

impl Serialize for FilterValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Equals(value) => value.serialize(serializer),
            Self::Range(bounds) => bounds.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for FilterValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from)
    }
}

/// Ordered field → constraint mapping.
///
/// Inserting an existing field replaces its constraint in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterMap {
    entries: Vec<(String, FilterValue)>,
}

impl FilterMap {
    /// Create an empty filter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the constraint for `field`, keeping its original position if it
    /// was already present.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FilterValue>) {
        let field = field.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((field, value)),
        }
    }

    /// Builder form of [`FilterMap::insert`].
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.insert(field, value);
        self
    }

    /// Number of constrained fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no field is constrained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<K, V> FromIterator<(K, V)> for FilterMap
where
    K: Into<String>,
    V: Into<FilterValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (field, value) in iter {
            map.insert(field, value);
        }
        map
    }
}

impl Serialize for FilterMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (field, value) in &self.entries {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FilterMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FilterMapVisitor;

        impl<'de> Visitor<'de> for FilterMapVisitor {
            type Value = FilterMap;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a map of field names to values or range objects")
            }

            fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<FilterMap, M::Error> {
                let mut map = FilterMap::new();
                while let Some((field, value)) = access.next_entry::<String, FilterValue>()? {
                    map.insert(field, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(FilterMapVisitor)
    }
}

/// Render a filter map as an OData filter expression.
///
/// Returns `None` when no clause is produced (an empty map, or ranges with
/// no bounds), so callers send an unfiltered request rather than a
/// vacuous filter.
pub fn build_filter(filters: &FilterMap) -> Option<String> {
    let mut clauses: Vec<String> = Vec::new();

    for (field, value) in filters.iter() {
        match value {
            FilterValue::Range(bounds) => {
                for (op, bound) in bounds.clauses() {
                    clauses.push(format!("{field} {op} {}", literal_text(bound)));
                }
            }
            FilterValue::Equals(literal) => {
                clauses.push(format!("{field} eq '{}'", literal_text(literal)));
            }
        }
    }

    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(CONJUNCTION))
    }
}

/// Strings are emitted verbatim; other JSON values as their JSON text.
fn literal_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
