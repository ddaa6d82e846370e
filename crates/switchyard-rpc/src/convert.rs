//! Conversion tables for wire ↔ domain value marshaling.
//!
//! Each service carries two converter lookup tables: one keyed by class tag
//! (the `__class` marker on tagged wire objects) and one keyed by object
//! shape (the sorted field-name signature). The concrete converters are
//! supplied by the embedder; this module owns table storage, lookup, the
//! right-biased merge used during aggregation, and the bigint-safe default
//! encode path for integers that exceed the interoperable float range.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

/// Field name marking a class-tagged wire object.
pub const CLASS_TAG: &str = "__class";

/// Largest integer magnitude representable exactly in a 64-bit float.
///
/// Integers beyond this bound are rendered as decimal strings on encode so
/// peers with float-only number handling cannot silently corrupt them.
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// Fault raised by a converter.
#[derive(Debug, Clone, Error)]
#[error("conversion failed: {message}")]
pub struct ConvertError {
    message: String,
}

impl ConvertError {
    /// Creates a conversion fault with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Converter between a wire representation and a typed domain value.
///
/// Implementations are supplied by the embedder; the dispatch core only
/// routes values through whichever converter the tables select.
pub trait ClassConverter: Send + Sync {
    /// Converts a wire value into its domain representation.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError`] when the wire value does not match the
    /// converter's expected form.
    fn decode(&self, value: Value) -> Result<Value, ConvertError>;

    /// Converts a domain value back into its wire representation.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError`] when the domain value cannot be represented
    /// on the wire.
    fn encode(&self, value: Value) -> Result<Value, ConvertError>;
}

/// Canonical shape signature of a wire object.
///
/// The signature is the object's field names, sorted and joined, so lookup
/// is independent of field order in the incoming JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShapeKey(String);

impl ShapeKey {
    /// Builds a shape key from an explicit field-name list.
    #[must_use]
    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = fields.into_iter().map(Into::into).collect();
        names.sort_unstable();
        Self(names.join(","))
    }

    /// Builds the shape key describing the given wire object.
    #[must_use]
    pub fn of_object(object: &Map<String, Value>) -> Self {
        Self::from_fields(object.keys().map(String::as_str))
    }

    /// Returns the canonical signature string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Converter lookup tables carried by a service.
#[derive(Clone, Default)]
pub struct ConversionTables {
    by_class: HashMap<String, Arc<dyn ClassConverter>>,
    by_shape: HashMap<ShapeKey, Arc<dyn ClassConverter>>,
}

impl fmt::Debug for ConversionTables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionTables")
            .field("class_keys", &self.by_class.keys().collect::<Vec<_>>())
            .field("shape_keys", &self.by_shape.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ConversionTables {
    /// Creates empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a converter under a class tag, replacing any existing entry.
    pub fn register_class(&mut self, tag: impl Into<String>, converter: Arc<dyn ClassConverter>) {
        self.by_class.insert(tag.into(), converter);
    }

    /// Registers a converter under a shape key, replacing any existing entry.
    pub fn register_shape(&mut self, key: ShapeKey, converter: Arc<dyn ClassConverter>) {
        self.by_shape.insert(key, converter);
    }

    /// Looks up the converter registered for a class tag.
    #[must_use]
    pub fn class_converter(&self, tag: &str) -> Option<&Arc<dyn ClassConverter>> {
        self.by_class.get(tag)
    }

    /// Looks up the converter registered for a shape key.
    #[must_use]
    pub fn shape_converter(&self, key: &ShapeKey) -> Option<&Arc<dyn ClassConverter>> {
        self.by_shape.get(key)
    }

    /// Returns `true` when neither table has entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_class.is_empty() && self.by_shape.is_empty()
    }

    /// Merges member tables in order, later members winning on key
    /// collision. The two tables merge independently.
    #[must_use]
    pub fn merged<'a, I>(members: I) -> Self
    where
        I: IntoIterator<Item = &'a Self>,
    {
        let mut merged = Self::new();
        for member in members {
            for (tag, converter) in &member.by_class {
                merged.by_class.insert(tag.clone(), Arc::clone(converter));
            }
            for (key, converter) in &member.by_shape {
                merged.by_shape.insert(key.clone(), Arc::clone(converter));
            }
        }
        merged
    }

    /// Decodes an inbound parameter value.
    ///
    /// Class-tagged objects route through the class table; untagged objects
    /// route through the shape table; everything else passes through
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Propagates the selected converter's [`ConvertError`].
    pub fn decode_value(&self, value: Value) -> Result<Value, ConvertError> {
        if let Some(converter) = self.select(&value) {
            return converter.decode(value);
        }
        Ok(value)
    }

    /// Encodes an outbound result value.
    ///
    /// Objects matching a registered shape route through that converter;
    /// afterwards the bigint-safe pass rewrites any integer outside the
    /// float-safe range as a decimal string.
    ///
    /// # Errors
    ///
    /// Propagates the selected converter's [`ConvertError`].
    pub fn encode_value(&self, value: Value) -> Result<Value, ConvertError> {
        let encoded = if let Some(converter) = self.select(&value) {
            converter.encode(value)?
        } else {
            value
        };
        Ok(stringify_unsafe_integers(encoded))
    }

    fn select(&self, value: &Value) -> Option<&Arc<dyn ClassConverter>> {
        let object = value.as_object()?;
        if let Some(tag) = object.get(CLASS_TAG).and_then(Value::as_str)
            && let Some(converter) = self.by_class.get(tag)
        {
            return Some(converter);
        }
        self.by_shape.get(&ShapeKey::of_object(object))
    }
}

/// Rewrites integers outside the float-safe range as decimal strings,
/// recursing through arrays and objects.
fn stringify_unsafe_integers(value: Value) -> Value {
    match value {
        Value::Number(number) => {
            let unsafe_magnitude = number
                .as_i64()
                .map(i64::unsigned_abs)
                .or_else(|| number.as_u64())
                .is_some_and(|magnitude| magnitude > MAX_SAFE_INTEGER);
            if unsafe_magnitude {
                Value::String(number.to_string())
            } else {
                Value::Number(number)
            }
        }
        Value::Array(items) => {
            Value::Array(items.into_iter().map(stringify_unsafe_integers).collect())
        }
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(name, field)| (name, stringify_unsafe_integers(field)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    /// Converter that tags every value it touches, so tests can observe
    /// which table entry handled a value.
    struct TaggingConverter {
        label: &'static str,
    }

    impl TaggingConverter {
        fn shared(label: &'static str) -> Arc<dyn ClassConverter> {
            Arc::new(Self { label })
        }
    }

    impl ClassConverter for TaggingConverter {
        fn decode(&self, value: Value) -> Result<Value, ConvertError> {
            Ok(json!({"decoded_by": self.label, "value": value}))
        }

        fn encode(&self, value: Value) -> Result<Value, ConvertError> {
            Ok(json!({"encoded_by": self.label, "value": value}))
        }
    }

    #[test]
    fn shape_key_is_order_independent() {
        let forward = ShapeKey::from_fields(["lat", "lon"]);
        let reverse = ShapeKey::from_fields(["lon", "lat"]);
        assert_eq!(forward, reverse);
        assert_eq!(forward.as_str(), "lat,lon");
    }

    #[test]
    fn class_tagged_values_use_the_class_table() {
        let mut tables = ConversionTables::new();
        tables.register_class("Money", TaggingConverter::shared("class"));

        let decoded = tables
            .decode_value(json!({"__class": "Money", "amount": 100}))
            .expect("decode");
        assert_eq!(decoded["decoded_by"], "class");
    }

    #[test]
    fn untagged_objects_fall_back_to_the_shape_table() {
        let mut tables = ConversionTables::new();
        tables.register_shape(
            ShapeKey::from_fields(["amount", "currency"]),
            TaggingConverter::shared("shape"),
        );

        let decoded = tables
            .decode_value(json!({"currency": "EUR", "amount": 100}))
            .expect("decode");
        assert_eq!(decoded["decoded_by"], "shape");
    }

    #[test]
    fn unmatched_values_pass_through() {
        let tables = ConversionTables::new();
        assert_eq!(tables.decode_value(json!(41)).expect("decode"), json!(41));
        assert_eq!(
            tables.decode_value(json!({"x": 1})).expect("decode"),
            json!({"x": 1})
        );
    }

    #[test]
    fn merge_is_right_biased_per_table() {
        let mut first = ConversionTables::new();
        first.register_class("Money", TaggingConverter::shared("first"));
        first.register_class("Point", TaggingConverter::shared("first"));

        let mut second = ConversionTables::new();
        second.register_class("Money", TaggingConverter::shared("second"));

        let merged = ConversionTables::merged([&first, &second]);
        let via_money = merged
            .decode_value(json!({"__class": "Money"}))
            .expect("decode");
        assert_eq!(via_money["decoded_by"], "second");

        let via_point = merged
            .decode_value(json!({"__class": "Point"}))
            .expect("decode");
        assert_eq!(via_point["decoded_by"], "first");
    }

    #[test]
    fn encode_stringifies_out_of_range_integers() {
        let tables = ConversionTables::new();
        let encoded = tables
            .encode_value(json!({"big": 9_007_199_254_740_993_u64, "small": 12}))
            .expect("encode");
        assert_eq!(encoded["big"], json!("9007199254740993"));
        assert_eq!(encoded["small"], json!(12));
    }

    #[test]
    fn encode_preserves_boundary_integers() {
        let tables = ConversionTables::new();
        let encoded = tables
            .encode_value(json!([9_007_199_254_740_991_u64, -9_007_199_254_740_991_i64]))
            .expect("encode");
        assert_eq!(
            encoded,
            json!([9_007_199_254_740_991_u64, -9_007_199_254_740_991_i64])
        );
    }

    #[test]
    fn encode_recurses_into_nested_structures() {
        let tables = ConversionTables::new();
        let encoded = tables
            .encode_value(json!({"rows": [{"n": 18_446_744_073_709_551_615_u64}]}))
            .expect("encode");
        assert_eq!(encoded["rows"][0]["n"], json!("18446744073709551615"));
    }
}
