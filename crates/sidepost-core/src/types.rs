//! Type tags and the coercion registry.
//!
//! Every writable attribute declares a type tag (`"integer"`, `"datetime"`,
//! `"array_of_string"`, ...). Before a value is assigned to a record the
//! pipeline runs it through the tag's `write` coercion; outer layers can use the
//! `read` (render back to JSON) and `params` (query-string parsing) directions
//! of the same entry.
//!
//! The registry is an ordinary constructed value, not process-global state:
//! build one with [`TypeRegistry::with_builtins`], add or remove custom tags
//! during setup, then share it by reference for the lifetime of the process.
//! Additions and removals take effect for subsequent coercions, so keep edits
//! out of in-flight persistence calls.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Offset, Utc};
use regex::Regex;
use serde_json::Value as JsonValue;

use crate::error::{ConfigError, Error, Result};
use crate::value::Value;

/// The `write` / `params` direction: raw JSON in, typed [`Value`] out.
///
/// The `&str` argument is the attribute name, used for error context.
pub type WriteFn = Arc<dyn Fn(&str, &JsonValue) -> Result<Value> + Send + Sync>;

/// The `read` direction: typed [`Value`] rendered back to JSON.
pub type ReadFn = Arc<dyn Fn(&Value) -> JsonValue + Send + Sync>;

/// Coercion functions registered under one type tag.
#[derive(Clone)]
pub struct TypeEntry {
    write: WriteFn,
    read: ReadFn,
    params: WriteFn,
}

impl TypeEntry {
    /// Build an entry from a `write` coercion; `params` defaults to the same
    /// function and `read` to [`Value::to_json`].
    #[must_use]
    pub fn new(write: WriteFn) -> Self {
        Self {
            params: write.clone(),
            write,
            read: Arc::new(Value::to_json),
        }
    }

    /// Build an entry from a plain closure.
    pub fn from_fn<F>(write: F) -> Self
    where
        F: Fn(&str, &JsonValue) -> Result<Value> + Send + Sync + 'static,
    {
        Self::new(Arc::new(write))
    }

    /// Replace the `read` direction.
    #[must_use]
    pub fn with_read(mut self, read: ReadFn) -> Self {
        self.read = read;
        self
    }

    /// Replace the `params` direction.
    #[must_use]
    pub fn with_params(mut self, params: WriteFn) -> Self {
        self.params = params;
        self
    }
}

impl fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeEntry").finish_non_exhaustive()
    }
}

/// Maps type tags to their coercion entries.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    entries: HashMap<String, TypeEntry>,
}

impl TypeRegistry {
    /// An empty registry with no tags at all.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with every built-in tag: `string`, `integer`,
    /// `float`, `big_decimal`, `boolean`, `date`, `datetime`, `hash`, `array`,
    /// and `array_of_<scalar>` for each scalar tag.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        let scalars: [(&str, WriteFn); 7] = [
            ("string", Arc::new(cast_string)),
            ("integer", Arc::new(cast_integer)),
            ("float", Arc::new(cast_float)),
            ("big_decimal", Arc::new(cast_big_decimal)),
            ("boolean", Arc::new(cast_boolean)),
            ("date", Arc::new(cast_date)),
            ("datetime", Arc::new(cast_datetime)),
        ];

        for (tag, write) in scalars {
            registry.register(format!("array_of_{tag}"), TypeEntry::new(array_of(write.clone())));
            registry.register(tag, TypeEntry::new(write));
        }

        registry.register("hash", TypeEntry::from_fn(cast_hash));
        registry.register("array", TypeEntry::from_fn(cast_array));
        registry
    }

    /// Register (or replace) a tag. Takes effect for subsequent coercions.
    pub fn register(&mut self, tag: impl Into<String>, entry: TypeEntry) {
        let tag = tag.into();
        tracing::debug!(tag = %tag, "Registering type");
        self.entries.insert(tag, entry);
    }

    /// Remove a tag, returning its entry if it was present.
    pub fn remove(&mut self, tag: &str) -> Option<TypeEntry> {
        self.entries.remove(tag)
    }

    /// True if `tag` is registered.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }

    /// Run the `write` coercion for `tag` against a raw payload value.
    pub fn coerce_write(&self, tag: &str, attribute: &str, raw: &JsonValue) -> Result<Value> {
        let entry = self.entry(tag)?;
        (entry.write)(attribute, raw)
    }

    /// Run the `params` coercion for `tag` (query-string direction).
    pub fn coerce_params(&self, tag: &str, attribute: &str, raw: &JsonValue) -> Result<Value> {
        let entry = self.entry(tag)?;
        (entry.params)(attribute, raw)
    }

    /// Render a typed value back to JSON through the tag's `read` direction.
    pub fn render_read(&self, tag: &str, value: &Value) -> Result<JsonValue> {
        let entry = self.entry(tag)?;
        Ok((entry.read)(value))
    }

    fn entry(&self, tag: &str) -> Result<&TypeEntry> {
        self.entries
            .get(tag)
            .ok_or_else(|| Error::Config(ConfigError::UnknownType(tag.to_string())))
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        tags.sort_unstable();
        f.debug_struct("TypeRegistry").field("tags", &tags).finish()
    }
}

// ============================================================================
// Built-in coercions
// ============================================================================

fn cast_string(_attribute: &str, raw: &JsonValue) -> Result<Value> {
    match raw {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::String(s) => Ok(Value::Text(s.clone())),
        other => Ok(Value::Text(other.to_string())),
    }
}

fn cast_integer(attribute: &str, raw: &JsonValue) -> Result<Value> {
    match raw {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(Value::Int(i));
            }
            // Integral floats are accepted; fractional input is not truncated.
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                    Ok(Value::Int(f as i64))
                }
                _ => Err(Error::typecast(attribute, raw, "not an integral number")),
            }
        }
        JsonValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Err(Error::typecast(
                    attribute,
                    raw,
                    "blank string cannot be cast to integer",
                ));
            }
            trimmed
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| Error::typecast(attribute, raw, e))
        }
        other => Err(Error::typecast(
            attribute,
            other,
            "expected an integer or numeric string",
        )),
    }
}

fn cast_float(attribute: &str, raw: &JsonValue) -> Result<Value> {
    match raw {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::Number(n) => n
            .as_f64()
            .map(Value::Float)
            .ok_or_else(|| Error::typecast(attribute, raw, "number out of range for float")),
        JsonValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Err(Error::typecast(
                    attribute,
                    raw,
                    "blank string cannot be cast to float",
                ));
            }
            trimmed
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| Error::typecast(attribute, raw, e))
        }
        other => Err(Error::typecast(
            attribute,
            other,
            "expected a float or numeric string",
        )),
    }
}

/// Strict decimal literal: optional sign, digits with optional fraction,
/// optional exponent. Compiled once and cached.
fn decimal_literal() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?$")
            .unwrap_or_else(|e| panic!("decimal literal regex failed to compile: {e}"))
    })
}

fn cast_big_decimal(attribute: &str, raw: &JsonValue) -> Result<Value> {
    match raw {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::Number(n) => Ok(Value::Decimal(n.to_string())),
        JsonValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Err(Error::typecast(
                    attribute,
                    raw,
                    "blank string cannot be cast to big_decimal",
                ));
            }
            if decimal_literal().is_match(trimmed) {
                Ok(Value::Decimal(trimmed.to_string()))
            } else {
                Err(Error::typecast(attribute, raw, "invalid decimal literal"))
            }
        }
        other => Err(Error::typecast(
            attribute,
            other,
            "expected a decimal or numeric string",
        )),
    }
}

fn cast_boolean(attribute: &str, raw: &JsonValue) -> Result<Value> {
    match raw {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::Bool(b) => Ok(Value::Bool(*b)),
        JsonValue::Number(n) => match n.as_i64() {
            Some(1) => Ok(Value::Bool(true)),
            Some(0) => Ok(Value::Bool(false)),
            _ => Err(Error::typecast(attribute, raw, "unrecognized boolean integer")),
        },
        JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "on" | "1" => Ok(Value::Bool(true)),
            "false" | "f" | "no" | "n" | "off" | "0" => Ok(Value::Bool(false)),
            _ => Err(Error::typecast(attribute, raw, "unrecognized boolean string")),
        },
        other => Err(Error::typecast(attribute, other, "expected a boolean")),
    }
}

/// Partial date form: `YYYY-MM`, day defaulting to 1.
fn partial_date(trimmed: &str) -> Option<NaiveDate> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^(\d{4})-(\d{1,2})$")
            .unwrap_or_else(|e| panic!("partial date regex failed to compile: {e}"))
    });
    let caps = re.captures(trimmed)?;
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn cast_date(attribute: &str, raw: &JsonValue) -> Result<Value> {
    match raw {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::String(s) => {
            let trimmed = s.trim();
            if let Some(date) = partial_date(trimmed) {
                return Ok(Value::Date(date));
            }
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
                return Ok(Value::Date(date));
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
                return Ok(Value::Date(dt.date_naive()));
            }
            match NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
                Ok(dt) => Ok(Value::Date(dt.date())),
                Err(e) => Err(Error::typecast(attribute, raw, e)),
            }
        }
        other => Err(Error::typecast(
            attribute,
            other,
            "expected a date-like string",
        )),
    }
}

fn cast_datetime(attribute: &str, raw: &JsonValue) -> Result<Value> {
    match raw {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::String(s) => {
            let trimmed = s.trim();
            // Offset-carrying forms keep their offset.
            if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
                return Ok(Value::DateTime(dt));
            }
            if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S %z") {
                return Ok(Value::DateTime(dt));
            }
            // Offset-less forms are taken as UTC.
            let utc = Utc.fix();
            for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
                    return Ok(Value::DateTime(DateTime::from_naive_utc_and_offset(
                        naive, utc,
                    )));
                }
            }
            let date = if let Some(date) = partial_date(trimmed) {
                Some(date)
            } else {
                NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()
            };
            match date {
                Some(date) => {
                    let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(|| {
                        Error::typecast(attribute, raw, "date has no midnight representation")
                    })?;
                    Ok(Value::DateTime(DateTime::from_naive_utc_and_offset(
                        midnight, utc,
                    )))
                }
                None => Err(Error::typecast(attribute, raw, "unparsable datetime")),
            }
        }
        other => Err(Error::typecast(
            attribute,
            other,
            "expected a datetime-like string",
        )),
    }
}

fn cast_hash(attribute: &str, raw: &JsonValue) -> Result<Value> {
    match raw {
        JsonValue::Object(_) => Ok(Value::Json(raw.clone())),
        other => Err(Error::typecast(
            attribute,
            other,
            format!("expected an object, got {}", json_kind(other)),
        )),
    }
}

fn cast_array(attribute: &str, raw: &JsonValue) -> Result<Value> {
    match raw {
        JsonValue::Array(items) => Ok(Value::Array(items.iter().map(Value::from_json).collect())),
        other => Err(Error::typecast(
            attribute,
            other,
            format!("expected an array, got {}", json_kind(other)),
        )),
    }
}

/// Lift a scalar coercion to `array_of_<tag>`: every element must coerce, and
/// scalars/null do not auto-wrap into singleton arrays.
fn array_of(element: WriteFn) -> WriteFn {
    Arc::new(move |attribute, raw| match raw {
        JsonValue::Array(items) => items
            .iter()
            .map(|item| element(attribute, item))
            .collect::<Result<Vec<Value>>>()
            .map(Value::Array),
        other => Err(Error::typecast(
            attribute,
            other,
            format!("expected an array, got {}", json_kind(other)),
        )),
    })
}

fn json_kind(raw: &JsonValue) -> &'static str {
    match raw {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> TypeRegistry {
        TypeRegistry::with_builtins()
    }

    #[test]
    fn test_nil_passes_through_scalars() {
        let r = registry();
        for tag in ["integer", "float", "big_decimal", "boolean", "date", "datetime"] {
            let out = r.coerce_write(tag, "attr", &JsonValue::Null).unwrap();
            assert_eq!(out, Value::Null, "tag {tag}");
        }
    }

    #[test]
    fn test_nil_fails_for_arrays() {
        let r = registry();
        assert!(r.coerce_write("array", "attr", &JsonValue::Null).is_err());
        assert!(
            r.coerce_write("array_of_integer", "attr", &JsonValue::Null)
                .is_err()
        );
    }

    #[test]
    fn test_string_stringifies_non_strings() {
        let r = registry();
        assert_eq!(
            r.coerce_write("string", "t", &json!(1)).unwrap(),
            Value::Text("1".into())
        );
        assert_eq!(
            r.coerce_write("string", "t", &json!(true)).unwrap(),
            Value::Text("true".into())
        );
        assert_eq!(
            r.coerce_write("string", "t", &json!("x")).unwrap(),
            Value::Text("x".into())
        );
    }

    #[test]
    fn test_integer_parses_numeric_strings() {
        let r = registry();
        assert_eq!(
            r.coerce_write("integer", "rank", &json!("40")).unwrap(),
            Value::Int(40)
        );
        assert_eq!(
            r.coerce_write("integer", "rank", &json!(40)).unwrap(),
            Value::Int(40)
        );
    }

    #[test]
    fn test_integer_blank_string_fails() {
        let r = registry();
        let err = r.coerce_write("integer", "rank", &json!("")).unwrap_err();
        assert!(err.to_string().contains("blank"));
    }

    #[test]
    fn test_integer_garbage_wraps_cause() {
        let r = registry();
        let err = r
            .coerce_write("integer", "rank", &json!("forty"))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("rank"));
        assert!(msg.contains("forty"));
        assert!(msg.contains("invalid digit"));
    }

    #[test]
    fn test_float_and_decimal_parse() {
        let r = registry();
        assert_eq!(
            r.coerce_write("float", "w", &json!("1.5")).unwrap(),
            Value::Float(1.5)
        );
        assert_eq!(
            r.coerce_write("big_decimal", "w", &json!("0.001")).unwrap(),
            Value::Decimal("0.001".into())
        );
        assert!(r.coerce_write("big_decimal", "w", &json!("1.2.3")).is_err());
        assert!(r.coerce_write("big_decimal", "w", &json!(" ")).is_err());
    }

    #[test]
    fn test_boolean_forms() {
        let r = registry();
        for truthy in [json!(true), json!("true"), json!("T"), json!("1"), json!(1), json!("on")] {
            assert_eq!(
                r.coerce_write("boolean", "b", &truthy).unwrap(),
                Value::Bool(true),
                "{truthy}"
            );
        }
        for falsy in [json!(false), json!("false"), json!("F"), json!("0"), json!(0), json!("off")]
        {
            assert_eq!(
                r.coerce_write("boolean", "b", &falsy).unwrap(),
                Value::Bool(false),
                "{falsy}"
            );
        }
        assert!(r.coerce_write("boolean", "b", &json!("maybe")).is_err());
        assert!(r.coerce_write("boolean", "b", &json!(2)).is_err());
    }

    #[test]
    fn test_partial_date_defaults_day_to_first() {
        let r = registry();
        assert_eq!(
            r.coerce_write("date", "on", &json!("2018-01")).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2018, 1, 1).unwrap())
        );
    }

    #[test]
    fn test_date_parses_and_rejects() {
        let r = registry();
        assert_eq!(
            r.coerce_write("date", "on", &json!("2018-01-06")).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2018, 1, 6).unwrap())
        );
        assert!(r.coerce_write("date", "on", &json!("not a date")).is_err());
        assert!(r.coerce_write("date", "on", &json!(7)).is_err());
    }

    #[test]
    fn test_datetime_preserves_explicit_offset() {
        let r = registry();
        let out = r
            .coerce_write("datetime", "at", &json!("2018-01-06T04:36:00+04:00"))
            .unwrap();
        let dt = out.as_datetime().unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 4 * 3600);
    }

    #[test]
    fn test_datetime_offsetless_is_utc() {
        let r = registry();
        let out = r
            .coerce_write("datetime", "at", &json!("2018-01-06 04:36:00"))
            .unwrap();
        let dt = out.as_datetime().unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 0);
        assert_eq!(dt.date_naive(), NaiveDate::from_ymd_opt(2018, 1, 6).unwrap());
    }

    #[test]
    fn test_datetime_partial_date() {
        let r = registry();
        let out = r.coerce_write("datetime", "at", &json!("2018-01")).unwrap();
        let dt = out.as_datetime().unwrap();
        assert_eq!(dt.date_naive(), NaiveDate::from_ymd_opt(2018, 1, 1).unwrap());
    }

    #[test]
    fn test_hash_requires_object() {
        let r = registry();
        assert!(r.coerce_write("hash", "meta", &json!({"a": 1})).is_ok());
        assert!(r.coerce_write("hash", "meta", &json!([1])).is_err());
        assert!(r.coerce_write("hash", "meta", &json!("x")).is_err());
    }

    #[test]
    fn test_array_does_not_wrap_scalars() {
        let r = registry();
        assert_eq!(
            r.coerce_write("array", "tags", &json!([1, "a"])).unwrap(),
            Value::Array(vec![Value::Int(1), Value::Text("a".into())])
        );
        assert!(r.coerce_write("array", "tags", &json!(1)).is_err());
    }

    #[test]
    fn test_array_of_integer_element_failure_fails_whole() {
        let r = registry();
        assert_eq!(
            r.coerce_write("array_of_integer", "ranks", &json!(["1", 2]))
                .unwrap(),
            Value::Array(vec![Value::Int(1), Value::Int(2)])
        );
        assert!(
            r.coerce_write("array_of_integer", "ranks", &json!(["1", "x"]))
                .is_err()
        );
    }

    #[test]
    fn test_custom_type_register_and_remove() {
        let mut r = registry();
        r.register(
            "upcase_string",
            TypeEntry::from_fn(|attribute, raw| match raw {
                JsonValue::String(s) => Ok(Value::Text(s.to_uppercase())),
                other => Err(Error::typecast(attribute, other, "expected a string")),
            }),
        );
        assert_eq!(
            r.coerce_write("upcase_string", "name", &json!("abc")).unwrap(),
            Value::Text("ABC".into())
        );
        r.remove("upcase_string");
        assert!(matches!(
            r.coerce_write("upcase_string", "name", &json!("abc")),
            Err(Error::Config(ConfigError::UnknownType(_)))
        ));
    }

    #[test]
    fn test_render_read_defaults() {
        let r = registry();
        let rendered = r
            .render_read("date", &Value::Date(NaiveDate::from_ymd_opt(2020, 2, 2).unwrap()))
            .unwrap();
        assert_eq!(rendered, json!("2020-02-02"));
    }
}
