//! Decoded callback payloads.
//!
//! `FormData` keeps every submitted value for every key, in the order keys
//! first appeared. Responses and forwarding only ever use the first value
//! of a key; the log keeps them all.

use serde::{ser::SerializeMap, Serialize, Serializer};

use crate::error::HookError;

/// Ordered mapping of key to submitted values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: Vec<(String, Vec<String>)>,
}

impl FormData {
    /// Creates an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a form from key/value pairs, grouping repeated keys.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut form = Self::new();
        for (key, value) in pairs {
            form.push(key, value);
        }
        form
    }

    /// Decodes an `application/x-www-form-urlencoded` body.
    ///
    /// # Errors
    ///
    /// Returns `HookError::InvalidBody` if the body is not UTF-8 or cannot
    /// be decoded as form pairs.
    pub fn parse_urlencoded(body: &[u8]) -> Result<Self, HookError> {
        let text = std::str::from_utf8(body)
            .map_err(|e| HookError::invalid_body(format!("body is not valid UTF-8: {e}")))?;

        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(text)
            .map_err(|e| HookError::invalid_body(format!("malformed form body: {e}")))?;

        Ok(Self::from_pairs(pairs))
    }

    /// Decodes an `application/json` body holding a single object.
    ///
    /// Strings are taken verbatim, `null` becomes an empty value, arrays
    /// contribute one value per element, and any other value is kept as
    /// its JSON text.
    ///
    /// # Errors
    ///
    /// Returns `HookError::InvalidBody` if the body is not a JSON object.
    pub fn parse_json(body: &[u8]) -> Result<Self, HookError> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| HookError::invalid_body(format!("malformed JSON body: {e}")))?;

        let serde_json::Value::Object(object) = value else {
            return Err(HookError::invalid_body("JSON body must be an object"));
        };

        let mut form = Self::new();
        for (key, value) in object {
            match value {
                serde_json::Value::Array(items) => {
                    for item in items {
                        form.push(key.clone(), json_scalar_text(item));
                    }
                },
                other => form.push(key, json_scalar_text(other)),
            }
        }
        Ok(form)
    }

    /// Appends a value, creating the key if it has not been seen.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.fields.push((key, vec![value])),
        }
    }

    /// Returns the first value submitted for `key`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.values(key).and_then(|values| values.first()).map(String::as_str)
    }

    /// Returns every value submitted for `key`.
    pub fn values(&self, key: &str) -> Option<&[String]> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, values)| values.as_slice())
    }

    /// Iterates over keys in submission order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    /// Iterates over each key with its first value, in submission order.
    ///
    /// Later values of multi-valued keys are dropped.
    pub fn first_values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().filter_map(|(key, values)| {
            values.first().map(|value| (key.as_str(), value.as_str()))
        })
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the form has no keys.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Renders the full form as the JSON text stored in the log.
    pub fn to_log_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// View that serializes as a `key -> first value` object.
    pub fn first_value_view(&self) -> FirstValues<'_> {
        FirstValues(self)
    }
}

impl Serialize for FormData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, values) in &self.fields {
            map.serialize_entry(key, values)?;
        }
        map.end()
    }
}

/// Serializes a form as `key -> first value`, in submission order.
#[derive(Debug, Clone, Copy)]
pub struct FirstValues<'a>(&'a FormData);

impl Serialize for FirstValues<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0.first_values() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

fn json_scalar_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
