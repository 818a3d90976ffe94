//! JSON body encoding and typed response decoding.
//!
//! The encoding half renders [`serde_json::Value`] bodies to bytes with an
//! optional key-style conversion and pretty printing. The decoding half
//! deserializes response bytes into a caller type, optionally rewriting
//! camelCase wire keys to the snake_case field names of derived Rust
//! structs first.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::errors::Error;

/// Configuration for rendering a JSON body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Pretty-print the rendered body.
    pub pretty: bool,
    /// Key-style conversion applied before rendering.
    pub keys: KeyEncoding,
}

/// Key-style conversion applied when encoding a body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyEncoding {
    /// Keys are rendered as-is.
    #[default]
    Exact,
    /// snake_case keys are rewritten to camelCase on the wire.
    CamelCase,
}

/// Key-style conversion applied when decoding a response body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyDecoding {
    /// Keys must match the target type's field names exactly.
    #[default]
    Exact,
    /// camelCase response keys are rewritten to snake_case before decoding,
    /// so plainly derived structs match camelCase APIs without per-field
    /// rename attributes.
    ConvertCamelCase,
}

/// Renders a JSON value to body bytes per the encoder configuration.
pub(crate) fn encode_value(value: &Value, config: EncoderConfig) -> Result<Vec<u8>, Error> {
    let rendered = match config.keys {
        KeyEncoding::Exact => value.clone(),
        KeyEncoding::CamelCase => rewrite_keys(value.clone(), &snake_to_camel),
    };
    let result = if config.pretty {
        serde_json::to_vec_pretty(&rendered)
    } else {
        serde_json::to_vec(&rendered)
    };
    result.map_err(Error::Encoding)
}

/// Converts a serialized value into a flat parameter map.
///
/// Anything that is not a JSON object fails with the dedicated
/// [`Error::ParameterConversion`], never the general encoding error, so
/// callers can distinguish "value has the wrong shape" from "value could not
/// be serialized".
pub(crate) fn to_parameters(value: &Value) -> Result<Map<String, Value>, Error> {
    match value {
        Value::Object(map) => Ok(map.clone()),
        _ => Err(Error::ParameterConversion),
    }
}

/// Decodes response bytes into `T`, applying the key-decoding strategy.
///
/// `context` names the decode target in error messages.
pub(crate) fn decode_body<T: DeserializeOwned>(
    body: &[u8],
    keys: KeyDecoding,
    context: &str,
) -> Result<T, Error> {
    match keys {
        KeyDecoding::Exact => serde_json::from_slice(body).map_err(|source| Error::Decoding {
            context: context.to_string(),
            source,
        }),
        KeyDecoding::ConvertCamelCase => {
            let value: Value =
                serde_json::from_slice(body).map_err(|source| Error::Decoding {
                    context: context.to_string(),
                    source,
                })?;
            let value = rewrite_keys(value, &camel_to_snake);
            serde_json::from_value(value).map_err(|source| Error::Decoding {
                context: context.to_string(),
                source,
            })
        }
    }
}

/// Rewrites every object key in a JSON tree with the given renamer.
fn rewrite_keys(value: Value, rename: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (rename(&key), rewrite_keys(value, rename)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| rewrite_keys(item, rename))
                .collect(),
        ),
        other => other,
    }
}

fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (index, ch) in key.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if index > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for ch in key.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.push(ch.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}
