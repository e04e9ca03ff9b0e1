//! Typed path parameters.
//!
//! Raw captures from the matcher are coerced to their declared
//! [`ParamKind`] in template order; the first failure wins.

use thiserror::Error;
use tonic::Status;

use crate::routing::{ParamKind, PathParams, PathTemplate};

/// A coerced path variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Int32(i32),
    String(String),
}

/// Path variables after type coercion, in template order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypedParams {
    values: Vec<(String, ParamValue)>,
}

impl TypedParams {
    /// Coerce every variable `template` declares.
    pub fn bind(template: &PathTemplate, raw: &PathParams) -> Result<Self, Status> {
        let mut values = Vec::new();
        for (name, kind) in template.variables() {
            let text = raw
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
                .ok_or_else(|| missing(name))?;

            let value = match kind {
                ParamKind::Int32 => ParamValue::Int32(
                    parse_int32(text).map_err(|err| type_mismatch(name, &err))?,
                ),
                ParamKind::String => ParamValue::String(text.to_string()),
            };
            values.push((name.to_string(), value));
        }
        Ok(Self { values })
    }

    fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn int32(&self, name: &str) -> Result<i32, Status> {
        match self.get(name) {
            Some(ParamValue::Int32(value)) => Ok(*value),
            Some(ParamValue::String(text)) => {
                parse_int32(text).map_err(|err| type_mismatch(name, &err))
            }
            None => Err(missing(name)),
        }
    }

    pub fn string(&self, name: &str) -> Result<String, Status> {
        match self.get(name) {
            Some(ParamValue::String(text)) => Ok(text.clone()),
            Some(ParamValue::Int32(value)) => Ok(value.to_string()),
            None => Err(missing(name)),
        }
    }
}

fn missing(name: &str) -> Status {
    Status::invalid_argument(format!("missing parameter {name}"))
}

fn type_mismatch(name: &str, cause: &IntError) -> Status {
    Status::invalid_argument(format!(
        "type mismatch, parameter: {name}, error: {cause}"
    ))
}

/// Why a string is not a 32-bit integer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntError {
    #[error("parsing {0:?}: invalid syntax")]
    Syntax(String),
    #[error("parsing {0:?}: value out of range")]
    Range(String),
}

/// Parse an integer literal with an optional sign and base prefix.
///
/// `0x` selects hex, `0b` binary, `0o` or a bare leading `0` octal.
/// Underscores may separate digits or follow the prefix.
pub fn parse_int32(text: &str) -> Result<i32, IntError> {
    let syntax = || IntError::Syntax(text.to_string());

    let (negative, body) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let (radix, digits, prefixed) = match body.as_bytes() {
        [b'0', b'x' | b'X', ..] => (16, &body[2..], true),
        [b'0', b'b' | b'B', ..] => (2, &body[2..], true),
        [b'0', b'o' | b'O', ..] => (8, &body[2..], true),
        [b'0', _, ..] => (8, &body[1..], true),
        _ => (10, body, false),
    };

    // `_` must sit between digits, or directly after a base prefix.
    let mut previous_was_digit = prefixed;
    let mut cleaned = String::with_capacity(digits.len());
    for c in digits.chars() {
        if c == '_' {
            if !previous_was_digit {
                return Err(syntax());
            }
            previous_was_digit = false;
        } else {
            if !c.is_digit(radix) {
                return Err(syntax());
            }
            cleaned.push(c);
            previous_was_digit = true;
        }
    }
    if cleaned.is_empty() || !previous_was_digit {
        return Err(syntax());
    }

    let magnitude =
        u64::from_str_radix(&cleaned, radix).map_err(|_| IntError::Range(text.to_string()))?;
    let value = if negative {
        -(magnitude as i128)
    } else {
        magnitude as i128
    };
    i32::try_from(value).map_err(|_| IntError::Range(text.to_string()))
}
