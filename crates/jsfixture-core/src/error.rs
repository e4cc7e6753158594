//! Throw completions
//!
//! Every fallible semantic operation in this crate returns `Result<T, Thrown>`.
//! `Thrown` carries the JavaScript value being thrown, so an engine can hand it
//! straight to a `catch` clause or report it as uncaught.

use std::fmt;

use thiserror::Error;

use crate::value::{JsValue, ObjectRef};

/// Built-in error constructors the semantic core can raise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    TypeError,
    RangeError,
    SyntaxError,
    ReferenceError,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::ReferenceError => "ReferenceError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A JavaScript throw completion
#[derive(Debug, Clone, Error)]
#[error("{}", describe(.0))]
pub struct Thrown(pub JsValue);

fn describe(value: &JsValue) -> String {
    match value {
        JsValue::Object(obj) => match obj.error_parts() {
            Some((name, message)) if message.is_empty() => name,
            Some((name, message)) => format!("{name}: {message}"),
            None => format!("[object {}]", obj.class_name()),
        },
        JsValue::String(s) => s.clone(),
        other => format!("{other:?}"),
    }
}

impl Thrown {
    /// Throw an arbitrary value
    pub fn value(value: JsValue) -> Self {
        Self(value)
    }

    /// Throw a fresh error object of the given kind
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self(JsValue::Object(ObjectRef::new_error(kind.name(), message)))
    }

    /// Create a type error
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::error(ErrorKind::TypeError, message)
    }

    /// Create a range error
    pub fn range_error(message: impl Into<String>) -> Self {
        Self::error(ErrorKind::RangeError, message)
    }

    /// Create a syntax error
    pub fn syntax_error(message: impl Into<String>) -> Self {
        Self::error(ErrorKind::SyntaxError, message)
    }

    /// Create a reference error
    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::error(ErrorKind::ReferenceError, message)
    }

    pub fn into_value(self) -> JsValue {
        self.0
    }

    /// Error name and message when the thrown value is Error-like
    pub fn error_parts(&self) -> Option<(String, String)> {
        match &self.0 {
            JsValue::Object(obj) => obj.error_parts(),
            _ => None,
        }
    }
}

/// Result alias for semantic operations
pub type JsResult<T> = Result<T, Thrown>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_error_display() {
        let err = Thrown::type_error("Cannot convert a Symbol value to a number");
        assert_eq!(
            err.to_string(),
            "TypeError: Cannot convert a Symbol value to a number"
        );
        assert_eq!(
            err.error_parts(),
            Some((
                "TypeError".to_string(),
                "Cannot convert a Symbol value to a number".to_string()
            ))
        );
    }

    #[test]
    fn test_primitive_throw_has_no_error_parts() {
        let err = Thrown::value(JsValue::from("oops"));
        assert!(err.error_parts().is_none());
        assert_eq!(err.to_string(), "oops");
    }
}
