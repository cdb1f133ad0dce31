//! Error types for object operations

use thiserror::Error;

use crate::value::{JsValue, PropertyKey};

/// Main error type for the object model
#[derive(Debug, Error)]
pub enum JsError {
    #[error("TypeError: {message}")]
    TypeError { message: String },

    #[error("ReferenceError: {message}")]
    ReferenceError { message: String },

    #[error("RangeError: {message}")]
    RangeError { message: String },

    /// A security policy refused the operation
    #[error("Error: Permission denied to access {}", format_property(.property))]
    AccessDenied { property: Option<String> },

    #[error("InternalError: out of memory")]
    OutOfMemory,

    #[error("Internal error: {0}")]
    Internal(String),

    /// A script-visible value was thrown (by a native function or a trap)
    #[error("uncaught exception: {}", .value.to_js_string())]
    ThrownValue { value: JsValue },
}

fn format_property(property: &Option<String>) -> String {
    match property {
        Some(name) => format!("property \"{}\"", name),
        None => "object".to_string(),
    }
}

impl JsError {
    pub fn type_error(message: impl Into<String>) -> Self {
        JsError::TypeError {
            message: message.into(),
        }
    }

    /// `name is not defined`
    pub fn reference_error(name: impl Into<String>) -> Self {
        JsError::ReferenceError {
            message: format!("{} is not defined", name.into()),
        }
    }

    /// Temporal dead zone read of a let/const/class binding
    pub fn uninitialized_lexical(name: impl Into<String>) -> Self {
        JsError::ReferenceError {
            message: format!(
                "can't access lexical declaration '{}' before initialization",
                name.into()
            ),
        }
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        JsError::RangeError {
            message: message.into(),
        }
    }

    pub fn access_denied(key: Option<&PropertyKey>) -> Self {
        JsError::AccessDenied {
            property: key.map(|k| k.to_string()),
        }
    }

    pub fn not_a_function(what: impl Into<String>) -> Self {
        JsError::type_error(format!("{} is not a function", what.into()))
    }

    pub fn not_a_constructor(what: impl Into<String>) -> Self {
        JsError::type_error(format!("{} is not a constructor", what.into()))
    }

    /// Create an internal error for states that only a broken caller can reach
    pub fn internal_error(message: impl Into<String>) -> Self {
        JsError::Internal(message.into())
    }

    pub fn thrown(value: JsValue) -> Self {
        JsError::ThrownValue { value }
    }

    /// The thrown value, when this error carries one
    pub fn thrown_value(&self) -> Option<&JsValue> {
        match self {
            JsError::ThrownValue { value } => Some(value),
            _ => None,
        }
    }

    /// Value stored on an errored module record
    pub fn to_value(&self) -> JsValue {
        match self {
            JsError::ThrownValue { value } => value.clone(),
            other => JsValue::from(other.to_string()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ObjectOpResult
// ═══════════════════════════════════════════════════════════════════════════════

/// Why an internal method declined to perform a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCode {
    CantRedefineProp,
    CantDefinePropObjectNotExtensible,
    ReadOnly,
    CantDelete,
    CantSetProto,
    CantPreventExtensions,
    /// A scripted proxy trap reported failure
    TrapReturnedFalsish,
    AccessDenied,
}

/// Outcome of define/delete/set/setPrototype/preventExtensions.
///
/// A failure is not an exception: sloppy-mode callers ignore it, strict
/// callers turn it into a `TypeError` via [`ObjectOpResult::check_strict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum ObjectOpResult {
    Succeeded,
    Failed(FailureCode),
}

impl ObjectOpResult {
    #[inline]
    pub fn succeed() -> Self {
        ObjectOpResult::Succeeded
    }

    #[inline]
    pub fn fail(code: FailureCode) -> Self {
        ObjectOpResult::Failed(code)
    }

    #[inline]
    pub fn ok(&self) -> bool {
        matches!(self, ObjectOpResult::Succeeded)
    }

    pub fn failure_code(&self) -> Option<FailureCode> {
        match self {
            ObjectOpResult::Succeeded => None,
            ObjectOpResult::Failed(code) => Some(*code),
        }
    }

    /// Turn a failure into the error a strict-mode caller would see
    pub fn check_strict(self, key: Option<&PropertyKey>) -> Result<(), JsError> {
        match self {
            ObjectOpResult::Succeeded => Ok(()),
            ObjectOpResult::Failed(code) => Err(failure_error(code, key)),
        }
    }
}

fn failure_error(code: FailureCode, key: Option<&PropertyKey>) -> JsError {
    let name = key.map_or_else(|| "object".to_string(), |k| k.to_string());
    match code {
        FailureCode::CantRedefineProp => {
            JsError::type_error(format!("can't redefine non-configurable property {}", name))
        }
        FailureCode::CantDefinePropObjectNotExtensible => JsError::type_error(format!(
            "can't define property {}: Object is not extensible",
            name
        )),
        FailureCode::ReadOnly => JsError::type_error(format!("{} is read-only", name)),
        FailureCode::CantDelete => JsError::type_error(format!(
            "property {} is non-configurable and can't be deleted",
            name
        )),
        FailureCode::CantSetProto => JsError::type_error("can't set prototype of this object"),
        FailureCode::CantPreventExtensions => {
            JsError::type_error("can't prevent extensions on this proxy object")
        }
        FailureCode::TrapReturnedFalsish => {
            JsError::type_error(format!("proxy trap returned falsish for property {}", name))
        }
        FailureCode::AccessDenied => JsError::access_denied(key),
    }
}
