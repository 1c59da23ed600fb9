//! Classification of service failures into user-facing errors
//!
//! Every failure coming back from the services is turned into a
//! [`ClassifiedError`] exactly once, where the response is received. Above
//! that point only the category and the display message exist.
//!
//! Authentication failures go through an ordered table of rules: the first
//! rule whose matcher yields a message decides the category. The other
//! operations have a single fixed outcome each.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

lazy_static! {
    /// Server phrasings that mean "this value is already in use"
    static ref DUPLICATE_SIGNAL: Regex =
        Regex::new(r"(?i)already exists|unique|already registered|already taken").unwrap();
    static ref NOT_REGISTERED_SIGNAL: Regex = Regex::new(r"(?i)not registered").unwrap();
}

/// Raw failure of a call to one of the services
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceFailure {
    /// The request never produced a response
    #[error("request failed: {0}")]
    Transport(String),

    /// The service answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: Value },

    /// A 2xx response whose body did not have the expected shape
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ServiceFailure {
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceFailure::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&Value> {
        match self {
            ServiceFailure::Status { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Top-level string member of a JSON object body
    fn body_str(&self, key: &str) -> Option<&str> {
        self.body()?.get(key)?.as_str()
    }
}

/// The fixed set of error categories shown to the user
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    FormatUnsupported,
    FormatParseError,
    AuthNotFound,
    AuthDuplicateEmail,
    AuthDuplicateUsername,
    AuthValidationOther,
    AuthGeneric,
    UploadFailed,
    DetailLoadFailed,
    ReportFailed,
}

impl ErrorCategory {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCategory::FormatUnsupported => "FORMAT_UNSUPPORTED",
            ErrorCategory::FormatParseError => "FORMAT_PARSE_ERROR",
            ErrorCategory::AuthNotFound => "AUTH_NOT_FOUND",
            ErrorCategory::AuthDuplicateEmail => "AUTH_DUPLICATE_EMAIL",
            ErrorCategory::AuthDuplicateUsername => "AUTH_DUPLICATE_USERNAME",
            ErrorCategory::AuthValidationOther => "AUTH_VALIDATION_OTHER",
            ErrorCategory::AuthGeneric => "AUTH_GENERIC",
            ErrorCategory::UploadFailed => "UPLOAD_FAILED",
            ErrorCategory::DetailLoadFailed => "DETAIL_LOAD_FAILED",
            ErrorCategory::ReportFailed => "REPORT_FAILED",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A category plus the message to display for it
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub message: String,
}

impl ClassifiedError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        ClassifiedError {
            category,
            message: message.into(),
        }
    }
}

/// One row of a classification table
struct Rule {
    category: ErrorCategory,
    /// Yields the display message when the rule applies
    matcher: fn(&ServiceFailure) -> Option<String>,
}

/// Authentication rules, evaluated top to bottom
const AUTH_RULES: &[Rule] = &[
    Rule {
        category: ErrorCategory::AuthNotFound,
        matcher: not_registered,
    },
    Rule {
        category: ErrorCategory::AuthGeneric,
        matcher: other_not_found,
    },
    Rule {
        category: ErrorCategory::AuthDuplicateEmail,
        matcher: duplicate_email_message,
    },
    Rule {
        category: ErrorCategory::AuthDuplicateUsername,
        matcher: duplicate_username_message,
    },
    Rule {
        category: ErrorCategory::AuthValidationOther,
        matcher: plain_error_message,
    },
    Rule {
        category: ErrorCategory::AuthDuplicateEmail,
        matcher: duplicate_email_field,
    },
    Rule {
        category: ErrorCategory::AuthDuplicateUsername,
        matcher: duplicate_username_field,
    },
    Rule {
        category: ErrorCategory::AuthValidationOther,
        matcher: field_messages,
    },
];

const AUTH_FALLBACK: &str = "Authentication failed";

fn not_registered(failure: &ServiceFailure) -> Option<String> {
    if failure.status() != Some(404) {
        return None;
    }
    let message = failure.body_str("error")?;
    NOT_REGISTERED_SIGNAL
        .is_match(message)
        .then(|| "user not registered".to_string())
}

fn other_not_found(failure: &ServiceFailure) -> Option<String> {
    (failure.status() == Some(404)).then(|| "User not found".to_string())
}

/// `{"error": "..."}` on a 400
fn bad_request_error(failure: &ServiceFailure) -> Option<&str> {
    if failure.status() != Some(400) {
        return None;
    }
    failure.body_str("error")
}

fn duplicate_email_message(failure: &ServiceFailure) -> Option<String> {
    let message = bad_request_error(failure)?;
    (message.to_lowercase().contains("email") && DUPLICATE_SIGNAL.is_match(message))
        .then(|| "Email already registered".to_string())
}

fn duplicate_username_message(failure: &ServiceFailure) -> Option<String> {
    let message = bad_request_error(failure)?;
    (message.to_lowercase().contains("username") && DUPLICATE_SIGNAL.is_match(message))
        .then(|| "Username already taken".to_string())
}

fn plain_error_message(failure: &ServiceFailure) -> Option<String> {
    bad_request_error(failure).map(str::to_string)
}

/// Messages listed under `field` in a 400 validation body
fn field_errors<'a>(failure: &'a ServiceFailure, field: &str) -> Vec<&'a str> {
    if failure.status() != Some(400) {
        return Vec::new();
    }
    match failure.body().and_then(|body| body.get(field)) {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(s)) => vec![s.as_str()],
        _ => Vec::new(),
    }
}

fn duplicate_email_field(failure: &ServiceFailure) -> Option<String> {
    field_errors(failure, "email")
        .iter()
        .any(|m| DUPLICATE_SIGNAL.is_match(m))
        .then(|| "Email already registered".to_string())
}

fn duplicate_username_field(failure: &ServiceFailure) -> Option<String> {
    field_errors(failure, "username")
        .iter()
        .any(|m| DUPLICATE_SIGNAL.is_match(m))
        .then(|| "Username already taken".to_string())
}

/// All field messages of a 400 body joined into one line, in body order
fn field_messages(failure: &ServiceFailure) -> Option<String> {
    if failure.status() != Some(400) {
        return None;
    }
    let fields = failure.body()?.as_object()?;

    let mut messages = Vec::new();
    for value in fields.values() {
        match value {
            Value::Array(items) => messages.extend(items.iter().map(value_text)),
            other => messages.push(value_text(other)),
        }
    }

    if messages.is_empty() {
        None
    } else {
        Some(messages.join(", "))
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn apply(rules: &[Rule], failure: &ServiceFailure) -> Option<ClassifiedError> {
    rules.iter().find_map(|rule| {
        (rule.matcher)(failure).map(|message| ClassifiedError::new(rule.category, message))
    })
}

/// Which authentication request failed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthOperation {
    Login,
    Register,
}

impl AuthOperation {
    /// Shown for a rejected request that carries no usable message
    fn bad_request_fallback(self) -> &'static str {
        match self {
            AuthOperation::Login => "Login failed",
            AuthOperation::Register => "Registration failed",
        }
    }
}

/// Classify a failed login or registration
///
/// # Arguments
/// * `operation` - The request that failed; only affects the fallback message
/// * `failure` - What the service returned
///
/// # Returns
/// * `ClassifiedError` - From the first matching rule, else `AUTH_GENERIC`
pub fn classify_auth(operation: AuthOperation, failure: &ServiceFailure) -> ClassifiedError {
    apply(AUTH_RULES, failure).unwrap_or_else(|| {
        let message = if failure.status() == Some(400) {
            operation.bad_request_fallback()
        } else {
            AUTH_FALLBACK
        };
        ClassifiedError::new(ErrorCategory::AuthGeneric, message)
    })
}

/// Classify a failed upload, preferring the server's own explanation
pub fn classify_upload(failure: &ServiceFailure) -> ClassifiedError {
    let message = failure
        .body_str("detail")
        .or_else(|| failure.body_str("error"))
        .unwrap_or("Upload failed");
    ClassifiedError::new(ErrorCategory::UploadFailed, message)
}

pub fn classify_detail(_failure: &ServiceFailure) -> ClassifiedError {
    ClassifiedError::new(ErrorCategory::DetailLoadFailed, "Error loading dataset")
}

pub fn classify_report(_failure: &ServiceFailure) -> ClassifiedError {
    ClassifiedError::new(ErrorCategory::ReportFailed, "Error generating PDF")
}
