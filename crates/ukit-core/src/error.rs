#![forbid(unsafe_code)]

//! Errors raised while invoking members and dispatching events.
//!
//! Nothing in the toolkit wraps or recovers a failure: an error returned by
//! an `init` method, a member call, or an event callback travels unchanged
//! to whoever made the call. The one aggregate variant,
//! [`CallError::Dispatch`], exists only for the isolating dispatch policy,
//! which runs every callback before reporting.

use std::fmt;

/// Errors from member invocation and event dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum CallError {
    /// No member with this name exists in the class's dispatch table.
    MissingMember { class: String, member: String },
    /// The member exists but holds a plain value, not a method.
    NotCallable { class: String, member: String },
    /// An argument had the wrong shape.
    InvalidArgument {
        member: String,
        index: usize,
        expected: &'static str,
    },
    /// Raised by user code (an `init`, a method body, or an event callback).
    Raised(String),
    /// One or more callbacks failed while dispatching `event` under the
    /// isolating policy. Failures are listed in dispatch order.
    Dispatch {
        event: String,
        failures: Vec<CallError>,
    },
}

impl CallError {
    /// Shorthand for a user-raised failure.
    #[must_use]
    pub fn raised(message: impl Into<String>) -> Self {
        Self::Raised(message.into())
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingMember { class, member } => {
                write!(f, "{class} has no member '{member}'")
            }
            Self::NotCallable { class, member } => {
                write!(f, "member '{member}' of {class} is not callable")
            }
            Self::InvalidArgument {
                member,
                index,
                expected,
            } => write!(f, "argument {index} of '{member}' must be {expected}"),
            Self::Raised(msg) => f.write_str(msg),
            Self::Dispatch { event, failures } => {
                write!(f, "{} callback(s) failed for '{event}'", failures.len())?;
                for failure in failures {
                    write!(f, "; {failure}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for CallError {}
