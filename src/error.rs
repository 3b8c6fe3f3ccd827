use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Severity {
	#[default]
	Error,
	Fatal,
}

impl fmt::Display for Severity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Severity::Error => f.write_str("ERROR"),
			Severity::Fatal => f.write_str("FATAL"),
		}
	}
}

/// The only error this crate produces: something was configured in a way
/// that cannot be executed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{severity}] {component}: {message}")]
pub struct ConfigurationError {
	/// Component the error originated from (`"value"`, `"interactions"`, ...).
	pub component: String,
	pub severity: Severity,
	pub message: String,
}

impl ConfigurationError {
	pub fn new(component: impl Into<String>, message: impl Into<String>) -> Self {
		ConfigurationError {
			component: component.into(),
			severity: Severity::Error,
			message: message.into(),
		}
	}

	pub fn at(mut self, severity: Severity) -> Self {
		self.severity = severity;
		self
	}
}

pub type Result<T, E = ConfigurationError> = std::result::Result<T, E>;
