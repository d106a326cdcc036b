//! Error types for vulnreport-core

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using vulnreport Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for vulnreport
///
/// Compilation failure and timeout are deliberately absent: the
/// [`crate::compiler::Supervisor`] reports those as data in a
/// [`crate::compiler::CompilationResult`] so callers can inspect, log,
/// or retry a failed job.
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(code(vulnreport::config))]
    Validation(String),

    #[error("Template not found: {0}")]
    #[diagnostic(code(vulnreport::template))]
    TemplateNotFound(String),

    #[error("Template '{0}' has an empty body")]
    #[diagnostic(code(vulnreport::template))]
    EmptyTemplate(String),

    #[error("Severity classification error: {0}")]
    #[diagnostic(code(vulnreport::classify))]
    Classification(String),

    #[error("IO error: {0}")]
    #[diagnostic(code(vulnreport::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(vulnreport::serde))]
    Serde(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    #[diagnostic(code(vulnreport::toml))]
    Toml(#[from] toml::de::Error),
}
