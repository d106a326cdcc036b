//! vulnreport-core: typeset vulnerability-assessment reports from untrusted data
//!
//! Every field of a [`records::VulnerabilityRecord`] is treated as attacker
//! influenced text. The pipeline escapes each value exactly once at binding
//! time, substitutes it into a template without rescanning, and hands the
//! rendered source to an external typesetting toolchain running in an
//! isolated workspace under a hard wall-clock timeout.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod bindings;
pub mod compiler;
pub mod config;
pub mod error;
pub mod escape;
pub mod generator;
pub mod records;
pub mod stats;
pub mod templates;

pub use error::{Error, Result};

pub use bindings::{process, Bindings};
pub use compiler::{CompilationResult, CompileStatus, Supervisor};
pub use config::{EngineConfig, OutputFormat, ReportConfig};
pub use generator::generate;
pub use records::{Severity, VulnerabilityRecord};
pub use stats::{aggregate, Statistics};
pub use templates::TemplateCatalog;
