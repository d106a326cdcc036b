//! Configuration types for report generation

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Output format for a generated report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Typeset PDF via the external toolchain
    #[default]
    Pdf,
    /// Self-contained HTML page
    Html,
    /// Markdown document
    Markdown,
    /// Plain text
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Html => "html",
            OutputFormat::Markdown => "md",
            OutputFormat::Text => "txt",
        }
    }

    /// Formats other than PDF are serialized directly, bypassing the
    /// compilation supervisor.
    pub fn needs_toolchain(&self) -> bool {
        matches!(self, OutputFormat::Pdf)
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(OutputFormat::Pdf),
            "html" => Ok(OutputFormat::Html),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "text" | "txt" => Ok(OutputFormat::Text),
            other => Err(Error::Validation(format!(
                "unknown output format '{other}'"
            ))),
        }
    }
}

/// Per-report configuration, typically built by an outer API/CLI layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Template identifier
    #[serde(default = "default_template")]
    pub template: String,
    /// Output format
    #[serde(default)]
    pub format: OutputFormat,
    /// Destination path for the final artifact
    pub output_path: PathBuf,
    /// Organization producing the report
    #[serde(default = "default_company")]
    pub company_name: String,
    /// Client the assessment was performed for
    #[serde(default)]
    pub client_name: String,
    /// Report title
    #[serde(default = "default_title")]
    pub report_title: String,
    /// Logo image reference, passed through to the template
    #[serde(default)]
    pub company_logo: Option<PathBuf>,
    /// Include severity charts
    #[serde(default)]
    pub include_charts: bool,
    /// Include narrative insight sections
    #[serde(default)]
    pub include_insights: bool,
    /// Caller-supplied placeholder values; escaped like everything else
    #[serde(default)]
    pub custom_variables: BTreeMap<String, String>,
}

fn default_template() -> String {
    "executive_summary".to_string()
}

fn default_company() -> String {
    "Security Assessment Team".to_string()
}

fn default_title() -> String {
    "Vulnerability Assessment Report".to_string()
}

impl ReportConfig {
    /// Create a configuration with defaults for the given destination.
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            template: default_template(),
            format: OutputFormat::default(),
            output_path: output_path.into(),
            company_name: default_company(),
            client_name: String::new(),
            report_title: default_title(),
            company_logo: None,
            include_charts: false,
            include_insights: false,
            custom_variables: BTreeMap::new(),
        }
    }

    /// Validate the configuration before generation.
    pub fn validate(&self) -> Result<()> {
        if self.template.trim().is_empty() {
            return Err(Error::Validation("template name not specified".into()));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(Error::Validation("output path not specified".into()));
        }
        if self.company_name.trim().is_empty() {
            return Err(Error::Validation("company name not specified".into()));
        }
        Ok(())
    }
}

/// Toolchain and workspace configuration, shared across reports.
///
/// Passed into the orchestrator at call time rather than held as global
/// state, so concurrent jobs with different settings coexist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Typesetting binary
    #[serde(default = "default_binary")]
    pub toolchain_binary: String,
    /// Base directory for per-job workspaces (never the artifact destination)
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
    /// Wall-clock compilation budget in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Directory of additional `.tex` templates; shadows built-ins
    #[serde(default)]
    pub template_dir: Option<PathBuf>,
    /// Leave workspaces on disk for debugging
    #[serde(default)]
    pub keep_workspaces: bool,
}

fn default_binary() -> String {
    "pdflatex".to_string()
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir().join("vulnreport")
}

fn default_timeout() -> u64 {
    60
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            toolchain_binary: default_binary(),
            workspace_root: default_workspace_root(),
            timeout_secs: default_timeout(),
            template_dir: None,
            keep_workspaces: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations with cascade:
    /// 1. ./vulnreport.toml (local override)
    /// 2. ~/.vulnreport/config.toml (global defaults)
    /// 3. Built-in defaults
    pub fn load_default() -> Self {
        if let Ok(config) = Self::from_file("vulnreport.toml") {
            return config;
        }

        if let Some(home) = dirs::home_dir() {
            let global_path = home.join(".vulnreport").join("config.toml");
            if let Ok(config) = Self::from_file(&global_path) {
                return config;
            }
        }

        Self::default()
    }

    /// Validate the engine configuration.
    pub fn validate(&self) -> Result<()> {
        if self.toolchain_binary.trim().is_empty() {
            return Err(Error::Validation("toolchain binary not specified".into()));
        }
        if self.workspace_root.as_os_str().is_empty() {
            return Err(Error::Validation("workspace root not specified".into()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Validation("timeout must be nonzero".into()));
        }
        Ok(())
    }
}
