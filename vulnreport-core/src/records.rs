//! Vulnerability record types consumed from the upstream scoring subsystem
//!
//! Records arrive already scored. Every free-text field is treated as
//! arbitrary untrusted input regardless of upstream validation.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Severity classification of a vulnerability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Classify a raw CVSS base score into a severity bucket.
    ///
    /// Out-of-range scores are a classification error, not a default.
    pub fn from_score(score: f64) -> Result<Self> {
        match score {
            s if (9.0..=10.0).contains(&s) => Ok(Severity::Critical),
            s if (7.0..9.0).contains(&s) => Ok(Severity::High),
            s if (4.0..7.0).contains(&s) => Ok(Severity::Medium),
            s if (0.0..4.0).contains(&s) => Ok(Severity::Low),
            s => Err(Error::Classification(format!(
                "score {s} outside the 0.0-10.0 range"
            ))),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "Critical"),
            Severity::High => write!(f, "High"),
            Severity::Medium => write!(f, "Medium"),
            Severity::Low => write!(f, "Low"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            other => Err(Error::Classification(format!(
                "unrecognized severity '{other}'"
            ))),
        }
    }
}

/// A scored vulnerability, consumed read-only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    /// Identifier (CVE id or scanner-assigned id)
    pub id: String,
    /// Short vulnerability name
    pub name: String,
    /// Free-text description
    pub description: String,
    /// Severity bucket
    pub severity: Severity,
    /// Numeric base score
    pub score: f64,
    /// Affected host, when known
    #[serde(default)]
    pub host: Option<String>,
    /// Listed in a known-exploited catalog (KEV)
    #[serde(default)]
    pub actively_exploited: bool,
    /// Exploitation probability (EPSS), when known
    #[serde(default)]
    pub exploit_probability: Option<f64>,
    /// Weakness category identifiers (CWE)
    #[serde(default)]
    pub weakness_ids: Vec<String>,
}

impl VulnerabilityRecord {
    /// Create a record with the given identity and score; optional fields
    /// start empty.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        severity: Severity,
        score: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            severity,
            score,
            host: None,
            actively_exploited: false,
            exploit_probability: None,
            weakness_ids: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn exploited(mut self) -> Self {
        self.actively_exploited = true;
        self
    }

    pub fn with_exploit_probability(mut self, probability: f64) -> Self {
        self.exploit_probability = Some(probability);
        self
    }

    pub fn with_weakness(mut self, cwe: impl Into<String>) -> Self {
        self.weakness_ids.push(cwe.into());
        self
    }
}
