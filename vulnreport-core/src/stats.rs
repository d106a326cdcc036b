//! Statistics aggregation over vulnerability records
//!
//! Pure single pass, linear in the number of records. Exposed on its own
//! (`aggregate`) for callers that need counts without documents.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::records::{Severity, VulnerabilityRecord};
use crate::Result;

/// Summary statistics for a record collection.
///
/// Computed fresh per report; never mutated after construction.
/// The four severity buckets always sum to `total`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total: u32,
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
    /// Arithmetic mean of scores; 0.0 for an empty collection.
    pub average_score: f64,
    /// Records listed in a known-exploited catalog
    pub actively_exploited: u32,
    /// Highest exploitation probability observed
    pub highest_exploit_probability: f64,
    /// Most frequent weakness category, when any record carries one
    pub most_common_weakness: Option<String>,
    /// Distinct affected hosts
    pub affected_hosts: u32,
}

/// Reduce `records` to summary statistics.
///
/// An empty collection yields all-zero counts and a 0.0 average, not an
/// error. Severity is taken from each record's already-classified bucket,
/// so the only failure mode here is reserved for future raw-score input.
pub fn aggregate(records: &[VulnerabilityRecord]) -> Result<Statistics> {
    let mut stats = Statistics {
        total: records.len() as u32,
        ..Statistics::default()
    };

    let mut score_sum = 0.0;
    let mut weakness_counts: HashMap<&str, u32> = HashMap::new();
    let mut hosts: HashSet<&str> = HashSet::new();

    for record in records {
        match record.severity {
            Severity::Critical => stats.critical += 1,
            Severity::High => stats.high += 1,
            Severity::Medium => stats.medium += 1,
            Severity::Low => stats.low += 1,
        }

        score_sum += record.score;

        if record.actively_exploited {
            stats.actively_exploited += 1;
        }

        if let Some(probability) = record.exploit_probability {
            if probability > stats.highest_exploit_probability {
                stats.highest_exploit_probability = probability;
            }
        }

        for weakness in &record.weakness_ids {
            *weakness_counts.entry(weakness.as_str()).or_insert(0) += 1;
        }

        if let Some(ref host) = record.host {
            hosts.insert(host.as_str());
        }
    }

    if !records.is_empty() {
        stats.average_score = score_sum / records.len() as f64;
    }

    stats.affected_hosts = hosts.len() as u32;
    // Ties broken by name so the result is deterministic.
    stats.most_common_weakness = weakness_counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(weakness, _)| weakness.to_string());

    Ok(stats)
}
