//! Report orchestration: from records and configuration to a final artifact
//!
//! `generate` is the single entry point. PDF output goes through the full
//! template/escape/compile pipeline; the lightweight formats serialize
//! records and statistics directly and never touch the toolchain.

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use tracing::debug;

use crate::bindings::{process, Bindings};
use crate::compiler::{CompilationResult, Supervisor};
use crate::config::{EngineConfig, OutputFormat, ReportConfig};
use crate::escape::{escape, truncate_escaped};
use crate::records::VulnerabilityRecord;
use crate::stats::{aggregate, Statistics};
use crate::templates::TemplateCatalog;
use crate::Result;

/// Findings rows included in the typeset table
const MAX_TABLE_ENTRIES: usize = 10;
/// Description column width, in characters, before escaping
const MAX_DESCRIPTION_CHARS: usize = 100;

/// Generate a report from scored records.
///
/// Validation, template, and I/O problems surface as `Err`; toolchain
/// failure and timeout come back as data inside the `CompilationResult`.
pub async fn generate(
    records: &[VulnerabilityRecord],
    config: &ReportConfig,
    engine: &EngineConfig,
) -> Result<CompilationResult> {
    config.validate()?;
    engine.validate()?;

    let start = Instant::now();
    let stats = aggregate(records)?;

    if !config.format.needs_toolchain() {
        debug!(
            "serializing {} report directly to {}",
            config.format.extension(),
            config.output_path.display()
        );
        let body = match config.format {
            OutputFormat::Html => render_html(records, &stats, config),
            OutputFormat::Markdown => render_markdown(records, &stats, config),
            OutputFormat::Text => render_text(records, &stats, config),
            OutputFormat::Pdf => unreachable!("pdf requires the toolchain"),
        };
        let bytes = write_artifact(&config.output_path, &body)?;
        return Ok(CompilationResult::succeeded(
            config.output_path.clone(),
            Some(bytes),
            start.elapsed(),
        ));
    }

    let catalog = match engine.template_dir {
        Some(ref dir) => TemplateCatalog::with_template_dir(dir)?,
        None => TemplateCatalog::builtin(),
    };
    let template = catalog.load(&config.template)?;

    let bindings = build_bindings(records, &stats, config);
    let rendered = process(&template.body, &bindings);

    let supervisor = Supervisor::new(engine.clone());
    Ok(supervisor
        .compile(&rendered, &config.template, &config.output_path)
        .await)
}

/// Build the per-report variable bindings. Every raw value is escaped once
/// here; the findings table is assembled from fragments that already went
/// through the escaping layer.
fn build_bindings(
    records: &[VulnerabilityRecord],
    stats: &Statistics,
    config: &ReportConfig,
) -> Bindings {
    let mut bindings = Bindings::new();

    bindings.set("company_name", &config.company_name);
    bindings.set("client_name", &config.client_name);
    bindings.set("report_title", &config.report_title);
    bindings.set("report_date", &Utc::now().format("%B %d, %Y").to_string());

    bindings.set("total_vulnerabilities", &stats.total.to_string());
    bindings.set("critical_count", &stats.critical.to_string());
    bindings.set("high_count", &stats.high.to_string());
    bindings.set("medium_count", &stats.medium.to_string());
    bindings.set("low_count", &stats.low.to_string());
    bindings.set("average_score", &format!("{:.1}", stats.average_score));
    bindings.set("exploited_count", &stats.actively_exploited.to_string());
    bindings.set(
        "highest_exploit_probability",
        &format!("{:.2}", stats.highest_exploit_probability),
    );
    bindings.set("affected_hosts", &stats.affected_hosts.to_string());
    bindings.set(
        "most_common_weakness",
        stats
            .most_common_weakness
            .as_deref()
            .unwrap_or("None identified"),
    );

    if let Some(ref logo) = config.company_logo {
        bindings.set("company_logo", &logo.display().to_string());
    } else {
        bindings.set("company_logo", "");
    }

    bindings.set(
        "insights",
        &if config.include_insights {
            narrative_insights(stats)
        } else {
            String::new()
        },
    );

    bindings.set_preescaped("findings_table", findings_table(records, MAX_TABLE_ENTRIES));

    for (name, value) in &config.custom_variables {
        bindings.set(name.clone(), value);
    }

    bindings
}

/// Typeset table rows for the highest-scored findings, every cell escaped.
fn findings_table(records: &[VulnerabilityRecord], max_entries: usize) -> String {
    if records.is_empty() {
        return "No vulnerabilities found & N/A & N/A & System appears secure \\\\ \\hline\n"
            .to_string();
    }

    let mut sorted: Vec<&VulnerabilityRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut table = String::new();
    for record in sorted.iter().take(max_entries) {
        let description = if record.description.is_empty() {
            "No description available"
        } else {
            record.description.as_str()
        };
        table.push_str(&format!(
            "{} & {} & {:.1} & {} \\\\ \\hline\n",
            escape(&record.id),
            record.severity,
            record.score,
            truncate_escaped(description, MAX_DESCRIPTION_CHARS),
        ));
    }
    table
}

/// Short narrative derived from the statistics, used when insight sections
/// are enabled. Plain text; it is escaped at binding time like any value.
fn narrative_insights(stats: &Statistics) -> String {
    if stats.total == 0 {
        return "No vulnerabilities were identified during this assessment.".to_string();
    }
    let mut text = format!(
        "The assessment surfaced {} findings with an average base score of {:.1}. ",
        stats.total, stats.average_score
    );
    if stats.critical > 0 {
        text.push_str(&format!(
            "{} critical findings require immediate remediation. ",
            stats.critical
        ));
    }
    if stats.actively_exploited > 0 {
        text.push_str(&format!(
            "{} findings are known to be exploited in the wild and should be prioritized.",
            stats.actively_exploited
        ));
    }
    text
}

// ---------------------------------------------------------------------------
// Lightweight serializers (no toolchain involved)
// ---------------------------------------------------------------------------

/// Generate markdown report content
pub fn render_markdown(
    records: &[VulnerabilityRecord],
    stats: &Statistics,
    config: &ReportConfig,
) -> String {
    let mut md = String::new();

    md.push_str(&format!("# {}\n\n", config.report_title));
    md.push_str("## Report Information\n\n");
    md.push_str(&format!("- **Prepared by:** {}\n", config.company_name));
    if !config.client_name.is_empty() {
        md.push_str(&format!("- **Client:** {}\n", config.client_name));
    }
    md.push_str(&format!(
        "- **Generated:** {}\n\n",
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    ));

    md.push_str("## Summary\n\n");
    md.push_str("| Severity | Count |\n|----------|-------|\n");
    md.push_str(&format!("| Critical | {} |\n", stats.critical));
    md.push_str(&format!("| High | {} |\n", stats.high));
    md.push_str(&format!("| Medium | {} |\n", stats.medium));
    md.push_str(&format!("| Low | {} |\n", stats.low));
    md.push_str(&format!("| **Total** | **{}** |\n\n", stats.total));

    md.push_str(&format!(
        "- **Average score:** {:.1}\n- **Actively exploited:** {}\n- **Affected hosts:** {}\n",
        stats.average_score, stats.actively_exploited, stats.affected_hosts
    ));
    if let Some(ref weakness) = stats.most_common_weakness {
        md.push_str(&format!("- **Most common weakness:** {}\n", weakness));
    }
    md.push('\n');

    md.push_str("## Findings\n\n");
    if records.is_empty() {
        md.push_str("No vulnerabilities were identified during this assessment.\n");
    } else {
        for (i, record) in records.iter().enumerate() {
            md.push_str(&format!(
                "### {}. {} [{}]\n\n",
                i + 1,
                record.name,
                record.severity
            ));
            md.push_str(&format!("- **Identifier:** {}\n", record.id));
            md.push_str(&format!("- **Score:** {:.1}\n", record.score));
            if let Some(ref host) = record.host {
                md.push_str(&format!("- **Host:** {}\n", host));
            }
            if record.actively_exploited {
                md.push_str("- **Known exploited:** yes\n");
            }
            if !record.weakness_ids.is_empty() {
                md.push_str(&format!(
                    "- **Weaknesses:** {}\n",
                    record.weakness_ids.join(", ")
                ));
            }
            if !record.description.is_empty() {
                md.push_str(&format!("\n{}\n", record.description));
            }
            md.push('\n');
        }
    }

    md
}

/// Generate a self-contained HTML page. Field values are HTML-escaped.
pub fn render_html(
    records: &[VulnerabilityRecord],
    stats: &Statistics,
    config: &ReportConfig,
) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(&config.report_title)));
    html.push_str(
        "<style>body{font-family:sans-serif;margin:2em}table{border-collapse:collapse}\
         td,th{border:1px solid #999;padding:4px 8px}</style>\n</head>\n<body>\n",
    );

    html.push_str(&format!("<h1>{}</h1>\n", escape_html(&config.report_title)));
    html.push_str(&format!(
        "<p>Prepared by {} for {}</p>\n",
        escape_html(&config.company_name),
        escape_html(&config.client_name)
    ));

    html.push_str("<h2>Summary</h2>\n<table>\n<tr><th>Severity</th><th>Count</th></tr>\n");
    for (label, count) in [
        ("Critical", stats.critical),
        ("High", stats.high),
        ("Medium", stats.medium),
        ("Low", stats.low),
        ("Total", stats.total),
    ] {
        html.push_str(&format!("<tr><td>{label}</td><td>{count}</td></tr>\n"));
    }
    html.push_str("</table>\n");

    html.push_str("<h2>Findings</h2>\n");
    if records.is_empty() {
        html.push_str("<p>No vulnerabilities were identified.</p>\n");
    } else {
        html.push_str(
            "<table>\n<tr><th>Identifier</th><th>Name</th><th>Severity</th>\
             <th>Score</th><th>Description</th></tr>\n",
        );
        for record in records {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{:.1}</td><td>{}</td></tr>\n",
                escape_html(&record.id),
                escape_html(&record.name),
                record.severity,
                record.score,
                escape_html(&record.description),
            ));
        }
        html.push_str("</table>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// Generate a plain-text report.
pub fn render_text(
    records: &[VulnerabilityRecord],
    stats: &Statistics,
    config: &ReportConfig,
) -> String {
    let mut text = String::new();
    text.push_str(&format!("{}\n", config.report_title));
    text.push_str(&format!("{}\n\n", "=".repeat(config.report_title.len())));
    text.push_str(&format!("Prepared by: {}\n", config.company_name));
    if !config.client_name.is_empty() {
        text.push_str(&format!("Client: {}\n", config.client_name));
    }
    text.push_str(&format!(
        "Generated: {}\n\n",
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    ));

    text.push_str(&format!(
        "Total: {} (critical {}, high {}, medium {}, low {})\n",
        stats.total, stats.critical, stats.high, stats.medium, stats.low
    ));
    text.push_str(&format!("Average score: {:.1}\n", stats.average_score));
    text.push_str(&format!("Actively exploited: {}\n\n", stats.actively_exploited));

    if records.is_empty() {
        text.push_str("No vulnerabilities were identified during this assessment.\n");
    } else {
        for record in records {
            text.push_str(&format!(
                "[{}] {} ({}, {:.1})\n",
                record.severity, record.name, record.id, record.score
            ));
            if !record.description.is_empty() {
                text.push_str(&format!("    {}\n", record.description));
            }
        }
    }

    text
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Write a serialized report to the destination with non-world-writable
/// permissions.
fn write_artifact(path: &Path, body: &str) -> Result<u64> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, body)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))?;
    }
    Ok(body.len() as u64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::records::Severity;

    fn sample_records() -> Vec<VulnerabilityRecord> {
        vec![
            VulnerabilityRecord::new("CVE-2024-1001", "RCE in web server", Severity::Critical, 9.8)
                .with_description("Remote code execution via buffer overflow")
                .with_host("10.0.0.5")
                .exploited(),
            VulnerabilityRecord::new("CVE-2024-1002", "SQL injection", Severity::High, 8.1)
                .with_description("Authentication bypass in login form")
                .with_weakness("CWE-89"),
            VulnerabilityRecord::new("CVE-2024-1003", "Weak TLS config", Severity::Low, 3.1),
        ]
    }

    fn sample_config(format: OutputFormat) -> ReportConfig {
        let mut config = ReportConfig::new("/tmp/unused");
        config.format = format;
        config.client_name = "Acme Corp".to_string();
        config
    }

    #[test]
    fn test_findings_table_sorted_and_escaped() {
        let mut records = sample_records();
        records[1].description = "drop table & run \\write18{id}".to_string();
        let table = findings_table(&records, 10);

        let first = table.lines().next().expect("rows");
        assert!(first.starts_with("CVE-2024-1001"));
        assert!(table.contains("\\&"));
        assert!(table.contains("\\textbackslash{}write18"));
        assert!(!table.contains("\\write18{id}"));
    }

    #[test]
    fn test_findings_table_empty() {
        let table = findings_table(&[], 10);
        assert!(table.contains("No vulnerabilities found"));
    }

    #[test]
    fn test_findings_table_caps_entries() {
        let records: Vec<_> = (0..25)
            .map(|i| VulnerabilityRecord::new(format!("CVE-{i}"), "x", Severity::Low, 1.0))
            .collect();
        assert_eq!(findings_table(&records, 10).lines().count(), 10);
    }

    #[test]
    fn test_build_bindings_covers_template_placeholders() {
        let records = sample_records();
        let stats = aggregate(&records).unwrap();
        let config = sample_config(OutputFormat::Pdf);
        let bindings = build_bindings(&records, &stats, &config);

        let catalog = TemplateCatalog::builtin();
        for name in catalog.placeholders("executive_summary").unwrap() {
            assert!(bindings.get(&name).is_some(), "unbound placeholder {name}");
        }
        for name in catalog.placeholders("technical_detail").unwrap() {
            assert!(bindings.get(&name).is_some(), "unbound placeholder {name}");
        }
    }

    #[test]
    fn test_rendered_template_has_no_leftover_placeholders() {
        let records = sample_records();
        let stats = aggregate(&records).unwrap();
        let config = sample_config(OutputFormat::Pdf);
        let bindings = build_bindings(&records, &stats, &config);

        let template = TemplateCatalog::builtin().load("executive_summary").unwrap();
        let rendered = process(&template.body, &bindings);
        assert!(!rendered.contains("{{"), "unresolved placeholder in output");
    }

    #[test]
    fn test_custom_variables_escaped_once() {
        let records = sample_records();
        let stats = aggregate(&records).unwrap();
        let mut config = sample_config(OutputFormat::Pdf);
        config
            .custom_variables
            .insert("assessor".to_string(), "J. Doe & team".to_string());

        let bindings = build_bindings(&records, &stats, &config);
        assert_eq!(bindings.get("assessor"), Some("J. Doe \\& team"));
    }

    #[test]
    fn test_render_markdown() {
        let records = sample_records();
        let stats = aggregate(&records).unwrap();
        let config = sample_config(OutputFormat::Markdown);

        let md = render_markdown(&records, &stats, &config);
        assert!(md.contains("# Vulnerability Assessment Report"));
        assert!(md.contains("| Critical | 1 |"));
        assert!(md.contains("| **Total** | **3** |"));
        assert!(md.contains("RCE in web server"));
        assert!(md.contains("Known exploited"));
    }

    #[test]
    fn test_render_html_escapes_fields() {
        let mut records = sample_records();
        records[0].name = "<script>alert(1)</script>".to_string();
        let stats = aggregate(&records).unwrap();
        let config = sample_config(OutputFormat::Html);

        let html = render_html(&records, &stats, &config);
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_render_text_empty_records() {
        let stats = aggregate(&[]).unwrap();
        let config = sample_config(OutputFormat::Text);
        let text = render_text(&[], &stats, &config);
        assert!(text.contains("No vulnerabilities were identified"));
        assert!(text.contains("Total: 0"));
    }

    #[tokio::test]
    async fn test_generate_markdown_end_to_end() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = sample_config(OutputFormat::Markdown);
        config.output_path = dir.path().join("report.md");
        let engine = EngineConfig {
            workspace_root: dir.path().join("ws"),
            ..EngineConfig::default()
        };

        let result = generate(&sample_records(), &config, &engine)
            .await
            .expect("generate");
        assert!(result.is_success());

        let body = std::fs::read_to_string(&config.output_path).expect("read");
        assert!(body.contains("CVE-2024-1001"));
    }

    #[tokio::test]
    async fn test_generate_rejects_invalid_config() {
        let mut config = sample_config(OutputFormat::Markdown);
        config.template = String::new();
        let result = generate(&[], &config, &EngineConfig::default()).await;
        assert!(matches!(result, Err(crate::Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_generate_unknown_template_is_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = sample_config(OutputFormat::Pdf);
        config.template = "compliance".to_string();
        config.output_path = dir.path().join("report.pdf");
        let engine = EngineConfig {
            workspace_root: dir.path().join("ws"),
            ..EngineConfig::default()
        };

        let result = generate(&sample_records(), &config, &engine).await;
        assert!(matches!(result, Err(crate::Error::TemplateNotFound(_))));
    }
}
