//! Template catalog: built-in templates plus on-disk overrides
//!
//! A template is a `.tex` body with `{{name}}` placeholders. Built-ins are
//! compiled into the binary; a configured template directory can add more
//! or shadow a built-in by file stem.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::{Error, Result};

const EXECUTIVE_SUMMARY: &str = include_str!("../templates/executive_summary.tex");
const TECHNICAL_DETAIL: &str = include_str!("../templates/technical_detail.tex");

/// A loaded report template
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub body: String,
}

impl Template {
    /// Placeholder identifiers referenced by the body, in order of first
    /// occurrence, deduplicated.
    pub fn placeholders(&self) -> Vec<String> {
        scan_placeholders(&self.body)
    }
}

/// Catalog of available templates
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: BTreeMap<String, String>,
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateCatalog {
    /// Catalog containing only the built-in templates.
    pub fn builtin() -> Self {
        let mut templates = BTreeMap::new();
        templates.insert("executive_summary".to_string(), EXECUTIVE_SUMMARY.to_string());
        templates.insert("technical_detail".to_string(), TECHNICAL_DETAIL.to_string());
        Self { templates }
    }

    /// Built-ins plus every `*.tex` file in `dir` (file stem = template
    /// name; on-disk definitions shadow built-ins). A missing directory is
    /// an error; an unreadable entry is skipped with a warning.
    pub fn with_template_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut catalog = Self::builtin();

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("tex") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match std::fs::read_to_string(&path) {
                Ok(body) => {
                    debug!("loaded template '{}' from {}", name, path.display());
                    catalog.templates.insert(name.to_string(), body);
                }
                Err(e) => {
                    warn!("skipping unreadable template {}: {}", path.display(), e);
                }
            }
        }

        Ok(catalog)
    }

    /// Available template identifiers.
    pub fn names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Load a template by name. Not finding it is a hard error, as is an
    /// empty body (no permissive fallback).
    pub fn load(&self, name: &str) -> Result<Template> {
        let body = self
            .templates
            .get(name)
            .ok_or_else(|| Error::TemplateNotFound(name.to_string()))?;
        if body.trim().is_empty() {
            return Err(Error::EmptyTemplate(name.to_string()));
        }
        Ok(Template {
            name: name.to_string(),
            body: body.clone(),
        })
    }

    /// Placeholder names required by a template, so callers can validate
    /// user-supplied configuration before generating.
    pub fn placeholders(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.load(name)?.placeholders())
    }
}

fn scan_placeholders(body: &str) -> Vec<String> {
    let mut seen = Vec::new();
    let mut rest = body;
    while let Some(open) = rest.find("{{") {
        let mut tail = &rest[open..];
        let run = tail.bytes().take_while(|&b| b == b'{').count();
        if run > 2 {
            tail = &tail[run - 2..];
        }
        match tail[2..].find("}}") {
            Some(close) => {
                let name = &tail[2..2 + close];
                if is_identifier(name) && !seen.iter().any(|s| s == name) {
                    seen.push(name.to_string());
                }
                rest = &tail[close + 4..];
            }
            None => break,
        }
    }
    seen
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog() {
        let catalog = TemplateCatalog::builtin();
        assert_eq!(catalog.names(), vec!["executive_summary", "technical_detail"]);
        assert!(catalog.contains("executive_summary"));
        assert!(!catalog.contains("compliance"));
    }

    #[test]
    fn test_load_missing_is_error() {
        let catalog = TemplateCatalog::builtin();
        assert!(matches!(
            catalog.load("nope"),
            Err(Error::TemplateNotFound(_))
        ));
    }

    #[test]
    fn test_builtin_placeholders() {
        let catalog = TemplateCatalog::builtin();
        let names = catalog.placeholders("executive_summary").unwrap();
        for expected in [
            "company_name",
            "client_name",
            "report_title",
            "report_date",
            "total_vulnerabilities",
            "critical_count",
            "high_count",
            "medium_count",
            "low_count",
            "findings_table",
            "insights",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
    }

    #[test]
    fn test_template_dir_shadows_builtin() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("executive_summary.tex"),
            "\\documentclass{article}\\begin{document}{{only}}\\end{document}",
        )
        .expect("write template");
        std::fs::write(dir.path().join("notes.txt"), "ignored").expect("write");

        let catalog = TemplateCatalog::with_template_dir(dir.path()).expect("catalog");
        let template = catalog.load("executive_summary").expect("load");
        assert_eq!(template.placeholders(), vec!["only".to_string()]);
        // Non-.tex files are not templates.
        assert!(!catalog.contains("notes"));
    }

    #[test]
    fn test_empty_template_is_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("blank.tex"), "  \n").expect("write");
        let catalog = TemplateCatalog::with_template_dir(dir.path()).expect("catalog");
        assert!(matches!(
            catalog.load("blank"),
            Err(Error::EmptyTemplate(_))
        ));
    }

    #[test]
    fn test_missing_template_dir_is_error() {
        assert!(TemplateCatalog::with_template_dir("/nonexistent/path/xyz").is_err());
    }
}
