//! LaTeX escaping for untrusted text
//!
//! Pure functions, no I/O. Each character with special meaning to the
//! typesetting toolchain is replaced by a literal-rendering sequence; the
//! rest of the Unicode range passes through untouched. Neutralizing the
//! backslash itself is what defuses directive payloads (`\input`,
//! `\write18`, `\catcode`, ...): after escaping they are inert text.

/// Characters the toolchain treats as special in horizontal text mode.
pub const SPECIAL_CHARS: [char; 10] = ['\\', '{', '}', '$', '&', '%', '#', '^', '_', '~'];

/// Escape all special characters in `text` for literal rendering.
///
/// Must be applied exactly once per value, at binding time. Re-escaping
/// already-escaped text mangles the escape sequences and is a caller bug.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\textbackslash{}"),
            '{' => escaped.push_str("\\{"),
            '}' => escaped.push_str("\\}"),
            '$' => escaped.push_str("\\$"),
            '&' => escaped.push_str("\\&"),
            '%' => escaped.push_str("\\%"),
            '#' => escaped.push_str("\\#"),
            '^' => escaped.push_str("\\textasciicircum{}"),
            '_' => escaped.push_str("\\_"),
            '~' => escaped.push_str("\\textasciitilde{}"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Escape optional text, propagating "no data" rather than synthesizing
/// content.
pub fn escape_opt(text: Option<&str>) -> Option<String> {
    text.map(escape)
}

/// Truncate `text` to at most `max` characters (appending an ellipsis when
/// cut), then escape.
///
/// Truncation happens on the raw text so an escape sequence is never split
/// mid-way.
pub fn truncate_escaped(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return escape(text);
    }
    let keep = max.saturating_sub(3);
    let truncated: String = text.chars().take(keep).collect();
    let mut escaped = escape(&truncated);
    escaped.push_str("...");
    escaped
}

/// True when `text` contains none of the special characters, i.e. escaping
/// it is the identity.
pub fn is_plain(text: &str) -> bool {
    !text.chars().any(|c| SPECIAL_CHARS.contains(&c))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    /// Directive-introducing payloads the escaping must neutralize.
    const INJECTION_PAYLOADS: [&str; 8] = [
        "\\input{/etc/passwd}",
        "\\write18{cat /etc/shadow}",
        "\\immediate\\write18{rm -rf /tmp/test_file}",
        "\\catcode`\\{=12",
        "\\def\\malicious{\\input{/etc/passwd}}",
        "\\expandafter\\input\\csname /etc/passwd\\endcsname",
        "\\scantokens{\\input{/etc/passwd}}",
        "$\\csname @input\\endcsname$",
    ];

    #[test]
    fn test_escape_each_special_char() {
        assert_eq!(escape("\\"), "\\textbackslash{}");
        assert_eq!(escape("{"), "\\{");
        assert_eq!(escape("}"), "\\}");
        assert_eq!(escape("$"), "\\$");
        assert_eq!(escape("&"), "\\&");
        assert_eq!(escape("%"), "\\%");
        assert_eq!(escape("#"), "\\#");
        assert_eq!(escape("^"), "\\textasciicircum{}");
        assert_eq!(escape("_"), "\\_");
        assert_eq!(escape("~"), "\\textasciitilde{}");
    }

    #[test]
    fn test_escape_empty_and_plain() {
        assert_eq!(escape(""), "");
        assert_eq!(escape("plain ascii text"), "plain ascii text");
        assert_eq!(escape("Füße 漢字 βeta"), "Füße 漢字 βeta");
    }

    #[test]
    fn test_escape_opt_propagates_absence() {
        assert_eq!(escape_opt(None), None);
        assert_eq!(escape_opt(Some("a&b")), Some("a\\&b".to_string()));
    }

    #[test]
    fn test_escape_idempotent_on_plain_text() {
        let plain = "CVE-2024-1001: remote code execution";
        assert_eq!(escape(&escape(plain)), escape(plain));
    }

    /// Totality: after stripping our own escape sequences, no special
    /// character remains in literal, directive-introducing form.
    #[test]
    fn test_escape_totality() {
        let mixed = "100% of $vars & #refs use foo_bar{baz}^2 ~ \\cmd";
        let mut residue = escape(mixed);
        for seq in [
            "\\textbackslash{}",
            "\\textasciicircum{}",
            "\\textasciitilde{}",
            "\\{",
            "\\}",
            "\\$",
            "\\&",
            "\\%",
            "\\#",
            "\\_",
        ] {
            residue = residue.replace(seq, "");
        }
        for c in SPECIAL_CHARS {
            assert!(!residue.contains(c), "literal '{c}' survived: {residue}");
        }
    }

    #[test]
    fn test_injection_payloads_neutralized() {
        for payload in INJECTION_PAYLOADS {
            let escaped = escape(payload);
            assert_ne!(escaped, payload);
            assert!(!escaped.contains(payload), "payload survived: {payload}");
            assert!(!escaped.starts_with("\\input"));
            assert!(!escaped.starts_with("\\write18"));
            assert!(!escaped.starts_with("\\immediate"));
            assert!(!escaped.starts_with("\\catcode"));
            // Every original backslash became a literal-rendering command.
            let backslashes = payload.matches('\\').count();
            assert_eq!(escaped.matches("\\textbackslash{}").count(), backslashes);
        }
    }

    #[test]
    fn test_truncate_escaped_short_input_untouched() {
        assert_eq!(truncate_escaped("short & sweet", 100), "short \\& sweet");
    }

    #[test]
    fn test_truncate_escaped_never_splits_sequence() {
        // A backslash right at the cut point: raw truncation drops it or
        // keeps it whole, the escape sequence is produced afterwards.
        let text = "aaaa\\bbbb".repeat(30);
        let out = truncate_escaped(&text, 100);
        assert!(out.ends_with("..."));
        // No dangling half of "\textbackslash{}" before the ellipsis.
        let body = out.trim_end_matches("...");
        assert_eq!(
            body.matches('\\').count(),
            body.matches("\\textbackslash{}").count()
        );
    }

    #[test]
    fn test_is_plain() {
        assert!(is_plain("CVE-2024-0001"));
        assert!(!is_plain("a_b"));
        assert!(!is_plain("\\input"));
    }
}
