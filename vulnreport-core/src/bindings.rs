//! Variable bindings and template substitution
//!
//! A binding is a named value that has been through the escaping layer
//! exactly once, at insertion time. Substitution is a single left-to-right
//! scan of the raw template: substituted values are never rescanned, so a
//! value containing `{{...}}` cannot trigger a second round of expansion.

use std::collections::BTreeMap;

use zeroize::Zeroize;

use crate::escape::escape;

/// Named, pre-escaped values available for template substitution.
///
/// Created fresh per report-generation call and discarded afterwards; the
/// backing memory of every value is overwritten on drop.
#[derive(Debug, Default)]
pub struct Bindings {
    values: BTreeMap<String, String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `raw`, escaping it. This is the only place escaping
    /// happens; render never escapes again.
    pub fn set(&mut self, name: impl Into<String>, raw: &str) {
        self.values.insert(name.into(), escape(raw));
    }

    /// Bind a value that was assembled from already-escaped fragments,
    /// such as a pre-built findings table. Passing raw text here is a bug.
    pub fn set_preescaped(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Drop for Bindings {
    fn drop(&mut self) {
        for value in self.values.values_mut() {
            value.zeroize();
        }
    }
}

/// Substitute `{{name}}` placeholders in `template` against `bindings`.
///
/// Bound placeholders are replaced everywhere they occur; unbound ones are
/// left verbatim so partial templates stay debuggable. The scan walks the
/// template once and never re-enters substituted output.
pub fn process(template: &str, bindings: &Bindings) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        let (before, mut tail) = rest.split_at(open);
        output.push_str(before);

        // A run of more than two braces means the leading ones are literal
        // template text (`\textbf{{{name}}}` is brace + placeholder).
        let run = tail.bytes().take_while(|&b| b == b'{').count();
        if run > 2 {
            output.push_str(&tail[..run - 2]);
            tail = &tail[run - 2..];
        }

        match tail[2..].find("}}") {
            Some(close) => {
                let name = &tail[2..2 + close];
                match bindings.get(name) {
                    Some(value) => output.push_str(value),
                    // Unbound: emit the placeholder untouched.
                    None => output.push_str(&tail[..close + 4]),
                }
                rest = &tail[close + 4..];
            }
            None => {
                // Unterminated opener, nothing left to substitute.
                output.push_str(tail);
                rest = "";
            }
        }
    }

    output.push_str(rest);
    output
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_set_escapes_once() {
        let mut bindings = Bindings::new();
        bindings.set("client", "Acme & Co");
        assert_eq!(bindings.get("client"), Some("Acme \\& Co"));
    }

    #[test]
    fn test_process_repeated_and_missing() {
        let mut bindings = Bindings::new();
        bindings.set("name", "X");
        let out = process("{{name}} {{name}} {{missing}}", &bindings);
        assert_eq!(out, "X X {{missing}}");
    }

    #[test]
    fn test_process_empty_template() {
        assert_eq!(process("", &Bindings::new()), "");
    }

    #[test]
    fn test_process_unterminated_placeholder() {
        let mut bindings = Bindings::new();
        bindings.set("a", "1");
        assert_eq!(process("{{a}} and {{broken", &bindings), "1 and {{broken");
    }

    #[test]
    fn test_substituted_value_not_rescanned() {
        let mut bindings = Bindings::new();
        // Braces in the raw value are escaped, and even a crafted
        // pre-escaped value containing a placeholder is not expanded again.
        bindings.set_preescaped("outer", "{{inner}}");
        bindings.set("inner", "SECRET");
        assert_eq!(process("{{outer}}", &bindings), "{{inner}}");
    }

    #[test]
    fn test_injected_placeholder_syntax_is_escaped() {
        let mut bindings = Bindings::new();
        bindings.set("desc", "attack {{inner}} vector");
        bindings.set("inner", "pwned");
        let out = process("{{desc}}", &bindings);
        assert!(!out.contains("pwned"));
        assert!(out.contains("\\{\\{inner\\}\\}"));
    }

    #[test]
    fn test_brace_wrapped_placeholder() {
        let mut bindings = Bindings::new();
        bindings.set("n", "10");
        // LaTeX argument braces around a placeholder stay literal.
        assert_eq!(process("\\textbf{{{n}}}", &bindings), "\\textbf{10}");
    }

    #[test]
    fn test_adjacent_placeholders() {
        let mut bindings = Bindings::new();
        bindings.set("a", "1");
        bindings.set("b", "2");
        assert_eq!(process("{{a}}{{b}}", &bindings), "12");
    }
}
