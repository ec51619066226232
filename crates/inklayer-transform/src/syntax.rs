//! Syntax highlighting for fenced code blocks.

use syntect::{
    highlighting::{Theme, ThemeSet},
    html::highlighted_html_for_string,
    parsing::SyntaxSet,
};

/// Syntax highlighter using syntect.
#[derive(Debug)]
pub struct SyntaxHighlighter {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    default_theme: String,
}

impl Default for SyntaxHighlighter {
    fn default() -> Self {
        Self::new("base16-ocean.dark")
    }
}

impl SyntaxHighlighter {
    /// Create a new syntax highlighter with the specified theme.
    pub fn new(theme: &str) -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
            default_theme: theme.to_string(),
        }
    }

    /// Get available theme names.
    pub fn available_themes(&self) -> Vec<&str> {
        self.theme_set.themes.keys().map(|s| s.as_str()).collect()
    }

    /// Whether `theme` is a known theme name.
    pub fn has_theme(&self, theme: &str) -> bool {
        self.theme_set.themes.contains_key(theme)
    }

    /// Highlight code with the default theme.
    ///
    /// Unknown languages fall back to plain text highlighting.
    pub fn highlight(&self, code: &str, lang: Option<&str>) -> String {
        self.highlight_with_theme(code, lang, &self.default_theme)
    }

    /// Highlight code with a named theme, falling back to the default theme
    /// when the name is unknown.
    pub fn highlight_with_theme(&self, code: &str, lang: Option<&str>, theme: &str) -> String {
        let syntax = lang
            .and_then(|l| self.syntax_set.find_syntax_by_token(l))
            .or_else(|| self.syntax_set.find_syntax_by_extension("txt"));

        match (syntax, self.resolve_theme(theme)) {
            (Some(syntax), Some(theme)) => {
                highlighted_html_for_string(code, &self.syntax_set, syntax, theme)
                    .unwrap_or_else(|_| fallback_highlight(code, lang))
            }
            _ => fallback_highlight(code, lang),
        }
    }

    fn resolve_theme(&self, theme: &str) -> Option<&Theme> {
        self.theme_set
            .themes
            .get(theme)
            .or_else(|| self.theme_set.themes.get(&self.default_theme))
            .or_else(|| self.theme_set.themes.values().next())
    }

    /// Set the default theme. Unknown names are ignored.
    pub fn set_theme(&mut self, theme: &str) {
        if self.has_theme(theme) {
            self.default_theme = theme.to_string();
        }
    }
}

/// Plain `<pre><code>` block used when syntect cannot highlight.
fn fallback_highlight(code: &str, lang: Option<&str>) -> String {
    let escaped = html_escape(code);
    let lang_class = lang
        .map(|l| format!(" class=\"language-{}\"", html_escape(l)))
        .unwrap_or_default();
    format!("<pre><code{lang_class}>{escaped}</code></pre>")
}

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_rust() {
        let highlighter = SyntaxHighlighter::default();
        let code = "fn main() {\n    println!(\"Hello\");\n}";
        let html = highlighter.highlight(code, Some("rust"));

        assert!(html.contains("<pre"));
        assert!(html.contains("fn"));
    }

    #[test]
    fn test_highlight_unknown_language() {
        let highlighter = SyntaxHighlighter::default();
        let html = highlighter.highlight("some code", Some("unknown_lang_xyz"));

        assert!(html.contains("some code"));
    }

    #[test]
    fn test_unknown_theme_uses_default() {
        let highlighter = SyntaxHighlighter::default();
        let code = "let x = 1;";
        assert_eq!(
            highlighter.highlight_with_theme(code, Some("rust"), "no-such-theme"),
            highlighter.highlight(code, Some("rust"))
        );
    }

    #[test]
    fn test_set_theme_ignores_unknown() {
        let mut highlighter = SyntaxHighlighter::default();
        highlighter.set_theme("no-such-theme");
        assert_eq!(highlighter.default_theme, "base16-ocean.dark");

        highlighter.set_theme("InspiredGitHub");
        assert_eq!(highlighter.default_theme, "InspiredGitHub");
    }

    #[test]
    fn test_fallback_escapes() {
        assert_eq!(
            fallback_highlight("<b>", Some("x")),
            "<pre><code class=\"language-x\">&lt;b&gt;</code></pre>"
        );
    }

    #[test]
    fn test_available_themes() {
        let highlighter = SyntaxHighlighter::default();
        let themes = highlighter.available_themes();

        assert!(themes.contains(&"base16-ocean.dark"));
        assert!(highlighter.has_theme("base16-ocean.dark"));
    }
}
