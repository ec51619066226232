//! MDX support on top of the Markdown renderer.
//!
//! Top-level `import`/`export` statements are lifted out of the body and kept
//! verbatim at the head of the output. Capitalized component tags must be
//! balanced; anything else inside them is rendered as Markdown and HTML.

use std::sync::LazyLock;

use regex::Regex;

use crate::TransformDiagnostic;

static COMPONENT_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(/?)([A-Z][A-Za-z0-9_.]*)(?:\s[^>]*?)?(/?)>").expect("valid component regex")
});

static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`[^`]*`").expect("valid inline code regex"));

/// An MDX body split into module statements and renderable content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdxModule {
    /// `import`/`export` statements in source order.
    pub esm: Vec<String>,

    /// The remaining body. Lifted lines are left blank so line numbers match
    /// the source.
    pub content: String,
}

/// Split an MDX body and check that component tags are balanced.
pub fn split_module(source: &str) -> Result<MdxModule, Vec<TransformDiagnostic>> {
    let mut esm = Vec::new();
    let mut content = Vec::new();
    let mut fence: Option<String> = None;
    let mut statement: Option<(String, usize)> = None;
    let mut open: Vec<(String, usize, usize)> = Vec::new();
    let mut diagnostics = Vec::new();

    for (idx, line) in source.lines().enumerate() {
        let line_no = idx + 1;

        if let Some((mut pending, start)) = statement.take() {
            pending.push('\n');
            pending.push_str(line);
            if line.contains('}') {
                esm.push(pending);
            } else {
                statement = Some((pending, start));
            }
            content.push("");
            continue;
        }

        let trimmed = line.trim_start();
        if let Some(marker) = fence_marker(trimmed) {
            match &fence {
                Some(current) if marker.starts_with(current.as_str()) => fence = None,
                Some(_) => {}
                None => fence = Some(marker),
            }
            content.push(line);
            continue;
        }
        if fence.is_some() {
            content.push(line);
            continue;
        }

        if line.starts_with("import ") || line.starts_with("export ") {
            if line.contains('{') && !line.contains('}') {
                statement = Some((line.to_string(), line_no));
            } else {
                esm.push(line.to_string());
            }
            content.push("");
            continue;
        }

        check_tags(line, line_no, &mut open, &mut diagnostics);
        content.push(line);
    }

    if let Some((_, start)) = statement {
        diagnostics.push(TransformDiagnostic::at(
            "unterminated import/export statement",
            start,
            1,
        ));
    }

    for (name, line, column) in open {
        diagnostics.push(TransformDiagnostic::at(
            format!("unclosed component <{name}>"),
            line,
            column,
        ));
    }

    if diagnostics.is_empty() {
        Ok(MdxModule {
            esm,
            content: content.join("\n"),
        })
    } else {
        diagnostics.sort_by_key(|d| (d.line, d.column));
        Err(diagnostics)
    }
}

/// Fence marker (run of backticks or tildes) opening or closing a code block.
fn fence_marker(line: &str) -> Option<String> {
    let ch = line.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let run: String = line.chars().take_while(|c| *c == ch).collect();
    (run.len() >= 3).then_some(run)
}

fn check_tags(
    line: &str,
    line_no: usize,
    open: &mut Vec<(String, usize, usize)>,
    diagnostics: &mut Vec<TransformDiagnostic>,
) {
    let masked = INLINE_CODE.replace_all(line, |caps: &regex::Captures<'_>| {
        " ".repeat(caps[0].len())
    });

    for caps in COMPONENT_TAG.captures_iter(&masked) {
        let Some(whole) = caps.get(0) else { continue };
        let closing = !caps[1].is_empty();
        let self_closing = !caps[3].is_empty();
        let name = caps[2].to_string();
        let column = masked[..whole.start()].chars().count() + 1;

        if self_closing {
            continue;
        }
        if !closing {
            open.push((name, line_no, column));
            continue;
        }
        match open.last() {
            Some((top, _, _)) if *top == name => {
                open.pop();
            }
            _ => diagnostics.push(TransformDiagnostic::at(
                format!("unexpected closing tag </{name}>"),
                line_no,
                column,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_esm() {
        let module = split_module(
            "import A from './a'\nexport const meta = { a: 1 }\n\n# Title\n\n<A />\n",
        )
        .expect("valid mdx");

        assert_eq!(
            module.esm,
            vec!["import A from './a'", "export const meta = { a: 1 }"]
        );
        assert_eq!(module.content, "\n\n\n# Title\n\n<A />");
    }

    #[test]
    fn test_multiline_import() {
        let module = split_module("import {\n  A,\n  B,\n} from './c'\n\ntext\n").expect("valid");
        assert_eq!(module.esm, vec!["import {\n  A,\n  B,\n} from './c'"]);
        assert_eq!(module.content.lines().count(), 6);
    }

    #[test]
    fn test_balanced_components() {
        let module = split_module("<Note title=\"x\">\n\nSome **text**\n\n</Note>\n").expect("ok");
        assert!(module.esm.is_empty());
    }

    #[test]
    fn test_unexpected_closing_tag() {
        let err = split_module("text\n  </Note>\n").expect_err("stray close");
        assert_eq!(err.len(), 1);
        assert_eq!(err[0].line, Some(2));
        assert_eq!(err[0].column, Some(3));
        assert_eq!(err[0].message, "unexpected closing tag </Note>");
    }

    #[test]
    fn test_tags_in_code_are_ignored() {
        let source = "```jsx\n<Open>\n```\n\nUse `<Open>` inline.\n\nimport x from 'y'";
        let module = split_module(source).expect("code is not checked");
        assert_eq!(module.esm, vec!["import x from 'y'"]);
    }

    #[test]
    fn test_lowercase_html_is_not_checked() {
        assert!(split_module("<div>\nopen html\n").is_ok());
    }

    #[test]
    fn test_fence_marker() {
        assert_eq!(fence_marker("```rust").as_deref(), Some("```"));
        assert_eq!(fence_marker("~~~~").as_deref(), Some("~~~~"));
        assert_eq!(fence_marker("``"), None);
        assert_eq!(fence_marker("text"), None);
    }
}
