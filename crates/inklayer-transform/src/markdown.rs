//! Markdown transformer using pulldown-cmark.

use inklayer_core::{DocumentFormat, slug::slugify};
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use crate::{
    ContentTransformer, Result, TransformError, TransformRequest, mdx, syntax::SyntaxHighlighter,
};

/// Markdown transformer with syntax highlighting support.
///
/// Handles `md` bodies directly and `mdx` bodies after the component checks in
/// [`crate::mdx`].
#[derive(Debug)]
pub struct MarkdownTransformer {
    highlighter: SyntaxHighlighter,
    options: Options,
}

impl Default for MarkdownTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownTransformer {
    /// Create a new markdown transformer with default options.
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

        Self {
            highlighter: SyntaxHighlighter::default(),
            options,
        }
    }

    /// Create a transformer with a custom syntax theme.
    pub fn with_theme(theme: &str) -> Self {
        let mut transformer = Self::new();
        transformer.highlighter.set_theme(theme);
        transformer
    }

    /// Render markdown to HTML.
    pub fn render(&self, content: &str, heading_anchors: bool, theme: Option<&str>) -> String {
        let parser = Parser::new_ext(content, self.options);
        let mut out = HtmlWriter::default();
        let mut code_block: Option<(Option<String>, String)> = None;
        let mut image: Option<ImageState> = None;
        let mut in_table_head = false;

        for event in parser {
            if let Some((_, ref mut code)) = code_block {
                match event {
                    Event::Text(text) => {
                        code.push_str(&text);
                        continue;
                    }
                    Event::End(TagEnd::CodeBlock) => {}
                    _ => continue,
                }
            }

            if let Some(ref mut img) = image {
                match event {
                    Event::End(TagEnd::Image) => {}
                    Event::Text(text) | Event::Code(text) => {
                        img.alt.push_str(&text);
                        continue;
                    }
                    _ => continue,
                }
            }

            match event {
                Event::Start(Tag::Heading { level, id, .. }) => {
                    out.start_heading(level, id.map(|i| i.to_string()));
                }

                Event::End(TagEnd::Heading(_)) => {
                    out.end_heading(heading_anchors);
                }

                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => info
                            .split_whitespace()
                            .next()
                            .filter(|l| !l.is_empty())
                            .map(str::to_string),
                        CodeBlockKind::Indented => None,
                    };
                    code_block = Some((lang, String::new()));
                }

                Event::End(TagEnd::CodeBlock) => {
                    if let Some((lang, code)) = code_block.take() {
                        let highlighted = match theme {
                            Some(theme) => {
                                self.highlighter
                                    .highlight_with_theme(&code, lang.as_deref(), theme)
                            }
                            None => self.highlighter.highlight(&code, lang.as_deref()),
                        };
                        out.push(&highlighted);
                    }
                }

                Event::Start(Tag::Image {
                    dest_url, title, ..
                }) => {
                    image = Some(ImageState {
                        src: dest_url.to_string(),
                        title: title.to_string(),
                        alt: String::new(),
                    });
                }

                Event::End(TagEnd::Image) => {
                    if let Some(img) = image.take() {
                        let title_attr = if img.title.is_empty() {
                            String::new()
                        } else {
                            format!(" title=\"{}\"", html_escape(&img.title))
                        };
                        out.push(&format!(
                            "<img src=\"{}\" alt=\"{}\"{title_attr} />",
                            html_escape(&img.src),
                            html_escape(&img.alt)
                        ));
                    }
                }

                Event::Start(Tag::TableHead) => {
                    in_table_head = true;
                    out.push("<thead><tr>");
                }

                Event::End(TagEnd::TableHead) => {
                    in_table_head = false;
                    out.push("</tr></thead>\n<tbody>\n");
                }

                Event::Start(Tag::TableCell) => {
                    out.push(if in_table_head { "<th>" } else { "<td>" });
                }

                Event::End(TagEnd::TableCell) => {
                    out.push(if in_table_head { "</th>" } else { "</td>" });
                }

                Event::End(TagEnd::Table) => {
                    out.push("</tbody></table>\n");
                }

                Event::Text(text) => {
                    out.heading_text(&text);
                    out.push(&html_escape(&text));
                }

                Event::Code(code) => {
                    out.heading_text(&code);
                    out.push(&format!("<code>{}</code>", html_escape(&code)));
                }

                Event::SoftBreak => out.push("\n"),

                Event::HardBreak => out.push("<br />\n"),

                Event::Start(tag) => out.push(&tag_to_html_start(&tag)),

                Event::End(tag) => out.push(&tag_to_html_end(&tag)),

                Event::Html(raw) | Event::InlineHtml(raw) => out.push(&raw),

                Event::FootnoteReference(name) => {
                    out.push(&format!(
                        "<sup class=\"footnote-ref\"><a href=\"#fn-{name}\">[{name}]</a></sup>"
                    ));
                }

                Event::Rule => out.push("<hr />\n"),

                Event::TaskListMarker(checked) => {
                    out.push(if checked {
                        "<input type=\"checkbox\" checked disabled />"
                    } else {
                        "<input type=\"checkbox\" disabled />"
                    });
                }

                Event::InlineMath(math) => {
                    out.push(&format!("<span class=\"math inline\">\\({math}\\)</span>"));
                }

                Event::DisplayMath(math) => {
                    out.push(&format!("<div class=\"math display\">\\[{math}\\]</div>"));
                }
            }
        }

        out.finish()
    }
}

impl ContentTransformer for MarkdownTransformer {
    fn transform(&self, request: &TransformRequest<'_>) -> Result<String> {
        let theme = Some(request.plugins.highlight_theme.as_str());
        let anchors = request.plugins.heading_anchors;

        match request.format {
            DocumentFormat::Md => Ok(self.render(request.source, anchors, theme)),
            DocumentFormat::Mdx => {
                let module = mdx::split_module(request.source).map_err(TransformError::Failed)?;
                let html = self.render(&module.content, anchors, theme);
                if module.esm.is_empty() {
                    Ok(html)
                } else {
                    Ok(format!("{}\n\n{html}", module.esm.join("\n")))
                }
            }
            other => Err(TransformError::Unsupported(other)),
        }
    }
}

#[derive(Debug)]
struct ImageState {
    src: String,
    title: String,
    alt: String,
}

/// Output buffer that diverts heading content until the anchor id is known.
#[derive(Debug, Default)]
struct HtmlWriter {
    html: String,
    heading: Option<HeadingState>,
}

#[derive(Debug)]
struct HeadingState {
    level: HeadingLevel,
    explicit_id: Option<String>,
    text: String,
    inner: String,
}

impl HtmlWriter {
    fn push(&mut self, s: &str) {
        match self.heading {
            Some(ref mut heading) => heading.inner.push_str(s),
            None => self.html.push_str(s),
        }
    }

    fn heading_text(&mut self, s: &str) {
        if let Some(ref mut heading) = self.heading {
            heading.text.push_str(s);
        }
    }

    fn start_heading(&mut self, level: HeadingLevel, explicit_id: Option<String>) {
        self.heading = Some(HeadingState {
            level,
            explicit_id,
            text: String::new(),
            inner: String::new(),
        });
    }

    fn end_heading(&mut self, anchors: bool) {
        let Some(heading) = self.heading.take() else {
            return;
        };
        let lvl = heading.level as u8;
        let id = heading
            .explicit_id
            .or_else(|| anchors.then(|| slugify(&heading.text)))
            .filter(|id| !id.is_empty());
        let id_attr = id
            .map(|i| format!(" id=\"{}\"", html_escape(&i)))
            .unwrap_or_default();
        self.html
            .push_str(&format!("<h{lvl}{id_attr}>{}</h{lvl}>\n", heading.inner));
    }

    fn finish(self) -> String {
        self.html
    }
}

/// Convert a pulldown-cmark tag to HTML opening tag.
fn tag_to_html_start(tag: &Tag) -> String {
    match tag {
        Tag::Paragraph => "<p>".to_string(),
        Tag::Heading { level, .. } => format!("<h{}>", *level as u8),
        Tag::BlockQuote(_) => "<blockquote>\n".to_string(),
        Tag::CodeBlock(_) => String::new(),
        Tag::List(Some(1)) => "<ol>\n".to_string(),
        Tag::List(Some(start)) => format!("<ol start=\"{start}\">\n"),
        Tag::List(None) => "<ul>\n".to_string(),
        Tag::Item => "<li>".to_string(),
        Tag::FootnoteDefinition(name) => {
            format!("<div class=\"footnote\" id=\"fn-{name}\">")
        }
        Tag::Table(_) => "<table>".to_string(),
        Tag::TableHead => "<thead><tr>".to_string(),
        Tag::TableRow => "<tr>".to_string(),
        Tag::TableCell => "<td>".to_string(),
        Tag::Emphasis => "<em>".to_string(),
        Tag::Strong => "<strong>".to_string(),
        Tag::Strikethrough => "<del>".to_string(),
        Tag::Link {
            dest_url, title, ..
        } => {
            let title_attr = if title.is_empty() {
                String::new()
            } else {
                format!(" title=\"{}\"", html_escape(title))
            };
            format!("<a href=\"{}\"{title_attr}>", html_escape(dest_url))
        }
        Tag::Image { .. } => String::new(),
        Tag::HtmlBlock => String::new(),
        Tag::MetadataBlock(_) => String::new(),
        Tag::DefinitionList => "<dl>".to_string(),
        Tag::DefinitionListTitle => "<dt>".to_string(),
        Tag::DefinitionListDefinition => "<dd>".to_string(),
        Tag::Superscript => "<sup>".to_string(),
        Tag::Subscript => "<sub>".to_string(),
    }
}

/// Convert a pulldown-cmark tag end to HTML closing tag.
fn tag_to_html_end(tag: &TagEnd) -> String {
    match tag {
        TagEnd::Paragraph => "</p>\n".to_string(),
        TagEnd::Heading(level) => format!("</h{}>\n", *level as u8),
        TagEnd::BlockQuote(_) => "</blockquote>\n".to_string(),
        TagEnd::CodeBlock => String::new(),
        TagEnd::List(true) => "</ol>\n".to_string(),
        TagEnd::List(false) => "</ul>\n".to_string(),
        TagEnd::Item => "</li>\n".to_string(),
        TagEnd::FootnoteDefinition => "</div>\n".to_string(),
        TagEnd::Table => "</table>\n".to_string(),
        TagEnd::TableHead => "</tr></thead>\n".to_string(),
        TagEnd::TableRow => "</tr>\n".to_string(),
        TagEnd::TableCell => "</td>".to_string(),
        TagEnd::Emphasis => "</em>".to_string(),
        TagEnd::Strong => "</strong>".to_string(),
        TagEnd::Strikethrough => "</del>".to_string(),
        TagEnd::Link => "</a>".to_string(),
        TagEnd::Image => String::new(),
        TagEnd::HtmlBlock => String::new(),
        TagEnd::MetadataBlock(_) => String::new(),
        TagEnd::DefinitionList => "</dl>\n".to_string(),
        TagEnd::DefinitionListTitle => "</dt>\n".to_string(),
        TagEnd::DefinitionListDefinition => "</dd>\n".to_string(),
        TagEnd::Superscript => "</sup>".to_string(),
        TagEnd::Subscript => "</sub>".to_string(),
    }
}

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
