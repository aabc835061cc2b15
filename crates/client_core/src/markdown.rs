//! A deliberately small markdown reader for the text view.
//!
//! It works line by line with regex substitutions, the same grade of fidelity as the
//! web frontend's renderer: headings up to level 3, bold, italic, inline code, fenced
//! code blocks, links, `-`/`*` bullets and blank-line paragraphs. Emphasis does not
//! nest and reference links, tables and block quotes come through as plain text. It
//! never fails: input it cannot interpret is kept as raw text and the document is
//! flagged as degraded.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Strong(String),
    Emphasis(String),
    Code(String),
    Link { text: String, href: String },
    LineBreak,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, inlines: Vec<Inline> },
    Paragraph(Vec<Inline>),
    List(Vec<Vec<Inline>>),
    CodeBlock { language: Option<String>, code: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichText {
    pub blocks: Vec<Block>,
    /// Part of the input could not be interpreted and is shown as raw text.
    pub degraded: bool,
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,3})\s+(.*)$").expect("static regex"))
}

fn bullet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*[-*]\s+(.*)$").expect("static regex"))
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*```\s*([\w+-]*)\s*$").expect("static regex"))
}

// Alternation order decides precedence: code spans swallow markers, bold beats italic.
fn inline_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"`(?P<code>[^`]+)`",
            r"|\[(?P<link_text>[^\]]+)\]\((?P<href>[^)\s]+)\)",
            r"|\*\*(?P<bold>.+?)\*\*",
            r"|__(?P<bold_u>.+?)__",
            r"|\*(?P<em>.+?)\*",
            r"|_(?P<em_u>.+?)_",
        ))
        .expect("static regex")
    })
}

pub fn parse(markdown: &str) -> RichText {
    let mut doc = RichText::default();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut list: Vec<Vec<Inline>> = Vec::new();
    let lines: Vec<&str> = markdown.lines().collect();
    let mut idx = 0;

    while idx < lines.len() {
        let line = lines[idx];

        if let Some(caps) = fence_re().captures(line) {
            let closing = lines[idx + 1..]
                .iter()
                .position(|candidate| candidate.trim() == "```");
            flush_paragraph(&mut doc, &mut paragraph);
            flush_list(&mut doc, &mut list);
            match closing {
                Some(offset) => {
                    let body = &lines[idx + 1..idx + 1 + offset];
                    let language = caps
                        .get(1)
                        .map(|m| m.as_str().to_string())
                        .filter(|lang| !lang.is_empty());
                    doc.blocks.push(Block::CodeBlock {
                        language,
                        code: body.join("\n"),
                    });
                    idx += offset + 2;
                }
                None => {
                    doc.blocks.push(Block::Paragraph(vec![Inline::Text(
                        lines[idx..].join("\n"),
                    )]));
                    doc.degraded = true;
                    idx = lines.len();
                }
            }
            continue;
        }

        if line.trim().is_empty() {
            flush_paragraph(&mut doc, &mut paragraph);
            flush_list(&mut doc, &mut list);
        } else if let Some(caps) = heading_re().captures(line) {
            flush_paragraph(&mut doc, &mut paragraph);
            flush_list(&mut doc, &mut list);
            doc.blocks.push(Block::Heading {
                level: caps[1].len() as u8,
                inlines: parse_inlines(caps[2].trim_end()),
            });
        } else if let Some(caps) = bullet_re().captures(line) {
            flush_paragraph(&mut doc, &mut paragraph);
            list.push(parse_inlines(caps[1].trim_end()));
        } else {
            flush_list(&mut doc, &mut list);
            paragraph.push(line.trim_end());
        }
        idx += 1;
    }

    flush_paragraph(&mut doc, &mut paragraph);
    flush_list(&mut doc, &mut list);
    doc
}

fn flush_paragraph(doc: &mut RichText, lines: &mut Vec<&str>) {
    if lines.is_empty() {
        return;
    }
    let mut inlines = Vec::new();
    for (i, line) in lines.drain(..).enumerate() {
        if i > 0 {
            inlines.push(Inline::LineBreak);
        }
        inlines.extend(parse_inlines(line));
    }
    doc.blocks.push(Block::Paragraph(inlines));
}

fn flush_list(doc: &mut RichText, items: &mut Vec<Vec<Inline>>) {
    if !items.is_empty() {
        doc.blocks.push(Block::List(std::mem::take(items)));
    }
}

pub fn parse_inlines(text: &str) -> Vec<Inline> {
    let mut out = Vec::new();
    let mut last = 0;
    for caps in inline_re().captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if whole.start() > last {
            out.push(Inline::Text(text[last..whole.start()].to_string()));
        }
        let span = if let Some(m) = caps.name("code") {
            Inline::Code(m.as_str().to_string())
        } else if let (Some(label), Some(href)) = (caps.name("link_text"), caps.name("href")) {
            Inline::Link {
                text: label.as_str().to_string(),
                href: href.as_str().to_string(),
            }
        } else if let Some(m) = caps.name("bold").or_else(|| caps.name("bold_u")) {
            Inline::Strong(m.as_str().to_string())
        } else if let Some(m) = caps.name("em").or_else(|| caps.name("em_u")) {
            Inline::Emphasis(m.as_str().to_string())
        } else {
            Inline::Text(whole.as_str().to_string())
        };
        out.push(span);
        last = whole.end();
    }
    if last < text.len() {
        out.push(Inline::Text(text[last..].to_string()));
    }
    out
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

impl RichText {
    /// Markup for HTML hosts. Every text span is escaped before it is wrapped.
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        for block in &self.blocks {
            match block {
                Block::Heading { level, inlines } => {
                    html.push_str(&format!("<h{level}>{}</h{level}>\n", inlines_html(inlines)));
                }
                Block::Paragraph(inlines) => {
                    html.push_str(&format!("<p>{}</p>\n", inlines_html(inlines)));
                }
                Block::List(items) => {
                    html.push_str("<ul>");
                    for item in items {
                        html.push_str(&format!("<li>{}</li>", inlines_html(item)));
                    }
                    html.push_str("</ul>\n");
                }
                Block::CodeBlock { language, code } => match language {
                    Some(lang) => html.push_str(&format!(
                        "<pre><code class=\"language-{}\">{}</code></pre>\n",
                        escape_html(lang),
                        escape_html(code)
                    )),
                    None => html.push_str(&format!(
                        "<pre><code>{}</code></pre>\n",
                        escape_html(code)
                    )),
                },
            }
        }
        html
    }

    /// Flattened text for hosts without rich text, e.g. a terminal.
    pub fn plain_text(&self) -> String {
        let mut blocks = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            let rendered = match block {
                Block::Heading { level, inlines } => {
                    format!("{} {}", "#".repeat(usize::from(*level)), inlines_plain(inlines))
                }
                Block::Paragraph(inlines) => inlines_plain(inlines),
                Block::List(items) => items
                    .iter()
                    .map(|item| format!("• {}", inlines_plain(item)))
                    .collect::<Vec<_>>()
                    .join("\n"),
                Block::CodeBlock { code, .. } => code.clone(),
            };
            blocks.push(rendered);
        }
        blocks.join("\n\n")
    }
}

fn inlines_html(inlines: &[Inline]) -> String {
    inlines
        .iter()
        .map(|inline| match inline {
            Inline::Text(text) => escape_html(text),
            Inline::Strong(text) => format!("<strong>{}</strong>", escape_html(text)),
            Inline::Emphasis(text) => format!("<em>{}</em>", escape_html(text)),
            Inline::Code(text) => format!("<code>{}</code>", escape_html(text)),
            Inline::Link { text, href } => {
                format!("<a href=\"{}\">{}</a>", escape_html(href), escape_html(text))
            }
            Inline::LineBreak => "<br/>".to_string(),
        })
        .collect()
}

fn inlines_plain(inlines: &[Inline]) -> String {
    inlines
        .iter()
        .map(|inline| match inline {
            Inline::Text(text)
            | Inline::Strong(text)
            | Inline::Emphasis(text)
            | Inline::Code(text) => text.clone(),
            Inline::Link { text, href } => format!("{text} ({href})"),
            Inline::LineBreak => "\n".to_string(),
        })
        .collect()
}
