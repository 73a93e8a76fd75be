//! Evidence table rendering.
//!
//! Pure functions of the record: the same input always yields the same
//! output. Only `http`/`https` sources become links; anything else is shown
//! as escaped text.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use url::Url;

use intel_core::types::{EvidenceRecord, QuoteRow};

pub const NO_EVIDENCE_TEXT: &str = "No evidence captured yet.";
pub const NO_QUOTES_TEXT: &str = "The backend returned no quotes.";

pub const COLUMNS: [&str; 4] = ["Observation", "Quote", "Source", "Score"];

/// Terminal cells wider than this are truncated.
const MAX_TERMINAL_CELL: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFormat {
    Html,
    Markdown,
    Terminal,
}

impl fmt::Display for RenderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderFormat::Html => f.write_str("html"),
            RenderFormat::Markdown => f.write_str("markdown"),
            RenderFormat::Terminal => f.write_str("terminal"),
        }
    }
}

impl FromStr for RenderFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(RenderFormat::Html),
            "markdown" | "md" => Ok(RenderFormat::Markdown),
            "terminal" | "text" => Ok(RenderFormat::Terminal),
            other => Err(format!("unknown render format '{}'", other)),
        }
    }
}

/// Render the evidence slot in the requested format.
pub fn render(evidence: Option<&EvidenceRecord>, format: RenderFormat) -> String {
    match format {
        RenderFormat::Html => render_html(evidence),
        RenderFormat::Markdown => render_markdown(evidence),
        RenderFormat::Terminal => render_terminal(evidence),
    }
}

// =============================================================================
// HTML
// =============================================================================

pub fn render_html(evidence: Option<&EvidenceRecord>) -> String {
    let Some(record) = evidence else {
        return format!("<p class=\"evidence-empty\">{}</p>", NO_EVIDENCE_TEXT);
    };

    let mut out = String::from("<section class=\"evidence\">\n");

    if let Some(stack) = non_empty(record.tech_stack.as_ref()) {
        out.push_str("<h3>Tech stack</h3>\n<dl class=\"tech-stack\">\n");
        for (key, value) in stack {
            out.push_str(&format!(
                "<dt>{}</dt><dd>{}</dd>\n",
                html_escape(key),
                html_escape(&stack_value(value))
            ));
        }
        out.push_str("</dl>\n");
    }

    if record.quotes.is_empty() {
        out.push_str(&format!("<p class=\"evidence-empty\">{}</p>\n", NO_QUOTES_TEXT));
    } else {
        out.push_str("<table class=\"evidence-table\">\n<thead><tr>");
        for column in COLUMNS {
            out.push_str(&format!("<th scope=\"col\">{}</th>", column));
        }
        out.push_str("</tr></thead>\n<tbody>\n");
        for row in &record.quotes {
            out.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                html_escape(row.observation.as_deref().unwrap_or("")),
                html_escape(row.quote.as_deref().unwrap_or("")),
                html_source(row),
                format_score(row.score),
            ));
        }
        out.push_str("</tbody>\n</table>\n");
    }

    out.push_str("</section>");
    out
}

fn html_source(row: &QuoteRow) -> String {
    match row.source_url.as_deref() {
        Some(raw) if is_linkable(raw) => {
            let escaped = html_escape(raw);
            format!(
                "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>",
                escaped, escaped
            )
        }
        Some(raw) => html_escape(raw),
        None => String::new(),
    }
}

/// Escape text for HTML element content and double-quoted attributes.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

// =============================================================================
// Markdown
// =============================================================================

pub fn render_markdown(evidence: Option<&EvidenceRecord>) -> String {
    let Some(record) = evidence else {
        return format!("_{}_", NO_EVIDENCE_TEXT);
    };

    let mut out = String::new();

    if let Some(stack) = non_empty(record.tech_stack.as_ref()) {
        out.push_str("**Tech stack**\n\n");
        for (key, value) in stack {
            out.push_str(&format!(
                "- **{}**: {}\n",
                markdown_cell(key),
                markdown_cell(&stack_value(value))
            ));
        }
        out.push('\n');
    }

    if record.quotes.is_empty() {
        out.push_str(&format!("_{}_", NO_QUOTES_TEXT));
        return out;
    }

    out.push_str(&format!("| {} |\n", COLUMNS.join(" | ")));
    out.push_str("| --- | --- | --- | --- |\n");
    for row in &record.quotes {
        let source = match row.source_url.as_deref() {
            Some(raw) if is_linkable(raw) => {
                format!("[{}]({})", markdown_cell(raw), markdown_target(raw))
            }
            Some(raw) => markdown_cell(raw),
            None => String::new(),
        };
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            markdown_cell(row.observation.as_deref().unwrap_or("")),
            markdown_cell(row.quote.as_deref().unwrap_or("")),
            source,
            format_score(row.score),
        ));
    }
    out.trim_end().to_string()
}

/// Cell text safe inside a pipe table and a link label.
fn markdown_cell(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '|' | '[' | ']' | '\\' | '*' | '_' | '`' => {
                out.push('\\');
                out.push(c);
            }
            '\n' | '\r' => out.push(' '),
            other => out.push(other),
        }
    }
    out
}

fn markdown_target(s: &str) -> String {
    s.replace(' ', "%20")
        .replace('(', "%28")
        .replace(')', "%29")
}

// =============================================================================
// Terminal
// =============================================================================

pub fn render_terminal(evidence: Option<&EvidenceRecord>) -> String {
    let Some(record) = evidence else {
        return NO_EVIDENCE_TEXT.to_string();
    };

    let mut out = String::new();

    if let Some(stack) = non_empty(record.tech_stack.as_ref()) {
        out.push_str("Tech stack:\n");
        for (key, value) in stack {
            out.push_str(&format!(
                "  {}: {}\n",
                terminal_text(key),
                terminal_text(&stack_value(value))
            ));
        }
        out.push('\n');
    }

    if record.quotes.is_empty() {
        out.push_str(NO_QUOTES_TEXT);
        return out;
    }

    // Plain cell text decides the widths; links are wrapped afterwards so
    // escape sequences never count towards alignment.
    let rows: Vec<[String; 4]> = record
        .quotes
        .iter()
        .map(|row| {
            [
                truncate(&terminal_text(row.observation.as_deref().unwrap_or(""))),
                truncate(&terminal_text(row.quote.as_deref().unwrap_or(""))),
                terminal_text(row.source_url.as_deref().unwrap_or("")),
                format_score(row.score),
            ]
        })
        .collect();

    let mut widths = COLUMNS.map(|c| c.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header: Vec<String> = COLUMNS
        .iter()
        .zip(widths.iter())
        .map(|(c, w)| pad(c, *w))
        .collect();
    out.push_str(header.join(" | ").trim_end());
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("-+-"));
    out.push('\n');

    for (row, record_row) in rows.iter().zip(record.quotes.iter()) {
        let mut cells: Vec<String> = Vec::with_capacity(4);
        for (idx, (cell, width)) in row.iter().zip(widths.iter()).enumerate() {
            let padded = pad(cell, *width);
            let target = record_row
                .source_url
                .as_deref()
                .filter(|_| idx == 2)
                .and_then(terminal_link_target);
            match target {
                Some(target) => {
                    let padding = padded.chars().count() - cell.chars().count();
                    cells.push(format!("{}{}", osc8_link(&target, cell), " ".repeat(padding)));
                }
                None => cells.push(padded),
            }
        }
        out.push_str(cells.join(" | ").trim_end());
        out.push('\n');
    }
    out.trim_end().to_string()
}

/// OSC 8 hyperlink escape sequence.
pub fn osc8_link(url: &str, text: &str) -> String {
    format!("\x1b]8;;{}\x1b\\{}\x1b]8;;\x1b\\", url, text)
}

/// Strip control characters so backend text cannot inject escapes.
fn terminal_text(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

fn truncate(s: &str) -> String {
    if s.chars().count() <= MAX_TERMINAL_CELL {
        return s.to_string();
    }
    let kept: String = s.chars().take(MAX_TERMINAL_CELL - 3).collect();
    format!("{}...", kept)
}

fn pad(s: &str, width: usize) -> String {
    let len = s.chars().count();
    format!("{}{}", s, " ".repeat(width.saturating_sub(len)))
}

// =============================================================================
// Shared
// =============================================================================

fn non_empty(stack: Option<&Map<String, Value>>) -> Option<&Map<String, Value>> {
    stack.filter(|s| !s.is_empty())
}

fn stack_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(stack_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn is_linkable(raw: &str) -> bool {
    Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

/// The serialized form of a linkable URL. Parsing percent-encodes control
/// characters, so the escape sequence carries none of the raw bytes.
fn terminal_link_target(raw: &str) -> Option<String> {
    if !is_linkable(raw) {
        return None;
    }
    let url = Url::parse(raw).ok()?;
    Some(terminal_text(url.as_str()))
}

fn format_score(score: Option<f64>) -> String {
    match score {
        Some(s) if s.is_finite() && s.fract() == 0.0 && s.abs() < 1e15 => format!("{:.0}", s),
        Some(s) if s.is_finite() => format!("{}", s),
        _ => String::new(),
    }
}
