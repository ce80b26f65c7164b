use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::code_fence::{FenceState, advance_fence_state, parse_fence_opener};
use crate::error::{Diagnostic, Diagnostics, SourceLocation};

/// Where a document's header came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderSource {
    /// No header; the body is the whole document.
    Absent,
    /// A delimited header that parsed; raw text kept byte-for-byte.
    Parsed {
        /// Everything up to and including the closing delimiter line.
        raw: String,
    },
    /// A delimited header that failed to parse; raw text kept byte-for-byte.
    Unparseable {
        /// Everything up to and including the closing delimiter line.
        raw: String,
    },
    /// A header built from the leading paragraph.
    Synthesized {
        /// Rendered header, delimiters and trailing blank line included.
        text: String,
    },
}

impl HeaderSource {
    /// Text emitted in front of the body.
    pub fn text(&self) -> &str {
        match self {
            HeaderSource::Absent => "",
            HeaderSource::Parsed { raw } | HeaderSource::Unparseable { raw } => raw,
            HeaderSource::Synthesized { text } => text,
        }
    }

    /// Number of source lines the header occupied before the body.
    ///
    /// Synthesized headers occupy none: the body still starts at line 1 of
    /// the source.
    pub fn source_lines(&self) -> usize {
        match self {
            HeaderSource::Parsed { raw } | HeaderSource::Unparseable { raw } => {
                raw.matches('\n').count()
            }
            HeaderSource::Absent | HeaderSource::Synthesized { .. } => 0,
        }
    }
}

/// Result of splitting a document into header and body.
#[derive(Debug, Clone)]
pub struct FrontmatterSplit {
    /// Parsed or synthesized key/value pairs (empty when unusable).
    pub frontmatter: Mapping,
    /// Header provenance and its output text.
    pub header: HeaderSource,
    /// Everything after the header.
    pub body: String,
    /// Recovered problems.
    pub diagnostics: Diagnostics,
}

/// Errors emitted while parsing or extracting frontmatter.
#[derive(Debug, Error)]
pub enum FrontmatterError {
    /// Unclosed YAML fence (e.g., missing terminating `---`).
    #[error("Unterminated YAML frontmatter block: expected closing '---'")]
    Unterminated,
    /// YAML failed to parse or serialize.
    #[error("Frontmatter parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// Top-level YAML node was not a mapping.
    #[error("Frontmatter must be a YAML mapping at the top level")]
    InvalidRootType,
}

/// Byte layout of a delimited header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderBlock<'a> {
    /// YAML between the delimiters.
    pub yaml: &'a str,
    /// Offset of the first body byte.
    pub body_start: usize,
}

/// Locates a `---` delimited header after an optional BOM and blank lines.
pub fn find_header_block(input: &str) -> Result<Option<HeaderBlock<'_>>, FrontmatterError> {
    let bom_len = if input.starts_with('\u{feff}') {
        '\u{feff}'.len_utf8()
    } else {
        0
    };
    let mut cursor = bom_len;

    while let Some((line, next_cursor)) = next_line(input, cursor) {
        if line.trim().is_empty() {
            cursor = next_cursor;
            continue;
        }
        if !is_yaml_fence(line) {
            return Ok(None);
        }

        let block_start = next_cursor;
        let mut scan_cursor = next_cursor;
        while let Some((block_line, next_line_cursor)) = next_line(input, scan_cursor) {
            if is_yaml_fence(block_line) {
                return Ok(Some(HeaderBlock {
                    yaml: input[block_start..scan_cursor].trim_end_matches(['\r', '\n']),
                    body_start: next_line_cursor,
                }));
            }
            scan_cursor = next_line_cursor;
        }
        return Err(FrontmatterError::Unterminated);
    }
    Ok(None)
}

/// Parses header YAML into a mapping. Empty and `null` blocks are empty maps.
pub fn parse_yaml_block(block: &str) -> Result<Mapping, FrontmatterError> {
    if block.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(block)? {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(map) => Ok(map),
        _ => Err(FrontmatterError::InvalidRootType),
    }
}

/// Renders a mapping as a delimited header followed by a blank line.
pub fn render_header(frontmatter: &Mapping) -> Result<String, FrontmatterError> {
    let yaml = serde_yaml::to_string(frontmatter)?;
    Ok(format!("---\n{yaml}---\n\n"))
}

/// Splits raw text into frontmatter and body.
///
/// A delimited header is parsed when present and kept verbatim either way.
/// Without one, a leading prose paragraph becomes the `description` and is
/// moved below the first top-level heading so the page still shows it.
pub fn normalize_frontmatter(raw: &str) -> FrontmatterSplit {
    let mut diagnostics = Diagnostics::new();

    match find_header_block(raw) {
        Ok(Some(block)) => {
            let header_raw = raw[..block.body_start].to_string();
            let body = raw[block.body_start..].to_string();
            match parse_yaml_block(block.yaml) {
                Ok(frontmatter) => FrontmatterSplit {
                    body: show_header_description(&frontmatter, body),
                    frontmatter,
                    header: HeaderSource::Parsed { raw: header_raw },
                    diagnostics,
                },
                Err(err) => {
                    diagnostics.push(Diagnostic::UnparseableMetadata {
                        message: err.to_string(),
                        location: SourceLocation::new(1, 1),
                    });
                    FrontmatterSplit {
                        frontmatter: Mapping::new(),
                        header: HeaderSource::Unparseable { raw: header_raw },
                        body,
                        diagnostics,
                    }
                }
            }
        }
        Ok(None) => synthesize_description(raw, diagnostics),
        Err(_) => {
            let opener = raw.find("---").unwrap_or(0);
            diagnostics.push(Diagnostic::UnterminatedHeader {
                location: SourceLocation::at_offset(raw, opener),
            });
            unchanged(raw, diagnostics)
        }
    }
}

fn unchanged(raw: &str, diagnostics: Diagnostics) -> FrontmatterSplit {
    FrontmatterSplit {
        frontmatter: Mapping::new(),
        header: HeaderSource::Absent,
        body: raw.to_string(),
        diagnostics,
    }
}

fn synthesize_description(raw: &str, mut diagnostics: Diagnostics) -> FrontmatterSplit {
    let Some((paragraph_end, rest_start)) = first_paragraph_end(raw) else {
        return unchanged(raw, diagnostics);
    };
    let paragraph = &raw[..paragraph_end];
    let trimmed = paragraph.trim();
    if !is_description_paragraph(trimmed) {
        return unchanged(raw, diagnostics);
    }

    let description = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut frontmatter = Mapping::new();
    frontmatter.insert(
        Value::String("description".into()),
        Value::String(description),
    );

    let header_text = match render_header(&frontmatter) {
        Ok(text) => text,
        Err(err) => {
            diagnostics.push(Diagnostic::UnparseableMetadata {
                message: err.to_string(),
                location: SourceLocation::new(1, 1),
            });
            return unchanged(raw, diagnostics);
        }
    };

    let rest = &raw[rest_start..];
    FrontmatterSplit {
        frontmatter,
        header: HeaderSource::Synthesized { text: header_text },
        body: relocate_after_title(trimmed, rest),
        diagnostics,
    }
}

/// End of the leading paragraph and start of what follows the blank line
/// after it. Accepts `\n` and `\r\n` endings.
fn first_paragraph_end(raw: &str) -> Option<(usize, usize)> {
    let mut offset = 0usize;
    for line in raw.split_inclusive('\n') {
        if line.trim().is_empty() && !raw[..offset].trim().is_empty() {
            return Some((offset, offset + line.len()));
        }
        offset += line.len();
    }
    None
}

fn is_description_paragraph(trimmed: &str) -> bool {
    !trimmed.is_empty()
        && !trimmed.starts_with('#')
        && !trimmed.starts_with("{%")
        && parse_fence_opener(trimmed).is_none()
}

/// Re-inserts `paragraph` after the first `# ` heading of `rest`, or in
/// front of `rest` when it has none.
fn relocate_after_title(paragraph: &str, rest: &str) -> String {
    let mut state = FenceState::default();
    let mut offset = 0usize;

    for line in rest.split_inclusive('\n') {
        let outcome = advance_fence_state(line.trim_end_matches(['\r', '\n']), state);
        state = outcome.next_state;
        offset += line.len();
        if outcome.in_code {
            continue;
        }
        if line.trim_start().starts_with("# ") {
            let (head, tail) = rest.split_at(offset);
            let separator = if head.ends_with('\n') { "" } else { "\n" };
            let tail = tail.trim_start_matches(['\r', '\n']);
            return format!("{head}{separator}\n{paragraph}\n\n{tail}");
        }
    }

    format!("{paragraph}\n\n{rest}")
}

/// GitBook renders a header `description` as the page lead. Puts it below
/// the title unless the body already shows it or the header carries a
/// `title`, which GitBook headers never do.
fn show_header_description(frontmatter: &Mapping, body: String) -> String {
    if frontmatter.contains_key("title") {
        return body;
    }
    let Some(description) = frontmatter.get("description").and_then(Value::as_str) else {
        return body;
    };
    let description = description.split_whitespace().collect::<Vec<_>>().join(" ");
    if description.is_empty() || body_shows(&body, &description) {
        return body;
    }

    let content = body.trim_start_matches(['\n', '\r']);
    let lead = &body[..body.len() - content.len()];
    format!("{lead}{}", relocate_after_title(&description, content))
}

/// Whether `description` already appears in `body`. Later stages rewrite
/// markup, so only the plain text before the first markup character is
/// compared when it is long enough to be telling.
fn body_shows(body: &str, description: &str) -> bool {
    let flat = body.split_whitespace().collect::<Vec<_>>().join(" ");
    let plain = description
        .split(['[', '<', '{', '&', '`', '(', '*', '_'])
        .next()
        .unwrap_or_default()
        .trim_end();
    if plain.chars().count() >= 20 {
        flat.contains(plain)
    } else {
        flat.contains(description)
            || flat.contains(&description.replace('{', "&#123;").replace('}', "&#125;"))
    }
}

fn next_line(input: &str, start: usize) -> Option<(&str, usize)> {
    if start >= input.len() {
        return None;
    }

    let bytes = &input.as_bytes()[start..];
    if let Some(pos) = bytes.iter().position(|b| *b == b'\n') {
        let line_end = start + pos;
        Some((&input[start..line_end], line_end + 1))
    } else {
        Some((&input[start..], input.len()))
    }
}

fn is_yaml_fence(line: &str) -> bool {
    line.trim_end_matches('\r').trim_end() == "---"
}
