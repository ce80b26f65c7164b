//! SEO frontmatter: reading what a page has, filling in what it lacks.

use std::fmt::Write as _;

use gbmdx_core::code_fence::{FenceState, advance_fence_state};
use gbmdx_core::frontmatter::{find_header_block, parse_yaml_block};
use gbmdx_core::slug::{extract_custom_id, humanize};
use gbmdx_core::{Diagnostic, Diagnostics, SourceLocation};
use markdown::mdast::Node;
use serde_yaml::{Mapping, Value};

use crate::archetype::{Archetype, fill_template};
use crate::config::SiteConfig;

/// Longest synthesized title, in characters.
pub const MAX_TITLE_CHARS: usize = 60;
/// Longest synthesized description, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 160;
/// Keywords kept after deduplication.
pub const MAX_KEYWORDS: usize = 6;

const SEO_KEYS: [&str; 3] = ["title", "description", "keywords"];

/// Shape of the header found in a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderForm {
    /// `---` delimited block.
    Delimited,
    /// Block starting with `description:` but no opening delimiter.
    Bare,
    /// No header.
    Missing,
}

/// A page split into its header values and the rest.
#[derive(Debug, Clone)]
pub struct ExistingHeader {
    /// Shape of the header.
    pub form: HeaderForm,
    /// Parsed values; empty when missing or unparseable.
    pub frontmatter: Mapping,
    /// Everything after the header.
    pub body: String,
}

/// Splits `content` into header values and body.
///
/// Unparseable YAML yields an empty mapping and a diagnostic.
pub fn read_header(content: &str, diagnostics: &mut Diagnostics) -> ExistingHeader {
    match find_header_block(content) {
        Ok(Some(block)) => ExistingHeader {
            form: HeaderForm::Delimited,
            frontmatter: parse_or_report(block.yaml, diagnostics),
            body: content[block.body_start..].to_string(),
        },
        Ok(None) => bare_header(content, diagnostics).unwrap_or_else(|| missing(content)),
        Err(_) => {
            diagnostics.push(Diagnostic::UnterminatedHeader {
                location: SourceLocation::new(1, 1),
            });
            missing(content)
        }
    }
}

fn missing(content: &str) -> ExistingHeader {
    ExistingHeader {
        form: HeaderForm::Missing,
        frontmatter: Mapping::new(),
        body: content.to_string(),
    }
}

fn parse_or_report(yaml: &str, diagnostics: &mut Diagnostics) -> Mapping {
    parse_yaml_block(yaml).unwrap_or_else(|err| {
        diagnostics.push(Diagnostic::UnparseableMetadata {
            message: err.to_string(),
            location: SourceLocation::new(1, 1),
        });
        Mapping::new()
    })
}

/// A header that starts with `description:` and lacks the opening `---`.
///
/// It ends at a `---` line, which is dropped, or at the first unindented
/// line without a colon, which belongs to the body.
fn bare_header(content: &str, diagnostics: &mut Diagnostics) -> Option<ExistingHeader> {
    if !content.starts_with("description:") {
        return None;
    }

    let mut offset = 0usize;
    for (idx, line) in content.split_inclusive('\n').enumerate() {
        let trimmed = line.trim();
        let (yaml_end, body_start) = if trimmed == "---" {
            (offset, offset + line.len())
        } else if idx > 0
            && !line.starts_with([' ', '\t'])
            && !trimmed.is_empty()
            && !trimmed.contains(':')
        {
            (offset, offset)
        } else {
            offset += line.len();
            continue;
        };

        return Some(ExistingHeader {
            form: HeaderForm::Bare,
            frontmatter: parse_or_report(&content[..yaml_end], diagnostics),
            body: content[body_start..].to_string(),
        });
    }
    None
}

/// What the body offers for synthesis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentInfo {
    /// Text of the first level-1 heading, custom id removed.
    pub first_heading: Option<String>,
    /// First prose line longer than 20 characters.
    pub first_paragraph: Option<String>,
}

/// Scans `body` for a heading and a descriptive line.
pub fn content_info(body: &str) -> ContentInfo {
    ContentInfo {
        first_heading: first_heading(body),
        first_paragraph: first_paragraph(body),
    }
}

fn first_heading(body: &str) -> Option<String> {
    let heading = match markdown::to_mdast(body, &markdown::ParseOptions::gfm()) {
        Ok(root) => find_h1(&root),
        Err(message) => {
            log::debug!("markdown parse failed, scanning lines instead: {message}");
            scan_h1(body)
        }
    }?;
    let (text, _) = extract_custom_id(&heading);
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn find_h1(node: &Node) -> Option<String> {
    if let Node::Heading(heading) = node
        && heading.depth == 1
    {
        return Some(plain_text(node));
    }
    node.children()?.iter().find_map(find_h1)
}

fn plain_text(node: &Node) -> String {
    match node {
        Node::Text(text) => text.value.clone(),
        Node::InlineCode(code) => code.value.clone(),
        _ => node
            .children()
            .map(|children| children.iter().map(plain_text).collect())
            .unwrap_or_default(),
    }
}

fn scan_h1(body: &str) -> Option<String> {
    let mut state = FenceState::default();
    body.lines().find_map(|line| {
        let outcome = advance_fence_state(line, state);
        state = outcome.next_state;
        if outcome.in_code {
            return None;
        }
        line.trim().strip_prefix("# ").map(|h| h.trim().to_string())
    })
}

fn first_paragraph(body: &str) -> Option<String> {
    let mut state = FenceState::default();
    let mut in_tag = false;

    for line in body.lines() {
        let outcome = advance_fence_state(line, state);
        state = outcome.next_state;
        if outcome.in_code {
            continue;
        }
        let trimmed = line.trim();
        if in_tag {
            in_tag = !trimmed.contains('>');
            continue;
        }
        if trimmed.starts_with('<') {
            in_tag = !trimmed.contains('>');
            continue;
        }
        let skipped = trimmed.starts_with('#')
            || trimmed.starts_with("import ")
            || trimmed.starts_with("export ")
            || trimmed.starts_with(":::");
        if !skipped && trimmed.chars().count() > 20 {
            return Some(trimmed.to_string());
        }
    }
    None
}

/// A header value that was either kept or generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue<T> {
    /// Taken from the page as written.
    Present(T),
    /// Generated.
    Synthesized(T),
}

impl<T> MetadataValue<T> {
    /// The value.
    pub fn value(&self) -> &T {
        match self {
            MetadataValue::Present(value) | MetadataValue::Synthesized(value) => value,
        }
    }

    /// Whether the page already had it.
    pub fn is_present(&self) -> bool {
        matches!(self, MetadataValue::Present(_))
    }
}

/// Title, description and keywords of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    /// Page title.
    pub title: MetadataValue<String>,
    /// Meta description.
    pub description: MetadataValue<String>,
    /// Meta keywords.
    pub keywords: MetadataValue<Vec<String>>,
}

impl MetadataRecord {
    /// Whether nothing had to be generated.
    pub fn is_complete(&self) -> bool {
        self.title.is_present() && self.description.is_present() && self.keywords.is_present()
    }
}

/// Shortens `text` to `max` characters, ending in `...`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max.saturating_sub(3)).collect();
    short.push_str("...");
    short
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        _ => return None,
    };
    (!text.trim().is_empty()).then_some(text)
}

fn existing_keywords(value: &Value) -> Option<Vec<String>> {
    let keywords: Vec<String> = match value {
        Value::Sequence(items) => items.iter().filter_map(scalar_text).collect(),
        Value::String(text) => text
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect(),
        _ => return None,
    };
    (!keywords.is_empty()).then_some(keywords)
}

/// Builds the record for a page, keeping present values.
pub fn build_record(
    config: &SiteConfig,
    archetype: Option<&Archetype>,
    stem: &str,
    frontmatter: &Mapping,
    info: &ContentInfo,
) -> MetadataRecord {
    let title = match frontmatter.get("title").and_then(scalar_text) {
        Some(title) => MetadataValue::Present(title),
        None => MetadataValue::Synthesized(synthesize_title(config, archetype, stem, info)),
    };
    let description = match frontmatter.get("description").and_then(scalar_text) {
        Some(description) => MetadataValue::Present(description),
        None => MetadataValue::Synthesized(synthesize_description(config, archetype, stem, info)),
    };
    let keywords = match frontmatter.get("keywords").and_then(existing_keywords) {
        Some(keywords) => MetadataValue::Present(keywords),
        None => MetadataValue::Synthesized(synthesize_keywords(config, archetype, stem)),
    };
    MetadataRecord {
        title,
        description,
        keywords,
    }
}

/// Title from the archetype, the first heading or the file name.
pub fn synthesize_title(
    config: &SiteConfig,
    archetype: Option<&Archetype>,
    stem: &str,
    info: &ContentInfo,
) -> String {
    let suffix = format!("{} {}", config.project_name, config.language);
    let title = if let Some(archetype) = archetype {
        fill_template(&archetype.title_template, &config.project_name, &config.language)
    } else if let Some(heading) = &info.first_heading {
        if heading.contains(&config.project_name) {
            heading.clone()
        } else {
            format!("{heading} - {suffix}")
        }
    } else {
        format!("{} - {suffix}", humanize(&stem.to_lowercase()))
    };
    truncate(&title, MAX_TITLE_CHARS)
}

/// Description from the archetype, the first prose line or a generic
/// sentence about the file's topic.
pub fn synthesize_description(
    config: &SiteConfig,
    archetype: Option<&Archetype>,
    stem: &str,
    info: &ContentInfo,
) -> String {
    let description = if let Some(archetype) = archetype {
        fill_template(&archetype.description_template, &config.project_name, &config.language)
    } else if let Some(paragraph) = info
        .first_paragraph
        .as_ref()
        .filter(|p| p.chars().count() < MAX_DESCRIPTION_CHARS)
    {
        paragraph.clone()
    } else {
        let topic = stem.to_lowercase().replace(['-', '_'], " ");
        fill_template(&config.fallback_description, &config.project_name, &config.language)
            .replace("{topic}", &topic)
    };
    truncate(&description, MAX_DESCRIPTION_CHARS)
}

/// Project, language, base and page keywords, deduplicated.
pub fn synthesize_keywords(config: &SiteConfig, archetype: Option<&Archetype>, stem: &str) -> Vec<String> {
    let stem = stem.to_lowercase();
    let page_keywords: Vec<String> = match archetype {
        Some(archetype) => archetype.keywords.clone(),
        None => stem
            .split(|c: char| !c.is_ascii_alphabetic())
            .filter(|word| word.len() > 3)
            .map(str::to_string)
            .collect(),
    };

    let mut keywords: Vec<String> = Vec::new();
    let candidates = std::iter::once(config.project_name.to_lowercase())
        .chain(config.language_keywords().iter().cloned())
        .chain(config.base_keywords.iter().cloned())
        .chain(page_keywords);
    for keyword in candidates {
        if !keywords.contains(&keyword) {
            keywords.push(keyword);
        }
    }
    keywords.truncate(MAX_KEYWORDS);
    keywords
}

/// `"…"` with backslashes, quotes and line breaks escaped.
fn double_quoted(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    format!("\"{escaped}\"")
}

fn plain_safe(text: &str) -> bool {
    text.chars().next().is_some_and(|c| c.is_alphanumeric())
        && !text.ends_with(' ')
        && text
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '+' | '-' | '_' | '.' | '/'))
}

/// Header values other than title, description and keywords.
pub fn extra_keys(frontmatter: &Mapping) -> Mapping {
    frontmatter
        .iter()
        .filter(|(key, _)| !key.as_str().is_some_and(|k| SEO_KEYS.contains(&k)))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Renders the delimited header: the three SEO keys first, then `extra`.
pub fn render_header(record: &MetadataRecord, extra: &Mapping) -> Result<String, serde_yaml::Error> {
    let mut header = String::from("---\n");
    writeln!(header, "title: {}", double_quoted(record.title.value())).ok();
    writeln!(header, "description: {}", double_quoted(record.description.value())).ok();
    writeln!(header, "keywords:").ok();
    for keyword in record.keywords.value() {
        if plain_safe(keyword) {
            writeln!(header, "  - {keyword}").ok();
        } else {
            writeln!(header, "  - {}", double_quoted(keyword)).ok();
        }
    }
    if !extra.is_empty() {
        header.push_str(&serde_yaml::to_string(extra)?);
    }
    header.push_str("---");
    Ok(header)
}
