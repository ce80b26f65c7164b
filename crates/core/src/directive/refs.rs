use std::fmt::Write as _;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::marker::{line_span, scan_markers};
use super::{DirectiveKind, TranscodeOptions, TranscodeReport, replace_pairs, replace_singles};
use crate::links::{clean_link_target, has_scheme};
use crate::slug::{humanize, strip_doc_extension, title_case};

static MARKDOWN_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\(([^)]*)\)").unwrap());

/// How `{% content-ref %}` blocks are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CardStyle {
    /// Styled navigation card markup.
    Cards,
    /// A plain Markdown link.
    Links,
}

/// Fixed card text for a well-known target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratedCard {
    /// Target path without extension (e.g. `installation`).
    pub target: String,
    /// Card heading.
    pub title: String,
    /// Card description.
    pub description: String,
}

/// Link text used for embeds whose URL contains `keyword`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedLabel {
    /// Substring searched in the URL.
    pub keyword: String,
    /// Link text.
    pub label: String,
}

pub(crate) fn default_curated_cards() -> Vec<CuratedCard> {
    vec![
        CuratedCard {
            target: "installation".into(),
            title: "Installation".into(),
            description: "Get ObjectBox library and generator set up in your project".into(),
        },
        CuratedCard {
            target: "getting-started".into(),
            title: "How to get started".into(),
            description: "Learn the basics of using ObjectBox in your application".into(),
        },
    ]
}

pub(crate) fn default_embed_labels() -> Vec<EmbedLabel> {
    [
        ("vector-search", "Learn more about On-Device Vector Search"),
        ("sync", "Learn more about Data Sync"),
        ("getting-started", "Getting Started Guide"),
    ]
    .into_iter()
    .map(|(keyword, label)| EmbedLabel {
        keyword: keyword.into(),
        label: label.into(),
    })
    .collect()
}

/// Strips `.md`/`.mdx` from a link target, keeping any `#anchor`.
pub fn clean_target(url: &str) -> String {
    let url = url.trim();
    clean_link_target(url).unwrap_or_else(|| url.to_string())
}

/// Site-absolute href for a card.
fn card_href(clean: &str) -> String {
    if has_scheme(clean) || clean.starts_with('/') || clean.starts_with("../") {
        clean.to_string()
    } else {
        format!("/{}", clean.trim_start_matches("./"))
    }
}

/// Renders the navigation card markup.
pub fn render_card(href: &str, title: &str, description: &str) -> String {
    let mut card = String::new();
    writeln!(card, "<div className=\"custom-nav-card\">").ok();
    writeln!(card, "  <a href=\"{href}\" className=\"custom-nav-card-link\">").ok();
    writeln!(card, "    <div className=\"custom-nav-card-content\">").ok();
    writeln!(card, "      <h3 className=\"custom-nav-card-title\">{title}</h3>").ok();
    writeln!(card, "      <p className=\"custom-nav-card-description\">{description}</p>").ok();
    writeln!(card, "    </div>").ok();
    writeln!(card, "    <div className=\"custom-nav-card-arrow\">›</div>").ok();
    writeln!(card, "  </a>").ok();
    card.push_str("</div>");
    card
}

/// Card title and description for a target.
fn card_text(clean: &str, link_text: &str, options: &TranscodeOptions) -> (String, String) {
    if let Some(curated) = options.curated_cards.iter().find(|c| c.target == clean) {
        return (curated.title.clone(), curated.description.clone());
    }
    let title = title_case(&strip_doc_extension(link_text.trim()).replace('-', " "));
    let description = format!("Learn more about {}", title.to_lowercase());
    (title, description)
}

/// Plain-link rendering of a content reference.
pub fn content_ref_link(url: &str, link_text: Option<&str>) -> String {
    let clean = clean_target(url);
    let text = link_text
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| humanize(last_segment(&clean)));
    format!("[{text}]({clean})")
}

/// `{% content-ref url="U" %}[text](…){% endcontent-ref %}` becomes a card
/// (or a link when cards are disabled).
pub fn convert_content_refs(
    text: &str,
    options: &TranscodeOptions,
    report: &mut TranscodeReport,
) -> String {
    let (output, stats) = replace_pairs(text, "content-ref", |open, inner| {
        let url = open.attr("url")?;
        let link = MARKDOWN_LINK.captures(inner)?;
        let link_text = link.get(1).map_or("", |m| m.as_str());

        Some(match options.card_style {
            CardStyle::Links => content_ref_link(url, Some(link_text)),
            CardStyle::Cards => {
                let clean = clean_target(url);
                let (title, description) = card_text(&clean, link_text, options);
                render_card(&card_href(&clean), &title, &description)
            }
        })
    });
    report.found(DirectiveKind::ContentRef, stats.found);
    report.converted(DirectiveKind::ContentRef, stats.converted);
    output
}

/// Last path segment of a URL or relative path, host excluded.
fn last_segment(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let path = match path.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map_or("", |(_, p)| p),
        None => path,
    };
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// Link text for an embedded URL.
pub fn embed_label(url: &str, options: &TranscodeOptions) -> String {
    if let Some(label) = options
        .embed_labels
        .iter()
        .find(|l| url.contains(l.keyword.as_str()))
    {
        return label.label.clone();
    }
    let segment = last_segment(url);
    if segment.is_empty() {
        "Learn more".to_string()
    } else {
        title_case(&segment.replace('-', " "))
    }
}

/// `{% embed url="U" %}` becomes `[label](U)`; `{% endembed %}` closers are
/// dropped.
pub fn convert_embeds(text: &str, options: &TranscodeOptions, report: &mut TranscodeReport) -> String {
    let (output, stats) = replace_singles(text, "embed", |marker| {
        let url = marker.attr("url")?.trim();
        Some(format!("[{}]({url})", embed_label(url, options)))
    });
    report.found(DirectiveKind::Embed, stats.found);
    report.converted(DirectiveKind::Embed, stats.converted);
    remove_markers(&output, "endembed")
}

/// `{% page-ref page="P" %}` becomes `[Humanized P](P)`.
pub fn convert_page_refs(text: &str, report: &mut TranscodeReport) -> String {
    let (output, stats) = replace_singles(text, "page-ref", |marker| {
        let page = marker.attr("page")?;
        Some(page_ref_link(page))
    });
    report.found(DirectiveKind::PageRef, stats.found);
    report.converted(DirectiveKind::PageRef, stats.converted);
    output
}

/// Link for a referenced page.
pub fn page_ref_link(page: &str) -> String {
    let clean = clean_target(page);
    format!("[{}]({clean})", humanize(last_segment(&clean)))
}

fn remove_markers(text: &str, name: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut cursor = 0usize;
    for marker in scan_markers(text).into_iter().filter(|m| m.name == name) {
        let span = line_span(text, marker.range);
        if span.start < cursor {
            continue;
        }
        output.push_str(&text[cursor..span.start]);
        cursor = span.end;
    }
    output.push_str(&text[cursor..]);
    output
}
