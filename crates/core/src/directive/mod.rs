//! Block-level conversion of GitBook directives.
//!
//! Directive kinds are converted one kind at a time, in
//! [`DirectiveKind::CONVERSION_ORDER`]. Kinds overlap textually (a hint can
//! hold a code block, a tab can hold a hint), so inner kinds are converted
//! before the outer kinds that may enclose them. Anything left afterwards is
//! degraded by a context-free [`sweep`](sweep::sweep_remaining).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Diagnostics;

/// Code directives, option blocks and preformatted HTML.
pub mod code;
/// Admonitions.
pub mod hint;
/// Marker scanning.
pub mod marker;
/// Cross-reference cards, embeds and page references.
pub mod refs;
/// Fallback conversions for leftover markers.
pub mod sweep;
/// Tab groups.
pub mod tabs;

pub use marker::{Marker, scan_markers};
pub use refs::{CardStyle, CuratedCard, EmbedLabel};

/// Families of block constructs handled by the transcoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DirectiveKind {
    /// `<options>…</options>` blocks.
    Options,
    /// `<pre><code>…</code></pre>` blocks.
    Preformatted,
    /// `{% code %}` wrappers around fenced code.
    Code,
    /// `{% content-ref %}` cross-reference cards.
    ContentRef,
    /// `{% embed %}` links.
    Embed,
    /// `{% page-ref %}` links.
    PageRef,
    /// `{% hint %}` admonitions.
    Hint,
    /// `{% tabs %}` groups.
    Tabs,
    /// `{% tab %}` entries inside a group.
    Tab,
    /// `{% file %}` attachments.
    File,
    /// Any other marker name.
    Unknown,
}

impl DirectiveKind {
    /// Order in which kinds are converted. Reordering corrupts nested input.
    pub const CONVERSION_ORDER: [DirectiveKind; 8] = [
        DirectiveKind::Options,
        DirectiveKind::Preformatted,
        DirectiveKind::Code,
        DirectiveKind::ContentRef,
        DirectiveKind::Embed,
        DirectiveKind::PageRef,
        DirectiveKind::Hint,
        DirectiveKind::Tabs,
    ];

    /// Kind of a `{% name %}` marker, closers included.
    pub fn from_marker_name(name: &str) -> Self {
        let base = match name.strip_prefix("end") {
            Some(rest) if !rest.is_empty() => rest,
            _ => name,
        };
        match base {
            "code" => DirectiveKind::Code,
            "content-ref" => DirectiveKind::ContentRef,
            "embed" => DirectiveKind::Embed,
            "page-ref" => DirectiveKind::PageRef,
            "hint" => DirectiveKind::Hint,
            "tabs" => DirectiveKind::Tabs,
            "tab" => DirectiveKind::Tab,
            "file" => DirectiveKind::File,
            _ => DirectiveKind::Unknown,
        }
    }
}

/// Per-kind conversion counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    /// Occurrences seen by the regular pass.
    pub found: usize,
    /// Occurrences the regular pass converted.
    pub converted: usize,
    /// Markers degraded by the fallback sweep.
    pub fallback: usize,
}

/// Counters for one transcoding run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TranscodeReport {
    counts: BTreeMap<DirectiveKind, KindCounts>,
    /// Bare `text` fences retagged with a detected language.
    pub retagged_text_fences: usize,
    /// Duplicated or empty fences removed.
    pub repaired_fences: usize,
}

impl TranscodeReport {
    /// Counters for `kind` (zeroes when never seen).
    pub fn counts(&self, kind: DirectiveKind) -> KindCounts {
        self.counts.get(&kind).copied().unwrap_or_default()
    }

    /// Add occurrences seen by a regular pass.
    pub fn found(&mut self, kind: DirectiveKind, count: usize) {
        self.counts.entry(kind).or_default().found += count;
    }

    /// Add occurrences converted by a regular pass.
    pub fn converted(&mut self, kind: DirectiveKind, count: usize) {
        self.counts.entry(kind).or_default().converted += count;
    }

    /// Add markers handled by the sweep.
    pub fn fallback(&mut self, kind: DirectiveKind, count: usize) {
        self.counts.entry(kind).or_default().fallback += count;
    }

    /// Total markers the sweep had to handle.
    pub fn total_fallbacks(&self) -> usize {
        self.counts.values().map(|c| c.fallback).sum()
    }

    /// Iterate counters in kind order.
    pub fn iter(&self) -> impl Iterator<Item = (DirectiveKind, KindCounts)> + '_ {
        self.counts.iter().map(|(kind, counts)| (*kind, *counts))
    }
}

/// Options for the structural transcoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeOptions {
    /// How content references are rendered.
    pub card_style: CardStyle,
    /// Targets with fixed card titles and descriptions.
    pub curated_cards: Vec<CuratedCard>,
    /// URL keywords that select embed link text, checked in order.
    pub embed_labels: Vec<EmbedLabel>,
    /// Retag bare `text` fences whose content reveals a language.
    pub refine_text_fences: bool,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            card_style: CardStyle::Cards,
            curated_cards: refs::default_curated_cards(),
            embed_labels: refs::default_embed_labels(),
            refine_text_fences: true,
        }
    }
}

/// Output of [`transcode`].
#[derive(Debug, Clone)]
pub struct Transcoded {
    /// Converted body.
    pub text: String,
    /// Conversion counters.
    pub report: TranscodeReport,
    /// Markers degraded by the sweep, with body-relative positions.
    pub diagnostics: Diagnostics,
}

/// Converts every directive in `body`.
pub fn transcode(body: &str, options: &TranscodeOptions) -> Transcoded {
    let mut report = TranscodeReport::default();
    let mut text = body.to_string();

    for kind in DirectiveKind::CONVERSION_ORDER {
        text = convert_kind(kind, &text, options, &mut report);
    }

    let mut diagnostics = Diagnostics::new();
    text = sweep::sweep_remaining(&text, &mut report, &mut diagnostics);

    let (repaired, count) = code::repair_malformed_fences(&text);
    report.repaired_fences = count;
    text = repaired;

    if options.refine_text_fences {
        let (refined, retagged) = code::refine_text_fences(&text);
        report.retagged_text_fences = retagged;
        text = refined;
    }

    Transcoded {
        text,
        report,
        diagnostics,
    }
}

/// Runs the regular pass for one kind.
pub fn convert_kind(
    kind: DirectiveKind,
    text: &str,
    options: &TranscodeOptions,
    report: &mut TranscodeReport,
) -> String {
    match kind {
        DirectiveKind::Options => code::convert_option_blocks(text, report),
        DirectiveKind::Preformatted => code::convert_preformatted(text, report),
        DirectiveKind::Code => code::convert_code_directives(text, report),
        DirectiveKind::ContentRef => refs::convert_content_refs(text, options, report),
        DirectiveKind::Embed => refs::convert_embeds(text, options, report),
        DirectiveKind::PageRef => refs::convert_page_refs(text, report),
        DirectiveKind::Hint => hint::convert_hints(text, report),
        DirectiveKind::Tabs => tabs::convert_tab_groups(text, report),
        DirectiveKind::Tab | DirectiveKind::File | DirectiveKind::Unknown => text.to_string(),
    }
}

/// Counts of one pair-replacement run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PairStats {
    pub found: usize,
    pub converted: usize,
}

/// Replaces `{% name %}…{% endname %}` pairs.
///
/// An open marker pairs with the next closer; an open that meets another
/// open of the same name first is left for the sweep. `convert` receives the
/// opening marker and the inner text and may decline with `None`.
pub(crate) fn replace_pairs<F>(text: &str, name: &str, mut convert: F) -> (String, PairStats)
where
    F: FnMut(&Marker, &str) -> Option<String>,
{
    let markers = scan_markers(text);
    let mut output = String::with_capacity(text.len());
    let mut stats = PairStats::default();
    let mut cursor = 0usize;
    let mut idx = 0usize;

    while idx < markers.len() {
        let open = &markers[idx];
        if open.name != name {
            idx += 1;
            continue;
        }
        stats.found += 1;

        let close_idx = markers[idx + 1..]
            .iter()
            .position(|m| m.name == name || m.closes(name))
            .map(|offset| idx + 1 + offset)
            .filter(|&j| markers[j].closes(name));

        let Some(close_idx) = close_idx else {
            idx += 1;
            continue;
        };
        let close = &markers[close_idx];
        let inner = &text[open.range.end..close.range.start];

        if let Some(replacement) = convert(open, inner) {
            output.push_str(&text[cursor..open.range.start]);
            output.push_str(&replacement);
            cursor = close.range.end;
            stats.converted += 1;
            idx = close_idx + 1;
        } else {
            idx += 1;
        }
    }

    output.push_str(&text[cursor..]);
    (output, stats)
}

/// Replaces standalone `{% name … %}` markers.
pub(crate) fn replace_singles<F>(text: &str, name: &str, mut convert: F) -> (String, PairStats)
where
    F: FnMut(&Marker) -> Option<String>,
{
    let mut output = String::with_capacity(text.len());
    let mut stats = PairStats::default();
    let mut cursor = 0usize;

    for marker in scan_markers(text).iter().filter(|m| m.name == name) {
        stats.found += 1;
        if let Some(replacement) = convert(marker) {
            output.push_str(&text[cursor..marker.range.start]);
            output.push_str(&replacement);
            cursor = marker.range.end;
            stats.converted += 1;
        }
    }

    output.push_str(&text[cursor..]);
    (output, stats)
}
