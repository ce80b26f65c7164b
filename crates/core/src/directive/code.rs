use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::{DirectiveKind, TranscodeReport, replace_pairs};
use crate::code_fence::{
    FenceOpener, FenceState, advance_fence_state, map_prose_segments, parse_fence_opener,
    split_line_ending,
};

static OPTIONS_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<options\b[^>]*>(.*?)</options>").unwrap());
static PRE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<pre([^>]*)>\s*<code([^>]*)>(.*?)</code>\s*</pre>").unwrap()
});
static LANGUAGE_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"language-([A-Za-z0-9_+#-]+)").unwrap());
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// `<options>…</options>` becomes a `txt` fence.
pub fn convert_option_blocks(text: &str, report: &mut TranscodeReport) -> String {
    let mut count = 0usize;
    let output = map_prose_segments(text, |segment| {
        OPTIONS_BLOCK
            .replace_all(segment, |caps: &Captures<'_>| {
                count += 1;
                format!("```txt\n{}\n```", caps[1].trim())
            })
            .into_owned()
    });
    report.found(DirectiveKind::Options, count);
    report.converted(DirectiveKind::Options, count);
    output
}

/// `<pre><code class="language-x">…</code></pre>` becomes an `x` fence
/// with tags stripped and entities decoded.
pub fn convert_preformatted(text: &str, report: &mut TranscodeReport) -> String {
    let mut count = 0usize;
    let output = map_prose_segments(text, |segment| {
        PRE_BLOCK
            .replace_all(segment, |caps: &Captures<'_>| {
                count += 1;
                let attrs = format!("{} {}", &caps[1], &caps[2]);
                let language = LANGUAGE_CLASS
                    .captures(&attrs)
                    .map(|m| m[1].to_string())
                    .unwrap_or_default();
                let stripped = ANY_TAG.replace_all(&caps[3], "");
                let code = html_escape::decode_html_entities(&stripped);
                format!("```{language}\n{}\n```", code.trim())
            })
            .into_owned()
    });
    report.found(DirectiveKind::Preformatted, count);
    report.converted(DirectiveKind::Preformatted, count);
    output
}

/// `{% code title="T" %}` + fence + `{% endcode %}` becomes one titled fence.
pub fn convert_code_directives(text: &str, report: &mut TranscodeReport) -> String {
    let (output, stats) = replace_pairs(text, "code", |open, inner| {
        let block = parse_wrapped_fence(inner)?;
        Some(render_code_block(
            open.attr("title"),
            block.opener.language(),
            &block.fence(),
            &block.content,
        ))
    });
    report.found(DirectiveKind::Code, stats.found);
    report.converted(DirectiveKind::Code, stats.converted);
    output
}

/// A fenced block found between a directive's markers.
#[derive(Debug, Clone)]
pub(crate) struct WrappedFence<'a> {
    pub opener: FenceOpener<'a>,
    pub content: String,
}

impl WrappedFence<'_> {
    pub fn fence(&self) -> String {
        self.opener.fence()
    }
}

/// Parses text that consists of exactly one fenced block, surrounding
/// whitespace aside.
pub(crate) fn parse_wrapped_fence(inner: &str) -> Option<WrappedFence<'_>> {
    let trimmed = inner.trim();
    let mut lines = trimmed.lines();
    let opener = parse_fence_opener(lines.next()?)?;
    let rest: Vec<&str> = lines.collect();
    let (closer, content) = rest.split_last()?;

    let closer = closer.trim();
    let closes = closer.chars().all(|c| c == opener.marker)
        && closer.chars().count() >= opener.length;
    if !closes {
        return None;
    }

    Some(WrappedFence {
        opener,
        content: content.join("\n"),
    })
}

/// Renders a fence with an optional display title.
///
/// The language is the explicit one, else inferred from the title, else
/// `text`. Quotes are removed from the title.
pub fn render_code_block(
    title: Option<&str>,
    language: Option<&str>,
    fence: &str,
    content: &str,
) -> String {
    let title = title
        .map(|t| t.replace('"', "").trim().to_string())
        .filter(|t| !t.is_empty());
    let language = language
        .map(str::to_string)
        .or_else(|| title.as_deref().and_then(language_from_title).map(str::to_string))
        .unwrap_or_else(|| "text".to_string());

    match title {
        Some(title) => format!("{fence}{language} title=\"{title}\"\n{content}\n{fence}"),
        None => format!("{fence}{language}\n{content}\n{fence}"),
    }
}

/// Infers a highlighting language from a file title.
pub fn language_from_title(title: &str) -> Option<&'static str> {
    let lower = title.trim().to_lowercase();
    let ends = |exts: &[&str]| exts.iter().any(|ext| lower.ends_with(ext));

    if ends(&[".fbs"]) {
        Some("fbs")
    } else if ends(&[".cpp", ".hpp"]) {
        Some("cpp")
    } else if ends(&[".c", ".h"]) {
        Some("c")
    } else if ends(&[".cmake"]) || title.contains("CMake") {
        Some("cmake")
    } else if ends(&[".sh", ".bash"]) {
        Some("sh")
    } else if ends(&[".py"]) {
        Some("python")
    } else if ends(&[".js"]) {
        Some("javascript")
    } else if ends(&[".go"]) {
        Some("go")
    } else {
        None
    }
}

/// Retags ```` ```text ```` fences whose content reveals a language.
///
/// Returns the new text and the number of retagged fences. Fences whose
/// language cannot be detected keep `text`.
pub fn refine_text_fences(text: &str) -> (String, usize) {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let mut output = String::with_capacity(text.len());
    let mut state = FenceState::default();
    let mut retagged = 0usize;

    for (idx, line) in lines.iter().enumerate() {
        let (body, ending) = split_line_ending(line);
        let was_inside = state.is_inside();
        state = advance_fence_state(body, state).next_state;

        if !was_inside
            && state.is_inside()
            && let Some(opener) = parse_fence_opener(body)
            && opener.info == "text"
        {
            let content = fence_content(&lines[idx + 1..], state);
            if let Some(language) = detect_language(&content) {
                let indent = &body[..body.len() - body.trim_start().len()];
                output.push_str(indent);
                output.push_str(&opener.fence());
                output.push_str(language);
                output.push_str(ending);
                retagged += 1;
                continue;
            }
        }
        output.push_str(line);
    }

    (output, retagged)
}

/// Removes fence debris left by GitBook exports.
///
/// An opener followed by blank lines and a second opener for a language
/// loses the second opener. A fence holding only blank lines is dropped.
/// Returns the new text and the number of repairs.
pub fn repair_malformed_fences(text: &str) -> (String, usize) {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let mut output = String::with_capacity(text.len());
    let mut state = FenceState::default();
    let mut repaired = 0usize;
    let mut idx = 0usize;

    while idx < lines.len() {
        let line = lines[idx];
        let (body, _) = split_line_ending(line);
        let next_state = advance_fence_state(body, state).next_state;

        if !state.is_inside()
            && next_state.is_inside()
            && let Some(opener) = parse_fence_opener(body)
        {
            let blanks = lines[idx + 1..]
                .iter()
                .take_while(|l| l.trim().is_empty())
                .count();
            let after = idx + 1 + blanks;
            if blanks > 0
                && let Some(next) = lines.get(after)
            {
                let (next_body, _) = split_line_ending(next);
                if !advance_fence_state(next_body, next_state).next_state.is_inside() {
                    repaired += 1;
                    idx = after + 1;
                    continue;
                }
                let duplicate = parse_fence_opener(next_body).is_some_and(|second| {
                    second.marker == opener.marker && second.language().is_some()
                });
                if duplicate && opener.language().is_some() {
                    output.push_str(line);
                    repaired += 1;
                    state = next_state;
                    idx = after + 1;
                    continue;
                }
            }
        }

        state = next_state;
        output.push_str(line);
        idx += 1;
    }

    (output, repaired)
}

fn fence_content(lines: &[&str], mut state: FenceState) -> String {
    let mut content = Vec::new();
    for line in lines {
        let (body, _) = split_line_ending(line);
        state = advance_fence_state(body, state).next_state;
        if !state.is_inside() {
            break;
        }
        content.push(body);
    }
    content.join("\n")
}

/// Guesses the language of a code sample from telltale keywords.
pub fn detect_language(content: &str) -> Option<&'static str> {
    let code = content.trim();
    let lower = code.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| code.contains(n));
    let has_lower = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has_lower(&[
        "cmake_minimum_required",
        "project(",
        "target_link_libraries",
        "add_executable",
        "find_package",
        "fetchcontent",
    ]) {
        Some("cmake")
    } else if has(&["std::", "namespace ", "cout", "template<", "class "]) {
        Some("cpp")
    } else if has(&["#include", "int main(", "printf(", "return 0"]) {
        Some("c")
    } else if has_lower(&["npm install", "yarn add", "package.json"])
        || has(&["curl ", "wget ", "sudo ", "./configure"])
        || code.starts_with('$')
        || code.starts_with("./")
    {
        Some("bash")
    } else {
        None
    }
}
