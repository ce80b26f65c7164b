use std::ops::Range;

use super::code::render_code_block;
use super::hint::{admonition_type, render_admonition};
use super::marker::{Marker, line_span, scan_markers};
use super::refs::{content_ref_link, page_ref_link};
use super::{DirectiveKind, TranscodeReport};
use crate::code_fence::{parse_fence_opener, split_line_ending};
use crate::error::{Diagnostic, Diagnostics, SourceLocation};

/// One fallback decision.
struct Fallback {
    span: Range<usize>,
    replacement: String,
    detail: &'static str,
    /// Index of the last marker consumed.
    last_marker: usize,
}

/// Degrades every marker still present after the regular passes.
///
/// Each handled marker is counted as a fallback and reported as a
/// [`Diagnostic::MalformedDirective`]. No `{% … %}` syntax survives outside
/// code.
pub fn sweep_remaining(
    text: &str,
    report: &mut TranscodeReport,
    diagnostics: &mut Diagnostics,
) -> String {
    let markers = scan_markers(text);
    if markers.is_empty() {
        return text.to_string();
    }

    let mut output = String::with_capacity(text.len());
    let mut cursor = 0usize;
    let mut idx = 0usize;

    while idx < markers.len() {
        let marker = &markers[idx];
        if marker.range.start < cursor {
            idx += 1;
            continue;
        }

        let mut fallback = paired_fallback(text, &markers, idx)
            .unwrap_or_else(|| single_fallback(text, marker, idx));
        if fallback.span.start < cursor {
            fallback.span.start = marker.range.start;
        }

        let kind = DirectiveKind::from_marker_name(&marker.name);
        report.fallback(kind, 1);
        diagnostics.push(Diagnostic::MalformedDirective {
            directive: kind,
            name: marker.name.clone(),
            detail: fallback.detail.to_string(),
            location: SourceLocation::at_offset(text, marker.range.start),
        });
        log::debug!(
            "directive fallback for '{}' at byte {}: {}",
            marker.name,
            marker.range.start,
            fallback.detail
        );

        output.push_str(&text[cursor..fallback.span.start]);
        output.push_str(&fallback.replacement);
        cursor = fallback.span.end;
        idx = fallback.last_marker + 1;
    }

    output.push_str(&text[cursor..]);
    output
}

/// Open marker immediately followed by its closer.
fn paired_fallback(text: &str, markers: &[Marker], idx: usize) -> Option<Fallback> {
    let open = &markers[idx];
    let close = markers.get(idx + 1).filter(|m| m.closes(&open.name))?;
    let inner = &text[open.range.end..close.range.start];
    let span = open.range.start..close.range.end;

    let (replacement, detail) = match open.name.as_str() {
        "code" => (
            fallback_code_block(open.attr("title"), inner),
            "converted to a text code block",
        ),
        "hint" => (
            render_admonition(admonition_type(open.attr("style")), inner),
            "converted to an admonition",
        ),
        "content-ref" => (
            content_ref_link(open.attr("url")?, None),
            "converted to a plain link",
        ),
        _ => return None,
    };

    Some(Fallback {
        span,
        replacement,
        detail,
        last_marker: idx + 1,
    })
}

fn fallback_code_block(title: Option<&str>, inner: &str) -> String {
    let mut lines: Vec<&str> = inner.trim().lines().collect();
    let mut fence = "```".to_string();

    let opener_fence = lines
        .first()
        .and_then(|first| parse_fence_opener(first))
        .map(|opener| opener.fence());
    if let Some(opener_fence) = opener_fence {
        fence = opener_fence;
        lines.remove(0);
    }
    if lines.last().is_some_and(|last| {
        let last = last.trim();
        last.len() >= 3 && last.chars().all(|c| c == '`' || c == '~')
    }) {
        lines.pop();
    }

    render_code_block(title, Some("text"), &fence, lines.join("\n").trim_end())
}

fn single_fallback(text: &str, marker: &Marker, idx: usize) -> Fallback {
    let replace = |replacement: String, detail| Fallback {
        span: marker.range.clone(),
        replacement,
        detail,
        last_marker: idx,
    };

    match marker.name.as_str() {
        "code" => dangling_code(text, marker, idx),
        "content-ref" if marker.attr("url").is_some() => replace(
            content_ref_link(marker.attr("url").unwrap_or_default(), None),
            "converted to a plain link",
        ),
        "page-ref" if marker.attr("page").is_some() => replace(
            page_ref_link(marker.attr("page").unwrap_or_default()),
            "converted to a link",
        ),
        "file" if marker.attr("src").is_some() => {
            let src = marker.attr("src").unwrap_or_default().trim();
            let name = src.rsplit('/').next().unwrap_or(src);
            replace(format!("[{name}]({src})"), "converted to a file link")
        }
        "tab" if marker.attr("title").is_some_and(|t| !t.trim().is_empty()) => replace(
            format!("**{}**", marker.attr("title").unwrap_or_default().trim()),
            "tab title kept as bold text",
        ),
        _ => Fallback {
            span: line_span(text, marker.range.clone()),
            replacement: String::new(),
            detail: "marker removed",
            last_marker: idx,
        },
    }
}

/// A `{% code %}` without closer: drop it and tag a directly following
/// bare fence as `text`.
fn dangling_code(text: &str, marker: &Marker, idx: usize) -> Fallback {
    let removed = line_span(text, marker.range.clone());
    let mut offset = removed.end;

    for line in text[removed.end..].split_inclusive('\n') {
        let (body, ending) = split_line_ending(line);
        if body.trim().is_empty() {
            offset += line.len();
            continue;
        }
        if let Some(opener) = parse_fence_opener(body)
            && opener.info.is_empty()
        {
            let indent = &body[..body.len() - body.trim_start().len()];
            return Fallback {
                span: removed.start..offset + line.len(),
                replacement: format!(
                    "{}{indent}{}text{ending}",
                    &text[removed.end..offset],
                    opener.fence()
                ),
                detail: "unclosed code directive; following fence tagged as text",
                last_marker: idx,
            };
        }
        break;
    }

    Fallback {
        span: removed,
        replacement: String::new(),
        detail: "unclosed code directive removed",
        last_marker: idx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep(text: &str) -> (String, TranscodeReport, Diagnostics) {
        let mut report = TranscodeReport::default();
        let mut diagnostics = Diagnostics::new();
        let output = sweep_remaining(text, &mut report, &mut diagnostics);
        (output, report, diagnostics)
    }

    #[test]
    fn clean_text_is_unchanged() {
        let (output, report, diagnostics) = sweep("# Title\n\nBody\n");
        assert_eq!(output, "# Title\n\nBody\n");
        assert_eq!(report.total_fallbacks(), 0);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn code_pair_without_fence_becomes_text_block() {
        let (output, report, diagnostics) =
            sweep("{% code title=\"out.log\" %}\nerror: x\n{% endcode %}\n");
        assert_eq!(output, "```text title=\"out.log\"\nerror: x\n```\n");
        assert_eq!(report.counts(DirectiveKind::Code).fallback, 1);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn dangling_code_tags_following_fence() {
        let (output, _, diagnostics) = sweep("Intro\n{% code %}\n\n```\nls\n```\n");
        assert_eq!(output, "Intro\n\n```text\nls\n```\n");
        match diagnostics.iter().next() {
            Some(Diagnostic::MalformedDirective {
                directive,
                location,
                ..
            }) => {
                assert_eq!(*directive, DirectiveKind::Code);
                assert_eq!(location.line, 2);
            }
            other => panic!("unexpected diagnostic {other:?}"),
        }
    }

    #[test]
    fn dangling_reference_becomes_link() {
        let (output, report, _) = sweep("{% content-ref url=\"queries.md\" %}\n");
        assert_eq!(output, "[Queries](queries)\n");
        assert_eq!(report.counts(DirectiveKind::ContentRef).fallback, 1);
    }

    #[test]
    fn leftover_tab_markers_are_flattened() {
        let input = "{% tabs %}\n{% tab title=\"Linux\" %}\nrun it\n{% endtabs %}\n";
        let (output, report, diagnostics) = sweep(input);
        assert_eq!(output, "**Linux**\nrun it\n");
        assert_eq!(report.total_fallbacks(), 3);
        assert_eq!(diagnostics.len(), 3);
    }

    #[test]
    fn unknown_and_file_markers() {
        let input = "{% swagger method=\"get\" %}\nSee {% file src=\".gitbook/assets/spec.pdf\" %}\n";
        let (output, report, _) = sweep(input);
        assert_eq!(output, "See [spec.pdf](.gitbook/assets/spec.pdf)\n");
        assert_eq!(report.counts(DirectiveKind::Unknown).fallback, 1);
        assert_eq!(report.counts(DirectiveKind::File).fallback, 1);
        assert!(scan_markers(&output).is_empty());
    }
}
