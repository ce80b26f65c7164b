//! Context-sensitive brace escaping.
//!
//! MDX evaluates `{…}` in prose as JavaScript. Braces in plain text are
//! therefore replaced with `&#123;`/`&#125;`, except where they carry
//! meaning: fenced code, inline code, import/export statements, directive
//! markers, admonition fences and anything inside a component tag.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::code_fence::{FenceState, advance_fence_state, split_code_spans, split_line_ending};
use crate::error::{Diagnostic, Diagnostics, SourceLocation};

static COMPONENT_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(/?)([A-Z][A-Za-z0-9_.]*)").unwrap());

/// How a line is treated by the escaper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// Fence delimiter or fenced content.
    Fence,
    /// Part of a component: a tag line or a line inside an open tag.
    Component,
    /// Statement or admonition line whose braces are syntax.
    Exempt,
    /// Plain prose.
    Prose,
}

/// A component tag that has been opened but not closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenComponent {
    /// Tag name, e.g. `TabItem`.
    pub name: String,
    /// 1-indexed line of the opening `<`.
    pub line: usize,
    /// 1-indexed column of the opening `<`.
    pub column: usize,
}

/// Line-by-line classification state.
#[derive(Debug, Clone, Default)]
pub struct EscapeContext {
    /// Fence tracking.
    pub fence: FenceState,
    /// Components opened and not yet closed, innermost last.
    pub component_stack: Vec<OpenComponent>,
    /// Opening tag whose `>` has not been seen yet.
    pub pending_tag: Option<OpenComponent>,
    fences_opened: usize,
}

impl EscapeContext {
    /// Classifies `line` (without its line ending) and advances the state.
    pub fn classify(&mut self, line: &str, line_no: usize) -> LineClass {
        let outcome = advance_fence_state(line, self.fence);
        let opened = !self.fence.is_inside() && outcome.next_state.is_inside();
        self.fence = outcome.next_state;
        if outcome.in_code {
            if opened {
                self.fences_opened += 1;
            }
            return LineClass::Fence;
        }

        let mut touched = false;
        let mut resume = 0usize;

        if let Some(pending) = self.pending_tag.take() {
            touched = true;
            match find_tag_end(line) {
                Some((end, self_closing)) => {
                    if !self_closing {
                        self.component_stack.push(pending);
                    }
                    resume = end;
                }
                None => {
                    self.pending_tag = Some(pending);
                    return LineClass::Component;
                }
            }
        }

        if self.scan_tags(line, line_no, resume) {
            touched = true;
        }

        if touched || !self.component_stack.is_empty() || self.pending_tag.is_some() {
            return LineClass::Component;
        }

        let trimmed = line.trim_start();
        if trimmed.starts_with("import ")
            || trimmed.starts_with("export ")
            || trimmed.starts_with(":::")
            || trimmed.starts_with("@tab ")
        {
            return LineClass::Exempt;
        }
        LineClass::Prose
    }

    /// Number of fenced blocks opened so far.
    pub fn fences_opened(&self) -> usize {
        self.fences_opened
    }

    /// Scans component tags from byte `from`; returns whether any was seen.
    fn scan_tags(&mut self, line: &str, line_no: usize, from: usize) -> bool {
        let code_ranges = code_span_ranges(line);
        let mut seen = false;
        let mut resume = from;

        for caps in COMPONENT_TAG.captures_iter(line) {
            let Some(whole) = caps.get(0) else { continue };
            if whole.start() < resume || code_ranges.iter().any(|r| r.contains(&whole.start())) {
                continue;
            }
            seen = true;
            let name = caps[2].to_string();

            if !caps[1].is_empty() {
                if self.component_stack.last().is_some_and(|top| top.name == name) {
                    self.component_stack.pop();
                }
                resume = whole.end();
                continue;
            }

            let open = OpenComponent {
                name,
                line: line_no,
                column: line[..whole.start()].chars().count() + 1,
            };
            match find_tag_end(&line[whole.end()..]) {
                Some((end, self_closing)) => {
                    if !self_closing {
                        self.component_stack.push(open);
                    }
                    resume = whole.end() + end;
                }
                None => {
                    self.pending_tag = Some(open);
                    break;
                }
            }
        }
        seen
    }
}

/// Finds the `>` that ends a tag, skipping quoted values and `{…}`
/// expressions. Returns the byte offset after it and whether it was `/>`.
fn find_tag_end(text: &str) -> Option<(usize, bool)> {
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut prev = '\0';

    for (idx, ch) in text.char_indices() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '"' | '\'' if depth == 0 => quote = Some(ch),
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                '>' if depth == 0 => return Some((idx + 1, prev == '/')),
                _ => {}
            },
        }
        if !ch.is_whitespace() {
            prev = ch;
        }
    }
    None
}

/// Byte ranges of a prose line whose braces stay: inline code, and
/// `{% … %}` markers outside it. An unterminated marker runs to the end.
fn protected_ranges(line: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut offset = 0usize;
    for (part, code) in split_code_spans(line) {
        if code {
            ranges.push(offset..offset + part.len());
        } else {
            let mut cursor = 0usize;
            while let Some(found) = part[cursor..].find("{%") {
                let start = cursor + found;
                let end = part[start + 2..]
                    .find("%}")
                    .map_or(part.len(), |close| start + 2 + close + 2);
                ranges.push(offset + start..offset + end);
                cursor = end;
            }
        }
        offset += part.len();
    }
    ranges
}

fn is_protected(ranges: &[Range<usize>], idx: usize) -> bool {
    ranges.iter().any(|range| range.contains(&idx))
}

/// Appends `line` with unprotected braces replaced; returns whether any was.
fn escape_line(line: &str, output: &mut String) -> bool {
    let protected = protected_ranges(line);
    let mut changed = false;
    for (idx, ch) in line.char_indices() {
        let entity = match ch {
            '{' => "&#123;",
            '}' => "&#125;",
            _ => {
                output.push(ch);
                continue;
            }
        };
        if is_protected(&protected, idx) {
            output.push(ch);
        } else {
            output.push_str(entity);
            changed = true;
        }
    }
    changed
}

fn code_span_ranges(line: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut offset = 0usize;
    for (part, code) in split_code_spans(line) {
        if code {
            ranges.push(offset..offset + part.len());
        }
        offset += part.len();
    }
    ranges
}

/// Counters of one escaping run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EscapeReport {
    /// Lines in which at least one brace was replaced.
    pub escaped_lines: usize,
    /// Fenced code blocks passed through.
    pub fences: usize,
    /// Braces still present in prose after escaping. Always zero.
    pub remaining_braces: usize,
    /// Components never closed, outermost first.
    pub unbalanced: Vec<String>,
}

/// Output of [`escape_braces`].
#[derive(Debug, Clone)]
pub struct Escaped {
    /// Escaped body.
    pub text: String,
    /// Counters.
    pub report: EscapeReport,
    /// One entry per unclosed component.
    pub diagnostics: Diagnostics,
}

/// Escapes braces in the prose lines of `body`.
pub fn escape_braces(body: &str) -> Escaped {
    let mut context = EscapeContext::default();
    let mut report = EscapeReport::default();
    let mut output = String::with_capacity(body.len());

    for (idx, line) in body.split_inclusive('\n').enumerate() {
        let (content, ending) = split_line_ending(line);
        if context.classify(content, idx + 1) != LineClass::Prose {
            output.push_str(line);
            continue;
        }

        let changed = escape_line(content, &mut output);
        output.push_str(ending);
        if changed {
            report.escaped_lines += 1;
        }
    }

    report.fences = context.fences_opened();
    let mut diagnostics = Diagnostics::new();
    let unclosed = context.component_stack.into_iter().chain(context.pending_tag);
    for open in unclosed {
        log::debug!("component <{}> opened on line {} is never closed", open.name, open.line);
        diagnostics.push(Diagnostic::UnbalancedComponents {
            tag: open.name.clone(),
            location: SourceLocation::new(open.line, open.column),
        });
        report.unbalanced.push(open.name);
    }

    report.remaining_braces = count_prose_braces(&output);
    Escaped {
        text: output,
        report,
        diagnostics,
    }
}

/// Braces left in prose lines, classified and protected exactly as
/// [`escape_braces`] does.
pub fn count_prose_braces(text: &str) -> usize {
    let mut context = EscapeContext::default();
    text.split_inclusive('\n')
        .enumerate()
        .filter_map(|(idx, line)| {
            let (content, _) = split_line_ending(line);
            (context.classify(content, idx + 1) == LineClass::Prose).then_some(content)
        })
        .map(|line| {
            let protected = protected_ranges(line);
            line.char_indices()
                .filter(|&(idx, ch)| matches!(ch, '{' | '}') && !is_protected(&protected, idx))
                .count()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escape(text: &str) -> String {
        escape_braces(text).text
    }

    #[test]
    fn escapes_prose_but_not_inline_code() {
        let escaped = escape_braces("Use {id} in `{code}`\n");
        assert_eq!(escaped.text, "Use &#123;id&#125; in `{code}`\n");
        assert_eq!(escaped.report.escaped_lines, 1);
        assert_eq!(escaped.report.remaining_braces, 0);
    }

    #[test]
    fn fenced_code_is_untouched() {
        let input = "```cpp\nint main() { return 0; }\n```\n{after}\n";
        let escaped = escape_braces(input);
        assert_eq!(
            escaped.text,
            "```cpp\nint main() { return 0; }\n```\n&#123;after&#125;\n"
        );
        assert_eq!(escaped.report.fences, 1);
    }

    #[test]
    fn statements_and_admonitions() {
        assert_eq!(
            escape("import { A } from 'x';\n:::info\n{x}\n:::\n"),
            "import { A } from 'x';\n:::info\n&#123;x&#125;\n:::\n"
        );
        assert_eq!(escape("{% hint %}\n"), "{% hint %}\n");
    }

    #[test]
    fn component_content_is_left_alone() {
        let input = "<Tabs>\n<TabItem value=\"a\" label=\"A\">\n\n{x}\n\n</TabItem>\n</Tabs>\nafter {y}\n";
        let escaped = escape_braces(input);
        assert_eq!(
            escaped.text,
            "<Tabs>\n<TabItem value=\"a\" label=\"A\">\n\n{x}\n\n</TabItem>\n</Tabs>\nafter &#123;y&#125;\n"
        );
        assert!(escaped.report.unbalanced.is_empty());
        assert!(escaped.diagnostics.is_empty());
    }

    #[test]
    fn multi_line_self_closing_tag() {
        let input = "<Card\n  title=\"x > y\"\n  data={1}\n/>\n{z}\n";
        assert_eq!(
            escape(input),
            "<Card\n  title=\"x > y\"\n  data={1}\n/>\n&#123;z&#125;\n"
        );
    }

    #[test]
    fn unbalanced_component_suppresses_rest() {
        let escaped = escape_braces("intro {a}\n<Note>\n{b}\n");
        assert_eq!(escaped.text, "intro &#123;a&#125;\n<Note>\n{b}\n");
        assert_eq!(escaped.report.unbalanced, vec!["Note".to_string()]);
        match escaped.diagnostics.iter().next() {
            Some(Diagnostic::UnbalancedComponents { tag, location }) => {
                assert_eq!(tag, "Note");
                assert_eq!(location.line, 2);
            }
            other => panic!("unexpected diagnostic {other:?}"),
        }
    }

    #[test]
    fn tags_in_code_spans_do_not_open_components() {
        assert_eq!(
            escape("Write `<Foo>` then {bar}\n"),
            "Write `<Foo>` then &#123;bar&#125;\n"
        );
    }

    #[test]
    fn markers_in_code_spans_do_not_shield_prose() {
        let input = "Write `{% raw %}` around {value} templates.\n";
        assert_eq!(count_prose_braces(input), 2);
        let escaped = escape_braces(input);
        assert_eq!(
            escaped.text,
            "Write `{% raw %}` around &#123;value&#125; templates.\n"
        );
        assert_eq!(escaped.report.remaining_braces, 0);
    }

    #[test]
    fn live_markers_keep_their_braces_only() {
        assert_eq!(
            escape("{% include \"x.md\" %} shows {y}\n"),
            "{% include \"x.md\" %} shows &#123;y&#125;\n"
        );
        assert_eq!(escape("open {% raw\n"), "open {% raw\n");
    }

    #[test]
    fn escaping_is_idempotent() {
        let once = escape("a {b} c\n## Heading {#custom-id}\n");
        assert_eq!(escape(&once), once);
        assert_eq!(count_prose_braces(&once), 0);
    }
}
