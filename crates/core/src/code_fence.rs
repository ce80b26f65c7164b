//! Code fence and inline code tracking.
//!
//! Every stage that rewrites prose must leave fenced code and inline code
//! spans alone. This module owns the CommonMark fence rules and the helpers
//! the stages use to walk only the prose parts of a document.

/// Fence parsing phases tracked across lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FencePhase {
    /// Not currently inside a fence.
    #[default]
    Outside,
    /// Within fence contents.
    InsideFence,
}

/// Current fence state (phase, marker, indent, and length).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FenceState {
    /// Current fence phase.
    pub phase: FencePhase,
    /// Fence marker character (``` or ~~~).
    pub marker: Option<char>,
    /// Leading whitespace count captured at opening.
    pub indent: usize,
    /// Length of the opening fence (number of ` or ~ characters).
    pub length: usize,
}

impl FenceState {
    /// Whether the state is inside fenced code.
    pub fn is_inside(&self) -> bool {
        matches!(self.phase, FencePhase::InsideFence)
    }
}

/// Outcome of processing a single line for fence state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineParseOutcome {
    /// State to carry into the next line.
    pub next_state: FenceState,
    /// Whether the line is a fence delimiter or fence content.
    pub in_code: bool,
}

/// A parsed fence opener line such as ```` ```cpp title="a.cpp" ````.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FenceOpener<'a> {
    /// Fence marker character.
    pub marker: char,
    /// Number of marker characters.
    pub length: usize,
    /// Visual indentation of the opener.
    pub indent: usize,
    /// Info string after the markers, trimmed.
    pub info: &'a str,
}

impl FenceOpener<'_> {
    /// First word of the info string, if any.
    pub fn language(&self) -> Option<&str> {
        self.info.split_whitespace().next()
    }

    /// The marker run as written (e.g. "````").
    pub fn fence(&self) -> String {
        std::iter::repeat_n(self.marker, self.length).collect()
    }
}

/// Parse `line` as a fence opener (0-3 spaces of indentation).
pub fn parse_fence_opener(line: &str) -> Option<FenceOpener<'_>> {
    let (visual_indent, byte_offset) = leading_whitespace_info(line);
    if visual_indent > 3 {
        return None;
    }
    let after_indent = &line[byte_offset..];
    let (marker, length) = detect_fence_marker_with_length(after_indent)?;
    let info = after_indent[length * marker.len_utf8()..].trim();
    // Backtick fences cannot carry backticks in their info string.
    if marker == '`' && info.contains('`') {
        return None;
    }
    Some(FenceOpener {
        marker,
        length,
        indent: visual_indent,
        info,
    })
}

/// Advance fence state based on a single line of text.
pub fn advance_fence_state(line: &str, state: FenceState) -> LineParseOutcome {
    let (visual_indent, byte_offset) = leading_whitespace_info(line);
    let after_indent = &line[byte_offset..];

    let mut next_state = state;
    let mut in_code = state.is_inside();

    if !state.is_inside() {
        if let Some(opener) = parse_fence_opener(line) {
            next_state = FenceState {
                phase: FencePhase::InsideFence,
                marker: Some(opener.marker),
                indent: opener.indent,
                length: opener.length,
            };
            in_code = true;
        }
    } else if visual_indent <= 3 && is_closing_fence(after_indent) {
        // Closer must reuse the opener's marker with at least its length.
        if let Some((marker, closer_len)) = detect_fence_marker_with_length(after_indent)
            && Some(marker) == state.marker
            && closer_len >= state.length
        {
            next_state = FenceState::default();
        }
    }

    LineParseOutcome {
        next_state,
        in_code,
    }
}

/// Returns (visual_columns, byte_offset) for leading whitespace.
/// Visual columns expand tabs to 4-column boundaries per CommonMark.
fn leading_whitespace_info(line: &str) -> (usize, usize) {
    let mut col = 0;
    let mut bytes = 0;
    for b in line.bytes() {
        match b {
            b' ' => {
                col += 1;
                bytes += 1;
            }
            b'\t' => {
                col += 4 - (col % 4);
                bytes += 1;
            }
            _ => break,
        }
    }
    (col, bytes)
}

fn detect_fence_marker_with_length(after_indent: &str) -> Option<(char, usize)> {
    let mut chars = after_indent.chars();
    let first = chars.next()?;
    if first != '`' && first != '~' {
        return None;
    }
    let run_len = 1 + chars.take_while(|c| *c == first).count();
    (run_len >= 3).then_some((first, run_len))
}

/// A closing fence has only fence markers followed by optional whitespace.
fn is_closing_fence(after_indent: &str) -> bool {
    let mut chars = after_indent.chars();
    let first = match chars.next() {
        Some(c) if c == '`' || c == '~' => c,
        _ => return false,
    };
    let mut count = 1;
    for c in chars.by_ref() {
        if c == first {
            count += 1;
        } else {
            return count >= 3 && c.is_whitespace() && chars.all(|c| c.is_whitespace());
        }
    }
    count >= 3
}

/// Split a line into its content and line ending ("\n", "\r\n" or "").
pub fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(stripped) = line.strip_suffix('\n') {
        let body = stripped.strip_suffix('\r').unwrap_or(stripped);
        (body, &line[body.len()..])
    } else {
        (line, "")
    }
}

/// A run of consecutive lines that are either all prose or all fenced code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    /// The lines, line endings included.
    pub text: &'a str,
    /// Whether the run is fenced code (delimiters included).
    pub fenced: bool,
}

/// Partition `input` into alternating prose and fenced-code segments.
///
/// Concatenating the segments yields `input` unchanged.
pub fn split_fenced_segments(input: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut state = FenceState::default();
    let mut start = 0usize;
    let mut offset = 0usize;
    let mut current: Option<bool> = None;

    for line in input.split_inclusive('\n') {
        let (body, _) = split_line_ending(line);
        let outcome = advance_fence_state(body, state);
        state = outcome.next_state;

        if let Some(fenced) = current
            && fenced != outcome.in_code
        {
            segments.push(Segment {
                text: &input[start..offset],
                fenced,
            });
            start = offset;
        }
        current = Some(outcome.in_code);
        offset += line.len();
    }

    if let Some(fenced) = current {
        segments.push(Segment {
            text: &input[start..],
            fenced,
        });
    }
    segments
}

/// Apply `transform` to every prose segment, copying fenced code verbatim.
pub fn map_prose_segments<F>(input: &str, mut transform: F) -> String
where
    F: FnMut(&str) -> String,
{
    let mut output = String::with_capacity(input.len());
    for segment in split_fenced_segments(input) {
        if segment.fenced {
            output.push_str(segment.text);
        } else {
            output.push_str(&transform(segment.text));
        }
    }
    output
}

/// Split a line into `(text, is_code_span)` parts.
///
/// A code span runs from one backtick to the next; an unpaired backtick
/// is treated as prose.
pub fn split_code_spans(line: &str) -> Vec<(&str, bool)> {
    let mut parts = Vec::new();
    let mut rest = line;

    while let Some(open) = rest.find('`') {
        let Some(close_rel) = rest[open + 1..].find('`') else {
            break;
        };
        let close = open + 1 + close_rel;
        if open > 0 {
            parts.push((&rest[..open], false));
        }
        parts.push((&rest[open..=close], true));
        rest = &rest[close + 1..];
    }

    if !rest.is_empty() {
        parts.push((rest, false));
    }
    parts
}

/// Apply `transform` to the prose parts of a single line.
pub fn map_outside_code_spans<F>(line: &str, mut transform: F) -> String
where
    F: FnMut(&str) -> String,
{
    split_code_spans(line)
        .into_iter()
        .map(|(part, code)| if code { part.to_string() } else { transform(part) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_and_closes_backtick_fence() {
        let start = advance_fence_state("```js", FenceState::default());
        assert!(start.in_code);
        assert!(start.next_state.is_inside());
        assert_eq!(start.next_state.marker, Some('`'));

        let inner = advance_fence_state("console.log('hi');", start.next_state);
        assert!(inner.in_code);

        let end = advance_fence_state("```", inner.next_state);
        assert!(end.in_code, "closing delimiter still belongs to the block");
        assert!(!end.next_state.is_inside());
    }

    #[test]
    fn deeply_indented_fence_not_opened() {
        let outcome = advance_fence_state("    ```js", FenceState::default());
        assert!(!outcome.in_code);
        assert!(!outcome.next_state.is_inside());
    }

    #[test]
    fn fence_with_info_string_does_not_close() {
        let start = advance_fence_state("```", FenceState::default());
        let not_closed = advance_fence_state("```js", start.next_state);
        assert!(not_closed.next_state.is_inside());
    }

    #[test]
    fn four_backtick_fence_contains_three_backtick() {
        let start = advance_fence_state("````markdown", FenceState::default());
        let inner_open = advance_fence_state("```js", start.next_state);
        let inner_close = advance_fence_state("```", inner_open.next_state);
        assert!(inner_close.next_state.is_inside());
        let outer_close = advance_fence_state("````", inner_close.next_state);
        assert!(!outer_close.next_state.is_inside());
    }

    #[test]
    fn ignores_mismatched_marker() {
        let start = advance_fence_state("~~~ts", FenceState::default());
        let still_inside = advance_fence_state("```", start.next_state);
        assert!(still_inside.next_state.is_inside());
    }

    #[test]
    fn parses_opener_info_string() {
        let opener = parse_fence_opener("```cpp title=\"main.cpp\"").expect("opener");
        assert_eq!(opener.language(), Some("cpp"));
        assert_eq!(opener.fence(), "```");
        assert!(parse_fence_opener("`` not a fence").is_none());
        assert!(parse_fence_opener("```a`b").is_none());
        assert_eq!(parse_fence_opener("~~~~").map(|o| o.length), Some(4));
    }

    #[test]
    fn segments_reassemble_input() {
        let input = "intro {x}\n```rust\nlet a = {1};\n```\noutro\n";
        let segments = split_fenced_segments(input);
        assert_eq!(segments.len(), 3);
        assert!(!segments[0].fenced);
        assert!(segments[1].fenced);
        assert_eq!(segments[1].text, "```rust\nlet a = {1};\n```\n");
        let joined: String = segments.iter().map(|s| s.text).collect();
        assert_eq!(joined, input);
    }

    #[test]
    fn map_prose_leaves_code_untouched() {
        let input = "a\n```\na\n```\na";
        let output = map_prose_segments(input, |text| text.replace('a', "b"));
        assert_eq!(output, "b\n```\na\n```\nb");
    }

    #[test]
    fn code_spans_are_split_out() {
        let parts = split_code_spans("use `{x}` and {y} `");
        assert_eq!(
            parts,
            vec![("use ", false), ("`{x}`", true), (" and {y} `", false)]
        );
        let mapped = map_outside_code_spans("a `a` a", |p| p.replace('a', "b"));
        assert_eq!(mapped, "b `a` b");
    }

    #[test]
    fn split_line_ending_handles_crlf() {
        assert_eq!(split_line_ending("text\r\n"), ("text", "\r\n"));
        assert_eq!(split_line_ending("text\n"), ("text", "\n"));
        assert_eq!(split_line_ending("text"), ("text", ""));
    }
}
