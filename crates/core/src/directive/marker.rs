//! Scanner for `{% name key="value" %}` markers.
//!
//! Markers are found line by line outside fenced code and inline code
//! spans. A marker never spans lines.

use std::ops::Range;

use crate::code_fence::{FenceState, advance_fence_state, split_code_spans, split_line_ending};

/// One `{% … %}` marker found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    /// Lowercased directive name (`code`, `endcode`, `content-ref`, ...).
    pub name: String,
    /// Attributes in source order.
    pub attrs: Vec<(String, String)>,
    /// Byte range of the marker in the scanned text.
    pub range: Range<usize>,
}

impl Marker {
    /// Value of attribute `key`, if present.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }

    /// Whether this marker closes a directive named `name`.
    pub fn closes(&self, name: &str) -> bool {
        self.name.strip_prefix("end") == Some(name)
    }
}

/// Finds every marker in `text` outside fenced code and inline code spans.
pub fn scan_markers(text: &str) -> Vec<Marker> {
    let mut markers = Vec::new();
    let mut state = FenceState::default();
    let mut line_start = 0usize;

    for line in text.split_inclusive('\n') {
        let (body, _) = split_line_ending(line);
        let outcome = advance_fence_state(body, state);
        state = outcome.next_state;

        if !outcome.in_code && body.contains("{%") {
            let mut part_start = line_start;
            for (part, is_code) in split_code_spans(body) {
                if !is_code {
                    scan_part(part, part_start, &mut markers);
                }
                part_start += part.len();
            }
        }
        line_start += line.len();
    }
    markers
}

fn scan_part(part: &str, base: usize, markers: &mut Vec<Marker>) {
    let mut cursor = 0usize;
    while let Some(found) = part[cursor..].find("{%") {
        let start = cursor + found;
        match part[start + 2..].find("%}") {
            Some(end_rel) => {
                let end = start + 2 + end_rel + 2;
                if let Some((name, attrs)) = parse_marker_body(&part[start + 2..end - 2]) {
                    markers.push(Marker {
                        name,
                        attrs,
                        range: base + start..base + end,
                    });
                }
                cursor = end;
            }
            None => break,
        }
    }
}

/// Parses the inside of a marker: a name followed by attributes.
fn parse_marker_body(inner: &str) -> Option<(String, Vec<(String, String)>)> {
    let inner = inner.trim();
    let name_end = inner
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(inner.len());
    if name_end == 0 {
        return None;
    }
    let name = inner[..name_end].to_ascii_lowercase();
    Some((name, parse_attrs(&inner[name_end..])))
}

/// Parses `key="value"` pairs.
///
/// A quoted value ends at the first matching quote that is followed by the
/// next `key=` or by the end of the marker, so values may contain quotes:
/// `title="Say "hi".txt"` yields `Say "hi".txt`.
pub fn parse_attrs(input: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    let mut rest = input.trim_start();

    while !rest.is_empty() {
        let key_end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
            .unwrap_or(rest.len());
        if key_end == 0 {
            // Stray character; skip it and keep going.
            let skip = rest.chars().next().map_or(1, char::len_utf8);
            rest = rest[skip..].trim_start();
            continue;
        }
        let key = rest[..key_end].to_string();
        let after_key = rest[key_end..].trim_start();

        let Some(after_eq) = after_key.strip_prefix('=') else {
            // Bare flag.
            attrs.push((key, String::new()));
            rest = after_key;
            continue;
        };
        let after_eq = after_eq.trim_start();

        match after_eq.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let value_region = &after_eq[1..];
                let (value, consumed) = quoted_value(value_region, quote);
                attrs.push((key, value.to_string()));
                rest = value_region[consumed..].trim_start();
            }
            _ => {
                let end = after_eq
                    .find(char::is_whitespace)
                    .unwrap_or(after_eq.len());
                attrs.push((key, after_eq[..end].to_string()));
                rest = after_eq[end..].trim_start();
            }
        }
    }
    attrs
}

/// Returns the value and the number of bytes consumed (closing quote included).
fn quoted_value(region: &str, quote: char) -> (&str, usize) {
    for (idx, ch) in region.char_indices() {
        if ch != quote {
            continue;
        }
        let after = &region[idx + 1..];
        if after.trim().is_empty() || starts_with_attr(after.trim_start()) {
            return (&region[..idx], idx + 1);
        }
    }
    (region.trim_end(), region.len())
}

fn starts_with_attr(text: &str) -> bool {
    let key_end = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(text.len());
    key_end > 0 && text[key_end..].trim_start().starts_with('=')
}

/// Byte range covering `range` and, when the marker is alone on its line,
/// the whole line including its line ending.
pub fn line_span(text: &str, range: Range<usize>) -> Range<usize> {
    let line_start = text[..range.start].rfind('\n').map_or(0, |idx| idx + 1);
    let line_end = text[range.end..]
        .find('\n')
        .map_or(text.len(), |idx| range.end + idx + 1);

    let before_blank = text[line_start..range.start].trim().is_empty();
    let after_blank = text[range.end..line_end].trim().is_empty();
    if before_blank && after_blank {
        line_start..line_end
    } else {
        range
    }
}

/// 1-based line number of a byte offset.
pub fn line_of(text: &str, offset: usize) -> usize {
    text[..offset.min(text.len())].matches('\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_names_and_ranges() {
        let text = "intro\n{% hint style=\"info\" %}\nbody\n{% endhint %}\n";
        let markers = scan_markers(text);
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].name, "hint");
        assert_eq!(markers[0].attr("style"), Some("info"));
        assert_eq!(&text[markers[0].range.clone()], "{% hint style=\"info\" %}");
        assert!(markers[1].closes("hint"));
        assert_eq!(line_of(text, markers[1].range.start), 4);
    }

    #[test]
    fn skips_markers_in_fences_and_code_spans() {
        let text = "```\n{% hint %}\n```\nUse `{% code %}` here\n{% tabs %}\n";
        let markers = scan_markers(text);
        let names: Vec<_> = markers.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["tabs"]);
    }

    #[test]
    fn attribute_values_may_contain_quotes() {
        let attrs = parse_attrs(r#"title="Say "hi".txt" overflow="wrap""#);
        assert_eq!(
            attrs,
            vec![
                ("title".to_string(), "Say \"hi\".txt".to_string()),
                ("overflow".to_string(), "wrap".to_string()),
            ]
        );
    }

    #[test]
    fn unquoted_and_flag_attributes() {
        let attrs = parse_attrs("lineNumbers=true fullWidth");
        assert_eq!(attrs[0], ("lineNumbers".to_string(), "true".to_string()));
        assert_eq!(attrs[1], ("fullWidth".to_string(), String::new()));
    }

    #[test]
    fn unterminated_marker_is_ignored() {
        assert!(scan_markers("{% hint style=\"info\"\n%}").is_empty());
    }

    #[test]
    fn line_span_expands_lone_markers() {
        let text = "a\n  {% endtab %}\nb";
        let marker = &scan_markers(text)[0];
        let span = line_span(text, marker.range.clone());
        assert_eq!(&text[span], "  {% endtab %}\n");

        let inline = "see {% endtab %} here";
        let marker = &scan_markers(inline)[0];
        assert_eq!(line_span(inline, marker.range.clone()), marker.range);
    }
}
