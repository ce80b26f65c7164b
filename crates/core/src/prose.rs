//! Small prose fixes that keep MDX from misreading plain text.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::code_fence::{map_outside_code_spans, map_prose_segments};

static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\s*)[•·‣⁃]\s").unwrap());
// Alternation is leftmost-first, so the longer arrows win.
static ARROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"<-->|<->|<<|<-").unwrap());

/// Decodes `&amp;`, turns bullet glyphs into list dashes and wraps arrows
/// that MDX would read as tags in inline code.
///
/// Fenced code and existing code spans are left alone, so running it twice
/// gives the same text.
pub fn normalize_prose(body: &str) -> String {
    map_prose_segments(body, |segment| {
        segment
            .split_inclusive('\n')
            .map(normalize_line)
            .collect()
    })
}

fn normalize_line(line: &str) -> String {
    let line = BULLET.replace(line, "${1}- ");
    map_outside_code_spans(&line, |part| {
        let part = part.replace("&amp;", "&");
        ARROW.replace_all(&part, "`$0`").into_owned()
    })
}
