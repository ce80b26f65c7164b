//! Internal link cleanup.
//!
//! Docusaurus resolves doc ids without extensions, so `[x](page.md#a)`
//! becomes `[x](page#a)`. External URLs and images are never touched.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::code_fence::{map_outside_code_spans, map_prose_segments};
use crate::slug::strip_doc_extension;

static LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(!?)\[([^\]]*)\]\(\s*(?:<([^>\n]+)>|([^)\s]+))(\s+"[^"]*")?\s*\)"#).unwrap()
});

/// Whether `url` starts with a URI scheme such as `https:` or `mailto:`.
pub fn has_scheme(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Target with a trailing `.md`/`.mdx` removed from its path part.
///
/// Returns `None` when there is nothing to change.
pub fn clean_link_target(target: &str) -> Option<String> {
    if has_scheme(target) {
        return None;
    }
    let (path, anchor) = match target.split_once('#') {
        Some((path, anchor)) => (path, Some(anchor)),
        None => (target, None),
    };
    let stripped = strip_doc_extension(path);
    if stripped.len() == path.len() {
        return None;
    }
    Some(match anchor {
        Some(anchor) => format!("{stripped}#{anchor}"),
        None => stripped.to_string(),
    })
}

/// Strips document extensions from relative Markdown link targets.
///
/// Returns the new body and the number of links rewritten.
pub fn rewrite_links(body: &str) -> (String, usize) {
    let mut rewritten = 0usize;
    let text = map_prose_segments(body, |segment| {
        segment
            .split_inclusive('\n')
            .map(|line| {
                map_outside_code_spans(line, |part| {
                    LINK.replace_all(part, |caps: &Captures<'_>| {
                        let whole = caps[0].to_string();
                        if !caps[1].is_empty() {
                            return whole;
                        }
                        let (target, wrapped) = match caps.get(3) {
                            Some(m) => (m.as_str(), true),
                            None => (caps.get(4).map_or("", |m| m.as_str()), false),
                        };
                        let Some(clean) = clean_link_target(target) else {
                            return whole;
                        };
                        rewritten += 1;
                        let title = caps.get(5).map_or("", |m| m.as_str());
                        if wrapped {
                            format!("[{}](<{clean}>{title})", &caps[2])
                        } else {
                            format!("[{}]({clean}{title})", &caps[2])
                        }
                    })
                    .into_owned()
                })
            })
            .collect()
    });
    (text, rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(text: &str) -> String {
        rewrite_links(text).0
    }

    #[test]
    fn strips_extension_and_keeps_anchor_and_title() {
        assert_eq!(rewrite("[a](queries.md)"), "[a](queries)");
        assert_eq!(rewrite("[a](../data/relations.md#to-many)"), "[a](../data/relations#to-many)");
        assert_eq!(rewrite("[a](faq.mdx \"FAQ\")"), "[a](faq \"FAQ\")");
        assert_eq!(rewrite("[a](<my page.md>)"), "[a](<my page>)");
    }

    #[test]
    fn leaves_external_and_non_doc_links() {
        let input = "[gh](https://github.com/x/README.md) [img](diagram.png) ![i](a.md) [m](mailto:a@b.md)";
        assert_eq!(rewrite(input), input);
    }

    #[test]
    fn counts_rewrites() {
        let (_, count) = rewrite_links("[a](a.md) and [b](b.md#x)\n");
        assert_eq!(count, 2);
    }

    #[test]
    fn code_is_untouched() {
        let input = "`[a](a.md)`\n```md\n[b](b.md)\n```\n";
        assert_eq!(rewrite(input), input);
    }

    #[test]
    fn scheme_detection() {
        assert!(has_scheme("https://x.io"));
        assert!(has_scheme("mailto:me@x.io"));
        assert!(!has_scheme("guide/intro.md"));
        assert!(!has_scheme("#anchor"));
        assert!(!has_scheme("./a:b.md"));
    }
}
