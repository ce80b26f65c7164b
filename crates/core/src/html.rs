//! Inline HTML cleanup for MDX.
//!
//! MDX parses HTML as JSX, so void elements must be self-closed and
//! GitBook-only wrappers have to go. Fenced code is never touched.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::code_fence::{map_outside_code_spans, map_prose_segments};

static FIGURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<figure[^>]*>\s*(<img\b[^>]*>)\s*(?:<figcaption[^>]*>.*?</figcaption>)?\s*</figure>",
    )
    .unwrap()
});
static ATTR_SRC: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)\bsrc\s*=\s*["']([^"']*)["']"#).unwrap());
static ATTR_ALT: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)\balt\s*=\s*["']([^"']*)["']"#).unwrap());
static MD_IMAGE_ASSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(!\[[^\]]*\]\()(?:<(?:\.{1,2}/)*(?:docs/)?\.gitbook/assets/([^>]+)>|(?:\.{1,2}/)*(?:docs/)?\.gitbook/assets/([^)\s]+))",
    )
    .unwrap()
});
static IMG_SRC_ASSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(<img\b[^>]*?\bsrc\s*=\s*)(["'])(?:\.{1,2}/)*(?:docs/)?\.gitbook/assets/([^"']+)["']"#)
        .unwrap()
});
static VOID_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<(br|hr|img|input)\b((?:[^>/]|/[^>])*?)\s*/?>").unwrap()
});
static CUSTOM_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<span\s+data-gb-custom-inline[^>]*>(.*?)</span>").unwrap());
static FIGCAPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<figcaption[^>]*>(.*?)</figcaption>").unwrap());
static FIGURE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</?figure[^>]*>|</?figcaption>").unwrap());

/// Options for [`normalize_html`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlOptions {
    /// Site path that replaces `.gitbook/assets`.
    pub asset_prefix: String,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            asset_prefix: "/img/assets".to_string(),
        }
    }
}

/// Normalizes inline HTML outside fenced code.
pub fn normalize_html(body: &str, options: &HtmlOptions) -> String {
    map_prose_segments(body, |segment| normalize_segment(segment, options))
}

fn normalize_segment(segment: &str, options: &HtmlOptions) -> String {
    let prefix = options.asset_prefix.trim_end_matches('/');

    let text = FIGURE.replace_all(segment, |caps: &Captures<'_>| {
        let img = &caps[1];
        let src = ATTR_SRC.captures(img).and_then(|c| c.get(1)).map_or("", |m| m.as_str());
        let alt = ATTR_ALT.captures(img).and_then(|c| c.get(1)).map_or("", |m| m.as_str());
        format!("![{alt}]({src})")
    });

    let text: String = text
        .split_inclusive('\n')
        .map(|line| map_outside_code_spans(line, |part| normalize_inline(part, prefix)))
        .collect();

    let text = CUSTOM_SPAN.replace_all(&text, "$1");
    let text = FIGCAPTION.replace_all(&text, "*$1*");
    FIGURE_TAG.replace_all(&text, "").into_owned()
}

/// Asset paths and void elements on a stretch of prose.
fn normalize_inline(part: &str, prefix: &str) -> String {
    let text = MD_IMAGE_ASSET.replace_all(part, |caps: &Captures<'_>| match caps.get(2) {
        Some(wrapped) => format!("{}<{prefix}/{}>", &caps[1], basename(wrapped.as_str())),
        None => format!("{}{prefix}/{}", &caps[1], basename(&caps[3])),
    });
    let text = IMG_SRC_ASSET.replace_all(&text, |caps: &Captures<'_>| {
        let quote = &caps[2];
        format!("{}{quote}{prefix}/{}{quote}", &caps[1], basename(&caps[3]))
    });
    VOID_ELEMENT
        .replace_all(&text, |caps: &Captures<'_>| {
            format!("<{}{}/>", &caps[1], caps[2].trim_end())
        })
        .into_owned()
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(text: &str) -> String {
        normalize_html(text, &HtmlOptions::default())
    }

    #[test]
    fn self_closes_void_elements() {
        assert_eq!(normalize("a<br>b<br/>c<br />"), "a<br/>b<br/>c<br/>");
        assert_eq!(normalize("<hr>"), "<hr/>");
        assert_eq!(
            normalize("<input type=\"checkbox\" checked>"),
            "<input type=\"checkbox\" checked/>"
        );
        assert_eq!(
            normalize("<img src=\"https://x.io/a.png\" alt=\"A\">"),
            "<img src=\"https://x.io/a.png\" alt=\"A\"/>"
        );
    }

    #[test]
    fn self_closing_is_idempotent() {
        let once = normalize("<img src=\"/a.png\" width=\"50%\">");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn rewrites_markdown_image_assets() {
        assert_eq!(
            normalize("![Diagram](../.gitbook/assets/sub/diagram.png)"),
            "![Diagram](/img/assets/diagram.png)"
        );
        assert_eq!(
            normalize("![](<docs/.gitbook/assets/a b.png>)"),
            "![](</img/assets/a b.png>)"
        );
        assert_eq!(
            normalize("![x](./.gitbook/assets/x.svg)"),
            "![x](/img/assets/x.svg)"
        );
    }

    #[test]
    fn rewrites_img_src_with_either_quote() {
        assert_eq!(
            normalize("<img src='.gitbook/assets/logo.png' alt='Logo'/>"),
            "<img src='/img/assets/logo.png' alt='Logo'/>"
        );
        assert_eq!(
            normalize("<img width=\"20\" src=\"../../.gitbook/assets/logo.png\">"),
            "<img width=\"20\" src=\"/img/assets/logo.png\"/>"
        );
    }

    #[test]
    fn collapses_figures_and_drops_captions() {
        let input = "<figure><img src=\".gitbook/assets/arch.png\" alt=\"Architecture\"><figcaption><p>Overview</p></figcaption></figure>";
        assert_eq!(normalize(input), "![Architecture](/img/assets/arch.png)");
    }

    #[test]
    fn unwraps_custom_spans_and_italicizes_captions() {
        assert_eq!(
            normalize("<span data-gb-custom-inline data-tag=\"emoji\">🚀</span> fast"),
            "🚀 fast"
        );
        assert_eq!(normalize("<figcaption>Note</figcaption>"), "*Note*");
        assert_eq!(normalize("</figure>"), "");
    }

    #[test]
    fn inline_code_is_untouched() {
        assert_eq!(normalize("Use `<br>` or <br>"), "Use `<br>` or <br/>");
    }

    #[test]
    fn fenced_html_is_untouched() {
        let input = "```html\n<br>\n<img src=\".gitbook/assets/a.png\">\n```\n";
        assert_eq!(normalize(input), input);
    }

    #[test]
    fn custom_asset_prefix() {
        let options = HtmlOptions {
            asset_prefix: "/static/".into(),
        };
        assert_eq!(
            normalize_html("![a](.gitbook/assets/a.png)", &options),
            "![a](/static/a.png)"
        );
    }
}
