//! Structured-data components for search engines.

use std::fmt::Write as _;

use crate::archetype::SchemaKind;

/// Values placed into a schema component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaFields<'a> {
    /// Page title, used as `headline`.
    pub title: &'a str,
    /// Page description.
    pub description: &'a str,
    /// Canonical page URL.
    pub url: &'a str,
    /// `YYYY-MM-DD` used for both dates.
    pub date: &'a str,
}

/// Whether `body` already imports from `module`.
pub fn has_schema_import(body: &str, module: &str) -> bool {
    body.contains(&format!("from '{module}'")) || body.contains(&format!("from \"{module}\""))
}

/// JSX attribute values cannot hold a bare `"`.
pub fn jsx_attribute(text: &str) -> String {
    text.replace('"', "'")
}

/// Renders the import line and component for `kind`.
pub fn render_schema(kind: SchemaKind, module: &str, fields: &SchemaFields<'_>) -> String {
    let description = jsx_attribute(fields.description);
    let mut block = String::new();

    if kind == SchemaKind::Main {
        writeln!(block, "import {{ SoftwareDocumentationSchema }} from '{module}';").ok();
        writeln!(block).ok();
        writeln!(block, "<SoftwareDocumentationSchema").ok();
        writeln!(block, "  description=\"{description}\"").ok();
        writeln!(block, "  dateModified=\"{}\"", fields.date).ok();
        block.push_str("/>");
        return block;
    }

    let imports = if kind == SchemaKind::Faq {
        "FAQSchema, TechnicalArticleSchema"
    } else {
        "TechnicalArticleSchema"
    };
    writeln!(block, "import {{ {imports} }} from '{module}';").ok();
    writeln!(block).ok();
    writeln!(block, "<TechnicalArticleSchema").ok();
    writeln!(block, "  headline=\"{}\"", jsx_attribute(fields.title)).ok();
    writeln!(block, "  description=\"{description}\"").ok();
    writeln!(block, "  url=\"{}\"", fields.url).ok();
    writeln!(block, "  datePublished=\"{}\"", fields.date).ok();
    writeln!(block, "  dateModified=\"{}\"", fields.date).ok();
    block.push_str("/>");
    block
}

/// Inserts `block` after the leading import statements of `body`, or at
/// the top when there are none. One blank line separates each part.
pub fn insert_schema(body: &str, block: &str) -> String {
    let mut import_end = 0usize;
    let mut offset = 0usize;
    let mut seen_import = false;

    for line in body.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.starts_with("import ") || trimmed.starts_with("from ") {
            seen_import = true;
            import_end = offset + line.len();
        } else if !trimmed.is_empty() {
            break;
        }
        offset += line.len();
    }

    let rest = body[import_end..].trim_start_matches(['\n', '\r']);
    let mut output = String::with_capacity(body.len() + block.len() + 4);
    if seen_import {
        output.push_str(body[..import_end].trim_start_matches(['\n', '\r']).trim_end());
        output.push_str("\n\n");
    }
    output.push_str(block);
    output.push_str("\n\n");
    output.push_str(rest);
    output
}
