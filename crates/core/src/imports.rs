//! MDX import statements.
//!
//! MDX only accepts `import` at the top level, and components rendered by
//! the transcoder need their imports. All root-level imports are collected
//! at the start of the body.

use crate::code_fence::{FenceState, advance_fence_state, split_fenced_segments, split_line_ending};

const TABS_IMPORT: &str = "import Tabs from '@theme/Tabs';";
const TAB_ITEM_IMPORT: &str = "import TabItem from '@theme/TabItem';";

fn is_import(line: &str) -> bool {
    line.starts_with("import ") && line.contains(" from ")
}

fn imports_module(line: &str, module: &str) -> bool {
    line.contains(&format!("'{module}'")) || line.contains(&format!("\"{module}\""))
}

/// Whether `<name` is used as a tag outside fenced code.
pub fn uses_component(body: &str, name: &str) -> bool {
    let open = format!("<{name}");
    split_fenced_segments(body)
        .iter()
        .filter(|segment| !segment.fenced)
        .any(|segment| {
            segment.text.match_indices(&open).any(|(idx, _)| {
                segment.text[idx + open.len()..]
                    .chars()
                    .next()
                    .is_some_and(|c| c == '>' || c == '/' || c.is_whitespace())
            })
        })
}

/// Moves root-level imports to the top of `body` and adds the theme
/// imports that `<Tabs>`/`<TabItem>` need.
///
/// The output starts with the import block followed by one blank line.
/// A body without imports or components is returned as is, and so is one
/// whose imports already lead it (blank lines between them allowed) with
/// no theme import missing.
pub fn hoist_imports(body: &str) -> String {
    // Blank lines separating the body from its header stay where they are.
    let content = body.trim_start_matches(['\n', '\r']);
    let lead = &body[..body.len() - content.len()];

    let mut imports: Vec<String> = Vec::new();
    let mut rest = String::with_capacity(body.len());
    let mut state = FenceState::default();
    let mut leading = true;
    let mut in_place = true;

    for line in content.split_inclusive('\n') {
        let (content, _) = split_line_ending(line);
        let outcome = advance_fence_state(content, state);
        state = outcome.next_state;
        if !outcome.in_code && is_import(content) {
            let statement = content.trim_end().to_string();
            if !leading || imports.contains(&statement) {
                in_place = false;
            }
            if !imports.contains(&statement) {
                imports.push(statement);
            }
            continue;
        }
        if outcome.in_code || !content.trim().is_empty() {
            leading = false;
        }
        rest.push_str(line);
    }

    let found = imports.len();
    for (component, statement, module) in [
        ("Tabs", TABS_IMPORT, "@theme/Tabs"),
        ("TabItem", TAB_ITEM_IMPORT, "@theme/TabItem"),
    ] {
        if uses_component(&rest, component) && !imports.iter().any(|i| imports_module(i, module)) {
            log::debug!("adding import for <{component}>");
            imports.push(statement.to_string());
        }
    }

    if imports.is_empty() || (in_place && imports.len() == found) {
        return body.to_string();
    }

    let rest = rest.trim_start_matches(['\n', '\r']);
    let mut output = lead.to_string();
    output.push_str(&imports.join("\n"));
    output.push('\n');
    if !rest.is_empty() {
        output.push('\n');
        output.push_str(rest);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_tab_imports() {
        let body = "# Title\n\n<Tabs>\n<TabItem value=\"a\" label=\"A\">\n\nx\n\n</TabItem>\n</Tabs>\n";
        let output = hoist_imports(body);
        assert!(output.starts_with(
            "import Tabs from '@theme/Tabs';\nimport TabItem from '@theme/TabItem';\n\n# Title\n"
        ));
    }

    #[test]
    fn hoists_scattered_imports_and_dedupes() {
        let body = "# T\n\nimport A from './a';\n\ntext\nimport A from './a';\n";
        assert_eq!(hoist_imports(body), "import A from './a';\n\n# T\n\n\ntext\n");
    }

    #[test]
    fn leading_blank_lines_are_kept() {
        let body = "\n# T\n\n<Tabs>\n</Tabs>\n";
        assert_eq!(
            hoist_imports(body),
            "\nimport Tabs from '@theme/Tabs';\n\n# T\n\n<Tabs>\n</Tabs>\n"
        );
    }

    #[test]
    fn leading_import_groups_are_left_alone() {
        let body = "\nimport Tabs from '@theme/Tabs';\nimport TabItem from '@theme/TabItem';\n\nimport { S } from '@site/src/components/Schema';\n\n<S/>\n\n<Tabs>\n<TabItem value=\"a\">\n</TabItem>\n</Tabs>\n";
        assert_eq!(hoist_imports(body), body);
    }

    #[test]
    fn imports_in_fences_stay() {
        let body = "```js\nimport x from 'y';\n```\n";
        assert_eq!(hoist_imports(body), body);
    }

    #[test]
    fn existing_theme_import_is_respected() {
        let body = "import Tabs from \"@theme/Tabs\";\n\n<Tabs>\n</Tabs>\n";
        assert_eq!(hoist_imports(body), body);
    }

    #[test]
    fn idempotent() {
        let once = hoist_imports("intro\n\n<Tabs>\n<TabItem value=\"a\">\n</TabItem>\n</Tabs>\n");
        assert_eq!(hoist_imports(&once), once);
    }

    #[test]
    fn component_detection_ignores_code() {
        assert!(!uses_component("```\n<Tabs>\n```\n", "Tabs"));
        assert!(!uses_component("<TabsList>", "Tabs"));
        assert!(uses_component("<Tabs groupId=\"x\">", "Tabs"));
    }
}
