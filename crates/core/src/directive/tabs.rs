use super::marker::scan_markers;
use super::{DirectiveKind, TranscodeReport, replace_pairs};
use crate::code_fence::{FenceState, advance_fence_state, parse_fence_opener, split_line_ending};
use crate::slug::{SlugDeduper, tab_value_slug};

/// One `{% tab %}` entry of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabEntry {
    /// Title as written.
    pub title: String,
    /// Unique `value` within the group.
    pub value: String,
    /// Body with language-less fences tagged.
    pub content: String,
}

/// Highlighting language implied by a tab title.
pub fn tab_language(title: &str) -> Option<&'static str> {
    let lower = title.trim().to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !(c.is_alphanumeric() || c == '+'))
        .filter(|w| !w.is_empty())
        .collect();
    let has_word = |word: &str| words.contains(&word);

    if lower == "c++" || lower == "cpp" {
        Some("cpp")
    } else if lower == "c" || lower.contains("c without") {
        Some("c")
    } else if lower.contains("cmake") {
        Some("cmake")
    } else if lower.contains("bash") || lower.contains("shell") {
        Some("bash")
    } else if lower.contains("python") {
        Some("python")
    } else if lower.contains("javascript") {
        Some("javascript")
    } else if lower.contains("java") {
        Some("java")
    } else if lower.contains("swift") {
        Some("swift")
    } else if lower.contains("kotlin") {
        Some("kotlin")
    } else if lower.contains("dart") {
        Some("dart")
    } else if has_word("go") || lower.contains("golang") {
        Some("go")
    } else {
        None
    }
}

/// Tags every fence opener without an info string with `language`.
pub fn tag_bare_fences(content: &str, language: &str) -> String {
    let mut output = String::with_capacity(content.len() + 16);
    let mut state = FenceState::default();

    for line in content.split_inclusive('\n') {
        let (body, ending) = split_line_ending(line);
        let was_inside = state.is_inside();
        state = advance_fence_state(body, state).next_state;

        if !was_inside
            && state.is_inside()
            && let Some(opener) = parse_fence_opener(body)
            && opener.info.is_empty()
        {
            let indent = &body[..body.len() - body.trim_start().len()];
            output.push_str(indent);
            output.push_str(&opener.fence());
            output.push_str(language);
            output.push_str(ending);
            continue;
        }
        output.push_str(line);
    }
    output
}

/// Splits the inside of a `{% tabs %}` group into entries.
///
/// Returns `None` when the group holds no complete `{% tab %}…{% endtab %}`
/// pair or when an entry is left open.
pub fn parse_tab_entries(inner: &str) -> Option<Vec<TabEntry>> {
    let markers = scan_markers(inner);
    let mut raw = Vec::new();
    let mut idx = 0usize;

    while idx < markers.len() {
        let marker = &markers[idx];
        if marker.name != "tab" {
            idx += 1;
            continue;
        }
        let close = markers.get(idx + 1).filter(|m| m.closes("tab"))?;
        raw.push((
            marker.attr("title").unwrap_or_default().trim().to_string(),
            &inner[marker.range.end..close.range.start],
        ));
        idx += 2;
    }

    if raw.is_empty() {
        return None;
    }

    let mut deduper = SlugDeduper::new();
    let entries = raw
        .into_iter()
        .enumerate()
        .map(|(position, (title, body))| {
            let value = deduper.claim(&tab_value_slug(&title, position + 1));
            let content = match tab_language(&title) {
                Some(language) => tag_bare_fences(body, language),
                None => body.to_string(),
            };
            TabEntry {
                title,
                value,
                content,
            }
        })
        .collect();
    Some(entries)
}

/// Renders a `<Tabs>` group.
pub fn render_tabs(entries: &[TabEntry]) -> String {
    let items: Vec<String> = entries
        .iter()
        .map(|entry| {
            format!(
                "<TabItem value=\"{}\" label=\"{}\">\n\n{}\n\n</TabItem>",
                entry.value,
                entry.title.replace('"', "'"),
                entry.content.trim()
            )
        })
        .collect();
    format!("<Tabs>\n{}\n</Tabs>", items.join("\n"))
}

/// `{% tabs %}` groups become `<Tabs>`/`<TabItem>` components.
pub fn convert_tab_groups(text: &str, report: &mut TranscodeReport) -> String {
    let mut tabs_found = 0usize;
    let mut tabs_converted = 0usize;

    let (output, stats) = replace_pairs(text, "tabs", |_, inner| {
        let declared = scan_markers(inner).iter().filter(|m| m.name == "tab").count();
        tabs_found += declared;
        let entries = parse_tab_entries(inner)?;
        tabs_converted += entries.len();
        Some(render_tabs(&entries))
    });

    report.found(DirectiveKind::Tabs, stats.found);
    report.converted(DirectiveKind::Tabs, stats.converted);
    report.found(DirectiveKind::Tab, tabs_found);
    report.converted(DirectiveKind::Tab, tabs_converted);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(text: &str) -> (String, TranscodeReport) {
        let mut report = TranscodeReport::default();
        let output = convert_tab_groups(text, &mut report);
        (output, report)
    }

    #[test]
    fn converts_group_with_language_tagging() {
        let input = "{% tabs %}\n{% tab title=\"C++\" %}\n```\nobx::Store store;\n```\n{% endtab %}\n\n{% tab title=\"C\" %}\n```\nOBX_store* store;\n```\n{% endtab %}\n{% endtabs %}";
        let (output, report) = convert(input);
        assert_eq!(
            output,
            "<Tabs>\n<TabItem value=\"cpp\" label=\"C++\">\n\n```cpp\nobx::Store store;\n```\n\n</TabItem>\n<TabItem value=\"c\" label=\"C\">\n\n```c\nOBX_store* store;\n```\n\n</TabItem>\n</Tabs>"
        );
        assert_eq!(report.counts(DirectiveKind::Tab).converted, 2);
        assert_eq!(report.counts(DirectiveKind::Tabs).converted, 1);
    }

    #[test]
    fn duplicate_titles_get_unique_values() {
        let input = "{% tabs %}\n{% tab title=\"CMake\" %}\na\n{% endtab %}\n{% tab title=\"CMake\" %}\nb\n{% endtab %}\n{% tab title=\"CMake\" %}\nc\n{% endtab %}\n{% endtabs %}";
        let (output, _) = convert(input);
        assert!(output.contains("value=\"cmake\""));
        assert!(output.contains("value=\"cmake1\""));
        assert!(output.contains("value=\"cmake2\""));
    }

    #[test]
    fn explicit_languages_are_kept() {
        let content = "```kotlin\nval x = 1\n```\n```\nplain\n```\n";
        assert_eq!(
            tag_bare_fences(content, "java"),
            "```kotlin\nval x = 1\n```\n```java\nplain\n```\n"
        );
    }

    #[test]
    fn group_without_tabs_is_untouched() {
        let input = "{% tabs %}\nnothing here\n{% endtabs %}";
        let (output, report) = convert(input);
        assert_eq!(output, input);
        assert_eq!(report.counts(DirectiveKind::Tabs).converted, 0);
    }

    #[test]
    fn group_with_open_tab_is_untouched() {
        let input = "{% tabs %}\n{% tab title=\"A\" %}\na\n{% tab title=\"B\" %}\nb\n{% endtab %}\n{% endtabs %}";
        let (output, _) = convert(input);
        assert_eq!(output, input);
    }

    #[test]
    fn tab_language_table() {
        assert_eq!(tab_language("cpp"), Some("cpp"));
        assert_eq!(tab_language("C without CMake"), Some("c"));
        assert_eq!(tab_language("CMake"), Some("cmake"));
        assert_eq!(tab_language("Shell"), Some("bash"));
        assert_eq!(tab_language("JavaScript"), Some("javascript"));
        assert_eq!(tab_language("Java"), Some("java"));
        assert_eq!(tab_language("Go"), Some("go"));
        assert_eq!(tab_language("Google Cloud"), None);
        assert_eq!(tab_language("Flutter (Dart)"), Some("dart"));
    }

    #[test]
    fn labels_cannot_break_attributes() {
        let entries = vec![TabEntry {
            title: "The \"fast\" way".into(),
            value: "thefastway".into(),
            content: "x".into(),
        }];
        assert!(render_tabs(&entries).contains("label=\"The 'fast' way\""));
    }
}
