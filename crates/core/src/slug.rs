use std::collections::HashSet;

/// Extracts a `{#custom-id}` suffix from heading text.
///
/// Escaped suffixes (`&#123;#id&#125;`) produced by the brace escaper are
/// recognized as well.
///
/// # Examples
///
/// ```
/// use gbmdx_core::slug::extract_custom_id;
///
/// let (text, id) = extract_custom_id("My Heading {#my-heading}");
/// assert_eq!(text, "My Heading");
/// assert_eq!(id, Some("my-heading"));
///
/// let (text, id) = extract_custom_id("Plain heading");
/// assert_eq!(text, "Plain heading");
/// assert_eq!(id, None);
/// ```
pub fn extract_custom_id(text: &str) -> (&str, Option<&str>) {
    let trimmed = text.trim_end();
    let (open_token, close_token) = if trimmed.ends_with('}') {
        ("{#", "}")
    } else if trimmed.ends_with("&#125;") {
        ("&#123;#", "&#125;")
    } else {
        return (text, None);
    };

    if let Some(open) = trimmed.rfind(open_token) {
        let id = &trimmed[open + open_token.len()..trimmed.len() - close_token.len()];
        if !id.is_empty()
            && id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return (trimmed[..open].trim_end(), Some(id));
        }
    }

    (text, None)
}

/// Title-cases words the way documentation titles are usually written:
/// a letter is uppercased when it follows a non-letter, lowercased otherwise.
pub fn title_case(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut previous_is_letter = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if previous_is_letter {
                output.extend(ch.to_lowercase());
            } else {
                output.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            output.push(ch);
            previous_is_letter = false;
        }
    }
    output
}

/// Turns a file or path name into a readable title.
///
/// Drops a `.md`/`.mdx` extension, replaces `-` and `_` with spaces and
/// title-cases the result: `"entity-annotations.md"` becomes
/// `"Entity Annotations"`.
pub fn humanize(name: &str) -> String {
    let stem = strip_doc_extension(name.trim());
    title_case(&stem.replace(['-', '_'], " "))
}

/// Removes a trailing `.md` or `.mdx` extension.
pub fn strip_doc_extension(target: &str) -> &str {
    target
        .strip_suffix(".md")
        .or_else(|| target.strip_suffix(".mdx"))
        .unwrap_or(target)
}

/// Maps a tab title to the `value` slug of its `TabItem`.
///
/// Common language titles get stable, curated slugs; anything else keeps its
/// ASCII alphanumerics. `position` is 1-based and only used when nothing
/// usable is left.
pub fn tab_value_slug(title: &str, position: usize) -> String {
    let lower = title.trim().to_lowercase();
    if lower == "c++" || lower == "cpp" {
        return "cpp".into();
    }
    if lower == "c" || lower.contains("c without") {
        return "c".into();
    }
    if lower.contains("cmake") && (lower.contains("cpp") || lower.contains("c++")) {
        return "cmakecpp".into();
    }
    if lower.contains("cmake") {
        return "cmake".into();
    }

    let filtered: String = lower.chars().filter(char::is_ascii_alphanumeric).collect();
    if filtered.is_empty() {
        format!("tab{position}")
    } else {
        filtered
    }
}

/// Keeps generated values unique within one scope.
///
/// Collisions get `1`, `2`, … appended in order of first occurrence.
#[derive(Debug, Default)]
pub struct SlugDeduper {
    used: HashSet<String>,
}

impl SlugDeduper {
    /// Creates an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `base`, or `base` plus the first free counter.
    pub fn claim(&mut self, base: &str) -> String {
        let mut candidate = base.to_string();
        let mut counter = 1usize;
        while self.used.contains(&candidate) {
            candidate = format!("{base}{counter}");
            counter += 1;
        }
        self.used.insert(candidate.clone());
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_id_requires_valid_characters() {
        assert_eq!(extract_custom_id("Title {#ok_id-1}"), ("Title", Some("ok_id-1")));
        assert_eq!(extract_custom_id("Title {#not ok}"), ("Title {#not ok}", None));
        assert_eq!(extract_custom_id("Title {}"), ("Title {}", None));
    }

    #[test]
    fn custom_id_recognizes_escaped_form() {
        assert_eq!(
            extract_custom_id("Queries &#123;#queries&#125;"),
            ("Queries", Some("queries"))
        );
    }

    #[test]
    fn title_case_matches_word_boundaries() {
        assert_eq!(title_case("getting started"), "Getting Started");
        assert_eq!(title_case("DATA sync"), "Data Sync");
        assert_eq!(title_case("c++ api"), "C++ Api");
        assert_eq!(title_case("v2beta"), "V2Beta");
    }

    #[test]
    fn humanize_strips_extension_and_separators() {
        assert_eq!(humanize("entity-annotations.md"), "Entity Annotations");
        assert_eq!(humanize("schema_changes.mdx"), "Schema Changes");
        assert_eq!(humanize("faq"), "Faq");
    }

    #[test]
    fn tab_slugs_follow_curated_table() {
        assert_eq!(tab_value_slug("C++", 1), "cpp");
        assert_eq!(tab_value_slug("cpp", 1), "cpp");
        assert_eq!(tab_value_slug("C", 2), "c");
        assert_eq!(tab_value_slug("C without CMake", 2), "c");
        assert_eq!(tab_value_slug("CMake (C++)", 3), "cmakecpp");
        assert_eq!(tab_value_slug("CMake", 3), "cmake");
        assert_eq!(tab_value_slug("Swift / iOS", 4), "swiftios");
        assert_eq!(tab_value_slug("🚀", 5), "tab5");
    }

    #[test]
    fn deduper_appends_counters() {
        let mut deduper = SlugDeduper::new();
        assert_eq!(deduper.claim("cpp"), "cpp");
        assert_eq!(deduper.claim("cpp"), "cpp1");
        assert_eq!(deduper.claim("cpp"), "cpp2");
        assert_eq!(deduper.claim("c"), "c");
        assert_eq!(deduper.claim("cpp1"), "cpp11");
    }
}
