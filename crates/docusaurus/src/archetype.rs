//! Page families matched by file name, with their header templates.

use serde::{Deserialize, Serialize};

/// Structured-data component family injected for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaKind {
    /// Landing page: `SoftwareDocumentationSchema`.
    Main,
    /// Step-by-step guide: `TechnicalArticleSchema`.
    Tutorial,
    /// Reference article: `TechnicalArticleSchema`.
    Article,
    /// FAQ page: `TechnicalArticleSchema`, with `FAQSchema` imported too.
    Faq,
}

/// Metadata templates for a family of pages.
///
/// Templates may use `{project}` and `{language}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archetype {
    /// Substring matched against the lowercased file stem.
    pub pattern: String,
    /// Title template.
    pub title_template: String,
    /// Description template.
    pub description_template: String,
    /// Keywords added for matching pages.
    pub keywords: Vec<String>,
    /// Structured-data component family.
    pub schema: SchemaKind,
}

impl Archetype {
    fn new(
        pattern: &str,
        title_template: &str,
        description_template: &str,
        keywords: &[&str],
        schema: SchemaKind,
    ) -> Self {
        Self {
            pattern: pattern.to_string(),
            title_template: title_template.to_string(),
            description_template: description_template.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            schema,
        }
    }

    /// Whether this archetype applies to a file with `stem`.
    pub fn matches(&self, stem: &str) -> bool {
        stem.to_lowercase().contains(&self.pattern.to_lowercase())
    }
}

/// First archetype in `archetypes` that applies to `stem`.
pub fn match_archetype<'a>(archetypes: &'a [Archetype], stem: &str) -> Option<&'a Archetype> {
    archetypes.iter().find(|archetype| archetype.matches(stem))
}

/// Fills `{project}` and `{language}` placeholders.
pub fn fill_template(template: &str, project: &str, language: &str) -> String {
    template
        .replace("{project}", project)
        .replace("{language}", language)
}

/// Page families of a typical database SDK documentation site, in match
/// order.
pub fn default_archetypes() -> Vec<Archetype> {
    use SchemaKind::*;
    vec![
        Archetype::new(
            "README",
            "{project} {language} Database Documentation",
            "High-performance NoSQL database for {language} applications with native APIs and easy integration",
            &["database", "nosql", "documentation"],
            Main,
        ),
        Archetype::new(
            "install",
            "Install {project} {language}",
            "Learn how to add {project} {language} database to your project using package managers and build tools",
            &["installation", "setup", "package manager"],
            Tutorial,
        ),
        Archetype::new(
            "getting-started",
            "Getting Started with {project} {language}",
            "Step-by-step tutorial to integrate {project} database in your {language} application and create your first entities",
            &["tutorial", "getting started", "quickstart"],
            Tutorial,
        ),
        Archetype::new(
            "entity-annotations",
            "Entity Annotations in {project} {language}",
            "Learn how to use annotations to define your data models and relationships in {project} {language}",
            &["entities", "annotations", "data models", "relationships"],
            Article,
        ),
        Archetype::new(
            "queries",
            "Queries in {project} {language}",
            "Learn how to query your {project} database using {language} APIs for filtering, sorting, and finding data",
            &["queries", "filtering", "sorting", "database search"],
            Article,
        ),
        Archetype::new(
            "relations",
            "Relations in {project} {language}",
            "Define and work with relationships between entities in {project} {language} database",
            &["relations", "relationships", "foreign keys", "links"],
            Article,
        ),
        Archetype::new(
            "transactions",
            "Transactions in {project} {language}",
            "Learn how to use transactions for atomic operations and data consistency in {project} {language}",
            &["transactions", "atomic operations", "data consistency"],
            Article,
        ),
        Archetype::new(
            "faq",
            "{project} {language} FAQ",
            "Frequently asked questions about {project} {language} database, installation, usage, and troubleshooting",
            &["faq", "questions", "help", "troubleshooting"],
            Faq,
        ),
        Archetype::new(
            "custom-types",
            "Custom Types in {project} {language}",
            "Learn how to use custom data types and enums with {project} {language} database",
            &["custom types", "enums", "data types", "serialization"],
            Article,
        ),
        Archetype::new(
            "schema-changes",
            "Schema Changes in {project} {language}",
            "Handle database schema migrations and updates in {project} {language} applications",
            &["schema", "migrations", "database updates", "versioning"],
            Article,
        ),
        Archetype::new(
            "store",
            "Store - {project} {language}",
            "Learn about the Store API in {project} {language} for database management and configuration",
            &["store", "database management", "configuration"],
            Article,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readme_matches_case_insensitively() {
        let archetypes = default_archetypes();
        let readme = match_archetype(&archetypes, "README").unwrap();
        assert_eq!(readme.schema, SchemaKind::Main);
        assert_eq!(match_archetype(&archetypes, "readme").unwrap().pattern, "README");
    }

    #[test]
    fn first_match_wins() {
        let archetypes = default_archetypes();
        assert_eq!(match_archetype(&archetypes, "installation").unwrap().pattern, "install");
        assert_eq!(match_archetype(&archetypes, "entity-relations").unwrap().pattern, "relations");
        assert!(match_archetype(&archetypes, "sync").is_none());
    }

    #[test]
    fn templates_are_filled() {
        assert_eq!(
            fill_template("Getting Started with {project} {language}", "ObjectBox", "C++"),
            "Getting Started with ObjectBox C++"
        );
    }
}
