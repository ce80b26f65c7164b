//! Site settings loaded from YAML.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::archetype::{Archetype, default_archetypes};

/// Errors raised while loading a [`SiteConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        /// Config path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// YAML did not match the config shape.
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// JSON did not match the config shape.
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
    /// The extension is neither YAML nor JSON.
    #[error("unsupported config format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
}

/// Site-wide settings for metadata synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Product name used in titles and keywords.
    pub project_name: String,
    /// SDK language, e.g. `C++`. Also the key into `language_keywords`.
    pub language: String,
    /// Site root used for schema URLs.
    pub base_url: String,
    /// Module the schema components are imported from.
    pub schema_module: String,
    /// Keywords added after the language keywords.
    pub base_keywords: Vec<String>,
    /// Keywords per language.
    pub language_keywords: BTreeMap<String, Vec<String>>,
    /// Description used when nothing better exists. Accepts `{topic}`,
    /// `{project}` and `{language}`.
    pub fallback_description: String,
    /// Page families, in match order.
    pub archetypes: Vec<Archetype>,
    /// Date written into schema components. Defaults to today.
    pub today: Option<NaiveDate>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        let table: [(&str, &[&str]); 7] = [
            ("Swift", &["swift", "ios", "macos", "xcode"]),
            ("Go", &["go", "golang"]),
            ("C++", &["c++", "cpp", "cmake"]),
            ("Java", &["java", "android"]),
            ("Dart", &["dart", "flutter"]),
            ("Kotlin", &["kotlin", "android"]),
            ("Python", &["python"]),
        ];
        let language_keywords = table
            .into_iter()
            .map(|(language, keywords)| {
                (
                    language.to_string(),
                    keywords.iter().map(|k| k.to_string()).collect(),
                )
            })
            .collect();

        Self {
            project_name: "ObjectBox".into(),
            language: "C++".into(),
            base_url: "https://cpp.objectbox.io".into(),
            schema_module: "@site/src/components/Schema".into(),
            base_keywords: vec!["database".into()],
            language_keywords,
            fallback_description:
                "Learn about {topic} in {project} {language} database for high-performance applications"
                    .into(),
            archetypes: default_archetypes(),
            today: None,
        }
    }
}

impl SiteConfig {
    /// Parses a YAML config; missing fields take their defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Parses a JSON config; missing fields take their defaults.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Loads `.yaml`, `.yml` or `.json`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&text),
            Some("json") => Self::from_json_str(&text),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Keywords for the configured language.
    pub fn language_keywords(&self) -> &[String] {
        self.language_keywords
            .get(&self.language)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Date for schema components, `YYYY-MM-DD`.
    pub fn date_string(&self) -> String {
        self.today
            .unwrap_or_else(|| chrono::Local::now().date_naive())
            .format("%Y-%m-%d")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_overrides_keep_defaults() {
        let config = SiteConfig::from_yaml_str(
            "project_name: Acme\nlanguage: Go\ntoday: 2024-05-01\n",
        )
        .unwrap();
        assert_eq!(config.project_name, "Acme");
        assert_eq!(config.language_keywords(), ["go", "golang"]);
        assert_eq!(config.date_string(), "2024-05-01");
        assert_eq!(config.archetypes.len(), 11);
    }

    #[test]
    fn json_config() {
        let config = SiteConfig::from_json_str(r#"{"base_url": "https://docs.example.com"}"#).unwrap();
        assert_eq!(config.base_url, "https://docs.example.com");
        assert_eq!(config.language, "C++");
    }

    #[test]
    fn unknown_language_has_no_keywords() {
        let config = SiteConfig {
            language: "Rust".into(),
            ..SiteConfig::default()
        };
        assert!(config.language_keywords().is_empty());
    }

    #[test]
    fn load_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.toml");
        fs::write(&path, "x = 1").unwrap();
        assert!(matches!(
            SiteConfig::load(&path),
            Err(ConfigError::UnsupportedFormat(_))
        ));

        let path = dir.path().join("site.yml");
        fs::write(&path, "language: Java\n").unwrap();
        assert_eq!(SiteConfig::load(&path).unwrap().language, "Java");
    }
}
