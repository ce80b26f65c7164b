//! Whole-file metadata pass.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use gbmdx_core::Diagnostics;
use rayon::prelude::*;
use thiserror::Error;

use crate::archetype::{SchemaKind, match_archetype};
use crate::config::SiteConfig;
use crate::metadata::{
    HeaderForm, MetadataRecord, build_record, content_info, extra_keys, read_header, render_header,
};
use crate::schema::{SchemaFields, has_schema_import, insert_schema, render_schema};

/// Failure to synthesize one file.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// The page could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// Page path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The page could not be written back.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Page path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Extra header keys could not be serialized.
    #[error("failed to render header for {}: {source}", path.display())]
    Render {
        /// Page path.
        path: PathBuf,
        /// YAML error.
        #[source]
        source: serde_yaml::Error,
    },
}

/// Whether a page changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisOutcome {
    /// New text differs from the input.
    Updated,
    /// Page already had everything.
    Unchanged,
}

/// Result of synthesizing one page.
#[derive(Debug, Clone)]
pub struct Synthesis {
    /// Whether `text` differs from the input.
    pub outcome: SynthesisOutcome,
    /// Full page text.
    pub text: String,
    /// Header values used.
    pub record: MetadataRecord,
    /// Whether a schema component was inserted.
    pub schema_added: bool,
    /// Header problems found on the way.
    pub diagnostics: Diagnostics,
}

/// Fills missing SEO frontmatter and schema components.
#[derive(Debug, Clone, Default)]
pub struct MetadataSynthesizer {
    config: SiteConfig,
}

impl MetadataSynthesizer {
    /// Creates a synthesizer for one site.
    pub fn new(config: SiteConfig) -> Self {
        Self { config }
    }

    /// Site settings in use.
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Synthesizes `content`, which was read from `path`.
    ///
    /// The file stem drives archetype matching and fallbacks.
    pub fn synthesize(&self, path: &Path, content: &str) -> Result<Synthesis, SynthesisError> {
        let mut diagnostics = Diagnostics::new();
        let header = read_header(content, &mut diagnostics);
        diagnostics.rebase(Some(&path.display().to_string()), 0);
        for diagnostic in diagnostics.iter() {
            log::warn!("{diagnostic}");
        }

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let archetype = match_archetype(&self.config.archetypes, stem);
        let info = content_info(&header.body);
        let record = build_record(&self.config, archetype, stem, &header.frontmatter, &info);
        let has_schema = has_schema_import(&header.body, &self.config.schema_module);

        if header.form == HeaderForm::Delimited && record.is_complete() && has_schema {
            log::debug!("{}: metadata complete", path.display());
            return Ok(Synthesis {
                outcome: SynthesisOutcome::Unchanged,
                text: content.to_string(),
                record,
                schema_added: false,
                diagnostics,
            });
        }

        let body = if has_schema {
            header.body.clone()
        } else {
            let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), stem);
            let date = self.config.date_string();
            let fields = SchemaFields {
                title: record.title.value(),
                description: record.description.value(),
                url: &url,
                date: &date,
            };
            let kind = archetype.map_or(SchemaKind::Article, |a| a.schema);
            insert_schema(
                &header.body,
                &render_schema(kind, &self.config.schema_module, &fields),
            )
        };

        let header_text =
            render_header(&record, &extra_keys(&header.frontmatter)).map_err(|source| {
                SynthesisError::Render {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
        let text = format!("{header_text}\n\n{}", body.trim_start_matches(['\n', '\r']));
        let outcome = if text == content {
            SynthesisOutcome::Unchanged
        } else {
            SynthesisOutcome::Updated
        };
        log::debug!("{}: {outcome:?}", path.display());

        Ok(Synthesis {
            outcome,
            text,
            record,
            schema_added: !has_schema,
            diagnostics,
        })
    }

    /// Reads, synthesizes and rewrites `path`. Unchanged files are not
    /// written.
    pub fn synthesize_file(&self, path: &Path) -> Result<Synthesis, SynthesisError> {
        let content = fs::read_to_string(path).map_err(|source| SynthesisError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let synthesis = self.synthesize(path, &content)?;
        if synthesis.outcome == SynthesisOutcome::Updated {
            fs::write(path, &synthesis.text).map_err(|source| SynthesisError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(synthesis)
    }
}

/// Outcome for one file of [`process_files`].
#[derive(Debug)]
pub struct FileSynthesis {
    /// Page path.
    pub path: PathBuf,
    /// What happened.
    pub result: Result<SynthesisOutcome, SynthesisError>,
}

/// Summary of [`process_files`].
#[derive(Debug, Default)]
pub struct ProcessReport {
    /// Per-file results in input order.
    pub files: Vec<FileSynthesis>,
    /// Files rewritten.
    pub updated: usize,
    /// Files left alone.
    pub unchanged: usize,
    /// Files that failed.
    pub failed: usize,
}

/// Synthesizes every file in `paths`, in parallel when asked. A failing
/// file does not stop the others.
pub fn process_files(
    paths: &[PathBuf],
    synthesizer: &MetadataSynthesizer,
    parallel: bool,
) -> ProcessReport {
    let updated = AtomicUsize::new(0);
    let unchanged = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let process = |path: &PathBuf| {
        let result = synthesizer.synthesize_file(path).map(|s| s.outcome);
        match &result {
            Ok(SynthesisOutcome::Updated) => updated.fetch_add(1, Ordering::Relaxed),
            Ok(SynthesisOutcome::Unchanged) => unchanged.fetch_add(1, Ordering::Relaxed),
            Err(err) => {
                log::warn!("{err}");
                failed.fetch_add(1, Ordering::Relaxed)
            }
        };
        FileSynthesis {
            path: path.clone(),
            result,
        }
    };

    let files = if parallel {
        paths.par_iter().map(process).collect()
    } else {
        paths.iter().map(process).collect()
    };

    ProcessReport {
        files,
        updated: updated.into_inner(),
        unchanged: unchanged.into_inner(),
        failed: failed.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::metadata::MetadataValue;

    fn synthesizer() -> MetadataSynthesizer {
        MetadataSynthesizer::new(SiteConfig {
            today: NaiveDate::from_ymd_opt(2024, 5, 1),
            ..SiteConfig::default()
        })
    }

    #[test]
    fn header_and_schema_are_added() {
        let synthesis = synthesizer()
            .synthesize(Path::new("docs/relations.mdx"), "# Relations\n\nBody\n")
            .unwrap();
        assert_eq!(synthesis.outcome, SynthesisOutcome::Updated);
        assert!(synthesis.schema_added);
        assert!(synthesis.text.starts_with("---\ntitle: \"Relations in ObjectBox C++\"\n"));
        assert!(synthesis.text.contains(
            "---\n\nimport { TechnicalArticleSchema } from '@site/src/components/Schema';\n\n<TechnicalArticleSchema\n"
        ));
        assert!(synthesis.text.contains("  url=\"https://cpp.objectbox.io/relations\"\n"));
        assert!(synthesis.text.contains("  datePublished=\"2024-05-01\"\n"));
        assert!(synthesis.text.ends_with("/>\n\n# Relations\n\nBody\n"));
    }

    #[test]
    fn second_pass_is_unchanged() {
        let synthesizer = synthesizer();
        let path = Path::new("sync.md");
        let first = synthesizer
            .synthesize(path, "import Tabs from '@theme/Tabs';\n\n# Sync\n\nKeeps devices in sync with a server.\n")
            .unwrap();
        let second = synthesizer.synthesize(path, &first.text).unwrap();
        assert_eq!(second.outcome, SynthesisOutcome::Unchanged);
        assert_eq!(second.text, first.text);
        assert!(second.record.is_complete());
    }

    #[test]
    fn blank_lines_before_imports_are_dropped() {
        let synthesizer = synthesizer();
        let path = Path::new("tabs.mdx");
        let page = "---\ntitle: Tabs\n---\n\n\nimport Tabs from '@theme/Tabs';\n\nBody text that explains the tab imports.\n";
        let first = synthesizer.synthesize(path, page).unwrap();
        assert!(first.text.contains(
            "---\n\nimport Tabs from '@theme/Tabs';\n\nimport { TechnicalArticleSchema }"
        ));

        let second = synthesizer.synthesize(path, &first.text).unwrap();
        assert_eq!(second.outcome, SynthesisOutcome::Unchanged);
    }

    #[test]
    fn crlf_page_gets_a_content_description() {
        let synthesis = synthesizer()
            .synthesize(
                Path::new("sync.md"),
                "# Sync\r\n\r\nKeeps devices in sync with a server.\r\n",
            )
            .unwrap();
        assert_eq!(
            synthesis.record.description,
            MetadataValue::Synthesized("Keeps devices in sync with a server.".into())
        );
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = synthesizer()
            .synthesize_file(Path::new("/nonexistent/page.md"))
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Read { .. }));
    }
}
