//! The transpiler: every stage, in its fixed order, over one document.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;

use crate::directive::{TranscodeOptions, TranscodeReport, transcode};
use crate::error::{Diagnostic, Diagnostics};
use crate::escape::{EscapeReport, escape_braces};
use crate::frontmatter::{HeaderSource, normalize_frontmatter};
use crate::html::{HtmlOptions, normalize_html};
use crate::imports::hoist_imports;
use crate::links::rewrite_links;
use crate::prose::normalize_prose;

/// Transpiler stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Header parsing or description synthesis.
    Frontmatter,
    /// GitBook directives to MDX constructs.
    Directives,
    /// Inline HTML cleanup.
    InlineHtml,
    /// Entity, bullet and arrow fixes.
    Prose,
    /// Brace escaping.
    Escape,
    /// `.md` link targets.
    Links,
    /// Import hoisting.
    Imports,
}

impl Stage {
    /// Execution order. Directives must be converted before braces are
    /// escaped, and links rewritten after directives produced theirs.
    pub const ORDER: [Stage; 7] = [
        Stage::Frontmatter,
        Stage::Directives,
        Stage::InlineHtml,
        Stage::Prose,
        Stage::Escape,
        Stage::Links,
        Stage::Imports,
    ];

    /// Short name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Frontmatter => "frontmatter",
            Stage::Directives => "directives",
            Stage::InlineHtml => "inline-html",
            Stage::Prose => "prose",
            Stage::Escape => "escape",
            Stage::Links => "links",
            Stage::Imports => "imports",
        }
    }
}

/// Options for [`Transpiler`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranspileOptions {
    /// Directive conversion settings.
    pub transcode: TranscodeOptions,
    /// Inline HTML settings.
    pub html: HtmlOptions,
}

/// One document moving through the pipeline.
#[derive(Debug, Clone)]
pub struct Document {
    /// Source path, used for diagnostics.
    pub path: PathBuf,
    /// Text as read.
    pub raw_text: String,
    /// Header key/value pairs.
    pub frontmatter: Mapping,
    /// Header provenance.
    pub header: HeaderSource,
    /// Body after the stages run so far.
    pub body: String,
}

impl Document {
    /// A document that no stage has touched yet.
    pub fn new(path: impl Into<PathBuf>, raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        Self {
            path: path.into(),
            body: raw_text.clone(),
            raw_text,
            frontmatter: Mapping::new(),
            header: HeaderSource::Absent,
        }
    }

    /// Header followed by body.
    pub fn render(&self) -> String {
        let header = self.header.text();
        let mut text = String::with_capacity(header.len() + self.body.len());
        text.push_str(header);
        text.push_str(&self.body);
        text
    }
}

/// Counters collected across stages.
#[derive(Debug, Clone, Default)]
pub struct TranspileReport {
    /// Directive counts.
    pub transcode: TranscodeReport,
    /// Escaping counts.
    pub escape: EscapeReport,
    /// Links whose `.md` extension was removed.
    pub links_rewritten: usize,
}

/// Result of [`Transpiler::transpile`].
#[derive(Debug, Clone)]
pub struct TranspileOutput {
    /// Final document state.
    pub document: Document,
    /// Rendered MDX.
    pub text: String,
    /// Stage counters.
    pub report: TranspileReport,
    /// Everything recovered from, located in the source file.
    pub diagnostics: Diagnostics,
}

/// Hooks called while a document is transpiled.
pub trait PipelineObserver: Send + Sync {
    /// Called after each stage.
    fn stage_finished(&self, _path: &Path, _stage: Stage, _report: &TranspileReport) {}

    /// Called once per diagnostic after the last stage.
    fn diagnostic(&self, _path: &Path, _diagnostic: &Diagnostic) {}
}

/// Observer that forwards to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl PipelineObserver for LogObserver {
    fn stage_finished(&self, path: &Path, stage: Stage, report: &TranspileReport) {
        match stage {
            Stage::Directives => log::debug!(
                "{}: {} directives converted, {} fallbacks",
                path.display(),
                report.transcode.iter().map(|(_, c)| c.converted).sum::<usize>(),
                report.transcode.total_fallbacks()
            ),
            Stage::Escape => log::debug!(
                "{}: {} lines escaped, {} fenced blocks skipped",
                path.display(),
                report.escape.escaped_lines,
                report.escape.fences
            ),
            Stage::Links => log::debug!(
                "{}: {} links rewritten",
                path.display(),
                report.links_rewritten
            ),
            _ => log::debug!("{}: {} done", path.display(), stage.name()),
        }
    }

    fn diagnostic(&self, _path: &Path, diagnostic: &Diagnostic) {
        log::warn!("{diagnostic}");
    }
}

/// Converts GitBook Markdown into Docusaurus MDX.
pub struct Transpiler {
    options: TranspileOptions,
    observer: Box<dyn PipelineObserver>,
}

impl Default for Transpiler {
    fn default() -> Self {
        Self::new(TranspileOptions::default())
    }
}

impl std::fmt::Debug for Transpiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transpiler")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Transpiler {
    /// A transpiler that logs through [`LogObserver`].
    pub fn new(options: TranspileOptions) -> Self {
        Self {
            options,
            observer: Box::new(LogObserver),
        }
    }

    /// Replaces the observer.
    pub fn with_observer(mut self, observer: impl PipelineObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Active options.
    pub fn options(&self) -> &TranspileOptions {
        &self.options
    }

    /// Runs every stage over `raw_text`.
    pub fn transpile(&self, path: impl AsRef<Path>, raw_text: &str) -> TranspileOutput {
        let path = path.as_ref();
        let mut document = Document::new(path, raw_text);
        let mut report = TranspileReport::default();
        let mut diagnostics = Diagnostics::new();

        for stage in Stage::ORDER {
            self.run_stage(stage, &mut document, &mut report, &mut diagnostics);
            self.observer.stage_finished(path, stage, &report);
        }

        for diagnostic in &diagnostics {
            self.observer.diagnostic(path, diagnostic);
        }

        TranspileOutput {
            text: document.render(),
            document,
            report,
            diagnostics,
        }
    }

    fn run_stage(
        &self,
        stage: Stage,
        document: &mut Document,
        report: &mut TranspileReport,
        diagnostics: &mut Diagnostics,
    ) {
        let file = document.path.display().to_string();
        let mut located = |mut found: Diagnostics, line_offset: usize| {
            found.rebase(Some(&file), line_offset);
            diagnostics.extend(found);
        };

        match stage {
            Stage::Frontmatter => {
                let split = normalize_frontmatter(&document.raw_text);
                document.frontmatter = split.frontmatter;
                document.header = split.header;
                document.body = split.body;
                located(split.diagnostics, 0);
            }
            Stage::Directives => {
                let transcoded = transcode(&document.body, &self.options.transcode);
                document.body = transcoded.text;
                report.transcode = transcoded.report;
                located(transcoded.diagnostics, document.header.source_lines());
            }
            Stage::InlineHtml => {
                document.body = normalize_html(&document.body, &self.options.html);
            }
            Stage::Prose => {
                document.body = normalize_prose(&document.body);
            }
            Stage::Escape => {
                let escaped = escape_braces(&document.body);
                document.body = escaped.text;
                report.escape = escaped.report;
                located(escaped.diagnostics, document.header.source_lines());
            }
            Stage::Links => {
                let (body, rewritten) = rewrite_links(&document.body);
                document.body = body;
                report.links_rewritten = rewritten;
            }
            Stage::Imports => {
                document.body = hoist_imports(&document.body);
            }
        }
    }
}
