#![deny(missing_docs)]
//! gbmdx core: converts GitBook Markdown into Docusaurus MDX.

/// Reading, converting and writing batches of files.
pub mod batch;
/// Code fence detection utilities.
pub mod code_fence;
/// GitBook directive conversion.
pub mod directive;
/// Core error and diagnostic types.
pub mod error;
/// Context-sensitive brace escaping.
pub mod escape;
/// YAML frontmatter extraction helpers.
pub mod frontmatter;
/// Inline HTML normalization.
pub mod html;
/// Import hoisting.
pub mod imports;
/// Link target rewriting.
pub mod links;
/// The staged transpiler.
pub mod pipeline;
/// Prose fixes.
pub mod prose;
/// Slug and title helpers.
pub mod slug;

pub use batch::{BatchOptions, BatchReport, BatchStats, FileJob, FsSink, OutputSink, run_batch};
pub use code_fence::{FencePhase, FenceState, LineParseOutcome, advance_fence_state};
pub use directive::{DirectiveKind, TranscodeOptions, TranscodeReport, transcode};
pub use error::{ConvertError, Diagnostic, Diagnostics, ErrorSeverity, SourceLocation};
pub use escape::{EscapeReport, escape_braces};
pub use frontmatter::{FrontmatterError, FrontmatterSplit, HeaderSource, normalize_frontmatter};
pub use html::{HtmlOptions, normalize_html};
pub use imports::hoist_imports;
pub use links::rewrite_links;
pub use pipeline::{
    Document, LogObserver, PipelineObserver, Stage, TranspileOptions, TranspileOutput,
    TranspileReport, Transpiler,
};
pub use prose::normalize_prose;
pub use slug::{SlugDeduper, extract_custom_id, humanize, title_case};
