//! Docusaurus SEO metadata for converted GitBook pages.
//!
//! Runs after [`gbmdx_core`] has produced MDX: fills in `title`,
//! `description` and `keywords` where a page lacks them and inserts a
//! structured-data component.
#![deny(missing_docs)]

/// Page families and their templates.
pub mod archetype;
/// Site settings.
pub mod config;
/// Header reading, value synthesis and rendering.
pub mod metadata;
/// Schema components.
pub mod schema;
/// Whole-file synthesis.
pub mod synthesize;

pub use archetype::{Archetype, SchemaKind, default_archetypes, match_archetype};
pub use config::{ConfigError, SiteConfig};
pub use metadata::{ContentInfo, HeaderForm, MetadataRecord, MetadataValue};
pub use synthesize::{
    FileSynthesis, MetadataSynthesizer, ProcessReport, Synthesis, SynthesisError,
    SynthesisOutcome, process_files,
};
