use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::directive::DirectiveKind;

/// Source location information for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    /// Optional file path
    pub file: Option<String>,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
}

impl SourceLocation {
    /// Create a new source location
    pub fn new(line: usize, column: usize) -> Self {
        Self {
            file: None,
            line,
            column,
        }
    }

    /// Create a source location with file information
    pub fn with_file(file: String, line: usize, column: usize) -> Self {
        Self {
            file: Some(file),
            line,
            column,
        }
    }

    /// Location of a byte offset inside `text`.
    pub fn at_offset(text: &str, offset: usize) -> Self {
        let offset = offset.min(text.len());
        let before = &text[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |idx| idx + 1);
        let column = before[line_start..].chars().count() + 1;
        Self::new(line, column)
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}:{}:{}", file, self.line, self.column)
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}

/// Fatal per-file errors. They abort one document, never the batch.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The source document could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// Path that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The converted document could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Path that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ConvertError {
    /// Path of the file the error belongs to.
    pub fn path(&self) -> &PathBuf {
        match self {
            ConvertError::Read { path, .. } | ConvertError::Write { path, .. } => path,
        }
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Recovered, but content may have been degraded
    Error,
    /// Recovered without content loss
    Warning,
}

/// Recoverable conditions surfaced while converting a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Diagnostic {
    /// A directive marker that no regular conversion consumed.
    MalformedDirective {
        /// Directive family of the marker.
        directive: DirectiveKind,
        /// Raw marker name as written.
        name: String,
        /// What the fallback sweep did with it.
        detail: String,
        /// Where the marker started.
        location: SourceLocation,
    },
    /// Component tags whose opens and closes do not pair up.
    UnbalancedComponents {
        /// Innermost tag still open.
        tag: String,
        /// Where that tag was opened.
        location: SourceLocation,
    },
    /// Header block present but not a YAML mapping.
    UnparseableMetadata {
        /// Parser message.
        message: String,
        /// Start of the header.
        location: SourceLocation,
    },
    /// Header delimiter opened but never closed.
    UnterminatedHeader {
        /// Position of the opening delimiter.
        location: SourceLocation,
    },
}

impl Diagnostic {
    /// Get the location of this diagnostic
    pub fn location(&self) -> &SourceLocation {
        match self {
            Diagnostic::MalformedDirective { location, .. }
            | Diagnostic::UnbalancedComponents { location, .. }
            | Diagnostic::UnparseableMetadata { location, .. }
            | Diagnostic::UnterminatedHeader { location } => location,
        }
    }

    fn location_mut(&mut self) -> &mut SourceLocation {
        match self {
            Diagnostic::MalformedDirective { location, .. }
            | Diagnostic::UnbalancedComponents { location, .. }
            | Diagnostic::UnparseableMetadata { location, .. }
            | Diagnostic::UnterminatedHeader { location } => location,
        }
    }

    /// Severity of the diagnostic.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Diagnostic::UnparseableMetadata { .. } | Diagnostic::UnbalancedComponents { .. } => {
                ErrorSeverity::Error
            }
            Diagnostic::MalformedDirective { .. } | Diagnostic::UnterminatedHeader { .. } => {
                ErrorSeverity::Warning
            }
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::MalformedDirective {
                name,
                detail,
                location,
                ..
            } => write!(f, "{location}: malformed directive '{name}': {detail}"),
            Diagnostic::UnbalancedComponents { tag, location } => {
                write!(f, "{location}: component <{tag}> is never closed")
            }
            Diagnostic::UnparseableMetadata { message, location } => {
                write!(f, "{location}: unparseable frontmatter: {message}")
            }
            Diagnostic::UnterminatedHeader { location } => {
                write!(f, "{location}: frontmatter opened but never closed")
            }
        }
    }
}

/// Collection of diagnostics for one document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create a new empty diagnostics collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// Move every diagnostic from `other` into this collection.
    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// Shift line numbers by `line_offset` and tag each location with `file`.
    ///
    /// Stages report positions relative to the body they saw; the pipeline
    /// rebases them onto the source document.
    pub fn rebase(&mut self, file: Option<&str>, line_offset: usize) {
        for item in &mut self.items {
            let location = item.location_mut();
            location.line += line_offset;
            if location.file.is_none() {
                location.file = file.map(str::to_string);
            }
        }
    }

    /// Iterate over the collected diagnostics.
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    /// Check if there are any diagnostics
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get total count of all diagnostics
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if any diagnostic has error severity
    pub fn has_errors(&self) -> bool {
        self.items
            .iter()
            .any(|item| item.severity() == ErrorSeverity::Error)
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_from_offset_counts_lines_and_columns() {
        let text = "first\nsecond line\nthird";
        let offset = text.find("line").unwrap();
        let location = SourceLocation::at_offset(text, offset);
        assert_eq!(location.line, 2);
        assert_eq!(location.column, 8);
        assert_eq!(location.to_string(), "2:8");
    }

    #[test]
    fn rebase_shifts_lines_and_sets_file() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::UnterminatedHeader {
            location: SourceLocation::new(1, 1),
        });
        diagnostics.rebase(Some("docs/intro.md"), 4);

        let first = diagnostics.iter().next().unwrap();
        assert_eq!(first.location().line, 5);
        assert_eq!(first.location().to_string(), "docs/intro.md:5:1");
    }

    #[test]
    fn severity_distinguishes_degraded_content() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::UnterminatedHeader {
            location: SourceLocation::new(1, 1),
        });
        assert!(!diagnostics.has_errors());

        diagnostics.push(Diagnostic::UnparseableMetadata {
            message: "bad".into(),
            location: SourceLocation::new(1, 1),
        });
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn convert_error_mentions_path() {
        let err = ConvertError::Read {
            path: PathBuf::from("missing.md"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.to_string().contains("missing.md"), "{err}");
        assert_eq!(err.path(), &PathBuf::from("missing.md"));
    }
}
