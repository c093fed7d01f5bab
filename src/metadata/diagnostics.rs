//! Diagnostics collection for desugaring.
//!
//! Nearly every problem the desugaring engine encounters is recoverable: a conversion that
//! cannot be performed, a wrapper that cannot forward a final method, a configured library
//! member that does not exist on the compilation's platform. Those are reported here and the
//! pass continues. Only the explicitly fatal cases abort through [`crate::Error::Fatal`].
//!
//! # Architecture
//!
//! The diagnostics container is shared by every component of a run:
//! - **Specification loading** reports unsupported or inconsistent entries
//! - **Retargeting** reports missing library classes and members
//! - **API conversion** reports impossible conversions and tracked APIs
//! - **Wrapper synthesis** reports invalid wrappers
//! - **Library amendment / custom conversions** report unresolvable holders
//!
//! The [`Diagnostics`] container uses `boxcar::Vec` for thread-safe, lock-free
//! append operations, allowing diagnostics to be collected from the parallel method sweep
//! without synchronization overhead.
//!
//! # Key Components
//!
//! - [`Diagnostics`] - Thread-safe container for diagnostic entries
//! - [`Diagnostic`] - Individual diagnostic entry with severity and context
//! - [`DiagnosticSeverity`] - Severity level (Info, Warning, Error)
//! - [`DiagnosticCategory`] - Category of the diagnostic source
//! - [`ConversionDirection`] - Which slot of a call a conversion diagnostic is about
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use vivify::metadata::diagnostics::{
//!     ConversionDirection, Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics,
//! };
//! use std::sync::Arc;
//!
//! let diagnostics = Arc::new(Diagnostics::new());
//!
//! diagnostics.warning(
//!     DiagnosticCategory::Retarget,
//!     "Cannot retarget core library member toInstant from java.util.Calendar because the \
//!      class is missing.",
//! );
//!
//! diagnostics.push(
//!     Diagnostic::new(
//!         DiagnosticSeverity::Info,
//!         DiagnosticCategory::Conversion,
//!         "Invoke to java.util.Foo#bar may not work correctly at runtime",
//!     )
//!     .with_subject("java.util.Foo#bar")
//!     .with_direction(ConversionDirection::Parameter),
//! );
//!
//! for entry in diagnostics.iter() {
//!     println!("{entry}");
//! }
//! ```
//!
//! # Thread Safety
//!
//! All types in this module are [`Send`] and [`Sync`]. Multiple threads can safely add
//! diagnostics simultaneously without coordination.

use std::fmt::{self, Write};

/// Severity level of a diagnostic entry.
///
/// Determines how the diagnostic should be treated and displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticSeverity {
    /// Informational message, not indicating a problem with the output.
    ///
    /// Used for conversions that cannot be performed while compiling an application, where
    /// the original runtime behavior is preserved.
    Info,

    /// Warning about a configuration or platform mismatch.
    ///
    /// The output is still produced, but parts of the desugaring were skipped or replaced
    /// by throwing stubs.
    Warning,

    /// Error that makes the output unusable.
    Error,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Info => write!(f, "INFO"),
            DiagnosticSeverity::Warning => write!(f, "WARN"),
            DiagnosticSeverity::Error => write!(f, "ERROR"),
        }
    }
}

/// Category indicating the source or type of diagnostic.
///
/// Helps classify diagnostics for filtering and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCategory {
    /// Issues with API conversion at call sites.
    ///
    /// Examples: no wrapper and no custom conversion for a rewritten parameter type.
    Conversion,

    /// Issues with wrapper synthesis.
    ///
    /// Examples: final methods preventing a wrapper from forwarding.
    Wrapper,

    /// Issues with core library retargeting.
    ///
    /// Examples: missing retarget source class, missing member, overriding library class.
    Retarget,

    /// Issues with callback generation.
    Callback,

    /// Issues with library amendment.
    ///
    /// Examples: amended member holder not found.
    Amendment,

    /// Issues with custom conversions.
    ///
    /// Examples: configured conversion holder missing from the program.
    CustomConversion,

    /// Reports of tracked API conversions.
    Tracking,

    /// General issues not fitting other categories.
    General,
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticCategory::Conversion => write!(f, "Conversion"),
            DiagnosticCategory::Wrapper => write!(f, "Wrapper"),
            DiagnosticCategory::Retarget => write!(f, "Retarget"),
            DiagnosticCategory::Callback => write!(f, "Callback"),
            DiagnosticCategory::Amendment => write!(f, "Amendment"),
            DiagnosticCategory::CustomConversion => write!(f, "CustomConversion"),
            DiagnosticCategory::Tracking => write!(f, "Tracking"),
            DiagnosticCategory::General => write!(f, "General"),
        }
    }
}

/// The slot of a call a conversion diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionDirection {
    /// A parameter passed to the library
    Parameter,
    /// The value returned by the library
    Return,
    /// A library-to-program call through a callback
    Callback,
}

impl fmt::Display for ConversionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionDirection::Parameter => write!(f, "parameter"),
            ConversionDirection::Return => write!(f, "return"),
            ConversionDirection::Callback => write!(f, "callback"),
        }
    }
}

/// A single diagnostic entry with context information.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level of this diagnostic.
    pub severity: DiagnosticSeverity,

    /// Category indicating the source of this diagnostic.
    pub category: DiagnosticCategory,

    /// Human-readable description of the issue.
    pub message: String,

    /// Optional offending type or method.
    pub subject: Option<String>,

    /// Optional call slot the issue is about.
    pub direction: Option<ConversionDirection>,
}

impl Diagnostic {
    /// Creates a new diagnostic entry.
    ///
    /// # Arguments
    ///
    /// * `severity` - Severity level of the diagnostic
    /// * `category` - Category of the diagnostic source
    /// * `message` - Human-readable description
    pub fn new(
        severity: DiagnosticSeverity,
        category: DiagnosticCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            subject: None,
            direction: None,
        }
    }

    /// Adds the offending type or method.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Adds the call slot.
    #[must_use]
    pub fn with_direction(mut self, direction: ConversionDirection) -> Self {
        self.direction = Some(direction);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.category, self.message)?;

        if let Some(subject) = &self.subject {
            write!(f, " (subject: {subject})")?;
        }

        if let Some(direction) = self.direction {
            write!(f, " (direction: {direction})")?;
        }

        Ok(())
    }
}

/// Thread-safe container for collecting diagnostic entries.
///
/// Uses `boxcar::Vec` internally for lock-free concurrent append operations.
/// Multiple threads can safely add diagnostics simultaneously.
#[derive(Debug)]
pub struct Diagnostics {
    entries: boxcar::Vec<Diagnostic>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    /// Creates a new empty diagnostics container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: boxcar::Vec::new(),
        }
    }

    /// Adds an informational diagnostic.
    ///
    /// # Arguments
    ///
    /// * `category` - Category of the diagnostic
    /// * `message` - Description of the observation
    pub fn info(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(DiagnosticSeverity::Info, category, message));
    }

    /// Adds a warning diagnostic.
    ///
    /// # Arguments
    ///
    /// * `category` - Category of the diagnostic
    /// * `message` - Description of the issue
    pub fn warning(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(
            DiagnosticSeverity::Warning,
            category,
            message,
        ));
    }

    /// Adds an error diagnostic.
    ///
    /// # Arguments
    ///
    /// * `category` - Category of the diagnostic
    /// * `message` - Description of the error
    pub fn error(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(
            DiagnosticSeverity::Error,
            category,
            message,
        ));
    }

    /// Adds a diagnostic entry directly.
    ///
    /// Use this for diagnostics that carry a subject or a direction.
    pub fn push(&self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// Returns true if any diagnostics have been collected.
    pub fn has_any(&self) -> bool {
        self.entries.count() > 0
    }

    /// Returns true if any error-level diagnostics have been collected.
    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, d)| d.severity == DiagnosticSeverity::Error)
    }

    /// Returns true if any warning-level diagnostics have been collected.
    pub fn has_warnings(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, d)| d.severity == DiagnosticSeverity::Warning)
    }

    /// Returns the total number of diagnostics.
    pub fn count(&self) -> usize {
        self.entries.count()
    }

    fn count_severity(&self, severity: DiagnosticSeverity) -> usize {
        self.entries
            .iter()
            .filter(|(_, d)| d.severity == severity)
            .count()
    }

    /// Returns the number of error-level diagnostics.
    pub fn error_count(&self) -> usize {
        self.count_severity(DiagnosticSeverity::Error)
    }

    /// Returns the number of warning-level diagnostics.
    pub fn warning_count(&self) -> usize {
        self.count_severity(DiagnosticSeverity::Warning)
    }

    /// Returns the number of info-level diagnostics.
    pub fn info_count(&self) -> usize {
        self.count_severity(DiagnosticSeverity::Info)
    }

    /// Returns an iterator over all diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().map(|(_, d)| d)
    }

    /// Returns all warnings as a vector.
    pub fn warnings(&self) -> Vec<&Diagnostic> {
        self.iter()
            .filter(|d| d.severity == DiagnosticSeverity::Warning)
            .collect()
    }

    /// Returns all errors as a vector.
    pub fn errors(&self) -> Vec<&Diagnostic> {
        self.iter()
            .filter(|d| d.severity == DiagnosticSeverity::Error)
            .collect()
    }

    /// Returns diagnostics filtered by category.
    pub fn by_category(&self, category: DiagnosticCategory) -> Vec<&Diagnostic> {
        self.iter().filter(|d| d.category == category).collect()
    }

    /// Formats a summary of all diagnostics for display.
    pub fn summary(&self) -> String {
        let mut output = String::new();

        let error_count = self.error_count();
        let warning_count = self.warning_count();
        let info_count = self.info_count();

        let _ = writeln!(
            output,
            "Diagnostics: {} error(s), {} warning(s), {} info(s)",
            error_count, warning_count, info_count
        );

        if error_count > 0 {
            output.push_str("\nErrors:\n");
            for diag in self.errors() {
                let _ = writeln!(output, "  {diag}");
            }
        }

        if warning_count > 0 {
            output.push_str("\nWarnings:\n");
            for diag in self.warnings() {
                let _ = writeln!(output, "  {diag}");
            }
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}
