//! Configuration for the desugaring pipeline.
//!
//! Library-build specific settings (library compilation, synthesized package prefix, callback
//! policy) are part of the selected
//! [`crate::desugar::specification::DesugaredLibrarySpecification`]; this module only holds the
//! settings of the compilation itself.

use crate::metadata::apilevel::AndroidApiLevel;

/// How call sites needing conversion are rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
pub enum CompilationMode {
    /// The whole program is visible: conversions are inserted inline.
    #[default]
    WholeProgram,
    /// Classes are compiled one at a time: conversions are outlined into synthetic methods.
    PerClass,
}

/// Configuration for the desugaring pipeline.
#[derive(Debug, Clone)]
pub struct DesugarOptions {
    /// Inline or outlined conversion (default: whole program).
    pub compilation_mode: CompilationMode,

    /// Minimum API level the output runs on (default: 21).
    pub min_api_level: AndroidApiLevel,

    /// Report every converted invoke and registered callback (default: false).
    pub track_desugared_api_conversions: bool,

    /// Rename `T -> T'` and `V(T) -> T` in all non-library classes once synthesis is committed
    /// (default: true).
    ///
    /// Disable to inspect the engine-internal vivified form of the output.
    pub apply_type_rewrites: bool,

    /// Process method bodies on the rayon thread pool (default: true).
    pub parallel: bool,

    /// Re-check the committed output with the read-only conversion validator before the
    /// output rename (default: false).
    pub validate_synthesis: bool,
}

impl Default for DesugarOptions {
    fn default() -> Self {
        Self {
            compilation_mode: CompilationMode::WholeProgram,
            min_api_level: AndroidApiLevel::L,
            track_desugared_api_conversions: false,
            apply_type_rewrites: true,
            parallel: true,
            validate_synthesis: false,
        }
    }
}

impl DesugarOptions {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration for per-class compilation at `min_api_level`.
    #[must_use]
    pub fn per_class(min_api_level: AndroidApiLevel) -> Self {
        Self {
            compilation_mode: CompilationMode::PerClass,
            min_api_level,
            ..Self::default()
        }
    }

    /// Sets the minimum API level.
    #[must_use]
    pub fn with_min_api_level(mut self, level: AndroidApiLevel) -> Self {
        self.min_api_level = level;
        self
    }

    /// Enables conversion tracking.
    #[must_use]
    pub fn with_tracking(mut self) -> Self {
        self.track_desugared_api_conversions = true;
        self
    }

    /// Keeps the vivified form of the output.
    #[must_use]
    pub fn without_type_rewrites(mut self) -> Self {
        self.apply_type_rewrites = false;
        self
    }

    /// Processes methods sequentially.
    #[must_use]
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Enables the post-synthesis validation.
    #[must_use]
    pub fn with_validation(mut self) -> Self {
        self.validate_synthesis = true;
        self
    }

    /// True in whole-program mode.
    #[must_use]
    pub fn is_whole_program(&self) -> bool {
        self.compilation_mode == CompilationMode::WholeProgram
    }
}
