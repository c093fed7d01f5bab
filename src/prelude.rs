//! # vivify Prelude
//!
//! The most commonly used types, for glob import:
//!
//! ```rust
//! use vivify::prelude::*;
//!
//! let consumer = TypeRef::new("java.util.function.Consumer");
//! assert_eq!(consumer.vivified().devivified(), Some(consumer));
//! ```

// ================================================================================================
// Core Error Handling
// ================================================================================================

/// The main error type for all vivify operations
pub use crate::Error;

/// The result type for all vivify operations
pub use crate::Result;

// ================================================================================================
// Class Model
// ================================================================================================

/// Type and member references
pub use crate::metadata::types::{FieldRef, MethodRef, Proto, TypeRef};

/// Definitions and the class graph
pub use crate::metadata::{
    app::AppView,
    class::{ClassDef, ClassKind, FieldDef, MethodDef},
};

/// Access flags
pub use crate::metadata::flags::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags};

/// API levels
pub use crate::metadata::apilevel::{AndroidApiLevel, ApiLevelRange};

/// The type-rewrite oracle
pub use crate::metadata::rewriter::{PrefixTypeRewriter, TypeRewriter};

/// Diagnostics
pub use crate::metadata::diagnostics::{
    ConversionDirection, Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics,
};

// ================================================================================================
// Method Bodies
// ================================================================================================

/// The register IR
pub use crate::ir::{Code, CodeBuilder, Instruction, Invoke, InvokeKind, ValueId};

// ================================================================================================
// Desugaring
// ================================================================================================

/// Specification tables
pub use crate::desugar::specification::{
    DesugaredLibrarySpecification, MultiApiLevelSpecification, SpecificationDialect,
};

/// Running the engine
pub use crate::desugar::{
    context::DesugarContext,
    events::{SynthesisEvent, SynthesisEventKind},
    options::{CompilationMode, DesugarOptions},
    pipeline::{DesugaringPipeline, DesugaringSummary},
    synthetic::SyntheticKind,
};
