//! Desugared library interop.
//!
//! A desugared library backports newer platform APIs (`java.time`, `java.util.function`,
//! `java.util.stream`) into a renamed package shipped with the application. This module makes
//! code compiled against the renamed types interoperate with the platform:
//!
//! - calls into the platform convert desugared arguments and results ([`conversion`])
//! - application overrides of platform methods receive callbacks taking platform types
//! - broken or missing platform members are redirected to backports ([`retarget`])
//! - library declarations missing from the compilation jar are added ([`amender`])
//! - once everything is synthesized, the output is renamed ([`rewrite`])
//!
//! [`pipeline::DesugaringPipeline`] runs all of it over an [`crate::metadata::app::AppView`].
//!
//! # Type convention
//!
//! Inside the engine a rewritten type `T` already denotes the desugared type `T'`, and the
//! platform type is written as its vivified mirror `V(T)` (`$-vivified-$.T`). The final rename
//! maps `T -> T'` and `V(T) -> T` simultaneously.
//!
//! # Concurrency
//!
//! Method bodies are processed in parallel against a shared [`context::DesugarContext`].
//! Nothing is attached to the app from a worker: every synthesized class or method becomes a
//! [`events::SynthesisEvent`] and is committed in one deterministic pass afterwards.

pub mod amender;
pub mod collaborators;
pub mod context;
pub mod conversion;
pub mod events;
pub mod options;
pub mod pipeline;
pub mod retarget;
pub mod rewrite;
pub mod specification;
pub mod synthetic;

pub use amender::LibraryAmender;
pub use context::DesugarContext;
pub use options::{CompilationMode, DesugarOptions};
pub use pipeline::{DesugaringPipeline, DesugaringSummary};
pub use specification::{DesugaredLibrarySpecification, MultiApiLevelSpecification};
