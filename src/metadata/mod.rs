//! The class model the desugaring engine works on.
//!
//! # Key Components
//!
//! - [`types`] - Type, prototype, method and field references, vivified naming
//! - [`flags`] - Access flags of classes, methods and fields
//! - [`class`] - Class, method and field definitions
//! - [`app`] - [`app::AppView`], the class graph with resolution and hierarchy queries
//! - [`rewriter`] - The type-rewrite oracle
//! - [`diagnostics`] - Thread-safe collection of reported problems
//! - [`apilevel`] - Android API levels and ranges

/// Android API levels and the ranges keying specification flags
pub mod apilevel;
/// The application class graph
pub mod app;
/// Class, method and field definitions
pub mod class;
/// Diagnostics collected while desugaring
pub mod diagnostics;
/// Access flags
pub mod flags;
/// The type-rewrite oracle
pub mod rewriter;
/// Type and member references
pub mod types;
