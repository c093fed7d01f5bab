//! Retargeting of core library members.
//!
//! Some platform members are missing or broken on older devices and are reimplemented as
//! static methods of the desugared library (`Calendar#toInstant()` becomes
//! `DesugarCalendar#toInstant(Calendar)`). This module redirects their call sites.
//!
//! # Components
//!
//! - [`info`] - the immutable retargeting tables
//! - [`retargeter`] - the per-invoke rewrite
//! - [`helper`] - on-demand emulated dispatch interfaces and holders
//! - [`library`] - declaration of missing destinations and configuration checks
//! - [`tree_fixer`] - dispatch interfaces on application subclasses
//!
//! # Example
//!
//! ```rust,ignore
//! let info = RetargetingInfo::compute(&app, &ctx.spec);
//! let helper = RetargeterSyntheticHelper::new(&ctx, &info);
//! let retargeter = Retargeter::new(&ctx, &info, &helper);
//! retargeter.desugar(&app, &context, &mut code)?;
//! ```

pub mod helper;
pub mod info;
pub mod library;
pub mod retargeter;
pub mod tree_fixer;

pub use helper::RetargeterSyntheticHelper;
pub use info::{RetargetTarget, RetargetingInfo};
pub use library::{check_for_assumed_library_types, LibraryTypeSynthesizer};
pub use retargeter::Retargeter;
pub use tree_fixer::EmulatedDispatchTreeFixer;
