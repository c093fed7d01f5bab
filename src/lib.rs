// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0
#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # vivify
//!
//! Interop between code compiled against a desugared Java library and the Android platform.
//!
//! Desugared libraries backport newer platform APIs (`java.time`, `java.util.function`,
//! `java.util.stream`, ...) by shipping them under a renamed package such as `j$.`. Code using
//! the backport can no longer hand its objects to the platform, nor receive platform objects,
//! without help. `vivify` rewrites a class graph accordingly. It:
//!
//! - **Converts** arguments and results of every platform call whose signature mentions a
//!   renamed type, using wrapper classes or hand written conversions
//! - **Adds callbacks** to application overrides of platform methods, so the platform can call
//!   them with its own types
//! - **Retargets** platform members that are missing or broken on old devices to backports,
//!   emulating virtual dispatch where application subclasses may override them
//! - **Amends** the compilation library with declarations it lacks
//!
//! ## Quick Start
//!
//! ```rust
//! use vivify::prelude::*;
//!
//! let json = r#"{
//!     "configuration_format_version": 100,
//!     "identifier": "example:desugar_jdk_libs_configuration:1.0.0",
//!     "required_compilation_api_level": 30,
//!     "synthesized_library_classes_package_prefix": "j$.",
//!     "common_flags": [{
//!         "api_level_below_or_equal": 23,
//!         "rewrite_prefix": { "java.util.function.": "j$.util.function." },
//!         "wrapper_conversion": ["java.util.function.Consumer"]
//!     }],
//!     "library_flags": [],
//!     "program_flags": []
//! }"#;
//!
//! let mut app = AppView::new();
//! let mut pipeline = DesugaringPipeline::from_json(json, DesugarOptions::default(), false)?;
//! let summary = pipeline.run(&mut app)?;
//! assert_eq!(summary.methods, 0);
//! # Ok::<(), vivify::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata`] - The class model: types, members, the [`metadata::app::AppView`] graph, the
//!   type-rewrite oracle and diagnostics
//! - [`ir`] - The register IR of method bodies
//! - [`desugar`] - Specification tables, conversion, retargeting and the pipeline
//! - [`prelude`] - Convenient re-exports
//!
//! ## Error Handling
//!
//! Recoverable problems (a type that cannot be converted, a final method a wrapper cannot
//! override, a missing library class) are reported as diagnostics and the run completes. Only
//! conditions that must abort compilation are returned as [`Error`]:
//!
//! ```rust,no_run
//! use vivify::{desugar::DesugaringPipeline, metadata::app::AppView, Error};
//!
//! # fn run(pipeline: &mut DesugaringPipeline, app: &mut AppView) {
//! match pipeline.run(app) {
//!     Ok(summary) => println!("{summary}"),
//!     Err(Error::Fatal { message, .. }) => eprintln!("compilation aborted: {message}"),
//!     Err(e) => eprintln!("desugaring failed: {e}"),
//! }
//! # }
//! ```
//!
//! ## Logging
//!
//! The crate emits `tracing` events and spans and never installs a subscriber.

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use vivify::prelude::*;
///
/// let options = DesugarOptions::default().with_tracking();
/// assert!(options.is_whole_program());
/// ```
pub mod prelude;

pub mod desugar;
pub mod ir;
pub mod metadata;

/// `vivify` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `vivify` Error type
///
/// The error type of all fallible operations in this crate.
pub use error::Error;

pub use desugar::{DesugarOptions, DesugaringPipeline, DesugaringSummary};
pub use metadata::app::AppView;
