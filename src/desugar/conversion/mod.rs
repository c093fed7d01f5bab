//! Conversion between desugared and platform types at library boundaries.
//!
//! Application code sees the desugared library types (`j$.util.function.Consumer`), while the
//! platform expects its own. Every call into the platform whose signature mentions a rewritten
//! type gets its arguments and result converted, and every application override of a platform
//! method gets a callback accepting the platform types.
//!
//! # Components
//!
//! - [`policy`] - which invokes and overrides need conversion
//! - [`converter`] - inline and outlined conversion of call sites
//! - [`callbacks`] - vivified twins of library overrides
//! - [`wrapper`] - the `$-WRP` and `$-V-WRP` wrapper classes
//! - [`codegen`] - bodies of conversions, forwarders and wrapper members
//! - [`custom`] - hand written conversions of library builds
//! - [`validator`] - read-only checking of committed conversion state
//!
//! # Example
//!
//! ```rust,ignore
//! let wrappers = WrapperSynthesizer::new(&ctx);
//! let callbacks = CallbackRegistry::new(&ctx);
//! let converter = ApiConverter::new(&ctx, &wrappers, &callbacks, vec![&retargeter]);
//! converter.desugar(&app, &context, &mut code)?;
//! callbacks.materialize(&wrappers)?;
//! wrappers.synthesize(&app);
//! ```

pub mod callbacks;
pub mod codegen;
pub mod converter;
pub mod custom;
pub mod policy;
pub mod validator;
pub mod wrapper;

pub use callbacks::CallbackRegistry;
pub use codegen::{ForwardingCall, ForwardingReceiver};
pub use converter::ApiConverter;
pub use custom::CustomConversionRewriter;
pub use policy::{ApiConversionQuery, ConversionPolicy};
pub use validator::ApiConversionValidator;
pub use wrapper::{Direction, WrapperSynthesizer};
