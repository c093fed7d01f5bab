use thiserror::Error;

use crate::metadata::types::TypeRef;

macro_rules! fatal_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Fatal {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Fatal {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Most problems the engine runs into are not errors at all: impossible conversions, invalid
/// wrappers and missing library members are reported through
/// [`crate::metadata::diagnostics::Diagnostics`] and the pass keeps going. The variants below
/// are reserved for conditions that abort a desugaring run.
///
/// # Error Categories
///
/// ## Compilation Errors
/// - [`Error::Fatal`] - A diagnostic that must abort compilation (library builds)
/// - [`Error::VivifiedTypeEscaped`] - An internal vivified type reached the output
///
/// ## Model Errors
/// - [`Error::TypeNotFound`] - A required class definition is missing
/// - [`Error::MethodNotFound`] - A required method definition is missing
///
/// ## Configuration Errors
/// - [`Error::Specification`] - The desugared library specification is inconsistent
/// - [`Error::Json`] - The specification JSON could not be parsed
///
/// ## Internal Errors
/// - [`Error::GenerationInAssertMode`] - A read-only validator found missing synthetic state
/// - [`Error::LockError`] - Thread synchronization failure
///
/// # Examples
///
/// ```rust,no_run
/// use vivify::{Error, prelude::*};
///
/// fn run(app: &mut AppView, spec: DesugaredLibrarySpecification) -> vivify::Result<()> {
///     let mut pipeline = DesugaringPipeline::new(spec, DesugarOptions::default());
///     match pipeline.run(app) {
///         Ok(summary) => println!("{}", summary),
///         Err(Error::Fatal { message, .. }) => eprintln!("compilation aborted: {}", message),
///         Err(e) => return Err(e),
///     }
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A fatal diagnostic was raised and compilation must stop.
    ///
    /// Raised for conversions that are impossible while compiling the desugared library
    /// itself, where there is no later chance to observe the failure at runtime.
    #[error("Fatal - {file}:{line}: {message}")]
    Fatal {
        /// The message to be printed for the fatal error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A class definition which the operation depends on is not part of the application.
    #[error("Failed to find type - {0}")]
    TypeNotFound(TypeRef),

    /// A method definition which the operation depends on could not be found or resolved.
    #[error("Failed to find method - {0}")]
    MethodNotFound(String),

    /// The desugared library specification is internally inconsistent.
    #[error("Invalid desugared library specification: {0}")]
    Specification(String),

    /// The specification JSON could not be parsed.
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// A read-only validation pass found state that should have been generated earlier.
    ///
    /// This signals a programming error in the phase ordering, not a user facing problem.
    #[error("Missing synthetic state in validation mode - {0}")]
    GenerationInAssertMode(String),

    /// A vivified type is still referenced after the final type rewrite.
    #[error("Vivified type escaped into the output - {0}")]
    VivifiedTypeEscaped(String),

    /// Failed to lock target
    ///
    /// Thread synchronization error when attempting to acquire a lock.
    #[error("Failed to lock target")]
    LockError,

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
