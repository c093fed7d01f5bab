//! Responsibility boundaries between invoke rewriters.
//!
//! Several desugarings may claim the same invoke. The API converter asks every other
//! desugaring first and leaves an invoke alone as soon as one of them claims it.

use std::collections::BTreeMap;

use crate::{
    ir::Invoke,
    metadata::{
        app::AppView,
        types::{MethodRef, TypeRef},
    },
};

/// An invoke rewriter that can tell whether it handles a call site.
pub trait InvokeDesugaring: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// True if this desugaring rewrites `invoke`, found in the body of `context`.
    fn needs_desugaring(&self, app: &AppView, invoke: &Invoke, context: &MethodRef) -> bool;
}

/// Claims invokes of default methods of emulated interfaces.
///
/// Those calls are dispatched through the emulated interface machinery of the desugared
/// library, which already operates on desugared types.
pub struct EmulatedInterfaceInvokes<'a> {
    emulated: &'a BTreeMap<TypeRef, TypeRef>,
}

impl<'a> EmulatedInterfaceInvokes<'a> {
    /// Creates the collaborator for the `interface -> rewritten interface` table.
    #[must_use]
    pub fn new(emulated: &'a BTreeMap<TypeRef, TypeRef>) -> Self {
        EmulatedInterfaceInvokes { emulated }
    }
}

impl InvokeDesugaring for EmulatedInterfaceInvokes<'_> {
    fn name(&self) -> &'static str {
        "emulated-interface"
    }

    fn needs_desugaring(&self, app: &AppView, invoke: &Invoke, _context: &MethodRef) -> bool {
        if self.emulated.is_empty() || invoke.is_static() {
            return false;
        }
        let Some(resolved) = app.resolve_method(&invoke.method) else {
            return false;
        };
        self.emulated.contains_key(&resolved.holder.ty)
            && resolved.holder.is_interface()
            && !resolved.method.flags.is_abstract()
            && !resolved.method.is_static()
    }
}
