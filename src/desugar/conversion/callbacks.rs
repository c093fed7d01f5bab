//! Vivified twins of application overrides of library methods.
//!
//! When the platform calls `ArrayList#forEach(Consumer)` on an application subclass, it passes
//! a platform `Consumer`, while the application override expects the desugared one. The
//! registry records such overrides during the parallel sweep and later materializes, per
//! override, a callback with the vivified signature that converts its arguments and delegates
//! to the original method.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Mutex,
};

use tracing::debug;

use crate::{
    desugar::{
        context::DesugarContext,
        conversion::{
            codegen::{ForwardingCall, ForwardingReceiver},
            wrapper::{Direction, WrapperSynthesizer},
        },
        events::SynthesisEvent,
    },
    ir::InvokeKind,
    metadata::{
        class::{ClassDef, MethodDef},
        diagnostics::{ConversionDirection, Diagnostic, DiagnosticCategory, DiagnosticSeverity},
        flags::MethodAccessFlags,
        types::{MethodRef, TypeRef},
    },
    Error, Result,
};

/// An override waiting for its callback.
struct PendingCallback {
    holder: TypeRef,
    interface: bool,
    method: MethodDef,
}

#[derive(Default)]
struct CallbackState {
    registered: BTreeMap<TypeRef, BTreeSet<MethodRef>>,
    pending: Vec<PendingCallback>,
}

/// Collects overrides needing a callback and builds the callbacks.
pub struct CallbackRegistry<'a> {
    ctx: &'a DesugarContext,
    state: Mutex<CallbackState>,
}

impl<'a> CallbackRegistry<'a> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(ctx: &'a DesugarContext) -> Self {
        CallbackRegistry {
            ctx,
            state: Mutex::new(CallbackState::default()),
        }
    }

    /// Records `method` of `holder`. Returns false if it was already registered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockError`] if another thread panicked while registering.
    pub fn register(&self, holder: &ClassDef, method: &MethodDef) -> Result<bool> {
        let mut state = self.state.lock().map_err(|_| Error::LockError)?;
        let added = state
            .registered
            .entry(holder.ty.clone())
            .or_default()
            .insert(method.reference.clone());
        if added {
            state.pending.push(PendingCallback {
                holder: holder.ty.clone(),
                interface: holder.is_interface(),
                method: method.clone(),
            });
        }
        Ok(added)
    }

    /// Number of distinct overrides registered so far.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockError`] if the registry is poisoned.
    pub fn registered_count(&self) -> Result<usize> {
        let state = self.state.lock().map_err(|_| Error::LockError)?;
        Ok(state.registered.values().map(BTreeSet::len).sum())
    }

    /// Builds the callback of every pending override and queues it.
    ///
    /// Conversion methods are requested from `wrappers`, so this must run before wrappers are
    /// synthesized. Returns the number of callbacks queued.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockError`] if the registry is poisoned.
    pub fn materialize(&self, wrappers: &WrapperSynthesizer<'_>) -> Result<usize> {
        let mut pending = {
            let mut state = self.state.lock().map_err(|_| Error::LockError)?;
            std::mem::take(&mut state.pending)
        };
        pending.sort_by(|a, b| {
            (&a.holder, &a.method.reference).cmp(&(&b.holder, &b.method.reference))
        });

        let count = pending.len();
        for callback in pending {
            let method = self.callback_method(wrappers, &callback);
            debug!(holder = %callback.holder, callback = %method.reference, "callback");
            self.ctx.queue.push(SynthesisEvent::CallbackMethod {
                holder: callback.holder,
                method,
            });
        }
        Ok(count)
    }

    /// `holder#m(vivified)` converting its arguments and calling `holder#m`.
    fn callback_method(
        &self,
        wrappers: &WrapperSynthesizer<'_>,
        callback: &PendingCallback,
    ) -> MethodDef {
        let original = &callback.method.reference;
        let installed = self
            .ctx
            .vivified_method(original, callback.holder.clone());
        let conversions = original
            .proto
            .parameters
            .iter()
            .map(|p| self.slot_conversion(wrappers, original, p, Direction::FromVivified))
            .collect();
        let return_conversion = self.slot_conversion(
            wrappers,
            original,
            &original.proto.return_type,
            Direction::ToVivified,
        );
        let kind = if callback.interface {
            InvokeKind::Interface
        } else {
            InvokeKind::Virtual
        };
        let call = ForwardingCall {
            receiver: ForwardingReceiver::Argument(callback.holder.clone()),
            parameters: installed.proto.parameters.to_vec(),
            conversions,
            kind,
            target: original.clone(),
            interface: callback.interface,
            return_conversion,
        };
        let flags = (callback.method.flags
            - MethodAccessFlags::ABSTRACT
            - MethodAccessFlags::BRIDGE)
            | MethodAccessFlags::SYNTHETIC;
        let mut method = MethodDef::new(installed, flags).with_code(call.conversion_body());
        method.api_level = callback.method.api_level;
        method
    }

    fn slot_conversion(
        &self,
        wrappers: &WrapperSynthesizer<'_>,
        method: &MethodRef,
        slot: &TypeRef,
        direction: Direction,
    ) -> Option<MethodRef> {
        if !self.ctx.is_rewritten(slot) {
            return None;
        }
        if wrappers.can_convert(slot) {
            return Some(match direction {
                Direction::ToVivified => wrappers.to_vivified(slot),
                Direction::FromVivified => wrappers.from_vivified(slot),
            });
        }
        let role = if direction == Direction::ToVivified {
            ConversionDirection::Return
        } else {
            ConversionDirection::Parameter
        };
        self.ctx.diagnostics.push(
            Diagnostic::new(
                DiagnosticSeverity::Info,
                DiagnosticCategory::Callback,
                format!(
                    "Callback {} may not work correctly at runtime (Cannot convert type {slot}).",
                    method.short_name()
                ),
            )
            .with_subject(method.to_string())
            .with_direction(role),
        );
        None
    }
}
