//! Hierarchy fix-up for emulated dispatch.
//!
//! A dispatch holder only honors an application override if the overriding class implements
//! the dispatch interface. While compiling an application, every program class directly
//! extending a library class that inherits from an emulated-dispatch holder `M` receives the
//! interface, plus a forwarding method to the configured destination when it does not declare
//! the member itself. Program subclasses of such a class inherit both.
//!
//! While compiling the desugared library itself, the pairs of all emulated-dispatch members
//! are synthesized instead.

use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    desugar::{
        context::DesugarContext,
        events::SynthesisEvent,
        retarget::{helper::RetargeterSyntheticHelper, info::RetargetingInfo},
    },
    ir::{CodeBuilder, InvokeKind},
    metadata::{
        app::AppView,
        class::{ClassDef, MethodDef},
        diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity},
        flags::MethodAccessFlags,
        types::{MethodRef, TypeRef},
    },
    Error, Result,
};

/// Adds dispatch interfaces and forwarding methods to emulated-dispatch implementors.
pub struct EmulatedDispatchTreeFixer<'a> {
    ctx: &'a DesugarContext,
    info: &'a RetargetingInfo,
    helper: &'a RetargeterSyntheticHelper<'a>,
}

impl<'a> EmulatedDispatchTreeFixer<'a> {
    /// Creates a tree fixer.
    #[must_use]
    pub fn new(
        ctx: &'a DesugarContext,
        info: &'a RetargetingInfo,
        helper: &'a RetargeterSyntheticHelper<'a>,
    ) -> Self {
        EmulatedDispatchTreeFixer { ctx, info, helper }
    }

    /// Queues the fix-ups for `app`.
    ///
    /// Returns the number of program classes that received a dispatch interface.
    ///
    /// # Errors
    ///
    /// Propagates failures to synthesize a dispatch pair.
    pub fn fix_app(&self, app: &AppView) -> Result<usize> {
        if self.ctx.is_library_compilation() {
            for method in self.info.emulated_dispatch_methods() {
                self.helper.ensure_emulated_holder_dispatch_method(method)?;
            }
            return Ok(0);
        }

        let mut by_holder: BTreeMap<&TypeRef, Vec<&MethodRef>> = BTreeMap::new();
        for method in self.info.emulated_dispatch_methods() {
            by_holder.entry(&method.holder).or_default().push(method);
        }
        if by_holder.is_empty() {
            return Ok(0);
        }

        let mut fixed = 0;
        for class in app.program_classes() {
            let Some(super_class) = class.super_type.as_ref().and_then(|s| app.definition_for(s))
            else {
                continue;
            };
            if !super_class.is_library() || super_class.ty.is_object() {
                continue;
            }
            let mut touched = false;
            for (holder, methods) in &by_holder {
                for method in methods {
                    if self.inherits(app, class, super_class, holder, method) {
                        self.add_interface_and_forwarding_method(class, method)?;
                        touched = true;
                    }
                }
            }
            if touched {
                fixed += 1;
            }
        }
        debug!(classes = fixed, "fixed emulated dispatch hierarchy");
        Ok(fixed)
    }

    /// True if the library superclass chain starting at `super_class` reaches `holder` without
    /// an intermediate library override of `method`.
    fn inherits(
        &self,
        app: &AppView,
        class: &ClassDef,
        super_class: &ClassDef,
        holder: &TypeRef,
        method: &MethodRef,
    ) -> bool {
        let mut current = super_class;
        loop {
            if &current.ty == holder {
                return true;
            }
            if current.ty.is_object() {
                return false;
            }
            if current.lookup_virtual_method(method).is_some() {
                self.warn(
                    format!(
                        "Cannot emulate virtual dispatch on {method}: library class {} \
                         overrides it.",
                        current.ty
                    ),
                    &class.ty,
                );
                return false;
            }
            let Some(next_type) = current.super_type.as_ref() else {
                return false;
            };
            match app.definition_for(next_type) {
                Some(next) if next.is_library() => current = next,
                Some(next) if next.is_program() => return false,
                found => {
                    let reason = if found.is_some() {
                        "a classpath class"
                    } else {
                        "missing"
                    };
                    self.warn(
                        format!(
                            "Cannot emulate virtual dispatch on {method} for {}: superclass \
                             {next_type} of library class {} is {reason}.",
                            class.ty, current.ty
                        ),
                        &class.ty,
                    );
                    return false;
                }
            }
        }
    }

    fn warn(&self, message: String, subject: &TypeRef) {
        self.ctx.diagnostics.push(
            Diagnostic::new(
                DiagnosticSeverity::Warning,
                DiagnosticCategory::Retarget,
                message,
            )
            .with_subject(subject.to_string()),
        );
    }

    fn add_interface_and_forwarding_method(
        &self,
        class: &ClassDef,
        method: &MethodRef,
    ) -> Result<()> {
        let interface = self.helper.ensure_emulated_interface_dispatch_method(method);
        self.ctx.queue.push(SynthesisEvent::ExtraInterface {
            holder: class.ty.clone(),
            interface: interface.holder.clone(),
        });
        if class.lookup_virtual_method(method).is_some() {
            return Ok(());
        }

        let target = self
            .info
            .configured_target(method)
            .ok_or_else(|| Error::MethodNotFound(method.to_string()))?;
        let reference = method.with_holder(class.ty.clone());

        let mut builder = CodeBuilder::new();
        let receiver = builder.argument(class.ty.clone());
        let mut args = vec![receiver];
        args.extend(builder.arguments(method.proto.parameters.iter()));
        let result = builder.invoke(InvokeKind::Static, target.clone(), args, false);
        builder.return_value(result);

        self.ctx.queue.push(SynthesisEvent::ForwardingMethod {
            holder: class.ty.clone(),
            method: MethodDef::new(
                reference,
                MethodAccessFlags::PUBLIC | MethodAccessFlags::SYNTHETIC,
            )
            .with_code(builder.build()),
        });
        Ok(())
    }
}
