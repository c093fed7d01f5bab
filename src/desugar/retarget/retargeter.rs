//! Rewriting of invokes to retargeted library members.
//!
//! Each retargeted invoke is replaced in place by an `invoke-static` with the same arguments
//! and result value: the receiver of an instance call becomes the first argument of the static
//! destination.
//!
//! Resolution order for one invoke:
//!
//! 1. the invoked reference, verbatim, against the backport and retarget tables
//! 2. if a non-final holder declares a member of that name and prototype, the resolved
//!    declaration, against the same tables
//! 3. for `invoke-super` of such a member, a non-final super target is redirected to its
//!    configured destination directly; going through the dispatch holder would dispatch back
//!    into the caller
//!
//! Emulated dispatch members resolve to their dispatch holder, synthesized on demand.

use tracing::trace;

use crate::{
    desugar::{
        collaborators::InvokeDesugaring,
        context::DesugarContext,
        retarget::{
            helper::RetargeterSyntheticHelper,
            info::{RetargetTarget, RetargetingInfo},
        },
    },
    ir::{Code, Instruction, Invoke},
    metadata::{app::AppView, types::MethodRef},
    Result,
};

/// Rewrites invokes of retargeted library members.
pub struct Retargeter<'a> {
    ctx: &'a DesugarContext,
    info: &'a RetargetingInfo,
    helper: &'a RetargeterSyntheticHelper<'a>,
}

impl<'a> Retargeter<'a> {
    /// Creates a retargeter over precomputed tables.
    #[must_use]
    pub fn new(
        ctx: &'a DesugarContext,
        info: &'a RetargetingInfo,
        helper: &'a RetargeterSyntheticHelper<'a>,
    ) -> Self {
        Retargeter { ctx, info, helper }
    }

    fn skips_context(&self, context: &MethodRef) -> bool {
        self.ctx.spec.dont_retarget.contains(&context.holder)
    }

    fn find(&self, app: &AppView, invoke: &Invoke) -> Option<RetargetTarget> {
        if let Some(found) = self.info.lookup(&invoke.method) {
            return Some(found);
        }
        if !self.info.matches_non_final_holder_rewrite(&invoke.method) {
            return None;
        }
        let resolved = app.resolve_method(&invoke.method)?;
        self.info.lookup(resolved.reference())
    }

    /// The static method `invoke` must call instead, `None` if it is not retargeted.
    ///
    /// # Errors
    ///
    /// Propagates failures to synthesize a dispatch holder.
    pub fn retargeted_method(
        &self,
        app: &AppView,
        invoke: &Invoke,
        context: &MethodRef,
    ) -> Result<Option<MethodRef>> {
        if self.info.is_empty() || self.skips_context(context) {
            return Ok(None);
        }
        let Some(target) = self.find(app, invoke) else {
            return Ok(None);
        };

        if invoke.is_super() && self.info.matches_non_final_holder_rewrite(&invoke.method) {
            if let Some(super_target) = app.lookup_super_target(&invoke.method, &context.holder) {
                if !super_target.method.is_final() {
                    return Ok(self
                        .info
                        .configured_target(super_target.reference())
                        .cloned());
                }
            }
        }

        match target {
            RetargetTarget::Static(method) => Ok(Some(method)),
            RetargetTarget::EmulatedDispatch(method) => self
                .helper
                .ensure_emulated_holder_dispatch_method(&method)
                .map(Some),
        }
    }

    /// Rewrites every retargeted invoke of `code`, the body of `context`.
    ///
    /// Returns the number of rewritten invokes.
    ///
    /// # Errors
    ///
    /// Propagates failures to synthesize a dispatch holder.
    pub fn desugar(&self, app: &AppView, context: &MethodRef, code: &mut Code) -> Result<usize> {
        if self.info.is_empty() || self.skips_context(context) {
            return Ok(0);
        }
        let mut rewritten = 0;
        for block in &mut code.blocks {
            for insn in &mut block.instructions {
                let Some(invoke) = insn.as_invoke() else {
                    continue;
                };
                let Some(target) = self.retargeted_method(app, invoke, context)? else {
                    continue;
                };
                trace!(from = %invoke.method, to = %target, "retargeting invoke");
                let replacement = Invoke::new_static(target, invoke.args.clone(), invoke.dest);
                *insn = Instruction::Invoke(replacement);
                rewritten += 1;
            }
        }
        Ok(rewritten)
    }
}

impl InvokeDesugaring for Retargeter<'_> {
    fn name(&self) -> &'static str {
        "retargeter"
    }

    fn needs_desugaring(&self, app: &AppView, invoke: &Invoke, context: &MethodRef) -> bool {
        !self.info.is_empty() && !self.skips_context(context) && self.find(app, invoke).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        desugar::{
            events::SynthesisEventKind, options::DesugarOptions,
            specification::DesugaredLibrarySpecification,
        },
        ir::InvokeKind,
        metadata::{
            class::MethodDef,
            flags::MethodAccessFlags,
            types::TypeRef,
        },
        test::factories::{calling_body, mref, platform, program_class, specification},
    };

    fn calendar_spec() -> DesugaredLibrarySpecification {
        specification()
            .with_retarget("toInstant", "java.util.Calendar", "java.util.DesugarCalendar")
            .with_retarget(
                "getTimeZone",
                "java.util.TimeZone",
                "java.util.DesugarTimeZone",
            )
    }

    fn to_instant(holder: &str) -> MethodRef {
        mref(holder, "toInstant", "java.time.Instant", &[])
    }

    fn first_invoke(code: &Code) -> &Invoke {
        code.invokes().next().expect("invoke")
    }

    #[test]
    fn virtual_call_goes_through_dispatch_holder() -> Result<()> {
        let app = platform();
        let ctx = DesugarContext::new(calendar_spec(), DesugarOptions::default());
        let info = RetargetingInfo::compute(&app, &ctx.spec);
        let helper = RetargeterSyntheticHelper::new(&ctx, &info);
        let retargeter = Retargeter::new(&ctx, &info, &helper);

        let mut code = calling_body(
            InvokeKind::Virtual,
            &to_instant("java.util.Calendar"),
            true,
        );
        let dest = first_invoke(&code).dest;
        let context = mref("app.Main", "run", "void", &[]);
        assert_eq!(retargeter.desugar(&app, &context, &mut code)?, 1);

        let invoke = first_invoke(&code);
        assert!(invoke.is_static());
        assert!(invoke.method.holder.name().ends_with("$dispatchHolder"));
        assert_ne!(invoke.method.holder.name(), "java.util.DesugarCalendar");
        assert_eq!(invoke.args.len(), 1);
        assert_eq!(invoke.dest, dest);
        assert_eq!(
            ctx.queue
                .count(SynthesisEventKind::RetargetDispatchClasspathClass),
            2
        );
        Ok(())
    }

    #[test]
    fn static_call_is_redirected_directly() -> Result<()> {
        let app = platform();
        let ctx = DesugarContext::new(calendar_spec(), DesugarOptions::default());
        let info = RetargetingInfo::compute(&app, &ctx.spec);
        let helper = RetargeterSyntheticHelper::new(&ctx, &info);
        let retargeter = Retargeter::new(&ctx, &info, &helper);

        let get = mref(
            "java.util.TimeZone",
            "getTimeZone",
            "java.util.TimeZone",
            &["java.time.ZoneId"],
        );
        let mut code = calling_body(InvokeKind::Static, &get, true);
        retargeter.desugar(&app, &mref("app.Main", "run", "void", &[]), &mut code)?;
        assert_eq!(
            first_invoke(&code).method,
            get.with_holder(TypeRef::new("java.util.DesugarTimeZone"))
        );
        assert!(ctx.queue.is_empty());
        Ok(())
    }

    #[test]
    fn subclass_receiver_is_resolved() -> Result<()> {
        let mut app = platform();
        app.add_class(program_class("app.MyCalendar", "java.util.Calendar"));
        let ctx = DesugarContext::new(calendar_spec(), DesugarOptions::default());
        let info = RetargetingInfo::compute(&app, &ctx.spec);
        let helper = RetargeterSyntheticHelper::new(&ctx, &info);
        let retargeter = Retargeter::new(&ctx, &info, &helper);

        let invoke = first_invoke(&calling_body(
            InvokeKind::Virtual,
            &to_instant("app.MyCalendar"),
            true,
        ))
        .clone();
        let context = mref("app.Main", "run", "void", &[]);
        assert!(retargeter.needs_desugaring(&app, &invoke, &context));
        let target = retargeter.retargeted_method(&app, &invoke, &context)?;
        assert!(target.is_some_and(|m| m.holder.name().ends_with("$dispatchHolder")));
        Ok(())
    }

    #[test]
    fn super_call_targets_the_configured_destination() -> Result<()> {
        let mut app = platform();
        let mut calendar = program_class("app.MyCalendar", "java.util.Calendar");
        calendar.add_method(MethodDef::new(
            to_instant("app.MyCalendar"),
            MethodAccessFlags::PUBLIC,
        ));
        app.add_class(calendar);
        let ctx = DesugarContext::new(calendar_spec(), DesugarOptions::default());
        let info = RetargetingInfo::compute(&app, &ctx.spec);
        let helper = RetargeterSyntheticHelper::new(&ctx, &info);
        let retargeter = Retargeter::new(&ctx, &info, &helper);

        let mut code = calling_body(InvokeKind::Super, &to_instant("java.util.Calendar"), true);
        let context = to_instant("app.MyCalendar");
        retargeter.desugar(&app, &context, &mut code)?;
        assert_eq!(
            first_invoke(&code).method,
            mref(
                "java.util.DesugarCalendar",
                "toInstant",
                "java.time.Instant",
                &["java.util.Calendar"]
            )
        );
        assert!(ctx.queue.is_empty());
        Ok(())
    }

    #[test]
    fn dont_retarget_contexts_are_skipped() -> Result<()> {
        let app = platform();
        let mut spec = calendar_spec();
        spec.dont_retarget.insert(TypeRef::new("app.Legacy"));
        let ctx = DesugarContext::new(spec, DesugarOptions::default());
        let info = RetargetingInfo::compute(&app, &ctx.spec);
        let helper = RetargeterSyntheticHelper::new(&ctx, &info);
        let retargeter = Retargeter::new(&ctx, &info, &helper);

        let original = calling_body(InvokeKind::Virtual, &to_instant("java.util.Calendar"), true);
        let mut code = original.clone();
        let context = mref("app.Legacy", "run", "void", &[]);
        assert_eq!(retargeter.desugar(&app, &context, &mut code)?, 0);
        assert_eq!(code, original);
        assert!(!retargeter.needs_desugaring(&app, first_invoke(&code), &context));
        Ok(())
    }
}
