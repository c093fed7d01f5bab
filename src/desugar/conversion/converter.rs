//! Conversion of library call sites.
//!
//! A call such as `list.forEach(consumer)` in the application hands a desugared `Consumer` to
//! a platform method expecting the platform type. [`ApiConverter`] rewrites it to call the
//! vivified signature instead, converting every rewritten argument on the way in and the result
//! on the way out:
//!
//! ```text
//! v1 = invoke-static Consumer$-WRP#convert(v0)
//! invoke-virtual ArrayList#forEach($-vivified-$.Consumer)(list, v1)
//! ```
//!
//! In whole-program mode the conversions are inserted in place. Per-class compilation outlines
//! them into a synthetic static method so that the call site stays a single instruction; calls
//! of constructors, of `never_outline_api` members and of non-public members stay inline.
//!
//! The converter also registers callbacks for the application overrides it is shown, see
//! [`crate::desugar::conversion::CallbackRegistry`].

use dashmap::{DashMap, DashSet};
use tracing::{debug, trace};

use crate::{
    desugar::{
        collaborators::InvokeDesugaring,
        context::DesugarContext,
        conversion::{
            callbacks::CallbackRegistry,
            codegen::{ForwardingCall, ForwardingReceiver},
            policy::{ApiConversionQuery, ConversionPolicy},
            wrapper::WrapperSynthesizer,
        },
        events::SynthesisEvent,
        synthetic::{outline_type, super_outline_name, SyntheticKind, OUTLINE_METHOD_NAME},
    },
    ir::{Code, Instruction, Invoke},
    metadata::{
        app::AppView,
        class::{ClassDef, ClassKind, MethodDef},
        diagnostics::{ConversionDirection, Diagnostic, DiagnosticCategory, DiagnosticSeverity},
        flags::{ClassAccessFlags, MethodAccessFlags},
        rewriter::TypeRewriter,
        types::{MethodRef, Proto, TypeRef},
    },
    Result,
};

/// How one converted call is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emission {
    Inline,
    Outline,
    SuperOutline,
}

/// The conversions of one invoked method.
struct ConversionPlan {
    /// The invoked method with every convertible slot vivified
    target: MethodRef,
    /// `T -> V(T)` per parameter, `None` for slots passed through
    parameters: Vec<Option<MethodRef>>,
    /// The original return type, if it is converted back
    result: Option<TypeRef>,
}

/// Rewrites library call sites and registers callbacks.
pub struct ApiConverter<'a> {
    policy: ConversionPolicy<'a>,
    wrappers: &'a WrapperSynthesizer<'a>,
    callbacks: &'a CallbackRegistry<'a>,
    tracked: DashSet<MethodRef>,
    tracked_callbacks: DashSet<MethodRef>,
    outline_counters: DashMap<MethodRef, usize>,
    super_outlines: DashSet<(TypeRef, MethodRef)>,
}

impl<'a> ApiConverter<'a> {
    /// Creates a converter. Invokes claimed by one of `collaborators` are left alone.
    #[must_use]
    pub fn new(
        ctx: &'a DesugarContext,
        wrappers: &'a WrapperSynthesizer<'a>,
        callbacks: &'a CallbackRegistry<'a>,
        collaborators: Vec<&'a dyn InvokeDesugaring>,
    ) -> Self {
        ApiConverter {
            policy: ConversionPolicy::new(ctx, collaborators),
            wrappers,
            callbacks,
            tracked: DashSet::new(),
            tracked_callbacks: DashSet::new(),
            outline_counters: DashMap::new(),
            super_outlines: DashSet::new(),
        }
    }

    fn ctx(&self) -> &'a DesugarContext {
        self.policy.ctx()
    }

    fn tracking(&self) -> bool {
        self.ctx().options.track_desugared_api_conversions
    }

    /// Registers a callback for `method` of `holder` if the platform may call it with platform
    /// types. Returns true if a new callback was registered.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if the callback registry is poisoned.
    pub fn register_callback_if_required(
        &self,
        app: &AppView,
        holder: &ClassDef,
        method: &MethodDef,
    ) -> Result<bool> {
        if !self.should_register_callback(app, holder, method) {
            return Ok(false);
        }
        if self.tracking() {
            self.tracked_callbacks.insert(method.reference.clone());
        }
        self.callbacks.register(holder, method)
    }

    /// Converts every library call of `code`, the body of `context`.
    ///
    /// Returns the number of converted invokes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Fatal`] for an impossible conversion while compiling the
    /// desugared library.
    pub fn desugar(&self, app: &AppView, context: &MethodRef, code: &mut Code) -> Result<usize> {
        let mut converted = 0;
        let mut block = 0;
        while block < code.blocks.len() {
            let mut index = 0;
            while index < code.blocks[block].instructions.len() {
                let candidate = code.blocks[block].instructions[index]
                    .as_invoke()
                    .filter(|invoke| self.needs_desugaring(app, invoke, context))
                    .cloned();
                if let Some(invoke) = candidate {
                    if self.tracking() {
                        self.tracked.insert(invoke.method.clone());
                    }
                    match self.emission(app, &invoke, context) {
                        Emission::Inline => self.convert_inline(code, block, index, &invoke)?,
                        Emission::Outline => {
                            let call = self.outline(app, &invoke, context)?;
                            code.blocks[block].instructions[index] = call;
                        }
                        Emission::SuperOutline => {
                            let call = self.super_outline(&invoke, context)?;
                            code.blocks[block].instructions[index] = call;
                        }
                    }
                    converted += 1;
                }
                index += 1;
            }
            block += 1;
        }
        if converted > 0 {
            debug!(method = %context, converted, "converted library calls");
        }
        Ok(converted)
    }

    /// Reports the tracked conversions and callbacks as warnings, if tracking is enabled.
    pub fn report_tracked(&self) {
        if !self.tracking() {
            return;
        }
        report(self.ctx(), &self.tracked, "");
        report(self.ctx(), &self.tracked_callbacks, "callback ");
    }

    fn emission(&self, app: &AppView, invoke: &Invoke, context: &MethodRef) -> Emission {
        if self.ctx().options.is_whole_program() {
            return Emission::Inline;
        }
        let method = &invoke.method;
        if method.is_instance_initializer() || self.ctx().spec.never_outline_api.contains(method)
        {
            return Emission::Inline;
        }
        let resolved = if invoke.is_super() {
            app.lookup_super_target(method, &context.holder)
        } else {
            app.resolve_method(method)
        };
        if !resolved.is_some_and(|r| r.method.flags.is_public()) {
            return Emission::Inline;
        }
        if invoke.is_super() {
            Emission::SuperOutline
        } else {
            Emission::Outline
        }
    }

    fn plan(&self, method: &MethodRef) -> Result<ConversionPlan> {
        let ctx = self.ctx();
        let mut parameters = Vec::with_capacity(method.proto.arity());
        let mut vivified_parameters = Vec::with_capacity(method.proto.arity());
        for ty in method.proto.parameters.iter() {
            if self.convertible(method, ty, ConversionDirection::Parameter)? {
                parameters.push(Some(self.wrappers.to_vivified(ty)));
                vivified_parameters.push(ctx.vivified_type(ty));
            } else {
                parameters.push(None);
                vivified_parameters.push(ty.clone());
            }
        }
        let return_type = &method.proto.return_type;
        let (result, vivified_return) =
            if self.convertible(method, return_type, ConversionDirection::Return)? {
                (Some(return_type.clone()), ctx.vivified_type(return_type))
            } else {
                (None, return_type.clone())
            };
        Ok(ConversionPlan {
            target: method.with_proto(Proto::new(vivified_return, vivified_parameters)),
            parameters,
            result,
        })
    }

    /// True if `ty` is rewritten and can be converted. Reports rewritten types that cannot.
    fn convertible(
        &self,
        method: &MethodRef,
        ty: &TypeRef,
        direction: ConversionDirection,
    ) -> Result<bool> {
        let ctx = self.ctx();
        if !ctx.is_rewritten(ty) {
            return Ok(false);
        }
        if self.wrappers.can_convert(ty) {
            return Ok(true);
        }
        let desugared = ctx.rewriter.rewritten_type(ty).unwrap_or_else(|| ty.clone());
        let role = if direction == ConversionDirection::Return {
            "return "
        } else {
            "parameter "
        };
        let message = format!(
            "Invoke to {}#{} may not work correctly at runtime (Cannot convert {role}type \
             {desugared}).",
            method.holder,
            method.name()
        );
        let severity = if ctx.is_library_compilation() {
            DiagnosticSeverity::Error
        } else {
            DiagnosticSeverity::Info
        };
        ctx.diagnostics.push(
            Diagnostic::new(severity, DiagnosticCategory::Conversion, message.clone())
                .with_subject(method.to_string())
                .with_direction(direction),
        );
        if ctx.is_library_compilation() {
            return Err(fatal_error!(message));
        }
        Ok(false)
    }

    /// Replaces the invoke at `index` of `block` by its conversions and the vivified call.
    fn convert_inline(
        &self,
        code: &mut Code,
        block: usize,
        index: usize,
        invoke: &Invoke,
    ) -> Result<()> {
        let plan = self.plan(&invoke.method)?;
        if plan.target == invoke.method {
            return Ok(());
        }
        let shift = usize::from(invoke.kind.has_receiver());
        let mut args = invoke.args.clone();
        let mut sequence = Vec::new();

        for (slot, conversion) in plan.parameters.iter().enumerate() {
            let (Some(conversion), Some(arg)) = (conversion, args.get_mut(slot + shift)) else {
                continue;
            };
            let converted = code.new_value(conversion.proto.return_type.clone());
            sequence.push(Instruction::Invoke(Invoke::new_static(
                conversion.clone(),
                vec![*arg],
                Some(converted),
            )));
            *arg = converted;
        }

        let mut dest = invoke.dest;
        let mut result_conversion = None;
        if let Some(result) = &plan.result {
            match invoke.dest {
                Some(original) if code.users_of(original) > 0 => {
                    let vivified = code.new_value(plan.target.proto.return_type.clone());
                    dest = Some(vivified);
                    result_conversion = Some(Instruction::Invoke(Invoke::new_static(
                        self.wrappers.from_vivified(result),
                        vec![vivified],
                        Some(original),
                    )));
                }
                _ => dest = None,
            }
        }

        sequence.push(Instruction::Invoke(Invoke::new(
            invoke.kind,
            plan.target,
            args,
            dest,
            invoke.interface,
        )));
        sequence.extend(result_conversion);
        trace!(method = %invoke.method, inserted = sequence.len() - 1, "inline conversion");

        let end = index + sequence.len();
        code.blocks[block]
            .instructions
            .splice(index..=index, sequence);
        if code.blocks[block].has_catch_handlers() {
            code.isolate_throwing_range(code.blocks[block].id, index, end);
        }
        Ok(())
    }

    /// The body calling `target` shared by both outline flavors.
    fn outline_body(
        &self,
        invoke: &Invoke,
        plan: ConversionPlan,
        receiver: ForwardingReceiver,
    ) -> Code {
        let call = ForwardingCall {
            receiver,
            parameters: invoke.method.proto.parameters.to_vec(),
            conversions: plan.parameters,
            kind: invoke.kind,
            target: plan.target,
            interface: invoke.interface,
            return_conversion: plan.result.map(|r| self.wrappers.from_vivified(&r)),
        };
        call.conversion_body()
    }

    /// Moves the call into a fresh outline class and returns the replacing static invoke.
    fn outline(&self, app: &AppView, invoke: &Invoke, context: &MethodRef) -> Result<Instruction> {
        let plan = self.plan(&invoke.method)?;
        if plan.target == invoke.method {
            return Ok(Instruction::Invoke(invoke.clone()));
        }
        let counter = {
            let mut next = self.outline_counters.entry(context.clone()).or_insert(0);
            let current = *next;
            *next += 1;
            current
        };
        let index = app
            .definition_for(&context.holder)
            .and_then(|class| class.methods.iter().position(|m| m.reference == *context))
            .unwrap_or(0);
        let outline = outline_type(context, index, counter);
        let method = &invoke.method;
        let (proto, receiver) = if invoke.kind.has_receiver() {
            (
                method.proto.prepend(method.holder.clone()),
                ForwardingReceiver::Argument(method.holder.clone()),
            )
        } else {
            (method.proto.clone(), ForwardingReceiver::None)
        };
        let reference = MethodRef::new(outline.clone(), OUTLINE_METHOD_NAME, proto);
        let body = self.outline_body(invoke, plan, receiver);

        let mut class = ClassDef::new(
            ClassKind::Program,
            outline.clone(),
            ClassAccessFlags::PUBLIC | ClassAccessFlags::FINAL | ClassAccessFlags::SYNTHETIC,
            Some(TypeRef::object()),
        );
        class.add_method(
            MethodDef::new(reference.clone(), MethodAccessFlags::public_static_synthetic())
                .with_code(body),
        );
        self.ctx()
            .synthetics
            .register(outline.clone(), SyntheticKind::ApiConversionOutline);
        trace!(outline = %outline, method = %invoke.method, "outlined conversion");
        self.ctx().queue.push(SynthesisEvent::ApiConversionOutline(class));

        Ok(Instruction::Invoke(Invoke::new_static(
            reference,
            invoke.args.clone(),
            invoke.dest,
        )))
    }

    /// Routes a super call through a static method on the calling class, shared by every super
    /// call of the same method from that class.
    fn super_outline(&self, invoke: &Invoke, context: &MethodRef) -> Result<Instruction> {
        let plan = self.plan(&invoke.method)?;
        if plan.target == invoke.method {
            return Ok(Instruction::Invoke(invoke.clone()));
        }
        let holder = &context.holder;
        let reference = MethodRef::new(
            holder.clone(),
            super_outline_name(&invoke.method),
            invoke.method.proto.prepend(holder.clone()),
        );
        if self
            .super_outlines
            .insert((holder.clone(), invoke.method.clone()))
        {
            let receiver = ForwardingReceiver::Argument(holder.clone());
            let body = self.outline_body(invoke, plan, receiver);
            let method =
                MethodDef::new(reference.clone(), MethodAccessFlags::public_static_synthetic())
                    .with_code(body);
            trace!(holder = %holder, method = %invoke.method, "outlined super conversion");
            self.ctx().queue.push(SynthesisEvent::ApiConversionSuperOutline {
                holder: holder.clone(),
                method,
            });
        }
        Ok(Instruction::Invoke(Invoke::new_static(
            reference,
            invoke.args.clone(),
            invoke.dest,
        )))
    }
}

impl ApiConversionQuery for ApiConverter<'_> {
    fn policy(&self) -> &ConversionPolicy<'_> {
        &self.policy
    }
}

fn report(ctx: &DesugarContext, tracked: &DashSet<MethodRef>, inner: &str) {
    let mut entries: Vec<String> = tracked.iter().map(|m| m.key().to_string()).collect();
    entries.sort();
    let mut message = format!("Tracked {inner}desugared API conversions: ");
    for entry in entries {
        message.push('\n');
        message.push_str(&entry);
    }
    ctx.diagnostics.warning(DiagnosticCategory::Tracking, message);
}
