//! Read-only decisions of API conversion.
//!
//! [`ConversionPolicy`] answers the two questions every conversion component asks: does this
//! invoke cross the boundary between desugared and platform types, and must this program
//! method be callable by the platform with platform types. Both the generating
//! [`crate::desugar::conversion::ApiConverter`] and the read-only
//! [`crate::desugar::conversion::ApiConversionValidator`] expose the answers through
//! [`ApiConversionQuery`].

use std::collections::{HashSet, VecDeque};

use crate::{
    desugar::{collaborators::InvokeDesugaring, context::DesugarContext},
    ir::Invoke,
    metadata::{
        apilevel::AndroidApiLevel,
        app::AppView,
        class::{ClassDef, MethodDef},
        rewriter::TypeRewriter,
        types::{MethodRef, TypeRef},
    },
};

/// The conversion decisions of one run.
pub struct ConversionPolicy<'a> {
    ctx: &'a DesugarContext,
    collaborators: Vec<&'a dyn InvokeDesugaring>,
}

impl<'a> ConversionPolicy<'a> {
    /// Creates the policy. Invokes claimed by any of `collaborators` are never converted.
    #[must_use]
    pub fn new(ctx: &'a DesugarContext, collaborators: Vec<&'a dyn InvokeDesugaring>) -> Self {
        ConversionPolicy { ctx, collaborators }
    }

    /// The run this policy belongs to.
    #[must_use]
    pub fn ctx(&self) -> &'a DesugarContext {
        self.ctx
    }

    /// True if `invoke`, found in the body of `context`, calls a library method whose
    /// signature mentions a desugared type.
    #[must_use]
    pub fn needs_desugaring(&self, app: &AppView, invoke: &Invoke, context: &MethodRef) -> bool {
        if self.ctx.synthetics.is_api_conversion_type(&context.holder) {
            return false;
        }
        let method = &invoke.method;
        if method.proto.types().any(TypeRef::is_vivified)
            || !self.ctx.rewriter.has_rewritten_type_in_signature(&method.proto)
        {
            return false;
        }
        if method.holder.is_array() || self.ctx.is_rewritten(&method.holder) {
            return false;
        }
        let resolved = if invoke.is_super() {
            app.lookup_super_target(method, &context.holder)
        } else {
            app.resolve_method(method)
        };
        let Some(resolved) = resolved else {
            return false;
        };
        if !resolved.holder.is_library() {
            return false;
        }
        !self
            .collaborators
            .iter()
            .any(|c| c.needs_desugaring(app, invoke, context))
    }

    /// True if `method` of program class `holder` overrides a library method the platform may
    /// call with platform types, so it needs a vivified twin.
    #[must_use]
    pub fn should_register_callback(
        &self,
        app: &AppView,
        holder: &ClassDef,
        method: &MethodDef,
    ) -> bool {
        let flags = method.flags;
        if flags.is_private()
            || flags.is_static()
            || flags.is_abstract()
            || method.reference.is_instance_initializer()
        {
            return false;
        }
        let proto = &method.reference.proto;
        if proto.types().any(TypeRef::is_vivified)
            || !self.ctx.rewriter.has_rewritten_type_in_signature(proto)
            || self.ctx.spec.is_emulated_interface(&holder.ty)
        {
            return false;
        }
        let library = self.ctx.is_library_compilation();
        if library && !self.ctx.spec.support_all_callbacks_from_library {
            return false;
        }
        if !app.is_library_method_override(&holder.ty, &method.reference) {
            return false;
        }
        if !self.ctx.options.is_whole_program()
            && (library || self.ctx.options.min_api_level < AndroidApiLevel::N)
            && self.overrides_default_method(app, holder, &method.reference)
        {
            return false;
        }
        self.overrides_library_method(app, holder, &method.reference)
    }

    /// True if an interface among the supertypes of `holder` declares `method` with a body.
    fn overrides_default_method(
        &self,
        app: &AppView,
        holder: &ClassDef,
        method: &MethodRef,
    ) -> bool {
        app.supertype_closure(&holder.ty).iter().any(|class| {
            class.is_interface()
                && class
                    .lookup_virtual_method(method)
                    .is_some_and(|m| !m.flags.is_abstract())
        })
    }

    fn generates_callbacks_for(&self, class: &ClassDef) -> bool {
        let spec = &self.ctx.spec;
        spec.support_all_callbacks_from_library
            || !(spec.emulate_interface.contains_key(&class.ty)
                || spec.emulate_interface.values().any(|v| v == &class.ty))
    }

    fn overrides_library_method(
        &self,
        app: &AppView,
        holder: &ClassDef,
        method: &MethodRef,
    ) -> bool {
        let library = self.ctx.is_library_compilation();
        let mut seen: HashSet<&TypeRef> = HashSet::new();
        let mut worklist: VecDeque<&TypeRef> = holder
            .supertypes()
            .filter(|ty| !ty.is_object())
            .collect();
        let mut found = false;
        while let Some(current) = worklist.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            let Some(class) = app.definition_for(current) else {
                continue;
            };
            worklist.extend(class.supertypes().filter(|ty| !ty.is_object()));
            if !class.is_library() && !library {
                continue;
            }
            if !self.generates_callbacks_for(class) {
                continue;
            }
            if let Some(declared) = class.lookup_virtual_method(method) {
                if self.ctx.is_rewritten(&class.ty) {
                    return false;
                }
                if !declared.is_final() {
                    found = true;
                }
            }
        }
        found
    }
}

/// Read access to the conversion decisions.
pub trait ApiConversionQuery {
    /// The underlying policy.
    fn policy(&self) -> &ConversionPolicy<'_>;

    /// See [`ConversionPolicy::needs_desugaring`].
    fn needs_desugaring(&self, app: &AppView, invoke: &Invoke, context: &MethodRef) -> bool {
        self.policy().needs_desugaring(app, invoke, context)
    }

    /// See [`ConversionPolicy::should_register_callback`].
    fn should_register_callback(
        &self,
        app: &AppView,
        holder: &ClassDef,
        method: &MethodDef,
    ) -> bool {
        self.policy().should_register_callback(app, holder, method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        desugar::{
            collaborators::EmulatedInterfaceInvokes,
            options::DesugarOptions,
            synthetic::{outline_type, SyntheticKind},
        },
        ir::{InvokeKind, ValueId},
        metadata::flags::MethodAccessFlags,
        test::factories::{method, mref, platform, program_class, specification, CONSUMER, ZONE_ID},
    };

    fn context() -> DesugarContext {
        DesugarContext::new(specification(), DesugarOptions::default())
    }

    fn invoke(kind: InvokeKind, method: MethodRef) -> Invoke {
        let arity = method.proto.arity() + usize::from(kind.has_receiver());
        let args = (0..arity).map(ValueId::new).collect();
        Invoke::new(kind, method, args, None, kind == InvokeKind::Interface)
    }

    fn for_each() -> MethodRef {
        mref("java.util.ArrayList", "forEach", "void", &[CONSUMER])
    }

    #[test]
    fn library_call_with_desugared_type_needs_conversion() {
        let app = platform();
        let ctx = context();
        let policy = ConversionPolicy::new(&ctx, vec![]);
        let main = mref("app.Main", "run", "void", &[]);

        assert!(policy.needs_desugaring(&app, &invoke(InvokeKind::Virtual, for_each()), &main));
        let get_id = mref(ZONE_ID, "getId", "java.lang.String", &[]);
        assert!(!policy.needs_desugaring(&app, &invoke(InvokeKind::Virtual, get_id), &main));
        // already converted
        let vivified = ctx.vivified_method(&for_each(), for_each().holder);
        assert!(!policy.needs_desugaring(&app, &invoke(InvokeKind::Virtual, vivified), &main));
    }

    #[test]
    fn conversion_code_and_program_targets_are_skipped() {
        let mut app = platform();
        let mut list = program_class("app.MyList", "java.util.ArrayList");
        list.add_method(method(
            "app.MyList",
            "forEach",
            "void",
            &[CONSUMER],
            MethodAccessFlags::PUBLIC,
        ));
        app.add_class(list);
        let ctx = context();
        let policy = ConversionPolicy::new(&ctx, vec![]);
        let main = mref("app.Main", "run", "void", &[]);

        let call = invoke(
            InvokeKind::Virtual,
            for_each().with_holder(TypeRef::new("app.MyList")),
        );
        assert!(!policy.needs_desugaring(&app, &call, &main));

        let outline = outline_type(&main, 0, 0);
        ctx.synthetics
            .register(outline.clone(), SyntheticKind::ApiConversionOutline);
        let inside = mref(outline.name(), "apiConversionCall", "void", &[]);
        let call = invoke(InvokeKind::Virtual, for_each());
        assert!(!policy.needs_desugaring(&app, &call, &inside));
    }

    #[test]
    fn collaborators_take_precedence() {
        let app = platform();
        let spec =
            specification().with_emulated_interface("java.lang.Iterable", "j$.lang.Iterable");
        let ctx = DesugarContext::new(spec, DesugarOptions::default());
        let emulated = EmulatedInterfaceInvokes::new(&ctx.spec.emulate_interface);
        let policy = ConversionPolicy::new(&ctx, vec![&emulated]);
        let main = mref("app.Main", "run", "void", &[]);

        let itf = for_each().with_holder(TypeRef::new("java.lang.Iterable"));
        assert!(!policy.needs_desugaring(&app, &invoke(InvokeKind::Interface, itf), &main));
        assert!(policy.needs_desugaring(&app, &invoke(InvokeKind::Virtual, for_each()), &main));
    }

    #[test]
    fn override_of_library_method_registers_callback() {
        let mut app = platform();
        let mut list = program_class("app.MyList", "java.util.ArrayList");
        let override_ = method(
            "app.MyList",
            "forEach",
            "void",
            &[CONSUMER],
            MethodAccessFlags::PUBLIC,
        );
        list.add_method(override_.clone());
        let helper = method(
            "app.MyList",
            "helper",
            "void",
            &[CONSUMER],
            MethodAccessFlags::PUBLIC,
        );
        list.add_method(helper.clone());
        app.add_class(list.clone());

        let ctx = context();
        let policy = ConversionPolicy::new(&ctx, vec![]);
        assert!(policy.should_register_callback(&app, &list, &override_));
        assert!(!policy.should_register_callback(&app, &list, &helper));

        let mut private = override_.clone();
        private.flags = MethodAccessFlags::PRIVATE;
        assert!(!policy.should_register_callback(&app, &list, &private));
    }

    #[test]
    fn default_methods_are_skipped_per_class_below_n() {
        let mut app = platform();
        let mut iterable = program_class("app.MyIterable", "java.lang.Object")
            .with_interfaces(vec![TypeRef::new("java.lang.Iterable")]);
        let override_ = method(
            "app.MyIterable",
            "forEach",
            "void",
            &[CONSUMER],
            MethodAccessFlags::PUBLIC,
        );
        iterable.add_method(override_.clone());
        app.add_class(iterable.clone());

        let whole = context();
        assert!(ConversionPolicy::new(&whole, vec![])
            .should_register_callback(&app, &iterable, &override_));

        let per_class = DesugarContext::new(
            specification(),
            DesugarOptions::per_class(AndroidApiLevel::L),
        );
        assert!(!ConversionPolicy::new(&per_class, vec![])
            .should_register_callback(&app, &iterable, &override_));

        let modern = DesugarContext::new(
            specification(),
            DesugarOptions::per_class(AndroidApiLevel::N),
        );
        assert!(ConversionPolicy::new(&modern, vec![])
            .should_register_callback(&app, &iterable, &override_));
    }

    #[test]
    fn rewritten_library_supertypes_are_wrapped_instead() {
        let mut app = platform();
        let mut consumer = program_class("app.MyConsumer", "java.lang.Object")
            .with_interfaces(vec![TypeRef::new(CONSUMER)]);
        let and_then = method(
            "app.MyConsumer",
            "andThen",
            CONSUMER,
            &[CONSUMER],
            MethodAccessFlags::PUBLIC,
        );
        consumer.add_method(and_then.clone());
        app.add_class(consumer.clone());

        let ctx = context();
        let policy = ConversionPolicy::new(&ctx, vec![]);
        assert!(!policy.should_register_callback(&app, &consumer, &and_then));
    }
}
