//! Synthesis of emulated dispatch pairs.
//!
//! For an overridable retargeted member `M#m`, call sites cannot simply be redirected to the
//! static destination: an application subclass overriding `m` would be bypassed. Instead they
//! call a dispatch holder:
//!
//! ```text
//! interface DispatchInterface { R m(A...); }
//!
//! final class DispatchHolder {
//!     static R m(M receiver, A... args) {
//!         if (receiver instanceof DispatchInterface)
//!             return ((DispatchInterface) receiver).m(args);
//!         return Destination.m(receiver, args);
//!     }
//! }
//! ```
//!
//! Application classes extending `M` receive the interface (see
//! [`crate::desugar::retarget::tree_fixer`]). Each pair is synthesized at most once per member,
//! even when several workers request it concurrently.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tracing::debug;

use crate::{
    desugar::{
        context::DesugarContext,
        events::SynthesisEvent,
        retarget::info::RetargetingInfo,
        synthetic::{dispatch_holder_type, dispatch_interface_type, SyntheticKind},
    },
    ir::{Code, CodeBuilder, IfKind, InvokeKind},
    metadata::{
        class::{ClassDef, ClassKind, MethodDef},
        flags::{ClassAccessFlags, MethodAccessFlags},
        rewriter::TypeRewriter,
        types::{MethodRef, TypeRef},
    },
    Error, Result,
};

type Cell = Arc<OnceLock<MethodRef>>;

/// Creates and caches emulated dispatch interfaces and holders.
pub struct RetargeterSyntheticHelper<'a> {
    ctx: &'a DesugarContext,
    info: &'a RetargetingInfo,
    interfaces: DashMap<MethodRef, Cell>,
    holders: DashMap<MethodRef, Cell>,
}

impl<'a> RetargeterSyntheticHelper<'a> {
    /// Creates a helper for the given tables.
    #[must_use]
    pub fn new(ctx: &'a DesugarContext, info: &'a RetargetingInfo) -> Self {
        RetargeterSyntheticHelper {
            ctx,
            info,
            interfaces: DashMap::new(),
            holders: DashMap::new(),
        }
    }

    fn cell(map: &DashMap<MethodRef, Cell>, method: &MethodRef) -> Cell {
        map.entry(method.clone()).or_default().clone()
    }

    fn class_kind(&self) -> ClassKind {
        if self.ctx.is_library_compilation() {
            ClassKind::Program
        } else {
            ClassKind::Classpath
        }
    }

    fn commit(&self, class: ClassDef, kind: SyntheticKind) {
        self.ctx.synthetics.register(class.ty.clone(), kind);
        self.ctx.rewriter.rewrite_type(class.ty.clone(), class.ty.clone());
        debug!(class = %class.ty, "synthesized emulated dispatch class");
        let event = if self.ctx.is_library_compilation() {
            SynthesisEvent::RetargetDispatchProgramClass(class)
        } else {
            SynthesisEvent::RetargetDispatchClasspathClass(class)
        };
        self.ctx.queue.push(event);
    }

    /// The single abstract method of the dispatch interface of `method`, synthesizing the
    /// interface on first request.
    pub fn ensure_emulated_interface_dispatch_method(&self, method: &MethodRef) -> MethodRef {
        let cell = Self::cell(&self.interfaces, method);
        cell.get_or_init(|| {
            let ty = dispatch_interface_type(self.ctx.synthesized_prefix(), method);
            let reference = method.with_holder(ty.clone());
            let mut class = ClassDef::new(
                self.class_kind(),
                ty,
                ClassAccessFlags::PUBLIC
                    | ClassAccessFlags::SYNTHETIC
                    | ClassAccessFlags::ABSTRACT
                    | ClassAccessFlags::INTERFACE,
                Some(TypeRef::object()),
            );
            class.add_method(MethodDef::new(
                reference.clone(),
                MethodAccessFlags::PUBLIC
                    | MethodAccessFlags::ABSTRACT
                    | MethodAccessFlags::SYNTHETIC,
            ));
            self.commit(class, SyntheticKind::RetargetInterface);
            reference
        })
        .clone()
    }

    /// The static dispatch method of the holder of `method`, synthesizing the holder (and its
    /// interface) on first request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MethodNotFound`] if `method` has no configured destination.
    pub fn ensure_emulated_holder_dispatch_method(&self, method: &MethodRef) -> Result<MethodRef> {
        let target = self
            .info
            .configured_target(method)
            .ok_or_else(|| Error::MethodNotFound(method.to_string()))?;
        let cell = Self::cell(&self.holders, method);
        let dispatch = cell.get_or_init(|| {
            let interface_method = self.ensure_emulated_interface_dispatch_method(method);
            let ty = dispatch_holder_type(self.ctx.synthesized_prefix(), method);
            let reference = MethodRef::new(ty.clone(), method.name(), target.proto.clone());
            let mut class = ClassDef::new(
                self.class_kind(),
                ty,
                ClassAccessFlags::PUBLIC | ClassAccessFlags::SYNTHETIC,
                Some(TypeRef::object()),
            );
            class.add_method(
                MethodDef::new(reference.clone(), MethodAccessFlags::public_static_synthetic())
                    .with_code(dispatch_body(method, &interface_method, target)),
            );
            self.commit(class, SyntheticKind::RetargetHolder);
            reference
        });
        Ok(dispatch.clone())
    }
}

/// `if (receiver instanceof Itf) return ((Itf) receiver).m(args); return Target.m(receiver, args);`
fn dispatch_body(method: &MethodRef, interface_method: &MethodRef, target: &MethodRef) -> Code {
    let mut builder = CodeBuilder::new();
    let receiver = builder.argument(method.holder.clone());
    let args = builder.arguments(method.proto.parameters.iter());

    let is_dispatch = builder.instance_of(receiver, interface_method.holder.clone());
    let (dispatch, fallback) = builder.branch(IfKind::Nez, is_dispatch);

    builder.switch_to(dispatch);
    let cast = builder.check_cast(receiver, interface_method.holder.clone());
    let mut interface_args = vec![cast];
    interface_args.extend(&args);
    let result = builder.invoke(
        InvokeKind::Interface,
        interface_method.clone(),
        interface_args,
        true,
    );
    builder.return_value(result);

    builder.switch_to(fallback);
    let mut static_args = vec![receiver];
    static_args.extend(&args);
    let result = builder.invoke(InvokeKind::Static, target.clone(), static_args, false);
    builder.return_value(result);
    builder.build()
}
