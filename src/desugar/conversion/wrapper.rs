//! Wrapper pairs for library types without a custom conversion.
//!
//! For a wrappable library type `T` two classes are generated:
//!
//! | Class | Extends / implements | Field | `convert` |
//! |---|---|---|---|
//! | `T$-WRP` | `V(T)` | `T wrappedValue` | `V(T) convert(T)` |
//! | `T$-V-WRP` | `T` | `V(T) wrappedValue` | `T convert(V(T))` |
//!
//! Each wrapper forwards every overridable method of `T` to its wrapped value, converting
//! arguments and results on the way. Each `convert` unwraps an instance of the opposite wrapper
//! instead of wrapping it again.
//!
//! Conversion methods are handed out by name while method bodies are processed; the wrapper
//! classes themselves are only built in [`WrapperSynthesizer::synthesize`], once every request
//! is known. Building a forwarding body may request further wrappers, so synthesis runs to a
//! fixpoint. When the desugared library itself is compiled, every configured wrapper is built,
//! all skeletons first and all forwarding methods second.

use std::collections::BTreeSet;

use dashmap::DashSet;
use tracing::{debug, warn};

use crate::{
    desugar::{
        context::DesugarContext,
        conversion::codegen::{
            throwing_body, wrapper_constructor_body, wrapper_convert_body, ForwardingCall,
            ForwardingReceiver,
        },
        events::SynthesisEvent,
        synthetic::{
            vivified_wrapper_type, wrapper_type, SyntheticKind, CONVERT_METHOD_NAME,
            WRAPPER_FIELD_NAME,
        },
    },
    ir::InvokeKind,
    metadata::{
        app::AppView,
        class::{ClassDef, ClassKind, FieldDef, MethodDef},
        diagnostics::{ConversionDirection, Diagnostic, DiagnosticCategory, DiagnosticSeverity},
        flags::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags},
        types::{FieldRef, MethodRef, Proto, TypeRef, CONSTRUCTOR_NAME},
    },
};

/// The two directions of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `T -> V(T)`, application value handed to the platform
    ToVivified,
    /// `V(T) -> T`, platform value handed to the application
    FromVivified,
}

/// One wrapper class under construction.
struct WrapperClass {
    class: ClassDef,
    field: FieldRef,
}

/// The wrapper pair of one type, between the two build stages.
struct WrapperPair {
    ty: TypeRef,
    wrapper: WrapperClass,
    vivified: WrapperClass,
    /// Overridable methods of the wrapped type with the interface-ness of their holder
    methods: Vec<(MethodDef, bool)>,
    valid: bool,
}

/// Hands out conversion methods and builds the wrappers behind them.
pub struct WrapperSynthesizer<'a> {
    ctx: &'a DesugarContext,
    requested: DashSet<TypeRef>,
}

impl<'a> WrapperSynthesizer<'a> {
    /// Creates a synthesizer.
    #[must_use]
    pub fn new(ctx: &'a DesugarContext) -> Self {
        WrapperSynthesizer {
            ctx,
            requested: DashSet::new(),
        }
    }

    /// True if values of `ty` can be converted, through a custom conversion or a wrapper.
    #[must_use]
    pub fn can_convert(&self, ty: &TypeRef) -> bool {
        self.ctx.spec.custom_conversion_for(ty).is_some() || self.ctx.spec.is_wrappable(ty)
    }

    /// The class declaring the conversion of `ty` in `direction`.
    #[must_use]
    pub fn conversion_holder(&self, ty: &TypeRef, direction: Direction) -> TypeRef {
        if let Some(custom) = self.ctx.spec.custom_conversion_for(ty) {
            return custom.clone();
        }
        match direction {
            Direction::ToVivified => wrapper_type(ty),
            Direction::FromVivified => vivified_wrapper_type(ty),
        }
    }

    /// The conversion method of `ty` in `direction`, without requesting a wrapper.
    #[must_use]
    pub fn conversion_method(&self, ty: &TypeRef, direction: Direction) -> MethodRef {
        let vivified = self.ctx.vivified_type(ty);
        let proto = match direction {
            Direction::ToVivified => Proto::new(vivified, vec![ty.clone()]),
            Direction::FromVivified => Proto::new(ty.clone(), vec![vivified]),
        };
        MethodRef::new(
            self.conversion_holder(ty, direction),
            CONVERT_METHOD_NAME,
            proto,
        )
    }

    fn ensure_conversion(&self, ty: &TypeRef, direction: Direction) -> MethodRef {
        if self.ctx.spec.custom_conversion_for(ty).is_none() {
            self.requested.insert(ty.clone());
        }
        self.conversion_method(ty, direction)
    }

    /// `T -> V(T)`, requesting the wrapper pair of `ty` unless a custom conversion exists.
    pub fn to_vivified(&self, ty: &TypeRef) -> MethodRef {
        self.ensure_conversion(ty, Direction::ToVivified)
    }

    /// `V(T) -> T`, requesting the wrapper pair of `ty` unless a custom conversion exists.
    pub fn from_vivified(&self, ty: &TypeRef) -> MethodRef {
        self.ensure_conversion(ty, Direction::FromVivified)
    }

    /// Both conversion methods of `ty`.
    pub fn ensure_wrappers(&self, ty: &TypeRef) -> (MethodRef, MethodRef) {
        (self.to_vivified(ty), self.from_vivified(ty))
    }

    /// True if a wrapper pair has been requested for `ty`.
    #[must_use]
    pub fn is_requested(&self, ty: &TypeRef) -> bool {
        self.requested.contains(ty)
    }

    /// Builds every requested wrapper pair, and in library compilation every configured one,
    /// queueing the classes.
    ///
    /// Returns the number of wrapper pairs built.
    pub fn synthesize(&self, app: &AppView) -> usize {
        let library = self.ctx.is_library_compilation();
        if library {
            for ty in &self.ctx.spec.wrapper_conversion {
                if self.ctx.spec.custom_conversion_for(ty).is_none() {
                    self.requested.insert(ty.clone());
                }
            }
        }

        let mut built: BTreeSet<TypeRef> = BTreeSet::new();
        loop {
            let pending: BTreeSet<TypeRef> = self
                .requested
                .iter()
                .map(|ty| ty.key().clone())
                .filter(|ty| !built.contains(ty))
                .collect();
            if pending.is_empty() {
                break;
            }

            let mut pairs: Vec<WrapperPair> =
                pending.iter().map(|ty| self.skeleton(app, ty)).collect();
            for pair in &mut pairs {
                self.add_forwarding_methods(pair);
            }
            for pair in pairs {
                self.commit(pair, library);
            }
            built.extend(pending);
        }

        debug!(pairs = built.len(), "synthesized wrappers");
        built.len()
    }

    fn class_kind(&self) -> ClassKind {
        if self.ctx.is_library_compilation() {
            ClassKind::Program
        } else {
            ClassKind::Classpath
        }
    }

    /// Stage one: classes, fields, constructors and `convert` methods.
    fn skeleton(&self, app: &AppView, ty: &TypeRef) -> WrapperPair {
        let definition = app.definition_for(ty);
        let is_interface = definition.is_some_and(ClassDef::is_interface);
        let vivified_ty = self.ctx.vivified_type(ty);

        let mut methods = Vec::new();
        let mut final_methods = Vec::new();
        match definition {
            Some(class) => {
                for (method, interface) in wrapped_methods(app, class) {
                    if method.is_final() {
                        final_methods
                            .push(format!("{}#{}", method.reference.holder, method.name()));
                    }
                    methods.push((method.clone(), interface));
                }
            }
            None => {
                self.ctx.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticSeverity::Warning,
                        DiagnosticCategory::Wrapper,
                        format!(
                            "Desugared library API conversion: cannot generate wrappers for \
                             missing type {ty}. {ty} is marked as invalid and will throw a \
                             runtime exception upon conversion."
                        ),
                    )
                    .with_subject(ty.to_string()),
                );
            }
        }
        if !final_methods.is_empty() {
            let message = format!(
                "Desugared library API conversion: cannot wrap final methods [{}]. {ty} is marked \
                 as invalid and will throw a runtime exception upon conversion.",
                final_methods.join(", ")
            );
            warn!("{message}");
            self.ctx.diagnostics.push(
                Diagnostic::new(
                    DiagnosticSeverity::Warning,
                    DiagnosticCategory::Wrapper,
                    message,
                )
                .with_subject(ty.to_string()),
            );
        }
        let valid = definition.is_some() && final_methods.is_empty();

        let wrapper_ty = wrapper_type(ty);
        let vivified_wrapper_ty = vivified_wrapper_type(ty);
        let wrapper_field = FieldRef::new(wrapper_ty.clone(), WRAPPER_FIELD_NAME, ty.clone());
        let vivified_field = FieldRef::new(
            vivified_wrapper_ty.clone(),
            WRAPPER_FIELD_NAME,
            vivified_ty.clone(),
        );

        let wrapper = self.wrapper_class(
            ty,
            &wrapper_field,
            &vivified_field,
            &vivified_ty,
            is_interface,
            valid,
        );
        let vivified = self.wrapper_class(
            ty,
            &vivified_field,
            &wrapper_field,
            ty,
            is_interface,
            valid,
        );
        self.ctx
            .synthetics
            .register(wrapper_ty, SyntheticKind::Wrapper);
        self.ctx
            .synthetics
            .register(vivified_wrapper_ty, SyntheticKind::VivifiedWrapper);

        WrapperPair {
            ty: ty.clone(),
            wrapper,
            vivified,
            methods,
            valid,
        }
    }

    /// A wrapper presenting `field.ty` as `presented`, unwrapping instances of the class
    /// declaring `opposite`.
    fn wrapper_class(
        &self,
        ty: &TypeRef,
        field: &FieldRef,
        opposite: &FieldRef,
        presented: &TypeRef,
        is_interface: bool,
        valid: bool,
    ) -> WrapperClass {
        let holder = field.holder.clone();
        let (super_type, interfaces) = if is_interface {
            (TypeRef::object(), vec![presented.clone()])
        } else {
            (presented.clone(), vec![])
        };
        let mut class = ClassDef::new(
            self.class_kind(),
            holder.clone(),
            ClassAccessFlags::PUBLIC | ClassAccessFlags::FINAL | ClassAccessFlags::SYNTHETIC,
            Some(super_type.clone()),
        )
        .with_interfaces(interfaces);

        class.add_field(FieldDef::new(
            field.clone(),
            FieldAccessFlags::FINAL | FieldAccessFlags::SYNTHETIC,
        ));

        let constructor = MethodRef::new(
            holder.clone(),
            CONSTRUCTOR_NAME,
            Proto::new(TypeRef::void(), vec![field.ty.clone()]),
        );
        class.add_method(
            MethodDef::new(constructor.clone(), MethodAccessFlags::private_constructor())
                .with_code(wrapper_constructor_body(field, &super_type)),
        );

        let convert = MethodRef::new(
            holder,
            CONVERT_METHOD_NAME,
            Proto::new(presented.clone(), vec![field.ty.clone()]),
        );
        let body = if valid {
            wrapper_convert_body(&convert, &constructor, opposite)
        } else {
            throwing_body(
                &convert.proto.parameters,
                &format!(
                    "Unsupported conversion for {ty}. See compilation time warnings for more \
                     details."
                ),
            )
        };
        class.add_method(
            MethodDef::new(convert, MethodAccessFlags::public_static_synthetic()).with_code(body),
        );
        WrapperClass {
            class,
            field: field.clone(),
        }
    }

    /// Stage two: one forwarding method per overridable method, on both wrappers.
    fn add_forwarding_methods(&self, pair: &mut WrapperPair) {
        if !pair.valid {
            return;
        }
        for (method, interface) in &pair.methods {
            let forwarded =
                self.wrapper_forwarder(&pair.ty, &pair.wrapper.field, method, *interface);
            pair.wrapper.class.add_method(forwarded);
            let forwarded = self.vivified_wrapper_forwarder(
                &pair.ty,
                &pair.vivified.field,
                method,
                *interface,
            );
            pair.vivified.class.add_method(forwarded);
        }
    }

    /// `V(R) m(V(P)...)` on `T$-WRP`, calling `T.m(P...)` on the wrapped value.
    fn wrapper_forwarder(
        &self,
        ty: &TypeRef,
        field: &FieldRef,
        method: &MethodDef,
        interface: bool,
    ) -> MethodDef {
        let reference = &method.reference;
        let installed = self.ctx.vivified_method(reference, field.holder.clone());
        let conversions = reference
            .proto
            .parameters
            .iter()
            .map(|p| {
                let slot = (p, ConversionDirection::Parameter);
                self.slot_conversion(ty, reference, slot, Direction::FromVivified)
            })
            .collect();
        let return_conversion = self.slot_conversion(
            ty,
            reference,
            (&reference.proto.return_type, ConversionDirection::Return),
            Direction::ToVivified,
        );
        let call = ForwardingCall {
            receiver: ForwardingReceiver::WrappedField(field.clone()),
            parameters: installed.proto.parameters.to_vec(),
            conversions,
            kind: invoke_kind(interface),
            target: reference.clone(),
            interface,
            return_conversion,
        };
        MethodDef::new(installed, forwarder_flags(method.flags)).with_code(call.conversion_body())
    }

    /// `R m(P...)` on `T$-V-WRP`, calling `V(T).m(V(P)...)` on the wrapped value.
    fn vivified_wrapper_forwarder(
        &self,
        ty: &TypeRef,
        field: &FieldRef,
        method: &MethodDef,
        interface: bool,
    ) -> MethodDef {
        let reference = &method.reference;
        let installed = reference.with_holder(field.holder.clone());
        let target_holder = self.ctx.vivified_type(&reference.holder);
        let target = self.ctx.vivified_method(reference, target_holder);
        let conversions = reference
            .proto
            .parameters
            .iter()
            .map(|p| {
                let slot = (p, ConversionDirection::Parameter);
                self.slot_conversion(ty, reference, slot, Direction::ToVivified)
            })
            .collect();
        let return_conversion = self.slot_conversion(
            ty,
            reference,
            (&reference.proto.return_type, ConversionDirection::Return),
            Direction::FromVivified,
        );
        let call = ForwardingCall {
            receiver: ForwardingReceiver::WrappedField(field.clone()),
            parameters: reference.proto.parameters.to_vec(),
            conversions,
            kind: invoke_kind(interface),
            target,
            interface,
            return_conversion,
        };
        MethodDef::new(installed, forwarder_flags(method.flags)).with_code(call.conversion_body())
    }

    /// The conversion of one slot of a forwarded method, `None` for slots passed through.
    ///
    /// `slot` is the slot type and whether it is a parameter or the return value.
    fn slot_conversion(
        &self,
        ty: &TypeRef,
        method: &MethodRef,
        (slot, role): (&TypeRef, ConversionDirection),
        direction: Direction,
    ) -> Option<MethodRef> {
        if !self.ctx.is_rewritten(slot) {
            return None;
        }
        if self.can_convert(slot) {
            return Some(self.ensure_conversion(slot, direction));
        }
        self.ctx.diagnostics.push(
            Diagnostic::new(
                DiagnosticSeverity::Info,
                DiagnosticCategory::Wrapper,
                format!(
                    "Wrapper of {ty} forwards {} without converting type {slot}.",
                    method.short_name()
                ),
            )
            .with_subject(method.to_string())
            .with_direction(role),
        );
        None
    }

    fn commit(&self, pair: WrapperPair, library: bool) {
        debug!(ty = %pair.ty, valid = pair.valid, "committing wrapper pair");
        for class in [pair.wrapper.class, pair.vivified.class] {
            let event = if library {
                SynthesisEvent::WrapperProgramClass(class)
            } else {
                SynthesisEvent::WrapperClasspathClass(class)
            };
            self.ctx.queue.push(event);
        }
    }
}

fn invoke_kind(interface: bool) -> InvokeKind {
    if interface {
        InvokeKind::Interface
    } else {
        InvokeKind::Virtual
    }
}

fn forwarder_flags(flags: MethodAccessFlags) -> MethodAccessFlags {
    (flags - MethodAccessFlags::ABSTRACT - MethodAccessFlags::BRIDGE)
        | MethodAccessFlags::SYNTHETIC
}

/// The overridable methods of `class` and its supertypes up to `java.lang.Object`, first
/// declaration of each name and prototype wins. Each method is paired with whether its
/// declaring class is an interface.
fn wrapped_methods<'a>(app: &'a AppView, class: &'a ClassDef) -> Vec<(&'a MethodDef, bool)> {
    let mut result: Vec<(&MethodDef, bool)> = Vec::new();
    let supertypes = app.supertype_closure(&class.ty);
    let hierarchy = std::iter::once(class)
        .chain(supertypes.into_iter().filter(|c| !c.ty.is_object()));
    for current in hierarchy {
        for method in current.virtual_methods() {
            if result
                .iter()
                .any(|(known, _)| known.reference.matches(&method.reference))
            {
                continue;
            }
            result.push((method, current.is_interface()));
        }
    }
    result
}
