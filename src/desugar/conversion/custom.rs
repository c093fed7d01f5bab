//! Custom conversion holders of a library build.
//!
//! The desugared library ships hand written conversions such as
//! `TimeConversions#convert(j$.time.ZoneId) -> java.time.ZoneId`, whose platform side is
//! spelled with the plain platform name. Inside the engine the platform side of a conversion
//! is the vivified type, so the [`CustomConversionRewriter`] renames it before any call site is
//! converted. A configured holder that is absent from the build is replaced by a placeholder
//! classpath class declaring both conversions.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::{
    desugar::{context::DesugarContext, synthetic::SyntheticKind, synthetic::CONVERT_METHOD_NAME},
    metadata::{
        app::AppView,
        class::{ClassDef, ClassKind, MethodDef},
        diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity},
        flags::{ClassAccessFlags, MethodAccessFlags},
        types::{MethodRef, Proto, TypeRef},
    },
};

/// Renames the platform side of custom conversions to the vivified type.
pub struct CustomConversionRewriter<'a> {
    ctx: &'a DesugarContext,
}

impl<'a> CustomConversionRewriter<'a> {
    /// Creates a rewriter.
    #[must_use]
    pub fn new(ctx: &'a DesugarContext) -> Self {
        CustomConversionRewriter { ctx }
    }

    /// Rewrites every configured holder of `app`, synthesizing placeholders for missing ones.
    ///
    /// Returns the number of conversion methods rewritten. Does nothing outside library
    /// compilation.
    pub fn rewrite(&self, app: &mut AppView) -> usize {
        if !self.ctx.is_library_compilation() {
            return 0;
        }
        let mut rewritten = 0;
        let mut placeholders: BTreeSet<TypeRef> = BTreeSet::new();
        for (ty, holder) in &self.ctx.spec.custom_conversion {
            let vivified = self.ctx.vivified_type(ty);
            if placeholders.contains(holder) {
                if let Some(class) = app.definition_for_mut(holder) {
                    add_placeholder_conversions(class, ty, &vivified);
                }
                continue;
            }
            match app.definition_for_mut(holder) {
                Some(class) if class.is_program() => {
                    rewritten += rewrite_conversions(class, ty, &vivified);
                }
                Some(_) => {}
                None => {
                    app.add_class(self.placeholder(holder, ty, &vivified));
                    placeholders.insert(holder.clone());
                }
            }
        }
        debug!(rewritten, placeholders = placeholders.len(), "custom conversions");
        rewritten
    }

    fn placeholder(&self, holder: &TypeRef, ty: &TypeRef, vivified: &TypeRef) -> ClassDef {
        warn!(holder = %holder, ty = %ty, "missing custom conversion holder");
        self.ctx.diagnostics.push(
            Diagnostic::new(
                DiagnosticSeverity::Warning,
                DiagnosticCategory::CustomConversion,
                format!(
                    "Missing custom conversion holder {holder} for {ty}, using a classpath \
                     placeholder."
                ),
            )
            .with_subject(holder.to_string()),
        );
        self.ctx
            .synthetics
            .register(holder.clone(), SyntheticKind::CustomConversionPlaceholder);
        let mut class = ClassDef::new(
            ClassKind::Classpath,
            holder.clone(),
            ClassAccessFlags::PUBLIC | ClassAccessFlags::FINAL | ClassAccessFlags::SYNTHETIC,
            Some(TypeRef::object()),
        );
        add_placeholder_conversions(&mut class, ty, vivified);
        class
    }
}

fn add_placeholder_conversions(class: &mut ClassDef, ty: &TypeRef, vivified: &TypeRef) {
    for proto in [
        Proto::new(vivified.clone(), vec![ty.clone()]),
        Proto::new(ty.clone(), vec![vivified.clone()]),
    ] {
        class.add_method(MethodDef::new(
            MethodRef::new(class.ty.clone(), CONVERT_METHOD_NAME, proto),
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        ));
    }
}

fn is_conversion_of(method: &MethodDef, ty: &TypeRef) -> bool {
    method.is_static()
        && method.name() == CONVERT_METHOD_NAME
        && method.reference.proto.arity() == 1
        && method.reference.proto.types().any(|t| t == ty)
}

/// Replaces `ty` by `vivified` in the signature and body of every conversion of `ty`.
fn rewrite_conversions(class: &mut ClassDef, ty: &TypeRef, vivified: &TypeRef) -> usize {
    let substitute = |t: &TypeRef| {
        if t == ty {
            vivified.clone()
        } else {
            t.clone()
        }
    };
    let mut rewritten = 0;
    for method in class.methods.iter_mut().filter(|m| is_conversion_of(m, ty)) {
        let proto = method.reference.proto.map_types(&substitute);
        method.reference = method.reference.with_proto(proto);
        if let Some(code) = method.code.as_mut() {
            code.map_types(&substitute);
        }
        rewritten += 1;
    }
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        desugar::options::DesugarOptions,
        ir::{CodeBuilder, InvokeKind},
        test::factories::{mref, platform, specification, TIME_CONVERSIONS, ZONE_ID},
    };

    fn library_context() -> DesugarContext {
        DesugarContext::new(
            specification().for_library_compilation(),
            DesugarOptions::default(),
        )
    }

    #[test]
    fn platform_side_becomes_vivified() {
        let mut app = platform();
        app.remove_class(&TypeRef::new(TIME_CONVERSIONS));
        let mut holder = ClassDef::new(
            ClassKind::Program,
            TypeRef::new(TIME_CONVERSIONS),
            ClassAccessFlags::PUBLIC | ClassAccessFlags::FINAL,
            Some(TypeRef::object()),
        );
        let to_platform = mref(TIME_CONVERSIONS, "convert", ZONE_ID, &["j$.time.ZoneId"]);
        let mut builder = CodeBuilder::new();
        let zone = builder.argument(TypeRef::new("j$.time.ZoneId"));
        let id = builder.invoke(
            InvokeKind::Virtual,
            mref("j$.time.ZoneId", "getId", "java.lang.String", &[]),
            vec![zone],
            false,
        );
        let converted = builder.invoke(
            InvokeKind::Static,
            mref(ZONE_ID, "of", ZONE_ID, &["java.lang.String"]),
            id.into_iter().collect(),
            false,
        );
        builder.return_value(converted);
        holder.add_method(
            MethodDef::new(to_platform, MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC)
                .with_code(builder.build()),
        );
        app.add_class(holder);

        let ctx = library_context();
        assert_eq!(CustomConversionRewriter::new(&ctx).rewrite(&mut app), 1);

        let class = app
            .definition_for(&TypeRef::new(TIME_CONVERSIONS))
            .expect("holder");
        let method = &class.methods[0];
        let vivified = TypeRef::new(ZONE_ID).vivified();
        assert_eq!(method.reference.proto.return_type, vivified);
        assert_eq!(
            method.reference.proto.parameters[0],
            TypeRef::new("j$.time.ZoneId")
        );
        let code = method.code.as_ref().expect("body");
        let of = code.invokes().nth(1).expect("factory call");
        assert_eq!(of.method.holder, vivified);
    }

    #[test]
    fn missing_holder_gets_a_placeholder() {
        let mut app = platform();
        app.remove_class(&TypeRef::new(TIME_CONVERSIONS));
        let ctx = library_context();

        assert_eq!(CustomConversionRewriter::new(&ctx).rewrite(&mut app), 0);
        let placeholder = app
            .definition_for(&TypeRef::new(TIME_CONVERSIONS))
            .expect("placeholder");
        assert_eq!(placeholder.kind, ClassKind::Classpath);
        assert_eq!(placeholder.methods.len(), 2);
        assert_eq!(ctx.diagnostics.warning_count(), 1);
        assert_eq!(
            ctx.synthetics.kind_of(&placeholder.ty),
            Some(SyntheticKind::CustomConversionPlaceholder)
        );
    }

    #[test]
    fn application_builds_are_left_alone() {
        let mut app = platform();
        app.remove_class(&TypeRef::new(TIME_CONVERSIONS));
        let ctx = DesugarContext::new(specification(), DesugarOptions::default());
        assert_eq!(CustomConversionRewriter::new(&ctx).rewrite(&mut app), 0);
        assert!(app.definition_for(&TypeRef::new(TIME_CONVERSIONS)).is_none());
    }
}
