//! The output rename.
//!
//! While desugaring, application code names desugared types by their library name `T` and
//! platform types by their vivified mirror `V(T)`. Once all synthesis is committed, every
//! non-library class is renamed through the oracle in one simultaneous substitution,
//! `T -> T'` and `V(T) -> T`. Being simultaneous matters: applying the two renames one after
//! the other would turn a platform `V(T)` into `T` and then into `T'`.

use tracing::{debug, instrument};

use crate::{
    desugar::context::DesugarContext,
    metadata::{
        app::AppView,
        class::ClassDef,
        rewriter::TypeRewriter,
        types::{FieldRef, TypeRef},
    },
    Error, Result,
};

/// Renames every non-library class of `app`. Returns the number of classes whose contents
/// changed.
#[instrument(skip_all)]
pub fn apply_type_rewrites(app: &mut AppView, ctx: &DesugarContext) -> usize {
    let rename = |ty: &TypeRef| ctx.rewriter.rewritten_type(ty).unwrap_or_else(|| ty.clone());

    let targets: Vec<TypeRef> = app
        .classes()
        .filter(|class| !class.is_library())
        .map(|class| class.ty.clone())
        .collect();

    let mut changed = 0;
    for ty in targets {
        let Some(class) = app.remove_class(&ty) else {
            continue;
        };
        let renamed = rewrite_class(class.clone(), &rename);
        if renamed != class {
            changed += 1;
        }
        app.add_class(renamed);
    }
    debug!(changed, "applied type rewrites");
    changed
}

fn rewrite_class(mut class: ClassDef, rename: &impl Fn(&TypeRef) -> TypeRef) -> ClassDef {
    class.ty = rename(&class.ty);
    class.super_type = class.super_type.as_ref().map(rename);
    class.interfaces = class.interfaces.iter().map(rename).collect();
    for field in &mut class.fields {
        let reference = &field.reference;
        field.reference = FieldRef::new(
            rename(&reference.holder),
            &reference.name,
            rename(&reference.ty),
        );
    }
    for method in &mut class.methods {
        let reference = &method.reference;
        method.reference = reference
            .with_holder(rename(&reference.holder))
            .with_proto(reference.proto.map_types(rename));
        if let Some(code) = method.code.as_mut() {
            code.map_types(rename);
        }
    }
    class
}

/// Checks that no vivified type is referenced by a program class.
///
/// Classpath classes are not part of the output and may keep mentioning vivified types.
///
/// # Errors
///
/// Returns [`Error::VivifiedTypeEscaped`] naming the first vivified type found and where.
pub fn verify_no_vivified_types(app: &AppView) -> Result<()> {
    for class in app.program_classes() {
        if let Some(ty) = class_types(class).find(|ty| ty.is_vivified()) {
            return Err(Error::VivifiedTypeEscaped(format!("{ty} in {}", class.ty)));
        }
        for method in &class.methods {
            let mut escaped = None;
            if let Some(code) = &method.code {
                code.for_each_type(|ty| {
                    if escaped.is_none() && ty.is_vivified() {
                        escaped = Some(ty.clone());
                    }
                });
            }
            if let Some(ty) = escaped {
                return Err(Error::VivifiedTypeEscaped(format!(
                    "{ty} in {}",
                    method.reference
                )));
            }
        }
    }
    Ok(())
}

/// Types of the class declaration and of its member signatures.
fn class_types(class: &ClassDef) -> impl Iterator<Item = &TypeRef> {
    std::iter::once(&class.ty)
        .chain(class.super_type.iter())
        .chain(class.interfaces.iter())
        .chain(
            class
                .fields
                .iter()
                .flat_map(|f| [&f.reference.holder, &f.reference.ty]),
        )
        .chain(
            class
                .methods
                .iter()
                .flat_map(|m| {
                    std::iter::once(&m.reference.holder).chain(m.reference.proto.types())
                }),
        )
}
