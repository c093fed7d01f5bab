//! Declarations missing from the compilation library.
//!
//! The library jar a program compiles against can lag behind the devices it runs on, so a
//! specification may list members that exist at runtime but are absent from the jar. Amending
//! adds bodyless declarations for them, letting resolution elsewhere in the pipeline succeed.

use tracing::{debug, warn};

use crate::{
    desugar::context::DesugarContext,
    metadata::{
        app::AppView,
        class::{ClassDef, FieldDef, MethodDef},
        diagnostics::DiagnosticCategory,
        types::TypeRef,
    },
};

/// Adds the configured missing members to library classes.
pub struct LibraryAmender<'a> {
    ctx: &'a DesugarContext,
}

impl<'a> LibraryAmender<'a> {
    /// Creates an amender for the tables of `ctx`.
    #[must_use]
    pub fn new(ctx: &'a DesugarContext) -> Self {
        LibraryAmender { ctx }
    }

    /// Amends `app`. Returns the number of declarations added.
    ///
    /// Entries whose holder is missing are reported as warnings and skipped. Entries whose
    /// holder already declares the member are left alone.
    pub fn amend(&self, app: &mut AppView) -> usize {
        let spec = &self.ctx.spec;
        let level = self.ctx.options.min_api_level;
        let mut added = 0;

        for (method, flags) in &spec.amend_library_method {
            let Some(class) = self.library_holder(app, &method.holder) else {
                continue;
            };
            let declaration = MethodDef::new(method.clone(), *flags).with_api_level(level);
            if class.add_method(declaration) {
                debug!(method = %method, "amended library method");
                added += 1;
            }
        }

        for (field, flags) in &spec.amend_library_field {
            let Some(class) = self.library_holder(app, &field.holder) else {
                continue;
            };
            if class.add_field(FieldDef::new(field.clone(), *flags)) {
                debug!(field = %field, "amended library field");
                added += 1;
            }
        }
        added
    }

    fn library_holder<'b>(
        &self,
        app: &'b mut AppView,
        holder: &TypeRef,
    ) -> Option<&'b mut ClassDef> {
        match app.definition_for_mut(holder) {
            Some(class) if class.is_library() => Some(class),
            Some(_) => None,
            None => {
                warn!(holder = %holder, "cannot amend missing library class");
                self.ctx.diagnostics.warning(
                    DiagnosticCategory::Amendment,
                    format!("Cannot amend library class {holder} because it is missing."),
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        desugar::options::DesugarOptions,
        metadata::{
            apilevel::AndroidApiLevel,
            flags::{FieldAccessFlags, MethodAccessFlags},
            types::{FieldRef, MethodRef},
        },
        test::factories::{mref, platform, specification},
    };

    fn amending(
        methods: Vec<(MethodRef, MethodAccessFlags)>,
        fields: Vec<(FieldRef, FieldAccessFlags)>,
    ) -> DesugarContext {
        let mut spec = specification();
        spec.amend_library_method.extend(methods);
        spec.amend_library_field.extend(fields);
        DesugarContext::new(spec, DesugarOptions::default().with_min_api_level(AndroidApiLevel::N))
    }

    #[test]
    fn adds_missing_declarations_once() {
        let flags = MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC;
        let of = mref(
            "java.util.Optional",
            "ofNullable",
            "java.util.Optional",
            &["java.lang.Object"],
        );
        let empty = FieldRef::new(
            TypeRef::new("java.util.Optional"),
            "EMPTY",
            TypeRef::new("java.util.Optional"),
        );
        let ctx = amending(
            vec![(of.clone(), flags)],
            vec![(empty, FieldAccessFlags::PRIVATE | FieldAccessFlags::STATIC)],
        );
        let mut app = platform();
        let amender = LibraryAmender::new(&ctx);

        assert_eq!(amender.amend(&mut app), 2);
        assert_eq!(amender.amend(&mut app), 0);

        let optional = app
            .definition_for(&TypeRef::new("java.util.Optional"))
            .expect("optional");
        let declared = optional.lookup_method(&of).expect("amended");
        assert!(declared.code.is_none());
        assert_eq!(declared.flags, flags);
        assert_eq!(declared.api_level, Some(AndroidApiLevel::N));
        assert_eq!(optional.fields.len(), 1);
        assert_eq!(ctx.diagnostics.warning_count(), 0);
    }

    #[test]
    fn missing_holder_is_a_warning() {
        let ctx = amending(
            vec![(
                mref("java.util.Missing", "get", "void", &[]),
                MethodAccessFlags::PUBLIC,
            )],
            vec![],
        );
        let mut app = platform();
        assert_eq!(LibraryAmender::new(&ctx).amend(&mut app), 0);
        assert_eq!(ctx.diagnostics.warning_count(), 1);
        assert_eq!(
            ctx.diagnostics
                .by_category(DiagnosticCategory::Amendment)
                .len(),
            1
        );
    }
}
