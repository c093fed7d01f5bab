//! Library-side pre-passes of retargeting.
//!
//! Retarget destinations such as `java.util.DesugarCalendar` ship with the desugared library
//! and are usually absent from the platform the application is compiled against. The
//! [`LibraryTypeSynthesizer`] declares them, so later resolution of the redirected invokes
//! succeeds. [`check_for_assumed_library_types`] reports configuration entries that cannot
//! apply to the given platform.

use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    desugar::{context::DesugarContext, retarget::info::RetargetingInfo, synthetic::SyntheticKind},
    metadata::{
        app::AppView,
        class::{ClassDef, ClassKind, MethodDef},
        diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity},
        flags::{ClassAccessFlags, MethodAccessFlags},
        types::{MethodRef, TypeRef},
    },
};

/// Declares missing retarget destination classes and members on the library.
pub struct LibraryTypeSynthesizer<'a> {
    ctx: &'a DesugarContext,
}

impl<'a> LibraryTypeSynthesizer<'a> {
    /// Creates a synthesizer.
    #[must_use]
    pub fn new(ctx: &'a DesugarContext) -> Self {
        LibraryTypeSynthesizer { ctx }
    }

    /// Adds every missing destination class and member of `info` to `app`.
    ///
    /// Returns the number of classes created.
    pub fn synthesize(&self, app: &mut AppView, info: &RetargetingInfo) -> usize {
        let mut by_destination: BTreeMap<&TypeRef, Vec<&MethodRef>> = BTreeMap::new();
        for (_, target) in info.configured_targets() {
            by_destination.entry(&target.holder).or_default().push(target);
        }

        let mut created = 0;
        for (destination, targets) in by_destination {
            match app.definition_for_mut(destination) {
                Some(class) if class.is_library() => {
                    for target in targets {
                        class.add_method(declaration(target));
                    }
                }
                Some(_) => {}
                None => {
                    let mut class = ClassDef::new(
                        ClassKind::Library,
                        destination.clone(),
                        ClassAccessFlags::PUBLIC,
                        Some(TypeRef::object()),
                    );
                    for target in targets {
                        class.add_method(declaration(target));
                    }
                    self.ctx
                        .synthetics
                        .register(destination.clone(), SyntheticKind::LibraryType);
                    debug!(class = %destination, "declared retarget destination");
                    app.add_class(class);
                    created += 1;
                }
            }
        }
        created
    }
}

fn declaration(target: &MethodRef) -> MethodDef {
    MethodDef::new(
        target.clone(),
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
    )
}

/// Warns about retarget entries whose source class or member is absent from `app`.
///
/// Returns the number of warnings reported.
pub fn check_for_assumed_library_types(app: &AppView, ctx: &DesugarContext) -> usize {
    let mut reported = 0;
    for (name, holders) in &ctx.spec.retarget_core_library_member {
        for from in holders.keys() {
            let reason = match app.definition_for(from) {
                None => "the class is missing",
                Some(class) if class.methods_named(name).next().is_none() => {
                    "the member is missing"
                }
                Some(_) => continue,
            };
            ctx.diagnostics.push(
                Diagnostic::new(
                    DiagnosticSeverity::Warning,
                    DiagnosticCategory::Retarget,
                    format!(
                        "Cannot retarget core library member {name} from {from} because {reason}."
                    ),
                )
                .with_subject(from.to_string()),
            );
            reported += 1;
        }
    }
    reported
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        desugar::options::DesugarOptions,
        test::factories::{mref, platform, specification},
    };

    fn context() -> DesugarContext {
        let spec = specification()
            .with_retarget("toInstant", "java.util.Calendar", "java.util.DesugarCalendar")
            .with_retarget("toZoneId", "java.util.TimeZone", "java.util.DesugarTimeZone")
            .with_retarget("getTimeZone", "java.util.TimeZone", "java.util.DesugarTimeZone");
        DesugarContext::new(spec, DesugarOptions::default())
    }

    #[test]
    fn missing_destinations_are_declared() {
        let mut app = platform();
        let ctx = context();
        let info = RetargetingInfo::compute(&app, &ctx.spec);
        assert_eq!(LibraryTypeSynthesizer::new(&ctx).synthesize(&mut app, &info), 2);

        let time_zone = app
            .definition_for(&TypeRef::new("java.util.DesugarTimeZone"))
            .expect("destination");
        assert!(time_zone.is_library());
        assert_eq!(time_zone.super_type, Some(TypeRef::object()));
        assert_eq!(time_zone.methods.len(), 2);
        let to_zone_id = time_zone
            .lookup_method(&mref(
                "java.util.DesugarTimeZone",
                "toZoneId",
                "java.time.ZoneId",
                &["java.util.TimeZone"],
            ))
            .expect("instance member with receiver");
        assert!(to_zone_id.is_static());
        assert!(to_zone_id.code.is_none());
        assert_eq!(
            ctx.synthetics
                .kind_of(&TypeRef::new("java.util.DesugarCalendar")),
            Some(SyntheticKind::LibraryType)
        );
    }

    #[test]
    fn existing_destination_only_gets_missing_members() {
        let mut app = platform();
        let mut existing = ClassDef::new(
            ClassKind::Library,
            TypeRef::new("java.util.DesugarCalendar"),
            ClassAccessFlags::PUBLIC | ClassAccessFlags::FINAL,
            Some(TypeRef::object()),
        );
        existing.add_method(declaration(&mref(
            "java.util.DesugarCalendar",
            "toInstant",
            "java.time.Instant",
            &["java.util.Calendar"],
        )));
        app.add_class(existing);

        let ctx = context();
        let info = RetargetingInfo::compute(&app, &ctx.spec);
        assert_eq!(LibraryTypeSynthesizer::new(&ctx).synthesize(&mut app, &info), 1);
        let calendar = app
            .definition_for(&TypeRef::new("java.util.DesugarCalendar"))
            .expect("destination");
        assert_eq!(calendar.methods.len(), 1);
        assert!(calendar.is_final());
        assert_eq!(ctx.synthetics.kind_of(&calendar.ty), None);
    }

    #[test]
    fn missing_sources_are_reported() {
        let app = platform();
        let spec = specification()
            .with_retarget("toInstant", "java.util.Calendar", "java.util.DesugarCalendar")
            .with_retarget("toInstant", "java.util.Date", "java.util.DesugarDate")
            .with_retarget("toZoneId", "java.util.Calendar", "java.util.DesugarCalendar");
        let ctx = DesugarContext::new(spec, DesugarOptions::default());

        assert_eq!(check_for_assumed_library_types(&app, &ctx), 2);
        let messages: Vec<String> = ctx
            .diagnostics
            .warnings()
            .iter()
            .map(|d| d.message.clone())
            .collect();
        assert!(messages.contains(
            &"Cannot retarget core library member toInstant from java.util.Date because the \
              class is missing."
                .to_string()
        ));
        assert!(messages.contains(
            &"Cannot retarget core library member toZoneId from java.util.Calendar because the \
              member is missing."
                .to_string()
        ));
    }
}
