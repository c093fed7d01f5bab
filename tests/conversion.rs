//! API conversion integration tests.
//!
//! Each test builds a small application on top of the shared platform, runs the full
//! [`DesugaringPipeline`] and inspects the renamed output:
//! 1. Inline conversion of library calls in whole-program builds
//! 2. Custom conversions for types with a hand written converter
//! 3. Callbacks on application overrides of library methods
//! 4. Outlined conversions in per-class builds
//! 5. Diagnostics for conversions that cannot be generated

mod common;

use common::{
    calling_method, init_tracing, library_class, mref, platform, program_class, specification,
    CONSUMER, ZONE_ID,
};
use vivify::prelude::*;

fn class<'a>(app: &'a AppView, name: &str) -> Result<&'a ClassDef> {
    app.definition_for(&TypeRef::new(name))
        .ok_or_else(|| Error::TypeNotFound(TypeRef::new(name)))
}

fn body<'a>(app: &'a AppView, holder: &str, name: &str) -> Result<&'a Code> {
    class(app, holder)?
        .methods
        .iter()
        .find(|m| m.name() == name)
        .and_then(|m| m.code.as_ref())
        .ok_or_else(|| Error::MethodNotFound(format!("{holder}#{name}")))
}

fn app_calling(target: &MethodRef, kind: InvokeKind) -> AppView {
    let mut app = platform();
    let mut main = program_class("app.Main", "java.lang.Object");
    main.add_method(calling_method("app.Main", "run", kind, target));
    app.add_class(main);
    app
}

#[test]
fn test_inline_conversion_of_wrapped_parameter() -> Result<()> {
    init_tracing();
    let for_each = mref("java.util.ArrayList", "forEach", "void", &[CONSUMER]);
    let mut app = app_calling(&for_each, InvokeKind::Virtual);

    let options = DesugarOptions::default().with_validation();
    let summary = DesugaringPipeline::new(specification()?, options).run(&mut app)?;
    assert_eq!(summary.converted, 1);
    assert_eq!(summary.wrappers, 1);
    assert_eq!(summary.events.get(SynthesisEventKind::WrapperClasspathClass), 2);

    let invokes: Vec<&Invoke> = body(&app, "app.Main", "run")?.invokes().collect();
    assert_eq!(invokes.len(), 2);

    // The desugared consumer is wrapped before it reaches the platform
    let convert = &invokes[0].method;
    assert_eq!(convert.name(), "convert");
    assert_eq!(
        convert.holder,
        TypeRef::new("j$.util.function.Consumer$-WRP")
    );
    assert_eq!(convert.proto.parameters[0], TypeRef::new("j$.util.function.Consumer"));
    assert_eq!(convert.proto.return_type, TypeRef::new(CONSUMER));

    assert_eq!(invokes[1].kind, InvokeKind::Virtual);
    assert_eq!(invokes[1].method.proto.parameters[0], TypeRef::new(CONSUMER));
    assert_eq!(invokes[1].args[1], invokes[0].dest.expect("converted value"));

    let wrapper = class(&app, "j$.util.function.Consumer$-WRP")?;
    assert_eq!(wrapper.kind, ClassKind::Classpath);
    assert!(class(&app, "j$.util.function.Consumer$-V-WRP").is_ok());
    assert!(!summary.diagnostics.has_errors());
    Ok(())
}

#[test]
fn test_custom_conversion_of_returned_value() -> Result<()> {
    let to_zone_id = mref("java.util.TimeZone", "toZoneId", ZONE_ID, &[]);
    let mut app = app_calling(&to_zone_id, InvokeKind::Virtual);

    let summary =
        DesugaringPipeline::new(specification()?, DesugarOptions::default()).run(&mut app)?;
    assert_eq!(summary.converted, 1);
    assert_eq!(summary.wrappers, 0);

    let code = body(&app, "app.Main", "run")?;
    let invokes: Vec<&Invoke> = code.invokes().collect();
    assert_eq!(invokes.len(), 2);
    assert_eq!(invokes[0].method.proto.return_type, TypeRef::new(ZONE_ID));

    // The platform zone comes back through the library's converter
    let convert = &invokes[1].method;
    assert_eq!(convert.holder, TypeRef::new("j$.time.TimeConversions"));
    assert_eq!(convert.proto.parameters[0], TypeRef::new(ZONE_ID));
    assert_eq!(convert.proto.return_type, TypeRef::new("j$.time.ZoneId"));
    assert_eq!(invokes[1].args[0], invokes[0].dest.expect("platform zone"));

    let main = class(&app, "app.Main")?;
    assert_eq!(
        main.methods[0].reference.proto.return_type,
        TypeRef::new("j$.time.ZoneId")
    );
    Ok(())
}

#[test]
fn test_callback_for_library_override() -> Result<()> {
    let mut app = platform();
    let mut list = program_class("app.MyList", "java.util.ArrayList");
    list.add_method(MethodDef::new(
        mref("app.MyList", "forEach", "void", &[CONSUMER]),
        MethodAccessFlags::PUBLIC,
    ));
    app.add_class(list);

    let options = DesugarOptions::default().with_validation().with_tracking();
    let summary = DesugaringPipeline::new(specification()?, options).run(&mut app)?;
    assert_eq!(summary.callbacks, 1);
    assert_eq!(summary.events.get(SynthesisEventKind::CallbackMethod), 1);

    let list = class(&app, "app.MyList")?;
    let overloads: Vec<&MethodDef> = list.methods_named("forEach").collect();
    assert_eq!(overloads.len(), 2);

    // The override now takes the desugared consumer, the callback the platform one
    let callback = overloads
        .iter()
        .find(|m| m.flags.contains(MethodAccessFlags::SYNTHETIC))
        .expect("callback");
    assert_eq!(callback.reference.proto.parameters[0], TypeRef::new(CONSUMER));
    let original = overloads
        .iter()
        .find(|m| !m.flags.contains(MethodAccessFlags::SYNTHETIC))
        .expect("override");
    assert_eq!(
        original.reference.proto.parameters[0],
        TypeRef::new("j$.util.function.Consumer")
    );

    let delegation: Vec<&Invoke> = callback.code.as_ref().expect("body").invokes().collect();
    assert_eq!(delegation.len(), 2);
    assert_eq!(delegation[1].method, original.reference);

    let tracked: Vec<&Diagnostic> = summary
        .diagnostics
        .by_category(DiagnosticCategory::Tracking);
    assert_eq!(tracked.len(), 2);
    assert!(tracked
        .iter()
        .any(|d| d.message.starts_with("Tracked callback desugared API conversions: ")
            && d.message.contains("app.MyList#forEach")));
    Ok(())
}

#[test]
fn test_per_class_build_outlines_conversions() -> Result<()> {
    let for_each = mref("java.util.ArrayList", "forEach", "void", &[CONSUMER]);
    let mut app = app_calling(&for_each, InvokeKind::Virtual);

    let options = DesugarOptions::per_class(AndroidApiLevel::L);
    let mut pipeline = DesugaringPipeline::new(specification()?, options);
    let summary = pipeline.run(&mut app)?;
    assert_eq!(summary.events.get(SynthesisEventKind::ApiConversionOutline), 1);

    let outlines = pipeline
        .context()
        .synthetics
        .of_kind(SyntheticKind::ApiConversionOutline);
    assert_eq!(outlines.len(), 1);
    let outline = class(&app, outlines[0].name())?;
    assert!(outline.flags.contains(ClassAccessFlags::SYNTHETIC));

    // The call site is a single static call of the outline, taking the receiver first
    let invokes: Vec<&Invoke> = body(&app, "app.Main", "run")?.invokes().collect();
    assert_eq!(invokes.len(), 1);
    assert_eq!(invokes[0].kind, InvokeKind::Static);
    assert_eq!(invokes[0].method.holder, outline.ty);
    assert_eq!(invokes[0].method.name(), "apiConversionCall");
    assert_eq!(
        invokes[0].method.proto.parameters.to_vec(),
        vec![
            TypeRef::new("java.util.ArrayList"),
            TypeRef::new("j$.util.function.Consumer")
        ]
    );

    let outlined: Vec<&Invoke> = outline.methods[0]
        .code
        .as_ref()
        .expect("outline body")
        .invokes()
        .collect();
    assert_eq!(outlined.len(), 2);
    assert_eq!(outlined[1].method.proto.parameters[0], TypeRef::new(CONSUMER));
    Ok(())
}

#[test]
fn test_per_class_super_call_outline() -> Result<()> {
    let for_each = mref("java.util.ArrayList", "forEach", "void", &[CONSUMER]);
    let mut app = platform();
    let mut list = program_class("app.MyList", "java.util.ArrayList");
    let mut builder = CodeBuilder::new();
    let receiver = builder.argument(TypeRef::new("app.MyList"));
    let consumer = builder.argument(TypeRef::new(CONSUMER));
    for _ in 0..2 {
        builder.invoke(
            InvokeKind::Super,
            for_each.clone(),
            vec![receiver, consumer],
            false,
        );
    }
    builder.return_value(None);
    list.add_method(
        MethodDef::new(
            mref("app.MyList", "twice", "void", &[CONSUMER]),
            MethodAccessFlags::PUBLIC,
        )
        .with_code(builder.build()),
    );
    app.add_class(list);

    let options = DesugarOptions::per_class(AndroidApiLevel::L);
    let summary = DesugaringPipeline::new(specification()?, options).run(&mut app)?;
    assert_eq!(summary.converted, 2);
    assert_eq!(
        summary.events.get(SynthesisEventKind::ApiConversionSuperOutline),
        1
    );

    let list = class(&app, "app.MyList")?;
    let outline = list
        .methods
        .iter()
        .find(|m| m.name() == "$api$convert$super$forEach")
        .expect("super outline");
    assert!(outline.is_static());
    assert_eq!(outline.reference.proto.parameters[0], TypeRef::new("app.MyList"));

    let calls: Vec<&Invoke> = body(&app, "app.MyList", "twice")?.invokes().collect();
    assert!(calls.iter().all(|call| call.method == outline.reference));
    Ok(())
}

#[test]
fn test_unconvertible_type_is_reported_and_left_alone() -> Result<()> {
    let instant = mref("android.app.Clock", "instant", "java.time.Instant", &[]);
    let mut app = app_calling(&instant, InvokeKind::Virtual);
    let mut clock = library_class("android.app.Clock", Some("java.lang.Object"));
    clock.add_method(MethodDef::new(instant.clone(), MethodAccessFlags::PUBLIC));
    app.add_class(clock);

    let summary =
        DesugaringPipeline::new(specification()?, DesugarOptions::default()).run(&mut app)?;

    let conversion = summary
        .diagnostics
        .by_category(DiagnosticCategory::Conversion);
    assert_eq!(conversion.len(), 1);
    assert_eq!(conversion[0].severity, DiagnosticSeverity::Info);
    assert_eq!(
        conversion[0].message,
        "Invoke to android.app.Clock#instant may not work correctly at runtime \
         (Cannot convert return type j$.time.Instant)."
    );
    assert_eq!(conversion[0].direction, Some(ConversionDirection::Return));

    let invokes: Vec<&Invoke> = body(&app, "app.Main", "run")?.invokes().collect();
    assert_eq!(invokes.len(), 1);
    assert_eq!(
        invokes[0].method.proto.return_type,
        TypeRef::new("j$.time.Instant")
    );
    Ok(())
}

#[test]
fn test_vivified_form_is_kept_on_request() -> Result<()> {
    let for_each = mref("java.util.ArrayList", "forEach", "void", &[CONSUMER]);
    let mut app = app_calling(&for_each, InvokeKind::Virtual);

    let options = DesugarOptions::default().without_type_rewrites().sequential();
    let summary = DesugaringPipeline::new(specification()?, options).run(&mut app)?;
    assert_eq!(summary.renamed, 0);

    let invokes: Vec<&Invoke> = body(&app, "app.Main", "run")?.invokes().collect();
    assert_eq!(
        invokes[1].method.proto.parameters[0],
        TypeRef::new(CONSUMER).vivified()
    );
    Ok(())
}

#[test]
fn test_per_class_outlines_of_overloads_are_distinct() -> Result<()> {
    let for_each = mref("java.util.ArrayList", "forEach", "void", &[CONSUMER]);
    let mut app = app_calling(&for_each, InvokeKind::Virtual);
    let mut overload = calling_method("app.Main", "run", InvokeKind::Virtual, &for_each);
    overload.reference = mref("app.Main", "run", "void", &["int"]);
    app.definition_for_mut(&TypeRef::new("app.Main"))
        .expect("main")
        .add_method(overload);

    let options = DesugarOptions::per_class(AndroidApiLevel::L);
    let mut pipeline = DesugaringPipeline::new(specification()?, options);
    let summary = pipeline.run(&mut app)?;
    assert_eq!(summary.converted, 2);
    assert_eq!(summary.events.get(SynthesisEventKind::ApiConversionOutline), 2);

    let outlines = pipeline
        .context()
        .synthetics
        .of_kind(SyntheticKind::ApiConversionOutline);
    assert_eq!(outlines.len(), 2);
    assert_ne!(outlines[0], outlines[1]);
    for outline in &outlines {
        assert!(class(&app, outline.name())?.is_program());
    }
    Ok(())
}

#[test]
fn test_existing_classpath_wrapper_is_reused() -> Result<()> {
    let for_each = mref("java.util.ArrayList", "forEach", "void", &[CONSUMER]);
    let mut app = app_calling(&for_each, InvokeKind::Virtual);
    app.add_class(ClassDef::new(
        ClassKind::Classpath,
        TypeRef::new("java.util.function.Consumer$-WRP"),
        ClassAccessFlags::PUBLIC | ClassAccessFlags::FINAL,
        Some(TypeRef::object()),
    ));

    let summary =
        DesugaringPipeline::new(specification()?, DesugarOptions::default()).run(&mut app)?;
    assert_eq!(summary.converted, 1);

    let wrapper = class(&app, "j$.util.function.Consumer$-WRP")?;
    assert_eq!(wrapper.kind, ClassKind::Classpath);
    assert!(wrapper.methods.is_empty());
    assert!(class(&app, "j$.util.function.Consumer$-V-WRP").is_ok());
    Ok(())
}
