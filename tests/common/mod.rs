//! Shared fixtures for the integration tests: a small platform and a desugared library
//! configuration covering `java.time` and `java.util.function`.

#![allow(dead_code)]

use vivify::prelude::*;

pub const CONSUMER: &str = "java.util.function.Consumer";
pub const ZONE_ID: &str = "java.time.ZoneId";
pub const TIME_CONVERSIONS: &str = "java.time.TimeConversions";

pub const CONFIGURATION: &str = r#"{
    "configuration_format_version": 101,
    "identifier": "com.example:desugar_jdk_libs_configuration:2.0.0",
    "required_compilation_api_level": 30,
    "synthesized_library_classes_package_prefix": "j$.",
    "support_all_callbacks_from_library": false,
    "common_flags": [
        {
            "api_level_below_or_equal": 25,
            "rewrite_prefix": {
                "java.time.": "j$.time.",
                "java.util.function.": "j$.util.function.",
                "java.util.Desugar": "j$.util.Desugar"
            },
            "wrapper_conversion": ["java.util.function.Consumer"],
            "custom_conversion": { "java.time.ZoneId": "java.time.TimeConversions" },
            "retarget_core_library_member": {
                "java.util.Calendar#toInstant": "java.util.DesugarCalendar",
                "java.util.Date#toInstant": "java.util.DesugarDate"
            }
        }
    ],
    "library_flags": [
        {
            "api_level_below_or_equal": 25,
            "amend_library_method": ["public java.lang.String java.time.ZoneId.getId()"]
        }
    ],
    "program_flags": []
}"#;

/// The tables selected for an application build at API 21.
pub fn specification() -> Result<DesugaredLibrarySpecification> {
    specification_for(false)
}

/// The tables selected for a library or application build at API 21.
pub fn specification_for(library: bool) -> Result<DesugaredLibrarySpecification> {
    let multi = MultiApiLevelSpecification::from_json(CONFIGURATION)?;
    Ok(multi.for_compilation(AndroidApiLevel::L, library))
}

pub fn mref(holder: &str, name: &str, return_type: &str, params: &[&str]) -> MethodRef {
    MethodRef::new(
        TypeRef::new(holder),
        name,
        Proto::new(
            TypeRef::new(return_type),
            params.iter().map(TypeRef::new).collect(),
        ),
    )
}

fn class(
    kind: ClassKind,
    name: &str,
    flags: ClassAccessFlags,
    super_type: Option<&str>,
) -> ClassDef {
    ClassDef::new(kind, TypeRef::new(name), flags, super_type.map(TypeRef::new))
}

pub fn library_class(name: &str, super_type: Option<&str>) -> ClassDef {
    class(ClassKind::Library, name, ClassAccessFlags::PUBLIC, super_type)
}

pub fn program_class(name: &str, super_type: &str) -> ClassDef {
    class(ClassKind::Program, name, ClassAccessFlags::PUBLIC, Some(super_type))
}

/// Object, Consumer, ArrayList, ZoneId, TimeZone, Calendar, Date and the classpath
/// `TimeConversions` shipped with the desugared library.
pub fn platform() -> AppView {
    let public = MethodAccessFlags::PUBLIC;
    let mut app = AppView::new();

    let mut object = library_class("java.lang.Object", None);
    object.add_method(MethodDef::new(
        mref("java.lang.Object", "<init>", "void", &[]),
        public | MethodAccessFlags::CONSTRUCTOR,
    ));
    app.add_class(object);

    let mut consumer = class(
        ClassKind::Library,
        CONSUMER,
        ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT,
        Some("java.lang.Object"),
    );
    consumer.add_method(MethodDef::new(
        mref(CONSUMER, "accept", "void", &["java.lang.Object"]),
        public | MethodAccessFlags::ABSTRACT,
    ));
    app.add_class(consumer);

    let mut list = library_class("java.util.ArrayList", Some("java.lang.Object"));
    list.add_method(MethodDef::new(
        mref("java.util.ArrayList", "<init>", "void", &[]),
        public | MethodAccessFlags::CONSTRUCTOR,
    ));
    list.add_method(MethodDef::new(
        mref("java.util.ArrayList", "forEach", "void", &[CONSUMER]),
        public,
    ));
    app.add_class(list);

    let mut zone = class(
        ClassKind::Library,
        ZONE_ID,
        ClassAccessFlags::PUBLIC | ClassAccessFlags::ABSTRACT,
        Some("java.lang.Object"),
    );
    zone.add_method(MethodDef::new(
        mref(ZONE_ID, "getRules", "java.time.zone.ZoneRules", &[]),
        public | MethodAccessFlags::ABSTRACT,
    ));
    app.add_class(zone);

    let mut time_zone = library_class("java.util.TimeZone", Some("java.lang.Object"));
    time_zone.add_method(MethodDef::new(
        mref("java.util.TimeZone", "toZoneId", ZONE_ID, &[]),
        public,
    ));
    time_zone.add_method(MethodDef::new(
        mref("java.util.TimeZone", "setDefault", "void", &["java.util.TimeZone"]),
        public | MethodAccessFlags::STATIC,
    ));
    app.add_class(time_zone);

    let mut calendar = library_class("java.util.Calendar", Some("java.lang.Object"));
    calendar.add_method(MethodDef::new(
        mref("java.util.Calendar", "toInstant", "java.time.Instant", &[]),
        public | MethodAccessFlags::FINAL,
    ));
    app.add_class(calendar);

    let mut date = library_class("java.util.Date", Some("java.lang.Object"));
    date.add_method(MethodDef::new(
        mref("java.util.Date", "<init>", "void", &[]),
        public | MethodAccessFlags::CONSTRUCTOR,
    ));
    date.add_method(MethodDef::new(
        mref("java.util.Date", "toInstant", "java.time.Instant", &[]),
        public,
    ));
    app.add_class(date);

    let vivified_zone = TypeRef::new(ZONE_ID).vivified();
    let mut conversions = class(
        ClassKind::Classpath,
        TIME_CONVERSIONS,
        ClassAccessFlags::PUBLIC | ClassAccessFlags::FINAL,
        Some("java.lang.Object"),
    );
    for proto in [
        Proto::new(vivified_zone.clone(), vec![TypeRef::new(ZONE_ID)]),
        Proto::new(TypeRef::new(ZONE_ID), vec![vivified_zone]),
    ] {
        conversions.add_method(MethodDef::new(
            MethodRef::new(TypeRef::new(TIME_CONVERSIONS), "convert", proto),
            public | MethodAccessFlags::STATIC,
        ));
    }
    app.add_class(conversions);

    app
}

/// A public method of `holder` whose body passes its arguments (and a receiver for instance
/// calls) to `target` and returns the result.
pub fn calling_method(holder: &str, name: &str, kind: InvokeKind, target: &MethodRef) -> MethodDef {
    let mut builder = CodeBuilder::new();
    let mut args = Vec::new();
    if kind.has_receiver() {
        args.push(builder.argument(target.holder.clone()));
    }
    args.extend(builder.arguments(target.proto.parameters.iter()));
    let result = builder.invoke(kind, target.clone(), args, kind == InvokeKind::Interface);
    builder.return_value(result);

    let return_type = target.proto.return_type.name().to_string();
    MethodDef::new(
        mref(holder, name, &return_type, &[]),
        MethodAccessFlags::PUBLIC,
    )
    .with_code(builder.build())
}

/// Installs a tracing subscriber honoring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
