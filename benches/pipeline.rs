//! Benchmarks for the desugaring pipeline.
//!
//! Runs the whole pipeline over a synthetic application in which every class
//! - calls a platform method taking a desugared functional interface
//! - retargets a final core library member
//! - overrides a platform method, requiring a callback
//!
//! once on the rayon pool and once sequentially.

extern crate vivify;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use std::hint::black_box;
use vivify::prelude::*;

const CONFIGURATION: &str = r#"{
    "configuration_format_version": 101,
    "identifier": "bench:configuration:1.0.0",
    "required_compilation_api_level": 30,
    "synthesized_library_classes_package_prefix": "j$.",
    "common_flags": [
        {
            "api_level_below_or_equal": 25,
            "rewrite_prefix": {
                "java.time.": "j$.time.",
                "java.util.function.": "j$.util.function.",
                "java.util.Desugar": "j$.util.Desugar"
            },
            "wrapper_conversion": ["java.util.function.Consumer"],
            "retarget_core_library_member": {
                "java.util.Calendar#toInstant": "java.util.DesugarCalendar"
            }
        }
    ],
    "library_flags": [],
    "program_flags": []
}"#;

const CLASSES: usize = 500;
const CONSUMER: &str = "java.util.function.Consumer";

fn method(holder: &str, name: &str, return_type: &str, params: &[&str]) -> MethodRef {
    MethodRef::new(
        TypeRef::new(holder),
        name,
        Proto::new(
            TypeRef::new(return_type),
            params.iter().map(TypeRef::new).collect(),
        ),
    )
}

fn library(name: &str, methods: &[(MethodRef, MethodAccessFlags)]) -> ClassDef {
    let super_type = (name != "java.lang.Object").then(TypeRef::object);
    let mut class = ClassDef::new(
        ClassKind::Library,
        TypeRef::new(name),
        ClassAccessFlags::PUBLIC,
        super_type,
    );
    for (reference, flags) in methods {
        class.add_method(MethodDef::new(reference.clone(), *flags));
    }
    class
}

fn application() -> AppView {
    let public = MethodAccessFlags::PUBLIC;
    let for_each = method("java.util.ArrayList", "forEach", "void", &[CONSUMER]);
    let to_instant = method("java.util.Calendar", "toInstant", "java.time.Instant", &[]);

    let mut app = AppView::new();
    app.add_class(library("java.lang.Object", &[]));
    app.add_class(library(
        CONSUMER,
        &[(
            method(CONSUMER, "accept", "void", &["java.lang.Object"]),
            public | MethodAccessFlags::ABSTRACT,
        )],
    ));
    app.add_class(library("java.util.ArrayList", &[(for_each.clone(), public)]));
    app.add_class(library(
        "java.util.Calendar",
        &[(to_instant.clone(), public | MethodAccessFlags::FINAL)],
    ));

    for index in 0..CLASSES {
        let name = format!("app.List{index}");
        let mut class = ClassDef::new(
            ClassKind::Program,
            TypeRef::new(&name),
            ClassAccessFlags::PUBLIC,
            Some(TypeRef::new("java.util.ArrayList")),
        );

        let mut builder = CodeBuilder::new();
        let this = builder.argument(class.ty.clone());
        let consumer = builder.argument(TypeRef::new(CONSUMER));
        let calendar = builder.argument(TypeRef::new("java.util.Calendar"));
        builder.invoke(InvokeKind::Virtual, for_each.clone(), vec![this, consumer], false);
        let instant =
            builder.invoke(InvokeKind::Virtual, to_instant.clone(), vec![calendar], false);
        builder.return_value(instant);
        class.add_method(
            MethodDef::new(
                method(&name, "run", "java.time.Instant", &[CONSUMER, "java.util.Calendar"]),
                public,
            )
            .with_code(builder.build()),
        );
        class.add_method(MethodDef::new(
            method(&name, "forEach", "void", &[CONSUMER]),
            public,
        ));
        app.add_class(class);
    }
    app
}

fn bench_pipeline(c: &mut Criterion) {
    let spec = MultiApiLevelSpecification::from_json(CONFIGURATION)
        .unwrap()
        .for_compilation(AndroidApiLevel::L, false);
    let app = application();

    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Elements(CLASSES as u64));
    for (label, options) in [
        ("parallel", DesugarOptions::default()),
        ("sequential", DesugarOptions::default().sequential()),
    ] {
        group.bench_function(label, |b| {
            b.iter_batched(
                || (app.clone(), DesugaringPipeline::new(spec.clone(), options.clone())),
                |(mut app, mut pipeline)| {
                    let summary = pipeline.run(&mut app).unwrap();
                    black_box((app, summary))
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_specification(c: &mut Criterion) {
    c.bench_function("specification_from_json", |b| {
        b.iter(|| {
            let multi = MultiApiLevelSpecification::from_json(black_box(CONFIGURATION)).unwrap();
            black_box(multi.for_compilation(AndroidApiLevel::L, false))
        });
    });
}

criterion_group!(benches, bench_pipeline, bench_specification);
criterion_main!(benches);
