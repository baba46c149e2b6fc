use criterion::{black_box, criterion_group, criterion_main, Criterion};
use partguard::prelude::*;
use partguard::xml::{self, Granularity};
use partguard::{validate_descriptor, validate_graphic, GraphicContext};
use std::path::{Path, PathBuf};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn bench_check_part(c: &mut Criterion) {
    let options = CheckOptions {
        output: OutputMode::CheckOnly,
        ..CheckOptions::default()
    };

    c.bench_function("check_part", |b| {
        b.iter(|| {
            PartGuardCore::check_part(
                black_box(&fixture_path("part.test_part.fzp")),
                black_box(&options),
            )
        });
    });
}

fn bench_graphic_walk(c: &mut Criterion) {
    let options = CheckOptions::default();
    let descriptor = xml::parse_file(&fixture_path("part.test_part.fzp")).unwrap();
    let mut sink = Diagnostics::new();
    let facts = validate_descriptor(&descriptor, Path::new("part.test_part.fzp"), &options, &mut sink);
    let graphic = xml::parse_file(&fixture_path("svg.pcb.test_part.svg")).unwrap();

    c.bench_function("graphic_walk_pcb", |b| {
        b.iter(|| {
            let mut doc = graphic.clone();
            let ctx = GraphicContext::for_view(ViewKind::Pcb, &facts, Some(BoardClass::ThroughHole), "");
            let mut sink = Diagnostics::new();
            validate_graphic(&mut doc, Path::new("svg.pcb.test_part.svg"), &ctx, &options, &mut sink);
            xml::to_string(black_box(&doc), Granularity::Attribute)
        });
    });
}

criterion_group!(benches, bench_check_part, bench_graphic_walk);
criterion_main!(benches);
