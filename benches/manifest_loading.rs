//! Benchmarks for manifest loading performance
//!
//! This benchmark measures:
//! - Full load cycle (read, validate, merge) over an in-memory source
//! - Load cycle scaling with the number of fragments
//! - Revision diff of two published manifests
//! - Screen resolution through the router

use std::sync::Arc;

use app_manifest::manifest::{load_app_manifest, MemoryFragmentSource};
use app_manifest::revision::{diff_app_revision_manifests, RevisionSnapshot};
use app_manifest::routes::ScreenRouter;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

const DESCRIPTOR: &str = r#"{"schema_version": "1.0.0", "version": "1"}"#;

/// An app with `fragments` route and view fragments of ten entries each.
fn app(fragments: usize) -> MemoryFragmentSource {
    let source = MemoryFragmentSource::new().with_file("manifest.json", DESCRIPTOR);
    for f in 0..fragments {
        let routes: Vec<_> = (0..10)
            .map(|i| {
                json!({
                    "id": format!("r{}_{}", f, i),
                    "method": "GET",
                    "path": format!("/api/f{}/r{}", f, i),
                    "handler": format!("h{}_{}", f, i)
                })
            })
            .collect();
        let screens: Vec<_> = (0..10)
            .map(|i| {
                json!({
                    "id": format!("screen.s{}_{}", f, i),
                    "route": format!("/s{}/{}/:id", f, i),
                    "layout": {"type": "Column", "children": [
                        {"type": "Text", "props": {"text": "{{state.title}}"}},
                        {"type": "Button", "props": {"action": "open_composer"}}
                    ]}
                })
            })
            .collect();
        source.insert(format!("app/routes/{:03}.json", f), json!({ "routes": routes }).to_string());
        source.insert(format!("app/views/{:03}.json", f), json!({ "screens": screens }).to_string());
    }
    source
}

fn bench_load_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("load_cycle");

    for fragments in [1usize, 10, 50] {
        let source = app(fragments);
        group.throughput(Throughput::Elements((fragments * 20) as u64));
        group.bench_with_input(BenchmarkId::new("fragments", fragments), &source, |b, source| {
            b.to_async(&rt).iter(|| async {
                let result = load_app_manifest(black_box(source), "", None).await;
                black_box(result.manifest.is_some())
            })
        });
    }

    group.finish();
}

fn bench_revision_diff(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let before = rt
        .block_on(load_app_manifest(&app(10), "", None))
        .manifest
        .unwrap();
    let before = serde_json::to_value(&before).unwrap();
    let mut after = before.clone();
    after["version"] = json!("2");
    after["routes"][3]["path"] = json!("/api/moved");

    let from = RevisionSnapshot::new("r1", before);
    let to = RevisionSnapshot::new("r2", after);

    c.bench_function("revision_diff", |b| {
        b.iter(|| black_box(diff_app_revision_manifests(black_box(&from), black_box(&to))))
    });
}

fn bench_screen_router(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let manifest = rt
        .block_on(load_app_manifest(&app(10), "", None))
        .manifest
        .unwrap();
    let router = ScreenRouter::from_manifest(Arc::new(manifest));

    let mut group = c.benchmark_group("screen_router");
    group.bench_function("core_hit", |b| b.iter(|| router.resolve(black_box("/@alice"))));
    group.bench_function("app_hit", |b| b.iter(|| router.resolve(black_box("/s9/9/42"))));
    group.bench_function("miss", |b| b.iter(|| router.resolve(black_box("/nowhere"))));
    group.finish();
}

criterion_group!(benches, bench_load_cycle, bench_revision_diff, bench_screen_router);
criterion_main!(benches);
