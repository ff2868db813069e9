use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use winery_map::catalog::{Catalog, WineryRecord};
use winery_map::cluster::{BoundingBox, ClusterIndex, ClusterOptions, MapRegion};
use winery_map::map::{MapRenderer, Viewport};
use winery_map::merge::{StatusMerge, StatusSnapshot};
use winery_map::status::{StatusFlags, StatusMap};

/// Deterministic scatter over the US east coast
fn synthetic_catalog(n: usize) -> Arc<Catalog> {
    let mut seed: u64 = 0x9E37_79B9_7F4A_7C15;
    let mut next = move || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        (seed % 1_000_000) as f64 / 1_000_000.0
    };
    let records = (0..n)
        .map(|i| {
            let lat = 34.0 + next() * 8.0;
            let lng = -84.0 + next() * 10.0;
            WineryRecord::new(&i.to_string(), &format!("Winery {i}"), "", lat, lng)
        })
        .collect();
    Arc::new(Catalog::new(records).expect("unique ids"))
}

fn status_for(catalog: &Catalog) -> Arc<StatusMap> {
    let map = catalog
        .records()
        .iter()
        .step_by(7)
        .map(|r| {
            let flags = StatusFlags {
                visited: true,
                visit_count: 1,
                ..StatusFlags::default()
            };
            (r.id.clone(), flags)
        })
        .collect();
    Arc::new(map)
}

fn bench_pipeline(c: &mut Criterion) {
    let catalog = synthetic_catalog(5_000);
    let status = StatusSnapshot::Loaded(status_for(&catalog));

    c.bench_function("merge_5k", |b| {
        b.iter(|| {
            // Fresh memo each time so the merge actually runs
            let mut merge = StatusMerge::new();
            black_box(merge.merge(&catalog, &status))
        })
    });

    let enriched = StatusMerge::new().merge(&catalog, &status);
    c.bench_function("index_build_5k", |b| {
        b.iter(|| black_box(ClusterIndex::from_wineries(&enriched, ClusterOptions::default())))
    });

    let index = ClusterIndex::from_wineries(&enriched, ClusterOptions::default());
    let state = MapRegion::new(38.0, -79.0, 4.0, 5.0);
    c.bench_function("get_clusters_state_z6", |b| {
        b.iter(|| black_box(index.get_clusters(state.bbox(), 6)))
    });
    c.bench_function("get_clusters_world_z0", |b| {
        b.iter(|| black_box(index.get_clusters(BoundingBox::WORLD, 0)))
    });
    c.bench_function("get_clusters_street_z14", |b| {
        let street = MapRegion::new(38.0, -79.0, 0.02, 0.02);
        b.iter(|| black_box(index.get_clusters(street.bbox(), 14)))
    });

    let markers = index.get_clusters(state.bbox(), 6).unwrap_or_default();
    let renderer = MapRenderer::new();
    let viewport = Viewport::new(-79.0, 38.0, 72.0, 320, 160);
    c.bench_function("render_markers", |b| {
        b.iter(|| black_box(renderer.render(160, 40, &viewport, &markers)))
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
