use criterion::{black_box, criterion_group, criterion_main, Criterion};
use skytracker::cache::{CoordinateCache, ProjectedSky};
use skytracker::catalogs::{Catalog, Category, CelestialObject};
use skytracker::detection::{detect_by_direction, detect_by_point, DetectionThresholds};
use skytracker::projection::DomeGeometry;
use skytracker::{ObservingSite, ProjectionMode};
use nalgebra::{Point3, Vector3};

fn make_catalog(count: usize) -> Catalog {
    Catalog::from_objects((0..count).map(|i| {
        let ra = (i as f64 * 0.37) % 24.0;
        let dec = ((i as f64 * 7.3) % 180.0) - 90.0;
        CelestialObject::new(&format!("Star {}", i), Category::Star, ra, dec)
    }))
}

fn bench_projection(c: &mut Criterion) {
    let site = ObservingSite::default();
    let catalog = make_catalog(500);
    let flat = ProjectionMode::default();
    let dome = ProjectionMode::Dome(DomeGeometry::default());

    let mut group = c.benchmark_group("project_catalog");
    group.bench_function("flat_500", |b| {
        b.iter(|| ProjectedSky::compute(black_box(&catalog), black_box(6.75), &site, &flat))
    });
    group.bench_function("dome_500", |b| {
        b.iter(|| ProjectedSky::compute(black_box(&catalog), black_box(6.75), &site, &dome))
    });
    group.finish();
}

fn bench_cache(c: &mut Criterion) {
    let site = ObservingSite::default();
    let catalog = make_catalog(500);
    let mode = ProjectionMode::Dome(DomeGeometry::default());

    let mut group = c.benchmark_group("coordinate_cache");
    group.bench_function("refresh_hit", |b| {
        let mut cache = CoordinateCache::default();
        cache.update(6.75, &catalog, &site, &mode);
        b.iter(|| cache.refresh(black_box(6.7502), &catalog, &site, &mode))
    });
    group.bench_function("refresh_miss", |b| {
        let mut cache = CoordinateCache::default();
        let mut lst = 0.0;
        b.iter(|| {
            lst = (lst + 0.01) % 24.0;
            cache.refresh(black_box(lst), &catalog, &site, &mode)
        })
    });
    group.finish();
}

fn bench_detection(c: &mut Criterion) {
    let site = ObservingSite::default();
    let sky = ProjectedSky::compute(
        &make_catalog(500),
        6.75,
        &site,
        &ProjectionMode::Dome(DomeGeometry::default()),
    );
    let thresholds = DetectionThresholds::default();
    let origin = Point3::new(3.0, 3.0, 3.0);
    let view = Vector3::new(-0.5, 0.6, -0.6);

    let mut group = c.benchmark_group("detection");
    group.bench_function("by_point_500", |b| {
        b.iter(|| detect_by_point(black_box(&Point3::new(0.0, 28.0, 0.0)), &sky, &thresholds))
    });
    group.bench_function("by_direction_500", |b| {
        b.iter(|| detect_by_direction(black_box(&origin), black_box(&view), &sky, &thresholds))
    });
    group.finish();
}

criterion_group!(benches, bench_projection, bench_cache, bench_detection);
criterion_main!(benches);
