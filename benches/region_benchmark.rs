use criterion::{black_box, criterion_group, criterion_main, Criterion};
use geo::LineString;
use training_log::services::RegionService;

/// Build a 20x20 grid of square municipalities covering roughly the
/// Dutch bounding box (lon 3.3..7.3, lat 50.7..53.7).
fn grid_boundaries() -> String {
    let mut features = Vec::new();
    for row in 0..20 {
        for col in 0..20 {
            let lon = 3.3 + col as f64 * 0.2;
            let lat = 50.7 + row as f64 * 0.15;
            let feature = serde_json::json!({
                "type": "Feature",
                "properties": {
                    "statnaam": format!("Gemeente {row}-{col}"),
                    "water": "NEE"
                },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [lon, lat],
                        [lon + 0.2, lat],
                        [lon + 0.2, lat + 0.15],
                        [lon, lat + 0.15],
                        [lon, lat]
                    ]]
                }
            });
            features.push(feature);
        }
    }

    serde_json::json!({
        "type": "FeatureCollection",
        "features": features
    })
    .to_string()
}

/// A winding route through the grid with many points, similar in size
/// to a long ride's decoded polyline.
fn ride_route() -> LineString<f64> {
    let coords: Vec<(f64, f64)> = (0..2000)
        .map(|i| {
            let t = i as f64 / 2000.0;
            let lon = 4.0 + t * 2.5 + (t * 40.0).sin() * 0.05;
            let lat = 51.5 + t * 1.2 + (t * 25.0).cos() * 0.04;
            (lon, lat)
        })
        .collect();
    LineString::from(coords)
}

fn benchmark_municipality_detection(c: &mut Criterion) {
    let service =
        RegionService::load_from_json(&grid_boundaries()).expect("Failed to load boundaries");

    let real_line = ride_route();

    // Same shape but far away (Atlantic), rejected by the total bounds check
    let shifted_coords: Vec<_> = real_line.0.iter().map(|c| (c.x - 30.0, c.y)).collect();
    let shifted_line = LineString::from(shifted_coords);

    let mut group = c.benchmark_group("municipality_detection");

    group.bench_function("ride_through_grid", |b| {
        b.iter(|| service.municipalities_for_line(black_box(&real_line)))
    });

    group.bench_function("ride_far_away", |b| {
        b.iter(|| service.municipalities_for_line(black_box(&shifted_line)))
    });

    group.finish();
}

criterion_group!(benches, benchmark_municipality_detection);
criterion_main!(benches);
