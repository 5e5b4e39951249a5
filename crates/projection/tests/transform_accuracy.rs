//! Transform accuracy against known reference points.

use projection::{Coordinate, CoordinateTransform, Crs, Proj4Transform};

#[test]
fn test_central_meridian_maps_to_false_easting() {
    let t = Proj4Transform::new();
    let out = t
        .transform_point(Coordinate::new(147.0, -35.0), &Crs::WGS84, &Crs::Epsg(32755))
        .unwrap();

    assert!((out.x - 500_000.0).abs() < 0.01, "easting was {}", out.x);
    assert!(
        out.y > 6_000_000.0 && out.y < 6_200_000.0,
        "northing was {}",
        out.y
    );
}

#[test]
fn test_geographic_utm_roundtrip() {
    let t = Proj4Transform::new();
    let utm = Crs::Epsg(32755);
    let points = vec![
        Coordinate::new(146.5, -34.2),
        Coordinate::new(147.9, -36.8),
        Coordinate::new(149.0, -35.3),
    ];

    let projected = t.transform(&points, &Crs::WGS84, &utm).unwrap();
    let back = t.transform(&projected, &utm, &Crs::WGS84).unwrap();

    for (original, restored) in points.iter().zip(back.iter()) {
        assert!((original.x - restored.x).abs() < 1e-6);
        assert!((original.y - restored.y).abs() < 1e-6);
    }
}

#[test]
fn test_projected_distances_are_metric() {
    let t = Proj4Transform::new();
    let utm = Crs::Epsg(32755);
    // One arc-minute of latitude is roughly 1852 metres
    let a = t
        .transform_point(Coordinate::new(147.0, -35.0), &Crs::WGS84, &utm)
        .unwrap();
    let b = t
        .transform_point(Coordinate::new(147.0, -35.0 - 1.0 / 60.0), &Crs::WGS84, &utm)
        .unwrap();

    let d = a.distance(&b);
    assert!((d - 1850.0).abs() < 10.0, "distance was {}", d);
}

#[test]
fn test_parsed_wkt_transforms() {
    let t = Proj4Transform::new();
    let crs: Crs = "EPSG:28355".parse().unwrap();
    let out = t
        .transform_point(Coordinate::new(147.0, -35.0), &Crs::Epsg(4283), &crs)
        .unwrap();
    assert!((out.x - 500_000.0).abs() < 0.01);
}
