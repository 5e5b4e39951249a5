//! Integration tests over Zarr datasets written by the test fixtures.

use grid_sampler::testdata::{TestGrid, TEST_FILL_VALUE, TEST_SECONDARY_VARIABLE};
use grid_sampler::{
    AxisOrder, Coordinate, CoordinateTransform, Crs, ElementType, GridDataset, GridError,
    GridWriter, CompressionOptions, Proj4Transform, SamplerConfig, TransectPoint, VariableSpec,
    ZarrGridStore,
};
use serde_json::json;
use tempfile::TempDir;

fn open(grid: &TestGrid) -> (TempDir, GridDataset<ZarrGridStore, Proj4Transform>) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    grid.write(dir.path()).expect("Failed to write fixture");
    let dataset =
        GridDataset::open(dir.path(), SamplerConfig::default()).expect("Failed to open dataset");
    (dir, dataset)
}

fn expected(row: usize, col: usize) -> f64 {
    (col * 1000 + row) as f64
}

// =============================================================================
// Projected grid
// =============================================================================

#[test]
fn test_projected_geometry() {
    let grid = TestGrid::projected(10, 8);
    let (_dir, ds) = open(&grid);

    let summary = ds.summary().unwrap();
    assert_eq!(summary.data_variable, "elevation");
    assert_eq!(summary.shape, [8, 10]);
    assert_eq!(summary.axis_order, AxisOrder::NorthingFirst);
    assert_eq!(ds.geometry().crs(), &Crs::Epsg(32755));
    assert_eq!(summary.pixel_size, [100.0, 100.0]);
    assert_eq!(
        summary.bounds,
        [500_000.0, 6_100_000.0, 501_000.0, 6_100_800.0]
    );
    assert_eq!(summary.no_data, TEST_FILL_VALUE);
    assert_eq!(ds.nominal_pixel_metres(), [100.0, 100.0]);
}

#[test]
fn test_nearest_at_cell_centres() {
    let grid = TestGrid::projected(10, 8).with_no_data(2, 3);
    let (_dir, ds) = open(&grid);

    let cells = [(0, 0), (7, 9), (3, 4), (2, 3), (5, 1)];
    let coords: Vec<Coordinate> = cells.iter().map(|&(r, c)| grid.cell_centre(r, c)).collect();

    let values = ds.nearest_value(&coords, None, None, None).unwrap();
    for (&(r, c), v) in cells.iter().zip(&values) {
        if (r, c) == (2, 3) {
            assert_eq!(*v, TEST_FILL_VALUE);
        } else {
            assert_eq!(*v, expected(r, c), "cell ({}, {})", r, c);
        }
    }
}

#[test]
fn test_out_of_extent_points_are_no_data() {
    let grid = TestGrid::projected(10, 8);
    let (_dir, ds) = open(&grid);

    let coords = [
        Coordinate::new(499_999.0, 6_100_400.0),
        Coordinate::new(501_000.0, 6_100_400.0),
        Coordinate::new(500_500.0, 6_100_800.0),
        Coordinate::new(500_000.0, 6_100_000.0),
    ];
    let values = ds.nearest_value(&coords, None, None, None).unwrap();
    assert_eq!(values, vec![TEST_FILL_VALUE, TEST_FILL_VALUE, TEST_FILL_VALUE, 0.0]);
}

#[test]
fn test_batch_size_does_not_change_results() {
    let grid = TestGrid::projected(10, 8);
    let (_dir, ds) = open(&grid);

    let coords: Vec<Coordinate> = (0..40)
        .map(|i| Coordinate::new(500_010.0 + i as f64 * 24.0, 6_100_020.0 + i as f64 * 19.0))
        .collect();

    let whole = ds.nearest_value(&coords, None, None, None).unwrap();
    let tiny = ds.nearest_value(&coords, None, Some(8), None).unwrap();
    let interpolated_whole = ds.interpolated_value(&coords, None, None, None).unwrap();
    let interpolated_tiny = ds.interpolated_value(&coords, None, Some(8), None).unwrap();

    assert_eq!(whole, tiny);
    assert_eq!(interpolated_whole, interpolated_tiny);
    assert_eq!(whole.len(), 40);
}

#[test]
fn test_interpolated_between_cells() {
    let grid = TestGrid::projected(10, 8);
    let (_dir, ds) = open(&grid);

    let coords = [
        Coordinate::new(500_100.0, 6_100_100.0),
        grid.cell_centre(4, 6),
        Coordinate::new(500_075.0, 6_100_050.0),
    ];
    let values = ds.interpolated_value(&coords, None, None, None).unwrap();

    // Mean of cells (0,0), (0,1), (1,0) and (1,1)
    assert!((values[0] - 500.5).abs() < 1e-9);
    assert!((values[1] - expected(4, 6)).abs() < 1e-9);
    assert!((values[2] - 250.0).abs() < 1e-9);
}

#[test]
fn test_interpolation_next_to_no_data_is_no_data() {
    let grid = TestGrid::projected(10, 8).with_no_data(1, 1);
    let (_dir, ds) = open(&grid);

    let coords = [
        Coordinate::new(500_100.0, 6_100_100.0),
        grid.cell_centre(0, 0),
        grid.cell_centre(1, 1),
    ];
    let values = ds.interpolated_value(&coords, None, None, None).unwrap();
    assert_eq!(values[0], TEST_FILL_VALUE);
    assert_eq!(values[1], 0.0);
    assert_eq!(values[2], TEST_FILL_VALUE);
}

#[test]
fn test_queries_in_geographic_crs() {
    let grid = TestGrid::projected(10, 8);
    let (_dir, ds) = open(&grid);
    let transform = Proj4Transform::new();

    let native = [grid.cell_centre(3, 7), grid.cell_centre(6, 2)];
    let lon_lat = transform
        .transform(&native, &Crs::Epsg(32755), &Crs::WGS84)
        .unwrap();

    let values = ds.nearest_value(&lon_lat, Some(&Crs::WGS84), None, None).unwrap();
    assert_eq!(values, vec![expected(3, 7), expected(6, 2)]);
}

#[test]
fn test_untransformable_point_is_no_data() {
    let grid = TestGrid::projected(10, 8);
    let (_dir, ds) = open(&grid);
    let transform = Proj4Transform::new();

    let valid = transform
        .transform_point(grid.cell_centre(4, 5), &Crs::Epsg(32755), &Crs::WGS84)
        .unwrap();
    let coords = [valid, Coordinate::new(147.0, 95.0), Coordinate::new(f64::NAN, 0.0)];

    let nearest = ds.nearest_value(&coords, Some(&Crs::WGS84), None, None).unwrap();
    assert_eq!(nearest, vec![expected(4, 5), TEST_FILL_VALUE, TEST_FILL_VALUE]);

    let interpolated = ds
        .interpolated_value(&coords, Some(&Crs::WGS84), None, None)
        .unwrap();
    assert_eq!(interpolated.len(), coords.len());
    assert!((interpolated[0] - expected(4, 5)).abs() < 1e-3);
    assert_eq!(interpolated[1], TEST_FILL_VALUE);
    assert_eq!(interpolated[2], TEST_FILL_VALUE);
}

#[test]
fn test_secondary_variable() {
    let grid = TestGrid::projected(10, 8);
    let (_dir, ds) = open(&grid);

    let coords = [grid.cell_centre(2, 5), grid.cell_centre(7, 9)];
    let quality = ds
        .nearest_value(&coords, None, None, Some(TEST_SECONDARY_VARIABLE))
        .unwrap();
    assert_eq!(quality, vec![5.0, 9.0]);

    assert!(matches!(
        ds.nearest_value(&coords, None, None, Some("x")),
        Err(GridError::Configuration(_))
    ));
    assert!(matches!(
        ds.nearest_value(&coords, None, None, Some("absent")),
        Err(GridError::VariableNotFound(_))
    ));
}

#[test]
fn test_chunk_cache_serves_repeat_queries() {
    let grid = TestGrid::projected(10, 8).with_chunk(4);
    let (_dir, ds) = open(&grid);

    let coords = [grid.cell_centre(0, 0), grid.cell_centre(5, 5)];
    ds.nearest_value(&coords, None, None, None).unwrap();
    let first = ds.store().cache_stats();
    assert_eq!(first.misses, 2);

    ds.nearest_value(&coords, None, None, None).unwrap();
    let second = ds.store().cache_stats();
    assert_eq!(second.misses, 2);
    assert!(second.hits >= 2);
}

#[test]
fn test_integer_data_variable() {
    let grid = TestGrid::projected(6, 5).with_element_type(ElementType::Int32);
    let (_dir, ds) = open(&grid);

    assert_eq!(ds.data_variable().element_type, ElementType::Int32);
    let values = ds
        .nearest_value(&[grid.cell_centre(4, 5)], None, None, None)
        .unwrap();
    assert_eq!(values, vec![expected(4, 5)]);
}

// =============================================================================
// Orientation
// =============================================================================

#[test]
fn test_descending_y_axis() {
    let grid = TestGrid::projected(10, 8).with_descending_y();
    let (_dir, ds) = open(&grid);

    assert!(!ds.geometry().is_ascending(0));
    assert!(ds.geometry().is_ascending(1));

    // Storage row 0 is the northern edge
    let north = Coordinate::new(500_050.0, 6_100_750.0);
    let south = Coordinate::new(500_050.0, 6_100_050.0);
    let values = ds.nearest_value(&[north, south], None, None, None).unwrap();
    assert_eq!(values, vec![expected(0, 0), expected(7, 0)]);

    let between = Coordinate::new(500_050.0, 6_100_700.0);
    let interpolated = ds.interpolated_value(&[between], None, None, None).unwrap();
    assert!((interpolated[0] - 0.5).abs() < 1e-9);
}

// =============================================================================
// Transects
// =============================================================================

#[test]
fn test_projected_transect_values() {
    let grid = TestGrid::projected(10, 8);
    let (_dir, ds) = open(&grid);

    let vertices = [grid.cell_centre(0, 0), grid.cell_centre(0, 9)];
    let sampled = ds.transect_values(&vertices, None, Some(100.0), None).unwrap();

    assert_eq!(sampled.len(), 10);
    for (col, (point, value)) in sampled.iter().enumerate() {
        assert!((point.distance - col as f64 * 100.0).abs() < 1e-9);
        assert_eq!(*value, expected(0, col));
    }
}

#[test]
fn test_geographic_transect() {
    let grid = TestGrid::geographic(10, 10);
    let (_dir, ds) = open(&grid);

    assert_eq!(ds.geometry().crs(), &Crs::WGS84);
    assert_eq!(ds.geometry().axis_order(), AxisOrder::NorthingFirst);
    assert_eq!(ds.default_spacing(), 5000.0);

    let vertices = [grid.cell_centre(0, 0), grid.cell_centre(0, 9)];
    let points = ds.sample_transect(&vertices, None, None).unwrap();
    assert_eq!(points.metric_crs(), &Crs::Epsg(32755));

    let points: Vec<TransectPoint> = points.collect::<Result<_, _>>().unwrap();
    assert_eq!(points.len(), 3);
    assert_eq!(points[1].distance, 5000.0);
    let total = points[2].distance;
    assert!(total > 8_100.0 && total < 8_300.0, "length was {}", total);
    assert!((points[2].coordinate.x - 147.095).abs() < 1e-6);
}

#[test]
fn test_geographic_nearest() {
    let grid = TestGrid::geographic(10, 10);
    let (_dir, ds) = open(&grid);

    let coords = [grid.cell_centre(4, 2), Coordinate::new(146.0, -35.0)];
    let values = ds.nearest_value(&coords, None, None, None).unwrap();
    assert_eq!(values, vec![expected(4, 2), TEST_FILL_VALUE]);
}

// =============================================================================
// Configuration errors
// =============================================================================

#[test]
fn test_dataset_without_grid_mapping() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = GridWriter::create(dir.path(), CompressionOptions::uncompressed()).unwrap();
    writer
        .write_variable(
            VariableSpec::new("x", &["x"], &[2], ElementType::Float64),
            &[0.0, 1.0],
        )
        .unwrap();
    writer
        .write_variable(
            VariableSpec::new("band", &["x", "x2"], &[2, 2], ElementType::Float64)
                .with_attribute("units", json!("m")),
            &[1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();

    assert!(matches!(
        GridDataset::open(dir.path(), SamplerConfig::default()),
        Err(GridError::Configuration(_))
    ));
}

#[test]
fn test_open_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        GridDataset::open(dir.path().join("absent.zarr"), SamplerConfig::default()),
        Err(GridError::Storage(_))
    ));
}
