//! Core types for grid sampling.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use projection::Coordinate;
use zarrs::array::DataType;

use crate::error::{GridError, Result};

/// Integer cell index in storage order.
pub type IndexPair = [usize; 2];

/// Fractional cell index in storage order.
pub type FractionalIndex = [f64; 2];

/// Dimension names that identify an easting/longitude axis.
pub const EASTING_DIMENSIONS: [&str; 4] = ["lon", "Easting", "x", "longitude"];

/// Storage order of the two grid dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisOrder {
    /// Storage is `[y, x]` (rows are northings).
    NorthingFirst,
    /// Storage is `[x, y]`.
    EastingFirst,
}

impl AxisOrder {
    /// Infer the order from the two storage dimension names.
    pub fn from_dimensions(dimensions: &[String]) -> Self {
        match dimensions.get(1) {
            Some(name) if EASTING_DIMENSIONS.contains(&name.as_str()) => Self::NorthingFirst,
            _ => Self::EastingFirst,
        }
    }

    /// Reorder an `(x, y)` coordinate to storage order.
    pub fn to_storage(&self, coord: Coordinate) -> [f64; 2] {
        match self {
            Self::NorthingFirst => [coord.y, coord.x],
            Self::EastingFirst => [coord.x, coord.y],
        }
    }

    /// Reorder a storage-order pair back to `(x, y)`.
    pub fn to_coordinate(&self, pair: [f64; 2]) -> Coordinate {
        match self {
            Self::NorthingFirst => Coordinate::new(pair[1], pair[0]),
            Self::EastingFirst => Coordinate::new(pair[0], pair[1]),
        }
    }

    /// Reorder an `(x, y)` pair of any values to storage order.
    pub fn order<T>(&self, x: T, y: T) -> [T; 2] {
        match self {
            Self::NorthingFirst => [y, x],
            Self::EastingFirst => [x, y],
        }
    }
}

impl fmt::Display for AxisOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NorthingFirst => write!(f, "northing_first"),
            Self::EastingFirst => write!(f, "easting_first"),
        }
    }
}

/// Numeric element type of a stored variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl ElementType {
    /// Item size in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    /// Map a Zarr data type; `None` for non-numeric types.
    pub fn from_data_type(data_type: &DataType) -> Option<Self> {
        Some(match data_type {
            DataType::Int8 => Self::Int8,
            DataType::Int16 => Self::Int16,
            DataType::Int32 => Self::Int32,
            DataType::Int64 => Self::Int64,
            DataType::UInt8 => Self::UInt8,
            DataType::UInt16 => Self::UInt16,
            DataType::UInt32 => Self::UInt32,
            DataType::UInt64 => Self::UInt64,
            DataType::Float32 => Self::Float32,
            DataType::Float64 => Self::Float64,
            _ => return None,
        })
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::Int8 => DataType::Int8,
            Self::Int16 => DataType::Int16,
            Self::Int32 => DataType::Int32,
            Self::Int64 => DataType::Int64,
            Self::UInt8 => DataType::UInt8,
            Self::UInt16 => DataType::UInt16,
            Self::UInt32 => DataType::UInt32,
            Self::UInt64 => DataType::UInt64,
            Self::Float32 => DataType::Float32,
            Self::Float64 => DataType::Float64,
        }
    }

    /// Decode a native-endian fill value.
    pub fn decode_ne_bytes(&self, bytes: &[u8]) -> Option<f64> {
        Some(match self {
            Self::Int8 => i8::from_ne_bytes(bytes.try_into().ok()?) as f64,
            Self::Int16 => i16::from_ne_bytes(bytes.try_into().ok()?) as f64,
            Self::Int32 => i32::from_ne_bytes(bytes.try_into().ok()?) as f64,
            Self::Int64 => i64::from_ne_bytes(bytes.try_into().ok()?) as f64,
            Self::UInt8 => u8::from_ne_bytes(bytes.try_into().ok()?) as f64,
            Self::UInt16 => u16::from_ne_bytes(bytes.try_into().ok()?) as f64,
            Self::UInt32 => u32::from_ne_bytes(bytes.try_into().ok()?) as f64,
            Self::UInt64 => u64::from_ne_bytes(bytes.try_into().ok()?) as f64,
            Self::Float32 => f32::from_ne_bytes(bytes.try_into().ok()?) as f64,
            Self::Float64 => f64::from_ne_bytes(bytes.try_into().ok()?),
        })
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "int8" | "i1" | "byte" => Ok(Self::Int8),
            "int16" | "i2" | "short" => Ok(Self::Int16),
            "int32" | "i4" | "int" => Ok(Self::Int32),
            "int64" | "i8" => Ok(Self::Int64),
            "uint8" | "u1" | "ubyte" => Ok(Self::UInt8),
            "uint16" | "u2" => Ok(Self::UInt16),
            "uint32" | "u4" => Ok(Self::UInt32),
            "uint64" | "u8" => Ok(Self::UInt64),
            "float32" | "f4" | "float" => Ok(Self::Float32),
            "float64" | "f8" | "double" => Ok(Self::Float64),
            other => Err(format!("unknown element type: {}", other)),
        }
    }
}

/// Metadata of one stored variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableInfo {
    pub name: String,
    /// Dimension names in storage order.
    pub dimensions: Vec<String>,
    pub shape: Vec<usize>,
    /// Chunk shape, if the store is chunked.
    pub chunk_shape: Option<Vec<usize>>,
    pub element_type: ElementType,
    pub attributes: Map<String, Value>,
    /// The array's declared fill value.
    pub fill_value: Option<f64>,
}

impl VariableInfo {
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the grid-mapping variable, for data variables.
    pub fn grid_mapping(&self) -> Option<&str> {
        self.attributes.get("grid_mapping").and_then(Value::as_str)
    }

    /// Value marking "no valid measurement".
    ///
    /// `_FillValue` takes precedence over the declared fill value; NaN when neither is set.
    pub fn no_data(&self) -> f64 {
        self.attributes
            .get("_FillValue")
            .and_then(json_number)
            .or(self.fill_value)
            .unwrap_or(f64::NAN)
    }
}

/// Read a JSON number, accepting the string forms Zarr uses for non-finite floats.
pub fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            other => other.trim().parse().ok(),
        },
        _ => None,
    }
}

/// Check a value against a no-data sentinel; NaN matches NaN.
pub fn is_no_data(value: f64, no_data: f64) -> bool {
    if no_data.is_nan() {
        value.is_nan()
    } else {
        value == no_data
    }
}

/// Convert nested `[[x, y], ...]` rows; every row must have two values.
pub fn coordinates_from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Vec<Coordinate>> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| match row.as_ref() {
            [x, y] => Ok(Coordinate::new(*x, *y)),
            other => Err(GridError::shape_mismatch(format!(
                "coordinate {} has {} values, expected 2",
                i,
                other.len()
            ))),
        })
        .collect()
}

/// A sample position on a transect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransectPoint {
    /// Position in the dataset's native CRS.
    pub coordinate: Coordinate,
    /// Distance in metres from the first vertex along the line.
    pub distance: f64,
}

/// Statistics about the chunk cache.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub memory_bytes: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn info(attributes: Map<String, Value>, fill_value: Option<f64>) -> VariableInfo {
        VariableInfo {
            name: "elevation".to_string(),
            dimensions: vec!["y".to_string(), "x".to_string()],
            shape: vec![3, 4],
            chunk_shape: None,
            element_type: ElementType::Float32,
            attributes,
            fill_value,
        }
    }

    #[test]
    fn test_axis_order_from_dimensions() {
        let yx = vec!["lat".to_string(), "lon".to_string()];
        assert_eq!(AxisOrder::from_dimensions(&yx), AxisOrder::NorthingFirst);

        let xy = vec!["x".to_string(), "y".to_string()];
        assert_eq!(AxisOrder::from_dimensions(&xy), AxisOrder::EastingFirst);

        let en = vec!["Northing".to_string(), "Easting".to_string()];
        assert_eq!(AxisOrder::from_dimensions(&en), AxisOrder::NorthingFirst);
    }

    #[test]
    fn test_axis_order_reorders_pairs() {
        let c = Coordinate::new(1.0, 2.0);
        assert_eq!(AxisOrder::NorthingFirst.to_storage(c), [2.0, 1.0]);
        assert_eq!(AxisOrder::EastingFirst.to_storage(c), [1.0, 2.0]);
        assert_eq!(AxisOrder::NorthingFirst.to_coordinate([2.0, 1.0]), c);
    }

    #[test]
    fn test_element_type_sizes_and_names() {
        assert_eq!(ElementType::Int8.size(), 1);
        assert_eq!(ElementType::UInt16.size(), 2);
        assert_eq!(ElementType::Float32.size(), 4);
        assert_eq!(ElementType::Float64.size(), 8);
        assert_eq!("f4".parse::<ElementType>(), Ok(ElementType::Float32));
        assert_eq!("INT8".parse::<ElementType>(), Ok(ElementType::Int8));
        assert!("complex64".parse::<ElementType>().is_err());
        assert_eq!(
            ElementType::from_data_type(&ElementType::UInt32.data_type()),
            Some(ElementType::UInt32)
        );
    }

    #[test]
    fn test_no_data_precedence() {
        let mut attrs = Map::new();
        attrs.insert("_FillValue".to_string(), json!(-9999.0));
        assert_eq!(info(attrs, Some(0.0)).no_data(), -9999.0);

        assert_eq!(info(Map::new(), Some(-1.0)).no_data(), -1.0);
        assert!(info(Map::new(), None).no_data().is_nan());

        let mut nan_attrs = Map::new();
        nan_attrs.insert("_FillValue".to_string(), json!("NaN"));
        assert!(info(nan_attrs, Some(0.0)).no_data().is_nan());
    }

    #[test]
    fn test_is_no_data_handles_nan() {
        assert!(is_no_data(f64::NAN, f64::NAN));
        assert!(!is_no_data(1.0, f64::NAN));
        assert!(is_no_data(-9999.0, -9999.0));
        assert!(!is_no_data(f64::NAN, -9999.0));
    }

    #[test]
    fn test_coordinate_input_shapes() {
        let rows = coordinates_from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(rows, vec![Coordinate::new(1.0, 2.0), Coordinate::new(3.0, 4.0)]);
        assert!(matches!(
            coordinates_from_rows(&[vec![1.0, 2.0], vec![3.0]]),
            Err(GridError::ShapeMismatch(_))
        ));
        assert!(coordinates_from_rows::<Vec<f64>>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_cache_stats_hit_rate() {
        let mut stats = CacheStats::default();
        assert!((stats.hit_rate() - 0.0).abs() < f64::EPSILON);

        stats.hits = 80;
        stats.misses = 20;
        assert!((stats.hit_rate() - 0.8).abs() < f64::EPSILON);
    }
}
