//! Parsers for command-line values.

use grid_sampler::{coordinates_from_rows, Coordinate, Crs, DimensionRange, ElementType};

/// A list of coordinates given as one argument.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateList(pub Vec<Coordinate>);

/// Parse `"x,y;x,y"` into coordinates.
pub fn coordinates(s: &str) -> Result<CoordinateList, String> {
    let rows = s
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(numbers)
        .collect::<Result<Vec<_>, _>>()?;

    if rows.is_empty() {
        return Err("no coordinates given".to_string());
    }
    coordinates_from_rows(&rows)
        .map(CoordinateList)
        .map_err(|e| e.to_string())
}

/// Parse a comma-separated list of numbers.
pub fn numbers(s: &str) -> Result<Vec<f64>, String> {
    s.split(',')
        .map(|t| {
            t.trim()
                .parse::<f64>()
                .map_err(|_| format!("invalid number: '{}'", t.trim()))
        })
        .collect()
}

pub fn crs(s: &str) -> Result<Crs, String> {
    s.parse::<Crs>().map_err(|e| e.to_string())
}

/// Parse `"rows,cols"` chunking.
pub fn chunking(s: &str) -> Result<[usize; 2], String> {
    let parts = s
        .split(',')
        .map(|t| {
            t.trim()
                .parse::<usize>()
                .map_err(|_| format!("invalid chunk size: '{}'", t.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    match parts.as_slice() {
        [rows, cols] if *rows > 0 && *cols > 0 => Ok([*rows, *cols]),
        _ => Err(format!("chunking must be two positive sizes, got '{}'", s)),
    }
}

/// Parse `"dim=start:end"`.
pub fn dimension_range(s: &str) -> Result<(String, DimensionRange), String> {
    let (name, range) = s
        .split_once('=')
        .ok_or_else(|| format!("expected dim=start:end, got '{}'", s))?;
    let (start, end) = range
        .split_once(':')
        .ok_or_else(|| format!("expected start:end, got '{}'", range))?;

    let start = start
        .trim()
        .parse::<usize>()
        .map_err(|_| format!("invalid range start: '{}'", start))?;
    let end = end
        .trim()
        .parse::<usize>()
        .map_err(|_| format!("invalid range end: '{}'", end))?;

    if start >= end {
        return Err(format!("empty range {}:{} for '{}'", start, end, name));
    }
    Ok((name.trim().to_string(), DimensionRange::new(start, end)))
}

/// Parse `"from=to"` element type mappings.
pub fn datatype_mapping(s: &str) -> Result<(ElementType, ElementType), String> {
    let (from, to) = s
        .split_once('=')
        .ok_or_else(|| format!("expected from=to, got '{}'", s))?;
    Ok((from.trim().parse()?, to.trim().parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates() {
        let CoordinateList(coords) = coordinates("147.0,-35.0; 148.5,-36.25").unwrap();
        assert_eq!(
            coords,
            vec![Coordinate::new(147.0, -35.0), Coordinate::new(148.5, -36.25)]
        );

        assert!(coordinates("1,2,3").is_err());
        assert!(coordinates("1,2;3").is_err());
        assert!(coordinates("a,b").is_err());
        assert!(coordinates("").is_err());
    }

    #[test]
    fn test_crs() {
        assert_eq!(crs("EPSG:4326").unwrap(), Crs::WGS84);
        assert_eq!(crs("epsg:32755").unwrap(), Crs::Epsg(32755));
    }

    #[test]
    fn test_chunking() {
        assert_eq!(chunking("256, 512").unwrap(), [256, 512]);
        assert!(chunking("256").is_err());
        assert!(chunking("0,4").is_err());
    }

    #[test]
    fn test_dimension_range() {
        assert_eq!(
            dimension_range("y=10:20").unwrap(),
            ("y".to_string(), DimensionRange::new(10, 20))
        );
        assert!(dimension_range("y=20:10").is_err());
        assert!(dimension_range("y:10").is_err());
    }

    #[test]
    fn test_datatype_mapping() {
        assert_eq!(
            datatype_mapping("float64=float32").unwrap(),
            (ElementType::Float64, ElementType::Float32)
        );
        assert!(datatype_mapping("float64").is_err());
        assert!(datatype_mapping("float64=complex").is_err());
    }
}
