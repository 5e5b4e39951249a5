//! Coordinate Reference System identifiers and definitions.
//!
//! A [`Crs`] is either an EPSG code with a built-in PROJ.4 definition or a raw
//! PROJ.4 string. Grid files usually carry their reference system as OGC WKT
//! in a `spatial_ref` attribute; [`Crs::parse`] reduces that to the EPSG code
//! of the root element.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ProjectionError, ProjectionResult};

/// A coordinate reference system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    /// An EPSG registry code.
    Epsg(u32),
    /// A raw PROJ.4 definition string (whitespace-normalised).
    Proj(String),
}

impl Crs {
    /// WGS 84 geographic (longitude/latitude in degrees).
    pub const WGS84: Crs = Crs::Epsg(4326);

    /// Parse a CRS from any of the forms found in grid metadata.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326", "epsg:28355"
    /// - "urn:ogc:def:crs:EPSG::4326"
    /// - "CRS:84" (equivalent to EPSG:4326)
    /// - "+proj=utm +zone=55 +south +datum=WGS84"
    /// - OGC WKT1/WKT2 with a root-level `AUTHORITY["EPSG", ...]` or `ID["EPSG", ...]`
    pub fn parse(definition: &str) -> ProjectionResult<Self> {
        let trimmed = definition.trim();
        if trimmed.is_empty() {
            return Err(ProjectionError::InvalidDefinition(
                "empty CRS definition".to_string(),
            ));
        }

        if trimmed.starts_with('+') {
            let normalized = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
            return Ok(Crs::Proj(normalized));
        }

        if trimmed.contains('[') {
            return parse_wkt(trimmed);
        }

        let upper = trimmed.to_uppercase();
        if upper == "CRS:84" || upper == "OGC:CRS84" {
            return Ok(Crs::WGS84);
        }

        let code = upper
            .strip_prefix("EPSG:")
            .or_else(|| upper.strip_prefix("URN:OGC:DEF:CRS:EPSG::"))
            .or_else(|| upper.strip_prefix("URN:OGC:DEF:CRS:EPSG:6.6:"))
            .unwrap_or(&upper);

        code.trim()
            .parse::<u32>()
            .map(Crs::Epsg)
            .map_err(|_| ProjectionError::InvalidDefinition(trimmed.to_string()))
    }

    /// The EPSG code, if this CRS is registry-backed.
    pub fn epsg(&self) -> Option<u32> {
        match self {
            Crs::Epsg(code) => Some(*code),
            Crs::Proj(_) => None,
        }
    }

    /// PROJ.4 definition used to build the transform.
    pub fn proj_string(&self) -> ProjectionResult<String> {
        match self {
            Crs::Proj(definition) => Ok(definition.clone()),
            Crs::Epsg(code) => epsg_definition(*code)
                .ok_or_else(|| ProjectionError::UnsupportedCrs(self.to_string())),
        }
    }

    /// Check if this is a geographic (lon/lat in degrees) CRS.
    pub fn is_geographic(&self) -> bool {
        match self {
            Crs::Epsg(code) => matches!(code, 4326 | 4283 | 4269 | 7844),
            Crs::Proj(definition) => ["longlat", "latlong", "lonlat", "latlon"]
                .iter()
                .any(|name| definition.contains(&format!("+proj={}", name))),
        }
    }

    /// Check if this CRS is projected with metre units.
    pub fn is_metric(&self) -> bool {
        if self.is_geographic() {
            return false;
        }
        match self {
            Crs::Epsg(_) => true,
            Crs::Proj(definition) => definition
                .split_whitespace()
                .find_map(|token| token.strip_prefix("+units="))
                .map_or(true, |units| units == "m"),
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{}", code),
            Crs::Proj(definition) => write!(f, "{}", definition),
        }
    }
}

impl FromStr for Crs {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Crs::parse(s)
    }
}

/// Built-in PROJ.4 definitions for the EPSG codes common in gridded products.
fn epsg_definition(code: u32) -> Option<String> {
    const GDA: &str = "+ellps=GRS80 +towgs84=0,0,0,0,0,0,0";

    let definition = match code {
        4326 => "+proj=longlat +datum=WGS84 +no_defs".to_string(),
        4283 | 7844 => format!("+proj=longlat {} +no_defs", GDA),
        4269 => "+proj=longlat +ellps=GRS80 +towgs84=0,0,0 +no_defs".to_string(),
        3857 => "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs"
            .to_string(),
        3577 => format!(
            "+proj=aea +lat_0=0 +lon_0=132 +lat_1=-18 +lat_2=-36 +x_0=0 +y_0=0 {} +units=m +no_defs",
            GDA
        ),
        // WGS 84 / UTM north and south
        32601..=32660 => format!(
            "+proj=utm +zone={} +datum=WGS84 +units=m +no_defs",
            code - 32600
        ),
        32701..=32760 => format!(
            "+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs",
            code - 32700
        ),
        // GDA94 / MGA and GDA2020 / MGA
        28348..=28358 => format!(
            "+proj=utm +zone={} +south {} +units=m +no_defs",
            code - 28300,
            GDA
        ),
        7846..=7859 => format!(
            "+proj=utm +zone={} +south {} +units=m +no_defs",
            code - 7800,
            GDA
        ),
        _ => return None,
    };

    Some(definition)
}

/// Extract the EPSG code attached to the root element of a WKT string.
fn parse_wkt(wkt: &str) -> ProjectionResult<Crs> {
    let bytes = wkt.as_bytes();
    let mut depth = 0usize;
    let mut root_code = None;

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'[' | b'(' => depth += 1,
            b']' | b')' => depth = depth.saturating_sub(1),
            _ if depth == 1 => {
                let rest = &wkt[i..];
                let keyword_len = if rest.starts_with("AUTHORITY[") {
                    "AUTHORITY[".len()
                } else if rest.starts_with("ID[") && !wkt[..i].ends_with('_') {
                    "ID[".len()
                } else {
                    continue;
                };
                if let Some(code) = parse_authority_body(&rest[keyword_len..]) {
                    root_code = Some(code);
                }
            }
            _ => {}
        }
    }

    if let Some(code) = root_code {
        return Ok(Crs::Epsg(code));
    }

    // Unregistered geographic WKT on the WGS 84 datum
    if wkt.starts_with("GEOGCS") && wkt.contains("WGS_1984") {
        return Ok(Crs::WGS84);
    }

    Err(ProjectionError::UnsupportedCrs(format!(
        "no root EPSG authority in WKT: {}",
        wkt.chars().take(64).collect::<String>()
    )))
}

/// Parse `"EPSG","4326"]` or `"EPSG",4326]`.
fn parse_authority_body(body: &str) -> Option<u32> {
    let end = body.find(']')?;
    let mut parts = body[..end].split(',');
    let authority = parts.next()?.trim().trim_matches('"');
    if !authority.eq_ignore_ascii_case("EPSG") {
        return None;
    }
    parts.next()?.trim().trim_matches('"').parse().ok()
}
