//! UTM zone selection for locally metric computations.

use crate::crs::Crs;

/// A UTM zone number with its hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmZone {
    pub zone: u8,
    pub south: bool,
}

impl UtmZone {
    /// Zone containing a WGS 84 longitude/latitude in degrees.
    ///
    /// Includes the south-west Norway and Svalbard exceptions.
    pub fn from_lon_lat(lon: f64, lat: f64) -> Self {
        let lon = normalize_longitude(lon);
        let mut zone = (((lon + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u8;

        if (56.0..64.0).contains(&lat) && (3.0..12.0).contains(&lon) {
            zone = 32;
        } else if (72.0..84.0).contains(&lat) {
            zone = match lon {
                l if (0.0..9.0).contains(&l) => 31,
                l if (9.0..21.0).contains(&l) => 33,
                l if (21.0..33.0).contains(&l) => 35,
                l if (33.0..42.0).contains(&l) => 37,
                _ => zone,
            };
        }

        Self {
            zone,
            south: lat < 0.0,
        }
    }

    /// WGS 84 / UTM EPSG code (326zz north, 327zz south).
    pub fn epsg(&self) -> u32 {
        let base = if self.south { 32700 } else { 32600 };
        base + u32::from(self.zone)
    }

    pub fn crs(&self) -> Crs {
        Crs::Epsg(self.epsg())
    }
}

fn normalize_longitude(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && lon > 0.0 {
        180.0
    } else {
        wrapped
    }
}
