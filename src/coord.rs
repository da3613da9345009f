//! Conversions between WGS 84 positions and the EPSG:3857 (Pseudo-Mercator)
//! tile pyramid used by OSM-style tile servers.

use std::f64::consts::PI;
use std::fmt;

/// Default edge length of a tile in pixels.
pub const TILE_SIZE: u32 = 256;

/// A geographic position in degrees.
/// Valid positions have a latitude in (-90, 90) and a longitude in (-180, 180).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> LatLon {
        LatLon { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat > -90.0 && self.lat < 90.0 && self.lon > -180.0 && self.lon < 180.0
    }
}

/// A position in map coordinates.
/// Valid values for x and y lie in the interval [0.0, 1.0].
#[derive(Copy, Debug, PartialEq, Clone)]
pub struct MapCoord {
    pub x: f64,
    pub y: f64,
}

impl MapCoord {
    pub fn new(x: f64, y: f64) -> MapCoord {
        MapCoord { x, y }
    }

    pub fn from_latlon(latitude: f64, longitude: f64) -> MapCoord {
        let x = (longitude + 180.0) / 360.0;
        let pi_lat = latitude.to_radians();
        let y = (1.0 - f64::ln(f64::tan(pi_lat) + 1.0 / f64::cos(pi_lat)) / PI) / 2.0;

        MapCoord { x, y }
    }

    pub fn to_latlon(&self) -> LatLon {
        let lon = self.x * 360.0 - 180.0;
        let lat = f64::atan(f64::sinh(PI * (1.0 - 2.0 * self.y))).to_degrees();
        LatLon { lat, lon }
    }

    /// Scale to fractional tile units at the given zoom level.
    fn at_zoom(&self, zoom: u32) -> (f64, f64) {
        let zoom_factor = f64::powi(2.0, zoom as i32);
        (self.x * zoom_factor, self.y * zoom_factor)
    }
}

/// A pixel position inside a tile. Top-left corner is (0, 0).
///
/// Offsets are rounded, so a position close to the next tile boundary may
/// yield `tile_size` instead of wrapping to the next tile.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PixelOffset {
    pub x: u32,
    pub y: u32,
}

/// A tile position in a tile pyramid.
/// Each zoom level has 2^zoom by 2^zoom tiles.
/// `x` and `y` are allowed to be negative or >= 2^zoom but then they will not correspond to a tile
/// and `is_on_planet` will return false.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub zoom: u32,
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub fn new(zoom: u32, x: i32, y: i32) -> TileCoord {
        TileCoord { zoom, x, y }
    }

    pub fn is_on_planet(&self) -> bool {
        let num_tiles = Self::get_zoom_level_tiles(self.zoom);
        let (x, y) = (i64::from(self.x), i64::from(self.y));
        y >= 0 && y < num_tiles &&
        x >= 0 && x < num_tiles
    }

    /// Return the position of the top left corner of the current tile.
    pub fn north_west(&self) -> LatLon {
        tile_to_latlon(f64::from(self.x), f64::from(self.y), self.zoom)
    }

    /// Return the geographic extent of the current tile.
    pub fn bounds(&self) -> TileBounds {
        let nw = self.north_west();
        let se = tile_to_latlon(f64::from(self.x + 1), f64::from(self.y + 1), self.zoom);

        TileBounds {
            north: nw.lat,
            south: se.lat,
            west: nw.lon,
            east: se.lon,
        }
    }

    /// Number of tiles along one axis. Saturates for zoom levels beyond 62.
    #[inline]
    pub fn get_zoom_level_tiles(zoom: u32) -> i64 {
        1i64.checked_shl(zoom).filter(|&n| n > 0).unwrap_or(i64::MAX)
    }

    pub fn to_quadkey(&self) -> Option<String> {
        if self.zoom == 0 || self.zoom > 30 || self.x < 0 || self.y < 0 {
            return None;
        }

        let mut quadkey = String::with_capacity(self.zoom as usize);

        for i in (0..self.zoom).rev() {
            let mask: u32 = 1 << i;

            match ((self.x as u32 & mask) != 0, (self.y as u32 & mask) != 0) {
                (false, false) => quadkey.push('0'),
                (true, false) => quadkey.push('1'),
                (false, true) => quadkey.push('2'),
                (true, true) => quadkey.push('3'),
            }
        }

        Some(quadkey)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Geographic extent of a tile in degrees.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TileBounds {
    pub north: f64,
    pub south: f64,
    pub west: f64,
    pub east: f64,
}

/// Find the tile that contains the given position and the pixel offset of the position inside
/// that tile.
///
/// Zoom levels are not checked, out of range positions produce tiles for which
/// `TileCoord::is_on_planet` is false.
pub fn latlon_to_tile(lat: f64, lon: f64, zoom: u32, tile_size: u32) -> (TileCoord, PixelOffset) {
    let (tile_x, tile_y) = MapCoord::from_latlon(lat, lon).at_zoom(zoom);
    let (ix, iy) = (tile_x.floor(), tile_y.floor());

    let size = f64::from(tile_size);
    let offset = PixelOffset {
        x: ((tile_x - ix) * size).round_ties_even() as u32,
        y: ((tile_y - iy) * size).round_ties_even() as u32,
    };

    (TileCoord::new(zoom, ix as i32, iy as i32), offset)
}

/// Return the position of the top left corner of tile (`tile_x`, `tile_y`).
///
/// Fractional and one-past-the-end indices are accepted, so `tile_x + 1.0` and `tile_y + 1.0`
/// give the bottom right corner. Feeding back the tile of `latlon_to_tile` returns that tile's
/// corner, not the original position.
pub fn tile_to_latlon(tile_x: f64, tile_y: f64, zoom: u32) -> LatLon {
    let inv_zoom_factor = f64::powi(2.0, -(zoom as i32));
    MapCoord::new(tile_x * inv_zoom_factor, tile_y * inv_zoom_factor).to_latlon()
}
