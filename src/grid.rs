//! Sample points over a bounding box and the tiles that cover them.

use crate::coord::{latlon_to_tile, LatLon, TileCoord, TILE_SIZE};
use crate::error::{Error, Result};
use std::collections::HashSet;


/// A latitude/longitude rectangle in degrees.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<BoundingBox> {
        let bbox = BoundingBox {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        };

        if !LatLon::new(min_lat, min_lon).is_valid() || !LatLon::new(max_lat, max_lon).is_valid() {
            return Err(Error::Config(format!("bounding box out of range: {:?}", bbox)));
        }
        if min_lat > max_lat || min_lon > max_lon {
            return Err(Error::Config(format!("bounding box has min > max: {:?}", bbox)));
        }

        Ok(bbox)
    }
}

/// `num` evenly spaced samples over [`start`, `stop`], both ends included.
fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            let mut values: Vec<f64> = (0..num).map(|i| start + step * i as f64).collect();
            values[num - 1] = stop;
            values
        },
    }
}

/// Build a `height` by `width` lattice over `bbox`, row-major (all longitudes for each latitude).
pub fn generate_grid(bbox: &BoundingBox, height: usize, width: usize) -> Vec<LatLon> {
    let lat_points = linspace(bbox.min_lat, bbox.max_lat, height);
    let lon_points = linspace(bbox.min_lon, bbox.max_lon, width);

    let mut grid = Vec::with_capacity(height * width);
    for &lat in &lat_points {
        for &lon in &lon_points {
            grid.push(LatLon::new(lat, lon));
        }
    }
    grid
}

/// Reduce grid points to the set of tiles that contain them.
pub fn grid_to_tileset(grid: &[LatLon], zoom: u32) -> HashSet<TileCoord> {
    grid.iter()
        .map(|p| latlon_to_tile(p.lat, p.lon, zoom, TILE_SIZE).0)
        .collect()
}
