//! Detects class changes between two releases of a rendered map, tile by tile.
//!
//! Tiles covering a lat/lon box are fetched from two layers, compared pixel by pixel against a
//! fixed class palette, cleaned of small change regions and finally labeled `change` or
//! `no_change`.

pub mod classify;
pub mod config;
pub mod coord;
pub mod detector;
pub mod error;
pub mod grid;
pub mod noise;
pub mod palette;
pub mod pipeline;
pub mod raster;
pub mod store;
pub mod tile;
pub mod tile_cache;
pub mod tile_loader;
pub mod tile_source;
pub mod url_template;
