//! Where tiles live between the pipeline stages.
//!
//! The core only talks to the `TileStore` trait. `FileTileStore` lays tiles out as
//! `<root>/<layer>/<zoom>/<x>/<y>.<ext>` and georeferences written masks with a world file,
//! `MemoryTileStore` keeps everything in memory.

use crate::coord::{TileBounds, TileCoord};
use crate::error::{Error, Result};
use crate::raster::{BinaryImage, Image};
use crate::tile::TileKey;
use image::{DynamicImage, ImageFormat};
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;


/// Raster format of the masks written by the pipeline.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Tiff,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match *self {
            OutputFormat::Png => "png",
            OutputFormat::Tiff => "tiff",
        }
    }

    /// Extension of the world file that georeferences an image of this format.
    pub fn world_file_extension(&self) -> &'static str {
        match *self {
            OutputFormat::Png => "pgw",
            OutputFormat::Tiff => "tfw",
        }
    }

    fn image_format(&self) -> ImageFormat {
        match *self {
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Tiff => ImageFormat::Tiff,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<OutputFormat> {
        match s {
            "png" => Ok(OutputFormat::Png),
            "tiff" => Ok(OutputFormat::Tiff),
            _ => Err(Error::Config(format!("unsupported output type {:?}, supported types: png, tiff", s))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Storage for fetched tiles and computed masks. Shared by all workers of a batch.
pub trait TileStore: Sync {
    fn exists(&self, key: &TileKey) -> bool;

    /// Decoded tile with samples in [0, 1].
    fn read_image(&self, key: &TileKey) -> Result<Image>;

    /// Single band tile with raw 0..255 values.
    fn read_binary(&self, key: &TileKey) -> Result<BinaryImage>;

    /// Store an encoded tile as fetched from a tile server.
    fn write_bytes(&self, key: &TileKey, data: &[u8]) -> Result<()>;

    /// Store a mask together with the geographic extent of its tile.
    fn write_binary(&self, key: &TileKey, image: &BinaryImage, bounds: &TileBounds) -> Result<()>;

    /// All tiles of `layer` at `zoom`, sorted.
    fn tiles(&self, layer: &str, zoom: u32) -> Result<Vec<TileCoord>>;

    /// Delete a tile and whatever was written alongside it. Missing tiles are not an error.
    fn remove(&self, key: &TileKey) -> Result<()>;
}

/// The six lines of an ESRI world file for an image covering `bounds` in EPSG:4326.
pub fn world_file(bounds: &TileBounds, width: u32, height: u32) -> String {
    let pixel_x = (bounds.east - bounds.west) / f64::from(width);
    let pixel_y = -(bounds.north - bounds.south) / f64::from(height);

    format!(
        "{}\n0\n0\n{}\n{}\n{}\n",
        pixel_x,
        pixel_y,
        bounds.west + pixel_x / 2.0,
        bounds.north + pixel_y / 2.0,
    )
}

#[derive(Debug)]
pub struct FileTileStore {
    directory: PathBuf,
    format: OutputFormat,
}

impl FileTileStore {
    pub fn new<P: Into<PathBuf>>(directory: P, format: OutputFormat) -> Self {
        FileTileStore {
            directory: directory.into(),
            format,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn tile_path(&self, key: &TileKey, extension: &str) -> PathBuf {
        let mut path = PathBuf::from(&self.directory);
        path.push(&key.layer);
        path.push(key.coord.zoom.to_string());
        path.push(key.coord.x.to_string());
        path.push(format!("{}.{}", key.coord.y, extension));

        path
    }

    /// Path of an existing file for `key`, masks first.
    fn existing_path(&self, key: &TileKey) -> Option<PathBuf> {
        let mask_path = self.tile_path(key, self.format.extension());
        if mask_path.is_file() {
            return Some(mask_path);
        }
        let fetched_path = self.tile_path(key, "png");
        if fetched_path.is_file() {
            return Some(fetched_path);
        }
        None
    }

    fn open(&self, key: &TileKey) -> Result<DynamicImage> {
        let path = self.existing_path(key).ok_or_else(|| Error::TileNotFound(key.clone()))?;
        Ok(image::open(path)?)
    }

    fn remove_file<P: AsRef<Path>>(path: P) -> Result<()> {
        match fs::remove_file(path) {
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => Ok(other?),
        }
    }

    fn write_to_file<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<()> {
        if let Some(dir) = path.as_ref().parent() {
            fs::create_dir_all(dir)?;
        }

        let mut file = File::create(path)?;
        file.write_all(data)?;
        Ok(())
    }
}

impl TileStore for FileTileStore {
    fn exists(&self, key: &TileKey) -> bool {
        self.existing_path(key).is_some()
    }

    fn read_image(&self, key: &TileKey) -> Result<Image> {
        self.open(key).map(|img| Image::from_dynamic(&img))
    }

    fn read_binary(&self, key: &TileKey) -> Result<BinaryImage> {
        self.open(key).map(|img| BinaryImage::from_gray(&img.to_luma8()))
    }

    fn write_bytes(&self, key: &TileKey, data: &[u8]) -> Result<()> {
        Self::write_to_file(self.tile_path(key, "png"), data)
    }

    fn write_binary(&self, key: &TileKey, image: &BinaryImage, bounds: &TileBounds) -> Result<()> {
        let gray = image.to_gray()?;
        let path = self.tile_path(key, self.format.extension());
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        gray.save_with_format(&path, self.format.image_format())?;
        Self::write_to_file(
            path.with_extension(self.format.world_file_extension()),
            world_file(bounds, image.width(), image.height()).as_bytes(),
        )?;

        debug!("wrote {}", path.display());
        Ok(())
    }

    fn tiles(&self, layer: &str, zoom: u32) -> Result<Vec<TileCoord>> {
        let mut dir = PathBuf::from(&self.directory);
        dir.push(layer);
        dir.push(zoom.to_string());

        let mut tiles = vec![];
        if !dir.is_dir() {
            return Ok(tiles);
        }

        for x_entry in fs::read_dir(&dir)? {
            let x_entry = x_entry?;
            let x: i32 = match x_entry.file_name().to_str().and_then(|s| s.parse().ok()) {
                Some(x) => x,
                None => continue,
            };
            if !x_entry.path().is_dir() {
                continue;
            }

            for y_entry in fs::read_dir(x_entry.path())? {
                let path = y_entry?.path();
                let extension = path.extension().and_then(|e| e.to_str());
                if extension != Some(self.format.extension()) && extension != Some("png") {
                    continue;
                }
                if let Some(y) = path.file_stem().and_then(|s| s.to_str()).and_then(|s| s.parse().ok()) {
                    tiles.push(TileCoord::new(zoom, x, y));
                }
            }
        }

        tiles.sort();
        tiles.dedup();
        Ok(tiles)
    }

    fn remove(&self, key: &TileKey) -> Result<()> {
        let mask_path = self.tile_path(key, self.format.extension());
        Self::remove_file(mask_path.with_extension(self.format.world_file_extension()))?;
        Self::remove_file(&mask_path)?;
        Self::remove_file(self.tile_path(key, "png"))
    }
}

#[derive(Clone, Debug)]
enum Stored {
    Bytes(Vec<u8>),
    Image(Image),
    Binary(BinaryImage, TileBounds),
}

/// Keeps all tiles in memory. Used for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryTileStore {
    tiles: Mutex<HashMap<TileKey, Stored>>,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put an already decoded tile into the store.
    pub fn insert_image(&self, key: TileKey, image: Image) {
        self.lock().insert(key, Stored::Image(image));
    }

    /// Geographic extent a mask was written with.
    pub fn bounds(&self, key: &TileKey) -> Option<TileBounds> {
        match self.lock().get(key) {
            Some(&Stored::Binary(_, bounds)) => Some(bounds),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> ::std::sync::MutexGuard<HashMap<TileKey, Stored>> {
        self.tiles.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn get(&self, key: &TileKey) -> Result<Stored> {
        self.lock().get(key).cloned().ok_or_else(|| Error::TileNotFound(key.clone()))
    }
}

impl TileStore for MemoryTileStore {
    fn exists(&self, key: &TileKey) -> bool {
        self.lock().contains_key(key)
    }

    fn read_image(&self, key: &TileKey) -> Result<Image> {
        match self.get(key)? {
            Stored::Bytes(data) => Ok(Image::from_dynamic(&image::load_from_memory(&data)?)),
            Stored::Image(img) => Ok(img),
            Stored::Binary(bin, _) => {
                let data = bin.data().iter().map(|&v| v / 255.0).collect();
                Image::new(bin.width(), bin.height(), 1, data)
            },
        }
    }

    fn read_binary(&self, key: &TileKey) -> Result<BinaryImage> {
        match self.get(key)? {
            Stored::Bytes(data) => Ok(BinaryImage::from_gray(&image::load_from_memory(&data)?.to_luma8())),
            Stored::Image(img) => {
                if img.channels() != 1 {
                    return Err(Error::ChannelCount { expected: 1, actual: img.channels() });
                }
                BinaryImage::new(img.width(), img.height(), img.data().iter().map(|&v| v * 255.0).collect())
            },
            Stored::Binary(bin, _) => Ok(bin),
        }
    }

    fn write_bytes(&self, key: &TileKey, data: &[u8]) -> Result<()> {
        self.lock().insert(key.clone(), Stored::Bytes(data.to_vec()));
        Ok(())
    }

    fn write_binary(&self, key: &TileKey, image: &BinaryImage, bounds: &TileBounds) -> Result<()> {
        image.check_binary()?;
        self.lock().insert(key.clone(), Stored::Binary(image.clone(), *bounds));
        Ok(())
    }

    fn tiles(&self, layer: &str, zoom: u32) -> Result<Vec<TileCoord>> {
        let mut tiles: Vec<TileCoord> = self.lock()
            .keys()
            .filter(|k| k.layer == layer && k.coord.zoom == zoom)
            .map(|k| k.coord)
            .collect();
        tiles.sort();
        Ok(tiles)
    }

    fn remove(&self, key: &TileKey) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(img: DynamicImage) -> Vec<u8> {
        let mut buf = Cursor::new(vec![]);
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn mask() -> BinaryImage {
        BinaryImage::new(2, 2, vec![0.0, 255.0, 255.0, 0.0]).unwrap()
    }

    #[test]
    fn output_formats() {
        assert_eq!("png".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert_eq!("tiff".parse::<OutputFormat>().unwrap(), OutputFormat::Tiff);
        assert!("json".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn world_file_lines() {
        let bounds = TileBounds { north: 10.0, south: 0.0, west: 20.0, east: 30.0 };
        let lines: Vec<f64> = world_file(&bounds, 10, 5)
            .lines()
            .map(|l| l.parse().unwrap())
            .collect();
        assert_eq!(lines, vec![1.0, 0.0, 0.0, -2.0, 20.5, 9.0]);
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTileStore::new(dir.path(), OutputFormat::Tiff);
        let coord = TileCoord::new(16, 32449, 21776);

        let fetched = TileKey::new("202310", coord);
        assert!(!store.exists(&fetched));
        assert!(matches!(store.read_image(&fetched), Err(Error::TileNotFound(_))));

        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([0, 0, 0])));
        store.write_bytes(&fetched, &png_bytes(rgb)).unwrap();
        assert!(store.exists(&fetched));
        assert!(dir.path().join("202310/16/32449/21776.png").is_file());
        assert_eq!(store.read_image(&fetched).unwrap().shape(), (4, 4, 3));

        let detected = fetched.with_layer("detected");
        store.write_binary(&detected, &mask(), &coord.bounds()).unwrap();
        assert!(dir.path().join("detected/16/32449/21776.tiff").is_file());
        assert!(dir.path().join("detected/16/32449/21776.tfw").is_file());
        assert_eq!(store.read_binary(&detected).unwrap(), mask());

        assert_eq!(store.tiles("detected", 16).unwrap(), vec![coord]);
        assert!(store.tiles("detected", 15).unwrap().is_empty());
        assert!(store.tiles("missing", 16).unwrap().is_empty());

        store.remove(&detected).unwrap();
        assert!(!store.exists(&detected));
        assert!(!dir.path().join("detected/16/32449/21776.tfw").exists());
        assert!(store.exists(&fetched));

        // removing twice is fine
        store.remove(&detected).unwrap();
    }

    #[test]
    fn file_store_png_masks() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTileStore::new(dir.path(), OutputFormat::Png);
        let key = TileKey::new("detected", TileCoord::new(3, 1, 2));

        store.write_binary(&key, &mask(), &key.coord.bounds()).unwrap();
        assert!(dir.path().join("detected/3/1/2.pgw").is_file());
        assert_eq!(store.read_binary(&key).unwrap(), mask());
    }

    #[test]
    fn non_binary_masks_are_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTileStore::new(dir.path(), OutputFormat::Png);
        let key = TileKey::new("detected", TileCoord::new(3, 1, 2));
        let bad = BinaryImage::new(1, 1, vec![3.0]).unwrap();

        assert!(store.write_binary(&key, &bad, &key.coord.bounds()).is_err());
        assert!(!store.exists(&key));
    }

    #[test]
    fn memory_store() {
        let store = MemoryTileStore::new();
        let key = TileKey::new("a", TileCoord::new(2, 1, 1));
        assert!(store.is_empty());

        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 1, Luma([255])));
        store.write_bytes(&key, &png_bytes(gray)).unwrap();
        assert_eq!(store.read_binary(&key).unwrap().data(), &[255.0, 255.0]);

        let other = key.with_layer("b");
        store.write_binary(&other, &mask(), &other.coord.bounds()).unwrap();
        assert_eq!(store.bounds(&other), Some(other.coord.bounds()));
        assert_eq!(store.tiles("b", 2).unwrap(), vec![other.coord]);
        assert_eq!(store.len(), 2);

        store.remove(&other).unwrap();
        store.remove(&other).unwrap();
        assert!(!store.exists(&other));
        assert_eq!(store.len(), 1);
    }
}
