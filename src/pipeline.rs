//! The per-tile stages: download, detect, filter and classify.
//!
//! Each stage fans the tiles out to a thread pool. Tiles are independent of each other, so a
//! failing tile is logged and recorded in the `BatchReport` while the others carry on.

use crate::classify::{classify, Label};
use crate::config::Config;
use crate::coord::TileCoord;
use crate::detector::ChangeDetector;
use crate::error::{Error, Result};
use crate::grid::{generate_grid, grid_to_tileset};
use crate::noise::remove_noise;
use crate::store::TileStore;
use crate::tile::TileKey;
use crate::tile_cache::{Outcome, ResultCache};
use crate::tile_loader::TileLoader;
use log::{debug, info, warn};
use scoped_threadpool::Pool;
use std::fmt;
use std::sync::mpsc;


/// Number of output tiles whose outcome is remembered between stages and re-runs.
const RESULT_CACHE_SIZE: usize = 4096;

/// Summary of one stage.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub processed: usize,
    pub skipped: usize,
    pub failed: Vec<(TileCoord, Error)>,
}

impl BatchReport {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn merge(&mut self, other: BatchReport) {
        self.processed += other.processed;
        self.skipped += other.skipped;
        self.failed.extend(other.failed);
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} processed, {} skipped, {} failed",
            self.processed,
            self.skipped,
            self.failed.len(),
        )
    }
}

pub struct Pipeline<S: TileStore> {
    config: Config,
    store: S,
    detector: ChangeDetector,
    pool: Pool,
    cache: ResultCache,
}

impl<S: TileStore> Pipeline<S> {
    pub fn new(config: Config, store: S) -> Self {
        let detector = ChangeDetector::new(config.initial_label, config.final_label, config.method);
        let pool = Pool::new(config.threads.max(1) as u32);

        Pipeline {
            config,
            store,
            detector,
            pool,
            cache: ResultCache::new(RESULT_CACHE_SIZE),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Layer that holds the raw change masks.
    pub fn detected_layer(&self) -> String {
        self.detector.layer_name(&self.config.layer1, &self.config.layer2)
    }

    /// Layer that holds the masks after noise removal.
    pub fn filtered_layer(&self) -> String {
        format!("{}_filtered", self.detected_layer())
    }

    /// Layer that collects the filtered tiles labeled `label`.
    pub fn bucket_layer(&self, label: Label) -> String {
        format!("{}_{}", self.filtered_layer(), label)
    }

    /// The deduplicated set of tiles that the sample grid touches, sorted.
    pub fn tiles(&self) -> Vec<TileCoord> {
        let grid = generate_grid(&self.config.bbox, self.config.height, self.config.width);
        let mut tiles: Vec<TileCoord> = grid_to_tileset(&grid, self.config.zoom).into_iter().collect();
        tiles.sort();

        info!("{} grid points fall into {} tiles at zoom {}", grid.len(), tiles.len(), self.config.zoom);
        tiles
    }

    /// Fetch both layers. Fails up front if a layer is not known.
    pub fn download(&mut self, tiles: &[TileCoord]) -> Result<BatchReport> {
        let sources = self.config.tile_sources()?;
        let source1 = sources.get(&self.config.layer1)?;
        let source2 = sources.get(&self.config.layer2)?;
        let loader = TileLoader::new()?;

        let mut report = BatchReport::default();
        for source in &[source1, source2] {
            report.merge(loader.download(&mut self.pool, &self.store, source, tiles, self.config.overwrite));
        }

        info!("download: {}", report);
        Ok(report)
    }

    /// Compare both layers tile by tile and store the change masks.
    pub fn detect(&mut self, tiles: &[TileCoord]) -> BatchReport {
        let detected = self.detected_layer();
        let layer1 = self.config.layer1.as_str();
        let layer2 = self.config.layer2.as_str();
        let detector = &self.detector;
        let store = &self.store;

        info!("detecting {} to {} with method {}", detector.initial_label(), detector.final_label(), detector.method());

        let report = run_batch(
            &mut self.pool,
            store,
            &mut self.cache,
            self.config.overwrite,
            tiles,
            &[detected.as_str()],
            |coord| {
                let img1 = store.read_image(&TileKey::new(layer1, coord))?;
                let img2 = store.read_image(&TileKey::new(layer2, coord))?;
                let mask = detector.detect(&img1, &img2)?;

                let key = TileKey::new(detected.as_str(), coord);
                store.write_binary(&key, &mask.to_binary(), &coord.bounds())?;
                Ok((key, Outcome::Mask { changed: mask.count() }))
            },
        );

        info!("detect: {}", report);
        report
    }

    /// Remove connected change regions smaller than `min_size` from every detected tile.
    pub fn filter(&mut self, min_size: usize) -> Result<BatchReport> {
        let detected = self.detected_layer();
        let filtered = self.filtered_layer();
        let tiles = self.store.tiles(&detected, self.config.zoom)?;
        let store = &self.store;

        let report = run_batch(
            &mut self.pool,
            store,
            &mut self.cache,
            self.config.overwrite,
            &tiles,
            &[filtered.as_str()],
            |coord| {
                let binary = store.read_binary(&TileKey::new(detected.as_str(), coord))?;
                let cleaned = remove_noise(&binary, min_size)?;
                let changed = cleaned.data().iter().filter(|&&v| v != 0.0).count();

                let key = TileKey::new(filtered.as_str(), coord);
                store.write_binary(&key, &cleaned, &coord.bounds())?;
                Ok((key, Outcome::Mask { changed }))
            },
        );

        info!("filter (min size {}): {}", min_size, report);
        Ok(report)
    }

    /// Sort every filtered tile into its `change` or `no_change` bucket layer. A tile is only
    /// ever kept in one of the two.
    pub fn classify(&mut self, tolerance: usize) -> Result<BatchReport> {
        let filtered = self.filtered_layer();
        let change = self.bucket_layer(Label::Change);
        let no_change = self.bucket_layer(Label::NoChange);
        let tiles = self.store.tiles(&filtered, self.config.zoom)?;
        let store = &self.store;

        let report = run_batch(
            &mut self.pool,
            store,
            &mut self.cache,
            self.config.overwrite,
            &tiles,
            &[change.as_str(), no_change.as_str()],
            |coord| {
                let binary = store.read_binary(&TileKey::new(filtered.as_str(), coord))?;
                let label = classify(&binary, tolerance)?;

                let (bucket, other) = match label {
                    Label::Change => (&change, &no_change),
                    Label::NoChange => (&no_change, &change),
                };
                let key = TileKey::new(bucket.as_str(), coord);
                store.write_binary(&key, &binary, &coord.bounds())?;
                store.remove(&TileKey::new(other.as_str(), coord))?;
                Ok((key, Outcome::Label(label)))
            },
        );

        info!("classify (tolerance {}): {}", tolerance, report);
        Ok(report)
    }

    /// All stages in order, with the filter and classifier settings from the config.
    pub fn run(&mut self) -> Result<BatchReport> {
        let tiles = self.tiles();
        let mut report = self.download(&tiles)?;
        report.merge(self.detect(&tiles));
        let min_size = self.config.min_size;
        report.merge(self.filter(min_size)?);
        let tolerance = self.config.tolerance;
        report.merge(self.classify(tolerance)?);
        Ok(report)
    }
}

/// Run `work` for every tile that has no output in any of `output_layers` yet. A tile ends up
/// with exactly one output, the cached outcomes for the other layers are dropped.
fn run_batch<S, F>(
    pool: &mut Pool,
    store: &S,
    cache: &mut ResultCache,
    overwrite: bool,
    tiles: &[TileCoord],
    output_layers: &[&str],
    work: F,
) -> BatchReport
    where S: TileStore + ?Sized,
          F: Fn(TileCoord) -> Result<(TileKey, Outcome)> + Sync,
{
    let mut report = BatchReport::default();
    let mut todo = vec![];

    for &coord in tiles {
        let done = !overwrite && output_layers.iter().any(|layer| {
            let key = TileKey::new(*layer, coord);
            cache.get(&key).is_some() || store.exists(&key)
        });

        if done {
            debug!("skipping {}, already processed", coord);
            report.skipped += 1;
        } else {
            todo.push(coord);
        }
    }

    let (result_tx, result_rx) = mpsc::channel();
    pool.scoped(|scope| {
        for &coord in &todo {
            let result_tx = result_tx.clone();
            let work = &work;
            scope.execute(move || {
                let _ = result_tx.send((coord, work(coord)));
            });
        }
    });
    drop(result_tx);

    for (coord, result) in result_rx {
        match result {
            Ok((key, outcome)) => {
                debug!("{}: {:?}", key, outcome);
                for layer in output_layers.iter().filter(|&&l| l != key.layer) {
                    cache.remove(&TileKey::new(*layer, coord));
                }
                cache.insert(key, outcome);
                report.processed += 1;
            },
            Err(err) => {
                warn!("tile {} failed: {}", coord, err);
                report.failed.push((coord, err));
            },
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::ClassLabel;
    use crate::raster::{BinaryImage, Image};
    use crate::store::MemoryTileStore;

    const CONFIG: &str = r#"
        zoom = 16
        layer1 = "201610"
        layer2 = "202310"
        initial_label = "Nothing"
        final_label = "Building"
        height = 3
        width = 3
        min_latitude = 51.5074
        max_latitude = 51.5074
        min_longitude = -0.1278
        max_longitude = -0.1278
        output = "png"
        output_dir = "output"
        threads = 2
        min_size = 2
        tolerance = 0
    "#;

    fn pipeline(extra: &str) -> Pipeline<MemoryTileStore> {
        let config = Config::from_toml_str(&format!("{}{}", CONFIG, extra), ".").unwrap();
        Pipeline::new(config, MemoryTileStore::new())
    }

    /// A 4x4 tile of `background` with the pixels in `cells` set to `class`.
    fn tile(background: ClassLabel, class: ClassLabel, cells: &[(u32, u32)]) -> Image {
        let mut data = vec![];
        for y in 0..4 {
            for x in 0..4 {
                let label = if cells.contains(&(x, y)) { class } else { background };
                data.extend_from_slice(&label.color().0);
            }
        }
        Image::new(4, 4, 3, data).unwrap()
    }

    #[test]
    fn point_box_gives_one_tile() {
        let p = pipeline("");
        assert_eq!(p.tiles(), vec![TileCoord::new(16, 32744, 21792)]);
        assert_eq!(p.detected_layer(), "201610To202310DetectedNothingToBuilding");
        assert_eq!(p.filtered_layer(), "201610To202310DetectedNothingToBuilding_filtered");
        assert_eq!(p.bucket_layer(Label::NoChange), "201610To202310DetectedNothingToBuilding_filtered_no_change");
    }

    #[test]
    fn detect_filter_classify() {
        let mut p = pipeline("");
        let coord = TileCoord::new(16, 32744, 21792);
        let before = tile(ClassLabel::Nothing, ClassLabel::Nothing, &[]);
        // one isolated building pixel and a 2x2 block
        let after = tile(ClassLabel::Nothing, ClassLabel::Building, &[(0, 0), (2, 2), (3, 2), (2, 3), (3, 3)]);
        p.store().insert_image(TileKey::new("201610", coord), before);
        p.store().insert_image(TileKey::new("202310", coord), after);

        let report = p.detect(&[coord]);
        assert!(report.is_ok());
        assert_eq!(report.processed, 1);

        let detected = TileKey::new(p.detected_layer(), coord);
        assert_eq!(p.store().read_binary(&detected).unwrap().data().iter().filter(|&&v| v == 255.0).count(), 5);
        assert_eq!(p.store().bounds(&detected), Some(coord.bounds()));

        let report = p.filter(2).unwrap();
        assert_eq!(report.processed, 1);
        let filtered = p.store().read_binary(&TileKey::new(p.filtered_layer(), coord)).unwrap();
        assert_eq!(filtered.data()[0], BinaryImage::BACKGROUND);
        assert_eq!(filtered.data().iter().filter(|&&v| v == 255.0).count(), 4);

        let report = p.classify(0).unwrap();
        assert_eq!(report.processed, 1);
        let change = TileKey::new(p.bucket_layer(Label::Change), coord);
        assert!(p.store().exists(&change));
        assert!(!p.store().exists(&change.with_layer(p.bucket_layer(Label::NoChange))));
        assert!(p.cache().contains(&change));
    }

    /// Put a filtered mask with `foreground` changed pixels (out of 16) into the store.
    fn insert_filtered(p: &Pipeline<MemoryTileStore>, coord: TileCoord, foreground: usize) {
        let data = (0..16).map(|i| if i < foreground { 255.0 } else { 0.0 }).collect();
        let mask = BinaryImage::new(4, 4, data).unwrap();
        let key = TileKey::new(p.filtered_layer(), coord);
        p.store().write_binary(&key, &mask, &coord.bounds()).unwrap();
    }

    #[test]
    fn reclassified_tile_moves_between_buckets() {
        let coord = TileCoord::new(16, 32744, 21792);
        let mut p = pipeline("overwrite = true\n");
        insert_filtered(&p, coord, 3);
        let change = TileKey::new(p.bucket_layer(Label::Change), coord);
        let no_change = TileKey::new(p.bucket_layer(Label::NoChange), coord);

        assert_eq!(p.classify(5).unwrap().processed, 1);
        assert!(p.store().exists(&no_change));
        assert!(!p.store().exists(&change));

        assert_eq!(p.classify(0).unwrap().processed, 1);
        assert!(p.store().exists(&change));
        assert!(!p.store().exists(&no_change));
        assert!(p.cache().contains(&change));
        assert!(!p.cache().contains(&no_change));
    }

    #[test]
    fn buckets_are_separate_per_label_pair() {
        let coord = TileCoord::new(16, 32744, 21792);
        let mut p = pipeline("");
        insert_filtered(&p, coord, 0);
        assert_eq!(p.classify(0).unwrap().processed, 1);
        let first = TileKey::new(p.bucket_layer(Label::NoChange), coord);

        // same store, other final class
        let Pipeline { mut config, store, .. } = p;
        config.final_label = ClassLabel::Text;
        let mut p = Pipeline::new(config, store);
        insert_filtered(&p, coord, 16);

        let report = p.classify(0).unwrap();
        assert_eq!((report.processed, report.skipped), (1, 0));
        assert!(p.store().exists(&TileKey::new(p.bucket_layer(Label::Change), coord)));
        assert!(p.store().exists(&first));
        assert!(!p.store().exists(&first.with_layer(p.bucket_layer(Label::Change))));
    }

    #[test]
    fn reruns_skip_unless_overwrite() {
        let coord = TileCoord::new(16, 32744, 21792);
        let blank = tile(ClassLabel::Nothing, ClassLabel::Nothing, &[]);

        let mut p = pipeline("");
        p.store().insert_image(TileKey::new("201610", coord), blank.clone());
        p.store().insert_image(TileKey::new("202310", coord), blank.clone());
        assert_eq!(p.detect(&[coord]).processed, 1);

        let again = p.detect(&[coord]);
        assert_eq!((again.processed, again.skipped), (0, 1));

        let mut p = pipeline("overwrite = true\n");
        p.store().insert_image(TileKey::new("201610", coord), blank.clone());
        p.store().insert_image(TileKey::new("202310", coord), blank);
        assert_eq!(p.detect(&[coord]).processed, 1);
        assert_eq!(p.detect(&[coord]).processed, 1);
    }

    #[test]
    fn failing_tiles_do_not_stop_the_batch() {
        let mut p = pipeline("");
        let good = TileCoord::new(16, 32744, 21792);
        let missing = TileCoord::new(16, 32745, 21792);
        let blank = tile(ClassLabel::Nothing, ClassLabel::Nothing, &[]);
        p.store().insert_image(TileKey::new("201610", good), blank.clone());
        p.store().insert_image(TileKey::new("202310", good), blank);

        let report = p.detect(&[good, missing]);
        assert_eq!(report.processed, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, missing);
        assert!(matches!(report.failed[0].1, Error::TileNotFound(_)));
    }

    #[test]
    fn unknown_layer_fails_before_downloading() {
        let mut p = pipeline("");
        p.config.layer2 = "202308".to_string();
        match p.download(&[]) {
            Err(Error::UnknownLayer { suggestion, .. }) => assert_eq!(suggestion, Some("202310".to_string())),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn report_display() {
        let mut report = BatchReport { processed: 2, skipped: 1, failed: vec![] };
        report.merge(BatchReport { processed: 1, skipped: 0, failed: vec![(TileCoord::new(1, 0, 0), Error::EmptyImage)] });
        assert_eq!(report.to_string(), "3 processed, 1 skipped, 1 failed");
        assert!(!report.is_ok());
    }
}
