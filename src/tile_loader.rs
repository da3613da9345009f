use crate::coord::TileCoord;
use crate::error::{Error, Result};
use crate::pipeline::BatchReport;
use crate::store::TileStore;
use crate::tile::TileKey;
use crate::tile_source::TileSource;
use log::{debug, info, warn};
use reqwest::blocking::Client;
use scoped_threadpool::Pool;
use std::sync::mpsc;


const USER_AGENT: &str = concat!("tilechange/", env!("CARGO_PKG_VERSION"));

/// Fetches tiles from a remote tile server into a `TileStore`.
#[derive(Debug)]
pub struct TileLoader {
    client: Client,
}

impl TileLoader {
    pub fn new() -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(TileLoader { client })
    }

    /// Download a single tile and check that it decodes as an image.
    pub fn fetch(&self, source: &TileSource, tile_coord: TileCoord) -> Result<Vec<u8>> {
        let url = source.remote_tile_url(tile_coord)?;
        debug!("fetching {}", url);

        let response = self.client.get(&url).send()?.error_for_status()?;
        let buf = response.bytes()?.to_vec();
        if buf.is_empty() {
            return Err(Error::TileNotFound(TileKey::new(source.name(), tile_coord)));
        }

        // servers like to answer with html error pages
        image::load_from_memory(&buf)?;
        Ok(buf)
    }

    /// Fetch every tile of `tiles` that `store` does not have yet (or all of them with
    /// `overwrite`). Failed tiles end up in the report and are not retried.
    pub fn download<S>(
        &self,
        pool: &mut Pool,
        store: &S,
        source: &TileSource,
        tiles: &[TileCoord],
        overwrite: bool,
    ) -> BatchReport
        where S: TileStore + ?Sized,
    {
        let mut report = BatchReport::default();
        let mut todo = vec![];

        for &coord in tiles {
            if !overwrite && store.exists(&TileKey::new(source.name(), coord)) {
                report.skipped += 1;
            } else {
                todo.push(coord);
            }
        }

        info!("downloading {} tiles of layer {} ({} present)", todo.len(), source.name(), report.skipped);

        let (result_tx, result_rx) = mpsc::channel();
        pool.scoped(|scope| {
            for &coord in &todo {
                let result_tx = result_tx.clone();
                scope.execute(move || {
                    let result = self.fetch(source, coord).and_then(|buf| {
                        store.write_bytes(&TileKey::new(source.name(), coord), &buf)
                    });
                    let _ = result_tx.send((coord, result));
                });
            }
        });
        drop(result_tx);

        for (coord, result) in result_rx {
            match result {
                Ok(()) => report.processed += 1,
                Err(err) => {
                    warn!("failed to download {}/{}: {}", source.name(), coord, err);
                    report.failed.push((coord, err));
                },
            }
        }

        report
    }
}
