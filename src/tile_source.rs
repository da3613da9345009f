use crate::coord::TileCoord;
use crate::error::{Error, Result};
use crate::url_template::UrlTemplate;
use std::collections::BTreeMap;


/// Built-in layers. The dated layers are the OS OpenMap Local releases rendered by
/// os.openstreetmap.org, keyed by `YYYYMM`.
///
/// Older releases use another color scheme that the class palette does not match.
const BUILTIN_LAYERS: &[(&str, &str)] = &[
    ("default", "https://tile.openstreetmap.org/{z}/{x}/{y}.png"),
    ("202310", "https://os.openstreetmap.org/layer/gb_os_om_local_2023_10/{z}/{x}/{y}.png"),
    ("202304", "https://os.openstreetmap.org/layer/gb_os_om_local_2023_04/{z}/{x}/{y}.png"),
    ("202210", "https://os.openstreetmap.org/layer/gb_os_om_local_2022_10/{z}/{x}/{y}.png"),
    ("202204", "https://os.openstreetmap.org/layer/gb_os_om_local_2022_04/{z}/{x}/{y}.png"),
    ("202110", "https://os.openstreetmap.org/layer/gb_os_om_local_2021_10/{z}/{x}/{y}.png"),
    ("202104", "https://os.openstreetmap.org/layer/gb_os_om_local_2021_04/{z}/{x}/{y}.png"),
    ("202005", "https://os.openstreetmap.org/layer/gb_os_om_local_2020_05/{z}/{x}/{y}.png"),
    ("202004", "https://os.openstreetmap.org/layer/gb_os_om_local_2020_04/{z}/{x}/{y}.png"),
    ("201910", "https://os.openstreetmap.org/layer/gb_os_om_local_2019_10/{z}/{x}/{y}.png"),
    ("201804", "https://os.openstreetmap.org/layer/gb_os_om_local_2018_04/{z}/{x}/{y}.png"),
    ("201710", "https://os.openstreetmap.org/layer/gb_os_om_local_2017_10/{z}/{x}/{y}.png"),
    ("201704", "https://os.openstreetmap.org/layer/gb_os_om_local_2017_04/{z}/{x}/{y}.png"),
    ("201610", "https://os.openstreetmap.org/layer/gb_os_om_local_2016_10/{z}/{x}/{y}.png"),
];

/// A named layer on a remote tile server.
#[derive(Clone, Debug)]
pub struct TileSource {
    name: String,
    url_template: UrlTemplate,
}

impl TileSource {
    pub fn new<S: Into<String>>(name: S, url_template: UrlTemplate) -> Self {
        TileSource {
            name: name.into(),
            url_template,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn remote_tile_url(&self, tile_coord: TileCoord) -> Result<String> {
        self.url_template.fill(tile_coord)
    }
}

/// All layers that tiles can be downloaded from.
#[derive(Clone, Debug)]
pub struct TileSources {
    sources: BTreeMap<String, TileSource>,
}

impl TileSources {
    pub fn builtin() -> Self {
        let mut sources = BTreeMap::new();
        for &(name, template) in BUILTIN_LAYERS {
            if let Ok(t) = UrlTemplate::new(template) {
                sources.insert(name.to_string(), TileSource::new(name, t));
            }
        }
        TileSources { sources }
    }

    /// Add a layer or replace a built-in one.
    pub fn insert(&mut self, source: TileSource) {
        self.sources.insert(source.name().to_string(), source);
    }

    pub fn get(&self, layer: &str) -> Result<&TileSource> {
        self.sources.get(layer).ok_or_else(|| Error::UnknownLayer {
            layer: layer.to_string(),
            suggestion: self.nearest_layer(layer),
        })
    }

    /// The dated layer closest in time to `layer`, if `layer` is a `YYYYMM` date.
    pub fn nearest_layer(&self, layer: &str) -> Option<String> {
        let target = month_index(layer)?;
        self.sources.keys()
            .filter_map(|name| month_index(name).map(|m| (name, (m - target).abs())))
            .min_by_key(|&(_, distance)| distance)
            .map(|(name, _)| name.clone())
    }
}

/// Months since year 0 for a `YYYYMM` string.
fn month_index(s: &str) -> Option<i64> {
    if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i64 = s[..4].parse().ok()?;
    let month: i64 = s[4..].parse().ok()?;
    if month < 1 || month > 12 {
        return None;
    }
    Some(year * 12 + month - 1)
}
