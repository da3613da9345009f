use crate::detector::DetectionMethod;
use crate::error::{Error, Result};
use crate::grid::BoundingBox;
use crate::palette::ClassLabel;
use crate::store::OutputFormat;
use crate::tile_source::{TileSource, TileSources};
use crate::url_template::UrlTemplate;
use directories::ProjectDirs;
use serde_derive::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};


/// Highest zoom level for which tile indices fit into `i32`.
pub const MAX_ZOOM: u32 = 30;

#[derive(Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    zoom: u32,
    layer1: String,
    layer2: String,
    initial_label: String,
    final_label: String,
    height: usize,
    width: usize,
    min_latitude: f64,
    max_latitude: f64,
    min_longitude: f64,
    max_longitude: f64,
    output: String,
    output_dir: String,
    method: Option<String>,
    threads: Option<usize>,
    overwrite: Option<bool>,
    min_size: Option<usize>,
    tolerance: Option<usize>,
    #[serde(default)]
    sources: BTreeMap<String, Source>,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
struct Source {
    url_template: String,
}

/// Everything a run of the pipeline needs to know, validated.
#[derive(Clone, Debug)]
pub struct Config {
    pub zoom: u32,
    pub layer1: String,
    pub layer2: String,
    pub initial_label: ClassLabel,
    pub final_label: ClassLabel,
    pub height: usize,
    pub width: usize,
    pub bbox: BoundingBox,
    pub output: OutputFormat,
    pub output_dir: PathBuf,
    pub method: DetectionMethod,
    pub threads: usize,
    pub overwrite: bool,
    pub min_size: usize,
    pub tolerance: usize,
    sources: BTreeMap<String, String>,
}

impl Config {
    pub const DEFAULT_MIN_SIZE: usize = 20;
    pub const DEFAULT_TOLERANCE: usize = 0;

    /// Load `config.toml` from the user's config directory.
    pub fn load() -> Result<Config> {
        let path = Self::default_path()
            .ok_or_else(|| Error::Config("could not determine the config directory".to_string()))?;
        Self::from_toml_file(path)
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "tilechange").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Read a config file. A relative `output_dir` is resolved against the file's directory.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Config> {
        let mut file = File::open(&path)
            .map_err(|e| Error::Config(format!("failed to open {:?}: {}", path.as_ref(), e)))?;

        let mut content = String::new();
        file.read_to_string(&mut content)?;

        let base_dir = path.as_ref().parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&content, base_dir)
    }

    pub fn from_toml_str<P: AsRef<Path>>(toml_str: &str, base_dir: P) -> Result<Config> {
        let file: ConfigFile = toml::from_str(toml_str).map_err(|e| Error::Config(format!("{}", e)))?;

        if file.zoom > MAX_ZOOM {
            return Err(Error::Config(format!("zoom {} is larger than {}", file.zoom, MAX_ZOOM)));
        }
        if file.height == 0 || file.width == 0 {
            return Err(Error::Config("grid height and width have to be positive".to_string()));
        }

        let bbox = BoundingBox::new(file.min_latitude, file.max_latitude, file.min_longitude, file.max_longitude)?;

        let method = match file.method {
            Some(ref s) => s.parse().map_err(Error::Config)?,
            None => DetectionMethod::default(),
        };

        let mut output_dir = PathBuf::from(&file.output_dir);
        if output_dir.is_relative() {
            output_dir = base_dir.as_ref().join(output_dir);
        }

        let config = Config {
            zoom: file.zoom,
            initial_label: file.initial_label.parse()?,
            final_label: file.final_label.parse()?,
            layer1: file.layer1,
            layer2: file.layer2,
            height: file.height,
            width: file.width,
            bbox,
            output: file.output.parse()?,
            output_dir,
            method,
            threads: file.threads.unwrap_or_else(num_cpus::get).max(1),
            overwrite: file.overwrite.unwrap_or(false),
            min_size: file.min_size.unwrap_or(Self::DEFAULT_MIN_SIZE),
            tolerance: file.tolerance.unwrap_or(Self::DEFAULT_TOLERANCE),
            sources: file.sources.into_iter().map(|(name, s)| (name, s.url_template)).collect(),
        };

        // fail early on broken templates
        config.tile_sources()?;

        Ok(config)
    }

    /// The built-in layers plus the ones from the config file.
    pub fn tile_sources(&self) -> Result<TileSources> {
        let mut sources = TileSources::builtin();
        for (name, template) in &self.sources {
            sources.insert(TileSource::new(name.clone(), UrlTemplate::new(template.clone())?));
        }
        Ok(sources)
    }
}
