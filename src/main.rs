mod args;

use clap::ArgMatches;
use log::{error, info};
use std::process;
use tilechange::config::Config;
use tilechange::error::{Error, Result};
use tilechange::pipeline::{BatchReport, Pipeline};
use tilechange::store::FileTileStore;


fn number(matches: &ArgMatches, name: &str) -> Result<Option<usize>> {
    match matches.value_of(name) {
        None => Ok(None),
        Some(s) => s.parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid value for --{}: {}", name, e))),
    }
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    let mut config = if let Some(config_path) = matches.value_of_os("config") {
        Config::from_toml_file(config_path)?
    } else {
        Config::load()?
    };

    if matches.is_present("overwrite") {
        config.overwrite = true;
    }
    if let Some(threads) = number(matches, "threads")? {
        config.threads = threads.max(1);
    }
    if let Some(method) = matches.value_of("method") {
        config.method = method.parse().map_err(Error::Config)?;
    }

    Ok(config)
}

/// Run the selected subcommand. Returns `None` for subcommands that do not process tiles.
fn run(matches: &ArgMatches) -> Result<Option<BatchReport>> {
    let config = load_config(matches)?;
    info!("writing tiles to {}", config.output_dir.display());

    let store = FileTileStore::new(config.output_dir.clone(), config.output);
    let mut pipeline = Pipeline::new(config, store);

    let report = match matches.subcommand() {
        ("tiles", _) => {
            for tile in pipeline.tiles() {
                println!("{}", tile);
            }
            return Ok(None);
        },
        ("download", _) => {
            let tiles = pipeline.tiles();
            pipeline.download(&tiles)?
        },
        ("detect", _) => {
            let tiles = pipeline.tiles();
            pipeline.detect(&tiles)
        },
        ("filter", Some(sub)) => {
            let min_size = number(sub, "min-size")?.unwrap_or(pipeline.config().min_size);
            pipeline.filter(min_size)?
        },
        ("classify", Some(sub)) => {
            let tolerance = number(sub, "tolerance")?.unwrap_or(pipeline.config().tolerance);
            pipeline.classify(tolerance)?
        },
        _ => pipeline.run()?,
    };

    Ok(Some(report))
}

fn main() {
    env_logger::init();

    let matches = args::parse();

    match run(&matches) {
        Ok(None) => {},
        Ok(Some(report)) => {
            println!("{}", report);
            for (tile, err) in &report.failed {
                println!("  {}: {}", tile, err);
            }
            if !report.is_ok() {
                process::exit(2);
            }
        },
        Err(err) => {
            error!("{}", err);
            process::exit(1);
        },
    }
}
