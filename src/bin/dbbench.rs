#[macro_use]
extern crate clap;
#[macro_use]
extern crate slog;

use clap::{Arg, ArgMatches};
use slog::Drain;
use std::io;
use std::path::PathBuf;
use std::process;

use dbbench::{BackendConfig, Config, Error, Result, BACKEND_NAMES, DEFAULT_INPUT};

const DEFAULT_BACKEND: &str = "mongodb";

fn main() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build();
    let result = match runtime {
        Ok(runtime) => runtime.block_on(run()),
        Err(err) => Err(err.into()),
    };

    if let Err(err) = result {
        use std::error::Error;

        eprintln!("Error: {}", err);

        let mut source: &dyn Error = &err;
        while let Some(err) = source.source() {
            eprintln!("Caused by: {}", err);
            source = err;
        }
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let root = slog::Logger::root(drain, o!());

    let matches = app_from_crate!()
        .arg(
            Arg::with_name("backend")
                .long("backend")
                .takes_value(true)
                .possible_values(BACKEND_NAMES)
                .help("The store to benchmark"),
        )
        .arg(
            Arg::with_name("input")
                .long("input")
                .takes_value(true)
                .help("Tab-separated file of six-column rows"),
        )
        .arg(
            Arg::with_name("uri")
                .long("uri")
                .takes_value(true)
                .help("Connection string for mongodb or redis"),
        )
        .arg(Arg::with_name("database").long("database").takes_value(true))
        .arg(Arg::with_name("collection").long("collection").takes_value(true))
        .arg(
            Arg::with_name("batch-size")
                .long("batch-size")
                .takes_value(true)
                .help("Records per pipeline or write batch"),
        )
        .arg(
            Arg::with_name("pattern")
                .long("pattern")
                .takes_value(true)
                .help("Redis key pattern"),
        )
        .arg(
            Arg::with_name("path")
                .long("path")
                .takes_value(true)
                .help("sled database directory"),
        )
        .get_matches();

    let config = make_config(&matches)?;

    info!(root, "Starting benchmark";
        "version" => crate_version!(),
        "backend" => config.backend.name(),
        "input" => config.input.to_str());

    let stdout = io::stdout();
    dbbench::benchmark(root, &config, stdout.lock()).await?;
    Ok(())
}

fn make_config(matches: &ArgMatches) -> Result<Config> {
    let name = matches.value_of("backend").unwrap_or(DEFAULT_BACKEND);
    let mut backend = BackendConfig::from_name(name)?;

    match &mut backend {
        BackendConfig::Mongo {
            uri,
            database,
            collection,
        } => {
            set_string(matches, "uri", uri);
            set_string(matches, "database", database);
            set_string(matches, "collection", collection);
        }
        BackendConfig::Redis {
            url,
            batch_size,
            pattern,
        } => {
            set_string(matches, "uri", url);
            set_string(matches, "pattern", pattern);
            set_batch_size(matches, batch_size)?;
        }
        BackendConfig::Sled { path, batch_size } => {
            if let Some(value) = matches.value_of("path") {
                *path = PathBuf::from(value);
            }
            set_batch_size(matches, batch_size)?;
        }
    }
    backend.validate()?;

    let input = matches.value_of("input").unwrap_or(DEFAULT_INPUT);
    Ok(Config::new(input, backend))
}

fn set_string(matches: &ArgMatches, name: &str, target: &mut String) {
    if let Some(value) = matches.value_of(name) {
        *target = value.to_owned();
    }
}

fn set_batch_size(matches: &ArgMatches, target: &mut usize) -> Result<()> {
    if let Some(value) = matches.value_of("batch-size") {
        *target = value
            .parse()
            .map_err(|_| Error::Config(format!("invalid batch size '{}'", value)))?;
    }
    Ok(())
}
