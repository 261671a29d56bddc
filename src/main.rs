use std::{
    io::BufReader,
    path::{Path, PathBuf},
    sync::{
        Arc,
        mpsc::{self, Receiver, RecvTimeoutError},
    },
    time::Duration,
};

use clap::Parser;
use docwatch::{
    Config,
    DataDir,
    Error,
    IndexService,
    Monitor,
    Result,
    config,
    console::{self, ConsoleCommand},
    monitor::{self, MonitorOptions, RootStates},
    search::{self, DEFAULT_FIELDS, ScoredResult},
    tantivy_index::IndexOptions,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command};

/// How often the interactive loop checks that the monitor is alive.
const MONITOR_POLL: Duration = Duration::from_millis(250);

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("DOCWATCH_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| data_dir.config_file());
    let config = Config::load(&config_path)?;
    let folders = if cli.folders.is_empty() {
        config.resolved_folders()
    } else {
        cli.folders.clone()
    };

    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => cmd_watch(&data_dir, &config, &folders),
        Command::Scan => cmd_scan(&data_dir, &config, &folders),
        Command::Search(args) => cmd_search(&data_dir, &config, &args),
        Command::Status(args) => {
            cmd_status(&data_dir, &config_path, &config, &folders, args.json)
        }
        Command::Completions(args) => {
            args.generate();
            Ok(())
        }
    }
}

fn index_options(config: &Config) -> IndexOptions {
    IndexOptions {
        analyzer: config.analyzer,
        writer_memory: config.writer_memory_bytes,
    }
}

/// Create missing folders and say so.
fn prepare_folders(folders: &[PathBuf]) -> Result<()> {
    for folder in config::ensure_folders(folders)? {
        println!("Created folder: {}", folder.display());
    }
    Ok(())
}

fn cmd_watch(
    data_dir: &DataDir,
    config: &Config,
    folders: &[PathBuf],
) -> Result<()> {
    prepare_folders(folders)?;

    let service = Arc::new(IndexService::open(
        &data_dir.index_dir()?,
        &index_options(config),
    )?);
    let options = MonitorOptions {
        debounce: config.debounce(),
        ..MonitorOptions::default()
    };
    let mut monitor = match Monitor::start(service.clone(), folders, options) {
        Ok(monitor) => monitor,
        Err(e) => {
            if let Err(close_err) = service.close() {
                error!("closing index failed: {close_err}");
            }
            return Err(e);
        }
    };

    println!("Monitoring {} folder(s):", monitor.roots().len());
    for root in monitor.roots() {
        println!("  {}", root.display());
    }
    println!("{}", console::HELP);

    let (tx, rx) = mpsc::channel();
    console::spawn_input(BufReader::new(std::io::stdin()), tx)?;
    interactive_loop(&service, &monitor, &rx, config.max_results);

    let stopped = monitor.stop();
    let closed = service.close();
    println!("Monitoring stopped.");
    stopped.and(closed)
}

/// Serve console commands until quit, end of input, or the monitor
/// stopping on its own.
fn interactive_loop(
    service: &IndexService,
    monitor: &Monitor,
    commands: &Receiver<ConsoleCommand>,
    max_results: usize,
) {
    loop {
        match commands.recv_timeout(MONITOR_POLL) {
            Ok(ConsoleCommand::Search(query)) => {
                run_search(service, &query, max_results);
            }
            Ok(ConsoleCommand::Help) => println!("{}", console::HELP),
            Ok(ConsoleCommand::Quit) | Err(RecvTimeoutError::Disconnected) => {
                return;
            }
            Err(RecvTimeoutError::Timeout) => {
                if monitor.is_finished() {
                    error!("monitor stopped unexpectedly");
                    return;
                }
            }
        }
    }
}

fn run_search(service: &IndexService, query: &str, max_results: usize) {
    match search::search(service, query, DEFAULT_FIELDS, max_results) {
        Ok(results) => print!("{}", search::format_results(&results)),
        Err(e @ Error::QuerySyntax { .. }) => eprintln!("{e}"),
        Err(e) => error!("search failed: {e}"),
    }
}

fn cmd_scan(
    data_dir: &DataDir,
    config: &Config,
    folders: &[PathBuf],
) -> Result<()> {
    prepare_folders(folders)?;

    let service =
        IndexService::open(&data_dir.index_dir()?, &index_options(config))?;
    let roots = monitor::canonical_roots(folders)?;
    let report =
        monitor::initial_scan(&service, &roots, &RootStates::new(&roots));
    service.close()?;
    let report = report?;

    info!(indexed = report.indexed, skipped = report.skipped, "scan finished");
    println!(
        "Indexed {} file(s), skipped {} from {} folder(s)",
        report.indexed,
        report.skipped,
        roots.len()
    );
    Ok(())
}

fn cmd_search(
    data_dir: &DataDir,
    config: &Config,
    args: &cli::SearchArgs,
) -> Result<()> {
    let service = IndexService::open_read_only(
        &data_dir.index_dir()?,
        &index_options(config),
    )?;
    let count = args.count.unwrap_or(config.max_results);
    let results = search::search(&service, &args.query, DEFAULT_FIELDS, count)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results_json(&results))?);
    } else {
        print!("{}", search::format_results(&results));
    }
    Ok(())
}

fn results_json(results: &[ScoredResult]) -> serde_json::Value {
    results
        .iter()
        .map(|r| {
            serde_json::json!({
                "path": r.path,
                "filename": r.filename,
                "modified": r.modified_at.to_rfc3339(),
                "score": r.score,
            })
        })
        .collect()
}

fn cmd_status(
    data_dir: &DataDir,
    config_path: &Path,
    config: &Config,
    folders: &[PathBuf],
    json: bool,
) -> Result<()> {
    let index_dir = data_dir.index_dir()?;
    let service = IndexService::open_read_only(&index_dir, &index_options(config))?;
    let documents = service.open_reader()?.doc_count();

    if json {
        let value = serde_json::json!({
            "data_dir": data_dir.root(),
            "config": config_path,
            "index": index_dir,
            "folders": folders,
            "documents": documents,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("Data directory: {}", data_dir.root().display());
        println!("Config file: {}", config_path.display());
        println!("Folders: {}", folders.len());
        for folder in folders {
            let note = if folder.is_dir() { "" } else { " (missing)" };
            println!("  {}{note}", folder.display());
        }
        println!("Documents: {documents}");
    }
    Ok(())
}
