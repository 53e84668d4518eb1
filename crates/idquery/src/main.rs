//! `idq` - CLI for idquery
//!
//! This binary loads record dumps and provides one-shot lookups as well as
//! an interactive lookup terminal.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use idquery::cli::{
    render, Cli, Command, ConfigCommand, LoadCommand, LookupCommand, OutputFormat,
    SampleCommand, StatsCommand, TerminalCommand,
};
use idquery::terminal::spawn_refresh;
use idquery::{init_logging, Config, IngestReport, Ingestor, LookupService, RecordStore, Terminal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    let Cli {
        config: config_path,
        data,
        command,
        ..
    } = cli;

    match command {
        Command::Config(cmd) => handle_config(config_path, cmd),
        Command::Load(cmd) => handle_load(&load_config(config_path, data)?, &cmd).await,
        Command::Lookup(cmd) => handle_lookup(&load_config(config_path, data)?, &cmd).await,
        Command::Sample(cmd) => handle_sample(&load_config(config_path, data)?, &cmd).await,
        Command::Stats(cmd) => handle_stats(&load_config(config_path, data)?, &cmd).await,
        Command::Terminal(cmd) => handle_terminal(&load_config(config_path, data)?, &cmd).await,
    }
}

/// Load configuration, with `--data` files taking precedence.
fn load_config(path: Option<PathBuf>, data: Vec<PathBuf>) -> anyhow::Result<Config> {
    Ok(Config::load_from(path)
        .context("failed to load configuration")?
        .with_files(data))
}

/// Discover sources, ingest them and return a service over the result.
async fn open(config: &Config) -> anyhow::Result<(LookupService, Ingestor, IngestReport)> {
    let ingestor = Ingestor::from_config(config).context("failed to locate data files")?;
    let store = RecordStore::empty();
    let report = ingestor
        .refresh(&store)
        .await
        .context("ingestion failed")?;
    let service = LookupService::new(store, config.lookup.clone());
    Ok((service, ingestor, report))
}

async fn handle_load(config: &Config, cmd: &LoadCommand) -> anyhow::Result<()> {
    let (_, _, report) = open(config).await?;
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render::report(&report));
    }
    Ok(())
}

async fn handle_lookup(config: &Config, cmd: &LookupCommand) -> anyhow::Result<()> {
    let (service, _, _) = open(config).await?;
    let response = service.respond(&cmd.user_id);
    match cmd.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        OutputFormat::Plain => print!("{}", render::lookup(&response, None)),
    }
    Ok(())
}

async fn handle_sample(config: &Config, cmd: &SampleCommand) -> anyhow::Result<()> {
    let (service, _, _) = open(config).await?;
    let ids = match cmd.count {
        Some(n) => service.sample_ids(n),
        None => service.default_sample(),
    };
    match cmd.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&ids)?),
        OutputFormat::Plain => print!("{}", render::sample(&ids)),
    }
    Ok(())
}

async fn handle_stats(config: &Config, cmd: &StatsCommand) -> anyhow::Result<()> {
    let (service, _, _) = open(config).await?;
    let stats = service.stats();
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", render::stats(&stats));
    }
    Ok(())
}

async fn handle_terminal(config: &Config, cmd: &TerminalCommand) -> anyhow::Result<()> {
    let (service, ingestor, report) = open(config).await?;
    print!("{}", render::report(&report));
    println!("Sample IDs: {}", service.default_sample().join(", "));
    println!("Type :help for commands.");
    println!();

    let interval = match cmd.refresh {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => config.refresh_interval(),
    };
    let refresher =
        interval.map(|every| spawn_refresh(ingestor.clone(), service.store().clone(), every));

    let terminal = Terminal::new(service, ingestor);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let result = terminal.run(stdin, tokio::io::stdout()).await;

    if let Some(handle) = refresher {
        handle.abort();
    }
    result.context("terminal session failed")
}

fn handle_config(path: Option<PathBuf>, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(path).context("failed to load configuration")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                print!("{}", render::config(&config));
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.or(path).unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
