/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{error, info};
use tokio::sync::mpsc;

#[macro_use]
extern crate lazy_static;

mod catalog;
mod config;
mod error;
mod http_client;
mod parser;
mod poller;
mod presets;
mod query;
mod sensor;
mod session;
mod units;

use config::{read_config, Config, DEFAULT_LANGUAGE};
use poller::{feed_poller, poll_feed, publisher};
use session::FmiSession;

#[derive(Parser)]
#[command(name = "fmi-sensors", version, about = "FMI open data sensor feeds")]
struct Cli {
    #[arg(long, default_value = "config.yml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll every configured feed on the configured interval
    Run,
    /// Poll every configured feed once
    Fetch,
    /// List station based stored queries
    Queries {
        #[arg(long, default_value = DEFAULT_LANGUAGE)]
        language: String,
        #[arg(long)]
        suffix: Option<String>,
    },
}

async fn run(config: Config, session: FmiSession) {
    let session = Arc::new(session);
    let (update_tx, update_rx) = mpsc::channel(10);

    let mut tasks = vec![];

    for feed in config.feeds {
        info!("Starting poller for {} ({})", feed.label, feed.request.query_id);
        let s = session.clone();
        let tx = update_tx.clone();
        let interval = config.interval;
        tasks.push(tokio::spawn(async move {
            feed_poller(s, feed, interval, tx).await
        }));
    }
    drop(update_tx);

    tasks.push(tokio::spawn(async move { publisher(update_rx).await }));
    info!("Started publisher");

    for task in tasks {
        if let Err(e) = task.await {
            error!("Task ended abnormally: {}", e);
        }
    }
}

async fn fetch(config: Config, session: FmiSession) -> bool {
    let mut ok = true;

    for feed in &config.feeds {
        match poll_feed(&session, feed, Utc::now()).await {
            Ok(state) => match serde_json::to_string_pretty(&state) {
                Ok(s) => println!("{}", s),
                Err(e) => error!("{}: {}", feed.label, e),
            },
            Err(e) => {
                error!("{}: connection problem: {}", feed.label, e);
                ok = false;
            }
        }
    }

    ok
}

async fn queries(session: FmiSession, language: &str, suffix: Option<&str>) -> bool {
    match session.list_stored_queries(language, suffix).await {
        Ok(queries) => {
            for q in queries {
                println!("{}\t{}", q.id, q.title);
            }
            true
        }
        Err(e) => {
            error!("Could not list stored queries: {}", e);
            false
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match read_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            error!("Copy config.yml.example as config.yml and edit it to your liking.");
            std::process::exit(1);
        }
    };

    info!("Successfully read config file with {} feeds", config.feeds.len());

    let session = match FmiSession::new(config.timeout, config.endpoints.clone()) {
        Ok(s) => s,
        Err(e) => {
            error!("Could not create HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let ok = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            run(config, session).await;
            true
        }
        Commands::Fetch => fetch(config, session).await,
        Commands::Queries { language, suffix } => {
            queries(session, &language, suffix.as_deref()).await
        }
    };

    if !ok {
        std::process::exit(1);
    }
}
