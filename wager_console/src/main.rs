// Legend for various fix-this comments:
//   * "TODO" - bug or missing crucial feature.
//   * "Improvement potential" - missing nice-to-have feature or an opportunity
//       to make code better or faster.

#![forbid(unsafe_code)]
#![cfg_attr(feature = "strict", deny(warnings))]

mod client_main;
mod config;
mod network;
mod rules_engine;
mod tui;

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgMatches, Command, arg};
use log::info;

use config::ClientConfig;
use wager_chess::identity::{
    FileIdentityStore, IdentityStore, PlayerId, demo_address, generate_address,
};
use wager_chess::session::MatchId;


fn main() -> anyhow::Result<()> {
    let identity_arg = || arg!(--identity <FILE> "File with the wallet address");
    let config_arg = || arg!(-c --config <FILE> "YAML config file; see ClientConfig for the fields");
    let matches = Command::new("Wager chess")
        .version(wager_chess::my_git_version!())
        .about("Console client for wager chess")
        .subcommand_required(true)
        .subcommand(
            Command::new("play")
                .about("Connect to the server and play")
                .arg(config_arg())
                .arg(arg!(-s --server <URL> "Server URL, e.g. ws://localhost:8080"))
                .arg(identity_arg())
                .arg(arg!(-m --"match" <MATCH_ID> "Open this match right away"))
                .arg(arg!(--"log-file" <FILE> "Where to write logs"))
                .arg(arg!(--demo "Use a demo wallet if there is no identity yet")),
        )
        .subcommand(
            Command::new("new-identity")
                .about("Generate a wallet address, replacing the existing one")
                .arg(config_arg())
                .arg(identity_arg())
                .arg(arg!(--demo "Generate a demo wallet address")),
        )
        .subcommand(
            Command::new("show-identity")
                .about("Print the stored wallet address")
                .arg(config_arg())
                .arg(identity_arg()),
        )
        .subcommand(
            Command::new("forget-identity")
                .about("Remove the stored wallet address")
                .arg(config_arg())
                .arg(identity_arg()),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("play", sub_matches)) => {
            let mut config = load_config(sub_matches)?;
            if let Some(url) = sub_matches.get_one::<String>("server") {
                config.server_url = url.clone();
            }
            if let Some(log_file) = sub_matches.get_one::<String>("log-file") {
                config.log_file = PathBuf::from(log_file);
            }
            init_logging(&config.log_file)?;
            let server_url = network::parse_server_url(&config.server_url)?;
            let mut store = FileIdentityStore::new(&config.identity_file);
            let me = match store.load().context("Failed to read identity.")? {
                Some(me) => me,
                None => {
                    let demo = sub_matches.get_flag("demo");
                    let me = new_identity(&mut store, demo, &config.identity_file)?;
                    println!("Created a new identity: {}", me.as_str());
                    me
                }
            };
            client_main::run(client_main::PlayConfig {
                server_url,
                me,
                match_id: sub_matches.get_one::<String>("match").map(MatchId::new),
                tick_interval: config.tick_interval,
                reconnect: config.reconnect,
                match_duration: config.match_duration,
                category: config.category,
            })
        }
        Some(("new-identity", sub_matches)) => {
            let config = load_config(sub_matches)?;
            let mut store = FileIdentityStore::new(&config.identity_file);
            let me = new_identity(&mut store, sub_matches.get_flag("demo"), &config.identity_file)?;
            println!("{}", me.as_str());
            Ok(())
        }
        Some(("show-identity", sub_matches)) => {
            let config = load_config(sub_matches)?;
            let store = FileIdentityStore::new(&config.identity_file);
            match store.load().context("Failed to read identity.")? {
                Some(me) => println!("{} ({})", me.as_str(), me.short()),
                None => println!("No identity in '{}'.", config.identity_file.display()),
            }
            Ok(())
        }
        Some(("forget-identity", sub_matches)) => {
            let config = load_config(sub_matches)?;
            let mut store = FileIdentityStore::new(&config.identity_file);
            store.clear().context("Failed to remove identity.")?;
            Ok(())
        }
        _ => unreachable!("Exhausted list of subcommands and subcommand_required prevents `None`"),
    }
}

fn load_config(sub_matches: &ArgMatches) -> anyhow::Result<ClientConfig> {
    let mut config = match sub_matches.get_one::<String>("config") {
        Some(path) => config::read_config_file(Path::new(path))?,
        None => ClientConfig::default(),
    };
    if let Some(identity_file) = sub_matches.get_one::<String>("identity") {
        config.identity_file = PathBuf::from(identity_file);
    }
    Ok(config)
}

// The terminal belongs to the UI, so logs go to a file.
fn init_logging(log_file: &Path) -> anyhow::Result<()> {
    let file = File::create(log_file)
        .with_context(|| format!("Failed to create log file '{}'.", log_file.display()))?;
    env_logger::Builder::new()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
    Ok(())
}

fn new_identity(
    store: &mut impl IdentityStore, demo: bool, path: &Path,
) -> anyhow::Result<PlayerId> {
    let mut rng = rand::rng();
    let me = if demo { demo_address(&mut rng) } else { generate_address(&mut rng) };
    store
        .store(&me)
        .with_context(|| format!("Failed to save identity to '{}'.", path.display()))?;
    info!("New identity: {}", me.as_str());
    Ok(me)
}
