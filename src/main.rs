// Copyright 2026 Roster Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod cli;
mod config;
mod index;
mod matcher;
mod model;
mod output;
mod presentation;
mod session;
mod source;
mod store;
mod transfer;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context as _;
use anyhow::Result;
use clap::CommandFactory;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::cli::Commands;
use crate::config::Config;
use crate::config::ConfigCtx;
use crate::index::SearchIndex;
use crate::model::Contact;
use crate::model::Conversation;
use crate::model::ResultGroup;
use crate::output::JsonResponse;
use crate::output::StatsOut;
use crate::output::print_json;
use crate::presentation::PresentationError;
use crate::presentation::SelectionIntent;
use crate::session::SearchSession;
use crate::source::NavigationHost;
use crate::store::Store;
use crate::store::StoreMode;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_global_config()?;
    init_tracing(&config.log_level);

    match cli.command {
        Commands::Init { path } => cmd_init(path, &config),
        Commands::Import(args) => {
            handle_result(cmd_import(&config, args.path, args.json), args.json)
        }
        Commands::Export(args) => {
            handle_result(cmd_export(&config, args.out, args.json), args.json)
        }
        Commands::Search(args) => {
            handle_result(cmd_search(&config, args.query, args.json), args.json)
        }
        Commands::Select(args) => handle_result(
            cmd_select(&config, args.group, args.index, args.query, args.json),
            args.json,
        ),
        Commands::Stats { json } => handle_result(cmd_stats(&config, json), json),
        Commands::Doctor { json } => handle_result(cmd_doctor(&config, json), json),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "roster", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_env("ROSTER_LOG")
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_result(result: Result<()>, json: bool) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            if json {
                let resp = match err.downcast_ref::<PresentationError>() {
                    Some(PresentationError::IndexOutOfRange { .. }) => {
                        JsonResponse::error("index_out_of_range", &err.to_string())
                            .with_hint("results changed; search again before selecting")
                    }
                    None => JsonResponse::error("error", &format!("{err:#}")),
                };
                print_json(&resp)?;
                Ok(())
            } else {
                Err(err)
            }
        }
    }
}

fn cmd_init(path: Option<PathBuf>, config: &Config) -> Result<()> {
    let root = path.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&root).with_context(|| format!("create dir {root:?}"))?;

    if let Some(config_path) = config::global_config_path()
        && !config_path.exists()
    {
        config::write_config(&config_path, config)?;
    }

    let store_path = if config.store_path.is_absolute() {
        config.store_path.clone()
    } else {
        root.join(&config.store_path)
    };
    Store::init(&store_path)?;

    println!("Initialized roster store at {}", store_path.display());
    Ok(())
}

fn cmd_import(config: &Config, path: PathBuf, json: bool) -> Result<()> {
    let ctx = ConfigCtx::from_cwd(config)?;
    let store = Store::open(&ctx.store_path(), StoreMode::ReadWrite)?;
    let file = std::fs::File::open(&path).with_context(|| format!("open {}", path.display()))?;
    let stats = transfer::import_store(&store, file)?;

    if json {
        let resp = JsonResponse::ok().with_stats(store_stats_out(&store, stats.total())?);
        print_json(&resp)?;
    } else {
        println!(
            "Imported {} users, {} conversations, {} feeds",
            stats.users, stats.conversations, stats.feeds
        );
    }
    Ok(())
}

fn cmd_export(config: &Config, out: Option<PathBuf>, json: bool) -> Result<()> {
    if json && out.is_none() {
        anyhow::bail!("--json requires --out for export");
    }
    let ctx = ConfigCtx::from_cwd(config)?;
    let store = Store::open(&ctx.store_path(), StoreMode::ReadOnly)?;

    let stats = if let Some(path) = out {
        let file =
            std::fs::File::create(&path).with_context(|| format!("create {}", path.display()))?;
        transfer::export_store(&store, file)?
    } else {
        let stdout = std::io::stdout();
        let handle = stdout.lock();
        transfer::export_store(&store, handle)?
    };

    if json {
        let resp = JsonResponse::ok().with_stats(store_stats_out(&store, stats.total())?);
        print_json(&resp)?;
    }
    Ok(())
}

fn open_session<'a>(ctx: &ConfigCtx, store: &'a Store) -> Result<SearchSession<&'a Store>> {
    let index = SearchIndex::load(store, store)?;
    Ok(SearchSession::new(index, store, ctx.config.titles.clone()))
}

fn cmd_search(config: &Config, query: String, json: bool) -> Result<()> {
    let started = Instant::now();
    let ctx = ConfigCtx::from_cwd(config)?;
    let store = Store::open(&ctx.store_path(), StoreMode::ReadOnly)?;
    let mut session = open_session(&ctx, &store)?;
    let refresh = session.update_query(&query);
    let view = session.view();

    let total = view.row_count(ResultGroup::Contacts) + view.row_count(ResultGroup::Feeds);
    info!(query = %query, total, "search");

    if json {
        let resp = JsonResponse::ok()
            .with_query(&query)
            .with_groups(view.to_json())
            .with_stats(StatsOut {
                took_ms: started.elapsed().as_millis() as i64,
                total_hits: total as i64,
                has_any_result: Some(refresh.scroll_to_top),
                snapshot: store.snapshot_token().ok(),
                ..Default::default()
            });
        print_json(&resp)?;
    } else if refresh.scroll_to_top {
        print!("{}", view.render_text());
    } else {
        println!("No results");
    }
    Ok(())
}

/// Records the navigation request instead of performing it.
#[derive(Default)]
struct CliNavigator {
    destination: Option<String>,
}

impl NavigationHost for CliNavigator {
    fn open_profile(&mut self, contact: &Contact) {
        self.destination = Some(format!(
            "open profile {} ({} @{})",
            contact.id, contact.name, contact.handle
        ));
    }

    fn open_conversation(&mut self, conversation: &Conversation) {
        self.destination = Some(format!("open conversation {}", conversation.id));
    }
}

fn cmd_select(
    config: &Config,
    group: ResultGroup,
    index: usize,
    query: String,
    json: bool,
) -> Result<()> {
    let ctx = ConfigCtx::from_cwd(config)?;
    let store = Store::open(&ctx.store_path(), StoreMode::ReadOnly)?;
    let mut session = open_session(&ctx, &store)?;
    session.update_query(&query);

    let mut navigator = CliNavigator::default();
    let intent = session.select(group, index, &mut navigator)?;

    if json {
        let mut warnings = Vec::new();
        if intent == SelectionIntent::None && group == ResultGroup::Feeds {
            warnings.push("feed has no conversation to open".to_string());
        }
        let resp = JsonResponse::ok()
            .with_query(&query)
            .with_row(group.as_label(), index)
            .with_selection(intent.to_json())
            .with_warnings(warnings);
        print_json(&resp)?;
    } else {
        match navigator.destination {
            Some(destination) => println!("{destination}"),
            None => println!("no action"),
        }
    }
    Ok(())
}

fn store_stats_out(store: &Store, total_hits: usize) -> Result<StatsOut> {
    let stats = store.stats()?;
    Ok(StatsOut {
        took_ms: 0,
        total_hits: total_hits as i64,
        contact_count: Some(stats.contact_count),
        feed_count: Some(stats.feed_count),
        conversation_count: Some(stats.conversation_count),
        db_size_bytes: Some(stats.db_size_bytes),
        snapshot: store.snapshot_token().ok(),
        ..Default::default()
    })
}

fn cmd_stats(config: &Config, json: bool) -> Result<()> {
    let ctx = ConfigCtx::from_cwd(config)?;
    let store = Store::open(&ctx.store_path(), StoreMode::ReadOnly)?;

    if json {
        let resp = JsonResponse::ok().with_stats(store_stats_out(&store, 0)?);
        print_json(&resp)?;
    } else {
        let stats = store.stats()?;
        println!("Users: {}", stats.user_count);
        println!("Contacts: {}", stats.contact_count);
        println!("Conversations: {}", stats.conversation_count);
        println!("Feeds: {}", stats.feed_count);
        println!("DB size: {} bytes", stats.db_size_bytes);
    }
    Ok(())
}

fn cmd_doctor(config: &Config, json: bool) -> Result<()> {
    let ctx = ConfigCtx::from_cwd(config)?;
    let store = Store::open(&ctx.store_path(), StoreMode::ReadOnly)?;
    let report = store.integrity_check()?;

    if json {
        let mut stats = store_stats_out(&store, 0)?;
        stats.integrity = Some(report.status.clone());
        stats.dangling_feeds = Some(report.dangling_feeds);
        let mut warnings = Vec::new();
        if report.dangling_feeds > 0 {
            warnings.push(format!(
                "{} feeds link to groups without a conversation",
                report.dangling_feeds
            ));
        }
        let resp = JsonResponse::ok().with_stats(stats).with_warnings(warnings);
        print_json(&resp)?;
    } else {
        println!("Integrity: {}", report.status);
        println!(
            "Users: {} ({} contacts)",
            report.stats.user_count, report.stats.contact_count
        );
        if report.dangling_feeds > 0 {
            println!("Feeds without conversation: {}", report.dangling_feeds);
        }
    }
    Ok(())
}
