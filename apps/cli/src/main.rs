use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    BroadcastEventSink, EventSink, FanoutSink, FollowCoordinator, FollowGraphStore,
    FollowGraphView, HttpGraphService, ListState, Notifier, Severity, SharedSession,
};
use shared::{
    domain::{OperationKind, Phase},
    protocol::{LifecycleEvent, TaggedEvent},
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

#[derive(Parser, Debug)]
#[command(name = "follow-graph", about = "Load and change follow relationships")]
struct Cli {
    /// Config file; defaults to ./follow_graph.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    server_url: Option<String>,
    /// Account that follow/unfollow act as.
    #[arg(long)]
    username: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Followers {
        username: String,
        #[arg(long)]
        limit: Option<u32>,
    },
    Following {
        username: String,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Loads followers and following concurrently.
    Graph {
        username: String,
        #[arg(long)]
        limit: Option<u32>,
    },
    Follow {
        target: String,
    },
    Unfollow {
        target: String,
    },
}

struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        eprintln!("[{severity:?}] {message}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = config::load_settings(cli.config.as_deref())?;
    if let Some(server_url) = cli.server_url {
        settings.server_url = server_url;
    }
    if let Some(username) = cli.username {
        settings.username = Some(username);
    }

    let graph = HttpGraphService::with_timeout(
        &settings.server_url,
        Duration::from_secs(settings.request_timeout_secs),
    )?;
    info!(server = %graph.base_url(), "cli: using graph service");
    let store = Arc::new(FollowGraphStore::default());
    let broadcast = Arc::new(BroadcastEventSink::default());
    let printer = spawn_printer(&broadcast);
    let sink: Arc<dyn EventSink> = Arc::new(FanoutSink::new(vec![
        store.clone() as Arc<dyn EventSink>,
        broadcast.clone() as Arc<dyn EventSink>,
    ]));
    drop(broadcast);

    let coordinator = FollowCoordinator::new_with_dependencies(
        Arc::new(graph),
        Arc::new(SharedSession::new(settings.username.clone())),
        Arc::new(ConsoleNotifier),
        sink,
    );

    let outcome = run(&coordinator, cli.command, settings.default_limit).await;
    drop(coordinator);
    printer.await.context("event printer task failed")?;

    let terminals = outcome?;
    let view = store.view();
    for terminal in &terminals {
        print_summary(&view, terminal);
    }
    match terminals.iter().find(|event| event.phase == Phase::Error) {
        Some(failed) => Err(anyhow!(
            "{} failed: {}",
            failed.tag(),
            failed
                .reason
                .as_ref()
                .map(|reason| reason.message.as_str())
                .unwrap_or("unknown reason")
        )),
        None => Ok(()),
    }
}

async fn run(
    coordinator: &FollowCoordinator,
    command: Command,
    default_limit: u32,
) -> Result<Vec<LifecycleEvent>> {
    let terminals = match command {
        Command::Followers { username, limit } => vec![
            coordinator
                .load_followers(&username, Some(limit.unwrap_or(default_limit)))
                .await?,
        ],
        Command::Following { username, limit } => vec![
            coordinator
                .load_following(&username, Some(limit.unwrap_or(default_limit)))
                .await?,
        ],
        Command::Graph { username, limit } => {
            let limit = Some(limit.unwrap_or(default_limit));
            let (followers, following) = futures::future::join(
                coordinator.load_followers(&username, limit),
                coordinator.load_following(&username, limit),
            )
            .await;
            vec![followers?, following?]
        }
        Command::Follow { target } => vec![coordinator.follow(&target).await?],
        Command::Unfollow { target } => vec![coordinator.unfollow(&target).await?],
    };
    Ok(terminals)
}

fn spawn_printer(broadcast: &BroadcastEventSink) -> tokio::task::JoinHandle<()> {
    let mut rx = broadcast.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&TaggedEvent::from(event)) {
                    Ok(line) => println!("{line}"),
                    Err(err) => warn!("cli: failed to encode event: {err}"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("cli: event printer lagged, skipped {skipped} events")
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn print_summary(view: &FollowGraphView, terminal: &LifecycleEvent) {
    let subject = terminal.subject_user.as_str();
    match terminal.kind {
        OperationKind::FollowerLoad => {
            print_list("followers of", subject, view.followers(subject))
        }
        OperationKind::FollowingLoad => {
            print_list("followed by", subject, view.following(subject))
        }
        OperationKind::Follow | OperationKind::Unfollow => {
            let state = if view.is_followed(subject) {
                "following"
            } else {
                "not following"
            };
            eprintln!("{}: {subject} ({state})", terminal.kind);
        }
    }
}

fn print_list(label: &str, subject: &str, state: Option<&ListState>) {
    let Some(state) = state else {
        return;
    };
    if let Some(err) = &state.last_error {
        eprintln!("{label} {subject}: error: {err}");
        return;
    }
    let names: Vec<&str> = state.usernames().collect();
    eprintln!(
        "{label} {subject}: {} account(s) (limit {}): {}",
        names.len(),
        state.limit.unwrap_or_default(),
        names.join(", ")
    );
}
