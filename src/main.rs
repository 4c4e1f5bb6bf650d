use std::sync::Arc;

use clap::{Parser, Subcommand};
use scenesync::editor::{Editor, MemoryEditor, MemoryShell};
use scenesync::relay::TransportError;
use scenesync::relay::memory::MemoryRelay;
use scenesync::relay::server;
use scenesync::relay::ws::WsConnector;
use scenesync::room::{self, RoomLinkError};
use scenesync::{CollabError, CollabSession, InitialSceneHandle, SessionConfig};
use tokio::net::TcpListener;
use tracing::{info, warn};

type CliSession = CollabSession<MemoryEditor, MemoryShell>;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Collab(#[from] CollabError),
    #[error(transparent)]
    Link(#[from] RoomLinkError),
    #[error("link has no #room= fragment")]
    MissingRoom,
    #[error("collaboration already running")]
    AlreadyStarted,
    #[error("relay listen failed: {0}")]
    Listen(#[from] std::io::Error),
    #[error(transparent)]
    Relay(#[from] TransportError),
}

#[derive(Parser, Debug)]
#[command(name = "scenesync", about = "Encrypted scene collaboration client")]
struct Cli {
    /// Relay websocket URL; defaults to `COLLAB_RELAY_URL` or a local `relay`.
    #[arg(long)]
    relay_url: Option<String>,

    /// Page the collaboration link is built on.
    #[arg(long, env = "COLLAB_BASE_URL", default_value = "http://127.0.0.1:3000/")]
    base_url: String,

    #[arg(long, env = "COLLAB_DISPLAY_NAME", default_value = "scenesync-cli")]
    name: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a fresh collaboration link.
    Link,
    /// Join the room in a collaboration link.
    Join { link: String },
    /// Create a room, print its link and serve an empty scene.
    Host,
    /// Run a relay that `host` and `join` can connect to.
    Relay {
        #[arg(long, default_value = "127.0.0.1:3002")]
        listen: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = SessionConfig::from_env();
    if let Some(url) = cli.relay_url {
        config.relay_url = url;
    }

    match cli.command {
        Command::Link => {
            println!("{}", room::collaboration_link(&cli.base_url, &room::generate_room_address()));
            Ok(())
        }
        Command::Join { link } => run_join(config, &cli.base_url, &cli.name, &link).await,
        Command::Host => run_host(config, &cli.base_url, &cli.name).await,
        Command::Relay { listen } => run_relay(&listen).await,
    }
}

fn new_session(config: SessionConfig, base_url: &str, name: &str) -> CliSession {
    let connector = Arc::new(WsConnector::new(config.relay_url.clone()));
    CollabSession::new(connector, config, MemoryEditor::new(), MemoryShell::new(base_url, name))
}

async fn run_join(config: SessionConfig, base_url: &str, name: &str, link: &str) -> Result<(), CliError> {
    let address = room::parse_collaboration_link(link)?.ok_or(CliError::MissingRoom)?;
    let mut session = new_session(config, base_url, name);
    let handle = session.start_session(Some(address)).await?.ok_or(CliError::AlreadyStarted)?;
    info!(room_id = ?session.room_address().map(|a| &a.room_id), "cli: joined");
    serve(session, handle).await
}

async fn run_host(config: SessionConfig, base_url: &str, name: &str) -> Result<(), CliError> {
    let mut session = new_session(config, base_url, name);
    let handle = session.start_session(None).await?.ok_or(CliError::AlreadyStarted)?;
    if let Some(url) = session.shell().share_url() {
        println!("{url}");
    }
    serve(session, handle).await
}

async fn run_relay(listen: &str) -> Result<(), CliError> {
    let listener = TcpListener::bind(listen).await?;
    let relay = MemoryRelay::new().without_log();
    tokio::select! {
        res = server::serve(listener, relay) => res?,
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "cli: ctrl-c handler failed");
            }
        }
    }
    info!("cli: relay stopped");
    Ok(())
}

/// Drive the session until Ctrl-C or the relay goes away, logging traffic.
async fn serve(mut session: CliSession, mut handle: InitialSceneHandle) -> Result<(), CliError> {
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut handshake_done = false;

    loop {
        tokio::select! {
            res = &mut shutdown => {
                if let Err(e) = res {
                    warn!(error = %e, "cli: ctrl-c handler failed");
                }
                session.end_session();
                break;
            }
            alive = session.step() => {
                if !alive {
                    break;
                }
            }
        }

        if !handshake_done {
            if let Some(initial) = handle.try_wait() {
                handshake_done = true;
                let elements = initial.map_or(0, |scene| scene.elements.len());
                info!(elements, "cli: handshake complete");
            }
        }
        for update in session.editor_mut().take_updates() {
            if let Some(elements) = &update.elements {
                info!(count = elements.len(), "cli: scene replaced");
            }
            if let Some(collaborators) = &update.collaborators {
                info!(peers = collaborators.len(), "cli: presence changed");
            }
        }
    }

    info!(elements = session.editor().scene_elements().len(), "cli: session closed");
    Ok(())
}
