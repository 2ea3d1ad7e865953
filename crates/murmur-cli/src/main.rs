//! Murmur terminal client entry point.
//!
//! # Usage
//!
//! ```bash
//! # Sign in and open room 7
//! murmur --api http://localhost:8080 --ws ws://localhost:8080/ws/websocket \
//!     --username alice --password secret --room 7
//!
//! # Create the account first
//! murmur --username alice --password secret --register --email alice@example.com
//! ```

// The chat itself is written to stdout
#![allow(clippy::print_stdout)]

use std::sync::Arc;

use clap::Parser;
use murmur_app::{AuthApi, HttpApi, Runtime, RuntimeConfig, SyncHandle, WsDriver};
use murmur_cli::{
    CliError, Input,
    command::{self, HELP},
    output,
};
use murmur_client::{ClientIdentity, RoomId, SyncEvent};
use murmur_core::{Credentials, SystemEnv};
use murmur_proto::payloads::RoomKind;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Murmur chat client
#[derive(Parser, Debug)]
#[command(name = "murmur")]
#[command(about = "Terminal client for the Murmur chat server")]
#[command(version)]
struct Args {
    /// Base URL of the REST API
    #[arg(long, default_value = "http://localhost:8080")]
    api: String,

    /// WebSocket endpoint carrying STOMP
    #[arg(long, default_value = "ws://localhost:8080/ws/websocket")]
    ws: String,

    /// Account name
    #[arg(short, long)]
    username: String,

    /// Account password
    #[arg(short, long)]
    password: String,

    /// Create the account before signing in
    #[arg(long, requires = "email")]
    register: bool,

    /// Email for a new account
    #[arg(long)]
    email: Option<String>,

    /// Room to open once rooms are loaded
    #[arg(short, long)]
    room: Option<RoomId>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // stdout belongs to the chat
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(run(args).await?)
}

async fn run(args: Args) -> Result<(), CliError> {
    let auth = HttpApi::new(&args.api);
    let session = if args.register {
        let email = args.email.as_deref().ok_or(CliError::MissingEmail)?;
        auth.register(&args.username, email, &args.password).await?
    } else {
        auth.login(&args.username, &args.password).await?
    };
    tracing::info!(user_id = session.user_id, "signed in as {}", session.username);

    let mut config = RuntimeConfig::default();
    config.client.connection.host = stomp_host(&args.ws).to_string();
    config.client.connection.credentials =
        Some(Credentials { login: session.username.clone(), token: session.token.clone() });

    let identity = ClientIdentity::new(session.user_id, session.username.clone());
    let api = Arc::new(auth.with_token(session.token));
    let (runtime, handle) =
        Runtime::new(WsDriver::new(args.ws.as_str()), SystemEnv, identity, api, config);
    let task = tokio::spawn(runtime.run());

    let mut events = handle.subscribe();
    handle.connect().await?;
    handle.refresh_rooms().await?;

    let mut pending_room = args.room;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match command::parse(&line) {
                    Ok(Some(Input::Quit)) => break,
                    Ok(Some(input)) => {
                        if let Err(err) = execute(&handle, input).await {
                            println!("error: {err}");
                        }
                    },
                    Ok(None) => {},
                    Err(err) => println!("{err}"),
                }
            },

            event = events.recv() => match event {
                Ok(event) => {
                    if matches!(event, SyncEvent::RoomsUpdated)
                        && let Some(room_id) = pending_room.take()
                        && let Err(err) = handle.select_room(Some(room_id)).await
                    {
                        println!("error: {err}");
                    }
                    for line in output::event(&event, &handle.snapshot()) {
                        println!("{line}");
                    }
                },
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "event listener lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.shutdown().await?;
    task.await?;
    Ok(())
}

async fn execute(handle: &SyncHandle, input: Input) -> Result<(), CliError> {
    match input {
        Input::Say(text) => handle.send_message(&text).await?,
        // Listings print when the refreshed state arrives on the bus
        Input::Rooms => handle.refresh_rooms().await?,
        Input::Join(room_id) => handle.select_room(Some(room_id)).await?,
        Input::Leave => handle.select_room(None).await?,
        Input::Create { name, participants } => {
            let kind = if participants.len() > 1 { RoomKind::Group } else { RoomKind::Private };
            let room = handle.create_room(name, kind, participants).await?;
            println!("created {}", output::room(&room));
        },
        Input::Search(query) => {
            for user in handle.search_users(query).await? {
                println!("{}", output::user(&user));
            }
        },
        Input::Online => handle.refresh_online_users().await?,
        Input::Help => println!("{HELP}"),
        Input::Quit => {},
    }
    Ok(())
}

/// Host part of a URL, for the STOMP `host` header.
fn stomp_host(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split('/').next().unwrap_or(rest);
    authority.split(':').next().unwrap_or(authority)
}
