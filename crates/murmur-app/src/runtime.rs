//! Generic runtime for application orchestration.
//!
//! The Runtime drives the event loop, coordinating between:
//! - [`Client`]: chat sync state machine
//! - [`Driver`]: platform-specific transport
//! - [`ChatApi`]: REST collaborator for rooms, history and users
//! - [`SyncHandle`]: UI commands in, events and snapshots out

use std::{collections::VecDeque, sync::Arc, time::Duration};

use futures::{FutureExt, StreamExt, future::BoxFuture, stream::FuturesUnordered};
use murmur_client::{
    ChatSnapshot, Client, ClientAction, ClientConfig, ClientError, ClientEvent, ClientIdentity,
    Environment, RoomId, SyncEvent,
};
use murmur_proto::payloads::{ChatRoom, CreateRoomRequest, Message, User};
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    time::MissedTickBehavior,
};
use tracing::{debug, warn};

use crate::{
    ApiError, ChatApi, Driver, SyncHandle, TransportEvent,
    handle::{Command, Reply},
};

/// How often timers (reconnect, heart-beats, typing expiry) are evaluated.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Queued UI commands before senders wait.
pub const DEFAULT_COMMAND_CAPACITY: usize = 64;

/// Events buffered per bus listener before a slow listener lags.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Client and connection settings
    pub client: ClientConfig,
    /// Timer resolution
    pub tick_interval: Duration,
    /// Command queue size
    pub command_capacity: usize,
    /// Event bus size
    pub event_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Finished REST call, fed back into the loop.
enum Completion {
    History { room_id: RoomId, result: Result<Vec<Message>, ApiError> },
    Rooms(Result<Vec<ChatRoom>, ApiError>),
    OnlineUsers(Result<Vec<User>, ApiError>),
    Created { result: Result<ChatRoom, ApiError>, reply: Reply<ChatRoom, ApiError> },
    /// Answered the caller directly, nothing to apply
    Answered,
}

/// Driver handed back by an open attempt. `None` when the attempt was
/// abandoned before it finished.
type Opened<D> = (D, Option<Result<(), <D as Driver>::Error>>);

/// Transport open running alongside the loop. The driver travels with the
/// future and comes back when it resolves.
struct Opening<D: Driver> {
    future: BoxFuture<'static, Opened<D>>,
    cancel: oneshot::Sender<()>,
}

/// Generic runtime that orchestrates Client, Driver and the REST API.
///
/// # Type Parameters
///
/// - `D`: Platform-specific transport driver
/// - `E`: Environment providing time
pub struct Runtime<D, E>
where
    D: Driver + 'static,
    E: Environment,
{
    /// `None` while an open is in flight
    driver: Option<D>,
    opening: Option<Opening<D>>,
    env: E,
    client: Client<E>,
    api: Arc<dyn ChatApi>,
    commands: mpsc::Receiver<Command>,
    events: broadcast::Sender<SyncEvent>,
    snapshot: watch::Sender<ChatSnapshot>,
    pending: FuturesUnordered<BoxFuture<'static, Completion>>,
    tick_interval: Duration,
}

impl<D, E> Runtime<D, E>
where
    D: Driver + 'static,
    E: Environment,
{
    /// Create a runtime and the handle that controls it.
    ///
    /// Nothing happens until [`run`](Self::run) is polled.
    pub fn new(
        driver: D,
        env: E,
        identity: ClientIdentity,
        api: Arc<dyn ChatApi>,
        config: RuntimeConfig,
    ) -> (Self, SyncHandle) {
        let (command_tx, commands) = mpsc::channel(config.command_capacity.max(1));
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let client = Client::new(env.clone(), identity, config.client);
        let (snapshot, snapshot_rx) = watch::channel(client.snapshot());

        let handle = SyncHandle::new(command_tx, events.clone(), snapshot_rx);
        let runtime = Self {
            driver: Some(driver),
            opening: None,
            env,
            client,
            api,
            commands,
            events,
            snapshot,
            pending: FuturesUnordered::new(),
            tick_interval: config.tick_interval,
        };
        (runtime, handle)
    }

    /// Run the event loop until a shutdown is requested or every handle is
    /// dropped. The connection is closed gracefully on the way out.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },

                event = Self::next_transport_event(&mut self.driver), if self.transport_open() => {
                    self.handle_transport(event).await;
                },

                opened = Self::next_opened(&mut self.opening), if self.opening.is_some() => {
                    self.handle_opened(opened).await;
                },

                Some(completion) = self.pending.next(), if !self.pending.is_empty() => {
                    self.handle_completion(completion).await;
                },

                _ = ticker.tick() => {
                    let now = self.env.now();
                    let actions = self.feed(ClientEvent::Tick { now });
                    self.execute(actions).await;
                },
            }
        }

        debug!("runtime stopping");
        let actions = self.feed(ClientEvent::Disconnect);
        self.execute(actions).await;
        self.abandon_open().await;
        if let Some(driver) = self.driver.as_mut() {
            driver.close().await;
        }
    }

    fn transport_open(&self) -> bool {
        self.driver.as_ref().is_some_and(Driver::is_open)
    }

    async fn next_transport_event(driver: &mut Option<D>) -> TransportEvent {
        match driver {
            Some(driver) => driver.next_event().await,
            None => std::future::pending().await,
        }
    }

    /// Cancel safe: the boxed future survives being polled by reference.
    async fn next_opened(opening: &mut Option<Opening<D>>) -> Opened<D> {
        match opening {
            Some(opening) => (&mut opening.future).await,
            None => std::future::pending().await,
        }
    }

    /// Start opening the transport without holding up the loop. The outcome
    /// arrives through [`Self::handle_opened`].
    async fn begin_open(&mut self) {
        // A stale attempt from before a disconnect still owns the driver
        self.abandon_open().await;
        let Some(mut driver) = self.driver.take() else {
            warn!("no driver to open");
            return;
        };

        let (cancel, cancelled) = oneshot::channel::<()>();
        let future = async move {
            let outcome = tokio::select! {
                result = driver.open() => Some(result),
                _ = cancelled => None,
            };
            (driver, outcome)
        }
        .boxed();
        self.opening = Some(Opening { future, cancel });
    }

    async fn handle_opened(&mut self, (driver, outcome): Opened<D>) {
        self.opening = None;
        self.driver = Some(driver);
        let event = match outcome {
            Some(Ok(())) => ClientEvent::TransportOpened,
            Some(Err(err)) => ClientEvent::TransportFailed { reason: err.to_string() },
            None => return,
        };
        let actions = self.feed(event);
        self.execute(actions).await;
    }

    /// Stop an in-flight open and take the driver back. Resolves promptly
    /// since the attempt races the cancel signal.
    async fn abandon_open(&mut self) {
        let Some(Opening { future, cancel }) = self.opening.take() else {
            return;
        };
        let _ = cancel.send(());
        let (mut driver, outcome) = future.await;
        if matches!(outcome, Some(Ok(()))) {
            debug!("closing transport opened after abandon");
            driver.close().await;
        }
        self.driver = Some(driver);
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => {
                let actions = self.feed(ClientEvent::Connect);
                self.execute(actions).await;
            },
            Command::Disconnect => {
                let actions = self.feed(ClientEvent::Disconnect);
                self.execute(actions).await;
            },
            Command::RefreshRooms => {
                let api = Arc::clone(&self.api);
                self.pending.push(async move { Completion::Rooms(api.list_rooms().await) }.boxed());
            },
            Command::RefreshOnlineUsers => {
                let api = Arc::clone(&self.api);
                self.pending
                    .push(async move { Completion::OnlineUsers(api.online_users().await) }.boxed());
            },
            Command::SelectRoom { room_id, reply } => {
                self.request(ClientEvent::SelectRoom(room_id), reply).await;
            },
            Command::SendMessage { content, reply } => {
                self.request(ClientEvent::SendMessage { content }, reply).await;
            },
            Command::SendTyping { reply } => self.request(ClientEvent::SendTyping, reply).await,
            Command::CreateRoom { request, reply } => self.create_room(request, reply),
            Command::SearchUsers { query, reply } => {
                // Read-only, so the answer goes straight back to the caller
                let api = Arc::clone(&self.api);
                self.pending.push(
                    async move {
                        let result = api.search_users(&query).await;
                        let _ = reply.send(result);
                        Completion::Answered
                    }
                    .boxed(),
                );
            },
            // Handled by the loop
            Command::Shutdown => {},
        }
    }

    /// Feed an event whose outcome the caller waits for. The reply is sent
    /// after the resulting actions ran, so frames are on the wire by then.
    async fn request(
        &mut self,
        event: ClientEvent<E::Instant>,
        reply: Reply<(), ClientError>,
    ) {
        match self.client.handle(event) {
            Ok(actions) => {
                self.execute(actions).await;
                let _ = reply.send(Ok(()));
            },
            Err(err) => {
                debug!(%err, "request rejected");
                let _ = reply.send(Err(err));
            },
        }
    }

    fn create_room(&mut self, request: CreateRoomRequest, reply: Reply<ChatRoom, ApiError>) {
        let api = Arc::clone(&self.api);
        self.pending.push(
            async move {
                let result = api.create_room(&request).await;
                Completion::Created { result, reply }
            }
            .boxed(),
        );
    }

    async fn handle_transport(&mut self, event: TransportEvent) {
        let event = match event {
            TransportEvent::Packet(packet) => ClientEvent::PacketReceived(packet),
            TransportEvent::Garbled(err) => ClientEvent::Garbled(err),
            TransportEvent::Closed { reason: Some(reason) } => {
                ClientEvent::TransportFailed { reason }
            },
            TransportEvent::Closed { reason: None } => ClientEvent::TransportClosed,
        };
        let actions = self.feed(event);
        self.execute(actions).await;
    }

    async fn handle_completion(&mut self, completion: Completion) {
        let event = match completion {
            Completion::History { room_id, result: Ok(messages) } => {
                ClientEvent::HistoryLoaded { room_id, messages }
            },
            Completion::History { room_id, result: Err(err) } => {
                warn!(room_id, %err, "failed to load history");
                return;
            },
            Completion::Rooms(Ok(rooms)) => ClientEvent::SetRooms(rooms),
            Completion::Rooms(Err(err)) => {
                warn!(%err, "failed to load rooms");
                return;
            },
            Completion::OnlineUsers(Ok(users)) => ClientEvent::OnlineUsersLoaded(users),
            Completion::OnlineUsers(Err(err)) => {
                warn!(%err, "failed to load online users");
                return;
            },
            Completion::Created { result, reply } => {
                let room = result.as_ref().ok().cloned();
                let _ = reply.send(result);
                match room {
                    Some(room) => ClientEvent::AddRoom(room),
                    None => return,
                }
            },
            Completion::Answered => return,
        };

        let actions = self.feed(event);
        self.execute(actions).await;
    }

    /// Execute client actions. Actions may produce further client events
    /// (transport outcomes), whose actions are executed in turn. Opening the
    /// transport is the exception: it runs in the background.
    async fn execute(&mut self, actions: Vec<ClientAction>) {
        let mut pending_actions: VecDeque<ClientAction> = actions.into();

        while let Some(action) = pending_actions.pop_front() {
            match action {
                ClientAction::OpenTransport => self.begin_open().await,
                ClientAction::CloseTransport => {
                    self.abandon_open().await;
                    if let Some(driver) = self.driver.as_mut() {
                        driver.close().await;
                    }
                    pending_actions.extend(self.feed(ClientEvent::TransportClosed));
                },
                ClientAction::Send(packet) => {
                    let Some(driver) = self.driver.as_mut() else {
                        warn!("transport not open, dropping packet");
                        continue;
                    };
                    if let Err(err) = driver.send(packet).await {
                        warn!(%err, "transport write failed");
                        driver.close().await;
                        let event = ClientEvent::TransportFailed { reason: err.to_string() };
                        pending_actions.extend(self.feed(event));
                    }
                },
                ClientAction::FetchHistory { room_id } => {
                    let api = Arc::clone(&self.api);
                    self.pending.push(
                        async move {
                            let result = api.list_messages(room_id).await;
                            Completion::History { room_id, result }
                        }
                        .boxed(),
                    );
                },
                ClientAction::Emit(event) => {
                    // No listeners is fine
                    let _ = self.events.send(event);
                },
            }
        }

        self.publish_snapshot();
    }

    fn feed(&mut self, event: ClientEvent<E::Instant>) -> Vec<ClientAction> {
        match self.client.handle(event) {
            Ok(actions) => actions,
            Err(err) => {
                warn!(%err, "client rejected event");
                Vec::new()
            },
        }
    }

    fn publish_snapshot(&self) {
        let next = self.client.snapshot();
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    /// Get a reference to the Client
    pub fn client(&self) -> &Client<E> {
        &self.client
    }
}
