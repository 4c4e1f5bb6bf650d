//! Collaboration session: lifecycle, handshake, broadcast scheduling and
//! inbound dispatch for one editor.
//!
//! DESIGN
//! ======
//! An explicit state machine constructed with its collaborators (relay
//! connector, editor, host shell, config) and driven from outside:
//!
//! ```text
//! Idle -(start_session)-> Connecting -(socket open)-> AwaitingInit
//!      -(SCENE_INIT | handshake timeout | roster without peers)-> Active
//!      -(end_session | unload)-> Idle
//! ```
//!
//! The session is single-owner (`&mut self`). The host calls
//! `step().await`, which waits for whichever comes first: the next relay
//! event or the earliest owned deadline (handshake, full resync, cursor
//! throttle, idle). `dispatch` applies one relay event directly.
//!
//! RACES
//! =====
//! The handshake timer and the first `SCENE_INIT` race. Whichever lands
//! first initializes the portal; the loser sees `is_initialized()` and does
//! nothing. Teardown drops the inbound receiver and `dispatch` ignores
//! events while `Idle`, so nothing decrypted after `end_session` can touch
//! the editor.
//!
//! BROADCAST
//! =========
//! - delta: `broadcast_elements` sends a reliable `SCENE_UPDATE` whenever
//!   the scene version beats the last one sent or received.
//! - full resync: every delta also pokes a leading + trailing throttle
//!   that rebroadcasts the whole scene (tombstones included) on the
//!   volatile channel at most once per window.
//! - presence: pointer moves go out volatile through a short throttle,
//!   only while a single pointer is down.
//!
//! ERROR HANDLING
//! ==============
//! Nothing inbound is fatal. Undecryptable messages are dropped and
//! surfaced to the shell via `alert`; unknown types are dropped quietly.
//! Only `start_session` returns errors (relay unreachable).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::ErrorCode;
use crate::config::SessionConfig;
use crate::editor::{Editor, HostShell, SceneUpdate};
use crate::element::{Element, scene_version};
use crate::idle::{IdleTracker, UserIdleState};
use crate::message::{Pointer, PointerButton, SceneKind, WireMessage};
use crate::portal::{Portal, PortalError, PortalEvent};
use crate::presence::PresenceDirectory;
use crate::reconcile::reconcile_elements;
use crate::relay::{RelayConnector, RelayEvent, TransportError};
use crate::room::{self, RoomAddress};
use crate::throttle::ResyncThrottle;

/// Minimum spacing of pointer broadcasts.
pub const CURSOR_SYNC_INTERVAL: Duration = Duration::from_millis(33);

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CollabError {
    #[error("collaboration unavailable: {0}")]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Portal(#[from] PortalError),
}

impl ErrorCode for CollabError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(e) => e.error_code(),
            Self::Portal(e) => e.error_code(),
        }
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Connecting,
    AwaitingInit,
    Active,
}

/// Authoritative scene received from a peer at join time.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialScene {
    pub elements: Vec<Element>,
    pub scroll_to_content: bool,
}

/// Resolves once the handshake ends: `Some` with the peer's scene, or
/// `None` for an empty room, a timeout, or a session ended first.
pub struct InitialSceneHandle {
    rx: oneshot::Receiver<Option<InitialScene>>,
}

impl InitialSceneHandle {
    /// Non-blocking check. Outer `None` means the handshake is still running.
    pub fn try_wait(&mut self) -> Option<Option<InitialScene>> {
        match self.rx.try_recv() {
            Ok(scene) => Some(scene),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(None),
        }
    }
}

impl Future for InitialSceneHandle {
    type Output = Option<InitialScene>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|result| result.ok().flatten())
    }
}

enum Wake {
    Event(Option<RelayEvent>),
    Timer,
}

// =============================================================================
// SESSION
// =============================================================================

pub struct CollabSession<E: Editor, H: HostShell> {
    connector: Arc<dyn RelayConnector>,
    config: SessionConfig,
    editor: E,
    shell: H,
    portal: Portal,
    events: Option<mpsc::Receiver<RelayEvent>>,
    phase: SessionPhase,
    address: Option<RoomAddress>,
    presence: PresenceDirectory,
    /// Scene version last broadcast or received; `None` before the first.
    last_version: Option<u64>,
    handshake_deadline: Option<Instant>,
    resync: ResyncThrottle,
    cursor: ResyncThrottle,
    pending_pointer: Option<(Pointer, PointerButton)>,
    idle: IdleTracker,
    pending_init: Option<oneshot::Sender<Option<InitialScene>>>,
}

impl<E: Editor, H: HostShell> CollabSession<E, H> {
    #[must_use]
    pub fn new(connector: Arc<dyn RelayConnector>, config: SessionConfig, editor: E, shell: H) -> Self {
        let resync = ResyncThrottle::new(config.full_sync_interval);
        let idle = IdleTracker::new(config.idle_threshold);
        Self {
            connector,
            config,
            editor,
            shell,
            portal: Portal::new(),
            events: None,
            phase: SessionPhase::Idle,
            address: None,
            presence: PresenceDirectory::new(),
            last_version: None,
            handshake_deadline: None,
            resync,
            cursor: ResyncThrottle::new(CURSOR_SYNC_INTERVAL),
            pending_pointer: None,
            idle,
            pending_init: None,
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn is_collaborating(&self) -> bool {
        self.phase != SessionPhase::Idle
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut E {
        &mut self.editor
    }

    #[must_use]
    pub fn shell(&self) -> &H {
        &self.shell
    }

    #[must_use]
    pub fn presence(&self) -> &PresenceDirectory {
        &self.presence
    }

    #[must_use]
    pub fn room_address(&self) -> Option<&RoomAddress> {
        self.address.as_ref()
    }

    /// Relay-assigned id of this session's connection.
    #[must_use]
    pub fn socket_id(&self) -> Option<&str> {
        self.portal.socket_id()
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Start collaborating. `existing` joins a shared room; `None` hosts a
    /// fresh one. Returns `Ok(None)` if a session is already running.
    /// A host's address shows the share link before the relay is reached.
    ///
    /// # Errors
    ///
    /// Returns [`CollabError::Transport`] when the relay is unreachable; the
    /// shell is alerted, its address restored, and the session stays `Idle`.
    pub async fn start_session(
        &mut self,
        existing: Option<RoomAddress>,
    ) -> Result<Option<InitialSceneHandle>, CollabError> {
        if self.phase != SessionPhase::Idle {
            debug!("collab: start ignored, already collaborating");
            return Ok(None);
        }
        let joining = existing.is_some();
        let address = existing.unwrap_or_else(room::generate_room_address);

        self.phase = SessionPhase::Connecting;
        let page = self.shell.location();
        let share_url = room::collaboration_link(&page, &address);
        if !joining {
            self.shell.push_location(&share_url);
        }
        let link = match self.connector.connect().await {
            Ok(link) => link,
            Err(e) => {
                error!(error = %e, "collab: relay unavailable");
                self.abort_start(joining, &page, e.error_code(), &e.to_string());
                return Err(e.into());
            }
        };
        if let Err(e) = self.portal.open(link.connection, &address) {
            error!(error = %e, "collab: portal open failed");
            self.abort_start(joining, &page, e.error_code(), &e.to_string());
            return Err(e.into());
        }
        self.events = Some(link.events);
        self.phase = SessionPhase::AwaitingInit;

        if joining {
            self.editor.update_scene(SceneUpdate::elements(Vec::new()));
        } else {
            // Deleted elements from before the room existed must not travel.
            let live = self.editor.scene_elements();
            self.editor.clear_history();
            self.editor.update_scene(SceneUpdate::elements(live).committed());
        }
        self.shell.set_share_url(&share_url);
        self.shell.share_state_changed(true);

        self.handshake_deadline = Some(Instant::now() + self.config.handshake_timeout);
        let (tx, rx) = oneshot::channel();
        self.pending_init = Some(tx);
        info!(
            room_id = %address.room_id,
            role = if joining { "joiner" } else { "host" },
            theme = ?self.shell.theme(),
            "collab: session started"
        );
        self.address = Some(address);
        Ok(Some(InitialSceneHandle { rx }))
    }

    fn abort_start(&mut self, joining: bool, page: &str, code: &'static str, message: &str) {
        if !joining {
            self.shell.push_location(page);
        }
        self.shell.alert(code, message);
        self.phase = SessionPhase::Idle;
    }

    /// Join from a shared link. A link without a room fragment, or with a
    /// corrupt key, leaves the session uncollaborated (`Ok(None)`); the
    /// corrupt case alerts the shell.
    ///
    /// # Errors
    ///
    /// Same as [`CollabSession::start_session`].
    pub async fn join_from_link(&mut self, link: &str) -> Result<Option<InitialSceneHandle>, CollabError> {
        match room::parse_collaboration_link(link) {
            Ok(Some(address)) => self.start_session(Some(address)).await,
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(error = %e, "collab: rejected collaboration link");
                self.shell.alert(e.error_code(), &e.to_string());
                Ok(None)
            }
        }
    }

    /// Stop collaborating: clear presence, share chrome and address.
    pub fn end_session(&mut self) {
        if self.phase == SessionPhase::Idle {
            return;
        }
        let room_id = self.address.as_ref().map(|a| a.room_id.clone());
        self.teardown();

        self.presence.clear();
        self.editor.update_scene(SceneUpdate::collaborators(self.presence.snapshot()));
        self.shell.clear_share_url();
        let origin = room::page_origin(&self.shell.location()).to_owned();
        self.shell.push_location(&origin);
        self.shell.share_state_changed(false);
        info!(room_id = ?room_id, "collab: session ended");
    }

    /// Page is going away: release the socket, skip every UI update.
    pub fn end_session_on_unload(&mut self) {
        if self.phase == SessionPhase::Idle {
            return;
        }
        self.teardown();
        info!("collab: session dropped on unload");
    }

    fn teardown(&mut self) {
        self.handshake_deadline = None;
        self.resync.cancel();
        self.cursor.cancel();
        self.pending_pointer = None;
        self.idle.stop();
        self.last_version = None;
        self.portal.close();
        self.events = None;
        self.pending_init = None;
        self.address = None;
        self.phase = SessionPhase::Idle;
    }

    /// Handshake over: with the peer's scene, or empty on timeout / no peers.
    fn initialize(&mut self, scene: Option<InitialScene>) {
        if self.portal.is_initialized() {
            return;
        }
        self.portal.mark_initialized();
        self.handshake_deadline = None;
        self.phase = SessionPhase::Active;
        self.idle.start(Instant::now());
        info!(with_scene = scene.is_some(), "collab: handshake complete");
        if let Some(tx) = self.pending_init.take() {
            if tx.send(scene).is_err() {
                debug!("collab: initial scene handle already dropped");
            }
        }
    }

    // =========================================================================
    // DRIVING
    // =========================================================================

    /// Wait for the next relay event or due deadline and apply it.
    /// Returns `false` when there is nothing left to wait for.
    pub async fn step(&mut self) -> bool {
        let deadline = self.next_deadline();
        let wake = {
            let Some(events) = self.events.as_mut() else {
                return false;
            };
            tokio::select! {
                event = events.recv() => Wake::Event(event),
                () = sleep_until(deadline) => Wake::Timer,
            }
        };
        match wake {
            Wake::Event(Some(event)) => self.dispatch(event),
            Wake::Event(None) => self.dispatch(RelayEvent::Disconnected),
            Wake::Timer => self.fire_timers(Instant::now()),
        }
        true
    }

    /// Apply every relay event that is already queued, without waiting.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let Some(events) = self.events.as_mut() else {
                return applied;
            };
            let Ok(event) = events.try_recv() else {
                return applied;
            };
            self.dispatch(event);
            applied += 1;
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        [self.handshake_deadline, self.resync.deadline(), self.cursor.deadline(), self.idle.deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    fn fire_timers(&mut self, now: Instant) {
        if self.handshake_deadline.is_some_and(|d| d <= now) {
            self.handshake_deadline = None;
            info!("collab: no scene from peers before timeout, starting empty");
            self.initialize(None);
        }
        if self.resync.poll(now) {
            self.full_resync();
        }
        if self.cursor.poll(now) {
            if let Some((pointer, button)) = self.pending_pointer.take() {
                self.send_pointer(pointer, button);
            }
        }
        if let Some(state) = self.idle.poll(now) {
            self.send_idle(state);
        }
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Apply one relay event. Ignored while the session is `Idle`.
    pub fn dispatch(&mut self, event: RelayEvent) {
        if self.phase == SessionPhase::Idle {
            debug!(event = event.name(), "collab: event for ended session ignored");
            return;
        }
        match self.portal.receive(event) {
            Ok(Some(event)) => self.handle_portal_event(event),
            Ok(None) => {}
            Err(e) => self.report_inbound_error(&e),
        }
    }

    fn handle_portal_event(&mut self, event: PortalEvent) {
        match event {
            PortalEvent::Joined => {}
            PortalEvent::FirstInRoom => self.initialize(None),
            PortalEvent::NewUser { socket_id } => {
                debug!(%socket_id, "collab: new peer, sending scene");
                let elements = self.editor.scene_elements_including_deleted();
                if let Err(e) = self.portal.broadcast_scene(SceneKind::Init, &elements, false) {
                    report_send_error(&e);
                }
            }
            PortalEvent::RosterChanged { socket_ids } => {
                let alone = socket_ids.iter().all(|id| Some(id.as_str()) == self.portal.socket_id());
                self.set_roster(&socket_ids);
                if alone {
                    self.initialize(None);
                }
            }
            PortalEvent::Message(message) => self.handle_message(message),
            PortalEvent::Disconnected => {
                let e = TransportError::Closed;
                warn!("collab: relay connection lost, ending session");
                self.shell.alert(e.error_code(), &e.to_string());
                self.end_session();
            }
        }
    }

    fn handle_message(&mut self, message: WireMessage) {
        match message {
            WireMessage::SceneInit(payload) => {
                if self.portal.is_initialized() {
                    debug!("collab: late SCENE_INIT ignored");
                    return;
                }
                let elements = self.apply_remote_scene(&payload.elements, true);
                self.initialize(Some(InitialScene { elements, scroll_to_content: true }));
            }
            WireMessage::SceneUpdate(payload) => {
                self.apply_remote_scene(&payload.elements, false);
            }
            WireMessage::MouseLocation(payload) => {
                if self.presence.apply_pointer(&payload) {
                    self.editor.update_scene(SceneUpdate::collaborators(self.presence.snapshot()));
                }
            }
            WireMessage::IdleStatus(payload) => {
                if self.presence.apply_idle(&payload) {
                    self.editor.update_scene(SceneUpdate::collaborators(self.presence.snapshot()));
                }
            }
        }
    }

    /// Merge a peer's elements into the editor. Returns the merged scene.
    fn apply_remote_scene(&mut self, remote: &[Element], init: bool) -> Vec<Element> {
        let local = self.editor.scene_elements_including_deleted();
        let in_progress = self.editor.app_state().in_progress_ids();
        let merged = reconcile_elements(&local, remote, &in_progress);
        // Record before applying so the merge is not echoed back.
        self.last_version = Some(scene_version(&merged));
        let mut update = SceneUpdate::elements(merged.clone());
        update.commit_to_history = init;
        self.editor.update_scene(update);
        // No multi-writer undo: peer edits invalidate the local stack.
        self.editor.clear_history();
        debug!(remote = remote.len(), merged = merged.len(), init, "collab: applied remote scene");
        merged
    }

    /// Replace the presence roster with the relay's connection list.
    pub fn set_roster(&mut self, connection_ids: &[String]) {
        self.presence.replace_roster(connection_ids);
        self.editor.update_scene(SceneUpdate::collaborators(self.presence.snapshot()));
    }

    fn report_inbound_error(&mut self, e: &PortalError) {
        match e {
            PortalError::Crypto(_) => {
                warn!(error = %e, "collab: dropped undecryptable message");
                self.shell.alert(e.error_code(), &e.to_string());
            }
            PortalError::Message(_) => warn!(error = %e, "collab: dropped invalid message"),
            PortalError::Transport(_) => {
                error!(error = %e, "collab: relay send failed");
                self.shell.alert(e.error_code(), &e.to_string());
            }
        }
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    /// Local scene changed. Sends a delta if the scene is newer than anything
    /// sent or received, and schedules a full resync.
    pub fn broadcast_elements(&mut self, elements: &[Element]) {
        if self.phase == SessionPhase::Idle {
            return;
        }
        let version = scene_version(elements);
        if self.last_version.is_some_and(|last| version <= last) {
            return;
        }
        if let Err(e) = self.portal.broadcast_scene(SceneKind::Update, elements, false) {
            report_send_error(&e);
        }
        self.last_version = Some(version);
        if self.resync.trigger(Instant::now()) {
            self.full_resync();
        }
    }

    fn full_resync(&mut self) {
        let elements = self.editor.scene_elements_including_deleted();
        match self.portal.broadcast_scene(SceneKind::Update, &elements, true) {
            Ok(Some(count)) => debug!(count, "collab: full resync sent"),
            Ok(None) => {}
            Err(e) => report_send_error(&e),
        }
        let version = scene_version(&elements);
        self.last_version = Some(self.last_version.map_or(version, |last| last.max(version)));
    }

    /// Local pointer moved. `gesture_count` is the number of active pointers;
    /// multi-touch gestures are not broadcast.
    pub fn on_pointer_update(&mut self, pointer: Pointer, button: PointerButton, gesture_count: usize) {
        if self.phase == SessionPhase::Idle {
            return;
        }
        let now = Instant::now();
        if let Some(state) = self.idle.on_activity(now) {
            self.send_idle(state);
        }
        if gesture_count >= 2 {
            return;
        }
        if self.cursor.trigger(now) {
            self.send_pointer(pointer, button);
        } else {
            self.pending_pointer = Some((pointer, button));
        }
    }

    /// Host page became hidden or visible again.
    pub fn on_visibility_change(&mut self, hidden: bool) {
        if self.phase == SessionPhase::Idle {
            return;
        }
        if let Some(state) = self.idle.on_visibility(hidden, Instant::now()) {
            self.send_idle(state);
        }
    }

    fn send_pointer(&mut self, pointer: Pointer, button: PointerButton) {
        let selected = self.editor.app_state().selected_element_ids;
        let username = self.shell.display_name();
        if let Err(e) = self.portal.broadcast_mouse_location(pointer, button, selected, &username) {
            report_send_error(&e);
        }
    }

    fn send_idle(&mut self, state: UserIdleState) {
        let username = self.shell.display_name();
        match self.portal.broadcast_idle_change(state, &username) {
            Ok(true) => debug!(?state, "collab: idle state sent"),
            Ok(false) => {}
            Err(e) => report_send_error(&e),
        }
    }
}

fn report_send_error(e: &PortalError) {
    if e.retryable() {
        warn!(error = %e, code = e.error_code(), "collab: broadcast skipped");
    } else {
        error!(error = %e, code = e.error_code(), "collab: broadcast failed");
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
