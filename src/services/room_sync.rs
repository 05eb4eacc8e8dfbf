//! Pull-based synchronization of a room's countdown and chat.
//!
//! Each entered room owns two background tasks: a poller fetching the room
//! snapshot and the message history on a fixed interval, and a ticker
//! decrementing the local countdown while it runs. Both are released when the
//! [`RoomSyncClient`] is left or dropped.

use std::{sync::Arc, time::Duration};

use time::OffsetDateTime;
use tokio::{
    sync::{Mutex, mpsc, watch},
    task::JoinHandle,
    time::{self as tokio_time, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};
use validator::Validate;

use crate::{
    config::AppConfig,
    dao::{
        cache_store::CacheStore,
        models::{Message, NewMessage, Participant, Room, TimerRecord},
        remote::{Backend, RemoteError},
    },
    dto::{
        chat::OutgoingMessage,
        room::{CreateRoomInput, JoinRoomInput, RoomCodeQuery},
    },
    error::SyncError,
    state::{
        chat::{DEFAULT_SCROLL_THRESHOLD, ScrollDecision, Viewport},
        clock::Clock,
        room::{FailureOutcome, RoomSnapshot, RoomView},
        sequence::RequestSequencer,
        timer::{InvalidTransition, TimerNotice, TimerPhase, TimerStateMachine},
    },
};

pub use crate::state::room::SyncStream;

/// Cadence and scroll settings of a room client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoomSyncConfig {
    /// Interval between two poll cycles.
    pub poll_interval: Duration,
    /// Interval of the local countdown tick.
    pub tick_interval: Duration,
    /// Distance from the bottom under which the chat follows new messages.
    pub scroll_threshold: f64,
}

impl Default for RoomSyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            tick_interval: Duration::from_secs(1),
            scroll_threshold: DEFAULT_SCROLL_THRESHOLD,
        }
    }
}

impl From<&AppConfig> for RoomSyncConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            tick_interval: config.tick_interval(),
            scroll_threshold: config.scroll_threshold(),
        }
    }
}

/// Room to enter and the participant identity used inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomContext {
    /// Backend id of the room.
    pub room_id: String,
    /// Identity this client posts messages as.
    pub participant: Participant,
}

impl RoomContext {
    /// Room context remembered for `identity`, when the cache holds a complete one.
    ///
    /// Records written before the room name was stored fall back to the profile name.
    pub fn from_cache(cache: &CacheStore, identity: &str) -> Option<Self> {
        let room = cache.room(identity);
        let name = room
            .user_name
            .or_else(|| cache.profile(identity).user_name)?;
        Some(Self {
            room_id: room.room_id?,
            participant: Participant {
                id: room.user_id?,
                name,
                study_field: room.study_field,
            },
        })
    }
}

/// Changes observed by a room client, in the order they were applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// A fresher room snapshot was applied.
    RoomRefreshed {
        /// Number of participants in the snapshot.
        participants: usize,
    },
    /// The displayed countdown changed phase or value.
    TimerChanged {
        /// New phase.
        phase: TimerPhase,
        /// New remaining time in seconds.
        remaining_seconds: u32,
    },
    /// A fresher message history was applied.
    MessagesApplied {
        /// Messages now shown.
        total: usize,
        /// Messages not shown before this update.
        new_messages: usize,
        /// Whether the chat should scroll to the bottom.
        scroll: ScrollDecision,
    },
    /// The countdown reached zero on this client.
    TimeUp,
    /// A poll failed; the previous data is still shown.
    SyncFailed {
        /// Stream whose request failed.
        stream: SyncStream,
        /// The request got no response and will be retried by the next cycle.
        retryable: bool,
    },
    /// The stale-data indicator flipped.
    StaleChanged(bool),
}

struct RoomShared {
    backend: Arc<dyn Backend>,
    clock: Arc<dyn Clock>,
    context: RoomContext,
    sequencer: RequestSequencer,
    view: Mutex<RoomView>,
    running: watch::Sender<bool>,
    snapshot: watch::Sender<RoomSnapshot>,
    events: mpsc::UnboundedSender<RoomEvent>,
    closed: watch::Sender<bool>,
}

fn timer_event(timer: &TimerStateMachine) -> RoomEvent {
    RoomEvent::TimerChanged {
        phase: timer.phase(),
        remaining_seconds: timer.remaining_seconds(),
    }
}

impl RoomShared {
    fn room_id(&self) -> &str {
        &self.context.room_id
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn emit(&self, event: RoomEvent) {
        // Nobody listening is fine; the snapshot channel still carries the state.
        let _ = self.events.send(event);
    }

    fn publish(&self, view: &RoomView) {
        self.running.send_if_modified(|running| {
            let now_running = view.timer().is_running();
            if *running == now_running {
                return false;
            }
            *running = now_running;
            true
        });
        self.snapshot.send_replace(view.snapshot());
    }

    fn record_failure(
        &self,
        view: &mut RoomView,
        stream: SyncStream,
        seq: u64,
        err: RemoteError,
    ) {
        let network = err.is_network();
        let became_stale = match view.mark_failed(stream, seq, network) {
            FailureOutcome::Outdated => {
                debug!(
                    room_id = %self.room_id(),
                    ?stream,
                    seq,
                    error = %err,
                    "ignoring failure of outdated poll"
                );
                return;
            }
            FailureOutcome::Recorded { became_stale } => became_stale,
        };

        if network {
            warn!(room_id = %self.room_id(), ?stream, error = %err, "room poll failed; keeping last data");
        } else {
            error!(room_id = %self.room_id(), ?stream, error = %err, "backend rejected room poll");
        }
        if became_stale {
            self.emit(RoomEvent::StaleChanged(true));
        }
        self.emit(RoomEvent::SyncFailed {
            stream,
            retryable: network,
        });
    }

    fn record_success(&self, was_stale: bool, view: &RoomView) {
        if was_stale && !view.is_stale() {
            info!(room_id = %self.room_id(), "room sync recovered");
            self.emit(RoomEvent::StaleChanged(false));
        }
    }

    async fn poll_room(&self) {
        let seq = self.sequencer.issue();
        let result = self.backend.fetch_room(self.room_id()).await;
        if self.is_closed() {
            debug!(room_id = %self.room_id(), seq, "room view closed; dropping room response");
            return;
        }

        let mut view = self.view.lock().await;
        match result {
            Ok(room) => self.apply_room(&mut view, seq, room),
            Err(err) => self.record_failure(&mut view, SyncStream::Room, seq, err),
        }
        self.publish(&view);
    }

    fn apply_room(&self, view: &mut RoomView, seq: u64, room: Room) {
        let was_stale = view.is_stale();
        let before = timer_event(view.timer());
        let participants = room.participants.len();

        match view.apply_room(seq, room, self.clock.now()) {
            Ok(notice) => {
                self.emit(RoomEvent::RoomRefreshed { participants });
                let after = timer_event(view.timer());
                if after != before {
                    self.emit(after);
                }
                if notice == Some(TimerNotice::TimeUp) {
                    info!(room_id = %self.room_id(), "shared countdown finished");
                    self.emit(RoomEvent::TimeUp);
                }
                self.record_success(was_stale, view);
            }
            Err(stale) => {
                debug!(
                    room_id = %self.room_id(),
                    seq = stale.seq,
                    latest = stale.latest,
                    "discarding stale room snapshot"
                );
            }
        }
    }

    async fn poll_messages(&self, after_send: bool) {
        let seq = self.sequencer.issue();
        let result = self.backend.fetch_messages(self.room_id()).await;
        if self.is_closed() {
            debug!(room_id = %self.room_id(), seq, "room view closed; dropping message response");
            return;
        }

        let mut view = self.view.lock().await;
        match result {
            Ok(messages) => self.apply_messages(&mut view, seq, messages, after_send),
            Err(err) => self.record_failure(&mut view, SyncStream::Messages, seq, err),
        }
        self.publish(&view);
    }

    fn apply_messages(
        &self,
        view: &mut RoomView,
        seq: u64,
        messages: Vec<Message>,
        after_send: bool,
    ) {
        let was_stale = view.is_stale();
        let applied = if after_send {
            view.apply_messages_after_send(seq, messages)
        } else {
            view.apply_messages(seq, messages)
        };

        match applied {
            Ok(update) => {
                if update.new_messages > 0 || after_send {
                    self.emit(RoomEvent::MessagesApplied {
                        total: view.chat().messages().len(),
                        new_messages: update.new_messages,
                        scroll: update.scroll,
                    });
                }
                self.record_success(was_stale, view);
            }
            Err(stale) => {
                debug!(
                    room_id = %self.room_id(),
                    seq = stale.seq,
                    latest = stale.latest,
                    "discarding stale message list"
                );
            }
        }
    }

    async fn tick(&self) {
        let mut view = self.view.lock().await;
        if !view.timer().is_running() {
            return;
        }

        let notice = view.timer_mut().tick();
        self.emit(timer_event(view.timer()));
        if notice == Some(TimerNotice::TimeUp) {
            info!(room_id = %self.room_id(), "countdown reached zero");
            self.emit(RoomEvent::TimeUp);
        }
        self.publish(&view);
    }
}

/// Live connection of one client to one room.
///
/// Dropping the client stops polling and ticking; responses still in flight are ignored.
pub struct RoomSyncClient {
    shared: Arc<RoomShared>,
    tasks: Vec<JoinHandle<()>>,
}

impl RoomSyncClient {
    /// Enter a room: fetch immediately, then keep polling until left.
    ///
    /// Must be called from within a tokio runtime.
    pub fn enter(
        backend: Arc<dyn Backend>,
        clock: Arc<dyn Clock>,
        context: RoomContext,
        config: RoomSyncConfig,
    ) -> (Self, mpsc::UnboundedReceiver<RoomEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let view = RoomView::new(context.room_id.clone(), config.scroll_threshold);
        let (snapshot, _) = watch::channel(view.snapshot());
        let (running, running_rx) = watch::channel(false);
        let (closed, _) = watch::channel(false);

        info!(
            room_id = %context.room_id,
            participant_id = %context.participant.id,
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            "entering room"
        );

        let shared = Arc::new(RoomShared {
            backend,
            clock,
            context,
            sequencer: RequestSequencer::new(),
            view: Mutex::new(view),
            running,
            snapshot,
            events,
            closed,
        });

        let tasks = vec![
            tokio::spawn(run_poller(
                shared.clone(),
                shared.closed.subscribe(),
                config.poll_interval,
            )),
            tokio::spawn(run_ticker(
                shared.clone(),
                shared.closed.subscribe(),
                running_rx,
                config.tick_interval,
            )),
        ];

        (Self { shared, tasks }, events_rx)
    }

    /// Room and participant this client entered with.
    pub fn context(&self) -> &RoomContext {
        &self.shared.context
    }

    /// Latest published view of the room.
    pub fn snapshot(&self) -> RoomSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    /// Subscribe to view updates.
    pub fn snapshots(&self) -> watch::Receiver<RoomSnapshot> {
        self.shared.snapshot.subscribe()
    }

    /// Report the chat scroll geometry; used to decide auto-scroll on the next update.
    pub async fn set_viewport(&self, viewport: Viewport) {
        self.shared.view.lock().await.set_viewport(viewport);
    }

    /// Run one poll cycle now and wait for both responses.
    pub async fn refresh(&self) {
        tokio::join!(
            self.shared.poll_room(),
            self.shared.poll_messages(false)
        );
    }

    /// Start or resume the shared countdown.
    pub async fn start_timer(&self) -> Result<(), SyncError> {
        self.write_timer(|timer, now| timer.start(now)).await
    }

    /// Pause the shared countdown, freezing its remaining time.
    pub async fn pause_timer(&self) -> Result<(), SyncError> {
        self.write_timer(|timer, now| timer.pause(now)).await
    }

    /// Stop the shared countdown and restore its full length.
    pub async fn reset_timer(&self) -> Result<(), SyncError> {
        self.write_timer(|timer, _| Ok(timer.reset())).await
    }

    /// Change the countdown length; the timer returns to idle.
    pub async fn set_duration(&self, minutes: u32) -> Result<(), SyncError> {
        self.write_timer(|timer, _| timer.set_duration(minutes)).await
    }

    /// Apply a timer command locally, then replace the shared record.
    ///
    /// A failed write is reported but not rolled back: the next poll brings the
    /// local countdown back to whatever the shared record says.
    async fn write_timer<F>(&self, command: F) -> Result<(), SyncError>
    where
        F: FnOnce(&mut TimerStateMachine, OffsetDateTime) -> Result<TimerRecord, InvalidTransition>,
    {
        let shared = &self.shared;
        let record = {
            let mut view = shared.view.lock().await;
            let now = shared.clock.now();
            if view.timer_mut().catch_up(now) == Some(TimerNotice::TimeUp) {
                shared.emit(RoomEvent::TimeUp);
            }

            let outcome = command(view.timer_mut(), now);
            if outcome.is_ok() {
                view.claim_timer_write(shared.sequencer.issue());
                shared.emit(timer_event(view.timer()));
            }
            shared.publish(&view);
            outcome?
        };

        debug!(
            room_id = %shared.room_id(),
            is_running = record.is_running,
            remaining_seconds = record.remaining_seconds,
            "writing shared timer"
        );
        shared
            .backend
            .replace_timer(shared.room_id(), record)
            .await
            .map_err(|err| {
                warn!(room_id = %shared.room_id(), error = %err, "failed to write shared timer");
                SyncError::from(err)
            })
    }

    /// Post a chat message, then reload the history and scroll to the bottom.
    ///
    /// The message is only shown once the backend returns it in the reloaded list.
    pub async fn send_message(&self, content: &str) -> Result<Message, SyncError> {
        let outgoing = OutgoingMessage::new(content.trim());
        outgoing.validate()?;

        let participant = &self.shared.context.participant;
        let message = NewMessage {
            room_id: self.shared.room_id().to_owned(),
            sender_id: participant.id.clone(),
            sender_name: participant.name.clone(),
            sender_field: participant.study_field.clone(),
            content: outgoing.content,
        };

        let stored = self
            .shared
            .backend
            .submit_message(message)
            .await
            .map_err(|err| {
                warn!(room_id = %self.shared.room_id(), error = %err, "failed to send message");
                SyncError::from(err)
            })?;

        self.shared.poll_messages(true).await;
        Ok(stored)
    }

    /// Stop polling and ticking, waiting for both tasks to finish.
    pub async fn leave(mut self) {
        self.shared.closed.send_replace(true);
        for task in self.tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }
        info!(room_id = %self.shared.room_id(), "left room");
    }
}

impl Drop for RoomSyncClient {
    fn drop(&mut self) {
        self.shared.closed.send_replace(true);
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn run_poller(shared: Arc<RoomShared>, mut closed: watch::Receiver<bool>, period: Duration) {
    let mut interval = tokio_time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = closed.changed() => break,
            _ = interval.tick() => {
                // Cycles are not awaited so a slow response never delays the next poll.
                let room = shared.clone();
                tokio::spawn(async move { room.poll_room().await });
                let messages = shared.clone();
                tokio::spawn(async move { messages.poll_messages(false).await });
            }
        }
    }

    debug!(room_id = %shared.room_id(), "room poller stopped");
}

async fn run_ticker(
    shared: Arc<RoomShared>,
    mut closed: watch::Receiver<bool>,
    mut running: watch::Receiver<bool>,
    period: Duration,
) {
    loop {
        while !*running.borrow_and_update() {
            tokio::select! {
                _ = closed.changed() => return,
                changed = running.changed() => if changed.is_err() { return },
            }
        }

        let mut interval = tokio_time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = closed.changed() => return,
                changed = running.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if !*running.borrow_and_update() {
                        break;
                    }
                }
                _ = interval.tick() => shared.tick().await,
            }
        }
    }
}

/// Create a room owned by the local user and remember it for `identity`.
pub async fn create_room(
    backend: &dyn Backend,
    cache: &CacheStore,
    identity: &str,
    input: CreateRoomInput,
) -> Result<RoomContext, SyncError> {
    input.validate()?;

    let room = backend
        .create_room(input.room_name.trim(), input.participant())
        .await?;
    let owner = room
        .participants
        .iter()
        .find(|participant| participant.id == room.owner_id)
        .cloned()
        .ok_or_else(|| SyncError::InvalidState("created room does not list its owner".into()))?;

    remember_room(cache, identity, &room, owner)
}

/// Join a room by invitation code and remember it for `identity`.
pub async fn join_room(
    backend: &dyn Backend,
    cache: &CacheStore,
    identity: &str,
    input: JoinRoomInput,
) -> Result<RoomContext, SyncError> {
    input.validate()?;

    let participant = input.participant();
    let room = backend
        .join_room(&input.normalized_code(), participant.clone())
        .await?;
    // The backend appends the new participant last.
    let joined = room
        .participants
        .iter()
        .rev()
        .find(|candidate| candidate.name == participant.name)
        .cloned()
        .ok_or_else(|| SyncError::InvalidState("joined room does not list the new participant".into()))?;

    remember_room(cache, identity, &room, joined)
}

/// Look a room up by invitation code without joining it.
pub async fn find_room(backend: &dyn Backend, query: RoomCodeQuery) -> Result<Room, SyncError> {
    query.validate()?;

    let code = query.normalized_code();
    backend.fetch_room_by_code(&code).await.map_err(|err| {
        debug!(code = %code, error = %err, "room lookup failed");
        SyncError::from(err)
    })
}

fn remember_room(
    cache: &CacheStore,
    identity: &str,
    room: &Room,
    participant: Participant,
) -> Result<RoomContext, SyncError> {
    if !cache.save_room(identity, &room.id, &participant) {
        warn!(room_id = %room.id, "room context not cached durably");
    }
    info!(room_id = %room.id, code = %room.code, participant_id = %participant.id, "room ready");

    Ok(RoomContext {
        room_id: room.id.clone(),
        participant,
    })
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use tokio::time::sleep;

    use super::*;
    use crate::{
        dao::remote::fake::{Failure, FakeBackend},
        state::clock::ManualClock,
    };

    const T0: OffsetDateTime = datetime!(2025-03-01 10:00:00 UTC);
    const SETTLE: Duration = Duration::from_millis(10);

    fn room(timer: TimerRecord) -> Room {
        Room {
            id: "r1".into(),
            name: "Gece çalışması".into(),
            code: "AB12CD".into(),
            owner_id: "u1".into(),
            participants: vec![Participant {
                id: "u1".into(),
                name: "Ada".into(),
                study_field: None,
            }],
            timer,
        }
    }

    fn running_since(started_at: OffsetDateTime, duration_minutes: u32) -> TimerRecord {
        TimerRecord {
            is_running: true,
            duration_minutes,
            remaining_seconds: duration_minutes * 60,
            started_at: Some(started_at),
        }
    }

    fn context() -> RoomContext {
        RoomContext {
            room_id: "r1".into(),
            participant: Participant {
                id: "u1".into(),
                name: "Ada".into(),
                study_field: Some("Sayısal".into()),
            },
        }
    }

    fn enter(
        backend: &FakeBackend,
        clock: Arc<ManualClock>,
    ) -> (RoomSyncClient, mpsc::UnboundedReceiver<RoomEvent>) {
        RoomSyncClient::enter(
            Arc::new(backend.clone()),
            clock,
            context(),
            RoomSyncConfig::default(),
        )
    }

    fn message(id: &str, sender: &str) -> Message {
        Message {
            id: id.into(),
            room_id: "r1".into(),
            sender_id: "u2".into(),
            sender_name: sender.into(),
            sender_field: None,
            content: "selam".into(),
            timestamp: T0,
        }
    }

    fn drain(events: &mut mpsc::UnboundedReceiver<RoomEvent>) -> Vec<RoomEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = events.try_recv() {
            drained.push(event);
        }
        drained
    }

    #[tokio::test(start_paused = true)]
    async fn late_joiner_derives_remaining_time() {
        let backend = FakeBackend::new().with_room(room(running_since(T0, 25)));
        let clock = Arc::new(ManualClock::at(T0 + time::Duration::seconds(5)));

        let (client, _events) = enter(&backend, clock);
        sleep(SETTLE).await;

        let snapshot = client.snapshot();
        assert_eq!(snapshot.timer_display, "24:55");
        assert_eq!(snapshot.timer_phase, TimerPhase::Running);
        assert_eq!(snapshot.name.as_deref(), Some("Gece çalışması"));
        assert!(!snapshot.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_on_interval_until_left() {
        let backend = FakeBackend::new().with_room(room(TimerRecord::default()));
        let clock = Arc::new(ManualClock::at(T0));

        let (client, _events) = enter(&backend, clock);
        sleep(SETTLE).await;
        assert_eq!(backend.calls(), 2);

        sleep(Duration::from_secs(3)).await;
        assert_eq!(backend.calls(), 4);

        client.leave().await;
        sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_client_stops_polling() {
        let backend = FakeBackend::new().with_room(room(TimerRecord::default()));
        let (client, _events) = enter(&backend, Arc::new(ManualClock::at(T0)));
        sleep(SETTLE).await;

        drop(client);
        let calls = backend.calls();
        sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn response_arriving_after_drop_is_ignored() {
        let backend = FakeBackend::new().with_room(room(TimerRecord::default()));
        let (client, mut events) = enter(&backend, Arc::new(ManualClock::at(T0)));
        sleep(SETTLE).await;
        let snapshots = client.snapshots();
        drain(&mut events);

        backend.delay_responses(Duration::from_secs(2));
        backend.push_message(message("m1", "Can"));
        sleep(Duration::from_secs(3)).await;
        assert_eq!(backend.calls(), 4);
        assert!(client.snapshot().messages.is_empty());

        drop(client);
        sleep(Duration::from_secs(5)).await;

        assert!(drain(&mut events).is_empty());
        assert!(snapshots.borrow().messages.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_started_elsewhere_is_followed() {
        let backend = FakeBackend::new().with_room(room(TimerRecord::default()));
        let clock = Arc::new(ManualClock::at(T0));
        let (client, mut events) = enter(&backend, clock.clone());
        sleep(SETTLE).await;
        drain(&mut events);

        backend.set_timer("r1", running_since(T0, 25));
        clock.advance(time::Duration::seconds(10));
        sleep(Duration::from_secs(3)).await;

        let snapshot = client.snapshot();
        assert_eq!(snapshot.timer_phase, TimerPhase::Running);
        assert_eq!(snapshot.remaining_seconds, 1490);
        assert!(drain(&mut events).contains(&RoomEvent::TimerChanged {
            phase: TimerPhase::Running,
            remaining_seconds: 1490,
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn start_writes_record_and_ticks_locally() {
        let backend = FakeBackend::new().with_room(room(TimerRecord::default()));
        let clock = Arc::new(ManualClock::at(T0));
        let (client, _events) = enter(&backend, clock);
        sleep(SETTLE).await;

        client.start_timer().await.unwrap();
        let record = backend.timer("r1").unwrap();
        assert!(record.is_running);
        assert_eq!(record.started_at, Some(T0));

        sleep(Duration::from_millis(1_500)).await;
        assert_eq!(client.snapshot().remaining_seconds, 1499);

        assert!(client.start_timer().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_timer_write_is_reported() {
        let backend = FakeBackend::new().with_room(room(TimerRecord::default()));
        let (client, _events) = enter(&backend, Arc::new(ManualClock::at(T0)));
        sleep(SETTLE).await;

        backend.fail_with(Failure::Server(503));
        let err = client.start_timer().await.unwrap_err();
        assert_eq!(err.user_message(), "server error: 503");
        assert!(!backend.timer("r1").unwrap().is_running);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_expiry_raises_time_up() {
        let backend = FakeBackend::new().with_room(room(running_since(T0, 1)));
        let clock = Arc::new(ManualClock::at(T0 + time::Duration::seconds(30)));
        let (_client, mut events) = enter(&backend, clock.clone());
        sleep(SETTLE).await;
        drain(&mut events);

        clock.advance(time::Duration::seconds(60));
        sleep(Duration::from_secs(3)).await;

        let seen = drain(&mut events);
        assert!(seen.contains(&RoomEvent::TimeUp));
        assert!(seen.contains(&RoomEvent::TimerChanged {
            phase: TimerPhase::Expired,
            remaining_seconds: 0,
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn network_failure_marks_view_stale_until_recovery() {
        let backend = FakeBackend::new().with_room(room(TimerRecord::default()));
        let (client, mut events) = enter(&backend, Arc::new(ManualClock::at(T0)));
        sleep(SETTLE).await;

        backend.fail_with(Failure::Network);
        sleep(Duration::from_secs(3)).await;
        let snapshot = client.snapshot();
        assert!(snapshot.stale);
        assert_eq!(snapshot.code.as_deref(), Some("AB12CD"));
        let seen = drain(&mut events);
        assert!(seen.contains(&RoomEvent::StaleChanged(true)));
        assert!(seen.contains(&RoomEvent::SyncFailed {
            stream: SyncStream::Room,
            retryable: true,
        }));

        backend.heal();
        sleep(Duration::from_secs(3)).await;
        assert!(!client.snapshot().stale);
        assert!(drain(&mut events).contains(&RoomEvent::StaleChanged(false)));
    }

    #[tokio::test(start_paused = true)]
    async fn room_outage_stays_stale_while_messages_flow() {
        let backend = FakeBackend::new().with_room(room(TimerRecord::default()));
        let (client, mut events) = enter(&backend, Arc::new(ManualClock::at(T0)));
        sleep(SETTLE).await;
        drain(&mut events);

        backend.fail_path("rooms/r1", Failure::Network);
        backend.push_message(message("m1", "Can"));
        for _ in 0..3 {
            sleep(Duration::from_secs(3)).await;
            assert!(client.snapshot().stale);
        }
        assert_eq!(client.snapshot().messages.len(), 1);

        let seen = drain(&mut events);
        let flips: Vec<_> = seen
            .iter()
            .filter(|event| matches!(event, RoomEvent::StaleChanged(_)))
            .collect();
        assert_eq!(flips, vec![&RoomEvent::StaleChanged(true)]);

        backend.heal();
        sleep(Duration::from_secs(3)).await;
        assert!(!client.snapshot().stale);
        assert!(drain(&mut events).contains(&RoomEvent::StaleChanged(false)));
    }

    #[tokio::test(start_paused = true)]
    async fn server_failure_does_not_mark_stale() {
        let backend = FakeBackend::new().with_room(room(TimerRecord::default()));
        let (client, _events) = enter(&backend, Arc::new(ManualClock::at(T0)));
        sleep(SETTLE).await;

        backend.fail_with(Failure::Server(500));
        sleep(Duration::from_secs(3)).await;
        assert!(!client.snapshot().stale);
    }

    #[tokio::test(start_paused = true)]
    async fn sending_forces_scroll_to_bottom() {
        let backend = FakeBackend::new().with_room(room(TimerRecord::default()));
        let (client, mut events) = enter(&backend, Arc::new(ManualClock::at(T0)));
        sleep(SETTLE).await;
        client
            .set_viewport(Viewport::new(0.0, 2_000.0, 500.0))
            .await;
        drain(&mut events);

        let stored = client.send_message("  merhaba  ").await.unwrap();
        assert_eq!(stored.content, "merhaba");
        assert_eq!(stored.sender_field.as_deref(), Some("Sayısal"));

        assert!(drain(&mut events).contains(&RoomEvent::MessagesApplied {
            total: 1,
            new_messages: 1,
            scroll: ScrollDecision::Forced,
        }));
        assert_eq!(client.snapshot().clusters.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_message_never_reaches_backend() {
        let backend = FakeBackend::new().with_room(room(TimerRecord::default()));
        let (client, _events) = enter(&backend, Arc::new(ManualClock::at(T0)));
        sleep(SETTLE).await;
        let calls = backend.calls();

        let err = client.send_message("   ").await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert_eq!(backend.calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn background_update_preserves_scrolled_up_reader() {
        let backend = FakeBackend::new().with_room(room(TimerRecord::default()));
        let (client, mut events) = enter(&backend, Arc::new(ManualClock::at(T0)));
        sleep(SETTLE).await;
        client
            .set_viewport(Viewport::new(0.0, 2_000.0, 500.0))
            .await;

        backend.push_message(message("m1", "Can"));
        client.refresh().await;

        assert!(drain(&mut events).contains(&RoomEvent::MessagesApplied {
            total: 1,
            new_messages: 1,
            scroll: ScrollDecision::Preserve,
        }));
    }

    #[tokio::test]
    async fn join_room_remembers_context() {
        let backend = FakeBackend::new().with_room(room(TimerRecord::default()));
        let cache = CacheStore::in_memory();
        cache.save_profile("uid-2", "p2", "Can Demir");
        let input = JoinRoomInput {
            code: "ab12cd".into(),
            name: "Can".into(),
            study_field: Some("Eşit Ağırlık".into()),
        };

        let context = join_room(&backend, &cache, "uid-2", input).await.unwrap();
        assert_eq!(context.room_id, "r1");
        assert_eq!(context.participant.name, "Can");

        let cached = cache.room("uid-2");
        assert_eq!(cached.room_id.as_deref(), Some("r1"));
        assert_eq!(cached.user_id, Some(context.participant.id.clone()));
        assert_eq!(cache.profile("uid-2").user_name.as_deref(), Some("Can Demir"));

        let restored = RoomContext::from_cache(&cache, "uid-2").unwrap();
        assert_eq!(restored.participant.study_field.as_deref(), Some("Eşit Ağırlık"));
        assert_eq!(restored, context);
    }

    #[tokio::test]
    async fn find_room_matches_code_case_insensitively() {
        let backend = FakeBackend::new().with_room(room(TimerRecord::default()));

        let found = find_room(&backend, RoomCodeQuery { code: " ab12cd ".into() })
            .await
            .unwrap();
        assert_eq!(found.id, "r1");
        assert_eq!(found.participants.len(), 1);

        let err = find_room(&backend, RoomCodeQuery { code: "ZZ99ZZ".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Server(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn create_room_uses_owner_identity() {
        let backend = FakeBackend::new();
        let cache = CacheStore::in_memory();
        let input = CreateRoomInput {
            room_name: "Sabah grubu".into(),
            name: "Ada".into(),
            study_field: None,
        };

        let context = create_room(&backend, &cache, "uid-1", input).await.unwrap();
        assert_eq!(cache.room("uid-1").room_id, Some(context.room_id));
    }
}
