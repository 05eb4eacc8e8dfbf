use time::OffsetDateTime;

use crate::{
    dao::models::{Message, Participant, Room},
    state::{
        chat::{ChatAppender, ChatUpdate, Cluster, Viewport},
        sequence::AppliedWatermark,
        timer::{TimerNotice, TimerPhase, TimerStateMachine},
    },
};

/// Backend stream a response, failure or event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStream {
    /// Room snapshot carrying participants and the shared timer record.
    Room,
    /// Message history of the room.
    Messages,
}

/// Response refused because a newer one for the same stream was already applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleResponse {
    /// Sequence number of the refused response.
    pub seq: u64,
    /// Sequence number already applied to the stream.
    pub latest: u64,
}

/// What a reported read failure did to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// A newer response was already applied; the failure is ignored.
    Outdated,
    /// The failure was recorded against its stream.
    Recorded {
        /// The view switched from fresh to stale.
        became_stale: bool,
    },
}

/// Applied watermark and pending network failure of one stream.
#[derive(Debug, Clone, Copy, Default)]
struct StreamStatus {
    applied: AppliedWatermark,
    /// Sequence number of the newest request that failed without a response.
    failed_at: Option<u64>,
}

impl StreamStatus {
    fn admit(&mut self, seq: u64) -> Result<(), StaleResponse> {
        if !self.applied.admit(seq) {
            return Err(StaleResponse {
                seq,
                latest: self.applied.value(),
            });
        }
        // A failure issued after this request is still unanswered.
        if self.failed_at.is_some_and(|failed| failed < seq) {
            self.failed_at = None;
        }
        Ok(())
    }

    fn is_outdated(&self, seq: u64) -> bool {
        seq <= self.applied.value()
    }

    fn fail(&mut self, seq: u64) {
        self.failed_at = Some(self.failed_at.map_or(seq, |failed| failed.max(seq)));
    }

    fn is_failing(&self) -> bool {
        self.failed_at.is_some()
    }
}

/// In-memory view model of one room: snapshot, countdown and chat.
///
/// Each stream keeps its own failure state; the view is stale while either
/// stream has a network failure newer than its last applied response.
#[derive(Debug, Clone)]
pub struct RoomView {
    room_id: String,
    room: Option<Room>,
    timer: TimerStateMachine,
    chat: ChatAppender,
    viewport: Option<Viewport>,
    room_stream: StreamStatus,
    messages_stream: StreamStatus,
    loading: bool,
}

/// Read-only copy of a [`RoomView`] published to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    /// Backend id of the room.
    pub room_id: String,
    /// Room name, once the first snapshot arrived.
    pub name: Option<String>,
    /// Invitation code, once the first snapshot arrived.
    pub code: Option<String>,
    /// Participants in join order.
    pub participants: Vec<Participant>,
    /// Displayed countdown phase.
    pub timer_phase: TimerPhase,
    /// Displayed remaining time in seconds.
    pub remaining_seconds: u32,
    /// Configured countdown length.
    pub duration_minutes: u32,
    /// Countdown rendered as `MM:SS`.
    pub timer_display: String,
    /// Chat history, oldest first.
    pub messages: Vec<Message>,
    /// Consecutive messages grouped by sender.
    pub clusters: Vec<Cluster>,
    /// Nothing received yet since entering the room.
    pub loading: bool,
    /// A read failed without a response; data shown may be outdated.
    pub stale: bool,
}

impl RoomView {
    /// Empty view for `room_id`, loading until the first response.
    pub fn new(room_id: impl Into<String>, scroll_threshold: f64) -> Self {
        Self {
            room_id: room_id.into(),
            room: None,
            timer: TimerStateMachine::default(),
            chat: ChatAppender::new(scroll_threshold),
            viewport: None,
            room_stream: StreamStatus::default(),
            messages_stream: StreamStatus::default(),
            loading: true,
        }
    }

    /// Backend id of the room.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Last applied room snapshot.
    pub fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    /// Local countdown.
    pub fn timer(&self) -> &TimerStateMachine {
        &self.timer
    }

    /// Mutable access to the local countdown.
    pub fn timer_mut(&mut self) -> &mut TimerStateMachine {
        &mut self.timer
    }

    /// Chat history and scroll state.
    pub fn chat(&self) -> &ChatAppender {
        &self.chat
    }

    /// Remember the latest scroll geometry of the chat.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    /// Whether any stream has an unanswered network failure.
    pub fn is_stale(&self) -> bool {
        self.room_stream.is_failing() || self.messages_stream.is_failing()
    }

    fn stream_mut(&mut self, stream: SyncStream) -> &mut StreamStatus {
        match stream {
            SyncStream::Room => &mut self.room_stream,
            SyncStream::Messages => &mut self.messages_stream,
        }
    }

    /// Record the failure of request `seq` on `stream`.
    ///
    /// Only failures without a response (`network`) make the view stale. A
    /// failure older than the last applied response of its stream is ignored.
    pub fn mark_failed(&mut self, stream: SyncStream, seq: u64, network: bool) -> FailureOutcome {
        if self.stream_mut(stream).is_outdated(seq) {
            return FailureOutcome::Outdated;
        }

        self.loading = false;
        let was_stale = self.is_stale();
        if network {
            self.stream_mut(stream).fail(seq);
        }
        FailureOutcome::Recorded {
            became_stale: !was_stale && self.is_stale(),
        }
    }

    /// Apply a fetched room snapshot and fold its timer record in.
    pub fn apply_room(
        &mut self,
        seq: u64,
        room: Room,
        now: OffsetDateTime,
    ) -> Result<Option<TimerNotice>, StaleResponse> {
        self.room_stream.admit(seq)?;

        let notice = self.timer.observe(&room.timer, now);
        self.room = Some(room);
        self.loading = false;
        Ok(notice)
    }

    /// Apply a fetched message history from a background poll.
    pub fn apply_messages(
        &mut self,
        seq: u64,
        messages: Vec<Message>,
    ) -> Result<ChatUpdate, StaleResponse> {
        self.messages_stream.admit(seq)?;
        let update = self.chat.apply(messages, self.viewport);
        self.loading = false;
        Ok(update)
    }

    /// Apply the history reloaded right after a local send.
    pub fn apply_messages_after_send(
        &mut self,
        seq: u64,
        messages: Vec<Message>,
    ) -> Result<ChatUpdate, StaleResponse> {
        self.messages_stream.admit(seq)?;
        let update = self.chat.apply_after_send(messages);
        self.loading = false;
        Ok(update)
    }

    /// Local timer write issued as `seq`: room snapshots requested before it are outdated.
    pub fn claim_timer_write(&mut self, seq: u64) {
        self.room_stream.applied.advance_to(seq);
    }

    /// Copy of the current state for observers.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id.clone(),
            name: self.room.as_ref().map(|room| room.name.clone()),
            code: self.room.as_ref().map(|room| room.code.clone()),
            participants: self
                .room
                .as_ref()
                .map(|room| room.participants.clone())
                .unwrap_or_default(),
            timer_phase: self.timer.phase(),
            remaining_seconds: self.timer.remaining_seconds(),
            duration_minutes: self.timer.duration_minutes(),
            timer_display: self.timer.display(),
            messages: self.chat.messages().to_vec(),
            clusters: self.chat.clusters(),
            loading: self.loading,
            stale: self.is_stale(),
        }
    }
}
