use std::collections::HashSet;

use time::OffsetDateTime;

use crate::dao::models::Message;

/// Distance from the bottom, in pixels, under which the reader counts as following the chat.
pub const DEFAULT_SCROLL_THRESHOLD: f64 = 100.0;

/// Scroll geometry of the message list as last reported by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Offset of the visible area from the top of the list.
    pub scroll_top: f64,
    /// Full height of the list.
    pub scroll_height: f64,
    /// Height of the visible area.
    pub client_height: f64,
}

impl Viewport {
    /// Geometry as measured by the presentation layer.
    pub fn new(scroll_top: f64, scroll_height: f64, client_height: f64) -> Self {
        Self {
            scroll_top,
            scroll_height,
            client_height,
        }
    }

    /// Pixels left below the visible area.
    pub fn distance_from_bottom(&self) -> f64 {
        self.scroll_height - self.scroll_top - self.client_height
    }

    /// Whether the reader is within `threshold` of the bottom.
    pub fn is_near_bottom(&self, threshold: f64) -> bool {
        self.distance_from_bottom() < threshold
    }
}

/// What the presentation layer should do with the scroll position after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDecision {
    /// Leave the scroll position where the reader put it.
    Preserve,
    /// The reader was following the chat; keep the newest message visible.
    StickToBottom,
    /// Scroll to the bottom regardless of position, after a local send.
    Forced,
}

impl ScrollDecision {
    /// Whether the list should move to the bottom.
    pub fn scrolls(&self) -> bool {
        !matches!(self, ScrollDecision::Preserve)
    }
}

/// Outcome of applying a fetched message list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatUpdate {
    /// Messages not present in the previous list.
    pub new_messages: usize,
    /// What to do with the scroll position.
    pub scroll: ScrollDecision,
}

/// Run of consecutive messages from one sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    /// Participant id of the sender.
    pub sender_id: String,
    /// Sender name shown in the run header.
    pub sender_name: String,
    /// Sender study field shown in the run header.
    pub sender_field: Option<String>,
    /// Index of the first message of the run in the full list.
    pub start: usize,
    /// Number of messages in the run.
    pub len: usize,
    /// Timestamp shown under the last message of the run.
    pub last_timestamp: OffsetDateTime,
}

impl Cluster {
    /// Whether message `index` opens this run and carries the sender header.
    pub fn is_first(&self, index: usize) -> bool {
        index == self.start
    }

    /// Whether message `index` closes this run and carries the timestamp.
    pub fn is_last(&self, index: usize) -> bool {
        index + 1 == self.start + self.len
    }
}

/// Group consecutive messages by sender.
pub fn clusters(messages: &[Message]) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();

    for (index, message) in messages.iter().enumerate() {
        match clusters.last_mut() {
            Some(cluster) if cluster.sender_id == message.sender_id => {
                cluster.len += 1;
                cluster.last_timestamp = message.timestamp;
            }
            _ => clusters.push(Cluster {
                sender_id: message.sender_id.clone(),
                sender_name: message.sender_name.clone(),
                sender_field: message.sender_field.clone(),
                start: index,
                len: 1,
                last_timestamp: message.timestamp,
            }),
        }
    }

    clusters
}

/// Keeps the displayed history in step with the backend.
///
/// Every fetch replaces the whole list; auto-scroll only follows readers who
/// were at the bottom before the update.
#[derive(Debug, Clone)]
pub struct ChatAppender {
    messages: Vec<Message>,
    threshold: f64,
}

impl Default for ChatAppender {
    fn default() -> Self {
        Self::new(DEFAULT_SCROLL_THRESHOLD)
    }
}

impl ChatAppender {
    /// Empty history following readers within `threshold` of the bottom.
    pub fn new(threshold: f64) -> Self {
        Self {
            messages: Vec::new(),
            threshold,
        }
    }

    /// Displayed history, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Sender runs of the displayed history.
    pub fn clusters(&self) -> Vec<Cluster> {
        clusters(&self.messages)
    }

    /// Whether a reader at `viewport` follows the chat. An unmeasured list counts as following.
    pub fn is_following(&self, viewport: Option<Viewport>) -> bool {
        viewport.is_none_or(|viewport| viewport.is_near_bottom(self.threshold))
    }

    /// Replace the history with a fetched list.
    ///
    /// `viewport` must be measured before the list changes.
    pub fn apply(&mut self, fetched: Vec<Message>, viewport: Option<Viewport>) -> ChatUpdate {
        let following = self.is_following(viewport);
        let new_messages = self.replace(fetched);
        let scroll = if following && !self.messages.is_empty() {
            ScrollDecision::StickToBottom
        } else {
            ScrollDecision::Preserve
        };

        ChatUpdate {
            new_messages,
            scroll,
        }
    }

    /// Replace the history after a local send; always scrolls to the bottom.
    pub fn apply_after_send(&mut self, fetched: Vec<Message>) -> ChatUpdate {
        let new_messages = self.replace(fetched);
        ChatUpdate {
            new_messages,
            scroll: ScrollDecision::Forced,
        }
    }

    fn replace(&mut self, fetched: Vec<Message>) -> usize {
        let known: HashSet<&str> = self.messages.iter().map(|m| m.id.as_str()).collect();
        let new_messages = fetched
            .iter()
            .filter(|message| !known.contains(message.id.as_str()))
            .count();
        self.messages = fetched;
        new_messages
    }
}
