//! Pure client-side logic and the view models it drives.

/// Chat history merging and auto-scroll decisions.
pub mod chat;
/// Wall-clock abstraction.
pub mod clock;
/// Program list view model.
pub mod program;
/// Room view model.
pub mod room;
/// Request ordering guard.
pub mod sequence;
/// Shared countdown state machine.
pub mod timer;

pub use self::chat::{ChatAppender, ChatUpdate, Cluster, ScrollDecision, Viewport};
pub use self::clock::{Clock, SystemClock};
pub use self::program::ProgramView;
pub use self::room::{FailureOutcome, RoomSnapshot, RoomView, StaleResponse, SyncStream};
pub use self::timer::{TimerNotice, TimerPhase, TimerState, TimerStateMachine};
