/// Profile bootstrap and the onboarding form lifecycle.
pub mod onboarding;
/// Room polling, shared countdown and chat synchronization.
pub mod room_sync;
/// Program list reconciliation and synchronously committed task edits.
pub mod sync_coordinator;
