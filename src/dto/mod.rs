use time::{OffsetDateTime, macros::format_description};

/// Chat message form.
pub mod chat;
/// Onboarding and task forms.
pub mod program;
pub mod room;
pub mod validation;

/// Render a timestamp as `HH:MM` for chat display.
pub fn format_clock_time(time: OffsetDateTime) -> String {
    time.format(format_description!("[hour]:[minute]"))
        .unwrap_or_else(|_| "--:--".into())
}
