/// Transport-neutral backend errors.
pub mod error;
#[cfg(test)]
pub(crate) mod fake;
/// reqwest-based backend.
#[cfg(feature = "http-backend")]
pub mod http;

use futures::future::BoxFuture;

use crate::dao::models::{
    Message, NewMessage, NewParticipant, NewProfile, NewProgram, Profile, Program, Room, Task,
    TimerRecord,
};

pub use self::error::{RemoteError, RemoteResult};

/// Abstraction over the study backend consumed by the sync layer.
///
/// Every call may fail; implementations classify failures through [`RemoteError`].
/// Caller identity travels inside the payloads or through the implementation's
/// own side channel.
pub trait Backend: Send + Sync {
    /// Room snapshot including its timer record.
    fn fetch_room(&self, room_id: &str) -> BoxFuture<'static, RemoteResult<Room>>;
    /// Room with the given upper-case invitation code.
    fn fetch_room_by_code(&self, code: &str) -> BoxFuture<'static, RemoteResult<Room>>;
    /// Create a room owned by `owner`, who becomes its first participant.
    fn create_room(
        &self,
        name: &str,
        owner: NewParticipant,
    ) -> BoxFuture<'static, RemoteResult<Room>>;
    /// Append `participant` to the room with the given code.
    fn join_room(
        &self,
        code: &str,
        participant: NewParticipant,
    ) -> BoxFuture<'static, RemoteResult<Room>>;
    /// Full message history of a room, ordered by timestamp ascending.
    fn fetch_messages(&self, room_id: &str) -> BoxFuture<'static, RemoteResult<Vec<Message>>>;
    /// Append a chat message; the backend assigns id and timestamp.
    fn submit_message(&self, message: NewMessage) -> BoxFuture<'static, RemoteResult<Message>>;
    /// Replace the shared timer record of a room.
    fn replace_timer(
        &self,
        room_id: &str,
        record: TimerRecord,
    ) -> BoxFuture<'static, RemoteResult<()>>;
    /// Create a student profile.
    fn create_profile(&self, profile: NewProfile) -> BoxFuture<'static, RemoteResult<Profile>>;
    /// Look up the profile linked to an external identity; `None` when there is none.
    fn find_profile_by_external_id(
        &self,
        external_id: &str,
    ) -> BoxFuture<'static, RemoteResult<Option<Profile>>>;
    /// Create a program; the backend generates its starter tasks.
    fn create_program(&self, program: NewProgram) -> BoxFuture<'static, RemoteResult<Program>>;
    /// Programs owned by a profile, in backend order.
    fn list_programs(&self, profile_id: &str) -> BoxFuture<'static, RemoteResult<Vec<Program>>>;
    /// Replace the whole task list of a program, returning the stored program.
    fn replace_tasks(
        &self,
        program_id: &str,
        tasks: Vec<Task>,
    ) -> BoxFuture<'static, RemoteResult<Program>>;
}
