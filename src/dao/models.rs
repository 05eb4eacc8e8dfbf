//! Records exchanged with the backend and stored in the local cache.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Default countdown length used by rooms that never configured their timer.
pub const DEFAULT_TIMER_MINUTES: u32 = 25;

/// Day of the week a task is planned for, serialized with the backend's labels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum StudyDay {
    /// Pazartesi.
    #[serde(rename = "Pazartesi")]
    Monday,
    /// Salı.
    #[serde(rename = "Salı")]
    Tuesday,
    /// Çarşamba.
    #[serde(rename = "Çarşamba")]
    Wednesday,
    /// Perşembe.
    #[serde(rename = "Perşembe")]
    Thursday,
    /// Cuma.
    #[serde(rename = "Cuma")]
    Friday,
    /// Cumartesi.
    #[serde(rename = "Cumartesi")]
    Saturday,
    /// Pazar.
    #[serde(rename = "Pazar")]
    Sunday,
}

impl StudyDay {
    /// All days in planning order, Monday first.
    pub const ALL: [StudyDay; 7] = [
        StudyDay::Monday,
        StudyDay::Tuesday,
        StudyDay::Wednesday,
        StudyDay::Thursday,
        StudyDay::Friday,
        StudyDay::Saturday,
        StudyDay::Sunday,
    ];
}

/// Exam a study program prepares for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExamGoal {
    /// Basic proficiency test only.
    #[serde(rename = "TYT")]
    Tyt,
    /// Field proficiency test only.
    #[serde(rename = "AYT")]
    Ayt,
    /// Both sessions.
    #[serde(rename = "TYT + AYT")]
    Both,
}

/// Daily study budget bucket picked during onboarding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DailyHours {
    /// One to two hours a day.
    #[serde(rename = "1-2")]
    OneToTwo,
    /// Two to four hours a day.
    #[serde(rename = "2-4")]
    TwoToFour,
    /// More than four hours a day.
    #[serde(rename = "4+")]
    FourPlus,
}

/// Single planned study task. `id` is unique within its program.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    /// Task identifier, unique within the program.
    pub id: String,
    /// Lesson the task belongs to (e.g. "Matematik").
    pub lesson: String,
    /// Topic to study within the lesson.
    pub topic: String,
    /// Planned length in minutes.
    #[serde(rename = "duration")]
    pub duration_minutes: u32,
    /// Day of the week the task is planned for.
    pub day: StudyDay,
    /// Whether the student ticked the task off.
    #[serde(default)]
    pub completed: bool,
}

/// Study program owned by a profile. Tasks are only ever replaced as a whole list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Program {
    /// Backend identifier of the program.
    pub id: String,
    /// Profile owning the program.
    pub profile_id: String,
    /// Exam the program prepares for.
    pub exam_goal: ExamGoal,
    /// Daily study budget.
    pub daily_hours: DailyHours,
    /// Number of study days per week.
    #[serde(default)]
    pub study_days: u8,
    /// Planned tasks in backend order.
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Program {
    /// Copy of this program carrying a different task list.
    pub fn with_tasks(&self, tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            ..self.clone()
        }
    }
}

/// Student profile as stored by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    /// Backend identifier of the profile.
    pub id: String,
    /// Identity assigned by the external identity provider.
    #[serde(rename = "firebase_uid", default)]
    pub external_id: Option<String>,
    /// Display name of the student.
    pub name: String,
    /// Study field shown next to the name, if chosen.
    #[serde(default)]
    pub study_field: Option<String>,
}

/// Member of a study room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    /// Identifier assigned by the backend when joining.
    pub id: String,
    /// Display name used inside the room.
    pub name: String,
    /// Study field shown next to the name, if any.
    #[serde(default)]
    pub study_field: Option<String>,
}

/// Shared countdown record, one per room. Any participant may replace it.
///
/// While `is_running` is set, `remaining_seconds` is only a hint: readers derive
/// the remaining time from `started_at` and `duration_minutes`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerRecord {
    /// Whether the countdown is running.
    #[serde(default)]
    pub is_running: bool,
    /// Full countdown length.
    #[serde(default = "default_timer_minutes")]
    pub duration_minutes: u32,
    /// Remaining time when last stopped.
    #[serde(default)]
    pub remaining_seconds: u32,
    /// Instant the running countdown started from full length.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
}

impl Default for TimerRecord {
    fn default() -> Self {
        Self {
            is_running: false,
            duration_minutes: DEFAULT_TIMER_MINUTES,
            remaining_seconds: 0,
            started_at: None,
        }
    }
}

fn default_timer_minutes() -> u32 {
    DEFAULT_TIMER_MINUTES
}

/// Room snapshot including its embedded timer record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Room {
    /// Backend identifier of the room.
    pub id: String,
    /// Room name chosen by its owner.
    pub name: String,
    /// Upper-case invitation code.
    pub code: String,
    /// Participant id of the creator.
    pub owner_id: String,
    /// Participants in join order.
    #[serde(default)]
    pub participants: Vec<Participant>,
    /// Shared countdown.
    #[serde(rename = "timer_state", default)]
    pub timer: TimerRecord,
}

/// Chat message acknowledged by the backend. Ordered by `timestamp` ascending.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Backend identifier of the message.
    pub id: String,
    /// Room the message was posted in.
    pub room_id: String,
    /// Participant id of the sender.
    #[serde(rename = "user_id")]
    pub sender_id: String,
    /// Sender display name at posting time.
    #[serde(rename = "user_name")]
    pub sender_name: String,
    /// Sender study field at posting time.
    #[serde(rename = "user_study_field", default)]
    pub sender_field: Option<String>,
    /// Message text.
    pub content: String,
    /// Server-assigned posting time.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Payload for appending a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Target room.
    pub room_id: String,
    /// Participant id of the sender.
    pub sender_id: String,
    /// Sender display name.
    pub sender_name: String,
    /// Sender study field.
    pub sender_field: Option<String>,
    /// Trimmed, non-blank message text.
    pub content: String,
}

/// Display identity used when creating or joining a room; the backend assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParticipant {
    /// Display name inside the room.
    pub name: String,
    /// Study field shown next to the name.
    pub study_field: Option<String>,
}

/// Payload for creating a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    /// Identity assigned by the external identity provider.
    pub external_id: Option<String>,
    /// Display name of the student.
    pub name: String,
    /// Chosen study field.
    pub study_field: Option<String>,
}

/// Payload for creating a program; the backend generates the starter tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProgram {
    /// Profile owning the new program.
    pub profile_id: String,
    /// Exam the program prepares for.
    pub exam_goal: ExamGoal,
    /// Daily study budget.
    pub daily_hours: DailyHours,
    /// Number of study days per week.
    pub study_days: u8,
}

/// Partially filled onboarding form persisted between sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgramDraft {
    /// Form step the student stopped at.
    #[serde(default)]
    pub step: u8,
    /// Name typed so far.
    #[serde(default)]
    pub name: String,
    /// Study field picked so far.
    #[serde(default)]
    pub study_field: Option<String>,
    /// Exam goal picked so far.
    #[serde(default)]
    pub exam_goal: Option<ExamGoal>,
    /// Daily budget picked so far.
    #[serde(default)]
    pub daily_hours: Option<DailyHours>,
    /// Study days picked so far.
    #[serde(default)]
    pub study_days: u8,
}

/// Everything cached locally for one identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheRecord {
    /// Last known programs of the profile.
    pub programs: Vec<Program>,
    /// Backend id of the profile.
    pub profile_id: Option<String>,
    /// Profile display name.
    pub user_name: Option<String>,
    /// Room last entered.
    pub current_room_id: Option<String>,
    /// Participant id assigned in that room.
    pub current_user_id: Option<String>,
    /// Display name used in that room.
    pub current_user_name: Option<String>,
    /// Study field used in that room.
    pub current_user_field: Option<String>,
    /// Unfinished onboarding form.
    pub program_draft: Option<ProgramDraft>,
    /// Onboarding finished on this device.
    pub onboarding_completed: bool,
}

/// Shallow field-level update for a [`CacheRecord`]. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachePatch {
    /// Replacement program list.
    pub programs: Option<Vec<Program>>,
    /// Profile id to store.
    pub profile_id: Option<String>,
    /// Profile display name to store.
    pub user_name: Option<String>,
    /// Room id to remember.
    pub current_room_id: Option<String>,
    /// Participant id to remember.
    pub current_user_id: Option<String>,
    /// Room display name to remember.
    pub current_user_name: Option<String>,
    /// Room study field; `Some(None)` forgets it.
    pub current_user_field: Option<Option<String>>,
    /// `Some(None)` removes the stored draft.
    pub program_draft: Option<Option<ProgramDraft>>,
    /// Onboarding flag to store.
    pub onboarding_completed: Option<bool>,
}

impl CacheRecord {
    /// Apply a patch field by field; the patch wins wherever it carries a value.
    pub fn apply(&mut self, patch: CachePatch) {
        let CachePatch {
            programs,
            profile_id,
            user_name,
            current_room_id,
            current_user_id,
            current_user_name,
            current_user_field,
            program_draft,
            onboarding_completed,
        } = patch;

        if let Some(programs) = programs {
            self.programs = programs;
        }
        if let Some(profile_id) = profile_id {
            self.profile_id = Some(profile_id);
        }
        if let Some(user_name) = user_name {
            self.user_name = Some(user_name);
        }
        if let Some(room_id) = current_room_id {
            self.current_room_id = Some(room_id);
        }
        if let Some(user_id) = current_user_id {
            self.current_user_id = Some(user_id);
        }
        if let Some(name) = current_user_name {
            self.current_user_name = Some(name);
        }
        if let Some(field) = current_user_field {
            self.current_user_field = field;
        }
        if let Some(draft) = program_draft {
            self.program_draft = draft;
        }
        if let Some(done) = onboarding_completed {
            self.onboarding_completed = done;
        }
    }
}
