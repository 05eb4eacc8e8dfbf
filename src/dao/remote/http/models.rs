use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dao::models::{
    DailyHours, ExamGoal, NewMessage, NewParticipant, NewProfile, NewProgram, Task,
};

#[derive(Debug, Serialize)]
pub struct MessageCreateBody<'a> {
    pub room_id: &'a str,
    pub user_id: &'a str,
    pub user_name: &'a str,
    pub user_study_field: Option<&'a str>,
    pub content: &'a str,
}

impl<'a> From<&'a NewMessage> for MessageCreateBody<'a> {
    fn from(message: &'a NewMessage) -> Self {
        Self {
            room_id: &message.room_id,
            user_id: &message.sender_id,
            user_name: &message.sender_name,
            user_study_field: message.sender_field.as_deref(),
            content: &message.content,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoomCreateBody<'a> {
    pub name: &'a str,
    pub owner_name: &'a str,
    pub owner_study_field: Option<&'a str>,
}

impl<'a> RoomCreateBody<'a> {
    pub fn new(name: &'a str, owner: &'a NewParticipant) -> Self {
        Self {
            name,
            owner_name: &owner.name,
            owner_study_field: owner.study_field.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoomJoinBody<'a> {
    pub room_code: &'a str,
    pub user_name: &'a str,
    pub user_study_field: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct ProfileCreateBody<'a> {
    pub firebase_uid: Option<&'a str>,
    pub name: &'a str,
    pub study_field: Option<&'a str>,
}

impl<'a> From<&'a NewProfile> for ProfileCreateBody<'a> {
    fn from(profile: &'a NewProfile) -> Self {
        Self {
            firebase_uid: profile.external_id.as_deref(),
            name: &profile.name,
            study_field: profile.study_field.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProgramCreateBody<'a> {
    pub profile_id: &'a str,
    pub exam_goal: ExamGoal,
    pub daily_hours: DailyHours,
    pub study_days: u8,
}

impl<'a> From<&'a NewProgram> for ProgramCreateBody<'a> {
    fn from(program: &'a NewProgram) -> Self {
        Self {
            profile_id: &program.profile_id,
            exam_goal: program.exam_goal,
            daily_hours: program.daily_hours,
            study_days: program.study_days,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProgramTasksBody<'a> {
    pub tasks: &'a [Task],
}

/// Shape of the backend's in-band failure payload.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Extract the in-band error message when the payload is `{"error": "..."}`.
pub fn rejection_message(value: &Value) -> Option<String> {
    let object = value.as_object()?;
    if object.len() != 1 {
        return None;
    }
    serde_json::from_value::<ErrorBody>(value.clone())
        .ok()
        .map(|body| body.error)
}
