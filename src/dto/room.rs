//! Room creation, joining and lookup forms.

use validator::Validate;

use crate::{dao::models::NewParticipant, dto::validation::validate_not_blank};

/// "Join room" form: invitation code plus the display identity to join with.
#[derive(Debug, Clone, Validate)]
pub struct JoinRoomInput {
    /// Invitation code as typed.
    #[validate(custom(function = "validate_not_blank"))]
    pub code: String,
    /// Display name to use inside the room.
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
    /// Study field shown next to the name.
    pub study_field: Option<String>,
}

/// Codes are matched case-insensitively; the backend stores them upper-cased.
fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

impl JoinRoomInput {
    /// Code in the form the backend stores it.
    pub fn normalized_code(&self) -> String {
        normalize_code(&self.code)
    }

    /// Display identity sent with the join request.
    pub fn participant(&self) -> NewParticipant {
        NewParticipant {
            name: self.name.trim().to_owned(),
            study_field: self.study_field.clone(),
        }
    }
}

/// "Create room" form; the creator becomes the owner and first participant.
#[derive(Debug, Clone, Validate)]
pub struct CreateRoomInput {
    /// Name of the new room.
    #[validate(custom(function = "validate_not_blank"))]
    pub room_name: String,
    /// Display name of the owner.
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
    /// Study field of the owner.
    pub study_field: Option<String>,
}

impl CreateRoomInput {
    /// Display identity of the owner.
    pub fn participant(&self) -> NewParticipant {
        NewParticipant {
            name: self.name.trim().to_owned(),
            study_field: self.study_field.clone(),
        }
    }
}

/// Invitation code typed to look a room up before joining it.
#[derive(Debug, Clone, Validate)]
pub struct RoomCodeQuery {
    /// Code as typed.
    #[validate(custom(function = "validate_not_blank"))]
    pub code: String,
}

impl RoomCodeQuery {
    /// Code in the form the backend stores it.
    pub fn normalized_code(&self) -> String {
        normalize_code(&self.code)
    }
}
