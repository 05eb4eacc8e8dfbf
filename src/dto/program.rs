use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{DailyHours, ExamGoal, NewProfile, NewProgram, ProgramDraft, StudyDay, Task},
    dto::validation::validate_not_blank,
};

/// Task typed into the "add task" form.
#[derive(Debug, Clone, Validate)]
pub struct NewTaskInput {
    /// Lesson name.
    #[validate(custom(function = "validate_not_blank"))]
    pub lesson: String,
    /// Topic within the lesson.
    #[validate(custom(function = "validate_not_blank"))]
    pub topic: String,
    /// Planned length, at most one day.
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: u32,
    /// Day the task is planned for.
    pub day: StudyDay,
}

impl NewTaskInput {
    /// Turn validated input into a task with a fresh identifier.
    pub fn into_task(self) -> Task {
        Task {
            id: Uuid::new_v4().to_string(),
            lesson: self.lesson.trim().to_owned(),
            topic: self.topic.trim().to_owned(),
            duration_minutes: self.duration_minutes,
            day: self.day,
            completed: false,
        }
    }
}

/// Completed onboarding form, submitted once to create a profile and its program.
#[derive(Debug, Clone, Validate)]
pub struct OnboardingForm {
    /// Display name of the student.
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
    /// Chosen study field.
    pub study_field: Option<String>,
    /// Exam the program prepares for.
    pub exam_goal: ExamGoal,
    /// Daily study budget.
    pub daily_hours: DailyHours,
    /// Study days per week.
    #[validate(range(min = 1, max = 7))]
    pub study_days: u8,
}

impl OnboardingForm {
    /// Rebuild a form from a draft, when the draft has every required choice.
    pub fn from_draft(draft: &ProgramDraft) -> Option<Self> {
        Some(Self {
            name: draft.name.clone(),
            study_field: draft.study_field.clone(),
            exam_goal: draft.exam_goal?,
            daily_hours: draft.daily_hours?,
            study_days: draft.study_days,
        })
    }

    /// Profile payload, linked to `external_id` when signed in.
    pub fn profile(&self, external_id: Option<&str>) -> NewProfile {
        NewProfile {
            external_id: external_id.map(str::to_owned),
            name: self.name.trim().to_owned(),
            study_field: self.study_field.clone(),
        }
    }

    /// Program payload for the freshly created profile.
    pub fn program(&self, profile_id: &str) -> NewProgram {
        NewProgram {
            profile_id: profile_id.to_owned(),
            exam_goal: self.exam_goal,
            daily_hours: self.daily_hours,
            study_days: self.study_days,
        }
    }
}
