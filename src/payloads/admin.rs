use crate::model::registry::RoleKind;
use crate::payloads::reviewer::ImprovementItem;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug)]
pub struct EnsureDefaultRolesPayload {
    pub requested_by: i64,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct CreateUserPayload {
    pub requested_by: i64,
    pub email: String,
    pub password_hash: String,
    pub role: Option<RoleKind>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct AssignRolePayload {
    pub requested_by: i64,
    pub user_id: i64,
    pub role: RoleKind,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct RepairProfilesPayload {
    pub requested_by: i64,
    /// Limit the sweep to one user; sweep everyone when absent.
    pub user_id: Option<i64>,
}

/// What to do when a course grant already exists.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    Ignore,
    Error,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct AssignReviewerCoursePayload {
    pub requested_by: i64,
    pub user_id: i64,
    pub course_id: i64,
    #[serde(default)]
    pub on_conflict: ConflictPolicy,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct RemoveReviewerCoursePayload {
    pub requested_by: i64,
    pub user_id: i64,
    pub course_id: i64,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct SetReviewQuotaPayload {
    pub requested_by: i64,
    pub user_id: i64,
    /// Absent means no daily cap.
    pub max_reviews_per_day: Option<i32>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct SetReviewerActivePayload {
    pub requested_by: i64,
    pub user_id: i64,
    pub is_active: bool,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct ReplaceImprovementsPayload {
    pub requested_by: i64,
    pub submission_id: i64,
    pub improvements: Vec<ImprovementItem>,
}
