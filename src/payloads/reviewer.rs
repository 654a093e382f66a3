use crate::model::review::{ImprovementPriority, ReviewStatus};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug)]
pub struct GetReviewQueueParams {
    pub user_id: i64,
    pub course_id: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct GetReviewFormParams {
    pub user_id: i64,
    pub submission_id: i64,
}

/// One requested improvement; numbering is assigned server-side from list
/// order.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ImprovementItem {
    pub text: String,
    pub priority: ImprovementPriority,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct SubmitReviewPayload {
    pub user_id: i64,
    pub submission_id: i64,
    pub status: ReviewStatus,
    pub comments: String,
    pub rating: Option<i32>,
    pub time_spent_mins: Option<i32>,
    #[serde(default)]
    pub improvements: Vec<ImprovementItem>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct GetReviewerStatsParams {
    pub user_id: i64,
}
