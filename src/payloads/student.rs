use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug)]
pub struct SubmitWorkPayload {
    pub user_id: i64,
    pub lesson_id: i64,
    pub work_url: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct GetOwnSubmissionsParams {
    pub user_id: i64,
    pub lesson_id: Option<i64>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct GetReviewFeedbackParams {
    pub user_id: i64,
    pub submission_id: i64,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct GetLessonDataParams {
    pub lesson_id: i64,
}
