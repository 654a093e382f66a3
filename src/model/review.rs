use crate::schema::{reviews, student_improvements, submissions};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of a submission. Stored as a string column; converted here once
/// when rows cross the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    ChangesRequested,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::ChangesRequested => "changes_requested",
        }
    }

    pub fn parse(value: &str) -> Option<SubmissionStatus> {
        match value {
            "pending" => Some(SubmissionStatus::Pending),
            "approved" => Some(SubmissionStatus::Approved),
            "changes_requested" => Some(SubmissionStatus::ChangesRequested),
            _ => None,
        }
    }
}

/// A reviewer's verdict on one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Approved,
    NeedsWork,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Approved => "approved",
            ReviewStatus::NeedsWork => "needs_work",
        }
    }

    pub fn parse(value: &str) -> Option<ReviewStatus> {
        match value {
            "approved" => Some(ReviewStatus::Approved),
            "needs_work" => Some(ReviewStatus::NeedsWork),
            _ => None,
        }
    }

    /// The submission status a concluded review leaves behind.
    pub fn submission_status(&self) -> SubmissionStatus {
        match self {
            ReviewStatus::Approved => SubmissionStatus::Approved,
            ReviewStatus::NeedsWork => SubmissionStatus::ChangesRequested,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImprovementPriority {
    High,
    Medium,
    Low,
}

impl ImprovementPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImprovementPriority::High => "high",
            ImprovementPriority::Medium => "medium",
            ImprovementPriority::Low => "low",
        }
    }

    pub fn parse(value: &str) -> Option<ImprovementPriority> {
        match value {
            "high" => Some(ImprovementPriority::High),
            "medium" => Some(ImprovementPriority::Medium),
            "low" => Some(ImprovementPriority::Low),
            _ => None,
        }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = submissions)]
pub struct NewSubmission {
    pub student_id: i64,
    pub lesson_id: i64,
    pub work_url: String,
    // status defaults to 'pending', submitted_at to CURRENT_TIMESTAMP;
    // reviewed_at, reviewed_by and review_id stay NULL until a review lands
}

#[derive(Insertable, Debug)]
#[diesel(table_name = reviews)]
pub struct NewReview {
    pub submission_id: i64,
    pub reviewer_id: i64,
    pub status: String,
    pub comments: String,
    pub rating: Option<i32>,
    pub time_spent_mins: Option<i32>,
    // reviewed_at has a DB default (CURRENT_TIMESTAMP)
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = student_improvements)]
pub struct NewStudentImprovement {
    pub review_id: i64,
    pub submission_id: i64,
    pub improvement_number: i32,
    pub improvement_text: String,
    pub priority: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct SubmissionStatusResponse {
    pub submission_id: i64,
    pub lesson_id: i64,
    pub status: SubmissionStatus,
    pub work_url: String,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// One pending submission in a reviewer's queue, oldest first.
#[derive(Deserialize, Serialize, Debug, Queryable)]
pub struct ReviewQueueEntry {
    pub submission_id: i64,
    pub lesson_id: i64,
    pub course_id: i64,
    pub student_id: i64,
    pub work_url: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct ReviewFormResponse {
    pub submission_id: i64,
    pub lesson_id: i64,
    pub course_id: i64,
    pub work_url: String,
    pub submitted_at: DateTime<Utc>,
    pub student_email: String,
    pub lesson_title: String,
    pub course_title: String,

    /// Present when the caller may still look but has exhausted the daily
    /// review quota; submitting would be rejected.
    pub quota_warning: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ImprovementEntry {
    pub number: i32,
    pub text: String,
    pub priority: ImprovementPriority,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct ReviewFeedbackResponse {
    pub review_id: i64,
    pub submission_id: i64,
    pub status: ReviewStatus,
    pub comments: String,
    pub rating: Option<i32>,
    pub time_spent_mins: Option<i32>,
    pub reviewed_at: DateTime<Utc>,
    pub improvements: Vec<ImprovementEntry>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct ReviewerStatsResponse {
    pub total_reviews: i32,
    /// Mean of `time_spent_mins` over the reviews that logged it; `None`
    /// until one does.
    pub average_review_time_mins: Option<f64>,
    pub reviews_today: i64,
    pub max_reviews_per_day: Option<i32>,
}
