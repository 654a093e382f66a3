use super::helper;
use crate::errors::AppError;
use crate::model::catalog::LessonDataResponse;
use crate::model::review::{
    ImprovementEntry, ImprovementPriority, NewSubmission, ReviewFeedbackResponse, ReviewStatus,
    SubmissionStatus, SubmissionStatusResponse,
};
use crate::payloads::student::{
    GetLessonDataParams, GetOwnSubmissionsParams, GetReviewFeedbackParams, SubmitWorkPayload,
};
use crate::response::ApiResponse;
use crate::schema::{
    lessons::dsl as lessons_dsl, reviews::dsl as reviews_dsl, steps::dsl as steps_dsl,
    student_improvements::dsl as si_dsl, submissions::dsl as subs_dsl,
};
use anyhow::anyhow;
use axum::extract::{Path, Query};
use axum::{extract::State, response::Json};
use chrono::{DateTime, Utc};
use deadpool_diesel::postgres::Pool;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::log::warn;
use tracing::{debug, error, info, instrument};
use url::Url;

/// Records a new work submission for a lesson.
///
/// Returns (wrapped in `ApiResponse`)
/// * submission id as `i64` (201 Created).
/// * `404 Not Found`: If the caller has no student profile or the lesson does not exist.
/// * `409 Conflict`: If a pending submission for this lesson already exists.
/// * `422 Unprocessable Entity`: If `work_url` is not a valid URL.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool, payload))]
pub async fn submit_work(
    State(pool): State<Pool>,
    Json(payload): Json<SubmitWorkPayload>,
) -> Result<ApiResponse<i64>, AppError> {
    info!(
        "Attempting work submission for user_id: {} lesson_id: {}",
        payload.user_id, payload.lesson_id
    );
    debug!("Submit work payload: {:?}", payload);

    if let Err(parse_err) = Url::parse(&payload.work_url) {
        warn!(
            "Rejected malformed work_url '{}' from user {}: {}",
            payload.work_url, payload.user_id, parse_err
        );
        return Err(AppError::UnprocessableEntity(format!(
            "work_url '{}' is not a valid URL",
            payload.work_url
        )));
    }

    let user_id = payload.user_id;
    let profile_id = helper::run_query(&pool, move |conn| {
        helper::student_profile_id(conn, user_id)
    })
    .await?
    .ok_or_else(|| {
        error!("No student profile for user {}", user_id);
        AppError::NotFound(format!("No student profile for user ID {}.", user_id))
    })?;

    let lesson_id = payload.lesson_id;
    let already_pending = helper::run_query(&pool, move |conn| {
        diesel::dsl::select(diesel::dsl::exists(
            subs_dsl::submissions
                .filter(subs_dsl::student_id.eq(profile_id))
                .filter(subs_dsl::lesson_id.eq(lesson_id))
                .filter(subs_dsl::status.eq(SubmissionStatus::Pending.as_str())),
        ))
        .get_result::<bool>(conn)
    })
    .await?;

    if already_pending {
        warn!(
            "Student profile {} already has a pending submission for lesson {}",
            profile_id, lesson_id
        );
        return Err(AppError::Conflict(format!(
            "A pending submission for lesson ID {} already exists.",
            lesson_id
        )));
    }

    let new_submission = NewSubmission {
        student_id: profile_id,
        lesson_id,
        work_url: payload.work_url.clone(),
    };

    let insert_result = helper::run_query(&pool, move |conn| {
        diesel::insert_into(subs_dsl::submissions)
            .values(&new_submission)
            .returning(crate::schema::submissions::id)
            .get_result::<i64>(conn)
    })
    .await;

    match insert_result {
        Ok(new_id) => {
            info!(
                "Student profile {} submitted work {} for lesson {}",
                profile_id, new_id, lesson_id
            );
            Ok(ApiResponse::created(new_id))
        }
        Err(AppError::DieselError(DieselError::DatabaseError(
            DatabaseErrorKind::ForeignKeyViolation,
            _,
        ))) => {
            warn!(
                "Submission insert hit a foreign key violation for lesson_id: {}",
                lesson_id
            );
            Err(AppError::NotFound(format!(
                "Lesson with ID {} not found.",
                lesson_id
            )))
        }
        Err(AppError::DieselError(DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            _,
        ))) => {
            // lost a race against a concurrent submission for the same lesson;
            // the partial unique index is the authority
            warn!(
                "Concurrent pending submission detected for student profile {} lesson {}",
                profile_id, lesson_id
            );
            Err(AppError::Conflict(format!(
                "A pending submission for lesson ID {} already exists.",
                lesson_id
            )))
        }
        Err(e) => Err(e),
    }
}

/// Retrieves the status snapshot of a single submission.
///
/// Returns (wrapped in `ApiResponse`)
/// * `SubmissionStatusResponse` (200 OK).
/// * `404 Not Found`: If the submission does not exist.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool))]
pub async fn get_submission(
    State(pool): State<Pool>,
    Path(submission_id): Path<i64>,
) -> Result<ApiResponse<SubmissionStatusResponse>, AppError> {
    info!(
        "Fetching submission status for submission_id: {}",
        submission_id
    );

    type SubmissionTuple = (i64, i64, String, String, DateTime<Utc>, Option<DateTime<Utc>>);

    let query_result = helper::run_query(&pool, move |conn| {
        subs_dsl::submissions
            .filter(subs_dsl::id.eq(submission_id))
            .select((
                subs_dsl::id,
                subs_dsl::lesson_id,
                subs_dsl::status,
                subs_dsl::work_url,
                subs_dsl::submitted_at,
                subs_dsl::reviewed_at,
            ))
            .first::<SubmissionTuple>(conn)
    })
    .await;

    match query_result {
        Ok((id, lesson_id, status, work_url, submitted_at, reviewed_at)) => {
            let status = SubmissionStatus::parse(&status).ok_or_else(|| {
                error!("Submission {} carries unknown status '{}'", id, status);
                AppError::Internal(anyhow!("Submission {} carries an unknown status", id))
            })?;
            info!("Successfully fetched submission {}", id);
            Ok(ApiResponse::ok(SubmissionStatusResponse {
                submission_id: id,
                lesson_id,
                status,
                work_url,
                submitted_at,
                reviewed_at,
            }))
        }
        Err(AppError::DieselError(DieselError::NotFound)) => {
            error!("Submission with ID {} not found.", submission_id);
            Err(AppError::NotFound(format!(
                "Submission with ID {} not found.",
                submission_id
            )))
        }
        Err(e) => Err(e),
    }
}

/// Retrieves a student's submission IDs, newest first. Can be scoped to one
/// lesson.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<i64>` of submission IDs (200 OK).
/// * `404 Not Found`: If the caller has no student profile.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool, params))]
pub async fn get_own_submissions(
    State(pool): State<Pool>,
    Query(params): Query<GetOwnSubmissionsParams>,
) -> Result<ApiResponse<Vec<i64>>, AppError> {
    let user_id = params.user_id;
    let lesson_filter = params.lesson_id;

    info!(
        "Fetching submissions for user_id: {}. Lesson filter: {:?}",
        user_id, lesson_filter
    );
    debug!("Get own submissions params: {:?}", params);

    let profile_id = helper::run_query(&pool, move |conn| {
        helper::student_profile_id(conn, user_id)
    })
    .await?
    .ok_or_else(|| {
        error!("No student profile for user {}", user_id);
        AppError::NotFound(format!("No student profile for user ID {}.", user_id))
    })?;

    let submission_ids = helper::run_query(&pool, move |conn| {
        if let Some(lesson_id) = lesson_filter {
            subs_dsl::submissions
                .filter(subs_dsl::student_id.eq(profile_id))
                .filter(subs_dsl::lesson_id.eq(lesson_id))
                .order(subs_dsl::submitted_at.desc())
                .select(subs_dsl::id)
                .load::<i64>(conn)
        } else {
            subs_dsl::submissions
                .filter(subs_dsl::student_id.eq(profile_id))
                .order(subs_dsl::submitted_at.desc())
                .select(subs_dsl::id)
                .load::<i64>(conn)
        }
    })
    .await?;

    info!(
        "Successfully fetched {} submissions for user_id: {}",
        submission_ids.len(),
        user_id
    );
    Ok(ApiResponse::ok(submission_ids))
}

/// Retrieves the review verdict, comments and ordered improvement list for
/// one of the caller's submissions.
///
/// Returns (wrapped in `ApiResponse`)
/// * `ReviewFeedbackResponse` (200 OK).
/// * `403 Forbidden`: If the submission belongs to another student.
/// * `404 Not Found`: If the profile or submission is missing, or the submission has no review yet.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool, params))]
pub async fn get_review_feedback(
    State(pool): State<Pool>,
    Query(params): Query<GetReviewFeedbackParams>,
) -> Result<ApiResponse<ReviewFeedbackResponse>, AppError> {
    let user_id = params.user_id;
    let submission_id = params.submission_id;

    info!(
        "Fetching review feedback for user_id: {} submission_id: {}",
        user_id, submission_id
    );

    let profile_id = helper::run_query(&pool, move |conn| {
        helper::student_profile_id(conn, user_id)
    })
    .await?
    .ok_or_else(|| {
        error!("No student profile for user {}", user_id);
        AppError::NotFound(format!("No student profile for user ID {}.", user_id))
    })?;

    let ownership_result = helper::run_query(&pool, move |conn| {
        subs_dsl::submissions
            .filter(subs_dsl::id.eq(submission_id))
            .select((subs_dsl::student_id, subs_dsl::review_id))
            .first::<(i64, Option<i64>)>(conn)
    })
    .await;

    let (owner_id, review_id) = match ownership_result {
        Ok(row) => row,
        Err(AppError::DieselError(DieselError::NotFound)) => {
            error!("Submission with ID {} not found.", submission_id);
            return Err(AppError::NotFound(format!(
                "Submission with ID {} not found.",
                submission_id
            )));
        }
        Err(e) => return Err(e),
    };

    if owner_id != profile_id {
        warn!(
            "User {} requested feedback for submission {} owned by student profile {}",
            user_id, submission_id, owner_id
        );
        return Err(AppError::Forbidden(format!(
            "Submission with ID {} belongs to another student.",
            submission_id
        )));
    }

    let Some(review_id) = review_id else {
        info!("Submission {} has no review yet", submission_id);
        return Err(AppError::NotFound(format!(
            "Submission with ID {} has not been reviewed yet.",
            submission_id
        )));
    };

    type ReviewTuple = (String, String, Option<i32>, Option<i32>, DateTime<Utc>);

    let (status, comments, rating, time_spent_mins, reviewed_at) =
        helper::run_query(&pool, move |conn| {
            reviews_dsl::reviews
                .filter(reviews_dsl::id.eq(review_id))
                .select((
                    reviews_dsl::status,
                    reviews_dsl::comments,
                    reviews_dsl::rating,
                    reviews_dsl::time_spent_mins,
                    reviews_dsl::reviewed_at,
                ))
                .first::<ReviewTuple>(conn)
        })
        .await?;

    let status = ReviewStatus::parse(&status).ok_or_else(|| {
        error!("Review {} carries unknown status '{}'", review_id, status);
        AppError::Internal(anyhow!("Review {} carries an unknown status", review_id))
    })?;

    let improvement_rows = helper::run_query(&pool, move |conn| {
        si_dsl::student_improvements
            .filter(si_dsl::review_id.eq(review_id))
            .order(si_dsl::improvement_number.asc())
            .select((
                si_dsl::improvement_number,
                si_dsl::improvement_text,
                si_dsl::priority,
            ))
            .load::<(i32, String, String)>(conn)
    })
    .await?;

    let mut improvements = Vec::with_capacity(improvement_rows.len());
    for (number, text, priority) in improvement_rows {
        let priority = ImprovementPriority::parse(&priority).ok_or_else(|| {
            error!(
                "Improvement {} of review {} carries unknown priority '{}'",
                number, review_id, priority
            );
            AppError::Internal(anyhow!("Review {} carries an unknown priority", review_id))
        })?;
        improvements.push(ImprovementEntry {
            number,
            text,
            priority,
        });
    }

    info!(
        "Successfully fetched review feedback for submission {} ({} improvements)",
        submission_id,
        improvements.len()
    );
    Ok(ApiResponse::ok(ReviewFeedbackResponse {
        review_id,
        submission_id,
        status,
        comments,
        rating,
        time_spent_mins,
        reviewed_at,
        improvements,
    }))
}

/// Retrieves lesson metadata and its ordered step IDs.
///
/// Returns (wrapped in `ApiResponse`)
/// * `LessonDataResponse` (200 OK).
/// * `404 Not Found`: If the lesson does not exist.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool, params))]
pub async fn get_lesson_data(
    State(pool): State<Pool>,
    Query(params): Query<GetLessonDataParams>,
) -> Result<ApiResponse<LessonDataResponse>, AppError> {
    let lesson_id = params.lesson_id;
    info!("Fetching lesson data for lesson_id: {}", lesson_id);

    type LessonTuple = (i64, i64, i32, String);

    let lesson_result = helper::run_query(&pool, move |conn| {
        lessons_dsl::lessons
            .filter(lessons_dsl::id.eq(lesson_id))
            .select((
                lessons_dsl::id,
                lessons_dsl::course_id,
                lessons_dsl::order,
                lessons_dsl::title,
            ))
            .first::<LessonTuple>(conn)
    })
    .await;

    let (id, course_id, order, title) = match lesson_result {
        Ok(data) => data,
        Err(AppError::DieselError(DieselError::NotFound)) => {
            error!("Lesson with ID {} not found.", lesson_id);
            return Err(AppError::NotFound(format!(
                "Lesson with ID {} not found.",
                lesson_id
            )));
        }
        Err(e) => return Err(e),
    };

    let step_ids = helper::run_query(&pool, move |conn| {
        steps_dsl::steps
            .filter(steps_dsl::lesson_id.eq(lesson_id))
            .order(steps_dsl::order.asc())
            .select(steps_dsl::id)
            .load::<i64>(conn)
    })
    .await?;

    info!(
        "Successfully fetched lesson {} with {} steps",
        id,
        step_ids.len()
    );
    Ok(ApiResponse::ok(LessonDataResponse {
        lesson_id: id,
        course_id,
        order,
        title,
        step_ids,
    }))
}
