use super::helper;
use crate::errors::AppError;
use crate::guard::{self, GateCheck, QuotaMode};
use crate::model::review::{
    ImprovementEntry, NewReview, NewStudentImprovement, ReviewFormResponse, ReviewQueueEntry,
    ReviewStatus, ReviewerStatsResponse, SubmissionStatus,
};
use crate::notify::{self, ReviewNotification};
use crate::payloads::reviewer::{
    GetReviewFormParams, GetReviewQueueParams, GetReviewerStatsParams, SubmitReviewPayload,
};
use crate::response::ApiResponse;
use crate::schema::{
    courses::dsl as courses_dsl, lessons::dsl as lessons_dsl, reviewer_courses::dsl as rc_dsl,
    reviewer_profiles::dsl as rp_dsl, reviews::dsl as reviews_dsl,
    student_improvements::dsl as si_dsl, student_profiles::dsl as sp_dsl,
    submissions::dsl as subs_dsl, users::dsl as users_dsl,
};
use anyhow::anyhow;
use axum::extract::Query;
use axum::{extract::State, response::Json};
use chrono::{DateTime, Utc};
use deadpool_diesel::postgres::Pool;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::log::warn;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

const DEFAULT_QUEUE_LIMIT: i64 = 100;
const MAX_QUEUE_LIMIT: i64 = 500;

const REVIEWER_CHECKS: &[GateCheck] = &[
    GateCheck::RoleAllowed(guard::REVIEW_ROLES),
    GateCheck::ProfileActive,
];

const COURSE_CHECKS: &[GateCheck] = &[
    GateCheck::RoleAllowed(guard::REVIEW_ROLES),
    GateCheck::ProfileActive,
    GateCheck::CourseAuthorized,
];

const FORM_CHECKS: &[GateCheck] = &[
    GateCheck::RoleAllowed(guard::REVIEW_ROLES),
    GateCheck::ProfileActive,
    GateCheck::CourseAuthorized,
    GateCheck::DailyQuota(QuotaMode::WarnOnly),
];

const SUBMIT_CHECKS: &[GateCheck] = &[
    GateCheck::RoleAllowed(guard::REVIEW_ROLES),
    GateCheck::ProfileActive,
    GateCheck::CourseAuthorized,
    GateCheck::DailyQuota(QuotaMode::Enforce),
];

/// Retrieves pending submissions across the caller's authorized courses,
/// oldest first. An explicit `course_id` narrows the queue to that course
/// and must itself be authorized.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<ReviewQueueEntry>` (200 OK).
/// * `403 Forbidden`: If a gate check fails.
/// * `404 Not Found`: If the caller does not exist.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool, params))]
pub async fn get_review_queue(
    State(pool): State<Pool>,
    Query(params): Query<GetReviewQueueParams>,
) -> Result<ApiResponse<Vec<ReviewQueueEntry>>, AppError> {
    let user_id = params.user_id;
    let course_filter = params.course_id;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_QUEUE_LIMIT)
        .clamp(1, MAX_QUEUE_LIMIT);

    info!(
        "Fetching review queue for user_id: {}. Course filter: {:?}, limit: {}",
        user_id, course_filter, limit
    );
    debug!("Get review queue params: {:?}", params);

    let checks = if course_filter.is_some() {
        COURSE_CHECKS
    } else {
        REVIEWER_CHECKS
    };
    let (subject, _grant) = helper::check_review_access(&pool, user_id, course_filter, checks).await?;
    let profile_id = subject.profile_id().ok_or_else(|| {
        AppError::Internal(anyhow!("Review gate passed without a reviewer profile"))
    })?;

    let entries = helper::run_query(&pool, move |conn| {
        let base = subs_dsl::submissions
            .inner_join(lessons_dsl::lessons.on(subs_dsl::lesson_id.eq(lessons_dsl::id)))
            .filter(subs_dsl::status.eq(SubmissionStatus::Pending.as_str()));

        if let Some(course_id) = course_filter {
            base.filter(lessons_dsl::course_id.eq(course_id))
                .order(subs_dsl::submitted_at.asc())
                .limit(limit)
                .select((
                    subs_dsl::id,
                    subs_dsl::lesson_id,
                    lessons_dsl::course_id,
                    subs_dsl::student_id,
                    subs_dsl::work_url,
                    subs_dsl::submitted_at,
                ))
                .load::<ReviewQueueEntry>(conn)
        } else {
            base.filter(
                lessons_dsl::course_id.eq_any(
                    rc_dsl::reviewer_courses
                        .filter(rc_dsl::reviewer_id.eq(profile_id))
                        .select(rc_dsl::course_id),
                ),
            )
            .order(subs_dsl::submitted_at.asc())
            .limit(limit)
            .select((
                subs_dsl::id,
                subs_dsl::lesson_id,
                lessons_dsl::course_id,
                subs_dsl::student_id,
                subs_dsl::work_url,
                subs_dsl::submitted_at,
            ))
            .load::<ReviewQueueEntry>(conn)
        }
    })
    .await?;

    info!(
        "Successfully fetched {} queue entries for user_id: {}",
        entries.len(),
        user_id
    );
    Ok(ApiResponse::ok(entries))
}

/// Retrieves everything needed to review one submission: the work itself,
/// student contact and lesson/course context. Passes the quota check in
/// warn-only mode, so an exhausted reviewer can still look but learns that
/// submitting would be rejected.
///
/// Returns (wrapped in `ApiResponse`)
/// * `ReviewFormResponse` (200 OK).
/// * `403 Forbidden`: If a gate check fails.
/// * `404 Not Found`: If the caller or the submission does not exist.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool, params))]
pub async fn get_review_form(
    State(pool): State<Pool>,
    Query(params): Query<GetReviewFormParams>,
) -> Result<ApiResponse<ReviewFormResponse>, AppError> {
    let user_id = params.user_id;
    let submission_id = params.submission_id;

    info!(
        "Fetching review form for user_id: {} submission_id: {}",
        user_id, submission_id
    );

    let course_id = helper::run_query(&pool, move |conn| {
        helper::submission_course(conn, submission_id)
    })
    .await?
    .ok_or_else(|| {
        error!("Submission with ID {} not found.", submission_id);
        AppError::NotFound(format!("Submission with ID {} not found.", submission_id))
    })?;

    let (_subject, grant) =
        helper::check_review_access(&pool, user_id, Some(course_id), FORM_CHECKS).await?;
    let quota_warning = grant.warnings.first().cloned();

    type FormTuple = (i64, i64, String, DateTime<Utc>, i64, String, String, String);

    let form_result = helper::run_query(&pool, move |conn| {
        subs_dsl::submissions
            .inner_join(lessons_dsl::lessons.on(subs_dsl::lesson_id.eq(lessons_dsl::id)))
            .inner_join(courses_dsl::courses.on(lessons_dsl::course_id.eq(courses_dsl::id)))
            .inner_join(sp_dsl::student_profiles.on(subs_dsl::student_id.eq(sp_dsl::id)))
            .inner_join(users_dsl::users.on(sp_dsl::user_id.eq(users_dsl::id)))
            .filter(subs_dsl::id.eq(submission_id))
            .select((
                subs_dsl::id,
                subs_dsl::lesson_id,
                subs_dsl::work_url,
                subs_dsl::submitted_at,
                lessons_dsl::course_id,
                lessons_dsl::title,
                courses_dsl::title,
                users_dsl::email,
            ))
            .first::<FormTuple>(conn)
    })
    .await;

    match form_result {
        Ok((id, lesson_id, work_url, submitted_at, course_id, lesson_title, course_title, email)) => {
            info!("Successfully assembled review form for submission {}", id);
            Ok(ApiResponse::ok(ReviewFormResponse {
                submission_id: id,
                lesson_id,
                course_id,
                work_url,
                submitted_at,
                student_email: email,
                lesson_title,
                course_title,
                quota_warning,
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

/// Concludes the review of a pending submission: records the verdict,
/// flips the submission status, stores the numbered improvement list and
/// updates the reviewer's aggregates, all in one transaction. A student
/// notification is dispatched on a background task after commit.
///
/// Returns (wrapped in `ApiResponse`)
/// * review id as `i64` (201 Created).
/// * `403 Forbidden`: If a gate check fails (quota enforced here).
/// * `404 Not Found`: If the caller or the submission does not exist.
/// * `409 Conflict`: If the submission is no longer pending.
/// * `422 Unprocessable Entity`: If the verdict payload is inconsistent.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool, payload))]
pub async fn submit_review(
    State(pool): State<Pool>,
    Json(payload): Json<SubmitReviewPayload>,
) -> Result<ApiResponse<i64>, AppError> {
    let user_id = payload.user_id;
    let submission_id = payload.submission_id;
    let verdict = payload.status;

    info!(
        "Attempting review of submission {} by user {} with verdict '{}'",
        submission_id,
        user_id,
        verdict.as_str()
    );
    debug!("Submit review payload: {:?}", payload);

    if let Some(rating) = payload.rating {
        if !(1..=5).contains(&rating) {
            return Err(AppError::UnprocessableEntity(format!(
                "rating must be between 1 and 5, got {}",
                rating
            )));
        }
    }
    if let Some(time_spent) = payload.time_spent_mins {
        if time_spent < 0 {
            return Err(AppError::UnprocessableEntity(format!(
                "time_spent_mins must not be negative, got {}",
                time_spent
            )));
        }
    }
    match verdict {
        ReviewStatus::NeedsWork => {
            if payload.improvements.is_empty() {
                return Err(AppError::UnprocessableEntity(
                    "a needs_work review requires at least one improvement".to_string(),
                ));
            }
            if payload
                .improvements
                .iter()
                .any(|item| item.text.trim().is_empty())
            {
                return Err(AppError::UnprocessableEntity(
                    "improvement text must not be blank".to_string(),
                ));
            }
        }
        ReviewStatus::Approved => {
            if !payload.improvements.is_empty() {
                return Err(AppError::UnprocessableEntity(
                    "an approved review must not carry improvements".to_string(),
                ));
            }
        }
    }

    let course_id = helper::run_query(&pool, move |conn| {
        helper::submission_course(conn, submission_id)
    })
    .await?
    .ok_or_else(|| {
        error!("Submission with ID {} not found.", submission_id);
        AppError::NotFound(format!("Submission with ID {} not found.", submission_id))
    })?;

    // advisory pre-check; the authoritative quota count runs inside the
    // transaction below, under the profile row lock
    let (subject, _grant) =
        helper::check_review_access(&pool, user_id, Some(course_id), SUBMIT_CHECKS).await?;
    let profile_id = subject.profile_id().ok_or_else(|| {
        AppError::Internal(anyhow!("Review gate passed without a reviewer profile"))
    })?;

    let entries: Vec<ImprovementEntry> = payload
        .improvements
        .iter()
        .enumerate()
        .map(|(index, item)| ImprovementEntry {
            number: index as i32 + 1,
            text: item.text.trim().to_string(),
            priority: item.priority,
        })
        .collect();

    let comments = payload.comments.clone();
    let rating = payload.rating;
    let time_spent_mins = payload.time_spent_mins;
    let rows_to_insert = entries.clone();
    let since_midnight = guard::local_midnight_utc();

    type TxOutcome = (i64, String, String, String);

    let (review_id, student_email, lesson_title, course_title): TxOutcome =
        helper::run_transaction(&pool, move |conn| {
            // lock the reviewer row so concurrent reviews serialize on the
            // quota recount and the aggregate update
            let (total_reviews, average_review_time_mins, max_reviews_per_day) =
                rp_dsl::reviewer_profiles
                    .filter(rp_dsl::id.eq(profile_id))
                    .select((
                        rp_dsl::total_reviews,
                        rp_dsl::average_review_time_mins,
                        rp_dsl::max_reviews_per_day,
                    ))
                    .for_update()
                    .first::<(i32, Option<f64>, Option<i32>)>(conn)?;

            let reviews_today = reviews_dsl::reviews
                .filter(reviews_dsl::reviewer_id.eq(profile_id))
                .filter(reviews_dsl::reviewed_at.ge(since_midnight))
                .count()
                .get_result::<i64>(conn)?;

            if let Some(max) = max_reviews_per_day {
                if reviews_today >= i64::from(max) {
                    warn!(
                        "Reviewer profile {} hit the daily quota inside the transaction ({} of {})",
                        profile_id, reviews_today, max
                    );
                    return Err(AppError::Forbidden(format!(
                        "daily review quota reached ({} of {})",
                        reviews_today, max
                    )));
                }
            }

            let submission = subs_dsl::submissions
                .filter(subs_dsl::id.eq(submission_id))
                .select((subs_dsl::status, subs_dsl::student_id, subs_dsl::lesson_id))
                .first::<(String, i64, i64)>(conn)
                .optional()?;

            let (status, student_id, lesson_id) = match submission {
                Some(row) => row,
                None => {
                    return Err(AppError::NotFound(format!(
                        "Submission with ID {} not found.",
                        submission_id
                    )));
                }
            };

            if status != SubmissionStatus::Pending.as_str() {
                return Err(AppError::Conflict(format!(
                    "Submission with ID {} is no longer pending (status '{}').",
                    submission_id, status
                )));
            }

            let new_review = NewReview {
                submission_id,
                reviewer_id: profile_id,
                status: verdict.as_str().to_string(),
                comments,
                rating,
                time_spent_mins,
            };

            let review_id = diesel::insert_into(reviews_dsl::reviews)
                .values(&new_review)
                .returning(crate::schema::reviews::id)
                .get_result::<i64>(conn)
                .map_err(|e| {
                    if let DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) = e {
                        AppError::Conflict(format!(
                            "Submission with ID {} already has a review.",
                            submission_id
                        ))
                    } else {
                        AppError::DieselError(e)
                    }
                })?;

            // compare-and-set on the pending status; losing the race rolls
            // the review insert back with the transaction
            let rows_updated = diesel::update(
                subs_dsl::submissions
                    .filter(subs_dsl::id.eq(submission_id))
                    .filter(subs_dsl::status.eq(SubmissionStatus::Pending.as_str())),
            )
            .set((
                subs_dsl::status.eq(verdict.submission_status().as_str()),
                subs_dsl::reviewed_at.eq(diesel::dsl::now),
                subs_dsl::reviewed_by.eq(profile_id),
                subs_dsl::review_id.eq(review_id),
            ))
            .execute(conn)?;

            if rows_updated == 0 {
                return Err(AppError::Conflict(format!(
                    "Submission with ID {} was reviewed concurrently.",
                    submission_id
                )));
            }

            let improvement_rows: Vec<NewStudentImprovement> = rows_to_insert
                .iter()
                .map(|entry| NewStudentImprovement {
                    review_id,
                    submission_id,
                    improvement_number: entry.number,
                    improvement_text: entry.text.clone(),
                    priority: entry.priority.as_str().to_string(),
                })
                .collect();

            if !improvement_rows.is_empty() {
                diesel::insert_into(si_dsl::student_improvements)
                    .values(&improvement_rows)
                    .execute(conn)?;
            }

            let new_total = total_reviews + 1;
            // only timed reviews feed the average; the recount sees the review
            // inserted above
            let new_average = match time_spent_mins {
                Some(_) => {
                    let (timed_reviews, timed_mins) = reviews_dsl::reviews
                        .filter(reviews_dsl::reviewer_id.eq(profile_id))
                        .filter(reviews_dsl::time_spent_mins.is_not_null())
                        .select((
                            diesel::dsl::count_star(),
                            diesel::dsl::sum(reviews_dsl::time_spent_mins),
                        ))
                        .get_result::<(i64, Option<i64>)>(conn)?;
                    timed_mins.map(|mins| mins as f64 / timed_reviews as f64)
                }
                None => average_review_time_mins,
            };

            diesel::update(rp_dsl::reviewer_profiles.filter(rp_dsl::id.eq(profile_id)))
                .set((
                    rp_dsl::total_reviews.eq(new_total),
                    rp_dsl::average_review_time_mins.eq(new_average),
                ))
                .execute(conn)?;

            let (lesson_title, course_title) = lessons_dsl::lessons
                .inner_join(courses_dsl::courses.on(lessons_dsl::course_id.eq(courses_dsl::id)))
                .filter(lessons_dsl::id.eq(lesson_id))
                .select((lessons_dsl::title, courses_dsl::title))
                .first::<(String, String)>(conn)?;

            let student_email = sp_dsl::student_profiles
                .inner_join(users_dsl::users.on(sp_dsl::user_id.eq(users_dsl::id)))
                .filter(sp_dsl::id.eq(student_id))
                .select(users_dsl::email)
                .first::<String>(conn)?;

            Ok((review_id, student_email, lesson_title, course_title))
        })
        .await?;

    info!(
        "Review {} recorded for submission {} by reviewer profile {}",
        review_id, submission_id, profile_id
    );

    notify::spawn_dispatch(ReviewNotification {
        notification_id: Uuid::new_v4(),
        student_email,
        course_title,
        lesson_title,
        submission_id,
        verdict,
        comments: payload.comments,
        improvements: entries,
    });

    Ok(ApiResponse::created(review_id))
}

/// Retrieves the caller's review workload counters.
///
/// Returns (wrapped in `ApiResponse`)
/// * `ReviewerStatsResponse` (200 OK).
/// * `403 Forbidden`: If a gate check fails.
/// * `404 Not Found`: If the caller does not exist.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool, params))]
pub async fn get_reviewer_stats(
    State(pool): State<Pool>,
    Query(params): Query<GetReviewerStatsParams>,
) -> Result<ApiResponse<ReviewerStatsResponse>, AppError> {
    let user_id = params.user_id;
    info!("Fetching reviewer stats for user_id: {}", user_id);

    let (subject, _grant) =
        helper::check_review_access(&pool, user_id, None, REVIEWER_CHECKS).await?;
    let profile_id = subject.profile_id().ok_or_else(|| {
        AppError::Internal(anyhow!("Review gate passed without a reviewer profile"))
    })?;

    let (total_reviews, average_review_time_mins, max_reviews_per_day) =
        helper::run_query(&pool, move |conn| {
            rp_dsl::reviewer_profiles
                .filter(rp_dsl::id.eq(profile_id))
                .select((
                    rp_dsl::total_reviews,
                    rp_dsl::average_review_time_mins,
                    rp_dsl::max_reviews_per_day,
                ))
                .first::<(i32, Option<f64>, Option<i32>)>(conn)
        })
        .await?;

    info!(
        "Successfully fetched stats for reviewer profile {} ({} total reviews)",
        profile_id, total_reviews
    );
    Ok(ApiResponse::ok(ReviewerStatsResponse {
        total_reviews,
        average_review_time_mins,
        reviews_today: subject.reviews_today,
        max_reviews_per_day,
    }))
}
