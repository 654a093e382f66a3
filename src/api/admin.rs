use super::helper;
use crate::errors::AppError;
use crate::model::registry::{
    CreateUserResponse, NewReviewerCourse, NewRole, NewUser, RepairSummary, RoleKind,
};
use crate::model::review::{NewStudentImprovement, ReviewStatus};
use crate::payloads::admin::{
    AssignReviewerCoursePayload, AssignRolePayload, ConflictPolicy, CreateUserPayload,
    EnsureDefaultRolesPayload, RemoveReviewerCoursePayload, RepairProfilesPayload,
    ReplaceImprovementsPayload, SetReviewQuotaPayload, SetReviewerActivePayload,
};
use crate::response::ApiResponse;
use crate::schema::{
    reviewer_courses::dsl as rc_dsl, reviewer_profiles::dsl as rp_dsl,
    reviews::dsl as reviews_dsl, roles::dsl as roles_dsl,
    student_improvements::dsl as si_dsl, submissions::dsl as subs_dsl,
    users::dsl as users_dsl,
};
use anyhow::anyhow;
use axum::{extract::State, response::Json};
use deadpool_diesel::postgres::Pool;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::log::warn;
use tracing::{debug, error, info, instrument};

/// Roles that may manage users and run the profile repair sweep.
const USER_ADMIN_ROLES: &[RoleKind] = &[RoleKind::Admin];
/// Roles that may manage reviewer assignments, quotas and review content.
const REVIEWER_ADMIN_ROLES: &[RoleKind] = &[RoleKind::Admin, RoleKind::Manager];

/// Seeds the six canonical roles. Safe to run repeatedly; existing rows are
/// left untouched.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<i64>` of role IDs in canonical order (200 OK).
/// * `403 Forbidden` / `404 Not Found`: If the caller fails the admin check.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool, payload))]
pub async fn ensure_default_roles(
    State(pool): State<Pool>,
    Json(payload): Json<EnsureDefaultRolesPayload>,
) -> Result<ApiResponse<Vec<i64>>, AppError> {
    info!(
        "Ensuring default roles, requested by user {}",
        payload.requested_by
    );

    helper::check_admin_access(&pool, payload.requested_by, USER_ADMIN_ROLES).await?;

    let role_ids = helper::run_query(&pool, move |conn| {
        let new_roles: Vec<NewRole> = RoleKind::ALL
            .iter()
            .map(|role| NewRole {
                name: role.as_str().to_string(),
                description: role.description().to_string(),
            })
            .collect();

        diesel::insert_into(roles_dsl::roles)
            .values(&new_roles)
            .on_conflict(roles_dsl::name)
            .do_nothing()
            .execute(conn)?;

        let mut ids = Vec::with_capacity(RoleKind::ALL.len());
        for role in RoleKind::ALL {
            let id = roles_dsl::roles
                .filter(roles_dsl::name.eq(role.as_str()))
                .select(roles_dsl::id)
                .first::<i64>(conn)?;
            ids.push(id);
        }
        Ok(ids)
    })
    .await?;

    info!("Default roles present ({} ids)", role_ids.len());
    Ok(ApiResponse::ok(role_ids))
}

/// Creates a user and its role-matching profile in one transaction. The
/// role defaults to `student` when omitted.
///
/// Returns (wrapped in `ApiResponse`)
/// * `CreateUserResponse` with the user and profile IDs (201 Created).
/// * `403 Forbidden` / `404 Not Found`: If the caller fails the admin check or the role is not seeded.
/// * `409 Conflict`: If the email address is already registered.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool, payload))]
pub async fn create_user(
    State(pool): State<Pool>,
    Json(payload): Json<CreateUserPayload>,
) -> Result<ApiResponse<CreateUserResponse>, AppError> {
    let role = payload.role.unwrap_or(RoleKind::Student);

    info!(
        "Attempting to create user '{}' with role '{}', requested by user {}",
        payload.email,
        role.as_str(),
        payload.requested_by
    );
    debug!("Create user payload: {:?}", payload);

    helper::check_admin_access(&pool, payload.requested_by, USER_ADMIN_ROLES).await?;

    let email = payload.email.clone();
    let password_hash = payload.password_hash.clone();

    let response = helper::run_transaction(&pool, move |conn| {
        let role_id = roles_dsl::roles
            .filter(roles_dsl::name.eq(role.as_str()))
            .select(roles_dsl::id)
            .first::<i64>(conn)
            .optional()?;

        let Some(role_id) = role_id else {
            return Err(AppError::NotFound(format!(
                "Role '{}' is not seeded.",
                role.as_str()
            )));
        };

        let new_user = NewUser {
            email,
            password_hash,
            role_id: Some(role_id),
        };

        let user_id = diesel::insert_into(users_dsl::users)
            .values(&new_user)
            .returning(crate::schema::users::id)
            .get_result::<i64>(conn)
            .map_err(|e| {
                if let DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) = e {
                    AppError::Conflict("A user with this email already exists.".to_string())
                } else {
                    AppError::DieselError(e)
                }
            })?;

        let outcome = helper::provision_profile(conn, user_id, role)?;

        Ok(CreateUserResponse {
            user_id,
            profile_id: outcome.profile_id,
        })
    })
    .await?;

    info!(
        "Created user {} with {} profile {}",
        response.user_id,
        role.as_str(),
        response.profile_id
    );
    Ok(ApiResponse::created(response))
}

/// Moves a user to a different role. The profile for the new role is
/// provisioned afterwards as a repair measure; a provisioning failure is
/// logged but never blocks the role change. Profiles for previous roles are
/// kept.
///
/// Returns (wrapped in `ApiResponse`)
/// * `None` (200 OK).
/// * `403 Forbidden` / `404 Not Found`: If the caller fails the admin check, or the user or role is missing.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool, payload))]
pub async fn assign_role(
    State(pool): State<Pool>,
    Json(payload): Json<AssignRolePayload>,
) -> Result<ApiResponse<()>, AppError> {
    let user_id = payload.user_id;
    let role = payload.role;

    info!(
        "Assigning role '{}' to user {}, requested by user {}",
        role.as_str(),
        user_id,
        payload.requested_by
    );

    helper::check_admin_access(&pool, payload.requested_by, USER_ADMIN_ROLES).await?;

    let role_id = helper::run_query(&pool, move |conn| {
        roles_dsl::roles
            .filter(roles_dsl::name.eq(role.as_str()))
            .select(roles_dsl::id)
            .first::<i64>(conn)
            .optional()
    })
    .await?
    .ok_or_else(|| {
        error!("Role '{}' is not seeded.", role.as_str());
        AppError::NotFound(format!("Role '{}' is not seeded.", role.as_str()))
    })?;

    let rows_affected = helper::run_query(&pool, move |conn| {
        diesel::update(users_dsl::users.filter(users_dsl::id.eq(user_id)))
            .set(users_dsl::role_id.eq(role_id))
            .execute(conn)
    })
    .await?;

    match rows_affected {
        0 => {
            error!("User with ID {} not found.", user_id);
            return Err(AppError::NotFound(format!(
                "User with ID {} not found.",
                user_id
            )));
        }
        1 => info!("User {} now holds role '{}'", user_id, role.as_str()),
        n => {
            error!(
                "Expected 1 row to be affected by role update, but {} rows were affected for user_id: {}",
                n, user_id
            );
            return Err(AppError::Internal(anyhow!(format!(
                "Update affected {} rows, expected 1",
                n
            ))));
        }
    }

    let provision_result = helper::run_query(&pool, move |conn| {
        helper::provision_profile(conn, user_id, role)
    })
    .await;

    match provision_result {
        Ok(outcome) if outcome.created => info!(
            "Provisioned missing {} profile {} for user {}",
            role.as_str(),
            outcome.profile_id,
            user_id
        ),
        Ok(_) => debug!("User {} already had a {} profile", user_id, role.as_str()),
        Err(e) => warn!(
            "Role change for user {} succeeded, but profile provisioning failed: {:?}",
            user_id, e
        ),
    }

    Ok(ApiResponse::ok(()))
}

/// Reconciliation sweep: creates whichever role-matching profile is missing,
/// for one user or for everyone. Per-user failures are logged and counted,
/// never fatal.
///
/// Returns (wrapped in `ApiResponse`)
/// * `RepairSummary` with checked/repaired/failed counts (200 OK).
/// * `403 Forbidden` / `404 Not Found`: If the caller fails the admin check or the scoped user is missing.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool, payload))]
pub async fn repair_profiles(
    State(pool): State<Pool>,
    Json(payload): Json<RepairProfilesPayload>,
) -> Result<ApiResponse<RepairSummary>, AppError> {
    let target_user = payload.user_id;

    info!(
        "Running profile repair sweep. Target: {:?}, requested by user {}",
        target_user, payload.requested_by
    );

    helper::check_admin_access(&pool, payload.requested_by, USER_ADMIN_ROLES).await?;

    if let Some(user_id) = target_user {
        let exists = helper::run_query(&pool, move |conn| {
            diesel::dsl::select(diesel::dsl::exists(
                users_dsl::users.filter(users_dsl::id.eq(user_id)),
            ))
            .get_result::<bool>(conn)
        })
        .await?;

        if !exists {
            error!("User with ID {} not found.", user_id);
            return Err(AppError::NotFound(format!(
                "User with ID {} not found.",
                user_id
            )));
        }
    }

    let summary = helper::run_query(&pool, move |conn| {
        let targets: Vec<(i64, Option<String>)> = if let Some(user_id) = target_user {
            users_dsl::users
                .left_join(roles_dsl::roles.on(users_dsl::role_id.eq(roles_dsl::id.nullable())))
                .filter(users_dsl::id.eq(user_id))
                .select((users_dsl::id, roles_dsl::name.nullable()))
                .load::<(i64, Option<String>)>(conn)?
        } else {
            users_dsl::users
                .left_join(roles_dsl::roles.on(users_dsl::role_id.eq(roles_dsl::id.nullable())))
                .select((users_dsl::id, roles_dsl::name.nullable()))
                .load::<(i64, Option<String>)>(conn)?
        };

        let mut summary = RepairSummary {
            checked: 0,
            repaired: 0,
            failed: 0,
        };

        for (user_id, role_name) in targets {
            summary.checked += 1;
            // users without a role have no profile to repair
            let Some(role) = role_name.as_deref().and_then(RoleKind::parse) else {
                continue;
            };
            match helper::provision_profile(conn, user_id, role) {
                Ok(outcome) if outcome.created => {
                    info!(
                        "Repaired missing {} profile for user {}",
                        role.as_str(),
                        user_id
                    );
                    summary.repaired += 1;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        "Failed to provision {} profile for user {}: {:?}",
                        role.as_str(),
                        user_id,
                        e
                    );
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    })
    .await?;

    info!(
        "Profile repair sweep done: {} checked, {} repaired, {} failed",
        summary.checked, summary.repaired, summary.failed
    );
    Ok(ApiResponse::ok(summary))
}

/// Authorizes a reviewer for a course. The `on_conflict` policy decides
/// whether a duplicate grant is ignored or rejected.
///
/// Returns (wrapped in `ApiResponse`)
/// * `None` (200 OK).
/// * `403 Forbidden` / `404 Not Found`: If the caller fails the admin check, or the user has no reviewer profile, or the course is missing.
/// * `409 Conflict`: If the grant exists and the policy is `error`.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool, payload))]
pub async fn assign_reviewer_course(
    State(pool): State<Pool>,
    Json(payload): Json<AssignReviewerCoursePayload>,
) -> Result<ApiResponse<()>, AppError> {
    let user_id = payload.user_id;
    let course_id = payload.course_id;
    let policy = payload.on_conflict;

    info!(
        "Authorizing user {} for course {} (policy {:?}), requested by user {}",
        user_id, course_id, policy, payload.requested_by
    );

    helper::check_admin_access(&pool, payload.requested_by, REVIEWER_ADMIN_ROLES).await?;

    let profile_id = reviewer_profile_for_user(&pool, user_id).await?;

    let insert_result = helper::run_query(&pool, move |conn| {
        let grant = NewReviewerCourse {
            reviewer_id: profile_id,
            course_id,
        };
        match policy {
            ConflictPolicy::Ignore => diesel::insert_into(rc_dsl::reviewer_courses)
                .values(&grant)
                .on_conflict((rc_dsl::reviewer_id, rc_dsl::course_id))
                .do_nothing()
                .execute(conn),
            ConflictPolicy::Error => diesel::insert_into(rc_dsl::reviewer_courses)
                .values(&grant)
                .execute(conn),
        }
    })
    .await;

    match insert_result {
        Ok(_) => {
            info!(
                "Reviewer profile {} is authorized for course {}",
                profile_id, course_id
            );
            Ok(ApiResponse::ok(()))
        }
        Err(AppError::DieselError(DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            _,
        ))) => {
            warn!(
                "Reviewer profile {} is already authorized for course {}",
                profile_id, course_id
            );
            Err(AppError::Conflict(format!(
                "Reviewer is already authorized for course ID {}.",
                course_id
            )))
        }
        Err(AppError::DieselError(DieselError::DatabaseError(
            DatabaseErrorKind::ForeignKeyViolation,
            _,
        ))) => {
            error!("Course with ID {} not found.", course_id);
            Err(AppError::NotFound(format!(
                "Course with ID {} not found.",
                course_id
            )))
        }
        Err(e) => Err(e),
    }
}

/// Withdraws a reviewer's course authorization.
///
/// Returns (wrapped in `ApiResponse`)
/// * `None` (200 OK).
/// * `403 Forbidden` / `404 Not Found`: If the caller fails the admin check, the profile is missing, or the grant does not exist.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool, payload))]
pub async fn remove_reviewer_course(
    State(pool): State<Pool>,
    Json(payload): Json<RemoveReviewerCoursePayload>,
) -> Result<ApiResponse<()>, AppError> {
    let user_id = payload.user_id;
    let course_id = payload.course_id;

    info!(
        "Withdrawing course {} from user {}, requested by user {}",
        course_id, user_id, payload.requested_by
    );

    helper::check_admin_access(&pool, payload.requested_by, REVIEWER_ADMIN_ROLES).await?;

    let profile_id = reviewer_profile_for_user(&pool, user_id).await?;

    let rows_affected = helper::run_query(&pool, move |conn| {
        diesel::delete(
            rc_dsl::reviewer_courses
                .filter(rc_dsl::reviewer_id.eq(profile_id))
                .filter(rc_dsl::course_id.eq(course_id)),
        )
        .execute(conn)
    })
    .await?;

    if rows_affected == 0 {
        warn!(
            "Reviewer profile {} was not authorized for course {}",
            profile_id, course_id
        );
        return Err(AppError::NotFound(format!(
            "Reviewer is not authorized for course ID {}.",
            course_id
        )));
    }

    info!(
        "Withdrew course {} from reviewer profile {}",
        course_id, profile_id
    );
    Ok(ApiResponse::ok(()))
}

/// Sets or clears a reviewer's daily review cap.
///
/// Returns (wrapped in `ApiResponse`)
/// * `None` (200 OK).
/// * `403 Forbidden` / `404 Not Found`: If the caller fails the admin check or the user has no reviewer profile.
/// * `422 Unprocessable Entity`: If the cap is negative.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool, payload))]
pub async fn set_review_quota(
    State(pool): State<Pool>,
    Json(payload): Json<SetReviewQuotaPayload>,
) -> Result<ApiResponse<()>, AppError> {
    let user_id = payload.user_id;
    let quota = payload.max_reviews_per_day;

    info!(
        "Setting review quota {:?} for user {}, requested by user {}",
        quota, user_id, payload.requested_by
    );

    if let Some(max) = quota {
        if max < 0 {
            return Err(AppError::UnprocessableEntity(format!(
                "max_reviews_per_day must not be negative, got {}",
                max
            )));
        }
    }

    helper::check_admin_access(&pool, payload.requested_by, REVIEWER_ADMIN_ROLES).await?;

    let rows_affected = helper::run_query(&pool, move |conn| {
        diesel::update(rp_dsl::reviewer_profiles.filter(rp_dsl::user_id.eq(user_id)))
            .set(rp_dsl::max_reviews_per_day.eq(quota))
            .execute(conn)
    })
    .await?;

    match rows_affected {
        0 => {
            error!("No reviewer profile for user {}", user_id);
            Err(AppError::NotFound(format!(
                "No reviewer profile for user ID {}.",
                user_id
            )))
        }
        1 => {
            info!("Review quota for user {} is now {:?}", user_id, quota);
            Ok(ApiResponse::ok(()))
        }
        n => {
            error!(
                "Expected 1 row to be affected by quota update, but {} rows were affected for user_id: {}",
                n, user_id
            );
            Err(AppError::Internal(anyhow!(format!(
                "Update affected {} rows, expected 1",
                n
            ))))
        }
    }
}

/// Enables or disables a reviewer profile. A disabled reviewer is denied by
/// the access gate but keeps all data.
///
/// Returns (wrapped in `ApiResponse`)
/// * `None` (200 OK).
/// * `403 Forbidden` / `404 Not Found`: If the caller fails the admin check or the user has no reviewer profile.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool, payload))]
pub async fn set_reviewer_active(
    State(pool): State<Pool>,
    Json(payload): Json<SetReviewerActivePayload>,
) -> Result<ApiResponse<()>, AppError> {
    let user_id = payload.user_id;
    let is_active = payload.is_active;

    info!(
        "Setting reviewer active flag to {} for user {}, requested by user {}",
        is_active, user_id, payload.requested_by
    );

    helper::check_admin_access(&pool, payload.requested_by, REVIEWER_ADMIN_ROLES).await?;

    let rows_affected = helper::run_query(&pool, move |conn| {
        diesel::update(rp_dsl::reviewer_profiles.filter(rp_dsl::user_id.eq(user_id)))
            .set(rp_dsl::is_active.eq(is_active))
            .execute(conn)
    })
    .await?;

    match rows_affected {
        0 => {
            error!("No reviewer profile for user {}", user_id);
            Err(AppError::NotFound(format!(
                "No reviewer profile for user ID {}.",
                user_id
            )))
        }
        1 => {
            info!("Reviewer profile of user {} active = {}", user_id, is_active);
            Ok(ApiResponse::ok(()))
        }
        n => {
            error!(
                "Expected 1 row to be affected by active-flag update, but {} rows were affected for user_id: {}",
                n, user_id
            );
            Err(AppError::Internal(anyhow!(format!(
                "Update affected {} rows, expected 1",
                n
            ))))
        }
    }
}

/// Replaces the improvement list of a submission's review with a new
/// ordered list, atomically. Meant for correcting review content after the
/// fact.
///
/// Returns (wrapped in `ApiResponse`)
/// * number of improvements now on record as `i64` (200 OK).
/// * `403 Forbidden` / `404 Not Found`: If the caller fails the admin check, or the submission or its review is missing.
/// * `422 Unprocessable Entity`: If the list is empty or has blank text, or the review is not `needs_work`.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool, payload))]
pub async fn replace_improvements(
    State(pool): State<Pool>,
    Json(payload): Json<ReplaceImprovementsPayload>,
) -> Result<ApiResponse<i64>, AppError> {
    let submission_id = payload.submission_id;

    info!(
        "Replacing improvements for submission {}, requested by user {}",
        submission_id, payload.requested_by
    );
    debug!("Replace improvements payload: {:?}", payload);

    if payload.improvements.is_empty() {
        return Err(AppError::UnprocessableEntity(
            "the replacement list must contain at least one improvement".to_string(),
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

    helper::check_admin_access(&pool, payload.requested_by, REVIEWER_ADMIN_ROLES).await?;

    let items = payload.improvements;

    let inserted = helper::run_transaction(&pool, move |conn| {
        let review_id = subs_dsl::submissions
            .filter(subs_dsl::id.eq(submission_id))
            .select(subs_dsl::review_id)
            .first::<Option<i64>>(conn)
            .optional()?;

        let review_id = match review_id {
            Some(Some(review_id)) => review_id,
            Some(None) => {
                return Err(AppError::NotFound(format!(
                    "Submission with ID {} has no review.",
                    submission_id
                )));
            }
            None => {
                return Err(AppError::NotFound(format!(
                    "Submission with ID {} not found.",
                    submission_id
                )));
            }
        };

        let review_status = reviews_dsl::reviews
            .filter(reviews_dsl::id.eq(review_id))
            .select(reviews_dsl::status)
            .first::<String>(conn)?;

        if review_status != ReviewStatus::NeedsWork.as_str() {
            return Err(AppError::UnprocessableEntity(format!(
                "Review {} is '{}'; only needs_work reviews carry improvements.",
                review_id, review_status
            )));
        }

        diesel::delete(si_dsl::student_improvements.filter(si_dsl::review_id.eq(review_id)))
            .execute(conn)?;

        let rows: Vec<NewStudentImprovement> = items
            .iter()
            .enumerate()
            .map(|(index, item)| NewStudentImprovement {
                review_id,
                submission_id,
                improvement_number: index as i32 + 1,
                improvement_text: item.text.trim().to_string(),
                priority: item.priority.as_str().to_string(),
            })
            .collect();

        let inserted = diesel::insert_into(si_dsl::student_improvements)
            .values(&rows)
            .execute(conn)?;

        Ok(inserted as i64)
    })
    .await?;

    info!(
        "Submission {} now carries {} improvements",
        submission_id, inserted
    );
    Ok(ApiResponse::ok(inserted))
}

/// The reviewer profile behind a user id, or 404.
async fn reviewer_profile_for_user(pool: &Pool, user_id: i64) -> Result<i64, AppError> {
    helper::run_query(pool, move |conn| {
        rp_dsl::reviewer_profiles
            .filter(rp_dsl::user_id.eq(user_id))
            .select(rp_dsl::id)
            .first::<i64>(conn)
            .optional()
    })
    .await?
    .ok_or_else(|| {
        error!("No reviewer profile for user {}", user_id);
        AppError::NotFound(format!("No reviewer profile for user ID {}.", user_id))
    })
}
