use crate::errors::AppError;
use crate::guard::{self, GateCheck, GateGrant, GateSubject, ReviewerGateProfile};
use crate::model::registry::{
    NewAdminProfile, NewManagerProfile, NewMentorProfile, NewReviewerProfile, NewStudentProfile,
    NewSupportProfile, ProvisionOutcome, RoleKind,
};
use crate::schema::{
    admin_profiles::dsl as ap_dsl, lessons::dsl as lessons_dsl, manager_profiles::dsl as mgp_dsl,
    mentor_profiles::dsl as mp_dsl, reviewer_courses::dsl as rc_dsl,
    reviewer_profiles::dsl as rp_dsl, reviews::dsl as reviews_dsl, roles::dsl as roles_dsl,
    student_profiles::dsl as sp_dsl, submissions::dsl as subs_dsl,
    support_profiles::dsl as sup_dsl, users::dsl as users_dsl,
};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use tracing::log::{debug, error};
use tracing::warn;

pub(super) async fn run_query<T, F>(
    pool: &deadpool_diesel::postgres::Pool,
    query: F,
) -> Result<T, AppError>
where
    F: FnOnce(&mut diesel::PgConnection) -> Result<T, diesel::result::Error> + Send + 'static,
    T: Send + 'static,
{
    let conn = pool.get().await.map_err(|pool_err| {
        error!(
            "Failed to get DB connection object from pool: {:?}",
            pool_err
        );
        AppError::PoolError(pool_err)
    })?;
    debug!("DB connection object obtained from pool for interaction");

    let res = conn.interact(query).await;

    match res {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(diesel_err)) => {
            error!("Diesel query failed within interaction: {:?}", diesel_err);
            Err(AppError::DieselError(diesel_err))
        }
        Err(interact_err) => {
            error!("Deadpool interact error: {:?}", interact_err);
            Err(AppError::InteractError(interact_err))
        }
    }
}

/// Runs `steps` inside a single database transaction. An `Err` return rolls
/// everything back, so multi-row writes are all-or-nothing.
pub(super) async fn run_transaction<T, F>(
    pool: &deadpool_diesel::postgres::Pool,
    steps: F,
) -> Result<T, AppError>
where
    F: FnOnce(&mut diesel::PgConnection) -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    let conn = pool.get().await.map_err(|pool_err| {
        error!(
            "Failed to get DB connection object from pool: {:?}",
            pool_err
        );
        AppError::PoolError(pool_err)
    })?;
    debug!("DB connection object obtained from pool for transaction");

    let res = conn
        .interact(move |conn_sync| conn_sync.transaction(steps))
        .await;

    match res {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(app_err)) => Err(app_err),
        Err(interact_err) => {
            error!("Deadpool interact error during transaction: {:?}", interact_err);
            Err(AppError::InteractError(interact_err))
        }
    }
}

/// Loads everything the access gate needs to know about one caller in a
/// single interaction: role, reviewer profile, course authorization (when a
/// course context applies) and today's review count.
///
/// Returns `DieselError::NotFound` when the user row itself is missing.
pub(super) fn load_gate_subject(
    conn: &mut PgConnection,
    user_id: i64,
    course_id: Option<i64>,
) -> Result<GateSubject, DieselError> {
    let role_id = users_dsl::users
        .filter(users_dsl::id.eq(user_id))
        .select(users_dsl::role_id)
        .first::<Option<i64>>(conn)?;

    let role = match role_id {
        Some(role_id) => roles_dsl::roles
            .filter(roles_dsl::id.eq(role_id))
            .select(roles_dsl::name)
            .first::<String>(conn)
            .optional()?
            .and_then(|name| RoleKind::parse(&name)),
        None => None,
    };

    let profile = rp_dsl::reviewer_profiles
        .filter(rp_dsl::user_id.eq(user_id))
        .select((rp_dsl::id, rp_dsl::is_active, rp_dsl::max_reviews_per_day))
        .first::<(i64, bool, Option<i32>)>(conn)
        .optional()?
        .map(|(profile_id, is_active, max_reviews_per_day)| ReviewerGateProfile {
            profile_id,
            is_active,
            max_reviews_per_day,
        });

    let course_authorized = match (course_id, &profile) {
        (Some(course_id), Some(profile)) => diesel::dsl::select(diesel::dsl::exists(
            rc_dsl::reviewer_courses
                .filter(rc_dsl::reviewer_id.eq(profile.profile_id))
                .filter(rc_dsl::course_id.eq(course_id)),
        ))
        .get_result::<bool>(conn)?,
        // no course context means nothing to authorize against
        _ => course_id.is_none(),
    };

    let reviews_today = match &profile {
        Some(profile) => reviews_dsl::reviews
            .filter(reviews_dsl::reviewer_id.eq(profile.profile_id))
            .filter(reviews_dsl::reviewed_at.ge(guard::local_midnight_utc()))
            .count()
            .get_result::<i64>(conn)?,
        None => 0,
    };

    Ok(GateSubject {
        user_id,
        role,
        profile,
        course_authorized,
        reviews_today,
    })
}

/// Loads the gate subject for `user_id` and runs `checks` against it.
/// Denials become 403s with the failing check's reason; grant warnings are
/// logged and passed through for the handler to surface.
pub(super) async fn check_review_access(
    pool: &deadpool_diesel::postgres::Pool,
    user_id: i64,
    course_id: Option<i64>,
    checks: &[GateCheck],
) -> Result<(GateSubject, GateGrant), AppError> {
    let subject =
        match run_query(pool, move |conn| load_gate_subject(conn, user_id, course_id)).await {
            Ok(subject) => subject,
            Err(AppError::DieselError(DieselError::NotFound)) => {
                warn!("Review access check for unknown user {}", user_id);
                return Err(AppError::NotFound(format!(
                    "User with ID {} not found.",
                    user_id
                )));
            }
            Err(e) => return Err(e),
        };

    match guard::run_gate(&subject, checks) {
        Ok(grant) => {
            for warning in &grant.warnings {
                warn!(
                    "User {} passed the review gate with a warning: {}",
                    user_id, warning
                );
            }
            Ok((subject, grant))
        }
        Err(denial) => {
            warn!(
                "User {} denied by the '{}' gate check: {}",
                user_id, denial.check, denial.reason
            );
            Err(AppError::Forbidden(denial.reason))
        }
    }
}

/// Verifies that `requested_by` may perform an administrative call. User id
/// 0 is the system operator and always passes; everyone else needs one of
/// `allowed` roles or the superuser flag.
pub(super) async fn check_admin_access(
    pool: &deadpool_diesel::postgres::Pool,
    requested_by: i64,
    allowed: &'static [RoleKind],
) -> Result<(), AppError> {
    if requested_by == 0 {
        debug!("Administrative call from the system operator");
        return Ok(());
    }

    let row = match run_query(pool, move |conn| {
        users_dsl::users
            .filter(users_dsl::id.eq(requested_by))
            .select((users_dsl::role_id, users_dsl::is_superuser))
            .first::<(Option<i64>, bool)>(conn)
    })
    .await
    {
        Ok(row) => row,
        Err(AppError::DieselError(DieselError::NotFound)) => {
            warn!("Administrative call from unknown user {}", requested_by);
            return Err(AppError::NotFound(format!(
                "User with ID {} not found.",
                requested_by
            )));
        }
        Err(e) => return Err(e),
    };

    let (role_id, is_superuser) = row;
    if is_superuser {
        return Ok(());
    }

    let role = match role_id {
        Some(role_id) => run_query(pool, move |conn| {
            roles_dsl::roles
                .filter(roles_dsl::id.eq(role_id))
                .select(roles_dsl::name)
                .first::<String>(conn)
                .optional()
        })
        .await?
        .and_then(|name| RoleKind::parse(&name)),
        None => None,
    };

    match role {
        Some(role) if allowed.contains(&role) => Ok(()),
        _ => {
            warn!(
                "User {} lacks the role required for this administrative call",
                requested_by
            );
            Err(AppError::Forbidden(
                "Administrative privileges required.".to_string(),
            ))
        }
    }
}

/// Creates the profile row matching `role` for `user_id` unless one already
/// exists. `ON CONFLICT DO NOTHING` keeps concurrent provisioning safe; the
/// follow-up select reports the surviving row either way.
pub(super) fn provision_profile(
    conn: &mut PgConnection,
    user_id: i64,
    role: RoleKind,
) -> Result<ProvisionOutcome, DieselError> {
    match role {
        RoleKind::Student => {
            let inserted = diesel::insert_into(sp_dsl::student_profiles)
                .values(&NewStudentProfile { user_id })
                .on_conflict(sp_dsl::user_id)
                .do_nothing()
                .execute(conn)?;
            let profile_id = sp_dsl::student_profiles
                .filter(sp_dsl::user_id.eq(user_id))
                .select(sp_dsl::id)
                .first::<i64>(conn)?;
            Ok(ProvisionOutcome {
                profile_id,
                created: inserted == 1,
            })
        }
        RoleKind::Reviewer => {
            let inserted = diesel::insert_into(rp_dsl::reviewer_profiles)
                .values(&NewReviewerProfile { user_id })
                .on_conflict(rp_dsl::user_id)
                .do_nothing()
                .execute(conn)?;
            let profile_id = rp_dsl::reviewer_profiles
                .filter(rp_dsl::user_id.eq(user_id))
                .select(rp_dsl::id)
                .first::<i64>(conn)?;
            Ok(ProvisionOutcome {
                profile_id,
                created: inserted == 1,
            })
        }
        RoleKind::Mentor => {
            let inserted = diesel::insert_into(mp_dsl::mentor_profiles)
                .values(&NewMentorProfile { user_id })
                .on_conflict(mp_dsl::user_id)
                .do_nothing()
                .execute(conn)?;
            let profile_id = mp_dsl::mentor_profiles
                .filter(mp_dsl::user_id.eq(user_id))
                .select(mp_dsl::id)
                .first::<i64>(conn)?;
            Ok(ProvisionOutcome {
                profile_id,
                created: inserted == 1,
            })
        }
        RoleKind::Manager => {
            let inserted = diesel::insert_into(mgp_dsl::manager_profiles)
                .values(&NewManagerProfile { user_id })
                .on_conflict(mgp_dsl::user_id)
                .do_nothing()
                .execute(conn)?;
            let profile_id = mgp_dsl::manager_profiles
                .filter(mgp_dsl::user_id.eq(user_id))
                .select(mgp_dsl::id)
                .first::<i64>(conn)?;
            Ok(ProvisionOutcome {
                profile_id,
                created: inserted == 1,
            })
        }
        RoleKind::Admin => {
            let inserted = diesel::insert_into(ap_dsl::admin_profiles)
                .values(&NewAdminProfile { user_id })
                .on_conflict(ap_dsl::user_id)
                .do_nothing()
                .execute(conn)?;
            let profile_id = ap_dsl::admin_profiles
                .filter(ap_dsl::user_id.eq(user_id))
                .select(ap_dsl::id)
                .first::<i64>(conn)?;
            Ok(ProvisionOutcome {
                profile_id,
                created: inserted == 1,
            })
        }
        RoleKind::Support => {
            let inserted = diesel::insert_into(sup_dsl::support_profiles)
                .values(&NewSupportProfile { user_id })
                .on_conflict(sup_dsl::user_id)
                .do_nothing()
                .execute(conn)?;
            let profile_id = sup_dsl::support_profiles
                .filter(sup_dsl::user_id.eq(user_id))
                .select(sup_dsl::id)
                .first::<i64>(conn)?;
            Ok(ProvisionOutcome {
                profile_id,
                created: inserted == 1,
            })
        }
    }
}

/// The student profile behind a user id, if the user has one.
pub(super) fn student_profile_id(
    conn: &mut PgConnection,
    user_id: i64,
) -> Result<Option<i64>, DieselError> {
    sp_dsl::student_profiles
        .filter(sp_dsl::user_id.eq(user_id))
        .select(sp_dsl::id)
        .first::<i64>(conn)
        .optional()
}

/// The course a submission belongs to, via its lesson.
pub(super) fn submission_course(
    conn: &mut PgConnection,
    submission_id: i64,
) -> Result<Option<i64>, DieselError> {
    subs_dsl::submissions
        .inner_join(lessons_dsl::lessons.on(subs_dsl::lesson_id.eq(lessons_dsl::id)))
        .filter(subs_dsl::id.eq(submission_id))
        .select(lessons_dsl::course_id)
        .first::<i64>(conn)
        .optional()
}
