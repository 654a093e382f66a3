use axum::http::StatusCode;
use school_review_server::model::registry::{CreateUserResponse, RepairSummary, RoleKind};
use school_review_server::model::review::{
    ImprovementPriority, ReviewFeedbackResponse, ReviewStatus,
};
use school_review_server::payloads::admin::{
    AssignReviewerCoursePayload, AssignRolePayload, ConflictPolicy, CreateUserPayload,
    EnsureDefaultRolesPayload, RemoveReviewerCoursePayload, RepairProfilesPayload,
    ReplaceImprovementsPayload, SetReviewQuotaPayload, SetReviewerActivePayload,
};
use school_review_server::payloads::reviewer::ImprovementItem;
use school_review_server::response::ApiResponse;
use serde_json::Value;

mod helpers;
use helpers::{
    authorize_course, count_improvements, create_test_course, create_test_improvement,
    create_test_lesson, create_test_review, create_test_reviewer, create_test_student,
    create_test_submission, create_test_user, make_superuser, mentor_profile_exists,
    reviewer_profile_id_for, role_id_of, seed_roles, setup_test_environment,
    student_profile_id_for, user_role_id,
};

// requested_by 0 is the system operator and bypasses the role check
const OPERATOR: i64 = 0;

// ensure_default_roles

#[tokio::test]
async fn test_ensure_default_roles_success_as_operator() {
    let (server, _pool) = setup_test_environment().await;

    let payload = EnsureDefaultRolesPayload {
        requested_by: OPERATOR,
    };
    let response = server
        .post("/admin/ensure_default_roles")
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ApiResponse<Vec<i64>> = response.json();
    assert_eq!(body.status_code, 200);
    let role_ids = body.data.expect("Expected seeded role ids");
    assert_eq!(role_ids.len(), 6);
}

#[tokio::test]
async fn test_ensure_default_roles_success_idempotent() {
    let (server, _pool) = setup_test_environment().await;

    let payload = EnsureDefaultRolesPayload {
        requested_by: OPERATOR,
    };
    let first: ApiResponse<Vec<i64>> = server
        .post("/admin/ensure_default_roles")
        .json(&payload)
        .await
        .json();
    let second: ApiResponse<Vec<i64>> = server
        .post("/admin/ensure_default_roles")
        .json(&payload)
        .await
        .json();

    assert_eq!(first.data.unwrap(), second.data.unwrap());
}

#[tokio::test]
async fn test_ensure_default_roles_success_superuser_caller() {
    let (server, pool) = setup_test_environment().await;
    let caller_id = 301;
    create_test_student(&pool, caller_id, "super_caller@test.com").await;
    make_superuser(&pool, caller_id).await;

    let payload = EnsureDefaultRolesPayload {
        requested_by: caller_id,
    };
    let response = server
        .post("/admin/ensure_default_roles")
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_ensure_default_roles_forbidden_non_admin_caller() {
    let (server, pool) = setup_test_environment().await;
    let caller_id = 302;
    create_test_student(&pool, caller_id, "plain_caller@test.com").await;

    let payload = EnsureDefaultRolesPayload {
        requested_by: caller_id,
    };
    let response = server
        .post("/admin/ensure_default_roles")
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    let body: ApiResponse<Value> = response.json();
    assert_eq!(body.status_code, 403);
    assert!(body
        .status_message
        .contains("Administrative privileges required."));
}

#[tokio::test]
async fn test_ensure_default_roles_not_found_unknown_caller() {
    let (server, _pool) = setup_test_environment().await;

    let payload = EnsureDefaultRolesPayload {
        requested_by: 99910,
    };
    let response = server
        .post("/admin/ensure_default_roles")
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: ApiResponse<Value> = response.json();
    assert_eq!(body.status_code, 404);
    assert!(body.status_message.contains("User with ID"));
}

// create_user

#[tokio::test]
async fn test_create_user_success_with_role() {
    let (server, pool) = setup_test_environment().await;
    seed_roles(&pool).await;

    let payload = CreateUserPayload {
        requested_by: OPERATOR,
        email: "new_reviewer@test.com".to_string(),
        password_hash: "bcrypt$placeholder".to_string(),
        role: Some(RoleKind::Reviewer),
    };
    let response = server.post("/admin/create_user").json(&payload).await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: ApiResponse<CreateUserResponse> = response.json();
    assert_eq!(body.status_code, 201);
    let data = body.data.expect("Expected created user data");
    assert!(data.user_id > 0);
    assert!(data.profile_id > 0);

    let reviewer_role_id = role_id_of(&pool, RoleKind::Reviewer).await;
    assert_eq!(user_role_id(&pool, data.user_id).await, Some(reviewer_role_id));
    assert_eq!(
        reviewer_profile_id_for(&pool, data.user_id).await,
        Some(data.profile_id)
    );
    // provisioning must add the reviewer profile and nothing else
    assert!(student_profile_id_for(&pool, data.user_id).await.is_none());
    assert!(!mentor_profile_exists(&pool, data.user_id).await);
}

#[tokio::test]
async fn test_create_user_success_defaults_to_student() {
    let (server, pool) = setup_test_environment().await;
    seed_roles(&pool).await;

    let payload = CreateUserPayload {
        requested_by: OPERATOR,
        email: "new_student@test.com".to_string(),
        password_hash: "bcrypt$placeholder".to_string(),
        role: None,
    };
    let response = server.post("/admin/create_user").json(&payload).await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: ApiResponse<CreateUserResponse> = response.json();
    let data = body.data.unwrap();
    let student_role_id = role_id_of(&pool, RoleKind::Student).await;
    assert_eq!(user_role_id(&pool, data.user_id).await, Some(student_role_id));
    assert_eq!(
        student_profile_id_for(&pool, data.user_id).await,
        Some(data.profile_id)
    );
}

#[tokio::test]
async fn test_create_user_conflict_duplicate_email() {
    let (server, pool) = setup_test_environment().await;
    seed_roles(&pool).await;

    let payload = CreateUserPayload {
        requested_by: OPERATOR,
        email: "taken@test.com".to_string(),
        password_hash: "bcrypt$placeholder".to_string(),
        role: None,
    };
    let first = server.post("/admin/create_user").json(&payload).await;
    assert_eq!(first.status_code(), StatusCode::CREATED);

    let second = server.post("/admin/create_user").json(&payload).await;

    assert_eq!(second.status_code(), StatusCode::CONFLICT);
    let body: ApiResponse<Value> = second.json();
    assert_eq!(body.status_code, 409);
    assert!(body
        .status_message
        .contains("A user with this email already exists."));
}

#[tokio::test]
async fn test_create_user_not_found_role_not_seeded() {
    let (server, _pool) = setup_test_environment().await;

    let payload = CreateUserPayload {
        requested_by: OPERATOR,
        email: "roleless@test.com".to_string(),
        password_hash: "bcrypt$placeholder".to_string(),
        role: Some(RoleKind::Reviewer),
    };
    let response = server.post("/admin/create_user").json(&payload).await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: ApiResponse<Value> = response.json();
    assert_eq!(body.status_code, 404);
    assert!(body.status_message.contains("is not seeded"));
}

#[tokio::test]
async fn test_create_user_forbidden_manager_caller() {
    let (server, pool) = setup_test_environment().await;
    let caller_id = 303;
    create_test_user(&pool, caller_id, "manager_caller@test.com", RoleKind::Manager).await;

    // user administration is admin-only; manager covers reviewer management
    let payload = CreateUserPayload {
        requested_by: caller_id,
        email: "blocked@test.com".to_string(),
        password_hash: "bcrypt$placeholder".to_string(),
        role: None,
    };
    let response = server.post("/admin/create_user").json(&payload).await;

    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    let body: ApiResponse<Value> = response.json();
    assert!(body
        .status_message
        .contains("Administrative privileges required."));
}

#[tokio::test]
async fn test_create_user_success_admin_caller() {
    let (server, pool) = setup_test_environment().await;
    seed_roles(&pool).await;
    let caller_id = 304;
    create_test_user(&pool, caller_id, "admin_caller@test.com", RoleKind::Admin).await;

    let payload = CreateUserPayload {
        requested_by: caller_id,
        email: "made_by_admin@test.com".to_string(),
        password_hash: "bcrypt$placeholder".to_string(),
        role: None,
    };
    let response = server.post("/admin/create_user").json(&payload).await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
}

// assign_role

#[tokio::test]
async fn test_assign_role_success_provisions_new_profile() {
    let (server, pool) = setup_test_environment().await;
    seed_roles(&pool).await;
    let user_id = 310;
    create_test_student(&pool, user_id, "promoted@test.com").await;

    let payload = AssignRolePayload {
        requested_by: OPERATOR,
        user_id,
        role: RoleKind::Reviewer,
    };
    let response = server.post("/admin/assign_role").json(&payload).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let reviewer_role_id = role_id_of(&pool, RoleKind::Reviewer).await;
    assert_eq!(user_role_id(&pool, user_id).await, Some(reviewer_role_id));
    assert!(reviewer_profile_id_for(&pool, user_id).await.is_some());
    // the old profile stays; provisioning only ever adds
    assert!(student_profile_id_for(&pool, user_id).await.is_some());
}

#[tokio::test]
async fn test_assign_role_success_mentor_profile() {
    let (server, pool) = setup_test_environment().await;
    seed_roles(&pool).await;
    let user_id = 311;
    create_test_student(&pool, user_id, "future_mentor@test.com").await;

    let payload = AssignRolePayload {
        requested_by: OPERATOR,
        user_id,
        role: RoleKind::Mentor,
    };
    let response = server.post("/admin/assign_role").json(&payload).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(mentor_profile_exists(&pool, user_id).await);
}

#[tokio::test]
async fn test_assign_role_not_found_unknown_user() {
    let (server, pool) = setup_test_environment().await;
    seed_roles(&pool).await;

    let payload = AssignRolePayload {
        requested_by: OPERATOR,
        user_id: 99911,
        role: RoleKind::Reviewer,
    };
    let response = server.post("/admin/assign_role").json(&payload).await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: ApiResponse<Value> = response.json();
    assert_eq!(body.status_code, 404);
    assert!(body.status_message.contains("User with ID 99911 not found."));
}

#[tokio::test]
async fn test_assign_role_not_found_role_not_seeded() {
    let (server, pool) = setup_test_environment().await;
    let user_id = 312;
    create_test_student(&pool, user_id, "stuck_student@test.com").await;

    let payload = AssignRolePayload {
        requested_by: OPERATOR,
        user_id,
        role: RoleKind::Mentor,
    };
    let response = server.post("/admin/assign_role").json(&payload).await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: ApiResponse<Value> = response.json();
    assert!(body.status_message.contains("is not seeded"));
}

// repair_profiles

#[tokio::test]
async fn test_repair_profiles_success_sweep() {
    let (server, pool) = setup_test_environment().await;
    let reviewer_user_id = 313;
    let student_user_id = 314;
    // users with a role but no profile row
    create_test_user(&pool, reviewer_user_id, "bare_reviewer@test.com", RoleKind::Reviewer).await;
    create_test_user(&pool, student_user_id, "bare_student@test.com", RoleKind::Student).await;

    let payload = RepairProfilesPayload {
        requested_by: OPERATOR,
        user_id: None,
    };
    let response = server.post("/admin/repair_profiles").json(&payload).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ApiResponse<RepairSummary> = response.json();
    let summary = body.data.expect("Expected repair summary");
    assert_eq!(summary.checked, 2);
    assert_eq!(summary.repaired, 2);
    assert_eq!(summary.failed, 0);
    assert!(reviewer_profile_id_for(&pool, reviewer_user_id).await.is_some());
    assert!(student_profile_id_for(&pool, student_user_id).await.is_some());
}

#[tokio::test]
async fn test_repair_profiles_success_scoped_to_one_user() {
    let (server, pool) = setup_test_environment().await;
    let target_user_id = 315;
    let other_user_id = 316;
    create_test_user(&pool, target_user_id, "target_user@test.com", RoleKind::Reviewer).await;
    create_test_user(&pool, other_user_id, "other_user@test.com", RoleKind::Reviewer).await;

    let payload = RepairProfilesPayload {
        requested_by: OPERATOR,
        user_id: Some(target_user_id),
    };
    let response = server.post("/admin/repair_profiles").json(&payload).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ApiResponse<RepairSummary> = response.json();
    let summary = body.data.unwrap();
    assert_eq!(summary.checked, 1);
    assert_eq!(summary.repaired, 1);
    assert!(reviewer_profile_id_for(&pool, target_user_id).await.is_some());
    assert!(reviewer_profile_id_for(&pool, other_user_id).await.is_none());
}

#[tokio::test]
async fn test_repair_profiles_success_intact_profile_untouched() {
    let (server, pool) = setup_test_environment().await;
    let user_id = 317;
    create_test_student(&pool, user_id, "intact_student@test.com").await;

    let payload = RepairProfilesPayload {
        requested_by: OPERATOR,
        user_id: Some(user_id),
    };
    let response = server.post("/admin/repair_profiles").json(&payload).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ApiResponse<RepairSummary> = response.json();
    let summary = body.data.unwrap();
    assert_eq!(summary.checked, 1);
    assert_eq!(summary.repaired, 0);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_repair_profiles_not_found_unknown_scoped_user() {
    let (server, _pool) = setup_test_environment().await;

    let payload = RepairProfilesPayload {
        requested_by: OPERATOR,
        user_id: Some(99912),
    };
    let response = server.post("/admin/repair_profiles").json(&payload).await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: ApiResponse<Value> = response.json();
    assert!(body.status_message.contains("User with ID 99912 not found."));
}

// assign_reviewer_course

#[tokio::test]
async fn test_assign_reviewer_course_success() {
    let (server, pool) = setup_test_environment().await;
    let reviewer_user_id = 320;
    create_test_reviewer(&pool, reviewer_user_id, "granted_reviewer@test.com").await;
    let course_id = create_test_course(&pool, "Grant Course").await;

    let payload = AssignReviewerCoursePayload {
        requested_by: OPERATOR,
        user_id: reviewer_user_id,
        course_id,
        on_conflict: ConflictPolicy::Ignore,
    };
    let response = server
        .post("/admin/assign_reviewer_course")
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);

    // the grant must satisfy the course gate on the reviewer side
    let queue = server
        .get(&format!(
            "/reviewer/get_review_queue?user_id={}&course_id={}",
            reviewer_user_id, course_id
        ))
        .await;
    assert_eq!(queue.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_assign_reviewer_course_success_duplicate_ignored() {
    let (server, pool) = setup_test_environment().await;
    let reviewer_user_id = 321;
    let reviewer_profile_id =
        create_test_reviewer(&pool, reviewer_user_id, "dup_reviewer@test.com").await;
    let course_id = create_test_course(&pool, "Duplicate Course").await;
    authorize_course(&pool, reviewer_profile_id, course_id).await;

    let payload = AssignReviewerCoursePayload {
        requested_by: OPERATOR,
        user_id: reviewer_user_id,
        course_id,
        on_conflict: ConflictPolicy::Ignore,
    };
    let response = server
        .post("/admin/assign_reviewer_course")
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_assign_reviewer_course_conflict_error_policy() {
    let (server, pool) = setup_test_environment().await;
    let reviewer_user_id = 322;
    let reviewer_profile_id =
        create_test_reviewer(&pool, reviewer_user_id, "strict_reviewer@test.com").await;
    let course_id = create_test_course(&pool, "Strict Course").await;
    authorize_course(&pool, reviewer_profile_id, course_id).await;

    let payload = AssignReviewerCoursePayload {
        requested_by: OPERATOR,
        user_id: reviewer_user_id,
        course_id,
        on_conflict: ConflictPolicy::Error,
    };
    let response = server
        .post("/admin/assign_reviewer_course")
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    let body: ApiResponse<Value> = response.json();
    assert_eq!(body.status_code, 409);
    assert!(body
        .status_message
        .contains("already authorized for course ID"));
}

#[tokio::test]
async fn test_assign_reviewer_course_not_found_no_profile() {
    let (server, pool) = setup_test_environment().await;
    let student_user_id = 323;
    create_test_student(&pool, student_user_id, "ungranted_student@test.com").await;
    let course_id = create_test_course(&pool, "No Profile Course").await;

    let payload = AssignReviewerCoursePayload {
        requested_by: OPERATOR,
        user_id: student_user_id,
        course_id,
        on_conflict: ConflictPolicy::Ignore,
    };
    let response = server
        .post("/admin/assign_reviewer_course")
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: ApiResponse<Value> = response.json();
    assert!(body
        .status_message
        .contains("No reviewer profile for user ID"));
}

#[tokio::test]
async fn test_assign_reviewer_course_not_found_unknown_course() {
    let (server, pool) = setup_test_environment().await;
    let reviewer_user_id = 324;
    create_test_reviewer(&pool, reviewer_user_id, "lost_reviewer@test.com").await;

    let payload = AssignReviewerCoursePayload {
        requested_by: OPERATOR,
        user_id: reviewer_user_id,
        course_id: 99913,
        on_conflict: ConflictPolicy::Ignore,
    };
    let response = server
        .post("/admin/assign_reviewer_course")
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: ApiResponse<Value> = response.json();
    assert!(body.status_message.contains("Course with ID 99913 not found."));
}

#[tokio::test]
async fn test_assign_reviewer_course_success_manager_caller() {
    let (server, pool) = setup_test_environment().await;
    let caller_id = 325;
    let reviewer_user_id = 326;
    create_test_user(&pool, caller_id, "course_manager@test.com", RoleKind::Manager).await;
    create_test_reviewer(&pool, reviewer_user_id, "managed_reviewer@test.com").await;
    let course_id = create_test_course(&pool, "Managed Course").await;

    let payload = AssignReviewerCoursePayload {
        requested_by: caller_id,
        user_id: reviewer_user_id,
        course_id,
        on_conflict: ConflictPolicy::Ignore,
    };
    let response = server
        .post("/admin/assign_reviewer_course")
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
}

// remove_reviewer_course

#[tokio::test]
async fn test_remove_reviewer_course_success() {
    let (server, pool) = setup_test_environment().await;
    let reviewer_user_id = 330;
    let reviewer_profile_id =
        create_test_reviewer(&pool, reviewer_user_id, "revoked_reviewer@test.com").await;
    let course_id = create_test_course(&pool, "Revoked Course").await;
    authorize_course(&pool, reviewer_profile_id, course_id).await;

    let payload = RemoveReviewerCoursePayload {
        requested_by: OPERATOR,
        user_id: reviewer_user_id,
        course_id,
    };
    let response = server
        .post("/admin/remove_reviewer_course")
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);

    let queue = server
        .get(&format!(
            "/reviewer/get_review_queue?user_id={}&course_id={}",
            reviewer_user_id, course_id
        ))
        .await;
    assert_eq!(queue.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_remove_reviewer_course_not_found_not_authorized() {
    let (server, pool) = setup_test_environment().await;
    let reviewer_user_id = 331;
    create_test_reviewer(&pool, reviewer_user_id, "never_granted@test.com").await;
    let course_id = create_test_course(&pool, "Never Granted Course").await;

    let payload = RemoveReviewerCoursePayload {
        requested_by: OPERATOR,
        user_id: reviewer_user_id,
        course_id,
    };
    let response = server
        .post("/admin/remove_reviewer_course")
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: ApiResponse<Value> = response.json();
    assert!(body
        .status_message
        .contains("Reviewer is not authorized for course ID"));
}

// set_review_quota

#[tokio::test]
async fn test_set_review_quota_success_set_and_clear() {
    let (server, pool) = setup_test_environment().await;
    let reviewer_user_id = 340;
    create_test_reviewer(&pool, reviewer_user_id, "quota_admin_reviewer@test.com").await;

    let set_payload = SetReviewQuotaPayload {
        requested_by: OPERATOR,
        user_id: reviewer_user_id,
        max_reviews_per_day: Some(3),
    };
    let set_response = server
        .post("/admin/set_review_quota")
        .json(&set_payload)
        .await;
    assert_eq!(set_response.status_code(), StatusCode::OK);

    let stats: ApiResponse<Value> = server
        .get(&format!(
            "/reviewer/get_reviewer_stats?user_id={}",
            reviewer_user_id
        ))
        .await
        .json();
    assert_eq!(stats.data.unwrap()["max_reviews_per_day"], 3);

    let clear_payload = SetReviewQuotaPayload {
        requested_by: OPERATOR,
        user_id: reviewer_user_id,
        max_reviews_per_day: None,
    };
    let clear_response = server
        .post("/admin/set_review_quota")
        .json(&clear_payload)
        .await;
    assert_eq!(clear_response.status_code(), StatusCode::OK);

    let stats: ApiResponse<Value> = server
        .get(&format!(
            "/reviewer/get_reviewer_stats?user_id={}",
            reviewer_user_id
        ))
        .await
        .json();
    assert!(stats.data.unwrap()["max_reviews_per_day"].is_null());
}

#[tokio::test]
async fn test_set_review_quota_unprocessable_negative() {
    let (server, pool) = setup_test_environment().await;
    let reviewer_user_id = 341;
    create_test_reviewer(&pool, reviewer_user_id, "negative_quota@test.com").await;

    let payload = SetReviewQuotaPayload {
        requested_by: OPERATOR,
        user_id: reviewer_user_id,
        max_reviews_per_day: Some(-1),
    };
    let response = server.post("/admin/set_review_quota").json(&payload).await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: ApiResponse<Value> = response.json();
    assert_eq!(body.status_code, 422);
    assert!(body.status_message.contains("must not be negative"));
}

#[tokio::test]
async fn test_set_review_quota_not_found_no_profile() {
    let (server, pool) = setup_test_environment().await;
    let student_user_id = 342;
    create_test_student(&pool, student_user_id, "quota_student_only@test.com").await;

    let payload = SetReviewQuotaPayload {
        requested_by: OPERATOR,
        user_id: student_user_id,
        max_reviews_per_day: Some(3),
    };
    let response = server.post("/admin/set_review_quota").json(&payload).await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: ApiResponse<Value> = response.json();
    assert!(body
        .status_message
        .contains("No reviewer profile for user ID"));
}

// set_reviewer_active

#[tokio::test]
async fn test_set_reviewer_active_success_toggles_gate() {
    let (server, pool) = setup_test_environment().await;
    let reviewer_user_id = 350;
    create_test_reviewer(&pool, reviewer_user_id, "toggled_reviewer@test.com").await;

    let disable_payload = SetReviewerActivePayload {
        requested_by: OPERATOR,
        user_id: reviewer_user_id,
        is_active: false,
    };
    let disable = server
        .post("/admin/set_reviewer_active")
        .json(&disable_payload)
        .await;
    assert_eq!(disable.status_code(), StatusCode::OK);

    let denied = server
        .get(&format!(
            "/reviewer/get_review_queue?user_id={}",
            reviewer_user_id
        ))
        .await;
    assert_eq!(denied.status_code(), StatusCode::FORBIDDEN);
    let body: ApiResponse<Value> = denied.json();
    assert!(body.status_message.contains("reviewer profile is disabled"));

    let enable_payload = SetReviewerActivePayload {
        requested_by: OPERATOR,
        user_id: reviewer_user_id,
        is_active: true,
    };
    let enable = server
        .post("/admin/set_reviewer_active")
        .json(&enable_payload)
        .await;
    assert_eq!(enable.status_code(), StatusCode::OK);

    let allowed = server
        .get(&format!(
            "/reviewer/get_review_queue?user_id={}",
            reviewer_user_id
        ))
        .await;
    assert_eq!(allowed.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_set_reviewer_active_not_found_no_profile() {
    let (server, pool) = setup_test_environment().await;
    let student_user_id = 351;
    create_test_student(&pool, student_user_id, "active_student_only@test.com").await;

    let payload = SetReviewerActivePayload {
        requested_by: OPERATOR,
        user_id: student_user_id,
        is_active: false,
    };
    let response = server
        .post("/admin/set_reviewer_active")
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: ApiResponse<Value> = response.json();
    assert!(body
        .status_message
        .contains("No reviewer profile for user ID"));
}

// replace_improvements

#[tokio::test]
async fn test_replace_improvements_success() {
    let (server, pool) = setup_test_environment().await;
    let reviewer_user_id = 360;
    let student_user_id = 361;
    let reviewer_profile_id =
        create_test_reviewer(&pool, reviewer_user_id, "ri_reviewer@test.com").await;
    let student_profile_id = create_test_student(&pool, student_user_id, "ri_student@test.com").await;
    let course_id = create_test_course(&pool, "RI Course").await;
    let lesson_id = create_test_lesson(&pool, course_id, 1, "RI Lesson").await;
    let submission_id = create_test_submission(&pool, student_profile_id, lesson_id).await;
    let review_id = create_test_review(
        &pool,
        submission_id,
        reviewer_profile_id,
        ReviewStatus::NeedsWork,
        Some(15),
    )
    .await;
    create_test_improvement(
        &pool,
        review_id,
        submission_id,
        1,
        "Outdated note",
        ImprovementPriority::Low,
    )
    .await;

    let payload = ReplaceImprovementsPayload {
        requested_by: OPERATOR,
        submission_id,
        improvements: vec![
            ImprovementItem {
                text: "Rework the data model".to_string(),
                priority: ImprovementPriority::High,
            },
            ImprovementItem {
                text: "Add a regression test".to_string(),
                priority: ImprovementPriority::Medium,
            },
            ImprovementItem {
                text: "Rename the helper module".to_string(),
                priority: ImprovementPriority::Low,
            },
        ],
    };
    let response = server
        .post("/admin/replace_improvements")
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ApiResponse<i64> = response.json();
    assert_eq!(body.data, Some(3));
    assert_eq!(count_improvements(&pool, review_id).await, 3);

    // the replacement list order becomes the numbering 1..N
    let feedback = server
        .get(&format!(
            "/student/get_review_feedback?user_id={}&submission_id={}",
            student_user_id, submission_id
        ))
        .await;
    assert_eq!(feedback.status_code(), StatusCode::OK);
    let feedback_body: ApiResponse<ReviewFeedbackResponse> = feedback.json();
    let improvements = feedback_body
        .data
        .expect("Expected feedback data")
        .improvements;
    assert_eq!(improvements.len(), 3);
    assert_eq!(improvements[0].number, 1);
    assert_eq!(improvements[0].text, "Rework the data model");
    assert_eq!(improvements[0].priority, ImprovementPriority::High);
    assert_eq!(improvements[1].number, 2);
    assert_eq!(improvements[1].text, "Add a regression test");
    assert_eq!(improvements[1].priority, ImprovementPriority::Medium);
    assert_eq!(improvements[2].number, 3);
    assert_eq!(improvements[2].text, "Rename the helper module");
    assert_eq!(improvements[2].priority, ImprovementPriority::Low);
}

#[tokio::test]
async fn test_replace_improvements_unprocessable_empty_list() {
    let (server, _pool) = setup_test_environment().await;

    let payload = ReplaceImprovementsPayload {
        requested_by: OPERATOR,
        submission_id: 1,
        improvements: vec![],
    };
    let response = server
        .post("/admin/replace_improvements")
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: ApiResponse<Value> = response.json();
    assert!(body
        .status_message
        .contains("must contain at least one improvement"));
}

#[tokio::test]
async fn test_replace_improvements_unprocessable_blank_text() {
    let (server, _pool) = setup_test_environment().await;

    let payload = ReplaceImprovementsPayload {
        requested_by: OPERATOR,
        submission_id: 1,
        improvements: vec![ImprovementItem {
            text: "   ".to_string(),
            priority: ImprovementPriority::High,
        }],
    };
    let response = server
        .post("/admin/replace_improvements")
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: ApiResponse<Value> = response.json();
    assert!(body.status_message.contains("must not be blank"));
}

#[tokio::test]
async fn test_replace_improvements_unprocessable_approved_review() {
    let (server, pool) = setup_test_environment().await;
    let reviewer_user_id = 362;
    let student_user_id = 363;
    let reviewer_profile_id =
        create_test_reviewer(&pool, reviewer_user_id, "ra_reviewer@test.com").await;
    let student_profile_id = create_test_student(&pool, student_user_id, "ra_student@test.com").await;
    let course_id = create_test_course(&pool, "RA Course").await;
    let lesson_id = create_test_lesson(&pool, course_id, 1, "RA Lesson").await;
    let submission_id = create_test_submission(&pool, student_profile_id, lesson_id).await;
    create_test_review(
        &pool,
        submission_id,
        reviewer_profile_id,
        ReviewStatus::Approved,
        None,
    )
    .await;

    let payload = ReplaceImprovementsPayload {
        requested_by: OPERATOR,
        submission_id,
        improvements: vec![ImprovementItem {
            text: "Pointless on an approved review".to_string(),
            priority: ImprovementPriority::Low,
        }],
    };
    let response = server
        .post("/admin/replace_improvements")
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: ApiResponse<Value> = response.json();
    assert!(body
        .status_message
        .contains("only needs_work reviews carry improvements"));
}

#[tokio::test]
async fn test_replace_improvements_not_found_unreviewed_submission() {
    let (server, pool) = setup_test_environment().await;
    let student_user_id = 364;
    let student_profile_id =
        create_test_student(&pool, student_user_id, "rn_student@test.com").await;
    let course_id = create_test_course(&pool, "RN Course").await;
    let lesson_id = create_test_lesson(&pool, course_id, 1, "RN Lesson").await;
    let submission_id = create_test_submission(&pool, student_profile_id, lesson_id).await;

    let payload = ReplaceImprovementsPayload {
        requested_by: OPERATOR,
        submission_id,
        improvements: vec![ImprovementItem {
            text: "Nothing to attach this to".to_string(),
            priority: ImprovementPriority::Medium,
        }],
    };
    let response = server
        .post("/admin/replace_improvements")
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: ApiResponse<Value> = response.json();
    assert!(body.status_message.contains("has no review"));
}

#[tokio::test]
async fn test_replace_improvements_not_found_unknown_submission() {
    let (server, _pool) = setup_test_environment().await;

    let payload = ReplaceImprovementsPayload {
        requested_by: OPERATOR,
        submission_id: 99914,
        improvements: vec![ImprovementItem {
            text: "No such submission".to_string(),
            priority: ImprovementPriority::Medium,
        }],
    };
    let response = server
        .post("/admin/replace_improvements")
        .json(&payload)
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: ApiResponse<Value> = response.json();
    assert!(body.status_message.contains("Submission with ID 99914 not found."));
}
