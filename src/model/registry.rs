use crate::schema::admin_profiles;
use crate::schema::manager_profiles;
use crate::schema::mentor_profiles;
use crate::schema::reviewer_courses;
use crate::schema::reviewer_profiles;
use crate::schema::roles;
use crate::schema::student_profiles;
use crate::schema::support_profiles;
use crate::schema::users;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// The closed set of roles a user can hold. Stored in the `roles` table by
/// canonical name; parsed into this enum once at the boundary and matched on
/// as a tagged variant everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    Student,
    Reviewer,
    Mentor,
    Manager,
    Admin,
    Support,
}

impl RoleKind {
    pub const ALL: [RoleKind; 6] = [
        RoleKind::Student,
        RoleKind::Reviewer,
        RoleKind::Mentor,
        RoleKind::Manager,
        RoleKind::Admin,
        RoleKind::Support,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKind::Student => "student",
            RoleKind::Reviewer => "reviewer",
            RoleKind::Mentor => "mentor",
            RoleKind::Manager => "manager",
            RoleKind::Admin => "admin",
            RoleKind::Support => "support",
        }
    }

    /// Human-readable description seeded into the `roles` table.
    pub fn description(&self) -> &'static str {
        match self {
            RoleKind::Student => "Learns on the platform and submits lesson work for review.",
            RoleKind::Reviewer => "Evaluates student submissions and writes improvement feedback.",
            RoleKind::Mentor => "Guides students through a course and may review their work.",
            RoleKind::Manager => "Coordinates courses and reviewer workload.",
            RoleKind::Admin => "Full administrative access to the platform.",
            RoleKind::Support => "Handles support requests from students.",
        }
    }

    pub fn parse(name: &str) -> Option<RoleKind> {
        match name {
            "student" => Some(RoleKind::Student),
            "reviewer" => Some(RoleKind::Reviewer),
            "mentor" => Some(RoleKind::Mentor),
            "manager" => Some(RoleKind::Manager),
            "admin" => Some(RoleKind::Admin),
            "support" => Some(RoleKind::Support),
            _ => None,
        }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = roles)]
pub struct NewRole {
    pub name: String,
    pub description: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role_id: Option<i64>,
    // is_active defaults to true; is_staff, is_superuser and email_verified
    // default to false; created_at and updated_at have DB defaults
}

#[derive(Insertable, Debug)]
#[diesel(table_name = student_profiles)]
pub struct NewStudentProfile {
    pub user_id: i64,
    // bio defaults to '', is_active to true, created_at to CURRENT_TIMESTAMP
}

#[derive(Insertable, Debug)]
#[diesel(table_name = reviewer_profiles)]
pub struct NewReviewerProfile {
    pub user_id: i64,
    // bio/is_active/created_at as for students; total_reviews defaults to 0,
    // average_review_time_mins and max_reviews_per_day to NULL (unlimited)
}

#[derive(Insertable, Debug)]
#[diesel(table_name = mentor_profiles)]
pub struct NewMentorProfile {
    pub user_id: i64,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = manager_profiles)]
pub struct NewManagerProfile {
    pub user_id: i64,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = admin_profiles)]
pub struct NewAdminProfile {
    pub user_id: i64,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = support_profiles)]
pub struct NewSupportProfile {
    pub user_id: i64,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = reviewer_courses)]
pub struct NewReviewerCourse {
    pub reviewer_id: i64,
    pub course_id: i64,
}

/// Result of running the profile factory for one user.
#[derive(Debug, Clone, Copy)]
pub struct ProvisionOutcome {
    pub profile_id: i64,
    pub created: bool,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct CreateUserResponse {
    pub user_id: i64,
    pub profile_id: i64,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct RepairSummary {
    pub checked: i64,
    pub repaired: i64,
    pub failed: i64,
}
