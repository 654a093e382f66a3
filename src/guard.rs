//! Access gate for the review endpoints. Handlers load a [`GateSubject`]
//! from the database, then run an ordered list of checks against it; the
//! first failing check denies the request and no later check runs.

use crate::model::registry::RoleKind;
use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};

/// Roles allowed through the review gate.
pub const REVIEW_ROLES: &[RoleKind] = &[RoleKind::Reviewer, RoleKind::Mentor];

/// Everything the checks need to know about the caller, loaded up front so
/// the gate itself stays free of database access.
#[derive(Debug)]
pub struct GateSubject {
    pub user_id: i64,
    pub role: Option<RoleKind>,
    pub profile: Option<ReviewerGateProfile>,
    pub course_authorized: bool,
    pub reviews_today: i64,
}

#[derive(Debug)]
pub struct ReviewerGateProfile {
    pub profile_id: i64,
    pub is_active: bool,
    pub max_reviews_per_day: Option<i32>,
}

impl GateSubject {
    pub fn profile_id(&self) -> Option<i64> {
        self.profile.as_ref().map(|profile| profile.profile_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaMode {
    /// Reject the request once the daily quota is reached (write paths).
    Enforce,
    /// Let the request through but attach a warning (read paths).
    WarnOnly,
}

#[derive(Debug, Clone, Copy)]
pub enum GateCheck {
    RoleAllowed(&'static [RoleKind]),
    ProfileActive,
    CourseAuthorized,
    DailyQuota(QuotaMode),
}

enum CheckOutcome {
    Pass,
    Warn(String),
    Fail(String),
}

impl GateCheck {
    fn name(&self) -> &'static str {
        match self {
            GateCheck::RoleAllowed(_) => "role",
            GateCheck::ProfileActive => "profile",
            GateCheck::CourseAuthorized => "course",
            GateCheck::DailyQuota(_) => "quota",
        }
    }

    fn evaluate(&self, subject: &GateSubject) -> CheckOutcome {
        match self {
            GateCheck::RoleAllowed(allowed) => match subject.role {
                Some(role) if allowed.contains(&role) => CheckOutcome::Pass,
                Some(role) => CheckOutcome::Fail(format!(
                    "role '{}' may not review submissions",
                    role.as_str()
                )),
                None => CheckOutcome::Fail("no role assigned".to_string()),
            },
            GateCheck::ProfileActive => match &subject.profile {
                Some(profile) if profile.is_active => CheckOutcome::Pass,
                Some(_) => CheckOutcome::Fail("reviewer profile is disabled".to_string()),
                None => CheckOutcome::Fail("no reviewer profile".to_string()),
            },
            GateCheck::CourseAuthorized => {
                if subject.course_authorized {
                    CheckOutcome::Pass
                } else {
                    CheckOutcome::Fail("reviewer is not assigned to this course".to_string())
                }
            }
            GateCheck::DailyQuota(mode) => {
                let Some(profile) = &subject.profile else {
                    return CheckOutcome::Fail("no reviewer profile".to_string());
                };
                match profile.max_reviews_per_day {
                    Some(max) if subject.reviews_today >= i64::from(max) => {
                        let message = format!(
                            "daily review quota reached ({} of {})",
                            subject.reviews_today, max
                        );
                        match mode {
                            QuotaMode::Enforce => CheckOutcome::Fail(message),
                            QuotaMode::WarnOnly => CheckOutcome::Warn(message),
                        }
                    }
                    // no cap configured, or still below it
                    _ => CheckOutcome::Pass,
                }
            }
        }
    }
}

/// Granted access, possibly with warnings to surface to the caller.
#[derive(Debug)]
pub struct GateGrant {
    pub warnings: Vec<String>,
}

/// A failed check: which one, and a reason fit for the response body.
#[derive(Debug)]
pub struct GateDenial {
    pub check: &'static str,
    pub reason: String,
}

pub fn run_gate(subject: &GateSubject, checks: &[GateCheck]) -> Result<GateGrant, GateDenial> {
    let mut warnings = Vec::new();
    for check in checks {
        match check.evaluate(subject) {
            CheckOutcome::Pass => {}
            CheckOutcome::Warn(message) => warnings.push(message),
            CheckOutcome::Fail(reason) => {
                return Err(GateDenial {
                    check: check.name(),
                    reason,
                });
            }
        }
    }
    Ok(GateGrant { warnings })
}

/// Start of the current day in the server's local timezone, as a UTC instant.
/// Reviews at or after this instant count against today's quota.
pub fn local_midnight_utc() -> DateTime<Utc> {
    let midnight = Local::now().date_naive().and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight).earliest() {
        Some(start) => start.with_timezone(&Utc),
        // midnight erased by a DST transition; treat the naive value as UTC
        None => Utc.from_utc_datetime(&midnight),
    }
}
