//! Outbound notifications for concluded reviews. Delivery happens on a
//! background task after the review transaction commits, so a slow or
//! failing channel never delays the API response.

use crate::model::review::{ImprovementEntry, ReviewStatus};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const DELIVERY_ATTEMPTS: u32 = 3;
pub const RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Everything the student needs to hear about a finished review. The
/// `notification_id` makes redelivery idempotent for channels that care.
#[derive(Serialize, Debug, Clone)]
pub struct ReviewNotification {
    pub notification_id: Uuid,
    pub student_email: String,
    pub course_title: String,
    pub lesson_title: String,
    pub submission_id: i64,
    pub verdict: ReviewStatus,
    pub comments: String,
    pub improvements: Vec<ImprovementEntry>,
}

/// A delivery channel. Implementations must be safe to retry with the same
/// notification.
pub trait NotificationSink {
    fn deliver(
        &self,
        notification: &ReviewNotification,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Default sink: writes the rendered notification to the log. Stands in for
/// a mail or chat integration.
pub struct LogSink;

impl NotificationSink for LogSink {
    async fn deliver(&self, notification: &ReviewNotification) -> anyhow::Result<()> {
        let body = serde_json::to_string(notification)?;
        info!(
            "review notification {} for {}: {}",
            notification.notification_id, notification.student_email, body
        );
        Ok(())
    }
}

/// Try up to [`DELIVERY_ATTEMPTS`] times, sleeping `backoff` between tries.
/// Returns whether delivery eventually succeeded.
pub async fn dispatch_with_retry<S: NotificationSink>(
    sink: &S,
    notification: &ReviewNotification,
    backoff: Duration,
) -> bool {
    for attempt in 1..=DELIVERY_ATTEMPTS {
        match sink.deliver(notification).await {
            Ok(()) => {
                if attempt > 1 {
                    info!(
                        "notification {} delivered on attempt {}",
                        notification.notification_id, attempt
                    );
                }
                return true;
            }
            Err(err) => {
                warn!(
                    "delivery attempt {}/{} for notification {} failed: {:#}",
                    attempt, DELIVERY_ATTEMPTS, notification.notification_id, err
                );
                if attempt < DELIVERY_ATTEMPTS {
                    sleep(backoff).await;
                }
            }
        }
    }
    error!(
        "giving up on notification {} after {} attempts",
        notification.notification_id, DELIVERY_ATTEMPTS
    );
    false
}

/// Fire-and-forget dispatch through the default sink.
pub fn spawn_dispatch(notification: ReviewNotification) {
    tokio::spawn(async move {
        dispatch_with_retry(&LogSink, &notification, RETRY_BACKOFF).await;
    });
}
