//! Activity feed recording

use std::sync::Arc;

use crate::{models::NewActivity, repository::ActivityLog};

/// Appends to the activity feed. Failures are logged and swallowed; the
/// operation being recorded has already committed.
#[derive(Clone)]
pub struct ActivityRecorder {
    log: Arc<dyn ActivityLog>,
}

impl ActivityRecorder {
    pub fn new(log: Arc<dyn ActivityLog>) -> Self {
        Self { log }
    }

    pub async fn record(&self, activity: NewActivity) {
        let activity_type = activity.activity_type.as_str();
        if let Err(e) = self.log.record(activity).await {
            tracing::warn!("Failed to record {} activity: {}", activity_type, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::AppError,
        models::ActivityType,
        repository::MockActivityLog,
    };

    #[tokio::test]
    async fn test_record_failure_is_swallowed() {
        let mut log = MockActivityLog::new();
        log.expect_record()
            .times(1)
            .returning(|_| Err(AppError::Internal("insert failed".into())));

        let recorder = ActivityRecorder::new(Arc::new(log));
        recorder
            .record(NewActivity::new(ActivityType::Loan, "Book borrowed"))
            .await;
    }
}
