use anyhow::Result;
use async_trait::async_trait;
use common::{DomainEvent, EventKind, Subscriber};
use sea_orm::DatabaseConnection;
use tracing::debug;

use crate::services::statistics::classroom;

const TOPICS: &[EventKind] = &[
    EventKind::StatisticsCalculated,
    EventKind::GradeUpdated,
    EventKind::PlagiarismDetected,
    EventKind::StudentEnrolled,
];

/// Rebuilds the classroom snapshot whenever something it summarizes moves.
pub struct ClassroomStatsSubscriber {
    db: DatabaseConnection,
}

impl ClassroomStatsSubscriber {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Subscriber for ClassroomStatsSubscriber {
    fn id(&self) -> &str {
        "classroom-statistics"
    }

    fn topics(&self) -> &[EventKind] {
        TOPICS
    }

    async fn on_event(&self, event: &DomainEvent) -> Result<()> {
        let classroom_id = match (event.classroom_id(), event.assignment_id()) {
            (Some(id), _) => Some(id),
            (None, Some(assignment_id)) => classroom::classroom_of(&self.db, assignment_id).await?,
            (None, None) => None,
        };

        let Some(classroom_id) = classroom_id else {
            debug!(topic = event.topic(), "Event has no classroom, skipping");
            return Ok(());
        };

        classroom::recompute(&self.db, classroom_id).await?;
        Ok(())
    }
}
