use std::sync::Weak;

use anyhow::Result;
use async_trait::async_trait;
use common::event::StatisticsCalculated;
use common::{DomainEvent, EventBus, EventKind, EventPayload, Subscriber};
use sea_orm::DatabaseConnection;
use tracing::{debug, info};

use crate::services::statistics::{assignment, classroom};

const TOPICS: &[EventKind] = &[
    EventKind::SubmissionCreated,
    EventKind::SubmissionCompleted,
    EventKind::PlagiarismDetected,
    EventKind::GradeUpdated,
];

/// Keeps per-assignment snapshots in step with submission activity.
pub struct AssignmentStatsSubscriber {
    db: DatabaseConnection,
    events: Weak<EventBus>,
}

impl AssignmentStatsSubscriber {
    pub fn new(db: DatabaseConnection, events: Weak<EventBus>) -> Self {
        Self { db, events }
    }
}

#[async_trait]
impl Subscriber for AssignmentStatsSubscriber {
    fn id(&self) -> &str {
        "assignment-statistics"
    }

    fn topics(&self) -> &[EventKind] {
        TOPICS
    }

    async fn on_event(&self, event: &DomainEvent) -> Result<()> {
        match &event.payload {
            EventPayload::SubmissionCreated(p) => {
                assignment::record_submission(&self.db, p.assignment_id, event.timestamp).await?;
            }
            EventPayload::SubmissionCompleted(p) => {
                let stats = assignment::recompute(&self.db, p.assignment_id).await?;
                let classroom_id = match p.classroom_id {
                    Some(id) => Some(id),
                    None => classroom::classroom_of(&self.db, p.assignment_id).await?,
                };

                let Some(bus) = self.events.upgrade() else {
                    debug!("Event bus dropped, not announcing statistics");
                    return Ok(());
                };
                bus.publish(DomainEvent::new(StatisticsCalculated {
                    assignment_id: p.assignment_id,
                    classroom_id,
                    snapshot_date: stats.snapshot_date,
                }))
                .await;
                info!(assignment_id = p.assignment_id, "Statistics calculated");
            }
            EventPayload::PlagiarismDetected(p) => {
                assignment::refresh_plagiarism(&self.db, p.assignment_id).await?;
            }
            EventPayload::GradeUpdated(p) => {
                assignment::refresh_scores(&self.db, p.assignment_id).await?;
            }
            _ => {}
        }
        Ok(())
    }
}
