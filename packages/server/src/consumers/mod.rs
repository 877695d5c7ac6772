pub mod assignment_stats;
pub mod classroom_stats;

use std::sync::Arc;

use common::EventBus;
use sea_orm::DatabaseConnection;
use tracing::info;

pub use assignment_stats::AssignmentStatsSubscriber;
pub use classroom_stats::ClassroomStatsSubscriber;

/// Attach the statistics subscribers to the bus.
pub fn register(bus: &Arc<EventBus>, db: DatabaseConnection) {
    bus.subscribe(Arc::new(AssignmentStatsSubscriber::new(
        db.clone(),
        Arc::downgrade(bus),
    )));
    bus.subscribe(Arc::new(ClassroomStatsSubscriber::new(db)));
    info!("Statistics subscribers registered");
}
