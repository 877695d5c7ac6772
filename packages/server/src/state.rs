use std::sync::Arc;

use common::EventBus;
use mq::QueueStore;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::services::plagiarism::SimilarityService;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub queue: Arc<dyn QueueStore>,
    pub events: Arc<EventBus>,
    pub similarity: Arc<dyn SimilarityService>,
}
