use std::sync::Arc;

use common::AttachmentStore;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::mailer::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub storage: Arc<dyn AttachmentStore>,
    pub notifier: Arc<Notifier>,
}
