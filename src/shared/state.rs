use std::sync::Arc;

use crate::legal::service::DocumentService;
use crate::shared::config::AppConfig;
use crate::storage::Storage;

pub struct AppState {
    pub config: AppConfig,
    pub storage: Arc<dyn Storage>,
    pub documents: Arc<DocumentService>,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            storage: Arc::clone(&self.storage),
            documents: Arc::clone(&self.documents),
        }
    }
}
