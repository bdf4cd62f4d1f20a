use std::sync::{Arc, Mutex};

use crate::config::AppConfig;
use crate::db::Database;

/// Shared across request handlers. The database sits behind a single mutex,
/// which also serialises booking creation.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig) -> Self {
        AppState {
            db: Arc::new(Mutex::new(db)),
            config: Arc::new(config),
        }
    }
}
