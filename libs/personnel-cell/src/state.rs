use std::sync::Arc;

use notification_cell::NotificationHub;
use shared_config::AppConfig;

/// Per-process context handed to every handler: configuration for building
/// store clients, and the hub that pushes realtime events to patients.
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub notifier: Arc<NotificationHub>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            notifier: Arc::new(NotificationHub::new()),
        }
    }
}
