use std::sync::Arc;

use crate::config::Config;
use crate::executors::ExecutorRegistry;
use crate::queue::Queue;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub queue: Queue,
    pub config: Config,
    pub executors: ExecutorRegistry,
}
