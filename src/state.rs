use std::future::Future;
use std::sync::Arc;

use tokio_util::task::TaskTracker;
use tracing::error;

use crate::config::AppConfig;
use crate::database::SharedStore;
use crate::mailer::Mailer;
use crate::middleware::Metrics;
use crate::services::{BucketStore, TokenService};

/// Everything a handler or middleware stage can reach. Cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: SharedStore,
    pub tokens: TokenService,
    pub limiter: Arc<BucketStore>,
    pub mailer: Arc<dyn Mailer>,
    pub metrics: Arc<Metrics>,
    /// Work that outlives its request, such as welcome emails. Drained at shutdown.
    pub background: TaskTracker,
}

impl AppState {
    pub fn new(config: AppConfig, store: SharedStore, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            limiter: Arc::new(BucketStore::new(&config.limiter)),
            tokens: TokenService::new(store.clone()),
            config: Arc::new(config),
            store,
            mailer,
            metrics: Arc::new(Metrics::new()),
            background: TaskTracker::new(),
        }
    }

    /// Run `task` detached from the request. A panic inside it is logged and
    /// goes no further.
    pub fn spawn_background<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        self.background.spawn(async move {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!(task = name, "background task panicked: {}", e);
                }
            }
        });
    }
}
