mod backend;
mod catalog;

pub use backend::{Call, TestBackend};
pub use catalog::TestCatalog;

use std::future::Future;
use std::sync::Once;

use tokio::task::LocalSet;
use tracing_subscriber::EnvFilter;

use partygrid_engine::{Edit, SyncFailure, SyncReport};

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per process. `RUST_LOG` overrides
/// the default filter.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,partygrid=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Drive `future` on a fresh `LocalSet`, where the sync coordinator spawns
/// its tasks.
pub async fn run_local<F: Future>(future: F) -> F::Output {
    init_tracing();
    LocalSet::new().run_until(future).await
}

/// Wait for the remote side of an edit. An edit that sent nothing counts as
/// zero applied calls.
pub async fn settle<T>(edit: Edit<T>) -> Result<SyncReport, SyncFailure> {
    match edit.sync {
        Some(handle) => handle.settled().await,
        None => Ok(SyncReport::Applied { calls: 0 }),
    }
}
