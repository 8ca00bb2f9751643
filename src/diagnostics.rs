//! Read-only HTTP diagnostics.
//!
//! [`routes`] registers `GET /cluster/healthcheck` and `GET /cluster/stats`
//! on a caller-supplied axum router. The stats handler re-reads the state
//! file on every request, so it works from any process that can see the
//! file, workers included.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};

use crate::persistence::StatePersister;
use crate::{ClusterError, Result};

/// Healthcheck route.
pub const HEALTHCHECK_PATH: &str = "/cluster/healthcheck";

/// Stats route.
pub const STATS_PATH: &str = "/cluster/stats";

/// Fixed healthcheck body.
pub const HEALTHCHECK_BODY: &str = "Cluster keeper is running...!";

/// Handler for `GET /cluster/healthcheck`.
async fn healthcheck() -> &'static str {
    HEALTHCHECK_BODY
}

/// Handler for `GET /cluster/stats`; a missing or malformed file yields 500.
async fn stats(persister: Arc<StatePersister>) -> Result<Json<serde_json::Value>> {
    let value = tokio::task::spawn_blocking(move || persister.read_value())
        .await
        .map_err(|err| ClusterError::Diagnostics(format!("stats task failed: {err}")))??;
    Ok(Json(value))
}

/// Register both diagnostics routes on `router`.
pub fn routes<S>(router: Router<S>, persister: StatePersister) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let persister = Arc::new(persister);
    router.route(HEALTHCHECK_PATH, get(healthcheck)).route(
        STATS_PATH,
        get(move || stats(Arc::clone(&persister))),
    )
}
