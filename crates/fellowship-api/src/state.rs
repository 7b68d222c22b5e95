use std::sync::Arc;

use fellowship_db::Database;

use crate::notify::email::Mailer;
use crate::notify::push::PushClient;
use crate::storage::Storage;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub storage: Storage,
    /// `None` when no email provider is configured.
    pub mailer: Option<Mailer>,
    /// `None` when push delivery is disabled.
    pub push: Option<PushClient>,
    /// Base URL of the site, used for links in outgoing email.
    pub public_url: String,
}

/// Runs a database call on the blocking pool. The connection sits behind a
/// mutex, so queries must never run on the async workers.
pub async fn blocking<F, T>(state: &AppState, f: F) -> anyhow::Result<T>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))?
}
