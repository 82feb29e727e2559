use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{quiz_store::QuizStore, storage::StorageError},
    services::{access, session_service, sse_events},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep a store connected, holding the application in degraded mode while it is unreachable.
///
/// Every fresh connection seeds the configured hosts and resumes the session recorded in the
/// scratch file, if any.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn QuizStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                install(&state, store.clone()).await;
                delay = INITIAL_DELAY;
                watch_health(&state, store.as_ref()).await;

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

async fn install(state: &SharedState, store: Arc<dyn QuizStore>) {
    if let Err(err) = access::seed_hosts(store.as_ref(), state.config().hosts()).await {
        warn!(error = %err, "failed to seed host roles");
    }

    state.set_quiz_store(store).await;
    info!("storage connection established; leaving degraded mode");
    sse_events::broadcast_system_status(state, false);

    match session_service::resume_active_session(state).await {
        Ok(true) | Ok(false) => {}
        Err(err) => warn!(error = %err, "failed to resume previous session"),
    }
}

/// Poll the store until reconnecting fails for good.
async fn watch_health(state: &SharedState, store: &dyn QuizStore) {
    loop {
        if store.health_check().await.is_ok() {
            if set_degraded(state, false) {
                info!("storage healthy again; leaving degraded mode");
            }
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        let mut reconnect_delay = INITIAL_DELAY;
        let mut reconnected = false;
        for attempt in 0..MAX_RECONNECT_ATTEMPTS {
            match store.try_reconnect().await {
                Ok(()) => {
                    info!(attempt, "storage reconnection succeeded after health check failure");
                    reconnected = true;
                    break;
                }
                Err(err) => {
                    if attempt == 0 {
                        warn!(attempt, error = %err, "storage reconnect first attempt failed; entering degraded mode");
                        set_degraded(state, true);
                    } else {
                        warn!(attempt, error = %err, "storage reconnect attempt failed");
                    }
                    sleep(reconnect_delay).await;
                    reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                }
            }
        }

        if !reconnected {
            warn!("exhausted storage reconnect attempts; staying in degraded mode");
            set_degraded(state, true);
            return;
        }
        set_degraded(state, false);
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

fn set_degraded(state: &SharedState, degraded: bool) -> bool {
    let changed = state.update_degraded(degraded);
    if changed {
        sse_events::broadcast_system_status(state, degraded);
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{AppConfig, HostSeed},
        dao::{models::HostRole, quiz_store::memory::MemoryQuizStore},
        oracle::UnconfiguredOracle,
        state::AppState,
    };

    #[tokio::test]
    async fn first_connection_seeds_hosts_and_leaves_degraded_mode() {
        let config = AppConfig::ephemeral().with_hosts(vec![HostSeed {
            user_id: "host-1".into(),
            role: HostRole::Host,
        }]);
        let state = AppState::new(config, Arc::new(UnconfiguredOracle));
        let store = MemoryQuizStore::new();
        let mut status = state.public_sse().subscribe();

        let handle = {
            let store = store.clone();
            tokio::spawn(run(state.clone(), move || {
                let store = store.clone();
                async move { Ok::<_, StorageError>(Arc::new(store) as Arc<dyn QuizStore>) }
            }))
        };

        let event = tokio::time::timeout(Duration::from_secs(2), status.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.event.as_deref(), Some(sse_events::EVENT_SYSTEM_STATUS));
        assert!(!state.is_degraded());
        assert_eq!(
            store.find_host_role("host-1".into()).await.unwrap(),
            Some(HostRole::Host)
        );
        handle.abort();
    }
}
