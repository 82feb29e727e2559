use tracing::debug;

use crate::{
    config::HostSeed,
    dao::{models::HostRole, quiz_store::QuizStore},
    error::ServiceError,
    state::SharedState,
};

/// Resolved caller holding a host role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    /// Identity asserted by the upstream authenticator.
    pub user_id: String,
    /// Privilege attached to the identity.
    pub role: HostRole,
}

/// Resolve `user_id` to a host role; `mutate` additionally rejects read-only co-hosts.
pub async fn authorize_host(
    state: &SharedState,
    user_id: &str,
    mutate: bool,
) -> Result<HostIdentity, ServiceError> {
    let store = state.require_quiz_store().await?;
    let role = store
        .find_host_role(user_id.to_owned())
        .await?
        .ok_or_else(|| ServiceError::Forbidden(format!("`{user_id}` is not a host")))?;

    if mutate && !role.can_mutate() {
        debug!(user_id, "co-host attempted a mutating action");
        return Err(ServiceError::Forbidden(
            "co-hosts have read-only access".into(),
        ));
    }

    Ok(HostIdentity {
        user_id: user_id.to_owned(),
        role,
    })
}

/// Write the configured host roles into a freshly connected store.
pub async fn seed_hosts(store: &dyn QuizStore, seeds: &[HostSeed]) -> Result<(), ServiceError> {
    for seed in seeds {
        store
            .save_host_role(seed.user_id.clone(), seed.role)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::quiz_store::memory::MemoryQuizStore, oracle::UnconfiguredOracle,
        state::AppState,
    };

    #[tokio::test]
    async fn co_host_may_read_but_not_mutate() {
        let state = AppState::new(AppConfig::ephemeral(), Arc::new(UnconfiguredOracle));
        let store = Arc::new(MemoryQuizStore::new());
        seed_hosts(
            store.as_ref(),
            &[
                HostSeed {
                    user_id: "alice".into(),
                    role: HostRole::Host,
                },
                HostSeed {
                    user_id: "bob".into(),
                    role: HostRole::CoHost,
                },
            ],
        )
        .await
        .unwrap();
        state.set_quiz_store(store).await;

        assert!(authorize_host(&state, "alice", true).await.is_ok());
        assert_eq!(
            authorize_host(&state, "bob", false).await.unwrap().role,
            HostRole::CoHost
        );
        assert!(matches!(
            authorize_host(&state, "bob", true).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            authorize_host(&state, "mallory", false).await,
            Err(ServiceError::Forbidden(_))
        ));
    }
}
