//! User synchronization service
//!
//! Bulk sync rewrites every managed inbound's client list from the directory
//! and needs an engine restart to take effect. Single-user sync applies the
//! change live through the engine API and mirrors it in the model so that a
//! later restart renders the same lists.

use crate::domain::entities::{ClientList, User, XrayConfig};
use crate::domain::ports::EngineApi;
use crate::domain::services::account_service::{eligible_account, ProxyAccounts};
use crate::domain::{DomainError, InboundSyncFailure, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct UserSyncService {
    config: Arc<XrayConfig>,
    api: Arc<dyn EngineApi>,
}

impl UserSyncService {
    pub fn new(config: Arc<XrayConfig>, api: Arc<dyn EngineApi>) -> Self {
        Self { config, api }
    }

    /// Apply one user's current memberships to the running engine.
    ///
    /// Every managed inbound is attempted; failed live adds are reported
    /// together once all inbounds have been processed.
    pub async fn sync_user(&self, user: &User) -> Result<()> {
        let accounts = ProxyAccounts::from_user(user);
        let mut failures = Vec::new();

        for inbound in self.config.inbounds().iter().filter(|i| i.is_managed()) {
            let tag = inbound.tag();

            // Absent users are not an error here
            if let Err(e) = self.api.remove_inbound_user(tag, &user.email).await {
                debug!(tag = %tag, email = %user.email, error = %e, "Live remove skipped");
            }

            match eligible_account(inbound, user, &accounts) {
                Some(account) => {
                    inbound.upsert_client(account.clone());
                    if let Err(e) = self.api.add_inbound_user(tag, &account).await {
                        warn!(tag = %tag, email = %user.email, error = %e, "Failed to add user");
                        failures.push(InboundSyncFailure {
                            tag: tag.to_string(),
                            reason: e.to_string(),
                        });
                    }
                }
                None => inbound.remove_client(&user.email),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DomainError::UserSyncFailed(failures))
        }
    }

    /// Rebuild every managed inbound's client list from `users`
    pub fn sync_users(&self, users: &[User]) {
        rebuild_client_lists(&self.config, users);
    }
}

/// Rebuild every managed inbound's client list from `users`
pub fn rebuild_client_lists(config: &XrayConfig, users: &[User]) {
    let accounts: Vec<ProxyAccounts> = users.iter().map(ProxyAccounts::from_user).collect();

    for inbound in config.inbounds().iter().filter(|i| i.is_managed()) {
        let eligible = users
            .iter()
            .zip(accounts.iter())
            .filter_map(|(user, accounts)| eligible_account(inbound, user, accounts));
        let clients = ClientList::from_accounts(inbound.kind(), eligible);
        debug!(tag = %inbound.tag(), clients = clients.len(), "Client list rebuilt");
        inbound.replace_clients(clients);
    }

    info!(users = users.len(), "Client lists synchronized");
}
