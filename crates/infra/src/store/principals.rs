use std::collections::BTreeMap;
use std::sync::RwLock;

use keystone_auth::{PrincipalAccount, PrincipalDirectory, PrincipalStatus};
use keystone_core::{DomainError, PrincipalId};

use super::poisoned;

/// In-memory principal directory.
#[derive(Debug, Default)]
pub struct InMemoryPrincipalDirectory {
    inner: RwLock<BTreeMap<PrincipalId, PrincipalAccount>>,
}

impl InMemoryPrincipalDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, account: PrincipalAccount) -> Result<(), DomainError> {
        self.inner.write().map_err(poisoned)?.insert(account.id, account);
        Ok(())
    }

    pub fn set_status(&self, id: PrincipalId, status: PrincipalStatus) -> Result<(), DomainError> {
        let mut accounts = self.inner.write().map_err(poisoned)?;
        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(format!("principal {id}")))?;
        account.status = status;
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<PrincipalAccount>, DomainError> {
        Ok(self.inner.read().map_err(poisoned)?.values().cloned().collect())
    }
}

impl PrincipalDirectory for InMemoryPrincipalDirectory {
    fn account(&self, id: PrincipalId) -> Result<Option<PrincipalAccount>, DomainError> {
        Ok(self.inner.read().map_err(poisoned)?.get(&id).cloned())
    }
}
