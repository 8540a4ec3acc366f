use crate::domain::ports::KycGate;
use crate::domain::wallet::ActorId;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory KYC gate.
///
/// The auto-approve policy is an explicit construction-time value, not a
/// process-wide flag: environments that skip identity verification (demos,
/// tests) opt in per gate instance.
#[derive(Default, Clone)]
pub struct InMemoryKycGate {
    auto_approve: bool,
    approved: Arc<RwLock<HashSet<ActorId>>>,
}

impl InMemoryKycGate {
    pub fn new(auto_approve: bool) -> Self {
        Self {
            auto_approve,
            approved: Arc::default(),
        }
    }

    pub async fn approve(&self, actor: ActorId) {
        self.approved.write().await.insert(actor);
    }

    pub async fn revoke(&self, actor: &ActorId) {
        self.approved.write().await.remove(actor);
    }
}

#[async_trait]
impl KycGate for InMemoryKycGate {
    async fn is_approved(&self, actor: &ActorId) -> Result<bool> {
        if self.auto_approve {
            return Ok(true);
        }
        Ok(self.approved.read().await.contains(actor))
    }
}
