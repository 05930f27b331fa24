use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// One async mutex per conversation id. Turns for the same conversation run
/// one at a time; different conversations never contend.
#[derive(Debug, Default)]
pub struct ConversationLocks {
    inner: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the conversation's lock. Held until the guard drops.
    pub async fn acquire(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock();
            // entries only the map references are neither held nor awaited
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    pub fn tracked(&self) -> usize {
        self.inner.lock().len()
    }
}
