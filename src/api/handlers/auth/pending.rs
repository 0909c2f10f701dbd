//! Pending two-factor enrollments.
//!
//! A started enrollment parks its secret here, keyed by user, until the user
//! confirms with a matching code. Entries expire after a configurable TTL;
//! starting again replaces whatever was parked before.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

struct PendingSecret {
    secret: String,
    created_at: Instant,
}

pub struct PendingEnrollments {
    ttl: Duration,
    entries: Mutex<HashMap<Uuid, PendingSecret>>,
}

impl PendingEnrollments {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Park a secret for `user_id`, replacing any earlier one.
    pub async fn insert(&self, user_id: Uuid, secret: String) {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        entries.insert(
            user_id,
            PendingSecret {
                secret,
                created_at: Instant::now(),
            },
        );
    }

    /// Read the parked secret without consuming it; a failed confirmation
    /// must leave the enrollment available for another attempt.
    pub async fn peek(&self, user_id: Uuid) -> Option<String> {
        let entries = self.entries.lock().await;
        entries
            .get(&user_id)
            .filter(|entry| entry.created_at.elapsed() < self.ttl)
            .map(|entry| entry.secret.clone())
    }

    /// Drop the parked secret, if any.
    pub async fn remove(&self, user_id: Uuid) {
        self.entries.lock().await.remove(&user_id);
    }
}
