//! Delivery of freshly issued tokens to their owners.
//!
//! Deliveries run off the request path on tasks owned by [`Deliveries`], so
//! a slow notifier never holds up a response. Shutdown drains them before
//! the process exits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::task::TaskTracker;

use crate::clock::unix_secs;
use crate::data::{Token, User};
use crate::error::GateError;

#[async_trait]
pub trait TokenNotifier: Send + Sync {
    async fn deliver(&self, recipient: &User, token: &Token) -> Result<(), GateError>;
}

/// Records that a token was issued. Never logs the plaintext.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl TokenNotifier for LogNotifier {
    async fn deliver(&self, recipient: &User, token: &Token) -> Result<(), GateError> {
        tracing::info!(
            user_id = recipient.id,
            scope = %token.scope(),
            expiry = unix_secs(token.expiry()),
            "Token ready for delivery"
        );
        Ok(())
    }
}

/// Background deliveries through one notifier.
#[derive(Clone)]
pub struct Deliveries {
    notifier: Arc<dyn TokenNotifier>,
    tasks: TaskTracker,
}

impl Deliveries {
    pub fn new(notifier: Arc<dyn TokenNotifier>) -> Self {
        Self {
            notifier,
            tasks: TaskTracker::new(),
        }
    }

    /// Delivers on a tracked task; a failure is logged, not returned.
    pub fn send(&self, recipient: User, token: Token) {
        let notifier = self.notifier.clone();
        self.tasks.spawn(async move {
            if let Err(e) = notifier.deliver(&recipient, &token).await {
                tracing::error!(
                    user_id = recipient.id,
                    scope = %token.scope(),
                    error = %e,
                    "Token delivery failed"
                );
            }
        });
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Waits up to `deadline` for every delivery already started.
    /// Returns false if some were still running when it gave up.
    pub async fn drain(&self, deadline: Duration) -> bool {
        self.tasks.close();
        tokio::time::timeout(deadline, self.tasks.wait())
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::SystemTime;

    use crate::data::{PasswordDigest, Scope, Version};
    use crate::security::tokens::generate_token;

    struct SlowNotifier {
        delay: Duration,
        delivered: AtomicUsize,
    }

    #[async_trait]
    impl TokenNotifier for SlowNotifier {
        async fn deliver(&self, _: &User, _: &Token) -> Result<(), GateError> {
            tokio::time::sleep(self.delay).await;
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn user() -> User {
        User {
            id: 7,
            name: "Alice".into(),
            email: "alice@example.com".into(),
            password: PasswordDigest::from_plaintext("pa55word").unwrap(),
            activated: false,
            version: Version::INITIAL,
            created_at: 0,
        }
    }

    fn token() -> Token {
        generate_token(
            &mut rand::rngs::OsRng,
            Scope::Activation,
            7,
            Duration::from_secs(60),
            SystemTime::now(),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_waits_for_slow_delivery() {
        let notifier = Arc::new(SlowNotifier {
            delay: Duration::from_millis(500),
            delivered: AtomicUsize::new(0),
        });
        let deliveries = Deliveries::new(notifier.clone());
        deliveries.send(user(), token());
        deliveries.send(user(), token());
        assert_eq!(deliveries.pending(), 2);

        assert!(deliveries.drain(Duration::from_secs(5)).await);
        assert_eq!(notifier.delivered.load(Ordering::SeqCst), 2);
        assert_eq!(deliveries.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_gives_up_at_deadline() {
        let notifier = Arc::new(SlowNotifier {
            delay: Duration::from_secs(60),
            delivered: AtomicUsize::new(0),
        });
        let deliveries = Deliveries::new(notifier.clone());
        deliveries.send(user(), token());

        assert!(!deliveries.drain(Duration::from_secs(1)).await);
        assert_eq!(notifier.delivered.load(Ordering::SeqCst), 0);
    }
}
