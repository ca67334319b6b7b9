use std::time::{Duration, Instant};

use eyre::Result;
use log::{debug, info};
use tokio::sync::Mutex;

use crate::botguard::{Authenticate, Credentials};

/// Tokens last around six hours; stay conservative
pub const SESSION_TTL: Duration = Duration::from_secs(5 * 60 * 60);

/// One authenticated handle to the platform. Either fully valid or absent;
/// callers never observe a partially-initialized session.
#[derive(Debug, Clone)]
pub struct VisitorSession {
    pub po_token: String,
    pub visitor_data: String,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl VisitorSession {
    fn new(credentials: Credentials, ttl: Duration) -> Self {
        let created_at = Instant::now();
        VisitorSession {
            po_token: credentials.po_token,
            visitor_data: credentials.visitor_data,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Owns the single cached session and the authenticator that mints it.
///
/// The slot mutex is held across authentication, so concurrent `get` calls
/// during creation all wait on the same run and observe its result; there
/// is never more than one authentication in flight.
pub struct SessionManager<A> {
    authenticator: A,
    ttl: Duration,
    current: Mutex<Option<VisitorSession>>,
}

impl<A: Authenticate> SessionManager<A> {
    pub fn new(authenticator: A) -> Self {
        Self::with_ttl(authenticator, SESSION_TTL)
    }

    pub fn with_ttl(authenticator: A, ttl: Duration) -> Self {
        SessionManager {
            authenticator,
            ttl,
            current: Mutex::new(None),
        }
    }

    /// Return the cached session, creating one if absent or expired.
    /// Authentication failures propagate and are never cached.
    pub async fn get(&self) -> Result<VisitorSession> {
        let mut current = self.current.lock().await;

        if let Some(session) = current.as_ref() {
            if !session.is_expired() {
                debug!("Reusing cached session");
                return Ok(session.clone());
            }
            debug!("Cached session expired");
        }

        info!("Creating new authenticated session");
        let credentials = self.authenticator.authenticate().await?;
        let session = VisitorSession::new(credentials, self.ttl);
        *current = Some(session.clone());
        info!("Session created, valid for {:?}", self.ttl);
        Ok(session)
    }

    /// Clear the cached session so the next `get` re-authenticates.
    /// Replacement is atomic; a live session handed out earlier is untouched.
    pub async fn invalidate(&self) {
        debug!("Invalidating session");
        *self.current.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use eyre::bail;

    struct CountingAuth {
        runs: Arc<AtomicUsize>,
        fail_first: bool,
    }

    #[async_trait]
    impl Authenticate for CountingAuth {
        async fn authenticate(&self) -> Result<Credentials> {
            let run = self.runs.fetch_add(1, Ordering::SeqCst);
            // yield so concurrent callers genuinely overlap the creation
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.fail_first && run == 0 {
                bail!("challenge rejected");
            }
            Ok(Credentials {
                po_token: format!("token-{run}"),
                visitor_data: "visitor".to_string(),
            })
        }
    }

    fn manager(runs: Arc<AtomicUsize>, fail_first: bool) -> SessionManager<CountingAuth> {
        SessionManager::new(CountingAuth { runs, fail_first })
    }

    #[tokio::test]
    async fn test_concurrent_gets_share_one_authentication() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mgr = Arc::new(manager(runs.clone(), false));

        let (a, b) = tokio::join!(
            {
                let mgr = mgr.clone();
                async move { mgr.get().await }
            },
            {
                let mgr = mgr.clone();
                async move { mgr.get().await }
            }
        );

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap().po_token, b.unwrap().po_token);
    }

    #[tokio::test]
    async fn test_invalidate_forces_new_authentication() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mgr = manager(runs.clone(), false);

        let first = mgr.get().await.unwrap();
        mgr.invalidate().await;
        let second = mgr.get().await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_ne!(first.po_token, second.po_token);
    }

    #[tokio::test]
    async fn test_cached_session_reused() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mgr = manager(runs.clone(), false);

        mgr.get().await.unwrap();
        mgr.get().await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_session_recreated() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mgr = SessionManager::with_ttl(
            CountingAuth {
                runs: runs.clone(),
                fail_first: false,
            },
            Duration::ZERO,
        );

        mgr.get().await.unwrap();
        mgr.get().await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mgr = manager(runs.clone(), true);

        assert!(mgr.get().await.is_err());
        let session = mgr.get().await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(session.po_token, "token-1");
    }
}
