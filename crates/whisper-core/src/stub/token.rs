//! CSRF token slot.
//!
//! The slot moves `Unset -> Pending -> Ready`. A failed fetch returns it to
//! `Unset` so the next caller starts a fresh fetch. Callers arriving while a
//! fetch is in flight join it instead of starting their own.

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::Mutex;

use super::Failure;

pub(crate) type TokenFetch = Shared<BoxFuture<'static, Result<String, Failure>>>;

enum TokenState {
    Unset,
    Pending { generation: u64, fetch: TokenFetch },
    Ready(String),
}

struct SlotInner {
    state: TokenState,
    generation: u64,
}

pub(crate) struct TokenSlot {
    inner: Mutex<SlotInner>,
}

impl TokenSlot {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(SlotInner {
                state: TokenState::Unset,
                generation: 0,
            }),
        }
    }

    /// Returns the held token, fetching it with `start` when unset.
    ///
    /// The lock is never held while the fetch runs.
    pub(crate) async fn acquire<F>(&self, start: F) -> Result<String, Failure>
    where
        F: FnOnce() -> BoxFuture<'static, Result<String, Failure>>,
    {
        let (generation, fetch) = {
            let mut inner = self.inner.lock().await;
            let joined = match &inner.state {
                TokenState::Ready(token) => return Ok(token.clone()),
                TokenState::Pending { generation, fetch } => Some((*generation, fetch.clone())),
                TokenState::Unset => None,
            };
            if let Some(joined) = joined {
                tracing::debug!("joining in-flight csrf token fetch");
                joined
            } else {
                inner.generation += 1;
                let generation = inner.generation;
                let fetch = start().shared();
                inner.state = TokenState::Pending {
                    generation,
                    fetch: fetch.clone(),
                };
                (generation, fetch)
            }
        };

        let result = fetch.await;

        let mut inner = self.inner.lock().await;
        let current = matches!(
            &inner.state,
            TokenState::Pending { generation: g, .. } if *g == generation
        );
        if current {
            inner.state = match &result {
                Ok(token) => TokenState::Ready(token.clone()),
                Err(_) => TokenState::Unset,
            };
        }
        result
    }

    pub(crate) async fn is_ready(&self) -> bool {
        matches!(self.inner.lock().await.state, TokenState::Ready(_))
    }

    #[cfg(test)]
    pub(crate) async fn is_pending(&self) -> bool {
        matches!(self.inner.lock().await.state, TokenState::Pending { .. })
    }
}
