//! Broadcast readiness for long-poll (`wait=true`) endpoints.
//!
//! A [`WaitableValue`] holds a value that becomes known asynchronously. Any
//! number of tasks can [`wait`](WaitableValue::wait) for it; a single call to
//! [`resolve`](WaitableValue::resolve) releases all of them with the same
//! value. Waiting is cancel-safe: dropping a waiting future (for example when
//! the HTTP client disconnects and the server drops the handler) removes that
//! waiter immediately.
//!
//! Each asynchronous operation runs under a *generation*. Starting a new
//! operation with [`rearm`](WaitableValue::rearm) bumps the generation and
//! clears the value, and [`complete`](WaitableValue::complete) only accepts a
//! result for the generation it was started under, so a late completion of an
//! abandoned operation can never satisfy a newer waiter.

use tokio::sync::watch;

/// Why a wait ended without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    /// The awaited generation was replaced by a newer operation.
    #[error("the awaited operation was superseded by generation {current}")]
    Superseded { current: u64 },

    /// The value was dropped while waiting.
    #[error("the waitable value was dropped")]
    Closed,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u64,
    value: Option<T>,
}

/// A value with broadcast readiness. See the module docs.
#[derive(Debug)]
pub struct WaitableValue<T> {
    tx: watch::Sender<Slot<T>>,
}

impl<T: Clone> Default for WaitableValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> WaitableValue<T> {
    /// An unresolved value at generation 0.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Slot {
            generation: 0,
            value: None,
        });
        Self { tx }
    }

    /// A value that is already known.
    pub fn resolved(value: T) -> Self {
        let (tx, _rx) = watch::channel(Slot {
            generation: 0,
            value: Some(value),
        });
        Self { tx }
    }

    /// The current value, if resolved. Never suspends.
    pub fn get(&self) -> Option<T> {
        self.tx.borrow().value.clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.tx.borrow().value.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.tx.borrow().generation
    }

    /// Number of tasks currently suspended in one of the `wait*` methods.
    pub fn waiters(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Start a new operation: clear the value and return the new generation.
    pub fn rearm(&self) -> u64 {
        let mut generation = 0;
        self.tx.send_modify(|slot| {
            slot.generation += 1;
            slot.value = None;
            generation = slot.generation;
        });
        generation
    }

    /// Resolve the current generation. Returns `false` (and changes nothing)
    /// if it was already resolved.
    pub fn resolve(&self, value: T) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.value.is_some() {
                return false;
            }
            slot.value = Some(value);
            true
        })
    }

    /// Resolve `generation` if it is still current and unresolved. A stale
    /// completion is dropped and `false` is returned.
    pub fn complete(&self, generation: u64, value: T) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.generation != generation || slot.value.is_some() {
                return false;
            }
            slot.value = Some(value);
            true
        })
    }

    /// Move to a new generation that is already resolved with `value`.
    ///
    /// Used for state that changes repeatedly (an application state machine)
    /// rather than resolving once: readers never see an unresolved gap.
    pub fn advance(&self, value: T) -> u64 {
        let mut generation = 0;
        self.tx.send_modify(|slot| {
            slot.generation += 1;
            slot.value = Some(value);
            generation = slot.generation;
        });
        generation
    }

    /// Suspend until a value is present, then return it.
    pub async fn wait(&self) -> Result<T, WaitError> {
        self.wait_until(|_| true).await
    }

    /// Suspend until the value satisfies `ready`.
    pub async fn wait_until<F>(&self, mut ready: F) -> Result<T, WaitError>
    where
        F: FnMut(&T) -> bool,
    {
        let mut rx = self.tx.subscribe();
        let slot = rx
            .wait_for(|slot| slot.value.as_ref().is_some_and(&mut ready))
            .await
            .map_err(|_| WaitError::Closed)?;
        slot.value.clone().ok_or(WaitError::Closed)
    }

    /// Suspend until `generation` resolves. Fails with
    /// [`WaitError::Superseded`] if a newer operation replaces it first.
    pub async fn wait_generation(&self, generation: u64) -> Result<T, WaitError> {
        let mut rx = self.tx.subscribe();
        let slot = rx
            .wait_for(|slot| slot.generation != generation || slot.value.is_some())
            .await
            .map_err(|_| WaitError::Closed)?;
        if slot.generation != generation {
            return Err(WaitError::Superseded {
                current: slot.generation,
            });
        }
        slot.value.clone().ok_or(WaitError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    /// Yield until `cond` holds, failing the test after a generous bound.
    async fn settle(mut cond: impl FnMut() -> bool) {
        for _ in 0..1000 {
            if cond() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition never became true");
    }

    #[tokio::test]
    async fn get_does_not_block() {
        let v: WaitableValue<u32> = WaitableValue::new();
        assert_eq!(v.get(), None);
        assert!(v.resolve(7));
        assert_eq!(v.get(), Some(7));
    }

    #[tokio::test]
    async fn resolves_exactly_once_per_generation() {
        let v = WaitableValue::new();
        assert!(v.resolve("first"));
        assert!(!v.resolve("second"));
        assert_eq!(v.get(), Some("first"));
    }

    #[tokio::test]
    async fn all_waiters_observe_the_same_resolution() {
        let v = Arc::new(WaitableValue::<String>::new());
        let a = tokio::spawn({
            let v = Arc::clone(&v);
            async move { v.wait().await }
        });
        let b = tokio::spawn({
            let v = Arc::clone(&v);
            async move { v.wait().await }
        });
        settle(|| v.waiters() == 2).await;

        v.resolve("AVAILABLE".to_string());

        let (a, b) = tokio::join!(a, b);
        assert_eq!(a.unwrap().unwrap(), "AVAILABLE");
        assert_eq!(b.unwrap().unwrap(), "AVAILABLE");
        assert_eq!(v.waiters(), 0);
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_resolved() {
        let v = WaitableValue::resolved(3);
        let got = tokio::time::timeout(Duration::from_millis(100), v.wait())
            .await
            .expect("resolved value must not suspend");
        assert_eq!(got.unwrap(), 3);
    }

    #[tokio::test]
    async fn cancelled_waiter_is_released() {
        let v = Arc::new(WaitableValue::<u32>::new());
        let task = tokio::spawn({
            let v = Arc::clone(&v);
            async move { v.wait().await }
        });
        settle(|| v.waiters() == 1).await;

        task.abort();
        let joined = task.await;
        assert!(joined.unwrap_err().is_cancelled());
        assert_eq!(v.waiters(), 0);

        // Resolution after cancellation has nobody to deliver to.
        assert!(v.resolve(1));
        assert_eq!(v.waiters(), 0);
    }

    #[tokio::test]
    async fn stale_completion_is_ignored() {
        let v = WaitableValue::new();
        let old = v.rearm();
        let new = v.rearm();
        assert!(!v.complete(old, "stale"));
        assert_eq!(v.get(), None);
        assert!(v.complete(new, "fresh"));
        assert_eq!(v.get(), Some("fresh"));
    }

    #[tokio::test]
    async fn generation_waiter_is_superseded_by_rearm() {
        let v = Arc::new(WaitableValue::<u32>::new());
        let generation = v.rearm();
        let waiter = tokio::spawn({
            let v = Arc::clone(&v);
            async move { v.wait_generation(generation).await }
        });
        settle(|| v.waiters() == 1).await;

        let next = v.rearm();
        v.complete(next, 99);

        assert_eq!(
            waiter.await.unwrap(),
            Err(WaitError::Superseded { current: next })
        );
    }

    #[tokio::test]
    async fn wait_until_sees_state_changes() {
        let v = Arc::new(WaitableValue::resolved("WAITING"));
        let waiter = tokio::spawn({
            let v = Arc::clone(&v);
            async move { v.wait_until(|s| *s != "WAITING").await }
        });
        settle(|| v.waiters() == 1).await;

        v.advance("WAITING");
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        v.advance("RUNNING");
        assert_eq!(waiter.await.unwrap().unwrap(), "RUNNING");
    }
}
