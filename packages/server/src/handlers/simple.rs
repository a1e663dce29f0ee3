//! Storage behind simple get/set endpoints.
//!
//! A [`SimpleStore`] holds one value and binds the `GET`/`POST` pair that
//! [`keel::simple_endpoint`] declares: `GET` returns the value or `null`,
//! `POST` replaces it with the request body.

use std::sync::Arc;

use keel::{Method, SIMPLE_VALUE_PARAM};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;

use super::{Bindings, HandlerError};
use crate::args::{Arguments, Presence};

/// The stored state of a simple endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Setting<T> {
    /// Never written.
    #[default]
    Unset,
    /// Explicitly written as absent.
    Cleared,
    Set(T),
}

impl<T> Setting<T> {
    pub fn as_option(&self) -> Option<&T> {
        match self {
            Setting::Set(value) => Some(value),
            Setting::Unset | Setting::Cleared => None,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Setting::Unset)
    }
}

/// A shared, async-safe cell for one simple endpoint's value.
#[derive(Debug)]
pub struct SimpleStore<T> {
    value: Arc<RwLock<Setting<T>>>,
}

impl<T> Clone for SimpleStore<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
        }
    }
}

impl<T> Default for SimpleStore<T> {
    fn default() -> Self {
        Self {
            value: Arc::new(RwLock::new(Setting::Unset)),
        }
    }
}

impl<T> SimpleStore<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: T) -> Self {
        Self {
            value: Arc::new(RwLock::new(Setting::Set(value))),
        }
    }

    pub async fn get(&self) -> Option<T> {
        self.value.read().await.as_option().cloned()
    }

    pub async fn setting(&self) -> Setting<T> {
        self.value.read().await.clone()
    }

    /// Replace the value. `None` records an explicit clear.
    pub async fn set(&self, value: Option<T>) {
        let next = match value {
            Some(v) => Setting::Set(v),
            None => Setting::Cleared,
        };
        *self.value.write().await = next;
    }

    /// Bind `GET path` and `POST path` to this store.
    pub fn bind(&self, bindings: &mut Bindings, path: &str) {
        self.bind_with(bindings, path, || {});
    }

    /// Like [`bind`](Self::bind), calling `on_set` after every successful
    /// `POST`.
    pub fn bind_with<F>(&self, bindings: &mut Bindings, path: &str, on_set: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let store = self.clone();
        bindings.bind(Method::Get, path, move |_args: Arguments| {
            let store = store.clone();
            async move { Ok::<_, HandlerError>(store.get().await) }
        });

        let store = self.clone();
        let on_set = Arc::new(on_set);
        bindings.bind(Method::Post, path, move |args: Arguments| {
            let store = store.clone();
            let on_set = Arc::clone(&on_set);
            async move {
                let value = match args.presence(SIMPLE_VALUE_PARAM) {
                    Presence::Given => Some(args.get::<T>(SIMPLE_VALUE_PARAM)?),
                    Presence::Null | Presence::Omitted => None,
                };
                store.set(value).await;
                on_set();
                Ok::<(), HandlerError>(())
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_unset_and_tracks_writes() {
        let store: SimpleStore<String> = SimpleStore::new();
        assert!(store.setting().await.is_unset());
        assert_eq!(store.get().await, None);

        store.set(Some("en_US.UTF-8".into())).await;
        assert_eq!(store.get().await.as_deref(), Some("en_US.UTF-8"));

        store.set(None).await;
        assert_eq!(store.setting().await, Setting::Cleared);
        assert_eq!(store.get().await, None);
    }

    #[tokio::test]
    async fn clones_share_the_value() {
        let a = SimpleStore::with_value(3_i64);
        let b = a.clone();
        b.set(Some(4)).await;
        assert_eq!(a.get().await, Some(4));
    }

    #[tokio::test]
    async fn post_runs_the_set_hook() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        use keel::{simple_endpoint, EndpointTable, ResourceNode};

        let store: SimpleStore<String> = SimpleStore::new();
        let sets = Arc::new(AtomicUsize::new(0));
        let mut bindings = Bindings::new();
        let counter = Arc::clone(&sets);
        store.bind_with(&mut bindings, "/locale", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let table = EndpointTable::derive(&ResourceNode::root().child(simple_endpoint::<String>("locale")))
            .unwrap();
        let handlers = bindings.resolve(&table).unwrap();
        let get = &handlers[&(Method::Get, "/locale".to_string())];
        let post = &handlers[&(Method::Post, "/locale".to_string())];

        get.call(Arguments::new()).await.unwrap();
        assert_eq!(sets.load(Ordering::SeqCst), 0);

        post.call(Arguments::new().with(SIMPLE_VALUE_PARAM, serde_json::json!("en_US.UTF-8")))
            .await
            .unwrap();
        assert_eq!(sets.load(Ordering::SeqCst), 1);
        assert_eq!(store.get().await.as_deref(), Some("en_US.UTF-8"));
    }

    #[test]
    fn binds_the_get_post_pair() {
        let store: SimpleStore<String> = SimpleStore::new();
        let mut bindings = Bindings::new();
        store.bind(&mut bindings, "/locale");
        assert_eq!(bindings.len(), 2);
    }
}
