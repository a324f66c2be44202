//! Request-scoped values.
//!
//! `Values` is an immutable, persistent map: deriving a new view with [`Values::with`] never
//! changes the view it was derived from, so a middleware can hand a richer view to the handlers
//! below it while its own view stays as it was.
use std::{any::Any, borrow::Cow, fmt, sync::Arc};

struct Entry {
    key: Cow<'static, str>,
    // `None` shadows an inherited value.
    value: Option<Arc<dyn Any + Send + Sync>>,
    parent: Option<Arc<Entry>>,
}

/// An immutable view over request-scoped key/value pairs.
#[derive(Clone, Default)]
pub struct Values {
    head: Option<Arc<Entry>>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a view in which `key` maps to `value`.
    pub fn with<T>(&self, key: impl Into<Cow<'static, str>>, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.push(key.into(), Some(Arc::new(value)))
    }

    /// Derive a view in which `key` is absent.
    pub fn without(&self, key: impl Into<Cow<'static, str>>) -> Self {
        self.push(key.into(), None)
    }

    fn push(&self, key: Cow<'static, str>, value: Option<Arc<dyn Any + Send + Sync>>) -> Self {
        Self {
            head: Some(Arc::new(Entry {
                key,
                value,
                parent: self.head.clone(),
            })),
        }
    }

    fn lookup(&self, key: &str) -> Option<&Arc<dyn Any + Send + Sync>> {
        let mut cursor = self.head.as_deref();
        while let Some(entry) = cursor {
            if entry.key == key {
                return entry.value.as_ref();
            }
            cursor = entry.parent.as_deref();
        }
        None
    }

    /// The value stored under `key`, if present and of type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.lookup(key).and_then(|value| value.downcast_ref::<T>())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Keys visible in this view, most recently installed first.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        let mut cursor = self.head.as_deref();
        while let Some(entry) = cursor {
            if !keys.contains(&entry.key.as_ref()) {
                keys.push(entry.key.as_ref());
            }
            cursor = entry.parent.as_deref();
        }
        keys.retain(|key| self.contains(key));
        keys
    }
}

impl fmt::Debug for Values {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Values").field("keys", &self.keys()).finish()
    }
}
