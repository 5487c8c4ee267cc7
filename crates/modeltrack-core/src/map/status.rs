use serde::{Deserialize, Serialize};
use std::any::type_name;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::keyed::IdentityKeyedMap;
use crate::detail::{Color, Decal, Paint};
use crate::error::TrackError;

/// Completion state of one paint or decal requirement.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    NotDone,
    Done,
    NotApplicable,
}

impl Status {
    const fn as_str(self) -> &'static str {
        match self {
            Self::NotDone => "not done",
            Self::Done => "done",
            Self::NotApplicable => "n/a",
        }
    }

    /// Only `Done` satisfies a requirement.
    #[must_use]
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversion of a caller-supplied value into a status key of type `K`.
///
/// Every `K` converts into itself. Look-alike types that callers tend to pass
/// by mistake (a [`Color`] where a [`Paint`] belongs) also implement this
/// trait, but only to fail with [`TrackError::ConfusableKey`] instead of
/// silently growing the map with a key that no part tracks.
pub trait IntoStatusKey<K> {
    /// # Errors
    ///
    /// Returns [`TrackError::ConfusableKey`] for look-alike key types.
    fn into_status_key(self) -> Result<K, TrackError>;
}

macro_rules! identity_key {
    ($($key:ty),*) => {$(
        impl IntoStatusKey<$key> for $key {
            fn into_status_key(self) -> Result<$key, TrackError> {
                Ok(self)
            }
        }

        impl IntoStatusKey<$key> for &$key {
            fn into_status_key(self) -> Result<$key, TrackError> {
                Ok(self.clone())
            }
        }
    )*};
}

identity_key!(Paint, Decal);

impl IntoStatusKey<Paint> for Color {
    fn into_status_key(self) -> Result<Paint, TrackError> {
        Err(confusable::<Paint, Self>())
    }
}

impl IntoStatusKey<Paint> for &Color {
    fn into_status_key(self) -> Result<Paint, TrackError> {
        Err(confusable::<Paint, Color>())
    }
}

fn confusable<Expected, Found>() -> TrackError {
    TrackError::ConfusableKey {
        expected: short_type_name::<Expected>(),
        found: short_type_name::<Found>(),
    }
}

fn short_type_name<T>() -> &'static str {
    let full = type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// Status map for a single key domain (`Paint` or `Decal`).
///
/// Hashes like [`IdentityKeyedMap`] (key set only) but with its own salt, so a
/// paint map and a plain keyed map over the same keys never collide.
#[derive(Debug, Clone)]
pub struct StatusMap<K> {
    inner: IdentityKeyedMap<K, Status>,
}

impl<K> Default for StatusMap<K> {
    fn default() -> Self {
        Self {
            inner: IdentityKeyedMap::default(),
        }
    }
}

impl<K: Eq> StatusMap<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track every key in `keys` as not done. Duplicate keys collapse.
    #[must_use]
    pub fn not_done(keys: impl IntoIterator<Item = K>) -> Self {
        let mut map = Self::new();
        for key in keys {
            map.inner.insert_if_absent(key, Status::NotDone);
        }
        map
    }

    /// Set the status for `key`, inserting it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::ConfusableKey`] if `key` is of a look-alike type
    /// (a [`Color`] offered to a paint map).
    pub fn set(&mut self, key: impl IntoStatusKey<K>, status: Status) -> Result<(), TrackError> {
        let key = key.into_status_key()?;
        self.inner.insert(key, status);
        Ok(())
    }

    /// Track `key` as not done unless it is already present.
    pub(crate) fn track(&mut self, key: K) -> bool {
        self.inner.insert_if_absent(key, Status::NotDone)
    }

    /// Update an existing key. Returns `false` if the key is not tracked.
    pub(crate) fn update(&mut self, key: &K, status: Status) -> bool {
        let Some(slot) = self.inner.get_mut(key) else {
            return false;
        };
        *slot = status;
        true
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<Status> {
        self.inner.get(key).copied()
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// Returns `true` if every tracked status is `Done` (vacuously for an empty map).
    #[must_use]
    pub fn all_done(&self) -> bool {
        self.inner.values().all(|s| s.is_done())
    }

    #[must_use]
    pub fn same_keys(&self, other: &Self) -> bool {
        self.inner.same_keys(&other.inner)
    }
}

impl<K> StatusMap<K> {
    #[must_use]
    pub const fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.inner.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, Status)> {
        self.inner.iter().map(|(k, s)| (k, *s))
    }
}

/// Same keys with the same statuses, in any order.
impl<K: Eq> PartialEq for StatusMap<K> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<K: Eq> Eq for StatusMap<K> {}

impl<K: Eq> FromIterator<(K, Status)> for StatusMap<K> {
    fn from_iter<I: IntoIterator<Item = (K, Status)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

impl<K: Hash> Hash for StatusMap<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash_keys_salted(type_name::<Self>(), state);
    }
}

impl<K: fmt::Display> fmt::Display for StatusMap<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, status)) in self.inner.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}: {status}")?;
        }
        f.write_str("}")
    }
}

/// Paint requirements of a part.
pub type PaintMap = StatusMap<Paint>;

/// Decal requirements of a part.
pub type DecalMap = StatusMap<Decal>;
