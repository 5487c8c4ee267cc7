use std::any::type_name;
use std::hash::{DefaultHasher, Hash, Hasher};

/// Insertion-ordered map whose hash is derived from its key set alone.
///
/// Two maps with the same keys hash identically no matter the insertion order
/// or the values they hold. The hash is salted with the concrete map type, so
/// a differently-typed map over the same keys hashes differently. This lets
/// maps take part in the value identity of the entities that own them.
///
/// Key sets on parts are small (a handful of paints or decals), so entries
/// live in a vector and lookups are linear.
#[derive(Debug, Clone)]
pub struct IdentityKeyedMap<K, V> {
    entries: Vec<(K, V)>,
}

impl<K, V> Default for IdentityKeyedMap<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: Eq, V> IdentityKeyedMap<K, V> {
    /// Create a new empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update `key`, returning the previous value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(slot) = self.get_mut(&key) {
            return Some(std::mem::replace(slot, value));
        }
        self.entries.push((key, value));
        None
    }

    /// Insert `key` only if it is absent. Returns `true` if inserted.
    pub fn insert_if_absent(&mut self, key: K, value: V) -> bool {
        if self.contains_key(&key) {
            return false;
        }
        self.entries.push((key, value));
        true
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Returns `true` if both maps hold exactly the same keys.
    #[must_use]
    pub fn same_keys<W>(&self, other: &IdentityKeyedMap<K, W>) -> bool {
        self.len() == other.len() && self.keys().all(|k| other.contains_key(k))
    }
}

impl<K, V> IdentityKeyedMap<K, V> {
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

impl<K: Hash, V> IdentityKeyedMap<K, V> {
    /// Feed the order-independent key-set digest, salted with `salt`, into `state`.
    pub(crate) fn hash_keys_salted<H: Hasher>(&self, salt: &str, state: &mut H) {
        let mut digests: Vec<u64> = self
            .entries
            .iter()
            .map(|(k, _)| {
                let mut hasher = DefaultHasher::new();
                k.hash(&mut hasher);
                hasher.finish()
            })
            .collect();
        digests.sort_unstable();

        salt.hash(state);
        digests.hash(state);
    }
}

impl<K: Hash, V> Hash for IdentityKeyedMap<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash_keys_salted(type_name::<Self>(), state);
    }
}

/// Map equality: same key/value pairs, regardless of insertion order.
impl<K: Eq, V: PartialEq> PartialEq for IdentityKeyedMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|o| o == v))
    }
}

impl<K: Eq, V: Eq> Eq for IdentityKeyedMap<K, V> {}

impl<K: Eq, V> FromIterator<(K, V)> for IdentityKeyedMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Eq, V> Extend<(K, V)> for IdentityKeyedMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V> IntoIterator for IdentityKeyedMap<K, V> {
    type Item = (K, V);
    type IntoIter = std::vec::IntoIter<(K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
