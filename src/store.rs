use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::seq::IteratorRandom;

/// A value bound to a key. Only byte strings exist today; the enum leaves
/// room for list, hash and set variants without touching the storage layer.
#[derive(Clone, Debug, PartialEq)]
pub enum Entity {
    String(Bytes),
}

impl Entity {
    pub fn type_name(&self) -> &'static str {
        match self {
            Entity::String(_) => "string",
        }
    }
}

/// Concurrent key to entity mapping backing one logical database.
///
/// Iteration is safe under concurrent mutation but does not present a
/// consistent snapshot.
pub struct Store {
    map: DashMap<String, Entity>,
}

impl Store {
    pub fn new() -> Store {
        Store {
            map: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Entity> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    pub fn exists(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Returns 1 if a new key was inserted, 0 if an existing one was
    /// overwritten.
    pub fn put(&self, key: String, entity: Entity) -> usize {
        match self.map.insert(key, entity) {
            Some(_) => 0,
            None => 1,
        }
    }

    /// Inserts only when the key is absent; returns 1 on insert.
    pub fn put_if_absent(&self, key: String, entity: Entity) -> usize {
        match self.map.entry(key) {
            Entry::Occupied(_) => 0,
            Entry::Vacant(vacant) => {
                vacant.insert(entity);
                1
            }
        }
    }

    /// Overwrites only when the key is present; returns 1 on overwrite.
    pub fn put_if_exists(&self, key: String, entity: Entity) -> usize {
        match self.map.entry(key) {
            Entry::Occupied(mut occupied) => {
                occupied.insert(entity);
                1
            }
            Entry::Vacant(_) => 0,
        }
    }

    /// Removes the key; returns the previous entity if there was one.
    pub fn remove(&self, key: &str) -> Option<Entity> {
        self.map.remove(key).map(|(_, entity)| entity)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.map.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn for_each(&self, mut consumer: impl FnMut(&str, &Entity)) {
        for entry in self.map.iter() {
            consumer(entry.key(), entry.value());
        }
    }

    /// Uniformly samples `limit` keys; the result may contain duplicates.
    pub fn random_keys(&self, limit: usize) -> Vec<String> {
        let mut rng = rand::thread_rng();
        let mut result = Vec::with_capacity(limit);
        for _ in 0..limit {
            if let Some(key) = self.map.iter().map(|e| e.key().clone()).choose(&mut rng) {
                result.push(key);
            }
        }
        result
    }

    /// Uniformly samples up to `limit` distinct keys.
    pub fn random_distinct_keys(&self, limit: usize) -> Vec<String> {
        let mut rng = rand::thread_rng();
        self.map
            .iter()
            .map(|e| e.key().clone())
            .choose_multiple(&mut rng, limit)
    }

    pub fn clear(&self) {
        self.map.clear();
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
