use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock};

/// Per-project lookup table shared by the resolvers.
///
/// Entries of one project are never visible to another. Within a refresh the
/// first value seen for a key wins, and a refresh replaces everything the
/// project had cached.
#[derive(Debug)]
pub(crate) struct ProjectCache<K, V> {
    projects: RwLock<HashMap<String, HashMap<K, V>>>,
}

/// Name -> id.
pub(crate) type NameCache = ProjectCache<String, i64>;

impl<K, V> Default for ProjectCache<K, V> {
    fn default() -> Self {
        Self {
            projects: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> ProjectCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub(crate) fn get<Q>(&self, project_id: &str, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.projects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(project_id)
            .and_then(|entries| entries.get(key))
            .cloned()
    }

    /// Add one entry; an existing entry for the key is kept.
    pub(crate) fn record(&self, project_id: &str, key: K, value: V) {
        self.projects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(project_id.to_string())
            .or_default()
            .entry(key)
            .or_insert(value);
    }

    /// Drop what `project_id` had cached and load `entries` instead.
    /// Returns the number of entries now cached for the project.
    pub(crate) fn replace(&self, project_id: &str, entries: impl IntoIterator<Item = (K, V)>) -> usize {
        let mut fresh = HashMap::new();
        for (key, value) in entries {
            fresh.entry(key).or_insert(value);
        }
        let len = fresh.len();
        self.projects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(project_id.to_string(), fresh);
        len
    }
}
