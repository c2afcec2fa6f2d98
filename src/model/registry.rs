//! Per-file identity registries for threads, thread names and loggers.
//!
//! Each distinct raw value gets one slot carrying a visibility flag and the
//! number of records that reference it. Registries belong to a single loaded
//! file and are rebuilt from scratch on every load.

use std::collections::HashMap;
use std::hash::Hash;

/// Typed slot index into a [`Registry`].
pub trait RegistryId: Copy + Eq {
    fn from_slot(slot: usize) -> Self;
    fn slot(self) -> usize;
}

macro_rules! registry_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(usize);

        impl $name {
            pub fn new(slot: usize) -> Self {
                Self(slot)
            }

            pub fn get(self) -> usize {
                self.0
            }
        }

        impl RegistryId for $name {
            fn from_slot(slot: usize) -> Self {
                Self(slot)
            }

            fn slot(self) -> usize {
                self.0
            }
        }
    };
}

registry_id!(
    /// Identity of a thread (keyed by the raw numeric thread id).
    ThreadRef
);
registry_id!(
    /// Identity of a thread name.
    ThreadNameRef
);
registry_id!(
    /// Identity of a logger.
    LoggerRef
);

/// One registered value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry<K> {
    key: K,
    visible: bool,
    count: usize,
}

impl<K> RegistryEntry<K> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Number of records referencing this value.
    pub fn count(&self) -> usize {
        self.count
    }
}

/// Deduplicating registry keyed by raw value.
#[derive(Debug, Clone)]
pub struct Registry<K, Id> {
    entries: Vec<RegistryEntry<K>>,
    by_key: HashMap<K, Id>,
}

impl<K, Id> Default for Registry<K, Id> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            by_key: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, Id: RegistryId> Registry<K, Id> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `key`, registering it (visible, count 0) if new.
    pub fn intern(&mut self, key: K) -> Id {
        if let Some(id) = self.by_key.get(&key) {
            return *id;
        }
        let id = Id::from_slot(self.entries.len());
        self.by_key.insert(key.clone(), id);
        self.entries.push(RegistryEntry {
            key,
            visible: true,
            count: 0,
        });
        id
    }

    pub fn find(&self, key: &K) -> Option<Id> {
        self.by_key.get(key).copied()
    }

    pub fn get(&self, id: Id) -> Option<&RegistryEntry<K>> {
        self.entries.get(id.slot())
    }

    /// Key for `id`. Ids always come from this registry, so a miss is a bug.
    pub fn key(&self, id: Id) -> Option<&K> {
        self.get(id).map(RegistryEntry::key)
    }

    /// Unknown ids are treated as visible.
    pub fn is_visible(&self, id: Id) -> bool {
        self.get(id).is_none_or(RegistryEntry::is_visible)
    }

    /// Returns true if the flag changed.
    pub fn set_visible(&mut self, id: Id, visible: bool) -> bool {
        match self.entries.get_mut(id.slot()) {
            Some(entry) if entry.visible != visible => {
                entry.visible = visible;
                true
            }
            _ => false,
        }
    }

    /// Mark every entry visible. Returns true if anything changed.
    pub fn show_all(&mut self) -> bool {
        let mut changed = false;
        for entry in &mut self.entries {
            changed |= !entry.visible;
            entry.visible = true;
        }
        changed
    }

    /// Make exactly the given ids visible. Returns true if anything changed.
    pub fn show_only(&mut self, ids: &[Id]) -> bool {
        let mut changed = false;
        for (slot, entry) in self.entries.iter_mut().enumerate() {
            let visible = ids.contains(&Id::from_slot(slot));
            changed |= entry.visible != visible;
            entry.visible = visible;
        }
        changed
    }

    pub fn all_visible(&self) -> bool {
        self.entries.iter().all(RegistryEntry::is_visible)
    }

    /// Keys of every hidden entry.
    pub fn hidden_keys(&self) -> Vec<K> {
        self.entries
            .iter()
            .filter(|entry| !entry.visible)
            .map(|entry| entry.key.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Id, &RegistryEntry<K>)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(slot, entry)| (Id::from_slot(slot), entry))
    }

    pub(crate) fn reset_counts(&mut self) {
        for entry in &mut self.entries {
            entry.count = 0;
        }
    }

    pub(crate) fn bump(&mut self, id: Id) {
        if let Some(entry) = self.entries.get_mut(id.slot()) {
            entry.count += 1;
        }
    }
}

/// The three registries of one loaded file.
#[derive(Debug, Clone, Default)]
pub struct Registries {
    pub threads: Registry<u32, ThreadRef>,
    pub thread_names: Registry<String, ThreadNameRef>,
    pub loggers: Registry<String, LoggerRef>,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no thread, thread name or logger is hidden.
    pub fn all_visible(&self) -> bool {
        self.threads.all_visible() && self.thread_names.all_visible() && self.loggers.all_visible()
    }

    pub fn thread_id(&self, id: ThreadRef) -> u32 {
        self.threads.key(id).copied().unwrap_or_default()
    }

    pub fn thread_name(&self, id: ThreadNameRef) -> &str {
        self.thread_names.key(id).map(String::as_str).unwrap_or_default()
    }

    pub fn logger_name(&self, id: LoggerRef) -> &str {
        self.loggers.key(id).map(String::as_str).unwrap_or_default()
    }
}
