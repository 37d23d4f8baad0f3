use std::{any::Any, collections::HashSet, sync::Arc};

type Shared = Arc<dyn Any + Send + Sync>;

fn identity<T: ?Sized>(value: &Arc<T>) -> usize {
    Arc::as_ptr(value) as *const () as usize
}

/// Shared resources a command buffer keeps alive.
///
/// Entries are deduplicated by allocation identity and iterated in the order
/// they were first added. Holding an entry keeps its allocation alive, so an
/// identity can never be reused while it is in the set.
#[derive(Default)]
pub struct ReferenceSet {
    entries: Vec<Shared>,
    seen: HashSet<usize>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a holder for `value`. Returns `false` if it was already present.
    pub fn add<T: Send + Sync + 'static>(&mut self, value: &Arc<T>) -> bool {
        self.add_shared(value.clone())
    }

    pub fn add_shared(&mut self, value: Arc<dyn Any + Send + Sync>) -> bool {
        if !self.seen.insert(identity(&value)) {
            return false;
        }
        self.entries.push(value);
        true
    }

    pub fn contains<T: ?Sized>(&self, value: &Arc<T>) -> bool {
        self.seen.contains(&identity(value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Any + Send + Sync>> {
        self.entries.iter()
    }

    /// Release every held reference.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.seen.clear();
    }
}

impl std::fmt::Debug for ReferenceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceSet")
            .field("len", &self.entries.len())
            .finish()
    }
}
