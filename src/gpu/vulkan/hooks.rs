use std::fmt;

use super::Queue;

/// Ordered callbacks taking a context value `&T`.
pub struct HookContainer<T: ?Sized> {
    hooks: Vec<Box<dyn Fn(&T) + Send + Sync>>,
}

/// Hooks run right before a command buffer is submitted to a queue.
pub type PreExecuteHooks = HookContainer<Queue>;

impl<T: ?Sized> Default for HookContainer<T> {
    fn default() -> Self {
        Self { hooks: Vec::new() }
    }
}

impl<T: ?Sized> HookContainer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&mut self, hook: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.hooks.push(Box::new(hook));
    }

    /// Invoke every hook once, in insertion order. Hooks are kept.
    pub fn run(&self, ctx: &T) {
        for hook in &self.hooks {
            hook(ctx);
        }
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl<T: ?Sized> fmt::Debug for HookContainer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookContainer")
            .field("len", &self.hooks.len())
            .finish()
    }
}
