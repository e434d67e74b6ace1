//! Abstraction for spawning pipeline loops on a runtime.

use std::future::Future;
use std::pin::Pin;

/// A boxed loop future.
pub type BoxedLoop = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Abstraction for spawning fetch loops, drain loops, worker slots and
/// routine jobs on a runtime.
pub trait Spawn: Send + Sync + 'static {
    /// Spawn a boxed future; it runs detached until it completes.
    fn spawn_boxed(&self, fut: BoxedLoop);
}

/// Convenience methods for every [`Spawn`], including `dyn Spawn`.
pub trait SpawnExt: Spawn {
    /// Spawn a future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn_boxed(Box::pin(fut));
    }
}

impl<S: Spawn + ?Sized> SpawnExt for S {}
