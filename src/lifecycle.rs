//! Explicit startup and shutdown hooks.
//!
//! Components that hold reference data implement [`Lifecycle`]; a
//! [`LifecycleGroup`] drives a set of them in registration order.

use core::fmt::Debug;
use std::sync::Arc;

use crate::error::Result;

/// A component with explicit init and shutdown steps.
pub trait Lifecycle: Debug + Send + Sync {
    /// Name used in logs.
    #[inline]
    fn name(&self) -> &'static str {
        core::any::type_name::<Self>()
    }

    /// Prepares the component before it serves traffic.
    ///
    /// # Errors
    ///
    /// Returns an error if the component cannot be initialized.
    fn init(&self) -> Result<()>;

    /// Releases whatever [`init`](Self::init) acquired.
    ///
    /// # Errors
    ///
    /// Returns an error if the component cannot be shut down cleanly.
    fn shutdown(&self) -> Result<()>;
}

/// Ordered set of [`Lifecycle`] components.
///
/// Components are initialized in registration order and shut down in
/// reverse order.
#[derive(Debug, Default)]
pub struct LifecycleGroup {
    /// Registered components, in init order.
    components: Vec<Arc<dyn Lifecycle>>,
}

impl LifecycleGroup {
    /// Creates an empty group.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component and returns the group.
    #[inline]
    #[must_use]
    pub fn with<C: Lifecycle + 'static>(mut self, component: Arc<C>) -> Self {
        self.register(component);
        self
    }

    /// Registers a component.
    #[inline]
    pub fn register<C: Lifecycle + 'static>(&mut self, component: Arc<C>) {
        self.components.push(component);
    }

    /// Number of registered components.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if nothing is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Initializes every component in registration order.
    ///
    /// When a component fails, the ones already initialized are shut down
    /// in reverse order before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the error of the first component that fails to initialize.
    #[tracing::instrument(skip_all)]
    pub fn init_all(&self) -> Result<()> {
        for (position, component) in self.components.iter().enumerate() {
            tracing::debug!(component = component.name(), "initializing");
            if let Err(err) = component.init() {
                tracing::error!(component = component.name(), error = %err, "initialization failed");
                let started = self.components.get(..position).unwrap_or_default();
                for done in started.iter().rev() {
                    if let Err(rollback) = done.shutdown() {
                        tracing::warn!(component = done.name(), error = %rollback, "rollback shutdown failed");
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Shuts every component down in reverse registration order.
    ///
    /// Every component is shut down even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns the first shutdown error encountered.
    #[tracing::instrument(skip_all)]
    pub fn shutdown_all(&self) -> Result<()> {
        let mut first_error = None;
        for component in self.components.iter().rev() {
            tracing::debug!(component = component.name(), "shutting down");
            if let Err(err) = component.shutdown() {
                tracing::warn!(component = component.name(), error = %err, "shutdown failed");
                let _first = first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
