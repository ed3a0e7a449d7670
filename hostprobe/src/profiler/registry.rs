//! Ordered registry of profiler descriptors.

use std::fmt;
use std::sync::Arc;

use super::ProfilerDescriptor;
use super::families;
use crate::error::{ConfigError, ProfilerError, Result};

/// Descriptors in resolution order.
#[derive(Clone, Default)]
pub struct ProfilerRegistry {
    descriptors: Vec<Arc<dyn ProfilerDescriptor>>,
}

impl ProfilerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in families: `linux`, `windows`, `network_device`.
    pub fn builtin() -> Self {
        Self {
            descriptors: vec![
                Arc::new(families::Linux),
                Arc::new(families::Windows),
                Arc::new(families::NetworkDevice),
            ],
        }
    }

    /// Append a descriptor. Names must be unique.
    pub fn register(&mut self, descriptor: Arc<dyn ProfilerDescriptor>) -> Result<()> {
        if self.contains(descriptor.name()) {
            return Err(ProfilerError::DuplicateDescriptor {
                name: descriptor.name().to_string(),
            }
            .into());
        }
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, descriptor: Arc<dyn ProfilerDescriptor>) -> Result<Self> {
        self.register(descriptor)?;
        Ok(self)
    }

    /// Get a descriptor by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ProfilerDescriptor>> {
        self.descriptors.iter().find(|d| d.name() == name)
    }

    /// Check if a descriptor is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// A new registry holding only `names`, in that order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let mut selected = Self::new();
        for name in names {
            let name = name.as_ref();
            let descriptor = self.get(name).ok_or_else(|| ConfigError::UnknownProfiler {
                name: name.to_string(),
            })?;
            selected.register(Arc::clone(descriptor))?;
        }
        Ok(selected)
    }

    /// Descriptors in resolution order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ProfilerDescriptor>> {
        self.descriptors.iter()
    }

    /// Registered names in resolution order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.iter().map(|d| d.name())
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl fmt::Debug for ProfilerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
