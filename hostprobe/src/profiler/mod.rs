//! Profiler families and their resolution.
//!
//! A [`ProfilerDescriptor`] names a family, the transport kind it speaks,
//! and a predicate telling whether a connected session belongs to it.
//! Resolution binds the first matching descriptor into a [`Profiler`],
//! which owns the lookup cache and the collected inventory.

mod cache;
pub mod families;
mod registry;
mod resolve;

pub use cache::{Lookup, LookupCache};
pub use registry::ProfilerRegistry;
pub use resolve::{force, resolve};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Result, TransportError};
use crate::inventory::{Category, CategoryData, Inventory, Record};
use crate::session::{LINE_FIELD, Session, WmiSession};
use crate::transport::{Row, TransportKind};

/// Describes a profiler family and how to recognise its hosts.
#[async_trait]
pub trait ProfilerDescriptor: Send + Sync {
    /// Unique name used in configuration.
    fn name(&self) -> &str;

    /// Transport kind the family speaks.
    fn kind(&self) -> TransportKind;

    /// Whether the connected session belongs to this family.
    async fn matches(&self, session: &mut Session) -> Result<bool>;

    /// Category getters for this family.
    fn family(&self) -> Arc<dyn Family>;
}

/// Category getters of one profiler family.
///
/// Every getter defaults to the category's template default, so a family
/// only implements what its transport can answer.
#[async_trait]
pub trait Family: Send + Sync {
    async fn file_systems(&self, _cx: &mut Context<'_>) -> Result<Vec<Record>> {
        Ok(Vec::new())
    }

    async fn hardware(&self, _cx: &mut Context<'_>) -> Result<Record> {
        Ok(Record::new(Category::Hardware))
    }

    async fn shares(&self, _cx: &mut Context<'_>) -> Result<Vec<Record>> {
        Ok(Vec::new())
    }

    async fn applications(&self, _cx: &mut Context<'_>) -> Result<Vec<Record>> {
        Ok(Vec::new())
    }

    async fn local_accounts(&self, _cx: &mut Context<'_>) -> Result<Vec<Record>> {
        Ok(Vec::new())
    }

    async fn patches(&self, _cx: &mut Context<'_>) -> Result<Vec<Record>> {
        Ok(Vec::new())
    }

    async fn services(&self, _cx: &mut Context<'_>) -> Result<Vec<Record>> {
        Ok(Vec::new())
    }

    async fn network_identity(&self, _cx: &mut Context<'_>) -> Result<Record> {
        Ok(Record::new(Category::NetworkIdentity))
    }

    async fn network_interfaces(&self, _cx: &mut Context<'_>) -> Result<Vec<Record>> {
        Ok(Vec::new())
    }

    async fn operating_system(&self, _cx: &mut Context<'_>) -> Result<Record> {
        Ok(Record::new(Category::OperatingSystem))
    }
}

/// What a getter works with: the live session and the profiler's cache.
pub struct Context<'a> {
    pub session: &'a mut Session,
    pub cache: &'a mut LookupCache,
}

impl Context<'_> {
    /// All rows of a query.
    pub async fn run(&mut self, query: &str) -> Result<Vec<Row>> {
        self.session.run(query, None).await
    }

    /// Output lines of a shell command.
    pub async fn lines(&mut self, command: &str) -> Result<Vec<String>> {
        Ok(self
            .run(command)
            .await?
            .into_iter()
            .filter_map(|mut row| row.swap_remove(LINE_FIELD))
            .collect())
    }

    /// First output line of a shell command, trimmed.
    pub async fn line(&mut self, command: &str) -> Result<Option<String>> {
        Ok(self
            .session
            .value_at(command)
            .await?
            .and_then(|mut row| row.swap_remove(LINE_FIELD))
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty()))
    }

    /// First row of a query.
    pub async fn value_at(&mut self, query: &str) -> Result<Option<Row>> {
        self.session.value_at(query).await
    }

    /// First row of a query, memoised.
    pub async fn cached_value_at(&mut self, query: &str) -> Result<Option<Row>> {
        if let Some(row) = self.cache.value(query) {
            return Ok(row);
        }
        let row = self.session.value_at(query).await?;
        self.cache.store_value(query, row.clone());
        Ok(row)
    }

    /// Registry subkeys, memoised.
    pub async fn registry_keys(&mut self, path: &str) -> Result<Vec<String>> {
        if let Some(keys) = self.cache.registry_keys(path) {
            return Ok(keys);
        }
        let keys = self.wmi()?.registry_keys(path).await?;
        self.cache.store_registry_keys(path, keys.clone());
        Ok(keys)
    }

    /// Registry values, memoised.
    pub async fn registry_values(&mut self, path: &str) -> Result<Row> {
        if let Some(values) = self.cache.registry_values(path) {
            return Ok(values);
        }
        let values = self.wmi()?.registry_values(path).await?;
        self.cache.store_registry_values(path, values.clone());
        Ok(values)
    }

    fn wmi(&mut self) -> Result<&mut WmiSession> {
        let kind = self.session.kind();
        self.session.as_wmi_mut().ok_or_else(|| {
            TransportError::Other {
                message: format!("registry reads need a wmi session, not {kind}"),
            }
            .into()
        })
    }
}

/// A descriptor bound to a host, with its cache and collected data.
pub struct Profiler {
    name: String,
    kind: TransportKind,
    family: Arc<dyn Family>,
    cache: LookupCache,
    inventory: Inventory,
}

impl Profiler {
    pub(crate) fn bind(descriptor: &dyn ProfilerDescriptor) -> Self {
        Self {
            name: descriptor.name().to_string(),
            kind: descriptor.kind(),
            family: descriptor.family(),
            cache: LookupCache::new(),
            inventory: Inventory::new(),
        }
    }

    /// Name of the bound descriptor.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transport kind of the bound descriptor.
    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn cache(&self) -> &LookupCache {
        &self.cache
    }

    /// Data collected so far.
    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn inventory_mut(&mut self) -> &mut Inventory {
        &mut self.inventory
    }

    pub fn into_inventory(self) -> Inventory {
        self.inventory
    }

    /// Run one category getter.
    pub async fn collect(&mut self, category: Category, session: &mut Session) -> Result<CategoryData> {
        let family = Arc::clone(&self.family);
        let mut cx = Context {
            session,
            cache: &mut self.cache,
        };
        let data = match category {
            Category::FileSystems => CategoryData::Many(family.file_systems(&mut cx).await?),
            Category::Hardware => CategoryData::Single(family.hardware(&mut cx).await?),
            Category::Shares => CategoryData::Many(family.shares(&mut cx).await?),
            Category::Applications => CategoryData::Many(family.applications(&mut cx).await?),
            Category::LocalAccounts => CategoryData::Many(family.local_accounts(&mut cx).await?),
            Category::Patches => CategoryData::Many(family.patches(&mut cx).await?),
            Category::Services => CategoryData::Many(family.services(&mut cx).await?),
            Category::NetworkIdentity => CategoryData::Single(family.network_identity(&mut cx).await?),
            Category::NetworkInterfaces => CategoryData::Many(family.network_interfaces(&mut cx).await?),
            Category::OperatingSystem => CategoryData::Single(family.operating_system(&mut cx).await?),
        };
        Ok(data)
    }
}

impl fmt::Debug for Profiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profiler")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("cache", &self.cache)
            .field("inventory", &self.inventory)
            .finish()
    }
}
