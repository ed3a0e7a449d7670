//! One host to inventory.
//!
//! A [`Target`] owns the whole lifecycle for a host: finding a credential
//! and transport that connect, binding a profiler, collecting every
//! category, and scrubbing the result.

mod builder;
mod connect;

pub use builder::TargetBuilder;
pub use connect::Attempt;

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, info};

use crate::channel::ElevationPatterns;
use crate::config::{Credential, ScanConfig};
use crate::error::{ConfigError, ConnectionError, ProfilerError, Result};
use crate::inventory::{self, Inventory};
use crate::profiler::{self, Profiler, ProfilerRegistry};
use crate::scrub;
use crate::session::Session;
use crate::transport::{BackendFactory, TransportKind};

/// A remote host and everything learned about it.
pub struct Target {
    host: String,
    config: Arc<ScanConfig>,
    credentials: Vec<Arc<Credential>>,
    profilers: ProfilerRegistry,
    backends: Arc<dyn BackendFactory>,
    patterns: Arc<ElevationPatterns>,
    scrub: bool,
    session: Option<Session>,
    profiler: Option<Profiler>,
    unavailable: BTreeSet<TransportKind>,
    spent: BTreeSet<(usize, TransportKind)>,
    connected_with: Option<usize>,
    attempts: Vec<Attempt>,
}

impl Target {
    pub(crate) fn new(
        host: String,
        config: Arc<ScanConfig>,
        credentials: Vec<Arc<Credential>>,
        profilers: ProfilerRegistry,
        backends: Arc<dyn BackendFactory>,
        patterns: Arc<ElevationPatterns>,
        scrub: bool,
    ) -> Self {
        Self {
            host,
            config,
            credentials,
            profilers,
            backends,
            patterns,
            scrub,
            session: None,
            profiler: None,
            unavailable: BTreeSet::new(),
            spent: BTreeSet::new(),
            connected_with: None,
            attempts: Vec::new(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Credentials in attempt order.
    pub fn credentials(&self) -> &[Arc<Credential>] {
        &self.credentials
    }

    /// Profilers in resolution order.
    pub fn profilers(&self) -> &ProfilerRegistry {
        &self.profilers
    }

    pub fn scrub_enabled(&self) -> bool {
        self.scrub
    }

    /// The live session, if `connect` succeeded.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_connected)
    }

    pub fn profiler(&self) -> Option<&Profiler> {
        self.profiler.as_ref()
    }

    /// Inventory collected so far, if a profiler is bound.
    pub fn inventory(&self) -> Option<&Inventory> {
        self.profiler.as_ref().map(Profiler::inventory)
    }

    /// Kinds the host has refused for good.
    pub fn unavailable_kinds(&self) -> &BTreeSet<TransportKind> {
        &self.unavailable
    }

    /// Every connect attempt made so far, in order.
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// Close and drop the session. The bound profiler and its inventory
    /// are kept until the next successful `connect`.
    pub async fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            self.mark_spent(&session);
            session.disconnect().await;
        }
    }

    /// Bind the first profiler that recognises the connected host.
    pub async fn resolve_profiler(&mut self) -> Result<&Profiler> {
        let session = self
            .session
            .as_mut()
            .filter(|session| session.is_connected())
            .ok_or(ProfilerError::NoActiveSession)?;
        let profiler = profiler::resolve(session, &self.profilers).await?;
        Ok(self.profiler.insert(profiler))
    }

    /// Bind the profiler called `name` without running its predicate.
    pub fn force_profiler(&mut self, name: &str) -> Result<&Profiler> {
        let descriptor = self
            .profilers
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfiler {
                name: name.to_string(),
            })?;
        let session = self.session.as_ref().ok_or(ProfilerError::NoActiveSession)?;
        let profiler = profiler::force(session, descriptor.as_ref())?;
        Ok(self.profiler.insert(profiler))
    }

    /// Collect every category through the bound profiler.
    pub async fn retrieve_all(&mut self) -> Result<&Inventory> {
        let profiler = self.profiler.as_mut().ok_or(ProfilerError::NotResolved)?;
        let session = self.session.as_mut().ok_or(ConnectionError::NotConnected)?;
        inventory::retrieve_all(profiler, session, &self.config.skip_categories).await?;
        Ok(profiler.inventory())
    }

    /// Normalize the collected inventory in place.
    pub fn scrub(&mut self) -> Result<()> {
        let profiler = self.profiler.as_mut().ok_or(ProfilerError::NotResolved)?;
        scrub::scrub(profiler.inventory_mut());
        Ok(())
    }

    /// Connect, resolve, collect and, if enabled, scrub.
    ///
    /// The session is closed before returning, whatever the outcome.
    pub async fn scan(&mut self) -> Result<&Inventory> {
        if !self.is_connected() && !self.connect().await? {
            return Err(ConnectionError::Exhausted {
                host: self.host.clone(),
                attempts: self.attempts.len(),
            }
            .into());
        }

        let result = self.collect_connected().await;
        self.disconnect().await;
        result?;

        info!("target: {}: scan complete", self.host);
        self.inventory().ok_or_else(|| ProfilerError::NotResolved.into())
    }

    async fn collect_connected(&mut self) -> Result<()> {
        if self.profiler.is_none() {
            self.resolve_profiler().await?;
        }
        self.retrieve_all().await?;
        if self.scrub {
            debug!("target: {}: scrubbing", self.host);
            self.scrub()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Target")
            .field("host", &self.host)
            .field("connected", &self.is_connected())
            .field("profiler", &self.profiler.as_ref().map(Profiler::name))
            .field("unavailable", &self.unavailable)
            .field("attempts", &self.attempts.len())
            .finish()
    }
}
