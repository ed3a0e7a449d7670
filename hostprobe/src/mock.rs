//! Scripted collaborators for unit tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};

use crate::config::Credential;
use crate::error::TransportError;
use crate::transport::{
    BackendFactory, ChannelEvent, Endpoint, Row, ShellBackend, ShellChannel, SnmpBackend, TransportKind,
    Varbind, WmiBackend,
};

type Failure = fn() -> TransportError;

/// A channel replaying a fixed list of events.
#[derive(Debug, Default)]
pub struct MockChannel {
    events: VecDeque<ChannelEvent>,
    sent: Vec<String>,
    closed: bool,
    dropped: bool,
}

impl MockChannel {
    pub fn new(events: Vec<ChannelEvent>) -> Self {
        Self {
            events: events.into(),
            ..Self::default()
        }
    }

    /// Channel producing only stdout chunks.
    pub fn stdout(chunks: &[&str]) -> Self {
        Self::new(
            chunks
                .iter()
                .map(|chunk| ChannelEvent::Stdout(Bytes::copy_from_slice(chunk.as_bytes())))
                .collect(),
        )
    }

    /// Lose the connection once the scripted events run out.
    pub fn drop_connection(mut self) -> Self {
        self.dropped = true;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Events not yet read.
    pub fn remaining(&self) -> usize {
        self.events.len()
    }

    /// Everything written to the channel.
    pub fn sent(&self) -> Vec<String> {
        self.sent.clone()
    }
}

#[async_trait]
impl ShellChannel for MockChannel {
    async fn next_event(&mut self) -> Result<Option<ChannelEvent>, TransportError> {
        if self.closed {
            return Ok(None);
        }
        match self.events.pop_front() {
            Some(event) => Ok(Some(event)),
            None if self.dropped => Err(TransportError::Disconnected),
            None => Ok(None),
        }
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.sent.push(String::from_utf8_lossy(data).into_owned());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        Ok(())
    }
}

/// Shell collaborator with scripted command output.
#[derive(Clone, Default)]
pub struct MockShell {
    commands: HashMap<String, Vec<String>>,
    dropped: BTreeSet<String>,
    connect_failure: Option<Failure>,
    executed: Arc<Mutex<Vec<String>>>,
}

impl MockShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the stdout chunks for `command`.
    pub fn command(mut self, command: &str, chunks: &[&str]) -> Self {
        self.commands
            .insert(command.to_string(), chunks.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Like `command`, but the connection drops after the last chunk.
    pub fn command_dropped(mut self, command: &str, chunks: &[&str]) -> Self {
        self.dropped.insert(command.to_string());
        self.command(command, chunks)
    }

    pub fn fail_connect(mut self, failure: Failure) -> Self {
        self.connect_failure = Some(failure);
        self
    }

    /// Commands executed so far.
    pub fn executed(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.executed)
    }
}

#[async_trait]
impl ShellBackend for MockShell {
    async fn connect(&mut self) -> Result<(), TransportError> {
        match self.connect_failure {
            Some(failure) => Err(failure()),
            None => Ok(()),
        }
    }

    async fn exec(&mut self, command: &str) -> Result<Box<dyn ShellChannel>, TransportError> {
        self.executed.lock().unwrap().push(command.to_string());
        let chunks = self.commands.get(command).cloned().unwrap_or_default();
        let chunks: Vec<&str> = chunks.iter().map(String::as_str).collect();
        let channel = MockChannel::stdout(&chunks);
        if self.dropped.contains(command) {
            return Ok(Box::new(channel.drop_connection()));
        }
        Ok(Box::new(channel))
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// WMI collaborator with scripted query results and registry contents.
#[derive(Clone, Default)]
pub struct MockWmi {
    queries: HashMap<String, Vec<Row>>,
    query_failures: HashMap<String, Failure>,
    keys: HashMap<String, Vec<String>>,
    values: HashMap<String, Row>,
    connect_failure: Option<Failure>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockWmi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: &str, rows: Vec<Row>) -> Self {
        self.queries.insert(query.to_string(), rows);
        self
    }

    pub fn query_error(mut self, query: &str, failure: Failure) -> Self {
        self.query_failures.insert(query.to_string(), failure);
        self
    }

    pub fn registry_key(mut self, path: &str, subkeys: &[&str]) -> Self {
        self.keys
            .insert(path.to_string(), subkeys.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn registry_value(mut self, path: &str, name: &str, value: &str) -> Self {
        self.values
            .entry(path.to_string())
            .or_default()
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn fail_connect(mut self, failure: Failure) -> Self {
        self.connect_failure = Some(failure);
        self
    }

    /// Queries and registry reads issued so far.
    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl WmiBackend for MockWmi {
    async fn connect(&mut self) -> Result<(), TransportError> {
        match self.connect_failure {
            Some(failure) => Err(failure()),
            None => Ok(()),
        }
    }

    async fn query(&mut self, query: &str) -> Result<Vec<Row>, TransportError> {
        self.calls.lock().unwrap().push(query.to_string());
        if let Some(failure) = self.query_failures.get(query) {
            return Err(failure());
        }
        Ok(self.queries.get(query).cloned().unwrap_or_default())
    }

    async fn registry_keys(&mut self, path: &str) -> Result<Vec<String>, TransportError> {
        self.calls.lock().unwrap().push(format!("keys:{path}"));
        Ok(self.keys.get(path).cloned().unwrap_or_default())
    }

    async fn registry_values(&mut self, path: &str) -> Result<Row, TransportError> {
        self.calls.lock().unwrap().push(format!("values:{path}"));
        Ok(self.values.get(path).cloned().unwrap_or_default())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// SNMP collaborator with scripted walks.
#[derive(Clone, Default)]
pub struct MockSnmp {
    walks: HashMap<String, Vec<Varbind>>,
    walk_failures: HashMap<String, Failure>,
    connect_failure: Option<Failure>,
}

impl MockSnmp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn walk(mut self, prefix: &str, varbinds: Vec<Varbind>) -> Self {
        self.walks.insert(prefix.to_string(), varbinds);
        self
    }

    pub fn walk_error(mut self, prefix: &str, failure: Failure) -> Self {
        self.walk_failures.insert(prefix.to_string(), failure);
        self
    }

    pub fn fail_connect(mut self, failure: Failure) -> Self {
        self.connect_failure = Some(failure);
        self
    }
}

#[async_trait]
impl SnmpBackend for MockSnmp {
    async fn connect(&mut self) -> Result<(), TransportError> {
        match self.connect_failure {
            Some(failure) => Err(failure()),
            None => Ok(()),
        }
    }

    fn walk<'a>(&'a mut self, prefix: &'a str) -> BoxStream<'a, Result<Varbind, TransportError>> {
        if let Some(failure) = self.walk_failures.get(prefix) {
            return stream::iter(vec![Err(failure())]).boxed();
        }
        let varbinds = self.walks.get(prefix).cloned().unwrap_or_default();
        stream::iter(varbinds.into_iter().map(Ok)).boxed()
    }
}

/// Factory handing out clones of scripted collaborators.
///
/// Connect failures are keyed by `(user, kind)`; every factory call is
/// logged so tests can assert the attempt sequence.
#[derive(Clone, Default)]
pub struct MockBackends {
    pub shell: MockShell,
    pub wmi: MockWmi,
    pub snmp: MockSnmp,
    failures: Arc<Mutex<HashMap<(String, TransportKind), Failure>>>,
    unserved: BTreeSet<TransportKind>,
    attempts: Arc<Mutex<Vec<(String, TransportKind)>>>,
}

impl MockBackends {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(mut self, shell: MockShell) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_wmi(mut self, wmi: MockWmi) -> Self {
        self.wmi = wmi;
        self
    }

    pub fn with_snmp(mut self, snmp: MockSnmp) -> Self {
        self.snmp = snmp;
        self
    }

    /// Fail connects for `user` over `kind`.
    pub fn fail(self, user: &str, kind: TransportKind, failure: Failure) -> Self {
        self.fail_from_now(user, kind, failure);
        self
    }

    /// Fail later connects for `user` over `kind`, also through clones
    /// already handed out.
    pub fn fail_from_now(&self, user: &str, kind: TransportKind, failure: Failure) {
        self.failures.lock().unwrap().insert((user.to_string(), kind), failure);
    }

    /// Refuse to build collaborators for `kind`.
    pub fn unserved(mut self, kind: TransportKind) -> Self {
        self.unserved.insert(kind);
        self
    }

    /// Shared log of `(user, kind)` factory calls.
    pub fn attempts(&self) -> Arc<Mutex<Vec<(String, TransportKind)>>> {
        Arc::clone(&self.attempts)
    }

    fn record(&self, credential: &Credential, kind: TransportKind) -> Option<Option<Failure>> {
        self.attempts.lock().unwrap().push((credential.user.clone(), kind));
        if self.unserved.contains(&kind) {
            return None;
        }
        Some(self.failures.lock().unwrap().get(&(credential.user.clone(), kind)).copied())
    }
}

impl BackendFactory for MockBackends {
    fn shell(&self, _endpoint: &Endpoint, credential: &Credential) -> Option<Box<dyn ShellBackend>> {
        let failure = self.record(credential, TransportKind::Ssh)?;
        let mut shell = self.shell.clone();
        shell.connect_failure = failure.or(shell.connect_failure);
        Some(Box::new(shell))
    }

    fn wmi(&self, _endpoint: &Endpoint, credential: &Credential) -> Option<Box<dyn WmiBackend>> {
        let failure = self.record(credential, TransportKind::Wmi)?;
        let mut wmi = self.wmi.clone();
        wmi.connect_failure = failure.or(wmi.connect_failure);
        Some(Box::new(wmi))
    }

    fn snmp(&self, _endpoint: &Endpoint, credential: &Credential) -> Option<Box<dyn SnmpBackend>> {
        let failure = self.record(credential, TransportKind::Snmp)?;
        let mut snmp = self.snmp.clone();
        snmp.connect_failure = failure.or(snmp.connect_failure);
        Some(Box::new(snmp))
    }
}

/// A row from `(name, value)` pairs.
pub fn row(pairs: &[(&str, &str)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
