//! The collection pass.

use std::collections::BTreeSet;

use log::{debug, info, warn};

use super::Category;
use crate::error::Result;
use crate::profiler::Profiler;
use crate::session::Session;

/// Run every category getter in collection order, storing the results in
/// the profiler's inventory.
///
/// A failing getter stores its category's template default and the pass
/// continues. Fatal errors abort the pass and are returned. Categories in
/// `skip` are not queried.
pub async fn retrieve_all(
    profiler: &mut Profiler,
    session: &mut Session,
    skip: &BTreeSet<Category>,
) -> Result<()> {
    let host = session.host().to_string();
    info!("collect: {}: starting with profiler {}", host, profiler.name());

    for category in Category::COLLECTION_ORDER {
        if skip.contains(&category) {
            debug!("collect: {}: skipping {}", host, category);
            profiler.inventory_mut().insert(category, category.default_data());
            continue;
        }

        let data = match profiler.collect(category, session).await {
            Ok(data) => match data.check(category) {
                Ok(()) => data,
                Err(e) => {
                    warn!("collect: {}: {} getter returned bad records: {}", host, category, e);
                    category.default_data()
                }
            },
            Err(e) if e.is_fatal() => {
                warn!("collect: {}: aborting at {}: {}", host, category, e);
                return Err(e);
            }
            Err(e) => {
                warn!("collect: {}: {} failed, using defaults: {}", host, category, e);
                category.default_data()
            }
        };

        debug!("collect: {}: {} -> {} record(s)", host, category, data.records().len());
        profiler.inventory_mut().insert(category, data);
    }

    info!(
        "collect: {}: done ({} cache hits, {} misses)",
        host,
        profiler.cache().hits(),
        profiler.cache().misses()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::error::{CollectError, TransportError};
    use crate::inventory::{CategoryData, Record};
    use crate::mock::MockWmi;
    use crate::profiler::{Context, Family, ProfilerDescriptor};
    use crate::session::WmiSession;
    use crate::transport::TransportKind;

    /// Records which getters ran; hardware fails, services disconnects on demand.
    struct Recording {
        calls: Arc<Mutex<Vec<Category>>>,
        disconnect_on_services: bool,
    }

    impl Recording {
        fn note(&self, category: Category) {
            self.calls.lock().unwrap().push(category);
        }
    }

    #[async_trait]
    impl Family for Recording {
        async fn file_systems(&self, _cx: &mut Context<'_>) -> Result<Vec<Record>> {
            self.note(Category::FileSystems);
            let mut record = Record::new(Category::FileSystems);
            record.set("name", "C:")?;
            Ok(vec![record])
        }

        async fn hardware(&self, _cx: &mut Context<'_>) -> Result<Record> {
            self.note(Category::Hardware);
            Err(CollectError::Malformed {
                category: Category::Hardware,
                message: "garbled".to_string(),
            }
            .into())
        }

        async fn shares(&self, _cx: &mut Context<'_>) -> Result<Vec<Record>> {
            self.note(Category::Shares);
            // Wrong category on purpose
            Ok(vec![Record::new(Category::Services)])
        }

        async fn applications(&self, _cx: &mut Context<'_>) -> Result<Vec<Record>> {
            self.note(Category::Applications);
            Ok(Vec::new())
        }

        async fn local_accounts(&self, _cx: &mut Context<'_>) -> Result<Vec<Record>> {
            self.note(Category::LocalAccounts);
            Ok(Vec::new())
        }

        async fn patches(&self, _cx: &mut Context<'_>) -> Result<Vec<Record>> {
            self.note(Category::Patches);
            Ok(Vec::new())
        }

        async fn services(&self, _cx: &mut Context<'_>) -> Result<Vec<Record>> {
            self.note(Category::Services);
            if self.disconnect_on_services {
                return Err(TransportError::Disconnected.into());
            }
            Ok(Vec::new())
        }

        async fn network_identity(&self, _cx: &mut Context<'_>) -> Result<Record> {
            self.note(Category::NetworkIdentity);
            Ok(Record::new(Category::NetworkIdentity))
        }

        async fn network_interfaces(&self, _cx: &mut Context<'_>) -> Result<Vec<Record>> {
            self.note(Category::NetworkInterfaces);
            Ok(Vec::new())
        }

        async fn operating_system(&self, _cx: &mut Context<'_>) -> Result<Record> {
            self.note(Category::OperatingSystem);
            Ok(Record::new(Category::OperatingSystem))
        }
    }

    struct Descriptor {
        calls: Arc<Mutex<Vec<Category>>>,
        disconnect_on_services: bool,
    }

    #[async_trait]
    impl ProfilerDescriptor for Descriptor {
        fn name(&self) -> &str {
            "recording"
        }

        fn kind(&self) -> TransportKind {
            TransportKind::Wmi
        }

        async fn matches(&self, _session: &mut Session) -> Result<bool> {
            Ok(true)
        }

        fn family(&self) -> Arc<dyn Family> {
            Arc::new(Recording {
                calls: Arc::clone(&self.calls),
                disconnect_on_services: self.disconnect_on_services,
            })
        }
    }

    async fn setup(disconnect_on_services: bool) -> (Profiler, Session, Arc<Mutex<Vec<Category>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let descriptor = Descriptor {
            calls: Arc::clone(&calls),
            disconnect_on_services,
        };
        let mut session = Session::Wmi(WmiSession::new("win01", "admin", Box::new(MockWmi::new())));
        session.connect().await.unwrap();
        let profiler = crate::profiler::force(&session, &descriptor).unwrap();
        (profiler, session, calls)
    }

    #[tokio::test]
    async fn test_fixed_order_and_degradation() {
        let (mut profiler, mut session, calls) = setup(false).await;

        retrieve_all(&mut profiler, &mut session, &BTreeSet::new()).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), Category::COLLECTION_ORDER.to_vec());
        let inventory = profiler.inventory();
        assert_eq!(
            inventory.categories().collect::<Vec<_>>(),
            Category::COLLECTION_ORDER.to_vec()
        );
        assert_eq!(inventory.records(Category::FileSystems).len(), 1);
        assert_eq!(
            inventory.get(Category::Hardware),
            Some(&CategoryData::Single(Record::new(Category::Hardware)))
        );
        assert!(inventory.records(Category::Shares).is_empty());
        for category in Category::COLLECTION_ORDER {
            assert!(inventory.records(category).iter().all(Record::conforms));
        }
    }

    #[tokio::test]
    async fn test_skipped_categories_not_queried() {
        let (mut profiler, mut session, calls) = setup(false).await;
        let skip = BTreeSet::from([Category::Patches, Category::Applications]);

        retrieve_all(&mut profiler, &mut session, &skip).await.unwrap();

        let calls = calls.lock().unwrap();
        assert!(!calls.contains(&Category::Patches));
        assert!(!calls.contains(&Category::Applications));
        assert_eq!(
            profiler.inventory().get(Category::Patches),
            Some(&CategoryData::Many(Vec::new()))
        );
    }

    #[tokio::test]
    async fn test_disconnect_aborts() {
        let (mut profiler, mut session, calls) = setup(true).await;

        let err = retrieve_all(&mut profiler, &mut session, &BTreeSet::new()).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(calls.lock().unwrap().last(), Some(&Category::Services));
        assert!(profiler.inventory().get(Category::NetworkIdentity).is_none());
    }
}
