//! Network devices over SNMP.
//!
//! Uses MIB-II (`system`, `ifTable`, `ipAddrTable`), the IF-MIB `ifXTable`
//! names, and the chassis entry of the ENTITY-MIB.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;

use super::field;
use crate::error::Result;
use crate::inventory::{Category, Record, Value};
use crate::profiler::{Context, Family, ProfilerDescriptor};
use crate::session::{OID_FIELD, Session, VALUE_FIELD};
use crate::transport::{Row, TransportKind};

pub const SYS_DESCR: &str = "1.3.6.1.2.1.1.1";
pub const SYS_NAME: &str = "1.3.6.1.2.1.1.5";

const IF_DESCR: &str = "1.3.6.1.2.1.2.2.1.2";
const IF_SPEED: &str = "1.3.6.1.2.1.2.2.1.5";
const IF_PHYS_ADDRESS: &str = "1.3.6.1.2.1.2.2.1.6";
const IF_NAME: &str = "1.3.6.1.2.1.31.1.1.1.1";
const IP_AD_ENT_IF_INDEX: &str = "1.3.6.1.2.1.4.20.1.2";
const IP_AD_ENT_NET_MASK: &str = "1.3.6.1.2.1.4.20.1.3";

const ENT_PHYSICAL_CLASS: &str = "1.3.6.1.2.1.47.1.1.1.1.5";
const ENT_PHYSICAL_FIRMWARE_REV: &str = "1.3.6.1.2.1.47.1.1.1.1.9";
const ENT_PHYSICAL_SERIAL_NUM: &str = "1.3.6.1.2.1.47.1.1.1.1.11";
const ENT_PHYSICAL_MFG_NAME: &str = "1.3.6.1.2.1.47.1.1.1.1.12";
const ENT_PHYSICAL_MODEL_NAME: &str = "1.3.6.1.2.1.47.1.1.1.1.13";

/// `entPhysicalClass` value of a chassis.
const CLASS_CHASSIS: &str = "3";

static VERSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bversion\s+([^\s,]+)").unwrap());

/// Network device family, matched by a `sysDescr` answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkDevice;

#[async_trait]
impl ProfilerDescriptor for NetworkDevice {
    fn name(&self) -> &str {
        "network_device"
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Snmp
    }

    async fn matches(&self, session: &mut Session) -> Result<bool> {
        Ok(session.value_at(SYS_DESCR).await?.is_some())
    }

    fn family(&self) -> Arc<dyn Family> {
        Arc::new(NetworkDevice)
    }
}

/// Index part of `oid` below `prefix`.
fn index_of<'a>(oid: &'a str, prefix: &str) -> Option<&'a str> {
    oid.strip_prefix(prefix)?.strip_prefix('.')
}

/// Walk `prefix` into an `index → value` map.
async fn table(cx: &mut Context<'_>, prefix: &str) -> Result<BTreeMap<String, String>> {
    Ok(cx
        .run(prefix)
        .await?
        .iter()
        .filter_map(|row| {
            let index = index_of(row.get(OID_FIELD)?, prefix)?;
            Some((index.to_string(), row.get(VALUE_FIELD)?.clone()))
        })
        .collect())
}

/// Value of the exact object `oid`.
async fn scalar(cx: &mut Context<'_>, oid: &str) -> Result<Option<String>> {
    let row: Option<Row> = cx.value_at(oid).await?;
    Ok(row
        .filter(|r| r.get(OID_FIELD).is_some_and(|o| o == oid || index_of(o, oid) == Some("0")))
        .and_then(|r| field(&r, VALUE_FIELD).map(str::to_string)))
}

/// Colon-separated uppercase MAC from the agent's rendering.
fn format_mac(raw: &str) -> Option<String> {
    let hex: String = match raw.trim().strip_prefix("0x") {
        Some(hex) => hex.to_string(),
        None => raw.chars().filter(|c| c.is_ascii_hexdigit()).collect(),
    };
    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let pairs: Vec<&str> = (0..6).map(|i| &hex[i * 2..i * 2 + 2]).collect();
    Some(pairs.join(":").to_ascii_uppercase())
}

#[async_trait]
impl Family for NetworkDevice {
    async fn hardware(&self, cx: &mut Context<'_>) -> Result<Record> {
        let mut record = Record::new(Category::Hardware);
        let classes = table(cx, ENT_PHYSICAL_CLASS).await?;
        let Some(chassis) = classes
            .iter()
            .find(|(_, class)| class.trim() == CLASS_CHASSIS)
            .map(|(index, _)| index.clone())
        else {
            return Ok(record);
        };

        for (name, base) in [
            ("vendor", ENT_PHYSICAL_MFG_NAME),
            ("model", ENT_PHYSICAL_MODEL_NAME),
            ("serial_number", ENT_PHYSICAL_SERIAL_NUM),
            ("bios_version", ENT_PHYSICAL_FIRMWARE_REV),
        ] {
            let oid = format!("{base}.{chassis}");
            record.set(name, scalar(cx, &oid).await?)?;
        }
        Ok(record)
    }

    async fn network_identity(&self, cx: &mut Context<'_>) -> Result<Record> {
        let sys_name = scalar(cx, SYS_NAME).await?;
        let (hostname, domain) = match sys_name.as_deref().and_then(|n| n.split_once('.')) {
            Some((host, domain)) => (Some(host.to_string()), Some(domain.to_string())),
            None => (sys_name.clone(), None),
        };
        let fqdn = domain.as_ref().and(sys_name);

        let mut record = Record::new(Category::NetworkIdentity);
        record
            .set("hostname", hostname)?
            .set("domain", domain)?
            .set("fqdn", fqdn)?;
        Ok(record)
    }

    async fn network_interfaces(&self, cx: &mut Context<'_>) -> Result<Vec<Record>> {
        let descriptions = table(cx, IF_DESCR).await?;
        let names = table(cx, IF_NAME).await?;
        let speeds = table(cx, IF_SPEED).await?;
        let macs = table(cx, IF_PHYS_ADDRESS).await?;
        let address_index = table(cx, IP_AD_ENT_IF_INDEX).await?;
        let masks = table(cx, IP_AD_ENT_NET_MASK).await?;

        // ipAddrTable is indexed by address; invert to interface index
        let mut addresses: BTreeMap<&str, Vec<(&str, Option<&String>)>> = BTreeMap::new();
        for (address, if_index) in &address_index {
            addresses
                .entry(if_index.trim())
                .or_default()
                .push((address.as_str(), masks.get(address)));
        }

        let mut indices: Vec<&String> = descriptions.keys().collect();
        indices.sort_by_key(|i| i.parse::<u64>().unwrap_or(u64::MAX));

        let mut records = Vec::new();
        for index in indices {
            let bound = addresses.get(index.as_str());
            let ips: Vec<String> = bound
                .into_iter()
                .flatten()
                .map(|(ip, _)| ip.to_string())
                .collect();
            let netmasks: Vec<String> = bound
                .into_iter()
                .flatten()
                .filter_map(|(_, mask)| mask.map(|m| m.trim().to_string()))
                .collect();

            let mut record = Record::new(Category::NetworkInterfaces);
            record
                .set("name", names.get(index).or_else(|| descriptions.get(index)))?
                .set("mac_address", macs.get(index).and_then(|m| format_mac(m)))?
                .set("ip_addresses", ips)?
                .set("netmasks", netmasks)?
                .set("speed", speeds.get(index).map(|s| Value::parse_integer(s)))?
                .set("model", descriptions.get(index))?;
            records.push(record);
        }
        Ok(records)
    }

    async fn operating_system(&self, cx: &mut Context<'_>) -> Result<Record> {
        let descr = scalar(cx, SYS_DESCR).await?;
        let name = descr
            .as_deref()
            .and_then(|d| d.lines().map(str::trim).find(|l| !l.is_empty()));
        let version = descr
            .as_deref()
            .and_then(|d| VERSION.captures(d))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str());

        let mut record = Record::new(Category::OperatingSystem);
        record.set("name", name)?.set("version", version)?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSnmp;
    use crate::profiler::LookupCache;
    use crate::session::SnmpSession;
    use crate::transport::Varbind;

    async fn session(backend: MockSnmp) -> Session {
        let mut session = Session::Snmp(SnmpSession::new("sw01", "public", Box::new(backend)));
        session.connect().await.unwrap();
        session
    }

    #[test]
    fn test_format_mac() {
        assert_eq!(format_mac("0x001a2b3c4d5e").as_deref(), Some("00:1A:2B:3C:4D:5E"));
        assert_eq!(format_mac("00 1a 2b 3c 4d 5e").as_deref(), Some("00:1A:2B:3C:4D:5E"));
        assert_eq!(format_mac(""), None);
    }

    #[test]
    fn test_index_of() {
        assert_eq!(index_of("1.3.6.1.2.1.2.2.1.2.10", IF_DESCR), Some("10"));
        assert_eq!(index_of("1.3.6.1.2.1.2.2.1.20.1", IF_DESCR), None);
    }

    #[tokio::test]
    async fn test_matches_when_sys_descr_answers() {
        let backend = MockSnmp::new().walk(SYS_DESCR, vec![Varbind::new("1.3.6.1.2.1.1.1.0", "Cisco IOS")]);
        let mut device = session(backend).await;
        assert!(NetworkDevice.matches(&mut device).await.unwrap());

        let mut silent = session(MockSnmp::new()).await;
        assert!(!NetworkDevice.matches(&mut silent).await.unwrap());
    }

    #[tokio::test]
    async fn test_operating_system_from_sys_descr() {
        let backend = MockSnmp::new().walk(
            SYS_DESCR,
            vec![Varbind::new(
                "1.3.6.1.2.1.1.1.0",
                "Cisco IOS Software, C2960 Software (C2960-LANBASEK9-M), Version 15.0(2)SE11, RELEASE SOFTWARE (fc3)",
            )],
        );
        let mut session = session(backend).await;
        let mut cache = LookupCache::new();
        let mut cx = Context {
            session: &mut session,
            cache: &mut cache,
        };

        let record = NetworkDevice.operating_system(&mut cx).await.unwrap();
        assert_eq!(record.text("version"), Some("15.0(2)SE11"));
        assert!(record.text("name").unwrap().starts_with("Cisco IOS Software"));
    }

    #[tokio::test]
    async fn test_chassis_hardware() {
        let backend = MockSnmp::new()
            .walk(
                ENT_PHYSICAL_CLASS,
                vec![
                    Varbind::new(format!("{ENT_PHYSICAL_CLASS}.1001"), "3"),
                    Varbind::new(format!("{ENT_PHYSICAL_CLASS}.1002"), "9"),
                ],
            )
            .walk(
                &format!("{ENT_PHYSICAL_MFG_NAME}.1001"),
                vec![Varbind::new(format!("{ENT_PHYSICAL_MFG_NAME}.1001"), "Cisco Systems")],
            )
            .walk(
                &format!("{ENT_PHYSICAL_SERIAL_NUM}.1001"),
                vec![Varbind::new(format!("{ENT_PHYSICAL_SERIAL_NUM}.1001"), "FOC1234X0AB")],
            );
        let mut session = session(backend).await;
        let mut cache = LookupCache::new();
        let mut cx = Context {
            session: &mut session,
            cache: &mut cache,
        };

        let record = NetworkDevice.hardware(&mut cx).await.unwrap();
        assert_eq!(record.text("vendor"), Some("Cisco Systems"));
        assert_eq!(record.text("serial_number"), Some("FOC1234X0AB"));
        assert_eq!(record.get("model"), Some(&Value::Absent));
    }

    #[tokio::test]
    async fn test_interfaces_join_tables() {
        let backend = MockSnmp::new()
            .walk(
                IF_DESCR,
                vec![
                    Varbind::new(format!("{IF_DESCR}.10"), "GigabitEthernet0/10"),
                    Varbind::new(format!("{IF_DESCR}.2"), "GigabitEthernet0/2"),
                ],
            )
            .walk(IF_NAME, vec![Varbind::new(format!("{IF_NAME}.2"), "Gi0/2")])
            .walk(IF_SPEED, vec![Varbind::new(format!("{IF_SPEED}.2"), "1000000000")])
            .walk(IF_PHYS_ADDRESS, vec![Varbind::new(format!("{IF_PHYS_ADDRESS}.2"), "0x001a2b3c4d5e")])
            .walk(IP_AD_ENT_IF_INDEX, vec![Varbind::new(format!("{IP_AD_ENT_IF_INDEX}.10.0.0.2"), "2")])
            .walk(
                IP_AD_ENT_NET_MASK,
                vec![Varbind::new(format!("{IP_AD_ENT_NET_MASK}.10.0.0.2"), "255.255.255.0")],
            );
        let mut session = session(backend).await;
        let mut cache = LookupCache::new();
        let mut cx = Context {
            session: &mut session,
            cache: &mut cache,
        };

        let records = NetworkDevice.network_interfaces(&mut cx).await.unwrap();
        assert_eq!(records.len(), 2);
        let gi2 = &records[0];
        assert_eq!(gi2.text("name"), Some("Gi0/2"));
        assert_eq!(gi2.text("mac_address"), Some("00:1A:2B:3C:4D:5E"));
        assert_eq!(gi2.get("speed"), Some(&Value::Integer(1_000_000_000)));
        assert_eq!(gi2.get("ip_addresses"), Some(&Value::from(vec!["10.0.0.2".to_string()])));
        assert_eq!(gi2.get("netmasks"), Some(&Value::from(vec!["255.255.255.0".to_string()])));
        assert_eq!(records[1].text("name"), Some("GigabitEthernet0/10"));
        assert!(records.iter().all(Record::conforms));
    }

    #[tokio::test]
    async fn test_identity_from_sys_name() {
        let backend = MockSnmp::new().walk(SYS_NAME, vec![Varbind::new("1.3.6.1.2.1.1.5.0", "core-sw.corp.example.com")]);
        let mut session = session(backend).await;
        let mut cache = LookupCache::new();
        let mut cx = Context {
            session: &mut session,
            cache: &mut cache,
        };

        let record = NetworkDevice.network_identity(&mut cx).await.unwrap();
        assert_eq!(record.text("hostname"), Some("core-sw"));
        assert_eq!(record.text("domain"), Some("corp.example.com"));
        assert_eq!(record.text("fqdn"), Some("core-sw.corp.example.com"));
    }
}
