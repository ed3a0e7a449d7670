//! Category templates and collected inventory data.
//!
//! Every category has a fixed template of field names. Records are always
//! created from their template and refuse unknown fields, so a record holds
//! exactly the template's fields; values that could not be determined stay
//! [`Value::Absent`].

mod collect;
mod value;

pub use collect::retrieve_all;
pub use value::Value;

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::CollectError;

/// The data categories collected from every host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    FileSystems,
    Hardware,
    Shares,
    Applications,
    LocalAccounts,
    Patches,
    Services,
    NetworkIdentity,
    NetworkInterfaces,
    OperatingSystem,
}

impl Category {
    /// The order categories are collected in.
    pub const COLLECTION_ORDER: [Category; 10] = [
        Category::FileSystems,
        Category::Hardware,
        Category::Shares,
        Category::Applications,
        Category::LocalAccounts,
        Category::Patches,
        Category::Services,
        Category::NetworkIdentity,
        Category::NetworkInterfaces,
        Category::OperatingSystem,
    ];

    /// Stable external name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::FileSystems => "file_systems",
            Category::Hardware => "hardware",
            Category::Shares => "shares",
            Category::Applications => "applications",
            Category::LocalAccounts => "local_accounts",
            Category::Patches => "patches",
            Category::Services => "services",
            Category::NetworkIdentity => "network_identity",
            Category::NetworkInterfaces => "network_interfaces",
            Category::OperatingSystem => "operating_system",
        }
    }

    /// Template field names, in serialized order.
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            Category::FileSystems => &[
                "name",
                "mount_point",
                "file_system",
                "size",
                "free_space",
                "label",
                "serial_number",
            ],
            Category::Hardware => &[
                "vendor",
                "model",
                "serial_number",
                "uuid",
                "cpu_model",
                "cpu_count",
                "cpu_cores",
                "cpu_speed",
                "memory",
                "bios_vendor",
                "bios_version",
            ],
            Category::Shares => &["name", "path", "description"],
            Category::Applications => &["name", "version", "vendor", "install_date"],
            Category::LocalAccounts => &["name", "full_name", "sid", "disabled", "groups"],
            Category::Patches => &["name", "description", "installed_on", "installed_by"],
            Category::Services => &["name", "display_name", "state", "start_mode", "account"],
            Category::NetworkIdentity => &[
                "hostname",
                "domain",
                "fqdn",
                "dns_servers",
                "default_gateway",
            ],
            Category::NetworkInterfaces => &[
                "name",
                "mac_address",
                "ip_addresses",
                "netmasks",
                "gateway",
                "dhcp_enabled",
                "speed",
                "wwn",
                "vendor",
                "model",
            ],
            Category::OperatingSystem => &[
                "name",
                "version",
                "kernel",
                "architecture",
                "service_pack",
                "install_date",
                "last_boot",
            ],
        }
    }

    /// Whether the category holds many records rather than one.
    pub fn is_collection(&self) -> bool {
        !matches!(
            self,
            Category::Hardware | Category::NetworkIdentity | Category::OperatingSystem
        )
    }

    /// Template default: an empty collection or an all-absent record.
    pub fn default_data(&self) -> CategoryData {
        if self.is_collection() {
            CategoryData::Many(Vec::new())
        } else {
            CategoryData::Single(Record::new(*self))
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record of a category, holding exactly the template's fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    category: Category,
    fields: IndexMap<&'static str, Value>,
}

impl Record {
    /// Create a record with every template field absent.
    pub fn new(category: Category) -> Self {
        let fields = category
            .fields()
            .iter()
            .map(|name| (*name, Value::Absent))
            .collect();
        Self { category, fields }
    }

    /// Category this record belongs to.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Set a template field.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<&mut Self, CollectError> {
        match self.fields.get_mut(field) {
            Some(slot) => {
                *slot = value.into();
                Ok(self)
            }
            None => Err(CollectError::UnknownField {
                category: self.category,
                field: field.to_string(),
            }),
        }
    }

    /// Set a field only when `value` carries something.
    pub fn set_some<V: Into<Value>>(
        &mut self,
        field: &str,
        value: Option<V>,
    ) -> Result<&mut Self, CollectError> {
        match value {
            Some(v) => self.set(field, v),
            None => Ok(self),
        }
    }

    /// Value of a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Text value of a field.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_text)
    }

    /// Field names in template order.
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }

    /// Iterate fields with mutable values.
    pub fn values_mut(&mut self) -> impl Iterator<Item = (&'static str, &mut Value)> {
        self.fields.iter_mut().map(|(k, v)| (*k, v))
    }

    /// Whether the field set equals the template exactly.
    pub fn conforms(&self) -> bool {
        self.fields.keys().copied().eq(self.category.fields().iter().copied())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// Data for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CategoryData {
    /// Single-record categories.
    Single(Record),
    /// Collection categories.
    Many(Vec<Record>),
}

impl CategoryData {
    /// All records, whatever the shape.
    pub fn records(&self) -> &[Record] {
        match self {
            CategoryData::Single(record) => std::slice::from_ref(record),
            CategoryData::Many(records) => records,
        }
    }

    /// All records, mutably.
    pub fn records_mut(&mut self) -> &mut [Record] {
        match self {
            CategoryData::Single(record) => std::slice::from_mut(record),
            CategoryData::Many(records) => records,
        }
    }

    /// Check every record belongs to `category` and has the right shape.
    pub fn check(&self, category: Category) -> Result<(), CollectError> {
        for record in self.records() {
            if record.category() != category {
                return Err(CollectError::WrongCategory {
                    expected: category,
                    actual: record.category(),
                });
            }
        }
        Ok(())
    }
}

/// Collected data for every category, in collection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    categories: IndexMap<Category, CategoryData>,
}

impl Inventory {
    /// Create an empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store data for a category, replacing earlier data.
    pub fn insert(&mut self, category: Category, data: CategoryData) {
        self.categories.insert(category, data);
    }

    /// Data for a category.
    pub fn get(&self, category: Category) -> Option<&CategoryData> {
        self.categories.get(&category)
    }

    /// Records for a category (empty when not collected).
    pub fn records(&self, category: Category) -> &[Record] {
        self.get(category).map(CategoryData::records).unwrap_or(&[])
    }

    /// The single record of a single-record category.
    pub fn single(&self, category: Category) -> Option<&Record> {
        match self.get(category)? {
            CategoryData::Single(record) => Some(record),
            CategoryData::Many(_) => None,
        }
    }

    /// Categories present, in insertion order.
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.categories.keys().copied()
    }

    /// Iterate all category data mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Category, &mut CategoryData)> {
        self.categories.iter_mut().map(|(k, v)| (*k, v))
    }

    /// Check if nothing has been collected.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Flat `category name → data` map for external consumers.
    pub fn to_flat_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.categories
            .iter()
            .map(|(category, data)| {
                let value = serde_json::to_value(data).unwrap_or(serde_json::Value::Null);
                (category.as_str().to_string(), value)
            })
            .collect()
    }

    /// The flat map as a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(self.to_flat_map())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_record_has_template_fields() {
        for category in Category::COLLECTION_ORDER {
            let record = Record::new(category);
            assert!(record.conforms());
            assert!(record.field_names().all(|f| record.get(f) == Some(&Value::Absent)));
        }
    }

    #[test]
    fn test_set_rejects_unknown_field() {
        let mut record = Record::new(Category::Shares);
        record.set("name", "C$").unwrap();
        let err = record.set("owner", "admin").unwrap_err();
        assert!(matches!(err, CollectError::UnknownField { .. }));
        assert!(record.conforms());
        assert_eq!(record.text("name"), Some("C$"));
    }

    #[test]
    fn test_set_some_skips_none() {
        let mut record = Record::new(Category::Shares);
        record.set_some("path", None::<String>).unwrap();
        assert_eq!(record.get("path"), Some(&Value::Absent));
    }

    #[test]
    fn test_default_shapes() {
        assert_eq!(Category::Hardware.default_data(), CategoryData::Single(Record::new(Category::Hardware)));
        assert_eq!(Category::Services.default_data(), CategoryData::Many(Vec::new()));
    }

    #[test]
    fn test_check_detects_wrong_category() {
        let data = CategoryData::Many(vec![Record::new(Category::Shares)]);
        assert!(data.check(Category::Shares).is_ok());
        assert!(data.check(Category::Services).is_err());
    }

    #[test]
    fn test_flat_map_uses_template_names() {
        let mut inventory = Inventory::new();
        let mut share = Record::new(Category::Shares);
        share.set("name", "ADMIN$").unwrap();
        inventory.insert(Category::Shares, CategoryData::Many(vec![share]));
        inventory.insert(Category::OperatingSystem, Category::OperatingSystem.default_data());

        let json = inventory.to_json();
        assert_eq!(
            json["shares"],
            json!([{"name": "ADMIN$", "path": null, "description": null}])
        );
        assert_eq!(json["operating_system"]["kernel"], json!(null));
        assert_eq!(
            json.as_object().unwrap().keys().collect::<Vec<_>>(),
            vec!["shares", "operating_system"]
        );
    }

    #[test]
    fn test_category_names_parse() {
        let parsed: Vec<Category> = serde_json::from_str(r#"["file_systems", "network_interfaces"]"#).unwrap();
        assert_eq!(parsed, vec![Category::FileSystems, Category::NetworkInterfaces]);
    }
}
