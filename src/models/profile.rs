// Network Profiles - Profile Data Model
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Connection profile data model and serialization.
//!
//! A Profile is a bundle of setting fragments keyed by setting name:
//! - The `connection` fragment carries identity and autoconnect policy
//! - Every other fragment (`ipv4`, `802-3-ethernet`, `bond`, ...) is an
//!   opaque property map passed through to the configuration service
//!
//! Profiles serialize to TOML so callers can keep them on disk:
//!
//! ```toml
//! [connection]
//! id = "eth0-static"
//! uuid = "0b2c6cd4-2b43-4ac3-8c8e-9b4c7bb1d1f3"
//! interface-name = "eth0"
//! type = "802-3-ethernet"
//! autoconnect = true
//! autoconnect-slaves = "yes"
//!
//! [setting.ipv4]
//! method = "manual"
//! address-data = ["192.0.2.10/24"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the identity setting fragment.
pub const CONNECTION_SETTING_NAME: &str = "connection";

/// Whether slave connections come up together with their master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AutoconnectSlaves {
    /// Follow the service-wide default.
    #[default]
    Default,
    No,
    Yes,
}

impl AutoconnectSlaves {
    /// Numeric value used on the bus.
    pub fn as_raw(&self) -> i32 {
        match self {
            Self::Default => -1,
            Self::No => 0,
            Self::Yes => 1,
        }
    }

    pub fn from_raw(value: i32) -> Self {
        match value {
            0 => Self::No,
            1 => Self::Yes,
            _ => Self::Default,
        }
    }
}

/// Identity-level settings of a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SettingConnection {
    /// Human-readable connection name.
    pub id: String,
    /// Unique identifier.
    pub uuid: String,
    /// Interface the profile is bound to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_name: Option<String>,
    /// Connection type (e.g. "802-3-ethernet", "bond").
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_true")]
    pub autoconnect: bool,
    #[serde(default)]
    pub autoconnect_slaves: AutoconnectSlaves,
    /// Master interface or connection this profile is enslaved to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<String>,
    /// Slave classification ("bond", "bridge", "team", "ovs-port").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slave_type: Option<String>,
}

fn default_true() -> bool {
    true
}

/// A single property value inside an opaque setting fragment.
///
/// Integers keep the width they have on the bus. A plain TOML integer is a
/// 32-bit signed value; the other widths are written as a one-key table,
/// e.g. `mtu = { u32 = 1500 }` or `route-metric = { i64 = 100 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i32),
    #[serde(with = "width::int64")]
    Int64(i64),
    #[serde(with = "width::uint32")]
    UInt(u32),
    #[serde(with = "width::uint64")]
    UInt64(u64),
    Str(String),
    StrList(Vec<String>),
}

/// Integer widths written as `{ <tag> = value }`.
mod width {
    use serde::de::Error as _;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    fn serialize<S, T>(tag: &str, value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(tag, value)?;
        map.end()
    }

    fn deserialize<'de, D, T>(tag: &str, deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        let mut map = BTreeMap::<String, T>::deserialize(deserializer)?;
        match (map.len(), map.remove(tag)) {
            (1, Some(value)) => Ok(value),
            _ => Err(D::Error::custom(format!(
                "expected a table with the single key '{}'",
                tag
            ))),
        }
    }

    pub mod int64 {
        use serde::{Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
            super::serialize("i64", value, serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
            super::deserialize("i64", deserializer)
        }
    }

    pub mod uint32 {
        use serde::{Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &u32, serializer: S) -> Result<S::Ok, S::Error> {
            super::serialize("u32", value, serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
            super::deserialize("u32", deserializer)
        }
    }

    pub mod uint64 {
        use serde::{Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
            super::serialize("u64", value, serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
            super::deserialize("u64", deserializer)
        }
    }
}

/// One setting fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Setting {
    /// The identity fragment.
    Connection(SettingConnection),
    /// Any other fragment, passed through untouched.
    Section {
        name: String,
        properties: BTreeMap<String, SettingValue>,
    },
}

impl Setting {
    /// Create an opaque fragment.
    pub fn section(name: impl Into<String>, properties: BTreeMap<String, SettingValue>) -> Self {
        Self::Section {
            name: name.into(),
            properties,
        }
    }

    /// Setting name the fragment is keyed by.
    pub fn name(&self) -> &str {
        match self {
            Self::Connection(_) => CONNECTION_SETTING_NAME,
            Self::Section { name, .. } => name,
        }
    }
}

impl From<SettingConnection> for Setting {
    fn from(setting: SettingConnection) -> Self {
        Self::Connection(setting)
    }
}

/// A connection profile.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Profile {
    /// Identifier assigned by the configuration service once the profile is
    /// known to it (not persisted).
    #[serde(skip)]
    remote_id: Option<String>,

    /// Identity fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    connection: Option<SettingConnection>,

    /// Opaque fragments keyed by setting name.
    #[serde(default, rename = "setting", skip_serializing_if = "BTreeMap::is_empty")]
    sections: BTreeMap<String, BTreeMap<String, SettingValue>>,
}

impl Profile {
    /// Create an empty profile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a profile from an ordered sequence of fragments. Later fragments
    /// replace earlier ones with the same name.
    pub fn from_settings(settings: impl IntoIterator<Item = Setting>) -> Self {
        let mut profile = Self::new();
        for setting in settings {
            profile.add_setting(setting);
        }
        profile
    }

    /// Add a fragment, replacing any fragment with the same name.
    pub fn add_setting(&mut self, setting: Setting) {
        match setting {
            Setting::Connection(connection) => self.connection = Some(connection),
            Setting::Section { name, properties } => {
                self.sections.insert(name, properties);
            }
        }
    }

    /// Replace every fragment with the other profile's, keeping this
    /// profile's service identifier.
    pub fn replace_settings_from(&mut self, other: &Profile) {
        self.connection = other.connection.clone();
        self.sections = other.sections.clone();
    }

    /// The identity fragment, if any.
    pub fn setting_connection(&self) -> Option<&SettingConnection> {
        self.connection.as_ref()
    }

    /// Opaque fragment by name.
    pub fn section(&self, name: &str) -> Option<&BTreeMap<String, SettingValue>> {
        self.sections.get(name)
    }

    /// All opaque fragments.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, SettingValue>)> {
        self.sections.iter().map(|(name, props)| (name.as_str(), props))
    }

    /// All fragments, identity first.
    pub fn settings(&self) -> Vec<Setting> {
        self.connection
            .iter()
            .cloned()
            .map(Setting::Connection)
            .chain(
                self.sections
                    .iter()
                    .map(|(name, props)| Setting::section(name.clone(), props.clone())),
            )
            .collect()
    }

    /// Connection name.
    pub fn id(&self) -> Option<&str> {
        self.connection.as_ref().map(|c| c.id.as_str())
    }

    /// Connection UUID.
    pub fn uuid(&self) -> Option<&str> {
        self.connection.as_ref().map(|c| c.uuid.as_str())
    }

    /// Interface the profile is bound to.
    pub fn interface_name(&self) -> Option<&str> {
        self.connection
            .as_ref()
            .and_then(|c| c.interface_name.as_deref())
    }

    /// Identifier assigned by the configuration service.
    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }

    /// Attach the identifier assigned by the configuration service.
    pub fn with_remote_id(mut self, remote_id: impl Into<String>) -> Self {
        self.remote_id = Some(remote_id.into());
        self
    }

    /// Serialize to TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserialize from TOML string.
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ethernet_identity() -> SettingConnection {
        SettingConnection {
            id: "eth0-static".to_string(),
            uuid: "0b2c6cd4-2b43-4ac3-8c8e-9b4c7bb1d1f3".to_string(),
            interface_name: Some("eth0".to_string()),
            kind: "802-3-ethernet".to_string(),
            autoconnect: true,
            autoconnect_slaves: AutoconnectSlaves::Yes,
            master: None,
            slave_type: None,
        }
    }

    fn ipv4_manual() -> Setting {
        let mut props = BTreeMap::new();
        props.insert("method".to_string(), SettingValue::Str("manual".to_string()));
        Setting::section("ipv4", props)
    }

    #[test]
    fn test_profile_from_settings() {
        let profile = Profile::from_settings(vec![ethernet_identity().into(), ipv4_manual()]);
        assert_eq!(profile.id(), Some("eth0-static"));
        assert_eq!(profile.interface_name(), Some("eth0"));
        assert!(profile.section("ipv4").is_some());
        assert_eq!(profile.settings().len(), 2);
        assert_eq!(profile.settings()[0].name(), CONNECTION_SETTING_NAME);
    }

    #[test]
    fn test_add_setting_replaces_same_name() {
        let mut profile = Profile::from_settings(vec![ipv4_manual()]);
        let mut props = BTreeMap::new();
        props.insert("method".to_string(), SettingValue::Str("auto".to_string()));
        profile.add_setting(Setting::section("ipv4", props));

        let ipv4 = profile.section("ipv4").expect("ipv4 should be present");
        assert_eq!(ipv4.get("method"), Some(&SettingValue::Str("auto".to_string())));
        assert_eq!(profile.sections().count(), 1);
    }

    #[test]
    fn test_replace_settings_keeps_remote_id() {
        let mut profile = Profile::from_settings(vec![ipv4_manual()])
            .with_remote_id("/org/freedesktop/NetworkManager/Settings/3");
        let other = Profile::from_settings(vec![ethernet_identity().into()]);

        profile.replace_settings_from(&other);

        assert_eq!(profile.remote_id(), Some("/org/freedesktop/NetworkManager/Settings/3"));
        assert_eq!(profile.id(), Some("eth0-static"));
        assert!(profile.section("ipv4").is_none());
    }

    #[test]
    fn test_profile_toml() {
        let profile = Profile::from_settings(vec![ethernet_identity().into(), ipv4_manual()]);
        let toml = profile.to_toml().expect("Profile should serialize to TOML");
        assert!(toml.contains("interface-name = \"eth0\""));

        let restored = Profile::from_toml(&toml).expect("Profile should deserialize from TOML");
        assert_eq!(restored, profile);
    }

    #[test]
    fn test_integer_widths_survive_toml() {
        let mut ethernet = BTreeMap::new();
        ethernet.insert("mtu".to_string(), SettingValue::UInt(1500));
        let mut ipv4 = BTreeMap::new();
        ipv4.insert("dad-timeout".to_string(), SettingValue::Int(-1));
        ipv4.insert("route-metric".to_string(), SettingValue::Int64(100));
        ipv4.insert("dns-priority".to_string(), SettingValue::Int(100));
        let mut bond = BTreeMap::new();
        bond.insert("lacp-rate".to_string(), SettingValue::UInt64(1));
        let profile = Profile::from_settings(vec![
            ethernet_identity().into(),
            Setting::section("802-3-ethernet", ethernet),
            Setting::section("ipv4", ipv4),
            Setting::section("bond", bond),
        ]);

        let toml = profile.to_toml().expect("Profile should serialize to TOML");
        let restored = Profile::from_toml(&toml).expect("Profile should deserialize from TOML");
        assert_eq!(restored, profile);
        let mtu = restored.section("802-3-ethernet").and_then(|s| s.get("mtu"));
        assert_eq!(mtu, Some(&SettingValue::UInt(1500)));
    }

    #[test]
    fn test_integer_width_tables_from_toml() {
        let profile = Profile::from_toml(
            "[setting.ipv4]\nroute-metric = { i64 = 100 }\ndns-priority = 50\n\n[setting.802-3-ethernet]\nmtu = { u32 = 9000 }\n",
        )
        .expect("Profile should deserialize from TOML");

        let ipv4 = profile.section("ipv4").expect("ipv4 should be present");
        assert_eq!(ipv4.get("route-metric"), Some(&SettingValue::Int64(100)));
        assert_eq!(ipv4.get("dns-priority"), Some(&SettingValue::Int(50)));
        let ethernet = profile.section("802-3-ethernet").expect("ethernet should be present");
        assert_eq!(ethernet.get("mtu"), Some(&SettingValue::UInt(9000)));

        assert!(Profile::from_toml("[setting.ipv4]\nroute-metric = { i32 = 1 }\n").is_err());
    }

    #[test]
    fn test_identity_defaults_from_toml() {
        let profile = Profile::from_toml(
            "[connection]\nid = \"bond0\"\nuuid = \"u\"\ntype = \"bond\"\n",
        )
        .expect("minimal profile should parse");
        let identity = profile.setting_connection().expect("identity fragment");
        assert!(identity.autoconnect);
        assert_eq!(identity.autoconnect_slaves, AutoconnectSlaves::Default);
        assert_eq!(profile.interface_name(), None);
    }
}
