// Network Profiles - Settings Encoding
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Conversion between profiles and NetworkManager settings dictionaries.
//!
//! Only scalar and string-list properties are modeled. Anything else read
//! from the bus (address structs, byte arrays, ...) is dropped on decode, and
//! [`overlay_settings`] keeps it intact when an update is written back.

use std::collections::{BTreeMap, HashMap};

use zbus::zvariant::{OwnedValue, Value};

use crate::models::{
    AutoconnectSlaves, Profile, ServiceError, Setting, SettingConnection, SettingValue,
};
use crate::service::ServiceResult;

/// `a{sa{sv}}` as exchanged with the settings service.
pub type RawSettings = HashMap<String, HashMap<String, OwnedValue>>;

const CONNECTION: &str = "connection";

fn owned(value: Value<'_>) -> ServiceResult<OwnedValue> {
    OwnedValue::try_from(value).map_err(|e| ServiceError::Transport(e.to_string()))
}

fn encode_value(value: &SettingValue) -> ServiceResult<OwnedValue> {
    match value {
        SettingValue::Bool(b) => owned(Value::from(*b)),
        SettingValue::Int(i) => owned(Value::from(*i)),
        SettingValue::Int64(i) => owned(Value::from(*i)),
        SettingValue::UInt(u) => owned(Value::from(*u)),
        SettingValue::UInt64(u) => owned(Value::from(*u)),
        SettingValue::Str(s) => owned(Value::from(s.clone())),
        SettingValue::StrList(list) => owned(Value::from(list.clone())),
    }
}

fn encode_connection(setting: &SettingConnection) -> ServiceResult<HashMap<String, OwnedValue>> {
    let mut props = HashMap::new();
    props.insert("id".to_string(), owned(Value::from(setting.id.clone()))?);
    props.insert("uuid".to_string(), owned(Value::from(setting.uuid.clone()))?);
    props.insert("type".to_string(), owned(Value::from(setting.kind.clone()))?);
    props.insert(
        "autoconnect".to_string(),
        owned(Value::from(setting.autoconnect))?,
    );
    props.insert(
        "autoconnect-slaves".to_string(),
        owned(Value::from(setting.autoconnect_slaves.as_raw()))?,
    );
    if let Some(iface) = &setting.interface_name {
        props.insert("interface-name".to_string(), owned(Value::from(iface.clone()))?);
    }
    if let Some(master) = &setting.master {
        props.insert("master".to_string(), owned(Value::from(master.clone()))?);
    }
    if let Some(slave_type) = &setting.slave_type {
        props.insert("slave-type".to_string(), owned(Value::from(slave_type.clone()))?);
    }
    Ok(props)
}

/// Encode every fragment of a profile.
pub fn encode_profile(profile: &Profile) -> ServiceResult<RawSettings> {
    let mut raw = RawSettings::new();
    if let Some(connection) = profile.setting_connection() {
        raw.insert(CONNECTION.to_string(), encode_connection(connection)?);
    }
    for (name, props) in profile.sections() {
        let mut encoded = HashMap::with_capacity(props.len());
        for (key, value) in props {
            encoded.insert(key.clone(), encode_value(value)?);
        }
        raw.insert(name.to_string(), encoded);
    }
    Ok(raw)
}

fn decode_value(value: &OwnedValue) -> Option<SettingValue> {
    match &**value {
        Value::Bool(b) => Some(SettingValue::Bool(*b)),
        Value::I32(i) => Some(SettingValue::Int(*i)),
        Value::I64(i) => Some(SettingValue::Int64(*i)),
        Value::U32(u) => Some(SettingValue::UInt(*u)),
        Value::U64(u) => Some(SettingValue::UInt64(*u)),
        Value::Str(s) => Some(SettingValue::Str(s.to_string())),
        Value::Array(_) => {
            let cloned = value.try_clone().ok()?;
            Vec::<String>::try_from(cloned)
                .ok()
                .map(SettingValue::StrList)
        }
        _ => None,
    }
}

fn string_prop(props: &HashMap<String, OwnedValue>, key: &str) -> Option<String> {
    match props.get(key).map(|v| &**v) {
        Some(Value::Str(s)) => Some(s.to_string()),
        _ => None,
    }
}

fn decode_connection(props: &HashMap<String, OwnedValue>) -> Option<SettingConnection> {
    let autoconnect = match props.get("autoconnect").map(|v| &**v) {
        Some(Value::Bool(b)) => *b,
        _ => true,
    };
    let autoconnect_slaves = match props.get("autoconnect-slaves").map(|v| &**v) {
        Some(Value::I32(raw)) => AutoconnectSlaves::from_raw(*raw),
        _ => AutoconnectSlaves::Default,
    };
    Some(SettingConnection {
        id: string_prop(props, "id")?,
        uuid: string_prop(props, "uuid")?,
        interface_name: string_prop(props, "interface-name"),
        kind: string_prop(props, "type")?,
        autoconnect,
        autoconnect_slaves,
        master: string_prop(props, "master"),
        slave_type: string_prop(props, "slave-type"),
    })
}

/// Decode a settings dictionary into a profile, keeping the modeled subset.
pub fn decode_profile(raw: &RawSettings) -> Profile {
    let mut profile = Profile::new();
    for (name, props) in raw {
        if name == CONNECTION {
            if let Some(connection) = decode_connection(props) {
                profile.add_setting(Setting::Connection(connection));
            }
            continue;
        }
        let decoded: BTreeMap<String, SettingValue> = props
            .iter()
            .filter_map(|(key, value)| decode_value(value).map(|v| (key.clone(), v)))
            .collect();
        profile.add_setting(Setting::section(name.clone(), decoded));
    }
    profile
}

/// Write `updates` over `base` property by property.
pub fn overlay_settings(mut base: RawSettings, updates: RawSettings) -> RawSettings {
    for (name, props) in updates {
        base.entry(name).or_default().extend(props);
    }
    base
}
