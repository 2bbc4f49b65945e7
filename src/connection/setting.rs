// Network Profiles - Connection Identity Settings
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Builder for the identity (`connection`) fragment of a profile.

use tracing::debug;
use uuid::Uuid;

use super::ConnectionProfile;
use crate::models::{AutoconnectSlaves, Error, Result, Setting, SettingConnection};

/// Builds the identity fragment attached to a profile before submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSetting {
    setting: SettingConnection,
}

impl ConnectionSetting {
    /// Wrap an existing identity fragment.
    pub fn from_setting(setting: SettingConnection) -> Self {
        Self { setting }
    }

    /// Fresh identity with a newly generated UUID. Autoconnect is on and
    /// slaves come up with their master.
    pub fn create(
        con_name: impl Into<String>,
        iface_name: impl Into<String>,
        iface_type: impl Into<String>,
    ) -> Self {
        let this = Self {
            setting: SettingConnection {
                id: con_name.into(),
                uuid: Uuid::new_v4().to_string(),
                interface_name: Some(iface_name.into()),
                kind: iface_type.into(),
                autoconnect: true,
                autoconnect_slaves: AutoconnectSlaves::Yes,
                master: None,
                slave_type: None,
            },
        };
        this.log_connection_info("ConnectionSetting.create");
        this
    }

    /// Copy the identity of another profile. Autoconnect is forced on; the
    /// slave autoconnect policy is kept.
    pub fn import_by_profile(con_profile: &ConnectionProfile) -> Result<Self> {
        let profile = con_profile
            .profile()
            .ok_or_else(|| Error::InvalidProfile("profile is empty".to_string()))?;
        let base = profile.setting_connection().ok_or_else(|| {
            Error::InvalidProfile("profile has no connection setting".to_string())
        })?;

        let this = Self {
            setting: SettingConnection {
                id: base.id.clone(),
                uuid: base.uuid.clone(),
                interface_name: base.interface_name.clone(),
                kind: base.kind.clone(),
                autoconnect: true,
                autoconnect_slaves: base.autoconnect_slaves,
                master: None,
                slave_type: None,
            },
        };
        this.log_connection_info("ConnectionSetting.import_by_profile");
        Ok(this)
    }

    /// Enslave the connection to `master`. No-op when no master is given.
    pub fn set_master(&mut self, master: Option<&str>, slave_type: Option<&str>) {
        if let Some(master) = master {
            self.setting.master = Some(master.to_string());
            self.setting.slave_type = slave_type.map(str::to_string);
        }
    }

    pub fn setting(&self) -> &SettingConnection {
        &self.setting
    }

    pub fn into_setting(self) -> Setting {
        Setting::Connection(self.setting)
    }

    fn log_connection_info(&self, source: &str) {
        let s = &self.setting;
        debug!(
            source,
            id = %s.id,
            iface = s.interface_name.as_deref().unwrap_or(""),
            uuid = %s.uuid,
            r#type = %s.kind,
            autoconnect = s.autoconnect,
            autoconnect_slaves = ?s.autoconnect_slaves,
            "Connection settings"
        );
    }
}
