// Network Profiles - NetworkManager D-Bus Client
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Async D-Bus client for NetworkManager.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};
use zbus::zvariant::{ObjectPath, OwnedObjectPath};
use zbus::Connection;

use super::convert::{encode_profile, overlay_settings, RawSettings};
use super::objects::{proxy, read_profile};
use super::{
    service_error, NmActiveConnection, NmDevice, NM_MANAGER_INTERFACE, NM_PATH,
    NM_SETTINGS_CONNECTION_INTERFACE, NM_SETTINGS_INTERFACE, NM_SETTINGS_PATH, NO_OBJECT_PATH,
};
use crate::models::{Error, Profile, Result, ServiceError, MANAGER_ERROR_DOMAIN};
use crate::service::{
    ActiveConnectionRef, DeviceRef, NetworkDevice, NetworkService, ServiceResult,
};

/// NetworkManager client on the system bus.
#[derive(Clone)]
pub struct NmDbusClient {
    connection: Connection,
}

impl NmDbusClient {
    /// Connect to the system bus.
    pub async fn connect() -> Result<Self> {
        match Connection::system().await {
            Ok(connection) => {
                debug!("Connected to system D-Bus");
                Ok(Self { connection })
            }
            Err(e) => {
                error!("Failed to connect to system D-Bus: {}", e);
                Err(Error::DbusConnectionFailed(e.to_string()))
            }
        }
    }

    /// Wrap an existing bus connection.
    pub fn with_connection(connection: Connection) -> Self {
        Self { connection }
    }

    /// Object path of the stored connection with this UUID.
    async fn connection_path_by_uuid(&self, uuid: &str) -> ServiceResult<Option<String>> {
        let settings = proxy(&self.connection, NM_SETTINGS_PATH, NM_SETTINGS_INTERFACE).await?;
        let reply: zbus::Result<OwnedObjectPath> =
            settings.call("GetConnectionByUuid", &(uuid,)).await;
        match reply.map_err(service_error) {
            Ok(path) => Ok(Some(path.as_str().to_string())),
            Err(ServiceError::Manager { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn profile_path(&self, profile: &Profile) -> ServiceResult<String> {
        if let Some(path) = profile.remote_id() {
            return Ok(path.to_string());
        }
        if let Some(uuid) = profile.uuid() {
            if let Some(path) = self.connection_path_by_uuid(uuid).await? {
                return Ok(path);
            }
        }
        Err(ServiceError::NotFound(
            profile.id().unwrap_or("<unnamed>").to_string(),
        ))
    }
}

fn object_path(path: &str) -> ServiceResult<ObjectPath<'_>> {
    ObjectPath::try_from(path).map_err(|e| ServiceError::Transport(e.to_string()))
}

/// Skip a stored connection that vanished or refused to be read during a
/// lookup. Bus failures and cancellation still abort the lookup.
fn readable_profile(
    path: &str,
    result: ServiceResult<Profile>,
) -> ServiceResult<Option<Profile>> {
    match result {
        Ok(profile) => Ok(Some(profile)),
        Err(e @ (ServiceError::Transport(_) | ServiceError::Cancelled)) => Err(e),
        Err(e) => {
            debug!("Skipping unreadable connection {}: {}", path, e);
            Ok(None)
        }
    }
}

#[async_trait]
impl NetworkService for NmDbusClient {
    async fn add_connection(
        &self,
        profile: &Profile,
        persist: bool,
    ) -> ServiceResult<Option<Profile>> {
        let settings = proxy(&self.connection, NM_SETTINGS_PATH, NM_SETTINGS_INTERFACE).await?;
        let method = if persist {
            "AddConnection"
        } else {
            "AddConnectionUnsaved"
        };
        let raw = encode_profile(profile)?;

        info!("Adding connection {:?} ({})", profile.id(), method);
        let path: OwnedObjectPath = settings
            .call(method, &(raw,))
            .await
            .map_err(service_error)?;

        if path.as_str() == NO_OBJECT_PATH {
            return Ok(None);
        }
        Ok(Some(profile.clone().with_remote_id(path.as_str())))
    }

    async fn commit_changes(&self, profile: &Profile, persist: bool) -> ServiceResult<bool> {
        let path = self.profile_path(profile).await?;
        let connection = proxy(&self.connection, &path, NM_SETTINGS_CONNECTION_INTERFACE).await?;

        let current: RawSettings = connection
            .call("GetSettings", &())
            .await
            .map_err(service_error)?;
        let merged = overlay_settings(current, encode_profile(profile)?);

        let method = if persist { "Update" } else { "UpdateUnsaved" };
        info!("Updating connection {} ({})", path, method);
        let _: () = connection
            .call(method, &(merged,))
            .await
            .map_err(service_error)?;
        Ok(true)
    }

    async fn activate_connection(
        &self,
        profile: Option<&Profile>,
        device: Option<&dyn NetworkDevice>,
    ) -> ServiceResult<Option<ActiveConnectionRef>> {
        let manager = proxy(&self.connection, NM_PATH, NM_MANAGER_INTERFACE).await?;

        let connection_path = match profile {
            Some(profile) => self.profile_path(profile).await?,
            None => NO_OBJECT_PATH.to_string(),
        };
        let device_path = device.map_or(NO_OBJECT_PATH, |d| d.object_path());

        info!(
            "Requesting activation of {} on {}",
            connection_path, device_path
        );
        let active: OwnedObjectPath = manager
            .call(
                "ActivateConnection",
                &(
                    object_path(&connection_path)?,
                    object_path(device_path)?,
                    object_path(NO_OBJECT_PATH)?,
                ),
            )
            .await
            .map_err(service_error)?;

        if active.as_str() == NO_OBJECT_PATH {
            return Ok(None);
        }
        let active = NmActiveConnection::load(&self.connection, active.as_str()).await?;
        Ok(Some(Arc::new(active)))
    }

    async fn get_connection_by_id(&self, id: &str) -> ServiceResult<Option<Profile>> {
        let settings = proxy(&self.connection, NM_SETTINGS_PATH, NM_SETTINGS_INTERFACE).await?;
        let paths: Vec<OwnedObjectPath> = settings
            .call("ListConnections", &())
            .await
            .map_err(service_error)?;

        for path in paths {
            let result = read_profile(&self.connection, path.as_str()).await;
            let Some(profile) = readable_profile(path.as_str(), result)? else {
                continue;
            };
            if profile.id() == Some(id) {
                debug!("Found connection {} at {}", id, path.as_str());
                return Ok(Some(profile));
            }
        }
        Ok(None)
    }

    async fn device_by_iface(&self, iface: &str) -> ServiceResult<Option<DeviceRef>> {
        let manager = proxy(&self.connection, NM_PATH, NM_MANAGER_INTERFACE).await?;
        let reply: zbus::Result<OwnedObjectPath> =
            manager.call("GetDeviceByIpIface", &(iface,)).await;
        let path = match reply.map_err(service_error) {
            Ok(path) => path,
            Err(ServiceError::Manager { domain, code: 3, .. }) if domain == MANAGER_ERROR_DOMAIN => {
                return Ok(None)
            }
            Err(e) => return Err(e),
        };

        let device = NmDevice::load(&self.connection, path.as_str()).await?;
        Ok(Some(Arc::new(device)))
    }
}
