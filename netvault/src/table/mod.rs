//! Device table: the concurrency-safe map from device id to device record,
//! together with the model registry and the global options.
//!
//! All mutations serialize on one write lock; readers get copies.

mod device;

pub use device::{Device, DeviceRecord, DeviceStatus};

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::config::{AppConfig, Change, Options};
use crate::driver::FetchResult;
use crate::error::TableError;
use crate::platform::{Model, ModelRegistry};

struct State {
    devices: BTreeMap<String, Device>,
    models: ModelRegistry,
    options: Options,
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: Vec<String>,
    pub updated: Vec<String>,
}

/// Shared device table.
pub struct DeviceTable {
    state: RwLock<State>,
}

impl std::fmt::Debug for DeviceTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceTable")
            .field("devices", &self.read().devices.len())
            .finish_non_exhaustive()
    }
}

impl DeviceTable {
    pub fn new(models: ModelRegistry) -> Self {
        Self {
            state: RwLock::new(State {
                devices: BTreeMap::new(),
                models,
                options: Options::default(),
            }),
        }
    }

    /// Table loaded from a config record. Every device must reference a
    /// registered model.
    pub fn from_config(models: ModelRegistry, config: AppConfig) -> Result<Self, TableError> {
        let table = Self::new(models);
        {
            let mut state = table.write();
            state.options = config.options;
            for device in config.devices {
                if !state.models.contains(&device.model) {
                    return Err(TableError::UnknownModel { name: device.model });
                }
                if state.devices.contains_key(&device.id) {
                    return Err(TableError::DeviceExists { id: device.id });
                }
                state.devices.insert(device.id.clone(), device);
            }
        }
        Ok(table)
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Snapshot of the table as a config record.
    pub fn to_config(&self) -> AppConfig {
        let state = self.read();
        AppConfig {
            options: state.options.clone(),
            devices: state.devices.values().cloned().collect(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Copies of all devices, ordered by id. Deleted devices included.
    pub fn list_devices(&self) -> Vec<Device> {
        self.read().devices.values().cloned().collect()
    }

    pub fn get_device(&self, id: &str) -> Result<Device, TableError> {
        self.read()
            .devices
            .get(id)
            .cloned()
            .ok_or_else(|| TableError::DeviceNotFound { id: id.to_string() })
    }

    /// Insert a new device. Fails if the id exists.
    pub fn set_device(&self, device: Device) -> Result<(), TableError> {
        let mut state = self.write();
        if !state.models.contains(&device.model) {
            return Err(TableError::UnknownModel { name: device.model });
        }
        if state.devices.contains_key(&device.id) {
            return Err(TableError::DeviceExists { id: device.id });
        }
        debug!("table: added {}", device.id);
        state.devices.insert(device.id.clone(), device);
        Ok(())
    }

    /// Replace an existing device. Fails if the id is absent.
    pub fn update_device(&self, device: Device) -> Result<(), TableError> {
        let mut state = self.write();
        if !state.models.contains(&device.model) {
            return Err(TableError::UnknownModel { name: device.model });
        }
        match state.devices.get_mut(&device.id) {
            Some(slot) => {
                *slot = device;
                Ok(())
            }
            None => Err(TableError::DeviceNotFound { id: device.id }),
        }
    }

    /// Mark a device deleted; the row stays until purged.
    pub fn delete_device(&self, id: &str) -> Result<(), TableError> {
        self.with_device(id, |device| device.deleted = true)
    }

    /// Remove a device row.
    pub fn purge_device(&self, id: &str) -> Result<(), TableError> {
        self.write()
            .devices
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| TableError::DeviceNotFound { id: id.to_string() })
    }

    /// `prefix` followed by the smallest unused non-negative integer.
    pub fn find_device_free_id(&self, prefix: &str) -> String {
        let state = self.read();
        (0u64..)
            .map(|n| format!("{}{}", prefix, n))
            .find(|id| !state.devices.contains_key(id))
            .unwrap_or_else(|| prefix.to_string())
    }

    pub fn set_model(&self, model: Model) -> Result<(), TableError> {
        self.write().models.register(model)
    }

    pub fn get_model(&self, name: &str) -> Result<Arc<Model>, TableError> {
        self.read().models.get(name)
    }

    pub fn model_names(&self) -> Vec<String> {
        self.read().models.names().map(str::to_string).collect()
    }

    /// Copy of the global options.
    pub fn options(&self) -> Options {
        self.read().options.clone()
    }

    pub fn set_options(&self, options: Options) {
        self.write().options = options;
    }

    /// Record a fetch result on its device.
    pub fn update_device_status(&self, result: &FetchResult) -> Result<(), TableError> {
        self.with_device(&result.dev_id, |device| {
            if !device.status.apply(result) {
                debug!("table: {}: ignored stale result", device.id);
            }
        })
    }

    /// Zero `last_success` so the next scan runs the device.
    pub fn clear_device_status(&self, id: &str) -> Result<(), TableError> {
        self.with_device(id, |device| device.status.clear())
    }

    /// Seed `last_success` from the newest snapshot time `lookup` reports
    /// for each device. Lookups run without holding the lock.
    pub fn update_last_success<F>(&self, lookup: F)
    where
        F: Fn(&Device) -> Option<DateTime<Utc>>,
    {
        let seeds: Vec<(String, DateTime<Utc>)> = self
            .list_devices()
            .iter()
            .filter_map(|device| lookup(device).map(|t| (device.id.clone(), t)))
            .collect();

        let mut state = self.write();
        for (id, when) in seeds {
            let Some(device) = state.devices.get_mut(&id) else {
                continue;
            };
            let status = &mut device.status;
            if status.last_success.is_some_and(|t| t >= when) {
                continue;
            }
            status.last_success = Some(when);
            if status.last_try.is_none_or(|t| t <= when) {
                status.last_try = Some(when);
                status.last_status = true;
            }
        }
    }

    /// Add or update devices from text-form records.
    ///
    /// An id of `auto` allocates a fresh id. Attributes are cloned from the
    /// model for new devices and for devices whose model changed.
    pub fn import(
        &self,
        records: Vec<DeviceRecord>,
        change: &Change,
    ) -> Result<ImportSummary, TableError> {
        let mut summary = ImportSummary::default();

        for record in records {
            let model = self.get_model(&record.model)?;
            let id = if record.id == "auto" {
                self.find_device_free_id("auto")
            } else {
                record.id.clone()
            };

            match self.get_device(&id) {
                Ok(mut device) => {
                    if device.model != model.name {
                        device.model = model.name.clone();
                        device.attributes = model.attributes.clone();
                    }
                    device.host_port = record.host_port;
                    device.transports = record.transports;
                    device.login_user = record.user;
                    device.login_password = record.password;
                    device.enable_password = record.enable_password;
                    device.debug = record.debug;
                    device.deleted = false;
                    device.last_change = change.clone();
                    self.update_device(device)?;
                    summary.updated.push(id);
                }
                Err(_) => {
                    let mut device = Device::new(
                        id.clone(),
                        &model,
                        record.host_port,
                        record.transports,
                        record.user,
                        record.password,
                        record.enable_password,
                    );
                    device.debug = record.debug;
                    device.last_change = change.clone();
                    self.set_device(device)?;
                    summary.added.push(id);
                }
            }
        }

        info!(
            "table: import added={} updated={}",
            summary.added.len(),
            summary.updated.len()
        );
        Ok(summary)
    }

    fn with_device<F>(&self, id: &str, f: F) -> Result<(), TableError>
    where
        F: FnOnce(&mut Device),
    {
        let mut state = self.write();
        let device = state
            .devices
            .get_mut(id)
            .ok_or_else(|| TableError::DeviceNotFound { id: id.to_string() })?;
        f(device);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::vendors;

    fn table() -> DeviceTable {
        DeviceTable::new(ModelRegistry::with_builtin())
    }

    fn device(id: &str) -> Device {
        Device::new(id, &vendors::cisco_ios::model(), "10.0.0.1", "telnet", "u", "p", "")
    }

    #[test]
    fn test_set_get_update() {
        let table = table();
        table.set_device(device("r1")).unwrap();
        assert!(matches!(
            table.set_device(device("r1")),
            Err(TableError::DeviceExists { .. })
        ));

        let mut d = table.get_device("r1").unwrap();
        d.host_port = "10.0.0.9".to_string();
        table.update_device(d).unwrap();
        assert_eq!(table.get_device("r1").unwrap().host_port, "10.0.0.9");

        assert!(matches!(
            table.update_device(device("ghost")),
            Err(TableError::DeviceNotFound { .. })
        ));
    }

    #[test]
    fn test_unknown_model_rejected() {
        let table = table();
        let mut d = device("r1");
        d.model = "nope".to_string();
        assert!(matches!(
            table.set_device(d),
            Err(TableError::UnknownModel { .. })
        ));
    }

    #[test]
    fn test_delete_then_purge() {
        let table = table();
        table.set_device(device("r1")).unwrap();
        table.delete_device("r1").unwrap();
        assert!(table.get_device("r1").unwrap().deleted);
        assert_eq!(table.list_devices().len(), 1);

        table.purge_device("r1").unwrap();
        assert!(table.list_devices().is_empty());
        assert!(table.purge_device("r1").is_err());
    }

    #[test]
    fn test_find_device_free_id() {
        let table = table();
        assert_eq!(table.find_device_free_id("auto"), "auto0");
        table.set_device(device("auto0")).unwrap();
        table.set_device(device("auto2")).unwrap();
        assert_eq!(table.find_device_free_id("auto"), "auto1");
    }

    #[test]
    fn test_set_model_once() {
        let table = table();
        let model = Model::new("lab", Default::default());
        table.set_model(model.clone()).unwrap();
        assert!(table.set_model(model).is_err());
        assert_eq!(table.get_model("lab").unwrap().name, "lab");
        assert!(table.get_model("ghost").is_err());
    }

    #[test]
    fn test_import_auto_and_update() {
        let table = table();
        let change = Change::now("test", "stdin");
        let records = DeviceRecord::parse_all(
            "cisco-ios auto 10.0.0.1 telnet u p\n\
             junos j1 10.0.0.2 ssh u p . debug\n",
        )
        .unwrap();
        let summary = table.import(records, &change).unwrap();
        assert_eq!(summary.added, vec!["auto0".to_string(), "j1".to_string()]);
        assert!(table.get_device("j1").unwrap().debug);

        let mut edited = table.get_device("j1").unwrap();
        edited.attributes.command_list.clear();
        table.update_device(edited).unwrap();

        let records = DeviceRecord::parse_all("junos j1 10.0.0.3 ssh u p2\n").unwrap();
        let summary = table.import(records, &change).unwrap();
        assert_eq!(summary.updated, vec!["j1".to_string()]);
        let j1 = table.get_device("j1").unwrap();
        assert_eq!(j1.host_port, "10.0.0.3");
        assert!(j1.attributes.command_list.is_empty());

        let records = DeviceRecord::parse_all("linux j1 10.0.0.3 ssh u p2\n").unwrap();
        table.import(records, &change).unwrap();
        let j1 = table.get_device("j1").unwrap();
        assert_eq!(j1.model, "linux");
        assert_eq!(j1.attributes, vendors::linux::model().attributes);
    }

    #[test]
    fn test_status_updates_and_clear() {
        let table = table();
        table.set_device(device("r1")).unwrap();
        let result = FetchResult::new("cisco-ios", "r1", "10.0.0.1", Utc::now());
        table.update_device_status(&result).unwrap();

        let status = table.get_device("r1").unwrap().status;
        assert!(status.last_status);
        assert_eq!(status.last_success, status.last_try);

        table.clear_device_status("r1").unwrap();
        assert!(table.get_device("r1").unwrap().status.last_success.is_none());
    }

    #[test]
    fn test_update_last_success_seeds_from_lookup() {
        let table = table();
        table.set_device(device("r1")).unwrap();
        table.set_device(device("r2")).unwrap();
        let when = Utc::now();

        table.update_last_success(|d| (d.id == "r1").then_some(when));

        assert_eq!(table.get_device("r1").unwrap().status.last_success, Some(when));
        assert_eq!(table.get_device("r2").unwrap().status.last_success, None);
    }

    #[test]
    fn test_config_roundtrip() {
        let table = table();
        table.set_device(device("r1")).unwrap();
        let config = table.to_config();
        let reloaded =
            DeviceTable::from_config(ModelRegistry::with_builtin(), config.clone()).unwrap();
        assert_eq!(reloaded.to_config(), config);
    }
}
