//! Named driver factories.
//!
//! A registry is an ordinary value: build one at startup, register extra
//! factories if needed and pass it to whatever opens drivers.

use crate::driver::{Driver, FfiDriver, IpcDriver, MmapDriver, NativeDriver};
use crate::error::{FtsError, Result};
use crate::index::Profile;
use crate::utils::AppConfig;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Settings handed to every factory
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Profile for drivers that build an index of their own (ffi, mmap, the server)
    pub profile: Profile,
    pub socket_path: PathBuf,
    pub io_timeout: Duration,
    pub segment_dir: PathBuf,
}

impl DriverOptions {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self {
            profile: config.default_profile,
            socket_path: config.effective_socket_path(),
            io_timeout: config.io_timeout(),
            segment_dir: config.effective_segment_dir()?,
        })
    }
}

pub type DriverFactory = Box<dyn Fn(&DriverOptions) -> Result<Box<dyn Driver>> + Send + Sync>;

#[derive(Default)]
pub struct DriverRegistry {
    factories: BTreeMap<String, DriverFactory>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in drivers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for profile in Profile::ALL {
            registry.register(profile.name(), move |_| {
                Ok(Box::new(NativeDriver::new(profile)) as Box<dyn Driver>)
            });
        }
        registry.register("ffi", |opts| {
            Ok(Box::new(FfiDriver::new(opts.profile)?) as Box<dyn Driver>)
        });
        registry.register("ipc", |opts| {
            Ok(Box::new(IpcDriver::connect(&opts.socket_path, opts.io_timeout)) as Box<dyn Driver>)
        });
        registry.register("mmap", |opts| {
            Ok(Box::new(MmapDriver::open(&opts.segment_dir, opts.profile)?) as Box<dyn Driver>)
        });
        registry
    }

    /// Add or replace a factory
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&DriverOptions) -> Result<Box<dyn Driver>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn open(&self, name: &str, options: &DriverOptions) -> Result<Box<dyn Driver>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| FtsError::UnknownDriver(name.to_string()))?;
        factory(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options(dir: &TempDir) -> DriverOptions {
        DriverOptions {
            profile: Profile::Balanced,
            socket_path: dir.path().join("none.sock"),
            io_timeout: Duration::from_secs(1),
            segment_dir: dir.path().join("segments"),
        }
    }

    #[test]
    fn test_default_names() {
        let registry = DriverRegistry::with_defaults();
        assert_eq!(
            registry.names(),
            vec!["balanced", "compact", "ffi", "ipc", "mmap", "speed"]
        );
    }

    #[test]
    fn test_unknown_driver() {
        let dir = TempDir::new().unwrap();
        let registry = DriverRegistry::with_defaults();
        let err = registry.open("lucene", &options(&dir)).err().unwrap();
        assert!(matches!(err, FtsError::UnknownDriver(name) if name == "lucene"));
    }

    #[test]
    fn test_open_every_default() {
        let dir = TempDir::new().unwrap();
        let registry = DriverRegistry::with_defaults();
        for name in registry.names() {
            let driver = registry.open(name, &options(&dir)).unwrap();
            assert_eq!(driver.name(), name);
            driver.add_document("hello world").unwrap();
            driver.build().unwrap();
            assert_eq!(driver.search("hello", 10).unwrap().len(), 1, "{name}");
            driver.close().unwrap();
        }
    }

    #[test]
    fn test_register_custom() {
        let dir = TempDir::new().unwrap();
        let mut registry = DriverRegistry::new();
        registry.register("mine", |_| Ok(Box::new(IpcDriver::local()) as Box<dyn Driver>));
        assert!(registry.contains("mine"));
        assert_eq!(registry.open("mine", &options(&dir)).unwrap().name(), "ipc");
    }
}
