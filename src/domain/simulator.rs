//! Simulator runtimes and the device selection policy
//!
//! A runtime is written `<platform>-<major>-<minor>` (e.g. `iOS-16-4`) and maps
//! to the `com.apple.CoreSimulator.SimRuntime.<runtime>` key of
//! `xcrun simctl list --json`. Selection walks the preferred device names in
//! order and falls back to the first device listed for the runtime.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::SimulatorError;

pub const SUPPORTED_PLATFORMS: &[&str] = &["iOS"];

const RUNTIME_KEY_PREFIX: &str = "com.apple.CoreSimulator.SimRuntime.";

/// A validated runtime identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorRuntime {
    raw: String,
}

impl SimulatorRuntime {
    pub fn parse(raw: &str) -> Result<Self, SimulatorError> {
        let mut segments = raw.split('-');
        let platform = segments.next().unwrap_or_default();
        if !SUPPORTED_PLATFORMS.contains(&platform) {
            return Err(SimulatorError::UnsupportedPlatform {
                platform: platform.to_string(),
                supported: SUPPORTED_PLATFORMS.join(", "),
            });
        }

        let rest: Vec<&str> = segments.collect();
        if rest.is_empty() || rest.iter().any(|s| s.parse::<u32>().is_err()) {
            return Err(SimulatorError::UnsupportedVersion(rest.join("-")));
        }

        Ok(Self {
            raw: raw.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn devices_key(&self) -> String {
        format!("{}{}", RUNTIME_KEY_PREFIX, self.raw)
    }
}

/// Output of `xcrun simctl list --json`, restricted to what selection needs
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimctlList {
    pub devices: HashMap<String, Vec<SimDevice>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimDevice {
    pub name: String,
    pub udid: String,
}

/// The device chosen for one runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorInfo {
    pub udid: String,
    pub name: String,
    pub runtime: String,
}

impl SimulatorInfo {
    /// `-destination` value for xcodebuild
    pub fn destination(&self) -> String {
        format!("platform=iOS Simulator,id={}", self.udid)
    }
}

/// Pick a device for `runtime`: first preferred name present, else first listed
pub fn select_simulator(
    runtime: &SimulatorRuntime,
    preferred_names: &[String],
    list: &SimctlList,
) -> Result<SimulatorInfo, SimulatorError> {
    let key = runtime.devices_key();
    let devices = list
        .devices
        .get(&key)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| SimulatorError::NoSimulatorsForRuntime(key.clone()))?;

    let preferred = preferred_names.iter().find_map(|name| {
        let found = devices.iter().find(|d| &d.name == name);
        if found.is_none() {
            tracing::debug!("'{}' not found for {}", name, runtime.as_str());
        }
        found
    });

    let device = match preferred {
        Some(device) => {
            tracing::info!("'{}' found for {}", device.name, runtime.as_str());
            device
        }
        None => {
            let first = &devices[0];
            tracing::info!(
                "No preferred simulator found, using first device '{}' for {}",
                first.name,
                runtime.as_str()
            );
            first
        }
    };

    Ok(SimulatorInfo {
        udid: device.udid.clone(),
        name: device.name.clone(),
        runtime: runtime.as_str().to_string(),
    })
}

/// Parse every runtime first, then select a device for each in order
pub fn resolve_simulators(
    runtimes: &[String],
    preferred_names: &[String],
    list: &SimctlList,
) -> Result<Vec<SimulatorInfo>, SimulatorError> {
    let parsed = runtimes
        .iter()
        .map(|r| SimulatorRuntime::parse(r))
        .collect::<Result<Vec<_>, _>>()?;

    parsed
        .iter()
        .map(|runtime| select_simulator(runtime, preferred_names, list))
        .collect()
}
