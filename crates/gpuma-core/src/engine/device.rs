use super::error::ConfigError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

const NVIDIA_GPU_PROC_DIR: &str = "/proc/driver/nvidia/gpus";

/// A concrete compute target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    Cpu,
    Cuda(usize),
}

impl Device {
    pub fn is_gpu(&self) -> bool {
        matches!(self, Device::Cuda(_))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(index) => write!(f, "cuda:{}", index),
        }
    }
}

/// What a caller asked for: either a device string still to be parsed and
/// checked, or a device that was already resolved earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSpec {
    Named(String),
    Resolved(Device),
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSpec::Named(name) => f.write_str(name),
            DeviceSpec::Resolved(device) => fmt::Display::fmt(device, f),
        }
    }
}

impl PartialEq<&str> for DeviceSpec {
    fn eq(&self, other: &&str) -> bool {
        match self {
            DeviceSpec::Named(name) => name == other,
            DeviceSpec::Resolved(device) => device.to_string() == *other,
        }
    }
}

/// Written as its device string; a resolved device reads back as a name.
impl Serialize for DeviceSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DeviceSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(DeviceSpec::Named)
    }
}

impl From<&str> for DeviceSpec {
    fn from(s: &str) -> Self {
        DeviceSpec::Named(s.to_string())
    }
}

impl From<String> for DeviceSpec {
    fn from(s: String) -> Self {
        DeviceSpec::Named(s)
    }
}

impl From<&String> for DeviceSpec {
    fn from(s: &String) -> Self {
        DeviceSpec::Named(s.clone())
    }
}

impl From<Device> for DeviceSpec {
    fn from(device: Device) -> Self {
        DeviceSpec::Resolved(device)
    }
}

/// Device family and index parsed from a string, before any availability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ParsedDevice {
    family: DeviceFamily,
    index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceFamily {
    Cpu,
    Cuda,
}

impl FromStr for ParsedDevice {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let (family_str, index_str) = match normalized.split_once(':') {
            Some((family, index)) => (family, Some(index)),
            None => (normalized.as_str(), None),
        };

        let family = match family_str {
            "cpu" => DeviceFamily::Cpu,
            "cuda" | "gpu" => DeviceFamily::Cuda,
            _ => return Err(ConfigError::InvalidDevice(s.to_string())),
        };

        let index = index_str
            .map(|i| {
                i.parse::<usize>()
                    .map_err(|_| ConfigError::InvalidDevice(s.to_string()))
            })
            .transpose()?;

        Ok(Self { family, index })
    }
}

/// Reports what accelerator hardware the current host exposes.
pub trait DeviceProbe: Send + Sync {
    fn cuda_device_count(&self) -> usize;
}

/// Inspects the running host: counts the GPUs registered with the NVIDIA
/// kernel driver, narrowed by `CUDA_VISIBLE_DEVICES` when it is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl DeviceProbe for SystemProbe {
    fn cuda_device_count(&self) -> usize {
        let installed = std::fs::read_dir(Path::new(NVIDIA_GPU_PROC_DIR))
            .map(|entries| entries.filter_map(Result::ok).count())
            .unwrap_or(0);
        let visible = std::env::var("CUDA_VISIBLE_DEVICES").ok();
        visible_device_count(visible.as_deref(), installed)
    }
}

/// The visibility mask can only hide devices, never add them.
fn visible_device_count(visible: Option<&str>, installed: usize) -> usize {
    let Some(visible) = visible.map(str::trim) else {
        return installed;
    };
    if visible.is_empty() || visible == "-1" {
        return 0;
    }
    visible
        .split(',')
        .filter(|d| !d.trim().is_empty())
        .count()
        .min(installed)
}

/// A probe that reports a fixed number of CUDA devices.
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe(pub usize);

impl DeviceProbe for FixedProbe {
    fn cuda_device_count(&self) -> usize {
        self.0
    }
}

/// Turns a [`DeviceSpec`] into a [`Device`] that is known to exist on this host.
///
/// Resolution is pure: nothing is allocated on the device.
#[derive(Clone)]
pub struct DeviceResolver {
    probe: Arc<dyn DeviceProbe>,
}

impl Default for DeviceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DeviceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceResolver").finish_non_exhaustive()
    }
}

impl DeviceResolver {
    pub fn new() -> Self {
        Self::with_probe(SystemProbe)
    }

    pub fn with_probe(probe: impl DeviceProbe + 'static) -> Self {
        Self {
            probe: Arc::new(probe),
        }
    }

    pub fn resolve(&self, spec: impl Into<DeviceSpec>) -> Result<Device, ConfigError> {
        let name = match spec.into() {
            DeviceSpec::Resolved(device) => return Ok(device),
            DeviceSpec::Named(name) => name,
        };

        let parsed: ParsedDevice = name.parse()?;
        let device = match parsed.family {
            DeviceFamily::Cpu => Device::Cpu,
            DeviceFamily::Cuda => {
                let index = parsed.index.unwrap_or(0);
                let available = self.probe.cuda_device_count();
                if available == 0 {
                    return Err(ConfigError::DeviceUnavailable {
                        device: name,
                        reason: "no CUDA devices detected".to_string(),
                    });
                }
                if index >= available {
                    return Err(ConfigError::DeviceUnavailable {
                        device: name,
                        reason: format!("only {} CUDA device(s) detected", available),
                    });
                }
                Device::Cuda(index)
            }
        };

        debug!(requested = %name, resolved = %device, "Resolved compute device.");
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(gpus: usize) -> DeviceResolver {
        DeviceResolver::with_probe(FixedProbe(gpus))
    }

    #[test]
    fn cpu_resolves_without_gpus() {
        assert_eq!(resolver(0).resolve("cpu").unwrap(), Device::Cpu);
        assert_eq!(resolver(0).resolve(" CPU ").unwrap(), Device::Cpu);
    }

    #[test]
    fn cuda_without_index_defaults_to_zero() {
        assert_eq!(resolver(1).resolve("cuda").unwrap(), Device::Cuda(0));
    }

    #[test]
    fn cuda_with_index_is_parsed() {
        assert_eq!(resolver(2).resolve("cuda:1").unwrap(), Device::Cuda(1));
    }

    #[test]
    fn cuda_without_gpus_is_unavailable() {
        let err = resolver(0).resolve("cuda").unwrap_err();
        assert!(matches!(err, ConfigError::DeviceUnavailable { .. }));
    }

    #[test]
    fn cuda_index_out_of_range_is_unavailable() {
        let err = resolver(1).resolve("cuda:3").unwrap_err();
        match err {
            ConfigError::DeviceUnavailable { device, reason } => {
                assert_eq!(device, "cuda:3");
                assert!(reason.contains("1 CUDA device"));
            }
            other => panic!("Expected DeviceUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn malformed_specs_are_invalid() {
        for spec in ["tpu", "cuda:x", "", "cuda:-1"] {
            assert!(
                matches!(resolver(4).resolve(spec), Err(ConfigError::InvalidDevice(_))),
                "spec {:?} should be invalid",
                spec
            );
        }
    }

    #[test]
    fn resolved_device_passes_through_without_probing() {
        assert_eq!(
            resolver(0).resolve(Device::Cuda(7)).unwrap(),
            Device::Cuda(7)
        );
    }

    #[test]
    fn visibility_mask_without_a_driver_exposes_nothing() {
        assert_eq!(visible_device_count(Some("0"), 0), 0);
        assert_eq!(visible_device_count(Some("0,1,2"), 0), 0);
    }

    #[test]
    fn visibility_mask_is_capped_by_installed_devices() {
        assert_eq!(visible_device_count(Some("0,1,2,3"), 2), 2);
        assert_eq!(visible_device_count(Some("1"), 4), 1);
        assert_eq!(visible_device_count(Some(" 0, ,1 "), 4), 2);
    }

    #[test]
    fn unset_or_disabled_mask() {
        assert_eq!(visible_device_count(None, 3), 3);
        assert_eq!(visible_device_count(Some("-1"), 3), 0);
        assert_eq!(visible_device_count(Some(""), 3), 0);
    }

    #[test]
    fn display_round_trips_through_resolver() {
        let r = resolver(2);
        let device = r.resolve("cuda:1").unwrap();
        assert_eq!(device.to_string(), "cuda:1");
        assert_eq!(r.resolve(device.to_string()).unwrap(), device);
    }
}
