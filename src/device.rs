//! Device profile resolution.
//!
//! A transcription job runs on exactly one `DeviceProfile`, derived once from:
//! - what the hardware probe reports (accelerator present? how much VRAM?)
//! - which compute mode the user asked for
//!
//! Resolution is pure and total: every probe/mode combination maps to a valid
//! profile, and a CPU profile always carries `Float32` precision.

use std::process::Command;

use serde::Serialize;
use tracing::{debug, warn};

/// Compute device a transcription runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Device {
    Cpu,
    Accelerator,
}

/// Numeric precision used by the speech engine's computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Precision {
    Float32,
    Float16,
    Int8,
}

/// User-selected compute mode.
///
/// `Auto` picks a precision from the accelerator's VRAM; the explicit modes pin
/// a precision; `ForceCpu` ignores any accelerator entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ComputeMode {
    #[default]
    Auto,
    Float16,
    Float32,
    Int8,
    ForceCpu,
}

/// The resolved device + precision pair, immutable for the life of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceProfile {
    pub device: Device,
    pub precision: Precision,
}

/// What the probe learned about an accelerator, if one exists.
#[derive(Debug, Clone, Serialize)]
pub struct AcceleratorInfo {
    pub name: String,
    pub vram_bytes: u64,
}

impl AcceleratorInfo {
    /// VRAM in whole gigabytes (floor).
    pub fn vram_gb(&self) -> u64 {
        self.vram_bytes / (1024 * 1024 * 1024)
    }
}

/// Read-only snapshot of acceleration hardware.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HardwareReport {
    pub accelerator: Option<AcceleratorInfo>,
}

/// Capability for inspecting acceleration hardware.
///
/// Queried once at job start; implementations must be side-effect free.
pub trait HardwareProbe {
    fn probe(&self) -> HardwareReport;
}

/// `Auto` mode switches from `Float16` down to `Int8` below this VRAM size.
const AUTO_FLOAT16_MIN_VRAM_BYTES: u64 = 4 * 1024 * 1024 * 1024;

/// Derive the device/precision profile for one run.
pub fn resolve_profile(report: &HardwareReport, mode: ComputeMode) -> DeviceProfile {
    let Some(accel) = report.accelerator.as_ref() else {
        return DeviceProfile {
            device: Device::Cpu,
            precision: Precision::Float32,
        };
    };

    let precision = match mode {
        ComputeMode::ForceCpu => {
            return DeviceProfile {
                device: Device::Cpu,
                precision: Precision::Float32,
            };
        }
        ComputeMode::Auto => {
            if accel.vram_bytes >= AUTO_FLOAT16_MIN_VRAM_BYTES {
                Precision::Float16
            } else {
                Precision::Int8
            }
        }
        ComputeMode::Float16 => Precision::Float16,
        ComputeMode::Float32 => Precision::Float32,
        ComputeMode::Int8 => Precision::Int8,
    };

    DeviceProfile {
        device: Device::Accelerator,
        precision,
    }
}

/// Probe that queries `nvidia-smi` for the first CUDA device.
///
/// A missing binary, a non-zero exit, or unparseable output all degrade to
/// "no accelerator" rather than failing the job: CPU transcription is always a
/// valid fallback.
#[derive(Debug, Default)]
pub struct NvidiaSmiProbe;

impl HardwareProbe for NvidiaSmiProbe {
    fn probe(&self) -> HardwareReport {
        let output = Command::new("nvidia-smi")
            .args([
                "--query-gpu=name,memory.total",
                "--format=csv,noheader,nounits",
            ])
            .output();

        let output = match output {
            Ok(out) if out.status.success() => out,
            Ok(out) => {
                debug!(status = %out.status, "nvidia-smi exited non-zero; assuming no accelerator");
                return HardwareReport::default();
            }
            Err(err) => {
                debug!(error = %err, "nvidia-smi not runnable; assuming no accelerator");
                return HardwareReport::default();
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_nvidia_smi_line(stdout.lines().next().unwrap_or_default()) {
            Some(accel) => {
                debug!(name = %accel.name, vram_gb = accel.vram_gb(), "accelerator detected");
                HardwareReport {
                    accelerator: Some(accel),
                }
            }
            None => {
                warn!("nvidia-smi produced unparseable output; assuming no accelerator");
                HardwareReport::default()
            }
        }
    }
}

/// Parse one `name, memory.total` CSV line; memory is reported in MiB.
fn parse_nvidia_smi_line(line: &str) -> Option<AcceleratorInfo> {
    let (name, mem) = line.rsplit_once(',')?;
    let name = name.trim();
    let vram_mib: u64 = mem.trim().parse().ok()?;
    if name.is_empty() {
        return None;
    }

    Some(AcceleratorInfo {
        name: name.to_owned(),
        vram_bytes: vram_mib * 1024 * 1024,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accel(vram_gb: u64) -> HardwareReport {
        HardwareReport {
            accelerator: Some(AcceleratorInfo {
                name: "Test GPU".to_owned(),
                vram_bytes: vram_gb * 1024 * 1024 * 1024,
            }),
        }
    }

    #[test]
    fn no_accelerator_always_resolves_cpu_float32() {
        let report = HardwareReport::default();
        for mode in [
            ComputeMode::Auto,
            ComputeMode::Float16,
            ComputeMode::Float32,
            ComputeMode::Int8,
            ComputeMode::ForceCpu,
        ] {
            let profile = resolve_profile(&report, mode);
            assert_eq!(profile.device, Device::Cpu);
            assert_eq!(profile.precision, Precision::Float32);
        }
    }

    #[test]
    fn force_cpu_ignores_accelerator() {
        let profile = resolve_profile(&accel(24), ComputeMode::ForceCpu);
        assert_eq!(profile.device, Device::Cpu);
        assert_eq!(profile.precision, Precision::Float32);
    }

    #[test]
    fn auto_picks_float16_at_or_above_4gb() {
        assert_eq!(
            resolve_profile(&accel(4), ComputeMode::Auto).precision,
            Precision::Float16
        );
        assert_eq!(
            resolve_profile(&accel(6), ComputeMode::Auto).precision,
            Precision::Float16
        );
    }

    #[test]
    fn auto_picks_int8_below_4gb() {
        let profile = resolve_profile(&accel(2), ComputeMode::Auto);
        assert_eq!(profile.device, Device::Accelerator);
        assert_eq!(profile.precision, Precision::Int8);
    }

    #[test]
    fn explicit_modes_pin_precision_on_accelerator() {
        assert_eq!(
            resolve_profile(&accel(8), ComputeMode::Float32).precision,
            Precision::Float32
        );
        assert_eq!(
            resolve_profile(&accel(8), ComputeMode::Int8).precision,
            Precision::Int8
        );
        assert_eq!(
            resolve_profile(&accel(8), ComputeMode::Float16).device,
            Device::Accelerator
        );
    }

    #[test]
    fn parses_nvidia_smi_csv_line() {
        let accel = parse_nvidia_smi_line("NVIDIA GeForce RTX 3060, 12288").expect("parses");
        assert_eq!(accel.name, "NVIDIA GeForce RTX 3060");
        assert_eq!(accel.vram_gb(), 12);
    }

    #[test]
    fn rejects_garbage_nvidia_smi_output() {
        assert!(parse_nvidia_smi_line("").is_none());
        assert!(parse_nvidia_smi_line("no devices found").is_none());
        assert!(parse_nvidia_smi_line(", 4096").is_none());
    }
}
