//! Platform probes.
//!
//! `detect()` dispatches to platform-specific probes (NVIDIA → Apple
//! Silicon → ROCm → CPU-only fallback) and joins the cross-platform
//! CPU/RAM/storage probes into a [`HardwareProfile`]. Individual probe
//! failures are collected into the profile's warnings; the run is fatal
//! only when the GPU or RAM subsystem cannot be resolved at all.

use std::collections::BTreeSet;
use std::fs;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::CoreError;
use crate::utils::shell::{
    csv_fields, first_json, first_number, payload_head, run_number, CommandRunner, SystemRunner,
    PROBE_TIMEOUT,
};

use super::lookup;
use super::{
    ComputeCapability, CpuInfo, CpuTier, FormFactor, GpuInfo, GpuVendor, HardwareProfile,
    Platform, PowerState, RamInfo, RamKind, StorageInfo, StorageKind, ThermalState, OS_RESERVE_GB,
};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// GPU, chassis and platform facts resolved by one platform probe.
struct PlatformProbe {
    platform: Platform,
    gpu: GpuInfo,
    form_factor: FormFactor,
    thermal_state: ThermalState,
    power_state: PowerState,
}

/// Probe the host system.
pub fn detect() -> Result<HardwareProfile, CoreError> {
    detect_with(&SystemRunner)
}

/// Probe through an explicit [`CommandRunner`] (stubbed in tests).
pub fn detect_with(runner: &dyn CommandRunner) -> Result<HardwareProfile, CoreError> {
    let mut warnings = Vec::new();

    let probe = probe_platform(runner, &mut warnings)?;
    debug!(platform = probe.platform.id(), gpu = %probe.gpu.name, "platform resolved");

    let cpu = probe_cpu(runner, &mut warnings);
    let mut ram = probe_ram(runner, &mut warnings)?;

    if probe.platform.is_apple() {
        // Unified memory: the RAM pool is the GPU pool.
        ram.kind = RamKind::Unified;
        ram.bandwidth_gbps = probe.gpu.memory_bandwidth_gbps;
    } else if ram.bandwidth_gbps.is_none() {
        warnings.push("RAM bandwidth unknown (memory type or clock not identified)".to_string());
    }

    let storage = probe_storage(runner, &mut warnings);

    HardwareProfile::build(
        probe.platform,
        probe.gpu,
        cpu,
        ram,
        storage,
        probe.form_factor,
        probe.thermal_state,
        probe.power_state,
        warnings,
    )
}

fn probe_platform(
    runner: &dyn CommandRunner,
    warnings: &mut Vec<String>,
) -> Result<PlatformProbe, CoreError> {
    if let Some(probe) = probe_nvidia(runner, warnings)? {
        return Ok(probe);
    }
    if let Some(probe) = probe_apple(runner, warnings)? {
        return Ok(probe);
    }
    if let Some(probe) = probe_rocm(runner, warnings)? {
        return Ok(probe);
    }

    warnings.push("no supported GPU detected; using CPU-only profile".to_string());
    Ok(PlatformProbe {
        platform: Platform::CpuOnly,
        gpu: GpuInfo::none(),
        form_factor: FormFactor::desktop(),
        thermal_state: ThermalState::Nominal,
        power_state: PowerState::Ac,
    })
}

// --- NVIDIA ---

fn probe_nvidia(
    runner: &dyn CommandRunner,
    warnings: &mut Vec<String>,
) -> Result<Option<PlatformProbe>, CoreError> {
    let output = match runner.run(
        "nvidia-smi",
        &[
            "--query-gpu=name,memory.total,compute_cap,power.limit,temperature.gpu",
            "--format=csv,noheader,nounits",
        ],
        PROBE_TIMEOUT,
    ) {
        Ok(out) => out,
        Err(e) => {
            debug!(cause = %e, "nvidia-smi not usable");
            return Ok(None);
        }
    };

    let line = output
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| CoreError::probe("gpu", "nvidia-smi returned no devices"))?;
    let fields = csv_fields(line);
    if fields.len() < 5 {
        return Err(CoreError::probe(
            "gpu",
            format!("unexpected nvidia-smi fields: {:?}", payload_head(&output)),
        ));
    }

    let name = fields[0].clone();
    let vram_gb = first_number(&fields[1])
        .ok_or_else(|| {
            CoreError::probe("gpu", format!("unparsable VRAM field: {:?}", fields[1]))
        })?
        / 1024.0;

    let compute_capability = parse_compute_cap(&fields[2]);
    if compute_capability.is_none() {
        warnings.push(format!(
            "compute capability unreadable for '{}' ({:?})",
            name, fields[2]
        ));
    }
    let cc_value = compute_capability.map(|cc| cc.value()).unwrap_or(0.0);

    let power_limit = first_number(&fields[3]).map(|w| w as f32).filter(|w| *w > 0.0);
    let reference_tdp = match lookup::reference_tdp_watts(&name) {
        Some(tdp) => Some(tdp),
        None => {
            warnings.push(format!("no reference TDP entry for '{name}'"));
            None
        }
    };

    let is_laptop = lookup::name_marks_laptop(&name)
        || matches!(
            (power_limit, reference_tdp),
            (Some(p), Some(r)) if p < r * lookup::LAPTOP_POWER_RATIO
        );
    let form_factor = if is_laptop {
        FormFactor::laptop(power_limit, reference_tdp)
    } else {
        FormFactor::desktop()
    };

    let thermal_state = first_number(&fields[4])
        .map(|celsius| match celsius {
            t if t < 80.0 => ThermalState::Nominal,
            t if t < 88.0 => ThermalState::Fair,
            t if t < 95.0 => ThermalState::Serious,
            _ => ThermalState::Critical,
        })
        .unwrap_or(ThermalState::Nominal);

    let gpu = GpuInfo {
        vendor: GpuVendor::Nvidia,
        name,
        vram_gb: vram_gb as f32,
        memory_bandwidth_gbps: None,
        compute_capability,
        supports_fp8: cc_value >= 8.9,
        supports_bf16: cc_value >= 8.0,
        supports_fp4: cc_value >= 12.0,
        flash_attention: cc_value >= 8.0,
        unified_memory: false,
    };

    let power_state = if is_laptop && linux_on_battery() {
        PowerState::Battery
    } else {
        PowerState::Ac
    };

    Ok(Some(PlatformProbe {
        platform: if is_laptop {
            Platform::NvidiaLaptop
        } else {
            Platform::NvidiaDesktop
        },
        gpu,
        form_factor,
        thermal_state,
        power_state,
    }))
}

fn parse_compute_cap(field: &str) -> Option<ComputeCapability> {
    let mut parts = field.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().unwrap_or("0").parse().ok()?;
    Some(ComputeCapability::new(major, minor))
}

fn linux_on_battery() -> bool {
    let Ok(entries) = fs::read_dir("/sys/class/power_supply") else {
        return false;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let kind = fs::read_to_string(path.join("type")).unwrap_or_default();
        if kind.trim() == "Mains" {
            let online = fs::read_to_string(path.join("online")).unwrap_or_default();
            return online.trim() == "0";
        }
    }
    false
}

// --- Apple Silicon ---

fn probe_apple(
    runner: &dyn CommandRunner,
    warnings: &mut Vec<String>,
) -> Result<Option<PlatformProbe>, CoreError> {
    let brand = match runner.run("sysctl", &["-n", "machdep.cpu.brand_string"], PROBE_TIMEOUT) {
        Ok(out) => out.trim().to_string(),
        Err(_) => return Ok(None),
    };
    if !brand.to_lowercase().contains("apple") {
        return Ok(None);
    }

    let bandwidth = match lookup::apple_bandwidth_gbps(&brand) {
        Some(gbps) => gbps,
        None => {
            warnings.push(format!(
                "unknown Apple chip '{}'; assuming {} GB/s unified bandwidth",
                brand,
                lookup::APPLE_BANDWIDTH_FALLBACK_GBPS
            ));
            lookup::APPLE_BANDWIDTH_FALLBACK_GBPS
        }
    };

    let thermal_state = probe_apple_thermal(runner, warnings);
    let power_state = runner
        .run("pmset", &["-g", "batt"], PROBE_TIMEOUT)
        .map(|out| {
            if out.contains("AC Power") {
                PowerState::Ac
            } else {
                PowerState::Battery
            }
        })
        .unwrap_or(PowerState::Ac);

    let is_laptop = runner
        .run("sysctl", &["-n", "hw.model"], PROBE_TIMEOUT)
        .map(|model| model.to_lowercase().contains("book"))
        .unwrap_or(false);

    let gpu = GpuInfo {
        vendor: GpuVendor::Apple,
        name: brand.clone(),
        vram_gb: 0.0,
        memory_bandwidth_gbps: Some(bandwidth),
        compute_capability: None,
        supports_fp8: false,
        supports_bf16: !brand.to_lowercase().contains("m1"),
        supports_fp4: false,
        flash_attention: false,
        unified_memory: true,
    };

    // Apple laptops hold clocks under sustained diffusion loads; the power
    // facts behind the desktop/laptop ratio formula are not exposed.
    let form_factor = FormFactor {
        is_laptop,
        power_limit_watts: None,
        reference_tdp_watts: None,
        sustained_performance_ratio: 1.0,
    };

    Ok(Some(PlatformProbe {
        platform: Platform::AppleSilicon,
        gpu,
        form_factor,
        thermal_state,
        power_state,
    }))
}

fn probe_apple_thermal(runner: &dyn CommandRunner, warnings: &mut Vec<String>) -> ThermalState {
    match runner.run("pmset", &["-g", "therm"], PROBE_TIMEOUT) {
        Ok(out) => {
            let limit = out
                .lines()
                .find(|l| l.contains("CPU_Speed_Limit"))
                .and_then(|l| first_number(l));
            match limit {
                Some(l) if l >= 100.0 => ThermalState::Nominal,
                Some(l) if l >= 80.0 => ThermalState::Fair,
                Some(l) if l >= 50.0 => ThermalState::Serious,
                Some(_) => ThermalState::Critical,
                None => ThermalState::Nominal,
            }
        }
        Err(e) => {
            warnings.push(format!("thermal advisory unavailable ({e})"));
            ThermalState::Nominal
        }
    }
}

// --- AMD ROCm ---

static GFX_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"gfx\d+").unwrap());

fn probe_rocm(
    runner: &dyn CommandRunner,
    warnings: &mut Vec<String>,
) -> Result<Option<PlatformProbe>, CoreError> {
    let output = match runner.run("rocm-smi", &["--showmeminfo", "vram", "--json"], PROBE_TIMEOUT)
    {
        Ok(out) => out,
        Err(_) => return Ok(None),
    };

    let json = first_json(&output).ok_or_else(|| {
        CoreError::probe(
            "gpu",
            format!("rocm-smi output not JSON: {:?}", payload_head(&output)),
        )
    })?;

    let mut vram_bytes: Option<f64> = None;
    if let Some(cards) = json.as_object() {
        for fields in cards.values() {
            let Some(card) = fields.as_object() else {
                continue;
            };
            for (key, value) in card {
                if key.to_lowercase().contains("vram total") {
                    vram_bytes = value
                        .as_f64()
                        .or_else(|| value.as_str().and_then(|s| first_number(s)));
                }
            }
            if vram_bytes.is_some() {
                break;
            }
        }
    }
    let vram_gb = (vram_bytes
        .ok_or_else(|| CoreError::probe("gpu", "rocm-smi JSON carried no VRAM total"))?
        / GIB) as f32;

    let name = runner
        .run("rocminfo", &[], PROBE_TIMEOUT)
        .ok()
        .and_then(|out| GFX_VERSION.find(&out).map(|m| format!("AMD GPU ({})", m.as_str())))
        .unwrap_or_else(|| "AMD GPU (gfx unknown)".to_string());

    warnings.push("AMD ROCm support is experimental".to_string());

    let thermal_state = runner
        .run("rocm-smi", &["--showtemp"], PROBE_TIMEOUT)
        .ok()
        .and_then(|out| first_number(&out))
        .map(|celsius| match celsius {
            t if t < 80.0 => ThermalState::Nominal,
            t if t < 90.0 => ThermalState::Fair,
            t if t < 100.0 => ThermalState::Serious,
            _ => ThermalState::Critical,
        })
        .unwrap_or(ThermalState::Nominal);

    let gpu = GpuInfo {
        vendor: GpuVendor::Amd,
        name,
        vram_gb,
        memory_bandwidth_gbps: None,
        compute_capability: None,
        supports_fp8: false,
        supports_bf16: false,
        supports_fp4: false,
        flash_attention: false,
        unified_memory: false,
    };

    Ok(Some(PlatformProbe {
        platform: Platform::AmdRocm,
        gpu,
        form_factor: FormFactor::desktop(),
        thermal_state,
        power_state: PowerState::Ac,
    }))
}

// --- CPU (cross-platform) ---

fn probe_cpu(runner: &dyn CommandRunner, warnings: &mut Vec<String>) -> CpuInfo {
    let logical = std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1);

    let mut physical = run_number(runner, "sysctl", &["-n", "hw.physicalcpu"])
        .ok()
        .map(|n| n as u32);
    let mut model = runner
        .run("sysctl", &["-n", "machdep.cpu.brand_string"], PROBE_TIMEOUT)
        .ok()
        .map(|s| s.trim().to_string());
    let mut flags = runner
        .run("sysctl", &["-n", "machdep.cpu.features"], PROBE_TIMEOUT)
        .ok()
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    if let Ok(leaf7) = runner.run("sysctl", &["-n", "machdep.cpu.leaf7_features"], PROBE_TIMEOUT) {
        flags.push(' ');
        flags.push_str(&leaf7.to_lowercase());
    }

    if physical.is_none() || model.is_none() || flags.trim().is_empty() {
        if let Ok(cpuinfo) = fs::read_to_string("/proc/cpuinfo") {
            if physical.is_none() {
                physical = physical_cores_from_cpuinfo(&cpuinfo);
            }
            if model.is_none() {
                model = cpuinfo
                    .lines()
                    .find(|l| l.starts_with("model name"))
                    .and_then(|l| l.split(':').nth(1))
                    .map(|s| s.trim().to_string());
            }
            if flags.trim().is_empty() {
                if let Some(line) = cpuinfo.lines().find(|l| l.starts_with("flags")) {
                    flags = line.to_lowercase();
                }
            }
        }
    }

    let physical = physical.unwrap_or_else(|| {
        warnings.push("physical core count unknown; assuming the logical count".to_string());
        logical
    });
    let model = model.unwrap_or_else(|| {
        warnings.push("CPU model string unavailable".to_string());
        "unknown".to_string()
    });

    let arch = std::env::consts::ARCH.to_string();
    let x86 = arch == "x86_64" || arch == "x86";

    CpuInfo {
        model,
        physical_cores: physical,
        logical_cores: logical.max(physical),
        arch,
        supports_avx: x86 && flags.contains("avx"),
        supports_avx2: x86 && flags.contains("avx2"),
        supports_avx512: x86 && flags.contains("avx512"),
        tier: CpuTier::from_physical_cores(physical),
    }
}

fn physical_cores_from_cpuinfo(cpuinfo: &str) -> Option<u32> {
    let mut cores: BTreeSet<(u32, u32)> = BTreeSet::new();
    let mut physical_id = None;
    for line in cpuinfo.lines() {
        if line.starts_with("physical id") {
            physical_id = line.split(':').nth(1).and_then(|v| v.trim().parse().ok());
        } else if line.starts_with("core id") {
            if let (Some(pkg), Some(core)) = (
                physical_id,
                line.split(':').nth(1).and_then(|v| v.trim().parse().ok()),
            ) {
                cores.insert((pkg, core));
            }
        }
    }
    if cores.is_empty() {
        None
    } else {
        Some(cores.len() as u32)
    }
}

// --- RAM (cross-platform) ---

fn probe_ram(runner: &dyn CommandRunner, warnings: &mut Vec<String>) -> Result<RamInfo, CoreError> {
    // sysctl path first (macOS, and the one stub runners control fully)
    if let Ok(total_bytes) = run_number(runner, "sysctl", &["-n", "hw.memsize"]) {
        let total_gb = (total_bytes / GIB) as f32;
        let available_gb = match probe_vm_stat(runner) {
            Some(gb) => gb,
            None => {
                warnings.push(
                    "vm_stat unavailable; assuming total minus the OS reserve is free".to_string(),
                );
                (total_gb - OS_RESERVE_GB).max(0.0)
            }
        };
        return Ok(RamInfo::new(total_gb, available_gb, RamKind::Unknown, None, None));
    }

    let meminfo = fs::read_to_string("/proc/meminfo").map_err(|e| {
        CoreError::probe("ram", format!("no sysctl path and /proc/meminfo unreadable: {e}"))
    })?;
    let total_kb = meminfo_value(&meminfo, "MemTotal:").ok_or_else(|| {
        CoreError::probe("ram", format!("MemTotal missing: {:?}", payload_head(&meminfo)))
    })?;
    let total_gb = (total_kb / 1024.0 / 1024.0) as f32;
    let available_gb = match meminfo_value(&meminfo, "MemAvailable:") {
        Some(kb) => (kb / 1024.0 / 1024.0) as f32,
        None => {
            warnings.push("MemAvailable missing; assuming 80% of total is free".to_string());
            total_gb * 0.8
        }
    };

    let (kind, speed_mhz) = match probe_ram_kind(runner) {
        Some((kind, speed)) => (kind, Some(speed)),
        None => (RamKind::Unknown, None),
    };
    let bandwidth = speed_mhz.and_then(|speed| {
        let gbps = lookup::ram_bandwidth_gbps(kind, speed);
        if gbps.is_none() {
            warnings.push(format!("no bandwidth entry for {kind:?} at {speed} MHz"));
        }
        gbps
    });

    Ok(RamInfo::new(total_gb, available_gb, kind, speed_mhz, bandwidth))
}

fn probe_vm_stat(runner: &dyn CommandRunner) -> Option<f32> {
    let out = runner.run("vm_stat", &[], PROBE_TIMEOUT).ok()?;
    let page_size = out
        .lines()
        .next()
        .and_then(|l| first_number(l))
        .unwrap_or(4096.0);
    let pages = |label: &str| -> f64 {
        out.lines()
            .find(|l| l.starts_with(label))
            .and_then(|l| first_number(l.trim_start_matches(label)))
            .unwrap_or(0.0)
    };
    let free = pages("Pages free:") + pages("Pages inactive:");
    if free <= 0.0 {
        return None;
    }
    Some(((free * page_size) / GIB) as f32)
}

fn meminfo_value(meminfo: &str, key: &str) -> Option<f64> {
    meminfo
        .lines()
        .find(|l| l.starts_with(key))
        .and_then(|l| first_number(l))
}

fn probe_ram_kind(runner: &dyn CommandRunner) -> Option<(RamKind, u32)> {
    let out = runner
        .run("dmidecode", &["-t", "memory"], PROBE_TIMEOUT)
        .ok()?;
    let lower = out.to_lowercase();
    let kind = if lower.contains("lpddr5") {
        RamKind::Lpddr5
    } else if lower.contains("ddr5") {
        RamKind::Ddr5
    } else if lower.contains("ddr4") {
        RamKind::Ddr4
    } else {
        return None;
    };
    let speed = lower
        .lines()
        .find(|l| l.trim_start().starts_with("speed:"))
        .and_then(|l| first_number(l))
        .map(|n| n as u32)?;
    Some((kind, speed))
}

// --- Storage (cross-platform) ---

fn probe_storage(runner: &dyn CommandRunner, warnings: &mut Vec<String>) -> StorageInfo {
    let output = match runner.run("df", &["-k", "."], PROBE_TIMEOUT) {
        Ok(out) => out,
        Err(e) => {
            warnings.push(format!(
                "storage probe failed ({e}); local installs will be rejected for space"
            ));
            return StorageInfo {
                free_gb: 0.0,
                total_gb: 0.0,
                kind: StorageKind::Unknown,
                tier: super::StorageTier::Slow,
                read_mbps: lookup::HDD_READ_MBPS,
            };
        }
    };

    let line = output.lines().filter(|l| !l.trim().is_empty()).nth(1);
    let fields: Vec<&str> = line.map(|l| l.split_whitespace().collect()).unwrap_or_default();
    let (device, total_gb, free_gb) = if fields.len() >= 4 {
        let total = fields[1].parse::<f64>().unwrap_or(0.0) / 1024.0 / 1024.0;
        let free = fields[3].parse::<f64>().unwrap_or(0.0) / 1024.0 / 1024.0;
        (fields[0].to_string(), total as f32, free as f32)
    } else {
        warnings.push(format!("unexpected df output: {:?}", payload_head(&output)));
        (String::new(), 0.0, 0.0)
    };

    let kind = classify_storage_device(&device);
    if kind == StorageKind::Unknown {
        warnings.push(format!(
            "storage class of '{device}' unknown; assuming SATA-class throughput"
        ));
    }

    StorageInfo {
        free_gb,
        total_gb,
        kind,
        tier: kind.tier(),
        read_mbps: lookup::storage_read_mbps(kind),
    }
}

fn classify_storage_device(device: &str) -> StorageKind {
    if device.contains("nvme") {
        return StorageKind::Nvme;
    }
    // macOS internal volumes mount from /dev/diskNsM and are NVMe
    if device.starts_with("/dev/disk") {
        return StorageKind::Nvme;
    }
    if let Some(rest) = device.strip_prefix("/dev/sd") {
        let base: String = rest.chars().take_while(|c| c.is_alphabetic()).collect();
        let rotational =
            fs::read_to_string(format!("/sys/block/sd{base}/queue/rotational")).unwrap_or_default();
        return if rotational.trim() == "1" {
            StorageKind::Hdd
        } else {
            StorageKind::SataSsd
        };
    }
    StorageKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::shell::ShellError;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Stub runner mapping full command lines to canned output.
    struct StubRunner {
        responses: HashMap<String, String>,
    }

    impl StubRunner {
        fn new(entries: &[(&str, &str)]) -> Self {
            Self {
                responses: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            }
        }
    }

    impl CommandRunner for StubRunner {
        fn run(
            &self,
            program: &str,
            args: &[&str],
            _timeout: Duration,
        ) -> Result<String, ShellError> {
            let key = if args.is_empty() {
                program.to_string()
            } else {
                format!("{} {}", program, args.join(" "))
            };
            self.responses.get(&key).cloned().ok_or(ShellError {
                command: key,
                cause: "not stubbed".to_string(),
            })
        }
    }

    const NVIDIA_QUERY: &str = "nvidia-smi --query-gpu=name,memory.total,compute_cap,power.limit,temperature.gpu --format=csv,noheader,nounits";

    #[test]
    fn test_detect_nvidia_desktop() {
        let runner = StubRunner::new(&[
            (
                NVIDIA_QUERY,
                "NVIDIA GeForce RTX 4090, 24564, 8.9, 450.00, 45\n",
            ),
            ("sysctl -n hw.physicalcpu", "16\n"),
            ("sysctl -n machdep.cpu.brand_string", "Test x86 CPU\n"),
            ("sysctl -n machdep.cpu.features", "FPU AVX1.0\n"),
            ("sysctl -n machdep.cpu.leaf7_features", "AVX2 BMI1\n"),
            ("sysctl -n hw.memsize", "68719476736\n"),
            (
                "df -k .",
                "Filesystem 1K-blocks Used Available Use% Mounted\n/dev/nvme0n1p2 976762584 100000000 800000000 12% /\n",
            ),
        ]);

        let profile = detect_with(&runner).expect("detect");
        assert_eq!(profile.platform, Platform::NvidiaDesktop);
        assert!((profile.gpu.vram_gb - 23.99).abs() < 0.1);
        assert!(profile.gpu.supports_fp8);
        assert!(profile.gpu.flash_attention);
        assert!(!profile.gpu.supports_fp4);
        assert_eq!(profile.form_factor.sustained_performance_ratio, 1.0);
        assert_eq!(profile.storage.kind, StorageKind::Nvme);
        assert_eq!(profile.cpu.tier, CpuTier::High);
        assert!((profile.ram.total_gb - 64.0).abs() < 0.1);
    }

    #[test]
    fn test_detect_nvidia_laptop_by_power_limit() {
        let runner = StubRunner::new(&[
            (
                NVIDIA_QUERY,
                "NVIDIA GeForce RTX 4090 Laptop GPU, 16384, 8.9, 175.00, 52\n",
            ),
            ("sysctl -n hw.memsize", "34359738368\n"),
            ("df -k .", "fs 1K used avail\n/dev/nvme0n1p1 500000000 1 400000000\n"),
        ]);

        let profile = detect_with(&runner).expect("detect");
        assert_eq!(profile.platform, Platform::NvidiaLaptop);
        assert!(profile.form_factor.is_laptop);
        // 175 W against a 450 W reference board
        let expected = (175.0f32 / 450.0).sqrt();
        assert!(
            (profile.form_factor.sustained_performance_ratio - expected).abs() < 1e-3
        );
    }

    #[test]
    fn test_detect_apple_silicon() {
        let runner = StubRunner::new(&[
            ("sysctl -n machdep.cpu.brand_string", "Apple M3 Max\n"),
            ("sysctl -n hw.physicalcpu", "16\n"),
            ("sysctl -n hw.memsize", "51539607552\n"),
            ("sysctl -n hw.model", "MacBookPro18,2\n"),
            ("pmset -g therm", "CPU_Speed_Limit = 100\n"),
            ("pmset -g batt", "Now drawing from 'AC Power'\n"),
            (
                "vm_stat",
                "Mach Virtual Memory Statistics: (page size of 16384 bytes)\nPages free: 500000.\nPages inactive: 500000.\n",
            ),
            ("df -k .", "fs 1K used avail\n/dev/disk3s1 1000000000 1 700000000\n"),
        ]);

        let profile = detect_with(&runner).expect("detect");
        assert_eq!(profile.platform, Platform::AppleSilicon);
        assert!(profile.gpu.unified_memory);
        assert!(!profile.gpu.supports_fp8);
        assert_eq!(profile.gpu.memory_bandwidth_gbps, Some(400.0));
        assert_eq!(profile.ram.kind, RamKind::Unified);
        // 48 GB unified -> 36 GB effective
        assert!((profile.effective_vram_gb - 36.0).abs() < 0.1);
        assert_eq!(profile.thermal_state, ThermalState::Nominal);
        assert!(profile.form_factor.is_laptop);
    }

    #[test]
    fn test_unknown_apple_chip_records_warning() {
        let runner = StubRunner::new(&[
            ("sysctl -n machdep.cpu.brand_string", "Apple M9 Hyper\n"),
            ("sysctl -n hw.memsize", "17179869184\n"),
            ("df -k .", "fs 1K used avail\n/dev/disk3s1 1000000000 1 700000000\n"),
        ]);

        let profile = detect_with(&runner).expect("detect");
        assert_eq!(
            profile.gpu.memory_bandwidth_gbps,
            Some(lookup::APPLE_BANDWIDTH_FALLBACK_GBPS)
        );
        assert!(profile
            .warnings
            .iter()
            .any(|w| w.contains("unknown Apple chip")));
    }

    #[test]
    fn test_cpu_only_fallback_needs_ram() {
        // No GPU tools, no sysctl: detection must fail on RAM, not invent it.
        let runner = StubRunner::new(&[]);
        match detect_with(&runner) {
            Err(CoreError::Probe { field, .. }) => assert_eq!(field, "ram"),
            // On Linux hosts /proc/meminfo resolves RAM; the profile must
            // then be a CPU-only fallback.
            Ok(profile) => {
                assert_eq!(profile.platform, Platform::CpuOnly);
                assert_eq!(profile.gpu.vram_gb, 0.0);
                assert_eq!(profile.effective_vram_gb, 0.0);
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_compute_cap() {
        let cc = parse_compute_cap("8.9").unwrap();
        assert_eq!((cc.major, cc.minor), (8, 9));
        assert!((cc.value() - 8.9).abs() < 1e-6);
        assert!(parse_compute_cap("N/A").is_none());
    }
}
