//! Hardware capability probing.
//!
//! Detects the facts that drive variant selection on linux/amd64: NVIDIA
//! GPU presence, the CUDA runtime major version, and the CPU SIMD tier.
//! Each fact is resolved by an ordered list of independent probe
//! strategies. A strategy reports a tri-state [`Signal`] and the first
//! definite answer wins; if every strategy comes back indeterminate the
//! fact degrades to a safe default (false / unknown) rather than failing
//! the run.
//!
//! All probes are read-only queries of the local system. The parsing
//! halves are pure functions over captured output so they can be tested
//! without a GPU in sight.

use std::path::Path;
use std::process::Command;

use regex::Regex;

use crate::platform::PlatformTuple;

/// SONAME of the CUDA 12 runtime, used as the probe target for
/// "is a CUDA 12 runtime installed".
pub const CUDA_RUNTIME_SONAME: &str = "libcudart.so.12";

/// Well-known directories where CUDA runtime libraries land when the
/// dynamic-linker cache doesn't know about them.
pub const CUDA_LIB_DIRS: &[&str] = &[
    "/usr/local/cuda/lib64",
    "/usr/local/cuda-12/lib64",
    "/usr/local/cuda/targets/x86_64-linux/lib",
    "/usr/lib/x86_64-linux-gnu",
    "/usr/lib64",
    "/opt/cuda/lib64",
];

/// Tri-state result of a single probe strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Yes,
    No,
    Indeterminate,
}

impl Signal {
    /// Combine an ordered list of probe results: the first definite
    /// answer (Yes or No) wins, later strategies are never consulted.
    pub fn first_definite(signals: impl IntoIterator<Item = Signal>) -> Signal {
        for s in signals {
            if s != Signal::Indeterminate {
                return s;
            }
        }
        Signal::Indeterminate
    }

    /// Collapse to a bool, treating indeterminate as the given default.
    pub fn unwrap_or(self, default: bool) -> bool {
        match self {
            Signal::Yes => true,
            Signal::No => false,
            Signal::Indeterminate => default,
        }
    }
}

/// Snapshot of the host's acceleration-relevant hardware facts.
///
/// Probed once per run, immutable afterwards. On platforms other than
/// linux/amd64 every field stays at its unknown/false default and is
/// never consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilityProfile {
    /// A working NVIDIA driver responded to `nvidia-smi`.
    pub has_nvidia_gpu: bool,
    /// CUDA runtime major version, when any probe could determine it.
    pub cuda_major: Option<u32>,
    /// CPU advertises AVX2.
    pub has_avx2: bool,
    /// CPU advertises AVX-512 (foundation subset).
    pub has_avx512: bool,
}

/// Probe the host. Skipped entirely (all-default profile) on platforms
/// that only ship a single build.
pub fn probe(tuple: &PlatformTuple) -> CapabilityProfile {
    if !tuple.wants_probing() {
        tracing::debug!("Capability probing skipped on {}", tuple);
        return CapabilityProfile::default();
    }

    let smi_output = run_nvidia_smi();

    let gpu = Signal::first_definite([gpu_signal(&smi_output)]);
    let has_nvidia_gpu = gpu.unwrap_or(false);

    // Independent of the GPU fact: the runtime can be registered with
    // the linker even when nvidia-smi is absent or failing.
    let cuda_major = detect_cuda_major(smi_output.as_deref());

    let cpuinfo = std::fs::read_to_string("/proc/cpuinfo").ok();
    let has_avx2 = cpu_flag_signal(cpuinfo.as_deref(), "avx2").unwrap_or(false);
    let has_avx512 = cpu_flag_signal(cpuinfo.as_deref(), "avx512f").unwrap_or(false);

    let profile = CapabilityProfile {
        has_nvidia_gpu,
        cuda_major,
        has_avx2,
        has_avx512,
    };

    tracing::info!(
        "Capabilities: gpu={} cuda={} avx2={} avx512={}",
        profile.has_nvidia_gpu,
        profile
            .cuda_major
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown".into()),
        profile.has_avx2,
        profile.has_avx512,
    );
    if profile.has_nvidia_gpu && profile.cuda_major.is_none() {
        tracing::warn!("NVIDIA GPU present but CUDA runtime version could not be determined");
    }

    profile
}

/// Capture `nvidia-smi` stdout. `None` when the command is missing or
/// exits nonzero; a present-but-nonfunctional driver is treated the
/// same as no driver at all.
fn run_nvidia_smi() -> Option<String> {
    match Command::new("nvidia-smi").output() {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(output) => {
            tracing::warn!(
                "nvidia-smi exited with {:?}; treating GPU as absent",
                output.status.code()
            );
            None
        }
        Err(_) => None,
    }
}

/// GPU presence from a captured `nvidia-smi` run. The single strategy
/// for this fact is definite either way: working driver or not.
fn gpu_signal(smi_output: &Option<String>) -> Signal {
    if smi_output.is_some() {
        Signal::Yes
    } else {
        Signal::No
    }
}

/// Resolve the CUDA runtime major version through the ordered fallback
/// chain: driver-reported version, dynamic-linker cache, fixed paths.
fn detect_cuda_major(smi_output: Option<&str>) -> Option<u32> {
    let strategies: [&dyn Fn() -> Option<u32>; 3] = [
        &|| smi_output.and_then(parse_cuda_major),
        &|| cuda_major_from_ldconfig(&run_ldconfig()?),
        &cuda_major_from_known_paths,
    ];

    for strategy in strategies {
        if let Some(major) = strategy() {
            return Some(major);
        }
    }
    None
}

/// Parse the `CUDA Version: X.Y` token the driver prints in the
/// `nvidia-smi` banner.
pub fn parse_cuda_major(smi_output: &str) -> Option<u32> {
    let re = Regex::new(r"CUDA Version:\s*(\d+)(?:\.\d+)?").ok()?;
    re.captures(smi_output)?.get(1)?.as_str().parse().ok()
}

/// Capture `ldconfig -p` output (the dynamic-linker cache listing).
fn run_ldconfig() -> Option<String> {
    let output = Command::new("ldconfig").arg("-p").output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// CUDA 12 major inferred from the runtime SONAME being registered in
/// the linker cache.
pub fn cuda_major_from_ldconfig(cache_listing: &str) -> Option<u32> {
    if cache_lists_soname(cache_listing, CUDA_RUNTIME_SONAME) {
        Some(12)
    } else {
        None
    }
}

/// Whether a linker-cache listing mentions a SONAME.
pub fn cache_lists_soname(cache_listing: &str, soname: &str) -> bool {
    cache_listing
        .lines()
        .any(|line| line.trim_start().starts_with(soname))
}

/// CUDA 12 major inferred from the runtime SONAME sitting at a
/// well-known path.
fn cuda_major_from_known_paths() -> Option<u32> {
    for dir in CUDA_LIB_DIRS {
        if Path::new(dir).join(CUDA_RUNTIME_SONAME).exists() {
            return Some(12);
        }
    }
    None
}

/// SIMD feature detection from the CPU flags listing. A missing listing
/// is indeterminate; the caller defaults it to false.
pub fn cpu_flag_signal(cpuinfo: Option<&str>, flag: &str) -> Signal {
    let Some(cpuinfo) = cpuinfo else {
        return Signal::Indeterminate;
    };

    let found = cpuinfo
        .lines()
        .filter(|line| line.starts_with("flags") || line.starts_with("Features"))
        .any(|line| line.split_whitespace().any(|token| token == flag));

    if found {
        Signal::Yes
    } else {
        Signal::No
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformTuple;

    const SMI_BANNER: &str = "\
+-----------------------------------------------------------------------------+
| NVIDIA-SMI 550.54.14    Driver Version: 550.54.14    CUDA Version: 12.4     |
|-------------------------------+----------------------+----------------------+
";

    const CPUINFO_AVX512: &str = "\
processor\t: 0
vendor_id\t: GenuineIntel
flags\t\t: fpu vme avx avx2 avx512f avx512dq sse4_2
";

    const CPUINFO_AVX2_ONLY: &str = "\
processor\t: 0
flags\t\t: fpu vme avx avx2 sse4_2
";

    #[test]
    fn first_definite_returns_first_non_indeterminate() {
        use Signal::*;
        assert_eq!(Signal::first_definite([Indeterminate, No, Yes]), No);
        assert_eq!(Signal::first_definite([Yes, No]), Yes);
        assert_eq!(
            Signal::first_definite([Indeterminate, Indeterminate]),
            Indeterminate
        );
        assert_eq!(Signal::first_definite([]), Indeterminate);
    }

    #[test]
    fn signal_unwrap_or_defaults_only_indeterminate() {
        assert!(Signal::Yes.unwrap_or(false));
        assert!(!Signal::No.unwrap_or(true));
        assert!(Signal::Indeterminate.unwrap_or(true));
        assert!(!Signal::Indeterminate.unwrap_or(false));
    }

    #[test]
    fn parse_cuda_major_from_banner() {
        assert_eq!(parse_cuda_major(SMI_BANNER), Some(12));
    }

    #[test]
    fn parse_cuda_major_without_minor() {
        assert_eq!(parse_cuda_major("CUDA Version: 11"), Some(11));
    }

    #[test]
    fn parse_cuda_major_absent() {
        assert_eq!(parse_cuda_major("NVIDIA-SMI has failed"), None);
        assert_eq!(parse_cuda_major(""), None);
    }

    #[test]
    fn cache_listing_matches_soname_at_line_start() {
        let listing = "\
\tlibcublas.so.12 (libc6,x86-64) => /usr/lib/x86_64-linux-gnu/libcublas.so.12
\tlibcudart.so.12 (libc6,x86-64) => /usr/lib/x86_64-linux-gnu/libcudart.so.12
";
        assert!(cache_lists_soname(listing, "libcudart.so.12"));
        assert!(cache_lists_soname(listing, "libcublas.so.12"));
        assert!(!cache_lists_soname(listing, "libcublasLt.so.12"));
    }

    #[test]
    fn cuda_major_from_ldconfig_is_twelve_when_listed() {
        let listing = "\tlibcudart.so.12 (libc6,x86-64) => /usr/lib/libcudart.so.12\n";
        assert_eq!(cuda_major_from_ldconfig(listing), Some(12));
        assert_eq!(cuda_major_from_ldconfig(""), None);
    }

    #[test]
    fn cpu_flags_detect_avx_tiers() {
        assert_eq!(
            cpu_flag_signal(Some(CPUINFO_AVX512), "avx2"),
            Signal::Yes
        );
        assert_eq!(
            cpu_flag_signal(Some(CPUINFO_AVX512), "avx512f"),
            Signal::Yes
        );
        assert_eq!(
            cpu_flag_signal(Some(CPUINFO_AVX2_ONLY), "avx512f"),
            Signal::No
        );
    }

    #[test]
    fn cpu_flag_requires_whole_token() {
        // "avx" must not match inside "avx2" or "avx512f"
        assert_eq!(
            cpu_flag_signal(Some("flags\t\t: avx2 avx512f"), "avx"),
            Signal::No
        );
    }

    #[test]
    fn missing_cpuinfo_is_indeterminate() {
        assert_eq!(cpu_flag_signal(None, "avx2"), Signal::Indeterminate);
    }

    #[test]
    fn probe_skips_non_linux_amd64() {
        let tuple = PlatformTuple::from_raw("darwin", "arm64");
        let profile = probe(&tuple);
        assert_eq!(profile, CapabilityProfile::default());
        assert!(!profile.has_nvidia_gpu);
        assert!(profile.cuda_major.is_none());
    }

    #[test]
    fn gpu_signal_is_definite_both_ways() {
        assert_eq!(gpu_signal(&Some("ok".into())), Signal::Yes);
        assert_eq!(gpu_signal(&None), Signal::No);
    }
}
