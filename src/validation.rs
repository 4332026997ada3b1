//! Post-install CUDA dependency validation.
//!
//! After the CUDA variant is installed, checks whether the dynamic
//! loader can actually resolve the runtime libraries the native library
//! links against. Two strategies, in precedence order:
//!
//! 1. Run the loader's dependency lister (`ldd`) on the installed
//!    library and read its verdict directly.
//! 2. Check each required SONAME for presence in the linker cache and
//!    then in a fixed list of common library directories.
//!
//! Strategy 1 is authoritative when it yields a definite answer. When
//! its output mentions none of the required SONAMEs it is treated as
//! indeterminate and strategy 2 becomes the fallback of record — a
//! library with no CUDA references could be an ldd quirk rather than a
//! CPU-only build, so the conservative path re-checks presence.

use std::path::Path;
use std::process::Command;

use crate::capability::{cache_lists_soname, CUDA_LIB_DIRS};

/// The CUDA runtime SONAMEs the native library links against.
pub const REQUIRED_SONAMES: &[&str] = &["libcudart.so.12", "libcublas.so.12", "libcublasLt.so.12"];

/// Outcome of dependency validation. A closed set so callers branch on
/// outcome, not on error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// All required CUDA libraries resolve.
    Resolvable,
    /// Named libraries cannot be resolved by the loader.
    UnresolvableMissingLibs(Vec<String>),
    /// No strategy produced a definite answer.
    Indeterminate,
}

impl ValidationOutcome {
    pub fn is_definite(&self) -> bool {
        !matches!(self, ValidationOutcome::Indeterminate)
    }
}

/// Validate the installed CUDA-dependent library at `library_path`.
pub fn validate(library_path: &Path) -> ValidationOutcome {
    let direct = direct_resolution_check(library_path);
    if direct.is_definite() {
        tracing::debug!("ldd check on {} was definite", library_path.display());
        return direct;
    }

    tracing::debug!("ldd check indeterminate; falling back to presence check");
    presence_check()
}

/// Strategy 1: run `ldd` on the library and classify its output.
fn direct_resolution_check(library_path: &Path) -> ValidationOutcome {
    if !library_path.exists() {
        return ValidationOutcome::Indeterminate;
    }

    let output = match Command::new("ldd").arg(library_path).output() {
        Ok(output) => output,
        Err(_) => return ValidationOutcome::Indeterminate,
    };

    // ldd exits nonzero for "not a dynamic executable"; stdout still
    // carries the usable signal when there is one.
    let stdout = String::from_utf8_lossy(&output.stdout);
    classify_ldd_output(&stdout)
}

/// Classify captured `ldd` output against the required SONAMEs.
///
/// - any required SONAME on a `not found` line → unresolvable, naming it
/// - no required SONAME mentioned at all → indeterminate
/// - otherwise → resolvable
pub fn classify_ldd_output(ldd_output: &str) -> ValidationOutcome {
    let mut mentioned = false;
    let mut missing = Vec::new();

    for soname in REQUIRED_SONAMES {
        for line in ldd_output.lines() {
            if !line.contains(soname) {
                continue;
            }
            mentioned = true;
            if line.contains("not found") {
                missing.push(soname.to_string());
            }
            break;
        }
    }

    if !mentioned {
        return ValidationOutcome::Indeterminate;
    }
    if missing.is_empty() {
        ValidationOutcome::Resolvable
    } else {
        ValidationOutcome::UnresolvableMissingLibs(missing)
    }
}

/// Strategy 2: per-SONAME presence in the linker cache, then in fixed
/// library directories.
fn presence_check() -> ValidationOutcome {
    let cache = Command::new("ldconfig")
        .arg("-p")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).into_owned());

    let search_dirs: Vec<&Path> = CUDA_LIB_DIRS.iter().map(Path::new).collect();
    presence_check_with(cache.as_deref(), &search_dirs)
}

/// Presence check over explicit inputs. Split out for testability.
pub fn presence_check_with(cache_listing: Option<&str>, dirs: &[&Path]) -> ValidationOutcome {
    let missing: Vec<String> = REQUIRED_SONAMES
        .iter()
        .filter(|soname| {
            let in_cache = cache_listing
                .map(|cache| cache_lists_soname(cache, soname))
                .unwrap_or(false);
            !in_cache && !soname_in_dirs(soname, dirs)
        })
        .map(|s| s.to_string())
        .collect();

    if missing.is_empty() {
        ValidationOutcome::Resolvable
    } else {
        ValidationOutcome::UnresolvableMissingLibs(missing)
    }
}

/// Whether a directory in `dirs` holds the SONAME, exactly or with a
/// dotted version suffix (`libcudart.so.12` or `libcudart.so.12.4.1`).
fn soname_in_dirs(soname: &str, dirs: &[&Path]) -> bool {
    let versioned_prefix = format!("{soname}.");
    for dir in dirs {
        let Ok(entries) = std::fs::read_dir(dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name == soname || name.starts_with(&versioned_prefix) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const LDD_ALL_RESOLVED: &str = "\
\tlinux-vdso.so.1 (0x00007ffd3bd0c000)
\tlibcudart.so.12 => /usr/local/cuda/lib64/libcudart.so.12 (0x00007f2a40000000)
\tlibcublas.so.12 => /usr/local/cuda/lib64/libcublas.so.12 (0x00007f2a38000000)
\tlibcublasLt.so.12 => /usr/local/cuda/lib64/libcublasLt.so.12 (0x00007f2a20000000)
\tlibc.so.6 => /lib/x86_64-linux-gnu/libc.so.6 (0x00007f2a1fc00000)
";

    const LDD_CUDART_MISSING: &str = "\
\tlinux-vdso.so.1 (0x00007ffd3bd0c000)
\tlibcudart.so.12 => not found
\tlibcublas.so.12 => /usr/local/cuda/lib64/libcublas.so.12 (0x00007f2a38000000)
\tlibcublasLt.so.12 => /usr/local/cuda/lib64/libcublasLt.so.12 (0x00007f2a20000000)
";

    const LDD_NO_CUDA_REFS: &str = "\
\tlinux-vdso.so.1 (0x00007ffd3bd0c000)
\tlibm.so.6 => /lib/x86_64-linux-gnu/libm.so.6 (0x00007f2a40000000)
\tlibc.so.6 => /lib/x86_64-linux-gnu/libc.so.6 (0x00007f2a1fc00000)
";

    #[test]
    fn ldd_all_resolved_is_resolvable() {
        assert_eq!(
            classify_ldd_output(LDD_ALL_RESOLVED),
            ValidationOutcome::Resolvable
        );
    }

    #[test]
    fn ldd_not_found_names_the_missing_library() {
        match classify_ldd_output(LDD_CUDART_MISSING) {
            ValidationOutcome::UnresolvableMissingLibs(missing) => {
                assert_eq!(missing, vec!["libcudart.so.12".to_string()]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn ldd_multiple_missing_names_all() {
        let output = "\tlibcudart.so.12 => not found\n\tlibcublas.so.12 => not found\n\tlibcublasLt.so.12 => /usr/lib/libcublasLt.so.12 (0x1)\n";
        match classify_ldd_output(output) {
            ValidationOutcome::UnresolvableMissingLibs(missing) => {
                assert_eq!(missing.len(), 2);
                assert!(missing.contains(&"libcudart.so.12".to_string()));
                assert!(missing.contains(&"libcublas.so.12".to_string()));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn ldd_without_cuda_references_is_indeterminate() {
        // No mention of any required SONAME must NOT read as resolvable;
        // the presence check is the fallback of record.
        assert_eq!(
            classify_ldd_output(LDD_NO_CUDA_REFS),
            ValidationOutcome::Indeterminate
        );
    }

    #[test]
    fn ldd_empty_output_is_indeterminate() {
        assert_eq!(classify_ldd_output(""), ValidationOutcome::Indeterminate);
    }

    #[test]
    fn presence_check_accepts_cache_hits() {
        let cache = "\
\tlibcudart.so.12 (libc6,x86-64) => /usr/lib/libcudart.so.12
\tlibcublas.so.12 (libc6,x86-64) => /usr/lib/libcublas.so.12
\tlibcublasLt.so.12 (libc6,x86-64) => /usr/lib/libcublasLt.so.12
";
        assert_eq!(
            presence_check_with(Some(cache), &[]),
            ValidationOutcome::Resolvable
        );
    }

    #[test]
    fn presence_check_reports_missing_sonames() {
        let cache = "\tlibcudart.so.12 (libc6,x86-64) => /usr/lib/libcudart.so.12\n";
        match presence_check_with(Some(cache), &[]) {
            ValidationOutcome::UnresolvableMissingLibs(missing) => {
                assert_eq!(missing.len(), 2);
                assert!(missing.contains(&"libcublas.so.12".to_string()));
                assert!(missing.contains(&"libcublasLt.so.12".to_string()));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn presence_check_finds_versioned_files_in_dirs() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("libcudart.so.12.4.1"), b"").unwrap();
        fs::write(temp.path().join("libcublas.so.12"), b"").unwrap();
        fs::write(temp.path().join("libcublasLt.so.12.4.1"), b"").unwrap();

        assert_eq!(
            presence_check_with(None, &[temp.path()]),
            ValidationOutcome::Resolvable
        );
    }

    #[test]
    fn presence_check_rejects_lookalike_names() {
        let temp = TempDir::new().unwrap();
        // .so.120 must not satisfy .so.12
        fs::write(temp.path().join("libcudart.so.120"), b"").unwrap();
        fs::write(temp.path().join("libcublas.so.12"), b"").unwrap();
        fs::write(temp.path().join("libcublasLt.so.12"), b"").unwrap();

        match presence_check_with(None, &[temp.path()]) {
            ValidationOutcome::UnresolvableMissingLibs(missing) => {
                assert_eq!(missing, vec!["libcudart.so.12".to_string()]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn presence_check_with_nothing_reports_all_three() {
        match presence_check_with(None, &[]) {
            ValidationOutcome::UnresolvableMissingLibs(missing) => {
                assert_eq!(missing.len(), REQUIRED_SONAMES.len());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn validate_on_missing_library_falls_back_to_presence() {
        // Nonexistent path makes strategy 1 indeterminate; the result is
        // whatever presence probing on this host says, but it must be
        // definite or report missing libraries, never panic.
        let outcome = validate(Path::new("/nonexistent/libggml-cuda.so"));
        match outcome {
            ValidationOutcome::Resolvable
            | ValidationOutcome::UnresolvableMissingLibs(_)
            | ValidationOutcome::Indeterminate => {}
        }
    }
}
