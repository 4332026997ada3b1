//! Application config generation.
//!
//! Writes the initial `config.json` for remembrances-mcp from an
//! embedded template, substituting the install paths and chosen
//! variant. An existing config is never overwritten.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::selection::AssetVariant;

/// Embedded config template with `${key}` placeholders.
const CONFIG_TEMPLATE: &str = include_str!("../templates/config.json");

/// Default config file location.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("remembrances-mcp")
        .join("config.json")
}

/// Substitute `${key}` placeholders in a template.
pub fn resolve_template(template: &str, values: &BTreeMap<&str, String>) -> String {
    let mut out = template.to_string();
    for (key, value) in values {
        out = out.replace(&format!("${{{key}}}"), value);
    }
    out
}

/// Render the config for an installed binary and variant.
pub fn render_config(binary_path: &Path, data_dir: &Path, variant: AssetVariant) -> String {
    let values = BTreeMap::from([
        ("binary_path", binary_path.display().to_string()),
        ("data_dir", data_dir.display().to_string()),
        (
            "variant",
            if variant.needs_cuda() { "cuda" } else { "cpu" }.to_string(),
        ),
        (
            "gpu_layers",
            if variant.needs_cuda() { "-1" } else { "0" }.to_string(),
        ),
    ]);
    resolve_template(CONFIG_TEMPLATE, &values)
}

/// Write the config at `path` unless one already exists. Returns true
/// when a new file was written.
pub fn write_config(
    path: &Path,
    binary_path: &Path,
    data_dir: &Path,
    variant: AssetVariant,
) -> Result<bool> {
    if path.exists() {
        tracing::info!("Keeping existing config at {}", path.display());
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render_config(binary_path, data_dir, variant))?;
    tracing::info!("Wrote config to {}", path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn resolve_template_substitutes_all_keys() {
        let values = BTreeMap::from([("a", "1".to_string()), ("b", "2".to_string())]);
        assert_eq!(resolve_template("${a}-${b}-${a}", &values), "1-2-1");
    }

    #[test]
    fn resolve_template_leaves_unknown_keys() {
        let values = BTreeMap::new();
        assert_eq!(resolve_template("${missing}", &values), "${missing}");
    }

    #[test]
    fn rendered_config_is_valid_json() {
        let rendered = render_config(
            Path::new("/home/u/.local/bin/remembrances-mcp"),
            Path::new("/home/u/.local/share/remembrances-mcp"),
            AssetVariant::LinuxCuda,
        );
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["server"]["variant"], "cuda");
        assert_eq!(parsed["embeddings"]["gpu_layers"], -1);
        assert_eq!(
            parsed["server"]["binary"],
            "/home/u/.local/bin/remembrances-mcp"
        );
    }

    #[test]
    fn cpu_variant_disables_gpu_layers() {
        let rendered = render_config(
            Path::new("/bin/remembrances-mcp"),
            Path::new("/data"),
            AssetVariant::LinuxCpuEmbedded,
        );
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["server"]["variant"], "cpu");
        assert_eq!(parsed["embeddings"]["gpu_layers"], 0);
    }

    #[test]
    fn write_config_creates_file_once() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("conf/config.json");

        let wrote = write_config(
            &path,
            Path::new("/bin/remembrances-mcp"),
            Path::new("/data"),
            AssetVariant::DarwinEmbedded,
        )
        .unwrap();
        assert!(wrote);
        assert!(path.exists());
    }

    #[test]
    fn write_config_never_clobbers() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "{\"user\": \"edited\"}").unwrap();

        let wrote = write_config(
            &path,
            Path::new("/bin/remembrances-mcp"),
            Path::new("/data"),
            AssetVariant::DarwinEmbedded,
        )
        .unwrap();
        assert!(!wrote);
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"user\": \"edited\"}");
    }
}
