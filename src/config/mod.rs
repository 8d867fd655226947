//! # Release Configuration
//!
//! Two sources:
//!
//! 1. **Manifest** (`flightdeck.yaml`, found by walking up from the working
//!    directory or given with `--config`)
//!    - Project, target, signing, test simulators, flavours
//!
//! 2. **Environment** (see [`environment`])
//!    - Credentials and service endpoints
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let manifest = config::load_manifest(None)?;
//! let request = manifest.release_request(ExportMethod::AdHoc, &RunOptions::default())?;
//! ```

pub mod environment;
mod manifest;

pub use environment::EnvironmentSettings;
pub use manifest::{ManifestConfig, RunOptions};

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "flightdeck.yaml";

/// Load and validate the manifest, searching upwards when no path is given
pub fn load_manifest(path: Option<&Path>) -> Result<ManifestConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            find_manifest(&cwd)?
        }
    };

    let content = std::fs::read_to_string(&path).with_context(|| {
        format!(
            "Failed to read release manifest: {}\n  Ensure the file is readable and not corrupted.",
            path.display()
        )
    })?;
    let manifest = parse_manifest(&content).with_context(|| {
        format!(
            "Failed to parse release manifest: {}\n  Check YAML syntax. Common issues:\n  \
             - Incorrect indentation\n  \
             - Missing quotes around strings with special characters",
            path.display()
        )
    })?;

    // Relative paths in the manifest are relative to the manifest itself
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(manifest.rebase(base))
}

pub fn parse_manifest(content: &str) -> Result<ManifestConfig> {
    let manifest: ManifestConfig = serde_yaml::from_str(content)?;
    if let Err(errors) = manifest.validate() {
        bail!("Invalid release manifest:\n  - {}", errors.join("\n  - "));
    }
    Ok(manifest)
}

/// Find `flightdeck.yaml` by walking up from `start`
pub fn find_manifest(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let candidate = current.join(MANIFEST_FILE);
        if candidate.exists() {
            return Ok(candidate);
        }

        if let Some(parent) = current.parent() {
            current = parent.to_path_buf();
        } else {
            bail!(
                "Could not find {} in {} or any parent directory",
                MANIFEST_FILE,
                start.display()
            );
        }
    }
}

impl ManifestConfig {
    fn rebase(mut self, base: &Path) -> Self {
        let join = |p: &Path| -> PathBuf {
            if p.is_absolute() || base.as_os_str().is_empty() {
                p.to_path_buf()
            } else {
                base.join(p)
            }
        };
        self.project = join(&self.project);
        self.workspace = self.workspace.as_deref().map(join);
        self.output_dir = join(&self.output_dir);
        self.temp_dir = self.temp_dir.as_deref().map(join);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MINIMAL: &str = "project: App.xcodeproj\ntarget: App\nflavours:\n  - name: Live\n    label: Live\n";

    #[test]
    fn test_find_manifest_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), MINIMAL).unwrap();
        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_manifest(&nested).unwrap(), dir.path().join(MANIFEST_FILE));
    }

    #[test]
    fn test_load_manifest_rebases_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        fs::write(&path, MINIMAL).unwrap();

        let manifest = load_manifest(Some(&path)).unwrap();
        assert_eq!(manifest.project, dir.path().join("App.xcodeproj"));
        assert_eq!(manifest.output_dir, dir.path().join("build"));
    }

    #[test]
    fn test_temp_dir_is_optional_and_rebased() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        fs::write(&path, format!("{}temp_dir: tmp/symbols\n", MINIMAL)).unwrap();

        let manifest = load_manifest(Some(&path)).unwrap();
        assert_eq!(manifest.temp_dir, Some(dir.path().join("tmp/symbols")));
        assert_eq!(parse_manifest(MINIMAL).unwrap().temp_dir, None);
    }

    #[test]
    fn test_invalid_manifest_lists_problems() {
        let err = parse_manifest("project: App.xcodeproj\ntarget: ''\n").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("target is required"));
        assert!(message.contains("at least one flavour"));
    }
}
