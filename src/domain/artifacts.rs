//! Build artifact locations, derived from flavour and output directory

use std::path::{Path, PathBuf};

use super::export::ExportMethod;
use super::flavour::AppFlavour;

/// Paths produced while building one flavour. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifactPaths {
    pub archive: PathBuf,
    pub export_dir: PathBuf,
    pub export_options: PathBuf,
    pub ipa: PathBuf,
}

impl BuildArtifactPaths {
    pub fn new(
        output_dir: &Path,
        flavour: &AppFlavour,
        method: ExportMethod,
        bundle_display_name: &str,
    ) -> Self {
        let stem = format!("{}-{}", flavour.name, method.slug());
        let export_dir = output_dir.join(format!("{}-export", stem));
        Self {
            archive: output_dir.join(format!("{}.xcarchive", stem)),
            ipa: export_dir.join(format!("{}.ipa", bundle_display_name)),
            export_options: output_dir.join(format!("{}-ExportOptions.plist", stem)),
            export_dir,
        }
    }

    pub fn dsyms_dir(&self) -> PathBuf {
        self.archive.join("dSYMs")
    }

    /// Zip of the archive's dSYMs inside `temp_dir`
    pub fn dsyms_zip(&self, temp_dir: &Path) -> PathBuf {
        let stem = self
            .archive
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archive".to_string());
        temp_dir.join(format!("{}-dSYMs.zip", stem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_deterministic() {
        let flavour = AppFlavour::new("Live", "", "Live", "Live (Beta)");
        let paths = BuildArtifactPaths::new(Path::new("/out"), &flavour, ExportMethod::AdHoc, "Example");

        assert_eq!(paths.archive, PathBuf::from("/out/Live-adhoc.xcarchive"));
        assert_eq!(paths.export_dir, PathBuf::from("/out/Live-adhoc-export"));
        assert_eq!(
            paths.export_options,
            PathBuf::from("/out/Live-adhoc-ExportOptions.plist")
        );
        assert_eq!(paths.ipa, PathBuf::from("/out/Live-adhoc-export/Example.ipa"));
        assert_eq!(
            paths.dsyms_dir(),
            PathBuf::from("/out/Live-adhoc.xcarchive/dSYMs")
        );
        assert_eq!(
            paths.dsyms_zip(Path::new("/tmp")),
            PathBuf::from("/tmp/Live-adhoc-dSYMs.zip")
        );
        assert_eq!(
            paths,
            BuildArtifactPaths::new(Path::new("/out"), &flavour, ExportMethod::AdHoc, "Example")
        );
    }
}
