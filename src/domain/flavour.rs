//! App flavours and the per-flavour build configuration derived from them

use serde::{Deserialize, Serialize};

use super::export::{ExportMethod, ExportOptions, Thinning};

/// A named app variant built and distributed independently within one release
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppFlavour {
    /// Short name used in schemes and artifact paths (e.g. "Live")
    pub name: String,
    /// Appended to the base bundle identifier, may be empty
    #[serde(default)]
    pub bundle_id_suffix: String,
    /// Human label shown in notifications
    pub label: String,
    /// Label that also names the release stage (e.g. "Live (Beta)")
    pub label_including_release: String,
}

impl AppFlavour {
    pub fn new(
        name: impl Into<String>,
        bundle_id_suffix: impl Into<String>,
        label: impl Into<String>,
        label_including_release: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            bundle_id_suffix: bundle_id_suffix.into(),
            label: label.into(),
            label_including_release: label_including_release.into(),
        }
    }

    pub fn bundle_id(&self, base_bundle_id: &str) -> String {
        format!("{}{}", base_bundle_id, self.bundle_id_suffix)
    }
}

/// Distribution and signing details attached to a flavour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlavourProfile {
    pub flavour: AppFlavour,
    /// Distribution backend app name (ad-hoc/enterprise)
    pub app_center_app_name: Option<String>,
    /// App Store Connect Apple id (app-store)
    pub app_apple_id: Option<String>,
    pub distribution_groups: Vec<String>,
    /// Full scheme name, overriding `<flavour><method component>`
    pub scheme: Option<String>,
    /// Provisioning profile name per export method
    pub provisioning_profiles: Vec<(ExportMethod, String)>,
}

impl FlavourProfile {
    pub fn new(flavour: AppFlavour) -> Self {
        Self {
            flavour,
            app_center_app_name: None,
            app_apple_id: None,
            distribution_groups: Vec::new(),
            scheme: None,
            provisioning_profiles: Vec::new(),
        }
    }

    pub fn scheme_for(&self, method: ExportMethod) -> String {
        self.scheme
            .clone()
            .unwrap_or_else(|| format!("{}{}", self.flavour.name, method.scheme_component()))
    }

    /// Resolve everything the build and deploy stages need for one export method
    pub fn app_configuration(
        &self,
        method: ExportMethod,
        base_bundle_id: &str,
        team_id: &str,
        thinning: Thinning,
    ) -> AppConfiguration {
        let bundle_id = self.flavour.bundle_id(base_bundle_id);
        let profiles = self
            .provisioning_profiles
            .iter()
            .filter(|(m, _)| *m == method)
            .map(|(_, profile)| (bundle_id.clone(), profile.clone()))
            .collect();

        AppConfiguration {
            flavour: self.flavour.clone(),
            scheme: self.scheme_for(method),
            bundle_id,
            app_center_app_name: self.app_center_app_name.clone(),
            app_apple_id: self.app_apple_id.clone(),
            distribution_groups: self.distribution_groups.clone(),
            export_options: ExportOptions::new(method, team_id, profiles, thinning),
        }
    }
}

/// Concrete build configuration for one (flavour, export method) pair
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfiguration {
    pub flavour: AppFlavour,
    pub scheme: String,
    pub bundle_id: String,
    pub app_center_app_name: Option<String>,
    pub app_apple_id: Option<String>,
    pub distribution_groups: Vec<String>,
    pub export_options: ExportOptions,
}
