//! Export method and `xcodebuild -exportArchive` options
//!
//! The export method decides signing, the distribution path (local,
//! distribution backend or App Store) and the scheme naming convention.
//! [`ExportOptions`] renders the XML property list passed as
//! `-exportOptionsPlist`.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::xml::escape;

/// Distribution channel classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum ExportMethod {
    #[value(name = "development")]
    #[serde(rename = "development")]
    Development,
    #[value(name = "enterprise")]
    #[serde(rename = "enterprise")]
    Enterprise,
    #[value(name = "ad-hoc", alias = "adhoc")]
    #[serde(rename = "ad-hoc", alias = "adhoc")]
    AdHoc,
    #[value(name = "app-store", alias = "appstore")]
    #[serde(rename = "app-store", alias = "appstore")]
    AppStore,
}

impl ExportMethod {
    /// Value of the `method` key in the export options plist
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Enterprise => "enterprise",
            Self::AdHoc => "ad-hoc",
            Self::AppStore => "app-store",
        }
    }

    /// Path-safe identifier used in artifact names
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Enterprise => "enterprise",
            Self::AdHoc => "adhoc",
            Self::AppStore => "appstore",
        }
    }

    pub fn display_text(&self) -> &'static str {
        match self {
            Self::Development => "Development",
            Self::Enterprise => "Enterprise",
            Self::AdHoc => "Ad hoc",
            Self::AppStore => "Appstore",
        }
    }

    /// Where testers install the build from
    pub fn install_provider(&self) -> &'static str {
        match self {
            Self::Development => "Local",
            Self::Enterprise | Self::AdHoc => "AppCenter",
            Self::AppStore => "TestFlight",
        }
    }

    pub fn scheme_component(&self) -> &'static str {
        match self {
            Self::Development => "Xcode",
            Self::Enterprise => "Enterprise",
            Self::AdHoc => "Adhoc",
            Self::AppStore => "Appstore",
        }
    }

    pub fn signing_certificate(&self) -> &'static str {
        match self {
            Self::Development => "Apple Development",
            _ => "iOS Distribution",
        }
    }

    /// Builds for this method are uploaded to the distribution backend
    pub fn uses_distribution_backend(&self) -> bool {
        matches!(self, Self::Enterprise | Self::AdHoc)
    }

    /// Debug symbols are uploaded for every method except development
    pub fn uploads_symbols(&self) -> bool {
        !matches!(self, Self::Development)
    }
}

impl fmt::Display for ExportMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device variant thinning for non App Store exports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Thinning {
    #[default]
    None,
    AllVariants,
    /// Model identifier, e.g. `iPhone7,1`
    SingleVariant(String),
}

impl Thinning {
    pub fn value(&self) -> &str {
        match self {
            Self::None => "<none>",
            Self::AllVariants => "<thin-for-all-variants>",
            Self::SingleVariant(model) => model,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningStyle {
    Automatic,
    Manual,
}

impl SigningStyle {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Automatic => "automatic",
            Self::Manual => "manual",
        }
    }
}

/// Contents of the `-exportOptionsPlist` file
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub compile_bitcode: bool,
    /// `export` or `upload`
    pub destination: String,
    pub generate_app_store_information: bool,
    pub manage_app_version_and_build_number: bool,
    pub method: ExportMethod,
    /// Bundle identifier to provisioning profile name, in insertion order
    pub provisioning_profiles: Vec<(String, String)>,
    pub signing_certificate: String,
    pub signing_style: SigningStyle,
    pub strip_swift_symbols: bool,
    pub team_id: String,
    pub thinning: Thinning,
    pub upload_bitcode: bool,
    pub upload_symbols: bool,
}

impl ExportOptions {
    /// Options for a locally exported archive. Signing is manual as soon as
    /// any provisioning profile is pinned.
    pub fn new(
        method: ExportMethod,
        team_id: impl Into<String>,
        provisioning_profiles: Vec<(String, String)>,
        thinning: Thinning,
    ) -> Self {
        let signing_style = if provisioning_profiles.is_empty() {
            SigningStyle::Automatic
        } else {
            SigningStyle::Manual
        };

        Self {
            compile_bitcode: false,
            destination: "export".to_string(),
            generate_app_store_information: method == ExportMethod::AppStore,
            manage_app_version_and_build_number: false,
            method,
            provisioning_profiles,
            signing_certificate: method.signing_certificate().to_string(),
            signing_style,
            strip_swift_symbols: true,
            team_id: team_id.into(),
            thinning,
            upload_bitcode: false,
            upload_symbols: true,
        }
    }

    /// Render as an XML property list, keys in alphabetical order
    pub fn to_plist(&self) -> String {
        let mut profiles = String::new();
        for (bundle_id, profile) in &self.provisioning_profiles {
            profiles.push_str(&format!(
                "\t\t<key>{}</key>\n\t\t<string>{}</string>\n",
                escape(bundle_id),
                escape(profile)
            ));
        }

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>compileBitcode</key>
	{}
	<key>destination</key>
	<string>{}</string>
	<key>generateAppStoreInformation</key>
	{}
	<key>manageAppVersionAndBuildNumber</key>
	{}
	<key>method</key>
	<string>{}</string>
	<key>provisioningProfiles</key>
	<dict>
{}	</dict>
	<key>signingCertificate</key>
	<string>{}</string>
	<key>signingStyle</key>
	<string>{}</string>
	<key>stripSwiftSymbols</key>
	{}
	<key>teamID</key>
	<string>{}</string>
	<key>thinning</key>
	<string>{}</string>
	<key>uploadBitcode</key>
	{}
	<key>uploadSymbols</key>
	{}
</dict>
</plist>
"#,
            plist_bool(self.compile_bitcode),
            escape(&self.destination),
            plist_bool(self.generate_app_store_information),
            plist_bool(self.manage_app_version_and_build_number),
            self.method.as_str(),
            profiles,
            escape(&self.signing_certificate),
            self.signing_style.as_str(),
            plist_bool(self.strip_swift_symbols),
            escape(&self.team_id),
            escape(self.thinning.value()),
            plist_bool(self.upload_bitcode),
            plist_bool(self.upload_symbols),
        )
    }
}

fn plist_bool(value: bool) -> &'static str {
    if value {
        "<true/>"
    } else {
        "<false/>"
    }
}
