//! Runtime tool path resolution
//!
//! For each external tool (e.g., `xcodebuild`), we:
//! 1. Check for an environment variable `{TOOL}_BIN` (e.g., `XCODEBUILD_BIN`)
//! 2. Fall back to PATH-based invocation if the envvar is not set
//!
//! This lets CI pin an exact Xcode toolchain (`XCODEBUILD_BIN=/Applications/Xcode_15.4.app/...`)
//! while local runs use whatever `xcode-select` points at.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crate::tools::{get_tool_path, tools};
//! use tokio::process::Command;
//!
//! let xcodebuild = get_tool_path(tools::XCODEBUILD);
//! Command::new(&xcodebuild).args(["-version"]).status().await?;
//! ```

use std::env;

/// Get the path to an external tool
///
/// Checks for an environment variable `{TOOL}_BIN` (uppercase tool name + "_BIN").
/// Falls back to the tool name itself if the envvar is not set, which relies on PATH.
pub fn get_tool_path(tool: &str) -> String {
    let env_var = format!("{}_BIN", tool.to_uppercase());
    env::var(&env_var).unwrap_or_else(|_| tool.to_string())
}

/// Whether a tool resolves to an executable, either via `{TOOL}_BIN` or PATH
pub fn is_tool_available(tool: &str) -> bool {
    which::which(get_tool_path(tool)).is_ok()
}

/// Tool names used by the pipeline
pub mod tools {
    pub const XCODEBUILD: &str = "xcodebuild";
    pub const XCRUN: &str = "xcrun";
    pub const XCBEAUTIFY: &str = "xcbeautify";
    pub const DITTO: &str = "ditto";
    pub const GIT: &str = "git";
}
