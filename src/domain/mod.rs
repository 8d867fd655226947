//! Domain layer - pure business logic
//!
//! This module contains business logic with no external I/O.
//! Types and functions here can be unit tested without mocking.

pub mod adf;
pub mod artifacts;
pub mod branch;
pub mod export;
pub mod flavour;
pub mod release;
pub mod simulator;
pub mod slack;
pub mod xml;

// Re-export commonly used types
pub use artifacts::BuildArtifactPaths;
pub use branch::GitBranch;
pub use export::{ExportMethod, ExportOptions, Thinning};
pub use flavour::{AppConfiguration, AppFlavour, FlavourProfile};
pub use release::{
    BuildNumberSource, GitHubRepo, InstallLink, ReleaseReport, ReleaseRequest, ReleaseStep,
    SchemeLocation, SkipFlags, StepResult, TestPlan,
};
pub use simulator::SimulatorInfo;
