use clap::ValueEnum;
use netlog_core::{FilterProfile, ReportCategory};

pub mod commands;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

/// Resource types captured during a session
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CaptureProfile {
    /// fetch, xhr and script
    Minimal,
    /// fetch, xhr, script and document
    Extended,
}

impl From<CaptureProfile> for FilterProfile {
    fn from(profile: CaptureProfile) -> Self {
        match profile {
            CaptureProfile::Minimal => FilterProfile::Minimal,
            CaptureProfile::Extended => FilterProfile::Extended,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CategoryArg {
    Network,
    Vitals,
}

impl From<CategoryArg> for ReportCategory {
    fn from(category: CategoryArg) -> Self {
        match category {
            CategoryArg::Network => ReportCategory::Network,
            CategoryArg::Vitals => ReportCategory::Vitals,
        }
    }
}
