use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Lifecycle branch an adapter executes.
///
/// An `Install` may be upgraded to `Update` mid-flight once a collision with
/// an existing catalog record is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallRoute {
    #[default]
    Install,
    Update,
    Uninstall,
    Discover,
    DiscoverInstall,
}

impl InstallRoute {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Update => "update",
            Self::Uninstall => "uninstall",
            Self::Discover => "discover",
            Self::DiscoverInstall => "discover_install",
        }
    }

    /// Routes that register the extension for the first time.
    pub fn is_fresh_install(self) -> bool {
        matches!(self, Self::Install | Self::DiscoverInstall)
    }
}

impl Display for InstallRoute {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
