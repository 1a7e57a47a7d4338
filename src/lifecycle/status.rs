use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a running simulation. Empty means "no active simulation".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimulationId(String);

impl SimulationId {
    /// Wrap an identifier as issued by the platform.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The "no active simulation" id.
    #[must_use]
    pub const fn none() -> Self {
        Self(String::new())
    }

    /// True when no simulation is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SimulationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SimulationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SimulationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Simulation status transitions as reported by the platform.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationStatus {
    Starting,
    Started,
    Paused,
    Resumed,
    Stopped,
}

impl SimulationStatus {
    /// True for every status except `Stopped`.
    #[must_use]
    pub const fn is_live(self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

impl fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Starting => "STARTING",
            Self::Started => "STARTED",
            Self::Paused => "PAUSED",
            Self::Resumed => "RESUMED",
            Self::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}
