use std::{fmt, str::FromStr};

/// How a run reads its rows, and which cancellation token it hands to the reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Every row fetch blocks a thread from the blocking pool.
    Sync,
    /// Row fetches suspend; the reads get a signal that can never fire.
    Async,
    /// Like [`ExecutionMode::Async`], with a freshly constructed token.
    #[serde(rename = "async-token")]
    AsyncWithToken,
    /// Like [`ExecutionMode::Async`], with a token handed out by a [`crate::TokenSource`].
    #[serde(rename = "async-token-source")]
    AsyncWithTokenSource,
}

impl ExecutionMode {
    pub const ALL: [ExecutionMode; 4] = [
        ExecutionMode::Sync,
        ExecutionMode::Async,
        ExecutionMode::AsyncWithToken,
        ExecutionMode::AsyncWithTokenSource,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExecutionMode::Sync => "sync",
            ExecutionMode::Async => "async",
            ExecutionMode::AsyncWithToken => "async-token",
            ExecutionMode::AsyncWithTokenSource => "async-token-source",
        }
    }

    pub fn is_blocking(self) -> bool {
        matches!(self, ExecutionMode::Sync)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExecutionMode::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "invalid execution mode {s:?}, expected one of: sync, async, async-token, async-token-source"
                )
            })
    }
}
