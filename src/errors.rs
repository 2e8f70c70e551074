use eyre::Report;

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    // Startup
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("strategy produced no transactions")]
    EmptyWork,

    // Bundle lifecycle
    #[error("bundle simulation failed: {0}")]
    SimulationFailed(String),
    #[error("signing failed: {0}")]
    Signing(String),

    // Relay / RPC
    #[error("transport error: {0}")]
    Transport(String),

    // Collaborators
    #[error(transparent)]
    Strategy(Report),
}

impl BundleError {
    /// Whether restarting the whole cycle can make progress.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Configuration(_) | Self::EmptyWork)
    }
}

impl From<Report> for BundleError {
    fn from(error: Report) -> Self {
        Self::Strategy(error)
    }
}

impl From<reqwest::Error> for BundleError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Transport(format!("request timed out: {}", error))
        } else {
            Self::Transport(error.to_string())
        }
    }
}

impl From<serde_json::Error> for BundleError {
    fn from(error: serde_json::Error) -> Self {
        Self::Transport(format!("malformed response: {}", error))
    }
}

impl From<alloy_signer::Error> for BundleError {
    fn from(error: alloy_signer::Error) -> Self {
        Self::Signing(error.to_string())
    }
}

impl From<crate::utils::LoadConfigError> for BundleError {
    fn from(error: crate::utils::LoadConfigError) -> Self {
        Self::Configuration(error.to_string())
    }
}
