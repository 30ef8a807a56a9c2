//! Errors surfaced by galasactl commands.
//!
//! Every variant renders with a stable `GALnnnnE` message code so scripts can
//! match on it. Variants that come from an HTTP exchange carry the status code
//! they saw; `0` means no response was received at all.

use std::path::PathBuf;

pub const HTTP_STATUS_TOO_MANY_REQUESTS: u16 = 429;

#[derive(Debug, thiserror::Error)]
pub enum GalasaError {
    #[error("GAL1068E: Could not query run results. Reason: {reason}")]
    QueryRunsFailed { status: u16, reason: String },

    #[error("GAL1194E: Failed to get a list of users from the Galasa API server. Reason: {reason}")]
    RetrievingUserListFailed { status: u16, reason: String },

    #[error("GAL1155E: The loginId '{login_id}' is invalid. It must be non-empty and must not contain spaces.")]
    InvalidLoginId { login_id: String },

    #[error("GAL1112E: Failed to {action} resources. Status code: {status}. Reason: {reason}")]
    ResourcesActionFailed {
        action: String,
        status: u16,
        reason: String,
    },

    #[error("GAL1110E: Could not read resource file {path:?}. Reason: {reason}")]
    ResourceFileRead { path: PathBuf, reason: String },

    #[error("GAL1111E: Resource file {path:?} is not valid YAML or JSON. Reason: {reason}")]
    ResourceFileParse { path: PathBuf, reason: String },

    #[error("GAL1113E: Resource file {path:?} contains no resources.")]
    ResourceFileEmpty { path: PathBuf },

    #[error("GAL1078E: '{age}' is an invalid --age value. {reason}")]
    InvalidAge { age: String, reason: String },

    #[error("GAL1079E: Need to use at least one of --name, --age, --active, --requestor, --result, --group or --tags.")]
    MissingQueryCriteria,

    #[error("GAL1102E: The API server URL is not set. Use --api-server-url, GALASA_API_SERVER_URL or the galasactl config file.")]
    MissingApiServerUrl,

    #[error("GAL1103E: No bearer token is available. Use --bearer-token, GALASA_BEARER_TOKEN or the galasactl config file.")]
    MissingBearerToken,
}

impl GalasaError {
    /// HTTP status carried by the error, if it came from a REST exchange.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::QueryRunsFailed { status, .. }
            | Self::RetrievingUserListFailed { status, .. }
            | Self::ResourcesActionFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.http_status() == Some(HTTP_STATUS_TOO_MANY_REQUESTS)
    }

    /// Errors caused by bad command-line input rather than the server.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidLoginId { .. }
                | Self::InvalidAge { .. }
                | Self::MissingQueryCriteria
                | Self::ResourceFileParse { .. }
                | Self::ResourceFileEmpty { .. }
        )
    }

    pub fn is_transport_or_auth(&self) -> bool {
        matches!(self, Self::MissingApiServerUrl | Self::MissingBearerToken)
            || matches!(self.http_status(), Some(0 | 401 | 403))
    }
}
