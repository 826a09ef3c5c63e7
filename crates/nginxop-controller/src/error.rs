use crate::client::ClientError;
use crate::scheme::SchemeError;

#[derive(thiserror::Error, Debug)]
pub enum ReconcileError {
    #[error("fetching NginxOp: {0}")]
    Fetch(#[source] ClientError),
    #[error("deriving children: {0}")]
    Derive(#[from] SchemeError),
    #[error("applying {kind}: {source}")]
    Apply {
        kind: &'static str,
        #[source]
        source: ClientError,
    },
    #[error("updating NginxOp status: {0}")]
    StatusUpdate(#[source] ClientError),
}

impl ReconcileError {
    /// kind of the child whose apply failed
    pub fn failed_kind(&self) -> Option<&'static str> {
        match self {
            Self::Apply { kind, .. } => Some(kind),
            _ => None,
        }
    }
}
