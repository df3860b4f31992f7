use shared::{
    domain::OperationKind,
    error::{ErrorCode, ErrorInfo, RemoteException},
};
use thiserror::Error;

/// Reasons an invocation was never attempted. Remote failures are not errors here;
/// they are published as error lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FollowError {
    #[error("{kind} requires an authenticated actor")]
    NotLoggedIn { kind: OperationKind },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Converts a graph service failure into the reason carried on an error event.
/// The message keeps the whole context chain; the code is taken from a
/// `RemoteException` anywhere in the chain.
pub fn error_info_from(err: &anyhow::Error) -> ErrorInfo {
    let code = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<RemoteException>())
        .map(|remote| remote.code)
        .unwrap_or(ErrorCode::Remote);
    ErrorInfo::new(code, format!("{err:#}"))
}
