pub mod ors_client;

pub use ors_client::{parse_directions_json, OrsClient};

use crate::types::{Coord, FillFailure};
use std::fmt::{Display, Formatter};
use std::future::Future;

/// Failure of a single provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    Timeout,
    HttpError(u16),
    Unavailable(String),
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            FetchError::Timeout => write!(f, "Request timed out"),
            FetchError::HttpError(code) => write!(f, "HTTP error: {}", code),
            FetchError::Unavailable(msg) => write!(f, "Provider unavailable: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<FetchError> for FillFailure {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout => FillFailure::Timeout,
            FetchError::HttpError(code) => FillFailure::HttpError(code),
            FetchError::Unavailable(msg) => FillFailure::Unavailable(msg),
        }
    }
}

/// A pedestrian routing capability: one gap in, one path out.
///
/// Implementations make exactly one attempt per call and never retry.
pub trait RouteFillClient: Send + Sync {
    /// Walking path from `origin` to `destination` as ordered coordinates.
    fn fetch_walking_path(
        &self,
        origin: Coord,
        destination: Coord,
    ) -> impl Future<Output = Result<Vec<Coord>, FetchError>> + Send;

    /// False when no credential is present; the orchestrator then skips all calls.
    fn is_configured(&self) -> bool;

    /// Provider name for logging
    fn name(&self) -> &str;
}
