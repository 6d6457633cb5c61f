pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod export;
pub mod gap_detector;
pub mod orchestrator;
pub mod path_merger;
pub mod rate_limiter;
pub mod reconstruct;
pub mod route_fill;
pub mod server;
pub mod track;
pub mod types;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use config::Config;
pub use error::{GapFillError, Result};
pub use gap_detector::{haversine_km, GapDetector};
pub use orchestrator::GapFiller;
pub use rate_limiter::RateLimiter;
pub use reconstruct::{reconstruct_route, FillSummary, RouteReconstruction};
pub use route_fill::{FetchError, OrsClient, RouteFillClient};
pub use track::{Track, TrackState, TrackStats};
pub use types::{Coord, FillFailure, FillOutcome, FillResult, Gap, Sample, SampleOrigin};
