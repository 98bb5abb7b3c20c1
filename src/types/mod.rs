//! Public types for the Muro API.

mod cache_state;
mod outcome;
mod resource;

pub use cache_state::CacheState;
pub use outcome::UpstreamOutcome;
pub use resource::{FetchParams, Resource};
