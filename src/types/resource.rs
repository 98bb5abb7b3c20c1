//! Upstream resources mirrored by the proxy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::MuroError;

/// One upstream resource, each backed by exactly one cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resource {
    /// Recent posts from the microblogging API (X).
    Tweets,
    /// Recent uploads from the video API (YouTube Data v3).
    YoutubeVideos,
}

impl Resource {
    /// Every resource the proxy knows about.
    pub const ALL: [Resource; 2] = [Resource::Tweets, Resource::YoutubeVideos];

    /// Store key for this resource.
    pub fn key(&self) -> &'static str {
        match self {
            Resource::Tweets => "tweets",
            Resource::YoutubeVideos => "youtube-videos",
        }
    }

    /// Largest page size the upstream documents.
    pub fn max_results_limit(&self) -> u32 {
        match self {
            Resource::Tweets => 100,
            Resource::YoutubeVideos => 50,
        }
    }

    /// Smallest page size the upstream accepts (X rejects anything below 5).
    pub fn min_results(&self) -> u32 {
        match self {
            Resource::Tweets => 5,
            Resource::YoutubeVideos => 1,
        }
    }

    /// Clamp a requested page size into the upstream's accepted range.
    pub fn clamp_max_results(&self, requested: u32) -> u32 {
        requested.clamp(self.min_results(), self.max_results_limit())
    }

    /// Body returned when the upstream has nothing and nothing is cached.
    pub fn empty_payload(&self) -> Value {
        match self {
            Resource::Tweets => json!({
                "data": [],
                "message": "No recent posts found",
            }),
            Resource::YoutubeVideos => json!({
                "items": [],
                "message": "No recent videos found",
            }),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Resource {
    type Err = MuroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tweets" | "x" | "posts" => Ok(Resource::Tweets),
            "youtube-videos" | "youtube" | "videos" => Ok(Resource::YoutubeVideos),
            other => Err(MuroError::Configuration(format!("unknown resource: {other}"))),
        }
    }
}

/// Per-request parameters forwarded to the upstream client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchParams {
    /// Page size, already clamped to the resource's documented range.
    pub max_results: u32,
}

impl FetchParams {
    /// Build params for `resource`, clamping `max_results`.
    pub fn for_resource(resource: Resource, max_results: u32) -> Self {
        Self {
            max_results: resource.clamp_max_results(max_results),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_to_documented_maximum() {
        assert_eq!(Resource::Tweets.clamp_max_results(500), 100);
        assert_eq!(Resource::YoutubeVideos.clamp_max_results(500), 50);
        assert_eq!(Resource::YoutubeVideos.clamp_max_results(3), 3);
    }

    #[test]
    fn clamps_to_minimum() {
        assert_eq!(Resource::Tweets.clamp_max_results(0), 5);
        assert_eq!(Resource::YoutubeVideos.clamp_max_results(0), 1);
    }

    #[test]
    fn parses_aliases() {
        assert_eq!("tweets".parse::<Resource>().unwrap(), Resource::Tweets);
        assert_eq!("YouTube".parse::<Resource>().unwrap(), Resource::YoutubeVideos);
        assert!("instagram".parse::<Resource>().is_err());
    }

    #[test]
    fn serde_uses_store_keys() {
        let json = serde_json::to_string(&Resource::YoutubeVideos).unwrap();
        assert_eq!(json, "\"youtube-videos\"");
    }
}
