//! Where status responses come from.

pub mod errors;
mod http;

use async_trait::async_trait;

use crate::types::{StatusRequest, StatusResponse};

pub use errors::SourceError;
pub use http::HttpSource;

/// The status endpoint, seen as a black box.
///
/// `fetch` asks what changed since the request's watermarks. The poller never
/// runs two fetches at once on the same source.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self, request: &StatusRequest) -> Result<StatusResponse, SourceError>;
}
