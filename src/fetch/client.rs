use async_trait::async_trait;
use reqwest::{Request, Response};

/// Transport seam for feed fetches. Pollers stay generic over this so tests
/// can script responses without touching the network.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
