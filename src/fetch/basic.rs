use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use super::client::HttpClient;

/// Agencies rate-limit anonymous scrapers; identify ourselves consistently.
const USER_AGENT: &str = "MindTheWait/1.0";

/// Whole-request bound. Must stay well under the shutdown grace period so an
/// in-flight fetch never holds up process exit.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Plain HTTP client for public, unauthenticated feed endpoints.
pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub fn new() -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self(inner))
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.0.execute(req).await
    }
}
