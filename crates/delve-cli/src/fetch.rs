//! `fetch_url` research tool

use async_trait::async_trait;
use delve_core::{Tool, ToolError};
use delve_llm::truncate_chars;
use serde_json::{json, Value};
use std::time::Duration;

/// Characters of page body handed back to the worker
pub(crate) const MAX_BODY_CHARS: usize = 20_000;

/// HTTP GET tool
#[derive(Debug, Clone)]
pub(crate) struct FetchUrlTool {
    client: reqwest::Client,
    timeout: Duration,
}

impl FetchUrlTool {
    pub(crate) fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("delve/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl Tool for FetchUrlTool {
    fn name(&self) -> &str {
        "fetch_url"
    }

    fn description(&self) -> &str {
        "Fetch a web page over HTTP(S) and return its body as text."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "Absolute http or https URL" }
            },
            "required": ["url"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let url = args
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("missing `url`".into()))?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ToolError::InvalidArguments(format!(
                "unsupported url: {url}"
            )));
        }

        tracing::debug!(url, "fetching");
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::Timeout(self.timeout.as_secs())
            } else {
                ToolError::Failed(e.to_string())
            }
        })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::Failed(e.to_string()))?;
        if !status.is_success() {
            return Err(ToolError::Failed(format!("HTTP {status}")));
        }
        Ok(truncate_chars(&body, MAX_BODY_CHARS).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_bad_arguments() {
        let tool = FetchUrlTool::new(Duration::from_secs(1)).unwrap();
        assert!(matches!(
            tool.invoke(json!({})).await,
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(matches!(
            tool.invoke(json!({"url": "file:///etc/passwd"})).await,
            Err(ToolError::InvalidArguments(_))
        ));
    }
}
