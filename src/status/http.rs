//! Porter API 客户端
//!
//! `GET {api_url}/api/v1/list`，返回以门名称为键的 JSON 对象。

use super::{EntitySnapshot, StatusSource};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// 状态源配置
#[derive(Debug, Clone)]
pub struct StatusSourceConfig {
    /// API 地址 (如 http://localhost:8080)
    pub api_url: String,
    /// API key
    pub api_key: String,
    /// 请求超时
    pub timeout: Duration,
}

impl Default for StatusSourceConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_string(),
            api_key: "default".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// API 返回的单个门状态
#[derive(Debug, Deserialize)]
struct DoorState {
    state: Value,
    sensor_closed_state: Value,
    last_state_change_timestamp: DateTime<Utc>,
}

/// HTTP 状态源
#[derive(Debug)]
pub struct HttpStatusSource {
    client: Client,
    config: StatusSourceConfig,
}

impl HttpStatusSource {
    pub fn new(config: StatusSourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    fn list_url(&self) -> String {
        format!("{}/api/v1/list", self.config.api_url.trim_end_matches('/'))
    }
}

/// 解析 API 响应体
pub fn parse_list_response(body: &str) -> Result<HashMap<String, EntitySnapshot>> {
    let doors: HashMap<String, DoorState> =
        serde_json::from_str(body).context("Failed to parse status response")?;

    Ok(doors
        .into_iter()
        .map(|(name, door)| {
            let snapshot = EntitySnapshot {
                name: name.clone(),
                current_state: door.state,
                closed_state: door.sensor_closed_state,
                last_change: door.last_state_change_timestamp,
            };
            (name, snapshot)
        })
        .collect())
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn list(&self) -> Result<HashMap<String, EntitySnapshot>> {
        let response = self
            .client
            .get(self.list_url())
            .header("X-Api-Key", &self.config.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Status request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("status API returned {}", status));
        }

        let body = response.text().await.context("Failed to read status response")?;
        let states = parse_list_response(&body)?;
        debug!(count = states.len(), "Fetched entity states");
        Ok(states)
    }
}
