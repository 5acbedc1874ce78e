//! Twilio 短信渠道
//!
//! 通过 Twilio Messages API 发送短信，每个接收者一次 HTTP 请求。

use crate::notification::channel::{DeliveryOutcome, Notifier};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Twilio 渠道配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TwilioConfig {
    /// Account SID
    pub account_sid: String,
    /// Auth token
    pub auth_token: String,
    /// API 地址（测试时可指向本地）
    pub base_url: String,
    /// 超时时间 (秒)
    pub timeout_secs: u64,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            base_url: "https://api.twilio.com".to_string(),
            timeout_secs: 30,
        }
    }
}

impl TwilioConfig {
    /// 是否已配置认证信息
    pub fn has_credentials(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.is_empty()
    }

    /// Messages API 地址
    pub fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url.trim_end_matches('/'),
            self.account_sid
        )
    }
}

/// Twilio 短信渠道
#[derive(Debug)]
pub struct TwilioNotifier {
    client: Client,
    config: TwilioConfig,
}

impl TwilioNotifier {
    /// 创建新的 Twilio 渠道
    pub fn new(config: TwilioConfig) -> Result<Self> {
        if !config.has_credentials() {
            return Err(anyhow!("twilio account_sid and auth_token are required"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl Notifier for TwilioNotifier {
    fn name(&self) -> &str {
        "twilio"
    }

    async fn send_text(&self, sender: &str, recipient: &str, body: &str) -> Result<DeliveryOutcome> {
        let form = [("To", recipient), ("From", sender), ("Body", body)];

        let response = self
            .client
            .post(self.config.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await
            .context("Twilio request failed")?;

        let status = response.status().as_u16();
        debug!(recipient = %recipient, status, "Twilio responded");

        Ok(DeliveryOutcome { status })
    }
}
