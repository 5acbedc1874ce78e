//! 配置加载
//!
//! 优先级（低 → 高）：默认值 → `~/.config/porter-monitor/config.json` → 环境变量 → 命令行参数。
//! 配置只在启动时校验一次，校验失败直接退出；监控循环运行期间假定配置有效。

use crate::notification::channels::twilio::TwilioConfig;
use crate::status::StatusSourceConfig;
use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

/// 监控配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Porter API 地址
    pub api_url: String,
    /// Porter API key
    pub api_key: String,
    /// 发送方号码
    pub sender: String,
    /// 接收方号码
    pub recipients: Vec<String>,
    /// 开门多少分钟后提醒
    pub open_threshold_mins: u64,
    /// 重复提醒间隔（分钟），0 表示只提醒一次
    pub repeat_threshold_mins: u64,
    /// 轮询间隔（秒）
    pub poll_interval_secs: u64,
    /// 轮询超时（秒）
    pub poll_timeout_secs: u64,
    /// 单次投递超时（秒）
    pub delivery_timeout_secs: u64,
    /// 停止通知宽限期（秒）
    pub stop_grace_secs: u64,
    /// 短信网关
    pub twilio: TwilioConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_string(),
            api_key: "default".to_string(),
            sender: String::new(),
            recipients: Vec::new(),
            open_threshold_mins: 30,
            repeat_threshold_mins: 60,
            poll_interval_secs: 5,
            poll_timeout_secs: 10,
            delivery_timeout_secs: 30,
            stop_grace_secs: 3,
            twilio: TwilioConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// 默认配置文件路径
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("porter-monitor")
            .join("config.json")
    }

    /// 从 JSON 文件读取
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// 加载配置文件并叠加环境变量
    ///
    /// 显式指定的文件必须存在；默认路径不存在时使用内置默认值。
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    debug!(path = %default_path.display(), "Loading config file");
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env_with(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// 用给定的查找函数叠加环境变量（便于测试）
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("PORTER_API_URL") {
            self.api_url = v;
        }
        if let Some(v) = get("PORTER_API_KEY") {
            self.api_key = v;
        }
        if let Some(v) = get("PORTER_SENDER") {
            self.sender = v;
        }
        if let Some(v) = get("PORTER_RECIPIENTS") {
            self.recipients = parse_recipients(&v);
        }
        if let Some(v) = get("TWILIO_ACCOUNT_SID") {
            self.twilio.account_sid = v;
        }
        if let Some(v) = get("TWILIO_AUTH_TOKEN") {
            self.twilio.auth_token = v;
        }
    }

    /// 校验配置
    ///
    /// `require_gateway` 为 false 时（dry-run）不要求网关认证信息。
    pub fn validate(&self, require_gateway: bool) -> Result<()> {
        if self.api_url.trim().is_empty() {
            bail!("api_url is required");
        }
        if self.api_key.trim().is_empty() {
            bail!("api_key is required");
        }
        if self.sender.trim().is_empty() {
            bail!("sender is required");
        }
        if !is_phone_number(&self.sender) {
            bail!("sender '{}' is not a valid phone number", self.sender);
        }
        if self.recipients.is_empty() {
            bail!("at least one recipient is required");
        }
        if let Some(bad) = self.recipients.iter().find(|r| !is_phone_number(r)) {
            return Err(anyhow!("recipient '{}' is not a valid phone number", bad));
        }
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be greater than 0");
        }
        if self.poll_timeout_secs == 0 {
            bail!("poll_timeout_secs must be greater than 0");
        }
        if self.delivery_timeout_secs == 0 {
            bail!("delivery_timeout_secs must be greater than 0");
        }
        if require_gateway && !self.twilio.has_credentials() {
            bail!("twilio account_sid and auth_token are required");
        }
        Ok(())
    }

    pub fn open_threshold(&self) -> Duration {
        Duration::from_secs(self.open_threshold_mins.saturating_mul(60))
    }

    pub fn repeat_threshold(&self) -> Duration {
        Duration::from_secs(self.repeat_threshold_mins.saturating_mul(60))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    /// 状态源配置
    pub fn status_source(&self) -> StatusSourceConfig {
        StatusSourceConfig {
            api_url: self.api_url.clone(),
            api_key: self.api_key.clone(),
            timeout: self.poll_timeout(),
        }
    }

    /// 网关配置（超时与投递超时一致）
    pub fn twilio(&self) -> TwilioConfig {
        TwilioConfig {
            timeout_secs: self.delivery_timeout_secs,
            ..self.twilio.clone()
        }
    }
}

/// 解析逗号分隔的号码列表，如 `+18005550199,+18008675309`
pub fn parse_recipients(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 是否为 E.164 格式号码
pub fn is_phone_number(s: &str) -> bool {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE
        .get_or_init(|| Regex::new(r"^\+?[1-9]\d{6,14}$").expect("valid phone regex"))
        .is_match(s)
}
