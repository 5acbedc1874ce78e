//! 状态源 - 获取所有被监控门的当前状态

pub mod http;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

pub use http::{HttpStatusSource, StatusSourceConfig};

/// 单个门在某次轮询时的状态快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySnapshot {
    /// 门名称
    pub name: String,
    /// 当前状态值
    pub current_state: Value,
    /// 表示"已关闭"的状态值
    pub closed_state: Value,
    /// 状态源记录的最近一次状态变化时间
    pub last_change: DateTime<Utc>,
}

impl EntitySnapshot {
    pub fn new(
        name: impl Into<String>,
        current_state: impl Into<Value>,
        closed_state: impl Into<Value>,
        last_change: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            current_state: current_state.into(),
            closed_state: closed_state.into(),
            last_change,
        }
    }

    /// 是否处于关闭状态
    pub fn is_closed(&self) -> bool {
        self.current_state == self.closed_state
    }
}

/// 状态源 trait
///
/// 每次调用返回完整的门列表，不分页也不过滤。
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn list(&self) -> Result<HashMap<String, EntitySnapshot>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_snapshot_is_closed() {
        let now = Utc::now();
        assert!(EntitySnapshot::new("Garage", "closed", "closed", now).is_closed());
        assert!(!EntitySnapshot::new("Garage", "open", "closed", now).is_closed());
        // 状态值是不透明的，数字和布尔也可以比较
        assert!(EntitySnapshot::new("Side", 0, 0, now).is_closed());
        assert!(!EntitySnapshot::new("Side", true, false, now).is_closed());
    }

    #[test]
    fn test_snapshot_serializes_for_json_output() {
        let changed = Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap();
        let json = serde_json::to_value(EntitySnapshot::new("Garage", "open", "closed", changed)).unwrap();
        assert_eq!(json["name"], "Garage");
        assert_eq!(json["current_state"], "open");
        assert_eq!(json["closed_state"], "closed");
        assert_eq!(json["last_change"], "2024-06-01T18:00:00Z");
    }
}
