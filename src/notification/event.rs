//! 通知事件结构
//!
//! 每种通知都是一个带类型化 payload 的变体，由 `MessageFormatter` 渲染为短信正文。

use serde::Serialize;
use std::time::Duration;

/// 通知事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    /// 门开启时间过长
    EntityOpen {
        entity: String,
        open_for: Duration,
    },
    /// 门已关闭（open_for 为此前开启的时长，未知时为 None）
    EntityClosed {
        entity: String,
        open_for: Option<Duration>,
    },
    /// 监控启动
    MonitorStarting,
    /// 监控停止
    MonitorStopping,
    /// 状态源不可达
    MonitorUnreachable,
    /// 状态源恢复
    MonitorRecovered,
}

impl Notice {
    pub fn entity_open(entity: impl Into<String>, open_for: Duration) -> Self {
        Self::EntityOpen {
            entity: entity.into(),
            open_for,
        }
    }

    pub fn entity_closed(entity: impl Into<String>, open_for: Option<Duration>) -> Self {
        Self::EntityClosed {
            entity: entity.into(),
            open_for,
        }
    }

    /// 事件类型名（用于日志）
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EntityOpen { .. } => "entity_open",
            Self::EntityClosed { .. } => "entity_closed",
            Self::MonitorStarting => "monitor_starting",
            Self::MonitorStopping => "monitor_stopping",
            Self::MonitorUnreachable => "monitor_unreachable",
            Self::MonitorRecovered => "monitor_recovered",
        }
    }

    /// 关联的门名称（监控级事件返回 None）
    pub fn entity(&self) -> Option<&str> {
        match self {
            Self::EntityOpen { entity, .. } | Self::EntityClosed { entity, .. } => Some(entity),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_kind_and_entity() {
        let open = Notice::entity_open("Garage", Duration::from_secs(1800));
        assert_eq!(open.kind(), "entity_open");
        assert_eq!(open.entity(), Some("Garage"));

        assert_eq!(Notice::MonitorUnreachable.kind(), "monitor_unreachable");
        assert_eq!(Notice::MonitorUnreachable.entity(), None);
    }

    #[test]
    fn test_notice_serializes_with_type_tag() {
        let closed = Notice::entity_closed("Side door", None);
        let json = serde_json::to_value(&closed).unwrap();
        assert_eq!(json["type"], "entity_closed");
        assert_eq!(json["entity"], "Side door");
    }
}
