//! 消息格式化模块 - 将通知事件渲染为发给接收者的短信正文
//!
//! 渲染是确定性的：同样的事件和渲染时间总是得到同样的文本。
//! 时间戳取渲染时刻，而开启时长由事件自身携带。

use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;
use std::time::Duration;

use super::event::Notice;

/// Notification message templates
pub mod msg {
    pub const PREFIX: &str = "Porter notice";
    pub const STARTED: &str = "Door monitor started.";
    pub const STOPPING: &str = "Door monitor is stopping.";
    pub const UNREACHABLE: &str = "I'm having trouble reaching the door controller. The network might be offline, or the controller may need to be rebooted. I won't send any more messages until I can reach it.";
    pub const RECOVERED: &str = "The garage door controller is back online! Status updates will resume.";

    /// e.g. `Mon Jan 2 '06 3:04 PM`
    pub const TIMESTAMP_FORMAT: &str = "%a %b %-d '%y %-I:%M %p";
}

/// 时长单位（秒数, 单数, 复数），从大到小
const UNITS: [(u64, &str, &str); 5] = [
    (7 * 24 * 3600, "week", "weeks"),
    (24 * 3600, "day", "days"),
    (3600, "hour", "hours"),
    (60, "minute", "minutes"),
    (1, "second", "seconds"),
];

/// 消息格式化器
#[derive(Debug, Clone, Default)]
pub struct MessageFormatter;

impl MessageFormatter {
    pub fn new() -> Self {
        Self
    }

    /// 以当前本地时间渲染
    pub fn render(&self, notice: &Notice) -> String {
        self.render_at(notice, &Local::now())
    }

    /// 以指定时间渲染
    pub fn render_at<Tz>(&self, notice: &Notice, at: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let ts = at.format(msg::TIMESTAMP_FORMAT);
        let body = match notice {
            Notice::EntityOpen { entity, open_for } => {
                format!("{} has been open for {}.", entity, format_duration(*open_for))
            }
            Notice::EntityClosed { entity, open_for: Some(d) } => {
                format!("{} is now closed. It was open for {}.", entity, format_duration(*d))
            }
            Notice::EntityClosed { entity, open_for: None } => format!("{} is now closed.", entity),
            Notice::MonitorStarting => msg::STARTED.to_string(),
            Notice::MonitorStopping => msg::STOPPING.to_string(),
            Notice::MonitorUnreachable => msg::UNREACHABLE.to_string(),
            Notice::MonitorRecovered => msg::RECOVERED.to_string(),
        };

        format!("[{}] {}: {}", ts, msg::PREFIX, body)
    }
}

/// 将时长格式化为粗粒度的可读文本，最多两个相邻单位
///
/// `7500s` → `2 hours 5 minutes`；不足一秒 → `0 seconds`
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs == 0 {
        return "0 seconds".to_string();
    }

    let Some(idx) = UNITS.iter().position(|(size, _, _)| secs >= *size) else {
        return "0 seconds".to_string();
    };

    let (size, one, many) = UNITS[idx];
    let major = secs / size;
    let mut out = format!("{} {}", major, if major == 1 { one } else { many });

    if let Some((next_size, next_one, next_many)) = UNITS.get(idx + 1) {
        let minor = (secs % size) / next_size;
        if minor > 0 {
            out.push_str(&format!(" {} {}", minor, if minor == 1 { next_one } else { next_many }));
        }
    }

    out
}
