//! Porter Monitor - 监控车库门等出入口状态并通过短信发送提醒

pub mod config;
pub mod monitor;
pub mod notification;
pub mod status;
pub mod tracker;

pub use config::MonitorConfig;
pub use monitor::{CycleReport, Health, MonitorLoop};
pub use notification::{NotificationDispatcher, Notice, Notifier, SendResult, TwilioNotifier};
pub use status::{EntitySnapshot, HttpStatusSource, StatusSource};
pub use tracker::{Decision, EntityTracker, TrackedEntity};
