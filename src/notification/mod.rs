//! 通知层 - 事件定义、消息渲染与扇出投递
//!
//! # 设计目标
//! 1. 类型化事件：每种通知是 `Notice` 的一个变体，自带 payload
//! 2. 渠道解耦：短信网关实现 `Notifier` trait，可替换为 mock
//! 3. 并发投递：`NotificationDispatcher` 并发发送给所有接收者并等待全部完成
//!
//! # 使用示例
//! ```ignore
//! use porter_monitor::notification::{NotificationDispatcher, Notice, TwilioNotifier};
//!
//! let notifier = Arc::new(TwilioNotifier::new(config.twilio())?);
//! let dispatcher = NotificationDispatcher::new(notifier, "+18005550100", recipients);
//! dispatcher.send_notice(&Notice::MonitorStarting).await;
//! ```

pub mod channel;
pub mod channels;
pub mod dispatcher;
pub mod event;
pub mod formatter;

pub use channel::{DeliveryOutcome, Notifier, SendResult};
pub use channels::{ConsoleNotifier, TwilioConfig, TwilioNotifier};
pub use dispatcher::NotificationDispatcher;
pub use event::Notice;
pub use formatter::{format_duration, msg, MessageFormatter};
