//! 通知分发器 - 将一条消息并发扇出到所有接收者

use super::channel::{Notifier, SendResult};
use super::event::Notice;
use super::formatter::MessageFormatter;
use anyhow::anyhow;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// 默认单次投递超时
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// 通知分发器
///
/// 每个接收者独立投递，单个失败只记录日志，不重试，也不影响其他接收者。
pub struct NotificationDispatcher {
    /// 短信网关
    notifier: Arc<dyn Notifier>,
    /// 发送方号码
    sender: String,
    /// 接收方号码列表
    recipients: Vec<String>,
    /// 单次投递超时
    delivery_timeout: Duration,
    formatter: MessageFormatter,
}

impl NotificationDispatcher {
    /// 创建新的分发器
    pub fn new(notifier: Arc<dyn Notifier>, sender: impl Into<String>, recipients: Vec<String>) -> Self {
        Self {
            notifier,
            sender: sender.into(),
            recipients,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            formatter: MessageFormatter::new(),
        }
    }

    /// 设置单次投递超时
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// 渲染并发送通知事件
    pub async fn send_notice(&self, notice: &Notice) -> Vec<(String, SendResult)> {
        let body = self.formatter.render(notice);
        info!(kind = notice.kind(), entity = ?notice.entity(), "Sending notice");
        self.broadcast(&body).await
    }

    /// 将消息发送给所有接收者，等待全部投递尝试完成后返回
    ///
    /// 结果顺序与接收者列表一致。
    pub async fn broadcast(&self, body: &str) -> Vec<(String, SendResult)> {
        // 所有任务先注册到 JoinSet，再统一等待
        let mut tasks = JoinSet::new();
        for (idx, recipient) in self.recipients.iter().enumerate() {
            let notifier = Arc::clone(&self.notifier);
            let sender = self.sender.clone();
            let recipient = recipient.clone();
            let body = body.to_string();
            let timeout = self.delivery_timeout;

            tasks.spawn(async move {
                let outcome = match tokio::time::timeout(
                    timeout,
                    notifier.send_text(&sender, &recipient, &body),
                )
                .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => Err(anyhow!("delivery timed out after {}s", timeout.as_secs())),
                };
                (idx, SendResult::from_outcome(outcome))
            });
        }

        let mut results: Vec<(String, SendResult)> = self
            .recipients
            .iter()
            .map(|r| (r.clone(), SendResult::Failed("delivery task aborted".to_string())))
            .collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, result)) => {
                    let recipient = &results[idx].0;
                    match &result {
                        SendResult::Sent => {
                            debug!(channel = self.notifier.name(), recipient = %recipient, "Message delivered")
                        }
                        SendResult::Failed(e) => {
                            warn!(channel = self.notifier.name(), recipient = %recipient, error = %e, "Delivery failed")
                        }
                    }
                    results[idx].1 = result;
                }
                Err(e) => warn!(error = %e, "Delivery task did not complete"),
            }
        }

        results
    }

    /// 获取接收者数量
    pub fn recipient_count(&self) -> usize {
        self.recipients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::channel::DeliveryOutcome;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// 测试用的 mock 网关
    struct MockNotifier {
        send_count: AtomicUsize,
        failing: Vec<String>,
        sent: Mutex<Vec<(String, String, String)>>,
    }

    impl MockNotifier {
        fn new() -> Self {
            Self::failing_for(&[])
        }

        fn failing_for(recipients: &[&str]) -> Self {
            Self {
                send_count: AtomicUsize::new(0),
                failing: recipients.iter().map(|r| r.to_string()).collect(),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn get_send_count(&self) -> usize {
            self.send_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Notifier for MockNotifier {
        fn name(&self) -> &str {
            "mock"
        }

        async fn send_text(&self, sender: &str, recipient: &str, body: &str) -> Result<DeliveryOutcome> {
            self.send_count.fetch_add(1, Ordering::SeqCst);
            if self.failing.iter().any(|r| r == recipient) {
                return Err(anyhow!("unreachable recipient"));
            }
            self.sent
                .lock()
                .unwrap()
                .push((sender.to_string(), recipient.to_string(), body.to_string()));
            Ok(DeliveryOutcome { status: 201 })
        }
    }

    /// 永不返回的网关，用于验证超时
    struct HangingNotifier;

    #[async_trait]
    impl Notifier for HangingNotifier {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn send_text(&self, _sender: &str, _recipient: &str, _body: &str) -> Result<DeliveryOutcome> {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    fn recipients(list: &[&str]) -> Vec<String> {
        list.iter().map(|r| r.to_string()).collect()
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_recipient() {
        let notifier = Arc::new(MockNotifier::new());
        let dispatcher = NotificationDispatcher::new(notifier.clone(), "+15550000000", recipients(&["+15550000001", "+15550000002"]));

        let results = dispatcher.broadcast("hello").await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, r)| *r == SendResult::Sent));
        assert_eq!(notifier.get_send_count(), 2);

        let sent = notifier.sent.lock().unwrap();
        assert!(sent.iter().all(|(from, _, body)| from == "+15550000000" && body == "hello"));
    }

    #[tokio::test]
    async fn test_broadcast_failure_does_not_block_others() {
        let notifier = Arc::new(MockNotifier::failing_for(&["B"]));
        let dispatcher = NotificationDispatcher::new(notifier.clone(), "S", recipients(&["A", "B", "C"]));

        let results = dispatcher.broadcast("hello").await;

        assert_eq!(notifier.get_send_count(), 3);
        assert_eq!(results[0], ("A".to_string(), SendResult::Sent));
        assert!(matches!(results[1], (ref r, SendResult::Failed(_)) if r == "B"));
        assert_eq!(results[2], ("C".to_string(), SendResult::Sent));
    }

    #[tokio::test]
    async fn test_broadcast_without_recipients() {
        let notifier = Arc::new(MockNotifier::new());
        let dispatcher = NotificationDispatcher::new(notifier.clone(), "S", Vec::new());

        assert!(dispatcher.broadcast("hello").await.is_empty());
        assert_eq!(notifier.get_send_count(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_times_out_hung_delivery() {
        let dispatcher = NotificationDispatcher::new(Arc::new(HangingNotifier), "S", recipients(&["A"]))
            .with_delivery_timeout(Duration::from_millis(50));

        let results = dispatcher.broadcast("hello").await;

        assert!(matches!(&results[0].1, SendResult::Failed(e) if e.contains("timed out")));
    }

    #[tokio::test]
    async fn test_send_notice_renders_body() {
        let notifier = Arc::new(MockNotifier::new());
        let dispatcher = NotificationDispatcher::new(notifier.clone(), "S", recipients(&["A"]));

        dispatcher.send_notice(&Notice::MonitorStarting).await;

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].2.ends_with("Porter notice: Door monitor started."));
    }
}
