//! 监控循环 - 定时轮询状态源、评估每个门并发送通知
//!
//! 整个循环在单个任务中顺序执行（轮询 → 评估 → 投递 → 等待），两次轮询不会重叠，
//! 因此跟踪器和健康状态都是普通字段，不需要加锁。

use crate::notification::{NotificationDispatcher, Notice};
use crate::status::{EntitySnapshot, StatusSource};
use crate::tracker::EntityTracker;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// 默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// 默认轮询超时
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(10);
/// 停止通知的默认宽限期
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(3);

/// 状态源健康状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    /// 正常
    Healthy,
    /// 状态源不可达，已发送过一次错误通知
    Degraded,
}

/// 单次轮询的结果
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// 轮询是否成功
    pub poll_ok: bool,
    /// 本轮发出的通知
    pub notices: Vec<Notice>,
}

/// 监控循环
pub struct MonitorLoop {
    source: Arc<dyn StatusSource>,
    dispatcher: NotificationDispatcher,
    tracker: EntityTracker,
    health: Health,
    poll_interval: Duration,
    poll_timeout: Duration,
    stop_grace: Duration,
}

impl MonitorLoop {
    pub fn new(
        source: Arc<dyn StatusSource>,
        dispatcher: NotificationDispatcher,
        tracker: EntityTracker,
    ) -> Self {
        Self {
            source,
            dispatcher,
            tracker,
            health: Health::Healthy,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }

    /// 设置轮询间隔
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// 设置轮询超时
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// 设置停止通知的宽限期
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn health(&self) -> Health {
        self.health
    }

    pub fn tracker(&self) -> &EntityTracker {
        &self.tracker
    }

    /// 运行直到 `shutdown` 完成
    ///
    /// `shutdown` 在启动通知发出前就开始被 poll，等待间隔和轮询等待都可以被它打断；
    /// 已经开始的投递会继续完成。收到停止信号后发送停止通知（受宽限期限制）再返回。
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            recipients = self.dispatcher.recipient_count(),
            "Door monitor starting"
        );
        tokio::pin!(shutdown);

        // 启动通知期间收到的停止信号不能丢失；启动通知本身仍然发完
        let stopped = {
            let start = self.announce_start();
            tokio::pin!(start);
            let stopped = tokio::select! {
                _ = &mut shutdown => true,
                _ = &mut start => false,
            };
            if stopped {
                start.await;
            }
            stopped
        };

        if !stopped {
            loop {
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = sleep(self.poll_interval) => {}
                }
                let polled = tokio::select! {
                    _ = &mut shutdown => {
                        debug!("Shutdown requested while waiting for status poll");
                        break;
                    }
                    polled = self.poll() => polled,
                };
                self.reconcile(Utc::now(), polled).await;
            }
        }

        info!("Door monitor stopping");
        self.announce_stop().await;
    }

    /// 发送启动通知
    pub async fn announce_start(&self) {
        self.dispatcher.send_notice(&Notice::MonitorStarting).await;
    }

    /// 发送停止通知，最多等待宽限期
    pub async fn announce_stop(&self) {
        let stopping = self.dispatcher.send_notice(&Notice::MonitorStopping);
        if timeout(self.stop_grace, stopping).await.is_err() {
            warn!(grace_secs = self.stop_grace.as_secs(), "Stop notice did not finish within grace period");
        }
    }

    /// 以当前时间执行一轮
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.run_cycle_at(Utc::now()).await
    }

    /// 以指定时间执行一轮：轮询、评估、投递，全部投递完成后返回
    pub async fn run_cycle_at(&mut self, now: DateTime<Utc>) -> CycleReport {
        let polled = self.poll().await;
        self.reconcile(now, polled).await
    }

    /// 轮询状态源，超时视为失败
    async fn poll(&self) -> Result<HashMap<String, EntitySnapshot>> {
        match timeout(self.poll_timeout, self.source.list()).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!("status poll timed out after {}s", self.poll_timeout.as_secs())),
        }
    }

    /// 根据轮询结果更新健康状态和跟踪器，并投递产生的通知
    async fn reconcile(
        &mut self,
        now: DateTime<Utc>,
        polled: Result<HashMap<String, EntitySnapshot>>,
    ) -> CycleReport {
        let mut report = CycleReport::default();

        match polled {
            Err(e) => {
                if self.health == Health::Healthy {
                    warn!(error = %e, "Status source unreachable, suppressing further error notices");
                    self.health = Health::Degraded;
                    report.notices.push(Notice::MonitorUnreachable);
                } else {
                    debug!(error = %e, "Status source still unreachable");
                }
            }
            Ok(states) => {
                report.poll_ok = true;

                if self.health == Health::Degraded {
                    info!("Status source reachable again");
                    self.health = Health::Healthy;
                    report.notices.push(Notice::MonitorRecovered);
                }

                for snapshot in states.values() {
                    let decision = self.tracker.evaluate(snapshot, now);
                    if let Some(notice) = decision.into_notice(&snapshot.name) {
                        info!(entity = %snapshot.name, kind = notice.kind(), "Entity needs notification");
                        report.notices.push(notice);
                    }
                }

                let pruned = self.tracker.retain_present(&states);
                if pruned > 0 {
                    debug!(pruned, "Dropped entities missing from status response");
                }
            }
        }

        for notice in &report.notices {
            self.dispatcher.send_notice(notice).await;
        }

        report
    }
}
