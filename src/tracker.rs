//! 门状态跟踪 - 开门提醒的防抖与重复抑制
//!
//! 每次轮询对每个门调用一次 [`EntityTracker::evaluate`]，它根据快照和已记录的
//! 状态决定是否提醒，并同时更新自己的记录。
//!
//! ```text
//!            open, < open_threshold            open, >= open_threshold
//!  (none) ─────────────────────────► Tracked ─────────────────────────► Notified
//!    ▲                                  │                                │  │
//!    │         closed (silent)          │                                │  │ repeat_threshold
//!    ├──────────────────────────────────┘                                │  │ elapsed → notify again
//!    │         closed (closed notice)                                    │◄─┘
//!    └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `repeat_threshold` 为 0 时，同一次开门（相同的 `last_change`）只提醒一次。

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

use crate::notification::Notice;
use crate::status::EntitySnapshot;

/// 单个门的跟踪记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEntity {
    /// 最近记录的状态变化时间
    pub last_known_change: DateTime<Utc>,
    /// 最近一次提醒时间，None 表示本次开门尚未提醒
    pub last_notified: Option<DateTime<Utc>>,
}

impl TrackedEntity {
    fn new(last_known_change: DateTime<Utc>) -> Self {
        Self {
            last_known_change,
            last_notified: None,
        }
    }
}

/// 单次评估的结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// 无需提醒
    Quiet,
    /// 门开启过久
    StillOpen { open_for: Duration },
    /// 已提醒过的门重新关闭
    Closed { open_for: Duration },
}

impl Decision {
    /// 转换为通知事件
    pub fn into_notice(self, entity: &str) -> Option<Notice> {
        match self {
            Decision::Quiet => None,
            Decision::StillOpen { open_for } => Some(Notice::entity_open(entity, open_for)),
            Decision::Closed { open_for } => Some(Notice::entity_closed(entity, Some(open_for))),
        }
    }
}

/// 门状态跟踪器
#[derive(Debug)]
pub struct EntityTracker {
    /// 开启多久后首次提醒
    open_threshold: Duration,
    /// 重复提醒间隔，0 表示只提醒一次
    repeat_threshold: Duration,
    entries: HashMap<String, TrackedEntity>,
}

impl EntityTracker {
    pub fn new(open_threshold: Duration, repeat_threshold: Duration) -> Self {
        Self {
            open_threshold,
            repeat_threshold,
            entries: HashMap::new(),
        }
    }

    /// 评估一个门的最新快照
    pub fn evaluate(&mut self, snapshot: &EntitySnapshot, now: DateTime<Utc>) -> Decision {
        if snapshot.is_closed() {
            let Some(entry) = self.entries.remove(&snapshot.name) else {
                return Decision::Quiet;
            };

            // 只有提醒过、且确实发生了新的状态变化，才发送关闭通知
            if entry.last_notified.is_some() && entry.last_known_change != snapshot.last_change {
                return Decision::Closed {
                    open_for: elapsed(entry.last_known_change, snapshot.last_change),
                };
            }
            return Decision::Quiet;
        }

        let entry = self
            .entries
            .entry(snapshot.name.clone())
            .or_insert_with(|| TrackedEntity::new(snapshot.last_change));

        let open_for = elapsed(snapshot.last_change, now);
        if open_for < self.open_threshold {
            return Decision::Quiet;
        }

        if entry.last_known_change == snapshot.last_change {
            if let Some(last_notified) = entry.last_notified {
                if self.repeat_threshold.is_zero()
                    || elapsed(last_notified, now) < self.repeat_threshold
                {
                    return Decision::Quiet;
                }
            }
        }

        entry.last_notified = Some(match entry.last_notified {
            Some(prev) => prev.max(now),
            None => now,
        });
        entry.last_known_change = snapshot.last_change;

        Decision::StillOpen { open_for }
    }

    /// 清除本次轮询结果中已不存在的门
    pub fn retain_present(&mut self, present: &HashMap<String, EntitySnapshot>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|name, _| present.contains_key(name));
        before - self.entries.len()
    }

    pub fn get(&self, name: &str) -> Option<&TrackedEntity> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 计算 `from` 到 `to` 的时长，时钟偏差导致的负值按 0 处理
fn elapsed(from: DateTime<Utc>, to: DateTime<Utc>) -> Duration {
    (to - from).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};

    const MINUTE: Duration = Duration::from_secs(60);

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap()
    }

    fn mins(n: i64) -> ChronoDuration {
        ChronoDuration::minutes(n)
    }

    fn open(changed_at: DateTime<Utc>) -> EntitySnapshot {
        EntitySnapshot::new("Garage", "open", "closed", changed_at)
    }

    fn closed(changed_at: DateTime<Utc>) -> EntitySnapshot {
        EntitySnapshot::new("Garage", "closed", "closed", changed_at)
    }

    fn tracker(open_mins: u64, repeat_mins: u64) -> EntityTracker {
        EntityTracker::new(MINUTE * open_mins as u32, MINUTE * repeat_mins as u32)
    }

    #[test]
    fn test_closed_entity_is_never_tracked() {
        let mut tracker = tracker(30, 60);
        let t0 = base_time();

        assert_eq!(tracker.evaluate(&closed(t0), t0 + mins(120)), Decision::Quiet);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_open_below_threshold_creates_entry() {
        let mut tracker = tracker(30, 60);
        let t0 = base_time();

        assert_eq!(tracker.evaluate(&open(t0), t0 + mins(10)), Decision::Quiet);

        let entry = tracker.get("Garage").unwrap();
        assert_eq!(entry.last_known_change, t0);
        assert_eq!(entry.last_notified, None);
    }

    #[test]
    fn test_open_past_threshold_notifies_once() {
        let mut tracker = tracker(30, 60);
        let t0 = base_time();
        let now = t0 + mins(31);

        assert_eq!(
            tracker.evaluate(&open(t0), now),
            Decision::StillOpen { open_for: MINUTE * 31 }
        );
        assert_eq!(tracker.get("Garage").unwrap().last_notified, Some(now));

        // 紧接着的轮询不再提醒
        assert_eq!(tracker.evaluate(&open(t0), now + mins(1)), Decision::Quiet);
    }

    #[test]
    fn test_repeat_after_threshold() {
        let mut tracker = tracker(30, 60);
        let t0 = base_time();
        let first = t0 + mins(30);

        assert!(matches!(tracker.evaluate(&open(t0), first), Decision::StillOpen { .. }));
        assert_eq!(tracker.evaluate(&open(t0), first + mins(59)), Decision::Quiet);
        assert_eq!(
            tracker.evaluate(&open(t0), first + mins(60)),
            Decision::StillOpen { open_for: MINUTE * 90 }
        );
        assert_eq!(tracker.evaluate(&open(t0), first + mins(61)), Decision::Quiet);
    }

    #[test]
    fn test_zero_repeat_threshold_notifies_once_per_episode() {
        let mut tracker = tracker(30, 0);
        let t0 = base_time();

        assert!(matches!(tracker.evaluate(&open(t0), t0 + mins(30)), Decision::StillOpen { .. }));
        for i in 1..100 {
            assert_eq!(tracker.evaluate(&open(t0), t0 + mins(30 + i * 10)), Decision::Quiet);
        }
    }

    #[test]
    fn test_zero_repeat_threshold_new_episode_notifies_again() {
        let mut tracker = tracker(30, 0);
        let t0 = base_time();

        assert!(matches!(tracker.evaluate(&open(t0), t0 + mins(30)), Decision::StillOpen { .. }));

        // 两次轮询之间关闭又打开（没有观察到关闭），新的变化时间算作新的一次开门
        let t1 = t0 + mins(40);
        assert_eq!(tracker.evaluate(&open(t1), t1 + mins(5)), Decision::Quiet);
        assert!(matches!(tracker.evaluate(&open(t1), t1 + mins(30)), Decision::StillOpen { .. }));
    }

    #[test]
    fn test_close_after_notification_sends_closed_notice() {
        let mut tracker = tracker(30, 60);
        let t0 = base_time();

        tracker.evaluate(&open(t0), t0 + mins(45));
        let closed_at = t0 + mins(50);

        assert_eq!(
            tracker.evaluate(&closed(closed_at), closed_at + mins(1)),
            Decision::Closed { open_for: MINUTE * 50 }
        );
        assert!(tracker.get("Garage").is_none());

        // 仍然关闭，不再通知
        assert_eq!(tracker.evaluate(&closed(closed_at), closed_at + mins(2)), Decision::Quiet);
    }

    #[test]
    fn test_close_without_notification_is_silent() {
        let mut tracker = tracker(30, 60);
        let t0 = base_time();

        tracker.evaluate(&open(t0), t0 + mins(5));
        assert_eq!(tracker.evaluate(&closed(t0 + mins(10)), t0 + mins(11)), Decision::Quiet);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_future_timestamp_is_clamped() {
        let mut tracker = tracker(0, 60);
        let t0 = base_time();

        // 状态源时钟超前
        assert_eq!(
            tracker.evaluate(&open(t0 + mins(5)), t0),
            Decision::StillOpen { open_for: Duration::ZERO }
        );
    }

    #[test]
    fn test_retain_present_prunes_vanished() {
        let mut tracker = tracker(30, 60);
        let t0 = base_time();
        tracker.evaluate(&open(t0), t0);
        tracker.evaluate(&EntitySnapshot::new("Side", "open", "closed", t0), t0);
        assert_eq!(tracker.len(), 2);

        let present: HashMap<String, EntitySnapshot> =
            [("Side".to_string(), EntitySnapshot::new("Side", "open", "closed", t0))].into();
        assert_eq!(tracker.retain_present(&present), 1);
        assert!(tracker.get("Garage").is_none());
        assert!(tracker.get("Side").is_some());
    }

    #[test]
    fn test_decision_into_notice() {
        assert_eq!(Decision::Quiet.into_notice("Garage"), None);
        assert_eq!(
            Decision::StillOpen { open_for: MINUTE }.into_notice("Garage"),
            Some(Notice::entity_open("Garage", MINUTE))
        );
        assert_eq!(
            Decision::Closed { open_for: MINUTE }.into_notice("Garage"),
            Some(Notice::entity_closed("Garage", Some(MINUTE)))
        );
    }
}
