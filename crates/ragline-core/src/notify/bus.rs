//! Single-slot notification holder with TTL expiry.
//!
//! At most one notification is visible. Raising a new one replaces the
//! current one and restarts its TTL. Expiry is evaluated on the
//! orchestrator's periodic tick rather than with per-message timers.

use chrono::{DateTime, Duration, Utc};
use ragline_types::event::ChatEvent;
use ragline_types::notification::{Notification, Severity};

use crate::event::EventBus;

pub struct NotificationBus {
    current: Option<Notification>,
    ttl: Duration,
    events: EventBus,
}

impl NotificationBus {
    pub fn new(ttl: Duration, events: EventBus) -> Self {
        Self {
            current: None,
            ttl,
            events,
        }
    }

    /// The visible notification, if any.
    pub fn current(&self) -> Option<&Notification> {
        self.current.as_ref()
    }

    pub fn raise(&mut self, text: impl Into<String>, severity: Severity) {
        self.raise_at(text, severity, Utc::now());
    }

    /// Replace the visible notification. The TTL restarts at `now`.
    pub fn raise_at(&mut self, text: impl Into<String>, severity: Severity, now: DateTime<Utc>) {
        let notification = Notification::new(text, severity, now);
        match severity {
            Severity::Bad => tracing::warn!(text = %notification.text, "notification"),
            Severity::Good => tracing::info!(text = %notification.text, "notification"),
        }
        self.current = Some(notification.clone());
        self.events
            .publish(ChatEvent::NotificationRaised { notification });
    }

    pub fn tick(&mut self) {
        self.tick_at(Utc::now());
    }

    /// Clear the visible notification once its age exceeds the TTL.
    pub fn tick_at(&mut self, now: DateTime<Utc>) {
        let expired = self
            .current
            .as_ref()
            .is_some_and(|n| n.is_expired(now, self.ttl));
        if expired {
            self.current = None;
            self.events.publish(ChatEvent::NotificationCleared);
        }
    }
}

impl std::fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBus")
            .field("current", &self.current)
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus() -> (NotificationBus, tokio::sync::broadcast::Receiver<ChatEvent>) {
        let events = EventBus::new(16);
        let rx = events.subscribe();
        (NotificationBus::new(Duration::seconds(5), events), rx)
    }

    #[test]
    fn raise_sets_current_and_publishes() {
        let (mut bus, mut rx) = bus();
        bus.raise("Connected", Severity::Good);

        let current = bus.current().unwrap();
        assert_eq!(current.text, "Connected");
        assert_eq!(current.severity, Severity::Good);
        assert!(matches!(
            rx.try_recv().unwrap(),
            ChatEvent::NotificationRaised { .. }
        ));
    }

    #[test]
    fn raise_replaces_and_restarts_ttl() {
        let (mut bus, _rx) = bus();
        let t0 = Utc::now();
        bus.raise_at("first", Severity::Good, t0);
        bus.raise_at("second", Severity::Bad, t0 + Duration::seconds(4));

        // 6s after the first raise, 2s after the second: still visible.
        bus.tick_at(t0 + Duration::seconds(6));
        let current = bus.current().unwrap();
        assert_eq!(current.text, "second");
        assert_eq!(current.severity, Severity::Bad);
    }

    #[test]
    fn tick_clears_expired_notification() {
        let (mut bus, mut rx) = bus();
        let t0 = Utc::now();
        bus.raise_at("index unavailable", Severity::Bad, t0);
        let _ = rx.try_recv();

        bus.tick_at(t0 + Duration::seconds(5));
        assert!(bus.current().is_some());

        bus.tick_at(t0 + Duration::milliseconds(5_500));
        assert!(bus.current().is_none());
        assert!(matches!(
            rx.try_recv().unwrap(),
            ChatEvent::NotificationCleared
        ));
    }

    #[test]
    fn tick_without_notification_publishes_nothing() {
        let (mut bus, mut rx) = bus();
        bus.tick();
        assert!(rx.try_recv().is_err());
    }
}
