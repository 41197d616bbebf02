// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! Render scheduler: coalesces damage notifications from all processes into
//! at most one frame per cooperative tick.
//!
//! Any mutation of visible state calls [`RenderScheduler::schedule`]; the
//! engine's event loop awaits [`RenderScheduler::next_render`] and paints
//! one frame when it resolves. The `pending` flag is cleared *before* the
//! frame is painted, so damage arriving during the paint schedules the next
//! tick instead of being lost.

use std::sync::{atomic::{AtomicBool, Ordering},
                Arc};

use tokio::sync::Notify;

#[derive(Clone, Debug, Default)]
pub struct RenderScheduler {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    pending: AtomicBool,
    notify: Notify,
}

impl RenderScheduler {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Request a frame. Idempotent within one tick: no matter how many
    /// damage events arrive before the next render, exactly one frame is
    /// produced.
    pub fn schedule(&self) {
        if !self.inner.pending.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_one();
        }
    }

    /// Resolves at the next frame boundary. Cancellation-safe: dropping the
    /// future (e.g. when another `select!` branch wins) keeps the pending
    /// frame queued.
    pub async fn next_render(&self) {
        loop {
            if self.inner.pending.swap(false, Ordering::AcqRel) {
                return;
            }
            self.inner.notify.notified().await;
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool { self.inner.pending.load(Ordering::Acquire) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_burst_of_schedules_coalesces_to_one_render() {
        let scheduler = RenderScheduler::new();
        for _ in 0..100 {
            scheduler.schedule();
        }

        timeout(Duration::from_millis(100), scheduler.next_render())
            .await
            .expect("first render must fire");

        // The burst is fully consumed: no second frame is pending.
        let second = timeout(Duration::from_millis(50), scheduler.next_render()).await;
        assert!(second.is_err(), "coalesced burst must yield exactly one render");
    }

    #[tokio::test]
    async fn test_schedule_after_render_fires_again() {
        let scheduler = RenderScheduler::new();
        scheduler.schedule();
        scheduler.next_render().await;

        scheduler.schedule();
        timeout(Duration::from_millis(100), scheduler.next_render())
            .await
            .expect("new damage after a frame must schedule the next one");
    }

    #[tokio::test]
    async fn test_waiter_woken_by_later_schedule() {
        let scheduler = RenderScheduler::new();
        let waiter = scheduler.clone();
        let handle = tokio::spawn(async move { waiter.next_render().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        scheduler.schedule();

        timeout(Duration::from_millis(100), handle)
            .await
            .expect("waiter must be woken")
            .unwrap();
    }

    #[tokio::test]
    async fn test_pending_flag_visible() {
        let scheduler = RenderScheduler::new();
        assert!(!scheduler.is_pending());
        scheduler.schedule();
        assert!(scheduler.is_pending());
        scheduler.next_render().await;
        assert!(!scheduler.is_pending());
    }
}
