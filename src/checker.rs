//! Periodic new-chapter detection and notification.
//!
//! One cycle walks every tracked title in order, asks the catalog for its
//! newest chapter and compares it to the stored baseline. A new chapter is
//! announced to the title's subscribers; the baseline only moves once the
//! announcement went out, so a failed dispatch is retried next cycle.
use crate::catalog::{Catalog, CatalogError};
use crate::notify::{Mention, Notification, Notifier};
use crate::storage::{Database, NotificationBaseline};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// What to do when a new chapter is found but nobody is subscribed any more.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroSubscriberPolicy {
    /// Leave the baseline where it is.
    #[default]
    Hold,
    /// Move the baseline without dispatching.
    Advance,
}

/// Per-title result of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleOutcome {
    Unchanged,
    Notified,
    FetchFailed,
    DispatchFailed,
    NoSubscribers,
    StoreFailed,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleReport {
    pub outcomes: Vec<(String, TitleOutcome)>,
    /// Shutdown was requested before every title was checked.
    pub interrupted: bool,
}

impl CycleReport {
    pub fn outcome(&self, title_id: &str) -> Option<TitleOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == title_id)
            .map(|(_, outcome)| *outcome)
    }

    pub fn count(&self, outcome: TitleOutcome) -> usize {
        self.outcomes.iter().filter(|(_, o)| *o == outcome).count()
    }
}

/// Settings the checker needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct CheckerSettings {
    pub channel_id: String,
    pub reader_base_url: String,
    pub title_delay: Duration,
    pub zero_subscriber_policy: ZeroSubscriberPolicy,
}

pub struct UpdateChecker {
    db: Database,
    catalog: Arc<dyn Catalog>,
    notifier: Arc<dyn Notifier>,
    settings: CheckerSettings,
}

impl UpdateChecker {
    pub fn new(
        db: Database,
        catalog: Arc<dyn Catalog>,
        notifier: Arc<dyn Notifier>,
        settings: CheckerSettings,
    ) -> Self {
        Self {
            db,
            catalog,
            notifier,
            settings,
        }
    }

    /// Run one cycle immediately, then one per `interval` until shutdown.
    ///
    /// Cycles never overlap: the next tick is only awaited after the current
    /// cycle returns, and a late tick is delayed rather than bunched.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = ticker.tick() => {}
            }
            let report = self.run_cycle(&shutdown).await;
            if report.interrupted {
                break;
            }
        }
        tracing::info!("Update checker stopped");
    }

    /// Check every tracked title once.
    ///
    /// Failures are contained per title. Shutdown is honoured between titles,
    /// never in the middle of a notify-and-advance step.
    pub async fn run_cycle(&self, shutdown: &watch::Receiver<bool>) -> CycleReport {
        let mut shutdown = shutdown.clone();
        let mut report = CycleReport::default();
        let started = Instant::now();

        let tracked = match self.db.get_tracked_titles().await {
            Ok(tracked) => tracked,
            Err(e) => {
                tracing::error!(error = %e, "Could not load tracked titles, skipping cycle");
                return report;
            }
        };
        tracing::info!(titles = tracked.len(), "Update cycle started");

        for (index, baseline) in tracked.iter().enumerate() {
            if *shutdown.borrow() {
                report.interrupted = true;
                break;
            }
            if index > 0 && !self.settings.title_delay.is_zero() {
                tokio::select! {
                    _ = shutdown_requested(&mut shutdown) => {
                        report.interrupted = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.settings.title_delay) => {}
                }
            }
            let outcome = self.check_title(baseline).await;
            report.outcomes.push((baseline.title_id.clone(), outcome));
        }

        tracing::info!(
            checked = report.outcomes.len(),
            notified = report.count(TitleOutcome::Notified),
            failed = report.count(TitleOutcome::FetchFailed)
                + report.count(TitleOutcome::DispatchFailed)
                + report.count(TitleOutcome::StoreFailed),
            interrupted = report.interrupted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Update cycle finished"
        );
        report
    }

    async fn check_title(&self, baseline: &NotificationBaseline) -> TitleOutcome {
        let title_id = baseline.title_id.as_str();

        let latest = match self.catalog.latest_chapter(title_id).await {
            Ok(chapter) => chapter,
            Err(CatalogError::NoChapters(_)) => {
                tracing::debug!(title_id = %title_id, "No chapters published yet");
                return TitleOutcome::Unchanged;
            }
            Err(CatalogError::NotFound(_)) => {
                tracing::debug!(title_id = %title_id, "Title not in catalog");
                return TitleOutcome::Unchanged;
            }
            Err(e) => {
                tracing::warn!(title_id = %title_id, error = %e, "Failed to fetch latest chapter");
                return TitleOutcome::FetchFailed;
            }
        };

        if baseline.latest_known_chapter_id.as_deref() == Some(latest.chapter_id.as_str()) {
            tracing::debug!(title_id = %title_id, chapter_id = %latest.chapter_id, "No new chapter");
            return TitleOutcome::Unchanged;
        }

        let subscribers = match self.db.get_subscribers(title_id).await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                tracing::warn!(title_id = %title_id, error = %e, "Failed to load subscribers");
                return TitleOutcome::StoreFailed;
            }
        };

        if subscribers.is_empty() {
            tracing::info!(
                title_id = %title_id,
                chapter_id = %latest.chapter_id,
                policy = ?self.settings.zero_subscriber_policy,
                "New chapter but no subscribers"
            );
            if self.settings.zero_subscriber_policy == ZeroSubscriberPolicy::Advance {
                if let Err(e) = self.db.advance_baseline(title_id, &latest.chapter_id).await {
                    tracing::warn!(title_id = %title_id, error = %e, "Failed to advance baseline");
                    return TitleOutcome::StoreFailed;
                }
            }
            return TitleOutcome::NoSubscribers;
        }

        // Detail only adds cover art and the canonical name; losing it is not fatal
        let (title_name, cover_url) = match self.catalog.detail(title_id).await {
            Ok(detail) => (detail.name, detail.cover_url),
            Err(e) => {
                tracing::warn!(title_id = %title_id, error = %e, "Title detail unavailable, using stored name");
                let stored = self.db.get_title_name(title_id).await.ok().flatten();
                (stored.unwrap_or_else(|| title_id.to_string()), None)
            }
        };

        let notification = Notification {
            title_id: title_id.to_string(),
            title_name,
            chapter_label: latest.label(),
            chapter_url: chapter_url(&self.settings.reader_base_url, &latest.chapter_id),
            chapter_id: latest.chapter_id.clone(),
            chapter_number: latest.number,
            released_at: latest.released_at,
            cover_url,
        };
        let mentions: Vec<Mention> = subscribers.into_iter().map(Mention::user).collect();

        if let Err(e) = self
            .notifier
            .dispatch(&self.settings.channel_id, &mentions, &notification)
            .await
        {
            tracing::warn!(
                title_id = %title_id,
                chapter_id = %latest.chapter_id,
                error = %e,
                "Notification dispatch failed, will retry next cycle"
            );
            return TitleOutcome::DispatchFailed;
        }

        match self.db.advance_baseline(title_id, &latest.chapter_id).await {
            Ok(true) => {}
            // Last subscriber left while we were dispatching; the row is gone
            Ok(false) => tracing::debug!(
                title_id = %title_id,
                chapter_id = %latest.chapter_id,
                "Baseline pruned during dispatch, nothing to advance"
            ),
            Err(e) => {
                tracing::error!(
                    title_id = %title_id,
                    chapter_id = %latest.chapter_id,
                    error = %e,
                    "Notified but failed to advance baseline"
                );
                return TitleOutcome::StoreFailed;
            }
        }

        tracing::info!(
            title_id = %title_id,
            chapter_id = %latest.chapter_id,
            chapter = %notification.chapter_label,
            recipients = mentions.len(),
            "Announced new chapter"
        );
        TitleOutcome::Notified
    }
}

/// Reader link for a chapter.
pub fn chapter_url(reader_base_url: &str, chapter_id: &str) -> String {
    format!("{}/chapter/{}", reader_base_url.trim_end_matches('/'), chapter_id)
}

/// Resolves once shutdown is requested. A dropped sender never resolves.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
