//! Coordinates one journal submission at a time:
//! validate → classify → generate insight → persist → notify.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use moodwell_bus::BusPublisher;
use moodwell_memory::{EntryStore, LoadOutcome};
use moodwell_schema::{BusMessage, Entry, EntryChange, WellnessError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classifier::{MoodAnalyzer, MoodClassifier};
use crate::config::WellnessConfig;
use crate::insight::{DelayedInsightGenerator, InsightGenerator, TemplateInsightGenerator};
use crate::summary::MoodSummary;

pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SubmitState {
    Idle = 0,
    Validating = 1,
    Classifying = 2,
    Generating = 3,
    Persisting = 4,
    Notifying = 5,
}

impl SubmitState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SubmitState::Validating,
            2 => SubmitState::Classifying,
            3 => SubmitState::Generating,
            4 => SubmitState::Persisting,
            5 => SubmitState::Notifying,
            _ => SubmitState::Idle,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubmitState::Idle => "idle",
            SubmitState::Validating => "validating",
            SubmitState::Classifying => "classifying",
            SubmitState::Generating => "generating",
            SubmitState::Persisting => "persisting",
            SubmitState::Notifying => "notifying",
        }
    }
}

/// Marks the controller busy for the lifetime of one operation. Dropping it,
/// on success, error, timeout or cancellation, returns the controller to idle.
struct InFlight<'a> {
    state: &'a AtomicU8,
}

impl<'a> InFlight<'a> {
    fn begin(state: &'a AtomicU8, first: SubmitState) -> Result<Self, WellnessError> {
        state
            .compare_exchange(
                SubmitState::Idle as u8,
                first as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| WellnessError::Busy)?;
        debug!(state = first.as_str(), "submission started");
        Ok(Self { state })
    }

    fn enter(&self, next: SubmitState) {
        self.state.store(next as u8, Ordering::Release);
        debug!(state = next.as_str(), "submission state");
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.state.store(SubmitState::Idle as u8, Ordering::Release);
    }
}

/// Owns the profile's journal store and is its only writer.
pub struct SessionController {
    store: Arc<dyn EntryStore>,
    analyzer: Arc<dyn MoodAnalyzer>,
    insights: Arc<dyn InsightGenerator>,
    bus: BusPublisher,
    state: AtomicU8,
    step_timeout: Duration,
}

impl SessionController {
    pub fn new(store: Arc<dyn EntryStore>, bus: BusPublisher) -> Self {
        Self {
            store,
            analyzer: Arc::new(MoodClassifier::new()),
            insights: Arc::new(TemplateInsightGenerator::new()),
            bus,
            state: AtomicU8::new(SubmitState::Idle as u8),
            step_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }

    /// Builds a controller for the configured profile under `data_dir`.
    pub fn from_config(
        config: &WellnessConfig,
        data_dir: &std::path::Path,
        bus: BusPublisher,
    ) -> Result<Self> {
        let store = config.open_store(data_dir)?;
        let mut controller =
            Self::new(store, bus).with_step_timeout(config.controller.step_timeout());
        let delay = config.controller.insight_delay();
        if !delay.is_zero() {
            controller = controller.with_insights(Arc::new(DelayedInsightGenerator::new(
                TemplateInsightGenerator::new(),
                delay,
            )));
        }
        Ok(controller)
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn MoodAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_insights(mut self, insights: Arc<dyn InsightGenerator>) -> Self {
        self.insights = insights;
        self
    }

    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    pub fn state(&self) -> SubmitState {
        SubmitState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Read-only handle for observers such as dashboards.
    pub fn store(&self) -> Arc<dyn EntryStore> {
        Arc::clone(&self.store)
    }

    /// Runs one submission. A call made while another is in flight fails
    /// with [`WellnessError::Busy`] and creates nothing.
    pub async fn submit(&self, text: &str, has_image: bool) -> Result<Entry, WellnessError> {
        let result = self.run_submission(text, has_image).await;
        if let Err(error) = &result {
            warn!(kind = error.kind().as_str(), %error, "submission failed");
            self.bus
                .publish(BusMessage::SubmissionFailed {
                    kind: error.kind(),
                    message: error.to_string(),
                })
                .await;
        }
        result
    }

    async fn run_submission(&self, text: &str, has_image: bool) -> Result<Entry, WellnessError> {
        let flight = InFlight::begin(&self.state, SubmitState::Validating)?;
        let text = text.trim();
        if text.is_empty() && !has_image {
            return Err(WellnessError::Validation(
                "write something or attach an image before saving".into(),
            ));
        }

        flight.enter(SubmitState::Classifying);
        let analysis = self
            .bounded(SubmitState::Classifying, self.analyzer.analyze(text, has_image))
            .await?;

        flight.enter(SubmitState::Generating);
        let insight = if text.is_empty() {
            None
        } else {
            match self
                .bounded(SubmitState::Generating, self.insights.generate(text))
                .await
            {
                Ok(insight) => Some(insight),
                Err(error) => {
                    warn!(%error, "no insight for this entry, saving without it");
                    None
                }
            }
        };

        flight.enter(SubmitState::Persisting);
        let entry = Entry::new(Some(text.to_owned()), &analysis, has_image, insight);
        self.bounded(SubmitState::Persisting, self.store.append(entry.clone()))
            .await?;

        flight.enter(SubmitState::Notifying);
        self.notify(EntryChange::Appended, Some(entry.id)).await;
        info!(
            id = %entry.id,
            mood = %entry.mood,
            confidence = entry.confidence,
            has_insight = entry.ai_insight.is_some(),
            "journal entry saved"
        );
        Ok(entry)
    }

    async fn bounded<T, F>(&self, step: SubmitState, fut: F) -> Result<T, WellnessError>
    where
        F: Future<Output = Result<T, WellnessError>>,
    {
        match tokio::time::timeout(self.step_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(WellnessError::Timeout {
                step: step.as_str().to_string(),
                after: self.step_timeout,
            }),
        }
    }

    async fn notify(&self, change: EntryChange, entry_id: Option<Uuid>) {
        let total = self.store.load_all_or_empty().await.entries.len();
        self.bus
            .publish(BusMessage::EntriesChanged {
                change,
                entry_id,
                total,
                at: Utc::now(),
            })
            .await;
    }

    /// Entries for display. Unreadable data shows as empty and is reported
    /// on the bus instead of failing the caller. A storage outage also shows
    /// as empty but is not reported as corruption.
    pub async fn entries(&self) -> LoadOutcome {
        let outcome = self.store.load_all_or_empty().await;
        if let Some(detail) = &outcome.corruption {
            self.bus
                .publish(BusMessage::CorruptionDetected {
                    namespace: self.store.namespace().to_string(),
                    detail: detail.clone(),
                })
                .await;
        }
        outcome
    }

    pub async fn summary(&self) -> MoodSummary {
        MoodSummary::from_entries(&self.entries().await.entries)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, WellnessError> {
        let flight = InFlight::begin(&self.state, SubmitState::Persisting)?;
        let removed = self
            .bounded(SubmitState::Persisting, self.store.delete(id))
            .await?;
        if removed {
            flight.enter(SubmitState::Notifying);
            self.notify(EntryChange::Deleted, Some(id)).await;
            info!(%id, "journal entry deleted");
        }
        Ok(removed)
    }

    pub async fn clear(&self) -> Result<(), WellnessError> {
        let flight = InFlight::begin(&self.state, SubmitState::Persisting)?;
        self.bounded(SubmitState::Persisting, self.store.clear())
            .await?;
        flight.enter(SubmitState::Notifying);
        self.notify(EntryChange::Cleared, None).await;
        info!(namespace = self.store.namespace(), "journal cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moodwell_bus::{EventBus, Topic};
    use async_trait::async_trait;
    use moodwell_memory::{FileKv, KvBackend, KvEntryStore, MemoryKv};
    use moodwell_schema::{EmotionVector, Mood, MoodAnalysis};
    use tempfile::TempDir;

    /// Analyzer that returns scores no real classifier would produce.
    struct NanAnalyzer;

    #[async_trait]
    impl MoodAnalyzer for NanAnalyzer {
        async fn analyze(
            &self,
            _text: &str,
            _has_image: bool,
        ) -> Result<MoodAnalysis, WellnessError> {
            Ok(MoodAnalysis {
                mood: Mood::Confused,
                confidence: f64::NAN,
                emotions: EmotionVector {
                    happiness: f64::NAN,
                    sadness: f64::INFINITY,
                    ..EmotionVector::default()
                },
                matched_keywords: vec![],
            })
        }
    }

    struct OfflineKv;

    #[async_trait]
    impl KvBackend for OfflineKv {
        async fn get_item(&self, _key: &str) -> Result<Option<String>, WellnessError> {
            Err(WellnessError::unavailable("disk offline"))
        }

        async fn set_item(&self, _key: &str, _value: &str) -> Result<(), WellnessError> {
            Err(WellnessError::unavailable("disk offline"))
        }

        async fn remove_item(&self, _key: &str) -> Result<(), WellnessError> {
            Err(WellnessError::unavailable("disk offline"))
        }
    }

    fn controller() -> (SessionController, EventBus) {
        let bus = EventBus::new(16);
        let store: Arc<dyn EntryStore> = Arc::new(KvEntryStore::new(MemoryKv::new()));
        let controller =
            SessionController::new(store, bus.publisher()).with_step_timeout(Duration::from_secs(1));
        (controller, bus)
    }

    #[tokio::test]
    async fn submit_saves_classified_entry_with_insight() {
        let (controller, _bus) = controller();
        let entry = controller
            .submit("I feel anxious and worried about my exam", false)
            .await
            .unwrap();

        assert_eq!(entry.mood, Mood::Anxious);
        assert!(entry.ai_insight.is_some());
        assert_eq!(controller.state(), SubmitState::Idle);
        assert_eq!(controller.entries().await.entries, vec![entry]);
    }

    #[tokio::test]
    async fn empty_text_without_image_is_rejected() {
        let (controller, bus) = controller();
        let mut failures = bus.subscribe(Topic::SubmissionFailed).await;

        let err = controller.submit("", false).await.unwrap_err();
        assert!(matches!(err, WellnessError::Validation(_)));
        assert_eq!(controller.state(), SubmitState::Idle);
        assert!(controller.entries().await.entries.is_empty());
        assert!(matches!(
            failures.try_recv(),
            Ok(BusMessage::SubmissionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn image_only_entry_is_neutral_without_insight() {
        let (controller, _bus) = controller();
        let entry = controller.submit("   ", true).await.unwrap();
        assert_eq!(entry.mood, Mood::Neutral);
        assert!(entry.has_image);
        assert!(entry.text_input.is_none());
        assert!(entry.ai_insight.is_none());
    }

    #[tokio::test]
    async fn delete_and_clear_notify_observers() {
        let (controller, bus) = controller();
        let mut changes = bus.subscribe(Topic::EntriesChanged).await;

        let a = controller.submit("happy", false).await.unwrap();
        controller.submit("sad", false).await.unwrap();
        assert!(controller.delete(a.id).await.unwrap());
        assert!(!controller.delete(a.id).await.unwrap());
        controller.clear().await.unwrap();

        let mut seen = Vec::new();
        while let Ok(BusMessage::EntriesChanged { change, total, .. }) = changes.try_recv() {
            seen.push((change, total));
        }
        assert_eq!(
            seen,
            vec![
                (EntryChange::Appended, 1),
                (EntryChange::Appended, 2),
                (EntryChange::Deleted, 1),
                (EntryChange::Cleared, 0),
            ]
        );
    }

    #[tokio::test]
    async fn summary_reflects_saved_entries() {
        let (controller, _bus) = controller();
        controller.submit("sad and lonely", false).await.unwrap();
        controller.submit("feeling down", false).await.unwrap();
        controller.submit("happy", false).await.unwrap();

        let summary = controller.summary().await;
        assert_eq!(summary.total, 3);
        assert_eq!(summary.dominant, Some(Mood::Sad));
        assert_eq!(summary.with_insight, 3);
    }

    #[tokio::test]
    async fn non_finite_analyzer_scores_do_not_break_saved_history() {
        let tmp = TempDir::new().expect("tempdir");
        let bus = EventBus::new(8);
        let store: Arc<dyn EntryStore> = Arc::new(KvEntryStore::new(FileKv::new(tmp.path())));
        let good = SessionController::new(Arc::clone(&store), bus.publisher())
            .submit("happy today", false)
            .await
            .unwrap();

        let controller =
            SessionController::new(store, bus.publisher()).with_analyzer(Arc::new(NanAnalyzer));
        let odd = controller.submit("hmm", false).await.unwrap();
        assert_eq!(odd.confidence, 0.0);
        assert_eq!(odd.emotions.happiness, 0.0);
        assert_eq!(odd.emotions.sadness, 0.0);

        let reopened = KvEntryStore::new(FileKv::new(tmp.path()));
        let ids: Vec<Uuid> = reopened
            .load_all()
            .await
            .unwrap()
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![good.id, odd.id]);
    }

    #[tokio::test]
    async fn storage_outage_is_not_reported_as_corruption() {
        let bus = EventBus::new(8);
        let mut corruption = bus.subscribe(Topic::CorruptionDetected).await;
        let controller =
            SessionController::new(Arc::new(KvEntryStore::new(OfflineKv)), bus.publisher());

        let outcome = controller.entries().await;
        assert!(outcome.entries.is_empty());
        assert!(!outcome.is_corrupted());
        assert!(outcome.unavailable.is_some());
        assert!(corruption.try_recv().is_err());
    }

    #[test]
    fn state_roundtrips_through_u8() {
        for state in [
            SubmitState::Idle,
            SubmitState::Validating,
            SubmitState::Classifying,
            SubmitState::Generating,
            SubmitState::Persisting,
            SubmitState::Notifying,
        ] {
            assert_eq!(SubmitState::from_u8(state as u8), state);
        }
    }
}
