use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use moodwell_schema::WellnessError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

const REFLECTIONS: &[&str] = &[
    "Writing this down is already a step toward understanding how you feel.",
    "Notice what stood out to you today; it often points to what matters most.",
    "Be as kind to yourself as you would be to a friend in the same place.",
    "Feelings shift over time. Checking in regularly helps you see the pattern.",
    "Think of one small thing you could do in the next hour to look after yourself.",
    "Naming an emotion tends to make it easier to hold.",
    "You are paying attention to yourself, and that counts for a lot.",
    "A few slow breaths before your next task can help you carry this more lightly.",
    "Some days are heavier than others. This entry is a record, not a verdict.",
    "What would you like tomorrow's entry to say? Small steps get you there.",
];

/// Produces a short supportive reflection for a journal entry.
#[async_trait]
pub trait InsightGenerator: Send + Sync {
    async fn generate(&self, text: &str) -> Result<String, WellnessError>;
}

/// Picks a reflection uniformly at random from a curated list.
pub struct TemplateInsightGenerator {
    templates: Vec<String>,
    rng: Mutex<StdRng>,
}

impl TemplateInsightGenerator {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible selection, for tests and demos.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            templates: REFLECTIONS.iter().map(|s| (*s).to_owned()).collect(),
            rng: Mutex::new(rng),
        }
    }

    pub fn templates(&self) -> &[String] {
        &self.templates
    }
}

impl Default for TemplateInsightGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InsightGenerator for TemplateInsightGenerator {
    async fn generate(&self, text: &str) -> Result<String, WellnessError> {
        if text.trim().is_empty() {
            return Err(WellnessError::Validation(
                "an insight needs some journal text".into(),
            ));
        }
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| WellnessError::Insight("insight rng lock poisoned".into()))?;
        self.templates
            .choose(&mut *rng)
            .cloned()
            .ok_or_else(|| WellnessError::Insight("no reflections configured".into()))
    }
}

/// Waits before delegating, standing in for a remote insight service.
pub struct DelayedInsightGenerator<G> {
    inner: G,
    delay: Duration,
}

impl<G: InsightGenerator> DelayedInsightGenerator<G> {
    pub fn new(inner: G, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl<G: InsightGenerator> InsightGenerator for DelayedInsightGenerator<G> {
    async fn generate(&self, text: &str) -> Result<String, WellnessError> {
        tokio::time::sleep(self.delay).await;
        self.inner.generate(text).await
    }
}
