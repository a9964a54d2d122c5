use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use moodwell_schema::{EmotionVector, Entry, Mood};
use serde::Serialize;

/// Dashboard read model over a journal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodSummary {
    pub total: usize,
    pub counts: BTreeMap<Mood, usize>,
    pub dominant: Option<Mood>,
    pub mean_confidence: f64,
    pub mean_emotions: EmotionVector,
    pub with_image: usize,
    pub with_insight: usize,
    pub latest: Option<DateTime<Utc>>,
}

impl MoodSummary {
    pub fn from_entries(entries: &[Entry]) -> Self {
        let total = entries.len();
        let mut counts: BTreeMap<Mood, usize> = BTreeMap::new();
        let mut confidence_sum = 0.0;
        let mut emotion_sum = [0.0_f64; 4];

        for entry in entries {
            *counts.entry(entry.mood).or_default() += 1;
            confidence_sum += entry.confidence;
            for (sum, value) in emotion_sum.iter_mut().zip(entry.emotions.values()) {
                *sum += value;
            }
        }

        // highest count, ties go to the higher-priority mood
        let dominant = counts
            .iter()
            .max_by(|(ma, ca), (mb, cb)| {
                ca.cmp(cb)
                    .then_with(|| mb.priority_rank().cmp(&ma.priority_rank()))
            })
            .map(|(mood, _)| *mood);

        let mean = |sum: f64| if total == 0 { 0.0 } else { sum / total as f64 };

        Self {
            total,
            dominant,
            mean_confidence: mean(confidence_sum),
            mean_emotions: EmotionVector {
                happiness: mean(emotion_sum[0]),
                sadness: mean(emotion_sum[1]),
                anxiety: mean(emotion_sum[2]),
                anger: mean(emotion_sum[3]),
            },
            with_image: entries.iter().filter(|e| e.has_image).count(),
            with_insight: entries.iter().filter(|e| e.ai_insight.is_some()).count(),
            latest: entries.iter().map(|e| e.timestamp).max(),
            counts,
        }
    }

    pub fn count(&self, mood: Mood) -> usize {
        self.counts.get(&mood).copied().unwrap_or(0)
    }
}
