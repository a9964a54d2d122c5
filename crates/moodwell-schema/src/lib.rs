pub mod error;

pub use error::{ErrorKind, PersistenceError, WellnessError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage key the journal lives under unless a profile overrides it.
pub const DEFAULT_NAMESPACE: &str = "wellness.mood.entries";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mood {
    Happy,
    Calm,
    Excited,
    Sad,
    Anxious,
    Angry,
    Confused,
    Tired,
    Neutral,
}

impl Mood {
    pub const ALL: [Mood; 9] = [
        Mood::Happy,
        Mood::Calm,
        Mood::Excited,
        Mood::Sad,
        Mood::Anxious,
        Mood::Angry,
        Mood::Confused,
        Mood::Tired,
        Mood::Neutral,
    ];

    /// Tie-break order used when two moods match the same number of keywords.
    /// Lower rank wins.
    pub fn priority_rank(self) -> u8 {
        match self {
            Mood::Anxious => 0,
            Mood::Sad => 1,
            Mood::Angry => 2,
            Mood::Happy => 3,
            Mood::Calm => 4,
            Mood::Excited => 5,
            Mood::Tired => 6,
            Mood::Confused => 7,
            Mood::Neutral => 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Happy => "Happy",
            Mood::Calm => "Calm",
            Mood::Excited => "Excited",
            Mood::Sad => "Sad",
            Mood::Anxious => "Anxious",
            Mood::Angry => "Angry",
            Mood::Confused => "Confused",
            Mood::Tired => "Tired",
            Mood::Neutral => "Neutral",
        }
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named emotion intensities, each in `[0, 1]`. They are scored independently
/// and need not sum to 1.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct EmotionVector {
    pub happiness: f64,
    pub sadness: f64,
    pub anxiety: f64,
    pub anger: f64,
}

impl EmotionVector {
    pub fn values(&self) -> [f64; 4] {
        [self.happiness, self.sadness, self.anxiety, self.anger]
    }

    pub fn is_within_unit_range(&self) -> bool {
        self.values().iter().all(|v| in_unit_range(*v))
    }
}

/// Output of mood classification for one piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct MoodAnalysis {
    pub mood: Mood,
    pub confidence: f64,
    pub emotions: EmotionVector,
    /// Distinct keywords that decided `mood`, in keyword-table order.
    pub matched_keywords: Vec<&'static str>,
}

/// One journal/mood record. Entries are never edited in place; a correction
/// is a new entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_input: Option<String>,
    pub mood: Mood,
    pub confidence: f64,
    pub emotions: EmotionVector,
    #[serde(default)]
    pub has_image: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_insight: Option<String>,
}

impl Entry {
    /// Assemble a fresh entry from an analysis. Scores are clamped into `[0, 1]`;
    /// NaN and infinite scores become `0.0`.
    pub fn new(
        text_input: Option<String>,
        analysis: &MoodAnalysis,
        has_image: bool,
        ai_insight: Option<String>,
    ) -> Self {
        let emotions = analysis.emotions;
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            text_input: text_input.filter(|t| !t.trim().is_empty()),
            mood: analysis.mood,
            confidence: unit_score(analysis.confidence),
            emotions: EmotionVector {
                happiness: unit_score(emotions.happiness),
                sadness: unit_score(emotions.sadness),
                anxiety: unit_score(emotions.anxiety),
                anger: unit_score(emotions.anger),
            },
            has_image,
            ai_insight,
        }
    }

    /// Checks the score invariants. Used before writing and when decoding
    /// stored data.
    pub fn check_invariants(&self) -> Result<(), String> {
        if !in_unit_range(self.confidence) {
            return Err(format!(
                "entry {} has confidence {} outside [0, 1]",
                self.id, self.confidence
            ));
        }
        if !self.emotions.is_within_unit_range() {
            return Err(format!("entry {} has emotion values outside [0, 1]", self.id));
        }
        Ok(())
    }
}

fn unit_score(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn in_unit_range(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryChange {
    Appended,
    Deleted,
    Cleared,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BusMessage {
    EntriesChanged {
        change: EntryChange,
        entry_id: Option<Uuid>,
        total: usize,
        at: DateTime<Utc>,
    },
    SubmissionFailed {
        kind: ErrorKind,
        message: String,
    },
    CorruptionDetected {
        namespace: String,
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis() -> MoodAnalysis {
        MoodAnalysis {
            mood: Mood::Sad,
            confidence: 0.8,
            emotions: EmotionVector {
                happiness: 0.0,
                sadness: 0.6,
                anxiety: 0.3,
                anger: 0.0,
            },
            matched_keywords: vec!["sad", "down"],
        }
    }

    #[test]
    fn entry_serializes_with_camel_case_keys() {
        let entry = Entry::new(
            Some("feeling down".into()),
            &analysis(),
            true,
            Some("be gentle".into()),
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["textInput"], "feeling down");
        assert_eq!(value["hasImage"], true);
        assert_eq!(value["aiInsight"], "be gentle");
        assert_eq!(value["mood"], "Sad");
        assert!(value["emotions"]["sadness"].as_f64().is_some());
    }

    #[test]
    fn legacy_entry_without_optional_fields_decodes() {
        let raw = r#"{
            "id": "5b1b6f0e-9a43-4c39-9e3a-2f6b1f1b7a11",
            "timestamp": "2024-03-01T10:00:00Z",
            "mood": "Calm",
            "confidence": 0.7,
            "emotions": {"happiness": 0.3, "sadness": 0.0, "anxiety": 0.0, "anger": 0.0}
        }"#;
        let entry: Entry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.mood, Mood::Calm);
        assert!(!entry.has_image);
        assert!(entry.ai_insight.is_none());
        assert!(entry.text_input.is_none());
    }

    #[test]
    fn new_entry_clamps_scores_and_drops_blank_text() {
        let mut a = analysis();
        a.confidence = 1.4;
        a.emotions.anger = -0.2;
        let entry = Entry::new(Some("   ".into()), &a, false, None);
        assert_eq!(entry.confidence, 1.0);
        assert_eq!(entry.emotions.anger, 0.0);
        assert!(entry.text_input.is_none());
        assert!(entry.check_invariants().is_ok());
    }

    #[test]
    fn new_entry_zeroes_non_finite_scores() {
        let mut a = analysis();
        a.confidence = f64::NAN;
        a.emotions.sadness = f64::INFINITY;
        a.emotions.anxiety = f64::NEG_INFINITY;
        let entry = Entry::new(Some("x".into()), &a, false, None);
        assert_eq!(entry.confidence, 0.0);
        assert_eq!(entry.emotions.sadness, 0.0);
        assert_eq!(entry.emotions.anxiety, 0.0);
        assert!(entry.check_invariants().is_ok());
    }

    #[test]
    fn invariant_check_rejects_nan() {
        let mut entry = Entry::new(None, &analysis(), false, None);
        entry.emotions.happiness = f64::NAN;
        assert!(entry.check_invariants().is_err());
    }

    #[test]
    fn invariant_check_rejects_out_of_range_values() {
        let mut entry = Entry::new(None, &analysis(), false, None);
        entry.confidence = 1.5;
        assert!(entry.check_invariants().is_err());
    }

    #[test]
    fn priority_order_is_total() {
        let mut ranks: Vec<u8> = Mood::ALL.iter().map(|m| m.priority_rank()).collect();
        ranks.sort_unstable();
        ranks.dedup();
        assert_eq!(ranks.len(), Mood::ALL.len());
        assert!(Mood::Anxious.priority_rank() < Mood::Sad.priority_rank());
        assert!(Mood::Sad.priority_rank() < Mood::Angry.priority_rank());
        assert!(Mood::Angry.priority_rank() < Mood::Happy.priority_rank());
        assert!(Mood::Happy.priority_rank() < Mood::Calm.priority_rank());
        assert!(Mood::Calm.priority_rank() < Mood::Neutral.priority_rank());
    }
}
