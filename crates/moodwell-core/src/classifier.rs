//! Keyword-based mood classification.
//!
//! The classifier is a pure function of its input: the same text always
//! produces the same mood, confidence and emotion vector.

use std::collections::HashSet;

use async_trait::async_trait;
use moodwell_schema::{EmotionVector, Mood, MoodAnalysis, WellnessError};

pub const NEUTRAL_CONFIDENCE: f64 = 0.6;
pub const MAX_CONFIDENCE: f64 = 0.95;
const CONFIDENCE_BASE: f64 = 0.5;
const CONFIDENCE_PER_KEYWORD: f64 = 0.15;
const EMOTION_PER_KEYWORD: f64 = 0.3;

const HAPPY: &[&str] = &[
    "happy", "joy", "joyful", "glad", "grateful", "thankful", "cheerful", "delighted", "wonderful",
    "great", "love", "smile", "smiling", "awesome",
];
const CALM: &[&str] = &[
    "calm", "peaceful", "relaxed", "serene", "content", "tranquil", "rested", "centered",
    "balanced", "grounded",
];
const EXCITED: &[&str] = &[
    "excited", "thrilled", "eager", "ecstatic", "energized", "enthusiastic", "pumped", "hyped",
];
const SAD: &[&str] = &[
    "sad", "down", "unhappy", "depressed", "lonely", "cry", "crying", "upset", "miserable",
    "heartbroken", "hopeless", "grief", "blue",
];
const ANXIOUS: &[&str] = &[
    "anxious", "worried", "worry", "nervous", "stress", "stressed", "panic", "afraid", "scared",
    "overwhelmed", "tense", "uneasy", "anxiety",
];
const ANGRY: &[&str] = &[
    "angry", "mad", "furious", "frustrated", "annoyed", "irritated", "rage", "hate", "resentful",
];
const CONFUSED: &[&str] = &[
    "confused", "lost", "unsure", "uncertain", "puzzled", "torn", "conflicted",
];
const TIRED: &[&str] = &[
    "tired", "exhausted", "sleepy", "drained", "fatigued", "weary", "burnt", "burned",
];

/// Keyword sets in tie-break priority order.
const MOOD_KEYWORDS: &[(Mood, &[&str])] = &[
    (Mood::Anxious, ANXIOUS),
    (Mood::Sad, SAD),
    (Mood::Angry, ANGRY),
    (Mood::Happy, HAPPY),
    (Mood::Calm, CALM),
    (Mood::Excited, EXCITED),
    (Mood::Tired, TIRED),
    (Mood::Confused, CONFUSED),
];

/// Anything able to turn journal text into a mood reading.
#[async_trait]
pub trait MoodAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str, has_image: bool) -> Result<MoodAnalysis, WellnessError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MoodClassifier;

impl MoodClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classifies `text`. Empty text is only accepted when an image was
    /// captured alongside it, and then reads as neutral.
    pub fn classify(&self, text: &str, has_image: bool) -> Result<MoodAnalysis, WellnessError> {
        if text.trim().is_empty() {
            if !has_image {
                return Err(WellnessError::Validation(
                    "write something or attach an image before saving".into(),
                ));
            }
            return Ok(neutral());
        }

        let lowered = text.to_lowercase();
        let tokens = tokenize(&lowered);

        let mut best: Option<(Mood, Vec<&'static str>)> = None;
        for (mood, keywords) in MOOD_KEYWORDS {
            let matched = matching(keywords, &tokens);
            if matched.is_empty() {
                continue;
            }
            // strictly greater keeps the earlier (higher priority) mood on ties
            let better = best
                .as_ref()
                .map_or(true, |(_, current)| matched.len() > current.len());
            if better {
                best = Some((*mood, matched));
            }
        }

        let emotions = emotion_vector(&tokens);
        Ok(match best {
            Some((mood, matched_keywords)) => MoodAnalysis {
                mood,
                confidence: confidence_for(matched_keywords.len()),
                emotions,
                matched_keywords,
            },
            None => MoodAnalysis {
                emotions,
                ..neutral()
            },
        })
    }
}

#[async_trait]
impl MoodAnalyzer for MoodClassifier {
    async fn analyze(&self, text: &str, has_image: bool) -> Result<MoodAnalysis, WellnessError> {
        self.classify(text, has_image)
    }
}

fn neutral() -> MoodAnalysis {
    MoodAnalysis {
        mood: Mood::Neutral,
        confidence: NEUTRAL_CONFIDENCE,
        emotions: EmotionVector::default(),
        matched_keywords: Vec::new(),
    }
}

/// Splits on anything that is not a letter, digit or apostrophe.
fn tokenize(lowered: &str) -> HashSet<&str> {
    lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|t| !t.is_empty())
        .collect()
}

fn matching(keywords: &[&'static str], tokens: &HashSet<&str>) -> Vec<&'static str> {
    keywords
        .iter()
        .copied()
        .filter(|kw| tokens.contains(kw))
        .collect()
}

fn confidence_for(matches: usize) -> f64 {
    (CONFIDENCE_BASE + CONFIDENCE_PER_KEYWORD * matches as f64).min(MAX_CONFIDENCE)
}

fn intensity(keywords: &[&[&'static str]], tokens: &HashSet<&str>) -> f64 {
    let hits: usize = keywords.iter().map(|set| matching(set, tokens).len()).sum();
    (EMOTION_PER_KEYWORD * hits as f64).min(1.0)
}

fn emotion_vector(tokens: &HashSet<&str>) -> EmotionVector {
    EmotionVector {
        happiness: intensity(&[HAPPY, EXCITED], tokens),
        sadness: intensity(&[SAD], tokens),
        anxiety: intensity(&[ANXIOUS], tokens),
        anger: intensity(&[ANGRY], tokens),
    }
}
