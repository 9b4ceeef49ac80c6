//! Keyword entity extraction over a fixed medical vocabulary.
//!
//! Deterministic and network-free: each vocabulary keyword found as a whole
//! word anywhere in the input yields exactly one entity, in vocabulary
//! order rather than text order.

use regex::Regex;
use serde::Serialize;

/// Domain keywords, in output order.
const MEDICAL_KEYWORDS: [&str; 11] = [
    "fever",
    "chills",
    "headache",
    "pain",
    "inflammation",
    "antibiotics",
    "treatment",
    "diagnosis",
    "virus",
    "symptoms",
    "jaundice",
];

/// A labeled keyword match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    #[serde(rename = "entity_group")]
    pub group: String,
    pub score: f32,
    pub word: String,
}

pub struct EntityExtractor {
    patterns: Vec<(&'static str, Regex)>,
}

impl EntityExtractor {
    pub fn new() -> Self {
        let patterns = MEDICAL_KEYWORDS
            .iter()
            .map(|kw| {
                let re = Regex::new(&format!(r"(?i)\b{kw}\b"))
                    .expect("keyword patterns are plain ASCII words");
                (*kw, re)
            })
            .collect();
        Self { patterns }
    }

    /// Whole-word, case-insensitive matches against the vocabulary.
    /// Repeated occurrences of a keyword produce a single entity.
    pub fn extract(&self, text: &str) -> Vec<Entity> {
        self.patterns
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(kw, _)| Entity {
                group: "KEYWORD".to_string(),
                score: 1.0,
                word: capitalize(kw),
            })
            .collect()
    }
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
