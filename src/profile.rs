use crate::types::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fixed reader-interest profile used as ranking context.
/// Read-only for the pipeline; loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub title: String,
    pub background: String,
    pub interests: Vec<String>,
    pub preferences: ContentPreferences,
    pub expertise_level: String,
}

/// Boolean content preferences the curation prompt surfaces to the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentPreferences {
    #[serde(default)]
    pub prefer_exam_relevant: bool,
    #[serde(default)]
    pub prefer_analytical_content: bool,
    #[serde(default)]
    pub prefer_factual_news: bool,
    #[serde(default)]
    pub prefer_editorial_analysis: bool,
    #[serde(default)]
    pub avoid_entertainment_news: bool,
    #[serde(default)]
    pub avoid_sports_news: bool,
}

impl UserProfile {
    /// Load a profile from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Render the preference flags as prompt-ready statements.
    pub fn preference_lines(&self) -> Vec<String> {
        let p = &self.preferences;
        let mut lines = Vec::new();
        if p.prefer_exam_relevant {
            lines.push("Prefers exam-relevant content".to_string());
        }
        if p.prefer_analytical_content {
            lines.push("Prefers analytical content".to_string());
        }
        if p.prefer_factual_news {
            lines.push("Prefers factual news".to_string());
        }
        if p.prefer_editorial_analysis {
            lines.push("Prefers editorial analysis".to_string());
        }
        if p.avoid_entertainment_news {
            lines.push("Avoids entertainment news".to_string());
        }
        if p.avoid_sports_news {
            lines.push("Avoids sports news".to_string());
        }
        lines
    }
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: "Shankar".to_string(),
            title: "UPSC Aspirant".to_string(),
            background: "UPSC Civil Services aspirant focused on current affairs, \
                         government policies, and exam-relevant topics"
                .to_string(),
            interests: vec![
                "National and international current affairs".to_string(),
                "Government policies and schemes".to_string(),
                "Economic developments and budget updates".to_string(),
                "Science and technology updates".to_string(),
                "Editorial analysis and opinion pieces".to_string(),
            ],
            preferences: ContentPreferences {
                prefer_exam_relevant: true,
                prefer_analytical_content: true,
                prefer_factual_news: true,
                prefer_editorial_analysis: true,
                avoid_entertainment_news: true,
                avoid_sports_news: true,
            },
            expertise_level: "Intermediate".to_string(),
        }
    }
}
