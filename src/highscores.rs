//! High score leaderboard
//!
//! Tracks the top 10 named scores. Where the JSON ends up (file, browser
//! storage, nowhere) is the host's business.

use serde::{Deserialize, Serialize};

/// Maximum number of high scores to keep
pub const MAX_HIGH_SCORES: usize = 10;

/// A single high score entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighScoreEntry {
    /// Name typed in after the round
    pub name: String,
    /// Pellets collected
    pub score: u32,
}

/// High score leaderboard, sorted by score descending
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HighScores {
    entries: Vec<HighScoreEntry>,
}

impl HighScores {
    /// Create empty leaderboard
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[HighScoreEntry] {
        &self.entries
    }

    /// Check if a score qualifies for the leaderboard
    pub fn qualifies(&self, score: u32) -> bool {
        if self.entries.len() < MAX_HIGH_SCORES {
            return true;
        }
        // Check if score beats the lowest entry
        self.entries.last().map(|e| score > e.score).unwrap_or(true)
    }

    /// Get the rank a score would achieve (1-indexed, None if doesn't qualify)
    pub fn potential_rank(&self, score: u32) -> Option<usize> {
        if !self.qualifies(score) {
            return None;
        }
        let rank = self.entries.iter().position(|e| score > e.score);
        Some(rank.unwrap_or(self.entries.len()) + 1)
    }

    /// Add a new score to the leaderboard (if it qualifies)
    /// Returns the rank achieved (1-indexed) or None if didn't qualify
    pub fn add(&mut self, name: impl Into<String>, score: u32) -> Option<usize> {
        let rank = self.potential_rank(score)?;
        let name = name.into();
        log::info!("High score #{rank}: {name} - {score}");

        self.entries.insert(rank - 1, HighScoreEntry { name, score });
        self.entries.truncate(MAX_HIGH_SCORES);
        Some(rank)
    }

    /// Check if the leaderboard is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the top score (if any)
    pub fn top_score(&self) -> Option<u32> {
        self.entries.first().map(|e| e.score)
    }

    /// Parse a saved leaderboard, re-sorting and trimming it to be safe
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut scores: HighScores = serde_json::from_str(json)?;
        scores.entries.sort_by(|a, b| b.score.cmp(&a.score));
        scores.entries.truncate(MAX_HIGH_SCORES);
        log::debug!("Loaded {} high scores", scores.entries.len());
        Ok(scores)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inserts_sorted_descending() {
        let mut scores = HighScores::new();
        assert_eq!(scores.add("a", 5), Some(1));
        assert_eq!(scores.add("b", 9), Some(1));
        assert_eq!(scores.add("c", 7), Some(2));
        let order: Vec<u32> = scores.entries().iter().map(|e| e.score).collect();
        assert_eq!(order, vec![9, 7, 5]);
        assert_eq!(scores.top_score(), Some(9));
    }

    #[test]
    fn test_capped_at_ten_entries() {
        let mut scores = HighScores::new();
        for score in 0..15 {
            scores.add(format!("p{score}"), score);
        }
        assert_eq!(scores.entries().len(), MAX_HIGH_SCORES);
        assert_eq!(scores.entries().last().map(|e| e.score), Some(5));
    }

    #[test]
    fn test_full_board_rejects_lower_score() {
        let mut scores = HighScores::new();
        for _ in 0..MAX_HIGH_SCORES {
            scores.add("x", 10);
        }
        assert!(!scores.qualifies(9));
        assert!(!scores.qualifies(10));
        assert_eq!(scores.add("late", 9), None);
        assert_eq!(scores.add("better", 11), Some(1));
        assert_eq!(scores.entries().len(), MAX_HIGH_SCORES);
    }

    #[test]
    fn test_json_load_resorts() {
        let json = r#"{"entries":[{"name":"a","score":1},{"name":"b","score":3}]}"#;
        let scores = HighScores::from_json(json).unwrap();
        assert_eq!(scores.top_score(), Some(3));
        let back = HighScores::from_json(&scores.to_json().unwrap()).unwrap();
        assert_eq!(back.entries(), scores.entries());
    }
}
