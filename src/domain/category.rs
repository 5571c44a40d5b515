//! Keyword-containment category table
//!
//! Categories are tested in table order; the first category whose keyword
//! list has a substring hit in the lowercased hashtag body wins.

use serde::{Deserialize, Serialize};

use super::constants::extraction::DEFAULT_CATEGORY;

/// One category with its trigger keywords
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    pub keywords: Vec<String>,
}

impl CategoryRule {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
        }
    }

    fn matches(&self, body: &str) -> bool {
        self.keywords.iter().any(|keyword| body.contains(keyword.as_str()))
    }
}

/// Ordered category → keyword table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryTable {
    rules: Vec<CategoryRule>,
}

impl CategoryTable {
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    /// Classify a hashtag (with or without the leading `#`)
    pub fn classify(&self, hashtag: &str) -> &str {
        let body = hashtag.trim_start_matches('#').to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&body))
            .map_or(DEFAULT_CATEGORY, |rule| rule.name.as_str())
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::new(vec![
            CategoryRule::new(
                "Education",
                &[
                    "learning", "education", "study", "school", "college", "university", "teacher",
                    "student", "lesson", "tutorial", "knowledge", "academic", "homework", "exam",
                    "language", "math", "science", "history", "geography", "literature", "physics",
                    "chemistry", "biology", "english", "spanish", "french", "german", "chinese",
                    "japanese", "korean", "programming", "coding", "computer", "technology",
                ],
            ),
            CategoryRule::new(
                "Entertainment",
                &[
                    "entertainment", "movie", "film", "cinema", "tv", "show", "series", "netflix",
                    "disney", "marvel", "anime", "cartoon", "celebrity", "actor", "actress",
                    "meme", "viral", "trending", "festival", "party",
                ],
            ),
            CategoryRule::new(
                "Comedy",
                &["comedy", "funny", "humor", "joke", "prank", "laugh", "fun"],
            ),
            CategoryRule::new(
                "Dance",
                &["dance", "dancing", "dancer", "choreo", "twerk", "ballet"],
            ),
            CategoryRule::new(
                "Music",
                &[
                    "music", "song", "sing", "singer", "musician", "band", "album", "concert",
                    "dj", "beat", "rhythm", "melody", "guitar", "piano", "drums", "violin",
                    "instrument", "audio", "sound", "spotify", "playlist", "cover", "remix", "rap",
                    "hiphop", "rock", "pop",
                ],
            ),
            CategoryRule::new(
                "Sports & Fitness",
                &[
                    "sports", "fitness", "gym", "workout", "exercise", "training", "health",
                    "football", "soccer", "basketball", "tennis", "baseball", "hockey", "golf",
                    "swimming", "running", "cycling", "yoga", "pilates", "crossfit",
                    "bodybuilding", "skate", "skating", "skateboard",
                ],
            ),
            CategoryRule::new(
                "Food & Cooking",
                &[
                    "food", "cooking", "recipe", "kitchen", "chef", "baking", "foodie", "dinner",
                    "lunch", "breakfast", "dessert", "snack", "vegan", "pasta", "pizza", "coffee",
                ],
            ),
            CategoryRule::new(
                "Fashion & Beauty",
                &[
                    "fashion", "beauty", "makeup", "skincare", "outfit", "style", "ootd", "hair",
                    "nails", "cosmetic", "grwm",
                ],
            ),
            CategoryRule::new(
                "Travel",
                &[
                    "travel", "trip", "vacation", "holiday", "tourism", "adventure", "explore",
                    "wanderlust", "backpacking", "journey", "destination",
                ],
            ),
            CategoryRule::new(
                "News & Entertainment",
                &[
                    "news", "politics", "current", "events", "breaking", "update", "report",
                    "journalism", "media", "press", "government", "election", "vote", "democracy",
                ],
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_matching_category_wins() {
        let table = CategoryTable::default();
        assert_eq!(table.classify("#music"), "Music");
        assert_eq!(table.classify("#cooking"), "Food & Cooking");
        assert_eq!(table.classify("#gymtok"), "Sports & Fitness");
        // "viral" sits in Entertainment, which precedes every other hit
        assert_eq!(table.classify("#viraldance"), "Entertainment");
    }

    #[test]
    fn test_case_and_marker_are_ignored() {
        let table = CategoryTable::default();
        assert_eq!(table.classify("#MUSIC"), "Music");
        assert_eq!(table.classify("music"), "Music");
    }

    #[test]
    fn test_default_category_when_nothing_matches() {
        let table = CategoryTable::default();
        assert_eq!(table.classify("#zzzqqq"), DEFAULT_CATEGORY);
        assert_eq!(CategoryTable::new(vec![]).classify("#music"), DEFAULT_CATEGORY);
    }
}
