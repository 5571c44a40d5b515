//! Record extraction from rendered ranking pages
//!
//! The ranking rows use minified, frequently changing class names, so each
//! candidate row is reduced to its flattened text (e.g. `1#musicMusic12KPosts`)
//! and fields are recovered with ordered regex heuristics. The first pattern
//! that yields a valid value wins.

#![allow(clippy::uninlined_format_args)]

use regex::Regex;
use tracing::{debug, info};

use crate::domain::constants::extraction::{MIN_HASHTAG_BODY_LEN, POSTS_TOKEN};
use crate::domain::{CategoryTable, EngagementScorer, HashtagRecord, SeenHashtags, SentimentAnalyzer};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::parsing::{HtmlDocument, ParsingError, ParsingResult, SelectorChain};

const RANK_PATTERN: &str = r"^(\d+)";

/// Rank-anchored variants first, then bare `#` variants. Each variant ends
/// the lazy body before a capitalised word, a digit, any capital, or the end
/// of the alphabetic run.
const HASHTAG_PATTERNS: &[&str] = &[
    r"\d+#\s*([a-zA-Z]+?)[A-Z][a-z]",
    r"\d+#\s*([a-zA-Z]+?)\d",
    r"\d+#\s*([a-zA-Z]+?)[A-Z]",
    r"\d+#\s*([a-zA-Z]+)",
    r"#\s*([a-zA-Z]+?)[A-Z][a-z]",
    r"#\s*([a-zA-Z]+?)\d",
    r"#\s*([a-zA-Z]+?)[A-Z]",
    r"#\s*([a-zA-Z]+)",
];

/// Number with a magnitude suffix, then a bare number
const POSTS_PATTERNS: &[&str] = &[r"(\d+(?:\.\d+)?)\s*([KMB])\s*Posts", r"(\d+(?:\.\d+)?)\s*Posts"];

fn compile(pattern: &str) -> ParsingResult<Regex> {
    Regex::new(pattern).map_err(|e| ParsingError::invalid_pattern(pattern, e))
}

pub struct RecordExtractor {
    items: SelectorChain,
    rank_pattern: Regex,
    hashtag_patterns: Vec<Regex>,
    posts_patterns: Vec<Regex>,
    blocklist: Vec<String>,
    categories: CategoryTable,
    scorer: EngagementScorer,
    sentiment: Box<dyn SentimentAnalyzer>,
}

impl RecordExtractor {
    pub fn new<S: AsRef<str>>(
        item_selectors: &[S],
        blocklist: &[S],
        categories: CategoryTable,
        scorer: EngagementScorer,
        sentiment: Box<dyn SentimentAnalyzer>,
    ) -> ParsingResult<Self> {
        Ok(Self {
            items: SelectorChain::compile(item_selectors)?,
            rank_pattern: compile(RANK_PATTERN)?,
            hashtag_patterns: HASHTAG_PATTERNS.iter().map(|p| compile(p)).collect::<ParsingResult<_>>()?,
            posts_patterns: POSTS_PATTERNS.iter().map(|p| compile(p)).collect::<ParsingResult<_>>()?,
            blocklist: blocklist
                .iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            categories,
            scorer,
            sentiment,
        })
    }

    pub fn from_config(config: &AppConfig) -> ParsingResult<Self> {
        Self::new(
            &config.selectors.hashtag_item,
            &config.extraction.song_blocklist,
            config.extraction.categories.clone(),
            EngagementScorer::new(config.extraction.scoring_policy),
            config.extraction.sentiment.analyzer(),
        )
    }

    /// Number of candidate rows the item chain finds in `html`
    pub fn candidate_count(&self, html: &str) -> usize {
        HtmlDocument::parse(html).count(&self.items)
    }

    /// Extract deduplicated records from a rendered page.
    ///
    /// Rows that yield no valid hashtag are skipped; hashtags already in
    /// `seen` are dropped so the first occurrence wins.
    pub fn extract(&self, html: &str, seen: &mut SeenHashtags) -> Vec<HashtagRecord> {
        let document = HtmlDocument::parse(html);
        let rows: Vec<String> = document
            .select_first(&self.items)
            .iter()
            .map(HtmlDocument::flattened_text)
            .collect();

        let mut records = Vec::new();
        let mut skipped = 0usize;
        let mut duplicates = 0usize;

        for text in &rows {
            match self.extract_from_text(text) {
                Ok(record) => {
                    if seen.insert(&record.hashtag) {
                        records.push(record);
                    } else {
                        duplicates += 1;
                    }
                }
                Err(e) => {
                    debug!("Skipping row '{}': {}", text, e);
                    skipped += 1;
                }
            }
        }

        info!(
            "🔎 Extracted {} hashtags from {} rows ({} skipped, {} duplicates)",
            records.len(),
            rows.len(),
            skipped,
            duplicates
        );
        records
    }

    /// Build a record from one row's flattened text
    pub fn extract_from_text(&self, text: &str) -> ParsingResult<HashtagRecord> {
        let text = text.trim();
        let hashtag = self
            .find_hashtag(text)
            .ok_or_else(|| ParsingError::field_missing("hashtag"))?;

        let rank = self
            .rank_pattern
            .captures(text)
            .and_then(|c| c[1].parse::<u32>().ok())
            .filter(|r| *r > 0);
        let posts = self.find_posts(text);
        let category = self.categories.classify(&hashtag).to_string();
        let engagement_score = self.scorer.score(&hashtag, posts.as_deref(), &category, text);
        let sentiment = self.sentiment.analyze(&hashtag, text);

        Ok(HashtagRecord {
            rank,
            hashtag,
            posts,
            views: None,
            category,
            engagement_score,
            sentiment_polarity: sentiment.polarity,
            sentiment_label: sentiment.label,
        })
    }

    fn find_hashtag(&self, text: &str) -> Option<String> {
        self.hashtag_patterns
            .iter()
            .filter_map(|pattern| pattern.captures(text))
            .map(|captures| captures[1].to_string())
            .find(|body| self.is_valid_body(body))
            .map(|body| format!("#{}", body.to_lowercase()))
    }

    fn is_valid_body(&self, body: &str) -> bool {
        if body.len() < MIN_HASHTAG_BODY_LEN || !body.chars().all(|c| c.is_ascii_alphabetic()) {
            return false;
        }
        let lowered = body.to_lowercase();
        !self.blocklist.iter().any(|fragment| lowered.contains(fragment.as_str()))
    }

    fn find_posts(&self, text: &str) -> Option<String> {
        if !text.contains(POSTS_TOKEN) {
            return None;
        }
        self.posts_patterns.iter().find_map(|pattern| {
            pattern.captures(text).map(|c| {
                let number = &c[1];
                let suffix = c.get(2).map_or("", |m| m.as_str());
                format!("{}{}", number, suffix)
            })
        })
    }
}
