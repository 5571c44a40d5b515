//! Site characteristics and domain constants
//!
//! Fixed facts about the hashtag ranking page and the scoring model.
//! Tunable values live in `infrastructure::config::defaults` instead.

/// Ranking site characteristics
pub mod site {
    /// Platform tag written to every persisted row
    pub const PLATFORM: &str = "TikTok";

    /// Source page recorded when an outcome carries no loaded URL
    pub const SOURCE_URL: &str =
        "https://ads.tiktok.com/business/creativecenter/inspiration/popular/hashtag/pc/en";

    /// Ranking page URL templates, tried in rotation (`{region}` placeholder)
    pub const TARGET_URL_TEMPLATES: &[&str] = &[
        "https://ads.tiktok.com/business/creativecenter/inspiration/popular/hashtag/pc/{region}",
        "https://www.tiktok.com/business/en/inspiration/popular/hashtag/pc/{region}",
    ];

    /// Marker that signals hashtag content made it into the rendered page
    pub const HASHTAG_CONTENT_MARKER: &str = "hashtag";
}

/// Record extraction constants
pub mod extraction {
    /// Category assigned when no keyword matches
    pub const DEFAULT_CATEGORY: &str = "General";

    /// Minimum length of a hashtag body (without `#`)
    pub const MIN_HASHTAG_BODY_LEN: usize = 3;

    /// Literal token that follows a post count in the ranking rows
    pub const POSTS_TOKEN: &str = "Posts";
}

/// Engagement scoring constants
pub mod scoring {
    /// Neutral starting point (and fallback) for every score
    pub const BASE_SCORE: f64 = 5.0;

    pub const MIN_SCORE: f64 = 1.0;
    pub const MAX_SCORE: f64 = 10.0;

    /// Keywords that earn a one-time bonus when found in the hashtag body
    pub const TRENDING_KEYWORDS: &[&str] = &[
        "viral", "trending", "challenge", "fyp", "foryou", "dance", "funny",
    ];

    pub const HIGH_ENGAGEMENT_CATEGORIES: &[&str] = &["Entertainment", "Music", "Dance", "Comedy"];

    pub const MEDIUM_ENGAGEMENT_CATEGORIES: &[&str] =
        &["Sports & Fitness", "Food & Cooking", "Fashion & Beauty"];

    /// Hashtags at or below this length (including `#`) get the short bonus
    pub const SHORT_HASHTAG_LEN: usize = 10;
}
