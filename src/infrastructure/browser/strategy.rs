//! Selector strategy strings
//!
//! Configured selector chains mix plain CSS with text-based strategies:
//! `text=Label`, `text=/pattern/flags` and `css:has-text('Label')`.
//! Text strategies are resolved in page JS, which tags the matches with a
//! marker attribute that plain CSS can then pick up.

use serde_json::json;

/// Attribute used to tag elements found by text strategies
pub const MATCH_ATTRIBUTE: &str = "data-hs-match";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorStrategy {
    Css(String),
    /// Case-insensitive substring of the element text
    Text(String),
    /// JS regular expression tested against the element text
    TextPattern { pattern: String, flags: String },
    /// CSS base selector filtered by case-insensitive text
    HasText { base: String, text: String },
}

impl SelectorStrategy {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        if let Some(label) = raw.strip_prefix("text=") {
            if let Some(body) = label.strip_prefix('/') {
                if let Some(end) = body.rfind('/') {
                    return Self::TextPattern {
                        pattern: body[..end].to_string(),
                        flags: body[end + 1..].to_string(),
                    };
                }
            }
            return Self::Text(unquote(label).to_string());
        }

        if let Some(pos) = raw.find(":has-text(") {
            let base = &raw[..pos];
            let rest = &raw[pos + ":has-text(".len()..];
            if let Some(inner) = rest.strip_suffix(')') {
                let base = if base.is_empty() { "*" } else { base };
                return Self::HasText {
                    base: base.to_string(),
                    text: unquote(inner.trim()).to_string(),
                };
            }
        }

        Self::Css(raw.to_string())
    }

    /// Script tagging matching elements with `marker`; evaluates to the match count.
    ///
    /// Text matches prefer the deepest element so a label's container is not
    /// picked over the label itself.
    pub fn marking_script(&self, marker: &str, first_only: bool) -> String {
        let (base, test) = match self {
            Self::Css(css) => (css.clone(), "true".to_string()),
            Self::Text(text) => (
                "body *".to_string(),
                format!("txt(el).toLowerCase().includes({})", json!(text.to_lowercase())),
            ),
            Self::TextPattern { pattern, flags } => (
                "body *".to_string(),
                format!("new RegExp({}, {}).test(txt(el))", json!(pattern), json!(flags)),
            ),
            Self::HasText { base, text } => (
                base.clone(),
                format!("txt(el).toLowerCase().includes({})", json!(text.to_lowercase())),
            ),
        };
        let deepest = !matches!(self, Self::Css(_) | Self::HasText { .. });

        format!(
            r"(() => {{
                const txt = (el) => (el.innerText || el.textContent || '').trim();
                const test = (el) => {test};
                document.querySelectorAll('[{attr}]').forEach(el => el.removeAttribute('{attr}'));
                let found = Array.from(document.querySelectorAll({base})).filter(test);
                if ({deepest}) {{
                    found = found.filter(el => !Array.from(el.children).some(test));
                }}
                if ({first_only}) {{ found = found.slice(0, 1); }}
                found.forEach(el => el.setAttribute('{attr}', {marker}));
                return found.length;
            }})()",
            attr = MATCH_ATTRIBUTE,
            base = json!(base),
            marker = json!(marker),
        )
    }

    /// CSS selector matching the elements tagged by [`Self::marking_script`]
    pub fn marked_selector(marker: &str) -> String {
        format!("[{MATCH_ATTRIBUTE}={}]", json!(marker))
    }
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    for quote in ['\'', '"'] {
        if let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote)) {
            return inner;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("text=Hashtags", SelectorStrategy::Text("Hashtags".into()))]
    #[case(
        "text=/view more/i",
        SelectorStrategy::TextPattern { pattern: "view more".into(), flags: "i".into() }
    )]
    #[case(
        "button:has-text('View more')",
        SelectorStrategy::HasText { base: "button".into(), text: "View more".into() }
    )]
    #[case(
        "[role='tab']:has-text(\"Hashtag\")",
        SelectorStrategy::HasText { base: "[role='tab']".into(), text: "Hashtag".into() }
    )]
    #[case("[data-e2e='hashtag-tab']", SelectorStrategy::Css("[data-e2e='hashtag-tab']".into()))]
    #[case(".view-more-btn", SelectorStrategy::Css(".view-more-btn".into()))]
    fn parses_strategy_strings(#[case] raw: &str, #[case] expected: SelectorStrategy) {
        assert_eq!(SelectorStrategy::parse(raw), expected);
    }

    #[test]
    fn test_marking_script_embeds_escaped_values() {
        let script = SelectorStrategy::Text("Say \"hi\"".into()).marking_script("m1", true);
        assert!(script.contains(r#""say \"hi\"""#));
        assert!(script.contains(MATCH_ATTRIBUTE));
        assert!(script.contains("if (true)"));
    }

    #[test]
    fn test_marked_selector() {
        assert_eq!(SelectorStrategy::marked_selector("m1"), "[data-hs-match=\"m1\"]");
    }
}
