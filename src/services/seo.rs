//! SEO scoring
//!
//! Five pass/fail checks on an article draft; the score is the share of
//! checks passed, as a percentage.

use crate::models::Article;
use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Minimum body length, in words
pub const MIN_WORD_COUNT: usize = 300;

/// Accepted meta description length, in characters
pub const META_DESCRIPTION_RANGE: std::ops::RangeInclusive<usize> = 50..=160;

static NON_TEXT_BLOCKS: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>|<!--.*?-->"));

static TAGS: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>"));

static ENTITIES: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(r"&[a-zA-Z]+;|&#[0-9]+;"));

fn pattern(lazy: &'static Lazy<Result<Regex, regex::Error>>) -> Result<&'static Regex> {
    lazy.as_ref().map_err(|e| anyhow!("Invalid SEO pattern: {}", e))
}

/// Draft to score
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeoInput {
    pub title: String,
    #[serde(default)]
    pub meta_description: String,
    /// HTML body
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub focus_keyword: Option<String>,
}

impl From<&Article> for SeoInput {
    fn from(article: &Article) -> Self {
        Self {
            title: article.title.clone(),
            meta_description: article.summary.clone(),
            content: article.content.clone(),
            focus_keyword: article.focus_keyword.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoCheck {
    pub name: String,
    pub passed: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoReport {
    /// 0 to 100
    pub score: u32,
    pub word_count: usize,
    pub checks: Vec<SeoCheck>,
}

impl SeoReport {
    pub fn passed(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }
}

/// Reduce HTML to its visible text.
pub fn strip_html(html: &str) -> Result<String> {
    let text = pattern(&NON_TEXT_BLOCKS)?.replace_all(html, " ");
    let text = pattern(&TAGS)?.replace_all(&text, " ");
    let text = pattern(&ENTITIES)?.replace_all(&text, " ");
    Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn check(name: &str, passed: bool, message: String) -> SeoCheck {
    SeoCheck {
        name: name.to_string(),
        passed,
        message,
    }
}

fn keyword_check(name: &str, place: &str, keyword: Option<&str>, haystack: &str) -> SeoCheck {
    match keyword {
        None => check(name, false, "No focus keyword set".to_string()),
        Some(keyword) => {
            let found = haystack.to_lowercase().contains(&keyword.to_lowercase());
            let message = if found {
                format!("Focus keyword appears in the {}", place)
            } else {
                format!("Focus keyword \"{}\" is missing from the {}", keyword, place)
            };
            check(name, found, message)
        }
    }
}

/// Score a draft.
pub fn analyze(input: &SeoInput) -> Result<SeoReport> {
    let body = strip_html(&input.content)?;
    let word_count = body.split_whitespace().count();
    let keyword = input
        .focus_keyword
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());
    let meta_len = input.meta_description.trim().chars().count();

    let checks = vec![
        check(
            "word_count",
            word_count >= MIN_WORD_COUNT,
            format!("Content has {} words (minimum {})", word_count, MIN_WORD_COUNT),
        ),
        keyword_check("keyword_in_title", "title", keyword, &input.title),
        keyword_check("keyword_in_meta", "meta description", keyword, &input.meta_description),
        keyword_check("keyword_in_content", "content", keyword, &body),
        check(
            "meta_length",
            META_DESCRIPTION_RANGE.contains(&meta_len),
            format!(
                "Meta description is {} characters (recommended {}-{})",
                meta_len,
                META_DESCRIPTION_RANGE.start(),
                META_DESCRIPTION_RANGE.end()
            ),
        ),
    ];

    let passed = checks.iter().filter(|c| c.passed).count() as u32;
    Ok(SeoReport {
        score: passed * 100 / checks.len() as u32,
        word_count,
        checks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn long_body(keyword: &str) -> String {
        let filler = "word ".repeat(MIN_WORD_COUNT);
        format!("<p>{} {}</p>", keyword, filler)
    }

    #[test]
    fn test_strip_html() {
        let html = "<h1>Title</h1><script>var x = '<b>';</script><p>Hello&nbsp;<em>world</em></p><!-- note -->";
        assert_eq!(strip_html(html).unwrap(), "Title Hello world");
    }

    #[test]
    fn test_perfect_score() {
        let input = SeoInput {
            title: "Budget vote passes in parliament".into(),
            meta_description: "The budget vote passed late on Tuesday after a long debate in parliament.".into(),
            content: long_body("budget"),
            focus_keyword: Some("Budget".into()),
        };
        let report = analyze(&input).unwrap();
        assert_eq!(report.score, 100);
        assert_eq!(report.passed(), 5);
        assert!(report.word_count > MIN_WORD_COUNT);
    }

    #[test]
    fn test_missing_keyword_fails_keyword_checks() {
        let input = SeoInput {
            title: "Budget".into(),
            meta_description: "x".repeat(80),
            content: long_body("budget"),
            focus_keyword: None,
        };
        let report = analyze(&input).unwrap();
        assert_eq!(report.score, 40);
        assert!(report
            .checks
            .iter()
            .filter(|c| c.name.starts_with("keyword_"))
            .all(|c| !c.passed && c.message == "No focus keyword set"));
    }

    #[test]
    fn test_tags_do_not_count_as_words_or_keywords() {
        let input = SeoInput {
            title: "Short".into(),
            meta_description: "Too short".into(),
            content: "<div class=\"budget\"><p>one two</p></div>".into(),
            focus_keyword: Some("budget".into()),
        };
        let report = analyze(&input).unwrap();
        assert_eq!(report.word_count, 2);
        assert_eq!(report.score, 0);
    }

    #[test]
    fn test_meta_length_bounds() {
        let at = |len: usize| SeoInput {
            meta_description: "m".repeat(len),
            ..Default::default()
        };
        let meta_ok = |len| {
            analyze(&at(len))
                .unwrap()
                .checks
                .into_iter()
                .find(|c| c.name == "meta_length")
                .unwrap()
                .passed
        };
        assert!(!meta_ok(49));
        assert!(meta_ok(50));
        assert!(meta_ok(160));
        assert!(!meta_ok(161));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// The score is always a multiple of 20 and matches the passed checks.
        #[test]
        fn property_score_matches_checks(
            title in ".{0,40}",
            meta in ".{0,200}",
            content in ".{0,400}",
            keyword in proptest::option::of("[a-z]{1,8}")
        ) {
            let report = analyze(&SeoInput {
                title,
                meta_description: meta,
                content,
                focus_keyword: keyword,
            }).unwrap();
            prop_assert_eq!(report.checks.len(), 5);
            prop_assert_eq!(report.score % 20, 0);
            prop_assert_eq!(report.score as usize, report.passed() * 20);
        }
    }
}
