//! Pattern-triggered emoji reactions.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use tracing::warn;

/// Messages longer than this are never reacted to.
pub const MAX_MESSAGE_CHARS: usize = 150;

static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[a-z]+://)?(?:[a-z0-9]+(?:-[a-z0-9]+)*\.)+[a-zA-Z]{2,}(?:/\S*)?\b")
        .expect("url pattern is valid")
});

static CUSTOM_EMOJI_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)>$").expect("custom emoji pattern is valid"));

#[derive(Debug, Deserialize)]
struct RawReaction {
    pattern: String,
    emoji: String,
}

/// A compiled reaction rule.
#[derive(Debug, Clone)]
pub struct ReactionRule {
    pub id: String,
    pub pattern: Regex,
    /// Unicode emoji or a custom emoji in `<:name:id>` form.
    pub emoji: String,
}

/// A rule that matched a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionMatch<'a> {
    pub id: &'a str,
    pub emoji: &'a str,
    /// The part of the message that triggered the rule.
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct ReactionRules {
    rules: Vec<ReactionRule>,
}

impl ReactionRules {
    /// Parse `{ id: { pattern, emoji } }`. Keys starting with `$` are comments.
    ///
    /// Rules with an invalid pattern are skipped with a warning.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(text)?;
        let rules = raw
            .into_iter()
            .filter(|(id, _)| !id.starts_with('$'))
            .filter_map(|(id, value)| {
                let reaction: RawReaction = match serde_json::from_value(value) {
                    Ok(reaction) => reaction,
                    Err(e) => {
                        warn!("Skipping malformed reaction '{}': {}", id, e);
                        return None;
                    }
                };
                match RegexBuilder::new(&reaction.pattern)
                    .case_insensitive(true)
                    .build()
                {
                    Ok(pattern) => Some(ReactionRule {
                        id,
                        pattern,
                        emoji: reaction.emoji,
                    }),
                    Err(e) => {
                        warn!("Skipping reaction '{}' with invalid pattern: {}", id, e);
                        None
                    }
                }
            })
            .collect();
        Ok(Self { rules })
    }

    /// Load rules from a file, falling back to no rules.
    pub async fn load(path: &Path) -> Self {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!("Failed to read reactions from {}: {}", path.display(), e);
                return Self::default();
            }
        };
        Self::parse(&text).unwrap_or_else(|e| {
            warn!("Failed to parse reactions from {}: {}", path.display(), e);
            Self::default()
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ReactionRule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    /// Every rule matching a message, after links are removed from it.
    pub fn matches(&self, content: &str) -> Vec<ReactionMatch<'_>> {
        let content = strip_urls(content);
        self.rules
            .iter()
            .filter_map(|rule| {
                let found = rule.pattern.find(&content)?;
                Some(ReactionMatch {
                    id: &rule.id,
                    emoji: &rule.emoji,
                    text: found.as_str().to_string(),
                })
            })
            .collect()
    }
}

/// Whether a message is short enough to react to.
pub fn within_length(content: &str) -> bool {
    content.chars().count() <= MAX_MESSAGE_CHARS
}

/// Remove links so patterns do not fire on parts of URLs.
///
/// Handles that look like domains, such as `@user.name`, are kept.
pub fn strip_urls(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    for found in URL.find_iter(content) {
        if content[..found.start()].ends_with('@') {
            continue;
        }
        out.push_str(&content[last..found.start()]);
        last = found.end();
    }
    out.push_str(&content[last..]);
    out
}

/// Image for the "new reaction discovered" embed.
pub fn emoji_image_url(emoji: &str) -> String {
    match CUSTOM_EMOJI_ID.captures(emoji).and_then(|c| c.get(1)) {
        Some(id) => format!("https://cdn.discordapp.com/emojis/{}.webp", id.as_str()),
        None => format!("https://www.emoji.family/api/emojis/{}/twemoji/png/128", emoji),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RULES: &str = r#"{
        "$comment": "keys starting with $ are ignored",
        "$disabled": { "pattern": "ignored", "emoji": "x" },
        "kaffe": { "pattern": "kaffe|fika", "emoji": "☕" },
        "prit": { "pattern": "\\bprit\\b", "emoji": "<:prit:123456789>" },
        "broken": { "pattern": "(", "emoji": "💥" }
    }"#;

    #[test]
    fn parses_rules_and_skips_comments() {
        let rules = ReactionRules::parse(RULES).unwrap();
        assert_eq!(rules.len(), 2);
        assert!(rules.get("$disabled").is_none());
        assert!(rules.get("broken").is_none());
    }

    #[test]
    fn matches_case_insensitively() {
        let rules = ReactionRules::parse(RULES).unwrap();
        let found = rules.matches("Dags för FIKA med PRIT?");
        assert_eq!(
            found.iter().map(|m| (m.id, m.text.as_str())).collect::<Vec<_>>(),
            [("kaffe", "FIKA"), ("prit", "PRIT")]
        );
    }

    #[test]
    fn ignores_links() {
        let rules = ReactionRules::parse(RULES).unwrap();
        assert!(rules.matches("kolla https://kaffe.se/meny").is_empty());
        assert!(rules.matches("kolla kaffe.se").is_empty());
        assert_eq!(strip_urls("hej @prit.bot"), "hej @prit.bot");
        assert_eq!(strip_urls("se www.example.com/a?b nu"), "se  nu");
    }

    #[test]
    fn length_limit_counts_characters() {
        assert!(within_length(&"å".repeat(150)));
        assert!(!within_length(&"a".repeat(151)));
    }

    #[test]
    fn emoji_images() {
        assert_eq!(
            emoji_image_url("<:prit:123456789>"),
            "https://cdn.discordapp.com/emojis/123456789.webp"
        );
        assert_eq!(
            emoji_image_url("☕"),
            "https://www.emoji.family/api/emojis/☕/twemoji/png/128"
        );
    }
}
