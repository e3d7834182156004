//! Spam/safety classification.
//!
//! Two layers: a conservative rule layer that fires only on unambiguous
//! junk, and a remote classifier for everything the rules can't decide.
//! The rule layer short-circuits: when it fires, the remote is never
//! called. Failure semantics differ by layer: an unparseable remote answer
//! fails closed (flag as spam, the user can resubmit), an unavailable or
//! unconfigured remote fails open (the rules already are the safety net).

use std::sync::{Arc, LazyLock};

use ai_client::{guard, parse, RemoteClassifier};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct SpamVerdict {
    pub is_spam: bool,
    pub is_nsfw: bool,
    pub confidence: f32,
    pub reason: String,
}

impl SpamVerdict {
    fn clean(confidence: f32, reason: impl Into<String>) -> Self {
        Self {
            is_spam: false,
            is_nsfw: false,
            confidence,
            reason: reason.into(),
        }
    }

    fn spam(confidence: f32, reason: impl Into<String>) -> Self {
        Self {
            is_spam: true,
            is_nsfw: false,
            confidence,
            reason: reason.into(),
        }
    }
}

// --- Rule layer ---

/// Exact placeholder submissions. Matched against the whole combined text,
/// so a real report that happens to contain "test" is untouched.
const PLACEHOLDER_STRINGS: &[&str] = &[
    "test",
    "testing",
    "test test",
    "test 123",
    "asdf",
    "qwerty",
    "abc",
    "abcd",
    "xyz",
    "lorem ipsum",
    "na",
    "n/a",
    "nothing",
    "...",
];

const GREETING_ONLY_WORDS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "hii",
    "hiii",
    "namaste",
    "good morning",
    "good afternoon",
    "good evening",
];

/// Phrases that never occur in legitimate incident reports.
const SPAM_PHRASES: &[&str] = &[
    "earn money from home",
    "click here to claim",
    "limited time offer",
    "buy now",
    "free followers",
    "work from home and earn",
    "congratulations you have won",
    "crypto investment",
    "casino bonus",
];

const PROMO_KEYWORDS: &[&str] = &[
    "discount", "offer", "sale", "promo", "subscribe", "followers", "earn", "winner",
];

static KEYBOARD_MASH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:[qwertyuiop]{7,}|[asdfghjkl]{7,}|[zxcvbnm]{7,})\b").unwrap()
});
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://\S+|www\.\S+\.\S+").unwrap());

/// Runs of one character at least this long are junk ("aaaaaaaa"). No real
/// word in any of the report languages repeats a character six times.
const REPEATED_CHAR_RUN: usize = 6;

/// Length of the longest run of a single repeated character. A manual scan:
/// the regex engine in use has no backreferences.
fn longest_char_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous = None;
    for c in text.chars() {
        if previous == Some(c) {
            current += 1;
        } else {
            previous = Some(c);
            current = 1;
        }
        longest = longest.max(current);
    }
    longest
}

/// Minimum combined length before the gibberish and phrase checks apply.
/// Short real reports ("no wifi") must never trip statistical rules.
const MIN_CONTENT_LEN_FOR_STATS: usize = 20;

fn vowel_ratio(text: &str) -> Option<f32> {
    let alpha: Vec<char> = text
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    // Statistical vowel check only makes sense on mostly-ASCII text.
    if alpha.len() < 15 || (alpha.len() as f32) < text.chars().count() as f32 * 0.6 {
        return None;
    }
    let vowels = alpha
        .iter()
        .filter(|c| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u'))
        .count();
    Some(vowels as f32 / alpha.len() as f32)
}

/// Apply the ordered rule list. Returns Some only on unambiguous junk;
/// None means "the rules have no opinion", not "clean".
pub fn rule_verdict(title: &str, description: &str) -> Option<SpamVerdict> {
    let combined = format!("{} {}", title.trim(), description.trim());
    let combined = combined.trim().to_lowercase();

    if PLACEHOLDER_STRINGS.contains(&combined.as_str()) {
        return Some(SpamVerdict::spam(0.98, "placeholder/test submission"));
    }

    if KEYBOARD_MASH_RE.is_match(&combined) {
        return Some(SpamVerdict::spam(0.95, "keyboard-mash content"));
    }

    if longest_char_run(&combined) >= REPEATED_CHAR_RUN {
        return Some(SpamVerdict::spam(0.92, "repeated-character content"));
    }

    if GREETING_ONLY_WORDS.contains(&combined.as_str()) {
        return Some(SpamVerdict::spam(0.9, "greeting-only submission"));
    }

    if combined.len() >= MIN_CONTENT_LEN_FOR_STATS {
        if let Some(ratio) = vowel_ratio(&combined) {
            if ratio < 0.12 {
                return Some(SpamVerdict::spam(0.9, "gibberish (vowel-ratio)"));
            }
        }

        for phrase in SPAM_PHRASES {
            if combined.contains(phrase) {
                return Some(SpamVerdict::spam(0.95, format!("spam phrase: {phrase}")));
            }
        }

        if URL_RE.is_match(&combined)
            && PROMO_KEYWORDS.iter().any(|kw| combined.contains(kw))
        {
            return Some(SpamVerdict::spam(0.93, "advertising link"));
        }
    }

    None
}

// --- Remote layer ---

const SPAM_SYSTEM_PROMPT: &str = r#"You moderate incoming incident reports for a campus issue tracker. Decide whether a submission is spam, off-topic, or NSFW.

A legitimate report describes a real problem someone wants fixed: broken infrastructure, outages, safety concerns, harassment, health issues, food or sanitation complaints. Reports may be short, informal, multilingual, or code-mixed (e.g. Hindi written in Latin script); none of that makes them spam.

Spam: advertising, link farming, gibberish, test submissions, chain messages, content with no incident to act on.
NSFW: sexually explicit or gratuitously violent content that is not itself the incident being reported.

Respond with ONLY a JSON object, no prose, exactly this shape:
{"is_spam": <bool>, "is_nsfw": <bool>, "confidence": <0.0-1.0>, "reason": "<one short sentence>"}"#;

#[derive(Debug, Deserialize)]
struct WireVerdict {
    is_spam: bool,
    #[serde(default)]
    is_nsfw: bool,
    #[serde(default = "default_confidence")]
    confidence: f32,
    #[serde(default)]
    reason: String,
}

fn default_confidence() -> f32 {
    0.5
}

pub struct SpamClassifier {
    remote: Option<Arc<dyn RemoteClassifier>>,
}

impl SpamClassifier {
    pub fn new(remote: Option<Arc<dyn RemoteClassifier>>) -> Self {
        Self { remote }
    }

    /// Rule layer only. The orchestrator uses this in the fast phase and
    /// escalates separately.
    pub fn fast(&self, title: &str, description: &str) -> Option<SpamVerdict> {
        rule_verdict(title, description)
    }

    /// Remote escalation for rule-inconclusive submissions. Never errors:
    /// all failure modes collapse into a verdict with documented defaults.
    pub async fn escalate(&self, title: &str, description: &str) -> SpamVerdict {
        let Some(remote) = &self.remote else {
            return SpamVerdict::clean(0.0, "no classifier configured; rules inconclusive");
        };

        let user = guard::delimit_untrusted(title, description);
        match remote.complete(SPAM_SYSTEM_PROMPT, &user).await {
            Ok(text) => Self::interpret(&text),
            Err(e) => {
                warn!(error = %e, "spam classifier unavailable, failing open");
                SpamVerdict::clean(0.0, "classifier unavailable; rules inconclusive")
            }
        }
    }

    /// Full classification: rules, then remote.
    pub async fn classify(&self, title: &str, description: &str) -> SpamVerdict {
        match self.fast(title, description) {
            Some(verdict) => verdict,
            None => self.escalate(title, description).await,
        }
    }

    fn interpret(text: &str) -> SpamVerdict {
        if let Some(wire) = parse::parse_lenient::<WireVerdict>(text) {
            return SpamVerdict {
                is_spam: wire.is_spam,
                is_nsfw: wire.is_nsfw,
                confidence: wire.confidence.clamp(0.0, 1.0),
                reason: if wire.reason.is_empty() {
                    "model verdict".to_string()
                } else {
                    wire.reason
                },
            };
        }

        // Structured parse failed; scan the raw text for the field we need.
        if let Some(is_spam) = parse::scan_bool_field(text, "is_spam") {
            debug!("spam verdict recovered via field scan");
            return SpamVerdict {
                is_spam,
                is_nsfw: parse::scan_bool_field(text, "is_nsfw").unwrap_or(false),
                confidence: parse::scan_f32_field(text, "confidence")
                    .unwrap_or(0.5)
                    .clamp(0.0, 1.0),
                reason: parse::scan_string_field(text, "reason")
                    .unwrap_or_else(|| "model verdict (field scan)".to_string()),
            };
        }

        // Truly unparseable: fail closed. Letting spam through is worse
        // than asking a real user to resubmit.
        warn!("spam classifier output unparseable, failing closed");
        SpamVerdict::spam(0.5, "classifier output unparseable")
    }
}
