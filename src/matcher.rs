//! OTP code extraction from email text.
//!
//! The [`Matcher`] trait is the seam the poller works against. [`OtpExtractor`]
//! is the built-in implementation: an ordered list of [`OtpRule`]s evaluated in
//! sequence, where the first rule producing any match wins and, within a rule,
//! the leftmost occurrence is returned.
//!
//! # Example
//!
//! ```
//! use otp_relay::matcher::{Matcher, OtpExtractor};
//!
//! let otp = OtpExtractor::new();
//! assert_eq!(
//!     otp.extract("147477 is your instacart verification code", "").as_deref(),
//!     Some("147477")
//! );
//! assert_eq!(otp.find_match("Your code: **98765**").as_deref(), Some("98765"));
//! assert_eq!(otp.extract("", "random text with no numbers"), None);
//! ```

use regex::{Regex, RegexBuilder};
use std::borrow::Cow;
use std::sync::LazyLock;
use tracing::trace;

/// Trait for matching and extracting content from email text.
pub trait Matcher: Send + Sync {
    /// Attempts to find and extract matching content from the text.
    ///
    /// Returns `Some(matched_value)` if found, `None` otherwise.
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>>;

    /// Returns a human-readable description of what this matcher looks for.
    ///
    /// Used in logging.
    fn description(&self) -> &str;
}

/// Case-insensitive regex matcher that extracts the first capture group.
///
/// # Example
///
/// ```
/// use otp_relay::matcher::{Matcher, RegexMatcher};
///
/// let matcher = RegexMatcher::new(r"pin:\s*(\d+)").unwrap();
/// assert_eq!(matcher.find_match("Your PIN: 42").as_deref(), Some("42"));
/// ```
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
    description: String,
}

impl RegexMatcher {
    /// Creates a new matcher. The pattern must contain at least one capture group.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Self::with_description(pattern, format!("regex pattern: {pattern}"))
    }

    /// Creates a new matcher with a custom description.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn with_description(
        pattern: &str,
        description: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self {
            regex,
            description: description.into(),
        })
    }
}

impl Matcher for RegexMatcher {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| Cow::Borrowed(m.as_str()))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Shape of text an [`OtpRule`] recognizes, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// `147477 is your <service> verification code`.
    Phrase,
    /// Markdown bold: `**147477**`.
    Bold,
    /// Digits with whitespace on both sides.
    Standalone,
    /// Digits after a label such as `code:` or `OTP -`.
    Labeled,
    /// Any word-boundary delimited run of 4-8 digits.
    Fallback,
}

/// A single named extraction rule.
#[derive(Debug, Clone)]
pub struct OtpRule {
    name: &'static str,
    kind: RuleKind,
    matcher: RegexMatcher,
}

impl OtpRule {
    fn new(name: &'static str, kind: RuleKind, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            kind,
            matcher: RegexMatcher::with_description(pattern, name)?,
        })
    }

    /// Stable rule name, used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The rule's precedence group.
    #[must_use]
    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    /// Leftmost match of this rule alone.
    pub fn find<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.matcher.find_match(text)
    }
}

const DEFAULT_RULES: &[(&str, RuleKind, &str)] = &[
    (
        "phrase",
        RuleKind::Phrase,
        r"(\d{6})\s+is\s+your\s+[\w\s]+\s+verification\s+code",
    ),
    ("bold", RuleKind::Bold, r"\*\*(\d{4,8})\*\*"),
    ("standalone", RuleKind::Standalone, r"\s(\d{4,8})\s"),
    ("label_code", RuleKind::Labeled, r"code:?\s*[:\-]?\s*(\d{4,8})"),
    (
        "label_verification_code",
        RuleKind::Labeled,
        r"verification\s+code:?\s*[:\-]?\s*(\d{4,8})",
    ),
    ("label_otp", RuleKind::Labeled, r"OTP:?\s*[:\-]?\s*(\d{4,8})"),
    (
        "label_one_time_code",
        RuleKind::Labeled,
        r"one.time.*?code:?\s*[:\-]?\s*(\d{4,8})",
    ),
    (
        "label_your_code_is",
        RuleKind::Labeled,
        r"your.*?code.*?is:?\s*[:\-]?\s*(\d{4,8})",
    ),
    ("fallback", RuleKind::Fallback, r"\b(\d{4,8})\b"),
];

static DEFAULT_RULE_SET: LazyLock<Vec<OtpRule>> = LazyLock::new(|| {
    DEFAULT_RULES
        .iter()
        .map(|(name, kind, pattern)| {
            OtpRule::new(name, *kind, pattern).expect("valid regex")
        })
        .collect()
});

/// A code together with the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    /// The extracted digit string.
    pub code: String,
    /// Name of the rule that fired.
    pub rule: &'static str,
}

/// Ordered, first-match-wins OTP extractor.
#[derive(Debug, Clone)]
pub struct OtpExtractor {
    rules: Vec<OtpRule>,
}

impl Default for OtpExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl OtpExtractor {
    /// Creates an extractor with the built-in rule list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: DEFAULT_RULE_SET.clone(),
        }
    }

    /// The rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[OtpRule] {
        &self.rules
    }

    /// Extracts a code from a message's subject and body.
    #[must_use]
    pub fn extract(&self, subject: &str, body: &str) -> Option<String> {
        self.extract_with_rule(subject, body).map(|m| m.code)
    }

    /// Like [`extract`](Self::extract), also naming the rule that fired.
    #[must_use]
    pub fn extract_with_rule(&self, subject: &str, body: &str) -> Option<RuleMatch> {
        let text = search_text(subject, body);
        self.first_match(&text).map(|(rule, code)| RuleMatch {
            code: code.into_owned(),
            rule: rule.name,
        })
    }

    fn first_match<'a>(&self, text: &'a str) -> Option<(&OtpRule, Cow<'a, str>)> {
        let found = self
            .rules
            .iter()
            .find_map(|rule| rule.find(text).map(|code| (rule, code)));
        if let Some((rule, _)) = &found {
            trace!(rule = rule.name, "OTP rule matched");
        }
        found
    }
}

impl Matcher for OtpExtractor {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.first_match(text).map(|(_, code)| code)
    }

    fn description(&self) -> &str {
        "ordered OTP rules"
    }
}

/// Joins subject and body into the text the rules run against.
#[must_use]
pub fn search_text(subject: &str, body: &str) -> String {
    format!("{subject} {body}")
}
