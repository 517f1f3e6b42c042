//! Merchant → category.
//!
//! User rules are tried first, in order, then a fixed keyword table. Nothing
//! here needs an LLM: rules plus keywords cover the common merchants.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use tally_core::MemberId;

pub const UNCATEGORIZED: &str = "Uncategorized";

/// A user rule: literal substring of the normalized merchant, or a regex
/// tested case-insensitively against the raw merchant text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantRule {
    pub match_text: String,
    pub category: String,
    #[serde(default)]
    pub is_regex: bool,
}

impl MerchantRule {
    pub fn literal(match_text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            match_text: match_text.into(),
            category: category.into(),
            is_regex: false,
        }
    }

    pub fn regex(pattern: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            match_text: pattern.into(),
            category: category.into(),
            is_regex: true,
        }
    }

    /// Regex rules must compile; literal rules always pass.
    pub fn validate(&self) -> Result<(), regex::Error> {
        if self.is_regex {
            RegexBuilder::new(&self.match_text).case_insensitive(true).build()?;
        }
        Ok(())
    }

    fn compile(&self) -> Option<Regex> {
        match RegexBuilder::new(&self.match_text).case_insensitive(true).build() {
            Ok(re) => Some(re),
            Err(err) => {
                tracing::warn!(pattern = %self.match_text, error = %err, "skipping malformed merchant rule");
                None
            }
        }
    }
}

/// A rule ready to test: regexes compiled, literal needles normalized.
#[derive(Debug)]
enum Matcher {
    Literal(String),
    Regex(Regex),
}

/// User rules prepared once for a batch of merchants. Empty and malformed
/// rules are dropped here, so each pattern is compiled (and warned about)
/// only once.
#[derive(Debug)]
pub struct CompiledRules<'r> {
    rules: Vec<(Matcher, &'r MerchantRule)>,
}

impl<'r> CompiledRules<'r> {
    pub fn new(rules: &'r [MerchantRule]) -> Self {
        let rules = rules
            .iter()
            .filter(|r| !r.match_text.trim().is_empty())
            .filter_map(|r| {
                let matcher = if r.is_regex {
                    Matcher::Regex(r.compile()?)
                } else {
                    let needle = normalize_merchant_key(&r.match_text);
                    if needle.is_empty() {
                        return None;
                    }
                    Matcher::Literal(needle)
                };
                Some((matcher, r))
            })
            .collect();
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Category of the first rule matching `merchant`.
    pub fn first_match(&self, merchant: &str) -> Option<&'r str> {
        let normalized = normalize_merchant_key(merchant);
        self.rules
            .iter()
            .find(|(m, _)| match m {
                Matcher::Literal(needle) => normalized.contains(needle.as_str()),
                Matcher::Regex(re) => re.is_match(merchant),
            })
            .map(|(_, r)| r.category.as_str())
    }

    /// User rules > keyword table > [`UNCATEGORIZED`].
    pub fn categorize(&self, merchant: &str) -> CategoryResult {
        if let Some(category) = self.first_match(merchant) {
            return CategoryResult {
                category: category.to_string(),
                source: MatchSource::Rule,
            };
        }
        match categorize_merchant(merchant) {
            UNCATEGORIZED => CategoryResult {
                category: UNCATEGORIZED.to_string(),
                source: MatchSource::None,
            },
            category => CategoryResult {
                category: category.to_string(),
                source: MatchSource::Heuristic,
            },
        }
    }
}

/// Lowercase, non-alphanumerics to spaces, collapse whitespace, trim.
pub fn normalize_merchant_key(value: &str) -> String {
    let mapped: String = value
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() { c } else { ' ' })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Category of the first user rule matching `merchant`. For many merchants,
/// build [`CompiledRules`] once instead.
pub fn apply_merchant_rules<'r>(merchant: &str, rules: &'r [MerchantRule]) -> Option<&'r str> {
    CompiledRules::new(rules).first_match(merchant)
}

const HEURISTICS: [(&str, &str); 7] = [
    (
        "Groceries",
        r"walmart|whole\s*foods|trader\s*joe|kroger|harris\s*teeter|giant|safeway|aldi|costco|grocery|supermarket",
    ),
    (
        "Dining",
        r"starbucks|cafe|coffee|restaurant|domino|pizza|tiffin|bakery|diner|grill|hello\s*2\s*india",
    ),
    ("Transport", r"uber|lyft|taxi|shell|chevron|exxon|bp"),
    (
        "Shopping",
        r"amazon|amzn|target|best\s*buy|walmart\.com|dollar\s*tree|shop",
    ),
    (
        "Entertainment",
        r"netflix|spotify|hulu|cinemark|movie|youtube\s*member",
    ),
    ("Bills", r"rent|mortgage|utility|internet|payment"),
    ("Health", r"pharmacy|cvs|clinic|dermatology|health"),
];

fn heuristics() -> &'static [(&'static str, Regex)] {
    static TABLE: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        HEURISTICS
            .iter()
            .map(|(category, pattern)| {
                let re = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .expect("heuristic category regex");
                (*category, re)
            })
            .collect()
    })
}

/// Built-in keyword table; first category with a hit wins.
pub fn categorize_merchant(merchant: &str) -> &'static str {
    heuristics()
        .iter()
        .find(|(_, re)| re.is_match(merchant))
        .map(|(category, _)| *category)
        .unwrap_or(UNCATEGORIZED)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    Rule,
    Heuristic,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category: String,
    pub source: MatchSource,
}

/// Categorize a merchant: user rules > keyword table > [`UNCATEGORIZED`].
pub fn categorize(merchant: &str, rules: &[MerchantRule]) -> CategoryResult {
    CompiledRules::new(rules).categorize(merchant)
}

/// One owner's rules, in match order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleBook {
    pub owner: Option<MemberId>,
    #[serde(default)]
    pub rules: Vec<MerchantRule>,
}

impl RuleBook {
    pub fn new(owner: impl Into<MemberId>) -> Self {
        Self {
            owner: Some(owner.into()),
            rules: Vec::new(),
        }
    }

    pub fn rules(&self) -> &[MerchantRule] {
        &self.rules
    }

    /// Insert or replace the rule with the same match text; replaced rules
    /// keep their position.
    pub fn upsert(&mut self, rule: MerchantRule) {
        match self
            .rules
            .iter_mut()
            .find(|r| r.match_text == rule.match_text)
        {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    /// Remember a merchant → category choice as a literal rule keyed by the
    /// normalized merchant. Returns false when the merchant has no usable text.
    pub fn remember(&mut self, merchant: &str, category: &str) -> bool {
        let key = normalize_merchant_key(merchant);
        if key.is_empty() || category.trim().is_empty() {
            return false;
        }
        self.upsert(MerchantRule::literal(key, category.trim()));
        true
    }

    pub fn categorize(&self, merchant: &str) -> CategoryResult {
        categorize(merchant, &self.rules)
    }

    pub fn compiled(&self) -> CompiledRules<'_> {
        CompiledRules::new(&self.rules)
    }
}
