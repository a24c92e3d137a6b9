//! Query rewriting strategies.
//!
//! The knowledge base is bilingual (English and Bahasa Indonesia), so every
//! word list here covers both languages.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Maximum number of suggestions returned per search.
pub const MAX_SUGGESTIONS: usize = 2;

/// How the raw prompt is rewritten before embedding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    /// Use the prompt as-is.
    #[default]
    Direct,
    /// Strip stop words and short tokens.
    Keywords,
    /// Expand domain terms with synonyms in both languages.
    Synonyms,
    /// Emphasise technical terms. Currently a pass-through: no rewrite rule
    /// exists yet, the variant only steers the model's next attempt.
    Technical,
    /// Replace formal wording with everyday equivalents.
    Simplified,
}

impl SearchStrategy {
    pub const ALL: [SearchStrategy; 5] = [
        SearchStrategy::Direct,
        SearchStrategy::Keywords,
        SearchStrategy::Synonyms,
        SearchStrategy::Technical,
        SearchStrategy::Simplified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStrategy::Direct => "direct",
            SearchStrategy::Keywords => "keywords",
            SearchStrategy::Synonyms => "synonyms",
            SearchStrategy::Technical => "technical",
            SearchStrategy::Simplified => "simplified",
        }
    }

    /// Hint offered to the model when this strategy is still untried.
    fn suggestion(&self) -> Option<&'static str> {
        match self {
            SearchStrategy::Direct => None,
            SearchStrategy::Keywords => Some("Try searching with just the key terms"),
            SearchStrategy::Synonyms => Some("Try using alternative terms or synonyms"),
            SearchStrategy::Technical => Some("Focus on technical terms"),
            SearchStrategy::Simplified => Some("Try simpler, more common language"),
        }
    }
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SearchStrategy::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown search strategy '{s}', expected one of: direct, keywords, synonyms, technical, simplified"
                )
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Word lists
// ─────────────────────────────────────────────────────────────────────────────

static ENGLISH_STOP_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?:how|what|when|where|why|can|could|would|should|do|does|is|are|the|a|an|and|or|but|in|on|at|to|for|of|with|by|i|me|my|you|your|he|she|it|we|they|this|that|these|those|will|be|been|have|has|had)\b",
    )
});

static INDONESIAN_STOP_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?:apa|bagaimana|kapan|dimana|mengapa|kenapa|siapa|yang|ini|itu|dengan|untuk|dari|ke|di|pada|dalam|atau|dan|tetapi|tapi|adalah|akan|sudah|telah|sedang|saya|aku|kamu|anda|dia|mereka|kita|kami|bisa|dapat|harus|perlu|mau|ingin|seperti|jadi|juga|lagi|masih|belum)\b",
    )
});

/// Applied in order; later rules see the output of earlier ones.
///
/// Patterns match whole words only, so "bertanya" does not trigger the
/// `tanya` rule and "asking" does not trigger `ask`. Matching inside words
/// would expand those too.
static SYNONYM_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    rules(&[
        ("problem|issue", "trouble difficulty error masalah kendala"),
        ("fix|solve", "repair resolve solution perbaiki selesaikan solusi"),
        ("help|assist", "support aid guidance bantuan dukungan"),
        ("question|ask", "inquiry query pertanyaan tanya"),
        ("masalah|kendala", "problem issue trouble kesulitan"),
        ("perbaiki|selesaikan", "fix solve repair resolve"),
        ("bantuan|dukungan", "help assist support aid"),
        ("pertanyaan|tanya", "question ask inquiry"),
        ("bagaimana", "how cara method"),
        ("dimana", "where lokasi tempat"),
    ])
});

static SIMPLIFY_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    rules(&[
        ("utilize|implement|configure|initialize", "use"),
        ("concerning|regarding|pertaining to", "about"),
        ("assistance|support", "help"),
        ("menggunakan|memanfaatkan", "pakai"),
        ("mengenai|berkaitan dengan|tentang", "soal"),
        ("bantuan|dukungan", "tolong"),
    ])
});

/// Acronyms or common technology abbreviations. Case-sensitive.
static TECHNICAL_TERM: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"[A-Z]{2,}|\w*(?:API|SDK|URL|HTTP|JSON|XML|CSS|HTML|JS|TS)\w*")
});

fn compile(pattern: &str) -> Regex {
    // Only ever called with the literal patterns below.
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in pattern {pattern}: {e}"))
}

fn rules(table: &[(&str, &'static str)]) -> Vec<(Regex, &'static str)> {
    table
        .iter()
        .map(|(pattern, replacement)| (compile(&format!(r"(?i)\b(?:{pattern})\b")), *replacement))
        .collect()
}

fn apply_rules(text: &str, rules: &[(Regex, &'static str)]) -> String {
    rules.iter().fold(text.to_string(), |acc, (re, replacement)| {
        re.replace_all(&acc, regex::NoExpand(replacement)).into_owned()
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Planner
// ─────────────────────────────────────────────────────────────────────────────

/// Rewrites queries per strategy and proposes untried strategies.
///
/// Stateless; which strategies have been attempted is supplied by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStrategyPlanner;

impl SearchStrategyPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Rewrite `prompt` according to `strategy`.
    pub fn transform(&self, prompt: &str, strategy: SearchStrategy) -> String {
        match strategy {
            // Technical has no rewrite of its own; it only steers suggestions.
            SearchStrategy::Direct | SearchStrategy::Technical => prompt.to_string(),
            SearchStrategy::Keywords => keywords(prompt),
            SearchStrategy::Synonyms => apply_rules(prompt, &SYNONYM_RULES),
            SearchStrategy::Simplified => apply_rules(prompt, &SIMPLIFY_RULES),
        }
    }

    /// Up to two hints for strategies not in `attempted`.
    ///
    /// The technical hint is only offered when the prompt contains an
    /// acronym or a known technology abbreviation.
    pub fn suggestions(&self, prompt: &str, attempted: &[SearchStrategy]) -> Vec<String> {
        SearchStrategy::ALL
            .into_iter()
            .filter(|s| !attempted.contains(s))
            .filter(|s| *s != SearchStrategy::Technical || has_technical_term(prompt))
            .filter_map(|s| s.suggestion())
            .take(MAX_SUGGESTIONS)
            .map(str::to_string)
            .collect()
    }
}

fn keywords(prompt: &str) -> String {
    let lowered = prompt.to_lowercase();
    let without_en = ENGLISH_STOP_WORDS.replace_all(&lowered, "");
    let without_id = INDONESIAN_STOP_WORDS.replace_all(&without_en, "");
    without_id
        .split_whitespace()
        .filter(|word| word.chars().count() > 2)
        .collect::<Vec<_>>()
        .join(" ")
}

fn has_technical_term(prompt: &str) -> bool {
    TECHNICAL_TERM.is_match(prompt)
}
