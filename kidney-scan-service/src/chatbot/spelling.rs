use std::collections::HashSet;

/// Minimum similarity before an out-of-vocabulary token is rewritten
const CORRECTION_THRESHOLD: f64 = 0.8;
/// Tokens shorter than this are left alone; they carry too little signal
const MIN_TOKEN_LEN: usize = 3;

/// Everyday words that show up in queries and must never be "corrected"
/// into a medical term.
const COMMON_WORDS: &[&str] = &[
    "the", "and", "for", "what", "how", "are", "is", "my", "me", "near", "in", "around", "at",
    "treatment", "treated", "symptoms", "pain", "doctor", "help", "have", "can", "you", "about",
    "tell", "with", "water", "diet", "test", "risk", "surgery",
];

/// Best-effort spelling correction against a fixed vocabulary.
///
/// Only tokens that are not already in the vocabulary are candidates, and a
/// rewrite happens only when a vocabulary word is close enough. In-vocabulary
/// medical terms therefore pass through untouched.
pub struct SpellCorrector {
    // Vec keeps correction deterministic; the set is for membership checks
    words: Vec<String>,
    members: HashSet<String>,
}

impl SpellCorrector {
    pub fn new<I>(terms: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut corrector = Self {
            words: Vec::new(),
            members: HashSet::new(),
        };

        for word in COMMON_WORDS {
            corrector.insert(word);
        }
        for term in terms {
            for word in term.as_ref().split_whitespace() {
                corrector.insert(word);
            }
        }

        corrector
    }

    fn insert(&mut self, word: &str) {
        let normalized: String = word
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphabetic())
            .collect();
        if normalized.len() >= MIN_TOKEN_LEN && self.members.insert(normalized.clone()) {
            self.words.push(normalized);
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.members.contains(&word.to_lowercase())
    }

    /// Correct each token of the input independently; tokens already in the
    /// vocabulary, short tokens, and non-alphabetic tokens are unchanged.
    pub fn correct(&self, input: &str) -> String {
        input
            .split_whitespace()
            .map(|token| self.correct_token(token))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn correct_token(&self, token: &str) -> String {
        let lower = token.to_lowercase();
        if lower.len() < MIN_TOKEN_LEN
            || !lower.chars().all(|c| c.is_alphabetic())
            || self.members.contains(&lower)
        {
            return token.to_string();
        }

        let mut best: Option<(&str, f64)> = None;
        for word in &self.words {
            let score = strsim::normalized_levenshtein(&lower, word);
            if score >= CORRECTION_THRESHOLD && best.is_none_or(|(_, top)| score > top) {
                best = Some((word, score));
            }
        }

        match best {
            Some((word, _)) => word.to_string(),
            None => token.to_string(),
        }
    }
}
