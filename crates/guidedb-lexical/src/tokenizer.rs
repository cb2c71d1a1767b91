//! Normalization and tokenization pipeline.
//!
//! The same pipeline runs on both the document side (indexing) and the
//! query side (search). Any divergence between the two silently degrades
//! recall, so the alias map and stop-word set are injected once and the
//! whole pipeline is a pure function of its input.

use std::collections::{HashMap, HashSet};

/// Shared normalizer/tokenizer for documents and queries.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    /// (alias, canonical) pairs, longest alias first so multi-word
    /// variants win over their substrings.
    aliases: Vec<(String, String)>,
    /// Canonical entity names, for entity detection and stats.
    canonical: Vec<String>,
    stop_words: HashSet<String>,
}

impl Tokenizer {
    pub fn new(aliases: &HashMap<String, Vec<String>>, stop_words: &[String]) -> Self {
        let mut pairs: Vec<(String, String)> = Vec::new();
        let mut canonical: Vec<String> = Vec::new();
        for (name, variants) in aliases {
            canonical.push(name.to_lowercase());
            for v in variants {
                pairs.push((v.to_lowercase(), name.to_lowercase()));
            }
        }
        pairs.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()).then(a.0.cmp(&b.0)));
        canonical.sort();
        let stop_words = stop_words.iter().map(|s| s.to_lowercase()).collect();
        Tokenizer { aliases: pairs, canonical, stop_words }
    }

    pub fn stop_word_count(&self) -> usize {
        self.stop_words.len()
    }

    /// Canonical entity names known to the alias map, sorted.
    pub fn canonical_entities(&self) -> &[String] {
        &self.canonical
    }

    /// Lowercase the text and collapse every known alias to its
    /// canonical entity name. Latin aliases only match on word
    /// boundaries; CJK aliases match as substrings.
    pub fn normalize(&self, text: &str) -> String {
        let mut out = text.to_lowercase();
        for (alias, canonical) in &self.aliases {
            if alias == canonical {
                continue;
            }
            out = replace_term(&out, alias, canonical);
        }
        out
    }

    /// Full pipeline: normalize, strip punctuation, script-aware
    /// segmentation, stop-word filtering, light suffix stripping with
    /// the original form retained alongside the stem.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let normalized = self.normalize(text);
        let cleaned: String = normalized
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || is_cjk(c) || c.is_whitespace() { c } else { ' ' })
            .collect();

        let raw = if cleaned.chars().any(is_cjk) {
            segment_mixed(&cleaned)
        } else {
            cleaned.split_whitespace().map(str::to_string).collect()
        };

        let mut tokens = Vec::new();
        for token in raw {
            let token = token.trim();
            if token.is_empty() || self.stop_words.contains(token) {
                continue;
            }
            let char_count = token.chars().count();
            if char_count <= 1 && !token.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            if token.is_ascii() {
                let stemmed = stem(token);
                tokens.push(stemmed.clone());
                // Keep the exact form too so exact-match signal survives.
                if stemmed != token {
                    tokens.push(token.to_string());
                }
            } else {
                tokens.push(token.to_string());
            }
        }
        tokens
    }

    /// Canonical entity names present in the normalized text.
    pub fn detect_entities(&self, text: &str) -> Vec<String> {
        let normalized = self.normalize(text);
        let mut found = Vec::new();
        for name in &self.canonical {
            if contains_term(&normalized, name) && !found.contains(name) {
                found.push(name.clone());
            }
        }
        found
    }
}

/// Boundary-aware check: `term` occurs in `text` and, for Latin terms,
/// is not embedded inside a longer alphanumeric word.
pub fn contains_term(text: &str, term: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = text[start..].find(term) {
        let at = start + pos;
        if bounded(text, at, term.len()) {
            return true;
        }
        start = at + term.len().max(1);
    }
    false
}

fn replace_term(text: &str, term: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut consumed = 0;
    while let Some(pos) = rest.find(term) {
        let at = consumed + pos;
        if bounded(text, at, term.len()) {
            out.push_str(&rest[..pos]);
            out.push_str(replacement);
        } else {
            out.push_str(&rest[..pos + term.len()]);
        }
        rest = &rest[pos + term.len()..];
        consumed = at + term.len();
    }
    out.push_str(rest);
    out
}

fn bounded(text: &str, at: usize, len: usize) -> bool {
    let starts_latin = text[at..].chars().next().is_some_and(|c| c.is_ascii_alphanumeric());
    let ends_latin = text[..at + len].chars().next_back().is_some_and(|c| c.is_ascii_alphanumeric());
    let prev_ok = !starts_latin
        || !text[..at].chars().next_back().is_some_and(|c| c.is_ascii_alphanumeric());
    let next_ok = !ends_latin
        || !text[at + len..].chars().next().is_some_and(|c| c.is_ascii_alphanumeric());
    prev_ok && next_ok
}

/// CJK Unified Ideographs block, the range the source corpus uses.
fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// Mixed-script segmentation: Latin runs split on whitespace, CJK runs
/// emit character bigrams (a run of one character falls through to the
/// length filter).
fn segment_mixed(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut latin = String::new();
    let mut cjk_run: Vec<char> = Vec::new();

    let mut flush_latin = |buf: &mut String, tokens: &mut Vec<String>| {
        for part in buf.split_whitespace() {
            tokens.push(part.to_string());
        }
        buf.clear();
    };
    let mut flush_cjk = |run: &mut Vec<char>, tokens: &mut Vec<String>| {
        match run.len() {
            0 => {}
            1 => tokens.push(run[0].to_string()),
            _ => {
                for pair in run.windows(2) {
                    tokens.push(pair.iter().collect());
                }
            }
        }
        run.clear();
    };

    for c in text.chars() {
        if is_cjk(c) {
            flush_latin(&mut latin, &mut tokens);
            cjk_run.push(c);
        } else {
            flush_cjk(&mut cjk_run, &mut tokens);
            latin.push(c);
        }
    }
    flush_latin(&mut latin, &mut tokens);
    flush_cjk(&mut cjk_run, &mut tokens);
    tokens
}

/// Light suffix stripping for Latin tokens. Deliberately shallow: the
/// exact form is indexed alongside the stem, so aggressive stemming
/// would only add noise.
fn stem(word: &str) -> String {
    let n = word.len();
    if n <= 2 {
        return word.to_string();
    }
    if word.ends_with('s') && n > 3 {
        if word.ends_with("ies") && n > 4 {
            return format!("{}y", &word[..n - 3]);
        }
        if word.ends_with("es") && n > 4 {
            return word[..n - 2].to_string();
        }
        return word[..n - 1].to_string();
    }
    if word.ends_with("ing") && n > 5 {
        return word[..n - 3].to_string();
    }
    if word.ends_with("ed") && n > 4 {
        return word[..n - 2].to_string();
    }
    if word.ends_with("ly") && n > 4 {
        return word[..n - 2].to_string();
    }
    word.to_string()
}
