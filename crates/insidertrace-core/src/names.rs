//! Person-name normalisation, variant generation, and fuzzy matching.
//!
//! Filers render the same person as "KLAPPA GALE E", "Gale Klappa", or
//! "Klappa, Gale E.". Everything here works on a canonical lowercase
//! "first middle last" token form so those renderings compare equal.

use std::collections::HashSet;

use crate::record::{NameVariant, VariantSource};

/// Default similarity needed for two names to count as the same person.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.8;

/// Leading honorifics dropped during normalisation.
const HONORIFICS: &[&str] = &[
    "mr", "mrs", "ms", "miss", "dr", "prof", "sir", "dame", "lord", "lady", "rev", "hon",
    "father", "sister", "brother",
];

/// Trailing generational and credential suffixes dropped during normalisation.
const SUFFIXES: &[&str] = &[
    "jr", "sr", "ii", "iii", "iv", "esq", "md", "phd", "jd", "cpa", "cfa", "mba", "pe",
    "rn", "dds",
];

/// Nickname to formal given name.
const NICKNAMES: &[(&str, &str)] = &[
    ("bill", "william"),
    ("billy", "william"),
    ("will", "william"),
    ("bob", "robert"),
    ("bobby", "robert"),
    ("rob", "robert"),
    ("robbie", "robert"),
    ("dick", "richard"),
    ("rick", "richard"),
    ("ricky", "richard"),
    ("rich", "richard"),
    ("jim", "james"),
    ("jimmy", "james"),
    ("jamie", "james"),
    ("mike", "michael"),
    ("mickey", "michael"),
    ("dave", "david"),
    ("davey", "david"),
    ("steve", "steven"),
    ("stevie", "steven"),
    ("chris", "christopher"),
    ("dan", "daniel"),
    ("danny", "daniel"),
    ("tom", "thomas"),
    ("tommy", "thomas"),
    ("tony", "anthony"),
    ("joe", "joseph"),
    ("joey", "joseph"),
    ("ben", "benjamin"),
    ("benny", "benjamin"),
    ("sam", "samuel"),
    ("sammy", "samuel"),
    ("matt", "matthew"),
    ("nick", "nicholas"),
    ("nicky", "nicholas"),
    ("andy", "andrew"),
    ("drew", "andrew"),
    ("greg", "gregory"),
    ("ted", "edward"),
    ("ed", "edward"),
    ("eddie", "edward"),
    ("larry", "lawrence"),
    ("jerry", "gerald"),
    ("pat", "patricia"),
    ("patty", "patricia"),
    ("liz", "elizabeth"),
    ("beth", "elizabeth"),
    ("betty", "elizabeth"),
    ("betsy", "elizabeth"),
    ("sue", "susan"),
    ("susie", "susan"),
    ("kathy", "katherine"),
    ("kate", "katherine"),
    ("katie", "katherine"),
    ("jen", "jennifer"),
    ("jenny", "jennifer"),
    ("peggy", "margaret"),
    ("maggie", "margaret"),
];

/// Normalise a person name into lowercase "first middle last" tokens.
///
/// "Mr. Gale E. Klappa Jr." -> "gale klappa"
/// "KLAPPA, GALE E" -> "gale klappa"
/// "Dr. Bill J. Smith III" -> "william smith"
///
/// # Algorithm
///
/// 1. Lowercase, collapse whitespace
/// 2. "Last, First Middle[, Suffix]" -> "First Middle Last [Suffix]"
/// 3. Strip punctuation (apostrophes and hyphens inside names survive)
/// 4. Drop single-character tokens (bare initials)
/// 5. Drop leading honorifics and trailing suffixes
/// 6. Expand nicknames
///
/// The result is a fixed point: `normalize_name(normalize_name(x)) == normalize_name(x)`.
pub fn normalize_name(name: &str) -> String {
    name_tokens(name, true).join(" ")
}

fn name_tokens(name: &str, expand_nicknames: bool) -> Vec<String> {
    let lowered = name.trim().to_lowercase();
    if lowered.is_empty() {
        return Vec::new();
    }

    let reordered = reorder_comma_form(&lowered);
    let cleaned = strip_punctuation(&reordered);

    let mut words: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() > 1)
        .collect();

    while let Some(first) = words.first() {
        if HONORIFICS.contains(first) {
            words.remove(0);
        } else {
            break;
        }
    }
    while let Some(last) = words.last() {
        if SUFFIXES.contains(last) {
            words.pop();
        } else {
            break;
        }
    }

    words
        .into_iter()
        .map(|w| {
            if expand_nicknames {
                expand_nickname(w).to_string()
            } else {
                w.to_string()
            }
        })
        .collect()
}

/// "klappa, gale e., jr." -> "gale e. klappa jr."
/// "gale klappa, jr." -> "gale klappa jr."
///
/// Trailing comma segments made only of suffixes or honorifics are
/// qualifiers, not a given name, and stay at the end.
fn reorder_comma_form(name: &str) -> String {
    if !name.contains(',') {
        return name.to_string();
    }
    let mut parts: Vec<&str> = name
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let mut split = parts.len();
    while split > 1 && is_qualifier(parts[split - 1]) {
        split -= 1;
    }
    let qualifiers = parts.split_off(split);

    let mut out: Vec<&str> = match parts.as_slice() {
        [last, given, rest @ ..] => {
            let mut out = vec![*given, *last];
            out.extend(rest);
            out
        }
        [only] => vec![*only],
        [] => Vec::new(),
    };
    out.extend(qualifiers);
    out.join(" ")
}

fn is_qualifier(segment: &str) -> bool {
    let cleaned = strip_punctuation(segment);
    let mut words = cleaned.split_whitespace().peekable();
    words.peek().is_some() && words.all(|w| SUFFIXES.contains(&w) || HONORIFICS.contains(&w))
}

fn strip_punctuation(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_alphanumeric() || c == '\'' || c == '-' {
            out.push(c);
        } else if c == '.' {
            // "j.r." -> "jr"
        } else {
            out.push(' ');
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn expand_nickname(word: &str) -> &str {
    NICKNAMES
        .iter()
        .find(|(nick, _)| *nick == word)
        .map(|(_, formal)| *formal)
        .unwrap_or(word)
}

/// Similarity of two names in `[0, 1]`.
///
/// Equal normal forms score 1.0. Otherwise the token-set Jaccard overlap is
/// used when at least two tokens are shared; failing that, a character-level
/// edit similarity counts only above 0.8.
pub fn similarity(a: &str, b: &str) -> f64 {
    let na = normalize_name(a);
    let nb = normalize_name(b);
    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }
    if na == nb {
        return 1.0;
    }

    let ta: HashSet<&str> = na.split(' ').collect();
    let tb: HashSet<&str> = nb.split(' ').collect();
    let shared = ta.intersection(&tb).count();
    if shared >= 2 {
        let union = ta.union(&tb).count();
        return shared as f64 / union as f64;
    }

    // Normalised Levenshtein; scores run a little below a Ratcliff/Obershelp
    // ratio for the same pair ("jon smith" / "john smith" is 0.90).
    let ratio = strsim::normalized_levenshtein(&na, &nb);
    if ratio > 0.8 { ratio } else { 0.0 }
}

/// Name matching with a configurable acceptance threshold.
#[derive(Debug, Clone, Copy)]
pub struct NameResolver {
    threshold: f64,
}

impl Default for NameResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

impl NameResolver {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn normalize(&self, name: &str) -> String {
        normalize_name(name)
    }

    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        similarity(a, b)
    }

    pub fn is_match(&self, a: &str, b: &str) -> bool {
        similarity(a, b) >= self.threshold
    }

    /// Alternate renderings of `name` to use as search queries, most literal first.
    ///
    /// Always contains the original and normalised forms. With two or more
    /// tokens it adds "First Last", "Last First", "Last, First" and their
    /// upper-case forms; with exactly three it adds middle-initial forms.
    pub fn generate_variations(&self, name: &str) -> Vec<NameVariant> {
        let original = name.trim();
        let mut out = Variations::default();
        if original.is_empty() {
            return out.finish();
        }
        out.push(original.to_string(), VariantSource::Original);

        let plain = name_tokens(original, false);
        let tokens = name_tokens(original, true);
        out.push(plain.join(" "), VariantSource::Normalized);
        if tokens != plain {
            out.push(tokens.join(" "), VariantSource::NicknameExpanded);
        }

        if tokens.len() >= 2 {
            let first = title_case(&tokens[0]);
            let last = title_case(&tokens[tokens.len() - 1]);
            let forms = [
                format!("{first} {last}"),
                format!("{last} {first}"),
                format!("{last}, {first}"),
            ];
            for form in &forms {
                out.push(form.clone(), VariantSource::Reordered);
            }
            for form in &forms {
                out.push(form.to_uppercase(), VariantSource::Reordered);
            }
            if tokens.len() >= 3 {
                // Archive style: LAST FIRST MIDDLE
                let rest: Vec<String> = tokens[..tokens.len() - 1]
                    .iter()
                    .map(|t| t.to_uppercase())
                    .collect();
                out.push(
                    format!("{} {}", last.to_uppercase(), rest.join(" ")),
                    VariantSource::Reordered,
                );
            }
        }

        if tokens.len() == 3 {
            let first = title_case(&tokens[0]);
            let last = title_case(&tokens[2]);
            let initial: String = tokens[1].chars().take(1).collect::<String>().to_uppercase();
            out.push(format!("{first} {initial}. {last}"), VariantSource::Initialed);
            out.push(format!("{last} {first} {initial}"), VariantSource::Initialed);
            out.push(
                format!("{last} {first} {initial}").to_uppercase(),
                VariantSource::Initialed,
            );
        }

        out.finish()
    }
}

#[derive(Default)]
struct Variations {
    seen: HashSet<String>,
    list: Vec<NameVariant>,
}

impl Variations {
    fn push(&mut self, text: String, source: VariantSource) {
        let text = text.trim().to_string();
        if !text.is_empty() && self.seen.insert(text.clone()) {
            self.list.push(NameVariant { text, source });
        }
    }

    fn finish(self) -> Vec<NameVariant> {
        self.list
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(variants: &[NameVariant]) -> Vec<&str> {
        variants.iter().map(|v| v.text.as_str()).collect()
    }

    #[test]
    fn normalize_examples() {
        assert_eq!(normalize_name("Mr. Gale E. Klappa Jr."), "gale klappa");
        assert_eq!(normalize_name("KLAPPA, GALE E"), "gale klappa");
        assert_eq!(normalize_name("Klappa, Gale E., Jr."), "gale klappa");
        assert_eq!(normalize_name("Dr. Bill J. Smith III"), "william smith");
        assert_eq!(normalize_name("KLAPPA GALE E"), "klappa gale");
    }

    #[test]
    fn normalize_collapses_whitespace_and_punctuation() {
        assert_eq!(normalize_name("  Mary   O'Brien-Smith ; "), "mary o'brien-smith");
        assert_eq!(normalize_name(""), "");
        assert_eq!(normalize_name("   "), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        let inputs = [
            "Mr. Gale E. Klappa Jr.",
            "KLAPPA, GALE E",
            "A Mr Smith",
            "Dr. Mr. Jones",
            "Smith, Bill, III",
            "jr",
            "J. R. R. Tolkien",
            "  O'Neil,   Shaquille  Rashaun ",
            "Bob",
            ",,,",
        ];
        for input in inputs {
            let once = normalize_name(input);
            assert_eq!(normalize_name(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn matches_reordered_filer_rendering() {
        let resolver = NameResolver::default();
        assert!(resolver.is_match("Gale Klappa", "KLAPPA GALE E"));
        assert!(resolver.is_match("Gale Klappa", "Klappa, Gale E."));
        assert!(!resolver.is_match("Gale Klappa", "John Smith"));
    }

    #[test]
    fn trailing_suffix_after_comma_is_not_a_given_name() {
        assert_eq!(normalize_name("Gale Klappa, Jr."), "gale klappa");
        assert_eq!(normalize_name("John Smith, III"), "john smith");
        assert_eq!(normalize_name("Klappa, Gale E., Jr."), "gale klappa");
        assert_eq!(normalize_name("Jane Doe, PhD, CPA"), "jane doe");
        let resolver = NameResolver::default();
        assert!(resolver.is_match("Gale Klappa", "Gale Klappa, Jr."));
        assert!(resolver.is_match("John Smith", "SMITH JOHN, III"));
    }

    #[test]
    fn nickname_expansion_matches() {
        assert_eq!(similarity("Bill Gates", "GATES WILLIAM H"), 1.0);
    }

    #[test]
    fn single_shared_token_is_not_enough() {
        assert_eq!(similarity("John Smith", "Jane Smith"), 0.0);
        assert_eq!(similarity("John Smith", "John Smithers"), 0.0);
    }

    #[test]
    fn near_spelling_scores_by_edit_ratio() {
        let score = similarity("Jon Smith", "John Smith");
        assert!(score > 0.8 && score < 1.0, "got {score}");
    }

    #[test]
    fn partial_token_overlap_uses_jaccard() {
        // {gale, klappa} vs {gale, edward, klappa}: 2 shared of 3.
        let score = similarity("Gale Klappa", "Gale Edward Klappa");
        assert!((score - 2.0 / 3.0).abs() < 1e-9);
        assert!(!NameResolver::default().is_match("Gale Klappa", "Gale Edward Klappa"));
        assert!(NameResolver::new(0.6).is_match("Gale Klappa", "Gale Edward Klappa"));
    }

    #[test]
    fn empty_names_never_match() {
        assert_eq!(similarity("", "Gale Klappa"), 0.0);
        assert_eq!(similarity("Mr.", "Dr."), 0.0);
    }

    #[test]
    fn variations_two_tokens() {
        let v = NameResolver::default().generate_variations("Gale Klappa");
        assert_eq!(
            texts(&v),
            vec![
                "Gale Klappa",
                "gale klappa",
                "Klappa Gale",
                "Klappa, Gale",
                "GALE KLAPPA",
                "KLAPPA GALE",
                "KLAPPA, GALE",
            ]
        );
        assert_eq!(v[0].source, VariantSource::Original);
        assert_eq!(v[1].source, VariantSource::Normalized);
        assert_eq!(v[2].source, VariantSource::Reordered);
    }

    #[test]
    fn variations_three_tokens_add_initials() {
        let v = NameResolver::default().generate_variations("Gale Edward Klappa");
        let t = texts(&v);
        assert!(t.contains(&"Gale E. Klappa"));
        assert!(t.contains(&"Klappa Gale E"));
        assert!(t.contains(&"KLAPPA GALE E"));
        assert!(t.contains(&"KLAPPA GALE EDWARD"));
        assert!(v.iter().any(|n| n.source == VariantSource::Initialed));
    }

    #[test]
    fn variations_record_nickname_expansion() {
        let v = NameResolver::default().generate_variations("Bill Gates");
        assert!(v.iter().any(|n| n.text == "bill gates" && n.source == VariantSource::Normalized));
        assert!(
            v.iter()
                .any(|n| n.text == "william gates" && n.source == VariantSource::NicknameExpanded)
        );
        assert!(texts(&v).contains(&"GATES, WILLIAM"));
    }

    #[test]
    fn variations_are_unique() {
        let v = NameResolver::default().generate_variations("gale klappa");
        let unique: HashSet<&str> = texts(&v).into_iter().collect();
        assert_eq!(unique.len(), v.len());
    }

    #[test]
    fn variations_single_token() {
        let v = NameResolver::default().generate_variations("Madonna");
        assert_eq!(texts(&v), vec!["Madonna", "madonna"]);
        assert!(NameResolver::default().generate_variations("  ").is_empty());
    }
}
