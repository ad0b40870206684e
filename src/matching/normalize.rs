// src/matching/normalize.rs - Canonical forms of owner names and plot ids
use once_cell::sync::Lazy;
use regex::Regex;

// Longer alternatives first so "shri" and "mrs" win over "sh" and "mr".
static HONORIFIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?:shri|smt|mrs|mr|ms|dr|prof|sh)(?:\.\s*|\s+)|(?:श्रीमती|श्री)(?:\.\s*|\s+))+")
        .expect("honorific pattern is valid")
});

// Rust's `\w` is Unicode aware and covers Devanagari letters and combining marks.
static PUNCTUATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("punctuation pattern is valid"));

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

static PLOT_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-/\\.]").expect("plot separator pattern is valid"));

/// Lower-cases, drops honorific prefixes and punctuation, collapses whitespace.
pub fn normalize_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let without_title = HONORIFIC_RE.replace(&lowered, "");
    let without_punct = PUNCTUATION_RE.replace_all(&without_title, " ");
    WHITESPACE_RE.replace_all(without_punct.trim(), " ").into_owned()
}

/// `KH-123`, `kh 0123` and `Kh/123` all become `kh123`.
///
/// Separators are removed before zero-stripping, so `12/03` becomes
/// `1203` and stays distinct from `123`.
pub fn normalize_plot_id(plot_id: &str) -> String {
    let lowered = plot_id.trim().to_lowercase();
    let joined = PLOT_SEPARATOR_RE.replace_all(&lowered, "");
    joined
        .split_whitespace()
        .map(|part| {
            let cleaned: String = part.chars().filter(|c| c.is_alphanumeric()).collect();
            if !cleaned.is_empty() && cleaned.chars().all(|c| c.is_ascii_digit()) {
                let trimmed = cleaned.trim_start_matches('0');
                if trimmed.is_empty() {
                    "0".to_string()
                } else {
                    trimmed.to_string()
                }
            } else {
                cleaned
            }
        })
        .collect()
}

/// First token of the normalized name, used as a blocking key.
pub fn first_token(name: &str) -> Option<String> {
    normalize_name(name).split(' ').next().filter(|t| !t.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name_strips_titles_and_noise() {
        assert_eq!(normalize_name("  Shri RAMESH   kumar "), "ramesh kumar");
        assert_eq!(normalize_name("Dr. Anita Sharma"), "anita sharma");
        assert_eq!(normalize_name("Smt.Kamla Devi"), "kamla devi");
        assert_eq!(normalize_name("Mohan Lal, s/o Ram"), "mohan lal s o ram");
        // Names that merely start with a title's letters are untouched.
        assert_eq!(normalize_name("Shankar Drona"), "shankar drona");
        assert_eq!(normalize_name("Mrityunjay"), "mrityunjay");
    }

    #[test]
    fn test_normalize_name_keeps_devanagari() {
        assert_eq!(normalize_name("श्री रमेश  कुमार"), "रमेश कुमार");
        assert_eq!(normalize_name("श्रीमती सीता देवी"), "सीता देवी");
        assert_eq!(normalize_name("श्रीराम"), "श्रीराम");
    }

    #[test]
    fn test_normalize_name_empty() {
        assert_eq!(normalize_name(""), "");
        assert_eq!(normalize_name("   "), "");
        assert_eq!(normalize_name("..."), "");
    }

    #[test]
    fn test_normalize_plot_id() {
        assert_eq!(normalize_plot_id("KH-123"), "kh123");
        assert_eq!(normalize_plot_id("kh 0123"), "kh123");
        assert_eq!(normalize_plot_id("Kh/123"), "kh123");
        assert_eq!(normalize_plot_id("112/003"), "112003");
        assert_eq!(normalize_plot_id("0/0"), "0");
        assert_eq!(normalize_plot_id("00 7"), "07");
        assert_eq!(normalize_plot_id(" - "), "");
    }

    #[test]
    fn test_subdivided_plot_ids_stay_distinct() {
        assert_eq!(normalize_plot_id("12/03"), "1203");
        assert_ne!(normalize_plot_id("12/03"), normalize_plot_id("123"));
        assert_ne!(normalize_plot_id("KH-12/03"), normalize_plot_id("KH-123"));
        assert_eq!(normalize_plot_id("kh 12.03"), normalize_plot_id("KH-12/03"));
    }

    #[test]
    fn test_first_token() {
        assert_eq!(first_token("Shri Ramesh Kumar").as_deref(), Some("ramesh"));
        assert_eq!(first_token("  "), None);
    }
}
