use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref TOKEN: Regex = Regex::new(r"[a-z0-9]+").expect("valid regex");
    static ref SHORT_NAMESPACE: Regex = Regex::new(r"^:[^:]{2}:").expect("valid regex");
}

const SKIPPED_LINK_NAMESPACES: &[&str] = &["category:", "file:", "image:", "portal:"];

/// ASCII spelling for lower-case letters that have no canonical decomposition.
fn transliterate(c: char) -> Option<&'static str> {
    Some(match c {
        'ß' => "ss",
        'æ' => "ae",
        'œ' => "oe",
        'ø' => "o",
        'đ' | 'ð' => "d",
        'þ' => "th",
        'ł' => "l",
        'ı' => "i",
        'ħ' => "h",
        _ => return None,
    })
}

/// Lowercase, strip accents, drop apostrophes and turn other punctuation into spaces.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.nfd().filter(|c| !is_combining_mark(*c)).flat_map(char::to_lowercase) {
        match c {
            '\'' | '\u{2019}' => {}
            c if c.is_alphanumeric() || c.is_whitespace() => match transliterate(c) {
                Some(ascii) => out.push_str(ascii),
                None => out.push(c),
            },
            _ => out.push(' '),
        }
    }
    out
}

/// Tokenize text into terms: every run of ASCII letters and digits in the cleaned text.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned = clean_text(text);
    TOKEN.find_iter(&cleaned).map(|m| m.as_str().to_string()).collect()
}

/// Normalizes a hyperlink target into a page key, or `None` when the link
/// points into a namespace that never names an article.
pub fn normalize_link(target: &str) -> Option<String> {
    let mut link = target.trim().to_lowercase();
    if SKIPPED_LINK_NAMESPACES.iter().any(|ns| link.contains(ns)) {
        return None;
    }
    if let Some(rest) = link.strip_prefix("ns:").or_else(|| link.strip_prefix("s:")) {
        link = rest.to_string();
    } else if let Some(marker) = SHORT_NAMESPACE.find(&link) {
        link = link[marker.end()..].to_string();
    }
    if let Some(hash) = link.find('#') {
        link.truncate(hash);
    }
    let link = link.trim();
    if link.is_empty() {
        None
    } else {
        Some(link.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Running, runner's run!");
        assert_eq!(t, vec!["running", "runners", "run"]);
    }

    #[test]
    fn unicode_punctuation_separates_words() {
        let t = tokenize("the \u{201c}quick\u{201d} fox, 1990\u{2013}2000 word\u{2014}another\u{2026}");
        assert_eq!(t, vec!["the", "quick", "fox", "1990", "2000", "word", "another"]);
        assert_eq!(tokenize("Newton\u{2019}s law"), vec!["newtons", "law"]);
    }

    #[test]
    fn undecomposable_letters_are_transliterated() {
        assert_eq!(tokenize("Gau\u{df} \u{c6}sir \u{141}\u{f3}d\u{17a} \u{d8}rsted"), vec!["gauss", "aesir", "lodz", "orsted"]);
    }

    #[test]
    fn links_lose_fragments_and_namespaces() {
        assert_eq!(normalize_link("Newton#Laws").as_deref(), Some("newton"));
        assert_eq!(normalize_link("s:Principia").as_deref(), Some("principia"));
        assert_eq!(normalize_link("ns:Principia").as_deref(), Some("principia"));
        assert_eq!(normalize_link(":en:Calculus").as_deref(), Some("calculus"));
        assert_eq!(normalize_link("Category:Physics"), None);
        assert_eq!(normalize_link("Image:Apple.png"), None);
        assert_eq!(normalize_link("#top"), None);
    }
}
