//! Text normalization applied to every extracted unit.
//!
//! Keeps word characters (Unicode alphanumerics and `_`), whitespace, and
//! the punctuation `.,;:?!-`; everything else (symbols, control bytes,
//! quotes, brackets) is dropped. Whitespace runs then collapse to a single
//! space and the result is trimmed.

/// Punctuation kept by [`clean_text`].
const KEPT_PUNCTUATION: &[char] = &['.', ',', ';', ':', '?', '!', '-'];

fn is_kept(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c.is_whitespace() || KEPT_PUNCTUATION.contains(&c)
}

/// Clean and normalize extracted text.
///
/// ```rust
/// use lexctx_core::clean::clean_text;
///
/// assert_eq!(clean_text("  Force   majeure (§ 12)\n\napplies!  "), "Force majeure 12 applies!");
/// ```
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.chars().filter(|c| is_kept(*c)) {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_symbols_and_controls() {
        assert_eq!(clean_text("a\u{0}b\u{7}c © d"), "abc d");
        assert_eq!(clean_text("\"quoted\" [bracket] {brace}"), "quoted bracket brace");
    }

    #[test]
    fn keeps_allowed_punctuation() {
        let s = "Clause 4.2: the party, if any; shall - notify? yes!";
        assert_eq!(clean_text(s), s);
    }

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(clean_text("one\t\ttwo\n\n\nthree   four"), "one two three four");
    }

    #[test]
    fn keeps_unicode_word_characters() {
        assert_eq!(clean_text("Vertragsstrafe für Verzug_x"), "Vertragsstrafe für Verzug_x");
    }

    #[test]
    fn whitespace_only_becomes_empty() {
        assert_eq!(clean_text(" \n\t \r\n "), "");
        assert_eq!(clean_text("@@ ## $$"), "");
    }
}
