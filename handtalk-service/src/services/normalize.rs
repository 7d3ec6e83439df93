//! Canonical form of search text.
//!
//! Arabic spelling varies on a few letters (hamza carriers on alef, teh marbuta
//! written as heh, alef maksura written as yeh). Folding those to one form lets
//! a plain substring test match either spelling.

const ALEF: char = '\u{0627}';
const HEH: char = '\u{0647}';
const YEH: char = '\u{064A}';

/// Map a single letter to its canonical form.
fn fold_letter(c: char) -> char {
    match c {
        // أ إ آ
        '\u{0623}' | '\u{0625}' | '\u{0622}' => ALEF,
        // ة
        '\u{0629}' => HEH,
        // ى
        '\u{0649}' => YEH,
        other => other,
    }
}

/// Lowercase, trim and fold Arabic letter variants.
///
/// Total over all inputs and idempotent.
pub fn normalize(text: &str) -> String {
    text.to_lowercase().trim().chars().map(fold_letter).collect()
}
