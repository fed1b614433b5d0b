//! Text normalization shared by identity keys, lookups and stored display text

use crate::types::CellValue;

/// Trim, collapse every whitespace run (newlines included) to one space,
/// then title-case.
///
/// A letter is uppercased when it does not follow another letter, otherwise
/// lowercased, so `"o'brien"` becomes `"O'Brien"` and `"3rd"` becomes `"3Rd"`.
pub fn normalize_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, word) in value.split_whitespace().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        push_title_case(&mut out, word);
    }
    out
}

/// `normalize_text` for a raw grid cell; anything that is not text yields `""`
pub fn normalize_cell(value: &CellValue) -> String {
    match value {
        CellValue::Text(s) => normalize_text(s),
        _ => String::new(),
    }
}

fn is_cased(c: char) -> bool {
    c.is_lowercase() || c.is_uppercase()
}

/// Title-cases the lowercased word. Whether a character starts a run is
/// decided by the previously *emitted* character, so lowercasing the output
/// reproduces the same sequence and a second pass changes nothing.
fn push_title_case(out: &mut String, word: &str) {
    let mut prev_cased = false;
    for c in word.chars().flat_map(char::to_lowercase) {
        if prev_cased {
            out.push(c);
            prev_cased = is_cased(c);
            continue;
        }
        // Uppercase expansions (e.g. 'ß', 'ŉ') keep only their first cased char upper
        for u in c.to_uppercase() {
            if prev_cased {
                for l in u.to_lowercase() {
                    out.push(l);
                    prev_cased = is_cased(l);
                }
            } else {
                out.push(u);
                prev_cased = is_cased(u);
            }
        }
    }
}
