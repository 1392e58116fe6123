//! Persian-aware string ordering
//!
//! Unicode code point order misplaces the Persian-only letters (پ چ ژ گ),
//! and the registry mixes Arabic and Persian forms of ی and ک. Strings are
//! compared by a key that follows the Persian alphabet, folds those variants,
//! ignores diacritics and joiners, and compares Latin text case-insensitively.

use std::cmp::Ordering;

/// Persian alphabet in dictionary order
const PERSIAN_ALPHABET: &[char] = &[
    'آ', 'ا', 'ب', 'پ', 'ت', 'ث', 'ج', 'چ', 'ح', 'خ', 'د', 'ذ', 'ر', 'ز', 'ژ', 'س', 'ش', 'ص', 'ض',
    'ط', 'ظ', 'ع', 'غ', 'ف', 'ق', 'ک', 'گ', 'ل', 'م', 'ن', 'و', 'ه', 'ی',
];

/// Script classes; earlier classes sort first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Class {
    Space,
    Digit,
    Latin,
    Persian,
    Other,
}

fn fold(c: char) -> Option<char> {
    match c {
        // zero-width joiners, tatweel
        '\u{200c}' | '\u{200d}' | '\u{0640}' => None,
        // harakat and other combining marks
        '\u{064b}'..='\u{065f}' | '\u{0670}' => None,
        'ي' | 'ى' | 'ئ' => Some('ی'),
        'ك' => Some('ک'),
        'أ' | 'إ' | 'ٱ' => Some('ا'),
        'ة' | 'ۀ' => Some('ه'),
        'ؤ' => Some('و'),
        '۰'..='۹' => char::from_u32(c as u32 - '۰' as u32 + '0' as u32),
        '٠'..='٩' => char::from_u32(c as u32 - '٠' as u32 + '0' as u32),
        _ => Some(c),
    }
}

fn key_of(c: char) -> (Class, u32) {
    if c.is_whitespace() {
        (Class::Space, 0)
    } else if c.is_ascii_digit() {
        (Class::Digit, c as u32)
    } else if c.is_alphabetic() && c.is_ascii() {
        (Class::Latin, c.to_ascii_lowercase() as u32)
    } else if let Some(rank) = PERSIAN_ALPHABET.iter().position(|&p| p == c) {
        (Class::Persian, rank as u32)
    } else if c.is_alphabetic() {
        // other Latin-script letters (accented) sort with Latin by lower-case code point
        let lower = c.to_lowercase().next().unwrap_or(c);
        (Class::Latin, lower as u32)
    } else {
        (Class::Other, c as u32)
    }
}

/// Collation key for `s`
pub fn sort_key(s: &str) -> Vec<(u8, u32)> {
    s.trim()
        .chars()
        .filter_map(fold)
        .map(key_of)
        .map(|(class, weight)| (class as u8, weight))
        .collect()
}

/// Compare two strings by collation key, then by raw text for a total order
pub fn compare(a: &str, b: &str) -> Ordering {
    sort_key(a).cmp(&sort_key(b)).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persian_letters_follow_alphabet() {
        // Code point order would put پ (U+067E) after ت (U+062A)
        assert_eq!(compare("پروفن", "تترا"), Ordering::Less);
        // گ (U+06AF) comes after ل (U+0644) in code point order
        assert_eq!(compare("گلوکز", "لوزارتان"), Ordering::Less);
        assert_eq!(compare("چای", "حب"), Ordering::Less);
    }

    #[test]
    fn test_arabic_variants_fold() {
        assert_eq!(sort_key("كيك"), sort_key("کیک"));
        assert_eq!(sort_key("بسته‌بندی"), sort_key("بستهبندی"));
    }

    #[test]
    fn test_latin_is_case_insensitive() {
        assert_eq!(compare("aspirin", "Brufen"), Ordering::Less);
        assert_eq!(compare("Zinc", "acetaminophen"), Ordering::Greater);
        assert_ne!(compare("abc", "ABC"), Ordering::Equal);
    }

    #[test]
    fn test_digits_sort_before_letters() {
        assert_eq!(compare("5-FU", "Abacavir"), Ordering::Less);
        assert_eq!(compare("۲۰", "10"), Ordering::Greater);
    }
}
