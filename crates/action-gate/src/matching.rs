//! Text matching rules shared by the gates

use cartpilot_core_types::{ExpectedAddress, PostalCode};
use regex::Regex;

/// First postal code in `text` according to the platform pattern
pub fn extract_postal_code(pattern: &Regex, text: &str) -> Option<PostalCode> {
    pattern
        .find_iter(text)
        .find_map(|found| PostalCode::normalize(found.as_str()))
}

/// Whether any postal code in `text` equals the expected one
pub fn contains_postal_code(pattern: &Regex, text: &str, expected: &PostalCode) -> bool {
    pattern
        .find_iter(text)
        .filter_map(|found| PostalCode::normalize(found.as_str()))
        .any(|code| &code == expected)
}

/// Rank of an address option against the expected address.
///
/// 3: postal code and locality, 2: postal code only, 1: locality only, 0: no match.
pub fn option_score(pattern: &Regex, text: &str, expected: &ExpectedAddress) -> u8 {
    let postal = contains_postal_code(pattern, text, &expected.postal_code);
    let locality = expected.locality_matches(text);
    match (postal, locality) {
        (true, true) => 3,
        (true, false) => 2,
        (false, true) => 1,
        (false, false) => 0,
    }
}

/// Index of the best option; the first one wins ties. `None` when nothing scores.
pub fn best_option<'a, I>(pattern: &Regex, options: I, expected: &ExpectedAddress) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(usize, u8)> = None;
    for (index, text) in options.into_iter().enumerate() {
        let score = option_score(pattern, text, expected);
        if score == 0 {
            continue;
        }
        if best.map(|(_, top)| score > top).unwrap_or(true) {
            best = Some((index, score));
        }
    }
    best.map(|(index, _)| index)
}

/// Leading integer in a quantity label like "Qty: 2" or "2"
pub fn parse_count(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
