//! Lookup-key normalization for free-form grade and day strings.
//!
//! Grade keys are trimmed, lowercased and have internal whitespace collapsed,
//! so "Grade  5" and "grade 5" land on the same timetable slot. Day keys are
//! trimmed and capitalized. Fuzzy day resolution absorbs minor typos by
//! matching case-insensitive prefixes and substrings against already-stored
//! keys; the matched stored key is returned so callers can report what was
//! actually used.

/// Normalize a grade string to a stable lookup key.
pub fn normalize_grade(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    trimmed
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalize a day string to a stable key (trimmed, first letter upper,
/// rest lower: "MONDAY" -> "Monday").
pub fn normalize_day(raw: &str) -> String {
    capitalize(raw.trim())
}

/// Capitalize the first character and lowercase the rest.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Find the stored day key best matching a raw day string.
///
/// Exact case-insensitive matches win; otherwise the first stored key (in
/// insertion order) where either string is a case-insensitive prefix of the
/// other, or the stored key contains the raw string, is returned. Multiple
/// candidates tie-break on insertion order, which can pick the wrong variant
/// when stored keys are similar ("Mon" vs "Monday"); accepted as-is.
pub fn resolve_stored_day<'a>(stored_days: &[&'a str], raw_day: &str) -> Option<&'a str> {
    let want = raw_day.trim().to_lowercase();
    if want.is_empty() {
        return None;
    }

    if let Some(key) = stored_days.iter().find(|k| k.to_lowercase() == want) {
        return Some(key);
    }

    stored_days
        .iter()
        .find(|k| {
            let kl = k.to_lowercase();
            kl.starts_with(&want) || want.starts_with(&kl) || kl.contains(&want)
        })
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_grade_collapses_whitespace() {
        assert_eq!(normalize_grade("Grade  5"), "grade 5");
        assert_eq!(normalize_grade("grade 5"), "grade 5");
        assert_eq!(normalize_grade("  GRADE \t 5  "), "grade 5");
    }

    #[test]
    fn test_normalize_grade_empty() {
        assert_eq!(normalize_grade(""), "");
        assert_eq!(normalize_grade("   "), "");
    }

    #[test]
    fn test_normalize_day_capitalizes() {
        assert_eq!(normalize_day("monday"), "Monday");
        assert_eq!(normalize_day("MONDAY"), "Monday");
        assert_eq!(normalize_day("  tuesday "), "Tuesday");
    }

    #[test]
    fn test_normalize_day_empty() {
        assert_eq!(normalize_day(""), "");
        assert_eq!(normalize_day("  "), "");
    }

    #[test]
    fn test_resolve_exact_case_insensitive() {
        let stored = ["Monday", "Tuesday"];
        assert_eq!(resolve_stored_day(&stored, "monday"), Some("Monday"));
        assert_eq!(resolve_stored_day(&stored, "TUESDAY"), Some("Tuesday"));
    }

    #[test]
    fn test_resolve_prefix_and_substring() {
        let stored = ["Monday"];
        assert_eq!(resolve_stored_day(&stored, "Mon"), Some("Monday"));
        assert_eq!(resolve_stored_day(&stored, "mond"), Some("Monday"));
        assert_eq!(resolve_stored_day(&stored, "onda"), Some("Monday"));
        // raw longer than stored key, stored key is a prefix of it
        assert_eq!(resolve_stored_day(&["Mon"], "monday"), Some("Mon"));
    }

    #[test]
    fn test_resolve_no_match() {
        let stored = ["Monday", "Tuesday"];
        assert_eq!(resolve_stored_day(&stored, "Friday"), None);
        assert_eq!(resolve_stored_day(&stored, ""), None);
        assert_eq!(resolve_stored_day(&[], "Monday"), None);
    }

    #[test]
    fn test_resolve_exact_beats_loose() {
        // "Mon" matches both keys loosely but "Mon" exactly
        let stored = ["Monday", "Mon"];
        assert_eq!(resolve_stored_day(&stored, "mon"), Some("Mon"));
    }

    #[test]
    fn test_resolve_first_loose_match_wins() {
        let stored = ["Monday", "Mon2"];
        assert_eq!(resolve_stored_day(&stored, "mo"), Some("Monday"));
    }
}
