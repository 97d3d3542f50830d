//! Filesystem-safe names from track titles

/// Characters replaced by an underscore
const TO_UNDERSCORE: &[char] = &[' ', '.', '*'];

/// Characters replaced by a hyphen
const TO_HYPHEN: &[char] = &['/', ':', '\\'];

/// Characters dropped entirely
const DELETED: &[char] = &[
    '?', ',', ';', '(', ')', '!', '"', '\'', '&', '<', '>', '|', '’', '¡',
];

/// Map a track title onto a filename fragment
///
/// Idempotent: the output never contains a character the table rewrites.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| !DELETED.contains(c))
        .map(|c| {
            if TO_UNDERSCORE.contains(&c) {
                '_'
            } else if TO_HYPHEN.contains(&c) {
                '-'
            } else {
                c
            }
        })
        .collect()
}

/// Whether `c` would be changed or removed by [`sanitize_title`]
pub fn is_rewritten(c: char) -> bool {
    TO_UNDERSCORE.contains(&c) || TO_HYPHEN.contains(&c) || DELETED.contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_substitutions() {
        assert_eq!(sanitize_title("Song 2.0*"), "Song_2_0_");
        assert_eq!(sanitize_title("AC/DC: Live\\Mix"), "AC-DC-_Live-Mix");
    }

    #[test]
    fn test_sanitize_deletions() {
        assert_eq!(
            sanitize_title("What's Up? (Live, Pt. 1)!"),
            "Whats_Up_Live_Pt__1"
        );
        assert_eq!(sanitize_title("¡Rock & Roll’s <Best> \"Hits\" | ;"), "Rock__Rolls_Best_Hits__");
    }

    #[test]
    fn test_sanitize_keeps_other_unicode() {
        assert_eq!(sanitize_title("Für Elise"), "Für_Elise");
        assert_eq!(sanitize_title("日本語"), "日本語");
    }

    #[test]
    fn test_sanitize_idempotent() {
        let once = sanitize_title("A: B / C. (D)?");
        assert_eq!(sanitize_title(&once), once);
    }

    #[test]
    fn test_is_rewritten() {
        assert!(is_rewritten(' '));
        assert!(is_rewritten('’'));
        assert!(!is_rewritten('_'));
        assert!(!is_rewritten('-'));
    }
}
