//! Name normalization and fuzzy similarity scoring.
//!
//! Pure functions used by the entity resolver: normalize surface forms so that
//! superficial formatting differences ("Type 2 Diabetes" vs "type-2-diabetes")
//! do not block a match, then score normalized names with a Levenshtein ratio.

/// Punctuation stripped during normalization (replaced with a space).
pub const DEFAULT_STRIP_CHARS: &str = "-_,.;:/()";

/// Normalize a surface form with the default punctuation set.
pub fn normalize_name(name: &str) -> String {
    normalize_name_with(name, DEFAULT_STRIP_CHARS)
}

/// Normalize a surface form: case-fold, map the given punctuation characters
/// to spaces, collapse whitespace runs, and trim.
///
/// Idempotent: normalizing an already-normalized name is a no-op.
pub fn normalize_name_with(name: &str, strip_chars: &str) -> String {
    let mapped: String = name
        .chars()
        .map(|c| {
            if strip_chars.contains(c) || c.is_whitespace() {
                ' '
            } else {
                c
            }
        })
        .collect();

    // Collapse whitespace runs and lowercase in one pass
    mapped
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized similarity between two names in [0, 1].
///
/// Both inputs are normalized before scoring, so the score is case-insensitive
/// and ignores the default punctuation set. 1.0 means the normalized forms are
/// identical; the score decreases with edit distance relative to length.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    name_similarity_with(a, b, DEFAULT_STRIP_CHARS)
}

/// `name_similarity` with a caller-supplied punctuation strip set.
pub fn name_similarity_with(a: &str, b: &str, strip_chars: &str) -> f64 {
    let a = normalize_name_with(a, strip_chars);
    let b = normalize_name_with(b, strip_chars);
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    strsim::normalized_levenshtein(&a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_case_and_trim() {
        assert_eq!(normalize_name("  BRCA1 "), "brca1");
        assert_eq!(normalize_name("Insulin"), "insulin");
    }

    #[test]
    fn test_normalize_punctuation_to_spaces() {
        assert_eq!(normalize_name("type-2-diabetes"), "type 2 diabetes");
        assert_eq!(normalize_name("alpha_synuclein (SNCA)"), "alpha synuclein snca");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize_name("Type  2\tDiabetes"), "type 2 diabetes");
    }

    #[test]
    fn test_normalize_idempotent() {
        let once = normalize_name("Type-2 Diabetes");
        assert_eq!(normalize_name(&once), once);
    }

    #[test]
    fn test_similarity_identical_after_normalization() {
        let score = name_similarity("Type 2 Diabetes", "type-2-diabetes");
        assert!((score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_similarity_exceeds_acceptance_threshold() {
        // Formatting-only differences must clear the 0.85 acceptance threshold
        assert!(name_similarity("Type 2 Diabetes", "type-2-diabetes") > 0.85);
        assert!(name_similarity("Alzheimer's Disease", "alzheimers disease") > 0.85);
    }

    #[test]
    fn test_similarity_distinct_names_below_threshold() {
        // Related but distinct conditions must not clear the threshold
        assert!(name_similarity("Diabetes", "Diabetic Retinopathy") < 0.85);
        assert!(name_similarity("TP53", "TNF") < 0.85);
    }

    #[test]
    fn test_similarity_decreases_with_edit_distance() {
        let close = name_similarity("metformin", "metformine");
        let far = name_similarity("metformin", "metoprolol");
        assert!(close > far);
    }

    #[test]
    fn test_similarity_bounds() {
        let score = name_similarity("aspirin", "zoledronate");
        assert!((0.0..=1.0).contains(&score));
        assert!((name_similarity("x", "x") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_similarity_custom_strip_set() {
        // With '+' in the strip set, "IL-6+" and "IL 6" normalize identically
        let score = name_similarity_with("IL-6+", "IL 6", "-+");
        assert!((score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_similarity_empty_inputs() {
        assert!((name_similarity("", "") - 1.0).abs() < f64::EPSILON);
        assert!(name_similarity("gene", "") < 0.5);
    }
}
