//! Identifier normalization and the closed variation rule set.

/// Lowercase, trim, and collapse internal whitespace runs to one space.
pub fn normalize(id: &str) -> String {
    id.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Separators that the variation rules rewrite.
fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '.' | '_' | '-')
}

/// Every rule in the variation set, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariationRule {
    Canonical,
    /// Only letters and digits kept.
    Compact,
    Underscored,
    Hyphenated,
    DigitsStripped,
}

impl VariationRule {
    pub const ALL: [VariationRule; 5] = [
        VariationRule::Canonical,
        VariationRule::Compact,
        VariationRule::Underscored,
        VariationRule::Hyphenated,
        VariationRule::DigitsStripped,
    ];

    /// Apply to an already-normalized identifier.
    pub fn apply(self, canonical: &str) -> String {
        match self {
            VariationRule::Canonical => canonical.to_string(),
            VariationRule::Compact => canonical.chars().filter(|c| c.is_alphanumeric()).collect(),
            VariationRule::Underscored => replace_separators(canonical, '_'),
            VariationRule::Hyphenated => replace_separators(canonical, '-'),
            VariationRule::DigitsStripped => {
                let stripped: String = canonical.chars().filter(|c| !c.is_ascii_digit()).collect();
                stripped.trim_matches(is_separator).to_string()
            }
        }
    }
}

fn replace_separators(s: &str, with: char) -> String {
    s.chars()
        .map(|c| if is_separator(c) { with } else { c })
        .collect()
}

/// Canonical form first, then each rule's output, without duplicates or empties.
pub fn variations(id: &str) -> Vec<String> {
    let canonical = normalize(id);
    let mut out: Vec<String> = Vec::with_capacity(VariationRule::ALL.len());
    for rule in VariationRule::ALL {
        let v = rule.apply(&canonical);
        if !v.is_empty() && !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  John   DOE "), "john doe");
        assert_eq!(normalize("Alice_99"), "alice_99");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_variation_rules() {
        let v = variations("John Doe 42");
        assert_eq!(
            v,
            vec![
                "john doe 42".to_string(),
                "johndoe42".to_string(),
                "john_doe_42".to_string(),
                "john-doe-42".to_string(),
                "john doe".to_string(),
            ]
        );
    }

    #[test]
    fn test_variations_dedup_and_skip_empty() {
        assert_eq!(variations("alice"), vec!["alice".to_string()]);
        assert_eq!(variations("12345"), vec!["12345".to_string()]);
        assert!(variations("  ").is_empty());
    }

    #[test]
    fn test_separator_family_is_interchangeable() {
        let a = variations("john.doe");
        let b = variations("john-doe");
        assert!(a.contains(&"john_doe".to_string()));
        assert!(b.contains(&"john_doe".to_string()));
    }
}
