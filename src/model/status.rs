//! Shared shape for kind-specific status enumerations (`spec.md` §4.4, §9(b)).
//!
//! Each kind validates its status against a fixed set on write, but folds
//! a handful of recognized synonyms (`in_progress` → `active`, etc.) on
//! read so foreign tooling or dashboard views using the synonym don't get
//! rejected. The store itself always canonicalizes on write.

/// A kind-specific status enum backed by a fixed set of canonical spellings
/// plus optional synonyms.
pub trait StatusEnum: Sized + Copy + PartialEq {
    /// All canonical variants, for error messages listing the fixed set.
    const VARIANTS: &'static [Self];

    /// The canonical lowercase spelling written to disk.
    fn canonical(self) -> &'static str;

    /// Parses a canonical spelling (not a synonym) into a variant.
    fn parse_canonical(s: &str) -> Option<Self>;

    /// Synonym → canonical spelling pairs accepted on read (§9(b)).
    fn synonyms() -> &'static [(&'static str, &'static str)] {
        &[]
    }

    /// Parses a case-folded value, trying canonical spellings first and
    /// then synonyms.
    fn parse(raw: &str) -> Option<Self> {
        let folded = raw.to_lowercase();
        if let Some(v) = Self::parse_canonical(&folded) {
            return Some(v);
        }
        for (synonym, canonical) in Self::synonyms() {
            if *synonym == folded {
                return Self::parse_canonical(canonical);
            }
        }
        None
    }

    /// A human-readable list of the fixed set, for validation error
    /// messages.
    fn fixed_set() -> String {
        Self::VARIANTS
            .iter()
            .map(|v| v.canonical())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
