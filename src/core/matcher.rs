//! Port matchers derived from service definition fields
//!
//! A port field in a service definition is one of three things: a literal
//! port number, an inclusive range `low:high`, or a template embedding an
//! instance-number placeholder that expands into a two-digit wildcard
//! (`3__INST_NUM__15` matches 30015, 30115, ... 39915). Matching is always
//! against the decimal string form of a port.

use crate::core::error::{Error, Result};
use regex::Regex;

/// Placeholder for the two-digit HANA instance number.
pub const INST_NUM_TOKEN: &str = "__INST_NUM__";
/// Placeholder for the instance number plus one (used by a few services
/// whose port block sits one instance slot higher).
pub const INST_NUM_PLUS_ONE_TOKEN: &str = "__INST_NUM+1__";

const TWO_DIGIT_WILDCARD: &str = "[0-9]{2}";

/// A single "does this port match" predicate.
///
/// Equality is structural: two `Pattern` matchers are equal when their
/// pattern texts are equal, two `Range` matchers when their bounds are.
#[derive(Debug, Clone)]
pub enum PortMatcher {
    /// Whole-string regular expression match.
    Pattern { pattern: String, regex: Regex },
    /// Inclusive numeric range.
    Range { low: u64, high: u64 },
}

impl PartialEq for PortMatcher {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Pattern { pattern: a, .. }, Self::Pattern { pattern: b, .. }) => a == b,
            (
                Self::Range { low: a, high: b },
                Self::Range {
                    low: c,
                    high: d,
                },
            ) => a == c && b == d,
            _ => false,
        }
    }
}

impl Eq for PortMatcher {}

impl PortMatcher {
    /// Builds a whole-string pattern matcher. The pattern is anchored at
    /// both ends before compilation.
    pub fn pattern(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^{pattern}$")).map_err(|source| Error::PortPattern {
            pattern: pattern.to_owned(),
            source,
        })?;
        Ok(Self::Pattern {
            pattern: pattern.to_owned(),
            regex,
        })
    }

    /// Builds an inclusive range matcher.
    pub fn range(low: u64, high: u64) -> Self {
        Self::Range { low, high }
    }

    /// Interprets a raw port field from a service definition.
    ///
    /// Instance-number placeholders each become a two-digit wildcard in a
    /// pattern matcher; a colon splits an inclusive range (non-numeric
    /// bounds read as 0); anything else is a literal pattern.
    pub fn from_field(field: &str) -> Result<Self> {
        if field.contains(INST_NUM_TOKEN) || field.contains(INST_NUM_PLUS_ONE_TOKEN) {
            let expanded = field
                .replace(INST_NUM_PLUS_ONE_TOKEN, TWO_DIGIT_WILDCARD)
                .replace(INST_NUM_TOKEN, TWO_DIGIT_WILDCARD);
            Self::pattern(&expanded)
        } else if let Some((low, high)) = field.split_once(':') {
            Ok(Self::range(
                low.trim().parse().unwrap_or(0),
                high.trim().parse().unwrap_or(0),
            ))
        } else {
            Self::pattern(field)
        }
    }

    /// Tests a port number in decimal string form. For range matchers,
    /// non-numeric input compares as 0.
    pub fn matches(&self, port: &str) -> bool {
        match self {
            Self::Pattern { regex, .. } => regex.is_match(port),
            Self::Range { low, high } => {
                let port: u64 = port.parse().unwrap_or(0);
                (*low..=*high).contains(&port)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_number_template() {
        let m = PortMatcher::from_field("1__INST_NUM__2").unwrap();
        assert_eq!(m, PortMatcher::pattern("1[0-9]{2}2").unwrap());
        assert!(m.matches("1002"));
        assert!(m.matches("1452"));
        assert!(m.matches("1992"));
        assert!(!m.matches("145"));
        assert!(!m.matches("14520"));
    }

    #[test]
    fn test_instance_number_plus_one_template() {
        let m = PortMatcher::from_field("3__INST_NUM+1__09").unwrap();
        assert!(m.matches("30109"));
        assert!(m.matches("39909"));
        assert!(!m.matches("3009"));
    }

    #[test]
    fn test_range_field() {
        let m = PortMatcher::from_field("10050:10054").unwrap();
        assert_eq!(m, PortMatcher::range(10050, 10054));
        assert!(m.matches("10050"));
        assert!(m.matches("10052"));
        assert!(m.matches("10054"));
        assert!(!m.matches("10049"));
        assert!(!m.matches("10055"));
    }

    #[test]
    fn test_range_non_numeric_input_is_zero() {
        let m = PortMatcher::range(0, 10);
        assert!(m.matches("junk"));
        let m = PortMatcher::range(1, 10);
        assert!(!m.matches("junk"));
    }

    #[test]
    fn test_range_non_numeric_bounds_are_zero() {
        let m = PortMatcher::from_field("abc:def").unwrap();
        assert_eq!(m, PortMatcher::range(0, 0));
        assert!(m.matches("0"));
        assert!(!m.matches("1"));
    }

    #[test]
    fn test_literal_field() {
        let m = PortMatcher::from_field("30015").unwrap();
        assert!(m.matches("30015"));
        assert!(!m.matches("3001"));
        assert!(!m.matches("300155"));
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(
            PortMatcher::from_field("34").unwrap(),
            PortMatcher::pattern("34").unwrap()
        );
        assert_ne!(
            PortMatcher::pattern("34").unwrap(),
            PortMatcher::range(34, 34)
        );
        assert_eq!(PortMatcher::range(1, 2), PortMatcher::range(1, 2));
        assert_ne!(PortMatcher::range(1, 2), PortMatcher::range(1, 3));
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        assert!(PortMatcher::from_field("(unclosed").is_err());
    }
}
