use regex::{Regex, RegexBuilder};
use std::fmt;

/// Literal text of the any-deep token
pub const ANY_DEEP: &str = "**";

/// Literal text of the any-shallow token
pub const ANY_SHALLOW: &str = "*";

/// Ranking used to pick between sibling nodes that match the same property.
///
/// Ordered low to high, so `Exact` compares greatest. Wildcards carry the
/// number of literal characters in their pattern, so `repo*` outranks `rep*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Specificity {
    AnyDeep,
    AnyShallow,
    Wildcard(usize),
    Regex,
    Exact,
}

/// Decides whether a property name is selected by one field of a filter
#[derive(Debug, Clone)]
pub enum NameMatcher {
    /// Case-sensitive equality
    Exact(String),
    /// `*` matches any run of characters, `?` exactly one
    Wildcard { pattern: String, regex: Regex },
    /// `~pattern~flags` or `/pattern/flags`, matched against the whole name
    Regex {
        literal: String,
        pattern: String,
        case_insensitive: bool,
        regex: Regex,
    },
    /// `*` on its own: any name at this level
    AnyShallow,
    /// `**`: any name at this and every deeper level
    AnyDeep,
}

impl NameMatcher {
    pub fn exact(name: impl Into<String>) -> Self {
        NameMatcher::Exact(name.into())
    }

    pub fn wildcard(pattern: impl Into<String>) -> Result<Self, regex::Error> {
        let pattern = pattern.into();
        let mut translated = String::with_capacity(pattern.len() + 8);
        translated.push_str("^(?s:");
        for c in pattern.chars() {
            match c {
                '*' => translated.push_str(".*"),
                '?' => translated.push('.'),
                other => translated.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        translated.push_str(")$");

        let regex = Regex::new(&translated)?;
        Ok(NameMatcher::Wildcard { pattern, regex })
    }

    /// Build a regex matcher. `literal` is the field text as written,
    /// delimiters and flags included.
    pub fn regex(
        literal: impl Into<String>,
        pattern: impl Into<String>,
        case_insensitive: bool,
    ) -> Result<Self, regex::Error> {
        let pattern = pattern.into();
        let regex = RegexBuilder::new(&format!("^(?:{pattern})$"))
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(NameMatcher::Regex {
            literal: literal.into(),
            pattern,
            case_insensitive,
            regex,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            NameMatcher::Exact(literal) => literal == name,
            NameMatcher::Wildcard { regex, .. } => regex.is_match(name),
            NameMatcher::Regex { regex, .. } => regex.is_match(name),
            NameMatcher::AnyShallow | NameMatcher::AnyDeep => true,
        }
    }

    pub fn specificity(&self) -> Specificity {
        match self {
            NameMatcher::Exact(_) => Specificity::Exact,
            NameMatcher::Regex { .. } => Specificity::Regex,
            NameMatcher::Wildcard { pattern, .. } => {
                let literal_chars = pattern.chars().filter(|c| !matches!(c, '*' | '?')).count();
                Specificity::Wildcard(literal_chars)
            }
            NameMatcher::AnyShallow => Specificity::AnyShallow,
            NameMatcher::AnyDeep => Specificity::AnyDeep,
        }
    }

    /// Key under which same-named siblings are merged
    pub fn literal(&self) -> &str {
        match self {
            NameMatcher::Exact(name) => name,
            NameMatcher::Wildcard { pattern, .. } => pattern,
            NameMatcher::Regex { literal, .. } => literal,
            NameMatcher::AnyShallow => ANY_SHALLOW,
            NameMatcher::AnyDeep => ANY_DEEP,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, NameMatcher::Exact(_))
    }

    pub fn is_any_deep(&self) -> bool {
        matches!(self, NameMatcher::AnyDeep)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NameMatcher::Exact(_) => "exact",
            NameMatcher::Wildcard { .. } => "wildcard",
            NameMatcher::Regex { .. } => "regex",
            NameMatcher::AnyShallow => "any-shallow",
            NameMatcher::AnyDeep => "any-deep",
        }
    }
}

impl PartialEq for NameMatcher {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NameMatcher::Exact(a), NameMatcher::Exact(b)) => a == b,
            (NameMatcher::Wildcard { pattern: a, .. }, NameMatcher::Wildcard { pattern: b, .. }) => {
                a == b
            }
            (
                NameMatcher::Regex {
                    pattern: a,
                    case_insensitive: ai,
                    ..
                },
                NameMatcher::Regex {
                    pattern: b,
                    case_insensitive: bi,
                    ..
                },
            ) => a == b && ai == bi,
            (NameMatcher::AnyShallow, NameMatcher::AnyShallow) => true,
            (NameMatcher::AnyDeep, NameMatcher::AnyDeep) => true,
            _ => false,
        }
    }
}

impl Eq for NameMatcher {}

impl fmt::Display for NameMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.literal())
    }
}
