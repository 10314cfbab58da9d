//! Heuristic error classification.
//!
//! Diagnostic lines are matched against a rule table mapping patterns to a
//! tool family. The table is data, not code: new tool error formats are
//! added by extending the rules, without touching the retry logic.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorClass {
    TypeCheck,
    Lint,
    Test,
    Unknown,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TypeCheck => "type-check",
            Self::Lint => "lint",
            Self::Test => "test",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

pub struct ClassifierRule {
    pub pattern: Regex,
    pub class: ErrorClass,
}

impl ClassifierRule {
    pub fn new(pattern: &str, class: ErrorClass) -> Self {
        Self {
            // Built-in and caller-supplied patterns are developer input;
            // a malformed one is a programming error.
            pattern: Regex::new(pattern).expect("invalid classifier pattern"),
            class,
        }
    }
}

pub struct ErrorClassifier {
    rules: Vec<ClassifierRule>,
}

impl ErrorClassifier {
    pub fn new(rules: Vec<ClassifierRule>) -> Self {
        Self { rules }
    }

    /// Rule set covering the tool output formats the IDE shells out to:
    /// rustc/tsc style type errors, clippy/eslint lints, cargo/jest test
    /// failures. First match wins, so more specific rules come first.
    pub fn default_rules() -> Vec<ClassifierRule> {
        vec![
            ClassifierRule::new(r"error\[E\d+\]", ErrorClass::TypeCheck),
            ClassifierRule::new(r"\bTS\d{4,}\b", ErrorClass::TypeCheck),
            ClassifierRule::new(r"mismatched types|is not assignable to", ErrorClass::TypeCheck),
            ClassifierRule::new(r"cannot find (?:value|type|function|module)", ErrorClass::TypeCheck),
            ClassifierRule::new(r"\bclippy\b|\beslint\b", ErrorClass::Lint),
            ClassifierRule::new(r"warning: unused|warning: .*#\[warn\(", ErrorClass::Lint),
            ClassifierRule::new(r"test .* \.\.\. FAILED|\d+ passed; [1-9]\d* failed", ErrorClass::Test),
            ClassifierRule::new(r"assertion (?:failed|`left == right` failed)", ErrorClass::Test),
            ClassifierRule::new(r"(?m)^FAIL\b|✕", ErrorClass::Test),
        ]
    }

    pub fn classify(&self, line: &str) -> ErrorClass {
        for rule in &self.rules {
            if rule.pattern.is_match(line) {
                return rule.class;
            }
        }
        ErrorClass::Unknown
    }

    /// Group diagnostic lines by class, preserving line order within each.
    pub fn classify_all(&self, lines: &[String]) -> BTreeMap<ErrorClass, Vec<String>> {
        let mut grouped: BTreeMap<ErrorClass, Vec<String>> = BTreeMap::new();
        for line in lines {
            grouped.entry(self.classify(line)).or_default().push(line.clone());
        }
        grouped
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(Self::default_rules())
    }
}
