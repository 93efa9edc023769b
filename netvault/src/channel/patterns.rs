//! Ordered prompt pattern sets.

use regex::bytes::Regex;

/// An ordered list of prompt patterns compiled for one match call.
///
/// An empty first pattern means "EOF is a match" and reports index 0.
/// Other empty patterns never match.
#[derive(Debug, Clone)]
pub struct PromptSet {
    accepts_eof: bool,
    patterns: Vec<Option<Regex>>,
}

impl PromptSet {
    /// Compile patterns in order; indexes follow the input order.
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let mut set = Self::prompts(patterns)?;
        set.accepts_eof = patterns.first().is_some_and(|p| p.as_ref().is_empty());
        Ok(set)
    }

    /// Compile patterns where EOF is never a match, even with an empty
    /// first pattern.
    pub fn prompts<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| match p.as_ref() {
                "" => Ok(None),
                p => Regex::new(p).map(Some),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            accepts_eof: false,
            patterns,
        })
    }

    /// Whether EOF satisfies this set.
    pub fn accepts_eof(&self) -> bool {
        self.accepts_eof
    }

    /// Index of the first pattern matching `line`.
    pub fn find(&self, line: &[u8]) -> Option<usize> {
        self.patterns
            .iter()
            .position(|p| p.as_ref().is_some_and(|re| re.is_match(line)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_in_order() {
        let set = PromptSet::compile(&[r"[Pp]assword:\s*$", r"\S+#\s*$", r"\S+>\s*$"]).unwrap();
        assert_eq!(set.find(b"Password: "), Some(0));
        assert_eq!(set.find(b"router#"), Some(1));
        assert_eq!(set.find(b"router> "), Some(2));
        assert_eq!(set.find(b"show run"), None);
        assert!(!set.accepts_eof());
    }

    #[test]
    fn test_empty_first_pattern_is_eof() {
        let set = PromptSet::compile(&[""]).unwrap();
        assert!(set.accepts_eof());
        assert_eq!(set.find(b"anything"), None);
    }

    #[test]
    fn test_empty_later_pattern_never_matches() {
        let set = PromptSet::compile(&[r"#\s*$", ""]).unwrap();
        assert!(!set.accepts_eof());
        assert_eq!(set.find(b""), None);
    }

    #[test]
    fn test_prompts_never_accept_eof() {
        let set = PromptSet::prompts(&["", r"Password:\s*$"]).unwrap();
        assert!(!set.accepts_eof());
        assert_eq!(set.find(b"Password: "), Some(1));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(PromptSet::compile(&["("]).is_err());
    }
}
