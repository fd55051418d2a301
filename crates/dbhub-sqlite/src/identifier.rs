use crate::error::ReaderError;

/// A table or column name known to exist in the open file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier(String);

impl Identifier {
    /// Accept `candidate` only if it is an exact member of `known`.
    ///
    /// This is the only constructor. Query building takes `Identifier`s, so
    /// nothing user-supplied reaches query text without passing through here.
    pub fn whitelist(candidate: &str, known: &[String]) -> Result<Self, ReaderError> {
        known
            .iter()
            .find(|name| name.as_str() == candidate)
            .map(|name| Identifier(name.clone()))
            .ok_or_else(|| ReaderError::InvalidIdentifier(candidate.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for query text. Names are validated already; the
    /// escaping covers legitimate names that contain quotes.
    pub(crate) fn quoted(&self) -> String {
        format!("\"{}\"", self.0.replace('"', "\"\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> Vec<String> {
        vec!["t".to_string(), "odd \"name\"".to_string()]
    }

    #[test]
    fn test_exact_member_is_accepted() {
        let id = Identifier::whitelist("t", &known()).unwrap();
        assert_eq!(id.as_str(), "t");
        assert_eq!(id.quoted(), "\"t\"");
    }

    #[test]
    fn test_case_and_whitespace_variants_are_rejected() {
        for candidate in ["T", " t", "t ", ""] {
            assert!(matches!(
                Identifier::whitelist(candidate, &known()),
                Err(ReaderError::InvalidIdentifier(_))
            ));
        }
    }

    #[test]
    fn test_quotes_in_real_names_are_escaped() {
        let id = Identifier::whitelist("odd \"name\"", &known()).unwrap();
        assert_eq!(id.quoted(), "\"odd \"\"name\"\"\"");
    }
}
