use serde::{Deserialize, Serialize};

/// The identity making a request.
///
/// Passed explicitly into every pipeline invocation; nothing reads the
/// current viewer from ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Viewer {
    #[default]
    Anonymous,
    User(String),
}

impl Viewer {
    pub fn user<S: Into<String>>(name: S) -> Self {
        Viewer::User(name.into())
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(name) => Some(name),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Viewer::Anonymous)
    }

    /// True when this viewer owns data stored under `owner`.
    pub fn is_owner(&self, owner: &str) -> bool {
        self.username() == Some(owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_owns_nothing() {
        assert!(!Viewer::Anonymous.is_owner(""));
        assert!(!Viewer::Anonymous.is_owner("alice"));
    }

    #[test]
    fn test_owner_match_is_exact() {
        let viewer = Viewer::user("alice");
        assert!(viewer.is_owner("alice"));
        assert!(!viewer.is_owner("Alice"));
        assert!(!viewer.is_owner("alice2"));
    }
}
