use serde::Serialize;

/// Result of a component self-check.
///
/// Self-checks never fail loudly; they collect every inconsistency found so
/// tests and health checks can report them at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl Default for Validation {
    fn default() -> Self {
        Self::new()
    }
}

impl Validation {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }

    /// Folds another report in, prefixing its messages with `component`.
    pub fn merge(&mut self, component: &str, other: Validation) {
        for message in other.errors {
            self.error(format!("{component}: {message}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefixes_messages() {
        let mut inner = Validation::new();
        inner.error("cache too large");

        let mut outer = Validation::new();
        outer.merge("board", Validation::new());
        assert!(outer.valid);
        outer.merge("collision", inner);
        assert!(!outer.valid);
        assert_eq!(outer.errors, ["collision: cache too large"]);
    }
}
