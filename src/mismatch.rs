use std::fmt;
use thiserror::Error;

/// Error value carrying what was expected and what was actually found.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Error)]
pub struct Mismatch<T> {
    pub expected: T,
    pub found: T,
}

impl<T> Mismatch<T> {
    pub fn new(expected: T, found: T) -> Self {
        Self { expected, found }
    }
}

impl<T: fmt::Display> fmt::Display for Mismatch<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Expected {}, found {}", self.expected, self.found)
    }
}

#[cfg(test)]
mod tests {
    use super::Mismatch;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_mismatch() {
        let mismatch = Mismatch::new("0x01", "0x02");
        assert_eq!("Expected 0x01, found 0x02", mismatch.to_string());
    }
}
