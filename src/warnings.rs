use std::collections::HashSet;

/// Paths the last lint pass flagged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarningIndex {
    paths: HashSet<String>,
}

impl WarningIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swaps in a new set. Returns `false`, leaving the index untouched, when membership is unchanged.
    pub fn replace<I, S>(&mut self, paths: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let next: HashSet<String> = paths.into_iter().map(Into::into).collect();
        if next == self.paths {
            return false;
        }
        self.paths = next;
        true
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub(crate) fn len(&self) -> usize {
        self.paths.len()
    }
}
