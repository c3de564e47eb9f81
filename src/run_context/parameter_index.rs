use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::postfit_errors::PostfitError;

/// Ordered bijection between parameter names and column indices.
///
/// Indices are assigned in insertion order and never change afterwards, so the
/// column order of every sample matrix is the order of [`ParameterIndex::names`].
/// Persisted as the plain ordered list of names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ParameterIndex {
    names: Vec<String>,
    reverse: HashMap<String, usize>,
}

impl ParameterIndex {
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            reverse: HashMap::new(),
        }
    }

    /// Insert a name and return its column index.
    ///
    /// Re-inserting a known name returns the index it already holds.
    pub fn entry_or_insert(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.reverse.get(name) {
            return idx;
        }
        let idx = self.names.len();
        self.names.push(name.to_string());
        self.reverse.insert(name.to_string(), idx);
        idx
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.reverse.get(name).copied()
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Iterate over `(index, name)` in column order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().enumerate().map(|(i, n)| (i, n.as_str()))
    }

    /// Sampler-facing labels: underscores are replaced by dashes.
    pub fn labels(&self) -> Vec<String> {
        self.names.iter().map(|n| n.replace('_', "-")).collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: AsRef<str>> FromIterator<S> for ParameterIndex {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut index = ParameterIndex::new();
        for name in iter {
            index.entry_or_insert(name.as_ref());
        }
        index
    }
}

impl TryFrom<Vec<String>> for ParameterIndex {
    type Error = PostfitError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        let index: ParameterIndex = names.iter().collect();
        if index.len() != names.len() {
            return Err(PostfitError::DataFormat(
                "duplicated parameter name in the persisted index".into(),
            ));
        }
        Ok(index)
    }
}

impl From<ParameterIndex> for Vec<String> {
    fn from(index: ParameterIndex) -> Self {
        index.names
    }
}
