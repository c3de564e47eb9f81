use super::{QuantityConverter, SharedModel};
use crate::postfit_errors::PostfitError;

/// Shared models of a fit, looked up by name.
///
/// Registration order is kept so that exports iterate planets deterministically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelRegistry {
    shared: Vec<SharedModel>,
}

impl ModelRegistry {
    /// Add a shared model; names must be unique.
    pub fn register(&mut self, model: SharedModel) -> Result<(), PostfitError> {
        if self.get(model.name()).is_some() {
            return Err(PostfitError::InvalidParameter(format!(
                "shared model '{}' registered twice",
                model.name()
            )));
        }
        self.shared.push(model);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SharedModel> {
        self.shared.iter().find(|m| m.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SharedModel> {
        self.shared.iter()
    }

    /// Shared models of planet kind, in registration order.
    pub fn planets(&self) -> impl Iterator<Item = &SharedModel> {
        self.shared.iter().filter(|m| m.is_planet())
    }

    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.is_empty()
    }
}
