//! Name-to-constructor map for behaviours.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{AttemptError, Result};
use crate::traits::Behaviour;

type Factory = Arc<dyn Fn() -> Box<dyn Behaviour> + Send + Sync>;

/// Behaviours available to attempts, looked up by name.
#[derive(Clone, Default)]
pub struct BehaviourRegistry {
    factories: BTreeMap<String, Factory>,
}

impl BehaviourRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Behaviour> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
        self
    }

    /// Drop a behaviour so attempts can no longer be started with it.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.factories.remove(name).is_some()
    }

    pub fn make(&self, name: &str) -> Result<Box<dyn Behaviour>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| AttemptError::UnknownBehaviour(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for BehaviourRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBehaviour;

    #[test]
    fn make_known_and_unknown() {
        let mut registry = BehaviourRegistry::new();
        registry.register("mock", || Box::new(MockBehaviour::default()));

        assert!(registry.contains("mock"));
        assert_eq!(registry.make("mock").unwrap().name(), "mock");
        assert_eq!(
            registry.make("adaptive").unwrap_err(),
            AttemptError::UnknownBehaviour("adaptive".into())
        );
        assert_eq!(format!("{registry:?}"), r#"{"mock"}"#);

        assert!(registry.unregister("mock"));
        assert!(registry.is_empty());
    }
}
