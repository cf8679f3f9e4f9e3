//! By-name factories for pluggable collaborators.

use std::collections::HashMap;

use crate::error::{Error, Result};

type Factory<T> = Box<dyn Fn() -> Box<T> + Send + Sync>;

/// A closed, statically enumerable map from string key to factory.
///
/// Populated once at process start; no open-ended runtime registration
/// from unknown call sites. Typical use is one registry per collaborator
/// trait (annotators, predictors, scorers), so configuration files can
/// name implementations.
///
/// # Example
///
/// ```rust
/// use errata::{Registry, Scorer, Accuracy, SpanF1};
///
/// let scorers: Registry<dyn Scorer> = Registry::new()
///     .with("accuracy", || Box::new(Accuracy) as Box<dyn Scorer>)
///     .with("span_f1", || Box::new(SpanF1) as Box<dyn Scorer>);
///
/// let scorer = scorers.create("accuracy").unwrap();
/// assert_eq!(scorer.primary_metric(), "accuracy");
/// assert_eq!(scorers.names(), vec!["accuracy", "span_f1"]);
/// ```
pub struct Registry<T: ?Sized> {
    factories: HashMap<String, Factory<T>>,
}

impl<T: ?Sized> Registry<T> {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Add a factory under `name`, builder style.
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<T> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Add a factory under `name`. A later registration under the same
    /// name replaces the earlier one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<T> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Instantiate the implementation registered under `name`.
    ///
    /// Fails with [`Error::NotRegistered`], naming the known keys.
    pub fn create(&self, name: &str) -> Result<Box<T>> {
        match self.factories.get(name) {
            Some(factory) => Ok(factory()),
            None => Err(Error::not_registered(format!(
                "'{name}' (known: {})",
                self.names().join(", ")
            ))),
        }
    }

    /// True if `name` has a factory.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered factories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{Accuracy, Scorer, SpanF1};

    fn scorers() -> Registry<dyn Scorer> {
        Registry::new()
            .with("accuracy", || Box::new(Accuracy) as Box<dyn Scorer>)
            .with("span_f1", || Box::new(SpanF1) as Box<dyn Scorer>)
    }

    #[test]
    fn test_create_by_name() {
        let registry = scorers();
        let scorer = registry.create("span_f1").unwrap();
        assert_eq!(scorer.primary_metric(), "f1");
    }

    #[test]
    fn test_unknown_name_lists_known_keys() {
        let registry = scorers();
        let Err(err) = registry.create("bleu") else {
            panic!("create(\"bleu\") unexpectedly succeeded");
        };
        let message = err.to_string();
        assert!(matches!(err, Error::NotRegistered(_)));
        assert!(message.contains("accuracy"));
        assert!(message.contains("span_f1"));
    }

    #[test]
    fn test_names_sorted() {
        let registry = scorers();
        assert_eq!(registry.names(), vec!["accuracy", "span_f1"]);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("accuracy"));
        assert!(!registry.contains("bleu"));
    }

    #[test]
    fn test_reregistration_replaces() {
        let mut registry: Registry<dyn Scorer> = Registry::new();
        registry.register("primary", || Box::new(Accuracy) as Box<dyn Scorer>);
        registry.register("primary", || Box::new(SpanF1) as Box<dyn Scorer>);

        assert_eq!(registry.len(), 1);
        let scorer = registry.create("primary").unwrap();
        assert_eq!(scorer.primary_metric(), "f1");
    }

    #[test]
    fn test_empty_registry() {
        let registry: Registry<dyn Scorer> = Registry::new();
        assert!(registry.is_empty());
        assert!(registry.create("anything").is_err());
    }
}
