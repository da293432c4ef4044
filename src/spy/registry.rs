use std::collections::HashMap;
use std::fmt;

use super::{CategorySelectSpy, MatchSpy, MultipleSpy, TermCountSpy, ValueCountSpy};

/// Maps spy names to prototype spies, used to rebuild spies from their
/// serialized configuration.
///
/// [`SpyRegistry::default`] knows every spy defined in this crate. Custom
/// spies are added with [`SpyRegistry::register`].
///
/// ```rust
/// use matchspy::spy::{MatchSpy, SpyRegistry, TermCountSpy};
///
/// # fn main() -> matchspy::Result<()> {
/// let registry = SpyRegistry::default();
/// let spy = TermCountSpy::for_prefix("XCOLOR");
/// let config = spy.serialize_config()?;
///
/// let prototype = registry.get(spy.name()?).unwrap();
/// let remote_spy = prototype.reconstruct(&config, &registry)?;
/// assert_eq!(remote_spy.description(), spy.description());
/// # Ok(())
/// # }
/// ```
pub struct SpyRegistry {
    prototypes: HashMap<String, Box<dyn MatchSpy>>,
}

impl Default for SpyRegistry {
    fn default() -> SpyRegistry {
        let mut registry = SpyRegistry::new();
        registry.insert(ValueCountSpy::NAME, Box::new(ValueCountSpy::new()));
        registry.insert(TermCountSpy::NAME, Box::new(TermCountSpy::new()));
        registry.insert(CategorySelectSpy::NAME, Box::new(CategorySelectSpy::new()));
        registry.insert(MultipleSpy::NAME, Box::new(MultipleSpy::new()));
        registry
    }
}

impl fmt::Debug for SpyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("SpyRegistry").field("spies", &names).finish()
    }
}

impl SpyRegistry {
    /// Creates a registry that knows no spy.
    pub fn new() -> SpyRegistry {
        SpyRegistry {
            prototypes: HashMap::new(),
        }
    }

    fn insert(&mut self, name: &str, prototype: Box<dyn MatchSpy>) {
        if self.prototypes.insert(name.to_string(), prototype).is_some() {
            debug!("Replacing the prototype of spy {}", name);
        }
    }

    /// Registers `prototype` under its [`name`](MatchSpy::name), replacing
    /// any spy previously registered under that name.
    ///
    /// Fails with [`SpyError::Unsupported`](crate::SpyError::Unsupported)
    /// if the spy has no name.
    pub fn register(&mut self, prototype: Box<dyn MatchSpy>) -> crate::Result<()> {
        let name = prototype.name()?.to_string();
        self.insert(&name, prototype);
        Ok(())
    }

    /// Returns the prototype registered under `name`.
    pub fn get(&self, name: &str) -> Option<&(dyn MatchSpy + 'static)> {
        self.prototypes.get(name).map(|prototype| prototype.as_ref())
    }

    /// Names of the registered spies, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.prototypes.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::SpyRegistry;
    use crate::document::Document;
    use crate::spy::{MatchSpy, ValueCountSpy};
    use crate::{SpyError, Weight};

    #[derive(Debug, Default)]
    struct LocalSpy;

    impl MatchSpy for LocalSpy {
        fn observe(&mut self, _doc: &dyn Document, _weight: Weight) {}
    }

    #[test]
    fn test_default_registry() {
        let registry = SpyRegistry::default();
        let mut names: Vec<&str> = registry.names().collect();
        names.sort_unstable();
        assert_eq!(
            names,
            vec![
                "CategorySelectSpy",
                "MultipleSpy",
                "TermCountSpy",
                "ValueCountSpy"
            ]
        );
        assert_eq!(
            registry.get("ValueCountSpy").unwrap().name().unwrap(),
            "ValueCountSpy"
        );
        assert!(registry.get("valuecountspy").is_none());
        assert!(SpyRegistry::new().get("ValueCountSpy").is_none());
    }

    #[test]
    fn test_register() -> crate::Result<()> {
        let mut registry = SpyRegistry::new();
        registry.register(Box::new(ValueCountSpy::new()))?;
        registry.register(Box::new(ValueCountSpy::for_slot(3)))?;
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["ValueCountSpy"]);
        assert!(matches!(
            registry.register(Box::new(LocalSpy)),
            Err(SpyError::Unsupported { operation: "name" })
        ));
        Ok(())
    }
}
