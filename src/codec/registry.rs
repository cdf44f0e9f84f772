//! Type registry for user-defined objects
//!
//! Maps each stable type identifier to a factory that rebuilds the concrete
//! Rust type from its attribute map. Encoding refuses objects whose type is
//! not registered, so everything written can be reconstructed later.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::{PersistObject, Value};
use crate::error::{Result, StashError};

type Factory = Box<dyn Fn(BTreeMap<String, Value>) -> Result<Box<dyn Any + Send>> + Send + Sync>;

/// Registry of reconstructible object types, keyed by type identifier
#[derive(Default)]
pub struct TypeRegistry {
    factories: HashMap<&'static str, Factory>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `T::TYPE_NAME`, replacing any earlier factory
    pub fn register<T>(&mut self)
    where
        T: PersistObject + Send + 'static,
    {
        let factory: Factory = Box::new(|attrs| {
            let object = T::from_attributes(attrs)?;
            Ok(Box::new(object) as Box<dyn Any + Send>)
        });

        if self.factories.insert(T::TYPE_NAME, factory).is_some() {
            tracing::warn!(type_name = T::TYPE_NAME, "replaced registered object factory");
        }
    }

    /// Whether a factory exists for `type_name`
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Rebuild the concrete instance behind an object value
    ///
    /// The caller downcasts the result to the registered type.
    pub fn instantiate(&self, value: Value) -> Result<Box<dyn Any + Send>> {
        match value {
            Value::Object { type_name, attrs } => {
                let factory = self.factories.get(type_name.as_str()).ok_or_else(|| {
                    StashError::unsupported(format!(
                        "no factory registered for type `{}`",
                        type_name
                    ))
                })?;
                factory(attrs)
            }
            other => Err(StashError::TypeMismatch {
                expected: "object",
                found: other.kind(),
            }),
        }
    }

    /// Fail with `UnsupportedType` if any object inside `value` is unregistered
    pub fn check(&self, value: &Value) -> Result<()> {
        value.visit(&mut |node| match node {
            Value::Object { type_name, .. } if !self.contains(type_name) => {
                Err(StashError::unsupported(format!(
                    "object type `{}` is not registered",
                    type_name
                )))
            }
            _ => Ok(()),
        })
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("TypeRegistry").field("types", &names).finish()
    }
}
