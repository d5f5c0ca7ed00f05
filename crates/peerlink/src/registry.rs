//! Type signature registry
//!
//! Resolves class paths and member signatures to managed identifiers once
//! and memoizes them. Entries are never invalidated: managed classes are not
//! unloaded while a bridge is alive. Concurrent first lookups may both reach
//! the managed runtime; the first insert wins and the other result is
//! discarded.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;

use crate::context::ManagedEnv;
use crate::error::{BridgeError, BridgeResult};
use crate::value::{ClassRef, FieldId, MethodId};

type MemberKey = (String, String);

/// Memoized identifiers of one managed class
pub struct ClassSignature {
    name: String,
    class: ClassRef,
    constructors: DashMap<String, MethodId>,
    methods: DashMap<MemberKey, MethodId>,
    static_methods: DashMap<MemberKey, MethodId>,
    fields: DashMap<MemberKey, FieldId>,
    static_fields: DashMap<MemberKey, FieldId>,
}

fn memoize<K, V, F>(map: &DashMap<K, V>, key: K, lookup: F) -> BridgeResult<V>
where
    K: Eq + Hash,
    V: Copy,
    F: FnOnce() -> BridgeResult<V>,
{
    if let Some(found) = map.get(&key) {
        return Ok(*found);
    }
    let value = lookup()?;
    Ok(*map.entry(key).or_insert(value))
}

impl ClassSignature {
    fn new(name: String, class: ClassRef) -> Self {
        Self {
            name,
            class,
            constructors: DashMap::new(),
            methods: DashMap::new(),
            static_methods: DashMap::new(),
            fields: DashMap::new(),
            static_fields: DashMap::new(),
        }
    }

    /// Class path
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Managed class reference
    pub fn class(&self) -> ClassRef {
        self.class
    }

    /// Constructor with the given signature
    pub fn constructor(&self, env: &dyn ManagedEnv, sig: &str) -> BridgeResult<MethodId> {
        memoize(&self.constructors, sig.to_string(), || {
            tracing::trace!(class = %self.name, sig, "resolving constructor");
            env.method_id(self.class, "<init>", sig)
                .ok_or_else(|| BridgeError::unresolved_member("constructor", &self.name, "<init>", sig))
        })
    }

    /// Instance method
    pub fn method(&self, env: &dyn ManagedEnv, name: &str, sig: &str) -> BridgeResult<MethodId> {
        memoize(&self.methods, (name.to_string(), sig.to_string()), || {
            tracing::trace!(class = %self.name, name, sig, "resolving method");
            env.method_id(self.class, name, sig)
                .ok_or_else(|| BridgeError::unresolved_member("method", &self.name, name, sig))
        })
    }

    /// Static method
    pub fn static_method(&self, env: &dyn ManagedEnv, name: &str, sig: &str) -> BridgeResult<MethodId> {
        memoize(&self.static_methods, (name.to_string(), sig.to_string()), || {
            tracing::trace!(class = %self.name, name, sig, "resolving static method");
            env.static_method_id(self.class, name, sig)
                .ok_or_else(|| BridgeError::unresolved_member("static method", &self.name, name, sig))
        })
    }

    /// Instance field
    pub fn field(&self, env: &dyn ManagedEnv, name: &str, sig: &str) -> BridgeResult<FieldId> {
        memoize(&self.fields, (name.to_string(), sig.to_string()), || {
            env.field_id(self.class, name, sig)
                .ok_or_else(|| BridgeError::unresolved_member("field", &self.name, name, sig))
        })
    }

    /// Static field
    pub fn static_field(&self, env: &dyn ManagedEnv, name: &str, sig: &str) -> BridgeResult<FieldId> {
        memoize(&self.static_fields, (name.to_string(), sig.to_string()), || {
            env.static_field_id(self.class, name, sig)
                .ok_or_else(|| BridgeError::unresolved_member("static field", &self.name, name, sig))
        })
    }

    /// Number of memoized members
    pub fn member_count(&self) -> usize {
        self.constructors.len()
            + self.methods.len()
            + self.static_methods.len()
            + self.fields.len()
            + self.static_fields.len()
    }
}

impl fmt::Debug for ClassSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassSignature")
            .field("name", &self.name)
            .field("class", &self.class)
            .field("members", &self.member_count())
            .finish()
    }
}

/// Registry of class signatures, keyed by class path
#[derive(Default)]
pub struct SignatureRegistry {
    classes: DashMap<String, Arc<ClassSignature>>,
}

impl SignatureRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Signature of the class at `name`, resolving it on first use
    pub fn describe(&self, env: &dyn ManagedEnv, name: &str) -> BridgeResult<Arc<ClassSignature>> {
        if let Some(found) = self.classes.get(name) {
            return Ok(found.clone());
        }
        tracing::trace!(class = name, "resolving class");
        let class = env
            .find_class(name)
            .ok_or_else(|| BridgeError::unresolved_class(name))?;
        let signature = Arc::new(ClassSignature::new(name.to_string(), class));
        Ok(self
            .classes
            .entry(name.to_string())
            .or_insert(signature)
            .clone())
    }

    /// Number of classes described so far
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether nothing has been described yet
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl fmt::Debug for SignatureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureRegistry")
            .field("classes", &self.classes.len())
            .finish()
    }
}
