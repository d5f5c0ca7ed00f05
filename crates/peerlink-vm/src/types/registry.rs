//! Class registry and member resolution

use std::collections::HashMap;
use std::sync::Arc;

use super::builder::ClassDef;
use super::class::{Class, ClassId, Method};
use super::{CONSTRUCTOR, FINALIZE};
use crate::{VmError, VmResult};

/// All classes of a VM, by id and by name
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: Vec<Arc<Class>>,
    by_name: HashMap<String, ClassId>,
}

impl ClassRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Class by id
    pub fn get(&self, id: ClassId) -> Option<&Arc<Class>> {
        self.classes.get(id.0 as usize)
    }

    /// Class by id, as an error when unknown
    pub fn class(&self, id: ClassId) -> VmResult<&Arc<Class>> {
        self.get(id)
            .ok_or_else(|| VmError::ClassNotFound(format!("<class {}>", id.0)))
    }

    /// Class by path
    pub fn lookup(&self, name: &str) -> Option<&Arc<Class>> {
        self.by_name.get(name).and_then(|id| self.get(*id))
    }

    /// Class by path, as an error when unknown
    pub fn require(&self, name: &str) -> VmResult<&Arc<Class>> {
        self.lookup(name)
            .ok_or_else(|| VmError::ClassNotFound(name.to_string()))
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if no class is defined
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// All classes in definition order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Class>> {
        self.classes.iter()
    }

    /// Define a class. The superclass and interfaces must already exist.
    pub fn define(&mut self, def: ClassDef) -> VmResult<ClassId> {
        if self.by_name.contains_key(&def.name) {
            return Err(VmError::DuplicateClass(def.name));
        }
        let parent = match def.parent_name() {
            Some(name) => Some(self.require(name)?.clone()),
            None => None,
        };
        let interfaces = def
            .interfaces
            .iter()
            .map(|name| self.require(name).map(|c| c.id))
            .collect::<VmResult<Vec<_>>>()?;

        let mut fields = parent.as_ref().map(|p| p.fields.clone()).unwrap_or_default();
        fields.extend(def.fields);

        let methods: Vec<Method> = def
            .methods
            .into_iter()
            .map(|m| Method {
                name: m.name,
                sig: m.sig,
                is_static: m.is_static,
                body: m.body,
            })
            .collect();
        let declares_finalizer = methods
            .iter()
            .any(|m| m.name == FINALIZE.0 && m.sig == FINALIZE.1 && !m.is_static && !m.is_abstract());
        let has_finalizer = parent.is_some()
            && (declares_finalizer || parent.as_ref().map_or(false, |p| p.has_finalizer));

        let id = ClassId(self.classes.len() as u32);
        let class = Class::new(
            id,
            def.name.clone(),
            parent.map(|p| p.id),
            interfaces,
            def.is_interface,
            fields,
            def.statics,
            methods,
            has_finalizer,
        );
        self.classes.push(Arc::new(class));
        self.by_name.insert(def.name, id);
        Ok(id)
    }

    /// Whether `class` is `ancestor`, extends it or implements it
    pub fn is_subclass(&self, class: ClassId, ancestor: ClassId) -> bool {
        let mut stack = vec![class];
        while let Some(id) = stack.pop() {
            if id == ancestor {
                return true;
            }
            if let Some(c) = self.get(id) {
                stack.extend(c.parent);
                stack.extend(c.interfaces.iter().copied());
            }
        }
        false
    }

    /// Superclass chain starting at `class`
    fn chain(&self, class: ClassId) -> impl Iterator<Item = &Arc<Class>> + '_ {
        std::iter::successors(self.get(class), move |c| c.parent.and_then(|p| self.get(p)))
    }

    /// Method declared by `class`, an ancestor or (for instance methods) an
    /// interface. Constructors are never inherited.
    pub fn find_method(&self, class: ClassId, name: &str, sig: &str, is_static: bool) -> Option<(ClassId, usize)> {
        if name == CONSTRUCTOR {
            let c = self.get(class)?;
            return c.declared_method(name, sig, false).map(|i| (c.id, i));
        }
        for c in self.chain(class) {
            if let Some(i) = c.declared_method(name, sig, is_static) {
                return Some((c.id, i));
            }
        }
        if is_static {
            return None;
        }
        let mut stack: Vec<ClassId> = self.chain(class).flat_map(|c| c.interfaces.clone()).collect();
        while let Some(id) = stack.pop() {
            let c = self.get(id)?;
            if let Some(i) = c.declared_method(name, sig, false) {
                return Some((c.id, i));
            }
            stack.extend(c.interfaces.iter().copied());
        }
        None
    }

    /// Implementation selected by virtual dispatch on `runtime_class`
    pub fn find_virtual(&self, runtime_class: ClassId, name: &str, sig: &str) -> Option<(ClassId, usize)> {
        self.chain(runtime_class).find_map(|c| {
            c.declared_method(name, sig, false)
                .filter(|i| !c.methods[*i].is_abstract())
                .map(|i| (c.id, i))
        })
    }

    /// Static field declared by `class` or an ancestor
    pub fn find_static_field(&self, class: ClassId, name: &str, sig: &str) -> Option<(ClassId, usize)> {
        self.chain(class).find_map(|c| {
            c.static_fields
                .iter()
                .position(|f| f.name == name && f.sig == sig)
                .map(|i| (c.id, i))
        })
    }

    /// Slot of an instance field by name and signature
    pub fn find_field(&self, class: ClassId, name: &str, sig: &str) -> Option<usize> {
        self.get(class)?
            .fields
            .iter()
            .rposition(|f| f.name == name && f.sig == sig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use peerlink::classes::OBJECT;

    fn registry() -> ClassRegistry {
        let mut reg = ClassRegistry::new();
        reg.define(
            ClassDef::new(OBJECT)
                .method("toString", "()Lvm/lang/String;", |_, _| Ok(Value::null()))
                .method("finalize", "()V", |_, _| Ok(Value::Void)),
        )
        .unwrap();
        reg.define(ClassDef::interface("demo/Named").abstract_method("name", "()Lvm/lang/String;"))
            .unwrap();
        reg.define(
            ClassDef::new("demo/Base")
                .implements("demo/Named")
                .field("a", "I")
                .static_field("count", "I", Value::Int(3))
                .constructor("()V", |_, _| Ok(Value::Void)),
        )
        .unwrap();
        reg.define(
            ClassDef::new("demo/Derived")
                .extends("demo/Base")
                .field("b", "J")
                .method("name", "()Lvm/lang/String;", |_, _| Ok(Value::null()))
                .method("finalize", "()V", |_, _| Ok(Value::Void)),
        )
        .unwrap();
        reg
    }

    #[test]
    fn test_fields_flattened_parent_first() {
        let reg = registry();
        let derived = reg.require("demo/Derived").unwrap();
        let names: Vec<&str> = derived.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(reg.find_field(derived.id, "b", "J"), Some(1));
        assert_eq!(reg.find_field(derived.id, "b", "I"), None);
    }

    #[test]
    fn test_subclass_and_interfaces() {
        let reg = registry();
        let object = reg.require(OBJECT).unwrap().id;
        let named = reg.require("demo/Named").unwrap().id;
        let base = reg.require("demo/Base").unwrap().id;
        let derived = reg.require("demo/Derived").unwrap().id;
        assert!(reg.is_subclass(derived, base));
        assert!(reg.is_subclass(derived, named));
        assert!(reg.is_subclass(derived, object));
        assert!(!reg.is_subclass(base, derived));
    }

    #[test]
    fn test_method_resolution() {
        let reg = registry();
        let base = reg.require("demo/Base").unwrap().id;
        let derived = reg.require("demo/Derived").unwrap().id;

        let declared = reg.find_method(base, "name", "()Lvm/lang/String;", false).unwrap();
        assert_eq!(declared.0, reg.require("demo/Named").unwrap().id);
        assert!(reg.find_virtual(base, "name", "()Lvm/lang/String;").is_none());
        assert_eq!(reg.find_virtual(derived, "name", "()Lvm/lang/String;").unwrap().0, derived);

        assert!(reg.find_method(base, "<init>", "()V", false).is_some());
        assert!(reg.find_method(derived, "<init>", "()V", false).is_none());
    }

    #[test]
    fn test_finalizer_detection() {
        let reg = registry();
        assert!(!reg.require(OBJECT).unwrap().has_finalizer);
        assert!(!reg.require("demo/Base").unwrap().has_finalizer);
        assert!(reg.require("demo/Derived").unwrap().has_finalizer);
    }

    #[test]
    fn test_static_fields_inherited_lookup() {
        let reg = registry();
        let derived = reg.require("demo/Derived").unwrap().id;
        let (owner, index) = reg.find_static_field(derived, "count", "I").unwrap();
        assert_eq!(owner, reg.require("demo/Base").unwrap().id);
        assert_eq!(reg.get(owner).unwrap().static_value(index), Some(Value::Int(3)));
    }

    #[test]
    fn test_duplicate_and_missing_parent() {
        let mut reg = registry();
        assert!(matches!(reg.define(ClassDef::new("demo/Base")), Err(VmError::DuplicateClass(_))));
        assert!(matches!(
            reg.define(ClassDef::new("demo/Orphan").extends("demo/Nope")),
            Err(VmError::ClassNotFound(_))
        ));
    }
}
