//! Polymorphic peer wrappers
//!
//! A native type exposed to the managed side may be one of several levels
//! of a managed class hierarchy. A [`ClassChain`] lists the levels with a
//! predicate each; wrapping an instance picks the most derived level whose
//! predicate accepts it and falls back to the base class.
//!
//! Levels added with [`ClassChainBuilder::type_level`] or
//! [`ClassChainBuilder::subclass`] look only at the concrete type, so a
//! selection made entirely by them is memoized per `TypeId`. Levels added
//! with [`ClassChainBuilder::level`] inspect the value and run on every
//! selection that reaches them.

use std::any::{Any, TypeId};
use std::fmt;

use dashmap::DashMap;

use crate::bridge::Bridge;
use crate::classes;
use crate::error::BridgeResult;
use crate::value::{ClassRef, MethodId};

enum Predicate {
    Type(Box<dyn Fn(TypeId) -> bool + Send + Sync>),
    Value(Box<dyn Fn(&(dyn Any + Send + Sync)) -> bool + Send + Sync>),
}

impl Predicate {
    fn accepts(&self, instance: &(dyn Any + Send + Sync), type_id: TypeId) -> bool {
        match self {
            Predicate::Type(f) => f(type_id),
            Predicate::Value(f) => f(instance),
        }
    }
}

/// Managed class and constructor to instantiate for a native instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstructorPair {
    /// Class to instantiate
    pub class: ClassRef,
    /// Constructor taking the peer handle
    pub ctor: MethodId,
}

struct Level {
    depth: u32,
    class: String,
    predicate: Predicate,
}

/// Builder for [`ClassChain`]
pub struct ClassChainBuilder {
    base: String,
    ctor_signature: String,
    levels: Vec<Level>,
    members: Vec<TypeId>,
}

impl ClassChainBuilder {
    /// Constructor signature shared by every class of the chain
    pub fn ctor_signature(mut self, sig: impl Into<String>) -> Self {
        self.ctor_signature = sig.into();
        self
    }

    /// Add a subclass level decided by the instance's value. Deeper levels
    /// are tried first; levels of equal depth in insertion order.
    pub fn level<F>(self, depth: u32, class: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&(dyn Any + Send + Sync)) -> bool + Send + Sync + 'static,
    {
        self.push(depth, class.into(), Predicate::Value(Box::new(predicate)))
    }

    /// Add a subclass level decided by the instance's concrete type only
    pub fn type_level<F>(self, depth: u32, class: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(TypeId) -> bool + Send + Sync + 'static,
    {
        self.push(depth, class.into(), Predicate::Type(Box::new(predicate)))
    }

    /// Add a level matching exactly the native type `T`, and make `T` a member
    pub fn subclass<T: Any>(self, depth: u32, class: impl Into<String>) -> Self {
        self.member::<T>()
            .type_level(depth, class, |type_id| type_id == TypeId::of::<T>())
    }

    fn push(mut self, depth: u32, class: String, predicate: Predicate) -> Self {
        self.levels.push(Level { depth, class, predicate });
        self
    }

    /// Wrap instances of `T` through this chain
    pub fn member<T: Any>(mut self) -> Self {
        let id = TypeId::of::<T>();
        if !self.members.contains(&id) {
            self.members.push(id);
        }
        self
    }

    /// Finish the chain
    pub fn build(mut self) -> ClassChain {
        self.levels.sort_by(|a, b| b.depth.cmp(&a.depth));
        ClassChain {
            base: self.base,
            ctor_signature: self.ctor_signature,
            levels: self.levels,
            members: self.members,
            selected: DashMap::new(),
        }
    }
}

/// Ordered class levels of one polymorphic native type
pub struct ClassChain {
    base: String,
    ctor_signature: String,
    levels: Vec<Level>,
    members: Vec<TypeId>,
    selected: DashMap<TypeId, Option<usize>>,
}

impl ClassChain {
    /// Start a chain whose fallback is `base_class`
    pub fn builder(base_class: impl Into<String>) -> ClassChainBuilder {
        ClassChainBuilder {
            base: base_class.into(),
            ctor_signature: classes::PEER_CTOR.to_string(),
            levels: Vec::new(),
            members: Vec::new(),
        }
    }

    /// Fallback class
    pub fn base_class(&self) -> &str {
        &self.base
    }

    /// Constructor signature
    pub fn ctor_signature(&self) -> &str {
        &self.ctor_signature
    }

    /// Native types wrapped through this chain
    pub fn members(&self) -> &[TypeId] {
        &self.members
    }

    /// Every class of the chain, most derived first, base last
    pub fn classes(&self) -> impl Iterator<Item = &str> + '_ {
        self.levels
            .iter()
            .map(|level| level.class.as_str())
            .chain(std::iter::once(self.base.as_str()))
    }

    /// Class path for `instance`
    pub fn select(&self, instance: &(dyn Any + Send + Sync)) -> &str {
        let type_id = (*instance).type_id();
        let cached = self.selected.get(&type_id).map(|index| *index);
        let index = match cached {
            Some(index) => index,
            None => {
                let mut by_type = true;
                let index = self.levels.iter().position(|level| {
                    by_type &= matches!(level.predicate, Predicate::Type(_));
                    level.predicate.accepts(instance, type_id)
                });
                // Only a selection no value predicate took part in holds for the whole type
                if by_type {
                    self.selected.insert(type_id, index);
                }
                index
            }
        };
        match index {
            Some(i) => &self.levels[i].class,
            None => &self.base,
        }
    }

    /// Class and constructor to wrap `instance` with
    pub fn constructor_for(&self, bridge: &Bridge, instance: &(dyn Any + Send + Sync)) -> BridgeResult<ConstructorPair> {
        let signature = bridge.describe(self.select(instance))?;
        let ctor = signature.constructor(bridge.env(), &self.ctor_signature)?;
        Ok(ConstructorPair {
            class: signature.class(),
            ctor,
        })
    }
}

impl fmt::Debug for ClassChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassChain")
            .field("base", &self.base)
            .field("levels", &self.levels.iter().map(|l| (l.depth, &l.class)).collect::<Vec<_>>())
            .field("members", &self.members.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shape;
    struct Circle;
    struct Ring;
    struct Donut;
    struct Square;

    fn chain() -> ClassChain {
        ClassChain::builder("demo/Shape")
            .member::<Shape>()
            .subclass::<Circle>(1, "demo/Circle")
            .subclass::<Donut>(3, "demo/Donut")
            .subclass::<Ring>(2, "demo/Ring")
            .build()
    }

    #[test]
    fn test_each_level_selects_its_class() {
        let chain = chain();
        assert_eq!(chain.select(&Shape), "demo/Shape");
        assert_eq!(chain.select(&Circle), "demo/Circle");
        assert_eq!(chain.select(&Ring), "demo/Ring");
        assert_eq!(chain.select(&Donut), "demo/Donut");
        assert_eq!(chain.select(&Square), "demo/Shape");
    }

    #[test]
    fn test_most_derived_first() {
        let chain = ClassChain::builder("demo/Shape")
            .level(1, "demo/Round", |o| o.is::<Circle>() || o.is::<Ring>())
            .level(2, "demo/Ring", |o| o.is::<Ring>())
            .build();
        assert_eq!(chain.select(&Ring), "demo/Ring");
        assert_eq!(chain.select(&Circle), "demo/Round");
        let order: Vec<&str> = chain.classes().collect();
        assert_eq!(order, ["demo/Ring", "demo/Round", "demo/Shape"]);
    }

    #[test]
    fn test_selection_memoized_per_type() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let chain = ClassChain::builder("demo/Shape")
            .type_level(1, "demo/Circle", move |id| {
                counter.fetch_add(1, Ordering::SeqCst);
                id == TypeId::of::<Circle>()
            })
            .build();
        for _ in 0..5 {
            assert_eq!(chain.select(&Circle), "demo/Circle");
            assert_eq!(chain.select(&Square), "demo/Shape");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_value_level_checked_per_instance() {
        enum Outline {
            Round,
            Square,
        }

        let chain = ClassChain::builder("demo/Shape")
            .member::<Outline>()
            .level(1, "demo/Round", |o| matches!(o.downcast_ref::<Outline>(), Some(Outline::Round)))
            .subclass::<Ring>(2, "demo/Ring")
            .build();
        for _ in 0..3 {
            assert_eq!(chain.select(&Outline::Square), "demo/Shape");
            assert_eq!(chain.select(&Outline::Round), "demo/Round");
        }
        // Decided by the type level alone, before any value level runs
        assert_eq!(chain.select(&Ring), "demo/Ring");
        assert!(chain.selected.contains_key(&TypeId::of::<Ring>()));
        assert!(!chain.selected.contains_key(&TypeId::of::<Outline>()));
    }

    #[test]
    fn test_members_deduplicated() {
        let chain = ClassChain::builder("demo/Shape")
            .member::<Shape>()
            .member::<Shape>()
            .subclass::<Circle>(1, "demo/Circle")
            .ctor_signature("(JI)V")
            .build();
        assert_eq!(chain.members().len(), 2);
        assert_eq!(chain.ctor_signature(), "(JI)V");
        assert_eq!(chain.base_class(), "demo/Shape");
    }
}
