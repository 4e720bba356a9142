//! The interface-type index: one record per linked class or interface,
//! holding the caller-dependency tables of the incremental substrate.
//!
//! An [`InterfaceType`] exists for *every* encoded class name the optimizer
//! has ever seen, interfaces and classes alike, and survives the deletion
//! of its class: callers registered on it must still be found and tagged
//! when the name reappears. All references from a record to methods and
//! classes are weak; the caller sets never extend lifetimes.
//!
//! # Locking
//!
//! Every table releases its lock before tagging the methods it collected;
//! a tagged method immediately unsubscribes from its other dependency
//! records, which may target the very tables being swept.

use crate::hierarchy::Class;
use crate::method::{Dependency, MethodImpl};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use solder_ir::{ClassName, MemberNamespace, MethodName};
use std::sync::{Arc, Weak};

// =============================================================================
// Caller Sets
// =============================================================================

/// A set of methods keyed by method id, held weakly.
///
/// Insertion and removal are O(1); `take_all` empties the set and upgrades
/// the survivors, dropping entries whose method has been dropped.
pub(crate) struct CallerSet {
    inner: Mutex<FxHashMap<u64, Weak<MethodImpl>>>,
}

impl CallerSet {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(FxHashMap::default()),
        }
    }

    pub(crate) fn insert(&self, method: &Arc<MethodImpl>) {
        self.inner
            .lock()
            .insert(method.id(), Arc::downgrade(method));
    }

    pub(crate) fn remove(&self, id: u64) {
        self.inner.lock().remove(&id);
    }

    /// Empty the set, returning the still-live members.
    pub(crate) fn take_all(&self) -> Vec<Arc<MethodImpl>> {
        let taken = std::mem::take(&mut *self.inner.lock());
        taken.into_values().filter_map(|w| w.upgrade()).collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

fn tag_all(callers: FxHashMap<u64, Weak<MethodImpl>>) {
    for weak in callers.into_values() {
        if let Some(method) = weak.upgrade() {
            method.tag();
        }
    }
}

// =============================================================================
// Interface Type
// =============================================================================

/// The per-encoded-name record of the incremental substrate.
pub(crate) struct InterfaceType {
    name: ClassName,
    /// Self plus all transitive superclasses and interfaces.
    ancestors: RwLock<Arc<[ClassName]>>,
    /// Instantiated hierarchy classes having this type as an ancestor.
    instantiated_subclasses: RwLock<FxHashMap<ClassName, Weak<Class>>>,
    /// Methods that asked for `ancestors` during their last optimization.
    ancestor_askers: CallerSet,
    /// Per instance-method name, the methods that virtual-called it here.
    dynamic_callers: Mutex<FxHashMap<MethodName, FxHashMap<u64, Weak<MethodImpl>>>>,
    /// Per (namespace, name), the methods that static-called it here.
    static_callers:
        Mutex<FxHashMap<(MemberNamespace, MethodName), FxHashMap<u64, Weak<MethodImpl>>>>,
}

impl InterfaceType {
    fn new(name: ClassName) -> Arc<Self> {
        Arc::new(Self {
            name,
            ancestors: RwLock::new(Arc::from(Vec::new())),
            instantiated_subclasses: RwLock::new(FxHashMap::default()),
            ancestor_askers: CallerSet::new(),
            dynamic_callers: Mutex::new(FxHashMap::default()),
            static_callers: Mutex::new(FxHashMap::default()),
        })
    }

    // -------------------------------------------------------------------------
    // Ancestors
    // -------------------------------------------------------------------------

    /// The current ancestor list.
    pub(crate) fn ancestors(&self) -> Arc<[ClassName]> {
        self.ancestors.read().clone()
    }

    /// Overwrite the ancestor list. When the list actually changed, every
    /// method that observed the old list is tagged.
    pub(crate) fn set_ancestors(&self, ancestors: Vec<ClassName>) {
        {
            let mut current = self.ancestors.write();
            if **current == ancestors[..] {
                return;
            }
            *current = Arc::from(ancestors);
        }
        for asker in self.ancestor_askers.take_all() {
            asker.tag();
        }
    }

    // -------------------------------------------------------------------------
    // Instantiated Subclasses
    // -------------------------------------------------------------------------

    pub(crate) fn add_instantiated_subclass(&self, class: &Arc<Class>) {
        self.instantiated_subclasses
            .write()
            .insert(class.name().clone(), Arc::downgrade(class));
    }

    pub(crate) fn remove_instantiated_subclass(&self, name: &ClassName) {
        self.instantiated_subclasses.write().remove(name);
    }

    /// The currently instantiated classes having this type as an ancestor.
    pub(crate) fn instantiated_subclasses(&self) -> Vec<Arc<Class>> {
        self.instantiated_subclasses
            .read()
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn has_instantiated_subclass(&self, name: &ClassName) -> bool {
        self.instantiated_subclasses.read().contains_key(name)
    }

    // -------------------------------------------------------------------------
    // Registration (PROCESS PASS)
    // -------------------------------------------------------------------------

    /// Subscribe `asker` to changes of this record's ancestor list.
    pub(crate) fn register_ancestor_asker(self: &Arc<Self>, asker: &Arc<MethodImpl>) {
        self.ancestor_askers.insert(asker);
        asker.note_registration(Dependency::AskedAncestors { intf: self.clone() });
    }

    /// Subscribe `asker` as a dynamic caller of `method` on this type.
    pub(crate) fn register_dynamic_caller(
        self: &Arc<Self>,
        method: &MethodName,
        asker: &Arc<MethodImpl>,
    ) {
        self.dynamic_callers
            .lock()
            .entry(method.clone())
            .or_default()
            .insert(asker.id(), Arc::downgrade(asker));
        asker.note_registration(Dependency::DynamicCall {
            intf: self.clone(),
            method: method.clone(),
        });
    }

    /// Subscribe `asker` as a static caller of `(namespace, method)` on
    /// this type.
    pub(crate) fn register_static_caller(
        self: &Arc<Self>,
        namespace: MemberNamespace,
        method: &MethodName,
        asker: &Arc<MethodImpl>,
    ) {
        self.static_callers
            .lock()
            .entry((namespace, method.clone()))
            .or_default()
            .insert(asker.id(), Arc::downgrade(asker));
        asker.note_registration(Dependency::StaticCall {
            intf: self.clone(),
            namespace,
            method: method.clone(),
        });
    }

    // -------------------------------------------------------------------------
    // Unregistration (one-shot sweep of a tagged method)
    // -------------------------------------------------------------------------

    pub(crate) fn remove_ancestor_asker(&self, id: u64) {
        self.ancestor_askers.remove(id);
    }

    pub(crate) fn remove_dynamic_caller(&self, method: &MethodName, id: u64) {
        let mut callers = self.dynamic_callers.lock();
        if let Some(bucket) = callers.get_mut(method) {
            bucket.remove(&id);
            if bucket.is_empty() {
                callers.remove(method);
            }
        }
    }

    pub(crate) fn remove_static_caller(
        &self,
        namespace: MemberNamespace,
        method: &MethodName,
        id: u64,
    ) {
        let mut callers = self.static_callers.lock();
        let key = (namespace, method.clone());
        if let Some(bucket) = callers.get_mut(&key) {
            bucket.remove(&id);
            if bucket.is_empty() {
                callers.remove(&key);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Tagging (UPDATE PASS)
    // -------------------------------------------------------------------------

    /// Tag every dynamic caller of `method` on this type.
    pub(crate) fn tag_dynamic_callers_of(&self, method: &MethodName) {
        let bucket = self.dynamic_callers.lock().remove(method);
        if let Some(bucket) = bucket {
            tag_all(bucket);
        }
    }

    /// Tag every static caller of `(namespace, method)` on this type.
    pub(crate) fn tag_static_callers_of(&self, namespace: MemberNamespace, method: &MethodName) {
        let bucket = self
            .static_callers
            .lock()
            .remove(&(namespace, method.clone()));
        if let Some(bucket) = bucket {
            tag_all(bucket);
        }
    }

    #[cfg(test)]
    pub(crate) fn dynamic_caller_count(&self, method: &MethodName) -> usize {
        self.dynamic_callers
            .lock()
            .get(method)
            .map_or(0, FxHashMap::len)
    }

    #[cfg(test)]
    pub(crate) fn ancestor_asker_count(&self) -> usize {
        self.ancestor_askers.len()
    }
}

impl std::fmt::Debug for InterfaceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterfaceType")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Interface Index
// =============================================================================

/// The single source of truth mapping encoded names to interface-type
/// records. Records are created on demand and never removed.
pub(crate) struct InterfaceIndex {
    records: RwLock<FxHashMap<ClassName, Arc<InterfaceType>>>,
}

impl InterfaceIndex {
    pub(crate) fn new() -> Self {
        Self {
            records: RwLock::new(FxHashMap::default()),
        }
    }

    /// The record for `name`, creating it if this is the first mention.
    pub(crate) fn get_or_create(&self, name: &ClassName) -> Arc<InterfaceType> {
        if let Some(existing) = self.records.read().get(name) {
            return existing.clone();
        }
        self.records
            .write()
            .entry(name.clone())
            .or_insert_with(|| InterfaceType::new(name.clone()))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::Scheduler;
    use solder_ir::MemberNamespace;

    fn method(name: &str) -> Arc<MethodImpl> {
        MethodImpl::new(
            ClassName::new("LCaller"),
            MemberNamespace::PublicInstance,
            MethodName::new(name),
            Arc::new(Scheduler::new()),
        )
    }

    fn interface(name: &str) -> Arc<InterfaceType> {
        InterfaceType::new(ClassName::new(name))
    }

    // -------------------------------------------------------------------------
    // Ancestors
    // -------------------------------------------------------------------------

    #[test]
    fn test_set_ancestors_tags_askers_only_on_change() {
        let intf = interface("LA");
        intf.set_ancestors(vec![ClassName::new("LA")]);

        let asker = method("f__V");
        intf.register_ancestor_asker(&asker);

        // Identical list: no sweep.
        intf.set_ancestors(vec![ClassName::new("LA")]);
        assert_eq!(intf.ancestor_asker_count(), 1);
        assert!(!asker.is_tagged());

        // Changed list: asker tagged and swept.
        intf.set_ancestors(vec![ClassName::new("LA"), ClassName::new("LI")]);
        assert_eq!(intf.ancestor_asker_count(), 0);
        assert!(asker.is_tagged());
    }

    // -------------------------------------------------------------------------
    // Caller tables
    // -------------------------------------------------------------------------

    #[test]
    fn test_dynamic_caller_roundtrip() {
        let intf = interface("LA");
        let caller = method("f__V");
        let m = MethodName::new("m__V");

        intf.register_dynamic_caller(&m, &caller);
        assert_eq!(intf.dynamic_caller_count(&m), 1);

        intf.tag_dynamic_callers_of(&m);
        assert!(caller.is_tagged());
        assert_eq!(intf.dynamic_caller_count(&m), 0);
    }

    #[test]
    fn test_tagged_method_is_absent_from_all_sets() {
        let intf_a = interface("LA");
        let intf_b = interface("LB");
        let caller = method("f__V");
        let m = MethodName::new("m__V");

        intf_a.register_dynamic_caller(&m, &caller);
        intf_b.register_static_caller(MemberNamespace::PublicStatic, &m, &caller);
        intf_b.register_ancestor_asker(&caller);

        // Tagging through one record sweeps the registrations on both.
        intf_a.tag_dynamic_callers_of(&m);

        assert_eq!(intf_b.ancestor_asker_count(), 0);
        intf_b.tag_static_callers_of(MemberNamespace::PublicStatic, &m);
        // Second tag is a no-op: the bit was already set.
        assert!(caller.is_tagged());
    }

    #[test]
    fn test_index_creates_on_demand() {
        let index = InterfaceIndex::new();
        let a = index.get_or_create(&ClassName::new("LA"));
        let again = index.get_or_create(&ClassName::new("LA"));
        assert!(Arc::ptr_eq(&a, &again));
    }
}
