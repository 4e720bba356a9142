//! The class hierarchy: a single tree of instantiable classes rooted at
//! the `Object` class.
//!
//! Every node caches its parent chain (strong references pointing rootward
//! only) and owns its direct-subclass set and its public-instance method
//! container. Interface types reference classes weakly; the class table
//! and the parent-to-child edges are the ownership spine, and subtree
//! deletion clears the child edges so dropped subtrees free.

use crate::container::{ContainerDiff, MethodContainer};
use crate::interfaces::InterfaceType;
use crate::method::MethodImpl;
use crate::optimizer::UpdateCtx;
use crate::unit::LinkedClass;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use solder_ir::{
    ClassName, FieldDef, MemberNamespace, MethodName, RecordField, RecordType, Tree,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Module classes whose accessor is elidable regardless of their
/// constructor body.
const ELIDABLE_ACCESSOR_ALLOW_LIST: &[&str] = &["s_Predef$"];

// =============================================================================
// Class Table
// =============================================================================

/// The arena of hierarchy classes, keyed by encoded name.
pub(crate) struct ClassTable {
    classes: RwLock<FxHashMap<ClassName, Arc<Class>>>,
}

impl ClassTable {
    pub(crate) fn new() -> Self {
        Self {
            classes: RwLock::new(FxHashMap::default()),
        }
    }

    pub(crate) fn get(&self, name: &ClassName) -> Option<Arc<Class>> {
        self.classes.read().get(name).cloned()
    }

    pub(crate) fn contains(&self, name: &ClassName) -> bool {
        self.classes.read().contains_key(name)
    }

    pub(crate) fn insert(&self, class: Arc<Class>) {
        self.classes.write().insert(class.name.clone(), class);
    }

    pub(crate) fn remove(&self, name: &ClassName) {
        self.classes.write().remove(name);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.classes.read().len()
    }
}

// =============================================================================
// Class
// =============================================================================

/// One node of the class hierarchy tree. Never an interface.
pub(crate) struct Class {
    name: ClassName,
    /// Absent only for the `Object` root.
    superclass: Option<Arc<Class>>,
    /// Strict ancestors, nearest first: super … Object.
    parent_chain: SmallVec<[Arc<Class>; 8]>,
    /// Direct subclasses. Cleared on subtree deletion so that the
    /// parent-to-child strong edges cannot keep dropped subtrees alive.
    subclasses: RwLock<FxHashMap<ClassName, Arc<Class>>>,
    /// The interface-type record of this class itself.
    my_interface: Arc<InterfaceType>,
    /// Implemented interface types: the flat ancestor set, self included.
    interfaces: RwLock<FxHashMap<ClassName, Arc<InterfaceType>>>,
    is_instantiated: AtomicBool,
    is_module_class: AtomicBool,
    has_elidable_module_accessor: AtomicBool,
    is_inlineable: AtomicBool,
    /// The synthetic zero record for inlineable record classes.
    try_new_inlineable: RwLock<Option<Arc<Tree>>>,
    fields: RwLock<Vec<FieldDef>>,
    /// The public-instance method container.
    methods: MethodContainer,
}

impl Class {
    pub(crate) fn new(
        name: ClassName,
        superclass: Option<&Arc<Class>>,
        my_interface: Arc<InterfaceType>,
    ) -> Arc<Self> {
        let parent_chain = match superclass {
            None => SmallVec::new(),
            Some(parent) => {
                let mut chain = SmallVec::with_capacity(1 + parent.parent_chain.len());
                chain.push(parent.clone());
                chain.extend(parent.parent_chain.iter().cloned());
                chain
            }
        };
        Arc::new(Self {
            methods: MethodContainer::for_class(name.clone()),
            name,
            superclass: superclass.cloned(),
            parent_chain,
            subclasses: RwLock::new(FxHashMap::default()),
            my_interface,
            interfaces: RwLock::new(FxHashMap::default()),
            is_instantiated: AtomicBool::new(false),
            is_module_class: AtomicBool::new(false),
            has_elidable_module_accessor: AtomicBool::new(false),
            is_inlineable: AtomicBool::new(false),
            try_new_inlineable: RwLock::new(None),
            fields: RwLock::new(Vec::new()),
        })
    }

    /// The class's encoded name.
    pub(crate) fn name(&self) -> &ClassName {
        &self.name
    }

    /// The encoded name of the immediate superclass, if any.
    pub(crate) fn superclass_name(&self) -> Option<&ClassName> {
        self.superclass.as_ref().map(|s| &s.name)
    }

    pub(crate) fn is_instantiated(&self) -> bool {
        self.is_instantiated.load(Ordering::Acquire)
    }

    pub(crate) fn has_elidable_module_accessor(&self) -> bool {
        self.has_elidable_module_accessor.load(Ordering::Acquire)
    }

    pub(crate) fn try_new_inlineable(&self) -> Option<Arc<Tree>> {
        self.try_new_inlineable.read().clone()
    }

    /// Snapshot of the direct subclasses.
    pub(crate) fn subclasses(&self) -> Vec<Arc<Class>> {
        self.subclasses.read().values().cloned().collect()
    }

    pub(crate) fn add_subclass(&self, child: Arc<Class>) {
        self.subclasses.write().insert(child.name.clone(), child);
    }

    pub(crate) fn remove_subclass(&self, name: &ClassName) {
        self.subclasses.write().remove(name);
    }

    // -------------------------------------------------------------------------
    // Method lookup
    // -------------------------------------------------------------------------

    /// Direct lookup in this class's own container.
    pub(crate) fn own_method(&self, name: &MethodName) -> Option<Arc<MethodImpl>> {
        self.methods.lookup(name)
    }

    /// Resolve an instance method along the parent chain.
    pub(crate) fn lookup_method(&self, name: &MethodName) -> Option<Arc<MethodImpl>> {
        if let Some(method) = self.methods.lookup(name) {
            return Some(method);
        }
        self.parent_chain
            .iter()
            .find_map(|parent| parent.methods.lookup(name))
    }

    /// The merged instance-method map of the whole parent chain, child
    /// definitions shadowing parent ones.
    ///
    /// Deliberately not cached: it is consulted only on
    /// instantiation-state transitions.
    pub(crate) fn all_methods(&self) -> FxHashMap<MethodName, Arc<MethodImpl>> {
        let mut merged = FxHashMap::default();
        for class in self.parent_chain.iter().rev() {
            for (name, method) in class.methods.snapshot() {
                merged.insert(name, method);
            }
        }
        for (name, method) in self.methods.snapshot() {
            merged.insert(name, method);
        }
        merged
    }

    fn all_method_names(&self) -> Vec<MethodName> {
        self.all_methods().into_keys().collect()
    }

    // -------------------------------------------------------------------------
    // UPDATE PASS: per-class change processing
    // -------------------------------------------------------------------------

    /// Reconcile the public-instance container and the class-level
    /// bookkeeping with the new linked class.
    fn update_with(&self, linked: &LinkedClass, ctx: &UpdateCtx<'_>) -> ContainerDiff {
        self.is_module_class
            .store(linked.kind.is_module_class(), Ordering::Release);
        *self.fields.write() = linked.fields.clone();
        self.methods.update_with(linked, ctx)
    }

    /// Process the change set of a retained or freshly inserted class and
    /// return the change set to propagate to subclasses.
    ///
    /// `parent_changes` is the set of method-attribute changes inherited
    /// from the parent walk, empty at the root and for fresh insertions.
    pub(crate) fn walk_for_changes(
        self: &Arc<Self>,
        linked: &LinkedClass,
        parent_changes: &FxHashSet<MethodName>,
        ctx: &UpdateCtx<'_>,
    ) -> FxHashSet<MethodName> {
        let diff = self.update_with(linked, ctx);
        let methods_changed_here = diff.all_changed();

        // A child inherits every parent-level change except names it
        // overrides locally, plus every change at this level.
        let local_names: FxHashSet<MethodName> = self.methods.method_names().into_iter().collect();
        let mut propagated: FxHashSet<MethodName> = parent_changes
            .iter()
            .filter(|name| !local_names.contains(*name))
            .cloned()
            .collect();
        propagated.extend(methods_changed_here);

        let old_interfaces = self.interfaces.read().clone();
        let new_interfaces: FxHashMap<ClassName, Arc<InterfaceType>> = linked
            .ancestors
            .iter()
            .map(|ancestor| (ancestor.clone(), ctx.interfaces.get_or_create(ancestor)))
            .collect();
        *self.interfaces.write() = new_interfaces.clone();

        let was = self.is_instantiated();
        let now = linked.has_instances;
        assert!(
            !(was && !now),
            "class {} lost its instantiations outside the deletion pass",
            self.name
        );

        if !was && now {
            self.is_instantiated.store(true, Ordering::Release);
            let all_names = self.all_method_names();
            for intf in new_interfaces.values() {
                intf.add_instantiated_subclass(self);
                if !ctx.batch {
                    for name in &all_names {
                        intf.tag_dynamic_callers_of(name);
                    }
                }
            }
        } else if was && now && !ctx.batch {
            for (name, intf) in &new_interfaces {
                if old_interfaces.contains_key(name) {
                    for method in &propagated {
                        intf.tag_dynamic_callers_of(method);
                    }
                }
            }
            let mut symmetric_difference: Vec<&Arc<InterfaceType>> = Vec::new();
            for (name, intf) in &old_interfaces {
                if !new_interfaces.contains_key(name) {
                    intf.remove_instantiated_subclass(&self.name);
                    symmetric_difference.push(intf);
                }
            }
            for (name, intf) in &new_interfaces {
                if !old_interfaces.contains_key(name) {
                    intf.add_instantiated_subclass(self);
                    symmetric_difference.push(intf);
                }
            }
            if !symmetric_difference.is_empty() {
                let all_names = self.all_method_names();
                for intf in symmetric_difference {
                    for name in &all_names {
                        intf.tag_dynamic_callers_of(name);
                    }
                }
            }
        }

        if !ctx.batch {
            for name in &propagated {
                self.my_interface
                    .tag_static_callers_of(MemberNamespace::PublicInstance, name);
            }
        }

        self.update_module_accessor_elidability(ctx);
        self.update_record_inlineability(linked, ctx);

        propagated
    }

    // -------------------------------------------------------------------------
    // UPDATE PASS: deletion
    // -------------------------------------------------------------------------

    /// Delete this class and its entire subtree: tag the methods as
    /// deleted, drop the nodes from the class table, and run the
    /// no-longer-instantiated bookkeeping where needed.
    pub(crate) fn delete_subtree(&self, ctx: &UpdateCtx<'_>) {
        let children = self.subclasses();
        self.subclasses.write().clear();
        for child in children {
            child.delete_subtree(ctx);
        }
        if self.is_instantiated() {
            self.not_instantiated_any_more();
        }
        self.methods.delete_all(ctx);
        ctx.classes.remove(&self.name);
        ctx.stats.note_class_removed();
    }

    /// Sweep this class out of every `instantiated_subclasses` set and
    /// invalidate the dynamic callers that could have resolved into it.
    fn not_instantiated_any_more(&self) {
        self.is_instantiated.store(false, Ordering::Release);
        let all_names = self.all_method_names();
        for intf in self.interfaces.read().values() {
            intf.remove_instantiated_subclass(&self.name);
            for name in &all_names {
                intf.tag_dynamic_callers_of(name);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Module-accessor elidability
    // -------------------------------------------------------------------------

    /// Recompute whether this module class's accessor can skip the
    /// lazy-initialization check.
    ///
    /// No invalidation happens here: every reader of this flag is a
    /// static caller of the class's constructor, and constructor body
    /// changes already tag those.
    fn update_module_accessor_elidability(&self, ctx: &UpdateCtx<'_>) {
        let elidable = ELIDABLE_ACCESSOR_ALLOW_LIST.contains(&self.name.as_str())
            || (self.is_module_class.load(Ordering::Acquire)
                && self.is_elidable_constructor(
                    &self.name,
                    &MethodName::no_arg_constructor(),
                    ctx,
                    &mut SmallVec::new(),
                ));
        self.has_elidable_module_accessor
            .store(elidable, Ordering::Release);
    }

    fn is_elidable_constructor(
        &self,
        class: &ClassName,
        ctor: &MethodName,
        ctx: &UpdateCtx<'_>,
        visited: &mut SmallVec<[(ClassName, MethodName); 4]>,
    ) -> bool {
        let key = (class.clone(), ctor.clone());
        if visited.contains(&key) {
            return false;
        }
        visited.push(key);
        match constructor_body(class, ctor, ctx) {
            Some(body) => self.is_elidable_tree(&body, ctx, visited),
            None => false,
        }
    }

    fn is_elidable_tree(
        &self,
        tree: &Tree,
        ctx: &UpdateCtx<'_>,
        visited: &mut SmallVec<[(ClassName, MethodName); 4]>,
    ) -> bool {
        match tree {
            Tree::Block(stats) => stats.iter().all(|s| self.is_elidable_tree(s, ctx, visited)),
            Tree::Assign { lhs, rhs } => {
                matches!(
                    lhs.as_ref(),
                    Tree::Select { qualifier, .. } if matches!(qualifier.as_ref(), Tree::This)
                ) && rhs.is_trivially_pure()
            }
            Tree::StoreModule { .. } => true,
            Tree::ApplyStatically {
                class,
                namespace: MemberNamespace::Constructor,
                method,
                receiver,
                args,
            } => {
                let receiver_is_this = receiver
                    .as_ref()
                    .map_or(true, |r| matches!(r.as_ref(), Tree::This));
                if !receiver_is_this || !args.iter().all(Tree::is_trivially_pure) {
                    return false;
                }
                if ctx.classes.contains(class) {
                    // Delegation to a same- or super-class constructor,
                    // elidable iff that constructor is.
                    (*class == self.name
                        || self.parent_chain.iter().any(|p| p.name == *class))
                        && self.is_elidable_constructor(class, method, ctx, visited)
                } else {
                    // A mixin constructor qualifies only with an original
                    // body of `Skip`.
                    matches!(constructor_body(class, method, ctx), Some(body) if *body == Tree::Skip)
                }
            }
            t => t.is_trivially_pure(),
        }
    }

    // -------------------------------------------------------------------------
    // Inlineable-record derivation
    // -------------------------------------------------------------------------

    /// Recompute the record-class inlining hint and, when it changed,
    /// invalidate every static caller of this class's constructors.
    fn update_record_inlineability(&self, linked: &LinkedClass, ctx: &UpdateCtx<'_>) {
        let inlineable = linked.hints.inline;
        let new_value = inlineable.then(|| Arc::new(self.compute_inlineable_record()));

        let changed = {
            let mut current = self.try_new_inlineable.write();
            let changed = match (&*current, &new_value) {
                (None, None) => false,
                (Some(old), Some(new)) => **old != **new,
                _ => true,
            };
            *current = new_value;
            changed
        };
        self.is_inlineable.store(inlineable, Ordering::Release);

        if changed && !ctx.batch {
            if let Some(statics) = ctx.statics.get(&self.name) {
                for ctor in statics.slot(MemberNamespace::Constructor).method_names() {
                    self.my_interface
                        .tag_static_callers_of(MemberNamespace::Constructor, &ctor);
                }
            }
        }
    }

    /// The zero record value mirroring the non-static fields of the full
    /// parent chain, root to leaf.
    fn compute_inlineable_record(&self) -> Tree {
        let mut record_fields = Vec::new();
        for class in self.parent_chain.iter().rev() {
            class.append_record_fields(&mut record_fields);
        }
        self.append_record_fields(&mut record_fields);
        RecordType {
            fields: record_fields,
        }
        .zero_value()
    }

    fn append_record_fields(&self, out: &mut Vec<RecordField>) {
        for field in self.fields.read().iter() {
            if !field.is_static {
                out.push(RecordField {
                    name: field.name.clone(),
                    tpe: field.tpe.clone(),
                });
            }
        }
    }
}

/// The original body of `class`'s constructor `ctor`, resolved through the
/// statics index.
fn constructor_body(
    class: &ClassName,
    ctor: &MethodName,
    ctx: &UpdateCtx<'_>,
) -> Option<Arc<Tree>> {
    let statics = ctx.statics.get(class)?;
    let method = statics.slot(MemberNamespace::Constructor).lookup(ctor)?;
    let def = method.original_def()?;
    def.body.clone().map(Arc::new)
}

impl std::fmt::Debug for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("superclass", &self.superclass_name())
            .field("instantiated", &self.is_instantiated())
            .finish_non_exhaustive()
    }
}
