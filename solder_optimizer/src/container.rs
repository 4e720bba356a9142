//! The shared method-container surface.
//!
//! Exactly two kinds of container exist: the public-instance container
//! owned by a hierarchy [`Class`](crate::hierarchy::Class), and the
//! static-like namespaces owned by the statics index. Both share this
//! structure; the only behavioral difference is which linked methods they
//! accept, so it is a field rather than a trait.

use crate::method::MethodImpl;
use crate::optimizer::UpdateCtx;
use crate::unit::LinkedClass;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use solder_ir::{ClassName, MemberNamespace, MethodName};
use std::sync::Arc;

/// The outcome of reconciling a container with a new linked class.
#[derive(Debug, Default)]
pub(crate) struct ContainerDiff {
    /// Names that were not present before.
    pub added: FxHashSet<MethodName>,
    /// Names whose method reported an attribute change.
    pub changed: FxHashSet<MethodName>,
    /// Names no longer present.
    pub deleted: FxHashSet<MethodName>,
}

impl ContainerDiff {
    /// added ∪ changed ∪ deleted.
    pub(crate) fn all_changed(&self) -> FxHashSet<MethodName> {
        let mut out = self.added.clone();
        out.extend(self.changed.iter().cloned());
        out.extend(self.deleted.iter().cloned());
        out
    }
}

/// A mapping from method encoded name to method implementation for one
/// (class, namespace) pair.
pub(crate) struct MethodContainer {
    owner: ClassName,
    namespace: MemberNamespace,
    /// Static-like containers live in the statics index; the other kind
    /// is the public-instance container of a hierarchy class.
    is_static_like: bool,
    methods: RwLock<FxHashMap<MethodName, Arc<MethodImpl>>>,
}

impl MethodContainer {
    /// The public-instance container of a hierarchy class.
    pub(crate) fn for_class(owner: ClassName) -> Self {
        Self::new(owner, MemberNamespace::PublicInstance, false)
    }

    /// One static-like namespace slot.
    pub(crate) fn static_like(owner: ClassName, namespace: MemberNamespace) -> Self {
        Self::new(owner, namespace, true)
    }

    fn new(owner: ClassName, namespace: MemberNamespace, is_static_like: bool) -> Self {
        Self {
            owner,
            namespace,
            is_static_like,
            methods: RwLock::new(FxHashMap::default()),
        }
    }

    /// The namespace this container holds.
    pub(crate) fn namespace(&self) -> MemberNamespace {
        self.namespace
    }

    /// Whether a linked method belongs in this container.
    ///
    /// The public-instance slot of the static-like namespaces holds linked
    /// methods only for interfaces (their default methods); for any other
    /// kind those methods are owned by the hierarchy class.
    fn accepts(&self, linked: &LinkedClass, namespace: MemberNamespace) -> bool {
        namespace == self.namespace
            && !(self.is_static_like
                && self.namespace == MemberNamespace::PublicInstance
                && !linked.kind.is_interface())
    }

    /// Reconcile this container with the methods of a new linked class.
    ///
    /// Freshly seen names allocate a method implementation (which tags
    /// itself through its first `update_with`); retained names absorb the
    /// new definition; missing names are deleted.
    pub(crate) fn update_with(&self, linked: &LinkedClass, ctx: &UpdateCtx<'_>) -> ContainerDiff {
        let mut diff = ContainerDiff::default();
        let mut methods = self.methods.write();

        let new_defs: FxHashMap<&MethodName, _> = linked
            .methods
            .iter()
            .filter(|m| self.accepts(linked, m.value.flags.namespace))
            .map(|m| (&m.value.name, m))
            .collect();

        methods.retain(|name, method| {
            if new_defs.contains_key(name) {
                true
            } else {
                method.delete();
                ctx.stats.note_method_deleted();
                diff.deleted.insert(name.clone());
                false
            }
        });

        for (name, linked_method) in new_defs {
            if let Some(existing) = methods.get(name) {
                if existing.update_with(linked_method, ctx.config) {
                    diff.changed.insert(name.clone());
                }
            } else {
                let method = MethodImpl::new(
                    self.owner.clone(),
                    self.namespace,
                    name.clone(),
                    ctx.scheduler.clone(),
                );
                method.update_with(linked_method, ctx.config);
                ctx.stats.note_method_added();
                methods.insert(name.clone(), method);
                diff.added.insert(name.clone());
            }
        }

        // The public-instance static-like slot of a non-interface class is
        // deliberately empty; it exists so that ordinal indexing works
        // uniformly.
        debug_assert!(
            !(self.is_static_like
                && self.namespace == MemberNamespace::PublicInstance
                && !linked.kind.is_interface())
                || methods.is_empty(),
            "public-instance statics slot of {} is not empty",
            self.owner
        );

        diff
    }

    /// Direct lookup, no superclass walk.
    pub(crate) fn lookup(&self, name: &MethodName) -> Option<Arc<MethodImpl>> {
        self.methods.read().get(name).cloned()
    }

    /// The names currently present.
    pub(crate) fn method_names(&self) -> Vec<MethodName> {
        self.methods.read().keys().cloned().collect()
    }

    /// Current (name, method) pairs.
    pub(crate) fn snapshot(&self) -> Vec<(MethodName, Arc<MethodImpl>)> {
        self.methods
            .read()
            .iter()
            .map(|(name, method)| (name.clone(), method.clone()))
            .collect()
    }

    /// Mark every method deleted and empty the container. Returns the
    /// deleted names.
    pub(crate) fn delete_all(&self, ctx: &UpdateCtx<'_>) -> Vec<MethodName> {
        let taken = std::mem::take(&mut *self.methods.write());
        let mut names = Vec::with_capacity(taken.len());
        for (name, method) in taken {
            method.delete();
            ctx.stats.note_method_deleted();
            names.push(name);
        }
        names
    }
}

impl std::fmt::Debug for MethodContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodContainer")
            .field("owner", &self.owner)
            .field("namespace", &self.namespace)
            .field("len", &self.methods.read().len())
            .finish()
    }
}
