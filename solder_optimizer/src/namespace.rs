//! Static-like namespaces: the non-instance method containers.
//!
//! Every linked class owns one dense array of [`MemberNamespace::COUNT`]
//! containers, indexed by namespace ordinal. For interfaces the
//! public-instance slot holds default methods; for every other kind that
//! slot is allocated but deliberately empty, so that ordinal indexing
//! works uniformly.

use crate::container::{ContainerDiff, MethodContainer};
use crate::optimizer::UpdateCtx;
use crate::unit::LinkedClass;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use solder_ir::{ClassName, MemberNamespace, MethodName};
use std::sync::Arc;

/// The static-like method containers of one encoded class name.
pub(crate) struct StaticsNamespaces {
    slots: [MethodContainer; MemberNamespace::COUNT],
}

impl StaticsNamespaces {
    pub(crate) fn new(owner: &ClassName) -> Self {
        Self {
            slots: std::array::from_fn(|ordinal| {
                MethodContainer::static_like(owner.clone(), MemberNamespace::ALL[ordinal])
            }),
        }
    }

    /// The container at the given namespace ordinal.
    pub(crate) fn slot(&self, namespace: MemberNamespace) -> &MethodContainer {
        &self.slots[namespace.ordinal()]
    }

    /// Run `update_with` on every slot, yielding `(namespace, diff)` for
    /// each.
    pub(crate) fn update_with(
        &self,
        linked: &LinkedClass,
        ctx: &UpdateCtx<'_>,
    ) -> Vec<(MemberNamespace, ContainerDiff)> {
        self.slots
            .iter()
            .map(|slot| (slot.namespace(), slot.update_with(linked, ctx)))
            .collect()
    }

    /// Mark every method of every slot deleted. Returns the deleted
    /// `(namespace, name)` pairs.
    pub(crate) fn delete_all(&self, ctx: &UpdateCtx<'_>) -> Vec<(MemberNamespace, MethodName)> {
        let mut out = Vec::new();
        for slot in &self.slots {
            let namespace = slot.namespace();
            out.extend(
                slot.delete_all(ctx)
                    .into_iter()
                    .map(|name| (namespace, name)),
            );
        }
        out
    }
}

/// The index owning the static-like namespaces of every linked class.
pub(crate) struct StaticsIndex {
    namespaces: RwLock<FxHashMap<ClassName, Arc<StaticsNamespaces>>>,
}

impl StaticsIndex {
    pub(crate) fn new() -> Self {
        Self {
            namespaces: RwLock::new(FxHashMap::default()),
        }
    }

    pub(crate) fn get(&self, name: &ClassName) -> Option<Arc<StaticsNamespaces>> {
        self.namespaces.read().get(name).cloned()
    }

    pub(crate) fn contains(&self, name: &ClassName) -> bool {
        self.namespaces.read().contains_key(name)
    }

    pub(crate) fn insert(&self, name: ClassName, namespaces: Arc<StaticsNamespaces>) {
        self.namespaces.write().insert(name, namespaces);
    }

    pub(crate) fn remove(&self, name: &ClassName) -> Option<Arc<StaticsNamespaces>> {
        self.namespaces.write().remove(name)
    }

    /// The encoded names currently owning namespaces.
    pub(crate) fn names(&self) -> Vec<ClassName> {
        self.namespaces.read().keys().cloned().collect()
    }
}
