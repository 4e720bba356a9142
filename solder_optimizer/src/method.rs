//! Method implementations: the per-method unit of incremental work.
//!
//! A [`MethodImpl`] owns the current input definition of one method, its
//! optimized output, and the bookkeeping that makes reuse provable across
//! runs: the input version stamp, the monotonic output version, the
//! one-shot *tag* bit, and the list of dependency records the method
//! subscribed to during its last optimization.
//!
//! # Tagging
//!
//! Tagging is the linearization point of invalidation. The transition of
//! the tag bit from clear to set happens at most once per run; the caller
//! that wins it schedules the method for PROCESS PASS and performs the
//! one-shot unsubscription from every dependency record. `tag` is safe to
//! race with itself and with `delete` on the same instance.

use crate::core::OptimizerCore;
use crate::error::OptimizeResult;
use crate::interfaces::{CallerSet, InterfaceType};
use crate::optimizer::{IncOptimizer, OptimizerConfig, ProcessContext, Scheduler};
use parking_lot::{Mutex, RwLock};
use solder_ir::{
    version, ClassName, MemberNamespace, MethodDef, MethodName, Tree, Type, Versioned,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Process-wide id allocator for method implementations.
///
/// Ids key the caller sets of the interface-type index, giving O(1)
/// removal that is independent of allocation addresses.
static NEXT_METHOD_ID: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// Method Attributes
// =============================================================================

/// The attributes of a method exposed to the intra-method optimizer.
///
/// An attribute change is what `update_with` reports upward, because
/// callers specialize on attributes even when they did not inline the
/// body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MethodAttributes {
    /// The method may be inlined at call sites.
    pub inlineable: bool,
    /// The body is a single call forwarding all parameters.
    pub is_forwarder: bool,
}

impl MethodAttributes {
    fn compute(def: &MethodDef, config: &OptimizerConfig) -> Self {
        let is_forwarder = match &def.body {
            Some(Tree::Apply { receiver, args, .. }) => {
                receiver.is_trivially_pure() && args.iter().all(Tree::is_trivially_pure)
            }
            Some(Tree::ApplyStatically { receiver, args, .. }) => {
                receiver.as_ref().map_or(true, |r| r.is_trivially_pure())
                    && args.iter().all(Tree::is_trivially_pure)
            }
            _ => false,
        };
        let small = def
            .body
            .as_ref()
            .is_some_and(|b| b.size() <= config.inline_body_size_limit);
        let inlineable =
            !def.hints.no_inline && (def.hints.inline || is_forwarder || small);
        Self {
            inlineable,
            is_forwarder,
        }
    }
}

// =============================================================================
// Dependency Records
// =============================================================================

/// One subscription of a method onto a record it consulted while being
/// optimized. Unregistration is O(1) per entry, keyed by the method id.
pub(crate) enum Dependency {
    /// The method asked for the ancestors of an interface type.
    AskedAncestors { intf: Arc<InterfaceType> },
    /// The method performed a virtual call on an interface type.
    DynamicCall {
        intf: Arc<InterfaceType>,
        method: MethodName,
    },
    /// The method performed a statically bound call.
    StaticCall {
        intf: Arc<InterfaceType>,
        namespace: MemberNamespace,
        method: MethodName,
    },
    /// The method asked for the body of another method.
    MethodBody { target: Weak<MethodImpl> },
}

impl Dependency {
    fn unregister(&self, asker_id: u64) {
        match self {
            Dependency::AskedAncestors { intf } => intf.remove_ancestor_asker(asker_id),
            Dependency::DynamicCall { intf, method } => {
                intf.remove_dynamic_caller(method, asker_id);
            }
            Dependency::StaticCall {
                intf,
                namespace,
                method,
            } => intf.remove_static_caller(*namespace, method, asker_id),
            Dependency::MethodBody { target } => {
                if let Some(target) = target.upgrade() {
                    target.body_askers.remove(asker_id);
                }
            }
        }
    }
}

// =============================================================================
// Method Implementation
// =============================================================================

/// Mutable state of a method, behind one lock.
struct MethodState {
    /// Version stamp of the input this method was last updated from.
    last_in_version: Option<String>,
    /// The current input definition.
    original_def: Option<Arc<MethodDef>>,
    /// Attributes derived from the current input definition.
    attributes: MethodAttributes,
    /// The optimized output of the last PROCESS PASS that ran this method.
    optimized_def: Option<Versioned<Arc<MethodDef>>>,
}

/// The incremental state of one method.
pub struct MethodImpl {
    id: u64,
    owner_class: ClassName,
    namespace: MemberNamespace,
    name: MethodName,
    deleted: AtomicBool,
    tag: AtomicBool,
    /// Monotonic counter versioning the emitted optimized definitions.
    last_out_version: AtomicU64,
    state: RwLock<MethodState>,
    /// Dependency records this method subscribed to since it was last
    /// tagged.
    registered_to: Mutex<Vec<Dependency>>,
    /// Methods that asked for this method's body.
    body_askers: CallerSet,
    scheduler: Arc<Scheduler>,
}

impl MethodImpl {
    pub(crate) fn new(
        owner_class: ClassName,
        namespace: MemberNamespace,
        name: MethodName,
        scheduler: Arc<Scheduler>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_METHOD_ID.fetch_add(1, Ordering::Relaxed),
            owner_class,
            namespace,
            name,
            deleted: AtomicBool::new(false),
            tag: AtomicBool::new(false),
            last_out_version: AtomicU64::new(0),
            state: RwLock::new(MethodState {
                last_in_version: None,
                original_def: None,
                attributes: MethodAttributes::default(),
                optimized_def: None,
            }),
            registered_to: Mutex::new(Vec::new()),
            body_askers: CallerSet::new(),
            scheduler,
        })
    }

    /// The process-wide unique id of this implementation.
    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// The encoded name of the class owning this method's container.
    #[inline]
    #[must_use]
    pub fn owner_class(&self) -> &ClassName {
        &self.owner_class
    }

    /// The namespace of the owning container.
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> MemberNamespace {
        self.namespace
    }

    /// The method's encoded name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &MethodName {
        &self.name
    }

    /// The attributes derived from the current input definition.
    #[must_use]
    pub fn attributes(&self) -> MethodAttributes {
        self.state.read().attributes
    }

    /// The current input definition.
    #[must_use]
    pub fn original_def(&self) -> Option<Arc<MethodDef>> {
        self.state.read().original_def.clone()
    }

    pub(crate) fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    pub(crate) fn is_tagged(&self) -> bool {
        self.tag.load(Ordering::Acquire)
    }

    /// The optimized definition emitted by the last processing of this
    /// method, versioned by the output counter.
    pub(crate) fn optimized_snapshot(&self) -> Option<Versioned<Arc<MethodDef>>> {
        self.state.read().optimized_def.clone()
    }

    // -------------------------------------------------------------------------
    // UPDATE PASS operations
    // -------------------------------------------------------------------------

    /// Absorb a new input definition.
    ///
    /// Returns whether the method's *attributes* changed, which is what
    /// the owning container propagates to the hierarchy walk. When the
    /// input version matches the last one, the definition is not even
    /// inspected. When the version differs but the content hash is equal,
    /// the hash is authoritative: nothing changes except the recorded
    /// version stamp.
    pub(crate) fn update_with(
        self: &Arc<Self>,
        linked: &Versioned<Arc<MethodDef>>,
        config: &OptimizerConfig,
    ) -> bool {
        assert!(
            !self.is_deleted(),
            "method {}::{} updated after deletion",
            self.owner_class,
            self.name
        );

        let mut state = self.state.write();
        if version::same_version(&state.last_in_version, &linked.version) {
            return false;
        }
        state.last_in_version.clone_from(&linked.version);

        let body_changed = match (&state.original_def, &linked.value.hash) {
            (Some(old), Some(new_hash)) => old.hash.as_ref() != Some(new_hash),
            _ => true,
        };
        if !body_changed {
            return false;
        }

        self.tag_body_askers();
        let old_attributes = state.attributes;
        state.original_def = Some(linked.value.clone());
        state.attributes = MethodAttributes::compute(&linked.value, config);
        let attributes_changed = state.attributes != old_attributes;
        drop(state);

        self.tag();
        attributes_changed
    }

    /// Mark this method deleted. Must not already be deleted.
    pub(crate) fn delete(self: &Arc<Self>) {
        assert!(
            !self.deleted.swap(true, Ordering::AcqRel),
            "method {}::{} deleted twice",
            self.owner_class,
            self.name
        );
        if self.protect_tag() {
            self.unregister_from_all();
        }
    }

    /// Tag this method for reoptimization.
    ///
    /// The caller that transitions the tag bit from clear to set schedules
    /// the method and performs the one-shot unsubscription; later calls in
    /// the same run are no-ops. Deleted methods are never scheduled: their
    /// `delete` already consumed the transition, or `process` will observe
    /// the deleted flag.
    pub(crate) fn tag(self: &Arc<Self>) {
        if self.protect_tag() {
            self.scheduler.schedule(self.clone());
            self.unregister_from_all();
        }
    }

    /// Tag every method that asked for this method's body.
    fn tag_body_askers(&self) {
        for asker in self.body_askers.take_all() {
            asker.tag();
        }
    }

    /// Attempt the clear-to-set transition of the tag bit.
    #[inline]
    fn protect_tag(&self) -> bool {
        !self.tag.swap(true, Ordering::AcqRel)
    }

    fn unregister_from_all(&self) {
        let deps = std::mem::take(&mut *self.registered_to.lock());
        for dep in deps {
            dep.unregister(self.id);
        }
    }

    // -------------------------------------------------------------------------
    // PROCESS PASS operations
    // -------------------------------------------------------------------------

    /// Record a subscription so it can be swept when this method is
    /// tagged or deleted.
    pub(crate) fn note_registration(&self, dep: Dependency) {
        self.registered_to.lock().push(dep);
    }

    /// Subscribe `asker` to changes of this method's body.
    pub(crate) fn register_body_asker(self: &Arc<Self>, asker: &Arc<MethodImpl>) {
        self.body_askers.insert(asker);
        asker.note_registration(Dependency::MethodBody {
            target: Arc::downgrade(self),
        });
    }

    /// Optimize this method, re-registering its dependencies through the
    /// hook calls the intra-method optimizer makes, and reset the tag bit.
    pub(crate) fn process(self: &Arc<Self>, optimizer: &IncOptimizer) -> OptimizeResult<()> {
        if self.is_deleted() {
            return Ok(());
        }
        let original = self
            .state
            .read()
            .original_def
            .clone()
            .expect("processing a method that was never updated");

        let this_type = if self.namespace.is_static() {
            None
        } else {
            Some(Type::Class(self.owner_class.clone()))
        };
        let hooks = ProcessContext::new(self.clone(), optimizer);
        let optimized =
            OptimizerCore::optimize(&hooks, &self.owner_class, this_type.as_ref(), &original)?;

        let out_version = self.last_out_version.fetch_add(1, Ordering::AcqRel) + 1;
        self.state.write().optimized_def = Some(Versioned::new(
            out_version.to_string(),
            Arc::new(optimized),
        ));
        self.tag.store(false, Ordering::Release);
        Ok(())
    }
}

impl std::fmt::Debug for MethodImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodImpl")
            .field("owner", &self.owner_class)
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("deleted", &self.is_deleted())
            .field("tagged", &self.is_tagged())
            .finish_non_exhaustive()
    }
}
