//! The incremental optimizer orchestrator.
//!
//! [`IncOptimizer`] is the single long-lived value of the component. One
//! call to [`IncOptimizer::update`] runs two sequential phases:
//!
//! 1. **UPDATE PASS** reconciles the retained class hierarchy, the
//!    static-like namespaces and the interface-type index with the new
//!    linking unit, and *tags* every method whose previous optimization
//!    may have been invalidated.
//! 2. **PROCESS PASS** drains the scheduled-method queue and optimizes
//!    each method, re-registering its dependencies through the hook
//!    calls it makes.
//!
//! The first run of a fresh optimizer is *batch mode*: no deletion
//! bookkeeping and no caller notifications, since nothing was retained.

use crate::collops::ExecMode;
use crate::core::OptimizerHooks;
use crate::error::{OptimizeError, OptimizeResult};
use crate::hierarchy::{Class, ClassTable};
use crate::interfaces::InterfaceIndex;
use crate::method::MethodImpl;
use crate::namespace::{StaticsIndex, StaticsNamespaces};
use crate::unit::{LinkedClass, LinkingUnit};
use crossbeam_deque::{Injector, Steal};
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use solder_ir::{ClassName, MemberNamespace, MethodDef, MethodName, Tree};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration of the incremental optimizer.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Fan out independent work across the thread pool. The sequential
    /// backend produces identical results.
    pub parallel: bool,
    /// Maximum body size (in tree nodes) below which a method is
    /// considered inlineable without an explicit hint.
    pub inline_body_size_limit: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            inline_body_size_limit: 16,
        }
    }
}

impl OptimizerConfig {
    /// A configuration running everything on the calling thread.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    pub(crate) fn exec_mode(&self) -> ExecMode {
        if self.parallel {
            ExecMode::Parallel
        } else {
            ExecMode::Sequential
        }
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Sink for the orchestrator's run diagnostics.
///
/// The optimizer holds the logger for the duration of one `update` call
/// and releases it on every exit path.
pub trait Logger: Send + Sync {
    /// A free-form diagnostic line.
    fn debug(&self, message: &str) {
        let _ = message;
    }

    /// A phase finished in `elapsed`.
    fn time(&self, title: &str, elapsed: Duration) {
        let _ = (title, elapsed);
    }
}

/// A logger that drops everything.
pub struct NullLogger;

impl Logger for NullLogger {}

/// Clears the acquired logger on every exit path, panics included.
struct LoggerGuard<'a>(&'a RwLock<Option<Arc<dyn Logger>>>);

impl Drop for LoggerGuard<'_> {
    fn drop(&mut self) {
        *self.0.write() = None;
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Atomic run counters, in the spirit of the rest of the pipeline's
/// instrumentation.
#[derive(Debug, Default)]
pub struct OptimizerStats {
    runs: AtomicU64,
    classes_added: AtomicU64,
    classes_removed: AtomicU64,
    methods_added: AtomicU64,
    methods_deleted: AtomicU64,
    methods_tagged: AtomicU64,
    methods_processed: AtomicU64,
}

impl OptimizerStats {
    pub(crate) fn note_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }
    pub(crate) fn note_class_added(&self) {
        self.classes_added.fetch_add(1, Ordering::Relaxed);
    }
    pub(crate) fn note_class_removed(&self) {
        self.classes_removed.fetch_add(1, Ordering::Relaxed);
    }
    pub(crate) fn note_method_added(&self) {
        self.methods_added.fetch_add(1, Ordering::Relaxed);
    }
    pub(crate) fn note_method_deleted(&self) {
        self.methods_deleted.fetch_add(1, Ordering::Relaxed);
    }
    pub(crate) fn note_methods_tagged(&self, count: u64) {
        self.methods_tagged.fetch_add(count, Ordering::Relaxed);
    }
    pub(crate) fn note_method_processed(&self) {
        self.methods_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// A point-in-time copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            classes_added: self.classes_added.load(Ordering::Relaxed),
            classes_removed: self.classes_removed.load(Ordering::Relaxed),
            methods_added: self.methods_added.load(Ordering::Relaxed),
            methods_deleted: self.methods_deleted.load(Ordering::Relaxed),
            methods_tagged: self.methods_tagged.load(Ordering::Relaxed),
            methods_processed: self.methods_processed.load(Ordering::Relaxed),
        }
    }
}

/// A copy of the optimizer's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct StatsSnapshot {
    pub runs: u64,
    pub classes_added: u64,
    pub classes_removed: u64,
    pub methods_added: u64,
    pub methods_deleted: u64,
    pub methods_tagged: u64,
    pub methods_processed: u64,
}

// =============================================================================
// Scheduling
// =============================================================================

/// The scheduled-methods queue drained by PROCESS PASS.
pub(crate) struct Scheduler {
    injector: Injector<Arc<MethodImpl>>,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self {
            injector: Injector::new(),
        }
    }

    /// Enqueue a freshly tagged method.
    pub(crate) fn schedule(&self, method: Arc<MethodImpl>) {
        self.injector.push(method);
    }

    /// Empty the queue.
    pub(crate) fn drain(&self) -> Vec<Arc<MethodImpl>> {
        let mut out = Vec::new();
        loop {
            match self.injector.steal() {
                Steal::Success(method) => out.push(method),
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }
        out
    }
}

/// Re-enqueues still-tagged methods when PROCESS PASS unwinds or fails,
/// so the next run re-schedules them.
struct RequeueGuard<'a> {
    scheduler: &'a Scheduler,
    methods: &'a [Arc<MethodImpl>],
}

impl Drop for RequeueGuard<'_> {
    fn drop(&mut self) {
        for method in self.methods {
            if method.is_tagged() && !method.is_deleted() {
                self.scheduler.schedule(method.clone());
            }
        }
    }
}

// =============================================================================
// Update Context
// =============================================================================

/// Shared references threaded through every UPDATE PASS operation.
pub(crate) struct UpdateCtx<'a> {
    pub batch: bool,
    pub config: &'a OptimizerConfig,
    pub stats: &'a OptimizerStats,
    pub scheduler: &'a Arc<Scheduler>,
    pub interfaces: &'a InterfaceIndex,
    pub statics: &'a StaticsIndex,
    pub classes: &'a ClassTable,
}

// =============================================================================
// Process Context (the hook implementation)
// =============================================================================

/// The hook implementation handed to the intra-method optimizer while one
/// method is being processed. Every query subscribes the method to the
/// consulted record before answering.
pub(crate) struct ProcessContext<'a> {
    method: Arc<MethodImpl>,
    optimizer: &'a IncOptimizer,
}

impl<'a> ProcessContext<'a> {
    pub(crate) fn new(method: Arc<MethodImpl>, optimizer: &'a IncOptimizer) -> Self {
        Self { method, optimizer }
    }
}

impl OptimizerHooks for ProcessContext<'_> {
    fn dynamic_call_targets(
        &self,
        interface: &ClassName,
        method: &MethodName,
    ) -> Vec<Arc<MethodImpl>> {
        let intf = self.optimizer.interfaces.get_or_create(interface);
        intf.register_dynamic_caller(method, &self.method);

        let mut seen = FxHashSet::default();
        let mut targets = Vec::new();
        for class in intf.instantiated_subclasses() {
            if let Some(target) = class.lookup_method(method) {
                if seen.insert(target.id()) {
                    targets.push(target);
                }
            }
        }
        targets
    }

    fn static_call_target(
        &self,
        class: &ClassName,
        namespace: MemberNamespace,
        method: &MethodName,
    ) -> Option<Arc<MethodImpl>> {
        let intf = self.optimizer.interfaces.get_or_create(class);
        intf.register_static_caller(namespace, method, &self.method);

        if namespace == MemberNamespace::PublicInstance {
            if let Some(class) = self.optimizer.classes.get(class) {
                return class.lookup_method(method);
            }
        }
        self.optimizer
            .statics
            .get(class)?
            .slot(namespace)
            .lookup(method)
    }

    fn method_body(&self, target: &Arc<MethodImpl>) -> Option<Arc<MethodDef>> {
        target.register_body_asker(&self.method);
        target.original_def()
    }

    fn ancestors_of(&self, interface: &ClassName) -> Arc<[ClassName]> {
        let intf = self.optimizer.interfaces.get_or_create(interface);
        intf.register_ancestor_asker(&self.method);
        intf.ancestors()
    }

    fn has_elidable_module_accessor(&self, class: &ClassName) -> bool {
        self.optimizer
            .classes
            .get(class)
            .map_or(false, |c| c.has_elidable_module_accessor())
    }

    fn try_new_inlineable_class(&self, class: &ClassName) -> Option<Arc<Tree>> {
        self.optimizer
            .classes
            .get(class)
            .and_then(|c| c.try_new_inlineable())
    }
}

// =============================================================================
// The Orchestrator
// =============================================================================

/// The incremental whole-program method optimizer.
///
/// Owns the class hierarchy, the static-like namespaces and the
/// interface-type index across runs; these are the only long-lived
/// mutable state of the component.
pub struct IncOptimizer {
    config: OptimizerConfig,
    object_class: RwLock<Option<Arc<Class>>>,
    classes: ClassTable,
    statics: StaticsIndex,
    interfaces: InterfaceIndex,
    scheduler: Arc<Scheduler>,
    stats: OptimizerStats,
    logger: RwLock<Option<Arc<dyn Logger>>>,
}

impl Default for IncOptimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

impl IncOptimizer {
    /// A fresh optimizer with no retained state; its first `update` runs
    /// in batch mode.
    #[must_use]
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            config,
            object_class: RwLock::new(None),
            classes: ClassTable::new(),
            statics: StaticsIndex::new(),
            interfaces: InterfaceIndex::new(),
            scheduler: Arc::new(Scheduler::new()),
            stats: OptimizerStats::default(),
            logger: RwLock::new(None),
        }
    }

    /// A point-in-time copy of the run counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Optimize a linking unit, reusing every method optimization whose
    /// inputs did not change since the previous run.
    ///
    /// Not re-entrant, which `&mut self` enforces. The logger is held for
    /// the duration of the call and released on all exit paths.
    pub fn update(
        &mut self,
        unit: &LinkingUnit,
        logger: Arc<dyn Logger>,
    ) -> OptimizeResult<LinkingUnit> {
        *self.logger.write() = Some(logger);
        let _logger_guard = LoggerGuard(&self.logger);

        let batch = self.object_class.read().is_none();
        self.debug(&format!(
            "inc. optimizer: start of {} run over {} classes",
            if batch { "batch" } else { "incremental" },
            unit.classes.len()
        ));

        let start = Instant::now();
        self.update_pass(unit, batch);
        self.time("inc. optimizer: update pass", start.elapsed());

        let start = Instant::now();
        self.process_pass()?;
        self.time("inc. optimizer: process pass", start.elapsed());

        let out = self.rebuild(unit);
        self.stats.note_run();
        Ok(out)
    }

    fn debug(&self, message: &str) {
        if let Some(logger) = self.logger.read().as_ref() {
            logger.debug(message);
        }
    }

    fn time(&self, title: &str, elapsed: Duration) {
        if let Some(logger) = self.logger.read().as_ref() {
            logger.time(title, elapsed);
        }
    }

    fn ctx<'a>(&'a self, batch: bool) -> UpdateCtx<'a> {
        UpdateCtx {
            batch,
            config: &self.config,
            stats: &self.stats,
            scheduler: &self.scheduler,
            interfaces: &self.interfaces,
            statics: &self.statics,
            classes: &self.classes,
        }
    }

    // -------------------------------------------------------------------------
    // UPDATE PASS
    // -------------------------------------------------------------------------

    fn update_pass(&self, unit: &LinkingUnit, batch: bool) {
        let ctx = self.ctx(batch);
        let exec = self.config.exec_mode();

        let new_classes: FxHashMap<&ClassName, &LinkedClass> =
            unit.classes.iter().map(|lc| (&lc.name, lc)).collect();
        debug_assert_eq!(
            new_classes.len(),
            unit.classes.len(),
            "duplicate encoded names in the linking unit"
        );

        // Step A: refresh every ancestor list. Safe across distinct
        // records; askers of actually-changed lists are tagged.
        exec.for_each(&unit.classes, |lc| {
            self.interfaces
                .get_or_create(&lc.name)
                .set_ancestors(lc.ancestors.clone());
        });

        // Step B: static-like namespaces.
        if !batch {
            let mut retained = Vec::new();
            for name in self.statics.names() {
                if new_classes.contains_key(&name) {
                    retained.push(name);
                } else if let Some(namespaces) = self.statics.remove(&name) {
                    let deleted = namespaces.delete_all(&ctx);
                    let intf = self.interfaces.get_or_create(&name);
                    for (namespace, method) in deleted {
                        intf.tag_static_callers_of(namespace, &method);
                    }
                }
            }

            exec.for_each(&retained, |name| {
                let linked = new_classes[name];
                let namespaces = self
                    .statics
                    .get(name)
                    .expect("retained statics disappeared");
                let intf = self.interfaces.get_or_create(name);
                for (namespace, diff) in namespaces.update_with(linked, &ctx) {
                    for method in diff.all_changed() {
                        intf.tag_static_callers_of(namespace, &method);
                    }
                }
            });
        }

        let added: Vec<&LinkedClass> = unit
            .classes
            .iter()
            .filter(|lc| !self.statics.contains(&lc.name))
            .collect();
        exec.for_each(&added, |lc| {
            let namespaces = Arc::new(StaticsNamespaces::new(&lc.name));
            self.statics.insert(lc.name.clone(), namespaces.clone());
            let diffs = namespaces.update_with(lc, &ctx);
            if !batch {
                let intf = self.interfaces.get_or_create(&lc.name);
                for (namespace, diff) in diffs {
                    for method in diff.all_changed() {
                        intf.tag_static_callers_of(namespace, &method);
                    }
                }
            }
        });

        // Step C: deletions and retained-class changes, rooted at Object.
        if !batch {
            let object = self
                .object_class
                .read()
                .clone()
                .expect("incremental run without an established Object class");
            let keep =
                self.walk_incremental(&object, &new_classes, &FxHashSet::default(), &ctx);
            assert!(keep, "the Object class was reported deleted");
        }

        // Step D: class additions, grouped by immediate superclass.
        let mut buckets: FxHashMap<Option<ClassName>, Vec<&LinkedClass>> = FxHashMap::default();
        for lc in &unit.classes {
            if lc.kind.has_hierarchy_node() && !self.classes.contains(&lc.name) {
                buckets.entry(lc.super_class.clone()).or_default().push(lc);
            }
        }
        if buckets.is_empty() {
            return;
        }
        let new_names: FxHashSet<&ClassName> =
            buckets.values().flatten().map(|lc| &lc.name).collect();

        if batch {
            let roots = buckets.get(&None).map_or(&[][..], Vec::as_slice);
            assert!(
                roots.len() == 1,
                "batch mode requires exactly one root class, found {}",
                roots.len()
            );
            for parent in buckets.keys().flatten() {
                assert!(
                    new_names.contains(parent),
                    "class inserted under unknown parent {parent}"
                );
            }
            let root_linked = roots[0];
            let root = Class::new(
                root_linked.name.clone(),
                None,
                self.interfaces.get_or_create(&root_linked.name),
            );
            self.classes.insert(root.clone());
            ctx.stats.note_class_added();
            root.walk_for_changes(root_linked, &FxHashSet::default(), &ctx);
            self.insert_children(&root, &buckets, &ctx);
            *self.object_class.write() = Some(root);
        } else {
            assert!(
                !buckets.contains_key(&None),
                "a class without a superclass appeared in incremental mode"
            );
            for parent in buckets.keys().flatten() {
                assert!(
                    self.classes.contains(parent) || new_names.contains(parent),
                    "class inserted under unknown parent {parent}"
                );
            }
            // Distinct existing parents that received new children; their
            // subtrees are disjoint, so insertion fans out.
            let roots: Vec<Arc<Class>> = buckets
                .keys()
                .flatten()
                .filter(|parent| !new_names.contains(*parent))
                .filter_map(|parent| self.classes.get(parent))
                .collect();
            exec.for_each(&roots, |parent| self.insert_children(parent, &buckets, &ctx));
        }
    }

    /// Fused deletion/change walk: keep a node only when it still exists
    /// with the same immediate superclass, process its change set, and
    /// recurse with the propagated set; otherwise delete the subtree.
    fn walk_incremental(
        &self,
        class: &Arc<Class>,
        new_classes: &FxHashMap<&ClassName, &LinkedClass>,
        parent_changes: &FxHashSet<MethodName>,
        ctx: &UpdateCtx<'_>,
    ) -> bool {
        let retained = match new_classes.get(&class.name()) {
            Some(linked)
                if linked.kind.has_hierarchy_node()
                    && linked.super_class.as_ref() == class.superclass_name() =>
            {
                Some(*linked)
            }
            _ => None,
        };
        let Some(linked) = retained else {
            class.delete_subtree(ctx);
            return false;
        };

        let propagated = class.walk_for_changes(linked, parent_changes, ctx);
        for child in class.subclasses() {
            if !self.walk_incremental(&child, new_classes, &propagated, ctx) {
                class.remove_subclass(child.name());
            }
        }
        true
    }

    /// Insert the new children of `parent`, set each up, and recurse.
    fn insert_children(
        &self,
        parent: &Arc<Class>,
        buckets: &FxHashMap<Option<ClassName>, Vec<&LinkedClass>>,
        ctx: &UpdateCtx<'_>,
    ) {
        let Some(children) = buckets.get(&Some(parent.name().clone())) else {
            return;
        };
        for linked in children {
            let class = Class::new(
                linked.name.clone(),
                Some(parent),
                self.interfaces.get_or_create(&linked.name),
            );
            self.classes.insert(class.clone());
            parent.add_subclass(class.clone());
            ctx.stats.note_class_added();
            class.walk_for_changes(linked, &FxHashSet::default(), ctx);
            self.insert_children(&class, buckets, ctx);
        }
    }

    // -------------------------------------------------------------------------
    // PROCESS PASS
    // -------------------------------------------------------------------------

    fn process_pass(&self) -> OptimizeResult<()> {
        let scheduled = self.scheduler.drain();
        if scheduled.is_empty() {
            return Ok(());
        }
        self.stats.note_methods_tagged(scheduled.len() as u64);
        self.debug(&format!(
            "inc. optimizer: processing {} methods",
            scheduled.len()
        ));

        let _requeue = RequeueGuard {
            scheduler: &self.scheduler,
            methods: &scheduled,
        };
        let failure: Mutex<Option<OptimizeError>> = Mutex::new(None);
        self.config.exec_mode().for_each(&scheduled, |method| {
            match method.process(self) {
                Ok(()) => self.stats.note_method_processed(),
                Err(err) => {
                    failure.lock().get_or_insert(err);
                }
            }
        });
        match failure.into_inner() {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    // -------------------------------------------------------------------------
    // Rebuilding the unit
    // -------------------------------------------------------------------------

    /// Substitute every linked method with its optimized definition from
    /// the container that owns it.
    fn rebuild(&self, unit: &LinkingUnit) -> LinkingUnit {
        let classes = unit
            .classes
            .iter()
            .map(|lc| {
                let methods = lc
                    .methods
                    .iter()
                    .map(|linked_method| {
                        let namespace = linked_method.value.flags.namespace;
                        let name = &linked_method.value.name;
                        let method = if namespace == MemberNamespace::PublicInstance
                            && lc.kind.has_hierarchy_node()
                        {
                            self.classes
                                .get(&lc.name)
                                .and_then(|class| class.own_method(name))
                        } else {
                            self.statics
                                .get(&lc.name)
                                .and_then(|ns| ns.slot(namespace).lookup(name))
                        };
                        method
                            .and_then(|m| m.optimized_snapshot())
                            .unwrap_or_else(|| {
                                panic!("no optimized definition for {}::{}", lc.name, name)
                            })
                    })
                    .collect();
                lc.optimized(methods)
            })
            .collect();
        LinkingUnit {
            core_spec: unit.core_spec.clone(),
            classes,
            module_initializers: unit.module_initializers.clone(),
        }
    }
}

impl std::fmt::Debug for IncOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncOptimizer")
            .field("config", &self.config)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solder_ir::{ClassKind, Versioned};

    // -------------------------------------------------------------------------
    // Test Helpers
    // -------------------------------------------------------------------------

    fn method(name: &str, namespace: MemberNamespace, body: Tree) -> Versioned<Arc<MethodDef>> {
        let def = MethodDef::new(MethodName::new(name), namespace, body).hashed();
        let version = def.hash.expect("hashed").to_hex();
        Versioned::new(version, Arc::new(def))
    }

    fn object_class() -> LinkedClass {
        LinkedClass {
            name: ClassName::new("LObject"),
            kind: ClassKind::Class,
            super_class: None,
            ancestors: vec![ClassName::new("LObject")],
            has_instances: true,
            fields: Vec::new(),
            methods: Vec::new(),
            hints: Default::default(),
        }
    }

    fn class(
        name: &str,
        super_class: &str,
        ancestors: &[&str],
        has_instances: bool,
        methods: Vec<Versioned<Arc<MethodDef>>>,
    ) -> LinkedClass {
        LinkedClass {
            name: ClassName::new(name),
            kind: ClassKind::Class,
            super_class: Some(ClassName::new(super_class)),
            ancestors: ancestors.iter().map(|a| ClassName::new(*a)).collect(),
            has_instances,
            fields: Vec::new(),
            methods,
            hints: Default::default(),
        }
    }

    fn run(opt: &mut IncOptimizer, unit: &LinkingUnit) -> LinkingUnit {
        opt.update(unit, Arc::new(NullLogger)).expect("update failed")
    }

    fn optimizer() -> IncOptimizer {
        IncOptimizer::new(OptimizerConfig::sequential())
    }

    fn hello_unit() -> LinkingUnit {
        LinkingUnit::of_classes(vec![
            object_class(),
            class(
                "LA",
                "LObject",
                &["LA", "LObject"],
                false,
                vec![method("m__V", MemberNamespace::PublicInstance, Tree::Skip)],
            ),
            class("LB", "LA", &["LB", "LA", "LObject"], true, vec![]),
        ])
    }

    // -------------------------------------------------------------------------
    // Batch mode
    // -------------------------------------------------------------------------

    #[test]
    fn test_batch_builds_the_tree() {
        let mut opt = optimizer();
        run(&mut opt, &hello_unit());

        assert_eq!(opt.classes.len(), 3);
        let a = opt.classes.get(&ClassName::new("LA")).expect("LA exists");
        assert_eq!(
            a.superclass_name(),
            Some(&ClassName::new("LObject"))
        );
        let subclass_names: Vec<ClassName> = a
            .subclasses()
            .iter()
            .map(|c| c.name().clone())
            .collect();
        assert_eq!(subclass_names, vec![ClassName::new("LB")]);
    }

    #[test]
    fn test_instantiation_mirror() {
        let mut opt = optimizer();
        run(&mut opt, &hello_unit());

        let intf_a = opt.interfaces.get_or_create(&ClassName::new("LA"));
        assert!(intf_a.has_instantiated_subclass(&ClassName::new("LB")));
        // A itself is abstract here.
        assert!(!intf_a.has_instantiated_subclass(&ClassName::new("LA")));
    }

    #[test]
    fn test_inherited_lookup() {
        let mut opt = optimizer();
        run(&mut opt, &hello_unit());

        let a = opt.classes.get(&ClassName::new("LA")).expect("LA exists");
        let b = opt.classes.get(&ClassName::new("LB")).expect("LB exists");
        let m = MethodName::new("m__V");
        let from_b = b.lookup_method(&m).expect("m resolves on B");
        let from_a = a.lookup_method(&m).expect("m resolves on A");
        assert!(Arc::ptr_eq(&from_a, &from_b));
    }

    #[test]
    fn test_every_method_processed_once_in_batch() {
        let mut opt = optimizer();
        run(&mut opt, &hello_unit());
        assert_eq!(opt.stats().methods_processed, 1);
        assert_eq!(opt.stats().methods_tagged, 1);
    }

    // -------------------------------------------------------------------------
    // Incremental runs
    // -------------------------------------------------------------------------

    #[test]
    fn test_identical_rerun_schedules_nothing() {
        let mut opt = optimizer();
        let unit = hello_unit();
        run(&mut opt, &unit);
        let before = opt.stats();
        let out = run(&mut opt, &unit);
        let after = opt.stats();

        assert_eq!(after.methods_processed, before.methods_processed);
        assert_eq!(after.methods_tagged, before.methods_tagged);
        assert_eq!(after.methods_deleted, 0);
        assert_eq!(after.classes_removed, 0);
        assert_eq!(out.classes.len(), 3);
    }

    #[test]
    fn test_subtree_deletion_clears_the_table() {
        let mut opt = optimizer();
        let unit = LinkingUnit::of_classes(vec![
            object_class(),
            class(
                "LA",
                "LObject",
                &["LA", "LObject"],
                false,
                vec![method("a__V", MemberNamespace::PublicInstance, Tree::Skip)],
            ),
            class(
                "LB",
                "LA",
                &["LB", "LA", "LObject"],
                true,
                vec![method("b__V", MemberNamespace::PublicInstance, Tree::Skip)],
            ),
            class(
                "LC",
                "LB",
                &["LC", "LB", "LA", "LObject"],
                true,
                vec![method("c__V", MemberNamespace::PublicInstance, Tree::Skip)],
            ),
        ]);
        run(&mut opt, &unit);
        assert_eq!(opt.classes.len(), 4);

        let shrunk = LinkingUnit::of_classes(vec![
            object_class(),
            class(
                "LA",
                "LObject",
                &["LA", "LObject"],
                false,
                vec![method("a__V", MemberNamespace::PublicInstance, Tree::Skip)],
            ),
        ]);
        run(&mut opt, &shrunk);

        assert_eq!(opt.classes.len(), 2);
        assert!(!opt.classes.contains(&ClassName::new("LB")));
        assert!(!opt.classes.contains(&ClassName::new("LC")));
        let a = opt.classes.get(&ClassName::new("LA")).expect("LA kept");
        assert!(a.subclasses().is_empty());
        assert_eq!(a.all_methods().len(), 1);
        assert_eq!(opt.stats().classes_removed, 2);
        assert_eq!(opt.stats().methods_deleted, 2);
    }

    #[test]
    fn test_superclass_change_reinserts_the_class() {
        let mut opt = optimizer();
        let unit = LinkingUnit::of_classes(vec![
            object_class(),
            class("LA", "LObject", &["LA", "LObject"], false, vec![]),
            class("LB", "LObject", &["LB", "LObject"], false, vec![]),
            class("LC", "LA", &["LC", "LA", "LObject"], true, vec![]),
        ]);
        run(&mut opt, &unit);

        // C moves from under A to under B.
        let moved = LinkingUnit::of_classes(vec![
            object_class(),
            class("LA", "LObject", &["LA", "LObject"], false, vec![]),
            class("LB", "LObject", &["LB", "LObject"], false, vec![]),
            class("LC", "LB", &["LC", "LB", "LObject"], true, vec![]),
        ]);
        run(&mut opt, &moved);

        let c = opt.classes.get(&ClassName::new("LC")).expect("LC exists");
        assert_eq!(c.superclass_name(), Some(&ClassName::new("LB")));
        let a = opt.classes.get(&ClassName::new("LA")).expect("LA exists");
        assert!(a.subclasses().is_empty());
    }

    #[test]
    #[should_panic(expected = "Object class was reported deleted")]
    fn test_deleting_object_panics() {
        let mut opt = optimizer();
        run(&mut opt, &hello_unit());

        let no_object = LinkingUnit::of_classes(vec![class(
            "LA",
            "LObject",
            &["LA", "LObject"],
            false,
            vec![],
        )]);
        let _ = opt.update(&no_object, Arc::new(NullLogger));
    }

    #[test]
    #[should_panic(expected = "unknown parent")]
    fn test_unknown_parent_panics_in_incremental_mode() {
        let mut opt = optimizer();
        run(&mut opt, &hello_unit());

        let mut with_orphan = hello_unit();
        with_orphan.classes.push(class(
            "LD",
            "LMissing",
            &["LD", "LMissing", "LObject"],
            false,
            vec![],
        ));
        let _ = opt.update(&with_orphan, Arc::new(NullLogger));
    }

    // -------------------------------------------------------------------------
    // Rebuild
    // -------------------------------------------------------------------------

    #[test]
    fn test_rebuild_versions_every_method() {
        let mut opt = optimizer();
        let out = run(&mut opt, &hello_unit());

        let a = out
            .classes
            .iter()
            .find(|c| c.name == "LA")
            .expect("LA in output");
        assert_eq!(a.methods.len(), 1);
        assert_eq!(a.methods[0].version.as_deref(), Some("1"));
        assert!(a.methods[0].value.hash.is_none());
    }
}
