//! The intra-method optimizer.
//!
//! `OptimizerCore` is a pure function from a method definition to an
//! optimized method definition. Everything it knows about the rest of the
//! program flows through the [`OptimizerHooks`]; every hook call
//! subscribes the method being optimized to the consulted record, so that
//! a later change of that record tags the method for reoptimization.
//!
//! The transformations are deliberately local:
//!
//! - block flattening and folding of conditionals on literal conditions
//! - devirtualization of single-target dynamic calls
//! - elision of statically bound calls to empty bodies
//! - direct module access for modules with an elidable accessor
//! - replacement of inlineable record-class allocations by zero records
//! - folding of instance tests decided by the ancestor lists

use crate::error::{OptimizeError, OptimizeResult};
use crate::method::MethodImpl;
use solder_ir::{ClassName, Literal, MemberNamespace, MethodDef, MethodName, Tree, Type};
use std::sync::Arc;

// =============================================================================
// Hooks
// =============================================================================

/// The whole-program queries available to the intra-method optimizer.
///
/// Implementations register the current method as a dependent of whatever
/// record they consult *before* returning the answer.
pub trait OptimizerHooks {
    /// The possible targets of a virtual call of `method` on `interface`,
    /// one per distinct resolved implementation across the instantiated
    /// subclasses.
    fn dynamic_call_targets(
        &self,
        interface: &ClassName,
        method: &MethodName,
    ) -> Vec<Arc<MethodImpl>>;

    /// The target of a statically bound call, if it links.
    fn static_call_target(
        &self,
        class: &ClassName,
        namespace: MemberNamespace,
        method: &MethodName,
    ) -> Option<Arc<MethodImpl>>;

    /// The original body of a resolved target.
    fn method_body(&self, target: &Arc<MethodImpl>) -> Option<Arc<MethodDef>>;

    /// The ancestor list of an interface type.
    fn ancestors_of(&self, interface: &ClassName) -> Arc<[ClassName]>;

    /// Side-table read: whether the module class's accessor is elidable.
    fn has_elidable_module_accessor(&self, class: &ClassName) -> bool;

    /// Side-table read: the zero record of an inlineable record class.
    fn try_new_inlineable_class(&self, class: &ClassName) -> Option<Arc<Tree>>;
}

// =============================================================================
// Optimizer Core
// =============================================================================

/// The intra-method optimizer. Stateless; all context comes in through
/// the hooks.
pub struct OptimizerCore;

impl OptimizerCore {
    /// Optimize one method definition.
    ///
    /// `owner` is the class whose container holds the method; `this_type`
    /// is the type of the receiver for instance-like members, absent for
    /// static ones. The output definition carries no content hash; it is
    /// versioned by the emitting method's output counter.
    pub fn optimize(
        hooks: &dyn OptimizerHooks,
        owner: &ClassName,
        this_type: Option<&Type>,
        def: &MethodDef,
    ) -> OptimizeResult<MethodDef> {
        let _ = this_type;
        let rewriter = Rewriter { hooks, owner, def };
        let body = match &def.body {
            None => None,
            Some(body) => Some(rewriter.transform(body)?),
        };
        Ok(MethodDef {
            name: def.name.clone(),
            flags: def.flags,
            hints: def.hints,
            hash: None,
            body,
        })
    }
}

struct Rewriter<'a> {
    hooks: &'a dyn OptimizerHooks,
    owner: &'a ClassName,
    def: &'a MethodDef,
}

impl Rewriter<'_> {
    fn malformed(&self, message: impl Into<String>) -> OptimizeError {
        OptimizeError::MalformedBody {
            class: self.owner.clone(),
            method: self.def.name.clone(),
            message: message.into(),
        }
    }

    fn transform_all(&self, trees: &[Tree]) -> OptimizeResult<Vec<Tree>> {
        trees.iter().map(|t| self.transform(t)).collect()
    }

    fn transform(&self, tree: &Tree) -> OptimizeResult<Tree> {
        match tree {
            Tree::Skip | Tree::Literal(_) | Tree::VarRef(_) | Tree::This => Ok(tree.clone()),

            Tree::Block(stats) => {
                let mut flat = Vec::with_capacity(stats.len());
                for stat in stats {
                    match self.transform(stat)? {
                        Tree::Skip => {}
                        Tree::Block(inner) => flat.extend(inner),
                        other => flat.push(other),
                    }
                }
                Ok(match flat.len() {
                    0 => Tree::Skip,
                    1 => flat.pop().expect("len checked"),
                    _ => Tree::Block(flat),
                })
            }

            Tree::Select { qualifier, field } => Ok(Tree::Select {
                qualifier: Box::new(self.transform(qualifier)?),
                field: field.clone(),
            }),

            Tree::Assign { lhs, rhs } => {
                if !matches!(lhs.as_ref(), Tree::VarRef(_) | Tree::Select { .. }) {
                    return Err(self.malformed("assignment target is not a var or select"));
                }
                Ok(Tree::Assign {
                    lhs: Box::new(self.transform(lhs)?),
                    rhs: Box::new(self.transform(rhs)?),
                })
            }

            Tree::If { cond, thenp, elsep } => {
                let cond = self.transform(cond)?;
                if let Tree::Literal(Literal::Bool(value)) = cond {
                    return self.transform(if value { thenp } else { elsep });
                }
                Ok(Tree::If {
                    cond: Box::new(cond),
                    thenp: Box::new(self.transform(thenp)?),
                    elsep: Box::new(self.transform(elsep)?),
                })
            }

            Tree::StoreModule { class, value } => Ok(Tree::StoreModule {
                class: class.clone(),
                value: Box::new(self.transform(value)?),
            }),

            Tree::LoadModule { class, .. } => {
                let elidable = self.hooks.has_elidable_module_accessor(class);
                // Subscribe to the constructor whose body decides
                // elidability: resolving it registers the static call,
                // fetching its body registers the body-ask. Either change
                // re-optimizes this method.
                if let Some(ctor) = self.hooks.static_call_target(
                    class,
                    MemberNamespace::Constructor,
                    &MethodName::no_arg_constructor(),
                ) {
                    let _ = self.hooks.method_body(&ctor);
                }
                Ok(Tree::LoadModule {
                    class: class.clone(),
                    direct: elidable,
                })
            }

            Tree::Apply {
                receiver_type,
                receiver,
                method,
                args,
            } => {
                let receiver = self.transform(receiver)?;
                let args = self.transform_all(args)?;
                let targets = self.hooks.dynamic_call_targets(receiver_type, method);
                if let [target] = targets.as_slice() {
                    // Single resolved implementation: bind statically.
                    return self.finish_static_call(
                        target.owner_class().clone(),
                        MemberNamespace::PublicInstance,
                        method.clone(),
                        Some(receiver),
                        args,
                    );
                }
                Ok(Tree::Apply {
                    receiver_type: receiver_type.clone(),
                    receiver: Box::new(receiver),
                    method: method.clone(),
                    args,
                })
            }

            Tree::ApplyStatically {
                class,
                namespace,
                method,
                receiver,
                args,
            } => {
                let receiver = match receiver {
                    None => None,
                    Some(receiver) => Some(self.transform(receiver)?),
                };
                let args = self.transform_all(args)?;
                self.finish_static_call(
                    class.clone(),
                    *namespace,
                    method.clone(),
                    receiver,
                    args,
                )
            }

            Tree::New { class, ctor, args } => {
                let args = self.transform_all(args)?;
                if let Some(zero) = self.hooks.try_new_inlineable_class(class) {
                    let ctor_target = self.hooks.static_call_target(
                        class,
                        MemberNamespace::Constructor,
                        ctor,
                    );
                    if args.iter().all(Tree::is_trivially_pure)
                        && self.target_body_is_skip(ctor_target.as_ref())
                    {
                        return Ok((*zero).clone());
                    }
                }
                Ok(Tree::New {
                    class: class.clone(),
                    ctor: ctor.clone(),
                    args,
                })
            }

            Tree::RecordValue { record, fields } => {
                if record.fields.len() != fields.len() {
                    return Err(self.malformed("record arity mismatch"));
                }
                Ok(Tree::RecordValue {
                    record: record.clone(),
                    fields: self.transform_all(fields)?,
                })
            }

            Tree::IsInstanceOf {
                expr,
                expr_type,
                test,
            } => {
                let expr = self.transform(expr)?;
                let ancestors = self.hooks.ancestors_of(expr_type);
                if ancestors.contains(test) && expr.is_trivially_pure() {
                    return Ok(Tree::Literal(Literal::Bool(true)));
                }
                Ok(Tree::IsInstanceOf {
                    expr: Box::new(expr),
                    expr_type: expr_type.clone(),
                    test: test.clone(),
                })
            }
        }
    }

    /// Resolve a statically bound call and elide it when the target body
    /// is empty and the call has no evaluation order to preserve.
    fn finish_static_call(
        &self,
        class: ClassName,
        namespace: MemberNamespace,
        method: MethodName,
        receiver: Option<Tree>,
        args: Vec<Tree>,
    ) -> OptimizeResult<Tree> {
        let target = self.hooks.static_call_target(&class, namespace, &method);
        let receiver_pure = receiver.as_ref().map_or(true, Tree::is_trivially_pure);
        if receiver_pure
            && args.iter().all(Tree::is_trivially_pure)
            && self.target_body_is_skip(target.as_ref())
        {
            return Ok(Tree::unit());
        }
        Ok(Tree::ApplyStatically {
            class,
            namespace,
            method,
            receiver: receiver.map(Box::new),
            args,
        })
    }

    /// Whether the target resolves, is inlineable, and has a `Skip` body.
    /// Fetching the body registers the body-ask subscription.
    fn target_body_is_skip(&self, target: Option<&Arc<MethodImpl>>) -> bool {
        let Some(target) = target else {
            return false;
        };
        if !target.attributes().inlineable {
            return false;
        }
        matches!(
            self.hooks.method_body(target).as_deref(),
            Some(MethodDef {
                body: Some(Tree::Skip),
                ..
            })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solder_ir::LocalName;

    /// Hooks over an empty program: no targets, no ancestors, no side
    /// tables.
    struct EmptyProgram;

    impl OptimizerHooks for EmptyProgram {
        fn dynamic_call_targets(&self, _: &ClassName, _: &MethodName) -> Vec<Arc<MethodImpl>> {
            Vec::new()
        }
        fn static_call_target(
            &self,
            _: &ClassName,
            _: MemberNamespace,
            _: &MethodName,
        ) -> Option<Arc<MethodImpl>> {
            None
        }
        fn method_body(&self, _: &Arc<MethodImpl>) -> Option<Arc<MethodDef>> {
            None
        }
        fn ancestors_of(&self, interface: &ClassName) -> Arc<[ClassName]> {
            Arc::from(vec![interface.clone(), ClassName::new("LObject")])
        }
        fn has_elidable_module_accessor(&self, class: &ClassName) -> bool {
            class.as_str() == "s_Elidable$"
        }
        fn try_new_inlineable_class(&self, _: &ClassName) -> Option<Arc<Tree>> {
            None
        }
    }

    fn optimize(body: Tree) -> Tree {
        let def = MethodDef::new(
            MethodName::new("m__V"),
            MemberNamespace::PublicInstance,
            body,
        );
        OptimizerCore::optimize(&EmptyProgram, &ClassName::new("LA"), None, &def)
            .expect("optimization failed")
            .body
            .expect("body dropped")
    }

    // -------------------------------------------------------------------------
    // Local folding
    // -------------------------------------------------------------------------

    #[test]
    fn test_blocks_flatten() {
        let body = Tree::Block(vec![
            Tree::Skip,
            Tree::Block(vec![Tree::Skip, Tree::This]),
            Tree::Skip,
        ]);
        assert_eq!(optimize(body), Tree::This);
    }

    #[test]
    fn test_if_on_literal_condition_folds() {
        let body = Tree::If {
            cond: Box::new(Tree::Literal(Literal::Bool(false))),
            thenp: Box::new(Tree::This),
            elsep: Box::new(Tree::VarRef(LocalName::new("x"))),
        };
        assert_eq!(optimize(body), Tree::VarRef(LocalName::new("x")));
    }

    #[test]
    fn test_assign_to_call_is_malformed() {
        let def = MethodDef::new(
            MethodName::new("m__V"),
            MemberNamespace::PublicInstance,
            Tree::Assign {
                lhs: Box::new(Tree::LoadModule {
                    class: ClassName::new("s_M$"),
                    direct: false,
                }),
                rhs: Box::new(Tree::unit()),
            },
        );
        assert!(
            OptimizerCore::optimize(&EmptyProgram, &ClassName::new("LA"), None, &def).is_err()
        );
    }

    // -------------------------------------------------------------------------
    // Hook-driven rewrites
    // -------------------------------------------------------------------------

    #[test]
    fn test_elidable_module_access_goes_direct() {
        let body = Tree::LoadModule {
            class: ClassName::new("s_Elidable$"),
            direct: false,
        };
        assert_eq!(
            optimize(body),
            Tree::LoadModule {
                class: ClassName::new("s_Elidable$"),
                direct: true,
            }
        );
    }

    #[test]
    fn test_non_elidable_module_access_stays_checked() {
        let body = Tree::LoadModule {
            class: ClassName::new("s_Other$"),
            direct: true,
        };
        assert_eq!(
            optimize(body),
            Tree::LoadModule {
                class: ClassName::new("s_Other$"),
                direct: false,
            }
        );
    }

    #[test]
    fn test_instance_test_folds_through_ancestors() {
        let body = Tree::IsInstanceOf {
            expr: Box::new(Tree::VarRef(LocalName::new("x"))),
            expr_type: ClassName::new("LA"),
            test: ClassName::new("LObject"),
        };
        assert_eq!(optimize(body), Tree::Literal(Literal::Bool(true)));
    }

    #[test]
    fn test_instance_test_keeps_impure_scrutinee() {
        let body = Tree::IsInstanceOf {
            expr: Box::new(Tree::LoadModule {
                class: ClassName::new("s_M$"),
                direct: false,
            }),
            expr_type: ClassName::new("LA"),
            test: ClassName::new("LObject"),
        };
        assert!(matches!(optimize(body), Tree::IsInstanceOf { .. }));
    }

    #[test]
    fn test_unresolved_dynamic_call_is_kept() {
        let body = Tree::Apply {
            receiver_type: ClassName::new("LA"),
            receiver: Box::new(Tree::This),
            method: MethodName::new("m__V"),
            args: vec![],
        };
        assert!(matches!(optimize(body), Tree::Apply { .. }));
    }
}
