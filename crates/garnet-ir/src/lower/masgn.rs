//! Multiple assignment: `a, *b, c = rhs`

use garnet_ast::*;

use super::{LowerResult, Lowerer};
use crate::{IrNode, LocalRef, SplatNilPolicy};

impl Lowerer {
    pub(super) fn lower_multiple_assignment(
        &mut self,
        targets: &MultipleAssignTargets,
        value: Option<&Node<Expr>>,
        _span: Span,
    ) -> LowerResult<IrNode> {
        let value = match value {
            Some(value) => value,
            None => return self.destructure_value(targets, IrNode::Nil),
        };

        // a, b = x, y
        if let Some(elements) = value.value.as_fixed_array() {
            if targets.rest.is_none() && targets.post.is_empty() && elements.len() == targets.pre.len() {
                return self.assign_from_literal(targets, elements);
            }
        }

        if targets.pre.is_empty() && targets.post.is_empty() {
            match &targets.rest {
                // *a = [x, y]
                Some(RestTarget::Named(target)) if matches!(value.value, Expr::Array(_)) => {
                    let value = self.lower_expr(value)?;
                    return self.assign_target(target, value);
                }
                // *a = rhs
                Some(RestTarget::Named(target)) => {
                    let rhs = self.lower_expr(value)?;
                    let temp = self.envs.allocate_temp(self.ctx.env, "rhs");
                    let cast = IrNode::SplatCast {
                        value: Box::new(IrNode::ReadLocal(temp.clone())),
                        nil_policy: self.splat_nil_policy(),
                    };
                    let assign = self.assign_target(target, cast)?;
                    return Ok(IrNode::ElidableResult {
                        body: Box::new(IrNode::sequence(vec![
                            IrNode::write_local(temp.clone(), rhs),
                            assign,
                        ])),
                        result: Box::new(IrNode::ReadLocal(temp)),
                    });
                }
                // * = rhs
                Some(RestTarget::Anonymous) => return self.lower_expr(value),
                None => {}
            }
        }

        let rhs = self.lower_expr(value)?;
        let temp = self.envs.allocate_temp(self.ctx.env, "rhs");
        let destructure = self.destructure_value(targets, IrNode::ReadLocal(temp.clone()))?;
        Ok(IrNode::ElidableResult {
            body: Box::new(IrNode::sequence(vec![
                IrNode::write_local(temp.clone(), rhs),
                destructure,
            ])),
            result: Box::new(IrNode::ReadLocal(temp)),
        })
    }

    /// Elements are evaluated left to right into temporaries before any
    /// target is assigned; the array value is only built when used.
    fn assign_from_literal(
        &mut self,
        targets: &MultipleAssignTargets,
        elements: &[Node<Expr>],
    ) -> LowerResult<IrNode> {
        let mut body = Vec::with_capacity(elements.len() * 2);
        let mut temps: Vec<LocalRef> = Vec::with_capacity(elements.len());
        for element in elements {
            let value = self.lower_expr(element)?;
            let temp = self.envs.allocate_temp(self.ctx.env, "masgn");
            body.push(IrNode::write_local(temp.clone(), value));
            temps.push(temp);
        }
        for (target, temp) in targets.pre.iter().zip(&temps) {
            body.push(self.assign_target(target, IrNode::ReadLocal(temp.clone()))?);
        }

        Ok(IrNode::ElidableResult {
            body: Box::new(IrNode::sequence(body)),
            result: Box::new(IrNode::ArrayLiteral(
                temps.into_iter().map(IrNode::ReadLocal).collect(),
            )),
        })
    }

    /// Spread an already-lowered value over `targets`. Shared by multiple
    /// assignment, nested targets and destructured parameters.
    pub(super) fn destructure_value(
        &mut self,
        targets: &MultipleAssignTargets,
        value: IrNode,
    ) -> LowerResult<IrNode> {
        let pre = targets.pre_count();
        let post = targets.post_count();
        let array = self.envs.allocate_temp(self.ctx.env, "array");
        let read = || IrNode::ReadLocal(array.clone());

        let coerce = IrNode::write_local(
            array.clone(),
            IrNode::SplatCast {
                value: Box::new(value),
                nil_policy: self.splat_nil_policy(),
            },
        );

        // Enough elements: post targets index from the end.
        let mut large = Vec::new();
        for (i, target) in targets.pre.iter().enumerate() {
            large.push(self.assign_target(target, IrNode::array_read(read(), i as i64))?);
        }
        if let Some(RestTarget::Named(target)) = &targets.rest {
            large.push(self.assign_rest(target, read(), pre, post)?);
        }
        for (k, target) in targets.post.iter().enumerate() {
            let from_end = -((post - k) as i64);
            large.push(self.assign_target(target, IrNode::array_read(read(), from_end))?);
        }

        // Too few elements: everything indexes forward.
        let mut small = Vec::new();
        for (i, target) in targets.pre.iter().enumerate() {
            small.push(self.assign_target(target, IrNode::array_read(read(), i as i64))?);
        }
        if let Some(RestTarget::Named(target)) = &targets.rest {
            small.push(self.assign_rest(target, read(), pre, post)?);
        }
        for (k, target) in targets.post.iter().enumerate() {
            small.push(self.assign_target(target, IrNode::array_read(read(), (pre + k) as i64))?);
        }

        // Coercion produced nil.
        let mut fallback = Vec::new();
        for target in targets.pre.iter().chain(&targets.post) {
            fallback.push(self.assign_target(target, IrNode::Nil)?);
        }
        if let Some(RestTarget::Named(target)) = &targets.rest {
            let empty = if pre == 0 && post == 0 {
                IrNode::ArrayLiteral(Vec::new())
            } else {
                IrNode::Nil
            };
            fallback.push(self.assign_target(target, empty)?);
        }

        let branches = IrNode::if_else(
            IrNode::IsNil(Box::new(read())),
            IrNode::sequence(fallback),
            IrNode::if_else(
                IrNode::at_least(read(), pre + post),
                IrNode::sequence(large),
                IrNode::sequence(small),
            ),
        );
        Ok(IrNode::sequence(vec![coerce, branches]))
    }

    fn assign_rest(
        &mut self,
        target: &Node<AssignTarget>,
        array: IrNode,
        pre: usize,
        post: usize,
    ) -> LowerResult<IrNode> {
        let slice = IrNode::ArraySlice {
            array: Box::new(array),
            start: pre,
            end_offset: post,
        };
        self.assign_target(target, slice)
    }

    /// `next a, b` yields an empty array for nil; plain assignment wraps it.
    fn splat_nil_policy(&self) -> SplatNilPolicy {
        if self.ctx.in_next_expression {
            SplatNilPolicy::EmptyArray
        } else {
            SplatNilPolicy::ArrayWithNil
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IrModule;
    use garnet_ast::builder::*;
    use proptest::prelude::*;

    fn lower(body: Vec<Node<Expr>>) -> IrModule {
        match Lowerer::new().lower_program(&program(body)) {
            Ok(module) => module,
            Err(errors) => panic!("lowering failed: {:?}", errors),
        }
    }

    fn main_body(module: &IrModule) -> &IrNode {
        &module.body(module.main).expect("main body").body
    }

    #[test]
    fn test_literal_fast_path_uses_temps() {
        // a, b = 1, 2
        let module = lower(vec![masgn(
            targets(vec![target("a"), target("b")], None, vec![]),
            array(vec![int(1), int(2)]),
        )]);

        match main_body(&module) {
            IrNode::ElidableResult { body, result } => {
                assert!(!body.any(&|n| matches!(n, IrNode::SplatCast { .. })));
                assert!(matches!(result.as_ref(), IrNode::ArrayLiteral(items) if items.len() == 2));
            }
            other => panic!("Expected elidable result, got {:?}", other),
        }
        let main = module.body(module.main).expect("main body");
        assert!(main.slot_names.contains(&"a".to_string()));
        assert!(main.slot_names.contains(&"b".to_string()));
        assert!(main.slot_names.iter().filter(|n| n.starts_with("%masgn")).count() == 2);
    }

    #[test]
    fn test_discarded_result_is_elided() {
        // a, b = 1, 2; nil
        let module = lower(vec![
            masgn(targets(vec![target("a"), target("b")], None, vec![]), array(vec![int(1), int(2)])),
            nil(),
        ]);
        assert!(!main_body(&module).any(&|n| matches!(n, IrNode::ElidableResult { .. })));
        assert!(!main_body(&module).any(&|n| matches!(n, IrNode::ArrayLiteral(_))));
    }

    #[test]
    fn test_general_path_branches() {
        // a, *b, c = xs
        let module = lower(vec![
            assign("xs", array(vec![])),
            masgn(
                targets(vec![target("a")], Some(rest_target("b")), vec![target("c")]),
                local("xs"),
            ),
        ]);
        let body = main_body(&module);
        assert!(body.any(&|n| matches!(n, IrNode::IsNil(_))));
        assert!(body.any(&|n| matches!(n, IrNode::ArrayIsAtLeastAsLargeAs { size: 2, .. })));
        assert!(body.any(&|n| matches!(n, IrNode::ArrayRead { index: -1, .. })));
        assert!(body.any(&|n| matches!(n, IrNode::ArrayRead { index: 1, .. })));
        assert!(body.any(&|n| matches!(n, IrNode::ArraySlice { start: 1, end_offset: 1, .. })));
        assert!(body.any(&|n| matches!(
            n,
            IrNode::SplatCast { nil_policy: SplatNilPolicy::ArrayWithNil, .. }
        )));
    }

    #[test]
    fn test_splat_only_shapes() {
        // *a = [1, 2]
        let module = lower(vec![masgn(targets(vec![], Some(rest_target("a")), vec![]), array(vec![int(1), int(2)]))]);
        assert!(matches!(main_body(&module), IrNode::WriteLocal { value, .. }
            if matches!(value.as_ref(), IrNode::ArrayLiteral(_))));

        // *a = 5
        let module = lower(vec![masgn(targets(vec![], Some(rest_target("a")), vec![]), int(5))]);
        assert!(matches!(main_body(&module), IrNode::ElidableResult { body, .. }
            if body.any(&|n| matches!(n, IrNode::SplatCast { .. }))));

        // * = 5
        let module = lower(vec![masgn(targets(vec![], Some(RestTarget::Anonymous), vec![]), int(5))]);
        assert_eq!(main_body(&module), &IrNode::Integer(5));
    }

    #[test]
    fn test_next_value_uses_empty_array_policy() {
        // each { next(a, b = x) }
        let inner = masgn(targets(vec![target("a"), target("b")], None, vec![]), vcall("x"));
        let module = lower(vec![call_with_block(
            None,
            "each",
            vec![],
            block(Params::new(), vec![next(Some(inner))]),
        )]);
        let block = module.find_body("block in <main>").expect("block body");
        assert!(block.body.any(&|n| matches!(
            n,
            IrNode::SplatCast { nil_policy: SplatNilPolicy::EmptyArray, .. }
        )));
    }

    #[test]
    fn test_nested_and_attribute_targets() {
        // a, (b, c), @d, obj[0] = xs
        let module = lower(vec![
            assign("xs", array(vec![])),
            assign("obj", array(vec![])),
            masgn(
                targets(
                    vec![
                        target("a"),
                        nested_target(targets(vec![target("b"), target("c")], None, vec![])),
                        ivar_target("d"),
                        index_target(local("obj"), vec![int(0)]),
                    ],
                    None,
                    vec![],
                ),
                local("xs"),
            ),
        ]);
        let body = main_body(&module);
        assert!(body.any(&|n| matches!(n, IrNode::WriteInstanceVar { name, .. } if name == "d")));
        assert!(body.any(&|n| matches!(n, IrNode::Call { method, .. } if method == "[]=")));
        let main = module.body(module.main).expect("main body");
        assert!(main.slot_names.contains(&"c".to_string()));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_branches_bind_every_target_once(pre in 0usize..4, post in 0usize..4, rest in any::<bool>()) {
            let pre_targets: Vec<_> = (0..pre).map(|i| target(&format!("p{}", i))).collect();
            let post_targets: Vec<_> = (0..post).map(|i| target(&format!("q{}", i))).collect();
            // A lone `*r` takes the splat-only path.
            prop_assume!(pre + post > 0 || !rest);
            let rest_slot = if rest { Some(rest_target("r")) } else { None };
            let shape = targets(pre_targets, rest_slot, post_targets);

            let module = lower(vec![assign("xs", array(vec![])), masgn(shape, local("xs"))]);
            let body = main_body(&module);

            let mut branches = Vec::new();
            body.walk(&mut |n| {
                if let IrNode::If { condition, then_branch, else_branch } = n {
                    if matches!(condition.as_ref(), IrNode::ArrayIsAtLeastAsLargeAs { .. }) {
                        branches.push((then_branch.as_ref().clone(), else_branch.as_ref().clone()));
                    }
                }
            });
            prop_assert_eq!(branches.len(), 1);

            let writes = |node: &IrNode| {
                let mut names = Vec::new();
                node.walk(&mut |n| {
                    if let IrNode::WriteLocal { target, .. } = n {
                        names.push(target.name.clone());
                    }
                });
                names
            };
            let (large, small) = &branches[0];
            let expected = pre + post + usize::from(rest);
            prop_assert_eq!(writes(large).len(), expected);
            prop_assert_eq!(writes(large), writes(small));
        }
    }
}
