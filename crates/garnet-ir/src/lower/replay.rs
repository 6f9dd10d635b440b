//! Argument replay for bare `super`.
//!
//! Rebuilds the argument list of the enclosing method from the current
//! values of its parameters, so a parameter reassigned in the body is
//! forwarded with its new value.

use garnet_ast::*;

use super::collect::rest_name;
use super::{LowerErrorKind, LowerResult, Lowerer};
use crate::IrNode;

impl Lowerer {
    pub(super) fn lower_replay(&mut self, params: &Params, span: Span) -> LowerResult<Vec<IrNode>> {
        let unsupported = if !params.post.is_empty() {
            Some("post")
        } else if !params.keywords.is_empty() {
            Some("keyword")
        } else if params.keyword_rest.is_some() {
            Some("keyword rest")
        } else if params
            .pre
            .iter()
            .any(|p| matches!(p.value, ParamPattern::Destructure(_)))
        {
            Some("destructured")
        } else {
            None
        };
        if let Some(what) = unsupported {
            return Err(self.error(
                LowerErrorKind::UnsupportedReplay {
                    what: what.to_string(),
                },
                span,
            ));
        }

        let mut args = Vec::with_capacity(params.pre.len() + params.optional.len() + 1);
        for param in &params.pre {
            if let ParamPattern::Required(name) = &param.value {
                args.push(self.replay_read(name.as_str(), span)?);
            }
        }
        for optional in &params.optional {
            args.push(self.replay_read(optional.value.name.as_str(), span)?);
        }
        if let Some(rest) = &params.rest {
            let value = self.replay_read(rest_name(&rest.value), span)?;
            args.push(IrNode::Splat(Box::new(value)));
        }
        Ok(args)
    }

    fn replay_read(&mut self, name: &str, span: Span) -> LowerResult<IrNode> {
        match self.envs.resolve(self.ctx.env, name) {
            Some(local) => Ok(IrNode::ReadLocal(local)),
            None => Err(self.error(
                LowerErrorKind::UnresolvedLocal {
                    name: name.to_string(),
                },
                span,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garnet_ast::builder::*;

    fn super_args(params: Params, body: Vec<Node<Expr>>) -> Result<IrNode, Vec<LowerErrorKind>> {
        match Lowerer::new().lower_program(&program(vec![def("m", params, body)])) {
            Ok(module) => {
                let method = module.find_body("m").expect("method body");
                let mut found = None;
                method.body.walk(&mut |n| {
                    if let IrNode::Super { .. } = n {
                        found = Some(n.clone());
                    }
                });
                Ok(found.expect("super node"))
            }
            Err(errors) => Err(errors.into_iter().map(|e| e.kind).collect()),
        }
    }

    #[test]
    fn test_replay_reads_current_parameter_values() {
        // def m(a, b = 1, *c); a = 2; super; end
        let node = super_args(
            Params::new().required("a").optional("b", int(1)).rest("c"),
            vec![assign("a", int(2)), zsuper()],
        )
        .expect("replay succeeds");

        match node {
            IrNode::Super {
                args,
                forward_block,
                block,
            } => {
                assert!(forward_block);
                assert!(block.is_none());
                assert_eq!(args.len(), 3);
                assert!(matches!(&args[0], IrNode::ReadLocal(l) if l.name == "a"));
                assert!(matches!(&args[1], IrNode::ReadLocal(l) if l.name == "b"));
                assert!(matches!(&args[2], IrNode::Splat(inner)
                    if matches!(inner.as_ref(), IrNode::ReadLocal(l) if l.name == "c")));
            }
            other => panic!("Expected super, got {:?}", other),
        }
    }

    #[test]
    fn test_replay_forwards_anonymous_rest() {
        let node = super_args(Params::new().anonymous_rest(), vec![zsuper()]).expect("replay succeeds");
        assert!(matches!(node, IrNode::Super { ref args, .. }
            if matches!(&args[0], IrNode::Splat(inner)
                if matches!(inner.as_ref(), IrNode::ReadLocal(l) if l.name == "*"))));
    }

    #[test]
    fn test_replay_from_block_reaches_method_frame() {
        // def m(a); tap { super }; end
        let module = Lowerer::new()
            .lower_program(&program(vec![def(
                "m",
                Params::new().required("a"),
                vec![call_with_block(None, "tap", vec![], block(Params::new(), vec![zsuper()]))],
            )]))
            .expect("lowering succeeds");
        let block = module.find_body("block in m").expect("block body");
        assert!(block.needs_captured_frame);
        assert!(block.body.any(&|n| matches!(n, IrNode::Super { args, .. }
            if matches!(&args[0], IrNode::ReadLocal(l) if l.level == 1))));
    }

    #[test]
    fn test_replay_rejects_unsupported_shapes() {
        let cases = vec![
            (Params::new().required("a").rest("r").post("z"), "post"),
            (Params::new().keyword("k", Some(int(1))), "keyword"),
            (Params::new().keyword_rest("opts"), "keyword rest"),
            (
                Params::new().destructure(targets(vec![target("a"), target("b")], None, vec![])),
                "destructured",
            ),
        ];
        for (params, what) in cases {
            let errors = super_args(params, vec![zsuper()]).expect_err("replay is unsupported");
            assert_eq!(
                errors,
                vec![LowerErrorKind::UnsupportedReplay {
                    what: what.to_string()
                }]
            );
        }
    }
}
