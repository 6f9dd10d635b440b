//! Parameter binding.
//!
//! Produces the prelude that moves supplied arguments into parameter slots.
//! Values come either straight from the invocation's arguments (positional
//! mode) or from a local holding an already-coerced array (array mode, used
//! when a block auto-destructures its single argument).

use garnet_ast::*;
use indexmap::IndexSet;
use tracing::debug;

use super::collect::{keyword_rest_name, parameter_names, rest_name};
use super::{LowerErrorKind, LowerResult, Lowerer};
use crate::{
    Arity, BodyKind, IrNode, LocalKind, LocalRef, MissingArgumentBehavior, SplatNilPolicy,
};

/// Where positional values are read from.
#[derive(Debug, Clone)]
enum ArgumentSource {
    Positional,
    Array(LocalRef),
}

impl ArgumentSource {
    fn read(&self, index: usize, missing: MissingArgumentBehavior) -> IrNode {
        match self {
            ArgumentSource::Positional => IrNode::ReadPreArgument { index, missing },
            ArgumentSource::Array(array) => {
                IrNode::array_read(IrNode::ReadLocal(array.clone()), index as i64)
            }
        }
    }
}

/// Lowered default values, one per optional and keyword parameter.
struct Defaults {
    optional: Vec<IrNode>,
    keywords: Vec<IrNode>,
}

impl Lowerer {
    /// Lower the binding prelude for a callable of the given kind. Every
    /// parameter name must already be declared in the current environment.
    pub(super) fn lower_parameters(
        &mut self,
        params: &Params,
        kind: BodyKind,
        span: Span,
    ) -> LowerResult<Vec<IrNode>> {
        let arity = Arity::from_params(params);
        let defaults = self.lower_defaults(params, span)?;
        let missing = if kind.is_strict() {
            MissingArgumentBehavior::HardError
        } else {
            MissingArgumentBehavior::Nil
        };

        let mut prelude = Vec::new();
        if kind.is_strict() {
            prelude.push(IrNode::CheckArity(arity.clone()));
        }

        let positional =
            self.bind_parameters(params, &arity, &defaults, &ArgumentSource::Positional, missing)?;

        let destructures = kind == BodyKind::Block && !arity.skips_auto_destructure();
        debug!(
            env = %self.ctx.env,
            arity = %arity,
            auto_destructure = destructures,
            "binding parameters"
        );

        if destructures {
            let array = self.envs.allocate_temp(self.ctx.env, "destructure");
            let from_array = self.bind_parameters(
                params,
                &arity,
                &defaults,
                &ArgumentSource::Array(array.clone()),
                missing,
            )?;
            let coerce = IrNode::write_local(
                array,
                IrNode::SplatCast {
                    value: Box::new(IrNode::ReadPreArgument {
                        index: 0,
                        missing: MissingArgumentBehavior::Nil,
                    }),
                    nil_policy: SplatNilPolicy::ArrayWithNil,
                },
            );

            let mut array_program = vec![coerce];
            array_program.extend(from_array);
            prelude.push(IrNode::if_else(
                IrNode::ShouldDestructure,
                IrNode::sequence(array_program),
                IrNode::sequence(positional),
            ));
        } else {
            prelude.extend(positional);
        }

        for local in &params.block_locals {
            let slot = self.parameter_slot(local.value.as_str());
            prelude.push(IrNode::write_local(slot, IrNode::Nil));
        }

        Ok(prelude)
    }

    fn bind_parameters(
        &mut self,
        params: &Params,
        arity: &Arity,
        defaults: &Defaults,
        source: &ArgumentSource,
        missing: MissingArgumentBehavior,
    ) -> LowerResult<Vec<IrNode>> {
        let mut nodes = Vec::new();
        let pre = arity.pre;
        let post = arity.post;
        let required = arity.required();
        let keywords = arity.has_keywords();

        for (index, param) in params.pre.iter().enumerate() {
            let value = source.read(index, missing);
            nodes.push(self.bind_pattern(&param.value, value)?);
        }

        for (i, (optional, default)) in params.optional.iter().zip(&defaults.optional).enumerate() {
            let index = pre + i;
            let value = match source {
                ArgumentSource::Positional => IrNode::ReadOptionalArgument {
                    index,
                    minimum: arity.optional_minimum(index),
                    keywords,
                    required,
                    default: Box::new(default.clone()),
                },
                ArgumentSource::Array(array) => IrNode::if_else(
                    IrNode::at_least(IrNode::ReadLocal(array.clone()), index + 1 + post),
                    IrNode::array_read(IrNode::ReadLocal(array.clone()), index as i64),
                    default.clone(),
                ),
            };
            let slot = self.parameter_slot(optional.value.name.as_str());
            nodes.push(IrNode::write_local(slot, value));
        }

        if let Some(rest) = &params.rest {
            let start = pre + arity.optional;
            let value = match source {
                ArgumentSource::Positional => IrNode::ReadRestArgument {
                    start,
                    post,
                    keywords,
                    required,
                },
                ArgumentSource::Array(array) => IrNode::ArraySlice {
                    array: Box::new(IrNode::ReadLocal(array.clone())),
                    start,
                    end_offset: post,
                },
            };
            let slot = self.parameter_slot(rest_name(&rest.value));
            nodes.push(IrNode::write_local(slot, value));
        }

        for (k, param) in params.post.iter().enumerate() {
            let from_end = post - k;
            let forward_index = pre + k;
            let value = match source {
                ArgumentSource::Positional => IrNode::ReadPostArgument {
                    from_end,
                    forward_index,
                    minimum: pre + post,
                    keywords,
                    required,
                },
                ArgumentSource::Array(array) => IrNode::if_else(
                    IrNode::at_least(IrNode::ReadLocal(array.clone()), pre + post),
                    IrNode::array_read(IrNode::ReadLocal(array.clone()), -(from_end as i64)),
                    IrNode::array_read(IrNode::ReadLocal(array.clone()), forward_index as i64),
                ),
            };
            nodes.push(self.bind_pattern(&param.value, value)?);
        }

        for (keyword, default) in params.keywords.iter().zip(&defaults.keywords) {
            let name = keyword.value.name.as_str();
            let slot = self.parameter_slot(name);
            nodes.push(IrNode::write_local(
                slot,
                IrNode::ReadKeywordArgument {
                    name: name.to_string(),
                    required,
                    default: Box::new(default.clone()),
                },
            ));
        }

        if let Some(rest) = &params.keyword_rest {
            let slot = self.parameter_slot(keyword_rest_name(&rest.value));
            nodes.push(IrNode::write_local(
                slot,
                IrNode::ReadKeywordRestArgument {
                    required,
                    excluded: arity.keywords.clone(),
                },
            ));
        }

        if let Some(block) = &params.block {
            let slot = self.parameter_slot(block.value.as_str());
            nodes.push(IrNode::write_local(slot, IrNode::ReadBlock));
        }

        Ok(nodes)
    }

    fn bind_pattern(&mut self, pattern: &ParamPattern, value: IrNode) -> LowerResult<IrNode> {
        match pattern {
            ParamPattern::Required(name) => {
                let slot = self.parameter_slot(name.as_str());
                Ok(IrNode::write_local(slot, value))
            }
            ParamPattern::Destructure(targets) => self.destructure_value(targets, value),
        }
    }

    /// Slot of a parameter in the current environment.
    fn parameter_slot(&mut self, name: &str) -> LocalRef {
        let slot = self.envs.declare(self.ctx.env, name);
        LocalRef::new(0, slot, LocalKind::Local, name)
    }

    /// Lower every default value in binding order. A default may read any
    /// parameter bound before it; reading one bound after it is rejected.
    fn lower_defaults(&mut self, params: &Params, span: Span) -> LowerResult<Defaults> {
        let mut pending = parameter_names(params);
        for param in &params.pre {
            forget_pattern(&mut pending, &param.value);
        }

        let mut optional = Vec::with_capacity(params.optional.len());
        for param in &params.optional {
            let name = param.value.name.as_str();
            pending.shift_remove(name);
            optional.push(self.lower_default(name, &param.value.default, &pending, span)?);
        }

        if let Some(rest) = &params.rest {
            pending.shift_remove(rest_name(&rest.value));
        }
        for param in &params.post {
            forget_pattern(&mut pending, &param.value);
        }

        let mut keywords = Vec::with_capacity(params.keywords.len());
        for keyword in &params.keywords {
            let name = keyword.value.name.as_str();
            pending.shift_remove(name);
            let default = match &keyword.value.default {
                Some(default) => self.lower_default(name, default, &pending, span)?,
                None => IrNode::MissingKeywordArgument(name.to_string()),
            };
            keywords.push(default);
        }

        Ok(Defaults { optional, keywords })
    }

    fn lower_default(
        &mut self,
        parameter: &str,
        default: &Node<Expr>,
        pending: &IndexSet<String>,
        span: Span,
    ) -> LowerResult<IrNode> {
        // `def m(a = a)`: the parser hands over a read of the parameter itself.
        if let Expr::LocalVar(name) | Expr::VCall(name) = &default.value {
            if name.as_str() == parameter {
                return Ok(IrNode::ReadLocal(self.parameter_slot(parameter)));
            }
        }

        if self.options.reject_forward_parameter_references {
            if let Some(name) = forward_reference(default, pending) {
                return Err(self.error(
                    LowerErrorKind::ForwardParameterReference {
                        parameter: parameter.to_string(),
                        name: name.to_string(),
                    },
                    if default.span == Span::default() { span } else { default.span },
                ));
            }
        }

        self.lower_expr(default)
    }
}

fn forget_pattern(pending: &mut IndexSet<String>, pattern: &ParamPattern) {
    match pattern {
        ParamPattern::Required(name) => {
            pending.shift_remove(name.as_str());
        }
        ParamPattern::Destructure(targets) => {
            for name in super::collect::target_names(targets) {
                pending.shift_remove(&name);
            }
        }
    }
}

/// First read of a not-yet-bound parameter inside a default value.
fn forward_reference<'a>(expr: &'a Node<Expr>, pending: &IndexSet<String>) -> Option<&'a str> {
    if let Expr::LocalVar(name) | Expr::VCall(name) = &expr.value {
        if pending.contains(name.as_str()) {
            return Some(name.as_str());
        }
    }
    expr.value
        .scope_children()
        .into_iter()
        .find_map(|child| forward_reference(child, pending))
}
