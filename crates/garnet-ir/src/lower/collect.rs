//! Declaration pre-pass over a parameter list.
//!
//! Destructuring patterns and default values can introduce names that must
//! already own a slot when unrelated defaults are lowered, so every such name
//! is gathered before any binding code is emitted.

use garnet_ast::*;
use indexmap::IndexSet;

/// Hidden slot for an anonymous `*` parameter.
pub const ANONYMOUS_REST: &str = "*";

/// Hidden slot for an anonymous `**` parameter.
pub const ANONYMOUS_KEYWORD_REST: &str = "**";

/// Every name a parameter list declares, in declaration order.
pub fn collect_declarations(params: &Params) -> IndexSet<String> {
    let mut collector = Collector::default();
    collector.params(params);
    collector.names
}

/// Names bound directly by parameters (defaults excluded), in binding order.
pub fn parameter_names(params: &Params) -> IndexSet<String> {
    let mut collector = Collector::default();
    for param in &params.pre {
        collector.pattern(&param.value);
    }
    for optional in &params.optional {
        collector.add(optional.value.name.as_str());
    }
    if let Some(rest) = &params.rest {
        collector.add(rest_name(&rest.value));
    }
    for param in &params.post {
        collector.pattern(&param.value);
    }
    for keyword in &params.keywords {
        collector.add(keyword.value.name.as_str());
    }
    if let Some(rest) = &params.keyword_rest {
        collector.add(keyword_rest_name(&rest.value));
    }
    if let Some(block) = &params.block {
        collector.add(block.value.as_str());
    }
    collector.names
}

pub fn rest_name(rest: &RestParam) -> &str {
    rest.name.as_ref().map_or(ANONYMOUS_REST, |n| n.as_str())
}

pub fn keyword_rest_name(rest: &RestParam) -> &str {
    rest.name.as_ref().map_or(ANONYMOUS_KEYWORD_REST, |n| n.as_str())
}

/// Names assigned by a destructuring pattern, in source order.
pub fn target_names(targets: &MultipleAssignTargets) -> IndexSet<String> {
    let mut collector = Collector::default();
    collector.targets(targets);
    collector.names
}

#[derive(Default)]
struct Collector {
    names: IndexSet<String>,
}

impl Collector {
    fn add(&mut self, name: &str) {
        self.names.insert(name.to_string());
    }

    fn params(&mut self, params: &Params) {
        for param in &params.pre {
            self.pattern(&param.value);
        }
        for optional in &params.optional {
            self.add(optional.value.name.as_str());
            self.expr(&optional.value.default.value);
        }
        if let Some(rest) = &params.rest {
            self.add(rest_name(&rest.value));
        }
        for param in &params.post {
            self.pattern(&param.value);
        }
        for keyword in &params.keywords {
            self.add(keyword.value.name.as_str());
            if let Some(default) = &keyword.value.default {
                self.expr(&default.value);
            }
        }
        if let Some(rest) = &params.keyword_rest {
            self.add(keyword_rest_name(&rest.value));
        }
        if let Some(block) = &params.block {
            self.add(block.value.as_str());
        }
        for local in &params.block_locals {
            self.add(local.value.as_str());
        }
    }

    fn pattern(&mut self, pattern: &ParamPattern) {
        match pattern {
            ParamPattern::Required(name) => self.add(name.as_str()),
            ParamPattern::Destructure(targets) => self.targets(targets),
        }
    }

    fn targets(&mut self, targets: &MultipleAssignTargets) {
        for target in targets.all_targets() {
            self.target(&target.value);
        }
    }

    fn target(&mut self, target: &AssignTarget) {
        match target {
            AssignTarget::Local(name) => self.add(name.as_str()),
            AssignTarget::Nested(targets) => self.targets(targets),
            _ => {}
        }
    }

    /// Local assignments inside a default value. Nested method, block,
    /// lambda and class bodies get their own scopes and are skipped.
    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Assign { target, .. } | Expr::For { target, .. } => self.target(&target.value),
            Expr::MultipleAssign { targets, .. } => self.targets(targets),
            _ => {}
        }
        for child in expr.scope_children() {
            self.expr(&child.value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garnet_ast::builder::*;

    #[test]
    fn test_collects_every_parameter_kind() {
        // def m(a, (b, *c), d = 1, *e, f, g:, **h, &i)
        let params = Params::new()
            .required("a")
            .destructure(targets(vec![target("b")], Some(rest_target("c")), vec![]))
            .optional("d", int(1))
            .rest("e")
            .post("f")
            .keyword("g", None)
            .keyword_rest("h")
            .block_param("i");

        let names: Vec<String> = collect_declarations(&params).into_iter().collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "e", "f", "g", "h", "i"]);
    }

    #[test]
    fn test_collects_assignments_in_defaults() {
        // def m(a = (tmp = 1), b = [x, y = 2])
        let params = Params::new()
            .optional("a", begin(vec![assign("tmp", int(1))]))
            .optional("b", array(vec![vcall("x"), assign("y", int(2))]));

        let names = collect_declarations(&params);
        assert!(names.contains("tmp"));
        assert!(names.contains("y"));
        assert!(!names.contains("x"));
    }

    #[test]
    fn test_skips_nested_bodies() {
        // def m(a = -> { hidden = 1 }, b = def helper; inner = 1; end)
        let params = Params::new()
            .optional("a", lambda(Params::new(), vec![assign("hidden", int(1))]))
            .optional("b", def("helper", Params::new(), vec![assign("inner", int(1))]));

        let names = collect_declarations(&params);
        assert!(!names.contains("hidden"));
        assert!(!names.contains("inner"));
    }

    #[test]
    fn test_anonymous_rest_gets_hidden_names() {
        let mut params = Params::new().anonymous_rest();
        params.keyword_rest = Some(node(RestParam::default()));

        let names = collect_declarations(&params);
        assert!(names.contains(ANONYMOUS_REST));
        assert!(names.contains(ANONYMOUS_KEYWORD_REST));
    }

    #[test]
    fn test_block_locals_are_declared_but_not_parameters() {
        let params = Params::new().required("x").block_local("acc");
        assert!(collect_declarations(&params).contains("acc"));
        assert!(!parameter_names(&params).contains("acc"));
    }
}
