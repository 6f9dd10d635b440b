//! # Garnet Interpreter
//!
//! Tree-walking engine for lowered IR. It executes the argument-binding and
//! local-access nodes the lowerer emits against reference-counted frames,
//! and is how the lowering output is checked end to end.
//!
//! Non-local exits travel as [`Unwind`] values through `Result`; each
//! `break`/`return` carries the identity of the construct it targets and is
//! caught only there.

pub mod value;
pub mod frame;
pub mod error;
mod interpreter;
mod eval;
mod binding;
mod builtins;

// ============================================================================
// Re-exports (public API)
// ============================================================================

pub use error::{Eval, RuntimeError, Unwind};
pub use frame::{Frame, MethodContext};
pub use interpreter::{Interpreter, DEFAULT_MAX_DEPTH};
pub use value::{Class, HashKey, Object, ProcValue, Value};

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use garnet_ast::builder::*;
    use garnet_ast::{Expr, Node, Params};
    use garnet_ir::Lowerer;

    fn run(body: Vec<Node<Expr>>) -> (Result<Value, RuntimeError>, String) {
        let module = Lowerer::new()
            .lower_program(&program(body))
            .expect("program lowers");
        let mut interp = Interpreter::new(&module);
        let result = interp.run();
        (result, interp.take_output())
    }

    fn output_of(body: Vec<Node<Expr>>) -> String {
        let (result, output) = run(body);
        assert!(result.is_ok(), "unexpected error: {:?}", result);
        output
    }

    fn plus(left: Node<Expr>, right: Node<Expr>) -> Node<Expr> {
        call(left, "+", vec![right])
    }

    #[test]
    fn test_optional_parameter_defaults() {
        let output = output_of(vec![
            def(
                "m",
                Params::new().required("a").optional("b", int(10)),
                vec![array(vec![local("a"), local("b")])],
            ),
            fcall("p", vec![fcall("m", vec![int(1)])]),
            fcall("p", vec![fcall("m", vec![int(1), int(2)])]),
        ]);
        assert_eq!(output, "[1, 10]\n[1, 2]\n");
    }

    #[test]
    fn test_block_auto_destructures_pairs() {
        let output = output_of(vec![call_with_block(
            Some(array(vec![
                array(vec![int(1), int(2)]),
                array(vec![int(3), int(4)]),
            ])),
            "each",
            vec![],
            block(
                Params::new().required("a").required("b"),
                vec![fcall("puts", vec![plus(local("a"), local("b"))])],
            ),
        )]);
        assert_eq!(output, "3\n7\n");
    }

    #[test]
    fn test_block_writes_outer_local() {
        let output = output_of(vec![
            assign("x", int(0)),
            call_with_block(
                Some(array(vec![int(1), int(2), int(3)])),
                "each",
                vec![],
                block(
                    Params::new().required("i"),
                    vec![assign("x", plus(local("x"), local("i")))],
                ),
            ),
            fcall("p", vec![local("x")]),
        ]);
        assert_eq!(output, "6\n");
    }

    #[test]
    fn test_break_value_becomes_call_result() {
        let output = output_of(vec![
            assign(
                "r",
                call_with_block(
                    Some(array(vec![int(1), int(2), int(3)])),
                    "each",
                    vec![],
                    block(
                        Params::new().required("i"),
                        vec![if_(
                            call(local("i"), "==", vec![int(2)]),
                            vec![break_(Some(call(local("i"), "*", vec![int(10)])))],
                            vec![],
                        )],
                    ),
                ),
            ),
            fcall("p", vec![local("r")]),
        ]);
        assert_eq!(output, "20\n");
    }

    #[test]
    fn test_return_in_block_leaves_method() {
        let output = output_of(vec![
            def(
                "find",
                Params::new().required("list"),
                vec![
                    call_with_block(
                        Some(local("list")),
                        "each",
                        vec![],
                        block(
                            Params::new().required("x"),
                            vec![if_(
                                call(local("x"), ">", vec![int(1)]),
                                vec![return_(Some(local("x")))],
                                vec![],
                            )],
                        ),
                    ),
                    nil(),
                ],
            ),
            fcall("p", vec![fcall("find", vec![array(vec![int(1), int(2), int(3)])])]),
        ]);
        assert_eq!(output, "2\n");
    }

    #[test]
    fn test_lambda_checks_arity() {
        let (result, _) = run(vec![
            assign(
                "l",
                lambda(Params::new().required("a").required("b"), vec![local("a")]),
            ),
            call(local("l"), "call", vec![int(1)]),
        ]);
        assert_eq!(
            result,
            Err(RuntimeError::ArgumentError(
                "wrong number of arguments (given 1, expected 2)".to_string()
            ))
        );
    }

    #[test]
    fn test_keyword_arguments() {
        let output = output_of(vec![
            def(
                "k",
                Params::new()
                    .required("a")
                    .keyword("b", Some(int(2)))
                    .keyword_rest("rest"),
                vec![array(vec![local("a"), local("b"), local("rest")])],
            ),
            fcall("p", vec![fcall("k", vec![int(1), kwargs(vec![("c", int(3))])])]),
            fcall("p", vec![fcall("k", vec![int(1), kwargs(vec![("b", int(5))])])]),
        ]);
        assert_eq!(output, "[1, 2, {c: 3}]\n[1, 5, {}]\n");
    }

    #[test]
    fn test_missing_required_keyword() {
        let (result, _) = run(vec![
            def("k", Params::new().keyword("name", None), vec![local("name")]),
            fcall("k", vec![]),
        ]);
        assert_eq!(result, Err(RuntimeError::MissingKeyword("name".to_string())));
    }

    #[test]
    fn test_zsuper_replays_arguments() {
        let output = output_of(vec![
            class_def(
                "Base",
                None,
                vec![def(
                    "hi",
                    Params::new().required("n"),
                    vec![plus(local("n"), int(1))],
                )],
            ),
            class_def(
                "Derived",
                Some(constant("Base")),
                vec![def(
                    "hi",
                    Params::new().required("n"),
                    vec![call(zsuper(), "*", vec![int(2)])],
                )],
            ),
            fcall(
                "p",
                vec![call(call(constant("Derived"), "new", vec![]), "hi", vec![int(3)])],
            ),
        ]);
        assert_eq!(output, "8\n");
    }

    #[test]
    fn test_multiple_assignment_with_rest() {
        let output = output_of(vec![
            masgn(
                targets(vec![target("a")], Some(rest_target("b")), vec![]),
                array(vec![int(1), int(2), int(3)]),
            ),
            fcall("p", vec![local("a"), local("b")]),
        ]);
        assert_eq!(output, "1\n[2, 3]\n");
    }

    #[test]
    fn test_while_with_break() {
        let output = output_of(vec![
            assign("i", int(0)),
            while_(
                true_(),
                vec![
                    assign("i", plus(local("i"), int(1))),
                    if_(call(local("i"), "==", vec![int(3)]), vec![break_(None)], vec![]),
                ],
            ),
            fcall("p", vec![local("i")]),
        ]);
        assert_eq!(output, "3\n");
    }

    #[test]
    fn test_block_destructures_through_to_ary() {
        let output = output_of(vec![
            class_def(
                "Pair",
                None,
                vec![def("to_ary", Params::new(), vec![array(vec![int(1), int(2)])])],
            ),
            call_with_block(
                Some(array(vec![call(constant("Pair"), "new", vec![])])),
                "each",
                vec![],
                block(
                    Params::new().required("a").required("b"),
                    vec![fcall("p", vec![local("b")])],
                ),
            ),
        ]);
        assert_eq!(output, "2\n");
    }

    #[test]
    fn test_yield_without_block() {
        let (result, _) = run(vec![
            def("y", Params::new(), vec![yield_(vec![])]),
            fcall("y", vec![]),
        ]);
        assert!(matches!(result, Err(RuntimeError::LocalJump(_))));
    }

    fn countdown(n: i64) -> Vec<Node<Expr>> {
        vec![
            def(
                "f",
                Params::new().required("n"),
                vec![if_(
                    call(local("n"), "==", vec![int(0)]),
                    vec![int(0)],
                    vec![fcall("f", vec![call(local("n"), "-", vec![int(1)])])],
                )],
            ),
            fcall("f", vec![int(n)]),
        ]
    }

    #[test]
    fn test_recursion_within_depth_limit() {
        let (result, _) = run(countdown(DEFAULT_MAX_DEPTH as i64 - 1));
        assert_eq!(result, Ok(Value::Integer(0)));
    }

    #[test]
    fn test_runaway_recursion_raises_stack_overflow() {
        let (result, _) = run(countdown(100_000));
        assert_eq!(result, Err(RuntimeError::StackOverflow));
    }

    #[test]
    fn test_max_depth_is_configurable() {
        let module = Lowerer::new()
            .lower_program(&program(countdown(5)))
            .expect("program lowers");
        let mut interp = Interpreter::new(&module).with_max_depth(3);
        assert_eq!(interp.run(), Err(RuntimeError::StackOverflow));

        let mut interp = Interpreter::new(&module).with_max_depth(6);
        assert_eq!(interp.run(), Ok(Value::Integer(0)));
    }

    #[test]
    fn test_index_assignment_pads_with_nil() {
        let output = output_of(vec![
            assign("a", array(vec![int(1)])),
            call(local("a"), "[]=", vec![int(3), int(5)]),
            fcall("p", vec![local("a")]),
        ]);
        assert_eq!(output, "[1, nil, nil, 5]\n");
    }

    #[test]
    fn test_index_assignment_far_past_end_is_a_range_error() {
        let (result, _) = run(vec![
            assign("a", array(vec![int(1)])),
            call(local("a"), "[]=", vec![int(1_000_000_000_000), int(1)]),
        ]);
        assert!(matches!(result, Err(RuntimeError::Range(_))));
    }

    #[test]
    fn test_undefined_method() {
        let (result, _) = run(vec![call(int(1), "frobnicate", vec![])]);
        assert_eq!(
            result,
            Err(RuntimeError::NoMethod {
                method: "frobnicate".to_string(),
                receiver: "Integer".to_string(),
            })
        );
    }
}
