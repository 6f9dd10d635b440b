//! Indented S-expression dump of compiled bodies.

use std::fmt::Write;

use crate::{CompiledBody, IrModule, IrNode, LocalKind, LocalRef, MissingArgumentBehavior, SplatNilPolicy};

/// Render every body of a module.
pub fn dump_module(module: &IrModule) -> String {
    let mut out = String::new();
    for body in &module.bodies {
        out.push_str(&dump_body(body));
        out.push('\n');
    }
    out
}

/// Render one body: a header line with its metadata, then its node tree.
pub fn dump_body(body: &CompiledBody) -> String {
    let mut printer = Printer::default();
    let _ = write!(printer.out, "{} {:?} \"{}\" arity={}", body.id, body.kind, body.name, body.arity);
    if let Some(id) = body.return_id {
        let _ = write!(printer.out, " return={}", id);
    }
    if let Some(id) = body.break_id {
        let _ = write!(printer.out, " break={}", id);
    }
    if body.needs_captured_frame {
        printer.out.push_str(" captured");
    }
    printer.out.push('\n');
    printer.out.push_str("  slots:");
    for (i, name) in body.slot_names.iter().enumerate() {
        let _ = write!(printer.out, " {}={}", i, name);
    }
    printer.out.push('\n');
    printer.indent = 1;
    printer.node(&body.body);
    printer.out
}

/// Render a single node tree.
pub fn dump_node(node: &IrNode) -> String {
    let mut printer = Printer::default();
    printer.node(node);
    printer.out
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn open(&mut self, head: &str) {
        self.line(&format!("({}", head));
        self.indent += 1;
    }

    fn close(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        // Attach the paren to the previous line.
        if self.out.ends_with('\n') {
            self.out.pop();
        }
        self.out.push_str(")\n");
    }

    fn nested(&mut self, head: &str, children: &[&IrNode]) {
        if children.is_empty() {
            self.line(&format!("({})", head));
            return;
        }
        self.open(head);
        for child in children {
            self.node(child);
        }
        self.close();
    }

    fn node(&mut self, node: &IrNode) {
        match node {
            IrNode::Nil => self.line("nil"),
            IrNode::Boolean(value) => self.line(&value.to_string()),
            IrNode::Integer(value) => self.line(&value.to_string()),
            IrNode::Float(value) => self.line(&format!("{:?}", value)),
            IrNode::Str(value) => self.line(&format!("{:?}", value)),
            IrNode::Symbol(name) => self.line(&format!(":{}", name)),
            IrNode::SelfValue => self.line("self"),
            IrNode::ArrayLiteral(items) => self.nested("array", &items.iter().collect::<Vec<_>>()),
            IrNode::HashLiteral(pairs) => {
                let children: Vec<&IrNode> = pairs.iter().flat_map(|(k, v)| [k, v]).collect();
                self.nested("hash", &children)
            }
            IrNode::Splat(inner) => self.nested("splat", &[&**inner]),
            IrNode::Sequence(items) => self.nested("seq", &items.iter().collect::<Vec<_>>()),
            IrNode::If {
                condition,
                then_branch,
                else_branch,
            } => self.nested("if", &[&**condition, &**then_branch, &**else_branch]),
            IrNode::And(left, right) => self.nested("and", &[&**left, &**right]),
            IrNode::Or(left, right) => self.nested("or", &[&**left, &**right]),
            IrNode::Not(inner) => self.nested("not", &[&**inner]),
            IrNode::ElidableResult { body, result } => self.nested("elidable", &[&**body, &**result]),
            IrNode::ReadLocal(local) => self.line(&format!("(read {})", local_text(local))),
            IrNode::WriteLocal { target, value } => {
                self.nested(&format!("write {}", local_text(target)), &[&**value])
            }
            IrNode::ReadInstanceVar(name) => self.line(&format!("(ivar @{})", name)),
            IrNode::WriteInstanceVar { name, value } => self.nested(&format!("ivar= @{}", name), &[&**value]),
            IrNode::ReadClassVar(name) => self.line(&format!("(cvar @@{})", name)),
            IrNode::WriteClassVar { name, value } => self.nested(&format!("cvar= @@{}", name), &[&**value]),
            IrNode::ReadGlobal(name) => self.line(&format!("(gvar ${})", name)),
            IrNode::WriteGlobal { name, value } => self.nested(&format!("gvar= ${}", name), &[&**value]),
            IrNode::ReadConstant(name) => self.line(&format!("(const {})", name)),
            IrNode::CheckArity(arity) => self.line(&format!("(check-arity {})", arity)),
            IrNode::ReadPreArgument { index, missing } => {
                let policy = match missing {
                    MissingArgumentBehavior::Nil => "nil",
                    MissingArgumentBehavior::HardError => "error",
                };
                self.line(&format!("(arg {} missing={})", index, policy))
            }
            IrNode::ReadOptionalArgument {
                index,
                minimum,
                keywords,
                default,
                ..
            } => self.nested(
                &format!("opt-arg {} min={}{}", index, minimum, if *keywords { " kw" } else { "" }),
                &[&**default],
            ),
            IrNode::ReadRestArgument { start, post, .. } => {
                self.line(&format!("(rest-arg {}..-{})", start, post))
            }
            IrNode::ReadPostArgument {
                from_end,
                forward_index,
                minimum,
                ..
            } => self.line(&format!(
                "(post-arg -{} or {} min={})",
                from_end, forward_index, minimum
            )),
            IrNode::ReadKeywordArgument { name, default, .. } => {
                self.nested(&format!("kwarg {}", name), &[&**default])
            }
            IrNode::ReadKeywordRestArgument { excluded, .. } => {
                self.line(&format!("(kwrest-arg except [{}])", excluded.join(" ")))
            }
            IrNode::MissingKeywordArgument(name) => self.line(&format!("(missing-kwarg {})", name)),
            IrNode::ReadBlock => self.line("(block-arg)"),
            IrNode::ShouldDestructure => self.line("(should-destructure)"),
            IrNode::ArrayRead { array, index } => self.nested(&format!("index {}", index), &[&**array]),
            IrNode::ArraySlice {
                array,
                start,
                end_offset,
            } => self.nested(&format!("slice {}..-{}", start, end_offset), &[&**array]),
            IrNode::ArrayIsAtLeastAsLargeAs { array, size } => {
                self.nested(&format!("at-least {}", size), &[&**array])
            }
            IrNode::SplatCast { value, nil_policy } => {
                let policy = match nil_policy {
                    SplatNilPolicy::ArrayWithNil => "array-with-nil",
                    SplatNilPolicy::EmptyArray => "empty-array",
                };
                self.nested(&format!("splat-cast {}", policy), &[&**value])
            }
            IrNode::IsNil(inner) => self.nested("nil?", &[&**inner]),
            IrNode::Call {
                receiver,
                method,
                args,
                block,
            } => {
                let mut children: Vec<&IrNode> = Vec::new();
                match receiver {
                    Some(receiver) => children.push(receiver),
                    None => children.push(&IrNode::SelfValue),
                }
                children.extend(args.iter());
                if let Some(block) = block {
                    children.push(block);
                }
                self.nested(&format!("call {}", method), &children)
            }
            IrNode::Super {
                args,
                block,
                forward_block,
            } => {
                let mut children: Vec<&IrNode> = args.iter().collect();
                if let Some(block) = block {
                    children.push(block);
                }
                let head = if *forward_block { "super &" } else { "super" };
                self.nested(head, &children)
            }
            IrNode::Yield(args) => self.nested("yield", &args.iter().collect::<Vec<_>>()),
            IrNode::ProcLiteral { body, lambda } => {
                let head = if *lambda { "lambda" } else { "proc" };
                self.line(&format!("({} {})", head, body))
            }
            IrNode::CatchBreak { id, body } => self.nested(&format!("catch-break {}", id), &[&**body]),
            IrNode::MethodDefinition { name, body } => self.line(&format!("(def {} {})", name, body)),
            IrNode::ModuleDefinition {
                name,
                superclass,
                is_module,
                body,
            } => {
                let head = format!("{} {} {}", if *is_module { "module" } else { "class" }, name, body);
                let children: Vec<&IrNode> = superclass.iter().map(|s| s.as_ref()).collect();
                self.nested(&head, &children)
            }
            IrNode::While {
                condition,
                body,
                do_while,
                break_id,
            } => {
                let head = format!("{} {}", if *do_while { "do-while" } else { "while" }, break_id);
                self.nested(&head, &[&**condition, &**body])
            }
            IrNode::Break { id, value } => self.nested(&format!("break {}", id), &[&**value]),
            IrNode::Next(value) => self.nested("next", &[&**value]),
            IrNode::Redo => self.line("(redo)"),
            IrNode::Retry => self.line("(retry)"),
            IrNode::Return { id, value } => self.nested(&format!("return {}", id), &[&**value]),
        }
    }
}

fn local_text(local: &LocalRef) -> String {
    let sigil = match local.kind {
        LocalKind::Local => "",
        LocalKind::FrameLocalGlobal => "frame-global ",
    };
    format!("{}{}@{}:{}", sigil, local.name, local.level, local.slot)
}
