//! Evaluation of nodes against an activation record.
//!
//! Every node first calls `EvaluationContext::enter`. Once the frame has left
//! `Evaluating`, nodes return the default of their type without running, so a terminal
//! status unwinds the rest of the frame without side effects.

use super::context::{EvaluationContext, EvaluationStatus};
use super::expr::{self, Graph, NodeIndex};
use super::node::{Arithmetic, Comparison, Logic, Node};
use super::subroutine::SubroutineSignature;
use super::tree::Outcome;
use super::types::{BaseType, Qualifier, Type};
use super::value::{Erased, Handle, Value, ValueType, Variable};
use std::cmp::Ordering;

/// Evaluate the subtree rooted at `nx`.
pub fn evaluate(graph: &Graph, nx: NodeIndex, ctx: &mut EvaluationContext) -> Erased {
    let node = &graph[nx];
    let ty = node.return_type();
    if !ctx.enter() {
        return Erased::default_for(ty);
    }
    let children = expr::expect_children(graph, nx);
    run(graph, node, &children, ctx).unwrap_or_else(|| Erased::default_for(ty))
}

/// Turn a finished frame into an `Outcome`.
///
/// A frame still `Evaluating` implicitly returns `result`.
pub fn finish(ctx: &mut EvaluationContext, result: Erased) -> Outcome {
    match ctx.status() {
        EvaluationStatus::Evaluating => match read(result, ctx) {
            Some(value) => Outcome::returned(value),
            None => {
                ctx.signal(EvaluationStatus::InvalidValue);
                Outcome {
                    status: ctx.status(),
                    value: None,
                }
            }
        },
        EvaluationStatus::ValueReturned => Outcome {
            status: EvaluationStatus::ValueReturned,
            value: ctx.take_return_value(),
        },
        status => Outcome {
            status,
            value: None,
        },
    }
}

// Runs the node's definition. `None` means the node produced nothing and its type default
// stands in.
fn run(
    graph: &Graph,
    node: &Node,
    children: &[NodeIndex],
    ctx: &mut EvaluationContext,
) -> Option<Erased> {
    match *node {
        Node::Const(ref value) => Some(Erased::Value(value.clone())),

        Node::Argument { ty, index } => {
            let variable = ctx.argument(index).cloned();
            variable_of(variable, ty, ctx)
        }

        Node::LocalVariable { ty, index } => {
            let variable = ctx.local_variable(index).cloned();
            variable_of(variable, ty, ctx)
        }

        Node::Progn { .. } => {
            let (last, init) = children.split_last()?;
            for &child in init {
                evaluate(graph, child, ctx);
                if !ctx.is_evaluating() {
                    return None;
                }
            }
            checked(evaluate(graph, *last, ctx), ctx)
        }

        Node::Nop(ty) => Some(Erased::default_for(ty)),

        Node::Arithmetic(op, base) => {
            let a = value(graph, children[0], ctx)?;
            let b = value(graph, children[1], ctx)?;
            let result = match base {
                BaseType::Int => {
                    arithmetic_int(op, expect(a, ctx)?, expect(b, ctx)?).map(Value::Int)
                }
                BaseType::Float => {
                    arithmetic_float(op, expect(a, ctx)?, expect(b, ctx)?).map(Value::Float)
                }
                _ => None,
            };
            match result {
                Some(value) => Some(Erased::Value(value)),
                None => invalid(ctx),
            }
        }

        Node::Comparison(op, _) => {
            let a = value(graph, children[0], ctx)?;
            let b = value(graph, children[1], ctx)?;
            let ordering = compare(&a, &b);
            let result = match op {
                Comparison::Greater => ordering == Some(Ordering::Greater),
                Comparison::GreaterEq => {
                    ordering == Some(Ordering::Greater) || ordering == Some(Ordering::Equal)
                }
                Comparison::Less => ordering == Some(Ordering::Less),
                Comparison::LessEq => {
                    ordering == Some(Ordering::Less) || ordering == Some(Ordering::Equal)
                }
                Comparison::Equal => ordering == Some(Ordering::Equal),
                Comparison::NotEqual => ordering != Some(Ordering::Equal),
            };
            Some(Erased::Value(Value::Bool(result)))
        }

        Node::Logic(op) => {
            let a: bool = typed(graph, children[0], ctx)?;
            let result = match op {
                Logic::Not => !a,
                Logic::And => {
                    let b: bool = typed(graph, children[1], ctx)?;
                    a && b
                }
                Logic::Or => {
                    let b: bool = typed(graph, children[1], ctx)?;
                    a || b
                }
            };
            Some(Erased::Value(Value::Bool(result)))
        }

        Node::If(_) => {
            let condition: bool = typed(graph, children[0], ctx)?;
            let branch = if condition { children[1] } else { children[2] };
            checked(evaluate(graph, branch, ctx), ctx)
        }

        Node::Repeat(ty) => {
            let count: i32 = typed(graph, children[0], ctx)?;
            if count < 0 {
                return invalid(ctx);
            }
            let mut last = Erased::default_for(ty);
            for _ in 0..count {
                let result = evaluate(graph, children[1], ctx);
                match ctx.status() {
                    EvaluationStatus::Evaluating => last = result,
                    EvaluationStatus::ContinueCalled => ctx.resume(),
                    EvaluationStatus::BreakCalled => {
                        ctx.resume();
                        break;
                    }
                    _ => return None,
                }
            }
            Some(last)
        }

        Node::Substitute(_) => {
            let location = handle(graph, children[0], ctx)?;
            let value = value(graph, children[1], ctx)?;
            if !location.is_bound() {
                ctx.signal(EvaluationStatus::InvalidLeftHandValue);
                return None;
            }
            if !location.set(value.clone()) {
                return invalid(ctx);
            }
            Some(Erased::Value(value))
        }

        Node::Increment(_) => {
            let location = handle(graph, children[0], ctx)?;
            let current = match location.get() {
                Some(current) => current,
                None => {
                    ctx.signal(EvaluationStatus::InvalidLeftHandValue);
                    return None;
                }
            };
            let next = match current {
                Value::Int(i) => Value::Int(i.wrapping_add(1)),
                Value::Float(f) => Value::Float(f + 1.0),
                _ => return invalid(ctx),
            };
            location.set(next.clone());
            Some(Erased::Value(next))
        }

        Node::At(_) => {
            let array: Vec<i32> = typed(graph, children[0], ctx)?;
            let index: i32 = typed(graph, children[1], ctx)?;
            let element = usize::try_from(index).ok().and_then(|i| array.get(i).cloned());
            match element {
                Some(element) => Some(Erased::Value(Value::Int(element))),
                None => invalid(ctx),
            }
        }

        Node::Size(_) => {
            let array: Vec<i32> = typed(graph, children[0], ctx)?;
            Some(Erased::Value(Value::Int(array.len() as i32)))
        }

        Node::Break(_) => {
            ctx.signal(EvaluationStatus::BreakCalled);
            None
        }

        Node::Continue(_) => {
            ctx.signal(EvaluationStatus::ContinueCalled);
            None
        }

        Node::Return(_) => {
            let value = value(graph, children[0], ctx)?;
            ctx.return_with(value.clone());
            Some(Erased::Value(value))
        }

        Node::Subroutine(ref sig) => call(graph, sig, children, ctx),
    }
}

fn call(
    graph: &Graph,
    sig: &SubroutineSignature,
    children: &[NodeIndex],
    ctx: &mut EvaluationContext,
) -> Option<Erased> {
    // Arguments are bound in the caller's frame.
    let mut arguments = Vec::with_capacity(children.len());
    for (&child, &slot_ty) in children.iter().zip(sig.arguments.iter()) {
        let result = evaluate(graph, child, ctx);
        if !ctx.is_evaluating() {
            return None;
        }
        let variable = if slot_ty.is_qualified() {
            match result {
                Erased::LeftHand(ref handle) | Erased::Reference(ref handle) => {
                    Variable::shared(handle)
                }
                _ => None,
            }
        } else {
            read(result, ctx).map(Variable::new)
        };
        match variable {
            Some(variable) => arguments.push(variable),
            None => return invalid(ctx),
        }
    }

    let registry = ctx.registry();
    let body = match registry.body(&sig.name) {
        Some(body) => body,
        None => return invalid(ctx),
    };
    let root = match body.root() {
        Some(root) => root,
        None => return invalid(ctx),
    };

    if !ctx.push_frame() {
        return None;
    }
    let outcome = {
        let mut callee = ctx.nested(arguments, body.local_variable_cells());
        let result = evaluate(body.graph(), root, &mut callee);
        finish(&mut callee, result)
    };
    ctx.pop_frame();

    match outcome {
        Outcome {
            status: EvaluationStatus::ValueReturned,
            value: Some(value),
        } => Some(Erased::Value(value)),
        Outcome {
            status: EvaluationStatus::ValueReturned,
            value: None,
        } => invalid(ctx),
        Outcome { status, .. } => {
            ctx.signal(status);
            None
        }
    }
}

// Argument and local-variable access. Plain reads of a missing or mistyped slot are
// faults, qualified reads produce an unbound handle instead.
fn variable_of(
    variable: Option<Variable>,
    ty: Type,
    ctx: &mut EvaluationContext,
) -> Option<Erased> {
    let variable = variable.filter(|v| v.base_type() == ty.base());
    let handle = || {
        variable
            .as_ref()
            .map(Variable::handle)
            .unwrap_or_else(|| Handle::unbound(ty.base()))
    };
    match ty.qualifier() {
        Qualifier::Plain => match variable {
            Some(ref variable) => Some(Erased::Value(variable.get())),
            None => invalid(ctx),
        },
        Qualifier::LeftHand => Some(Erased::LeftHand(handle())),
        Qualifier::Reference => Some(Erased::Reference(handle())),
    }
}

/// Read `result` as a plain value, reading through handles.
fn read(result: Erased, ctx: &mut EvaluationContext) -> Option<Value> {
    match result {
        Erased::Value(value) => Some(value),
        Erased::LeftHand(handle) => handle.get().or_else(|| {
            ctx.signal(EvaluationStatus::InvalidLeftHandValue);
            None
        }),
        Erased::Reference(handle) => handle.get().or_else(|| {
            ctx.signal(EvaluationStatus::InvalidReference);
            None
        }),
        Erased::Void => None,
    }
}

fn checked(result: Erased, ctx: &EvaluationContext) -> Option<Erased> {
    if ctx.is_evaluating() {
        Some(result)
    } else {
        None
    }
}

fn value(graph: &Graph, nx: NodeIndex, ctx: &mut EvaluationContext) -> Option<Value> {
    let result = evaluate(graph, nx, ctx);
    if !ctx.is_evaluating() {
        return None;
    }
    read(result, ctx)
}

fn typed<T: ValueType>(graph: &Graph, nx: NodeIndex, ctx: &mut EvaluationContext) -> Option<T> {
    let value = value(graph, nx, ctx)?;
    expect(value, ctx)
}

fn expect<T: ValueType>(value: Value, ctx: &mut EvaluationContext) -> Option<T> {
    match T::from_value(value) {
        Some(value) => Some(value),
        None => invalid(ctx),
    }
}

fn handle(graph: &Graph, nx: NodeIndex, ctx: &mut EvaluationContext) -> Option<Handle> {
    match evaluate(graph, nx, ctx) {
        _ if !ctx.is_evaluating() => None,
        Erased::LeftHand(handle) | Erased::Reference(handle) => Some(handle),
        _ => invalid(ctx),
    }
}

fn invalid<T>(ctx: &mut EvaluationContext) -> Option<T> {
    ctx.signal(EvaluationStatus::InvalidValue);
    None
}

fn arithmetic_int(op: Arithmetic, a: i32, b: i32) -> Option<i32> {
    let result = match op {
        Arithmetic::Add => a.wrapping_add(b),
        Arithmetic::Sub => a.wrapping_sub(b),
        Arithmetic::Mult => a.wrapping_mul(b),
        Arithmetic::Div => {
            if b == 0 {
                return None;
            }
            a.wrapping_div(b)
        }
    };
    Some(result)
}

fn arithmetic_float(op: Arithmetic, a: f64, b: f64) -> Option<f64> {
    let result = match op {
        Arithmetic::Add => a + b,
        Arithmetic::Sub => a - b,
        Arithmetic::Mult => a * b,
        Arithmetic::Div => {
            if b == 0.0 {
                return None;
            }
            a / b
        }
    };
    Some(result)
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::IntArray(a), Value::IntArray(b)) => a.partial_cmp(b),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluationConfig;
    use crate::gp::subroutine::SubroutineRegistry;
    use crate::gp::tree::{Signature, Tree};
    use pretty_assertions::assert_eq;

    // Builds a tree from a pre-order list of nodes.
    fn build(signature: Signature, nodes: Vec<Node>) -> Tree {
        fn attach(tree: &mut Tree, nodes: &mut std::vec::IntoIter<Node>) -> NodeIndex {
            let node = nodes.next().expect("ran out of nodes");
            let arity = node.arity();
            let nx = tree.add_node(node);
            for slot in 0..arity {
                let child = attach(tree, nodes);
                tree.set_child(nx, slot, child).unwrap();
            }
            nx
        }
        let mut tree = Tree::new(signature);
        let mut nodes = nodes.into_iter();
        let root = attach(&mut tree, &mut nodes);
        tree.set_root(root).unwrap();
        tree
    }

    fn run_tree(tree: &Tree, arguments: Vec<Variable>) -> Outcome {
        tree.evaluate(arguments, &SubroutineRegistry::new(), &EvaluationConfig::default())
    }

    fn int(i: i32) -> Node {
        Node::Const(Value::Int(i))
    }

    fn local(ty: Type, index: usize) -> Node {
        Node::LocalVariable { ty, index }
    }

    #[test]
    fn division_by_zero_is_invalid() {
        let tree = build(
            Signature::new(Type::INT),
            vec![Node::Arithmetic(Arithmetic::Div, BaseType::Int), int(5), int(0)],
        );
        let outcome = run_tree(&tree, vec![]);
        assert_eq!(outcome.status, EvaluationStatus::InvalidValue);
        assert_eq!(outcome.value, None);

        let tree = build(
            Signature::new(Type::FLOAT),
            vec![
                Node::Arithmetic(Arithmetic::Div, BaseType::Float),
                Node::Const(Value::Float(1.0)),
                Node::Const(Value::Float(0.0)),
            ],
        );
        assert_eq!(run_tree(&tree, vec![]).status, EvaluationStatus::InvalidValue);
    }

    #[test]
    fn integer_arithmetic_wraps() {
        let tree = build(
            Signature::new(Type::INT),
            vec![Node::Arithmetic(Arithmetic::Add, BaseType::Int), int(i32::MAX), int(1)],
        );
        assert_eq!(run_tree(&tree, vec![]).value, Some(Value::Int(i32::MIN)));
    }

    #[test]
    fn repeat_accumulates_through_local_variable() {
        // Progn(Repeat(4, Increment(local0)), local0)
        let sig = Signature::new(Type::INT).with_local_variables(vec![Type::INT]);
        let tree = build(
            sig,
            vec![
                Node::Progn { ty: Type::INT, arity: 2 },
                Node::Repeat(Type::INT),
                int(4),
                Node::Increment(BaseType::Int),
                local(Type::INT.left_hand(), 0),
                local(Type::INT, 0),
            ],
        );
        assert_eq!(run_tree(&tree, vec![]), Outcome::returned(Value::Int(4)));
    }

    #[test]
    fn negative_repeat_is_invalid() {
        let tree = build(
            Signature::new(Type::INT),
            vec![Node::Repeat(Type::INT), int(-1), int(3)],
        );
        assert_eq!(run_tree(&tree, vec![]).status, EvaluationStatus::InvalidValue);
    }

    #[test]
    fn break_leaves_the_loop_only() {
        // Progn(Repeat(10, Progn(Increment(local0), If(Greater(local0, 2), Break, Continue))),
        //       local0)
        let sig = Signature::new(Type::INT).with_local_variables(vec![Type::INT]);
        let tree = build(
            sig,
            vec![
                Node::Progn { ty: Type::INT, arity: 2 },
                Node::Repeat(Type::INT),
                int(10),
                Node::Progn { ty: Type::INT, arity: 2 },
                Node::Increment(BaseType::Int),
                local(Type::INT.left_hand(), 0),
                Node::If(Type::INT),
                Node::Comparison(Comparison::Greater, BaseType::Int),
                local(Type::INT, 0),
                int(2),
                Node::Break(Type::INT),
                Node::Continue(Type::INT),
                local(Type::INT, 0),
            ],
        );
        assert_eq!(run_tree(&tree, vec![]), Outcome::returned(Value::Int(3)));
    }

    #[test]
    fn return_ends_the_frame_early() {
        // Progn(Return(7), Substitute(local0, 1)) must not write the local.
        let sig = Signature::new(Type::INT).with_local_variables(vec![Type::INT]);
        let tree = build(
            sig,
            vec![
                Node::Progn { ty: Type::INT, arity: 2 },
                Node::Return(Type::INT),
                int(7),
                Node::Substitute(BaseType::Int),
                local(Type::INT.left_hand(), 0),
                int(1),
            ],
        );
        assert_eq!(run_tree(&tree, vec![]), Outcome::returned(Value::Int(7)));
    }

    #[test]
    fn steps_exceeded_stops_side_effects() {
        let sig = Signature::new(Type::INT).with_arguments(vec![Type::INT.left_hand()]);
        let tree = build(
            sig,
            vec![
                Node::Repeat(Type::INT),
                int(100),
                Node::Increment(BaseType::Int),
                Node::Argument { ty: Type::INT.left_hand(), index: 0 },
            ],
        );
        let counter = Variable::new(0);
        let config = EvaluationConfig { max_steps: 20, max_stack_depth: 4 };
        let outcome = tree.evaluate(vec![counter.clone()], &SubroutineRegistry::new(), &config);
        assert_eq!(outcome.status, EvaluationStatus::StepsExceeded);
        // Repeat and its count use two steps, then each iteration uses two more.
        assert_eq!(counter.get(), Value::Int(9));
    }

    #[test]
    fn unbound_locations_are_reported() {
        let tree = build(
            Signature::new(Type::INT),
            vec![Node::Substitute(BaseType::Int), Node::Nop(Type::INT.left_hand()), int(1)],
        );
        assert_eq!(run_tree(&tree, vec![]).status, EvaluationStatus::InvalidLeftHandValue);

        let tree = build(
            Signature::new(Type::INT),
            vec![Node::Increment(BaseType::Int), Node::Nop(Type::INT.left_hand())],
        );
        let outcome = run_tree(&tree, vec![]);
        assert_eq!(outcome.status, EvaluationStatus::InvalidLeftHandValue);
        assert_eq!(outcome.value, None);

        let tree = build(
            Signature::new(Type::INT),
            vec![
                Node::Arithmetic(Arithmetic::Add, BaseType::Int),
                Node::Nop(Type::INT.reference()),
                int(1),
            ],
        );
        assert_eq!(run_tree(&tree, vec![]).status, EvaluationStatus::InvalidReference);
    }

    #[test]
    fn plain_reads_of_missing_arguments_are_invalid() {
        let tree = build(
            Signature::new(Type::INT),
            vec![Node::Argument { ty: Type::INT, index: 3 }],
        );
        assert_eq!(run_tree(&tree, vec![]).status, EvaluationStatus::InvalidValue);
        let tree = build(
            Signature::new(Type::INT),
            vec![Node::Argument { ty: Type::INT, index: 0 }],
        );
        assert_eq!(
            run_tree(&tree, vec![Variable::new(true)]).status,
            EvaluationStatus::InvalidValue
        );
    }

    #[test]
    fn array_access_is_bounds_checked() {
        let sig = Signature::new(Type::INT).with_arguments(vec![Type::INT_ARRAY, Type::INT]);
        let tree = build(
            sig,
            vec![
                Node::At(BaseType::Int),
                Node::Argument { ty: Type::INT_ARRAY, index: 0 },
                Node::Argument { ty: Type::INT, index: 1 },
            ],
        );
        let args = |i: i32| vec![Variable::new(vec![4, 5, 6]), Variable::new(i)];
        assert_eq!(run_tree(&tree, args(2)), Outcome::returned(Value::Int(6)));
        assert_eq!(run_tree(&tree, args(3)).status, EvaluationStatus::InvalidValue);
        assert_eq!(run_tree(&tree, args(-1)).status, EvaluationStatus::InvalidValue);
    }

    #[test]
    fn comparisons() {
        let cases = vec![
            (Comparison::Greater, 2, 1, true),
            (Comparison::GreaterEq, 1, 1, true),
            (Comparison::Less, 2, 1, false),
            (Comparison::LessEq, 2, 1, false),
            (Comparison::Equal, 3, 3, true),
            (Comparison::NotEqual, 3, 3, false),
        ];
        for (op, a, b, expected) in cases {
            let tree = build(
                Signature::new(Type::BOOL),
                vec![Node::Comparison(op, BaseType::Int), int(a), int(b)],
            );
            assert_eq!(run_tree(&tree, vec![]), Outcome::returned(Value::Bool(expected)));
        }
    }
}
