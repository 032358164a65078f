//! The evaluator: topologically orders the discovered opcalls and executes each
//! one exactly once.
//!
//! Scheduling is round based. Each round gathers every opcall whose read set no
//! longer overlaps a pending producer, executes the round in parallel against a
//! read only snapshot of the tree, and applies the returned responses serially: a
//! single coordinator owns the tree, so workers never mutate shared state. A round
//! which makes no progress while work remains is a cycle.

use crate::analysis::DependencyGraph;
use crate::merge::inject_into;
use crate::registry::Registry;
use crate::{
    BinaryOp, Cursor, DataflowOrder, EngineOptions, Error, ErrorKind, Expression, OpContext,
    Opcall, Operator, OperatorCall, Report, Response, Runtime, Value,
};
use fnv::FnvHasher;
use std::hash::Hasher;

/// Reduce an expression to a value against the context tree.
///
/// Literals pass through; references resolve against the tree; environment
/// variables read the process environment (missing means empty); `||` short
/// circuits, treating an unresolvable or null left side as absent; nested calls
/// are invoked inline.
pub(crate) fn reduce(expr: &Expression, ctx: &OpContext) -> Result<Value, Error> {
    match expr {
        Expression::Literal(value) => Ok(value.clone()),
        Expression::Reference(cursor) => cursor.resolve(ctx.tree).cloned(),
        Expression::EnvVar(name) => Ok(Value::String(std::env::var(name).unwrap_or_default())),
        Expression::Or(left, right) => match reduce(left, ctx) {
            Ok(Value::Null) => reduce(right, ctx),
            Ok(value) => Ok(value),
            Err(err) if err.kind == ErrorKind::NotFound => reduce(right, ctx),
            Err(err) => Err(err),
        },
        Expression::Not(inner) => Ok(Value::Bool(!reduce(inner, ctx)?.is_truthy())),
        Expression::Operation { op, left, right } => {
            let left = reduce(left, ctx)?;
            let right = reduce(right, ctx)?;
            operation(*op, left, right)
        }
        Expression::Ternary {
            condition,
            then,
            otherwise,
        } => {
            if reduce(condition, ctx)?.is_truthy() {
                reduce(then, ctx)
            } else {
                reduce(otherwise, ctx)
            }
        }
        Expression::Call(call) => match invoke(call, ctx)? {
            Response::Replace(value) => Ok(value),
            Response::Inject(_) => Err(Error::new(
                ErrorKind::Operator,
                "inject is only valid as the whole value of a mapping key".to_string(),
            )),
        },
    }
}

/// Invoke a nested operator call with the caller's context.
pub(crate) fn invoke(call: &OperatorCall, ctx: &OpContext) -> Result<Response, Error> {
    let (op, _) = Registry::global().bind(&call.name);
    invoke_with(&*op, call, ctx)
}

/// Invoke one operator: reduce the arguments, consult the result cache, and
/// collapse concurrent identical invocations into a single flight.
pub(crate) fn invoke_with(
    op: &dyn Operator,
    call: &OperatorCall,
    ctx: &OpContext,
) -> Result<Response, Error> {
    let call_ctx = OpContext {
        tree: ctx.tree,
        here: ctx.here,
        source: ctx.source,
        raw_args: &call.args,
        target: call.target.as_deref(),
        modifiers: &call.modifiers,
        runtime: ctx.runtime,
    };

    let args = if op.reduces_arguments() {
        call.args
            .iter()
            .map(|arg| reduce(arg, &call_ctx))
            .collect::<Result<Vec<Value>, Error>>()?
    } else {
        Vec::new()
    };

    if !op.cacheable() || call.has_modifier("nocache") {
        return op.run(&call_ctx, &args);
    }

    let flight = fingerprint(call, &args);
    let key = format!("{}@{:016x}", call.name, flight);
    if let Some(hit) = ctx.runtime.operator_cache().get(&key) {
        return Ok(Response::Replace(hit));
    }

    let value = ctx.runtime.flights().run(flight, || {
        // A waiter may land here right after the leader finished; the cache now
        // holds the result.
        if let Some(hit) = ctx.runtime.operator_cache().get(&key) {
            return Ok(hit);
        }
        match op.run(&call_ctx, &args)? {
            Response::Replace(value) => {
                ctx.runtime.operator_cache().set(&key, value.clone());
                Ok(value)
            }
            Response::Inject(_) => Err(Error::new(
                ErrorKind::Operator,
                format!("operator `{}` may not cache an inject response", call.name),
            )),
        }
    })?;
    Ok(Response::Replace(value))
}

/// The canonical `(operator, reduced arguments)` fingerprint used for result
/// caching and single flight deduplication.
fn fingerprint(call: &OperatorCall, args: &[Value]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(call.name.as_bytes());
    if let Some(target) = &call.target {
        hasher.write(b"@");
        hasher.write(target.as_bytes());
    }
    for arg in args {
        hasher.write(b"\x1f");
        hasher.write(arg.to_string().as_bytes());
    }
    hasher.finish()
}

fn operation(op: BinaryOp, left: Value, right: Value) -> Result<Value, Error> {
    use BinaryOp::*;

    let type_error = |left: &Value, right: &Value| {
        Error::new(
            ErrorKind::TypeMismatch,
            format!(
                "cannot apply `{}` to a {} and a {}",
                op.symbol(),
                left.type_name(),
                right.type_name()
            ),
        )
    };

    match op {
        And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        Eq => Ok(Value::Bool(values_equal(&left, &right))),
        Ne => Ok(Value::Bool(!values_equal(&left, &right))),
        Lt | Le | Gt | Ge => {
            let ordering = match (&left, &right) {
                (Value::String(a), Value::String(b)) => a.partial_cmp(b),
                _ => {
                    let (a, b) = match (as_float(&left), as_float(&right)) {
                        (Some(a), Some(b)) => (a, b),
                        _ => return Err(type_error(&left, &right)),
                    };
                    a.partial_cmp(&b)
                }
            };
            let ordering = ordering.ok_or_else(|| type_error(&left, &right))?;
            Ok(Value::Bool(match op {
                Lt => ordering.is_lt(),
                Le => ordering.is_le(),
                Gt => ordering.is_gt(),
                Ge => ordering.is_ge(),
                _ => unreachable!("comparison operator"),
            }))
        }
        Add => match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            _ => numeric(op, &left, &right).ok_or_else(|| type_error(&left, &right)),
        },
        Sub | Mul => match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(if op == Sub { a - b } else { a * b })),
            _ => numeric(op, &left, &right).ok_or_else(|| type_error(&left, &right)),
        },
        Div => match (&left, &right) {
            (_, Value::Int(0)) => Err(Error::new(
                ErrorKind::Operator,
                "division by zero".to_string(),
            )),
            (Value::Int(a), Value::Int(b)) if a % b == 0 => Ok(Value::Int(a / b)),
            _ => {
                let result =
                    numeric(op, &left, &right).ok_or_else(|| type_error(&left, &right))?;
                if matches!(result, Value::Float(x) if x.is_infinite() || x.is_nan()) {
                    Err(Error::new(
                        ErrorKind::Operator,
                        "division by zero".to_string(),
                    ))
                } else {
                    Ok(result)
                }
            }
        },
        Mod => match (&left, &right) {
            (_, Value::Int(0)) => Err(Error::new(
                ErrorKind::Operator,
                "modulo by zero".to_string(),
            )),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a % b)),
            _ => Err(type_error(&left, &right)),
        },
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(x) => Some(*x),
        _ => None,
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (as_float(left), as_float(right)) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

fn numeric(op: BinaryOp, left: &Value, right: &Value) -> Option<Value> {
    let (a, b) = (as_float(left)?, as_float(right)?);
    Some(Value::Float(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => return None,
    }))
}

struct Slot {
    opcall: Opcall,
    done: bool,
}

pub(crate) struct Evaluator<'e> {
    pub opts: &'e EngineOptions,
    pub runtime: &'e Runtime,
}

impl Evaluator<'_> {
    /// Execute every eval-phase opcall; opcalls of other phases are left as
    /// literal text.
    pub fn run(&self, tree: &mut Value, opcalls: Vec<Opcall>) -> Result<(), Report> {
        let opcalls: Vec<Opcall> = opcalls
            .into_iter()
            .filter(|opcall| opcall.phase == crate::Phase::Eval)
            .collect();

        // A read of the opcall's own position (or below it) can never settle.
        let mut report = Report::new();
        for opcall in &opcalls {
            let own = &opcall.canonical;
            if opcall.reads.iter().any(|read| own.is_prefix_of(read)) {
                report.push(self.stalled(opcall));
            }
        }
        report.into_result()?;

        let graph = DependencyGraph::build(&opcalls);
        let mut slots: Vec<Slot> = opcalls
            .into_iter()
            .map(|opcall| Slot {
                opcall,
                done: false,
            })
            .collect();

        if log::log_enabled!(log::Level::Trace) {
            for index in 0..graph.len() {
                let fan_out = graph.consumers_of(index).len();
                if fan_out > 1 {
                    log::trace!(
                        "{} fans out to {} consumer(s)",
                        slots[index].opcall.canonical,
                        fan_out
                    );
                }
            }
        }

        if self.opts.depth_first {
            self.run_depth_first(tree, &mut slots, &graph)
        } else {
            self.run_breadth_first(tree, &mut slots, &graph)
        }
    }

    fn run_breadth_first(
        &self,
        tree: &mut Value,
        slots: &mut [Slot],
        graph: &DependencyGraph,
    ) -> Result<(), Report> {
        loop {
            if slots.iter().all(|slot| slot.done) {
                return Ok(());
            }

            let mut ready: Vec<usize> = (0..slots.len())
                .filter(|&index| {
                    !slots[index].done
                        && graph
                            .producers_of(index)
                            .iter()
                            .all(|&producer| slots[producer].done)
                })
                .collect();

            if ready.is_empty() {
                let mut report = Report::new();
                for slot in slots.iter().filter(|slot| !slot.done) {
                    report.push(self.stalled(&slot.opcall));
                }
                return Err(report);
            }

            self.order(&mut ready, slots);
            log::debug!("evaluation round: {} opcall(s) ready", ready.len());

            let outcomes = self.execute(tree, slots, &ready);

            // Single writer: responses are applied serially by this coordinator.
            let mut report = Report::new();
            for (index, outcome) in outcomes {
                match outcome {
                    Ok(response) => {
                        if let Err(err) = apply_response(tree, &slots[index].opcall.canonical, response) {
                            report.push(self.annotate(err, &slots[index].opcall));
                        }
                    }
                    Err(err) => report.push(self.annotate(err, &slots[index].opcall)),
                }
                slots[index].done = true;
            }

            // Every attempted opcall of the failing round reports together, and no
            // further rounds run.
            report.into_result()?;
        }
    }

    fn run_depth_first(
        &self,
        tree: &mut Value,
        slots: &mut [Slot],
        graph: &DependencyGraph,
    ) -> Result<(), Report> {
        let mut visiting = vec![false; slots.len()];
        for index in 0..slots.len() {
            let mut report = Report::new();
            self.visit(tree, slots, graph, &mut visiting, index, &mut report);
            report.into_result()?;
        }
        Ok(())
    }

    fn visit(
        &self,
        tree: &mut Value,
        slots: &mut [Slot],
        graph: &DependencyGraph,
        visiting: &mut [bool],
        index: usize,
        report: &mut Report,
    ) {
        if slots[index].done {
            return;
        }
        if visiting[index] {
            report.push(self.stalled(&slots[index].opcall));
            return;
        }
        visiting[index] = true;

        for &producer in graph.producers_of(index) {
            self.visit(tree, slots, graph, &mut *visiting, producer, report);
            if !report.is_empty() {
                visiting[index] = false;
                return;
            }
        }

        let outcome = execute_one(tree, &slots[index].opcall, self.runtime);
        match outcome {
            Ok(response) => {
                if let Err(err) = apply_response(tree, &slots[index].opcall.canonical, response) {
                    report.push(self.annotate(err, &slots[index].opcall));
                }
            }
            Err(err) => report.push(self.annotate(err, &slots[index].opcall)),
        }
        slots[index].done = true;
        visiting[index] = false;
    }

    fn order(&self, ready: &mut Vec<usize>, slots: &[Slot]) {
        match self.opts.dataflow_order {
            DataflowOrder::Alphabetical => {
                ready.sort_by_key(|&index| slots[index].opcall.canonical.to_string());
            }
            // Slots arrive in the stable pre-order walk of the merged tree.
            DataflowOrder::Insertion => ready.sort_unstable(),
        }
    }

    fn execute(
        &self,
        tree: &Value,
        slots: &[Slot],
        ready: &[usize],
    ) -> Vec<(usize, Result<Response, Error>)> {
        let lanes = self.opts.workers.max(1).min(ready.len());
        if lanes <= 1 {
            return ready
                .iter()
                .map(|&index| (index, execute_one(tree, &slots[index].opcall, self.runtime)))
                .collect();
        }

        // Opcalls of one round are independent by construction; run them on scoped
        // threads against the shared read only snapshot.
        let mut outcomes = std::thread::scope(|scope| {
            let chunk = (ready.len() + lanes - 1) / lanes;
            let handles: Vec<_> = ready
                .chunks(chunk)
                .map(|lane| {
                    scope.spawn(move || {
                        lane.iter()
                            .map(|&index| {
                                (index, execute_one(tree, &slots[index].opcall, self.runtime))
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| handle.join().expect("evaluation lane panicked"))
                .collect::<Vec<_>>()
        });

        match self.opts.dataflow_order {
            DataflowOrder::Alphabetical => {
                outcomes.sort_by_key(|(index, _)| slots[*index].opcall.canonical.to_string())
            }
            DataflowOrder::Insertion => outcomes.sort_by_key(|(index, _)| *index),
        }
        outcomes
    }

    fn stalled(&self, opcall: &Opcall) -> Error {
        self.annotate(
            Error::new(
                ErrorKind::Cycle,
                "cycle detected or unreachable reference".to_string(),
            ),
            opcall,
        )
    }

    fn annotate(&self, mut err: Error, opcall: &Opcall) -> Error {
        if err.path.is_none() {
            err.path = Some(opcall.canonical.to_string());
        }
        if err.snippet.is_none() {
            err.snippet = Some(opcall.source.clone());
        }
        err
    }
}

fn execute_one(tree: &Value, opcall: &Opcall, runtime: &Runtime) -> Result<Response, Error> {
    let ctx = OpContext {
        tree,
        here: &opcall.canonical,
        source: &opcall.source,
        raw_args: &[],
        target: None,
        modifiers: &[],
        runtime,
    };
    match (&opcall.expr, &opcall.op) {
        (Expression::Call(call), Some(op)) => invoke_with(&**op, call, &ctx),
        (Expression::Call(call), None) => invoke(call, &ctx),
        (expr, _) => reduce(expr, &ctx).map(Response::Replace),
    }
}

/// Apply one response at a position; the single writer entry point shared with
/// the merger.
pub(crate) fn apply_response(tree: &mut Value, at: &Cursor, response: Response) -> Result<(), Error> {
    match response {
        Response::Replace(value) => at.set(tree, value),
        Response::Inject(Value::Map(injected)) => {
            let key = at.last().map(str::to_string).ok_or_else(|| {
                Error::new(
                    ErrorKind::Operator,
                    "inject is not valid at the document root".to_string(),
                )
            })?;
            let parent_cursor = at.parent().unwrap_or_else(Cursor::root);
            let parent = parent_cursor.resolve_mut(tree)?;
            match parent {
                Value::Map(map) => {
                    inject_into(map, &key, &injected);
                    Ok(())
                }
                other => Err(Error::new(
                    ErrorKind::TypeMismatch,
                    format!(
                        "inject needs an enclosing mapping, found a {}",
                        other.type_name()
                    ),
                )),
            }
        }
        Response::Inject(other) => Err(Error::new(
            ErrorKind::Operator,
            format!("can only inject a mapping, got a {}", other.type_name()),
        )),
    }
}
