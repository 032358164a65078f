//! The engine facade: merge, analyze, evaluate, post-process.

use crate::analysis::analyze;
use crate::eval::{invoke_with, Evaluator};
use crate::merge::Merger;
use crate::registry::Registry;
use crate::{
    post, Engine, EngineOptions, Expression, OpContext, Phase, Report, Runtime, Value,
};
use std::sync::Arc;

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            fallback_append: false,
            skip_eval: false,
            prune: Vec::new(),
            cherry_pick: Vec::new(),
            dataflow_order: Default::default(),
            depth_first: false,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            queue_size: 64,
            rate_limit: None,
            redact: std::env::var("REDACT").map_or(false, |v| !v.is_empty()),
        }
    }
}

impl Engine {
    pub fn new(opts: EngineOptions) -> Self {
        let runtime = Arc::new(Runtime::new(&opts));
        Self { opts, runtime }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.opts
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// The secret references recorded so far, sorted.
    pub fn secrets(&self) -> Vec<String> {
        self.runtime.secrets()
    }

    /// Run the full pipeline over the parsed input documents.
    pub fn run(&self, documents: Vec<Value>) -> Result<Value, Report> {
        let registry = Registry::global();

        let merger = Merger {
            opts: &self.opts,
            runtime: &self.runtime,
        };
        let mut tree = merger.fold(documents).map_err(Report::from)?;

        if !self.opts.skip_eval {
            let opcalls = analyze(&tree, registry)?;
            self.assert_params(&tree, &opcalls)?;

            let evaluator = Evaluator {
                opts: &self.opts,
                runtime: &self.runtime,
            };
            evaluator.run(&mut tree, opcalls)?;
        }

        let mut prune_paths = self.opts.prune.clone();
        prune_paths.extend(
            self.runtime
                .take_prunes()
                .iter()
                .map(|cursor| cursor.to_string()),
        );
        post::prune(&mut tree, &prune_paths).map_err(Report::from)?;

        if !self.opts.cherry_pick.is_empty() {
            tree = post::cherry_pick(&tree, &self.opts.cherry_pick).map_err(Report::from)?;
        }

        post::cycle_check(&tree, post::DEFAULT_MAX_DEPTH).map_err(Report::from)?;
        Ok(tree)
    }

    /// Surface every `param` call which survived the merge; their messages are
    /// collected into one report.
    fn assert_params(&self, tree: &Value, opcalls: &[crate::Opcall]) -> Result<(), Report> {
        let mut report = Report::new();
        for opcall in opcalls.iter().filter(|opcall| opcall.phase == Phase::Param) {
            let (call, op) = match (&opcall.expr, &opcall.op) {
                (Expression::Call(call), Some(op)) => (call, op),
                _ => continue,
            };
            let ctx = OpContext {
                tree,
                here: &opcall.canonical,
                source: &opcall.source,
                raw_args: &call.args,
                target: call.target.as_deref(),
                modifiers: &call.modifiers,
                runtime: &self.runtime,
            };
            if let Err(mut err) = invoke_with(&**op, call, &ctx) {
                if err.path.is_none() {
                    err.path = Some(opcall.canonical.to_string());
                }
                if err.snippet.is_none() {
                    err.snippet = Some(opcall.source.clone());
                }
                report.push(err);
            }
        }
        report.into_result()
    }
}

/// For each target document, merge it with the source and collect one composed
/// output per target.
pub fn fan(
    opts: EngineOptions,
    source: Value,
    targets: Vec<Value>,
) -> Result<Vec<Value>, Report> {
    let engine = Engine::new(opts);
    targets
        .into_iter()
        .map(|target| engine.run(vec![source.clone(), target]))
        .collect()
}
