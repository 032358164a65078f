//! The process wide name to operator binding.
//!
//! The registry is written during startup and read only afterwards; it is the only
//! authority the tokenizer and the parser use to classify identifiers. Its
//! fingerprint changes on every mutation and is folded into parse cache keys so a
//! registry change never produces a stale parse.

use crate::{Error, ErrorKind, OpContext, Operator, Phase, Response, Value};
use fnv::FnvHasher;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::{Arc, RwLock};

/// Arity and scheduling metadata carried per registered operator.
#[derive(Debug, Clone, Copy)]
pub struct OperatorInfo {
    pub min_args: usize,
    /// `-1` means unlimited.
    pub max_args: isize,
    pub phase: Phase,
    /// The first argument is a cursor even when its identifier coincides with a
    /// registered operator name.
    pub reference_args: bool,
}

impl OperatorInfo {
    pub fn new(phase: Phase, min_args: usize, max_args: isize) -> Self {
        Self {
            min_args,
            max_args,
            phase,
            reference_args: false,
        }
    }

    pub fn expecting_reference(mut self) -> Self {
        self.reference_args = true;
        self
    }
}

struct Entry {
    op: Arc<dyn Operator>,
    info: OperatorInfo,
}

struct Inner {
    ops: HashMap<String, Entry>,
    fingerprint: u64,
}

/// A frozen-after-startup map from operator names to implementations.
pub struct Registry {
    inner: RwLock<Inner>,
}

static GLOBAL: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    crate::operators::install(&registry);
    registry
});

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// An empty registry; mostly useful for grammar tests.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                ops: HashMap::new(),
                fingerprint: 0x811c9dc5,
            }),
        }
    }

    /// The process wide registry, populated with the default operator set on first
    /// use.
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    pub fn register(
        &self,
        name: &str,
        op: Arc<dyn Operator>,
        info: OperatorInfo,
    ) -> Result<(), Error> {
        op.setup()?;
        let mut inner = self.inner.write().expect("registry lock");
        let mut hasher = FnvHasher::default();
        hasher.write_u64(inner.fingerprint);
        hasher.write(name.as_bytes());
        inner.fingerprint = hasher.finish();
        inner.ops.insert(name.to_string(), Entry { op, info });
        Ok(())
    }

    pub fn is_operator(&self, name: &str) -> bool {
        self.inner
            .read()
            .expect("registry lock")
            .ops
            .contains_key(name)
    }

    pub fn lookup(&self, name: &str) -> Option<(Arc<dyn Operator>, OperatorInfo)> {
        let inner = self.inner.read().expect("registry lock");
        inner
            .ops
            .get(name)
            .map(|entry| (entry.op.clone(), entry.info))
    }

    /// Resolve a name to its operator; unknown names bind to the null operator,
    /// which echoes its single argument as a literal.
    pub fn bind(&self, name: &str) -> (Arc<dyn Operator>, OperatorInfo) {
        self.lookup(name).unwrap_or_else(|| {
            (
                Arc::new(NullOperator) as Arc<dyn Operator>,
                OperatorInfo::new(Phase::Eval, 0, -1),
            )
        })
    }

    pub fn fingerprint(&self) -> u64 {
        self.inner.read().expect("registry lock").fingerprint
    }

    pub fn names(&self) -> Vec<String> {
        let inner = self.inner.read().expect("registry lock");
        let mut names: Vec<String> = inner.ops.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Split an operator identifier into its base name, `:modifier` list and
/// `@target` suffix.
pub fn split_name(text: &str) -> (&str, Vec<&str>, Option<&str>) {
    let (head, target) = match text.find('@') {
        Some(at) => (&text[..at], Some(&text[at + 1..])),
        None => (text, None),
    };
    let mut parts = head.split(':');
    let base = parts.next().unwrap_or(head);
    let modifiers: Vec<&str> = parts.filter(|part| !part.is_empty()).collect();
    (base, modifiers, target.filter(|t| !t.is_empty()))
}

/// Backs unknown operator names: returns its single argument unchanged, or null
/// when invoked without arguments.
pub struct NullOperator;

impl Operator for NullOperator {
    fn phase(&self) -> Phase {
        Phase::Eval
    }

    fn run(&self, _ctx: &OpContext, args: &[Value]) -> Result<Response, Error> {
        match args {
            [] => Ok(Response::Replace(Value::Null)),
            [single] => Ok(Response::Replace(single.clone())),
            _ => Err(Error::new(
                ErrorKind::Operator,
                format!("expected at most one argument, got {}", args.len()),
            )),
        }
    }
}
