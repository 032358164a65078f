//! The built in operator set.
//!
//! Each operator lives in its own file and satisfies the [Operator](crate::Operator)
//! contract; [install] wires the set into a registry together with its arity and
//! phase metadata.

mod calc;
mod concat;
mod defer;
mod empty;
mod env;
mod grab;
mod inject;
mod ips;
mod join;
mod keys;
mod negate;
mod param;
mod prune;
mod sort;
mod static_ips;
mod stringify;
mod vault;

pub use calc::CalcOperator;
pub use concat::ConcatOperator;
pub use defer::DeferOperator;
pub use empty::EmptyOperator;
pub use env::EnvOperator;
pub use grab::GrabOperator;
pub use inject::InjectOperator;
pub use ips::IpsOperator;
pub use join::JoinOperator;
pub use keys::KeysOperator;
pub use negate::NegateOperator;
pub use param::ParamOperator;
pub use prune::PruneOperator;
pub use sort::SortOperator;
pub use static_ips::StaticIpsOperator;
pub use stringify::StringifyOperator;
pub use vault::{VaultOperator, VaultTryOperator};

use crate::registry::{OperatorInfo, Registry};
use crate::{Error, ErrorKind, Phase, Value};
use std::sync::Arc;

/// Register the default operator set.
pub fn install(registry: &Registry) {
    let entries: Vec<(&str, Arc<dyn crate::Operator>, OperatorInfo)> = vec![
        (
            "grab",
            Arc::new(GrabOperator),
            OperatorInfo::new(Phase::Eval, 1, -1).expecting_reference(),
        ),
        (
            "concat",
            Arc::new(ConcatOperator),
            OperatorInfo::new(Phase::Eval, 1, -1),
        ),
        (
            "join",
            Arc::new(JoinOperator),
            OperatorInfo::new(Phase::Eval, 1, -1),
        ),
        (
            "keys",
            Arc::new(KeysOperator),
            OperatorInfo::new(Phase::Eval, 1, -1).expecting_reference(),
        ),
        (
            "empty",
            Arc::new(EmptyOperator),
            OperatorInfo::new(Phase::Eval, 1, 1),
        ),
        (
            "env",
            Arc::new(EnvOperator),
            OperatorInfo::new(Phase::Eval, 1, 2),
        ),
        (
            "param",
            Arc::new(ParamOperator),
            OperatorInfo::new(Phase::Param, 1, 1).expecting_reference(),
        ),
        (
            "defer",
            Arc::new(DeferOperator),
            OperatorInfo::new(Phase::Eval, 0, -1),
        ),
        (
            "calc",
            Arc::new(CalcOperator),
            OperatorInfo::new(Phase::Eval, 1, 1),
        ),
        (
            "sort",
            Arc::new(SortOperator),
            OperatorInfo::new(Phase::Eval, 1, 2),
        ),
        (
            "stringify",
            Arc::new(StringifyOperator),
            OperatorInfo::new(Phase::Eval, 1, 1),
        ),
        (
            "negate",
            Arc::new(NegateOperator),
            OperatorInfo::new(Phase::Eval, 1, 1),
        ),
        (
            "static_ips",
            Arc::new(StaticIpsOperator),
            OperatorInfo::new(Phase::Eval, 1, -1).expecting_reference(),
        ),
        (
            "ips",
            Arc::new(IpsOperator),
            OperatorInfo::new(Phase::Eval, 2, 3).expecting_reference(),
        ),
        (
            "inject",
            Arc::new(InjectOperator),
            OperatorInfo::new(Phase::Merge, 1, 1).expecting_reference(),
        ),
        (
            "prune",
            Arc::new(PruneOperator),
            OperatorInfo::new(Phase::Eval, 0, 1).expecting_reference(),
        ),
        (
            "vault",
            Arc::new(VaultOperator),
            OperatorInfo::new(Phase::Eval, 1, -1),
        ),
        (
            "vault-try",
            Arc::new(VaultTryOperator),
            OperatorInfo::new(Phase::Eval, 2, -1),
        ),
    ];

    for (name, op, info) in entries {
        if let Err(err) = registry.register(name, op, info) {
            log::warn!("operator `{}` failed to set up: {}", name, err);
        }
    }
}

/// Render one reduced argument as a string; sequences and mappings are rejected.
pub(crate) fn scalar_string(args: &[Value], index: usize) -> Result<String, Error> {
    let value = args.get(index).ok_or_else(|| {
        Error::new(
            ErrorKind::Operator,
            format!("missing argument #{}", index + 1),
        )
    })?;
    value.render_scalar().ok_or_else(|| {
        Error::new(
            ErrorKind::Operator,
            format!(
                "argument #{} is a {}; expected a scalar",
                index + 1,
                value.type_name()
            ),
        )
    })
}

/// Render and concatenate every reduced argument.
pub(crate) fn join_scalars(args: &[Value]) -> Result<String, Error> {
    let mut joined = String::new();
    for index in 0..args.len() {
        joined.push_str(&scalar_string(args, index)?);
    }
    Ok(joined)
}
