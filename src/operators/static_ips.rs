use crate::{Cursor, Error, ErrorKind, Expression, OpContext, Operator, Phase, Response, Value};
use std::net::Ipv4Addr;

/// `(( static_ips 0 2 4 ))` selects static addresses for a job from the pool its
/// network declares.
///
/// The call must sit at `jobs.<job>.networks.<net>.static_ips`; it looks up the
/// named network under the top level `networks` sequence, expands the `static`
/// ranges of its subnets into a pool, picks the argument offsets out of the pool
/// and keeps as many addresses as the job has instances.
pub struct StaticIpsOperator;

impl Operator for StaticIpsOperator {
    fn phase(&self) -> Phase {
        Phase::Eval
    }

    fn dependencies(&self, _tree: &Value, _args: &[Expression], _here: &Cursor) -> Vec<Cursor> {
        vec![
            Cursor::from_segments(vec!["networks".to_string()]),
            Cursor::from_segments(vec!["jobs".to_string()]),
        ]
    }

    fn run(&self, ctx: &OpContext, args: &[Value]) -> Result<Response, Error> {
        let segments = ctx.here.segments();
        let well_placed = segments.len() == 5
            && segments[0] == "jobs"
            && segments[2] == "networks"
            && segments[4] == "static_ips";
        if !well_placed {
            return Err(Error::new(
                ErrorKind::Operator,
                "static_ips is only valid at jobs.<job>.networks.<network>.static_ips"
                    .to_string(),
            ));
        }

        let job = Cursor::from_segments(segments[..2].to_vec());
        let instances = job
            .child("instances")
            .resolve(ctx.tree)?
            .as_int()
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::Operator,
                    format!("{}.instances must be an integer", job),
                )
            })?;

        let network_name = Cursor::from_segments(segments[..4].to_vec())
            .child("name")
            .resolve(ctx.tree)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                Error::new(ErrorKind::Operator, "the network name must be a string".to_string())
            })?;

        let pool = address_pool(ctx.tree, &network_name)?;

        let mut offsets = Vec::with_capacity(args.len());
        for arg in args {
            let offset = arg.as_int().ok_or_else(|| {
                Error::new(
                    ErrorKind::Operator,
                    "every offset must be an integer".to_string(),
                )
            })?;
            if offset < 0 || offset as usize >= pool.len() {
                return Err(Error::new(
                    ErrorKind::Operator,
                    format!(
                        "offset {} is outside the static pool of network `{}` ({} address(es))",
                        offset,
                        network_name,
                        pool.len()
                    ),
                ));
            }
            offsets.push(offset as usize);
        }

        if (offsets.len() as i64) < instances {
            return Err(Error::new(
                ErrorKind::Operator,
                format!(
                    "{} instance(s) requested but only {} static offset(s) given",
                    instances,
                    offsets.len()
                ),
            ));
        }

        let ips = offsets
            .into_iter()
            .take(instances.max(0) as usize)
            .map(|offset| Value::String(pool[offset].to_string()))
            .collect();
        Ok(Response::Replace(Value::Seq(ips)))
    }
}

/// Expand the `static` entries of the named network's subnets into a flat pool.
fn address_pool(tree: &Value, network_name: &str) -> Result<Vec<Ipv4Addr>, Error> {
    let networks = Cursor::from_segments(vec!["networks".to_string()]).resolve(tree)?;
    let network = networks
        .as_seq()
        .and_then(|items| {
            items.iter().find(|item| {
                item.as_map()
                    .and_then(|map| map.get("name"))
                    .and_then(Value::as_str)
                    .map_or(false, |name| name == network_name)
            })
        })
        .ok_or_else(|| {
            Error::new(
                ErrorKind::Operator,
                format!("network `{}` is not declared under networks", network_name),
            )
        })?;

    let mut pool = Vec::new();
    let subnets = network
        .as_map()
        .and_then(|map| map.get("subnets"))
        .and_then(Value::as_seq)
        .cloned()
        .unwrap_or_default();
    for subnet in &subnets {
        let statics = subnet
            .as_map()
            .and_then(|map| map.get("static"))
            .and_then(Value::as_seq)
            .cloned()
            .unwrap_or_default();
        for entry in &statics {
            let text = entry.as_str().ok_or_else(|| {
                Error::new(
                    ErrorKind::Operator,
                    "static entries must be addresses or `a - b` ranges".to_string(),
                )
            })?;
            expand_range(text, &mut pool)?;
        }
    }

    if pool.is_empty() {
        return Err(Error::new(
            ErrorKind::Operator,
            format!("network `{}` declares no static addresses", network_name),
        ));
    }
    Ok(pool)
}

fn expand_range(text: &str, pool: &mut Vec<Ipv4Addr>) -> Result<(), Error> {
    let parse = |part: &str| -> Result<Ipv4Addr, Error> {
        part.trim().parse::<Ipv4Addr>().map_err(|_| {
            Error::new(
                ErrorKind::Operator,
                format!("`{}` is not an IPv4 address", part.trim()),
            )
        })
    };

    match text.split_once('-') {
        Some((from, to)) => {
            let from = u32::from(parse(from)?);
            let to = u32::from(parse(to)?);
            if from > to {
                return Err(Error::new(
                    ErrorKind::Operator,
                    format!("`{}` is a descending range", text),
                ));
            }
            pool.extend((from..=to).map(Ipv4Addr::from));
        }
        None => pool.push(parse(text)?),
    }
    Ok(())
}
