use super::scalar_string;
use crate::{Error, ErrorKind, OpContext, Operator, Phase, Response, Value};
use std::net::Ipv4Addr;

/// `(( ips "10.0.0.0/24" 10 3 ))` computes addresses by offset. A plain address
/// offsets from itself; a CIDR base offsets from the network address, and a
/// negative offset counts back from the end of the subnet. The optional third
/// argument yields a sequence of consecutive addresses.
pub struct IpsOperator;

impl Operator for IpsOperator {
    fn phase(&self) -> Phase {
        Phase::Eval
    }

    fn run(&self, _ctx: &OpContext, args: &[Value]) -> Result<Response, Error> {
        let base = scalar_string(args, 0)?;
        let offset = int_arg(args, 1)?;
        let count = match args.get(2) {
            Some(_) => Some(int_arg(args, 2)?),
            None => None,
        };

        let (network, mask_bits) = parse_base(&base)?;
        let start = address_at(network, mask_bits, offset)?;

        match count {
            None => Ok(Response::Replace(Value::String(
                Ipv4Addr::from(start).to_string(),
            ))),
            Some(count) if count >= 0 => {
                let ips = (0..count)
                    .map(|step| {
                        let raw = start
                            .checked_add(step as u32)
                            .ok_or_else(|| range_error(&base))?;
                        Ok(Value::String(Ipv4Addr::from(raw).to_string()))
                    })
                    .collect::<Result<Vec<Value>, Error>>()?;
                Ok(Response::Replace(Value::Seq(ips)))
            }
            Some(_) => Err(Error::new(
                ErrorKind::Operator,
                "the count must not be negative".to_string(),
            )),
        }
    }
}

fn int_arg(args: &[Value], index: usize) -> Result<i64, Error> {
    args.get(index).and_then(Value::as_int).ok_or_else(|| {
        Error::new(
            ErrorKind::Operator,
            format!("argument #{} must be an integer", index + 1),
        )
    })
}

fn range_error(base: &str) -> Error {
    Error::new(
        ErrorKind::Operator,
        format!("offset out of range for `{}`", base),
    )
}

/// Parse `a.b.c.d` or `a.b.c.d/nn` into the base address and an optional mask
/// width.
fn parse_base(base: &str) -> Result<(u32, Option<u32>), Error> {
    let (address, mask) = match base.split_once('/') {
        Some((address, mask)) => {
            let bits: u32 = mask.parse().map_err(|_| invalid(base))?;
            if bits > 32 {
                return Err(invalid(base));
            }
            (address, Some(bits))
        }
        None => (base, None),
    };
    let parsed: Ipv4Addr = address.parse().map_err(|_| invalid(base))?;
    let raw = u32::from(parsed);
    match mask {
        Some(bits) => {
            let mask = if bits == 0 { 0 } else { u32::MAX << (32 - bits) };
            Ok((raw & mask, Some(bits)))
        }
        None => Ok((raw, None)),
    }
}

fn invalid(base: &str) -> Error {
    Error::new(
        ErrorKind::Operator,
        format!("`{}` is not an IPv4 address or CIDR range", base),
    )
}

fn address_at(network: u32, mask_bits: Option<u32>, offset: i64) -> Result<u32, Error> {
    if offset >= 0 {
        return network.checked_add(offset as u32).ok_or_else(|| {
            Error::new(ErrorKind::Operator, "offset out of range".to_string())
        });
    }
    let bits = mask_bits.ok_or_else(|| {
        Error::new(
            ErrorKind::Operator,
            "a negative offset requires a CIDR base".to_string(),
        )
    })?;
    let size: u64 = 1u64 << (32 - bits);
    let back = offset.unsigned_abs();
    if back as u64 > size {
        return Err(Error::new(
            ErrorKind::Operator,
            "offset out of range".to_string(),
        ));
    }
    network
        .checked_add((size - back as u64) as u32)
        .ok_or_else(|| Error::new(ErrorKind::Operator, "offset out of range".to_string()))
}
