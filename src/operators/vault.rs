use super::{join_scalars, scalar_string};
use crate::{Error, ErrorKind, OpContext, Operator, Phase, Response, Value};

/// `(( vault "secret/db:password" ))` reads a key from a secret store.
///
/// The argument pieces are concatenated into one `path:key` reference. With
/// `REDACT` set the reference is recorded and a sentinel returned instead of
/// contacting the store; `vault@production` routes to the backend configured via
/// `VAULT_ADDR_PRODUCTION`. The fetch itself runs on the I/O worker pool, under
/// its rate limiter, and results are cacheable so that single flight collapses
/// duplicate fetches.
pub struct VaultOperator;

impl Operator for VaultOperator {
    fn phase(&self) -> Phase {
        Phase::Eval
    }

    fn cacheable(&self) -> bool {
        true
    }

    fn run(&self, ctx: &OpContext, args: &[Value]) -> Result<Response, Error> {
        let reference = join_scalars(args)?;
        fetch(ctx, &reference).map(Response::Replace)
    }
}

/// `(( vault-try "secret/a:k" "secret/b:k" "fallback" ))` tries several
/// references in order and falls back to its last argument when none succeeds.
pub struct VaultTryOperator;

impl Operator for VaultTryOperator {
    fn phase(&self) -> Phase {
        Phase::Eval
    }

    fn cacheable(&self) -> bool {
        true
    }

    fn run(&self, ctx: &OpContext, args: &[Value]) -> Result<Response, Error> {
        if args.len() < 2 {
            return Err(Error::new(
                ErrorKind::Operator,
                "expected one or more references and a fallback".to_string(),
            ));
        }
        let (fallback, references) = args.split_last().expect("checked length above");
        for index in 0..references.len() {
            let reference = scalar_string(references, index)?;
            match fetch(ctx, &reference) {
                Ok(value) => return Ok(Response::Replace(value)),
                Err(err) => {
                    log::debug!("vault-try: `{}` failed: {}", reference, err);
                }
            }
        }
        Ok(Response::Replace(fallback.clone()))
    }
}

fn fetch(ctx: &OpContext, reference: &str) -> Result<Value, Error> {
    if ctx.runtime.redact() {
        ctx.runtime.record_secret(reference);
        return Ok(Value::String("REDACTED".to_string()));
    }

    let (address, token) = backend(ctx.target)?;
    let reference = reference.to_string();
    ctx.runtime.io_pool().submit_and_wait(Box::new(move |cancel| {
        if cancel.is_cancelled() {
            return Err(Error::new(
                ErrorKind::Operator,
                "cancelled before the secret fetch".to_string(),
            ));
        }
        fetch_secret(&address, &token, &reference)
    }))
}

/// Resolve the store address and token, honoring an `@target` backend suffix.
fn backend(target: Option<&str>) -> Result<(String, String), Error> {
    let suffix = target
        .map(|t| format!("_{}", t.to_uppercase()))
        .unwrap_or_default();

    let address = std::env::var(format!("VAULT_ADDR{}", suffix)).map_err(|_| {
        Error::new(
            ErrorKind::Configuration,
            format!("VAULT_ADDR{} is not set", suffix),
        )
    })?;
    let token = std::env::var(format!("VAULT_TOKEN{}", suffix))
        .or_else(|_| std::env::var("VAULT_TOKEN"))
        .map_err(|_| {
            Error::new(ErrorKind::Configuration, "VAULT_TOKEN is not set".to_string())
        })?;
    Ok((address, token))
}

fn fetch_secret(address: &str, token: &str, reference: &str) -> Result<Value, Error> {
    let (path, key) = match reference.rsplit_once(':') {
        Some((path, key)) => (path, Some(key)),
        None => (reference, None),
    };

    let url = format!("{}/v1/{}", address.trim_end_matches('/'), path);
    log::debug!("vault: GET {}", url);
    let response = ureq::get(&url)
        .set("X-Vault-Token", token)
        .call()
        .map_err(|err| {
            Error::new(
                ErrorKind::Operator,
                format!("secret `{}` could not be fetched: {}", reference, err),
            )
        })?;
    let body: serde_json::Value = response.into_json().map_err(|err| {
        Error::new(
            ErrorKind::Operator,
            format!("secret `{}` returned a malformed body: {}", reference, err),
        )
    })?;

    // KV version 2 nests the secret one level deeper than version 1.
    let data = body
        .get("data")
        .map(|data| data.get("data").unwrap_or(data))
        .ok_or_else(|| {
            Error::new(
                ErrorKind::Operator,
                format!("secret `{}` returned no data", reference),
            )
        })?;

    let secret = match key {
        Some(key) => data.get(key).ok_or_else(|| {
            Error::new(
                ErrorKind::Operator,
                format!("secret `{}` has no key `{}`", path, key),
            )
        })?,
        None => data,
    };
    Ok(Value::from(secret.clone()))
}
