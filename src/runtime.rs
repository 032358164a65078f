//! The shared substrate handed to operators: the operator result cache, the I/O
//! worker pool, single flight deduplication and the secret reference ledger.

use crate::cache::ShardedCache;
use crate::pool::WorkerPool;
use crate::{Cursor, EngineOptions, Error, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Default TTL of operator results.
const RESULT_TTL: Duration = Duration::from_secs(300);

struct Flight {
    done: Mutex<Option<Result<Value, Error>>>,
    signal: Condvar,
}

/// At most one in-flight invocation per fingerprint; late callers wait on the
/// first one's result.
#[derive(Default)]
pub struct FlightGroup {
    flights: Mutex<HashMap<u64, Arc<Flight>>>,
}

impl FlightGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(
        &self,
        key: u64,
        work: impl FnOnce() -> Result<Value, Error>,
    ) -> Result<Value, Error> {
        let (flight, leader) = {
            let mut flights = self.flights.lock().expect("flight lock");
            match flights.get(&key) {
                Some(flight) => (flight.clone(), false),
                None => {
                    let flight = Arc::new(Flight {
                        done: Mutex::new(None),
                        signal: Condvar::new(),
                    });
                    flights.insert(key, flight.clone());
                    (flight, true)
                }
            }
        };

        if leader {
            let result = work();
            {
                let mut slot = flight.done.lock().expect("flight slot lock");
                *slot = Some(result.clone());
                flight.signal.notify_all();
            }
            self.flights.lock().expect("flight lock").remove(&key);
            result
        } else {
            let mut slot = flight.done.lock().expect("flight slot lock");
            while slot.is_none() {
                slot = flight.signal.wait(slot).expect("flight slot lock");
            }
            slot.clone().expect("leader published a result")
        }
    }
}

/// Per-run engine state shared with every operator invocation.
pub struct Runtime {
    op_cache: ShardedCache<Value>,
    io_pool: WorkerPool,
    flights: FlightGroup,
    secrets: Mutex<BTreeSet<String>>,
    prunes: Mutex<Vec<Cursor>>,
    redact: bool,
}

impl Runtime {
    pub fn new(opts: &EngineOptions) -> Self {
        Self {
            op_cache: ShardedCache::new("operator-results", 16, 4096, Some(RESULT_TTL)),
            io_pool: WorkerPool::new("io", opts.workers, opts.queue_size, opts.rate_limit),
            flights: FlightGroup::new(),
            secrets: Mutex::new(BTreeSet::new()),
            prunes: Mutex::new(Vec::new()),
            redact: opts.redact,
        }
    }

    pub fn operator_cache(&self) -> &ShardedCache<Value> {
        &self.op_cache
    }

    pub fn io_pool(&self) -> &WorkerPool {
        &self.io_pool
    }

    pub fn flights(&self) -> &FlightGroup {
        &self.flights
    }

    /// Whether secret store operators should record references instead of
    /// fetching.
    pub fn redact(&self) -> bool {
        self.redact
    }

    pub fn record_secret(&self, reference: &str) {
        self.secrets
            .lock()
            .expect("secret ledger lock")
            .insert(reference.to_string());
    }

    /// The sorted set of secret references observed during the run.
    pub fn secrets(&self) -> Vec<String> {
        self.secrets
            .lock()
            .expect("secret ledger lock")
            .iter()
            .cloned()
            .collect()
    }

    /// Queue a path for removal by the post-processor.
    pub fn mark_prune(&self, cursor: Cursor) {
        self.prunes.lock().expect("prune ledger lock").push(cursor);
    }

    pub fn prunes(&self) -> Vec<Cursor> {
        self.prunes.lock().expect("prune ledger lock").clone()
    }

    /// Drain the prune ledger at the end of a run.
    pub fn take_prunes(&self) -> Vec<Cursor> {
        std::mem::take(&mut *self.prunes.lock().expect("prune ledger lock"))
    }
}
