//! Redis-backed document store and job queue.
//!
//! Records are JSON documents under `tourly:*` keys. State changes are
//! compare-and-set on the whole document so two writers never interleave.

mod airports;
mod error;
mod leads;
mod pool;
mod queue;
mod shorts;

pub use error::RedisAdapterError;
pub use pool::RedisPool;

const JOB_QUEUE: &str = "tourly:jobs";
const SHORT_PREFIX: &str = "tourly:short:";
const SHORT_SLUG_PREFIX: &str = "tourly:short_slug:";
const CONSULTATION_PREFIX: &str = "tourly:consultation:";
const AIRPORT_PREFIX: &str = "tourly:airport:";
const AIRPORT_CODES: &str = "tourly:airports";
