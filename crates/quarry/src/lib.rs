//! Quarry scan agent library.
//!
//! The orchestration core: deciding which artifacts need (re)scanning
//! under the current rule set, batching them, dispatching batches
//! locally or to a worker group with a bounded wait, recording
//! results, and regenerating the published feed as qualifying results
//! land. The pattern engine, module store and record store are
//! collaborators behind trait seams.

pub mod config;
pub mod decision;
pub mod dispatch;
pub mod driver;
pub mod engine;
pub mod feed;
pub mod fingerprint;
pub mod lock;
pub mod maintenance;
pub mod recorder;
pub mod source;
pub mod yara;
