//! Error taxonomy for the public dispatcher API (spec §7).

use crate::fleet::NoWorkers;
use crate::pending::DuplicateId;

/// Synchronous failure from `Dispatcher::submit`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error(transparent)]
    NoWorkers(#[from] NoWorkers),
    #[error(transparent)]
    DuplicateId(#[from] DuplicateId),
}

pub use crate::pending::ReplyError;
