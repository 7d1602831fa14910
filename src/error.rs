//! # Caller Contract Errors
//!
//! Two classes of failure exist in the codec:
//!
//! | Class | Examples | Reported as |
//! |-------|----------|-------------|
//! | **Internal invariant** | unknown entry tag, header with both kind bits, `Value` event without a `Key` | `panic!` |
//! | **Caller contract** | key lookup on an array, ordinal access on an object, oversized container | [`ContractError`] inside `eyre::Report` |
//!
//! Internal invariants protect data this codec produced itself, so a failure
//! means corruption and is never recoverable. Contract errors come from misuse
//! by surrounding glue code and are returned through `eyre::Result` like every
//! other fallible TurDB operation. Callers that need to branch on the cause
//! use `report.downcast_ref::<ContractError>()`.

use crate::format::ContainerKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    #[error("cannot look up a key in a jsonb {0}")]
    NotAnObject(ContainerKind),

    #[error("cannot index a jsonb {0} by position")]
    NotAnArray(ContainerKind),

    #[error("jsonb containment requires matching root kinds, got {big} and {pattern}")]
    RootKindMismatch {
        big: ContainerKind,
        pattern: ContainerKind,
    },

    #[error("jsonb {what} of {actual} exceeds the maximum of {max}")]
    TooLarge {
        what: &'static str,
        actual: usize,
        max: usize,
    },

    #[error("jsonb object keys are not in finalized order")]
    UnfinalizedObject,

    #[error("jsonb data too short: {0} bytes")]
    TooShort(usize),

    #[error("unsupported jsonb root header {0:#010x}")]
    UnsupportedFormat(u32),
}
