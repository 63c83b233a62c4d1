// SPDX-FileCopyrightText: © 2026 OFS Tools Contributors
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use thiserror::Error;

use crate::perf::Direction;
use afudma_core::MIN_BANDWIDTH_GBPS;

/// Failures reported by the device-management layer. None of these are
/// retried; a handle that fails a register access or a buffer call is
/// unusable and the operation in flight is abandoned.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("failed to map the CSR window: {source}")]
    MapFailed { source: std::io::Error },

    #[error("MMIO read at byte offset {offset:#x} failed: {source}")]
    ReadFailed {
        offset: u64,
        source: std::io::Error,
    },

    #[error("MMIO write at byte offset {offset:#x} failed: {source}")]
    WriteFailed {
        offset: u64,
        source: std::io::Error,
    },

    #[error("CSR window of {size} bytes is too small for the {expected} byte register file")]
    WindowTooSmall { size: usize, expected: usize },

    #[error("failed to allocate a {size} byte pinned buffer: {source}")]
    BufferAllocationFailed {
        size: usize,
        source: std::io::Error,
    },

    #[error("no device-visible address for buffer {id}")]
    NoIoAddress { id: u64 },

    #[error("failed to release buffer {id}: {source}")]
    BufferReleaseFailed {
        id: u64,
        source: std::io::Error,
    },
}

/// Failures of one descriptor submission / completion cycle.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("engine still busy after {timeout:?}; descriptor appears stuck")]
    Timeout { timeout: Duration },

    #[error("engine reported idle without ever reporting busy after submission")]
    ProtocolViolation,

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Outcome of a bandwidth measurement that did not produce a usable
/// number. Policy violations are their own variant so callers can never
/// mistake one for a measurement.
#[derive(Error, Debug)]
pub enum BandwidthError {
    #[error(
        "{direction} bandwidth {measured_gbps:.3} GB/s is below the \
         {MIN_BANDWIDTH_GBPS} GB/s minimum"
    )]
    BelowMinimum {
        direction: Direction,
        measured_gbps: f64,
    },

    #[error("{direction} performance counter shows no cycle activity")]
    NoActivity { direction: Direction },

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Umbrella error for whole-test entry points.
#[derive(Error, Debug)]
pub enum DmaError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Bandwidth(#[from] BandwidthError),
}
