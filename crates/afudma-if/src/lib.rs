// SPDX-FileCopyrightText: © 2026 OFS Tools Contributors
// SPDX-License-Identifier: Apache-2.0

//! The DMA control-and-verification protocol.
//!
//! This crate drives a descriptor-programmed DMA engine through its CSR
//! window: it encodes and submits descriptors, polls for completion,
//! converts the hardware performance counters into bandwidth figures,
//! and runs the host→device→host round-trip integrity test.
//!
//! Access to the device itself goes through the [`AccelHandle`] trait;
//! the crate never opens a device node or allocates pinned memory on
//! its own. `afudma-sim` provides a software implementation of the
//! trait, a real deployment wires it to the platform's accelerator
//! management library.

pub mod error;
mod engine;
mod handle;
mod perf;
mod roundtrip;
mod session;

pub use engine::{transfer, TransferTiming, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT};
pub use error::{BandwidthError, DeviceError, DmaError, TransferError};
pub use handle::{AccelHandle, HostBuffer};
pub use perf::{measure_bandwidth, Direction, LinkBandwidth};
pub use roundtrip::{run_round_trip, TransferReport};
pub use session::{AfuIdentity, DmaSession, MmioWindow, RegisterBackend};
