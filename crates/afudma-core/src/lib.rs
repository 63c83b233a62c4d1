// SPDX-FileCopyrightText: © 2026 OFS Tools Contributors
// SPDX-License-Identifier: Apache-2.0

//! Hardware-facing data model for the DMA accelerator function unit:
//! the CSR register map, the transfer descriptor encoding, and the
//! performance counter layout. Everything in here is a pure transform;
//! no register traffic happens at this layer.

mod csr;
mod descriptor;
mod perf;

pub use csr::{DmaCsr, CSR_COUNT, CSR_STRIDE_BYTES, STATUS_BUSY};
pub use descriptor::{Descriptor, DescriptorControl, TransferMode, ADDR_MASK_32BIT, MODE_SHIFT};
pub use perf::PerfSample;

/// Fixed transfer granularity of the engine. One descriptor beat moves
/// one line.
pub const DMA_LINE_SIZE: usize = 64;

/// Largest transfer the harness will program when running against a
/// software simulation of the AFU.
pub const MAX_TEST_BUFFER_SIZE_SIM: usize = 2048 * 1024;

/// Largest transfer the harness will program against real hardware.
pub const MAX_TEST_BUFFER_SIZE_HW: usize = 2048 * 1024;

/// Bytes the engine can move per microsecond at 100% utilization:
/// one 64-byte beat per cycle at the 400 MHz engine clock. A fully
/// utilized engine therefore reads as 25.6 GB/s.
pub const MAX_LINE_THROUGHPUT_BYTES: f64 = 25_600.0;

/// Minimum acceptable bandwidth in GB/s. Measurements below this are a
/// policy violation, not a data point.
pub const MIN_BANDWIDTH_GBPS: f64 = 8.2;
