// SPDX-FileCopyrightText: © 2026 OFS Tools Contributors
// SPDX-License-Identifier: Apache-2.0

//! Validation and bandwidth exerciser for a CSR-programmed FPGA DMA
//! engine. Re-exports the layered crates plus the handful of types a
//! test harness needs directly.

pub use afudma_core;
pub use afudma_if;
pub use afudma_sim;

pub use afudma_core::{
    Descriptor, DmaCsr, PerfSample, TransferMode, DMA_LINE_SIZE, MAX_TEST_BUFFER_SIZE_HW,
    MAX_TEST_BUFFER_SIZE_SIM, MIN_BANDWIDTH_GBPS,
};
pub use afudma_if::{
    measure_bandwidth, run_round_trip, transfer, AccelHandle, BandwidthError, DeviceError,
    Direction, DmaError, DmaSession, LinkBandwidth, TransferError, TransferReport,
};
pub use afudma_sim::SimAfu;
