// SPDX-FileCopyrightText: © 2026 OFS Tools Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;

use afudma_core::{
    TransferMode, DMA_LINE_SIZE, MAX_TEST_BUFFER_SIZE_HW, MAX_TEST_BUFFER_SIZE_SIM,
};

use crate::engine::transfer;
use crate::error::DmaError;
use crate::handle::{AccelHandle, HostBuffer};
use crate::perf::{measure_bandwidth, LinkBandwidth};
use crate::session::DmaSession;

/// Result of one round-trip test invocation. `mismatch_count == 0`
/// means the data survived host→device→host intact.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TransferReport {
    pub bytes_compared: usize,
    pub mismatch_count: usize,
    pub h2d: LinkBandwidth,
    pub d2h: LinkBandwidth,
    pub h2d_apparent_gbps: f64,
    pub d2h_apparent_gbps: f64,
}

impl TransferReport {
    pub fn passed(&self) -> bool {
        self.mismatch_count == 0
    }
}

/// Keeps a pinned buffer alive for the duration of a test and returns
/// it to the allocator on every exit path, including the bandwidth
/// and device-error aborts.
struct BufferGuard<'a, H: AccelHandle> {
    handle: &'a H,
    buffer: Option<HostBuffer>,
}

impl<'a, H: AccelHandle> BufferGuard<'a, H> {
    fn new(handle: &'a H, buffer: HostBuffer) -> BufferGuard<'a, H> {
        BufferGuard {
            handle,
            buffer: Some(buffer),
        }
    }

    fn id(&self) -> u64 {
        self.buffer.as_ref().map(|b| b.id).unwrap_or(0)
    }

    fn bytes(&self) -> &[u8] {
        self.buffer.as_ref().map(|b| b.bytes()).unwrap_or(&[])
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self.buffer.as_mut() {
            Some(buffer) => buffer.bytes_mut(),
            None => &mut [],
        }
    }
}

impl<H: AccelHandle> Drop for BufferGuard<'_, H> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            if let Err(err) = self.handle.release_buffer(buffer.id) {
                // Failing to release on the error path must not mask
                // the error that got us here.
                tracing::warn!("buffer release failed on cleanup: {err}");
            }
        }
    }
}

fn fill_ascending_words(bytes: &mut [u8], len: usize) {
    for (i, chunk) in bytes[..len].chunks_exact_mut(8).enumerate() {
        chunk.copy_from_slice(&(i as u64).to_ne_bytes());
    }
}

fn count_pattern_mismatches(bytes: &[u8], len: usize) -> usize {
    let mut mismatches = 0;
    for (i, chunk) in bytes[..len].chunks_exact(8).enumerate() {
        let expected = (i as u64).to_ne_bytes();
        mismatches += chunk
            .iter()
            .zip(expected.iter())
            .filter(|(got, want)| got != want)
            .count();
    }
    mismatches
}

/// Run the full round-trip integrity and bandwidth test.
///
/// Fills a pinned buffer with the ascending word pattern, pushes it
/// through the engine host→device, zeroes the buffer, pulls the data
/// back device→host, and compares the result byte for byte. Bandwidth
/// is measured from the hardware counters after each leg; a measurement
/// below the minimum aborts the test before the next step.
///
/// `transfer_size` must be a multiple of the 64-byte line size and no
/// larger than the execution mode's buffer cap; both are caller
/// preconditions checked before any allocation or register traffic.
pub fn run_round_trip<H: AccelHandle>(
    session: &DmaSession<H>,
    transfer_size: usize,
    verbose: bool,
) -> Result<TransferReport, DmaError> {
    assert!(
        transfer_size % DMA_LINE_SIZE == 0,
        "transfer size {transfer_size} is not a multiple of the {DMA_LINE_SIZE} byte line"
    );
    let buffer_cap = if session.simulated() {
        MAX_TEST_BUFFER_SIZE_SIM
    } else {
        MAX_TEST_BUFFER_SIZE_HW
    };
    assert!(
        transfer_size <= buffer_cap,
        "transfer size {transfer_size} exceeds the {buffer_cap} byte buffer cap"
    );

    // Transfer length in 64-byte lines; exact because of the size
    // precondition above.
    let dma_len = (transfer_size / DMA_LINE_SIZE) as u32;
    tracing::info!("round trip: {transfer_size} bytes, dma_len = {dma_len} lines");

    // The allocation is always the full cap so the engine can never
    // run past the pinned region regardless of the requested size.
    let buffer = session.handle().allocate_buffer(buffer_cap)?;
    let mut buffer = BufferGuard::new(session.handle(), buffer);
    let iova = session.handle().io_address(buffer.id())?;

    fill_ascending_words(buffer.bytes_mut(), transfer_size);

    let h2d_timing = transfer(
        session,
        TransferMode::HostToDevice,
        iova,
        0,
        dma_len,
        verbose,
    )?;
    let h2d = measure_bandwidth(session, TransferMode::HostToDevice)?;

    // Zero the host side so the return leg can only be satisfied by
    // device-sourced data.
    buffer.bytes_mut().fill(0);

    let d2h_timing = transfer(
        session,
        TransferMode::DeviceToHost,
        0,
        iova,
        dma_len,
        verbose,
    )?;
    let d2h = measure_bandwidth(session, TransferMode::DeviceToHost)?;

    let mismatch_count = count_pattern_mismatches(buffer.bytes(), transfer_size);
    if mismatch_count == 0 {
        tracing::info!("round trip data verified, {transfer_size} bytes match");
    } else {
        tracing::error!("round trip data corrupt: {mismatch_count} byte mismatches");
    }

    Ok(TransferReport {
        bytes_compared: transfer_size,
        mismatch_count,
        h2d,
        d2h,
        h2d_apparent_gbps: h2d_timing.apparent_gbps,
        d2h_apparent_gbps: d2h_timing.apparent_gbps,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pattern_fill_and_compare_agree() {
        let mut bytes = vec![0u8; 512];
        fill_ascending_words(&mut bytes, 512);
        assert_eq!(count_pattern_mismatches(&bytes, 512), 0);

        // Corrupt one byte and a whole word.
        bytes[11] ^= 0xFF;
        bytes[64..72].fill(0xAA);
        let mismatches = count_pattern_mismatches(&bytes, 512);
        // Word 8 = 0x...08: one of the eight pattern bytes is 0x08,
        // the rest are zero, so 0xAA differs in all eight positions.
        assert_eq!(mismatches, 1 + 8);
    }

    #[test]
    fn compare_is_bounded_by_requested_size() {
        let mut bytes = vec![0u8; 256];
        fill_ascending_words(&mut bytes, 128);
        bytes[200] = 0xFF; // outside the compared prefix
        assert_eq!(count_pattern_mismatches(&bytes, 128), 0);
    }
}
