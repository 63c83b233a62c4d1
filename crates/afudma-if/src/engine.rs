// SPDX-FileCopyrightText: © 2026 OFS Tools Contributors
// SPDX-License-Identifier: Apache-2.0

use std::time::{Duration, Instant};

use afudma_core::{Descriptor, DmaCsr, TransferMode, DMA_LINE_SIZE, STATUS_BUSY};

use crate::error::{DeviceError, TransferError};
use crate::handle::AccelHandle;
use crate::session::DmaSession;

/// Pacing of completion polls against a simulated target, where every
/// register read crosses into the simulator and a tight spin would be
/// prohibitively slow and noisy.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long a submitted descriptor may stay busy before the transfer
/// is declared stuck.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Wall-clock view of one completed transfer. The apparent bandwidth
/// includes all software overhead and is diagnostic only; pass/fail
/// decisions use the hardware performance counters instead.
#[derive(Debug, Clone, Copy)]
pub struct TransferTiming {
    pub elapsed: Duration,
    pub apparent_gbps: f64,
}

/// Program the four descriptor fields at the descriptor CSR region.
///
/// The region is write-sensitive: the engine latches fields in order,
/// so the words must land as four sequential 64-bit writes.
fn send_descriptor<H: AccelHandle>(
    session: &DmaSession<H>,
    desc: &Descriptor,
) -> Result<(), DeviceError> {
    const DESC_REGION: [DmaCsr; 4] = [
        DmaCsr::SrcAddr,
        DmaCsr::DestAddr,
        DmaCsr::Length,
        DmaCsr::DescriptorControl,
    ];

    for (csr, word) in DESC_REGION.iter().zip(desc.words()) {
        tracing::trace!("writing {word:#x} to {}", csr.name());
        session.write64(*csr, word)?;
    }
    Ok(())
}

/// Run one DMA transfer to completion.
///
/// Builds the descriptor, submits it with the double-write protocol
/// (the first pass primes the engine pipeline, the second triggers
/// execution), then polls the status register until the busy bit
/// clears. The engine must be seen busy at least once: a submission
/// that never shows busy means the descriptor was dropped, which is
/// reported as a protocol violation rather than instant success.
pub fn transfer<H: AccelHandle>(
    session: &DmaSession<H>,
    mode: TransferMode,
    src: u64,
    dest: u64,
    len_lines: u32,
    verbose: bool,
) -> Result<TransferTiming, TransferError> {
    let desc = Descriptor::new(mode, src, dest, len_lines);

    if verbose {
        tracing::debug!(
            src = format_args!("{:#x}", desc.src_address),
            dest = format_args!("{:#x}", desc.dest_address),
            len_lines = desc.len,
            control = format_args!("{:#010x}", desc.control.into_bits()),
            "submitting {mode} descriptor"
        );
    }

    let start = Instant::now();
    for _ in 0..2 {
        send_descriptor(session, &desc)?;
    }

    let mut saw_busy = false;
    loop {
        let status = session.read64(DmaCsr::Status)?;
        if status & STATUS_BUSY == 0 {
            break;
        }
        saw_busy = true;

        if start.elapsed() > session.poll_timeout() {
            return Err(TransferError::Timeout {
                timeout: session.poll_timeout(),
            });
        }

        if session.simulated() {
            std::thread::sleep(session.poll_interval());
            if verbose {
                session.dump_csrs()?;
            }
        }
    }

    if !saw_busy {
        return Err(TransferError::ProtocolViolation);
    }

    let elapsed = start.elapsed();
    let bytes = len_lines as u64 * DMA_LINE_SIZE as u64;
    let apparent_gbps = bytes as f64 / elapsed.as_secs_f64() / 1e9;
    tracing::info!(
        "{mode} transfer of {bytes} bytes complete in {elapsed:?} \
         (apparent bandwidth {apparent_gbps:.5} GB/s)"
    );

    Ok(TransferTiming {
        elapsed,
        apparent_gbps,
    })
}
