// SPDX-FileCopyrightText: © 2026 OFS Tools Contributors
// SPDX-License-Identifier: Apache-2.0

//! Behavioral model of the DMA AFU.
//!
//! Implements [`AccelHandle`] against an in-memory register file, a
//! device-DDR model, and an engine that honors the same descriptor
//! protocol as the hardware: descriptors latch on the second write of
//! the control word, the status register reads busy for a configurable
//! number of polls before completion, and the performance counters are
//! synthesized from a configurable utilization fraction.
//!
//! Like the simulator it stands in for, the model does not expose a
//! mappable CSR window; sessions opened on a [`SimAfu`] always use the
//! indirect register-access path.

use std::collections::HashMap;
use std::sync::Mutex;

use afudma_core::{
    DescriptorControl, DmaCsr, PerfSample, TransferMode, CSR_COUNT, CSR_STRIDE_BYTES,
    DMA_LINE_SIZE, MAX_TEST_BUFFER_SIZE_SIM, STATUS_BUSY,
};
use afudma_if::{AccelHandle, DeviceError, HostBuffer, MmioWindow};

/// Identity registers the model reports.
pub const SIM_DFH: u64 = 0x1000_0100_0000_0000;
pub const SIM_GUID_L: u64 = 0xa9149a85_bb84b92d;
pub const SIM_GUID_H: u64 = 0x765c84bc_571c1e2c;
pub const SIM_TYPE_VERSION: u64 = 0x0000_0001;

/// Device-DDR model size: double the largest test buffer so transfers
/// to a nonzero DDR offset stay in range.
const SIM_DDR_SIZE: usize = 2 * MAX_TEST_BUFFER_SIZE_SIM;

/// First IOVA handed out; buffers are spaced 4 MiB apart so every
/// allocation stays 64-byte aligned and within 32-bit addressing.
const IOVA_BASE: u64 = 0x1000_0000;
const IOVA_SPACING: u64 = 0x40_0000;

/// Synthesized measurement window, in engine cycles. Fits comfortably
/// in the 20-bit counter fields.
const PERF_WINDOW_CYCLES: u32 = 1000;

struct SimBuffer {
    /// Raw view of the pages backing the caller's `HostBuffer`.
    /// Models the device holding a pinned physical address: valid
    /// until `release_buffer`, which is the contract `AccelHandle`
    /// documents for the mapping itself.
    ptr: *mut u8,
    len: usize,
    iova: u64,
}

struct SimState {
    csrs: [u64; CSR_COUNT],
    ddr: Vec<u8>,
    buffers: HashMap<u64, SimBuffer>,
    next_buffer_id: u64,
    /// First descriptor write arms the pipeline; the second triggers.
    armed: bool,
    busy_polls_left: u32,
    // knobs
    busy_polls: u32,
    read_uptime: f64,
    write_uptime: f64,
    hang: bool,
    instant_completion: bool,
}

/// The simulated accelerator.
pub struct SimAfu {
    inner: Mutex<SimState>,
}

impl Default for SimAfu {
    fn default() -> Self {
        Self::new()
    }
}

impl SimAfu {
    pub fn new() -> SimAfu {
        let mut csrs = [0u64; CSR_COUNT];
        csrs[DmaCsr::Dfh.index()] = SIM_DFH;
        csrs[DmaCsr::GuidL.index()] = SIM_GUID_L;
        csrs[DmaCsr::GuidH.index()] = SIM_GUID_H;
        csrs[DmaCsr::TypeVersion.index()] = SIM_TYPE_VERSION;

        SimAfu {
            inner: Mutex::new(SimState {
                csrs,
                ddr: vec![0u8; SIM_DDR_SIZE],
                buffers: HashMap::new(),
                next_buffer_id: 0,
                armed: false,
                busy_polls_left: 0,
                busy_polls: 2,
                read_uptime: 0.8,
                write_uptime: 0.8,
                hang: false,
                instant_completion: false,
            }),
        }
    }

    /// How many status polls report busy before a transfer completes.
    pub fn with_busy_polls(self, polls: u32) -> SimAfu {
        self.inner.lock().unwrap().busy_polls = polls;
        self
    }

    /// Utilization fractions used to synthesize the performance
    /// counters at completion.
    pub fn with_uptime(self, read: f64, write: f64) -> SimAfu {
        {
            let mut state = self.inner.lock().unwrap();
            state.read_uptime = read;
            state.write_uptime = write;
        }
        self
    }

    /// Model a wedged engine: the busy bit never clears.
    pub fn with_hung_engine(self) -> SimAfu {
        self.inner.lock().unwrap().hang = true;
        self
    }

    /// Model a protocol bug where the engine never raises busy.
    pub fn with_instant_completion(self) -> SimAfu {
        self.inner.lock().unwrap().instant_completion = true;
        self
    }

    /// Number of pinned buffers not yet released. Test hook.
    pub fn live_buffers(&self) -> usize {
        self.inner.lock().unwrap().buffers.len()
    }
}

impl SimState {
    fn csr_index(offset: u64) -> Result<usize, std::io::Error> {
        let index = (offset / CSR_STRIDE_BYTES) as usize;
        if offset % CSR_STRIDE_BYTES != 0 || index >= CSR_COUNT {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("byte offset {offset:#x} is outside the CSR window"),
            ));
        }
        Ok(index)
    }

    fn host_region(&mut self, addr: u64, len: usize) -> Result<&mut [u8], std::io::Error> {
        for buffer in self.buffers.values() {
            let end = buffer.iova + buffer.len as u64;
            if addr >= buffer.iova && addr + len as u64 <= end {
                let start = (addr - buffer.iova) as usize;
                // SAFETY: the pages are pinned until release_buffer;
                // the engine is the only writer while a descriptor is
                // in flight.
                let bytes = unsafe { std::slice::from_raw_parts_mut(buffer.ptr, buffer.len) };
                return Ok(&mut bytes[start..start + len]);
            }
        }
        Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("no pinned buffer covers iova {addr:#x}+{len:#x}"),
        ))
    }

    /// Execute the latched descriptor: move the data now, then let the
    /// status register play out the busy window.
    fn trigger(&mut self) -> Result<(), std::io::Error> {
        let src = self.csrs[DmaCsr::SrcAddr.index()];
        let dest = self.csrs[DmaCsr::DestAddr.index()];
        let len_lines = self.csrs[DmaCsr::Length.index()] as usize;
        let control = DescriptorControl::from_bits(self.csrs[DmaCsr::DescriptorControl.index()] as u32);
        let bytes = len_lines * DMA_LINE_SIZE;

        let mode = TransferMode::from_bits(control.mode()).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("descriptor control {:#x} has no transfer mode", control.into_bits()),
            )
        })?;

        let ddr_range = |addr: u64| -> Result<std::ops::Range<usize>, std::io::Error> {
            let start = addr as usize;
            if start + bytes > SIM_DDR_SIZE {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("ddr range {addr:#x}+{bytes:#x} out of bounds"),
                ));
            }
            Ok(start..start + bytes)
        };

        tracing::debug!("sim engine: {mode}, src {src:#x}, dest {dest:#x}, {bytes} bytes");

        match mode {
            TransferMode::HostToDevice => {
                let range = ddr_range(dest)?;
                let host = self.host_region(src, bytes)?;
                let data = host.to_vec();
                self.ddr[range].copy_from_slice(&data);
            }
            TransferMode::DeviceToHost => {
                let range = ddr_range(src)?;
                let data = self.ddr[range].to_vec();
                self.host_region(dest, bytes)?.copy_from_slice(&data);
            }
            TransferMode::DeviceToDevice => {
                let src_range = ddr_range(src)?;
                let dest_range = ddr_range(dest)?;
                let data = self.ddr[src_range].to_vec();
                self.ddr[dest_range].copy_from_slice(&data);
            }
        }

        // Completion bookkeeping: sequence number, perf counters, busy.
        self.csrs[DmaCsr::WrReSeqNum.index()] += 1;
        self.csrs[DmaCsr::RdSrcPerfCntr.index()] = synth_counter(self.read_uptime);
        self.csrs[DmaCsr::WrDestPerfCntr.index()] = synth_counter(self.write_uptime);

        if !self.instant_completion {
            self.csrs[DmaCsr::Status.index()] |= STATUS_BUSY;
            self.busy_polls_left = self.busy_polls.max(1);
        }

        Ok(())
    }
}

fn synth_counter(uptime: f64) -> u64 {
    // Zero uptime models counters that never latched a window at all.
    if uptime <= 0.0 {
        return 0;
    }
    let total = PERF_WINDOW_CYCLES;
    let valid = (uptime * total as f64) as u32;
    PerfSample {
        valid_cycles: valid,
        total_cycles: total,
    }
    .to_raw()
}

impl AccelHandle for SimAfu {
    fn map_register_window(&self) -> Result<Option<MmioWindow>, DeviceError> {
        // Simulators have no MMIO to hand out.
        Ok(None)
    }

    fn read_register64(&self, _bar: u32, offset: u64) -> Result<u64, DeviceError> {
        let mut state = self.inner.lock().unwrap();
        let index =
            SimState::csr_index(offset).map_err(|source| DeviceError::ReadFailed { offset, source })?;

        if index == DmaCsr::Status.index() && state.csrs[index] & STATUS_BUSY != 0 && !state.hang {
            if state.busy_polls_left > 0 {
                state.busy_polls_left -= 1;
            } else {
                state.csrs[index] &= !STATUS_BUSY;
            }
        }

        Ok(state.csrs[index])
    }

    fn write_register64(&self, _bar: u32, offset: u64, value: u64) -> Result<(), DeviceError> {
        let mut state = self.inner.lock().unwrap();
        let index =
            SimState::csr_index(offset).map_err(|source| DeviceError::WriteFailed { offset, source })?;

        state.csrs[index] = value;

        if index == DmaCsr::DescriptorControl.index()
            && DescriptorControl::from_bits(value as u32).go()
        {
            if state.armed {
                state.armed = false;
                state
                    .trigger()
                    .map_err(|source| DeviceError::WriteFailed { offset, source })?;
            } else {
                state.armed = true;
            }
        }

        Ok(())
    }

    fn allocate_buffer(&self, size: usize) -> Result<HostBuffer, DeviceError> {
        let mut state = self.inner.lock().unwrap();
        let mut mapping = memmap2::MmapMut::map_anon(size)
            .map_err(|source| DeviceError::BufferAllocationFailed { size, source })?;

        let id = state.next_buffer_id;
        state.next_buffer_id += 1;
        state.buffers.insert(
            id,
            SimBuffer {
                ptr: mapping.as_mut_ptr(),
                len: size,
                iova: IOVA_BASE + id * IOVA_SPACING,
            },
        );

        Ok(HostBuffer {
            buffer: mapping,
            id,
            size,
        })
    }

    fn io_address(&self, buffer_id: u64) -> Result<u64, DeviceError> {
        let state = self.inner.lock().unwrap();
        state
            .buffers
            .get(&buffer_id)
            .map(|buffer| buffer.iova)
            .ok_or(DeviceError::NoIoAddress { id: buffer_id })
    }

    fn release_buffer(&self, buffer_id: u64) -> Result<(), DeviceError> {
        let mut state = self.inner.lock().unwrap();
        state
            .buffers
            .remove(&buffer_id)
            .map(|_| ())
            .ok_or_else(|| DeviceError::BufferReleaseFailed {
                id: buffer_id,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "buffer id was never allocated or already released",
                ),
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn write_descriptor(sim: &SimAfu, control: u64) {
        sim.write_register64(0, DmaCsr::SrcAddr.byte_offset(), 0)
            .unwrap();
        sim.write_register64(0, DmaCsr::DestAddr.byte_offset(), 0)
            .unwrap();
        sim.write_register64(0, DmaCsr::Length.byte_offset(), 1)
            .unwrap();
        sim.write_register64(0, DmaCsr::DescriptorControl.byte_offset(), control)
            .unwrap();
    }

    // ddr-to-ddr descriptor, mode bits 27:26 = 3, valid bit set
    const DDR_COPY_CONTROL: u64 = 0x8000_0000 | (3 << 26);

    #[test]
    fn single_descriptor_write_does_not_start_the_engine() {
        let sim = SimAfu::new();
        write_descriptor(&sim, DDR_COPY_CONTROL);

        let status = sim
            .read_register64(0, DmaCsr::Status.byte_offset())
            .unwrap();
        assert_eq!(status & STATUS_BUSY, 0, "engine started on a primed-only descriptor");
    }

    #[test]
    fn second_descriptor_write_triggers_and_busy_clears_after_polls() {
        let sim = SimAfu::new().with_busy_polls(2);
        write_descriptor(&sim, DDR_COPY_CONTROL);
        write_descriptor(&sim, DDR_COPY_CONTROL);

        let status_offset = DmaCsr::Status.byte_offset();
        assert_eq!(
            sim.read_register64(0, status_offset).unwrap() & STATUS_BUSY,
            STATUS_BUSY
        );
        assert_eq!(
            sim.read_register64(0, status_offset).unwrap() & STATUS_BUSY,
            STATUS_BUSY
        );
        assert_eq!(sim.read_register64(0, status_offset).unwrap() & STATUS_BUSY, 0);

        let seq = sim
            .read_register64(0, DmaCsr::WrReSeqNum.byte_offset())
            .unwrap();
        assert_eq!(seq, 1);
    }

    #[test]
    fn hung_engine_never_clears_busy() {
        let sim = SimAfu::new().with_hung_engine();
        write_descriptor(&sim, DDR_COPY_CONTROL);
        write_descriptor(&sim, DDR_COPY_CONTROL);

        let status_offset = DmaCsr::Status.byte_offset();
        for _ in 0..32 {
            assert_eq!(
                sim.read_register64(0, status_offset).unwrap() & STATUS_BUSY,
                STATUS_BUSY
            );
        }
    }

    #[test]
    fn buffers_have_stable_io_addresses() {
        let sim = SimAfu::new();
        let a = sim.allocate_buffer(4096).unwrap();
        let b = sim.allocate_buffer(4096).unwrap();

        let iova_a = sim.io_address(a.id).unwrap();
        let iova_b = sim.io_address(b.id).unwrap();
        assert_ne!(iova_a, iova_b);
        assert_eq!(iova_a % DMA_LINE_SIZE as u64, 0);

        sim.release_buffer(a.id).unwrap();
        assert!(sim.io_address(a.id).is_err());
        assert!(sim.release_buffer(a.id).is_err());
        sim.release_buffer(b.id).unwrap();
        assert_eq!(sim.live_buffers(), 0);
    }

    #[test]
    fn out_of_window_register_access_fails() {
        let sim = SimAfu::new();
        assert!(sim.read_register64(0, 8 * CSR_COUNT as u64).is_err());
        assert!(sim.write_register64(0, 12, 0).is_err(), "unaligned offset");
    }
}
