// SPDX-FileCopyrightText: © 2026 OFS Tools Contributors
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use afudma_core::{DmaCsr, CSR_COUNT, CSR_STRIDE_BYTES};

use crate::error::DeviceError;
use crate::handle::AccelHandle;

/// How a session reaches the CSR space. Decided once when the session
/// is opened and never revisited, so every call site takes the same
/// path for the life of the device connection.
pub enum RegisterBackend {
    /// CSR window is mapped into our address space; registers are
    /// volatile 64-bit loads and stores. Significantly faster.
    DirectMapped(MmioWindow),
    /// No mapping available (e.g. software simulation); every access
    /// is a call through the device-management layer.
    IndirectCall,
}

/// A CSR window mapped for direct access.
///
/// Wraps the mapping handed back by the device-management layer and
/// exposes it as an array of 64-bit slots. All access is volatile and
/// 8-byte aligned; nothing is cached or reordered across calls.
pub struct MmioWindow {
    mapping: memmap2::MmapMut,
}

impl MmioWindow {
    pub fn new(mapping: memmap2::MmapMut) -> Result<MmioWindow, DeviceError> {
        let expected = CSR_COUNT * CSR_STRIDE_BYTES as usize;
        if mapping.len() < expected {
            return Err(DeviceError::WindowTooSmall {
                size: mapping.len(),
                expected,
            });
        }
        Ok(MmioWindow { mapping })
    }

    #[inline]
    fn slot(&self, index: usize) -> *mut u64 {
        debug_assert!(index < self.mapping.len() / CSR_STRIDE_BYTES as usize);
        // The mmap is page aligned, so 8-byte slot alignment holds.
        unsafe { (self.mapping.as_ptr() as *mut u64).add(index) }
    }

    #[inline]
    pub fn read64(&self, index: usize) -> u64 {
        unsafe { self.slot(index).read_volatile() }
    }

    #[inline]
    pub fn write64(&self, index: usize, value: u64) {
        unsafe { self.slot(index).write_volatile(value) }
    }
}

/// AFU identity registers, read once before a test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AfuIdentity {
    pub dfh: u64,
    pub guid: u128,
    pub type_version: u64,
}

/// One connection to the DMA AFU.
///
/// Owns the device handle, the register backend, and the polling
/// parameters. Replaces what would otherwise be process-wide mutable
/// state, so several sessions to different devices can coexist.
pub struct DmaSession<H> {
    handle: H,
    backend: RegisterBackend,
    simulated: bool,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl<H: AccelHandle> DmaSession<H> {
    /// Open a session, choosing the register backend once up front.
    ///
    /// `simulated` marks a slow software target: completion polling is
    /// paced instead of spinning, and verbose polls dump the CSRs.
    pub fn open(handle: H, simulated: bool) -> Result<DmaSession<H>, DeviceError> {
        let backend = match handle.map_register_window()? {
            Some(window) => RegisterBackend::DirectMapped(window),
            None => RegisterBackend::IndirectCall,
        };

        match &backend {
            RegisterBackend::DirectMapped(_) => {
                tracing::debug!("csr window mapped, using direct register access")
            }
            RegisterBackend::IndirectCall => {
                tracing::debug!("no csr mapping, using indirect register access")
            }
        }

        Ok(DmaSession {
            handle,
            backend,
            simulated,
            poll_interval: crate::engine::DEFAULT_POLL_INTERVAL,
            poll_timeout: crate::engine::DEFAULT_POLL_TIMEOUT,
        })
    }

    /// Override the pacing of simulated-mode completion polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> DmaSession<H> {
        self.poll_interval = interval;
        self
    }

    /// Override how long a transfer may stay busy before it is
    /// declared stuck.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> DmaSession<H> {
        self.poll_timeout = timeout;
        self
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub fn simulated(&self) -> bool {
        self.simulated
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    pub fn read64(&self, csr: DmaCsr) -> Result<u64, DeviceError> {
        match &self.backend {
            RegisterBackend::DirectMapped(window) => Ok(window.read64(csr.index())),
            RegisterBackend::IndirectCall => self.handle.read_register64(0, csr.byte_offset()),
        }
    }

    pub fn write64(&self, csr: DmaCsr, value: u64) -> Result<(), DeviceError> {
        match &self.backend {
            RegisterBackend::DirectMapped(window) => {
                window.write64(csr.index(), value);
                Ok(())
            }
            RegisterBackend::IndirectCall => {
                self.handle.write_register64(0, csr.byte_offset(), value)
            }
        }
    }

    /// Read DFH, GUID and type/version so the log records which AFU
    /// the test actually talked to.
    pub fn probe(&self) -> Result<AfuIdentity, DeviceError> {
        let dfh = self.read64(DmaCsr::Dfh)?;
        let guid_l = self.read64(DmaCsr::GuidL)?;
        let guid_h = self.read64(DmaCsr::GuidH)?;
        let type_version = self.read64(DmaCsr::TypeVersion)?;

        let identity = AfuIdentity {
            dfh,
            guid: ((guid_h as u128) << 64) | guid_l as u128,
            type_version,
        };
        tracing::info!(
            dfh = format_args!("{dfh:#018x}"),
            guid = format_args!("{:#034x}", identity.guid),
            type_version = format_args!("{type_version:#x}"),
            "dma afu detected"
        );
        Ok(identity)
    }

    /// Dump every CSR at debug level. Used by verbose simulated-mode
    /// polling and the CLI.
    pub fn dump_csrs(&self) -> Result<(), DeviceError> {
        for csr in DmaCsr::ALL {
            let value = self.read64(csr)?;
            tracing::debug!("{:<22} = {value:#018x}", csr.name());
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn window_round_trips_slots() {
        let mapping = memmap2::MmapMut::map_anon(4096).unwrap();
        let window = MmioWindow::new(mapping).unwrap();

        window.write64(0, 0x1122_3344_5566_7788);
        window.write64(18, u64::MAX);
        assert_eq!(window.read64(0), 0x1122_3344_5566_7788);
        assert_eq!(window.read64(18), u64::MAX);
        assert_eq!(window.read64(1), 0);
    }

    #[test]
    fn undersized_window_rejected() {
        let mapping = memmap2::MmapMut::map_anon(64).unwrap();
        match MmioWindow::new(mapping) {
            Err(DeviceError::WindowTooSmall { size: 64, .. }) => {}
            Err(other) => panic!("expected WindowTooSmall, got {other}"),
            Ok(_) => panic!("accepted a window smaller than the register file"),
        }
    }
}
