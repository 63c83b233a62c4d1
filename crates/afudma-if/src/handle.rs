// SPDX-FileCopyrightText: © 2026 OFS Tools Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::DeviceError;
use crate::session::MmioWindow;

/// A pinned host buffer the device can DMA into.
///
/// The mapping stays valid until the buffer id is passed back to
/// [`AccelHandle::release_buffer`]; the device side keeps referring to
/// the same pages through the address returned by
/// [`AccelHandle::io_address`].
pub struct HostBuffer {
    pub buffer: memmap2::MmapMut,
    pub id: u64,
    pub size: usize,
}

impl HostBuffer {
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }
}

/// Boundary to the accelerator-management layer.
///
/// Implementations own device discovery, the kernel interface, and
/// pinned-memory bookkeeping. The protocol layer only asks for four
/// things: a mapped (or unmappable) CSR window, 64-bit register access
/// by byte offset, pinned buffers with device-visible addresses, and
/// buffer release.
pub trait AccelHandle {
    /// Try to map the CSR window for direct loads and stores.
    ///
    /// `Ok(None)` is a legitimate answer: software simulations have no
    /// memory to map, and register access then degrades to the
    /// indirect `read_register64`/`write_register64` calls.
    fn map_register_window(&self) -> Result<Option<MmioWindow>, DeviceError>;

    fn read_register64(&self, bar: u32, offset: u64) -> Result<u64, DeviceError>;

    fn write_register64(&self, bar: u32, offset: u64, value: u64) -> Result<(), DeviceError>;

    /// Allocate a zero-initialized pinned buffer of `size` bytes.
    fn allocate_buffer(&self, size: usize) -> Result<HostBuffer, DeviceError>;

    /// Device-visible address (IOVA) of a previously allocated buffer.
    fn io_address(&self, buffer_id: u64) -> Result<u64, DeviceError>;

    fn release_buffer(&self, buffer_id: u64) -> Result<(), DeviceError>;
}
