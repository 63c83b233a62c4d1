// SPDX-FileCopyrightText: © 2026 OFS Tools Contributors
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

use crate::DMA_LINE_SIZE;

/// Current hardware generation only decodes 32 address bits; anything
/// above them is dropped before the descriptor is programmed.
pub const ADDR_MASK_32BIT: u64 = 0xFFFF_FFFF;

/// Position of the transfer-mode field inside the descriptor control
/// word (bits 27:26).
pub const MODE_SHIFT: u32 = 26;

/// Direction of a DMA transfer, as encoded in the descriptor control
/// word. The hardware reserves the value 0 for standby, so the enum
/// starts at 1.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    HostToDevice = 0x1,
    DeviceToHost = 0x2,
    DeviceToDevice = 0x3,
}

impl TransferMode {
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    pub fn from_bits(value: u8) -> Option<TransferMode> {
        match value {
            0x1 => Some(TransferMode::HostToDevice),
            0x2 => Some(TransferMode::DeviceToHost),
            0x3 => Some(TransferMode::DeviceToDevice),
            _ => None,
        }
    }

    pub fn is_host_to_device(&self) -> bool {
        matches!(self, TransferMode::HostToDevice)
    }

    pub fn is_device_to_host(&self) -> bool {
        matches!(self, TransferMode::DeviceToHost)
    }

    /// Memory the engine reads from in this mode, for log labels.
    pub fn read_side(&self) -> &'static str {
        match self {
            TransferMode::HostToDevice => "host",
            TransferMode::DeviceToHost | TransferMode::DeviceToDevice => "ddr",
        }
    }

    /// Memory the engine writes to in this mode, for log labels.
    pub fn write_side(&self) -> &'static str {
        match self {
            TransferMode::DeviceToHost => "host",
            TransferMode::HostToDevice | TransferMode::DeviceToDevice => "ddr",
        }
    }
}

impl FromStr for TransferMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host-to-device" => Ok(TransferMode::HostToDevice),
            "device-to-host" => Ok(TransferMode::DeviceToHost),
            "device-to-device" => Ok(TransferMode::DeviceToDevice),
            err => Err(err.to_string()),
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::HostToDevice => write!(f, "host-to-device"),
            TransferMode::DeviceToHost => write!(f, "device-to-host"),
            TransferMode::DeviceToDevice => write!(f, "device-to-device"),
        }
    }
}

/// Descriptor control word. Bit 31 marks the descriptor valid; the
/// engine latches the whole descriptor when it sees it set.
#[bitfield_struct::bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct DescriptorControl {
    #[bits(26)]
    reserved_lo: u32,
    #[bits(2)]
    pub mode: u8,
    #[bits(3)]
    reserved_hi: u8,
    pub go: bool,
}

/// One transfer descriptor, in the exact field order the hardware
/// expects at the descriptor CSR region: source, destination, length
/// in lines, control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub src_address: u64,
    pub dest_address: u64,
    pub len: u32,
    pub control: DescriptorControl,
}

impl Descriptor {
    /// Build a descriptor for `len_lines` lines from `src` to `dest`.
    ///
    /// Both addresses must be 64-byte aligned; passing a misaligned
    /// address is a caller bug and panics before anything touches the
    /// hardware.
    pub fn new(mode: TransferMode, src: u64, dest: u64, len_lines: u32) -> Descriptor {
        assert!(
            src % DMA_LINE_SIZE as u64 == 0,
            "dma source address {src:#x} is not {DMA_LINE_SIZE}-byte aligned"
        );
        assert!(
            dest % DMA_LINE_SIZE as u64 == 0,
            "dma destination address {dest:#x} is not {DMA_LINE_SIZE}-byte aligned"
        );

        Descriptor {
            src_address: src & ADDR_MASK_32BIT,
            dest_address: dest & ADDR_MASK_32BIT,
            len: len_lines,
            control: DescriptorControl::new()
                .with_mode(mode.into_bits() & 0x3)
                .with_go(true),
        }
    }

    pub fn mode(&self) -> Option<TransferMode> {
        TransferMode::from_bits(self.control.mode())
    }

    /// The four 64-bit words to program, in submission order.
    pub fn words(&self) -> [u64; 4] {
        [
            self.src_address,
            self.dest_address,
            self.len as u64,
            self.control.into_bits() as u64,
        ]
    }
}
