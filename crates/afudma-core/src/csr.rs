// SPDX-FileCopyrightText: © 2026 OFS Tools Contributors
// SPDX-License-Identifier: Apache-2.0

/// Number of 64-bit CSR slots exposed by the DMA feature.
pub const CSR_COUNT: usize = 19;

/// CSRs are laid out as contiguous 64-bit words.
pub const CSR_STRIDE_BYTES: u64 = 8;

/// Low bit of [`DmaCsr::Status`]: set while a descriptor is in flight,
/// clear once the engine has drained its descriptor queue.
pub const STATUS_BUSY: u64 = 1 << 0;

/// Index map of the DMA feature's CSR window. All slots are 64 bits
/// wide at an 8-byte stride; the byte offset of a slot is `8 * index`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaCsr {
    /// Device feature header.
    Dfh = 0,
    GuidL = 1,
    GuidH = 2,
    Rsvd1 = 3,
    Rsvd2 = 4,
    /// Descriptor field: source address. The descriptor region starts
    /// here and runs through [`DmaCsr::DescriptorControl`].
    SrcAddr = 5,
    DestAddr = 6,
    Length = 7,
    DescriptorControl = 8,
    Status = 9,
    Control = 10,
    WrReFillLevel = 11,
    RespFillLevel = 12,
    WrReSeqNum = 13,
    Config1 = 14,
    Config2 = 15,
    TypeVersion = 16,
    RdSrcPerfCntr = 17,
    WrDestPerfCntr = 18,
}

impl DmaCsr {
    /// Every slot, in register-map order. Used by the CSR dump.
    pub const ALL: [DmaCsr; CSR_COUNT] = [
        DmaCsr::Dfh,
        DmaCsr::GuidL,
        DmaCsr::GuidH,
        DmaCsr::Rsvd1,
        DmaCsr::Rsvd2,
        DmaCsr::SrcAddr,
        DmaCsr::DestAddr,
        DmaCsr::Length,
        DmaCsr::DescriptorControl,
        DmaCsr::Status,
        DmaCsr::Control,
        DmaCsr::WrReFillLevel,
        DmaCsr::RespFillLevel,
        DmaCsr::WrReSeqNum,
        DmaCsr::Config1,
        DmaCsr::Config2,
        DmaCsr::TypeVersion,
        DmaCsr::RdSrcPerfCntr,
        DmaCsr::WrDestPerfCntr,
    ];

    pub fn from_index(index: usize) -> Option<DmaCsr> {
        Self::ALL.get(index).copied()
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Byte offset of this slot inside the mapped CSR window.
    pub fn byte_offset(&self) -> u64 {
        *self as u64 * CSR_STRIDE_BYTES
    }

    /// Register name as it appears in the hardware spec, for dumps.
    pub fn name(&self) -> &'static str {
        match self {
            DmaCsr::Dfh => "DMA_DFH",
            DmaCsr::GuidL => "DMA_GUID_L",
            DmaCsr::GuidH => "DMA_GUID_H",
            DmaCsr::Rsvd1 => "DMA_RSVD_1",
            DmaCsr::Rsvd2 => "DMA_RSVD_2",
            DmaCsr::SrcAddr => "DMA_SRC_ADDR",
            DmaCsr::DestAddr => "DMA_DEST_ADDR",
            DmaCsr::Length => "DMA_LENGTH",
            DmaCsr::DescriptorControl => "DMA_DESCRIPTOR_CONTROL",
            DmaCsr::Status => "DMA_STATUS",
            DmaCsr::Control => "DMA_CONTROL",
            DmaCsr::WrReFillLevel => "DMA_WR_RE_FILL_LEVEL",
            DmaCsr::RespFillLevel => "DMA_RESP_FILL_LEVEL",
            DmaCsr::WrReSeqNum => "DMA_WR_RE_SEQ_NUM",
            DmaCsr::Config1 => "DMA_CONFIG_1",
            DmaCsr::Config2 => "DMA_CONFIG_2",
            DmaCsr::TypeVersion => "DMA_TYPE_VERSION",
            DmaCsr::RdSrcPerfCntr => "RD_SRC_PERF_CNTR",
            DmaCsr::WrDestPerfCntr => "WR_DEST_PERF_CNTR",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn indices_are_contiguous() {
        for (i, csr) in DmaCsr::ALL.iter().enumerate() {
            assert_eq!(csr.index(), i);
            assert_eq!(csr.byte_offset(), i as u64 * 8);
            assert_eq!(DmaCsr::from_index(i), Some(*csr));
        }
        assert_eq!(DmaCsr::from_index(CSR_COUNT), None);
    }

    #[test]
    fn descriptor_region_is_contiguous() {
        // The driver writes the four descriptor fields at consecutive
        // slots starting at SRC_ADDR; the map must keep them adjacent.
        assert_eq!(DmaCsr::DestAddr.index(), DmaCsr::SrcAddr.index() + 1);
        assert_eq!(DmaCsr::Length.index(), DmaCsr::SrcAddr.index() + 2);
        assert_eq!(
            DmaCsr::DescriptorControl.index(),
            DmaCsr::SrcAddr.index() + 3
        );
    }
}
