// SPDX-FileCopyrightText: © 2026 OFS Tools Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::MAX_LINE_THROUGHPUT_BYTES;

/// Width of each cycle-count field in a performance counter register.
const CYCLE_FIELD_BITS: u32 = 20;
const CYCLE_FIELD_MASK: u64 = (1 << CYCLE_FIELD_BITS) - 1;

/// Decoded performance counter register.
///
/// The hardware packs two 20-bit counts into one 64-bit word: bits 19:0
/// count cycles the channel moved data ("valid"), bits 39:20 count all
/// cycles in the measurement window. Upper bits are reserved and must
/// be ignored. Counts are cumulative over the engine's recent activity
/// window, not per transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerfSample {
    pub valid_cycles: u32,
    pub total_cycles: u32,
}

impl PerfSample {
    pub fn from_raw(raw: u64) -> PerfSample {
        PerfSample {
            valid_cycles: (raw & CYCLE_FIELD_MASK) as u32,
            total_cycles: ((raw >> CYCLE_FIELD_BITS) & CYCLE_FIELD_MASK) as u32,
        }
    }

    /// Pack counts back into the register layout. The inverse of
    /// [`PerfSample::from_raw`], used to synthesize counter values.
    pub fn to_raw(&self) -> u64 {
        (self.valid_cycles as u64 & CYCLE_FIELD_MASK)
            | ((self.total_cycles as u64 & CYCLE_FIELD_MASK) << CYCLE_FIELD_BITS)
    }

    /// Fraction of the window the channel was moving data, or `None`
    /// when the counter shows no cycle activity at all.
    pub fn uptime(&self) -> Option<f64> {
        if self.total_cycles == 0 {
            None
        } else {
            Some(self.valid_cycles as f64 / self.total_cycles as f64)
        }
    }

    /// Utilization-derived bandwidth in GB/s, `None` on an idle window.
    pub fn bandwidth_gbps(&self) -> Option<f64> {
        self.uptime()
            .map(|uptime| uptime * MAX_LINE_THROUGHPUT_BYTES / 1000.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fields_masked_to_20_bits() {
        // Reserved upper bits must never leak into the counts.
        let sample = PerfSample::from_raw(u64::MAX);
        assert_eq!(sample.valid_cycles, 0xF_FFFF);
        assert_eq!(sample.total_cycles, 0xF_FFFF);

        let sample = PerfSample::from_raw((0x12345 << 20) | 0x00042);
        assert_eq!(sample.valid_cycles, 0x42);
        assert_eq!(sample.total_cycles, 0x12345 & 0xF_FFFF);
    }

    #[test]
    fn raw_round_trip() {
        let sample = PerfSample {
            valid_cycles: 800,
            total_cycles: 1000,
        };
        assert_eq!(PerfSample::from_raw(sample.to_raw()), sample);
    }

    #[test]
    fn zero_window_has_no_bandwidth() {
        let sample = PerfSample::from_raw(0);
        assert_eq!(sample.uptime(), None);
        assert_eq!(sample.bandwidth_gbps(), None);
    }

    #[test]
    fn full_uptime_hits_line_rate() {
        let sample = PerfSample {
            valid_cycles: 1000,
            total_cycles: 1000,
        };
        let bw = sample.bandwidth_gbps().unwrap();
        assert!((bw - 25.6).abs() < 1e-9);
    }
}
