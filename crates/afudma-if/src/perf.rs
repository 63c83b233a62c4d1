// SPDX-FileCopyrightText: © 2026 OFS Tools Contributors
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use serde::Serialize;

use afudma_core::{DmaCsr, PerfSample, TransferMode, MIN_BANDWIDTH_GBPS};

use crate::error::BandwidthError;
use crate::handle::AccelHandle;
use crate::session::DmaSession;

/// Which side of the engine a counter or a policy violation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Read,
    Write,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Read => write!(f, "read"),
            Direction::Write => write!(f, "write"),
        }
    }
}

/// Hardware-measured bandwidth of one transfer, both sides of the
/// engine, in GB/s.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LinkBandwidth {
    pub read_gbps: f64,
    pub write_gbps: f64,
}

fn side_bandwidth(sample: PerfSample, direction: Direction) -> Result<f64, BandwidthError> {
    let bandwidth = sample
        .bandwidth_gbps()
        .ok_or(BandwidthError::NoActivity { direction })?;

    if bandwidth < MIN_BANDWIDTH_GBPS {
        tracing::error!(
            "{direction} bandwidth {bandwidth:.3} GB/s does not meet the \
             {MIN_BANDWIDTH_GBPS} GB/s minimum"
        );
        return Err(BandwidthError::BelowMinimum {
            direction,
            measured_gbps: bandwidth,
        });
    }
    Ok(bandwidth)
}

/// Read both performance counters and derive the engine's bandwidth
/// for the transfer that just completed.
///
/// Counter windows with zero total cycles surface as
/// [`BandwidthError::NoActivity`], and any side below the minimum
/// surfaces as [`BandwidthError::BelowMinimum`]; neither ever comes
/// back as a number.
pub fn measure_bandwidth<H: AccelHandle>(
    session: &DmaSession<H>,
    mode: TransferMode,
) -> Result<LinkBandwidth, BandwidthError> {
    let read_sample = PerfSample::from_raw(session.read64(DmaCsr::RdSrcPerfCntr)?);
    let read_gbps = side_bandwidth(read_sample, Direction::Read)?;
    tracing::info!("afu reading {}: bw = {read_gbps:.3} GB/s", mode.read_side());

    let write_sample = PerfSample::from_raw(session.read64(DmaCsr::WrDestPerfCntr)?);
    let write_gbps = side_bandwidth(write_sample, Direction::Write)?;
    tracing::info!(
        "afu writing {}: bw = {write_gbps:.3} GB/s",
        mode.write_side()
    );

    Ok(LinkBandwidth {
        read_gbps,
        write_gbps,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn below_minimum_is_an_error_not_a_number() {
        // 20% uptime -> 5.12 GB/s, under the 8.2 floor.
        let sample = PerfSample {
            valid_cycles: 200,
            total_cycles: 1000,
        };
        match side_bandwidth(sample, Direction::Write) {
            Err(BandwidthError::BelowMinimum {
                direction: Direction::Write,
                measured_gbps,
            }) => assert!((measured_gbps - 5.12).abs() < 1e-9),
            other => panic!("expected BelowMinimum, got {other:?}"),
        }
    }

    #[test]
    fn zero_total_cycles_is_no_activity() {
        let sample = PerfSample {
            valid_cycles: 0,
            total_cycles: 0,
        };
        match side_bandwidth(sample, Direction::Read) {
            Err(BandwidthError::NoActivity {
                direction: Direction::Read,
            }) => {}
            other => panic!("expected NoActivity, got {other:?}"),
        }
    }

    #[test]
    fn healthy_sample_passes() {
        let sample = PerfSample {
            valid_cycles: 800,
            total_cycles: 1000,
        };
        let bw = side_bandwidth(sample, Direction::Read).unwrap();
        assert!((bw - 20.48).abs() < 1e-9);
    }
}
