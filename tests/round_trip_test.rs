// SPDX-FileCopyrightText: © 2026 OFS Tools Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end round-trip tests against the simulated AFU.

use std::time::Duration;

use serial_test::serial;

use afudma::{
    run_round_trip, BandwidthError, Direction, DmaError, DmaSession, SimAfu, TransferError,
    MAX_TEST_BUFFER_SIZE_SIM,
};

fn open_session(sim: SimAfu) -> DmaSession<SimAfu> {
    DmaSession::open(sim, true)
        .unwrap()
        .with_poll_interval(Duration::from_millis(1))
        .with_poll_timeout(Duration::from_secs(2))
}

#[test]
fn full_buffer_round_trip_passes() {
    let session = open_session(SimAfu::new());
    let report = run_round_trip(&session, MAX_TEST_BUFFER_SIZE_SIM, false).unwrap();

    assert!(report.passed());
    assert_eq!(report.bytes_compared, MAX_TEST_BUFFER_SIZE_SIM);
    assert_eq!(report.mismatch_count, 0);

    // Default sim utilization is 80% of the 25.6 GB/s line rate.
    assert!((report.h2d.read_gbps - 20.48).abs() < 1e-9);
    assert!((report.h2d.write_gbps - 20.48).abs() < 1e-9);
    assert!((report.d2h.read_gbps - 20.48).abs() < 1e-9);
    assert!((report.d2h.write_gbps - 20.48).abs() < 1e-9);

    // The pinned buffer must be handed back after the run.
    assert_eq!(session.handle().live_buffers(), 0);
}

#[test]
fn single_line_round_trip_passes() {
    let session = open_session(SimAfu::new());
    let report = run_round_trip(&session, 64, false).unwrap();

    assert!(report.passed());
    assert_eq!(report.bytes_compared, 64);
}

#[test]
#[should_panic(expected = "not a multiple")]
fn misaligned_transfer_size_rejected_before_any_traffic() {
    let session = open_session(SimAfu::new());
    let _ = run_round_trip(&session, 100, false);
}

#[test]
#[should_panic(expected = "exceeds")]
fn oversized_transfer_rejected() {
    let session = open_session(SimAfu::new());
    let _ = run_round_trip(&session, MAX_TEST_BUFFER_SIZE_SIM + 64, false);
}

#[test]
fn low_read_bandwidth_aborts_and_releases_the_buffer() {
    // 20% uptime reads back as 5.12 GB/s, under the 8.2 GB/s floor.
    let session = open_session(SimAfu::new().with_uptime(0.2, 0.8));

    match run_round_trip(&session, 4096, false) {
        Err(DmaError::Bandwidth(BandwidthError::BelowMinimum {
            direction: Direction::Read,
            measured_gbps,
        })) => assert!((measured_gbps - 5.12).abs() < 1e-9),
        other => panic!("expected a below-minimum abort, got {other:?}"),
    }

    assert_eq!(session.handle().live_buffers(), 0);
}

#[test]
fn idle_counters_abort_as_no_activity() {
    let session = open_session(SimAfu::new().with_uptime(0.0, 0.0));

    match run_round_trip(&session, 4096, false) {
        Err(DmaError::Bandwidth(BandwidthError::NoActivity { .. })) => {}
        other => panic!("expected a no-activity abort, got {other:?}"),
    }
}

#[test]
#[serial]
fn stuck_engine_times_out() {
    let session = open_session(SimAfu::new().with_hung_engine())
        .with_poll_timeout(Duration::from_millis(20));

    match run_round_trip(&session, 4096, false) {
        Err(DmaError::Transfer(TransferError::Timeout { .. })) => {}
        other => panic!("expected a timeout, got {other:?}"),
    }

    assert_eq!(session.handle().live_buffers(), 0);
}

#[test]
#[serial]
fn completion_without_busy_is_a_protocol_violation() {
    let session = open_session(SimAfu::new().with_instant_completion());

    match run_round_trip(&session, 4096, false) {
        Err(DmaError::Transfer(TransferError::ProtocolViolation)) => {}
        other => panic!("expected a protocol violation, got {other:?}"),
    }
}

#[test]
fn probe_reports_the_afu_identity() {
    let session = open_session(SimAfu::new());
    let identity = session.probe().unwrap();

    assert_eq!(identity.dfh, afudma_sim::SIM_DFH);
    assert_eq!(
        identity.guid,
        ((afudma_sim::SIM_GUID_H as u128) << 64) | afudma_sim::SIM_GUID_L as u128
    );
    assert_eq!(identity.type_version, afudma_sim::SIM_TYPE_VERSION);
}
