// SPDX-FileCopyrightText: © 2026 OFS Tools Contributors
// SPDX-License-Identifier: Apache-2.0

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use afudma::{DmaError, DmaSession, SimAfu, MAX_TEST_BUFFER_SIZE_SIM};

/// Round-trip integrity and bandwidth test against the simulated DMA
/// AFU. Exit code is the number of corrupt bytes (clamped), so 0 means
/// the data survived host→device→host intact and both directions met
/// the bandwidth minimum.
#[derive(Parser, Debug)]
#[command(name = "dma-test")]
struct CliOptions {
    /// Transfer size in KiB. Must be a multiple of the 64-byte line.
    #[arg(long, default_value_t = 2048)]
    size_kb: usize,

    /// Dump the CSR file on every completion poll.
    #[arg(short, long)]
    verbose: bool,

    /// Dump the CSR file once before the test starts.
    #[arg(long)]
    dump_csrs: bool,

    /// Print the report as JSON instead of the human summary.
    #[arg(long)]
    json: bool,

    /// Seconds a descriptor may stay busy before it is declared stuck.
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Completion poll pacing in milliseconds.
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,
}

/// KiB argument to a byte count. `None` on zero or overflow; KiB
/// granularity already guarantees 64-byte line alignment.
fn transfer_size_bytes(size_kb: usize) -> Option<usize> {
    size_kb.checked_mul(1024).filter(|size| *size > 0)
}

fn run(options: &CliOptions, transfer_size: usize) -> Result<usize, DmaError> {
    let session = DmaSession::open(SimAfu::new(), true)?
        .with_poll_timeout(Duration::from_secs(options.timeout_secs))
        .with_poll_interval(Duration::from_millis(options.poll_interval_ms));

    session.probe()?;
    if options.dump_csrs {
        session.dump_csrs()?;
    }

    let report = afudma::run_round_trip(&session, transfer_size, options.verbose)?;

    if options.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).expect("report serializes")
        );
    } else if report.passed() {
        println!(
            "PASS: {} bytes verified, h2d {:.3}/{:.3} GB/s, d2h {:.3}/{:.3} GB/s (read/write)",
            report.bytes_compared,
            report.h2d.read_gbps,
            report.h2d.write_gbps,
            report.d2h.read_gbps,
            report.d2h.write_gbps,
        );
    } else {
        println!(
            "FAIL: {} of {} bytes corrupt",
            report.mismatch_count, report.bytes_compared
        );
    }

    Ok(report.mismatch_count)
}

fn main() -> ExitCode {
    let options = CliOptions::parse();

    let default_filter = if options.verbose || options.dump_csrs {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let transfer_size = match transfer_size_bytes(options.size_kb) {
        Some(size) if size <= MAX_TEST_BUFFER_SIZE_SIM => size,
        _ => {
            eprintln!(
                "--size-kb {} is outside the 1..={} KiB range",
                options.size_kb,
                MAX_TEST_BUFFER_SIZE_SIM / 1024
            );
            return ExitCode::FAILURE;
        }
    };

    match run(&options, transfer_size) {
        Ok(mismatches) => ExitCode::from(mismatches.min(u8::MAX as usize) as u8),
        Err(err) => {
            eprintln!("dma test failed: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod test {
    use super::transfer_size_bytes;

    #[test]
    fn size_argument_never_overflows() {
        assert_eq!(transfer_size_bytes(usize::MAX), None);
        assert_eq!(transfer_size_bytes(usize::MAX / 1024 + 1), None);
        assert_eq!(transfer_size_bytes(0), None);
        assert_eq!(transfer_size_bytes(2048), Some(2048 * 1024));
    }
}
