//! GNSS reader task: serial bytes → lines → parser → shared fix

use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{ParseOutcome, PositionParser, RejectReason};
use crate::error::Result;
use crate::nmea::framer::LineFramer;
use crate::nmea::protocol::Fix;
use crate::nmea::ubx::encode_rate_command;
use crate::serial::SensorSerial;

const READ_CHUNK_BYTES: usize = 64;

/// Send the measurement rate command to the receiver
///
/// # Returns
///
/// The rate actually requested after downgrading to a supported value.
pub async fn configure_receiver(serial: &mut SensorSerial, rate_hz: u32) -> Result<u32> {
    let (effective, frame) = encode_rate_command(rate_hz);
    serial.send_packet(&frame).await?;
    info!("GNSS update rate configured: {} Hz", effective);
    Ok(effective)
}

/// Read the receiver forever, publishing every fix change on `fix_tx`
///
/// Read failures are logged and retried after `read_timeout`.
pub async fn run_reader(
    mut serial: SensorSerial,
    mut parser: PositionParser,
    fix_tx: watch::Sender<Fix>,
    read_timeout: Duration,
) {
    let mut framer = LineFramer::new();
    let mut buf = [0u8; READ_CHUNK_BYTES];

    info!("GNSS reader started on {}", serial.device_path());

    loop {
        let n = match serial.read_chunk(&mut buf, read_timeout).await {
            Ok(n) => n,
            Err(e) => {
                warn!("GNSS read error: {}", e);
                tokio::time::sleep(read_timeout).await;
                continue;
            }
        };
        if n == 0 {
            continue;
        }

        for line in framer.push(&buf[..n]) {
            match parser.parse_line(&line) {
                ParseOutcome::Updated | ParseOutcome::Rejected(RejectReason::Jump) => {
                    publish_fix(&fix_tx, parser.fix());
                }
                ParseOutcome::Rejected(reason) => {
                    debug!("Dropped line ({:?}): {}", reason, line);
                }
            }
        }
    }
}

fn publish_fix(fix_tx: &watch::Sender<Fix>, fix: Fix) {
    fix_tx.send_if_modified(|current| {
        if *current == fix {
            false
        } else {
            *current = fix;
            true
        }
    });
}
