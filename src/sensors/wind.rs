//! # Wind Sensor
//!
//! An ultrasonic anemometer streaming `$--MWV` sentences over serial.
//!
//! [`WindReader`] owns the port and runs as its own task. [`WindSensor`] is
//! the fusion-side handle that returns the newest reading while it is fresh.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{AuxReading, AuxSensor, SensorKind, WindReading};
use crate::error::{Result, TrackerError};
use crate::geo::MPS_TO_KNOTS;
use crate::nmea::decoder::decode_sentence;
use crate::nmea::framer::LineFramer;
use crate::nmea::protocol::{Sentence, SENTENCE_MWV};
use crate::serial::SensorSerial;

/// Readings older than this are reported as unavailable
pub const WIND_MAX_AGE: Duration = Duration::from_secs(3);

const READ_CHUNK_BYTES: usize = 64;

#[derive(Debug, Clone, Copy)]
struct TimedWind {
    reading: WindReading,
    received: Instant,
}

/// Create a connected reader/sensor pair
pub fn wind_channel(
    serial: SensorSerial,
    read_timeout: Duration,
    max_age: Duration,
) -> (WindReader, WindSensor) {
    let (feed, latest) = watch::channel(None);
    (
        WindReader {
            serial,
            feed,
            read_timeout,
        },
        WindSensor { latest, max_age },
    )
}

/// Serial side of the wind sensor
#[derive(Debug)]
pub struct WindReader {
    serial: SensorSerial,
    feed: watch::Sender<Option<TimedWind>>,
    read_timeout: Duration,
}

impl WindReader {
    /// Read the sensor forever
    pub async fn run(mut self) {
        let mut framer = LineFramer::new();
        let mut buf = [0u8; READ_CHUNK_BYTES];

        info!("Wind reader started on {}", self.serial.device_path());

        loop {
            match self.serial.read_chunk(&mut buf, self.read_timeout).await {
                Ok(0) => {}
                Ok(n) => {
                    for line in framer.push(&buf[..n]) {
                        self.handle_line(&line);
                    }
                }
                Err(e) => {
                    warn!("Wind sensor read error: {}", e);
                    tokio::time::sleep(self.read_timeout).await;
                }
            }
        }
    }

    /// Publish the reading carried by one line, if any
    fn handle_line(&self, line: &str) {
        if !line.contains(SENTENCE_MWV) {
            return;
        }
        match decode_sentence(line) {
            Ok(Sentence::Mwv(mwv)) if !mwv.valid => {
                debug!("Wind sensor reports invalid data, reading dropped");
            }
            Ok(Sentence::Mwv(mwv)) => {
                let speed_knots = match (mwv.speed, mwv.unit.as_str()) {
                    (Some(speed), "M") => Some(speed * MPS_TO_KNOTS),
                    _ => None,
                };
                let reading = WindReading {
                    speed: mwv.speed,
                    angle: mwv.angle,
                    speed_knots,
                    true_direction: None,
                };
                self.feed.send_replace(Some(TimedWind {
                    reading,
                    received: Instant::now(),
                }));
            }
            Ok(_) => {}
            Err(e) => debug!("Wind sentence dropped: {}", e),
        }
    }
}

/// Fusion-side handle on the latest wind reading
#[derive(Debug, Clone)]
pub struct WindSensor {
    latest: watch::Receiver<Option<TimedWind>>,
    max_age: Duration,
}

impl AuxSensor for WindSensor {
    fn kind(&self) -> SensorKind {
        SensorKind::Wind
    }

    fn sample(&mut self) -> Result<AuxReading> {
        let latest = *self.latest.borrow();
        match latest {
            Some(timed) if timed.received.elapsed() <= self.max_age => {
                Ok(AuxReading::Wind(timed.reading))
            }
            Some(_) => Err(TrackerError::SensorUnavailable(
                "wind reading is stale".to_string(),
            )),
            None => Err(TrackerError::SensorUnavailable(
                "no wind reading yet".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nmea::checksum::with_checksum;
    use crate::serial::port_trait::mocks::MockSerialPort;

    fn pair(max_age: Duration) -> (MockSerialPort, WindReader, WindSensor) {
        let mock = MockSerialPort::new();
        let serial = SensorSerial::from_port(Box::new(mock.clone()), "/dev/mockwind");
        let (reader, sensor) = wind_channel(serial, Duration::from_millis(20), max_age);
        (mock, reader, sensor)
    }

    #[test]
    fn test_no_reading_yet() {
        let (_mock, _reader, mut sensor) = pair(WIND_MAX_AGE);
        assert!(matches!(
            sensor.sample(),
            Err(TrackerError::SensorUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_mwv_in_metres_per_second() {
        let (_mock, reader, mut sensor) = pair(WIND_MAX_AGE);
        reader.handle_line(&with_checksum("IIMWV,045.0,R,5.2,M,A"));

        let AuxReading::Wind(wind) = sensor.sample().unwrap() else {
            panic!("expected wind reading");
        };
        assert_eq!(wind.angle, Some(45.0));
        assert_eq!(wind.speed, Some(5.2));
        assert!((wind.speed_knots.unwrap() - 10.108).abs() < 1e-3);
        assert_eq!(wind.true_direction, None);
    }

    #[tokio::test]
    async fn test_mwv_in_knots_has_no_conversion() {
        let (_mock, reader, mut sensor) = pair(WIND_MAX_AGE);
        reader.handle_line(&with_checksum("WIMWV,270.0,R,12.0,N,A"));

        let AuxReading::Wind(wind) = sensor.sample().unwrap() else {
            panic!("expected wind reading");
        };
        assert_eq!(wind.speed, Some(12.0));
        assert_eq!(wind.speed_knots, None);
    }

    #[tokio::test]
    async fn test_invalid_status_not_published() {
        let (_mock, reader, mut sensor) = pair(WIND_MAX_AGE);
        reader.handle_line(&with_checksum("IIMWV,045.0,R,5.2,M,V"));
        assert!(matches!(
            sensor.sample(),
            Err(TrackerError::SensorUnavailable(msg)) if msg.contains("no wind reading")
        ));

        reader.handle_line(&with_checksum("IIMWV,045.0,R,5.2,M,A"));
        reader.handle_line(&with_checksum("IIMWV,180.0,R,9.9,M,V"));
        let AuxReading::Wind(wind) = sensor.sample().unwrap() else {
            panic!("expected wind reading");
        };
        assert_eq!(wind.angle, Some(45.0));
    }

    #[tokio::test]
    async fn test_bad_checksum_ignored() {
        let (_mock, reader, mut sensor) = pair(WIND_MAX_AGE);
        reader.handle_line("$IIMWV,045.0,R,5.2,M,A*00");
        assert!(sensor.sample().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_reading_unavailable() {
        let (_mock, reader, mut sensor) = pair(Duration::from_secs(1));
        reader.handle_line(&with_checksum("IIMWV,045.0,R,5.2,M,A"));
        assert!(sensor.sample().is_ok());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(matches!(
            sensor.sample(),
            Err(TrackerError::SensorUnavailable(msg)) if msg.contains("stale")
        ));
    }

    #[tokio::test]
    async fn test_reader_task_feeds_sensor() {
        let (mock, reader, mut sensor) = pair(WIND_MAX_AGE);
        let line = format!("{}\r\n", with_checksum("IIMWV,010.0,R,3.0,M,A"));
        mock.queue_chunk(line.as_bytes());

        let task = tokio::spawn(reader.run());
        let mut reading = None;
        for _ in 0..100 {
            if let Ok(r) = sensor.sample() {
                reading = Some(r);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        task.abort();

        let Some(AuxReading::Wind(wind)) = reading else {
            panic!("wind reading never arrived");
        };
        assert_eq!(wind.angle, Some(10.0));
    }
}
