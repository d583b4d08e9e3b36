//! # Transport Session
//!
//! Owns the byte stream to one flight controller and performs request /
//! response exchanges over it.
//!
//! Every exchange writes one request, reads one response frame, and then
//! discards whatever is still buffered in either direction, so a corrupt or
//! late frame cannot desynchronise the next exchange. Exchanges take
//! `&mut self` and so cannot overlap on the same stream.
//!
//! The session never retries; callers decide whether a failed exchange is
//! fatal.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::control::rc::{RcOverride, RC_AUX_CHANNELS};
use crate::error::{MspError, Result};
use crate::msp::catalog::name_of;
use crate::msp::decoder::read_frame;
use crate::msp::encoder::encode_request;
use crate::msp::protocol::{Direction, MspCommand, MspFrame};
use crate::serial::MspPort;
use crate::msp::catalog::decode_fields;
use crate::telemetry::{
    stamped, Attitude, RcChannels, Stamp, Stamped, Telemetry, TelemetryRecord, TelemetrySample,
};

/// A successful request / response round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// The validated response frame
    pub frame: MspFrame,
    /// Time from the start of the write to the end of the read
    pub elapsed: Duration,
}

impl Exchange {
    /// Response payload grouped into fields per the message catalog
    pub fn fields(&self) -> Vec<i64> {
        self.frame.fields()
    }
}

/// MSP session over an exclusively owned byte stream
pub struct MspSession<P: MspPort> {
    port: P,
    exchange_timeout: Duration,
    telemetry: Telemetry,
    rc: RcOverride,
}

impl<P: MspPort> MspSession<P> {
    /// Create a session over an already open stream
    pub fn new(port: P, config: &SessionConfig) -> Self {
        Self {
            port,
            exchange_timeout: config.exchange_timeout(),
            telemetry: Telemetry::default(),
            rc: RcOverride::default(),
        }
    }

    pub fn exchange_timeout(&self) -> Duration {
        self.exchange_timeout
    }

    /// Last known telemetry
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Last commanded RC override
    pub fn rc_override(&self) -> &RcOverride {
        &self.rc
    }

    /// Give the stream back
    pub fn into_inner(self) -> P {
        self.port
    }

    /// Send a request and wait for its response
    ///
    /// # Errors
    ///
    /// Returns `ExchangeFailed` wrapping the cause:
    /// - `Encode` if the request cannot be serialized (nothing is written)
    /// - `StreamUnavailable` on write or read failure
    /// - `ChecksumMismatch` for a corrupt response
    /// - `Timeout` if no valid frame arrives within the configured bound
    /// - `Rejected` if the flight controller answers with an error frame
    /// - `MalformedSequence` if the reply is not a `$M>` frame for `code`
    pub async fn exchange(&mut self, code: u8, fields: &[i64]) -> Result<Exchange> {
        let limit = self.exchange_timeout;
        self.exchange_within(code, fields, limit).await
    }

    /// [`exchange`](Self::exchange) with an explicit time bound
    pub async fn exchange_within(
        &mut self,
        code: u8,
        fields: &[i64],
        limit: Duration,
    ) -> Result<Exchange> {
        let request = encode_request(code, fields).map_err(|e| MspError::exchange_failed(code, e))?;

        let started = Instant::now();
        let outcome = match timeout(limit, self.round_trip(&request)).await {
            Ok(result) => result,
            Err(_) => Err(MspError::Timeout(limit)),
        };
        let elapsed = started.elapsed();

        if let Err(e) = self.port.clear_buffers() {
            warn!("Failed to clear buffers after {}: {}", name_of(code), e);
        }

        let frame = outcome
            .and_then(|frame| check_response(code, frame))
            .map_err(|e| {
                debug!("Exchange {} ({}) failed: {}", name_of(code), code, e);
                MspError::exchange_failed(code, e)
            })?;

        debug!(
            "Exchange {} ({}) completed in {:?}",
            name_of(code),
            code,
            elapsed
        );
        Ok(Exchange { frame, elapsed })
    }

    async fn round_trip(&mut self, request: &[u8]) -> Result<MspFrame> {
        self.port.write_all(request).await.map_err(write_failed)?;
        self.port.flush().await.map_err(write_failed)?;
        read_frame(&mut self.port).await
    }

    /// Write a request without waiting for a response
    pub async fn send(&mut self, code: u8, fields: &[i64]) -> Result<()> {
        let request = encode_request(code, fields)?;
        self.port.write_all(&request).await.map_err(write_failed)?;
        self.port.flush().await.map_err(write_failed)?;
        debug!("Sent {} ({}) without waiting", name_of(code), code);
        Ok(())
    }

    /// Query a telemetry code and update the stored record
    ///
    /// The stored record is left untouched if the exchange or the decode fails.
    ///
    /// # Errors
    ///
    /// - `NotTelemetry` if `command` is not a telemetry query (nothing is sent)
    /// - `ExchangeFailed` if the exchange fails or its fields do not decode
    pub async fn poll(&mut self, command: MspCommand) -> Result<TelemetrySample> {
        if !crate::telemetry::is_telemetry(command) {
            return Err(MspError::NotTelemetry(command.code()));
        }

        let code = command.code();
        let exchange = self.exchange(code, &[]).await?;
        let sample = TelemetrySample::decode(code, &exchange.fields(), Stamp::new(exchange.elapsed))
            .map_err(|e| MspError::exchange_failed(code, e))?;

        self.telemetry.apply(&sample);
        Ok(sample)
    }

    /// Query one typed record
    pub async fn poll_record<T: TelemetryRecord>(&mut self) -> Result<Stamped<T>> {
        let code = T::COMMAND.code();
        let exchange = self.exchange(code, &[]).await?;
        let record = stamped::<T>(&exchange.fields(), Stamp::new(exchange.elapsed))
            .map_err(|e| MspError::exchange_failed(code, e))?;

        self.telemetry.apply(&T::into_sample(record.clone()));
        Ok(record)
    }

    /// Back-to-back ATTITUDE and RC queries
    ///
    /// Both records carry the combined elapsed time of the two exchanges.
    pub async fn poll_attitude_with_rc(
        &mut self,
    ) -> Result<(Stamped<Attitude>, Stamped<RcChannels>)> {
        let attitude = self.exchange(Attitude::COMMAND.code(), &[]).await?;
        let rc = self.exchange(RcChannels::COMMAND.code(), &[]).await?;

        let stamp = Stamp::new(attitude.elapsed + rc.elapsed);
        let attitude = TelemetrySample::decode(Attitude::COMMAND.code(), &attitude.fields(), stamp)
            .map_err(|e| MspError::exchange_failed(Attitude::COMMAND.code(), e))?;
        let rc = TelemetrySample::decode(RcChannels::COMMAND.code(), &rc.fields(), stamp)
            .map_err(|e| MspError::exchange_failed(RcChannels::COMMAND.code(), e))?;

        self.telemetry.apply(&attitude);
        self.telemetry.apply(&rc);

        Ok((
            self.telemetry.attitude().clone(),
            self.telemetry.rc().clone(),
        ))
    }

    /// Command the four primary axes, keeping the aux channels
    pub async fn set_raw_rc(
        &mut self,
        roll: u16,
        pitch: u16,
        yaw: u16,
        throttle: u16,
    ) -> Result<Exchange> {
        self.rc.set_axes(roll, pitch, yaw, throttle);
        self.transmit_rc(self.exchange_timeout).await
    }

    /// Command the four primary axes and read attitude from the acknowledgement
    ///
    /// Firmware patched to answer `SET_RAW_RC` with its 6-byte attitude
    /// struct saves a separate ATTITUDE query. The attitude is stamped with
    /// this exchange's latency and stored like a polled one.
    ///
    /// # Errors
    ///
    /// Returns `ExchangeFailed` with `MalformedSequence` if the acknowledgement
    /// carries no attitude (stock firmware); the RC override is still updated.
    pub async fn set_raw_rc_with_attitude(
        &mut self,
        roll: u16,
        pitch: u16,
        yaw: u16,
        throttle: u16,
    ) -> Result<Stamped<Attitude>> {
        let exchange = self.set_raw_rc(roll, pitch, yaw, throttle).await?;

        let fields = decode_fields(Attitude::COMMAND.code(), &exchange.frame.payload);
        let attitude = stamped::<Attitude>(&fields, Stamp::new(exchange.elapsed))
            .map_err(|e| MspError::exchange_failed(MspCommand::SetRawRc.code(), e))?;

        self.telemetry.apply(&Attitude::into_sample(attitude.clone()));
        Ok(attitude)
    }

    /// Command the given override vector, waiting at most `limit` for the ack
    pub async fn transmit_override(&mut self, rc: RcOverride, limit: Duration) -> Result<Exchange> {
        self.rc = rc;
        self.transmit_rc(limit).await
    }

    /// Center roll, pitch and yaw at the given throttle
    pub async fn set_rc_neutral(&mut self, throttle: u16) -> Result<Exchange> {
        let aux = self.rc.aux;
        self.rc = RcOverride::neutral(throttle);
        self.rc.set_aux(aux);
        self.transmit_rc(self.exchange_timeout).await
    }

    /// Command all auxiliary channels
    pub async fn set_aux(&mut self, aux: [u16; RC_AUX_CHANNELS]) -> Result<Exchange> {
        self.rc.set_aux(aux);
        self.transmit_rc(self.exchange_timeout).await
    }

    /// Command one auxiliary channel (0-based), keeping the others
    ///
    /// # Errors
    ///
    /// Returns `Encode` if `index` is not an aux channel (nothing is sent)
    pub async fn enable_aux(&mut self, index: usize, value: u16) -> Result<Exchange> {
        if index >= RC_AUX_CHANNELS {
            return Err(MspError::Encode(format!(
                "aux channel {} out of range 0..{}",
                index, RC_AUX_CHANNELS
            )));
        }

        let mut aux = self.rc.aux;
        aux[index] = value;
        self.set_aux(aux).await
    }

    async fn transmit_rc(&mut self, limit: Duration) -> Result<Exchange> {
        let fields = self.rc.to_fields();
        self.exchange_within(MspCommand::SetRawRc.code(), &fields, limit)
            .await
    }

    /// Forward PID bytes unchanged, then persist them to EEPROM
    ///
    /// `values` are sent as-is in the firmware's packed order; nothing is
    /// scaled.
    pub async fn set_pid(&mut self, values: &[u16]) -> Result<()> {
        let fields: Vec<i64> = values.iter().map(|&v| i64::from(v)).collect();
        self.exchange(MspCommand::SetPid.code(), &fields).await?;
        self.eeprom_write().await
    }

    pub async fn eeprom_write(&mut self) -> Result<()> {
        self.exchange(MspCommand::EepromWrite.code(), &[]).await?;
        Ok(())
    }

    /// Reboot the flight controller
    ///
    /// Most boards drop the link without answering, so this does not wait.
    pub async fn reboot(&mut self) -> Result<()> {
        self.send(MspCommand::Reboot.code(), &[]).await
    }

    pub async fn calibrate_accelerometer(&mut self) -> Result<()> {
        self.exchange(MspCommand::AccCalibration.code(), &[]).await?;
        Ok(())
    }

    pub async fn calibrate_magnetometer(&mut self) -> Result<()> {
        self.exchange(MspCommand::MagCalibration.code(), &[]).await?;
        Ok(())
    }
}

fn check_response(code: u8, frame: MspFrame) -> Result<MspFrame> {
    match frame.direction {
        Direction::Response => {}
        Direction::Error => return Err(MspError::Rejected(frame.code)),
        Direction::Request => {
            return Err(MspError::MalformedSequence(format!(
                "expected a response to code {}, read a request frame (echoed link?)",
                code
            )))
        }
    }

    if frame.code != code {
        return Err(MspError::MalformedSequence(format!(
            "requested code {}, response is for {}",
            code, frame.code
        )));
    }

    Ok(frame)
}

fn write_failed(err: std::io::Error) -> MspError {
    MspError::StreamUnavailable(format!("write failed: {}", err))
}
