//! # Command Sequences
//!
//! Arm, disarm and auto-level are not acknowledged by the firmware; they work
//! by holding one RC override for a minimum time. A [`HoldSequence`]
//! retransmits `SET_RAW_RC` on a fixed interval until its duration has
//! passed.
//!
//! A failed exchange inside the loop is logged and counted, never fatal: the
//! firmware tolerates dropped frames, and retransmission is the recovery.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::rc::{throttle_percent_to_raw, RC_MAX, RC_MIN};
use crate::config::{RcConfig, SequenceConfig};
use crate::serial::MspPort;
use crate::session::MspSession;

/// One RC override held for a fixed duration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldSequence {
    pub name: &'static str,
    pub roll: u16,
    pub pitch: u16,
    pub yaw: u16,
    pub throttle: u16,
    pub duration: Duration,
    pub interval: Duration,
}

/// Outcome of running a [`HoldSequence`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceReport {
    /// Transmissions attempted
    pub sent: u32,
    /// Transmissions whose exchange failed
    pub failed: u32,
    pub elapsed: Duration,
    /// Stopped early by the cancel signal
    pub cancelled: bool,
}

impl SequenceReport {
    pub fn acknowledged(&self) -> u32 {
        self.sent - self.failed
    }
}

impl HoldSequence {
    /// Yaw right at minimum throttle
    pub fn arm(sequence: &SequenceConfig, rc: &RcConfig) -> Self {
        Self {
            name: "arm",
            roll: rc.center,
            pitch: rc.center,
            yaw: RC_MAX,
            throttle: sequence.min_throttle,
            duration: Duration::from_millis(sequence.arm_duration_ms),
            interval: sequence.retransmit_interval(),
        }
    }

    /// Yaw left at minimum throttle
    pub fn disarm(sequence: &SequenceConfig, rc: &RcConfig) -> Self {
        Self {
            name: "disarm",
            roll: rc.center,
            pitch: rc.center,
            yaw: RC_MIN,
            throttle: sequence.min_throttle,
            duration: Duration::from_millis(sequence.disarm_duration_ms),
            interval: sequence.retransmit_interval(),
        }
    }

    /// Sticks centered at `throttle_percent` (0-100) of the throttle range
    pub fn auto_level(sequence: &SequenceConfig, rc: &RcConfig, throttle_percent: f32) -> Self {
        Self {
            name: "auto-level",
            roll: rc.center,
            pitch: rc.center,
            yaw: rc.center,
            throttle: throttle_percent_to_raw(throttle_percent, rc.throttle_min, rc.throttle_max),
            duration: Duration::from_millis(sequence.auto_level_duration_ms),
            interval: sequence.retransmit_interval(),
        }
    }

    /// Retransmit the override until `duration` has elapsed
    ///
    /// Each exchange waits at most one `interval` for its acknowledgement.
    /// `cancel` is checked before every transmission; once it reads `true`
    /// the sequence stops.
    pub async fn run<P: MspPort>(
        &self,
        session: &mut MspSession<P>,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> SequenceReport {
        info!(
            "Starting {} sequence: roll {} pitch {} yaw {} throttle {} for {:?}",
            self.name, self.roll, self.pitch, self.yaw, self.throttle, self.duration
        );

        let mut rc = *session.rc_override();
        rc.set_axes(self.roll, self.pitch, self.yaw, self.throttle);

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let started = Instant::now();
        let mut report = SequenceReport {
            sent: 0,
            failed: 0,
            elapsed: Duration::ZERO,
            cancelled: false,
        };

        loop {
            ticker.tick().await;

            if cancel.is_some_and(|rx| *rx.borrow()) {
                report.cancelled = true;
                break;
            }

            if started.elapsed() >= self.duration {
                break;
            }

            report.sent += 1;
            if let Err(e) = session.transmit_override(rc, self.interval).await {
                report.failed += 1;
                warn!("{} frame {} failed: {}", self.name, report.sent, e);
            } else {
                debug!("{} frame {} acknowledged", self.name, report.sent);
            }
        }

        report.elapsed = started.elapsed();

        if report.cancelled {
            warn!(
                "{} sequence cancelled after {:?} ({} frames)",
                self.name, report.elapsed, report.sent
            );
        } else {
            info!(
                "{} sequence finished after {:?}: {} frames, {} failed",
                self.name, report.elapsed, report.sent, report.failed
            );
        }

        report
    }
}

/// Run the arm sequence
pub async fn arm<P: MspPort>(
    session: &mut MspSession<P>,
    sequence: &SequenceConfig,
    rc: &RcConfig,
) -> SequenceReport {
    HoldSequence::arm(sequence, rc).run(session, None).await
}

/// Run the disarm sequence
pub async fn disarm<P: MspPort>(
    session: &mut MspSession<P>,
    sequence: &SequenceConfig,
    rc: &RcConfig,
) -> SequenceReport {
    HoldSequence::disarm(sequence, rc).run(session, None).await
}

/// Hold sticks centered at `throttle_percent`
pub async fn auto_level<P: MspPort>(
    session: &mut MspSession<P>,
    sequence: &SequenceConfig,
    rc: &RcConfig,
    throttle_percent: f32,
) -> SequenceReport {
    HoldSequence::auto_level(sequence, rc, throttle_percent)
        .run(session, None)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::msp::decoder::decode_frame;
    use crate::serial::port::mocks::*;

    fn session(port: MockPort) -> MspSession<MockPort> {
        MspSession::new(port, &SessionConfig::default())
    }

    /// Decoded `SET_RAW_RC` fields of every write
    fn sent_channels(handle: &MockHandle) -> Vec<Vec<i64>> {
        handle
            .get_written_data()
            .iter()
            .map(|w| {
                let (frame, _) = decode_frame(&w.bytes).unwrap();
                assert_eq!(frame.code, 200);
                frame.fields()
            })
            .collect()
    }

    #[test]
    fn test_sequence_definitions() {
        let sequence = SequenceConfig::default();
        let rc = RcConfig::default();

        let arm = HoldSequence::arm(&sequence, &rc);
        assert_eq!((arm.yaw, arm.throttle), (2000, 1000));
        assert_eq!(arm.duration, Duration::from_secs(2));
        assert_eq!(arm.interval, Duration::from_millis(50));

        let disarm = HoldSequence::disarm(&sequence, &rc);
        assert_eq!((disarm.yaw, disarm.throttle), (1000, 1000));
        assert_eq!(disarm.duration, Duration::from_secs(1));

        let level = HoldSequence::auto_level(&sequence, &rc, 40.0);
        assert_eq!((level.roll, level.pitch, level.yaw), (1500, 1500, 1500));
        assert_eq!(level.throttle, 1400);
        assert_eq!(level.duration, Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_holds_for_two_seconds() {
        let port = MockPort::acking();
        let handle = port.handle();
        let mut session = session(port);
        let started = Instant::now();

        let report = arm(&mut session, &SequenceConfig::default(), &RcConfig::default()).await;

        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(report.elapsed >= Duration::from_secs(2));
        assert!(!report.cancelled);
        assert_eq!(report.sent, 40);
        assert_eq!(report.failed, 0);
        assert_eq!(report.acknowledged(), 40);

        let written = handle.get_written_data();
        assert_eq!(written.len(), 40);
        for pair in written.windows(2) {
            assert!(pair[1].at - pair[0].at <= Duration::from_millis(50));
        }
        // Last frame still inside the hold window
        assert!(written[39].at - started < Duration::from_secs(2));

        for fields in sent_channels(&handle) {
            // roll, pitch, throttle, yaw, aux1-4
            assert_eq!(fields[2], 1000, "throttle must stay at minimum");
            assert_eq!(fields[3], 2000, "yaw must stay at maximum");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_holds_for_one_second() {
        let port = MockPort::acking();
        let handle = port.handle();
        let mut session = session(port);

        let report = disarm(&mut session, &SequenceConfig::default(), &RcConfig::default()).await;

        assert_eq!(report.sent, 20);
        assert!(report.elapsed >= Duration::from_secs(1));
        for fields in sent_channels(&handle) {
            assert_eq!(fields[2], 1000);
            assert_eq!(fields[3], 1000);
        }
        assert_eq!(session.rc_override().yaw, 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_level_throttle() {
        let port = MockPort::acking();
        let handle = port.handle();
        let mut session = session(port);

        let report = auto_level(
            &mut session,
            &SequenceConfig::default(),
            &RcConfig::default(),
            25.0,
        )
        .await;

        assert_eq!(report.sent, 10);
        for fields in sent_channels(&handle) {
            assert_eq!(&fields[..4], &[1500, 1500, 1250, 1500]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_abort() {
        // Never answers: every exchange times out after one interval
        let port = MockPort::new();
        let handle = port.handle();
        let mut session = session(port);

        let report = arm(&mut session, &SequenceConfig::default(), &RcConfig::default()).await;

        assert!(!report.cancelled);
        assert_eq!(report.sent, 40);
        assert_eq!(report.failed, 40);
        assert!(report.elapsed >= Duration::from_secs(2));
        assert!(report.elapsed < Duration::from_millis(2100));
        assert_eq!(handle.get_written_data().len(), 40);
    }

    #[tokio::test(start_paused = true)]
    async fn test_intermittent_failures_keep_cadence() {
        let mut count = 0u32;
        let port = MockPort::responding(move |request| {
            count += 1;
            // Drop every third acknowledgement
            (count % 3 != 0).then(|| response_frame(request[4], vec![]))
        });
        let handle = port.handle();
        let mut session = session(port);

        let report = arm(&mut session, &SequenceConfig::default(), &RcConfig::default()).await;

        assert_eq!(report.sent, 40);
        assert_eq!(report.failed, 13);
        let written = handle.get_written_data();
        for pair in written.windows(2) {
            assert!(pair[1].at - pair[0].at <= Duration::from_millis(50));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_start() {
        let port = MockPort::acking();
        let handle = port.handle();
        let mut session = session(port);
        let (tx, rx) = watch::channel(true);

        let sequence = HoldSequence::arm(&SequenceConfig::default(), &RcConfig::default());
        let report = sequence.run(&mut session, Some(&rx)).await;

        assert!(report.cancelled);
        assert_eq!(report.sent, 0);
        assert!(handle.get_written_data().is_empty());
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_sequence() {
        let port = MockPort::acking();
        let mut session = session(port);
        let (tx, rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(520)).await;
            tx.send(true).unwrap();
        });

        let sequence = HoldSequence::arm(&SequenceConfig::default(), &RcConfig::default());
        let report = sequence.run(&mut session, Some(&rx)).await;

        assert!(report.cancelled);
        assert_eq!(report.sent, 11);
        assert!(report.elapsed < Duration::from_secs(1));
    }
}
