//! Conformance scenarios.
//!
//! Each scenario opens its own connections, performs a scripted exchange and
//! checks the result against the service contract. Scenarios are independent
//! of each other; they only need a live service.

use crate::config::Config;
use crate::connection::{PairedConnection, Received};
use crate::error::{HarnessError, Result};
use crate::frame::RelayFrame;
use crate::payload;
use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Path an initiator connects to in order to open a new channel.
pub const INITIATE_PATH: &str = "/v1/ws/";

/// Random bytes in the full exchange payload.
const FULL_EXCHANGE_BYTES: usize = 1024;

/// Reason sent when a scenario hangs up.
const HANGUP_REASON: &str = "Goodbye";

/// A contractual behavior of the pairing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioKind {
    SimpleRelay,
    FullExchange,
    MaxData,
    MaxExchange,
    MaxPeriod,
    BadChannel,
}

impl ScenarioKind {
    /// Every scenario, in the order a full run executes them.
    pub const ALL: [ScenarioKind; 6] = [
        ScenarioKind::SimpleRelay,
        ScenarioKind::FullExchange,
        ScenarioKind::MaxData,
        ScenarioKind::MaxExchange,
        ScenarioKind::MaxPeriod,
        ScenarioKind::BadChannel,
    ];

    /// Stable name used on the command line and in reports.
    pub fn name(self) -> &'static str {
        match self {
            Self::SimpleRelay => "simple_relay",
            Self::FullExchange => "full_exchange",
            Self::MaxData => "max_data",
            Self::MaxExchange => "max_exchange",
            Self::MaxPeriod => "max_period",
            Self::BadChannel => "bad_channel",
        }
    }

    /// One-line summary of what the scenario verifies.
    pub fn description(self) -> &'static str {
        match self {
            Self::SimpleRelay => "a message from the initiator reaches the peer with sender metadata",
            Self::FullExchange => "a short and a large random payload both relay byte-for-byte",
            Self::MaxData => "a payload at the byte ceiling closes the peer's session",
            Self::MaxExchange => "exactly max_exchanges messages relay; the next one closes the channel",
            Self::MaxPeriod => "the service closes a channel that outlives its lifetime",
            Self::BadChannel => "a fabricated channel id is refused or closed immediately",
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScenarioKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| HarnessError::UnknownScenario(s.to_string()))
    }
}

/// Fixed waits and bounds the scenarios impose on themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioTiming {
    /// Pause after sending an oversize payload before looking for the close.
    pub settle: Duration,
    /// Pause between messages in the lifetime scenario.
    pub period_interval: Duration,
    /// Exchanges after which the lifetime scenario gives up.
    pub period_max_iterations: u32,
    /// How long to wait for a close the contract says must be immediate.
    pub close_grace: Duration,
}

impl Default for ScenarioTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(500),
            period_interval: Duration::from_secs(2),
            period_max_iterations: 15,
            close_grace: Duration::from_secs(2),
        }
    }
}

/// Runs scenarios against the service described by a configuration.
pub struct ScenarioRunner {
    config: Config,
    timing: ScenarioTiming,
}

impl ScenarioRunner {
    /// Create a runner with default timing.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            timing: ScenarioTiming::default(),
        }
    }

    /// Replace the scenario timing.
    pub fn with_timing(mut self, timing: ScenarioTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Configuration the scenarios run with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one scenario.
    ///
    /// # Errors
    ///
    /// Any failure is wrapped in `ScenarioFailed` naming the scenario.
    pub fn run(&self, kind: ScenarioKind) -> Result<()> {
        info!(scenario = kind.name(), "running scenario");
        let result = match kind {
            ScenarioKind::SimpleRelay => self.simple_relay(),
            ScenarioKind::FullExchange => self.full_exchange(),
            ScenarioKind::MaxData => self.max_data(),
            ScenarioKind::MaxExchange => self.max_exchange(),
            ScenarioKind::MaxPeriod => self.max_period(),
            ScenarioKind::BadChannel => self.bad_channel(),
        };
        result.map_err(|e| HarnessError::ScenarioFailed {
            scenario: kind.name().to_string(),
            source: Box::new(e),
        })
    }

    /// Open an initiator and bind a peer to it through the returned link.
    pub fn pair(&self) -> Result<(PairedConnection, PairedConnection)> {
        let base = self.config.base_url();
        let initiator = PairedConnection::connect(&format!("{base}{INITIATE_PATH}"))?;
        let peer = PairedConnection::connect(&format!("{base}{}", initiator.link()))?;
        debug!(channel_id = initiator.channel_id(), "pair established");
        Ok((initiator, peer))
    }

    /// One text message relays to the peer, wrapped with sender metadata.
    pub fn simple_relay(&self) -> Result<()> {
        let (mut initiator, mut peer) = self.pair()?;
        let message = "Test message";

        initiator.send(message)?;
        let frame = expect_relay(&mut peer, "simple relay")?;
        expect_message(&frame, message, "relayed message didn't match")?;

        hang_up(&mut [&mut initiator, &mut peer]);
        Ok(())
    }

    /// A short message and a large random payload both relay unchanged.
    pub fn full_exchange(&self) -> Result<()> {
        let (mut initiator, mut peer) = self.pair()?;

        let intro = "intro message";
        initiator.send(intro)?;
        let intro_frame = expect_relay(&mut peer, "intro")?;
        expect_message(&intro_frame, intro, "Intro didn't match")?;

        let message = payload::printable(FULL_EXCHANGE_BYTES);
        initiator.send(&message)?;
        let frame = expect_relay(&mut peer, "payload")?;
        expect_message(&frame, &message, "Message didn't match")?;

        ensure(
            intro_frame.has_remote_sender() || frame.has_remote_sender(),
            || "No remote in sender data".to_string(),
        )?;

        hang_up(&mut [&mut initiator, &mut peer]);
        Ok(())
    }

    /// A payload at or above `max_data` bytes closes the peer.
    pub fn max_data(&self) -> Result<()> {
        let max_bytes = self.config.max_data()?;
        let (mut initiator, mut peer) = self.pair()?;

        let message = payload::printable(max_bytes);
        debug!(len = message.len(), max_bytes, "sending oversize payload");
        tolerate_close(initiator.send(&message))?;
        thread::sleep(self.timing.settle);

        // One receive surfaces a close the transport has not reported yet.
        if let Some(Received::Message(text)) = peer.receive_timeout(self.timing.close_grace)? {
            return Err(HarnessError::Assertion(format!(
                "Receiver got a {} byte frame although max_data is {}",
                text.len(),
                max_bytes
            )));
        }
        ensure(peer.is_closed(), || "Receiver did not close".to_string())?;

        hang_up(&mut [&mut initiator]);
        Ok(())
    }

    /// Exactly `max_exchanges` messages relay; the next one closes the peer.
    pub fn max_exchange(&self) -> Result<()> {
        let limit = self.config.max_exchanges()?;
        let (mut initiator, mut peer) = self.pair()?;

        for i in 0..=limit {
            let message = payload::numbered(i);
            match initiator.send(&message) {
                Ok(()) => {}
                Err(e) if e.is_close_signal() && i == limit => {
                    debug!("sender already closed at the exchange limit");
                }
                Err(e) if e.is_close_signal() => {
                    return Err(HarnessError::Assertion(format!(
                        "Sender closed after {i} of {limit} exchanges"
                    )));
                }
                Err(e) => return Err(e),
            }

            match peer.receive()? {
                Received::Closed(reason) => {
                    ensure(i == limit, || {
                        format!("Invalid message count {i}: closed before {limit} exchanges ({reason})")
                    })?;
                    break;
                }
                Received::Message(text) => {
                    ensure(i < limit, || {
                        format!("Message #{i} was relayed past the exchange limit of {limit}")
                    })?;
                    let frame = decode_relay(&text, "exchange")?;
                    expect_message(&frame, &message, &format!("Message #{i} failed"))?;
                }
            }
        }

        ensure(peer.is_closed(), || "Receiver did not close".to_string())?;
        hang_up(&mut [&mut initiator]);
        Ok(())
    }

    /// The service closes a channel that stays open too long.
    pub fn max_period(&self) -> Result<()> {
        let (mut initiator, mut peer) = self.pair()?;
        let started = Instant::now();
        let mut i = 0;

        loop {
            let message = payload::numbered(i);
            let received = match initiator.send(&message) {
                Ok(()) => Some(peer.receive()?),
                Err(e) if e.is_close_signal() => peer.receive_timeout(self.timing.close_grace)?,
                Err(e) => return Err(e),
            };

            match received {
                Some(Received::Closed(reason)) => {
                    info!(
                        exchanges = i,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        %reason,
                        "channel closed by service"
                    );
                    break;
                }
                Some(Received::Message(text)) => {
                    let frame = decode_relay(&text, "periodic")?;
                    expect_message(&frame, &message, &format!("Message #{i} failed"))?;
                }
                None => {
                    return Err(HarnessError::Assertion(
                        "Sender was closed but the receiver stayed open".to_string(),
                    ));
                }
            }

            thread::sleep(self.timing.period_interval);
            i += 1;
            ensure(i < self.timing.period_max_iterations, || {
                format!(
                    "Connection open too long? {} exchanges over {:.1}s",
                    i,
                    started.elapsed().as_secs_f64()
                )
            })?;
        }

        ensure(peer.is_closed(), || "Receiver did not close".to_string())?;
        hang_up(&mut [&mut initiator]);
        Ok(())
    }

    /// A party using an unrelated channel id must not join the channel.
    pub fn bad_channel(&self) -> Result<()> {
        let base = self.config.base_url();
        let mut initiator = PairedConnection::connect(&format!("{base}{INITIATE_PATH}"))?;

        let fabricated = Uuid::new_v4().simple().to_string();
        ensure(fabricated != initiator.channel_id(), || {
            "Oops, matching channelids".to_string()
        })?;

        let url = format!("{base}{}/{fabricated}", initiator.handshake().link_base());
        match PairedConnection::connect(&url) {
            Err(HarnessError::Closed(reason)) => debug!(%reason, "fabricated channel closed"),
            Err(HarnessError::Refused { status }) => debug!(status, "fabricated channel refused"),
            Err(e) => return Err(e),
            Ok(mut intruder) => {
                match intruder.receive_timeout(self.timing.close_grace)? {
                    Some(Received::Closed(_)) => {}
                    Some(Received::Message(text)) => {
                        return Err(HarnessError::Assertion(format!(
                            "Frame delivered on fabricated channel {fabricated}: {text:.80}"
                        )));
                    }
                    None => {
                        return Err(HarnessError::Assertion(format!(
                            "Connection with fabricated channel {fabricated} stayed open"
                        )));
                    }
                }
                ensure(intruder.is_closed(), || "Receiver did not close.".to_string())?;
            }
        }

        hang_up(&mut [&mut initiator]);
        Ok(())
    }
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(HarnessError::Assertion(message()))
    }
}

/// A close on send is fine; the receiver's side is what gets checked.
fn tolerate_close(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if e.is_close_signal() => Ok(()),
        other => other,
    }
}

fn decode_relay(text: &str, what: &str) -> Result<RelayFrame> {
    RelayFrame::parse(text).map_err(|e| HarnessError::Assertion(format!("{what}: {e}")))
}

fn expect_relay(conn: &mut PairedConnection, what: &str) -> Result<RelayFrame> {
    match conn.receive()? {
        Received::Message(text) => decode_relay(&text, what),
        Received::Closed(reason) => Err(HarnessError::Assertion(format!(
            "{what}: receiver closed before the relay arrived ({reason})"
        ))),
    }
}

fn expect_message(frame: &RelayFrame, expected: &str, context: &str) -> Result<()> {
    ensure(frame.message == expected, || {
        format!(
            "{context}: expected {} bytes {:?}, got {} bytes {:?}",
            expected.len(),
            preview(expected),
            frame.message.len(),
            preview(&frame.message)
        )
    })
}

fn preview(text: &str) -> String {
    text.chars().take(40).collect()
}

fn hang_up(connections: &mut [&mut PairedConnection]) {
    for conn in connections.iter_mut() {
        if let Err(e) = conn.close(HANGUP_REASON) {
            warn!(url = conn.url(), error = %e, "close failed");
        }
    }
}
