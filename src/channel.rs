//! Mode updates from the observer process.
//!
//! The observer writes newline-delimited JSON records to a Unix socket. A
//! background thread parses them into a single latest-value slot which the
//! frame loop drains without ever waiting.

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::{ChannelError, Result};
use crate::types::Mode;

const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Longest accepted message, newline included.
pub const MAX_LINE_BYTES: u64 = 16 * 1024;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModeUpdate {
    pub mode: Mode,
    pub intensity: f32,
    /// Observer clock, milliseconds.
    pub timestamp: u64,
    /// New goal anchor in normalized screen coordinates, if the observer
    /// moved it.
    pub goal: Option<[f32; 2]>,
}

impl ModeUpdate {
    pub fn new(mode: Mode, intensity: f32, timestamp: u64) -> Self {
        Self {
            mode,
            intensity,
            timestamp,
            goal: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireMessage {
    State {
        state: Mode,
        intensity: f32,
        timestamp: u64,
        #[serde(default)]
        goal: Option<[f32; 2]>,
    },
}

/// Parses one line of the observer protocol:
/// `{"type":"state","state":"alert","intensity":0.8,"timestamp":1712}`,
/// optionally with `"goal":[x,y]`.
pub fn parse_line(line: &str) -> std::result::Result<ModeUpdate, ChannelError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ChannelError::Empty);
    }
    let WireMessage::State {
        state,
        intensity,
        timestamp,
        goal,
    } = serde_json::from_str(line)?;
    if !intensity.is_finite() {
        return Err(ChannelError::NonFiniteIntensity);
    }
    let goal = match goal {
        Some([x, y]) if x.is_finite() && y.is_finite() => {
            Some([x.clamp(0.0, 1.0), y.clamp(0.0, 1.0)])
        }
        Some(_) => return Err(ChannelError::NonFiniteGoal),
        None => None,
    };
    Ok(ModeUpdate {
        mode: state,
        intensity: intensity.clamp(0.0, 1.0),
        timestamp,
        goal,
    })
}

/// Decodes one raw line, newline included.
pub fn parse_bytes(line: &[u8]) -> std::result::Result<ModeUpdate, ChannelError> {
    parse_line(std::str::from_utf8(line)?)
}

#[derive(Debug, Default)]
struct SlotState {
    pending: Option<ModeUpdate>,
    newest_timestamp: Option<u64>,
}

/// Single most-recent-update slot shared by the listener thread (writer) and
/// the frame loop (reader). Never queues.
#[derive(Clone, Debug, Default)]
pub struct LatestSlot {
    inner: Arc<Mutex<SlotState>>,
}

impl LatestSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `update` unless a newer one has already been seen. Returns
    /// whether it was stored.
    pub fn publish(&self, update: ModeUpdate) -> bool {
        let mut state = self.lock();
        if state
            .newest_timestamp
            .is_some_and(|newest| update.timestamp < newest)
        {
            return false;
        }
        state.newest_timestamp = Some(update.timestamp);
        state.pending = Some(update);
        true
    }

    /// Removes and returns the pending update, if any.
    pub fn take(&self) -> Option<ModeUpdate> {
        self.lock().pending.take()
    }

    /// Forgets the newest timestamp seen. Called per connection, since a
    /// restarted observer starts its clock over.
    pub fn reset_ordering(&self) {
        self.lock().newest_timestamp = None;
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Reads observer lines until EOF or a read error. Malformed, non-UTF-8
/// and over-long lines are logged and skipped. Returns how many updates
/// were stored.
pub async fn read_updates<R>(mut reader: R, slot: &LatestSlot) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut accepted = 0;
    loop {
        buf.clear();
        let read = (&mut reader)
            .take(MAX_LINE_BYTES)
            .read_until(b'\n', &mut buf)
            .await;
        match read {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                warn!(%err, "observer read failed");
                break;
            }
        }

        let result = if buf.last() != Some(&b'\n') && buf.len() as u64 == MAX_LINE_BYTES {
            if !skip_line(&mut reader).await {
                break;
            }
            Err(ChannelError::TooLong(MAX_LINE_BYTES))
        } else {
            parse_bytes(&buf)
        };

        match result {
            Ok(update) => {
                if slot.publish(update) {
                    accepted += 1;
                } else {
                    debug!(
                        timestamp = update.timestamp,
                        "dropping out-of-order mode update"
                    );
                }
            }
            Err(ChannelError::Empty) => {}
            Err(err) => warn!(%err, "discarding mode message"),
        }
    }
    accepted
}

/// Consumes input up to and including the next newline. Returns `false` on
/// EOF or a read error.
async fn skip_line<R>(reader: &mut R) -> bool
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let (used, found) = match reader.fill_buf().await {
            Ok([]) | Err(_) => return false,
            Ok(chunk) => match chunk.iter().position(|&b| b == b'\n') {
                Some(pos) => (pos + 1, true),
                None => (chunk.len(), false),
            },
        };
        reader.consume(used);
        if found {
            return true;
        }
    }
}

#[derive(Clone, Debug)]
pub struct ListenerConfig {
    pub socket_path: PathBuf,
    pub reconnect_delay: Duration,
}

/// Background connection to the observer. Dropping it stops the thread.
pub struct ModeListener {
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ModeListener {
    pub fn spawn(config: ListenerConfig, slot: LatestSlot) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (shutdown, stop) = oneshot::channel();

        let thread = std::thread::Builder::new()
            .name("mode-channel".to_owned())
            .spawn(move || {
                runtime.block_on(async move {
                    tokio::select! {
                        _ = stop => debug!("mode listener shutting down"),
                        () = listen(config, slot) => {}
                    }
                });
            })?;

        Ok(Self {
            shutdown: Some(shutdown),
            thread: Some(thread),
        })
    }
}

impl Drop for ModeListener {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("mode listener thread panicked");
            }
        }
    }
}

/// Connects, reads until the observer hangs up, and reconnects with
/// exponential backoff. The last received mode stays in effect meanwhile.
pub async fn listen(config: ListenerConfig, slot: LatestSlot) {
    let initial_delay = config.reconnect_delay.max(Duration::from_millis(10));
    let mut delay = initial_delay;
    loop {
        match connect(&config).await {
            Ok(stream) => {
                info!(path = %config.socket_path.display(), "connected to observer");
                delay = initial_delay;
                slot.reset_ordering();
                let accepted = read_updates(tokio::io::BufReader::new(stream), &slot).await;
                info!(accepted, "observer disconnected");
            }
            Err(err) => {
                debug!(
                    %err,
                    path = %config.socket_path.display(),
                    "observer socket unavailable"
                );
            }
        }
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(MAX_RECONNECT_DELAY);
    }
}

#[cfg(unix)]
async fn connect(config: &ListenerConfig) -> io::Result<tokio::net::UnixStream> {
    tokio::net::UnixStream::connect(&config.socket_path).await
}

#[cfg(not(unix))]
async fn connect(_config: &ListenerConfig) -> io::Result<tokio::io::Empty> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "observer socket requires a Unix platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALERT: &str = r#"{"type":"state","state":"alert","intensity":0.8,"timestamp":1712}"#;

    #[test]
    fn parses_a_state_message() {
        let update = parse_line(ALERT).unwrap();
        assert_eq!(update, ModeUpdate::new(Mode::Alert, 0.8, 1712));
    }

    #[test]
    fn clamps_intensity_and_ignores_extra_fields() {
        let update = parse_line(
            r#"{"type":"state","state":"sleepy","intensity":3.5,"timestamp":1,"confidence":0.4}"#,
        )
        .unwrap();
        assert_eq!(update.intensity, 1.0);
    }

    #[test]
    fn parses_an_optional_goal() {
        let update = parse_line(
            r#"{"type":"state","state":"curious","intensity":0.5,"timestamp":3,"goal":[0.2,1.4]}"#,
        )
        .unwrap();
        assert_eq!(update.goal, Some([0.2, 1.0]));
    }

    #[test]
    fn rejects_malformed_messages() {
        for line in [
            r#"{"type":"state"}"#,
            r#"{"type":"ping","state":"idle","intensity":0.5,"timestamp":1}"#,
            r#"{"type":"state","state":"grumpy","intensity":0.5,"timestamp":1}"#,
            r#"{"type":"state","state":"idle","intensity":"high","timestamp":1}"#,
            r#"{"type":"state","state":"idle","intensity":0.5,"timestamp":-4}"#,
            r#"{"type":"state","state":"idle","intensity":0.5,"timestamp":1,"goal":[0.5]}"#,
            "not json",
            "",
        ] {
            assert!(parse_line(line).is_err(), "accepted {line:?}");
        }
        assert!(matches!(
            parse_bytes(b"\xff\xfe garbage\n"),
            Err(ChannelError::NotUtf8(_))
        ));
    }

    #[test]
    fn slot_keeps_only_the_newest() {
        let slot = LatestSlot::new();
        let at = |timestamp| ModeUpdate::new(Mode::Curious, 0.5, timestamp);
        assert!(slot.publish(at(10)));
        assert!(slot.publish(at(20)));
        assert!(!slot.publish(at(15)));
        assert_eq!(slot.take().map(|u| u.timestamp), Some(20));
        assert_eq!(slot.take(), None);
        // Older than anything already consumed is still stale.
        assert!(!slot.publish(at(5)));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn reset_ordering_accepts_a_restarted_clock() {
        let slot = LatestSlot::new();
        assert!(slot.publish(ModeUpdate::new(Mode::Alert, 1.0, 1_000_000)));
        assert!(!slot.publish(ModeUpdate::new(Mode::Sleepy, 0.2, 5)));
        slot.reset_ordering();
        // The pending update survives the reset until something newer lands.
        assert_eq!(slot.take().map(|u| u.mode), Some(Mode::Alert));
        assert!(slot.publish(ModeUpdate::new(Mode::Sleepy, 0.2, 5)));
        assert_eq!(slot.take().map(|u| u.mode), Some(Mode::Sleepy));
    }

    #[test]
    fn slot_is_shared_between_clones() {
        let writer = LatestSlot::new();
        let reader = writer.clone();
        writer.publish(ModeUpdate::new(Mode::Amused, 1.0, 1));
        assert_eq!(reader.take().map(|u| u.mode), Some(Mode::Amused));
    }

    #[tokio::test]
    async fn reader_skips_bad_lines() {
        let input = concat!(
            "{\"type\":\"state\",\"state\":\"curious\",\"intensity\":0.3,\"timestamp\":1}\n",
            "{\"type\":\"state\"}\n",
            "\n",
            "garbage\n",
            "{\"type\":\"state\",\"state\":\"focused\",\"intensity\":0.9,\"timestamp\":2}\n",
        );
        let slot = LatestSlot::new();
        let accepted = read_updates(input.as_bytes(), &slot).await;
        assert_eq!(accepted, 2);
        assert_eq!(slot.take().map(|u| u.mode), Some(Mode::Focused));
    }

    #[tokio::test]
    async fn reader_survives_invalid_utf8() {
        let mut input = b"\xff\xfe garbage\n".to_vec();
        input.extend_from_slice(ALERT.as_bytes());
        input.push(b'\n');
        let slot = LatestSlot::new();
        assert_eq!(read_updates(input.as_slice(), &slot).await, 1);
        assert_eq!(slot.take().map(|u| u.mode), Some(Mode::Alert));
    }

    #[tokio::test]
    async fn reader_skips_over_long_lines() {
        let mut input = vec![b'x'; MAX_LINE_BYTES as usize * 3];
        input.push(b'\n');
        input.extend_from_slice(ALERT.as_bytes());
        input.push(b'\n');
        let slot = LatestSlot::new();
        let reader = tokio::io::BufReader::with_capacity(512, input.as_slice());
        assert_eq!(read_updates(reader, &slot).await, 1);
        assert_eq!(slot.take().map(|u| u.timestamp), Some(1712));
    }

    #[tokio::test]
    async fn reader_accepts_a_final_line_without_newline() {
        let slot = LatestSlot::new();
        assert_eq!(read_updates(ALERT.as_bytes(), &slot).await, 1);
    }
}
