// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Transport session and delivery protocol.
//!
//! One UDP socket per configuration scope, connected to the collector at
//! setup time and reused for the process lifetime. Delivery is a bounded
//! send / await-echo / compare-length loop: the collector acknowledges a
//! record by echoing back the number of bytes it received. That byte-count
//! echo is the existing collector contract and is preserved as-is; a
//! conventional ack token would break deployed collectors.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::SetupError;
use crate::record::Record;

/// Delivery gives up after this many retries (four attempts in total).
pub const MAX_DELIVERY_RETRIES: u32 = 3;

/// Largest acknowledgment payload accepted: a native integer echoed by the
/// collector, 4 or 8 bytes wide depending on its platform.
const ACK_BUF_SIZE: usize = 8;

/// Outcome of one delivery call. Informational only; delivery never fails
/// the request that produced the record.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeliveryOutcome {
    /// Bytes handed to the socket, or -1 when the send itself failed.
    pub bytes_sent: i64,
    /// Byte count the collector echoed back, or -1 on timeout, receive
    /// error, or an unparseable ack payload.
    pub bytes_acked: i64,
    /// Retries consumed before the loop exited (0 on first-round success).
    pub retries_used: u32,
    pub success: bool,
}

/// One UDP socket bound to a single collector, shared by every request in
/// the owning configuration scope.
///
/// The send/await-ack pair is made atomic per call by holding an internal
/// lock for the whole round trip, so hosts that invoke the log hook
/// concurrently from several workers of one scope cannot interleave their
/// acknowledgments.
pub struct TransportSession {
    socket: Mutex<UdpSocket>,
    peer: SocketAddr,
    recv_timeout: Duration,
}

impl TransportSession {
    /// Open the session socket for one configuration scope.
    ///
    /// Fails the whole configuration step when the destination is unset,
    /// does not resolve, or the socket cannot be created. None of these are
    /// recoverable at runtime; the operator sees them before the service
    /// handles requests.
    pub async fn connect(config: &Config) -> Result<TransportSession, SetupError> {
        if config.collector_host.is_empty() || config.collector_port == 0 {
            return Err(SetupError::MissingDestination);
        }

        // Bare IPv6 literals need brackets before a port can be appended.
        let host = &config.collector_host;
        let addr = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, config.collector_port)
        } else {
            format!("{}:{}", host, config.collector_port)
        };
        let peer = lookup_host(addr.clone())
            .await
            .map_err(SetupError::Socket)?
            .next()
            .ok_or(SetupError::Resolve { addr })?;

        let bind_addr = if peer.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(SetupError::Socket)?;
        socket.connect(peer).await.map_err(SetupError::Socket)?;

        debug!("log2udp session connected to {}", peer);

        Ok(TransportSession {
            socket: Mutex::new(socket),
            peer,
            recv_timeout: config.timeout(),
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn recv_timeout(&self) -> Duration {
        self.recv_timeout
    }

    /// Ship one record: send the full record as one datagram, await the
    /// collector's byte-count echo up to the receive timeout, and retry up
    /// to [`MAX_DELIVERY_RETRIES`] times on timeout, receive error, or a
    /// count mismatch. Exits immediately on the first successful round.
    ///
    /// Every failed round logs a warning with bytes sent, bytes acked, and
    /// the next retry number. With `debug_echo` set, the full record is
    /// logged at the end of the call regardless of outcome. Send and
    /// receive failures are absorbed; the caller always gets an outcome.
    pub async fn deliver(&self, record: &Record, debug_echo: bool) -> DeliveryOutcome {
        let socket = self.socket.lock().await;

        let mut retry = 0u32;
        let outcome = loop {
            let bytes_sent = match socket.send(record.as_bytes()).await {
                Ok(n) => n as i64,
                Err(e) => {
                    debug!("UDP send failed: {}", e);
                    -1
                }
            };
            let bytes_acked = await_ack(&socket, self.recv_timeout).await;

            let round = DeliveryOutcome {
                bytes_sent,
                bytes_acked,
                retries_used: retry,
                success: bytes_sent >= 0 && bytes_acked == bytes_sent,
            };
            if round.success {
                break round;
            }

            warn!(
                "UDP send (FAILED) sent ({} bytes) acked ({} bytes) [next retry: {}]",
                bytes_sent,
                bytes_acked,
                retry + 1
            );
            if retry == MAX_DELIVERY_RETRIES {
                break round;
            }
            retry += 1;
        };

        if debug_echo {
            debug!(
                "--- log2udp# {}",
                String::from_utf8_lossy(record.as_bytes())
            );
        }

        outcome
    }
}

async fn await_ack(socket: &UdpSocket, recv_timeout: Duration) -> i64 {
    let mut buf = [0u8; ACK_BUF_SIZE];
    match timeout(recv_timeout, socket.recv(&mut buf)).await {
        Ok(Ok(received)) => decode_ack(&buf[..received]),
        Ok(Err(e)) => {
            debug!("ack receive failed: {}", e);
            -1
        }
        Err(_) => -1, // timed out waiting for the echo
    }
}

/// Decode the collector's echoed byte count. Any framing other than a 4- or
/// 8-byte native integer is a protocol violation and counts as ack failure.
fn decode_ack(payload: &[u8]) -> i64 {
    match payload.len() {
        4 => {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(payload);
            i64::from(i32::from_ne_bytes(raw))
        }
        8 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(payload);
            i64::from_ne_bytes(raw)
        }
        _ => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;
    use tracing_test::traced_test;

    enum CollectorMode {
        EchoCount,
        Silent,
        WrongCount,
    }

    /// Loopback stand-in for the remote collector: receives datagrams,
    /// counts them, and acks according to its mode.
    async fn spawn_collector(mode: CollectorMode) -> (SocketAddr, Arc<AtomicUsize>) {
        spawn_collector_at("127.0.0.1:0", mode).await
    }

    async fn spawn_collector_at(
        bind: &str,
        mode: CollectorMode,
    ) -> (SocketAddr, Arc<AtomicUsize>) {
        let socket = UdpSocket::bind(bind)
            .await
            .expect("collector bind failed");
        let addr = socket.local_addr().expect("collector addr");
        let received = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&received);

        tokio::spawn(async move {
            let mut buf = [0u8; 8192];
            loop {
                let (n, src) = match socket.recv_from(&mut buf).await {
                    Ok(pair) => pair,
                    Err(_) => break,
                };
                counter.fetch_add(1, Ordering::SeqCst);
                match mode {
                    CollectorMode::EchoCount => {
                        let ack = (n as i64).to_ne_bytes();
                        let _ = socket.send_to(&ack, src).await;
                    }
                    CollectorMode::Silent => {}
                    CollectorMode::WrongCount => {
                        let ack = (n as i64 + 1).to_ne_bytes();
                        let _ = socket.send_to(&ack, src).await;
                    }
                }
            }
        });

        (addr, received)
    }

    fn test_config(addr: SocketAddr, timeout_us: u64) -> Config {
        Config {
            enabled: true,
            collector_host: addr.ip().to_string(),
            collector_port: addr.port(),
            timeout_us,
            debug: false,
        }
    }

    fn test_record() -> Record {
        let mut record = Record::new();
        record
            .join(b"remote_addr\x0210.0.0.1")
            .expect("chunk fits");
        record.join(b"status\x02200").expect("chunk fits");
        record
    }

    #[tokio::test]
    async fn test_deliver_first_round_success() {
        let (addr, received) = spawn_collector(CollectorMode::EchoCount).await;
        let session = TransportSession::connect(&test_config(addr, 250_000))
            .await
            .expect("session setup failed");

        let record = test_record();
        let outcome = session.deliver(&record, false).await;

        assert!(outcome.success);
        assert_eq!(outcome.retries_used, 0);
        assert_eq!(outcome.bytes_sent, record.len() as i64);
        assert_eq!(outcome.bytes_acked, outcome.bytes_sent);

        sleep(Duration::from_millis(50)).await;
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_deliver_retry_exhaustion_on_silent_collector() {
        let (addr, received) = spawn_collector(CollectorMode::Silent).await;
        let session = TransportSession::connect(&test_config(addr, 10_000))
            .await
            .expect("session setup failed");

        let outcome = session.deliver(&test_record(), false).await;

        assert!(!outcome.success);
        assert_eq!(outcome.retries_used, MAX_DELIVERY_RETRIES);
        assert_eq!(outcome.bytes_acked, -1);

        sleep(Duration::from_millis(50)).await;
        assert_eq!(received.load(Ordering::SeqCst), 4);

        // one warning per failed round, final round included
        assert!(logs_contain("[next retry: 1]"));
        assert!(logs_contain("[next retry: 4]"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_deliver_wrong_count_retries_then_fails() {
        let (addr, _received) = spawn_collector(CollectorMode::WrongCount).await;
        let session = TransportSession::connect(&test_config(addr, 250_000))
            .await
            .expect("session setup failed");

        let record = test_record();
        let outcome = session.deliver(&record, false).await;

        assert!(!outcome.success);
        assert_eq!(outcome.retries_used, MAX_DELIVERY_RETRIES);
        assert_eq!(outcome.bytes_acked, outcome.bytes_sent + 1);
        assert!(logs_contain("UDP send (FAILED)"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_deliver_debug_echo_logs_record() {
        let (addr, _received) = spawn_collector(CollectorMode::EchoCount).await;
        let session = TransportSession::connect(&test_config(addr, 250_000))
            .await
            .expect("session setup failed");

        session.deliver(&test_record(), true).await;

        assert!(logs_contain("--- log2udp#"));
    }

    #[tokio::test]
    async fn test_deliver_to_ipv6_collector() {
        let (addr, received) = spawn_collector_at("[::1]:0", CollectorMode::EchoCount).await;
        let session = TransportSession::connect(&test_config(addr, 250_000))
            .await
            .expect("session setup failed");

        let outcome = session.deliver(&test_record(), false).await;

        assert!(outcome.success);
        assert_eq!(outcome.bytes_acked, outcome.bytes_sent);

        sleep(Duration::from_millis(50)).await;
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_resolves_hostnames() {
        let config = Config {
            enabled: true,
            collector_host: "localhost".to_string(),
            collector_port: 6514,
            timeout_us: 250_000,
            debug: false,
        };

        let session = TransportSession::connect(&config)
            .await
            .expect("hostname destination resolves");

        assert_eq!(session.peer().port(), 6514);
        assert!(session.peer().ip().is_loopback());
    }

    #[tokio::test]
    async fn test_connect_rejects_unset_destination() {
        let no_host = Config {
            collector_port: 9999,
            ..Config::default()
        };
        assert!(matches!(
            TransportSession::connect(&no_host).await,
            Err(SetupError::MissingDestination)
        ));

        let no_port = Config {
            collector_host: "127.0.0.1".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            TransportSession::connect(&no_port).await,
            Err(SetupError::MissingDestination)
        ));
    }

    #[tokio::test]
    async fn test_connect_applies_default_timeout() {
        let (addr, _received) = spawn_collector(CollectorMode::EchoCount).await;
        let session = TransportSession::connect(&test_config(addr, 0))
            .await
            .expect("session setup failed");

        assert_eq!(session.recv_timeout(), Duration::from_micros(5000));
        assert_eq!(session.peer(), addr);
    }

    #[test]
    fn test_decode_ack_widths() {
        assert_eq!(decode_ack(&42i32.to_ne_bytes()), 42);
        assert_eq!(decode_ack(&42i64.to_ne_bytes()), 42);
        assert_eq!(decode_ack(b""), -1);
        assert_eq!(decode_ack(b"ok"), -1);
        assert_eq!(decode_ack(b"not an int"), -1);
    }
}
