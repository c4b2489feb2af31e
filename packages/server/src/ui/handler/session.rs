//! Per-connection session handler.
//!
//! Drives one connection through `Admitting → Active → Leaving → Closed`:
//!
//! 1. Admitting: read the name line, build the handle, try to take a registry
//!    slot. A stream that ends before the name line closes silently; a
//!    rejected connection gets one notice line and is closed without ever
//!    being registered.
//! 2. Active: announce `[<name>] joined`, then relay every chunk read.
//! 3. Leaving: announce `[<name>] left`, leave the registry, close.
//!
//! The task owns its handle and registry slot. The slot is a drop guard, so
//! the session is evicted even if this task unwinds.

use std::{fmt, net::SocketAddr, sync::Arc};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, BufReader};

use crate::domain::{
    AdmitError, ChatLine, ConnectionHandle, DisplayName, SERVER_FULL_NOTICE, SHUTDOWN_NOTICE,
    Timestamp,
};
use crate::ui::{error::HandshakeError, state::AppState};

/// Why an active session ended.
#[derive(Debug)]
pub enum LeaveReason {
    /// Zero-length read: the client closed its side
    ClientClosed,
    /// Non-transient read error
    ReadFailed(std::io::Error),
    /// The handle was closed by the shutdown path
    ForcedClose,
}

impl fmt::Display for LeaveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientClosed => f.write_str("client closed the connection"),
            Self::ReadFailed(e) => write!(f, "read failed: {e}"),
            Self::ForcedClose => f.write_str("closed by server"),
        }
    }
}

/// Run one connection to completion.
pub async fn handle_connection<R, W>(state: Arc<AppState>, reader: R, writer: W, peer: SocketAddr)
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Send + 'static,
{
    let mut reader = BufReader::new(reader);

    // Admitting
    let raw_name = match read_handshake(&mut reader, state.config.max_line_len).await {
        Ok(raw_name) => raw_name,
        Err(e) => {
            tracing::debug!("Handshake with {} ended: {}", peer, e);
            return;
        }
    };

    let handle = ConnectionHandle::new(
        state.connection_ids.generate(),
        DisplayName::from_handshake(&raw_name, peer),
        Timestamp::new(state.clock.now_millis()),
        writer,
    );

    let membership = match state.admit_session_usecase.execute(handle.clone()) {
        Ok(membership) => membership,
        Err(e) => {
            reject(&handle, &e, peer).await;
            return;
        }
    };

    tracing::info!(
        "'{}' ({}) joined from {} at {} [{}/{}]",
        handle.name(),
        handle.id(),
        peer,
        handle.connected_at(),
        state.registry.len(),
        state.registry.capacity()
    );

    // Active
    state.admit_session_usecase.announce_joined(&handle).await;
    let reason = relay_loop(&state, &handle, &mut reader).await;

    // Leaving
    state
        .leave_session_usecase
        .execute(&handle, &membership)
        .await;

    tracing::info!(
        "'{}' ({}) left: {} (session lasted {} ms)",
        handle.name(),
        handle.id(),
        reason,
        handle
            .connected_at()
            .millis_until(Timestamp::new(state.clock.now_millis()))
    );
}

/// Read the name line.
///
/// The line must end in `\n` within `limit` bytes. Anything else means the
/// peer never completed the handshake.
pub async fn read_handshake<R>(reader: &mut R, limit: usize) -> Result<String, HandshakeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let read = reader
        .take(limit as u64)
        .read_until(b'\n', &mut line)
        .await?;

    if line.last() != Some(&b'\n') {
        return Err(if read >= limit {
            HandshakeError::LineTooLong(limit)
        } else {
            HandshakeError::Closed
        });
    }

    Ok(String::from_utf8_lossy(&line).into_owned())
}

async fn reject(handle: &ConnectionHandle, reason: &AdmitError, peer: SocketAddr) {
    tracing::warn!(
        "Rejected '{}' from {}: {}",
        handle.name(),
        peer,
        reason
    );

    let notice = match reason {
        AdmitError::AtCapacity { .. } => Some(SERVER_FULL_NOTICE),
        AdmitError::ShuttingDown => Some(SHUTDOWN_NOTICE),
        AdmitError::Duplicate(_) => None,
    };
    if let Some(notice) = notice
        && let Err(e) = handle.send(ChatLine::notice(notice).as_bytes()).await
    {
        tracing::debug!("Could not send rejection notice to {}: {}", peer, e);
    }

    handle.close().await;
}

async fn relay_loop<R>(state: &AppState, handle: &ConnectionHandle, reader: &mut R) -> LeaveReason
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; state.config.read_buffer_size.max(1)];

    loop {
        let read = tokio::select! {
            read = reader.read(&mut buf) => read,
            _ = handle.closed() => return LeaveReason::ForcedClose,
        };

        match read {
            Ok(0) => return LeaveReason::ClientClosed,
            Ok(n) => {
                state
                    .relay_message_usecase
                    .execute(handle, &buf[..n])
                    .await;
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return LeaveReason::ReadFailed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::HistoryLog,
        infrastructure::FileHistoryLog,
        ui::config::ServerConfig,
    };
    use relay_shared::time::FixedClock;
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, DuplexStream, duplex};

    struct Peer {
        to_server: DuplexStream,
        from_server: DuplexStream,
        task: tokio::task::JoinHandle<()>,
    }

    fn state_with_capacity(capacity: usize, history: Arc<dyn HistoryLog>) -> Arc<AppState> {
        let config = ServerConfig {
            capacity,
            console: false,
            ..ServerConfig::default()
        };
        Arc::new(AppState::with_clock(
            config,
            history,
            Arc::new(FixedClock::new(1_700_000_000_000)),
        ))
    }

    fn connect(state: &Arc<AppState>, port: u16) -> Peer {
        let (to_server, server_reader) = duplex(4096);
        let (server_writer, from_server) = duplex(4096);
        let peer: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
        let task = tokio::spawn(handle_connection(
            state.clone(),
            server_reader,
            server_writer,
            peer,
        ));
        Peer {
            to_server,
            from_server,
            task,
        }
    }

    async fn expect_line(peer: &mut Peer, expected: &[u8]) {
        let mut buf = vec![0u8; expected.len()];
        tokio::time::timeout(Duration::from_secs(5), peer.from_server.read_exact(&mut buf))
            .await
            .expect("timed out waiting for line")
            .unwrap();
        assert_eq!(
            String::from_utf8_lossy(&buf),
            String::from_utf8_lossy(expected)
        );
    }

    async fn wait_for_len(state: &AppState, len: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while state.registry.len() != len {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("registry never reached expected size");
    }

    fn history() -> (tempfile::TempDir, Arc<FileHistoryLog>) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let log = Arc::new(FileHistoryLog::new(dir.path().join("chat_history")));
        (dir, log)
    }

    #[tokio::test]
    async fn test_read_handshake_returns_line() {
        // テスト項目: 改行までの 1 行が名前として読まれ、残りはバッファに残る
        // given (前提条件):
        let mut reader = BufReader::new(&b"alice\nhello\n"[..]);

        // when (操作):
        let name = read_handshake(&mut reader, 1104).await.unwrap();
        let mut rest = String::new();
        reader.read_to_string(&mut rest).await.unwrap();

        // then (期待する結果):
        assert_eq!(name, "alice\n");
        assert_eq!(rest, "hello\n");
    }

    #[tokio::test]
    async fn test_read_handshake_closed_before_newline() {
        // テスト項目: 改行前に切断された場合は Closed
        // given (前提条件):
        let mut reader = BufReader::new(&b"ali"[..]);

        // when (操作):
        let result = read_handshake(&mut reader, 1104).await;

        // then (期待する結果):
        assert!(matches!(result, Err(HandshakeError::Closed)));
    }

    #[tokio::test]
    async fn test_read_handshake_line_too_long() {
        // テスト項目: 上限を超える名前行は LineTooLong
        // given (前提条件):
        let data = vec![b'a'; 64];
        let mut reader = BufReader::new(&data[..]);

        // when (操作):
        let result = read_handshake(&mut reader, 16).await;

        // then (期待する結果):
        assert!(matches!(result, Err(HandshakeError::LineTooLong(16))));
    }

    #[tokio::test]
    async fn test_join_relay_and_leave() {
        // テスト項目: join → メッセージ中継 → left の一連の流れ（シナリオ A / C）
        // given (前提条件):
        let (dir, log) = history();
        let state = state_with_capacity(8, log);
        let mut bob = connect(&state, 1001);
        bob.to_server.write_all(b"bob\n").await.unwrap();
        wait_for_len(&state, 1).await;

        // when (操作):
        let mut alice = connect(&state, 1002);
        alice.to_server.write_all(b"alice\n").await.unwrap();
        expect_line(&mut bob, b"[alice] joined\n").await;
        alice.to_server.write_all(b"hello\n").await.unwrap();
        expect_line(&mut bob, b"[alice] hello\n").await;
        drop(alice.to_server);

        // then (期待する結果):
        expect_line(&mut bob, b"[alice] left\n").await;
        alice.task.await.unwrap();
        assert_eq!(state.registry.len(), 1);

        // alice never received her own lines
        let mut echoed = Vec::new();
        alice.from_server.read_to_end(&mut echoed).await.unwrap();
        assert!(echoed.is_empty());

        let content = std::fs::read_to_string(dir.path().join("chat_history")).unwrap();
        assert_eq!(
            content,
            "[bob] joined\n[alice] joined\n[alice] hello\n[alice] left\n"
        );
    }

    #[tokio::test]
    async fn test_history_matches_broadcast_bytes_for_non_utf8_payload() {
        // テスト項目: UTF-8 でない発言も、履歴には配信したバイト列がそのまま残る
        // given (前提条件):
        let (dir, log) = history();
        let state = state_with_capacity(8, log);
        let mut bob = connect(&state, 1001);
        bob.to_server.write_all(b"bob\n").await.unwrap();
        wait_for_len(&state, 1).await;
        let mut alice = connect(&state, 1002);
        alice.to_server.write_all(b"alice\n").await.unwrap();
        expect_line(&mut bob, b"[alice] joined\n").await;

        // when (操作):
        alice.to_server.write_all(b"caf\xe9\n").await.unwrap();
        let mut received = vec![0u8; b"[alice] caf\xe9\n".len()];
        tokio::time::timeout(Duration::from_secs(5), bob.from_server.read_exact(&mut received))
            .await
            .expect("timed out waiting for line")
            .unwrap();
        drop(alice.to_server);
        alice.task.await.unwrap();

        // then (期待する結果):
        assert_eq!(received, b"[alice] caf\xe9\n");
        let content = std::fs::read(dir.path().join("chat_history")).unwrap();
        let logged: Vec<&[u8]> = content.split(|b| *b == b'\n').collect();
        assert!(logged.contains(&&received[..received.len() - 1]));
    }

    #[tokio::test]
    async fn test_empty_name_uses_peer_address() {
        // テスト項目: 空の名前の場合は address:port が表示名になる
        // given (前提条件):
        let (_dir, log) = history();
        let state = state_with_capacity(8, log);
        let mut bob = connect(&state, 1001);
        bob.to_server.write_all(b"bob\n").await.unwrap();
        wait_for_len(&state, 1).await;

        // when (操作):
        let mut anon = connect(&state, 5555);
        anon.to_server.write_all(b"\n").await.unwrap();

        // then (期待する結果):
        expect_line(&mut bob, b"[127.0.0.1:5555] joined\n").await;
        anon.to_server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_when_full() {
        // テスト項目: 満員の場合は Server full. が 1 行届いて切断され、登録されない（シナリオ B）
        // given (前提条件):
        let (_dir, log) = history();
        let state = state_with_capacity(1, log);
        let mut bob = connect(&state, 1001);
        bob.to_server.write_all(b"bob\n").await.unwrap();
        wait_for_len(&state, 1).await;

        // when (操作):
        let mut carol = connect(&state, 1003);
        carol.to_server.write_all(b"carol\n").await.unwrap();

        // then (期待する結果):
        let mut received = Vec::new();
        carol.from_server.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"Server full.\n");
        carol.task.await.unwrap();
        assert_eq!(state.registry.len(), 1);

        // bob saw nothing about carol
        bob.to_server.write_all(b"still here\n").await.unwrap();
        drop(bob.to_server);
        let mut rest = Vec::new();
        bob.from_server.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_closed_before_name_is_never_registered() {
        // テスト項目: 名前を送る前に切断した接続は登録されず、何も配信されない
        // given (前提条件):
        let (_dir, log) = history();
        let state = state_with_capacity(8, log);

        // when (操作):
        let peer = connect(&state, 1001);
        drop(peer.to_server);
        peer.task.await.unwrap();

        // then (期待する結果):
        assert!(state.registry.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_ends_active_sessions() {
        // テスト項目: シャットダウンで全セッションが閉じられ、各タスクが終了する
        // given (前提条件):
        let (_dir, log) = history();
        let state = state_with_capacity(8, log);
        let mut alice = connect(&state, 1001);
        alice.to_server.write_all(b"alice\n").await.unwrap();
        wait_for_len(&state, 1).await;
        let mut bob = connect(&state, 1002);
        bob.to_server.write_all(b"bob\n").await.unwrap();
        wait_for_len(&state, 2).await;
        expect_line(&mut alice, b"[bob] joined\n").await;

        // when (操作):
        let closed = state.shutdown_usecase.execute().await;

        // then (期待する結果):
        assert_eq!(closed, 2);
        assert!(state.registry.is_empty());
        for peer in [alice, bob] {
            let Peer {
                mut from_server,
                task,
                to_server: _keep_open,
            } = peer;
            let mut received = Vec::new();
            from_server.read_to_end(&mut received).await.unwrap();
            assert_eq!(received, b"Server is shutting down.\n");
            tokio::time::timeout(Duration::from_secs(5), task)
                .await
                .expect("session task did not finish")
                .unwrap();
        }
    }
}
