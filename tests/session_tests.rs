//! End-to-end tests over real loopback sockets: one task plays a minimal
//! mock panel, the other drives a `Session` against it.

use protege_acs::{Config, Session, SessionState};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const CMD_SYSTEM: u8 = 0xC0;
const SUBCMD_LOGIN: u8 = 0x02;
const SUBCMD_ARE_YOU_THERE: u8 = 0x01;

fn sum8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

fn encode(packet_type: u8, payload: &[u8]) -> Vec<u8> {
    let total_len = (6 + payload.len() + 1) as u16;
    let mut buf = Vec::with_capacity(total_len as usize);
    buf.extend_from_slice(b"IC");
    buf.extend_from_slice(&total_len.to_le_bytes());
    buf.push(packet_type);
    buf.push(0x00);
    buf.extend_from_slice(payload);
    buf.push(sum8(&buf));
    buf
}

async fn read_frame(stream: &mut TcpStream) -> (u8, Vec<u8>) {
    let mut prolog = [0u8; 4];
    stream.read_exact(&mut prolog).await.unwrap();
    let total_len = u16::from_le_bytes([prolog[2], prolog[3]]) as usize;
    let mut rest = vec![0u8; total_len - 4];
    stream.read_exact(&mut rest).await.unwrap();
    let packet_type = rest[0];
    let payload = rest[2..rest.len() - 1].to_vec();
    (packet_type, payload)
}

async fn bind_mock() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn test_session(port: u16) -> Session {
    Session::new(Config::new("127.0.0.1", port, "1234").unwrap())
}

#[tokio::test]
async fn login_succeeds_on_ack() {
    let (listener, port) = bind_mock().await;

    let panel = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        // are-you-there probe: answer with ACK.
        let (_, payload) = read_frame(&mut stream).await;
        assert_eq!(payload[0], CMD_SYSTEM);
        stream.write_all(&encode(CMD_SYSTEM, &[0xFF, 0x00])).await.unwrap();

        // login
        let (_, payload) = read_frame(&mut stream).await;
        assert_eq!(&payload[0..2], &[CMD_SYSTEM, SUBCMD_LOGIN]);
        assert_eq!(&payload[2..6], &[1, 2, 3, 4]);
        assert_eq!(payload[6], 0xFF);
        stream.write_all(&encode(CMD_SYSTEM, &[0xFF, 0x00])).await.unwrap();

        // set login time
        let _ = read_frame(&mut stream).await;
        stream.write_all(&encode(CMD_SYSTEM, &[0xFF, 0x00])).await.unwrap();

        // ack config
        let _ = read_frame(&mut stream).await;
        stream.write_all(&encode(CMD_SYSTEM, &[0xFF, 0x00])).await.unwrap();

        stream
    });

    let session = test_session(port);
    session.connect().await.unwrap();
    session.login().await.unwrap();

    assert_eq!(session.state(), SessionState::Authenticated);
    assert!(session.is_connected());

    panel.await.unwrap();
}

#[tokio::test]
async fn login_rejected_with_nack_surfaces_error_code() {
    let (listener, port) = bind_mock().await;

    let panel = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let _ = read_frame(&mut stream).await; // are-you-there
        stream.write_all(&encode(CMD_SYSTEM, &[0xFF, 0x00])).await.unwrap();

        let _ = read_frame(&mut stream).await; // login
        stream
            .write_all(&encode(CMD_SYSTEM, &[0xFF, 0xFF, 0x02, 0x03]))
            .await
            .unwrap();
    });

    let session = test_session(port);
    session.connect().await.unwrap();
    let err = session.login().await.unwrap_err();

    assert!(matches!(err, protege_acs::Error::AuthenticationFailed { code: 0x0302 }));
    assert_eq!(session.state(), SessionState::Connected);

    panel.await.unwrap();
}

#[tokio::test]
async fn connect_tolerates_a_silent_probe() {
    let (listener, port) = bind_mock().await;

    let panel = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let (_, payload) = read_frame(&mut stream).await;
        assert_eq!(payload[0], CMD_SYSTEM);
        // Never answer the probe; just hold the connection open briefly.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        stream
    });

    let session = test_session(port);
    session.connect().await.unwrap();
    assert_eq!(session.state(), SessionState::Connected);

    panel.await.unwrap();
}

#[tokio::test]
async fn pushed_door_status_updates_cache_and_is_acked_exactly_once() {
    use std::sync::mpsc as std_mpsc;

    let (listener, port) = bind_mock().await;

    let panel = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let _ = read_frame(&mut stream).await; // are-you-there
        stream.write_all(&encode(CMD_SYSTEM, &[0xFF, 0x00])).await.unwrap();

        // Give the client a moment to register its door listener before the push arrives.
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;

        let mut push = Vec::new();
        push.extend_from_slice(&0x0100u16.to_le_bytes());
        push.push(6);
        push.extend_from_slice(&[9, 0, 0, 0, 1, 0]);
        push.extend_from_slice(&0xFFFFu16.to_le_bytes());
        stream.write_all(&encode(0x01, &push)).await.unwrap();

        let (ack_type, ack_payload) = read_frame(&mut stream).await;
        assert_eq!(ack_type, CMD_SYSTEM);
        assert_eq!(ack_payload, vec![0xFF, 0x00]);
    });

    let session = test_session(port);
    session.connect().await.unwrap();

    let (tx, rx) = std_mpsc::channel();
    let _handle = session.on_door(move |door| tx.send(door).unwrap());

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let door = rx.try_recv().unwrap();
    assert_eq!(door.index, 9);
    assert!(door.is_locked);

    let cached = session.door(9).unwrap();
    assert_eq!(cached.index, 9);

    panel.await.unwrap();
}

#[tokio::test]
async fn concurrent_calls_serialize_onto_one_in_flight_command() {
    let (listener, port) = bind_mock().await;

    let panel = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let _ = read_frame(&mut stream).await; // are-you-there
        stream.write_all(&encode(CMD_SYSTEM, &[0xFF, 0x00])).await.unwrap();

        let _ = read_frame(&mut stream).await; // login
        stream.write_all(&encode(CMD_SYSTEM, &[0xFF, 0x00])).await.unwrap();
        let _ = read_frame(&mut stream).await; // set login time
        stream.write_all(&encode(CMD_SYSTEM, &[0xFF, 0x00])).await.unwrap();
        let _ = read_frame(&mut stream).await; // ack config
        stream.write_all(&encode(CMD_SYSTEM, &[0xFF, 0x00])).await.unwrap();

        // Two commands must arrive one at a time, each answered before the next appears.
        for _ in 0..2 {
            let _ = read_frame(&mut stream).await;
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            stream.write_all(&encode(CMD_SYSTEM, &[0xFF, 0x00])).await.unwrap();
        }
    });

    let session = std::sync::Arc::new(test_session(port));
    session.connect().await.unwrap();
    session.login().await.unwrap();

    let a = {
        let session = std::sync::Arc::clone(&session);
        tokio::spawn(async move { session.lock_door(1).await })
    };
    let b = {
        let session = std::sync::Arc::clone(&session);
        tokio::spawn(async move { session.lock_door(2).await })
    };

    let (ra, rb) = tokio::join!(a, b);
    ra.unwrap().unwrap();
    rb.unwrap().unwrap();

    panel.await.unwrap();
}

#[tokio::test]
async fn get_status_returns_none_for_index_not_valid_nack() {
    let (listener, port) = bind_mock().await;

    let panel = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let _ = read_frame(&mut stream).await; // are-you-there
        stream.write_all(&encode(CMD_SYSTEM, &[0xFF, 0x00])).await.unwrap();

        let _ = read_frame(&mut stream).await; // login
        stream.write_all(&encode(CMD_SYSTEM, &[0xFF, 0x00])).await.unwrap();
        let _ = read_frame(&mut stream).await; // set login time
        stream.write_all(&encode(CMD_SYSTEM, &[0xFF, 0x00])).await.unwrap();
        let _ = read_frame(&mut stream).await; // ack config
        stream.write_all(&encode(CMD_SYSTEM, &[0xFF, 0x00])).await.unwrap();

        let _ = read_frame(&mut stream).await; // door status request
        stream
            .write_all(&encode(CMD_SYSTEM, &[0xFF, 0xFF, 0x21, 0x01]))
            .await
            .unwrap();
    });

    let session = test_session(port);
    session.connect().await.unwrap();
    session.login().await.unwrap();

    let status = session.get_door_status(999).await.unwrap();
    assert!(status.is_none());

    panel.await.unwrap();
}

#[tokio::test]
async fn call_before_login_is_not_authenticated() {
    let (listener, port) = bind_mock().await;

    let panel = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let _ = read_frame(&mut stream).await; // are-you-there
        stream.write_all(&encode(CMD_SYSTEM, &[0xFF, 0x00])).await.unwrap();
        stream
    });

    let session = test_session(port);
    session.connect().await.unwrap();

    let err = session.lock_door(1).await.unwrap_err();
    assert!(matches!(err, protege_acs::Error::NotAuthenticated));

    panel.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn keepalive_sends_are_you_there_after_30_seconds() {
    let (listener, port) = bind_mock().await;

    let panel = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let _ = read_frame(&mut stream).await; // are-you-there probe
        stream.write_all(&encode(CMD_SYSTEM, &[0xFF, 0x00])).await.unwrap();

        let _ = read_frame(&mut stream).await; // login
        stream.write_all(&encode(CMD_SYSTEM, &[0xFF, 0x00])).await.unwrap();
        let _ = read_frame(&mut stream).await; // set login time
        stream.write_all(&encode(CMD_SYSTEM, &[0xFF, 0x00])).await.unwrap();
        let _ = read_frame(&mut stream).await; // ack config
        stream.write_all(&encode(CMD_SYSTEM, &[0xFF, 0x00])).await.unwrap();

        // Keepalive fires without any caller awaiting a response.
        let (_, payload) = read_frame(&mut stream).await;
        assert_eq!(&payload[0..2], &[CMD_SYSTEM, SUBCMD_ARE_YOU_THERE]);
    });

    let session = test_session(port);
    session.connect().await.unwrap();
    session.login().await.unwrap();

    tokio::time::advance(std::time::Duration::from_secs(30)).await;

    panel.await.unwrap();
}
