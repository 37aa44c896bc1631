//! Echo roundtrip through the public facade

#![cfg(feature = "client")]

use cellsock::handshake::compute_accept_key;
use cellsock::prelude::*;
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

/// Modem that accepts every command, upgrades the socket and echoes text
/// frames back unmasked
fn echo_modem(written: &[u8]) -> Option<Vec<u8>> {
    if written.first() == Some(&0x81) {
        let frame = Frame::parse(&mut BytesMut::from(written)).ok()?;
        return Frame::text(frame.payload).to_bytes().ok().map(|b| b.to_vec());
    }

    let text = String::from_utf8_lossy(written);
    if text.starts_with("GET ") {
        let key = text
            .lines()
            .find_map(|line| line.strip_prefix("Sec-WebSocket-Key: "))?;
        return Some(
            format!(
                "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {}\r\n\r\n",
                compute_accept_key(key.trim())
            )
            .into_bytes(),
        );
    }

    let reply = match text.trim_end() {
        "AT+CGATT?" => "\r\n+CGATT: 1\r\n\r\nOK\r\n",
        "AT+ICCID" => "\r\n+ICCID: 8944500102198304826\r\n\r\nOK\r\n",
        "AT+CIFSR" => "\r\n10.0.0.2\r\n",
        l if l.starts_with("AT+CIPSTART") => "\r\nOK\r\n\r\nCONNECT\r\n",
        l if l.starts_with("AT") => "\r\nOK\r\n",
        _ => return None,
    };
    Some(reply.as_bytes().to_vec())
}

#[test]
fn ws_echo_roundtrip() {
    let transport = MockTransport::with_responder(echo_modem);
    let clock = MockClock::new();
    let config = ClientConfig::new("echo.example.net", 80).greeting("hello");
    let mut client = ModemClient::with_clock(transport, clock.clone(), config);

    let received = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&received);
    client.on_data(move |text| sink.borrow_mut().push(text.to_string()));

    client.configure().unwrap();
    for _ in 0..50 {
        if client.is_websocket_connected() {
            break;
        }
        clock.advance(Duration::from_millis(100));
        client.handle_data();
    }
    assert!(client.is_websocket_connected());

    // greeting comes back
    client.handle_data();
    client.send_data("ping me").unwrap();
    client.handle_data();

    assert_eq!(
        *received.borrow(),
        vec!["hello".to_string(), "ping me".to_string()]
    );
    assert_eq!(client.statistics().messages_received, 2);
}
