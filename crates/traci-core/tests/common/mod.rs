//! Shared test helpers for traci-core integration tests.
//!
//! Provides a scriptable mock simulator that speaks the request/response
//! protocol over TCP and records every request frame it receives.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use traci_core::client::SimClient;
use traci_core::protocol::{decode_request, encode_response, read_frame_length, RequestFrame, ResponseFrame};

// ---------------------------------------------------------------------------
// Programmable mock simulator
// ---------------------------------------------------------------------------

/// Describes how the mock simulator handles a single incoming request frame.
pub enum MockBehavior {
    /// Read one request frame and reply with the given response.
    Respond(ResponseFrame),
    /// Read one request frame, sleep for `Duration`, then reply.
    Delay(Duration, ResponseFrame),
    /// Read one request frame and reply in chunks of the given size.
    Fragmented(ResponseFrame, usize),
    /// Read one request frame and reply with these exact bytes.
    Raw(Vec<u8>),
    /// Read one request frame and then close the connection.
    Drop,
    /// Read one request frame and send bytes that are not a valid frame.
    SendGarbage,
    /// Accept the connection but never read or write.
    Hang,
}

/// Requests received by a mock simulator, in arrival order.
pub type RequestLog = Arc<Mutex<Vec<RequestFrame>>>;

/// Start a mock simulator whose behavior is scripted per request.
///
/// Accepts exactly one connection and works through `behaviors` in order,
/// then closes the connection.
pub async fn mock_simulator(behaviors: Vec<MockBehavior>) -> (SocketAddr, RequestLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log: RequestLog = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&log);

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        for behavior in behaviors {
            if let MockBehavior::Hang = behavior {
                std::future::pending::<()>().await;
            }

            let Some(request) = read_request(&mut stream).await else {
                return;
            };
            recorded.lock().unwrap().push(request);

            match behavior {
                MockBehavior::Respond(response) => {
                    send_bytes(&mut stream, &encode_response(&response).unwrap()).await;
                }
                MockBehavior::Delay(duration, response) => {
                    tokio::time::sleep(duration).await;
                    send_bytes(&mut stream, &encode_response(&response).unwrap()).await;
                }
                MockBehavior::Fragmented(response, chunk) => {
                    let bytes = encode_response(&response).unwrap();
                    for piece in bytes.chunks(chunk.max(1)) {
                        send_bytes(&mut stream, piece).await;
                        tokio::time::sleep(Duration::from_millis(2)).await;
                    }
                }
                MockBehavior::Raw(bytes) => {
                    send_bytes(&mut stream, &bytes).await;
                }
                MockBehavior::Drop => return,
                MockBehavior::SendGarbage => {
                    // Declares a length of 2, shorter than the length prefix
                    // itself, so no valid frame can be read.
                    let garbage = [0x00, 0x00, 0x00, 0x02, 0xDE, 0xAD, 0xBE, 0xEF];
                    send_bytes(&mut stream, &garbage).await;
                }
                MockBehavior::Hang => unreachable!(),
            }
        }
    });

    (addr, log)
}

/// Connect a [`SimClient`] to a freshly started mock simulator.
pub async fn connected_client(behaviors: Vec<MockBehavior>) -> (SimClient, RequestLog) {
    let (addr, log) = mock_simulator(behaviors).await;
    let mut client = SimClient::new(addr);
    client.connect().await.unwrap();
    (client, log)
}

/// Read and decode one request frame, or `None` once the peer is gone.
pub async fn read_request(stream: &mut TcpStream) -> Option<RequestFrame> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await.ok()?;
    let len = read_frame_length(&header) as usize;
    let mut frame = header.to_vec();
    frame.resize(len.max(4), 0);
    stream.read_exact(&mut frame[4..]).await.ok()?;
    decode_request(&frame).ok()
}

async fn send_bytes(stream: &mut TcpStream, bytes: &[u8]) {
    let _ = stream.write_all(bytes).await;
    let _ = stream.flush().await;
}
