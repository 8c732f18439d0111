mod common;

use common::{free_udp_port, spawn_runtime};
use gaze_bridge::handshake::{
    perform_handshake, HandshakeClient, HandshakeError, HandshakeSettings, DATAGRAM_SIZE,
    PATH_SIZE,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;

fn calibration_bytes() -> Vec<u8> {
    (0..DATAGRAM_SIZE).map(|i| (i * 7 % 251) as u8).collect()
}

#[tokio::test]
async fn handshake_returns_path_and_calibration() {
    let recv_port = free_udp_port();
    let calibration = calibration_bytes();
    let (runtime_addr, runtime) = spawn_runtime(recv_port, "C:\\calib\\", calibration.clone()).await;

    let blob = perform_handshake(runtime_addr, recv_port, Duration::from_secs(2))
        .await
        .expect("handshake succeeds");

    assert_eq!(blob.path, "C:\\calib\\");
    assert_eq!(blob.path_len, PATH_SIZE);
    assert_eq!(blob.path_len, 512);
    assert_eq!(blob.received_len, DATAGRAM_SIZE);
    assert_eq!(blob.coefficients.as_slice(), calibration.as_slice());

    let requests = runtime.await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].len(), DATAGRAM_SIZE);
    assert_eq!(&requests[0][..4], b"path");
    assert!(requests[0][4..].iter().all(|b| *b == 0));
    assert_eq!(requests[1].len(), DATAGRAM_SIZE);
    assert_eq!(&requests[1][..7], b"request");
    assert!(requests[1][7..].iter().all(|b| *b == 0));

    // Receive socket released after success
    UdpSocket::bind(("127.0.0.1", recv_port))
        .await
        .expect("receive port free again");
}

#[tokio::test]
async fn short_calibration_reply_is_zero_filled() {
    let recv_port = free_udp_port();
    let (runtime_addr, _runtime) = spawn_runtime(recv_port, "D:\\x", vec![9u8; 100]).await;

    let blob = perform_handshake(runtime_addr, recv_port, Duration::from_secs(2))
        .await
        .expect("handshake succeeds");

    assert_eq!(blob.received_len, 100);
    assert!(blob.coefficients[..100].iter().all(|b| *b == 9));
    assert!(blob.coefficients[100..].iter().all(|b| *b == 0));
}

#[tokio::test]
async fn silent_runtime_times_out_and_releases_sockets() {
    let recv_port = free_udp_port();
    // Reads the path request but never answers
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let runtime_addr = silent.local_addr().unwrap();
    let request_source = tokio::spawn(async move {
        let mut buf = [0u8; DATAGRAM_SIZE];
        let (_, from) = silent.recv_from(&mut buf).await.unwrap();
        (silent, from)
    });

    let settings = HandshakeSettings {
        runtime_addr,
        recv_addr: SocketAddr::from(([127, 0, 0, 1], recv_port)),
        timeout: Duration::from_millis(200),
    };
    let err = HandshakeClient::new(settings)
        .perform()
        .await
        .expect_err("handshake must time out");

    assert!(err.is_timeout());
    match err {
        HandshakeError::Timeout { stage, timeout } => {
            assert_eq!(stage, "path reply");
            assert_eq!(timeout, Duration::from_millis(200));
        }
        other => panic!("unexpected error {:?}", other),
    }

    UdpSocket::bind(("127.0.0.1", recv_port))
        .await
        .expect("receive port released after timeout");

    // The send socket is ephemeral; its port is visible as the request's source
    let (_silent, from) = request_source.await.unwrap();
    UdpSocket::bind(("0.0.0.0", from.port()))
        .await
        .expect("send port released after timeout");
}

#[tokio::test]
async fn occupied_receive_port_is_a_bind_error() {
    let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = taken.local_addr().unwrap().port();

    let err = perform_handshake(
        SocketAddr::from(([127, 0, 0, 1], free_udp_port())),
        port,
        Duration::from_millis(100),
    )
    .await
    .expect_err("bind must fail");

    assert!(matches!(err, HandshakeError::Bind { role: "receive", .. }));
}
