//! Integration tests for the WebSocket transport.
//!
//! Each test spins up a real tokio-tungstenite server on a random port and
//! dials it through the connector, so packet flow is verified over an
//! actual socket.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use hfn_protocol::{decode_packets, encode_packet, Packet};
    use hfn_transport::{
        ConnectParams, Connector, Transport, TransportEvent,
        TransportEventKind, WebSocketConnector,
    };
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message;

    type ServerWs =
        tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

    /// Binds a server on a random port; returns its address and a task
    /// that resolves to the accepted server-side stream.
    async fn start_server() -> (String, tokio::task::JoinHandle<ServerWs>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio_tungstenite::accept_async(stream).await.unwrap()
        });
        (addr, handle)
    }

    fn params(addr: &str) -> ConnectParams {
        ConnectParams {
            url: format!("ws://{addr}"),
            app_id: "app".into(),
            client_id: "c1".into(),
            session_id: "s1".into(),
            timestamp_ms: 0,
        }
    }

    async fn next_event(
        rx: &mut mpsc::UnboundedReceiver<TransportEvent>,
    ) -> TransportEvent {
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            rx.recv(),
        )
        .await
        .expect("event should arrive")
        .expect("channel should stay open")
    }

    #[tokio::test]
    async fn test_connect_emits_opened_and_decodes_inbound_packets() {
        let (addr, server) = start_server().await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _transport = WebSocketConnector
            .connect(&params(&addr), 1, tx)
            .await
            .expect("should connect");
        let mut server_ws = server.await.unwrap();

        let event = next_event(&mut rx).await;
        assert_eq!(event.generation, 1);
        assert!(matches!(event.kind, TransportEventKind::Opened));

        // Server pushes an OPEN packet; the client surfaces it decoded.
        let frame = encode_packet(&Packet::Open {
            ping_interval: Some(10),
            ping_timeout: Some(5),
        });
        server_ws
            .send(Message::Binary(frame.into()))
            .await
            .unwrap();

        let event = next_event(&mut rx).await;
        match event.kind {
            TransportEventKind::Packets(packets) => {
                assert_eq!(packets.len(), 1);
                assert!(matches!(
                    packets[0],
                    Packet::Open {
                        ping_interval: Some(10),
                        ping_timeout: Some(5),
                    }
                ));
            }
            other => panic!("expected packets event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_write_sends_one_frame_per_packet_then_drains() {
        let (addr, server) = start_server().await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut transport = WebSocketConnector
            .connect(&params(&addr), 1, tx)
            .await
            .unwrap();
        let mut server_ws = server.await.unwrap();

        let event = next_event(&mut rx).await;
        assert!(matches!(event.kind, TransportEventKind::Opened));

        transport.write(vec![Packet::Ping, Packet::Pong]);

        // Two physical frames, in order.
        let first = server_ws.next().await.unwrap().unwrap();
        let packets = decode_packets(&first.into_data()).unwrap();
        assert!(matches!(packets[..], [Packet::Ping]));

        let second = server_ws.next().await.unwrap().unwrap();
        let packets = decode_packets(&second.into_data()).unwrap();
        assert!(matches!(packets[..], [Packet::Pong]));

        // Then the transport reports the batch drained.
        let event = next_event(&mut rx).await;
        assert!(matches!(event.kind, TransportEventKind::Drain));
    }

    #[tokio::test]
    async fn test_server_close_surfaces_closed_event() {
        let (addr, server) = start_server().await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _transport = WebSocketConnector
            .connect(&params(&addr), 3, tx)
            .await
            .unwrap();
        let mut server_ws = server.await.unwrap();

        let event = next_event(&mut rx).await;
        assert!(matches!(event.kind, TransportEventKind::Opened));

        server_ws.send(Message::Close(None)).await.unwrap();

        let event = next_event(&mut rx).await;
        assert_eq!(event.generation, 3);
        assert!(matches!(event.kind, TransportEventKind::Closed));
    }

    #[tokio::test]
    async fn test_malformed_frame_is_dropped_without_killing_connection() {
        let (addr, server) = start_server().await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _transport = WebSocketConnector
            .connect(&params(&addr), 1, tx)
            .await
            .unwrap();
        let mut server_ws = server.await.unwrap();

        let event = next_event(&mut rx).await;
        assert!(matches!(event.kind, TransportEventKind::Opened));

        // 0xc1 is a reserved wire tag; the frame cannot decode.
        server_ws
            .send(Message::Binary(vec![0xc1].into()))
            .await
            .unwrap();

        // A well-formed frame right after still gets through.
        let frame = encode_packet(&Packet::Pong);
        server_ws
            .send(Message::Binary(frame.into()))
            .await
            .unwrap();

        let event = next_event(&mut rx).await;
        match event.kind {
            TransportEventKind::Packets(packets) => {
                assert!(matches!(packets[..], [Packet::Pong]));
            }
            other => panic!("expected packets event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dial_target_carries_query_parameters() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut path = None;
            let ws = tokio_tungstenite::accept_hdr_async(
                stream,
                |req: &tokio_tungstenite::tungstenite::handshake::server::Request,
                 resp| {
                    path = Some(req.uri().to_string());
                    Ok(resp)
                },
            )
            .await
            .unwrap();
            (ws, path.unwrap())
        });

        let (tx, _rx) = mpsc::unbounded_channel();
        let mut p = params(&addr);
        p.app_id = "my-app".into();
        p.timestamp_ms = 42;
        let _transport =
            WebSocketConnector.connect(&p, 1, tx).await.unwrap();

        let (_ws, path) = server.await.unwrap();
        assert!(path.contains("aid=my-app"));
        assert!(path.contains("cid=c1"));
        assert!(path.contains("sid=s1"));
        assert!(path.contains("ts=42"));
    }
}
