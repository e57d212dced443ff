//! WebSocket transport implementation using `tokio-tungstenite`.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use hfn_protocol::{decode_packets, encode_packet, Packet};

use crate::{
    ConnectParams, Connector, Transport, TransportError, TransportEvent,
    TransportEventKind,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum WriterCmd {
    Batch(Vec<Packet>),
    Close,
}

/// Dials WebSocket connections.
#[derive(Debug, Default)]
pub struct WebSocketConnector;

/// One live WebSocket connection, split into a reader task and a writer
/// task. Dropping the handle aborts both.
pub struct WebSocketTransport {
    cmd_tx: mpsc::UnboundedSender<WriterCmd>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    async fn connect(
        &self,
        params: &ConnectParams,
        generation: u64,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Self::Transport, TransportError> {
        let target = params.target();
        let (ws, _response) = tokio_tungstenite::connect_async(&target)
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;
        tracing::debug!(generation, url = %params.url, "websocket connected");

        let (sink, stream) = ws.split();

        let _ = events.send(TransportEvent {
            generation,
            kind: TransportEventKind::Opened,
        });

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(run_writer(
            sink,
            cmd_rx,
            events.clone(),
            generation,
        ));
        let reader = tokio::spawn(run_reader(stream, events, generation));

        Ok(WebSocketTransport {
            cmd_tx,
            reader,
            writer,
        })
    }
}

async fn run_writer(
    mut sink: SplitSink<WsStream, Message>,
    mut cmd_rx: mpsc::UnboundedReceiver<WriterCmd>,
    events: mpsc::UnboundedSender<TransportEvent>,
    generation: u64,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            WriterCmd::Batch(packets) => {
                for packet in &packets {
                    let frame = encode_packet(packet);
                    if let Err(error) =
                        sink.send(Message::Binary(frame.into())).await
                    {
                        let _ = events.send(TransportEvent {
                            generation,
                            kind: TransportEventKind::Error(
                                error.to_string(),
                            ),
                        });
                        return;
                    }
                }
                // The whole batch is on the wire; the upper layer may
                // queue the next one.
                let _ = events.send(TransportEvent {
                    generation,
                    kind: TransportEventKind::Drain,
                });
            }
            WriterCmd::Close => {
                let _ = sink.send(Message::Close(None)).await;
                let _ = sink.close().await;
                return;
            }
        }
    }
}

async fn run_reader(
    mut stream: SplitStream<WsStream>,
    events: mpsc::UnboundedSender<TransportEvent>,
    generation: u64,
) {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Binary(data)) => match decode_packets(&data) {
                Ok(packets) => {
                    let _ = events.send(TransportEvent {
                        generation,
                        kind: TransportEventKind::Packets(packets),
                    });
                }
                // A malformed frame is dropped whole; the connection
                // stays up.
                Err(error) => {
                    tracing::warn!(generation, %error, "discarding malformed frame");
                }
            },
            Ok(Message::Close(_)) => {
                let _ = events.send(TransportEvent {
                    generation,
                    kind: TransportEventKind::Closed,
                });
                return;
            }
            // Text frames are not part of the protocol; ping/pong is
            // handled by tungstenite itself.
            Ok(_) => continue,
            Err(error) => {
                let _ = events.send(TransportEvent {
                    generation,
                    kind: TransportEventKind::Error(error.to_string()),
                });
                return;
            }
        }
    }
    let _ = events.send(TransportEvent {
        generation,
        kind: TransportEventKind::Closed,
    });
}

impl Transport for WebSocketTransport {
    fn write(&mut self, packets: Vec<Packet>) {
        if self.cmd_tx.send(WriterCmd::Batch(packets)).is_err() {
            tracing::debug!("write on a transport whose writer has exited");
        }
    }

    async fn close(&mut self) {
        self.reader.abort();
        if self.cmd_tx.send(WriterCmd::Close).is_ok() {
            let _ = (&mut self.writer).await;
        }
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
