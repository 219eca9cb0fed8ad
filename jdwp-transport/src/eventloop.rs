// Socket event loop
//
// One task per connection owns the socket and multiplexes outgoing command
// packets (replies routed back by packet id) with incoming event packets.

use crate::events::{parse_event_packet, EventSet};
use crate::protocol::{CommandPacket, JdwpError, JdwpResult, ReplyPacket, HEADER_SIZE, REPLY_FLAG};
use bytes::BytesMut;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Maximum allowed packet size (10MB). A buggy or hostile peer must not be
/// able to make us allocate unbounded memory.
const MAX_PACKET_SIZE: usize = 10 * 1024 * 1024;

struct CommandRequest {
    packet: CommandPacket,
    reply_tx: oneshot::Sender<JdwpResult<ReplyPacket>>,
}

/// Handle to the event loop for sending commands and pulling event sets.
#[derive(Clone, Debug)]
pub struct EventLoopHandle {
    command_tx: mpsc::Sender<CommandRequest>,
    event_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<EventSet>>>,
}

impl EventLoopHandle {
    /// Send a command and wait for its reply.
    pub async fn send_command(&self, packet: CommandPacket) -> JdwpResult<ReplyPacket> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(CommandRequest { packet, reply_tx })
            .await
            .map_err(|_| JdwpError::Disconnected)?;

        reply_rx.await.map_err(|_| JdwpError::Disconnected)?
    }

    /// Wait for the next event set. Blocks until one arrives; returns
    /// `Disconnected` once the socket is gone and the buffer is drained.
    pub async fn next_event_set(&self) -> JdwpResult<EventSet> {
        let mut rx = self.event_rx.lock().await;
        rx.recv().await.ok_or(JdwpError::Disconnected)
    }
}

/// Spawn the event loop task over a split socket.
pub fn spawn_event_loop(reader: OwnedReadHalf, writer: OwnedWriteHalf) -> EventLoopHandle {
    let (command_tx, command_rx) = mpsc::channel(32);
    // Events are critical (breakpoints, steps) and must not be dropped, so
    // the event buffer is much larger than the command buffer.
    let (event_tx, event_rx) = mpsc::channel(256);

    tokio::spawn(event_loop_task(reader, writer, command_rx, event_tx));

    EventLoopHandle {
        command_tx,
        event_rx: Arc::new(tokio::sync::Mutex::new(event_rx)),
    }
}

async fn event_loop_task(
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    mut command_rx: mpsc::Receiver<CommandRequest>,
    event_tx: mpsc::Sender<EventSet>,
) {
    info!("transport event loop started");

    let mut pending_replies: HashMap<u32, oneshot::Sender<JdwpResult<ReplyPacket>>> =
        HashMap::new();

    loop {
        tokio::select! {
            Some(cmd) = command_rx.recv() => {
                let packet_id = cmd.packet.id;
                debug!("sending command id={}", packet_id);

                let encoded = cmd.packet.encode();
                if let Err(e) = writer.write_all(&encoded).await {
                    error!("failed to write command: {}", e);
                    cmd.reply_tx.send(Err(JdwpError::Io(e))).ok();
                    continue;
                }
                if let Err(e) = writer.flush().await {
                    error!("failed to flush command: {}", e);
                    cmd.reply_tx.send(Err(JdwpError::Io(e))).ok();
                    continue;
                }

                pending_replies.insert(packet_id, cmd.reply_tx);
            }

            result = read_packet(&mut reader) => {
                match result {
                    Ok((is_reply, packet_id, data)) => {
                        if is_reply {
                            debug!("received reply id={}", packet_id);
                            if let Some(tx) = pending_replies.remove(&packet_id) {
                                tx.send(ReplyPacket::decode(&data)).ok();
                            } else {
                                warn!("reply for unknown command id={}", packet_id);
                            }
                        } else {
                            // Event packet; the composite payload starts
                            // after the 11-byte header.
                            match parse_event_packet(&data[HEADER_SIZE..]) {
                                Ok(event_set) => {
                                    debug!(
                                        "event set: {} events, suspend_policy={}",
                                        event_set.events.len(),
                                        event_set.suspend_policy
                                    );
                                    if event_tx.send(event_set).await.is_err() {
                                        warn!("event receiver dropped, shutting down");
                                        break;
                                    }
                                }
                                Err(e) => {
                                    warn!("failed to parse event packet: {}", e);
                                }
                            }
                        }
                    }
                    Err(e) => {
                        // EOF or a broken socket: the debuggee is gone.
                        info!("socket read ended: {}", e);
                        break;
                    }
                }
            }
        }
    }

    // Fail any callers still waiting on replies, then let event_tx drop so
    // next_event_set() observes the disconnect.
    for (_, tx) in pending_replies.drain() {
        tx.send(Err(JdwpError::Disconnected)).ok();
    }

    info!("transport event loop shut down");
}

/// Read one packet, returning (is_reply, id, full packet bytes).
async fn read_packet(reader: &mut OwnedReadHalf) -> JdwpResult<(bool, u32, Vec<u8>)> {
    let mut header = BytesMut::with_capacity(HEADER_SIZE);
    header.resize(HEADER_SIZE, 0);

    reader
        .read_exact(&mut header)
        .await
        .map_err(JdwpError::Io)?;

    let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let packet_id = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    let flags = header[8];

    if length < HEADER_SIZE {
        return Err(JdwpError::Protocol(format!(
            "invalid packet length: {}",
            length
        )));
    }
    if length > MAX_PACKET_SIZE {
        return Err(JdwpError::Protocol(format!(
            "packet too large: {} bytes (max {})",
            length, MAX_PACKET_SIZE
        )));
    }

    let data_len = length - HEADER_SIZE;
    let mut full_packet = header.to_vec();

    if data_len > 0 {
        let mut data = vec![0u8; data_len];
        reader.read_exact(&mut data).await.map_err(JdwpError::Io)?;
        full_packet.extend_from_slice(&data);
    }

    Ok((flags == REPLY_FLAG, packet_id, full_packet))
}
