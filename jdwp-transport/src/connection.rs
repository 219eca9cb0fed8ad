// Connection establishment
//
// TCP connect, JDWP handshake, event loop startup, and the shared state
// (packet ids, capability flags, method cache) the typed commands use.

use crate::eventloop::{spawn_event_loop, EventLoopHandle};
use crate::events::EventSet;
use crate::protocol::{CommandPacket, JdwpError, JdwpResult, ReplyPacket, JDWP_HANDSHAKE};
use crate::types::{ClassId, MethodInfo};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct JdwpConnection {
    event_loop: EventLoopHandle,
    next_id: AtomicU32,
    /// True when the VM reports a JDWP version that delivers return values
    /// in method-exit events (1.6 and later).
    pub(crate) reports_return_values: std::sync::atomic::AtomicBool,
    /// Methods already resolved per reference type; the method table of a
    /// loaded class is immutable so this never needs invalidation.
    pub(crate) method_cache: Mutex<HashMap<ClassId, Vec<MethodInfo>>>,
}

impl JdwpConnection {
    /// Connect to a listening VM and complete the handshake. The returned
    /// connection has not yet queried version or capabilities; see
    /// [`JdwpConnection::open`] for the fully initialized form.
    pub async fn connect(host: &str, port: u16) -> JdwpResult<Self> {
        info!("connecting to debuggee at {}:{}", host, port);

        let mut stream = TcpStream::connect((host, port)).await?;
        Self::handshake(&mut stream).await?;

        let (reader, writer) = stream.into_split();
        let event_loop = spawn_event_loop(reader, writer);

        Ok(Self {
            event_loop,
            next_id: AtomicU32::new(1),
            reports_return_values: std::sync::atomic::AtomicBool::new(false),
            method_cache: Mutex::new(HashMap::new()),
        })
    }

    /// Connect and run the initial version/ID-size exchange so capability
    /// queries are answered from cached state afterwards.
    pub async fn open(host: &str, port: u16) -> JdwpResult<Self> {
        let conn = Self::connect(host, port).await?;

        let version = conn.get_version().await?;
        info!(
            "debuggee: {} (JDWP {}.{})",
            version.vm_name, version.jdwp_major, version.jdwp_minor
        );
        let supported = version.jdwp_major > 1 || version.jdwp_minor >= 6;
        conn.reports_return_values
            .store(supported, Ordering::Relaxed);

        // The wire code assumes 8-byte ids; refuse anything else up front.
        let sizes = conn.get_id_sizes().await?;
        if sizes.object_id_size != 8 || sizes.method_id_size != 8 {
            return Err(JdwpError::Protocol(format!(
                "unsupported id sizes: object={}, method={}",
                sizes.object_id_size, sizes.method_id_size
            )));
        }

        Ok(conn)
    }

    async fn handshake(stream: &mut TcpStream) -> JdwpResult<()> {
        debug!("performing JDWP handshake");

        stream.write_all(JDWP_HANDSHAKE).await?;
        stream.flush().await?;

        let mut buf = vec![0u8; JDWP_HANDSHAKE.len()];
        stream.read_exact(&mut buf).await?;

        if buf != JDWP_HANDSHAKE {
            warn!("invalid handshake response: {:?}", buf);
            return Err(JdwpError::InvalidHandshake);
        }

        debug!("handshake complete");
        Ok(())
    }

    /// Send a command and wait for its reply.
    pub async fn send_command(&self, packet: CommandPacket) -> JdwpResult<ReplyPacket> {
        debug!("sending command packet id={}", packet.id);
        self.event_loop.send_command(packet).await
    }

    /// Wait for the next event set from the debuggee.
    pub async fn next_event_set(&self) -> JdwpResult<EventSet> {
        self.event_loop.next_event_set().await
    }

    /// Allocate the next packet id.
    pub fn next_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}
