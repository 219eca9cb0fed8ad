// ThreadReference command implementations
//
// Per-thread introspection used to build context snapshots while the
// debuggee is suspended.

use crate::commands::{command_sets, thread_commands, vm_commands};
use crate::connection::JdwpConnection;
use crate::protocol::{CommandPacket, JdwpResult};
use crate::reader::{read_i32, read_location, read_string, read_u64};
use crate::types::{Frame, ThreadId, ThreadStatus};
use bytes::BufMut;

impl JdwpConnection {
    /// ThreadReference.Name
    pub async fn thread_name(&self, thread_id: ThreadId) -> JdwpResult<String> {
        let mut packet = CommandPacket::new(
            self.next_id(),
            command_sets::THREAD_REFERENCE,
            thread_commands::NAME,
        );
        packet.data.put_u64(thread_id);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();
        read_string(&mut data)
    }

    /// ThreadReference.Status - the thread's run state. The suspend status
    /// also present in the reply is not returned; the session tracks
    /// suspension itself.
    pub async fn thread_status(&self, thread_id: ThreadId) -> JdwpResult<ThreadStatus> {
        let mut packet = CommandPacket::new(
            self.next_id(),
            command_sets::THREAD_REFERENCE,
            thread_commands::STATUS,
        );
        packet.data.put_u64(thread_id);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();
        let thread_status = read_i32(&mut data)?;
        let _suspend_status = read_i32(&mut data)?;
        Ok(ThreadStatus::from_wire(thread_status))
    }

    /// ThreadReference.FrameCount
    pub async fn frame_count(&self, thread_id: ThreadId) -> JdwpResult<usize> {
        let mut packet = CommandPacket::new(
            self.next_id(),
            command_sets::THREAD_REFERENCE,
            thread_commands::FRAME_COUNT,
        );
        packet.data.put_u64(thread_id);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();
        Ok(read_i32(&mut data)?.max(0) as usize)
    }

    /// ThreadReference.Frames - the full stack, topmost frame first.
    pub async fn frames(&self, thread_id: ThreadId) -> JdwpResult<Vec<Frame>> {
        let mut packet = CommandPacket::new(
            self.next_id(),
            command_sets::THREAD_REFERENCE,
            thread_commands::FRAMES,
        );
        packet.data.put_u64(thread_id);
        packet.data.put_i32(0); // start at the top frame
        packet.data.put_i32(-1); // all frames

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();
        let count = read_i32(&mut data)?;
        let mut frames = Vec::with_capacity(count.max(0) as usize);

        for _ in 0..count {
            let frame_id = read_u64(&mut data)?;
            let location = read_location(&mut data)?;
            frames.push(Frame { frame_id, location });
        }

        Ok(frames)
    }

    /// ThreadReference.Resume - undo one suspension of a single thread.
    pub async fn resume_thread(&self, thread_id: ThreadId) -> JdwpResult<()> {
        let mut packet = CommandPacket::new(
            self.next_id(),
            command_sets::THREAD_REFERENCE,
            thread_commands::RESUME,
        );
        packet.data.put_u64(thread_id);

        let reply = self.send_command(packet).await?;
        reply.check_error()
    }

    /// VirtualMachine.AllThreads
    pub async fn all_threads(&self) -> JdwpResult<Vec<ThreadId>> {
        let packet = CommandPacket::new(
            self.next_id(),
            command_sets::VIRTUAL_MACHINE,
            vm_commands::ALL_THREADS,
        );

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();
        let count = read_i32(&mut data)?;
        let mut threads = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            threads.push(read_u64(&mut data)?);
        }

        Ok(threads)
    }
}
