// EventRequest command implementations
//
// Builders for the "notify me when X happens" subscriptions: breakpoints,
// one-shot step requests, and method-exit watches.

use crate::commands::{command_sets, event_commands, event_kinds, modifier_kinds, step_depths,
    step_sizes};
use crate::connection::JdwpConnection;
use crate::events::suspend_policy;
use crate::protocol::{CommandPacket, JdwpResult};
use crate::reader::read_i32;
use crate::types::{Location, RequestId, ThreadId};
use bytes::BufMut;

/// Suspend policy for an event request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendPolicy {
    None,
    EventThread,
    All,
}

impl SuspendPolicy {
    fn wire(self) -> u8 {
        match self {
            SuspendPolicy::None => suspend_policy::NONE,
            SuspendPolicy::EventThread => suspend_policy::EVENT_THREAD,
            SuspendPolicy::All => suspend_policy::ALL,
        }
    }
}

/// Step granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepSize {
    /// Single bytecode instruction.
    Min,
    /// Smallest position change on a different source line.
    Line,
}

impl StepSize {
    fn wire(self) -> i32 {
        match self {
            StepSize::Min => step_sizes::MIN,
            StepSize::Line => step_sizes::LINE,
        }
    }
}

/// Step depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDepth {
    Into,
    Over,
    Out,
}

impl StepDepth {
    fn wire(self) -> i32 {
        match self {
            StepDepth::Into => step_depths::INTO,
            StepDepth::Over => step_depths::OVER,
            StepDepth::Out => step_depths::OUT,
        }
    }
}

impl std::fmt::Display for StepDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepDepth::Into => write!(f, "into"),
            StepDepth::Over => write!(f, "over"),
            StepDepth::Out => write!(f, "out"),
        }
    }
}

fn put_string(data: &mut Vec<u8>, text: &str) {
    data.put_u32(text.len() as u32);
    data.extend_from_slice(text.as_bytes());
}

impl JdwpConnection {
    /// EventRequest.Set for a breakpoint at a code location.
    pub async fn set_breakpoint_request(
        &self,
        location: Location,
        policy: SuspendPolicy,
    ) -> JdwpResult<RequestId> {
        let mut packet = CommandPacket::new(
            self.next_id(),
            command_sets::EVENT_REQUEST,
            event_commands::SET,
        );

        packet.data.put_u8(event_kinds::BREAKPOINT);
        packet.data.put_u8(policy.wire());
        packet.data.put_i32(1); // one modifier

        packet.data.put_u8(modifier_kinds::LOCATION_ONLY);
        packet.data.put_u8(location.type_tag);
        packet.data.put_u64(location.class_id);
        packet.data.put_u64(location.method_id);
        packet.data.put_u64(location.index);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();
        read_i32(&mut data)
    }

    /// EventRequest.Set for a one-shot step request. The count modifier of 1
    /// makes the VM delete the request after it fires once; the exclusion
    /// patterns keep the step from landing in filtered classes.
    pub async fn set_step_request(
        &self,
        thread_id: ThreadId,
        size: StepSize,
        depth: StepDepth,
        excludes: &[String],
    ) -> JdwpResult<RequestId> {
        let mut packet = CommandPacket::new(
            self.next_id(),
            command_sets::EVENT_REQUEST,
            event_commands::SET,
        );

        packet.data.put_u8(event_kinds::SINGLE_STEP);
        packet.data.put_u8(SuspendPolicy::All.wire());
        packet.data.put_i32(excludes.len() as i32 + 2);

        packet.data.put_u8(modifier_kinds::STEP);
        packet.data.put_u64(thread_id);
        packet.data.put_i32(size.wire());
        packet.data.put_i32(depth.wire());

        for pattern in excludes {
            packet.data.put_u8(modifier_kinds::CLASS_EXCLUDE);
            put_string(&mut packet.data, pattern);
        }

        // Count goes last so it only counts events that pass every filter.
        packet.data.put_u8(modifier_kinds::COUNT);
        packet.data.put_i32(1);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();
        read_i32(&mut data)
    }

    /// EventRequest.Set for a one-shot method-exit watch on a thread, used
    /// to report return values during a step-out.
    pub async fn set_method_exit_request(
        &self,
        thread_id: ThreadId,
        with_return_value: bool,
    ) -> JdwpResult<RequestId> {
        let mut packet = CommandPacket::new(
            self.next_id(),
            command_sets::EVENT_REQUEST,
            event_commands::SET,
        );

        let kind = if with_return_value {
            event_kinds::METHOD_EXIT_WITH_RETURN_VALUE
        } else {
            event_kinds::METHOD_EXIT
        };
        packet.data.put_u8(kind);
        packet.data.put_u8(SuspendPolicy::All.wire());
        packet.data.put_i32(2);

        packet.data.put_u8(modifier_kinds::THREAD_ONLY);
        packet.data.put_u64(thread_id);

        packet.data.put_u8(modifier_kinds::COUNT);
        packet.data.put_i32(1);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();
        read_i32(&mut data)
    }

    /// EventRequest.Clear - delete an outstanding request.
    pub async fn clear_request(&self, event_kind: u8, request_id: RequestId) -> JdwpResult<()> {
        let mut packet = CommandPacket::new(
            self.next_id(),
            command_sets::EVENT_REQUEST,
            event_commands::CLEAR,
        );

        packet.data.put_u8(event_kind);
        packet.data.put_i32(request_id);

        let reply = self.send_command(packet).await?;
        reply.check_error()
    }

    /// EventRequest.ClearAllBreakpoints
    pub async fn clear_all_breakpoints(&self) -> JdwpResult<()> {
        let packet = CommandPacket::new(
            self.next_id(),
            command_sets::EVENT_REQUEST,
            event_commands::CLEAR_ALL_BREAKPOINTS,
        );

        let reply = self.send_command(packet).await?;
        reply.check_error()
    }
}
