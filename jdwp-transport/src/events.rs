// Composite event packet parsing
//
// The VM pushes events grouped into sets; every event in a set happened at
// the same instant and shares one suspend policy.

use crate::commands::event_kinds;
use crate::protocol::JdwpResult;
use crate::reader::{read_i32, read_location, read_string, read_tagged_value, read_u8, read_u64};
use crate::types::{Location, ObjectId, ReferenceTypeId, RequestId, ThreadId, Value};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Suspend policy values carried in event sets and requests.
pub mod suspend_policy {
    pub const NONE: u8 = 0;
    pub const EVENT_THREAD: u8 = 1;
    pub const ALL: u8 = 2;
}

/// A batch of events delivered together for atomic handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSet {
    pub suspend_policy: u8,
    pub events: Vec<Event>,
}

impl EventSet {
    /// Thread the set suspended, when the policy names one.
    pub fn suspended_thread(&self) -> Option<ThreadId> {
        self.events.iter().find_map(|e| e.details.thread())
    }
}

/// Single event within a set, tagged with the request that produced it.
/// Events the VM sends unrequested (VM start/death) carry request id 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub request_id: RequestId,
    pub details: EventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    VmStart {
        thread: ThreadId,
    },
    VmDeath,
    ThreadStart {
        thread: ThreadId,
    },
    ThreadDeath {
        thread: ThreadId,
    },
    ClassPrepare {
        thread: ThreadId,
        ref_type: ReferenceTypeId,
        signature: String,
        status: i32,
    },
    Breakpoint {
        thread: ThreadId,
        location: Location,
    },
    Step {
        thread: ThreadId,
        location: Location,
    },
    MethodEntry {
        thread: ThreadId,
        location: Location,
    },
    MethodExit {
        thread: ThreadId,
        location: Location,
        return_value: Option<Value>,
    },
    Exception {
        thread: ThreadId,
        location: Location,
        exception: ObjectId,
        catch_location: Option<Location>,
    },
    Unknown {
        kind: u8,
    },
}

impl EventKind {
    /// Thread the event occurred in, when it has one.
    pub fn thread(&self) -> Option<ThreadId> {
        match self {
            EventKind::VmStart { thread }
            | EventKind::ThreadStart { thread }
            | EventKind::ThreadDeath { thread }
            | EventKind::ClassPrepare { thread, .. }
            | EventKind::Breakpoint { thread, .. }
            | EventKind::Step { thread, .. }
            | EventKind::MethodEntry { thread, .. }
            | EventKind::MethodExit { thread, .. }
            | EventKind::Exception { thread, .. } => Some(*thread),
            EventKind::VmDeath | EventKind::Unknown { .. } => None,
        }
    }

    /// Code position the event occurred at, for locatable events.
    pub fn location(&self) -> Option<Location> {
        match self {
            EventKind::Breakpoint { location, .. }
            | EventKind::Step { location, .. }
            | EventKind::MethodEntry { location, .. }
            | EventKind::MethodExit { location, .. }
            | EventKind::Exception { location, .. } => Some(*location),
            _ => None,
        }
    }
}

/// Parse the payload of an Event.Composite command packet.
pub fn parse_event_packet(data: &[u8]) -> JdwpResult<EventSet> {
    let mut buf = data;

    let suspend_policy = read_u8(&mut buf)?;
    let event_count = read_i32(&mut buf)?;

    let mut events = Vec::with_capacity(event_count.max(0) as usize);

    for _ in 0..event_count {
        let kind = read_u8(&mut buf)?;
        let request_id = read_i32(&mut buf)?;

        let details = match kind {
            event_kinds::VM_START => EventKind::VmStart {
                thread: read_u64(&mut buf)?,
            },
            event_kinds::VM_DEATH => EventKind::VmDeath,
            event_kinds::THREAD_START => EventKind::ThreadStart {
                thread: read_u64(&mut buf)?,
            },
            event_kinds::THREAD_DEATH => EventKind::ThreadDeath {
                thread: read_u64(&mut buf)?,
            },
            event_kinds::CLASS_PREPARE => {
                let thread = read_u64(&mut buf)?;
                let _ref_type_tag = read_u8(&mut buf)?;
                let ref_type = read_u64(&mut buf)?;
                let signature = read_string(&mut buf)?;
                let status = read_i32(&mut buf)?;
                EventKind::ClassPrepare {
                    thread,
                    ref_type,
                    signature,
                    status,
                }
            }
            event_kinds::BREAKPOINT => {
                let thread = read_u64(&mut buf)?;
                let location = read_location(&mut buf)?;
                EventKind::Breakpoint { thread, location }
            }
            event_kinds::SINGLE_STEP => {
                let thread = read_u64(&mut buf)?;
                let location = read_location(&mut buf)?;
                EventKind::Step { thread, location }
            }
            event_kinds::METHOD_ENTRY => {
                let thread = read_u64(&mut buf)?;
                let location = read_location(&mut buf)?;
                EventKind::MethodEntry { thread, location }
            }
            event_kinds::METHOD_EXIT => {
                let thread = read_u64(&mut buf)?;
                let location = read_location(&mut buf)?;
                EventKind::MethodExit {
                    thread,
                    location,
                    return_value: None,
                }
            }
            event_kinds::METHOD_EXIT_WITH_RETURN_VALUE => {
                let thread = read_u64(&mut buf)?;
                let location = read_location(&mut buf)?;
                let return_value = read_tagged_value(&mut buf)?;
                EventKind::MethodExit {
                    thread,
                    location,
                    return_value: Some(return_value),
                }
            }
            event_kinds::EXCEPTION => {
                let thread = read_u64(&mut buf)?;
                let location = read_location(&mut buf)?;
                let _exception_tag = read_u8(&mut buf)?;
                let exception = read_u64(&mut buf)?;
                let catch_location = read_location(&mut buf)?;
                // An all-zero catch location means the exception is uncaught.
                let catch_location = if catch_location.class_id == 0 && catch_location.index == 0 {
                    None
                } else {
                    Some(catch_location)
                };
                EventKind::Exception {
                    thread,
                    location,
                    exception,
                    catch_location,
                }
            }
            _ => {
                warn!("unsupported event kind: {}", kind);
                // Can't skip an unknown body reliably, so stop parsing the
                // remainder of this set rather than misalign the buffer.
                events.push(Event {
                    request_id,
                    details: EventKind::Unknown { kind },
                });
                break;
            }
        };

        events.push(Event {
            request_id,
            details,
        });
    }

    Ok(EventSet {
        suspend_policy,
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    fn put_location(buf: &mut Vec<u8>, class_id: u64, method_id: u64, index: u64) {
        buf.put_u8(1);
        buf.put_u64(class_id);
        buf.put_u64(method_id);
        buf.put_u64(index);
    }

    #[test]
    fn parses_step_event() {
        let mut raw = Vec::new();
        raw.put_u8(suspend_policy::ALL);
        raw.put_i32(1);
        raw.put_u8(event_kinds::SINGLE_STEP);
        raw.put_i32(17); // request id
        raw.put_u64(0x99); // thread
        put_location(&mut raw, 5, 6, 7);

        let set = parse_event_packet(&raw).unwrap();
        assert_eq!(set.suspend_policy, suspend_policy::ALL);
        assert_eq!(set.events.len(), 1);
        assert_eq!(set.events[0].request_id, 17);
        match &set.events[0].details {
            EventKind::Step { thread, location } => {
                assert_eq!(*thread, 0x99);
                assert_eq!(location.class_id, 5);
                assert_eq!(location.index, 7);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn parses_method_exit_with_return_value() {
        let mut raw = Vec::new();
        raw.put_u8(suspend_policy::NONE);
        raw.put_i32(1);
        raw.put_u8(event_kinds::METHOD_EXIT_WITH_RETURN_VALUE);
        raw.put_i32(3);
        raw.put_u64(0x42);
        put_location(&mut raw, 1, 2, 3);
        raw.put_u8(73); // int tag
        raw.put_i32(-7);

        let set = parse_event_packet(&raw).unwrap();
        match &set.events[0].details {
            EventKind::MethodExit {
                return_value: Some(value),
                ..
            } => assert_eq!(value.display(), "(int) -7"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn parses_multi_event_set() {
        let mut raw = Vec::new();
        raw.put_u8(suspend_policy::ALL);
        raw.put_i32(2);
        raw.put_u8(event_kinds::VM_START);
        raw.put_i32(0);
        raw.put_u64(0x1);
        raw.put_u8(event_kinds::THREAD_START);
        raw.put_i32(0);
        raw.put_u64(0x1);

        let set = parse_event_packet(&raw).unwrap();
        assert_eq!(set.events.len(), 2);
        assert_eq!(set.suspended_thread(), Some(0x1));
    }

    #[test]
    fn uncaught_exception_has_no_catch_location() {
        let mut raw = Vec::new();
        raw.put_u8(suspend_policy::ALL);
        raw.put_i32(1);
        raw.put_u8(event_kinds::EXCEPTION);
        raw.put_i32(9);
        raw.put_u64(0x42);
        put_location(&mut raw, 1, 2, 3);
        raw.put_u8(76); // 'L' object tag
        raw.put_u64(0xdead);
        put_location(&mut raw, 0, 0, 0);

        let set = parse_event_packet(&raw).unwrap();
        match &set.events[0].details {
            EventKind::Exception {
                exception,
                catch_location,
                ..
            } => {
                assert_eq!(*exception, 0xdead);
                assert!(catch_location.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn unknown_kind_stops_set_parsing_without_error() {
        let mut raw = Vec::new();
        raw.put_u8(suspend_policy::NONE);
        raw.put_i32(2);
        raw.put_u8(200); // bogus kind
        raw.put_i32(0);
        raw.put_u8(event_kinds::VM_DEATH);
        raw.put_i32(0);

        let set = parse_event_packet(&raw).unwrap();
        assert_eq!(set.events.len(), 1);
        assert!(matches!(
            set.events[0].details,
            EventKind::Unknown { kind: 200 }
        ));
    }
}
