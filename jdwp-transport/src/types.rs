// Common JDWP data types
//
// Ids are fixed at 8 bytes here; VirtualMachine.IDSizes is still queried at
// connect time so a mismatched VM is reported instead of misparsed.

use serde::{Deserialize, Serialize};

pub type ObjectId = u64;
pub type ThreadId = ObjectId;

pub type ReferenceTypeId = u64;
pub type ClassId = ReferenceTypeId;

pub type MethodId = u64;
pub type FieldId = u64;
pub type FrameId = u64;

/// Id of an event request registered with the VM, echoed back in events.
pub type RequestId = i32;

/// A code position: reference type, method, and bytecode index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub type_tag: u8, // 1=class, 2=interface, 3=array
    pub class_id: ReferenceTypeId,
    pub method_id: MethodId,
    pub index: u64,
}

/// Thread status values from ThreadReference.Status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum ThreadStatus {
    Zombie = 0,
    Running = 1,
    Sleeping = 2,
    Monitor = 3,
    Wait = 4,
}

impl ThreadStatus {
    pub fn from_wire(raw: i32) -> Self {
        match raw {
            0 => ThreadStatus::Zombie,
            2 => ThreadStatus::Sleeping,
            3 => ThreadStatus::Monitor,
            4 => ThreadStatus::Wait,
            _ => ThreadStatus::Running,
        }
    }

    /// A zombie thread cannot be stepped or have frames read.
    pub fn is_live(self) -> bool {
        self != ThreadStatus::Zombie
    }
}

/// Tagged value as carried in method-exit events and frame slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    pub tag: u8,
    pub data: ValueData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueData {
    Byte(i8),
    Char(u16),
    Float(f32),
    Double(f64),
    Int(i32),
    Long(i64),
    Short(i16),
    Boolean(bool),
    Object(ObjectId),
    Void,
}

impl Value {
    /// Render the value the way it is shown to the user.
    pub fn display(&self) -> String {
        match &self.data {
            ValueData::Byte(v) => format!("(byte) {}", v),
            ValueData::Char(v) => {
                format!("(char) '{}'", char::from_u32(*v as u32).unwrap_or('?'))
            }
            ValueData::Float(v) => format!("(float) {}", v),
            ValueData::Double(v) => format!("(double) {}", v),
            ValueData::Int(v) => format!("(int) {}", v),
            ValueData::Long(v) => format!("(long) {}", v),
            ValueData::Short(v) => format!("(short) {}", v),
            ValueData::Boolean(v) => format!("(boolean) {}", v),
            ValueData::Object(id) => {
                if *id == 0 {
                    "null".to_string()
                } else {
                    format!("(object) @{:x}", id)
                }
            }
            ValueData::Void => "(void)".to_string(),
        }
    }
}

/// One frame of a suspended thread's call stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub frame_id: FrameId,
    pub location: Location,
}

/// Name, signature and modifier bits of a method, resolved from
/// ReferenceType.Methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodInfo {
    pub method_id: MethodId,
    pub name: String,
    pub signature: String,
    pub mod_bits: i32,
}

impl MethodInfo {
    /// True for compiler-generated methods the user never wrote.
    pub fn is_synthetic(&self) -> bool {
        use crate::commands::method_modifiers::{ACC_SYNTHETIC, JDWP_INVISIBLE};
        self.mod_bits & (ACC_SYNTHETIC | JDWP_INVISIBLE) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_flagged_by_acc_bit() {
        let m = MethodInfo {
            method_id: 1,
            name: "access$000".to_string(),
            signature: "()V".to_string(),
            mod_bits: 0x1008,
        };
        assert!(m.is_synthetic());
    }

    #[test]
    fn synthetic_flagged_by_jdwp_invisible_bits() {
        let m = MethodInfo {
            method_id: 2,
            name: "lambda$run$0".to_string(),
            signature: "()V".to_string(),
            mod_bits: 0xf000_0001_u32 as i32,
        };
        assert!(m.is_synthetic());
    }

    #[test]
    fn plain_method_is_not_synthetic() {
        let m = MethodInfo {
            method_id: 3,
            name: "main".to_string(),
            signature: "([Ljava/lang/String;)V".to_string(),
            mod_bits: 0x0009,
        };
        assert!(!m.is_synthetic());
    }

    #[test]
    fn zombie_thread_is_not_live() {
        assert!(!ThreadStatus::from_wire(0).is_live());
        assert!(ThreadStatus::from_wire(1).is_live());
        // Unknown statuses fall back to Running.
        assert!(ThreadStatus::from_wire(77).is_live());
    }
}
