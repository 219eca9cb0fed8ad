// VirtualMachine command implementations
//
// VM-wide control: version, id sizes, suspend/resume, and the goodbye
// commands used when a session disconnects.

use crate::commands::{command_sets, vm_commands};
use crate::connection::JdwpConnection;
use crate::protocol::{CommandPacket, JdwpResult};
use crate::reader::{read_i32, read_string};
use bytes::BufMut;
use serde::{Deserialize, Serialize};

/// VM version information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmVersion {
    pub description: String,
    pub jdwp_major: i32,
    pub jdwp_minor: i32,
    pub vm_version: String,
    pub vm_name: String,
}

/// Id sizes used by the VM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmIdSizes {
    pub field_id_size: i32,
    pub method_id_size: i32,
    pub object_id_size: i32,
    pub reference_type_id_size: i32,
    pub frame_id_size: i32,
}

impl JdwpConnection {
    /// VirtualMachine.Version
    pub async fn get_version(&self) -> JdwpResult<VmVersion> {
        let packet = CommandPacket::new(
            self.next_id(),
            command_sets::VIRTUAL_MACHINE,
            vm_commands::VERSION,
        );

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();
        Ok(VmVersion {
            description: read_string(&mut data)?,
            jdwp_major: read_i32(&mut data)?,
            jdwp_minor: read_i32(&mut data)?,
            vm_version: read_string(&mut data)?,
            vm_name: read_string(&mut data)?,
        })
    }

    /// VirtualMachine.IDSizes
    pub async fn get_id_sizes(&self) -> JdwpResult<VmIdSizes> {
        let packet = CommandPacket::new(
            self.next_id(),
            command_sets::VIRTUAL_MACHINE,
            vm_commands::ID_SIZES,
        );

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();
        Ok(VmIdSizes {
            field_id_size: read_i32(&mut data)?,
            method_id_size: read_i32(&mut data)?,
            object_id_size: read_i32(&mut data)?,
            reference_type_id_size: read_i32(&mut data)?,
            frame_id_size: read_i32(&mut data)?,
        })
    }

    /// VirtualMachine.Suspend - suspend every thread in the debuggee.
    pub async fn suspend_vm(&self) -> JdwpResult<()> {
        let packet = CommandPacket::new(
            self.next_id(),
            command_sets::VIRTUAL_MACHINE,
            vm_commands::SUSPEND,
        );

        let reply = self.send_command(packet).await?;
        reply.check_error()
    }

    /// VirtualMachine.Resume - resume every thread in the debuggee.
    pub async fn resume_vm(&self) -> JdwpResult<()> {
        let packet = CommandPacket::new(
            self.next_id(),
            command_sets::VIRTUAL_MACHINE,
            vm_commands::RESUME,
        );

        let reply = self.send_command(packet).await?;
        reply.check_error()
    }

    /// VirtualMachine.Dispose - detach, leaving the debuggee running.
    pub async fn dispose_vm(&self) -> JdwpResult<()> {
        let packet = CommandPacket::new(
            self.next_id(),
            command_sets::VIRTUAL_MACHINE,
            vm_commands::DISPOSE,
        );

        let reply = self.send_command(packet).await?;
        reply.check_error()
    }

    /// VirtualMachine.Exit - terminate the debuggee with the given code.
    pub async fn exit_vm(&self, exit_code: i32) -> JdwpResult<()> {
        let mut packet = CommandPacket::new(
            self.next_id(),
            command_sets::VIRTUAL_MACHINE,
            vm_commands::EXIT,
        );
        packet.data.put_i32(exit_code);

        let reply = self.send_command(packet).await?;
        reply.check_error()
    }
}
