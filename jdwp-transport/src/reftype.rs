// ReferenceType and Method command implementations
//
// Class and method metadata: signatures, source files, method tables, and
// line tables for rendering source positions.

use crate::commands::{command_sets, method_commands, reference_type_commands};
use crate::connection::JdwpConnection;
use crate::protocol::{CommandPacket, JdwpError, JdwpResult};
use crate::reader::{read_i32, read_string, read_u64};
use crate::types::{Location, MethodId, MethodInfo, ReferenceTypeId};
use bytes::BufMut;
use serde::{Deserialize, Serialize};

/// Line table entry mapping a bytecode index to a source line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineTableEntry {
    pub line_code_index: u64,
    pub line_number: i32,
}

/// Complete line table for one method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineTable {
    pub start: u64,
    pub end: u64,
    pub lines: Vec<LineTableEntry>,
}

impl LineTable {
    /// Source line covering the given bytecode index, if any.
    pub fn line_at(&self, index: u64) -> Option<i32> {
        self.lines
            .iter()
            .take_while(|entry| entry.line_code_index <= index)
            .last()
            .map(|entry| entry.line_number)
    }
}

impl JdwpConnection {
    /// ReferenceType.Signature - the JNI signature, e.g. "Lcom/acme/Main;".
    pub async fn type_signature(&self, ref_type_id: ReferenceTypeId) -> JdwpResult<String> {
        let mut packet = CommandPacket::new(
            self.next_id(),
            command_sets::REFERENCE_TYPE,
            reference_type_commands::SIGNATURE,
        );
        packet.data.put_u64(ref_type_id);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();
        read_string(&mut data)
    }

    /// ReferenceType.SourceFile - the declaring source file name, when the
    /// class was compiled with that attribute.
    pub async fn source_file(&self, ref_type_id: ReferenceTypeId) -> JdwpResult<Option<String>> {
        let mut packet = CommandPacket::new(
            self.next_id(),
            command_sets::REFERENCE_TYPE,
            reference_type_commands::SOURCE_FILE,
        );
        packet.data.put_u64(ref_type_id);

        let reply = self.send_command(packet).await?;
        if let Err(e) = reply.check_error() {
            // ABSENT_INFORMATION just means "compiled without debug info".
            return match e {
                JdwpError::ErrorCode(101, _) => Ok(None),
                other => Err(other),
            };
        }

        let mut data = reply.data();
        Ok(Some(read_string(&mut data)?))
    }

    /// ReferenceType.Methods - all methods declared by a type, cached per
    /// connection since a loaded class's method table never changes.
    pub async fn methods(&self, ref_type_id: ReferenceTypeId) -> JdwpResult<Vec<MethodInfo>> {
        if let Some(cached) = self.method_cache.lock().unwrap().get(&ref_type_id) {
            return Ok(cached.clone());
        }

        let mut packet = CommandPacket::new(
            self.next_id(),
            command_sets::REFERENCE_TYPE,
            reference_type_commands::METHODS,
        );
        packet.data.put_u64(ref_type_id);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();
        let count = read_i32(&mut data)?;
        let mut methods = Vec::with_capacity(count.max(0) as usize);

        for _ in 0..count {
            let method_id = read_u64(&mut data)?;
            let name = read_string(&mut data)?;
            let signature = read_string(&mut data)?;
            let mod_bits = read_i32(&mut data)?;

            methods.push(MethodInfo {
                method_id,
                name,
                signature,
                mod_bits,
            });
        }

        self.method_cache
            .lock()
            .unwrap()
            .insert(ref_type_id, methods.clone());
        Ok(methods)
    }

    /// Resolve one method of a type by id.
    pub async fn method_by_id(
        &self,
        ref_type_id: ReferenceTypeId,
        method_id: MethodId,
    ) -> JdwpResult<MethodInfo> {
        let methods = self.methods(ref_type_id).await?;
        methods
            .into_iter()
            .find(|m| m.method_id == method_id)
            .ok_or_else(|| {
                JdwpError::Protocol(format!(
                    "method {:x} not found in type {:x}",
                    method_id, ref_type_id
                ))
            })
    }

    /// Method.LineTable
    pub async fn line_table(&self, location: &Location) -> JdwpResult<LineTable> {
        let mut packet = CommandPacket::new(
            self.next_id(),
            command_sets::METHOD,
            method_commands::LINE_TABLE,
        );
        packet.data.put_u64(location.class_id);
        packet.data.put_u64(location.method_id);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();
        let start = read_u64(&mut data)?;
        let end = read_u64(&mut data)?;
        let count = read_i32(&mut data)?;
        let mut lines = Vec::with_capacity(count.max(0) as usize);

        for _ in 0..count {
            lines.push(LineTableEntry {
                line_code_index: read_u64(&mut data)?,
                line_number: read_i32(&mut data)?,
            });
        }

        Ok(LineTable { start, end, lines })
    }
}
