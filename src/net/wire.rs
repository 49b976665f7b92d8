//! Framing primitives of the wire protocol.
//!
//! All multi-byte integers travel big-endian. Strings are length-prefixed
//! UTF-8: a `u16` byte count followed by exactly that many bytes, so a
//! single string never exceeds 65535 bytes. Floats travel as IEEE-754 bit
//! patterns inside a `u32` (see [`crate::util::bytes`]). Booleans are one
//! byte, any non-zero value reading as `true`.

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{FindexError, Result};
use crate::net::codes::ResponseCode;
use crate::util::bytes;

/// Longest representable wire string, in bytes.
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

pub fn read_u8<R: Read>(reader: &mut R) -> std::io::Result<u8> {
    reader.read_u8()
}

pub fn read_u16<R: Read>(reader: &mut R) -> std::io::Result<u16> {
    reader.read_u16::<BigEndian>()
}

pub fn read_u32<R: Read>(reader: &mut R) -> std::io::Result<u32> {
    reader.read_u32::<BigEndian>()
}

pub fn read_u64<R: Read>(reader: &mut R) -> std::io::Result<u64> {
    reader.read_u64::<BigEndian>()
}

pub fn read_bool<R: Read>(reader: &mut R) -> std::io::Result<bool> {
    Ok(reader.read_u8()? != 0)
}

pub fn read_f32<R: Read>(reader: &mut R) -> std::io::Result<f32> {
    Ok(bytes::f32_from_bits(reader.read_u32::<BigEndian>()?))
}

pub fn write_u8<W: Write>(writer: &mut W, value: u8) -> std::io::Result<()> {
    writer.write_u8(value)
}

pub fn write_u16<W: Write>(writer: &mut W, value: u16) -> std::io::Result<()> {
    writer.write_u16::<BigEndian>(value)
}

pub fn write_u32<W: Write>(writer: &mut W, value: u32) -> std::io::Result<()> {
    writer.write_u32::<BigEndian>(value)
}

pub fn write_u64<W: Write>(writer: &mut W, value: u64) -> std::io::Result<()> {
    writer.write_u64::<BigEndian>(value)
}

pub fn write_bool<W: Write>(writer: &mut W, value: bool) -> std::io::Result<()> {
    writer.write_u8(value as u8)
}

pub fn write_f32<W: Write>(writer: &mut W, value: f32) -> std::io::Result<()> {
    writer.write_u32::<BigEndian>(bytes::f32_to_bits(value))
}

/// Read a length-prefixed UTF-8 string.
pub fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    let byte_len = read_u16(reader)? as usize;
    let mut buffer = vec![0u8; byte_len];
    reader.read_exact(&mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Write a length-prefixed string from raw bytes.
///
/// Fails when the payload exceeds [`MAX_STRING_LEN`]; nothing is written
/// in that case.
pub fn write_string<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_STRING_LEN {
        return Err(FindexError::other(format!(
            "string of {} bytes does not fit the wire format",
            payload.len()
        )));
    }
    write_u16(writer, payload.len() as u16)?;
    writer.write_all(payload)?;
    Ok(())
}

/// Write a single response code byte.
pub fn write_code<W: Write>(writer: &mut W, code: ResponseCode) -> std::io::Result<()> {
    writer.write_u8(code as u8)
}

/// Read a response code byte, rejecting unknown values.
pub fn read_code<R: Read>(reader: &mut R) -> Result<ResponseCode> {
    let byte = read_u8(reader)?;
    ResponseCode::try_from(byte).map_err(FindexError::Protocol)
}
