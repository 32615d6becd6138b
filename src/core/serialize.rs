// Canonical byte encoding of ledger records
//
// Independent parsers compare these bytes (and the state hash built from
// them), so the layout must stay stable.

use std::io::{self, Write};

/// Trait for types with a canonical byte encoding
pub trait Serializable {
    fn serialize(&self) -> Vec<u8>;
}

/// Write a variable-length integer (VarInt)
pub fn write_varint<W: Write>(writer: &mut W, value: u64) -> io::Result<()> {
    match value {
        0..=0xfc => {
            writer.write_all(&[value as u8])?;
        }
        0xfd..=0xffff => {
            writer.write_all(&[0xfd])?;
            writer.write_all(&(value as u16).to_le_bytes())?;
        }
        0x10000..=0xffffffff => {
            writer.write_all(&[0xfe])?;
            writer.write_all(&(value as u32).to_le_bytes())?;
        }
        _ => {
            writer.write_all(&[0xff])?;
            writer.write_all(&value.to_le_bytes())?;
        }
    }
    Ok(())
}

/// Write bytes with length prefix (VarInt length + data)
pub fn write_var_bytes<W: Write>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    write_varint(writer, data.len() as u64)?;
    writer.write_all(data)?;
    Ok(())
}

pub fn write_var_str<W: Write>(writer: &mut W, s: &str) -> io::Result<()> {
    write_var_bytes(writer, s.as_bytes())
}

/// Optional value: 0x00 for none, 0x01 followed by the value
pub fn write_opt_u64<W: Write>(writer: &mut W, value: Option<u64>) -> io::Result<()> {
    match value {
        Some(v) => {
            writer.write_all(&[1])?;
            writer.write_all(&v.to_le_bytes())
        }
        None => writer.write_all(&[0]),
    }
}

pub fn write_opt_bytes<W: Write>(writer: &mut W, data: Option<&[u8]>) -> io::Result<()> {
    match data {
        Some(d) => {
            writer.write_all(&[1])?;
            write_var_bytes(writer, d)
        }
        None => writer.write_all(&[0]),
    }
}
