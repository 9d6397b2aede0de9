//! Blocking frame I/O over any `Read`/`Write` byte stream.
//!
//! Replies carry no length prefix. The reader must already know from its own
//! request how many bytes to expect: `width` bytes after a READ, one status
//! byte after a WRITE, nothing after HELLO, IRQ or NOP.

use std::io::{self, Read, Write};

use super::message::{AccessWidth, ControlMessage, FRAME_SIZE, STATUS_FAIL, STATUS_OK};

pub fn read_message<R: Read + ?Sized>(reader: &mut R) -> io::Result<ControlMessage> {
    let mut frame = [0u8; FRAME_SIZE];
    reader.read_exact(&mut frame)?;
    Ok(ControlMessage::decode(&frame))
}

pub fn write_message<W: Write + ?Sized>(writer: &mut W, msg: &ControlMessage) -> io::Result<()> {
    writer.write_all(&msg.encode())?;
    writer.flush()
}

/// Read a `width`-byte little-endian payload and widen it to `u64`.
pub fn read_payload<R: Read + ?Sized>(reader: &mut R, width: AccessWidth) -> io::Result<u64> {
    let mut raw = [0u8; 8];
    reader.read_exact(&mut raw[..width.bytes()])?;
    Ok(u64::from_le_bytes(raw))
}

/// Write the low `width` bytes of `value`, little-endian.
pub fn write_payload<W: Write + ?Sized>(
    writer: &mut W,
    width: AccessWidth,
    value: u64,
) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes()[..width.bytes()])?;
    writer.flush()
}

pub fn read_status<R: Read + ?Sized>(reader: &mut R) -> io::Result<bool> {
    let mut status = [0u8; 1];
    reader.read_exact(&mut status)?;
    Ok(status[0] != STATUS_FAIL)
}

pub fn write_status<W: Write + ?Sized>(writer: &mut W, ok: bool) -> io::Result<()> {
    writer.write_all(&[if ok { STATUS_OK } else { STATUS_FAIL }])?;
    writer.flush()
}
