use super::value::Value;
use std::{num::TryFromIntError, str::Utf8Error};

/// An error while decoding a PyRpc payload.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("need at least {0} more bytes")]
    EndOfStream(usize),
    #[error("reserved marker byte {0:#04x}")]
    ReservedMarker(u8),
    #[error("nesting exceeds {MAX_DEPTH} levels")]
    TooDeep,
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
    #[error("payload is not an array led by a method name")]
    NotACall,
    #[error(transparent)]
    Utf8(#[from] Utf8Error),
    #[error(transparent)]
    IntConversion(#[from] TryFromIntError),
}

pub type Result<T, E = DecodeError> = std::result::Result<T, E>;

/// Limit on array/map nesting, so hostile payloads
/// cannot exhaust the stack.
pub const MAX_DEPTH: usize = 64;

/// A raw decoder for a MessagePack byte stream.
#[derive(Debug)]
pub struct Decoder<'a> {
    buffer: &'a [u8],
}

impl<'a> Decoder<'a> {
    /// Creates a decoder from the buffer it will read from.
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer }
    }

    /// Gets the remaining buffer.
    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    /// Returns if there is no data left in the buffer.
    pub fn is_finished(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consumes `n` bytes from the buffer, returning them as a slice.
    pub fn consume_slice(&mut self, n: usize) -> Result<&'a [u8]> {
        if n <= self.buffer.len() {
            let (data, buffer) = self.buffer.split_at(n);
            self.buffer = buffer;
            Ok(data)
        } else {
            Err(DecodeError::EndOfStream(n - self.buffer.len()))
        }
    }

    /// Consumes `N` bytes into an array.
    pub fn consume<const N: usize>(&mut self) -> Result<[u8; N]> {
        let data = self.consume_slice(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(data);
        Ok(array)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.consume::<1>().map(|[x]| x)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.consume().map(i8::from_be_bytes)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.consume().map(u16::from_be_bytes)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.consume().map(i16::from_be_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.consume().map(u32::from_be_bytes)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.consume().map(i32::from_be_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.consume().map(u64::from_be_bytes)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.consume().map(i64::from_be_bytes)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.consume().map(f32::from_be_bytes)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.consume().map(f64::from_be_bytes)
    }

    /// Reads a single value, including everything nested in it.
    pub fn read_value(&mut self) -> Result<Value> {
        self.read_value_at(0)
    }

    fn read_value_at(&mut self, depth: usize) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::TooDeep);
        }

        let marker = self.read_u8()?;
        let value = match marker {
            0x00..=0x7f => Value::Int(i64::from(marker)),
            0x80..=0x8f => self.read_map(usize::from(marker & 0x0f), depth)?,
            0x90..=0x9f => self.read_array(usize::from(marker & 0x0f), depth)?,
            0xa0..=0xbf => self.read_str(usize::from(marker & 0x1f))?,
            0xc0 => Value::Nil,
            0xc1 => return Err(DecodeError::ReservedMarker(marker)),
            0xc2 => Value::Bool(false),
            0xc3 => Value::Bool(true),
            0xc4 => {
                let len = usize::from(self.read_u8()?);
                self.read_bin(len)?
            }
            0xc5 => {
                let len = usize::from(self.read_u16()?);
                self.read_bin(len)?
            }
            0xc6 => {
                let len = usize::try_from(self.read_u32()?)?;
                self.read_bin(len)?
            }
            0xc7 => {
                let len = usize::from(self.read_u8()?);
                self.read_ext(len)?
            }
            0xc8 => {
                let len = usize::from(self.read_u16()?);
                self.read_ext(len)?
            }
            0xc9 => {
                let len = usize::try_from(self.read_u32()?)?;
                self.read_ext(len)?
            }
            0xca => Value::Float(f64::from(self.read_f32()?)),
            0xcb => Value::Float(self.read_f64()?),
            0xcc => Value::Int(i64::from(self.read_u8()?)),
            0xcd => Value::Int(i64::from(self.read_u16()?)),
            0xce => Value::Int(i64::from(self.read_u32()?)),
            0xcf => {
                let x = self.read_u64()?;
                match i64::try_from(x) {
                    Ok(x) => Value::Int(x),
                    Err(_) => Value::UInt(x),
                }
            }
            0xd0 => Value::Int(i64::from(self.read_i8()?)),
            0xd1 => Value::Int(i64::from(self.read_i16()?)),
            0xd2 => Value::Int(i64::from(self.read_i32()?)),
            0xd3 => Value::Int(self.read_i64()?),
            0xd4 => self.read_ext(1)?,
            0xd5 => self.read_ext(2)?,
            0xd6 => self.read_ext(4)?,
            0xd7 => self.read_ext(8)?,
            0xd8 => self.read_ext(16)?,
            0xd9 => {
                let len = usize::from(self.read_u8()?);
                self.read_str(len)?
            }
            0xda => {
                let len = usize::from(self.read_u16()?);
                self.read_str(len)?
            }
            0xdb => {
                let len = usize::try_from(self.read_u32()?)?;
                self.read_str(len)?
            }
            0xdc => {
                let len = usize::from(self.read_u16()?);
                self.read_array(len, depth)?
            }
            0xdd => {
                let len = usize::try_from(self.read_u32()?)?;
                self.read_array(len, depth)?
            }
            0xde => {
                let len = usize::from(self.read_u16()?);
                self.read_map(len, depth)?
            }
            0xdf => {
                let len = usize::try_from(self.read_u32()?)?;
                self.read_map(len, depth)?
            }
            0xe0..=0xff => Value::Int(i64::from(i8::from_be_bytes([marker]))),
        };
        Ok(value)
    }

    fn read_str(&mut self, len: usize) -> Result<Value> {
        let s = std::str::from_utf8(self.consume_slice(len)?)?;
        Ok(Value::Str(s.to_owned()))
    }

    fn read_bin(&mut self, len: usize) -> Result<Value> {
        Ok(Value::Bin(self.consume_slice(len)?.to_vec()))
    }

    fn read_ext(&mut self, len: usize) -> Result<Value> {
        let kind = self.read_i8()?;
        let data = self.consume_slice(len)?.to_vec();
        Ok(Value::Ext(kind, data))
    }

    fn read_array(&mut self, len: usize, depth: usize) -> Result<Value> {
        // Every element takes at least one byte, so a length
        // beyond the remaining buffer is bogus.
        let mut values = Vec::with_capacity(len.min(self.buffer.len()));
        for _ in 0..len {
            values.push(self.read_value_at(depth + 1)?);
        }
        Ok(Value::Array(values))
    }

    fn read_map(&mut self, len: usize, depth: usize) -> Result<Value> {
        let mut entries = Vec::with_capacity(len.min(self.buffer.len() / 2));
        for _ in 0..len {
            let key = self.read_value_at(depth + 1)?;
            let value = self.read_value_at(depth + 1)?;
            entries.push((key, value));
        }
        Ok(Value::Map(entries))
    }
}

/// Decodes exactly one value spanning the whole buffer.
pub fn decode_value(bytes: &[u8]) -> Result<Value> {
    let mut decoder = Decoder::new(bytes);
    let value = decoder.read_value()?;
    if !decoder.is_finished() {
        return Err(DecodeError::TrailingBytes(decoder.buffer().len()));
    }
    Ok(value)
}
