use super::value::Value;

/// A raw encoder for a MessagePack byte stream.
///
/// Integers and lengths always take their smallest representation.
/// Floats are always written as doubles.
#[derive(Debug)]
pub struct Encoder<'a> {
    buffer: &'a mut Vec<u8>,
}

impl<'a> Encoder<'a> {
    /// Creates an encoder that will append to the provided
    /// byte buffer.
    ///
    /// Any existing contents of `buffer` are left untouched.
    pub fn new(buffer: &'a mut Vec<u8>) -> Self {
        Self { buffer }
    }

    pub fn write_u8(&mut self, x: u8) {
        self.buffer.push(x);
    }

    pub fn write_i8(&mut self, x: i8) {
        self.write_u8(bytemuck::cast(x));
    }

    /// Writes a series of bytes to the stream. Does not write
    /// any sort of length prefix.
    pub fn write_slice(&mut self, slice: &[u8]) {
        self.buffer.extend_from_slice(slice);
    }

    pub fn write_nil(&mut self) {
        self.write_u8(0xc0);
    }

    pub fn write_bool(&mut self, x: bool) {
        self.write_u8(if x { 0xc3 } else { 0xc2 });
    }

    pub fn write_int(&mut self, x: i64) {
        if x >= 0 {
            self.write_uint(x.unsigned_abs());
        } else if x >= -32 {
            self.write_i8(x as i8);
        } else if let Ok(x) = i8::try_from(x) {
            self.write_u8(0xd0);
            self.write_i8(x);
        } else if let Ok(x) = i16::try_from(x) {
            self.write_u8(0xd1);
            self.write_slice(&x.to_be_bytes());
        } else if let Ok(x) = i32::try_from(x) {
            self.write_u8(0xd2);
            self.write_slice(&x.to_be_bytes());
        } else {
            self.write_u8(0xd3);
            self.write_slice(&x.to_be_bytes());
        }
    }

    pub fn write_uint(&mut self, x: u64) {
        if x <= 0x7f {
            self.write_u8(x as u8);
        } else if let Ok(x) = u8::try_from(x) {
            self.write_u8(0xcc);
            self.write_u8(x);
        } else if let Ok(x) = u16::try_from(x) {
            self.write_u8(0xcd);
            self.write_slice(&x.to_be_bytes());
        } else if let Ok(x) = u32::try_from(x) {
            self.write_u8(0xce);
            self.write_slice(&x.to_be_bytes());
        } else {
            self.write_u8(0xcf);
            self.write_slice(&x.to_be_bytes());
        }
    }

    pub fn write_f64(&mut self, x: f64) {
        self.write_u8(0xcb);
        self.write_slice(&x.to_be_bytes());
    }

    pub fn write_str(&mut self, x: &str) {
        let len = length(x.len());
        if len < 32 {
            self.write_u8(0xa0 | len as u8);
        } else {
            self.write_length(len, [0xd9, 0xda, 0xdb]);
        }
        self.write_slice(x.as_bytes());
    }

    pub fn write_bin(&mut self, x: &[u8]) {
        self.write_length(length(x.len()), [0xc4, 0xc5, 0xc6]);
        self.write_slice(x);
    }

    pub fn write_array_header(&mut self, len: usize) {
        let len = length(len);
        if len < 16 {
            self.write_u8(0x90 | len as u8);
        } else {
            self.write_length16(len, [0xdc, 0xdd]);
        }
    }

    pub fn write_map_header(&mut self, len: usize) {
        let len = length(len);
        if len < 16 {
            self.write_u8(0x80 | len as u8);
        } else {
            self.write_length16(len, [0xde, 0xdf]);
        }
    }

    pub fn write_ext(&mut self, kind: i8, data: &[u8]) {
        match data.len() {
            1 => self.write_u8(0xd4),
            2 => self.write_u8(0xd5),
            4 => self.write_u8(0xd6),
            8 => self.write_u8(0xd7),
            16 => self.write_u8(0xd8),
            len => self.write_length(length(len), [0xc7, 0xc8, 0xc9]),
        }
        self.write_i8(kind);
        self.write_slice(data);
    }

    pub fn write_value(&mut self, value: &Value) {
        match value {
            Value::Nil => self.write_nil(),
            Value::Bool(b) => self.write_bool(*b),
            Value::Int(i) => self.write_int(*i),
            Value::UInt(u) => self.write_uint(*u),
            Value::Float(x) => self.write_f64(*x),
            Value::Str(s) => self.write_str(s),
            Value::Bin(b) => self.write_bin(b),
            Value::Array(values) => {
                self.write_array_header(values.len());
                for value in values {
                    self.write_value(value);
                }
            }
            Value::Map(entries) => {
                self.write_map_header(entries.len());
                for (k, v) in entries {
                    self.write_value(k);
                    self.write_value(v);
                }
            }
            Value::Ext(kind, data) => self.write_ext(*kind, data),
        }
    }

    /// Writes a length using the 8/16/32-bit marker family given.
    fn write_length(&mut self, len: u32, markers: [u8; 3]) {
        if let Ok(len) = u8::try_from(len) {
            self.write_u8(markers[0]);
            self.write_u8(len);
        } else {
            self.write_length16(len, [markers[1], markers[2]]);
        }
    }

    fn write_length16(&mut self, len: u32, markers: [u8; 2]) {
        if let Ok(len) = u16::try_from(len) {
            self.write_u8(markers[0]);
            self.write_slice(&len.to_be_bytes());
        } else {
            self.write_u8(markers[1]);
            self.write_slice(&len.to_be_bytes());
        }
    }
}

fn length(len: usize) -> u32 {
    len.try_into().unwrap_or(u32::MAX)
}

/// Encodes a single value into a fresh buffer.
pub fn encode_value(value: &Value) -> Vec<u8> {
    let mut buffer = Vec::new();
    Encoder::new(&mut buffer).write_value(value);
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::py_rpc::decoder::decode_value;

    #[test]
    fn integers_use_the_smallest_form() {
        assert_eq!(encode_value(&Value::Int(5)), [0x05]);
        assert_eq!(encode_value(&Value::Int(-3)), [0xfd]);
        assert_eq!(encode_value(&Value::Int(-33)), [0xd0, 0xdf]);
        assert_eq!(encode_value(&Value::Int(200)), [0xcc, 0xc8]);
        assert_eq!(encode_value(&Value::Int(-200)), [0xd1, 0xff, 0x38]);
        assert_eq!(
            encode_value(&Value::Int(70_000)),
            [0xce, 0x00, 0x01, 0x11, 0x70]
        );
    }

    #[test]
    fn strings_switch_to_str8_at_32_bytes() {
        let short = "a".repeat(31);
        assert_eq!(encode_value(&Value::Str(short))[0], 0xbf);
        let long = "a".repeat(32);
        assert_eq!(&encode_value(&Value::Str(long))[..2], &[0xd9, 32]);
    }

    #[test]
    fn arrays_switch_to_array16_at_16_elements() {
        let bytes = encode_value(&Value::Array(vec![Value::Nil; 16]));
        assert_eq!(&bytes[..3], &[0xdc, 0x00, 0x10]);
    }

    #[test]
    fn mixed_document_survives_decoding() {
        let value = Value::Array(vec![
            Value::from("SyncUsingMod"),
            Value::Map(vec![(Value::Int(-70_000), Value::Bin(vec![1, 2, 3]))]),
            Value::Ext(4, vec![9; 3]),
            Value::Ext(-1, vec![9; 8]),
            Value::UInt(u64::MAX),
            Value::Float(-0.25),
            Value::Str("é".repeat(200)),
        ]);
        assert_eq!(decode_value(&encode_value(&value)).unwrap(), value);
    }
}
