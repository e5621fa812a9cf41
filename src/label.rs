use std::fmt;
use std::hash::Hash;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

/// A match result label.
///
/// A label is an opaque value attached to the patterns of one result. The
/// construction pipeline only needs equality, hashing and a stable byte
/// encoding: equality and hashing drive ambiguity detection and
/// minimization, while the byte encoding is what makes built DFAs
/// serializable and content-fingerprintable. No ordering is ever assumed;
/// wherever determinism matters, insertion order is used instead.
///
/// The encoding must be stable across runs and must round trip through
/// `decode` without loss. Implementations are provided for the common
/// primitive types and `String`.
pub trait Label: Clone + Eq + Hash + fmt::Debug {
    /// Append this label's byte encoding to `dst`.
    fn encode(&self, dst: &mut Vec<u8>);

    /// Decode a label from the front of `src`, advancing it past the bytes
    /// read.
    fn decode(src: &mut &[u8]) -> Result<Self>;
}

fn truncated() -> Error {
    Error::deserialize("unexpected end of input while decoding a label")
}

macro_rules! int_label {
    ($ty:ty, $write:ident, $read:ident) => {
        impl Label for $ty {
            fn encode(&self, dst: &mut Vec<u8>) {
                dst.$write::<LittleEndian>(*self).unwrap();
            }

            fn decode(src: &mut &[u8]) -> Result<$ty> {
                src.$read::<LittleEndian>().map_err(|_| truncated())
            }
        }
    };
}

int_label!(u16, write_u16, read_u16);
int_label!(u32, write_u32, read_u32);
int_label!(u64, write_u64, read_u64);
int_label!(i32, write_i32, read_i32);
int_label!(i64, write_i64, read_i64);

impl Label for bool {
    fn encode(&self, dst: &mut Vec<u8>) {
        dst.push(*self as u8);
    }

    fn decode(src: &mut &[u8]) -> Result<bool> {
        match src.read_u8().map_err(|_| truncated())? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(Error::deserialize(&format!(
                "invalid boolean label byte: 0x{:02X}",
                b
            ))),
        }
    }
}

impl Label for u8 {
    fn encode(&self, dst: &mut Vec<u8>) {
        dst.push(*self);
    }

    fn decode(src: &mut &[u8]) -> Result<u8> {
        src.read_u8().map_err(|_| truncated())
    }
}

impl Label for usize {
    fn encode(&self, dst: &mut Vec<u8>) {
        dst.write_u64::<LittleEndian>(*self as u64).unwrap();
    }

    fn decode(src: &mut &[u8]) -> Result<usize> {
        let n = src.read_u64::<LittleEndian>().map_err(|_| truncated())?;
        usize::try_from(n).map_err(|_| {
            Error::deserialize("label does not fit in usize on this target")
        })
    }
}

impl Label for char {
    fn encode(&self, dst: &mut Vec<u8>) {
        dst.write_u32::<LittleEndian>(*self as u32).unwrap();
    }

    fn decode(src: &mut &[u8]) -> Result<char> {
        let n = src.read_u32::<LittleEndian>().map_err(|_| truncated())?;
        char::from_u32(n).ok_or_else(|| {
            Error::deserialize(&format!("invalid char label: 0x{:X}", n))
        })
    }
}

impl Label for String {
    fn encode(&self, dst: &mut Vec<u8>) {
        dst.write_u32::<LittleEndian>(self.len() as u32).unwrap();
        dst.extend_from_slice(self.as_bytes());
    }

    fn decode(src: &mut &[u8]) -> Result<String> {
        let len = src.read_u32::<LittleEndian>().map_err(|_| truncated())?
            as usize;
        if src.len() < len {
            return Err(truncated());
        }
        let data = *src;
        let (bytes, rest) = data.split_at(len);
        let s = std::str::from_utf8(bytes).map_err(|_| {
            Error::deserialize("string label is not valid UTF-8")
        })?;
        *src = rest;
        Ok(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<L: Label>(label: L) -> L {
        let mut buf = vec![];
        label.encode(&mut buf);
        let mut src = &buf[..];
        let got = L::decode(&mut src).unwrap();
        assert!(src.is_empty(), "decode must consume the whole encoding");
        got
    }

    #[test]
    fn roundtrips() {
        assert_eq!(true, roundtrip(true));
        assert_eq!(false, roundtrip(false));
        assert_eq!(0xFFFFu16, roundtrip(0xFFFFu16));
        assert_eq!(42u32, roundtrip(42u32));
        assert_eq!(-7i64, roundtrip(-7i64));
        assert_eq!('é', roundtrip('é'));
        assert_eq!("ident".to_string(), roundtrip("ident".to_string()));
        assert_eq!("".to_string(), roundtrip("".to_string()));
    }

    #[test]
    fn rejects_invalid_bool() {
        let mut src = &[2u8][..];
        assert!(bool::decode(&mut src).is_err());
    }

    #[test]
    fn rejects_truncated_string() {
        let mut buf = vec![];
        "abcdef".to_string().encode(&mut buf);
        let mut src = &buf[..buf.len() - 1];
        assert!(String::decode(&mut src).is_err());
    }
}
