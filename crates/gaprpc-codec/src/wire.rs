//! Field-level wire primitives shared by every operation and event.
//!
//! Integers are little-endian, booleans are one byte (0/1), optional
//! values carry a one-byte presence flag, byte strings and text carry a
//! u16 length prefix.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{CodecError, Result};

/// Bounds-checked cursor over a received buffer.
///
/// Every read verifies the remaining length first, so malformed input
/// yields `CodecError::Truncated` instead of a panic.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        if self.buf.len() < needed {
            return Err(CodecError::Truncated {
                needed,
                remaining: self.buf.len(),
            });
        }
        Ok(())
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn i8(&mut self) -> Result<i8> {
        self.ensure(1)?;
        Ok(self.buf.get_i8())
    }

    pub fn u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_le())
    }

    /// A strict 0/1 boolean.
    pub fn bool(&mut self, field: &'static str) -> Result<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::InvalidValue {
                field,
                value: other as u32,
            }),
        }
    }

    /// Presence flag in front of an optional value.
    pub fn present(&mut self, field: &'static str) -> Result<bool> {
        self.bool(field)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    /// Require that the whole buffer was consumed.
    pub fn finish(self) -> Result<()> {
        match self.buf.len() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }
}

/// A value with a fixed wire layout.
pub trait Wire: Sized {
    fn put(&self, dst: &mut BytesMut) -> Result<()>;
    fn get(src: &mut WireReader<'_>) -> Result<Self>;
}

impl Wire for () {
    fn put(&self, _dst: &mut BytesMut) -> Result<()> {
        Ok(())
    }

    fn get(_src: &mut WireReader<'_>) -> Result<Self> {
        Ok(())
    }
}

impl Wire for u8 {
    fn put(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_u8(*self);
        Ok(())
    }

    fn get(src: &mut WireReader<'_>) -> Result<Self> {
        src.u8()
    }
}

impl Wire for i8 {
    fn put(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_i8(*self);
        Ok(())
    }

    fn get(src: &mut WireReader<'_>) -> Result<Self> {
        src.i8()
    }
}

impl Wire for u16 {
    fn put(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_u16_le(*self);
        Ok(())
    }

    fn get(src: &mut WireReader<'_>) -> Result<Self> {
        src.u16()
    }
}

impl Wire for u32 {
    fn put(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_u32_le(*self);
        Ok(())
    }

    fn get(src: &mut WireReader<'_>) -> Result<Self> {
        src.u32()
    }
}

impl Wire for bool {
    fn put(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_u8(u8::from(*self));
        Ok(())
    }

    fn get(src: &mut WireReader<'_>) -> Result<Self> {
        src.bool("bool")
    }
}

impl<const N: usize> Wire for [u8; N] {
    fn put(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_slice(self);
        Ok(())
    }

    fn get(src: &mut WireReader<'_>) -> Result<Self> {
        src.array::<N>()
    }
}

impl Wire for Vec<u8> {
    fn put(&self, dst: &mut BytesMut) -> Result<()> {
        put_len_prefixed(dst, "bytes", self, u16::MAX as usize)
    }

    fn get(src: &mut WireReader<'_>) -> Result<Self> {
        let len = src.u16()? as usize;
        Ok(src.bytes(len)?.to_vec())
    }
}

impl Wire for String {
    fn put(&self, dst: &mut BytesMut) -> Result<()> {
        put_len_prefixed(dst, "text", self.as_bytes(), u16::MAX as usize)
    }

    fn get(src: &mut WireReader<'_>) -> Result<Self> {
        let len = src.u16()? as usize;
        let raw = src.bytes(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8("text"))
    }
}

impl<T: Wire> Wire for Option<T> {
    fn put(&self, dst: &mut BytesMut) -> Result<()> {
        match self {
            Some(value) => {
                dst.put_u8(1);
                value.put(dst)
            }
            None => {
                dst.put_u8(0);
                Ok(())
            }
        }
    }

    fn get(src: &mut WireReader<'_>) -> Result<Self> {
        if src.present("presence flag")? {
            Ok(Some(T::get(src)?))
        } else {
            Ok(None)
        }
    }
}

/// Write `data` with a u16 length prefix, refusing anything above `max`.
pub fn put_len_prefixed(
    dst: &mut BytesMut,
    field: &'static str,
    data: &[u8],
    max: usize,
) -> Result<()> {
    if data.len() > max {
        return Err(CodecError::TooLong {
            field,
            len: data.len(),
            max,
        });
    }
    dst.put_u16_le(data.len() as u16);
    dst.put_slice(data);
    Ok(())
}

/// Declare a struct whose wire form is its fields in order.
macro_rules! wire_struct {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $(#[$fmeta:meta])* pub $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $ty, )*
        }

        impl crate::wire::Wire for $name {
            #[allow(unused_variables)]
            fn put(&self, dst: &mut bytes::BytesMut) -> crate::error::Result<()> {
                $( crate::wire::Wire::put(&self.$field, dst)?; )*
                Ok(())
            }

            #[allow(unused_variables)]
            fn get(src: &mut crate::wire::WireReader<'_>) -> crate::error::Result<Self> {
                Ok(Self {
                    $( $field: crate::wire::Wire::get(src)?, )*
                })
            }
        }
    };
}

/// Declare a one-byte enumeration with checked decoding.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident ($field:literal) {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value, )*
        }

        impl $name {
            /// Wire value.
            pub fn as_u8(self) -> u8 {
                self as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = crate::error::CodecError;

            fn try_from(raw: u8) -> crate::error::Result<Self> {
                match raw {
                    $( $value => Ok($name::$variant), )*
                    other => Err(crate::error::CodecError::InvalidValue {
                        field: $field,
                        value: other as u32,
                    }),
                }
            }
        }

        impl crate::wire::Wire for $name {
            fn put(&self, dst: &mut bytes::BytesMut) -> crate::error::Result<()> {
                bytes::BufMut::put_u8(dst, self.as_u8());
                Ok(())
            }

            fn get(src: &mut crate::wire::WireReader<'_>) -> crate::error::Result<Self> {
                Self::try_from(src.u8()?)
            }
        }
    };
}

pub(crate) use wire_enum;
pub(crate) use wire_struct;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_reports_truncation_instead_of_panicking() {
        let mut reader = WireReader::new(&[0x01]);
        let err = reader.u32().unwrap_err();
        assert_eq!(
            err,
            CodecError::Truncated {
                needed: 4,
                remaining: 1
            }
        );
    }

    #[test]
    fn little_endian_integers() {
        let mut reader = WireReader::new(&[0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xFF]);
        assert_eq!(reader.u16().unwrap(), 0x1234);
        assert_eq!(reader.u32().unwrap(), 0x1234_5678);
        assert_eq!(reader.i8().unwrap(), -1);
        reader.finish().unwrap();
    }

    #[test]
    fn strict_booleans() {
        let mut reader = WireReader::new(&[0, 1, 2]);
        assert!(!reader.bool("flag").unwrap());
        assert!(reader.bool("flag").unwrap());
        assert!(matches!(
            reader.bool("flag"),
            Err(CodecError::InvalidValue { field: "flag", value: 2 })
        ));
    }

    #[test]
    fn option_uses_presence_byte() {
        let mut dst = BytesMut::new();
        Some(0xBEEFu16).put(&mut dst).unwrap();
        None::<u16>.put(&mut dst).unwrap();
        assert_eq!(dst.as_ref(), &[1, 0xEF, 0xBE, 0]);

        let mut reader = WireReader::new(&dst);
        assert_eq!(Option::<u16>::get(&mut reader).unwrap(), Some(0xBEEF));
        assert_eq!(Option::<u16>::get(&mut reader).unwrap(), None);
    }

    #[test]
    fn length_prefix_cannot_overrun() {
        let mut reader = WireReader::new(&[0x10, 0x00, b'a', b'b']);
        assert!(matches!(
            Vec::<u8>::get(&mut reader),
            Err(CodecError::Truncated { needed: 16, remaining: 2 })
        ));
    }

    #[test]
    fn text_must_be_utf8() {
        let mut reader = WireReader::new(&[0x02, 0x00, 0xC3, 0x28]);
        assert_eq!(
            <String as Wire>::get(&mut reader).unwrap_err(),
            CodecError::InvalidUtf8("text")
        );
    }

    #[test]
    fn finish_flags_trailing_bytes() {
        let mut reader = WireReader::new(&[1, 2, 3]);
        reader.u8().unwrap();
        assert_eq!(reader.finish().unwrap_err(), CodecError::TrailingBytes(2));
    }

    #[test]
    fn oversized_prefixed_field_rejected() {
        let mut dst = BytesMut::new();
        let err = put_len_prefixed(&mut dst, "name", &[0u8; 10], 4).unwrap_err();
        assert!(matches!(err, CodecError::TooLong { field: "name", len: 10, max: 4 }));
        assert!(dst.is_empty());
    }
}
