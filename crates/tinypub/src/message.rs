// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-layout message encoding
//!
//! Every message type has a constant wire size. There is no framing, length
//! prefix or checksum: a datagram is valid iff its length equals
//! [`Message::SIZE`].
//!
//! ## Layout
//!
//! Fields are written little-endian with natural alignment, the way a C
//! compiler lays out a plain struct on the microcontroller side. Padding bytes
//! are zero. The total size includes trailing padding (C `sizeof`).
//!
//! ## Opting in
//!
//! - [`impl_message!`](crate::impl_message) derives the layout from the field
//!   list (the default for plain structs).
//! - A hand-written [`Message`] impl is the custom codec path.
//!
//! ```
//! use tinypub::impl_message;
//! use tinypub::message::{decode_message, encode_message, Message};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Default)]
//! struct MotorCommand {
//!     target: f32,
//!     kp: f32,
//!     enable: bool,
//! }
//! impl_message!(MotorCommand { target: f32, kp: f32, enable: bool });
//!
//! // 4 + 4 + 1, padded to 4-byte alignment
//! assert_eq!(MotorCommand::SIZE, 12);
//!
//! let cmd = MotorCommand { target: 1.5, kp: 10.0, enable: true };
//! let mut buf = [0u8; 12];
//! encode_message(&cmd, &mut buf).unwrap();
//! assert_eq!(decode_message::<MotorCommand>(&buf).unwrap(), cmd);
//! ```

use crate::error::{Error, Result};

/// A message with a fixed-length wire encoding
pub trait Message: Sized {
    /// Encoded length in bytes (constant for the type)
    const SIZE: usize;

    /// Write the message into `enc`
    fn encode(&self, enc: &mut FixedEncoder<'_>) -> Result<()>;

    /// Read a message from `dec`
    fn decode(dec: &mut FixedDecoder<'_>) -> Result<Self>;
}

/// A value usable as a struct field in [`impl_message!`](crate::impl_message)
pub trait Field: Sized {
    /// Encoded size in bytes
    const SIZE: usize;
    /// Alignment in bytes
    const ALIGN: usize;

    /// Write the field (aligning first)
    fn write(&self, enc: &mut FixedEncoder<'_>) -> Result<()>;

    /// Read the field (aligning first)
    fn read(dec: &mut FixedDecoder<'_>) -> Result<Self>;
}

/// Encode `msg` into the first `M::SIZE` bytes of `buf`.
///
/// Returns the number of bytes written (always `M::SIZE`).
pub fn encode_message<M: Message>(msg: &M, buf: &mut [u8]) -> Result<usize> {
    if buf.len() < M::SIZE {
        return Err(Error::BufferTooSmall);
    }
    let mut encoder = FixedEncoder::new(&mut buf[..M::SIZE]);
    msg.encode(&mut encoder)?;
    Ok(encoder.finish_padded())
}

/// Decode a message from exactly `M::SIZE` bytes.
pub fn decode_message<M: Message>(bytes: &[u8]) -> Result<M> {
    if bytes.len() != M::SIZE {
        return Err(Error::SizeMismatch {
            expected: M::SIZE,
            actual: bytes.len(),
        });
    }
    let mut decoder = FixedDecoder::new(bytes);
    M::decode(&mut decoder)
}

/// Reject message types that do not fit one datagram
pub(crate) fn check_wire_size<M: Message>() -> Result<()> {
    if M::SIZE > crate::MAX_PACKET_SIZE {
        return Err(Error::InvalidParameter(
            "message size exceeds MAX_PACKET_SIZE",
        ));
    }
    Ok(())
}

/// C-style struct size for a list of `(size, align)` fields,
/// including trailing padding.
pub const fn layout_size(fields: &[(usize, usize)]) -> usize {
    let mut offset = 0;
    let mut i = 0;
    while i < fields.len() {
        let (size, align) = fields[i];
        offset = align_up(offset, align) + size;
        i += 1;
    }
    align_up(offset, layout_align(fields))
}

/// C-style struct alignment (largest field alignment, at least 1)
pub const fn layout_align(fields: &[(usize, usize)]) -> usize {
    let mut max_align = 1;
    let mut i = 0;
    while i < fields.len() {
        if fields[i].1 > max_align {
            max_align = fields[i].1;
        }
        i += 1;
    }
    max_align
}

const fn align_up(value: usize, align: usize) -> usize {
    if align <= 1 {
        value
    } else {
        value.div_ceil(align) * align
    }
}

/// Fixed-buffer encoder (little-endian, natural alignment)
///
/// ```ignore
/// let mut buf = [0u8; 16];
/// let mut encoder = FixedEncoder::new(&mut buf);
/// encoder.encode_u8(1)?;
/// encoder.encode_f32(2.5)?; // aligned to offset 4
/// let len = encoder.finish_padded(); // 16, tail zero-filled
/// ```
pub struct FixedEncoder<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> FixedEncoder<'a> {
    /// Create a new encoder over `buf`
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current position
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Zero-fill the rest of the buffer and return its full length
    pub fn finish_padded(self) -> usize {
        self.buf[self.pos..].fill(0);
        self.buf.len()
    }

    /// Align to boundary, zero-filling the padding
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let target = align_up(self.pos, alignment);
        if target > self.buf.len() {
            return Err(Error::BufferTooSmall);
        }
        self.buf[self.pos..target].fill(0);
        self.pos = target;
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            return Err(Error::BufferTooSmall);
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    /// Encode u8
    pub fn encode_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    /// Encode i8
    pub fn encode_i8(&mut self, value: i8) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Encode bool (one byte, 0 or 1)
    pub fn encode_bool(&mut self, value: bool) -> Result<()> {
        self.encode_u8(u8::from(value))
    }

    /// Encode u16
    pub fn encode_u16(&mut self, value: u16) -> Result<()> {
        self.align(2)?;
        self.write_bytes(&value.to_le_bytes())
    }

    /// Encode i16
    pub fn encode_i16(&mut self, value: i16) -> Result<()> {
        self.align(2)?;
        self.write_bytes(&value.to_le_bytes())
    }

    /// Encode u32
    pub fn encode_u32(&mut self, value: u32) -> Result<()> {
        self.align(4)?;
        self.write_bytes(&value.to_le_bytes())
    }

    /// Encode i32
    pub fn encode_i32(&mut self, value: i32) -> Result<()> {
        self.align(4)?;
        self.write_bytes(&value.to_le_bytes())
    }

    /// Encode u64
    pub fn encode_u64(&mut self, value: u64) -> Result<()> {
        self.align(8)?;
        self.write_bytes(&value.to_le_bytes())
    }

    /// Encode i64
    pub fn encode_i64(&mut self, value: i64) -> Result<()> {
        self.align(8)?;
        self.write_bytes(&value.to_le_bytes())
    }

    /// Encode f32
    pub fn encode_f32(&mut self, value: f32) -> Result<()> {
        self.align(4)?;
        self.write_bytes(&value.to_le_bytes())
    }

    /// Encode f64
    pub fn encode_f64(&mut self, value: f64) -> Result<()> {
        self.align(8)?;
        self.write_bytes(&value.to_le_bytes())
    }

    /// Encode raw bytes (no alignment)
    pub fn encode_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_bytes(bytes)
    }
}

/// Fixed-buffer decoder, mirror of [`FixedEncoder`]
pub struct FixedDecoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FixedDecoder<'a> {
    /// Create a new decoder over `buf`
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current position
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left after the current position
    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Skip padding up to `alignment`
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let target = align_up(self.pos, alignment);
        if target > self.buf.len() {
            return Err(Error::BufferTooSmall);
        }
        self.pos = target;
        Ok(())
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.pos + N;
        if end > self.buf.len() {
            return Err(Error::BufferTooSmall);
        }
        let mut arr = [0u8; N];
        arr.copy_from_slice(&self.buf[self.pos..end]);
        self.pos = end;
        Ok(arr)
    }

    /// Decode u8
    pub fn decode_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Decode i8
    pub fn decode_i8(&mut self) -> Result<i8> {
        Ok(i8::from_le_bytes(self.read_array()?))
    }

    /// Decode bool (any non-zero byte is true)
    pub fn decode_bool(&mut self) -> Result<bool> {
        Ok(self.decode_u8()? != 0)
    }

    /// Decode u16
    pub fn decode_u16(&mut self) -> Result<u16> {
        self.align(2)?;
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    /// Decode i16
    pub fn decode_i16(&mut self) -> Result<i16> {
        self.align(2)?;
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    /// Decode u32
    pub fn decode_u32(&mut self) -> Result<u32> {
        self.align(4)?;
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Decode i32
    pub fn decode_i32(&mut self) -> Result<i32> {
        self.align(4)?;
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    /// Decode u64
    pub fn decode_u64(&mut self) -> Result<u64> {
        self.align(8)?;
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Decode i64
    pub fn decode_i64(&mut self) -> Result<i64> {
        self.align(8)?;
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// Decode f32
    pub fn decode_f32(&mut self) -> Result<f32> {
        self.align(4)?;
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    /// Decode f64
    pub fn decode_f64(&mut self) -> Result<f64> {
        self.align(8)?;
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// Decode raw bytes (borrowed, no alignment)
    pub fn decode_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self.pos + count;
        if end > self.buf.len() {
            return Err(Error::BufferTooSmall);
        }
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }
}

macro_rules! primitive_message {
    ($($ty:ty => $encode:ident, $decode:ident;)+) => {
        $(
            impl Field for $ty {
                const SIZE: usize = core::mem::size_of::<$ty>();
                const ALIGN: usize = core::mem::size_of::<$ty>();

                fn write(&self, enc: &mut FixedEncoder<'_>) -> Result<()> {
                    enc.$encode(*self)
                }

                fn read(dec: &mut FixedDecoder<'_>) -> Result<Self> {
                    dec.$decode()
                }
            }

            impl Message for $ty {
                const SIZE: usize = <$ty as Field>::SIZE;

                fn encode(&self, enc: &mut FixedEncoder<'_>) -> Result<()> {
                    Field::write(self, enc)
                }

                fn decode(dec: &mut FixedDecoder<'_>) -> Result<Self> {
                    <$ty as Field>::read(dec)
                }
            }
        )+
    };
}

primitive_message! {
    u8 => encode_u8, decode_u8;
    i8 => encode_i8, decode_i8;
    bool => encode_bool, decode_bool;
    u16 => encode_u16, decode_u16;
    i16 => encode_i16, decode_i16;
    u32 => encode_u32, decode_u32;
    i32 => encode_i32, decode_i32;
    u64 => encode_u64, decode_u64;
    i64 => encode_i64, decode_i64;
    f32 => encode_f32, decode_f32;
    f64 => encode_f64, decode_f64;
}

impl<T: Field + Copy + Default, const N: usize> Field for [T; N] {
    const SIZE: usize = T::SIZE * N;
    const ALIGN: usize = T::ALIGN;

    fn write(&self, enc: &mut FixedEncoder<'_>) -> Result<()> {
        for item in self {
            item.write(enc)?;
        }
        Ok(())
    }

    fn read(dec: &mut FixedDecoder<'_>) -> Result<Self> {
        let mut out = [T::default(); N];
        for slot in &mut out {
            *slot = T::read(dec)?;
        }
        Ok(out)
    }
}

impl<T: Field + Copy + Default, const N: usize> Message for [T; N] {
    const SIZE: usize = <[T; N] as Field>::SIZE;

    fn encode(&self, enc: &mut FixedEncoder<'_>) -> Result<()> {
        Field::write(self, enc)
    }

    fn decode(dec: &mut FixedDecoder<'_>) -> Result<Self> {
        <[T; N] as Field>::read(dec)
    }
}

/// Implement [`Message`] and [`Field`] for a plain struct with a C-compatible
/// layout derived from the listed fields.
///
/// Every field must be listed, in declaration order. The generated impl also
/// implements [`Field`], so such structs nest inside other messages.
///
/// ```
/// use tinypub::impl_message;
/// use tinypub::message::Message;
///
/// #[derive(Debug, Clone, Copy, Default, PartialEq)]
/// struct Imu {
///     timestamp_us: u64,
///     accel: [f32; 3],
///     gyro: [f32; 3],
/// }
/// impl_message!(Imu { timestamp_us: u64, accel: [f32; 3], gyro: [f32; 3] });
///
/// assert_eq!(Imu::SIZE, 32);
/// ```
#[macro_export]
macro_rules! impl_message {
    ($ty:ty { $($field:ident : $fty:ty),+ $(,)? }) => {
        impl $crate::message::Field for $ty {
            const SIZE: usize = <$ty as $crate::message::Message>::SIZE;
            const ALIGN: usize = $crate::message::layout_align(&[
                $((
                    <$fty as $crate::message::Field>::SIZE,
                    <$fty as $crate::message::Field>::ALIGN,
                )),+
            ]);

            fn write(
                &self,
                enc: &mut $crate::message::FixedEncoder<'_>,
            ) -> $crate::Result<()> {
                enc.align(<Self as $crate::message::Field>::ALIGN)?;
                let start = enc.position();
                $( <$fty as $crate::message::Field>::write(&self.$field, enc)?; )+
                let used = enc.position() - start;
                for _ in used..<Self as $crate::message::Field>::SIZE {
                    enc.encode_u8(0)?;
                }
                Ok(())
            }

            fn read(
                dec: &mut $crate::message::FixedDecoder<'_>,
            ) -> $crate::Result<Self> {
                dec.align(<Self as $crate::message::Field>::ALIGN)?;
                let start = dec.position();
                let value = Self {
                    $( $field: <$fty as $crate::message::Field>::read(dec)?, )+
                };
                let used = dec.position() - start;
                dec.decode_bytes(<Self as $crate::message::Field>::SIZE - used)?;
                Ok(value)
            }
        }

        impl $crate::message::Message for $ty {
            const SIZE: usize = $crate::message::layout_size(&[
                $((
                    <$fty as $crate::message::Field>::SIZE,
                    <$fty as $crate::message::Field>::ALIGN,
                )),+
            ]);

            fn encode(
                &self,
                enc: &mut $crate::message::FixedEncoder<'_>,
            ) -> $crate::Result<()> {
                $crate::message::Field::write(self, enc)
            }

            fn decode(
                dec: &mut $crate::message::FixedDecoder<'_>,
            ) -> $crate::Result<Self> {
                <$ty as $crate::message::Field>::read(dec)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, Default, PartialEq)]
    struct Feedback {
        id: u8,
        position: f64,
        current: i16,
    }
    crate::impl_message!(Feedback {
        id: u8,
        position: f64,
        current: i16,
    });

    #[derive(Debug, Clone, Copy, Default, PartialEq)]
    struct Joint {
        enabled: bool,
        feedback: Feedback,
    }
    crate::impl_message!(Joint {
        enabled: bool,
        feedback: Feedback,
    });

    /// Hand-written codec: big-endian u16 pair, no padding
    #[derive(Debug, PartialEq)]
    struct Heartbeat {
        node: u16,
        seq: u16,
    }

    impl Message for Heartbeat {
        const SIZE: usize = 4;

        fn encode(&self, enc: &mut FixedEncoder<'_>) -> Result<()> {
            enc.encode_bytes(&self.node.to_be_bytes())?;
            enc.encode_bytes(&self.seq.to_be_bytes())
        }

        fn decode(dec: &mut FixedDecoder<'_>) -> Result<Self> {
            let node = dec.decode_bytes(2)?;
            let seq = dec.decode_bytes(2)?;
            Ok(Self {
                node: u16::from_be_bytes([node[0], node[1]]),
                seq: u16::from_be_bytes([seq[0], seq[1]]),
            })
        }
    }

    #[test]
    fn test_c_layout_sizes() {
        // u8 @0, f64 @8, i16 @16 -> 18, padded to 24
        assert_eq!(<Feedback as Message>::SIZE, 24);
        assert_eq!(<Feedback as Field>::ALIGN, 8);
        // bool @0, Feedback @8 (align 8) -> 32
        assert_eq!(<Joint as Message>::SIZE, 32);
        assert_eq!(<[f32; 3] as Message>::SIZE, 12);
        assert_eq!(<f64 as Message>::SIZE, 8);
    }

    #[test]
    fn test_layout_size_empty_tail() {
        assert_eq!(layout_size(&[(4, 4), (4, 4)]), 8);
        assert_eq!(layout_size(&[(1, 1), (4, 4), (1, 1)]), 12);
        assert_eq!(layout_align(&[]), 1);
    }

    #[test]
    fn test_padding_is_zeroed() {
        let msg = Feedback {
            id: 7,
            position: -2.5,
            current: 300,
        };
        let mut buf = [0xAAu8; 24];
        encode_message(&msg, &mut buf).unwrap();

        assert_eq!(buf[0], 7);
        assert_eq!(&buf[1..8], &[0u8; 7]);
        assert_eq!(&buf[8..16], &(-2.5f64).to_le_bytes());
        assert_eq!(&buf[16..18], &300i16.to_le_bytes());
        assert_eq!(&buf[18..24], &[0u8; 6]);
    }

    #[test]
    fn test_nested_round_trip() {
        let msg = Joint {
            enabled: true,
            feedback: Feedback {
                id: 3,
                position: 1.25,
                current: -12,
            },
        };
        let mut buf = [0u8; 32];
        assert_eq!(encode_message(&msg, &mut buf).unwrap(), 32);
        assert_eq!(decode_message::<Joint>(&buf).unwrap(), msg);
    }

    #[test]
    fn test_custom_codec() {
        let msg = Heartbeat { node: 0x0102, seq: 0x0304 };
        let mut buf = [0u8; 4];
        encode_message(&msg, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(decode_message::<Heartbeat>(&buf).unwrap(), msg);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let result = decode_message::<f32>(&[0u8; 5]);
        assert_eq!(
            result,
            Err(Error::SizeMismatch {
                expected: 4,
                actual: 5
            })
        );
    }

    #[test]
    fn test_encode_buffer_too_small() {
        let mut buf = [0u8; 2];
        assert_eq!(encode_message(&1u32, &mut buf), Err(Error::BufferTooSmall));
    }

    #[test]
    fn test_random_round_trip() {
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        for _ in 0..64 {
            let msg = Feedback {
                id: rng.u8(..),
                position: rng.f64() * 1000.0 - 500.0,
                current: rng.i16(..),
            };
            let mut buf = [0u8; 24];
            encode_message(&msg, &mut buf).unwrap();
            let decoded: Feedback = decode_message(&buf).unwrap();
            assert_eq!(decoded.position.to_bits(), msg.position.to_bits());
            assert_eq!(decoded, msg);
        }
    }
}
