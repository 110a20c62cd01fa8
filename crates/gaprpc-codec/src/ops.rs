//! The operation descriptor pattern every command follows.
//!
//! A command body is `opcode` then the operation's fields. A response body
//! is the echoed `opcode`, a `u32` status, and the output fields when the
//! status is success.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};
use crate::status::Status;
use crate::wire::WireReader;

/// One RPC operation: opcode, parameter layout and output layout.
pub trait Operation: Sized {
    const OPCODE: u8;
    const NAME: &'static str;
    /// When false the controller sends no response and the call completes
    /// once the command is written.
    const EXPECTS_RESPONSE: bool = true;

    type Output;

    fn encode_params(&self, dst: &mut BytesMut) -> Result<()>;
    fn decode_params(src: &mut WireReader<'_>) -> Result<Self>;
    fn encode_output(output: &Self::Output, dst: &mut BytesMut) -> Result<()>;
    fn decode_output(src: &mut WireReader<'_>) -> Result<Self::Output>;
}

/// A decoded response: either the output or the controller's error status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Success(T),
    Failed(Status),
}

impl<T> Outcome<T> {
    pub fn status(&self) -> Status {
        match self {
            Outcome::Success(_) => Status::SUCCESS,
            Outcome::Failed(status) => *status,
        }
    }
}

/// Encode a command body for `op`.
///
/// Nothing is produced on error, so a rejected call never reaches the link.
pub fn encode_request<O: Operation>(op: &O) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(16);
    dst.put_u8(O::OPCODE);
    op.encode_params(&mut dst)?;
    Ok(dst.freeze())
}

/// Decode a command body, as the controller side would.
pub fn decode_request<O: Operation>(payload: &[u8]) -> Result<O> {
    let mut src = WireReader::new(payload);
    expect_opcode::<O>(&mut src)?;
    let op = O::decode_params(&mut src)?;
    src.finish()?;
    Ok(op)
}

/// Encode a response body for `O`.
pub fn encode_response<O: Operation>(outcome: &Outcome<O::Output>) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(16);
    dst.put_u8(O::OPCODE);
    dst.put_u32_le(outcome.status().0);
    if let Outcome::Success(output) = outcome {
        O::encode_output(output, &mut dst)?;
    }
    Ok(dst.freeze())
}

/// Decode a response body for `O`.
///
/// A failed status carries no output, so anything after it is ignored.
pub fn decode_response<O: Operation>(payload: &[u8]) -> Result<Outcome<O::Output>> {
    let mut src = WireReader::new(payload);
    expect_opcode::<O>(&mut src)?;
    let status = Status(src.u32()?);
    if !status.is_success() {
        return Ok(Outcome::Failed(status));
    }
    let output = O::decode_output(&mut src)?;
    src.finish()?;
    Ok(Outcome::Success(output))
}

/// Leading opcode of a command or response body.
pub fn peek_opcode(payload: &[u8]) -> Option<u8> {
    payload.first().copied()
}

fn expect_opcode<O: Operation>(src: &mut WireReader<'_>) -> Result<()> {
    let actual = src.u8()?;
    if actual != O::OPCODE {
        return Err(CodecError::UnexpectedOpcode {
            expected: O::OPCODE,
            actual,
        });
    }
    Ok(())
}

/// Declare an operation whose parameters and output are plain wire fields.
macro_rules! operation {
    (
        $(#[$meta:meta])*
        pub struct $name:ident [$opcode:literal, $label:literal] {
            $( $(#[$fmeta:meta])* pub $field:ident : $ty:ty ),* $(,)?
        } -> $output:ty;
    ) => {
        crate::wire::wire_struct! {
            $(#[$meta])*
            pub struct $name {
                $( $(#[$fmeta])* pub $field: $ty, )*
            }
        }

        impl crate::ops::Operation for $name {
            const OPCODE: u8 = $opcode;
            const NAME: &'static str = $label;
            type Output = $output;

            fn encode_params(&self, dst: &mut bytes::BytesMut) -> crate::error::Result<()> {
                crate::wire::Wire::put(self, dst)
            }

            fn decode_params(src: &mut crate::wire::WireReader<'_>) -> crate::error::Result<Self> {
                crate::wire::Wire::get(src)
            }

            fn encode_output(output: &Self::Output, dst: &mut bytes::BytesMut) -> crate::error::Result<()> {
                crate::wire::Wire::put(output, dst)
            }

            fn decode_output(src: &mut crate::wire::WireReader<'_>) -> crate::error::Result<Self::Output> {
                crate::wire::Wire::get(src)
            }
        }
    };
}

pub(crate) use operation;
