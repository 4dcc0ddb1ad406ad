//! The §6 wire serialization format — `encode`/`decode` for a [`Message`]
//! whose payload is `None`, `Scalar`, or `Vector`.
//!
//! # 设计背景（Why）
//! - `spec.md` §6 把这套二进制格式标注为"可选，供跨进程转发使用"；总线本身
//!   在进程内投递时从不序列化消息（`SPEC_FULL.md` §4.14），所以这个编解码器
//!   只被测试和可选的 CLI 工具调用，不在热路径上。
//! - 格式只覆盖标量/向量两种 payload 形状，因为这是原始 C++ 实现里唯一会
//!   跨进程转发的数据（传感器读数、模型输入/输出向量）；`UData`/`ProgEvent`/
//!   `Prediction`/`Waypoint` 从不经过这条路径，编码它们会返回 `NotSupported`。
//!
//! # 线格式（How）
//! `id:u64 | source_len:u16 | source:bytes | timestamp_us:u64 |
//! payload_len:u32 | payload:bytes`, all multi-byte integers little-endian.
//! A scalar payload is 8 bytes (one little-endian `f64`); a vector payload
//! is `len:u16` followed by `len` little-endian `f64` elements.
use crate::error::ProgError;
use crate::message::{Message, MessageId, Payload};

const TAG_NONE: u8 = 0;
const TAG_SCALAR: u8 = 1;
const TAG_VECTOR: u8 = 2;

/// Encodes `message` into the wire format. `NotSupported` if its payload
/// is one of the struct-carrying variants (`UData`, `Waypoint`,
/// `ProgEvent`, `Prediction`) this format doesn't cover.
pub fn encode(message: &Message) -> Result<Vec<u8>, ProgError> {
    let mut payload = Vec::new();
    let tag = match message.payload() {
        Payload::None => TAG_NONE,
        Payload::Scalar(v) => {
            payload.extend_from_slice(&v.to_le_bytes());
            TAG_SCALAR
        }
        Payload::Vector(v) => {
            let len: u16 = v.len().try_into().map_err(|_| {
                ProgError::size_mismatch("vector payload too long for a u16 length prefix")
            })?;
            payload.extend_from_slice(&len.to_le_bytes());
            for element in v {
                payload.extend_from_slice(&element.to_le_bytes());
            }
            TAG_VECTOR
        }
        other => {
            return Err(ProgError::not_supported(format!(
                "wire format does not cover payload {other:?}"
            )))
        }
    };

    let source = message.source().as_bytes();
    let source_len: u16 = source
        .len()
        .try_into()
        .map_err(|_| ProgError::size_mismatch("source string too long for a u16 length prefix"))?;
    let payload_len: u32 = (payload.len() + 1).try_into().map_err(|_| {
        ProgError::size_mismatch("encoded payload too long for a u32 length prefix")
    })?;

    let mut out = Vec::with_capacity(8 + 2 + source.len() + 8 + 4 + payload.len() + 1);
    out.extend_from_slice(&message.id().raw().to_le_bytes());
    out.extend_from_slice(&source_len.to_le_bytes());
    out.extend_from_slice(source);
    out.extend_from_slice(&message.timestamp().to_le_bytes());
    out.extend_from_slice(&payload_len.to_le_bytes());
    out.push(tag);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decodes a [`Message`] previously produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Message, ProgError> {
    let mut reader = Reader::new(bytes);
    let id = MessageId::from_raw(reader.take_u64()?);
    let source_len = reader.take_u16()? as usize;
    let source = String::from_utf8(reader.take_bytes(source_len)?.to_vec())
        .map_err(|err| ProgError::size_mismatch(format!("source is not valid utf-8: {err}")))?;
    let timestamp = reader.take_u64()?;
    let payload_len = reader.take_u32()? as usize;
    let payload_bytes = reader.take_bytes(payload_len)?;

    let mut payload_reader = Reader::new(payload_bytes);
    let tag = payload_reader.take_u8()?;
    let payload = match tag {
        TAG_NONE => Payload::None,
        TAG_SCALAR => Payload::Scalar(f64::from_le_bytes(
            payload_reader.take_bytes(8)?.try_into().unwrap(),
        )),
        TAG_VECTOR => {
            let len = payload_reader.take_u16()? as usize;
            let mut values = Vec::with_capacity(len);
            for _ in 0..len {
                values.push(f64::from_le_bytes(
                    payload_reader.take_bytes(8)?.try_into().unwrap(),
                ));
            }
            Payload::Vector(values)
        }
        other => {
            return Err(ProgError::size_mismatch(format!(
                "unknown wire payload tag {other}"
            )))
        }
    };

    Message::new(id, source, timestamp, payload)
}

/// A small cursor over a byte slice, bounds-checked into `ProgError`
/// rather than panicking on truncated input.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    fn take_bytes(&mut self, n: usize) -> Result<&'a [u8], ProgError> {
        let end = self.pos + n;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or_else(|| ProgError::size_mismatch("wire message truncated"))?;
        self.pos = end;
        Ok(slice)
    }

    fn take_u8(&mut self) -> Result<u8, ProgError> {
        Ok(self.take_bytes(1)?[0])
    }

    fn take_u16(&mut self) -> Result<u16, ProgError> {
        Ok(u16::from_le_bytes(self.take_bytes(2)?.try_into().unwrap()))
    }

    fn take_u32(&mut self) -> Result<u32, ProgError> {
        Ok(u32::from_le_bytes(self.take_bytes(4)?.try_into().unwrap()))
    }

    fn take_u64(&mut self) -> Result<u64, ProgError> {
        Ok(u64::from_le_bytes(self.take_bytes(8)?.try_into().unwrap()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_round_trips() {
        let msg = Message::new(MessageId::VOLTS, "battery0", 42, Payload::Scalar(3.7)).unwrap();
        let bytes = encode(&msg).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn vector_round_trips() {
        let msg = Message::new(
            MessageId::MODEL_INPUT_VECTOR,
            "battery0",
            1_000,
            Payload::Vector(vec![1.0, 2.0, 3.0]),
        )
        .unwrap();
        let bytes = encode(&msg).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn none_round_trips() {
        let msg = Message::new(MessageId::ROUTE_END, "gps0", 0, Payload::None).unwrap();
        let bytes = encode(&msg).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn truncated_input_is_size_mismatch() {
        let msg = Message::new(MessageId::VOLTS, "battery0", 42, Payload::Scalar(3.7)).unwrap();
        let mut bytes = encode(&msg).unwrap();
        bytes.truncate(bytes.len() - 1);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn struct_payload_is_not_supported() {
        let prediction = crate::message::Prediction::default();
        let msg = Message::new(
            MessageId::PREDICTION,
            "battery0",
            0,
            Payload::Prediction(std::sync::Arc::new(prediction)),
        )
        .unwrap();
        assert!(encode(&msg).is_err());
    }
}
