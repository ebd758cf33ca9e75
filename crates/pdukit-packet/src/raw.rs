use crate::error::{Error, Result};
use crate::fmt_payload;
use crate::pdu::{Decoded, Layer, Pdu, PduKind, Protocol};
use std::fmt::{Debug, Formatter};

/// An opaque payload.
///
/// Raw payloads are always the last layer of a chain. They are produced when decoding bytes whose
/// protocol is unknown, or which are carried by a protocol that does not dispatch on its payload
/// (such as `UDP`).
#[derive(Clone, Default, Eq, PartialEq)]
pub struct RawPdu {
    payload: Vec<u8>,
}

impl RawPdu {
    #[must_use]
    pub const fn new(payload: Vec<u8>) -> Self {
        Self { payload }
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Vec<u8> {
        &mut self.payload
    }

    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Reinterpret the payload as a layer of type `T`, discarding anything it encapsulates.
    pub fn to<T: Protocol>(&self) -> Result<T> {
        Ok(T::decode(&self.payload).map_err(malformed)?.header)
    }

    /// Reinterpret the payload as a chain whose outermost layer is of type `T`.
    pub fn to_pdu<T: Protocol>(&self) -> Result<Pdu> {
        Pdu::parse::<T>(&self.payload)
    }
}

fn malformed(err: Error) -> Error {
    match err {
        Error::InsufficientPacketBuffer(name, minimum, provided) => Error::MalformedPacket(
            format!("{name} requires {minimum} bytes, {provided} available"),
        ),
        err => err,
    }
}

impl Debug for RawPdu {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawPdu")
            .field("payload", &fmt_payload(&self.payload))
            .finish()
    }
}

impl Protocol for RawPdu {
    const KIND: PduKind = PduKind::Raw;

    fn header_size(&self) -> u32 {
        self.payload.len() as u32
    }

    fn write(&self, frame: &mut [u8], _: Option<PduKind>, _: Option<&Layer>) -> Result<()> {
        frame[..self.payload.len()].copy_from_slice(&self.payload);
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Decoded<'_, Self>> {
        Ok(Decoded::new(Self::new(bytes.to_vec()), &[], None))
    }

    fn from_layer(layer: &Layer) -> Option<&Self> {
        match layer {
            Layer::Raw(raw) => Some(raw),
            _ => None,
        }
    }

    fn from_layer_mut(layer: &mut Layer) -> Option<&mut Self> {
        match layer {
            Layer::Raw(raw) => Some(raw),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arp::Arp;

    #[test]
    fn test_serialize() {
        let raw = RawPdu::new(vec![1, 2, 3]);
        assert_eq!(3, raw.header_size());
        assert_eq!(vec![1, 2, 3], Pdu::new(raw).serialize().unwrap());
    }

    #[test]
    fn test_to() {
        let bytes = Pdu::new(Arp::default()).serialize().unwrap();
        let raw = RawPdu::new(bytes);
        assert_eq!(Arp::default(), raw.to::<Arp>().unwrap());
        assert_eq!(PduKind::Arp, raw.to_pdu::<Arp>().unwrap().kind());
    }

    #[test]
    fn test_to_truncated() {
        let raw = RawPdu::new(vec![0; 4]);
        assert!(matches!(raw.to::<Arp>(), Err(Error::MalformedPacket(_))));
    }

    #[test]
    fn test_debug() {
        let raw = RawPdu::new(vec![0xca, 0xfe]);
        assert_eq!("RawPdu { payload: \"ca fe\" }", format!("{raw:?}"));
    }
}
