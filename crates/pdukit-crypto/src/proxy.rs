use pdukit_packet::Pdu;

/// Decrypt frames in place.
#[cfg_attr(test, mockall::automock)]
pub trait Decrypter {
    /// Decrypt a frame, returning true if it was decrypted.
    fn decrypt(&mut self, pdu: &mut Pdu) -> bool;
}

/// Wrap a frame handler so that it only sees frames which were decrypted.
///
/// The proxy is itself a frame handler which returns true to keep a sniff loop going, frames
/// which are not decrypted are skipped.
#[derive(Debug)]
pub struct DecrypterProxy<F, D> {
    handler: F,
    decrypter: D,
}

impl<F, D> DecrypterProxy<F, D>
where
    F: FnMut(Pdu) -> bool,
    D: Decrypter,
{
    pub const fn new(handler: F, decrypter: D) -> Self {
        Self { handler, decrypter }
    }

    pub const fn decrypter(&self) -> &D {
        &self.decrypter
    }

    pub fn decrypter_mut(&mut self) -> &mut D {
        &mut self.decrypter
    }

    /// Decrypt a frame and pass it to the handler.
    ///
    /// Returns the handler's result, or true if the frame was not decrypted.
    pub fn call(&mut self, mut pdu: Pdu) -> bool {
        if self.decrypter.decrypt(&mut pdu) {
            (self.handler)(pdu)
        } else {
            true
        }
    }
}
