use crate::error::{Error, Result};

/// The bytes behind a fixed header view, either borrowed for reading or for writing.
///
/// Multi-byte fields are stored big-endian.
#[derive(Debug)]
pub enum Buffer<'a> {
    Immutable(&'a [u8]),
    Mutable(&'a mut [u8]),
}

impl<'a> Buffer<'a> {
    /// Borrow `packet` for writing, provided it holds at least `min` bytes.
    pub fn mutable(name: &str, packet: &'a mut [u8], min: usize) -> Result<Self> {
        check_len(name, packet.len(), min)?;
        Ok(Self::Mutable(packet))
    }

    /// Borrow `packet` for reading, provided it holds at least `min` bytes.
    pub fn view(name: &str, packet: &'a [u8], min: usize) -> Result<Self> {
        check_len(name, packet.len(), min)?;
        Ok(Self::Immutable(packet))
    }
}

fn check_len(name: &str, len: usize, min: usize) -> Result<()> {
    if len < min {
        return Err(Error::InsufficientPacketBuffer(name.to_owned(), min, len));
    }
    Ok(())
}

impl Buffer<'_> {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Self::Immutable(bytes) => bytes,
            Self::Mutable(bytes) => bytes,
        }
    }

    /// # Panics
    ///
    /// If the buffer was borrowed for reading only.
    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        match self {
            Self::Mutable(bytes) => bytes,
            Self::Immutable(_) => panic!("write operation called on readonly buffer"),
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn read(&self, offset: usize) -> u8 {
        self.as_slice()[offset]
    }

    pub fn write(&mut self, offset: usize) -> &mut u8 {
        &mut self.as_slice_mut()[offset]
    }

    /// Copy `N` bytes starting at `offset`.
    pub fn get_bytes<const N: usize>(&self, offset: usize) -> [u8; N] {
        core::array::from_fn(|i| self.read(offset + i))
    }

    /// Overwrite `N` bytes starting at `offset`.
    pub fn set_bytes<const N: usize>(&mut self, offset: usize, bytes: [u8; N]) {
        self.as_slice_mut()[offset..offset + N].copy_from_slice(&bytes);
    }

    pub fn read_u16(&self, offset: usize) -> u16 {
        u16::from_be_bytes(self.get_bytes(offset))
    }

    pub fn write_u16(&mut self, offset: usize, val: u16) {
        self.set_bytes(offset, val.to_be_bytes());
    }

    pub fn read_u32(&self, offset: usize) -> u32 {
        u32::from_be_bytes(self.get_bytes(offset))
    }

    pub fn write_u32(&mut self, offset: usize, val: u32) {
        self.set_bytes(offset, val.to_be_bytes());
    }

    /// Replace the bits selected by `mask` in the byte at `offset`, leaving the others untouched.
    pub fn write_masked(&mut self, offset: usize, mask: u8, val: u8) {
        let byte = self.write(offset);
        *byte = (*byte & !mask) | (val & mask);
    }
}
