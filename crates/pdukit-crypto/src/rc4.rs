/// The `RC4` stream cipher.
///
/// Used by `WEP` and `TKIP`, each frame is processed with a fresh key schedule.
#[derive(Clone)]
pub struct Rc4 {
    state: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4 {
    /// Run the key schedule for `key`.
    ///
    /// # Panics
    ///
    /// If `key` is empty.
    #[must_use]
    pub fn new(key: &[u8]) -> Self {
        let mut state: [u8; 256] = core::array::from_fn(|i| i as u8);
        let mut j = 0_u8;
        for i in 0..256 {
            j = j
                .wrapping_add(state[i])
                .wrapping_add(key[i % key.len()]);
            state.swap(i, usize::from(j));
        }
        Self { state, i: 0, j: 0 }
    }

    /// XOR the keystream into `data`.
    pub fn apply_keystream(&mut self, data: &mut [u8]) {
        for byte in data {
            self.i = self.i.wrapping_add(1);
            self.j = self.j.wrapping_add(self.state[usize::from(self.i)]);
            let (i, j) = (usize::from(self.i), usize::from(self.j));
            self.state.swap(i, j);
            *byte ^= self.state[usize::from(self.state[i].wrapping_add(self.state[j]))];
        }
    }
}

impl std::fmt::Debug for Rc4 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rc4").finish_non_exhaustive()
    }
}

/// Encrypt or decrypt `data` with a fresh `RC4` keystream.
#[must_use]
pub fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut output = data.to_vec();
    Rc4::new(key).apply_keystream(&mut output);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use test_case::test_case;

    #[test_case(b"Key", b"Plaintext", &hex!("bb f3 16 e8 d9 40 af 0a d3"))]
    #[test_case(b"Wiki", b"pedia", &hex!("10 21 bf 04 20"))]
    #[test_case(b"Secret", b"Attack at dawn", &hex!("45 a0 1f 64 5f c3 5b 38 35 52 54 4b 9b f5"))]
    fn test_known_answer(key: &[u8], plaintext: &[u8], expected: &[u8]) {
        assert_eq!(expected, rc4(key, plaintext));
        assert_eq!(plaintext, rc4(key, expected));
    }

    #[test]
    fn test_keystream_continues_across_calls() {
        let mut cipher = Rc4::new(b"Key");
        let mut first = *b"Plain";
        let mut second = *b"text";
        cipher.apply_keystream(&mut first);
        cipher.apply_keystream(&mut second);
        assert_eq!(hex!("bb f3 16 e8 d9"), first);
        assert_eq!(hex!("40 af 0a d3"), second);
    }
}
