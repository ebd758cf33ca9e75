use crate::frame::icv;
use crate::rc4::rc4;
use pdukit_packet::HwAddress;

/// The size of the `TKIP` header (`IV` and extended `IV`) which precedes the ciphertext.
pub const HEADER_SIZE: usize = 8;

/// The size of the Michael `MIC` which ends the plaintext.
pub const MICHAEL_SIZE: usize = 8;

const ICV_SIZE: usize = 4;
const PHASE1_ROUNDS: u16 = 8;

/// The `TKIP` key mixing substitution box.
///
/// The second half of the two byte table is the first with each entry byte swapped.
const SBOX: [u16; 256] = [
    0xc6a5, 0xf884, 0xee99, 0xf68d, 0xff0d, 0xd6bd, 0xdeb1, 0x9154,
    0x6050, 0x0203, 0xcea9, 0x567d, 0xe719, 0xb562, 0x4de6, 0xec9a,
    0x8f45, 0x1f9d, 0x8940, 0xfa87, 0xef15, 0xb2eb, 0x8ec9, 0xfb0b,
    0x41ec, 0xb367, 0x5ffd, 0x45ea, 0x23bf, 0x53f7, 0xe496, 0x9b5b,
    0x75c2, 0xe11c, 0x3dae, 0x4c6a, 0x6c5a, 0x7e41, 0xf502, 0x834f,
    0x685c, 0x51f4, 0xd134, 0xf908, 0xe293, 0xab73, 0x6253, 0x2a3f,
    0x080c, 0x9552, 0x4665, 0x9d5e, 0x3028, 0x37a1, 0x0a0f, 0x2fb5,
    0x0e09, 0x2436, 0x1b9b, 0xdf3d, 0xcd26, 0x4e69, 0x7fcd, 0xea9f,
    0x121b, 0x1d9e, 0x5874, 0x342e, 0x362d, 0xdcb2, 0xb4ee, 0x5bfb,
    0xa4f6, 0x764d, 0xb761, 0x7dce, 0x527b, 0xdd3e, 0x5e71, 0x1397,
    0xa6f5, 0xb968, 0x0000, 0xc12c, 0x4060, 0xe31f, 0x79c8, 0xb6ed,
    0xd4be, 0x8d46, 0x67d9, 0x724b, 0x94de, 0x98d4, 0xb0e8, 0x854a,
    0xbb6b, 0xc52a, 0x4fe5, 0xed16, 0x86c5, 0x9ad7, 0x6655, 0x1194,
    0x8acf, 0xe910, 0x0406, 0xfe81, 0xa0f0, 0x7844, 0x25ba, 0x4be3,
    0xa2f3, 0x5dfe, 0x80c0, 0x058a, 0x3fad, 0x21bc, 0x7048, 0xf104,
    0x63df, 0x77c1, 0xaf75, 0x4263, 0x2030, 0xe51a, 0xfd0e, 0xbf6d,
    0x814c, 0x1814, 0x2635, 0xc32f, 0xbee1, 0x35a2, 0x88cc, 0x2e39,
    0x9357, 0x55f2, 0xfc82, 0x7a47, 0xc8ac, 0xbae7, 0x322b, 0xe695,
    0xc0a0, 0x1998, 0x9ed1, 0xa37f, 0x4466, 0x547e, 0x3bab, 0x0b83,
    0x8cca, 0xc729, 0x6bd3, 0x283c, 0xa779, 0xbce2, 0x161d, 0xad76,
    0xdb3b, 0x6456, 0x744e, 0x141e, 0x92db, 0x0c0a, 0x486c, 0xb8e4,
    0x9f5d, 0xbd6e, 0x43ef, 0xc4a6, 0x39a8, 0x31a4, 0xd337, 0xf28b,
    0xd532, 0x8b43, 0x6e59, 0xdab7, 0x018c, 0xb164, 0x9cd2, 0x49e0,
    0xd8b4, 0xacfa, 0xf307, 0xcf25, 0xcaaf, 0xf48e, 0x47e9, 0x1018,
    0x6fd5, 0xf088, 0x4a6f, 0x5c72, 0x3824, 0x57f1, 0x73c7, 0x9751,
    0xcb23, 0xa17c, 0xe89c, 0x3e21, 0x96dd, 0x61dc, 0x0d86, 0x0f85,
    0xe090, 0x7c42, 0x71c4, 0xccaa, 0x90d8, 0x0605, 0xf701, 0x1c12,
    0xc2a3, 0x6a5f, 0xaef9, 0x69d0, 0x1791, 0x9958, 0x3a27, 0x27b9,
    0xd938, 0xeb13, 0x2bb3, 0x2233, 0xd2bb, 0xa970, 0x0789, 0x33a7,
    0x2db6, 0x3c22, 0x1592, 0xc920, 0x8749, 0xaaff, 0x5078, 0xa57a,
    0x038f, 0x59f8, 0x0980, 0x1a17, 0x65da, 0xd731, 0x84c6, 0xd0b8,
    0x82c3, 0x29b0, 0x5a77, 0x1e11, 0x7bcb, 0xa8fc, 0x6dd6, 0x2c3a,
];

fn sbox(value: u16) -> u16 {
    SBOX[usize::from(value & 0xff)] ^ SBOX[usize::from(value >> 8)].swap_bytes()
}

/// The little-endian 16 bit word of the temporal key at `offset`.
fn tk_word(tk: &[u8; 16], offset: usize) -> u16 {
    u16::from_le_bytes([tk[offset], tk[offset + 1]])
}

/// Mix the temporal key, transmitter address and high 32 bits of the sequence counter.
fn phase1(tk: &[u8; 16], ta: HwAddress, iv32: u32) -> [u16; 5] {
    let ta = ta.octets();
    let mut ttak = [
        iv32 as u16,
        (iv32 >> 16) as u16,
        u16::from_le_bytes([ta[0], ta[1]]),
        u16::from_le_bytes([ta[2], ta[3]]),
        u16::from_le_bytes([ta[4], ta[5]]),
    ];
    for i in 0..PHASE1_ROUNDS {
        let j = 2 * usize::from(i & 1);
        ttak[0] = ttak[0].wrapping_add(sbox(ttak[4] ^ tk_word(tk, j)));
        ttak[1] = ttak[1].wrapping_add(sbox(ttak[0] ^ tk_word(tk, 4 + j)));
        ttak[2] = ttak[2].wrapping_add(sbox(ttak[1] ^ tk_word(tk, 8 + j)));
        ttak[3] = ttak[3].wrapping_add(sbox(ttak[2] ^ tk_word(tk, 12 + j)));
        ttak[4] = ttak[4]
            .wrapping_add(sbox(ttak[3] ^ tk_word(tk, j)))
            .wrapping_add(i);
    }
    ttak
}

/// Mix the phase 1 output with the low 16 bits of the sequence counter into an `RC4` key.
fn phase2(tk: &[u8; 16], ttak: [u16; 5], iv16: u16) -> [u8; 16] {
    let mut ppk = [
        ttak[0],
        ttak[1],
        ttak[2],
        ttak[3],
        ttak[4],
        ttak[4].wrapping_add(iv16),
    ];
    for i in 0..6 {
        let previous = ppk[(i + 5) % 6];
        ppk[i] = ppk[i].wrapping_add(sbox(previous ^ tk_word(tk, 2 * i)));
    }
    ppk[0] = ppk[0].wrapping_add((ppk[5] ^ tk_word(tk, 12)).rotate_right(1));
    ppk[1] = ppk[1].wrapping_add((ppk[0] ^ tk_word(tk, 14)).rotate_right(1));
    for i in 2..6 {
        ppk[i] = ppk[i].wrapping_add(ppk[i - 1].rotate_right(1));
    }
    let [iv_high, iv_low] = iv16.to_be_bytes();
    let mut key = [0_u8; 16];
    key[0] = iv_high;
    key[1] = (iv_high | 0x20) & 0x7f;
    key[2] = iv_low;
    key[3] = ((ppk[5] ^ tk_word(tk, 0)) >> 1) as u8;
    for (i, word) in ppk.iter().enumerate() {
        key[4 + 2 * i..6 + 2 * i].copy_from_slice(&word.to_le_bytes());
    }
    key
}

/// The per-frame `RC4` key of a `TKIP` payload, from its `TSC` bytes.
fn frame_key(tk: &[u8; 16], ta: HwAddress, payload: &[u8]) -> [u8; 16] {
    let iv16 = u16::from_be_bytes([payload[0], payload[2]]);
    let iv32 = u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);
    phase2(tk, phase1(tk, ta, iv32), iv16)
}

/// Decrypt a `TKIP` protected payload sent by the transmitter `ta`.
///
/// Returns the plaintext without its Michael `MIC`, or `None` if the payload is too short or
/// its integrity check value does not verify.
pub(crate) fn decrypt(tk: &[u8; 16], ta: HwAddress, payload: &[u8]) -> Option<Vec<u8>> {
    if payload.len() <= HEADER_SIZE + MICHAEL_SIZE + ICV_SIZE {
        return None;
    }
    let key = frame_key(tk, ta, payload);
    let plaintext = rc4(&key, &payload[HEADER_SIZE..]);
    let (data, check) = plaintext.split_at(plaintext.len() - ICV_SIZE);
    if icv(data) != check {
        return None;
    }
    Some(data[..data.len() - MICHAEL_SIZE].to_vec())
}

/// Encrypt a payload (already carrying its Michael `MIC`) with the sequence counter `tsc`.
#[cfg(test)]
pub(crate) fn encrypt(
    tk: &[u8; 16],
    ta: HwAddress,
    tsc: u64,
    key_id: u8,
    data: &[u8],
) -> Vec<u8> {
    let tsc = tsc.to_le_bytes();
    let mut payload = vec![
        tsc[1],
        (tsc[1] | 0x20) & 0x7f,
        tsc[0],
        0x20 | (key_id << 6),
        tsc[2],
        tsc[3],
        tsc[4],
        tsc[5],
    ];
    let key = frame_key(tk, ta, &payload);
    let mut plaintext = data.to_vec();
    plaintext.extend_from_slice(&icv(data));
    payload.extend(rc4(&key, &plaintext));
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use test_case::test_case;

    const TK: [u8; 16] = [
        0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
        0x0f,
    ];
    const TA: HwAddress = HwAddress([0x10, 0x22, 0x33, 0x44, 0x55, 0x66]);

    #[test]
    fn test_sbox_tables() {
        assert_eq!(0xc6a5 ^ 0xa5c6, sbox(0x0000));
        assert_eq!(0xc6a5 ^ 0x84f8, sbox(0x0100));
        assert_eq!(0x0000 ^ 0xa5c6, sbox(0x0052));
    }

    #[test]
    fn test_key_prefix_follows_iv16() {
        let key = phase2(&TK, phase1(&TK, TA, 0), 0x1234);
        assert_eq!([0x12, 0x32, 0x34], key[..3]);
    }

    #[test]
    fn test_phase1_known_answer() {
        assert_eq!([0x3dd2, 0x016e, 0x76f4, 0x8697, 0xb2e8], phase1(&TK, TA, 0));
    }

    #[test_case(0x0000, hex!("00 20 00 33 ea 8d 2f 60 ca 6d 13 74 23 4a 66 0b"); "first frame")]
    #[test_case(0x0001, hex!("00 20 01 90 ff dc 31 43 89 a9 d9 d0 74 fd 20 aa"); "second frame")]
    fn test_frame_key_known_answer(iv16: u16, expected: [u8; 16]) {
        let [high, low] = iv16.to_be_bytes();
        let payload = [high, (high | 0x20) & 0x7f, low, 0x20, 0, 0, 0, 0];
        assert_eq!(expected, frame_key(&TK, TA, &payload));
    }

    #[test]
    fn test_decrypt_known_answer() {
        let payload = hex!(
            "00 20 01 20 00 00 00 00"
            "b8 49 b6 ef 64 8c b2 b6 3b 21 99 39 d1 4a 66 18 bd 5c 0e bc df a9 64 0c fa"
            "d2 0a 1f 53"
        );
        assert_eq!(Some(b"tkip known answer".to_vec()), decrypt(&TK, TA, &payload));
        let mut data = b"tkip known answer".to_vec();
        data.extend_from_slice(&[0xee; MICHAEL_SIZE]);
        assert_eq!(payload.to_vec(), encrypt(&TK, TA, 1, 0, &data));
    }

    #[test]
    fn test_frame_key_depends_on_transmitter() {
        let payload = [0_u8; HEADER_SIZE];
        let other = HwAddress([0x10, 0x22, 0x33, 0x44, 0x55, 0x67]);
        assert_ne!(frame_key(&TK, TA, &payload), frame_key(&TK, other, &payload));
    }

    #[test_case(0; "first frame")]
    #[test_case(0x0001_0000; "iv32 rollover")]
    #[test_case(0x1234_5678_9abc; "large counter")]
    fn test_round_trip(tsc: u64) {
        let mut data = b"some data to protect".to_vec();
        data.extend_from_slice(&[0xee; MICHAEL_SIZE]);
        let payload = encrypt(&TK, TA, tsc, 0, &data);
        assert_eq!(HEADER_SIZE + data.len() + ICV_SIZE, payload.len());
        assert_eq!(
            Some(b"some data to protect".to_vec()),
            decrypt(&TK, TA, &payload)
        );
    }

    #[test]
    fn test_corrupted_payload() {
        let data = [0x42; 32];
        let mut payload = encrypt(&TK, TA, 7, 0, &data);
        payload[HEADER_SIZE + 5] ^= 0x80;
        assert_eq!(None, decrypt(&TK, TA, &payload));
    }

    #[test]
    fn test_wrong_transmitter() {
        let data = [0x42; 32];
        let payload = encrypt(&TK, TA, 7, 0, &data);
        assert_eq!(None, decrypt(&TK, HwAddress::BROADCAST, &payload));
    }

    #[test]
    fn test_too_short() {
        assert_eq!(None, decrypt(&TK, TA, &[0; 20]));
    }
}
