use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use pdukit_packet::dot11::{Dot11, FrameFlags, HasAddressFields};

/// The size of the `CCMP` header which precedes the ciphertext.
pub const HEADER_SIZE: usize = 8;

/// The size of the `CCMP` `MIC` which follows the ciphertext.
pub const MIC_SIZE: usize = 8;

const BLOCK_SIZE: usize = 16;
const NONCE_SIZE: usize = 13;

/// `CBC-MAC` flags: additional data present, 8 byte `MIC`, 2 byte length field.
const MAC_FLAGS: u8 = 0x59;

/// Counter flags: 2 byte counter field.
const CTR_FLAGS: u8 = 0x01;

/// Decrypt a `CCMP` protected payload.
///
/// Returns `None` if the payload is too short or its `MIC` does not verify.
pub(crate) fn decrypt(tk: &[u8; 16], dot11: &Dot11, payload: &[u8]) -> Option<Vec<u8>> {
    if payload.len() < HEADER_SIZE + MIC_SIZE {
        return None;
    }
    let pn = [
        payload[7], payload[6], payload[5], payload[4], payload[1], payload[0],
    ];
    let ccm = Ccm::new(tk, dot11, pn)?;
    let (ciphertext, mic) =
        payload[HEADER_SIZE..].split_at(payload.len() - HEADER_SIZE - MIC_SIZE);
    let mut plaintext = ciphertext.to_vec();
    ccm.apply_counter_mode(&mut plaintext);
    let s0 = ccm.keystream_block(0);
    let expected = ccm.cbc_mac(&plaintext);
    let verified = mic
        .iter()
        .zip(s0)
        .map(|(mic, s)| mic ^ s)
        .eq(expected);
    verified.then_some(plaintext)
}

/// Encrypt a payload, producing the `CCMP` header, ciphertext and `MIC`.
#[cfg(test)]
pub(crate) fn encrypt(
    tk: &[u8; 16],
    dot11: &Dot11,
    pn: u64,
    key_id: u8,
    plaintext: &[u8],
) -> Vec<u8> {
    let pn_bytes = pn.to_le_bytes();
    let header = [
        pn_bytes[0],
        pn_bytes[1],
        0,
        0x20 | (key_id << 6),
        pn_bytes[2],
        pn_bytes[3],
        pn_bytes[4],
        pn_bytes[5],
    ];
    let ccm = Ccm::new(
        tk,
        dot11,
        [pn_bytes[5], pn_bytes[4], pn_bytes[3], pn_bytes[2], pn_bytes[1], pn_bytes[0]],
    )
    .unwrap();
    let mic = ccm.cbc_mac(plaintext);
    let mut ciphertext = plaintext.to_vec();
    ccm.apply_counter_mode(&mut ciphertext);
    let s0 = ccm.keystream_block(0);
    let mut output = header.to_vec();
    output.extend_from_slice(&ciphertext);
    output.extend(mic.iter().zip(s0).map(|(mic, s)| mic ^ s));
    output
}

/// The `AES-CCM` state for one frame.
struct Ccm {
    cipher: Aes128,
    nonce: [u8; NONCE_SIZE],
    aad: Vec<u8>,
}

impl Ccm {
    fn new(tk: &[u8; 16], dot11: &Dot11, pn: [u8; 6]) -> Option<Self> {
        let data = dot11.data()?;
        let addr2 = dot11.addr2()?;
        let addr3 = dot11.addr3()?;
        let priority = if data.is_qos() { data.tid() } else { 0 };
        let mut nonce = [0_u8; NONCE_SIZE];
        nonce[0] = priority;
        nonce[1..7].copy_from_slice(&addr2.octets());
        nonce[7..13].copy_from_slice(&pn);

        // retry, power management and more data are masked, the order bit only in QoS frames
        let mut mask = FrameFlags::TO_DS | FrameFlags::FROM_DS | FrameFlags::MORE_FRAG;
        if !data.is_qos() {
            mask |= FrameFlags::ORDER;
        }
        let flags = (dot11.flags & mask) | FrameFlags::PROTECTED;
        let frame_control =
            (dot11.protocol & 0x03) | (dot11.frame_type() << 2) | ((data.subtype << 4) & 0x80);
        let mut aad = Vec::with_capacity(30);
        aad.extend_from_slice(&[frame_control, flags.bits()]);
        aad.extend_from_slice(&dot11.addr1.octets());
        aad.extend_from_slice(&addr2.octets());
        aad.extend_from_slice(&addr3.octets());
        aad.extend_from_slice(&[data.header.frag_num & 0x0f, 0]);
        if let Some(addr4) = dot11.addr4() {
            aad.extend_from_slice(&addr4.octets());
        }
        if data.is_qos() {
            aad.extend_from_slice(&[priority, 0]);
        }
        Some(Self {
            cipher: Aes128::new(GenericArray::from_slice(tk)),
            nonce,
            aad,
        })
    }

    fn encrypt_block(&self, mut block: [u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
        let array = GenericArray::from_mut_slice(&mut block);
        self.cipher.encrypt_block(array);
        block
    }

    fn keystream_block(&self, counter: u16) -> [u8; BLOCK_SIZE] {
        let mut block = [0_u8; BLOCK_SIZE];
        block[0] = CTR_FLAGS;
        block[1..14].copy_from_slice(&self.nonce);
        block[14..].copy_from_slice(&counter.to_be_bytes());
        self.encrypt_block(block)
    }

    fn apply_counter_mode(&self, data: &mut [u8]) {
        for (i, chunk) in data.chunks_mut(BLOCK_SIZE).enumerate() {
            let keystream = self.keystream_block(i as u16 + 1);
            for (byte, key) in chunk.iter_mut().zip(keystream) {
                *byte ^= key;
            }
        }
    }

    fn cbc_mac(&self, plaintext: &[u8]) -> [u8; MIC_SIZE] {
        let mut b0 = [0_u8; BLOCK_SIZE];
        b0[0] = MAC_FLAGS;
        b0[1..14].copy_from_slice(&self.nonce);
        b0[14..].copy_from_slice(&(plaintext.len() as u16).to_be_bytes());
        let mut mac = self.encrypt_block(b0);
        let mut header = (self.aad.len() as u16).to_be_bytes().to_vec();
        header.extend_from_slice(&self.aad);
        for chunk in header.chunks(BLOCK_SIZE).chain(plaintext.chunks(BLOCK_SIZE)) {
            for (byte, value) in mac.iter_mut().zip(chunk) {
                *byte ^= value;
            }
            mac = self.encrypt_block(mac);
        }
        core::array::from_fn(|i| mac[i])
    }
}
