// ccm.rs — §4.C CCM* security transform
//
// RF4CE's authenticated encryption, built directly from an AES-128 ECB
// primitive: CBC-MAC over a 13-byte AAD plus the plaintext, then a CTR
// keystream for both the ciphertext and the authentication tag. Parameters
// are fixed for RF4CE and are not configurable: block size 16, MIC length
// M=4, L=2, security level byte 0x05.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;

use crate::address::LongAddress;

pub const MIC_LEN: usize = 4;
const SECURITY_LEVEL: u8 = 0x05;

#[derive(Debug, thiserror::Error)]
#[error("CCM* authentication failed: MIC mismatch")]
pub struct AuthError;

/// CCM* context bound to one key and one (source, destination) node pair.
///
/// A fresh `Ccm` is cheap to construct (one AES key schedule) and is built
/// per-frame by the frame codec, mirroring the original `Rf4ceAES` which is
/// likewise instantiated once per pack/parse call.
pub struct Ccm {
    cipher: Aes128,
    source: [u8; 8],
    destination: [u8; 8],
}

impl Ccm {
    pub fn new(key: &[u8; 16], source: LongAddress, destination: LongAddress) -> Self {
        Self {
            cipher: Aes128::new(GenericArray::from_slice(key)),
            source: source.to_wire_bytes(),
            destination: destination.to_wire_bytes(),
        }
    }

    fn e(&self, block: [u8; 16]) -> [u8; 16] {
        let mut b = GenericArray::clone_from_slice(&block);
        self.cipher.encrypt_block(&mut b);
        b.into()
    }

    fn nonce(&self, frame_counter: u32) -> [u8; 13] {
        let mut n = [0u8; 13];
        n[0..8].copy_from_slice(&self.source);
        n[8..12].copy_from_slice(&frame_counter.to_le_bytes());
        n[12] = SECURITY_LEVEL;
        n
    }

    fn aad(&self, frame_control: u8, frame_counter: u32) -> [u8; 13] {
        let mut a = [0u8; 13];
        a[0] = frame_control;
        a[1..5].copy_from_slice(&frame_counter.to_le_bytes());
        a[5..13].copy_from_slice(&self.destination);
        a
    }

    fn cbc_mac(&self, plaintext: &[u8], frame_control: u8, frame_counter: u32) -> [u8; MIC_LEN] {
        let a = self.aad(frame_control, frame_counter);
        let nonce = self.nonce(frame_counter);

        let mut a_field = Vec::with_capacity(2 + a.len());
        a_field.extend_from_slice(&(a.len() as u16).to_be_bytes());
        a_field.extend_from_slice(&a);

        let mut auth_data = pad128(&a_field);
        auth_data.extend(pad128(plaintext));

        let mut b0 = [0u8; 16];
        b0[0] = 0x49;
        b0[1..14].copy_from_slice(&nonce);
        b0[14..16].copy_from_slice(&(plaintext.len() as u16).to_be_bytes());

        let mut x = self.e(b0);
        for block in auth_data.chunks_exact(16) {
            let mut xored = [0u8; 16];
            for i in 0..16 {
                xored[i] = x[i] ^ block[i];
            }
            x = self.e(xored);
        }

        let mut t = [0u8; MIC_LEN];
        t.copy_from_slice(&x[..MIC_LEN]);
        t
    }

    fn counter_block(&self, nonce: &[u8; 13], i: u16) -> [u8; 16] {
        let mut a = [0u8; 16];
        a[0] = 0x01;
        a[1..14].copy_from_slice(nonce);
        a[14..16].copy_from_slice(&i.to_be_bytes());
        a
    }

    fn ctr_xor(&self, nonce: &[u8; 13], data: &[u8]) -> Vec<u8> {
        let padded = pad128(data);
        let mut out = Vec::with_capacity(padded.len());
        for (i, block) in padded.chunks_exact(16).enumerate() {
            let keystream = self.e(self.counter_block(nonce, (i + 1) as u16));
            for (d, k) in block.iter().zip(keystream.iter()) {
                out.push(d ^ k);
            }
        }
        out.truncate(data.len());
        out
    }

    pub fn encrypt(&self, plaintext: &[u8], frame_control: u8, frame_counter: u32) -> Vec<u8> {
        let nonce = self.nonce(frame_counter);
        let t = self.cbc_mac(plaintext, frame_control, frame_counter);

        let s0 = self.e(self.counter_block(&nonce, 0));
        let u: Vec<u8> = t.iter().zip(&s0[..MIC_LEN]).map(|(a, b)| a ^ b).collect();

        let mut out = self.ctr_xor(&nonce, plaintext);
        out.extend_from_slice(&u);
        out
    }

    pub fn decrypt(&self, data: &[u8], frame_control: u8, frame_counter: u32) -> Result<Vec<u8>, AuthError> {
        if data.len() < MIC_LEN {
            return Err(AuthError);
        }
        let (ciphertext, u) = data.split_at(data.len() - MIC_LEN);

        let nonce = self.nonce(frame_counter);
        let plaintext = self.ctr_xor(&nonce, ciphertext);

        let s0 = self.e(self.counter_block(&nonce, 0));
        let t_recovered: Vec<u8> = u.iter().zip(&s0[..MIC_LEN]).map(|(a, b)| a ^ b).collect();

        let t_computed = self.cbc_mac(&plaintext, frame_control, frame_counter);
        if t_computed[..] != t_recovered[..] {
            return Err(AuthError);
        }
        Ok(plaintext)
    }
}

fn pad128(data: &[u8]) -> Vec<u8> {
    let mut v = data.to_vec();
    let rem = v.len() % 16;
    if rem != 0 {
        v.resize(v.len() + (16 - rem), 0);
    }
    v
}

// EOF
