// keyrecovery.rs — §4.G Key-recovery observer
//
// Watches a stream of decoded 802.15.4 frames during a pairing exchange and,
// on success, reconstructs the 128-bit link key from 37 key-seed command
// frames. Implements `pump::Processor` so it can be handed straight to a
// `PacketPump`.

use crate::address::{LongAddress, Node};
use crate::linkconfig::LinkConfig;
use crate::mac::{self, Addr, FrameType as MacFrameType};
use crate::pump::Processor;
use crate::rf4ce::{self, FrameType as Rf4ceFrameType};

const SEED_COUNT: usize = 37;
const SEED_WORD_LEN: usize = 80;
const COMMAND_PAIRING_RESPONSE: u8 = rf4ce::COMMAND_PAIRING_RESPONSE;
const COMMAND_KEY_SEED: u8 = rf4ce::COMMAND_KEY_SEED;

#[derive(Debug, thiserror::Error)]
pub enum KeyRecoveryError {
    #[error("unexpected frame while waiting for seed {expected}")]
    UnexpectedFrame { expected: u8 },
    #[error("malformed MAC frame: {0}")]
    Mac(#[from] mac::MacError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    WaitPair,
    Collect(u8),
    Done,
    Aborted,
}

pub struct KeyRecoveryObserver {
    state: State,
    seeds: Vec<Option<[u8; SEED_WORD_LEN]>>,
    link_config: LinkConfig,
}

impl KeyRecoveryObserver {
    pub fn new() -> Self {
        Self {
            state: State::WaitPair,
            seeds: vec![None; SEED_COUNT],
            link_config: LinkConfig::empty(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn link_config(&self) -> &LinkConfig {
        &self.link_config
    }

    /// Consumes one inbound MAC frame. ACKs are ignored. Malformed frames
    /// (bad FCS) are logged and otherwise not fatal to the state machine.
    pub fn observe(&mut self, data: &[u8]) {
        if self.state == State::Done || self.state == State::Aborted {
            return;
        }

        let frame = match mac::parse(data) {
            Ok(f) => f,
            Err(e) => {
                log::warn!("key recovery: {e}");
                return;
            }
        };
        if frame.frame_type == MacFrameType::Ack {
            return;
        }

        let (source, destination) = match (frame.src_addr, frame.dest_addr) {
            (Some(src), Some(dst)) => (addr_to_node(src), addr_to_node(dst)),
            _ => return,
        };

        let rf4ce_frame = match rf4ce::Rf4ceFrame::parse(&frame.payload, source, destination, None) {
            Ok(f) => f,
            Err(e) => {
                log::warn!("key recovery: cannot parse RF4CE frame: {e}");
                return;
            }
        };

        match self.state {
            State::WaitPair => self.on_wait_pair(&frame, &rf4ce_frame),
            State::Collect(k) => self.on_collect(k, &rf4ce_frame),
            State::Done | State::Aborted => {}
        }
    }

    fn on_wait_pair(&mut self, mac_frame: &mac::MacFrame, frame: &rf4ce::Rf4ceFrame) {
        if frame.frame_type != Rf4ceFrameType::Command || frame.command != Some(COMMAND_PAIRING_RESPONSE) {
            return;
        }
        let Some((allocated_short_source, short_destination)) = rf4ce::parse_pairing_response(&frame.payload) else {
            return;
        };
        log::info!("key recovery: pairing response observed, starting seed capture");

        self.link_config.dest_panid = mac_frame.src_panid.unwrap_or(0);
        self.link_config.source = Node::new(frame.destination.long, Some(allocated_short_source)).unwrap_or(frame.destination);
        self.link_config.destination = Node::new(frame.source.long, Some(short_destination)).unwrap_or(frame.source);
        self.state = State::Collect(0);
    }

    fn on_collect(&mut self, k: u8, frame: &rf4ce::Rf4ceFrame) {
        if frame.frame_type != Rf4ceFrameType::Command || frame.command != Some(COMMAND_KEY_SEED) {
            log::warn!("key recovery: unexpected frame while waiting for seed {k}, aborting");
            self.state = State::Aborted;
            return;
        }

        let Some((index, seed)) = rf4ce::parse_key_seed(&frame.payload) else {
            log::warn!("key recovery: malformed key seed payload, aborting");
            self.state = State::Aborted;
            return;
        };

        let mut expected = k;
        if index == expected.wrapping_sub(1) && expected > 0 {
            log::info!("key recovery: seed {index} retransmitted");
            expected -= 1;
        }

        if index != expected {
            log::warn!("key recovery: missed seed {expected}, aborting");
            self.state = State::Aborted;
            return;
        }

        let mut word = [0u8; SEED_WORD_LEN];
        word.copy_from_slice(seed);
        self.seeds[expected as usize] = Some(word);
        log::info!("key recovery: received seed {expected}");

        if expected as usize == SEED_COUNT - 1 {
            let key = derive_key(&self.seeds);
            self.link_config.key = Some(key);
            self.link_config.frame_counter = frame.frame_counter;
            self.state = State::Done;
            log::info!("key recovery: all seeds received, key recovered");
        } else {
            self.state = State::Collect(expected + 1);
        }
    }
}

impl Default for KeyRecoveryObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for KeyRecoveryObserver {
    fn process(&mut self, data: Vec<u8>) {
        self.observe(&data);
    }
}

fn addr_to_node(addr: Addr) -> Node {
    match addr {
        Addr::Short(s) => Node::from_short(s),
        Addr::Long(l) => Node::from_long(LongAddress(l)),
    }
}

/// Combines 37 80-byte seed words by XOR, then XORs together the five
/// resulting 16-byte chunks. Commutative in the seeds' arrival order; the
/// state machine enforces ordered delivery, not the derivation itself.
fn derive_key(seeds: &[Option<[u8; SEED_WORD_LEN]>]) -> [u8; 16] {
    let mut seed_xor = [0u8; SEED_WORD_LEN];
    for seed in seeds.iter() {
        let word = seed.expect("key derivation requires all 37 seeds");
        for (acc, b) in seed_xor.iter_mut().zip(word.iter()) {
            *acc ^= b;
        }
    }

    let mut key = [0u8; 16];
    for chunk in seed_xor.chunks_exact(16) {
        for (acc, b) in key.iter_mut().zip(chunk.iter()) {
            *acc ^= b;
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ccm::Ccm;
    use crate::mac::build_envelope;
    use crate::rf4ce::{FrameType, Rf4ceFrame};

    fn pairing_response_mac(src_panid: u16, src_short: u16, dest_short: u16, allocated_short_source: u16, short_destination: u16) -> Vec<u8> {
        let mut frame = Rf4ceFrame::new(Node::from_short(src_short), Node::from_short(dest_short), FrameType::Command);
        frame.command = Some(COMMAND_PAIRING_RESPONSE);
        let mut payload = vec![0u8];
        payload.extend_from_slice(&allocated_short_source.to_le_bytes());
        payload.extend_from_slice(&short_destination.to_le_bytes());
        frame.payload = payload;
        let packed = frame.pack().unwrap();
        build_envelope(1, src_panid, src_short, dest_short, &packed)
    }

    fn key_seed_mac(src_short: u16, dest_short: u16, index: u8, word: &[u8; SEED_WORD_LEN], counter: u32) -> Vec<u8> {
        let mut frame = Rf4ceFrame::new(Node::from_short(src_short), Node::from_short(dest_short), FrameType::Command);
        frame.command = Some(COMMAND_KEY_SEED);
        frame.frame_counter = counter;
        let mut payload = vec![index];
        payload.extend_from_slice(word);
        frame.payload = payload;
        let packed = frame.pack().unwrap();
        build_envelope(2 + index, 0x1234, src_short, dest_short, &packed)
    }

    #[test]
    fn full_pairing_capture_derives_expected_key() {
        let mut observer = KeyRecoveryObserver::new();
        observer.observe(&pairing_response_mac(0x1234, 0xAAAA, 0xBBBB, 0x1111, 0x2222));
        assert_eq!(observer.state(), State::Collect(0));

        for i in 0..37u8 {
            let word = [0u8; SEED_WORD_LEN];
            observer.observe(&key_seed_mac(0xAAAA, 0xBBBB, i, &word, 100 + i as u32));
        }

        assert_eq!(observer.state(), State::Done);
        assert_eq!(observer.link_config().key, Some([0u8; 16]));
        assert_eq!(observer.link_config().frame_counter, 136);
    }

    #[test]
    fn key_derivation_matches_spec_vector_with_one_nonzero_seed() {
        let mut seeds: Vec<Option<[u8; SEED_WORD_LEN]>> = vec![Some([0u8; SEED_WORD_LEN]); SEED_COUNT];
        seeds[0] = Some([0xFFu8; SEED_WORD_LEN]);
        assert_eq!(derive_key(&seeds), [0u8; 16]);
    }

    #[test]
    fn retransmitted_seed_resets_expected_index() {
        let mut observer = KeyRecoveryObserver::new();
        observer.observe(&pairing_response_mac(0x1234, 0xAAAA, 0xBBBB, 0x1111, 0x2222));

        observer.observe(&key_seed_mac(0xAAAA, 0xBBBB, 0, &[0u8; SEED_WORD_LEN], 1));
        assert_eq!(observer.state(), State::Collect(1));

        observer.observe(&key_seed_mac(0xAAAA, 0xBBBB, 0, &[0xAAu8; SEED_WORD_LEN], 2));
        assert_eq!(observer.state(), State::Collect(1));
    }

    #[test]
    fn wrong_seed_index_aborts() {
        let mut observer = KeyRecoveryObserver::new();
        observer.observe(&pairing_response_mac(0x1234, 0xAAAA, 0xBBBB, 0x1111, 0x2222));
        observer.observe(&key_seed_mac(0xAAAA, 0xBBBB, 5, &[0u8; SEED_WORD_LEN], 1));
        assert_eq!(observer.state(), State::Aborted);
    }

    #[test]
    fn wrong_command_while_collecting_aborts() {
        let mut observer = KeyRecoveryObserver::new();
        observer.observe(&pairing_response_mac(0x1234, 0xAAAA, 0xBBBB, 0x1111, 0x2222));

        let mut frame = Rf4ceFrame::new(Node::from_short(0xAAAA), Node::from_short(0xBBBB), FrameType::Data);
        frame.profile_identifier = Some(0x01);
        frame.payload = b"not a seed".to_vec();
        let packed = frame.pack().unwrap();
        let envelope = build_envelope(9, 0x1234, 0xAAAA, 0xBBBB, &packed);

        observer.observe(&envelope);
        assert_eq!(observer.state(), State::Aborted);
    }

    #[test]
    fn ciphered_frames_are_ignored_before_key_is_known() {
        // During capture no key is known yet; a ciphered frame must not panic
        // the observer even though it cannot be decoded.
        let key = [0x11u8; 16];
        let ccm = Ccm::new(
            &key,
            crate::address::LongAddress::from_colon_hex("01:02:03:04:05:06:07:08").unwrap(),
            crate::address::LongAddress::from_colon_hex("11:12:13:14:15:16:17:18").unwrap(),
        );
        let _ = ccm.encrypt(b"irrelevant", 0x2D, 1);

        let mut observer = KeyRecoveryObserver::new();
        let mut frame = Rf4ceFrame::new(Node::from_short(0xAAAA), Node::from_short(0xBBBB), FrameType::Command);
        frame.frame_ciphered = true;
        frame.key = Some(key);
        frame.command = Some(COMMAND_KEY_SEED);
        frame.payload = vec![0u8; 80];
        let packed = frame.pack().unwrap();
        let envelope = build_envelope(1, 0x1234, 0xAAAA, 0xBBBB, &packed);

        observer.observe(&envelope);
        assert_eq!(observer.state(), State::WaitPair);
    }
}
// EOF
