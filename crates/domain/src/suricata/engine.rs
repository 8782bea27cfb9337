use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::common::entity::Verdict;
use crate::decode::entity::{LayeredPacket, TransportLayer};

use super::entity::{SigProtocol, SignatureRule};
use super::error::SignatureError;
use super::parser;

/// Ordered collection of Suricata-compatible signatures. File order is
/// preserved and is the first-match tie-break. There is no single-rule
/// mutation: operators update by reloading the whole store.
#[derive(Debug, Default)]
pub struct SignatureStore {
    rules: Vec<SignatureRule>,
}

impl SignatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[SignatureRule] {
        &self.rules
    }

    /// Load a signature file, replacing the current contents. All-or-nothing:
    /// any I/O or syntax failure leaves the store unchanged.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<usize, SignatureError> {
        let text = fs::read_to_string(path)?;
        self.load_str(&text)
    }

    /// Same contract as `load`, from rule text already in memory.
    pub fn load_str(&mut self, text: &str) -> Result<usize, SignatureError> {
        let rules = parser::parse_rules(text)?;
        self.rules = rules;
        debug!(count = self.rules.len(), "suricata rules loaded");
        Ok(self.rules.len())
    }

    /// Human-readable listing in file order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for rule in &self.rules {
            let _ = writeln!(
                out,
                "[{}] action = {}, proto = {}, msg = {}",
                rule.sid,
                rule.action,
                rule.protocol.as_str(),
                rule.msg
            );
        }
        out
    }

    /// Evaluate the packet against signatures in file order and return the
    /// first hit. Signatures need transport-layer facts, so only `L4`/`L5`
    /// packets can match; the payload evaluated is the transport payload.
    pub fn detect(&self, packet: &LayeredPacket<'_>) -> Option<Verdict> {
        let (src, dst, transport) = match packet {
            LayeredPacket::L4(l4) => (
                (l4.src_ip(), l4.src_port()),
                (l4.dst_ip(), l4.dst_port()),
                &l4.transport,
            ),
            LayeredPacket::L5(l5) => (
                (l5.src_ip(), l5.src_port()),
                (l5.dst_ip(), l5.dst_port()),
                &l5.transport,
            ),
            _ => return None,
        };

        let (protocol, payload) = match transport {
            TransportLayer::Tcp(tcp) => (SigProtocol::Tcp, tcp.payload),
            TransportLayer::Udp(udp) => (SigProtocol::Udp, udp.payload),
        };

        for rule in &self.rules {
            if rule.protocol != protocol {
                continue;
            }
            if rule.matches_header(src, dst) && rule.matches_payload(payload) {
                debug!(sid = rule.sid, action = %rule.action, "suricata rule hit");
                return Some(Verdict {
                    rule_id: rule.sid,
                    action: rule.action,
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::entity::RuleAction;
    use crate::decode::entity::DecodeOptions;

    // ── packet builders ──────────────────────────────────────────

    fn tcp_frame(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(&[0x00, 0x1b, 0x44, 0x11, 0x3a, 0xb7]);
        frame.extend_from_slice(&[0x00, 0x1b, 0x44, 0x11, 0x3a, 0xb8]);
        frame.extend_from_slice(&0x0800u16.to_be_bytes());
        let total = (20 + 20 + payload.len()) as u16;
        frame.extend_from_slice(&[0x45, 0x00]);
        frame.extend_from_slice(&total.to_be_bytes());
        frame.extend_from_slice(&[0xcd, 0x4b, 0x40, 0x00, 0x40, 0x06, 0x00, 0x00]);
        frame.extend_from_slice(&[10, 1, 2, 3]);
        frame.extend_from_slice(&[10, 9, 8, 7]);
        frame.extend_from_slice(&src_port.to_be_bytes());
        frame.extend_from_slice(&dst_port.to_be_bytes());
        frame.extend_from_slice(&[0; 8]);
        frame.extend_from_slice(&[0x50, 0x18, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00]);
        frame.extend_from_slice(payload);
        frame
    }

    fn udp_frame(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(&[0x00, 0x1b, 0x44, 0x11, 0x3a, 0xb7]);
        frame.extend_from_slice(&[0x00, 0x1b, 0x44, 0x11, 0x3a, 0xb8]);
        frame.extend_from_slice(&0x0800u16.to_be_bytes());
        let total = (20 + 8 + payload.len()) as u16;
        frame.extend_from_slice(&[0x45, 0x00]);
        frame.extend_from_slice(&total.to_be_bytes());
        frame.extend_from_slice(&[0xcd, 0x4b, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00]);
        frame.extend_from_slice(&[10, 1, 2, 3]);
        frame.extend_from_slice(&[10, 9, 8, 7]);
        frame.extend_from_slice(&src_port.to_be_bytes());
        frame.extend_from_slice(&dst_port.to_be_bytes());
        frame.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x00]);
        frame.extend_from_slice(payload);
        frame
    }

    fn store(rules: &str) -> SignatureStore {
        let mut store = SignatureStore::new();
        store.load_str(rules).unwrap();
        store
    }

    // ── lifecycle ────────────────────────────────────────────────

    #[test]
    fn new_store_is_empty() {
        let store = SignatureStore::new();
        assert!(store.is_empty());
        assert_eq!(store.render(), "");
    }

    #[test]
    fn load_replaces_contents() {
        let mut store = store("alert tcp any any -> any 22 (sid:1;)\n");
        store
            .load_str("alert tcp any any -> any 23 (sid:2;)\n")
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.rules()[0].sid, 2);
    }

    #[test]
    fn load_bad_file_keeps_prior_state() {
        let mut store = store("alert tcp any any -> any 22 (sid:1;)\n");
        let before = store.render();
        assert!(store.load_str("alert tcp broken\n").is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(store.render(), before);
    }

    #[test]
    fn load_missing_file_fails() {
        let mut store = SignatureStore::new();
        assert!(store.load("/nonexistent/suricata.rules").is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn render_shows_sid_and_action() {
        let store = store(r#"drop tcp any any -> any 502 (msg:"no modbus"; sid:31;)"#);
        assert!(store.render().contains("[31] action = drop, proto = tcp"));
    }

    // ── detection ────────────────────────────────────────────────

    #[test]
    fn detect_matches_content_on_tcp_payload() {
        let store = store(r#"alert tcp any any -> any 8080 (content:"attack"; sid:11;)"#);
        let frame = tcp_frame(40000, 8080, b"an attack payload");
        let packet = LayeredPacket::decode(&frame, &DecodeOptions::default());
        assert_eq!(packet.level(), 4);

        let verdict = store.detect(&packet).unwrap();
        assert_eq!(verdict.rule_id, 11);
        assert_eq!(verdict.action, RuleAction::Alert);
    }

    #[test]
    fn detect_misses_on_absent_content() {
        let store = store(r#"alert tcp any any -> any 8080 (content:"attack"; sid:11;)"#);
        let frame = tcp_frame(40000, 8080, b"ordinary traffic");
        let packet = LayeredPacket::decode(&frame, &DecodeOptions::default());
        assert!(store.detect(&packet).is_none());
    }

    #[test]
    fn detect_respects_protocol_split() {
        let store = store(r#"alert tcp any any -> any 53 (sid:5;)"#);
        let frame = udp_frame(40000, 53, b"query");
        let packet = LayeredPacket::decode(&frame, &DecodeOptions::default());
        assert!(store.detect(&packet).is_none());
    }

    #[test]
    fn detect_first_match_in_file_order() {
        let rules = "\
alert tcp any any -> any 8080 (sid:20;)
drop tcp any any -> any 8080 (sid:10;)
";
        let store = store(rules);
        let frame = tcp_frame(40000, 8080, b"x");
        let packet = LayeredPacket::decode(&frame, &DecodeOptions::default());
        // sid 20 appears first in the file, so it wins despite the lower
        // sid later in the file.
        for _ in 0..3 {
            assert_eq!(store.detect(&packet).unwrap().rule_id, 20);
        }
    }

    #[test]
    fn detect_matches_l5_packets_on_transport_payload() {
        // Modbus request bytes: dissected to L5, but signatures still see
        // the raw transport payload.
        let modbus = [
            0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x05, 0x00, 0x01, 0xff, 0x00,
        ];
        let store = store(r#"alert tcp any any -> any 502 (content:"|ff 00|"; sid:42;)"#);
        let frame = tcp_frame(40000, 502, &modbus);
        let packet = LayeredPacket::decode(&frame, &DecodeOptions::default());
        assert_eq!(packet.level(), 5);
        assert_eq!(store.detect(&packet).unwrap().rule_id, 42);
    }

    #[test]
    fn detect_requires_transport_layer() {
        let store = store(r#"alert tcp any any -> any any (sid:1;)"#);
        // Truncated to ethernet + ipv4 only.
        let frame = tcp_frame(40000, 8080, b"");
        let packet = LayeredPacket::decode(&frame[..34], &DecodeOptions::default());
        assert!(packet.level() <= 3);
        assert!(store.detect(&packet).is_none());
    }

    #[test]
    fn detect_honors_dsize() {
        let store = store(r#"alert udp any any -> any 9999 (dsize:>10; sid:3;)"#);
        let short = udp_frame(1, 9999, b"short");
        let long = udp_frame(1, 9999, b"a much longer payload");
        let opts = DecodeOptions::default();
        assert!(store.detect(&LayeredPacket::decode(&short, &opts)).is_none());
        assert!(store.detect(&LayeredPacket::decode(&long, &opts)).is_some());
    }

    #[test]
    fn detect_honors_direction_bi() {
        let store = store(r#"alert tcp any 502 <> any any (sid:6;)"#);
        // Packet toward 502: source ports don't match as written, but the
        // rule is bidirectional.
        let frame = tcp_frame(40000, 502, b"x");
        let packet = LayeredPacket::decode(&frame, &DecodeOptions::default());
        assert!(store.detect(&packet).is_some());
    }

    #[test]
    fn detect_honors_negated_source_network() {
        let store = store(r#"alert tcp !10.0.0.0/8 any -> any 8080 (sid:8;)"#);
        // Source 10.1.2.3 is inside the negated block.
        let frame = tcp_frame(40000, 8080, b"x");
        let packet = LayeredPacket::decode(&frame, &DecodeOptions::default());
        assert!(store.detect(&packet).is_none());
    }

    #[test]
    fn detect_pcre_on_payload() {
        let store = store(r#"alert tcp any any -> any 8080 (pcre:"/user=\w+/i"; sid:9;)"#);
        let hit = tcp_frame(40000, 8080, b"GET /?USER=root");
        let miss = tcp_frame(40000, 8080, b"GET /?user=");
        let opts = DecodeOptions::default();
        assert!(store.detect(&LayeredPacket::decode(&hit, &opts)).is_some());
        assert!(store.detect(&LayeredPacket::decode(&miss, &opts)).is_none());
    }
}
