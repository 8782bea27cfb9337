use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::common::entity::{IcsFamily, ProtocolId};

use super::dnp3::Dnp3Header;
use super::error::DecodeError;
use super::iec104::Iec104Header;
use super::modbus::{ModbusReqHeader, ModbusRspHeader};
use super::parser;

// ── Field types ──────────────────────────────────────────────────

/// An IEEE 802 hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddr(pub [u8; 6]);

impl std::fmt::Display for MacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

// ── Per-layer headers ────────────────────────────────────────────

/// Ethernet II header. `ethertype` is the payload type after any 802.1Q
/// tags have been consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dst_mac: MacAddr,
    pub src_mac: MacAddr,
    pub ethertype: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    pub header_len: u8,
    pub dscp: u8,
    pub total_length: u16,
    pub id: u16,
    pub flags: u8,
    pub fragment_offset: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Header {
    pub traffic_class: u8,
    pub flow_label: u32,
    pub payload_length: u16,
    pub next_header: u8,
    pub hop_limit: u8,
    pub src_ip: Ipv6Addr,
    pub dst_ip: Ipv6Addr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpHeader<'a> {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack: u32,
    pub header_len: u8,
    pub flags: u8,
    pub window: u16,
    pub checksum: u16,
    pub urgent: u16,
    pub payload: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader<'a> {
    pub src_port: u16,
    pub dst_port: u16,
    pub length: u16,
    pub checksum: u16,
    pub payload: &'a [u8],
}

// ── Layer sums ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayer {
    Ethernet(EthernetHeader),
}

impl LinkLayer {
    pub fn src_mac(&self) -> MacAddr {
        match self {
            Self::Ethernet(eth) => eth.src_mac,
        }
    }

    pub fn dst_mac(&self) -> MacAddr {
        match self {
            Self::Ethernet(eth) => eth.dst_mac,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkLayer {
    Ipv4(Ipv4Header),
    Ipv6(Ipv6Header),
}

impl NetworkLayer {
    pub fn src_ip(&self) -> IpAddr {
        match self {
            Self::Ipv4(v4) => IpAddr::V4(v4.src_ip),
            Self::Ipv6(v6) => IpAddr::V6(v6.src_ip),
        }
    }

    pub fn dst_ip(&self) -> IpAddr {
        match self {
            Self::Ipv4(v4) => IpAddr::V4(v4.dst_ip),
            Self::Ipv6(v6) => IpAddr::V6(v6.dst_ip),
        }
    }

    pub fn protocol_id(&self) -> ProtocolId {
        match self {
            Self::Ipv4(_) => ProtocolId::Ipv4,
            Self::Ipv6(_) => ProtocolId::Ipv6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportLayer<'a> {
    Tcp(TcpHeader<'a>),
    Udp(UdpHeader<'a>),
}

impl<'a> TransportLayer<'a> {
    pub fn src_port(&self) -> u16 {
        match self {
            Self::Tcp(tcp) => tcp.src_port,
            Self::Udp(udp) => udp.src_port,
        }
    }

    pub fn dst_port(&self) -> u16 {
        match self {
            Self::Tcp(tcp) => tcp.dst_port,
            Self::Udp(udp) => udp.dst_port,
        }
    }

    pub fn payload(&self) -> &'a [u8] {
        match self {
            Self::Tcp(tcp) => tcp.payload,
            Self::Udp(udp) => udp.payload,
        }
    }

    pub fn protocol_id(&self) -> ProtocolId {
        match self {
            Self::Tcp(_) => ProtocolId::Tcp,
            Self::Udp(_) => ProtocolId::Udp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationLayer {
    ModbusReq(ModbusReqHeader),
    ModbusRsp(ModbusRspHeader),
    Iec104(Iec104Header),
    Dnp3(Dnp3Header),
}

impl ApplicationLayer {
    pub fn family(&self) -> IcsFamily {
        match self {
            Self::ModbusReq(_) | Self::ModbusRsp(_) => IcsFamily::Modbus,
            Self::Iec104(_) => IcsFamily::Iec104,
            Self::Dnp3(_) => IcsFamily::Dnp3,
        }
    }

    pub fn protocol_id(&self) -> ProtocolId {
        match self.family() {
            IcsFamily::Modbus => ProtocolId::Modbus,
            IcsFamily::Iec104 => ProtocolId::Iec104,
            IcsFamily::Dnp3 => ProtocolId::Dnp3,
        }
    }
}

// ── Decode options ───────────────────────────────────────────────

/// Protocol layer depth, ordered bottom-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LayerDepth {
    Link,
    Network,
    Transport,
    Application,
}

/// Controls how deep the decoder descends. `stop: Some(depth)` halts after
/// the named layer even when deeper bytes are present; `None` descends as
/// far as the bytes allow. Read-only, shareable across threads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    pub stop: Option<LayerDepth>,
}

// ── Level packets ────────────────────────────────────────────────

/// Raw-only result: the link header could not be recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L1Packet<'a> {
    pub error: Option<DecodeError>,
    pub remain: &'a [u8],
}

/// Link layer recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L2Packet<'a> {
    pub link: LinkLayer,
    pub error: Option<DecodeError>,
    pub remain: &'a [u8],
}

impl L2Packet<'_> {
    pub fn src_mac(&self) -> MacAddr {
        self.link.src_mac()
    }

    pub fn dst_mac(&self) -> MacAddr {
        self.link.dst_mac()
    }
}

/// Link and network layers recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L3Packet<'a> {
    pub link: LinkLayer,
    pub network: NetworkLayer,
    pub error: Option<DecodeError>,
    pub remain: &'a [u8],
}

impl L3Packet<'_> {
    pub fn src_mac(&self) -> MacAddr {
        self.link.src_mac()
    }

    pub fn dst_mac(&self) -> MacAddr {
        self.link.dst_mac()
    }

    pub fn src_ip(&self) -> IpAddr {
        self.network.src_ip()
    }

    pub fn dst_ip(&self) -> IpAddr {
        self.network.dst_ip()
    }
}

/// Link, network, and transport layers recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L4Packet<'a> {
    pub link: LinkLayer,
    pub network: NetworkLayer,
    pub transport: TransportLayer<'a>,
    pub error: Option<DecodeError>,
    pub remain: &'a [u8],
}

impl<'a> L4Packet<'a> {
    pub fn src_mac(&self) -> MacAddr {
        self.link.src_mac()
    }

    pub fn dst_mac(&self) -> MacAddr {
        self.link.dst_mac()
    }

    pub fn src_ip(&self) -> IpAddr {
        self.network.src_ip()
    }

    pub fn dst_ip(&self) -> IpAddr {
        self.network.dst_ip()
    }

    pub fn src_port(&self) -> u16 {
        self.transport.src_port()
    }

    pub fn dst_port(&self) -> u16 {
        self.transport.dst_port()
    }

    pub fn payload(&self) -> &'a [u8] {
        self.transport.payload()
    }
}

/// All layers through a recognized application protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L5Packet<'a> {
    pub link: LinkLayer,
    pub network: NetworkLayer,
    pub transport: TransportLayer<'a>,
    pub application: ApplicationLayer,
    pub error: Option<DecodeError>,
    pub remain: &'a [u8],
}

impl<'a> L5Packet<'a> {
    pub fn src_mac(&self) -> MacAddr {
        self.link.src_mac()
    }

    pub fn dst_mac(&self) -> MacAddr {
        self.link.dst_mac()
    }

    pub fn src_ip(&self) -> IpAddr {
        self.network.src_ip()
    }

    pub fn dst_ip(&self) -> IpAddr {
        self.network.dst_ip()
    }

    pub fn src_port(&self) -> u16 {
        self.transport.src_port()
    }

    pub fn dst_port(&self) -> u16 {
        self.transport.dst_port()
    }

    pub fn payload(&self) -> &'a [u8] {
        self.transport.payload()
    }

    pub fn family(&self) -> IcsFamily {
        self.application.family()
    }
}

// ── The layered packet ───────────────────────────────────────────

/// Decode result tagged by the deepest successfully recognized layer. Each
/// variant carries strictly more information than the one below it; lower
/// layer facts are never discarded by deeper descent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayeredPacket<'a> {
    L1(L1Packet<'a>),
    L2(L2Packet<'a>),
    L3(L3Packet<'a>),
    L4(L4Packet<'a>),
    L5(L5Packet<'a>),
}

impl<'a> LayeredPacket<'a> {
    /// Decode a raw byte slice. Never fails: malformed or truncated input
    /// yields the deepest variant the bytes support, down to `L1` for input
    /// with no recognizable link header.
    pub fn decode(input: &'a [u8], options: &DecodeOptions) -> Self {
        parser::decode(input, options)
    }

    /// Numeric depth of the recognized variant (1..=5).
    pub fn level(&self) -> u8 {
        match self {
            Self::L1(_) => 1,
            Self::L2(_) => 2,
            Self::L3(_) => 3,
            Self::L4(_) => 4,
            Self::L5(_) => 5,
        }
    }

    /// Identifier of the deepest recognized protocol.
    pub fn protocol_id(&self) -> ProtocolId {
        match self {
            Self::L1(_) => ProtocolId::Raw,
            Self::L2(_) => ProtocolId::Ethernet,
            Self::L3(l3) => l3.network.protocol_id(),
            Self::L4(l4) => l4.transport.protocol_id(),
            Self::L5(l5) => l5.application.protocol_id(),
        }
    }

    /// The ICS family of the application layer, if one was recognized.
    pub fn ics_family(&self) -> Option<IcsFamily> {
        match self {
            Self::L5(l5) => Some(l5.family()),
            _ => None,
        }
    }

    /// Whether the packet belongs to a recognized ICS protocol family.
    pub fn is_ics(&self) -> bool {
        self.ics_family().is_some()
    }

    /// The stop reason recorded while decoding, if any.
    pub fn error(&self) -> Option<DecodeError> {
        match self {
            Self::L1(l1) => l1.error,
            Self::L2(l2) => l2.error,
            Self::L3(l3) => l3.error,
            Self::L4(l4) => l4.error,
            Self::L5(l5) => l5.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_addr_display() {
        let mac = MacAddr([0x00, 0x1b, 0x44, 0x11, 0x3a, 0xb7]);
        assert_eq!(format!("{mac}"), "00:1b:44:11:3a:b7");
    }

    #[test]
    fn layer_depth_is_ordered_bottom_up() {
        assert!(LayerDepth::Link < LayerDepth::Network);
        assert!(LayerDepth::Network < LayerDepth::Transport);
        assert!(LayerDepth::Transport < LayerDepth::Application);
    }

    #[test]
    fn decode_options_default_descends_fully() {
        assert_eq!(DecodeOptions::default().stop, None);
    }

    #[test]
    fn empty_input_is_l1() {
        let packet = LayeredPacket::decode(&[], &DecodeOptions::default());
        assert_eq!(packet.level(), 1);
        assert_eq!(packet.protocol_id(), ProtocolId::Raw);
        assert!(!packet.is_ics());
    }
}
