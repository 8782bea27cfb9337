use super::dnp3;
use super::entity::{
    ApplicationLayer, DecodeOptions, EthernetHeader, Ipv4Header, Ipv6Header, L1Packet, L2Packet,
    L3Packet, L4Packet, L5Packet, LayerDepth, LayeredPacket, LinkLayer, MacAddr, NetworkLayer,
    TcpHeader, TransportLayer, UdpHeader,
};
use super::error::DecodeError;
use super::iec104;
use super::modbus;

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_VLAN: u16 = 0x8100;
const ETHERTYPE_IPV6: u16 = 0x86DD;

const IPPROTO_TCP: u8 = 6;
const IPPROTO_UDP: u8 = 17;

const MODBUS_PORT: u16 = 502;
const IEC104_PORT: u16 = 2404;
const DNP3_PORT: u16 = 20_000;

/// Stacked 802.1Q tags consumed transparently before the payload ethertype.
const MAX_VLAN_TAGS: usize = 2;

pub(crate) fn be_u16(b: &[u8]) -> u16 {
    u16::from_be_bytes([b[0], b[1]])
}

pub(crate) fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

pub(crate) fn le_u16(b: &[u8]) -> u16 {
    u16::from_le_bytes([b[0], b[1]])
}

/// Decode a raw frame bottom-up, stopping at the deepest layer the bytes
/// (and `options.stop`) allow. Never fails; see `LayeredPacket`.
pub fn decode<'a>(input: &'a [u8], options: &DecodeOptions) -> LayeredPacket<'a> {
    decode_link(input, options)
}

fn decode_link<'a>(input: &'a [u8], options: &DecodeOptions) -> LayeredPacket<'a> {
    if input.len() < 14 {
        return LayeredPacket::L1(L1Packet {
            error: Some(DecodeError::Truncated {
                layer: LayerDepth::Link,
            }),
            remain: input,
        });
    }

    let dst_mac = MacAddr([input[0], input[1], input[2], input[3], input[4], input[5]]);
    let src_mac = MacAddr([input[6], input[7], input[8], input[9], input[10], input[11]]);
    let mut ethertype = be_u16(&input[12..14]);
    let mut rest = &input[14..];

    let mut tags = 0;
    while ethertype == ETHERTYPE_VLAN && tags < MAX_VLAN_TAGS {
        if rest.len() < 4 {
            let link = LinkLayer::Ethernet(EthernetHeader {
                dst_mac,
                src_mac,
                ethertype,
            });
            return LayeredPacket::L2(L2Packet {
                link,
                error: Some(DecodeError::Truncated {
                    layer: LayerDepth::Network,
                }),
                remain: rest,
            });
        }
        ethertype = be_u16(&rest[2..4]);
        rest = &rest[4..];
        tags += 1;
    }

    let link = LinkLayer::Ethernet(EthernetHeader {
        dst_mac,
        src_mac,
        ethertype,
    });

    if options.stop == Some(LayerDepth::Link) {
        return LayeredPacket::L2(L2Packet {
            link,
            error: None,
            remain: rest,
        });
    }
    if rest.is_empty() {
        return LayeredPacket::L2(L2Packet {
            link,
            error: None,
            remain: rest,
        });
    }

    match ethertype {
        ETHERTYPE_IPV4 => decode_ipv4(rest, link, options),
        ETHERTYPE_IPV6 => decode_ipv6(rest, link, options),
        other => LayeredPacket::L2(L2Packet {
            link,
            error: Some(DecodeError::UnknownEtherType(other)),
            remain: rest,
        }),
    }
}

fn decode_ipv4<'a>(
    input: &'a [u8],
    link: LinkLayer,
    options: &DecodeOptions,
) -> LayeredPacket<'a> {
    let stop = |error| {
        LayeredPacket::L2(L2Packet {
            link,
            error: Some(error),
            remain: input,
        })
    };

    if input.len() < 20 {
        return stop(DecodeError::Truncated {
            layer: LayerDepth::Network,
        });
    }
    if input[0] >> 4 != 4 {
        return stop(DecodeError::Malformed);
    }
    let header_len = input[0] & 0x0f;
    let header_bytes = usize::from(header_len) * 4;
    if header_len < 5 {
        return stop(DecodeError::Malformed);
    }
    if input.len() < header_bytes {
        return stop(DecodeError::Truncated {
            layer: LayerDepth::Network,
        });
    }

    let header = Ipv4Header {
        header_len,
        dscp: input[1] >> 2,
        total_length: be_u16(&input[2..4]),
        id: be_u16(&input[4..6]),
        flags: input[6] >> 5,
        fragment_offset: be_u16(&input[6..8]) & 0x1fff,
        ttl: input[8],
        protocol: input[9],
        checksum: be_u16(&input[10..12]),
        src_ip: std::net::Ipv4Addr::new(input[12], input[13], input[14], input[15]),
        dst_ip: std::net::Ipv4Addr::new(input[16], input[17], input[18], input[19]),
    };
    let rest = &input[header_bytes..];
    let network = NetworkLayer::Ipv4(header);

    decode_transport_dispatch(rest, link, network, header.protocol, options)
}

fn decode_ipv6<'a>(
    input: &'a [u8],
    link: LinkLayer,
    options: &DecodeOptions,
) -> LayeredPacket<'a> {
    let stop = |error| {
        LayeredPacket::L2(L2Packet {
            link,
            error: Some(error),
            remain: input,
        })
    };

    if input.len() < 40 {
        return stop(DecodeError::Truncated {
            layer: LayerDepth::Network,
        });
    }
    if input[0] >> 4 != 6 {
        return stop(DecodeError::Malformed);
    }

    let mut src = [0u8; 16];
    src.copy_from_slice(&input[8..24]);
    let mut dst = [0u8; 16];
    dst.copy_from_slice(&input[24..40]);

    let header = Ipv6Header {
        traffic_class: (be_u16(&input[0..2]) >> 4) as u8,
        flow_label: be_u32(&input[0..4]) & 0x000f_ffff,
        payload_length: be_u16(&input[4..6]),
        next_header: input[6],
        hop_limit: input[7],
        src_ip: std::net::Ipv6Addr::from(src),
        dst_ip: std::net::Ipv6Addr::from(dst),
    };
    let rest = &input[40..];
    let network = NetworkLayer::Ipv6(header);

    decode_transport_dispatch(rest, link, network, header.next_header, options)
}

fn decode_transport_dispatch<'a>(
    input: &'a [u8],
    link: LinkLayer,
    network: NetworkLayer,
    protocol: u8,
    options: &DecodeOptions,
) -> LayeredPacket<'a> {
    let l3 = |error| {
        LayeredPacket::L3(L3Packet {
            link,
            network,
            error,
            remain: input,
        })
    };

    if options.stop == Some(LayerDepth::Network) {
        return l3(None);
    }
    if input.is_empty() {
        return l3(None);
    }

    match protocol {
        IPPROTO_TCP => decode_tcp(input, link, network, options),
        IPPROTO_UDP => decode_udp(input, link, network, options),
        other => l3(Some(DecodeError::UnknownTransport(other))),
    }
}

fn decode_tcp<'a>(
    input: &'a [u8],
    link: LinkLayer,
    network: NetworkLayer,
    options: &DecodeOptions,
) -> LayeredPacket<'a> {
    let stop = |error| {
        LayeredPacket::L3(L3Packet {
            link,
            network,
            error: Some(error),
            remain: input,
        })
    };

    if input.len() < 20 {
        return stop(DecodeError::Truncated {
            layer: LayerDepth::Transport,
        });
    }
    let header_len = input[12] >> 4;
    let header_bytes = usize::from(header_len) * 4;
    if header_len < 5 {
        return stop(DecodeError::Malformed);
    }
    if input.len() < header_bytes {
        return stop(DecodeError::Truncated {
            layer: LayerDepth::Transport,
        });
    }

    let header = TcpHeader {
        src_port: be_u16(&input[0..2]),
        dst_port: be_u16(&input[2..4]),
        seq: be_u32(&input[4..8]),
        ack: be_u32(&input[8..12]),
        header_len,
        flags: input[13],
        window: be_u16(&input[14..16]),
        checksum: be_u16(&input[16..18]),
        urgent: be_u16(&input[18..20]),
        payload: &input[header_bytes..],
    };

    decode_application(link, network, TransportLayer::Tcp(header), options)
}

fn decode_udp<'a>(
    input: &'a [u8],
    link: LinkLayer,
    network: NetworkLayer,
    options: &DecodeOptions,
) -> LayeredPacket<'a> {
    if input.len() < 8 {
        return LayeredPacket::L3(L3Packet {
            link,
            network,
            error: Some(DecodeError::Truncated {
                layer: LayerDepth::Transport,
            }),
            remain: input,
        });
    }

    let header = UdpHeader {
        src_port: be_u16(&input[0..2]),
        dst_port: be_u16(&input[2..4]),
        length: be_u16(&input[4..6]),
        checksum: be_u16(&input[6..8]),
        payload: &input[8..],
    };

    decode_application(link, network, TransportLayer::Udp(header), options)
}

/// Dispatch the transport payload to an ICS dissector by well-known port.
/// Anything unrecognized, truncated, or structurally invalid settles at L4.
fn decode_application<'a>(
    link: LinkLayer,
    network: NetworkLayer,
    transport: TransportLayer<'a>,
    options: &DecodeOptions,
) -> LayeredPacket<'a> {
    let l4 = |error| {
        LayeredPacket::L4(L4Packet {
            link,
            network,
            transport,
            error,
            remain: &[],
        })
    };

    if options.stop == Some(LayerDepth::Transport) {
        return l4(None);
    }
    let payload = transport.payload();
    if payload.is_empty() {
        return l4(None);
    }

    let src_port = transport.src_port();
    let dst_port = transport.dst_port();

    let parsed = match transport {
        TransportLayer::Tcp(_) => {
            if dst_port == MODBUS_PORT {
                modbus::parse_request(payload).map(|(h, rest)| (ApplicationLayer::ModbusReq(h), rest))
            } else if src_port == MODBUS_PORT {
                modbus::parse_response(payload).map(|(h, rest)| (ApplicationLayer::ModbusRsp(h), rest))
            } else if dst_port == IEC104_PORT || src_port == IEC104_PORT {
                iec104::parse(payload).map(|(h, rest)| (ApplicationLayer::Iec104(h), rest))
            } else if dst_port == DNP3_PORT || src_port == DNP3_PORT {
                dnp3::parse(payload).map(|(h, rest)| (ApplicationLayer::Dnp3(h), rest))
            } else {
                return l4(Some(DecodeError::UnknownPayload));
            }
        }
        TransportLayer::Udp(_) => return l4(Some(DecodeError::UnknownPayload)),
    };

    match parsed {
        Some((application, remain)) => LayeredPacket::L5(L5Packet {
            link,
            network,
            transport,
            application,
            error: None,
            remain,
        }),
        None => l4(Some(DecodeError::Malformed)),
    }
}
