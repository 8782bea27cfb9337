use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::decode::entity::{ApplicationLayer, LayeredPacket};
use crate::decode::iec104::Iec104Frame;

/// Detection metadata the host supplies alongside the packet when asking
/// for an alert record.
#[derive(Debug, Clone, Copy)]
pub struct AlertMeta {
    pub is_match: bool,
    pub alert_target: u8,
    pub alert_type: u8,
    pub direction: u8,
    pub packet_len: usize,
}

/// One JSON alert record: structural packet breakdown plus detection
/// metadata. Purely a projection of its inputs; optional fields are
/// omitted when the packet was not decoded deep enough to fill them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AlertRecord {
    #[serde(rename = "match")]
    pub is_match: u8,
    pub timestamp: i64,
    #[serde(rename = "target")]
    pub alert_target: u8,
    #[serde(rename = "type")]
    pub alert_type: u8,
    pub direction: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smac: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dmac: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sport: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dport: Option<u16>,
    pub proto: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tran: Option<String>,
    pub len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<AppFields>,
}

/// Application-layer summary embedded in the record. Untagged: the field
/// sets are disjoint enough to round-trip, with the more specific shapes
/// listed first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AppFields {
    Iec104 {
        type104: u8,
        typeid: Vec<u8>,
        cause: Vec<u8>,
        addr: Vec<u32>,
    },
    Dnp3 {
        primary: bool,
        link_function_code: u8,
        function_code: u8,
    },
    Modbus {
        function_code: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        reference_num: Option<u16>,
    },
}

impl AppFields {
    fn from_application(app: &ApplicationLayer) -> Self {
        match app {
            ApplicationLayer::ModbusReq(req) => Self::Modbus {
                function_code: req.pdu.function_code,
                reference_num: req.pdu.data.reference_address(),
            },
            ApplicationLayer::ModbusRsp(rsp) => Self::Modbus {
                function_code: rsp.pdu.function_code,
                reference_num: None,
            },
            ApplicationLayer::Iec104(header) => {
                let mut type104 = 0;
                let mut typeid = Vec::new();
                let mut cause = Vec::new();
                let mut addr = Vec::new();
                for frame in &header.frames {
                    type104 = frame.type104();
                    if let Iec104Frame::I {
                        asdu: Some(asdu), ..
                    } = frame
                    {
                        typeid.push(asdu.type_id);
                        cause.push(asdu.cause);
                        if let Some(ioa) = asdu.ioa {
                            addr.push(ioa);
                        }
                    }
                }
                Self::Iec104 {
                    type104,
                    typeid,
                    cause,
                    addr,
                }
            }
            ApplicationLayer::Dnp3(header) => Self::Dnp3 {
                primary: header.link.is_primary(),
                link_function_code: header.link.function(),
                function_code: header.application.function_code,
            },
        }
    }
}

impl AlertRecord {
    /// Project a decoded packet and detection metadata into a record.
    pub fn build(packet: &LayeredPacket<'_>, meta: AlertMeta) -> Self {
        let mut record = Self {
            is_match: u8::from(meta.is_match),
            timestamp: unix_seconds(),
            alert_target: meta.alert_target,
            alert_type: meta.alert_type,
            direction: meta.direction,
            proto: packet.protocol_id().as_str().to_string(),
            len: meta.packet_len,
            ..Self::default()
        };

        match packet {
            LayeredPacket::L1(_) => {}
            LayeredPacket::L2(l2) => {
                record.smac = Some(l2.src_mac().to_string());
                record.dmac = Some(l2.dst_mac().to_string());
            }
            LayeredPacket::L3(l3) => {
                record.smac = Some(l3.src_mac().to_string());
                record.dmac = Some(l3.dst_mac().to_string());
                record.src = Some(l3.src_ip().to_string());
                record.dst = Some(l3.dst_ip().to_string());
            }
            LayeredPacket::L4(l4) => {
                record.smac = Some(l4.src_mac().to_string());
                record.dmac = Some(l4.dst_mac().to_string());
                record.src = Some(l4.src_ip().to_string());
                record.dst = Some(l4.dst_ip().to_string());
                record.sport = Some(l4.src_port());
                record.dport = Some(l4.dst_port());
                record.tran = Some(l4.transport.protocol_id().as_str().to_string());
            }
            LayeredPacket::L5(l5) => {
                record.smac = Some(l5.src_mac().to_string());
                record.dmac = Some(l5.dst_mac().to_string());
                record.src = Some(l5.src_ip().to_string());
                record.dst = Some(l5.dst_ip().to_string());
                record.sport = Some(l5.src_port());
                record.dport = Some(l5.dst_port());
                record.tran = Some(l5.transport.protocol_id().as_str().to_string());
                record.fields = Some(AppFields::from_application(&l5.application));
            }
        }

        record
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
