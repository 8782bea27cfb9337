use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::common::entity::{Direction, IcsFamily, RuleAction};
use crate::decode::entity::{ApplicationLayer, L5Packet};
use crate::decode::iec104::Iec104Frame;
use crate::decode::modbus::RequestData;

/// One custom ICS rule: endpoint predicate plus per-family argument
/// matchers. Wire format is the JSON rule-file contract; see the
/// serialization test at the bottom of this file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcsRule {
    #[serde(flatten)]
    pub header: RuleHeader,
    #[serde(flatten)]
    pub args: RuleArgs,
}

impl IcsRule {
    pub fn family(&self) -> IcsFamily {
        self.args.family()
    }

    /// Full predicate: endpoints (honoring direction) and family arguments.
    /// Does not consult `header.active`; the store filters inactive rules.
    pub fn matches(&self, l5: &L5Packet<'_>) -> bool {
        self.header.matches(l5) && self.args.matches(&l5.application)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleHeader {
    pub active: bool,
    pub rid: u32,
    pub action: RuleAction,
    #[serde(rename = "src")]
    pub src_ip: Option<AddrSet>,
    #[serde(rename = "sport")]
    pub src_port: Option<PortSet>,
    #[serde(rename = "dire")]
    pub dir: Direction,
    #[serde(rename = "dst")]
    pub dst_ip: Option<AddrSet>,
    #[serde(rename = "dport")]
    pub dst_port: Option<PortSet>,
    pub msg: String,
}

impl RuleHeader {
    pub fn matches(&self, l5: &L5Packet<'_>) -> bool {
        let forward = self.matches_oriented(
            (l5.src_ip(), l5.src_port()),
            (l5.dst_ip(), l5.dst_port()),
        );
        match self.dir {
            Direction::Uni => forward,
            Direction::Bi => {
                forward
                    || self.matches_oriented(
                        (l5.dst_ip(), l5.dst_port()),
                        (l5.src_ip(), l5.src_port()),
                    )
            }
        }
    }

    fn matches_oriented(&self, src: (IpAddr, u16), dst: (IpAddr, u16)) -> bool {
        if let Some(set) = &self.src_ip
            && !set.contains(&src.0)
        {
            return false;
        }
        if let Some(set) = &self.dst_ip
            && !set.contains(&dst.0)
        {
            return false;
        }
        if let Some(set) = &self.src_port
            && !set.contains(src.1)
        {
            return false;
        }
        if let Some(set) = &self.dst_port
            && !set.contains(dst.1)
        {
            return false;
        }
        true
    }
}

/// A single address or a list of addresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AddrSet {
    One(IpAddr),
    Many(Vec<IpAddr>),
}

impl AddrSet {
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match self {
            Self::One(a) => a == ip,
            Self::Many(list) => list.contains(ip),
        }
    }
}

/// A port, a `"start-end"` range, or a list of either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortSet {
    One(PortEntry),
    Many(Vec<PortEntry>),
}

impl PortSet {
    pub fn contains(&self, port: u16) -> bool {
        match self {
            Self::One(entry) => entry.contains(port),
            Self::Many(list) => list.iter().any(|e| e.contains(port)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortEntry {
    Single(u16),
    Range(PortRange),
}

impl PortEntry {
    pub fn contains(&self, port: u16) -> bool {
        match self {
            Self::Single(p) => *p == port,
            Self::Range(r) => r.start <= port && port <= r.end,
        }
    }
}

/// Inclusive port range, serialized as `"start-end"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl TryFrom<String> for PortRange {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (start, end) = value
            .split_once('-')
            .ok_or_else(|| format!("port range without '-': {value}"))?;
        let start: u16 = start
            .trim()
            .parse()
            .map_err(|_| format!("invalid range start: {value}"))?;
        let end: u16 = end
            .trim()
            .parse()
            .map_err(|_| format!("invalid range end: {value}"))?;
        if start > end {
            return Err(format!("inverted port range: {value}"));
        }
        Ok(Self { start, end })
    }
}

impl From<PortRange> for String {
    fn from(range: PortRange) -> Self {
        format!("{}-{}", range.start, range.end)
    }
}

// ── Per-family arguments ─────────────────────────────────────────

/// Family-specific matchers. An empty argument list matches any packet of
/// the rule's family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "proname", content = "args")]
pub enum RuleArgs {
    Modbus(Vec<ModbusArg>),
    Iec104(Vec<Iec104Arg>),
    Dnp3(Vec<Dnp3Arg>),
}

impl RuleArgs {
    pub fn family(&self) -> IcsFamily {
        match self {
            Self::Modbus(_) => IcsFamily::Modbus,
            Self::Iec104(_) => IcsFamily::Iec104,
            Self::Dnp3(_) => IcsFamily::Dnp3,
        }
    }

    pub fn matches(&self, app: &ApplicationLayer) -> bool {
        if self.family() != app.family() {
            return false;
        }
        match self {
            Self::Modbus(args) => args.is_empty() || args.iter().any(|a| a.matches(app)),
            Self::Iec104(args) => args.is_empty() || args.iter().any(|a| a.matches(app)),
            Self::Dnp3(args) => args.is_empty() || args.iter().any(|a| a.matches(app)),
        }
    }
}

/// Modbus matcher keyed by function code. `start_address`/`end_address`
/// bound the register window the request may touch; omitted bounds are
/// unconstrained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "function_code")]
pub enum ModbusArg {
    #[serde(rename = "1", alias = "0x01")]
    ReadCoils {
        start_address: Option<u16>,
        end_address: Option<u16>,
    },
    #[serde(rename = "2", alias = "0x02")]
    ReadDiscreteInputs {
        start_address: Option<u16>,
        end_address: Option<u16>,
    },
    #[serde(rename = "3", alias = "0x03")]
    ReadHoldingRegisters {
        start_address: Option<u16>,
        end_address: Option<u16>,
    },
    #[serde(rename = "4", alias = "0x04")]
    ReadInputRegisters {
        start_address: Option<u16>,
        end_address: Option<u16>,
    },
    #[serde(rename = "5", alias = "0x05")]
    WriteSingleCoil {
        start_address: Option<u16>,
        end_address: Option<u16>,
        value: Option<u16>,
    },
    #[serde(rename = "6", alias = "0x06")]
    WriteSingleRegister {
        start_address: Option<u16>,
        end_address: Option<u16>,
        value: Option<u16>,
    },
    #[serde(rename = "15", alias = "0x0f", alias = "0x0F")]
    WriteMultipleCoils {
        start_address: Option<u16>,
        end_address: Option<u16>,
    },
    #[serde(rename = "16", alias = "0x10")]
    WriteMultipleRegisters {
        start_address: Option<u16>,
        end_address: Option<u16>,
    },
    #[serde(rename = "17", alias = "0x11")]
    ReportServerId {},
    #[serde(rename = "22", alias = "0x16")]
    MaskWriteRegister {
        start_address: Option<u16>,
        end_address: Option<u16>,
        and_mask: Option<u16>,
        or_mask: Option<u16>,
    },
    #[serde(rename = "23", alias = "0x17")]
    ReadWriteMultipleRegisters {
        start_address: Option<u16>,
        end_address: Option<u16>,
    },
    #[serde(rename = "24", alias = "0x18")]
    ReadFifoQueue {
        start_address: Option<u16>,
        end_address: Option<u16>,
    },
    #[serde(other)]
    Unknown,
}

impl ModbusArg {
    pub fn function_code(&self) -> Option<u8> {
        let code = match self {
            Self::ReadCoils { .. } => 1,
            Self::ReadDiscreteInputs { .. } => 2,
            Self::ReadHoldingRegisters { .. } => 3,
            Self::ReadInputRegisters { .. } => 4,
            Self::WriteSingleCoil { .. } => 5,
            Self::WriteSingleRegister { .. } => 6,
            Self::WriteMultipleCoils { .. } => 15,
            Self::WriteMultipleRegisters { .. } => 16,
            Self::ReportServerId {} => 17,
            Self::MaskWriteRegister { .. } => 22,
            Self::ReadWriteMultipleRegisters { .. } => 23,
            Self::ReadFifoQueue { .. } => 24,
            Self::Unknown => return None,
        };
        Some(code)
    }

    pub fn matches(&self, app: &ApplicationLayer) -> bool {
        match app {
            ApplicationLayer::ModbusReq(req) => {
                self.function_code() == Some(req.pdu.function_code)
                    && self.matches_request(&req.pdu.data)
            }
            // Responses carry no addressable window to bound; the function
            // code alone decides, with the exception bit masked off.
            ApplicationLayer::ModbusRsp(rsp) => {
                self.function_code() == Some(rsp.pdu.function_code & 0x7f)
            }
            _ => false,
        }
    }

    fn matches_request(&self, data: &RequestData) -> bool {
        let (start_bound, end_bound) = self.address_bounds();
        let window_ok = match data.address_span() {
            Some((lo, hi)) => {
                start_bound.is_none_or(|s| lo >= s) && end_bound.is_none_or(|e| hi <= e)
            }
            None => start_bound.is_none() && end_bound.is_none(),
        };
        if !window_ok {
            return false;
        }

        match self {
            Self::WriteSingleCoil { value, .. } => {
                let RequestData::WriteSingleCoil { output_value, .. } = data else {
                    return false;
                };
                value.is_none_or(|v| v == *output_value)
            }
            Self::WriteSingleRegister { value, .. } => {
                let RequestData::WriteSingleRegister { register_value, .. } = data else {
                    return false;
                };
                value.is_none_or(|v| v == *register_value)
            }
            Self::MaskWriteRegister {
                and_mask, or_mask, ..
            } => {
                let RequestData::MaskWriteRegister {
                    and_mask: req_and,
                    or_mask: req_or,
                    ..
                } = data
                else {
                    return false;
                };
                and_mask.is_none_or(|m| m == *req_and) && or_mask.is_none_or(|m| m == *req_or)
            }
            _ => true,
        }
    }

    fn address_bounds(&self) -> (Option<u16>, Option<u16>) {
        match self {
            Self::ReadCoils {
                start_address,
                end_address,
            }
            | Self::ReadDiscreteInputs {
                start_address,
                end_address,
            }
            | Self::ReadHoldingRegisters {
                start_address,
                end_address,
            }
            | Self::ReadInputRegisters {
                start_address,
                end_address,
            }
            | Self::WriteMultipleCoils {
                start_address,
                end_address,
            }
            | Self::WriteMultipleRegisters {
                start_address,
                end_address,
            }
            | Self::ReadWriteMultipleRegisters {
                start_address,
                end_address,
            }
            | Self::ReadFifoQueue {
                start_address,
                end_address,
            }
            | Self::WriteSingleCoil {
                start_address,
                end_address,
                ..
            }
            | Self::WriteSingleRegister {
                start_address,
                end_address,
                ..
            }
            | Self::MaskWriteRegister {
                start_address,
                end_address,
                ..
            } => (*start_address, *end_address),
            Self::ReportServerId {} | Self::Unknown => (None, None),
        }
    }
}

/// IEC 104 matcher over I-frame ASDU fields; omitted fields are
/// unconstrained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iec104Arg {
    pub type_id: Option<u8>,
    pub cause: Option<u8>,
    pub common_addr: Option<u16>,
}

impl Iec104Arg {
    pub fn matches(&self, app: &ApplicationLayer) -> bool {
        let ApplicationLayer::Iec104(header) = app else {
            return false;
        };
        header.frames.iter().any(|frame| {
            let Iec104Frame::I {
                asdu: Some(asdu), ..
            } = frame
            else {
                return false;
            };
            self.type_id.is_none_or(|t| t == asdu.type_id)
                && self.cause.is_none_or(|c| c == asdu.cause)
                && self.common_addr.is_none_or(|a| a == asdu.common_addr)
        })
    }
}

/// DNP3 matcher over application and link function codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dnp3Arg {
    pub function_code: Option<u8>,
    pub link_function: Option<u8>,
}

impl Dnp3Arg {
    pub fn matches(&self, app: &ApplicationLayer) -> bool {
        let ApplicationLayer::Dnp3(header) = app else {
            return false;
        };
        self.function_code
            .is_none_or(|f| f == header.application.function_code)
            && self.link_function.is_none_or(|f| f == header.link.function())
    }
}
