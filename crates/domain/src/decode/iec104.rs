use super::parser::le_u16;

/// One or more IEC 60870-5-104 APCI frames sharing a TCP segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Iec104Header {
    pub frames: Vec<Iec104Frame>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Iec104Frame {
    /// Information transfer frame, optionally carrying an ASDU.
    I {
        send_seq: u16,
        recv_seq: u16,
        asdu: Option<AsduSummary>,
    },
    /// Supervisory acknowledgement.
    S { recv_seq: u16 },
    /// Unnumbered control function; the raw first control octet carries
    /// STARTDT/STOPDT/TESTFR act/con bits.
    U { function: u8 },
}

impl Iec104Frame {
    /// Frame-type discriminator as used in alert records (0 = I, 1 = S, 3 = U).
    pub fn type104(&self) -> u8 {
        match self {
            Self::I { .. } => 0,
            Self::S { .. } => 1,
            Self::U { .. } => 3,
        }
    }
}

/// The leading fields of an ASDU; object payloads are not dissected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsduSummary {
    pub type_id: u8,
    pub num_objects: u8,
    pub cause: u8,
    pub common_addr: u16,
    /// First information-object address (3 octets on the wire).
    pub ioa: Option<u32>,
}

const START_BYTE: u8 = 0x68;

/// Dissect every APCI frame in the payload. The whole payload must consist
/// of well-formed frames; anything else fails the dissection.
pub fn parse(input: &[u8]) -> Option<(Iec104Header, &[u8])> {
    let mut frames = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        let (frame, next) = parse_frame(rest)?;
        frames.push(frame);
        rest = next;
    }
    if frames.is_empty() {
        return None;
    }
    Some((Iec104Header { frames }, rest))
}

fn parse_frame(input: &[u8]) -> Option<(Iec104Frame, &[u8])> {
    if input.len() < 6 || input[0] != START_BYTE {
        return None;
    }
    let apdu_len = usize::from(input[1]);
    if apdu_len < 4 {
        return None;
    }
    let total = 2 + apdu_len;
    if input.len() < total {
        return None;
    }

    let c1 = input[2];
    let c2 = input[3];
    let c3 = input[4];
    let c4 = input[5];

    let frame = if c1 & 0x01 == 0 {
        let asdu = parse_asdu(&input[6..total]);
        Iec104Frame::I {
            send_seq: (u16::from(c2) << 7) | u16::from(c1 >> 1),
            recv_seq: (u16::from(c4) << 7) | u16::from(c3 >> 1),
            asdu,
        }
    } else if c1 & 0x03 == 0x01 {
        Iec104Frame::S {
            recv_seq: (u16::from(c4) << 7) | u16::from(c3 >> 1),
        }
    } else {
        Iec104Frame::U { function: c1 }
    };

    Some((frame, &input[total..]))
}

fn parse_asdu(body: &[u8]) -> Option<AsduSummary> {
    if body.len() < 6 {
        return None;
    }
    let ioa = if body.len() >= 9 {
        Some(u32::from(body[6]) | (u32::from(body[7]) << 8) | (u32::from(body[8]) << 16))
    } else {
        None
    };
    Some(AsduSummary {
        type_id: body[0],
        num_objects: body[1] & 0x7f,
        cause: body[2],
        common_addr: le_u16(&body[4..6]),
        ioa,
    })
}
