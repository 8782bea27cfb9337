use super::parser::be_u16;

/// Modbus/TCP MBAP prefix. `length` counts the unit id plus the PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    pub transaction_id: u16,
    pub protocol_id: u16,
    pub length: u16,
    pub unit_id: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusReqHeader {
    pub mbap: MbapHeader,
    pub pdu: RequestPdu,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPdu {
    pub function_code: u8,
    pub data: RequestData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestData {
    ReadCoils { start_address: u16, count: u16 },
    ReadDiscreteInputs { start_address: u16, count: u16 },
    ReadHoldingRegisters { start_address: u16, count: u16 },
    ReadInputRegisters { start_address: u16, count: u16 },
    WriteSingleCoil { output_address: u16, output_value: u16 },
    WriteSingleRegister { register_address: u16, register_value: u16 },
    ReadExceptionStatus,
    GetCommEventCounter,
    GetCommEventLog,
    WriteMultipleCoils { start_address: u16, output_count: u16, values: Vec<u8> },
    WriteMultipleRegisters { start_address: u16, output_count: u16, values: Vec<u16> },
    ReportServerId,
    MaskWriteRegister { ref_address: u16, and_mask: u16, or_mask: u16 },
    ReadWriteMultipleRegisters {
        read_start_address: u16,
        read_count: u16,
        write_start_address: u16,
        write_count: u16,
        values: Vec<u16>,
    },
    ReadFifoQueue { pointer_address: u16 },
    Other { raw: Vec<u8> },
}

impl RequestData {
    /// First register/coil address the request touches, when the function
    /// addresses the data model at all. Surfaced in alert records.
    pub fn reference_address(&self) -> Option<u16> {
        match self {
            Self::ReadCoils { start_address, .. }
            | Self::ReadDiscreteInputs { start_address, .. }
            | Self::ReadHoldingRegisters { start_address, .. }
            | Self::ReadInputRegisters { start_address, .. }
            | Self::WriteMultipleCoils { start_address, .. }
            | Self::WriteMultipleRegisters { start_address, .. } => Some(*start_address),
            Self::WriteSingleCoil { output_address, .. } => Some(*output_address),
            Self::WriteSingleRegister { register_address, .. } => Some(*register_address),
            Self::MaskWriteRegister { ref_address, .. } => Some(*ref_address),
            Self::ReadWriteMultipleRegisters { read_start_address, .. } => {
                Some(*read_start_address)
            }
            Self::ReadFifoQueue { pointer_address } => Some(*pointer_address),
            _ => None,
        }
    }

    /// Inclusive address span the request touches, for rule-window checks.
    pub fn address_span(&self) -> Option<(u16, u16)> {
        let span = |start: u16, count: u16| {
            let end = start.saturating_add(count.saturating_sub(1));
            (start, end)
        };
        match self {
            Self::ReadCoils { start_address, count }
            | Self::ReadDiscreteInputs { start_address, count }
            | Self::ReadHoldingRegisters { start_address, count }
            | Self::ReadInputRegisters { start_address, count } => {
                Some(span(*start_address, *count))
            }
            Self::WriteMultipleCoils { start_address, output_count, .. }
            | Self::WriteMultipleRegisters { start_address, output_count, .. } => {
                Some(span(*start_address, *output_count))
            }
            Self::WriteSingleCoil { output_address, .. } => Some((*output_address, *output_address)),
            Self::WriteSingleRegister { register_address, .. } => {
                Some((*register_address, *register_address))
            }
            Self::MaskWriteRegister { ref_address, .. } => Some((*ref_address, *ref_address)),
            Self::ReadWriteMultipleRegisters { read_start_address, read_count, .. } => {
                Some(span(*read_start_address, *read_count))
            }
            Self::ReadFifoQueue { pointer_address } => Some((*pointer_address, *pointer_address)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusRspHeader {
    pub mbap: MbapHeader,
    pub pdu: ResponsePdu,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePdu {
    /// Raw function code as carried on the wire; the exception bit (0x80)
    /// is still set for exception responses.
    pub function_code: u8,
    pub data: ResponseData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseData {
    ReadBits { byte_count: u8, values: Vec<u8> },
    ReadRegisters { byte_count: u8, values: Vec<u16> },
    WriteSingleCoil { output_address: u16, output_value: u16 },
    WriteSingleRegister { register_address: u16, register_value: u16 },
    ExceptionStatus { status: u8 },
    WriteMultiple { start_address: u16, count: u16 },
    Exception { exception_code: u8 },
    Other { raw: Vec<u8> },
}

fn parse_mbap(input: &[u8]) -> Option<(MbapHeader, &[u8])> {
    if input.len() < 8 {
        return None;
    }
    let header = MbapHeader {
        transaction_id: be_u16(&input[0..2]),
        protocol_id: be_u16(&input[2..4]),
        length: be_u16(&input[4..6]),
        unit_id: input[6],
    };
    // Protocol id is always zero for Modbus; length covers unit id + PDU.
    if header.protocol_id != 0 || header.length < 2 {
        return None;
    }
    let adu_end = 6usize.checked_add(usize::from(header.length))?;
    if input.len() < adu_end {
        return None;
    }
    Some((header, &input[7..adu_end]))
}

/// Dissect a Modbus/TCP request ADU. Returns the header and any bytes
/// following the ADU (pipelined requests).
pub fn parse_request(input: &[u8]) -> Option<(ModbusReqHeader, &[u8])> {
    let (mbap, pdu_bytes) = parse_mbap(input)?;
    let function_code = pdu_bytes[0];
    let body = &pdu_bytes[1..];
    let data = parse_request_data(function_code, body)?;
    let rest = &input[6 + usize::from(mbap.length)..];
    Some((
        ModbusReqHeader {
            mbap,
            pdu: RequestPdu {
                function_code,
                data,
            },
        },
        rest,
    ))
}

fn parse_request_data(function_code: u8, body: &[u8]) -> Option<RequestData> {
    let two_u16 = |b: &[u8]| {
        if b.len() < 4 {
            None
        } else {
            Some((be_u16(&b[0..2]), be_u16(&b[2..4])))
        }
    };

    let data = match function_code {
        1 => {
            let (start_address, count) = two_u16(body)?;
            RequestData::ReadCoils {
                start_address,
                count,
            }
        }
        2 => {
            let (start_address, count) = two_u16(body)?;
            RequestData::ReadDiscreteInputs {
                start_address,
                count,
            }
        }
        3 => {
            let (start_address, count) = two_u16(body)?;
            RequestData::ReadHoldingRegisters {
                start_address,
                count,
            }
        }
        4 => {
            let (start_address, count) = two_u16(body)?;
            RequestData::ReadInputRegisters {
                start_address,
                count,
            }
        }
        5 => {
            let (output_address, output_value) = two_u16(body)?;
            RequestData::WriteSingleCoil {
                output_address,
                output_value,
            }
        }
        6 => {
            let (register_address, register_value) = two_u16(body)?;
            RequestData::WriteSingleRegister {
                register_address,
                register_value,
            }
        }
        7 => RequestData::ReadExceptionStatus,
        11 => RequestData::GetCommEventCounter,
        12 => RequestData::GetCommEventLog,
        15 => {
            let (start_address, output_count) = two_u16(body)?;
            let byte_count = *body.get(4)?;
            let values = body.get(5..5 + usize::from(byte_count))?.to_vec();
            RequestData::WriteMultipleCoils {
                start_address,
                output_count,
                values,
            }
        }
        16 => {
            let (start_address, output_count) = two_u16(body)?;
            let byte_count = *body.get(4)?;
            let raw = body.get(5..5 + usize::from(byte_count))?;
            RequestData::WriteMultipleRegisters {
                start_address,
                output_count,
                values: registers(raw),
            }
        }
        17 => RequestData::ReportServerId,
        22 => {
            if body.len() < 6 {
                return None;
            }
            RequestData::MaskWriteRegister {
                ref_address: be_u16(&body[0..2]),
                and_mask: be_u16(&body[2..4]),
                or_mask: be_u16(&body[4..6]),
            }
        }
        23 => {
            if body.len() < 9 {
                return None;
            }
            let write_byte_count = body[8];
            let raw = body.get(9..9 + usize::from(write_byte_count))?;
            RequestData::ReadWriteMultipleRegisters {
                read_start_address: be_u16(&body[0..2]),
                read_count: be_u16(&body[2..4]),
                write_start_address: be_u16(&body[4..6]),
                write_count: be_u16(&body[6..8]),
                values: registers(raw),
            }
        }
        24 => {
            if body.len() < 2 {
                return None;
            }
            RequestData::ReadFifoQueue {
                pointer_address: be_u16(&body[0..2]),
            }
        }
        _ => RequestData::Other {
            raw: body.to_vec(),
        },
    };
    Some(data)
}

/// Dissect a Modbus/TCP response ADU.
pub fn parse_response(input: &[u8]) -> Option<(ModbusRspHeader, &[u8])> {
    let (mbap, pdu_bytes) = parse_mbap(input)?;
    let function_code = pdu_bytes[0];
    let body = &pdu_bytes[1..];
    let data = parse_response_data(function_code, body)?;
    let rest = &input[6 + usize::from(mbap.length)..];
    Some((
        ModbusRspHeader {
            mbap,
            pdu: ResponsePdu {
                function_code,
                data,
            },
        },
        rest,
    ))
}

fn parse_response_data(function_code: u8, body: &[u8]) -> Option<ResponseData> {
    if function_code & 0x80 != 0 {
        return Some(ResponseData::Exception {
            exception_code: *body.first()?,
        });
    }

    let data = match function_code {
        1 | 2 => {
            let byte_count = *body.first()?;
            let values = body.get(1..1 + usize::from(byte_count))?.to_vec();
            ResponseData::ReadBits { byte_count, values }
        }
        3 | 4 => {
            let byte_count = *body.first()?;
            let raw = body.get(1..1 + usize::from(byte_count))?;
            ResponseData::ReadRegisters {
                byte_count,
                values: registers(raw),
            }
        }
        5 => {
            if body.len() < 4 {
                return None;
            }
            ResponseData::WriteSingleCoil {
                output_address: be_u16(&body[0..2]),
                output_value: be_u16(&body[2..4]),
            }
        }
        6 => {
            if body.len() < 4 {
                return None;
            }
            ResponseData::WriteSingleRegister {
                register_address: be_u16(&body[0..2]),
                register_value: be_u16(&body[2..4]),
            }
        }
        7 => ResponseData::ExceptionStatus {
            status: *body.first()?,
        },
        15 | 16 => {
            if body.len() < 4 {
                return None;
            }
            ResponseData::WriteMultiple {
                start_address: be_u16(&body[0..2]),
                count: be_u16(&body[2..4]),
            }
        }
        _ => ResponseData::Other {
            raw: body.to_vec(),
        },
    };
    Some(data)
}

fn registers(raw: &[u8]) -> Vec<u16> {
    raw.chunks_exact(2).map(be_u16).collect()
}
