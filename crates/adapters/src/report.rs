use libc::c_char;

use domain::alert::entity::{AlertMeta, AlertRecord};
use domain::decode::entity::LayeredPacket;

use crate::into_c_string;

/// Serialize the packet breakdown plus detection metadata into a JSON
/// alert record. The returned string is released via `free_engine_string`.
#[unsafe(no_mangle)]
pub extern "C" fn get_parsing_json(
    packet_ptr: *const LayeredPacket,
    is_match: bool,
    alert_target: u8,
    alert_type: u8,
    direction: u8,
    packet_len: usize,
) -> *mut c_char {
    if packet_ptr.is_null() {
        tracing::warn!("parsing json: packet ptr is null");
        return into_c_string(String::new());
    }
    let packet = unsafe { &*packet_ptr };

    let record = AlertRecord::build(
        packet,
        AlertMeta {
            is_match,
            alert_target,
            alert_type,
            direction,
            packet_len,
        },
    );

    match record.to_json() {
        Ok(json) => {
            tracing::trace!(%json, "alert record serialized");
            into_c_string(json)
        }
        Err(error) => {
            tracing::warn!(%error, "alert record serialization failed");
            into_c_string(String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::free_engine_string;
    use crate::packet::{free_packet, parse_packet};
    use std::ffi::CStr;

    fn modbus_frame() -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(&[0x00, 0x1b, 0x44, 0x11, 0x3a, 0xb7]);
        frame.extend_from_slice(&[0x00, 0x1b, 0x44, 0x11, 0x3a, 0xb8]);
        frame.extend_from_slice(&0x0800u16.to_be_bytes());
        frame.extend_from_slice(&[0x45, 0x00, 0x00, 0x34]);
        frame.extend_from_slice(&[0xcd, 0x4b, 0x40, 0x00, 0x40, 0x06, 0x00, 0x00]);
        frame.extend_from_slice(&[192, 168, 3, 189]);
        frame.extend_from_slice(&[192, 168, 3, 190]);
        frame.extend_from_slice(&53211u16.to_be_bytes());
        frame.extend_from_slice(&502u16.to_be_bytes());
        frame.extend_from_slice(&[0; 8]);
        frame.extend_from_slice(&[0x50, 0x18, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00]);
        frame.extend_from_slice(&[
            0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x10, 0x00, 0x02,
        ]);
        frame
    }

    fn take_string(ptr: *mut c_char) -> String {
        let text = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
        free_engine_string(ptr);
        text
    }

    #[test]
    fn json_record_carries_packet_and_metadata() {
        let frame = modbus_frame();
        let packet = parse_packet(frame.as_ptr(), frame.len() as u16, std::ptr::null());

        let json = take_string(get_parsing_json(packet, true, 3, 1, 0, frame.len()));
        assert!(json.contains("\"match\":1"));
        assert!(json.contains("\"target\":3"));
        assert!(json.contains("\"proto\":\"modbus\""));
        assert!(json.contains("\"sport\":53211"));
        assert!(json.contains(&format!("\"len\":{}", frame.len())));

        free_packet(packet);
    }

    #[test]
    fn json_parses_back_to_a_record() {
        let frame = modbus_frame();
        let packet = parse_packet(frame.as_ptr(), frame.len() as u16, std::ptr::null());

        let json = take_string(get_parsing_json(packet, false, 0, 0, 1, frame.len()));
        let record: AlertRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record.is_match, 0);
        assert_eq!(record.direction, 1);
        assert_eq!(record.proto, "modbus");

        free_packet(packet);
    }

    #[test]
    fn null_packet_yields_empty_string() {
        let json = take_string(get_parsing_json(std::ptr::null(), true, 0, 0, 0, 0));
        assert!(json.is_empty());
    }
}
