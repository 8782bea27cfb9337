use std::slice;

use domain::decode::entity::{DecodeOptions, LayeredPacket};

/// Allocate a decode-options handle with defaults (full descent).
#[unsafe(no_mangle)]
pub extern "C" fn init_parse_option() -> *mut DecodeOptions {
    let options_ptr = Box::into_raw(Box::new(DecodeOptions::default()));
    tracing::debug!("parse options initialized");
    options_ptr
}

/// Release an options handle.
#[unsafe(no_mangle)]
pub extern "C" fn free_parse_option(options_ptr: *mut DecodeOptions) {
    if options_ptr.is_null() {
        tracing::warn!("option free: options ptr is null");
        return;
    }
    unsafe {
        drop(Box::from_raw(options_ptr));
    }
}

/// Decode a raw buffer into a layered-packet handle. Never fails: null or
/// unrecognizable input yields an `L1` packet. The input buffer must stay
/// valid until `free_packet` is called on the result.
#[unsafe(no_mangle)]
pub extern "C" fn parse_packet<'a>(
    input_ptr: *const u8,
    input_len: u16,
    options_ptr: *const DecodeOptions,
) -> *mut LayeredPacket<'a> {
    let input: &[u8] = if input_ptr.is_null() {
        tracing::warn!("packet parsing: input ptr is null");
        &[]
    } else {
        unsafe { slice::from_raw_parts(input_ptr, input_len.into()) }
    };

    let default_options = DecodeOptions::default();
    let options = if options_ptr.is_null() {
        tracing::warn!("packet parsing: options ptr is null, using defaults");
        &default_options
    } else {
        unsafe { &*options_ptr }
    };

    Box::into_raw(Box::new(LayeredPacket::decode(input, options)))
}

/// Release a packet handle.
#[unsafe(no_mangle)]
pub extern "C" fn free_packet(packet_ptr: *mut LayeredPacket) {
    if packet_ptr.is_null() {
        tracing::warn!("packet free: packet ptr is null");
        return;
    }
    unsafe {
        drop(Box::from_raw(packet_ptr));
    }
    tracing::trace!("packet freed");
}

/// Dump the decode result to the logging sink.
#[unsafe(no_mangle)]
pub extern "C" fn show_packet(packet_ptr: *const LayeredPacket) {
    if packet_ptr.is_null() {
        tracing::warn!("packet show: packet ptr is null");
        return;
    }
    let packet = unsafe { &*packet_ptr };

    match packet {
        LayeredPacket::L1(l1) => {
            tracing::info!(level = 1, error = ?l1.error, "packet");
        }
        LayeredPacket::L2(l2) => {
            tracing::info!(
                level = 2,
                src_mac = %l2.src_mac(),
                dst_mac = %l2.dst_mac(),
                error = ?l2.error,
                "packet"
            );
        }
        LayeredPacket::L3(l3) => {
            tracing::info!(
                level = 3,
                src_ip = %l3.src_ip(),
                dst_ip = %l3.dst_ip(),
                error = ?l3.error,
                "packet"
            );
        }
        LayeredPacket::L4(l4) => {
            tracing::info!(
                level = 4,
                src = %format!("{}:{}", l4.src_ip(), l4.src_port()),
                dst = %format!("{}:{}", l4.dst_ip(), l4.dst_port()),
                error = ?l4.error,
                "packet"
            );
        }
        LayeredPacket::L5(l5) => {
            tracing::info!(
                level = 5,
                src = %format!("{}:{}", l5.src_ip(), l5.src_port()),
                dst = %format!("{}:{}", l5.dst_ip(), l5.dst_port()),
                family = %l5.family(),
                error = ?l5.error,
                "packet"
            );
        }
    }
}

/// Identifier of the deepest recognized protocol (0 for raw/unknown).
#[unsafe(no_mangle)]
pub extern "C" fn get_protocol_id(packet_ptr: *const LayeredPacket) -> u8 {
    if packet_ptr.is_null() {
        tracing::warn!("protocol id: packet ptr is null");
        return 0;
    }
    let packet = unsafe { &*packet_ptr };
    packet.protocol_id().to_u8()
}

/// Whether the packet belongs to a recognized ICS protocol family.
#[unsafe(no_mangle)]
pub extern "C" fn is_ics(packet_ptr: *const LayeredPacket) -> bool {
    if packet_ptr.is_null() {
        tracing::warn!("is_ics: packet ptr is null");
        return false;
    }
    let packet = unsafe { &*packet_ptr };
    packet.is_ics()
}
