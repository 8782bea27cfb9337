use std::ffi::CStr;

use libc::c_char;

use domain::decode::entity::LayeredPacket;
use domain::suricata::engine::SignatureStore;

use crate::into_c_string;

/// Allocate an empty signature store.
#[unsafe(no_mangle)]
pub extern "C" fn init_suricata_rules() -> *mut SignatureStore {
    let store_ptr = Box::into_raw(Box::new(SignatureStore::new()));
    tracing::debug!("suricata rule store initialized");
    store_ptr
}

/// Release a signature store.
#[unsafe(no_mangle)]
pub extern "C" fn free_suricata_rules(store_ptr: *mut SignatureStore) {
    if store_ptr.is_null() {
        tracing::warn!("suricata rule free: store ptr is null");
        return;
    }
    unsafe {
        drop(Box::from_raw(store_ptr));
    }
    tracing::debug!("suricata rule store freed");
}

/// Load a signature file, replacing the store's contents. Returns false on
/// any failure, leaving the prior contents intact.
#[unsafe(no_mangle)]
pub extern "C" fn load_suricata_rules(
    store_ptr: *mut SignatureStore,
    file_ptr: *const c_char,
) -> bool {
    if store_ptr.is_null() {
        tracing::warn!("suricata rule load: store ptr is null");
        return false;
    }
    let store = unsafe { &mut *store_ptr };

    if file_ptr.is_null() {
        tracing::warn!("suricata rule load: file ptr is null");
        return false;
    }
    let Ok(path) = unsafe { CStr::from_ptr(file_ptr) }.to_str() else {
        tracing::warn!("suricata rule load: file path is not valid utf-8");
        return false;
    };

    match store.load(path) {
        Ok(count) => {
            tracing::debug!(path, count, "suricata rules loaded");
            true
        }
        Err(error) => {
            tracing::warn!(path, %error, "suricata rule load failed");
            false
        }
    }
}

/// Render all signatures in file order as a caller-released string.
#[unsafe(no_mangle)]
pub extern "C" fn show_suricata_rules(store_ptr: *const SignatureStore) -> *mut c_char {
    if store_ptr.is_null() {
        tracing::warn!("suricata rule show: store ptr is null");
        return into_c_string(String::new());
    }
    let store = unsafe { &*store_ptr };
    into_c_string(store.render())
}

/// Evaluate the packet against signatures in file order. On a hit, writes
/// the matched sid and action through the out pointers and returns true.
#[unsafe(no_mangle)]
pub extern "C" fn detect_suricata_rules(
    store_ptr: *const SignatureStore,
    packet_ptr: *const LayeredPacket,
    out_sid_ptr: *mut u32,
    out_action_ptr: *mut u8,
) -> bool {
    if store_ptr.is_null() || packet_ptr.is_null() {
        tracing::warn!("suricata detect: store or packet ptr is null");
        return false;
    }
    if out_sid_ptr.is_null() || out_action_ptr.is_null() {
        tracing::warn!("suricata detect: out ptr is null");
        return false;
    }
    let store = unsafe { &*store_ptr };
    let packet = unsafe { &*packet_ptr };

    match store.detect(packet) {
        Some(verdict) => {
            unsafe {
                *out_sid_ptr = verdict.rule_id;
                *out_action_ptr = verdict.action.to_u8();
            }
            tracing::trace!(sid = verdict.rule_id, action = %verdict.action, "suricata rule hit");
            true
        }
        None => {
            tracing::trace!("suricata rule miss");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::free_engine_string;
    use crate::packet::{free_packet, parse_packet};
    use std::ffi::CString;

    fn tcp_frame(payload: &[u8]) -> Vec<u8> {
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
        frame.extend_from_slice(&40000u16.to_be_bytes());
        frame.extend_from_slice(&8080u16.to_be_bytes());
        frame.extend_from_slice(&[0; 8]);
        frame.extend_from_slice(&[0x50, 0x18, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00]);
        frame.extend_from_slice(payload);
        frame
    }

    fn rule_file(name: &str) -> CString {
        let path = std::env::temp_dir().join(format!("icsentinel_ffi_{name}.rules"));
        std::fs::write(
            &path,
            "drop tcp any any -> any 8080 (msg:\"exploit marker\"; content:\"attack\"; sid:31;)\n",
        )
        .unwrap();
        CString::new(path.to_str().unwrap()).unwrap()
    }

    #[test]
    fn load_and_detect_cycle() {
        let store = init_suricata_rules();
        let path = rule_file("cycle");
        assert!(load_suricata_rules(store, path.as_ptr()));

        let frame = tcp_frame(b"an attack payload");
        let packet = parse_packet(frame.as_ptr(), frame.len() as u16, std::ptr::null());

        let mut sid = 0u32;
        let mut action = 0xffu8;
        assert!(detect_suricata_rules(store, packet, &mut sid, &mut action));
        assert_eq!(sid, 31);
        assert_eq!(action, 1); // drop

        free_packet(packet);

        let clean = tcp_frame(b"ordinary traffic");
        let packet = parse_packet(clean.as_ptr(), clean.len() as u16, std::ptr::null());
        assert!(!detect_suricata_rules(store, packet, &mut sid, &mut action));

        free_packet(packet);
        free_suricata_rules(store);
    }

    #[test]
    fn show_lists_signatures() {
        let store = init_suricata_rules();
        let path = rule_file("show");
        assert!(load_suricata_rules(store, path.as_ptr()));

        let listing = show_suricata_rules(store);
        let text = unsafe { CStr::from_ptr(listing) }.to_str().unwrap().to_string();
        free_engine_string(listing);
        assert!(text.contains("[31] action = drop, proto = tcp"));

        free_suricata_rules(store);
    }

    #[test]
    fn load_missing_file_returns_false() {
        let store = init_suricata_rules();
        let path = CString::new("/nonexistent/suricata.rules").unwrap();
        assert!(!load_suricata_rules(store, path.as_ptr()));
        free_suricata_rules(store);
    }

    #[test]
    fn null_guards_do_not_crash() {
        assert!(!load_suricata_rules(std::ptr::null_mut(), std::ptr::null()));
        free_suricata_rules(std::ptr::null_mut());
        let mut sid = 0u32;
        let mut action = 0u8;
        assert!(!detect_suricata_rules(
            std::ptr::null(),
            std::ptr::null(),
            &mut sid,
            &mut action
        ));
    }
}
