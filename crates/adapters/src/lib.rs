//! C-ABI surface for the packet-inspection engine.
//!
//! Every pointer crossing this boundary is an opaque handle created by an
//! `init_*`/`parse_*` export and released by the matching `free_*` export.
//! All exports null-check their arguments and report failure (or a safe
//! default) instead of crashing; use-after-free and double-free remain the
//! caller's contract, as usual at a plain C boundary.

use std::ffi::CString;

use libc::c_char;

pub mod icsrule;
pub mod packet;
pub mod report;
pub mod suricata;

/// Turn an owned string into a caller-released C string. Interior NULs
/// (which cannot cross the boundary) degrade to an empty string.
pub(crate) fn into_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(cstring) => cstring.into_raw(),
        Err(_) => {
            tracing::warn!("string with interior NUL at ffi boundary, returning empty");
            CString::default().into_raw()
        }
    }
}

/// Release any string returned by this library (`show_*_rules`,
/// `get_parsing_json`).
#[unsafe(no_mangle)]
pub extern "C" fn free_engine_string(string_ptr: *mut c_char) {
    if string_ptr.is_null() {
        return;
    }
    unsafe {
        drop(CString::from_raw(string_ptr));
    }
}

/// Process-wide diagnostic logging toggle. Idempotent; affects no return
/// values, only log verbosity. `RUST_LOG` overrides the default level.
#[unsafe(no_mangle)]
pub extern "C" fn enable_tracing() {
    infrastructure::logging::init_logging("trace");
    tracing::debug!("engine tracing enabled");
}
