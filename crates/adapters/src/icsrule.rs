use std::ffi::CStr;

use libc::c_char;

use domain::decode::entity::LayeredPacket;
use domain::icsrule::engine::IcsRuleStore;

use crate::into_c_string;

/// Allocate an empty ICS rule store.
#[unsafe(no_mangle)]
pub extern "C" fn init_ics_rules() -> *mut IcsRuleStore {
    let store_ptr = Box::into_raw(Box::new(IcsRuleStore::new()));
    tracing::debug!("ics rule store initialized");
    store_ptr
}

/// Release an ICS rule store.
#[unsafe(no_mangle)]
pub extern "C" fn free_ics_rules(store_ptr: *mut IcsRuleStore) {
    if store_ptr.is_null() {
        tracing::warn!("ics rule free: store ptr is null");
        return;
    }
    unsafe {
        drop(Box::from_raw(store_ptr));
    }
    tracing::debug!("ics rule store freed");
}

/// Consume the store handle and return a fresh empty one.
#[unsafe(no_mangle)]
pub extern "C" fn recreate_ics_rules(store_ptr: *mut IcsRuleStore) -> *mut IcsRuleStore {
    if !store_ptr.is_null() {
        unsafe {
            drop(Box::from_raw(store_ptr));
        }
    }
    tracing::debug!("ics rule store recreated");
    Box::into_raw(Box::new(IcsRuleStore::new()))
}

/// Load a JSON rule file, replacing the store's contents. Returns false on
/// any failure, leaving the prior contents intact.
#[unsafe(no_mangle)]
pub extern "C" fn load_ics_rules(store_ptr: *mut IcsRuleStore, file_ptr: *const c_char) -> bool {
    if store_ptr.is_null() {
        tracing::warn!("ics rule load: store ptr is null");
        return false;
    }
    let store = unsafe { &mut *store_ptr };

    if file_ptr.is_null() {
        tracing::warn!("ics rule load: file ptr is null");
        return false;
    }
    let Ok(path) = unsafe { CStr::from_ptr(file_ptr) }.to_str() else {
        tracing::warn!("ics rule load: file path is not valid utf-8");
        return false;
    };

    match store.load(path) {
        Ok(count) => {
            tracing::debug!(path, count, "ics rules loaded");
            true
        }
        Err(error) => {
            tracing::warn!(path, %error, "ics rule load failed");
            false
        }
    }
}

/// Render all rules (inactive ones included) as a caller-released string.
#[unsafe(no_mangle)]
pub extern "C" fn show_ics_rules(store_ptr: *const IcsRuleStore) -> *mut c_char {
    if store_ptr.is_null() {
        tracing::warn!("ics rule show: store ptr is null");
        return into_c_string(String::new());
    }
    let store = unsafe { &*store_ptr };
    into_c_string(store.render())
}

/// Mark a rule active. False for an unknown rid.
#[unsafe(no_mangle)]
pub extern "C" fn active_ics_rule(store_ptr: *mut IcsRuleStore, rid: u32) -> bool {
    if store_ptr.is_null() {
        tracing::warn!("ics rule activate: store ptr is null");
        return false;
    }
    let store = unsafe { &mut *store_ptr };
    store.activate(rid)
}

/// Mark a rule inactive. False for an unknown rid.
#[unsafe(no_mangle)]
pub extern "C" fn deactive_ics_rule(store_ptr: *mut IcsRuleStore, rid: u32) -> bool {
    if store_ptr.is_null() {
        tracing::warn!("ics rule deactivate: store ptr is null");
        return false;
    }
    let store = unsafe { &mut *store_ptr };
    store.deactivate(rid)
}

/// Delete a rule. False for an unknown rid.
#[unsafe(no_mangle)]
pub extern "C" fn delete_ics_rule(store_ptr: *mut IcsRuleStore, rid: u32) -> bool {
    if store_ptr.is_null() {
        tracing::warn!("ics rule delete: store ptr is null");
        return false;
    }
    let store = unsafe { &mut *store_ptr };
    store.delete(rid)
}

/// Evaluate the packet against the store. On a hit, writes the matched rid
/// and action through the out pointers and returns true; "no match" is
/// false with the out values untouched.
#[unsafe(no_mangle)]
pub extern "C" fn detect_ics_rules(
    store_ptr: *const IcsRuleStore,
    packet_ptr: *const LayeredPacket,
    out_rid_ptr: *mut u32,
    out_action_ptr: *mut u8,
) -> bool {
    if store_ptr.is_null() || packet_ptr.is_null() {
        tracing::warn!("ics detect: store or packet ptr is null");
        return false;
    }
    if out_rid_ptr.is_null() || out_action_ptr.is_null() {
        tracing::warn!("ics detect: out ptr is null");
        return false;
    }
    let store = unsafe { &*store_ptr };
    let packet = unsafe { &*packet_ptr };

    match store.detect(packet) {
        Some(verdict) => {
            unsafe {
                *out_rid_ptr = verdict.rule_id;
                *out_action_ptr = verdict.action.to_u8();
            }
            tracing::trace!(rid = verdict.rule_id, action = %verdict.action, "ics rule hit");
            true
        }
        None => {
            tracing::trace!("ics rule miss");
            false
        }
    }
}

/// Whitelist evaluation: same matching, only the rid is reported.
#[unsafe(no_mangle)]
pub extern "C" fn detect_ics_whitelist_rules(
    store_ptr: *const IcsRuleStore,
    packet_ptr: *const LayeredPacket,
    out_rid_ptr: *mut u32,
) -> bool {
    if store_ptr.is_null() || packet_ptr.is_null() || out_rid_ptr.is_null() {
        tracing::warn!("ics whitelist detect: null ptr");
        return false;
    }
    let store = unsafe { &*store_ptr };
    let packet = unsafe { &*packet_ptr };

    match store.detect_whitelist(packet) {
        Some(rid) => {
            unsafe {
                *out_rid_ptr = rid;
            }
            tracing::trace!(rid, "ics whitelist hit");
            true
        }
        None => {
            tracing::trace!("ics whitelist miss");
            false
        }
    }
}
