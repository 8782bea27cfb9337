use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::common::entity::{IcsFamily, Verdict};
use crate::decode::entity::LayeredPacket;

use super::entity::IcsRule;
use super::error::IcsRuleError;

/// Mutable collection of ICS rules keyed by rule id. Rules are kept in a
/// `BTreeMap` so detection walks candidates in ascending rid order, which
/// is the documented first-match tie-break. A per-family index narrows
/// detection to rules of the packet's application family.
#[derive(Debug, Default)]
pub struct IcsRuleStore {
    rules: BTreeMap<u32, IcsRule>,
    by_family: HashMap<IcsFamily, Vec<u32>>,
}

impl IcsRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, rid: u32) -> Option<&IcsRule> {
        self.rules.get(&rid)
    }

    pub fn rules(&self) -> impl Iterator<Item = &IcsRule> {
        self.rules.values()
    }

    /// Load a JSON rule file, replacing the current contents. All-or-nothing:
    /// any I/O, syntax, or duplicate-rid failure leaves the store unchanged.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<usize, IcsRuleError> {
        let text = fs::read_to_string(path)?;
        self.load_str(&text)
    }

    /// Same contract as `load`, from rule text already in memory.
    pub fn load_str(&mut self, text: &str) -> Result<usize, IcsRuleError> {
        let parsed: Vec<IcsRule> = serde_json::from_str(text)?;

        let mut rules = BTreeMap::new();
        for rule in parsed {
            let rid = rule.header.rid;
            if rules.insert(rid, rule).is_some() {
                return Err(IcsRuleError::DuplicateRid(rid));
            }
        }

        self.rules = rules;
        self.rebuild_index();
        debug!(count = self.rules.len(), "ics rules loaded");
        Ok(self.rules.len())
    }

    /// Mark a rule active. Returns false for an unknown rid; idempotent on
    /// an already-active rule.
    pub fn activate(&mut self, rid: u32) -> bool {
        match self.rules.get_mut(&rid) {
            Some(rule) => {
                rule.header.active = true;
                true
            }
            None => false,
        }
    }

    /// Mark a rule inactive without deleting it. Returns false for an
    /// unknown rid.
    pub fn deactivate(&mut self, rid: u32) -> bool {
        match self.rules.get_mut(&rid) {
            Some(rule) => {
                rule.header.active = false;
                true
            }
            None => false,
        }
    }

    /// Remove a rule entirely. Returns false for an unknown rid.
    pub fn delete(&mut self, rid: u32) -> bool {
        if self.rules.remove(&rid).is_none() {
            return false;
        }
        self.rebuild_index();
        true
    }

    /// Drop every rule, leaving a usable empty store.
    pub fn clear(&mut self) {
        self.rules.clear();
        self.by_family.clear();
    }

    /// Human-readable listing of all rules, inactive ones included.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (rid, rule) in &self.rules {
            let _ = writeln!(
                out,
                "[{}] action = {}, active = {}, msg = {}",
                rid, rule.header.action, rule.header.active, rule.header.msg
            );
        }
        out
    }

    fn rebuild_index(&mut self) {
        self.by_family.clear();
        for (rid, rule) in &self.rules {
            self.by_family.entry(rule.family()).or_default().push(*rid);
        }
    }

    /// Evaluate the packet against active rules of its family, ascending
    /// rid. Rules require a fully dissected (`L5`) packet; shallower
    /// packets never match.
    pub fn detect(&self, packet: &LayeredPacket<'_>) -> Option<Verdict> {
        let LayeredPacket::L5(l5) = packet else {
            return None;
        };
        let candidates = self.by_family.get(&l5.family())?;

        for rid in candidates {
            let Some(rule) = self.rules.get(rid) else {
                continue;
            };
            if !rule.header.active {
                continue;
            }
            if rule.matches(l5) {
                debug!(rid, action = %rule.header.action, "ics rule hit");
                return Some(Verdict {
                    rule_id: *rid,
                    action: rule.header.action,
                });
            }
        }
        None
    }

    /// Whitelist evaluation: same matching, but only the rid of the
    /// allowing rule is reported.
    pub fn detect_whitelist(&self, packet: &LayeredPacket<'_>) -> Option<u32> {
        self.detect(packet).map(|verdict| verdict.rule_id)
    }
}
