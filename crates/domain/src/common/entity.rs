use serde::{Deserialize, Serialize};

/// What a matched rule asks the host data plane to do with the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Alert,
    Drop,
    Reject,
    Pass,
}

impl RuleAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alert => "alert",
            Self::Drop => "drop",
            Self::Reject => "reject",
            Self::Pass => "pass",
        }
    }

    /// Convert to the u8 value handed across the C boundary.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Alert => 0,
            Self::Drop => 1,
            Self::Reject => 2,
            Self::Pass => 3,
        }
    }

    /// Create from a u8 value. Unknown values default to Alert.
    pub fn from_u8(n: u8) -> Self {
        match n {
            1 => Self::Drop,
            2 => Self::Reject,
            3 => Self::Pass,
            _ => Self::Alert,
        }
    }
}

impl std::fmt::Display for RuleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a rule's endpoints are matched as written or in either orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "->")]
    Uni,
    #[serde(rename = "<>")]
    Bi,
}

/// Outcome of a detection pass: the matched rule and its configured action.
/// "No match" is expressed as `Option::None` by the engines, not as a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub rule_id: u32,
    pub action: RuleAction,
}

/// Stable protocol identifier for the deepest recognized layer, used to
/// correlate with the host firewall's protocol taxonomy. ICS application
/// families start at 16 so `id >= 16` reads as "ICS traffic".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolId {
    Raw,
    Ethernet,
    Ipv4,
    Ipv6,
    Tcp,
    Udp,
    Modbus,
    Iec104,
    Dnp3,
}

impl ProtocolId {
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Raw => 0,
            Self::Ethernet => 1,
            Self::Ipv4 => 2,
            Self::Ipv6 => 3,
            Self::Tcp => 4,
            Self::Udp => 5,
            Self::Modbus => 16,
            Self::Iec104 => 17,
            Self::Dnp3 => 18,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Ethernet => "ethernet",
            Self::Ipv4 => "ipv4",
            Self::Ipv6 => "ipv6",
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Modbus => "modbus",
            Self::Iec104 => "iec104",
            Self::Dnp3 => "dnp3",
        }
    }
}

impl std::fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ICS application-protocol family, independent of request/response flavor.
/// Keys the ICS rule store's per-family index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IcsFamily {
    Modbus,
    Iec104,
    Dnp3,
}

impl IcsFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Modbus => "Modbus",
            Self::Iec104 => "Iec104",
            Self::Dnp3 => "Dnp3",
        }
    }
}

impl std::fmt::Display for IcsFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── RuleAction tests ──────────────────────────────────────────

    #[test]
    fn rule_action_roundtrip() {
        for action in [
            RuleAction::Alert,
            RuleAction::Drop,
            RuleAction::Reject,
            RuleAction::Pass,
        ] {
            assert_eq!(RuleAction::from_u8(action.to_u8()), action);
        }
    }

    #[test]
    fn rule_action_from_u8_unknown_defaults_to_alert() {
        assert_eq!(RuleAction::from_u8(42), RuleAction::Alert);
        assert_eq!(RuleAction::from_u8(255), RuleAction::Alert);
    }

    #[test]
    fn rule_action_serde_lowercase() {
        let json = serde_json::to_string(&RuleAction::Drop).unwrap();
        assert_eq!(json, r#""drop""#);
        let back: RuleAction = serde_json::from_str(r#""alert""#).unwrap();
        assert_eq!(back, RuleAction::Alert);
    }

    #[test]
    fn rule_action_display() {
        assert_eq!(format!("{}", RuleAction::Reject), "reject");
    }

    // ── Direction tests ───────────────────────────────────────────

    #[test]
    fn direction_serde_arrows() {
        assert_eq!(serde_json::to_string(&Direction::Uni).unwrap(), r#""->""#);
        assert_eq!(serde_json::to_string(&Direction::Bi).unwrap(), r#""<>""#);
        let uni: Direction = serde_json::from_str(r#""->""#).unwrap();
        assert_eq!(uni, Direction::Uni);
    }

    // ── ProtocolId tests ──────────────────────────────────────────

    #[test]
    fn protocol_id_ics_families_start_at_16() {
        assert!(ProtocolId::Modbus.to_u8() >= 16);
        assert!(ProtocolId::Iec104.to_u8() >= 16);
        assert!(ProtocolId::Dnp3.to_u8() >= 16);
        assert!(ProtocolId::Tcp.to_u8() < 16);
    }

    #[test]
    fn protocol_id_values_are_distinct() {
        let ids = [
            ProtocolId::Raw,
            ProtocolId::Ethernet,
            ProtocolId::Ipv4,
            ProtocolId::Ipv6,
            ProtocolId::Tcp,
            ProtocolId::Udp,
            ProtocolId::Modbus,
            ProtocolId::Iec104,
            ProtocolId::Dnp3,
        ];
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a.to_u8(), b.to_u8());
            }
        }
    }

    #[test]
    fn ics_family_display() {
        assert_eq!(format!("{}", IcsFamily::Modbus), "Modbus");
        assert_eq!(format!("{}", IcsFamily::Iec104), "Iec104");
    }
}
