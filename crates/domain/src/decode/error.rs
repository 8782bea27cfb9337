use super::entity::LayerDepth;

/// Why layer descent stopped early. Recorded inside the returned packet for
/// diagnostics; decoding itself never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Not enough bytes left for a complete header at this depth.
    Truncated { layer: LayerDepth },
    /// Link layer carried an ethertype this decoder does not dissect.
    UnknownEtherType(u16),
    /// Network layer carried an IP protocol number other than TCP/UDP.
    UnknownTransport(u8),
    /// Transport payload did not match any known application protocol.
    UnknownPayload,
    /// Header bytes were present but structurally invalid.
    Malformed,
}
