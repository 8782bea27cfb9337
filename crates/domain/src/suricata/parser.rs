use std::net::IpAddr;

use regex::bytes::RegexBuilder;

use crate::common::entity::{Direction, RuleAction};

use super::entity::{
    AddrEntry, AddrPattern, ContentMatch, DsizeBound, PcreMatch, PortPattern, PortSpan,
    SigProtocol, SignatureRule,
};
use super::error::SignatureError;

/// Maximum compiled regex size (10 MiB) to prevent regex denial-of-service.
const REGEX_SIZE_LIMIT: usize = 10 * (1 << 20);

/// Maximum regex nesting depth to prevent stack overflow.
const REGEX_NEST_LIMIT: u32 = 200;

/// Parse a whole rule file. `#` comments and blank lines are skipped and a
/// trailing `\` continues a rule on the next line. Any malformed rule fails
/// the whole parse; partial loads are never produced.
pub fn parse_rules(text: &str) -> Result<Vec<SignatureRule>, SignatureError> {
    let mut rules = Vec::new();
    let mut buffer = String::new();
    let mut start_line = 0;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(stripped) = trimmed.strip_suffix('\\') {
            if buffer.is_empty() {
                start_line = line_no;
            }
            buffer.push_str(stripped);
            continue;
        }

        let (full, at_line) = if buffer.is_empty() {
            (trimmed.to_string(), line_no)
        } else {
            buffer.push_str(trimmed);
            (std::mem::take(&mut buffer), start_line)
        };

        let rule = parse_rule(&full).map_err(|reason| SignatureError::Syntax {
            line: at_line,
            reason,
        })?;
        rules.push(rule);
    }

    if !buffer.is_empty() {
        return Err(SignatureError::Syntax {
            line: start_line,
            reason: "unterminated line continuation".to_string(),
        });
    }

    Ok(rules)
}

/// Parse a single signature line.
pub fn parse_rule(line: &str) -> Result<SignatureRule, String> {
    let options_start = line.find('(').ok_or("missing options section")?;
    let options_end = line.rfind(')').ok_or("missing closing parenthesis")?;
    if options_end < options_start {
        return Err("malformed options section".to_string());
    }

    let header: Vec<&str> = line[..options_start].split_whitespace().collect();
    if header.len() != 7 {
        return Err(format!("expected 7 header fields, got {}", header.len()));
    }

    let action = parse_action(header[0])?;
    let protocol = parse_protocol(header[1])?;
    let src_addrs = parse_addr_pattern(header[2])?;
    let src_ports = parse_port_pattern(header[3])?;
    let direction = match header[4] {
        "->" => Direction::Uni,
        "<>" => Direction::Bi,
        other => return Err(format!("unknown direction: {other}")),
    };
    let dst_addrs = parse_addr_pattern(header[5])?;
    let dst_ports = parse_port_pattern(header[6])?;

    let mut rule = SignatureRule {
        action,
        protocol,
        src_addrs,
        src_ports,
        direction,
        dst_addrs,
        dst_ports,
        sid: 0,
        rev: 1,
        msg: String::new(),
        classtype: None,
        contents: Vec::new(),
        dsize: None,
        pcre: None,
    };

    parse_options(&mut rule, &line[options_start + 1..options_end])?;

    if rule.sid == 0 {
        return Err("missing sid".to_string());
    }
    Ok(rule)
}

fn parse_action(token: &str) -> Result<RuleAction, String> {
    match token.to_ascii_lowercase().as_str() {
        "alert" => Ok(RuleAction::Alert),
        "drop" => Ok(RuleAction::Drop),
        "pass" => Ok(RuleAction::Pass),
        "reject" | "rejectsrc" | "rejectdst" | "rejectboth" => Ok(RuleAction::Reject),
        other => Err(format!("unknown action: {other}")),
    }
}

fn parse_protocol(token: &str) -> Result<SigProtocol, String> {
    match token.to_ascii_lowercase().as_str() {
        "tcp" => Ok(SigProtocol::Tcp),
        "udp" => Ok(SigProtocol::Udp),
        other => Err(format!("unsupported protocol: {other}")),
    }
}

fn parse_addr_pattern(token: &str) -> Result<AddrPattern, String> {
    if token.eq_ignore_ascii_case("any") {
        return Ok(AddrPattern::Any);
    }
    let (negated, token) = match token.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let inner = token
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(token);

    let mut entries = Vec::new();
    for part in inner.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        entries.push(parse_addr_entry(part)?);
    }
    if entries.is_empty() {
        return Err(format!("empty address list: {token}"));
    }
    Ok(AddrPattern::Set { negated, entries })
}

fn parse_addr_entry(part: &str) -> Result<AddrEntry, String> {
    if let Some((net, prefix)) = part.split_once('/') {
        let net: IpAddr = net
            .parse()
            .map_err(|_| format!("invalid network address: {part}"))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| format!("invalid prefix length: {part}"))?;
        let max = if net.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(format!("prefix length out of range: {part}"));
        }
        Ok(AddrEntry::Cidr { net, prefix })
    } else {
        let ip: IpAddr = part
            .parse()
            .map_err(|_| format!("invalid address: {part}"))?;
        Ok(AddrEntry::Ip(ip))
    }
}

fn parse_port_pattern(token: &str) -> Result<PortPattern, String> {
    if token.eq_ignore_ascii_case("any") {
        return Ok(PortPattern::Any);
    }
    let (negated, token) = match token.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let inner = token
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(token);

    let mut entries = Vec::new();
    for part in inner.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        entries.push(parse_port_span(part)?);
    }
    if entries.is_empty() {
        return Err(format!("empty port list: {token}"));
    }
    Ok(PortPattern::Set { negated, entries })
}

fn parse_port_span(part: &str) -> Result<PortSpan, String> {
    if let Some((start, end)) = part.split_once(':') {
        let start = if start.is_empty() {
            0
        } else {
            start
                .parse()
                .map_err(|_| format!("invalid port range start: {part}"))?
        };
        let end = if end.is_empty() {
            u16::MAX
        } else {
            end.parse()
                .map_err(|_| format!("invalid port range end: {part}"))?
        };
        if start > end {
            return Err(format!("inverted port range: {part}"));
        }
        Ok(PortSpan { start, end })
    } else {
        let port: u16 = part.parse().map_err(|_| format!("invalid port: {part}"))?;
        Ok(PortSpan {
            start: port,
            end: port,
        })
    }
}

fn parse_options(rule: &mut SignatureRule, options: &str) -> Result<(), String> {
    let mut current_content: Option<ContentMatch> = None;

    for opt in split_options(options) {
        let opt = opt.trim();
        if opt.is_empty() {
            continue;
        }

        let (key, value) = match opt.split_once(':') {
            Some((k, v)) => (k.trim(), Some(v.trim())),
            None => (opt, None),
        };

        match key {
            "msg" => {
                if let Some(v) = value {
                    rule.msg = unquote(v).to_string();
                }
            }
            "sid" => {
                let v = value.ok_or("sid without value")?;
                rule.sid = v.parse().map_err(|_| format!("invalid sid: {v}"))?;
            }
            "rev" => {
                let v = value.ok_or("rev without value")?;
                rule.rev = v.parse().map_err(|_| format!("invalid rev: {v}"))?;
            }
            "classtype" => {
                if let Some(v) = value {
                    rule.classtype = Some(v.to_string());
                }
            }
            "content" => {
                if let Some(done) = current_content.take() {
                    rule.contents.push(done);
                }
                let v = value.ok_or("content without value")?;
                current_content = Some(parse_content(v)?);
            }
            "nocase" => {
                if let Some(c) = current_content.as_mut() {
                    c.nocase = true;
                }
            }
            "offset" => {
                if let (Some(c), Some(v)) = (current_content.as_mut(), value) {
                    c.offset =
                        Some(v.parse().map_err(|_| format!("invalid offset: {v}"))?);
                }
            }
            "depth" => {
                if let (Some(c), Some(v)) = (current_content.as_mut(), value) {
                    c.depth = Some(v.parse().map_err(|_| format!("invalid depth: {v}"))?);
                }
            }
            "dsize" => {
                let v = value.ok_or("dsize without value")?;
                rule.dsize = Some(parse_dsize(v)?);
            }
            "pcre" => {
                let v = value.ok_or("pcre without value")?;
                rule.pcre = Some(parse_pcre(v)?);
            }
            // Options with no effect on this matcher (flow, metadata,
            // reference, threshold, ...) are accepted and ignored.
            _ => {}
        }
    }

    if let Some(done) = current_content.take() {
        rule.contents.push(done);
    }
    Ok(())
}

/// Split the options body on `;`, honoring quoted strings and escapes.
fn split_options(options: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for ch in options.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => {
                escaped = true;
                current.push(ch);
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ';' if !in_quotes => {
                if !current.trim().is_empty() {
                    parts.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

fn unquote(value: &str) -> &str {
    value.trim_matches('"')
}

/// Parse a content value: optional `!` negation, quotes, and `|..|` hex
/// segments mixed with literal text (`"abc|00 01|def"`).
fn parse_content(value: &str) -> Result<ContentMatch, String> {
    let (negated, value) = match value.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let value = unquote(value);

    let mut pattern = Vec::new();
    let mut hex_mode = false;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '|' => hex_mode = !hex_mode,
            _ if hex_mode => {
                if ch.is_whitespace() {
                    continue;
                }
                let hi = ch;
                let lo = chars
                    .next()
                    .ok_or_else(|| format!("odd hex digits in content: {value}"))?;
                let byte = u8::from_str_radix(&format!("{hi}{lo}"), 16)
                    .map_err(|_| format!("invalid hex in content: {value}"))?;
                pattern.push(byte);
            }
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| format!("dangling escape in content: {value}"))?;
                pattern.push(escaped as u8);
            }
            _ => {
                let mut buf = [0u8; 4];
                pattern.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    if hex_mode {
        return Err(format!("unterminated hex segment in content: {value}"));
    }
    if pattern.is_empty() {
        return Err("empty content pattern".to_string());
    }

    Ok(ContentMatch {
        pattern,
        nocase: false,
        offset: None,
        depth: None,
        negated,
    })
}

fn parse_dsize(value: &str) -> Result<DsizeBound, String> {
    let value = value.trim();
    if let Some((lo, hi)) = value.split_once("<>") {
        let lo = lo
            .trim()
            .parse()
            .map_err(|_| format!("invalid dsize: {value}"))?;
        let hi = hi
            .trim()
            .parse()
            .map_err(|_| format!("invalid dsize: {value}"))?;
        return Ok(DsizeBound::Between(lo, hi));
    }
    if let Some(rest) = value.strip_prefix('<') {
        let n = rest
            .trim()
            .parse()
            .map_err(|_| format!("invalid dsize: {value}"))?;
        return Ok(DsizeBound::Less(n));
    }
    if let Some(rest) = value.strip_prefix('>') {
        let n = rest
            .trim()
            .parse()
            .map_err(|_| format!("invalid dsize: {value}"))?;
        return Ok(DsizeBound::Greater(n));
    }
    let n = value
        .parse()
        .map_err(|_| format!("invalid dsize: {value}"))?;
    Ok(DsizeBound::Exact(n))
}

/// Parse a pcre value (`"/pattern/modifiers"`), compiling with size and
/// nesting limits so a hostile rule file cannot DoS the loader.
fn parse_pcre(value: &str) -> Result<PcreMatch, String> {
    let (negated, value) = match value.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let value = unquote(value);

    let rest = value
        .strip_prefix('/')
        .ok_or_else(|| format!("pcre must start with '/': {value}"))?;
    let last_slash = rest
        .rfind('/')
        .ok_or_else(|| format!("pcre missing closing '/': {value}"))?;
    let pattern = &rest[..last_slash];
    let modifiers = &rest[last_slash + 1..];

    let mut builder = RegexBuilder::new(pattern);
    builder
        .size_limit(REGEX_SIZE_LIMIT)
        .nest_limit(REGEX_NEST_LIMIT);
    for modifier in modifiers.chars() {
        match modifier {
            'i' => {
                builder.case_insensitive(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            // PCRE modifiers without a regex-crate equivalent are ignored.
            _ => {}
        }
    }
    let regex = builder
        .build()
        .map_err(|e| format!("invalid pcre '{pattern}': {e}"))?;

    Ok(PcreMatch {
        raw: value.to_string(),
        negated,
        regex,
    })
}
