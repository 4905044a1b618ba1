// src/parser.rs

use crate::error::ParseError;

/// All-zero addresses the modem uses for "unassigned".
pub const IPV4_SENTINEL: &str = "0.0.0.0";
pub const IPV6_SENTINEL: &str = "0:0:0:0:0:0:0:0";

const CGACT_PREFIX: &str = "+CGACT:";
const CGPADDR_PREFIX: &str = "+CGPADDR:";
const XDNS_PREFIX: &str = "+XDNS:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdpContextActive {
    pub cid: u32,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressParseResult {
    pub cid: u32,
    pub ipv4: Option<String>,
    pub ipv6: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsParseResult {
    pub ipv4: Vec<String>,
    pub ipv6: Vec<String>,
}

/// One comma separated field of a reply line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field<'a> {
    Bare(&'a str),
    Quoted(&'a str),
}

impl<'a> Field<'a> {
    fn quoted(self) -> Option<&'a str> {
        match self {
            Field::Quoted(s) => Some(s),
            Field::Bare(_) => None,
        }
    }

    fn as_uint(self) -> Option<u32> {
        match self {
            Field::Bare(s) => s.parse().ok(),
            Field::Quoted(_) => None,
        }
    }
}

/// Splits `1, "a,b" ,2` into fields. Commas inside quotes don't split.
/// Returns `None` on an unterminated quote or garbage after a closing quote.
fn split_fields(line: &str) -> Option<Vec<Field<'_>>> {
    let mut fields = Vec::new();
    let mut rest = line.trim();

    if rest.is_empty() {
        return Some(fields);
    }

    loop {
        rest = rest.trim_start();
        let (field, tail) = if let Some(inner) = rest.strip_prefix('"') {
            let end = inner.find('"')?;
            let tail = inner[end + 1..].trim_start();
            if !tail.is_empty() && !tail.starts_with(',') {
                return None;
            }
            (Field::Quoted(&inner[..end]), tail)
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            (Field::Bare(rest[..end].trim_end()), &rest[end..])
        };
        fields.push(field);

        match tail.strip_prefix(',') {
            Some(next) => rest = next,
            None => return Some(fields),
        }
    }
}

/// Record lines of a reply with the `+CMD:` prefix removed.
///
/// When any line carries `prefix`, only those lines are records and anything
/// else (unsolicited `+CREG:` lines, say) is skipped. Otherwise every
/// non-blank line is taken as a bare record.
fn record_lines<'a>(reply: &'a str, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    let lines = move || reply.lines().map(str::trim).filter(|line| !line.is_empty());
    let prefixed = lines().any(|line| line.starts_with(prefix));

    lines().filter_map(move |line| match line.strip_prefix(prefix) {
        Some(record) => Some(record.trim()),
        None if prefixed => None,
        None => Some(line),
    })
}

fn is_ipv6(addr: &str) -> bool {
    addr.contains(':')
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|existing| existing == value) {
        list.push(value.to_string());
    }
}

/// Parses a `+CGACT?` reply into the list of context activation states.
pub fn parse_cgact_read_response(reply: &str) -> Result<Vec<PdpContextActive>, ParseError> {
    record_lines(reply, CGACT_PREFIX)
        .map(|line| {
            let malformed = || ParseError::Malformed {
                command: "+CGACT",
                line: line.to_string(),
            };
            let fields = split_fields(line).ok_or_else(malformed)?;
            match fields.as_slice() {
                [cid, state] => {
                    let cid = cid.as_uint().ok_or(ParseError::InvalidCid("+CGACT"))?;
                    let active = match state.as_uint() {
                        Some(0) => false,
                        Some(1) => true,
                        _ => return Err(malformed()),
                    };
                    Ok(PdpContextActive { cid, active })
                }
                _ => Err(malformed()),
            }
        })
        .collect()
}

/// Parses a `+CGPADDR=<cid>` reply: `<cid>,"<addr1>"[,"<addr2>"]`.
///
/// `addr1` may be of either family, `addr2` is only ever IPv6 and wins over
/// an IPv6 `addr1`. Sentinel addresses are dropped; if nothing is left the
/// reply is rejected.
pub fn parse_cgpaddr_response(reply: &str) -> Result<AddressParseResult, ParseError> {
    let line = record_lines(reply, CGPADDR_PREFIX)
        .next()
        .ok_or(ParseError::NoValidAddress)?;

    let (cid_text, addresses) = line.split_once(',').unwrap_or((line, ""));
    let cid = cid_text
        .trim()
        .parse::<u32>()
        .map_err(|_| ParseError::InvalidCid("+CGPADDR"))?;

    let fields = split_fields(addresses).unwrap_or_default();
    let mut quoted = fields.into_iter().map(Field::quoted);
    let addr1 = quoted.next().flatten();
    let addr2 = quoted.next().flatten();

    let mut ipv4 = None;
    let mut ipv6 = None;

    if let Some(addr) = addr1 {
        if is_ipv6(addr) {
            if addr != IPV6_SENTINEL {
                ipv6 = Some(addr.to_string());
            }
        } else if addr != IPV4_SENTINEL {
            ipv4 = Some(addr.to_string());
        }
    }

    if let Some(addr) = addr2 {
        if is_ipv6(addr) && addr != IPV6_SENTINEL {
            ipv6 = Some(addr.to_string());
        }
    }

    if ipv4.is_none() && ipv6.is_none() {
        return Err(ParseError::NoValidAddress);
    }

    Ok(AddressParseResult { cid, ipv4, ipv6 })
}

/// Parses a `+XDNS?` reply, keeping only the records of `cid`.
///
/// Lines that are not records (a trailing `OK`, say) are skipped. The IPv6
/// lists are not sentinel-filtered; callers see an all-zero IPv6 DNS when the
/// network assigned none.
pub fn parse_xdns_query_response(reply: &str, cid: u32) -> Result<DnsParseResult, ParseError> {
    let mut result = DnsParseResult::default();

    for raw in reply.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some(line) = raw.strip_prefix(XDNS_PREFIX).map(str::trim).or_else(|| {
            raw.starts_with(|c: char| c.is_ascii_digit()).then_some(raw)
        }) else {
            continue;
        };

        let malformed = || ParseError::Malformed {
            command: "+XDNS",
            line: raw.to_string(),
        };
        let fields = split_fields(line).ok_or_else(malformed)?;
        let this_cid = fields
            .first()
            .and_then(|f| f.as_uint())
            .ok_or(ParseError::InvalidCid("+XDNS"))?;
        if this_cid != cid {
            continue;
        }

        let (Some(dns1), Some(dns2)) = (
            fields.get(1).and_then(|f| f.quoted()),
            fields.get(2).and_then(|f| f.quoted()),
        ) else {
            return Err(malformed());
        };

        for dns in [dns1, dns2] {
            if is_ipv6(dns) {
                push_unique(&mut result.ipv6, dns);
            } else if dns != IPV4_SENTINEL {
                push_unique(&mut result.ipv4, dns);
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_fields_handles_quotes_and_spaces() {
        let fields = split_fields(r#"1, "a,b" ,2"#).unwrap();
        assert_eq!(
            fields,
            vec![Field::Bare("1"), Field::Quoted("a,b"), Field::Bare("2")]
        );
    }

    #[test]
    fn split_fields_rejects_unterminated_quote() {
        assert!(split_fields(r#"1,"abc"#).is_none());
        assert!(split_fields(r#"1,"abc"x"#).is_none());
    }
}
