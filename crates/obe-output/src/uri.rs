//! Output URI grammar (spec.md §6): `udp://HOST:PORT[?ttl=N&tos=N&
//! localport=N&iface=NAME&buffer_size=N&reuse=1]`. Hand-rolled parsing,
//! matching the byte-packing-by-hand style used throughout this
//! workspace rather than pulling in a general URL crate for four query
//! parameters.

use obe_core::descriptor::{FecType, OutputDescriptor, OutputType};

use crate::error::OutputError;

/// Parses an output URI into an `OutputDescriptor`, leaving FEC/ARQ/dup
/// fields at their defaults (those are configured separately, spec.md
/// §3, not part of the URI grammar).
pub fn parse_output_uri(uri: &str) -> Result<OutputDescriptor, OutputError> {
    let (scheme, rest) = uri.split_once("://").ok_or_else(|| OutputError::InvalidUri(uri.to_string()))?;
    let output_type = match scheme {
        "udp" => OutputType::Udp,
        "rtp" => OutputType::Rtp,
        other => return Err(OutputError::InvalidUri(format!("unsupported scheme {other}"))),
    };

    let (authority, query) = match rest.split_once('?') {
        Some((a, q)) => (a, Some(q)),
        None => (rest, None),
    };

    let (host, port_str) = authority.rsplit_once(':').ok_or_else(|| OutputError::InvalidUri(uri.to_string()))?;
    let host = host.trim_start_matches('[').trim_end_matches(']').to_string();
    let port: u16 = port_str.parse().map_err(|_| OutputError::InvalidUri(format!("bad port in {uri}")))?;

    let mut descriptor = OutputDescriptor { output_type, host, port, ..OutputDescriptor::default() };

    if let Some(query) = query {
        for pair in query.split('&') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "ttl" => descriptor.ttl = value.parse().map_err(|_| OutputError::InvalidUri(format!("bad ttl in {uri}")))?,
                "tos" => descriptor.tos = value.parse().map_err(|_| OutputError::InvalidUri(format!("bad tos in {uri}")))?,
                "localport" => descriptor.local_port = Some(value.parse().map_err(|_| OutputError::InvalidUri(format!("bad localport in {uri}")))?),
                "iface" => descriptor.interface = Some(value.to_string()),
                "buffer_size" => descriptor.buffer_size = Some(value.parse().map_err(|_| OutputError::InvalidUri(format!("bad buffer_size in {uri}")))?),
                "reuse" => descriptor.reuse = value == "1",
                "fec" => {
                    descriptor.fec_type = match value {
                        "cop3" => FecType::Cop3BlockAligned,
                        "cop3na" => FecType::Cop3NonBlockAligned,
                        "ldpc" => FecType::FecframeLdpcStaircase,
                        _ => FecType::None,
                    }
                }
                "fec_columns" => descriptor.fec_columns = value.parse().unwrap_or(0),
                "fec_rows" => descriptor.fec_rows = value.parse().unwrap_or(0),
                "dup_delay" => descriptor.dup_delay_us = value.parse().unwrap_or(0),
                "arq_latency" => descriptor.arq_latency_ms = value.parse().unwrap_or(0),
                _ => {}
            }
        }
    }

    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_port_and_query_options() {
        let d = parse_output_uri("udp://239.0.0.1:5000?ttl=32&tos=184&reuse=1&iface=eth0").unwrap();
        assert_eq!(d.host, "239.0.0.1");
        assert_eq!(d.port, 5000);
        assert_eq!(d.ttl, 32);
        assert_eq!(d.tos, 184);
        assert!(d.reuse);
        assert_eq!(d.interface.as_deref(), Some("eth0"));
    }

    #[test]
    fn bare_host_port_uses_defaults() {
        let d = parse_output_uri("udp://10.0.0.5:6000").unwrap();
        assert_eq!(d.port, 6000);
        assert_eq!(d.ttl, OutputDescriptor::default().ttl);
    }

    #[test]
    fn rejects_missing_scheme() {
        assert!(parse_output_uri("239.0.0.1:5000").is_err());
    }
}
