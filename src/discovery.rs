//! Discovery of the host's own resolvers from `resolv.conf`.

use std::net::IpAddr;
use std::path::Path;
use tracing::{debug, warn};

/// Default location of the system resolver configuration.
pub const DEFAULT_RESOLV_CONF: &str = "/etc/resolv.conf";

/// Extract `nameserver` addresses from resolv.conf text.
///
/// Anything after `#` is ignored. Addresses are returned verbatim, in file order.
pub fn parse_resolv_conf(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let line = line.split('#').next().unwrap_or_default();
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some("nameserver"), Some(address)) => Some(address.to_string()),
                _ => None,
            }
        })
        .collect()
}

/// Read `path` and return the resolvers it lists that parse as IP addresses.
pub fn discover(path: &Path) -> std::io::Result<Vec<IpAddr>> {
    let text = std::fs::read_to_string(path)?;

    let addresses = parse_resolv_conf(&text)
        .into_iter()
        .filter_map(|raw| match raw.parse::<IpAddr>() {
            Ok(ip) => Some(ip),
            Err(_) => {
                warn!(address = %raw, path = %path.display(), "skipping unparsable system resolver");
                None
            }
        })
        .collect::<Vec<_>>();

    debug!(count = addresses.len(), path = %path.display(), "discovered system resolvers");
    Ok(addresses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_strips_comments() {
        let text = "nameserver 8.8.8.8\n# nameserver 1.1.1.1\nnameserver 9.9.9.9  # comment\n";
        assert_eq!(parse_resolv_conf(text), ["8.8.8.8", "9.9.9.9"]);
    }

    #[test]
    fn test_parse_ignores_other_directives() {
        let text = "search example.com\noptions edns0\nnameserver\n  nameserver 127.0.0.53\n";
        assert_eq!(parse_resolv_conf(text), ["127.0.0.53"]);
    }

    #[test]
    fn test_discover_skips_scoped_addresses() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "nameserver 10.0.0.2").unwrap();
        writeln!(file, "nameserver fe80::1%eth0").unwrap();
        writeln!(file, "nameserver 2001:db8::53").unwrap();

        let found = discover(file.path()).unwrap();
        assert_eq!(
            found,
            vec![
                "10.0.0.2".parse::<IpAddr>().unwrap(),
                "2001:db8::53".parse::<IpAddr>().unwrap()
            ]
        );
    }

    #[test]
    fn test_discover_missing_file() {
        assert!(discover(Path::new("/nonexistent/resolv.conf")).is_err());
    }
}
