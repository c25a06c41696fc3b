//! Address handling and the DNS SRV pre-stage shared by the probes.

use std::fmt;
use std::future::Future;
use std::net::IpAddr;
use std::sync::OnceLock;
use std::time::Duration;

use hickory_resolver::{
    config::{ResolverConfig, ResolverOpts},
    TokioAsyncResolver,
};

use crate::{response::SrvRecord, Error};

/// The default port used by Java Edition servers, RCON and the query
/// listener.
pub const DEFAULT_JAVA_PORT: u16 = 25565;

/// The default port used by Bedrock Edition servers.
pub const DEFAULT_BEDROCK_PORT: u16 = 19132;

/// The transport label used in the SRV owner name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrvProtocol {
    Tcp,
    Udp,
}

impl fmt::Display for SrvProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => f.write_str("tcp"),
            Self::Udp => f.write_str("udp"),
        }
    }
}

fn new_resolver() -> TokioAsyncResolver {
    let config = ResolverConfig::cloudflare();
    let mut opts = ResolverOpts::default();
    opts.cache_size = 64;
    opts.attempts = 3;
    TokioAsyncResolver::tokio(config, opts)
}

fn resolver() -> &'static TokioAsyncResolver {
    static RESOLVER: OnceLock<TokioAsyncResolver> = OnceLock::new();
    RESOLVER.get_or_init(new_resolver)
}

/// Resolves the Minecraft SRV record of a domain, returning the first
/// record or `None` when the domain has none.
///
/// # Errors
///
/// Returns [`Error::DnsLookupFailed`] when the resolver itself fails.
pub async fn lookup_srv(protocol: SrvProtocol, host: &str) -> Result<Option<SrvRecord>, Error> {
    let name = format!("_minecraft._{protocol}.{host}.");

    match resolver().srv_lookup(name).await {
        Ok(records) => Ok(records.iter().next().map(|record| SrvRecord {
            host: record.target().to_utf8().trim_end_matches('.').to_owned(),
            port: record.port(),
        })),
        Err(_) => Err(Error::DnsLookupFailed),
    }
}

/// The SRV pre-stage: attempted only when lookups are enabled, the caller
/// kept the protocol default port, and the host is not an IP literal.
/// Lookup failures fall through silently.
pub(crate) async fn resolve_srv(
    protocol: SrvProtocol,
    host: &str,
    port: u16,
    default_port: u16,
    enabled: bool,
) -> Option<SrvRecord> {
    if !enabled || port != default_port || host.parse::<IpAddr>().is_ok() {
        return None;
    }

    lookup_srv(protocol, host).await.ok().flatten()
}

/// Parses the host and port out of an address string. The port is `None`
/// when the string does not carry one.
///
/// # Errors
///
/// Returns [`Error::InvalidAddress`] for malformed bracketed hosts or
/// unparsable ports.
pub fn parse_address(address: &str) -> Result<(String, Option<u16>), Error> {
    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or(Error::InvalidAddress)?;

        if tail.is_empty() {
            return Ok((host.to_owned(), None));
        }

        let port = tail.strip_prefix(':').ok_or(Error::InvalidAddress)?;
        return Ok((
            host.to_owned(),
            Some(port.parse().map_err(|_| Error::InvalidAddress)?),
        ));
    }

    match address.rsplit_once(':') {
        // More than one colon without brackets is a bare IPv6 literal.
        Some((host, _)) if host.contains(':') => Ok((address.to_owned(), None)),
        Some((host, port)) => Ok((
            host.to_owned(),
            Some(port.parse().map_err(|_| Error::InvalidAddress)?),
        )),
        None => Ok((address.to_owned(), None)),
    }
}

/// Runs a protocol phase under the caller's deadline.
pub(crate) async fn timed<T, E>(
    limit: Duration,
    future: impl Future<Output = Result<T, E>>,
) -> Result<T, Error>
where
    E: Into<Error>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(Error::DeadlineExceeded),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_address;
    use crate::Error;

    #[test]
    fn splits_host_and_port() {
        assert_eq!(
            parse_address("play.example.com:25566").unwrap(),
            ("play.example.com".to_owned(), Some(25566))
        );
        assert_eq!(
            parse_address("play.example.com").unwrap(),
            ("play.example.com".to_owned(), None)
        );
    }

    #[test]
    fn handles_ipv6_literals() {
        assert_eq!(
            parse_address("[2001:db8::1]:25565").unwrap(),
            ("2001:db8::1".to_owned(), Some(25565))
        );
        assert_eq!(
            parse_address("[2001:db8::1]").unwrap(),
            ("2001:db8::1".to_owned(), None)
        );
        assert_eq!(
            parse_address("2001:db8::1").unwrap(),
            ("2001:db8::1".to_owned(), None)
        );
    }

    #[test]
    fn rejects_bad_ports() {
        assert!(matches!(
            parse_address("example.com:notaport"),
            Err(Error::InvalidAddress)
        ));
        assert!(matches!(
            parse_address("example.com:70000"),
            Err(Error::InvalidAddress)
        ));
        assert!(matches!(
            parse_address("[2001:db8::1]x"),
            Err(Error::InvalidAddress)
        ));
    }
}
