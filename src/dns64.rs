use std::{
    error, fmt, io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    time::Duration,
};

use log::debug;
use tokio::runtime;

use crate::{
    logger::Diagnostics,
    nat64::Nat64Prefix,
    shutdown::{CancelToken, Sleeper},
};

// As defined in RFC 7050, Section 2.1.
pub const DEFAULT_DNS64_DETECTION_HOSTNAME: &str = "ipv4only.arpa";

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(120);

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

// Well-Known IPv4-only addresses, RFC 7050, Section 2.2.
const WELL_KNOWN_IPV4: [Ipv4Addr; 2] = [
    Ipv4Addr::new(192, 0, 0, 170),
    Ipv4Addr::new(192, 0, 0, 171),
];

// Network scope for PLAT discovery; how it's applied is up to the resolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetId(pub u32);

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "netId {}", self.0)
    }
}

pub trait PlatResolver {
    fn plat_prefix(
        &mut self,
        hostname: &str,
        net_id: Option<NetId>,
    ) -> Result<Nat64Prefix, Dns64Error>;
}

pub enum DetectionStep {
    Found(Nat64Prefix),
    Retry(Duration),
}

// PLAT prefix discovery. Resolver failures are never final: every failure schedules a retry with
// exponential backoff, capped at MAX_BACKOFF.
pub struct Dns64Detection<'a> {
    hostname: &'a str,
    net_id: Option<NetId>,
    backoff: Duration,
}

impl<'a> Dns64Detection<'a> {
    pub fn new(hostname: &'a str, net_id: Option<NetId>) -> Dns64Detection<'a> {
        Dns64Detection {
            hostname,
            net_id,
            backoff: INITIAL_BACKOFF,
        }
    }

    pub fn attempt(
        &mut self,
        resolver: &mut dyn PlatResolver,
        diagnostics: Diagnostics,
    ) -> DetectionStep {
        match resolver.plat_prefix(self.hostname, self.net_id) {
            Ok(prefix) => {
                diagnostics.info(format_args!(
                    "Detected NAT64 prefix {}/96 using {}",
                    prefix, self.hostname
                ));
                DetectionStep::Found(prefix)
            }
            Err(err) => {
                let delay = self.backoff;
                diagnostics.warn(format_args!(
                    "dns64_detection -- error ({}), sleeping for {} seconds",
                    err,
                    delay.as_secs()
                ));
                self.backoff = (self.backoff * 2).min(MAX_BACKOFF);
                DetectionStep::Retry(delay)
            }
        }
    }

    // Blocks until a prefix is discovered. Returns None only if `cancel` was triggered.
    pub fn run(
        mut self,
        resolver: &mut dyn PlatResolver,
        sleeper: &mut dyn Sleeper,
        cancel: Option<&CancelToken>,
        diagnostics: Diagnostics,
    ) -> Option<Nat64Prefix> {
        loop {
            if cancel.is_some_and(|cancel| cancel.is_cancelled()) {
                diagnostics.info(format_args!("dns64_detection -- cancelled"));
                return None;
            }
            match self.attempt(resolver, diagnostics) {
                DetectionStep::Found(prefix) => return Some(prefix),
                DetectionStep::Retry(delay) => sleeper.sleep(delay),
            }
        }
    }
}

// Picks the PLAT prefix from the AAAA records of the discovery name.
// Records with a well-known IPv4 suffix are preferred; otherwise, the first record is used.
pub fn select_plat_prefix(addrs: &[Ipv6Addr]) -> Option<Nat64Prefix> {
    addrs
        .iter()
        .find(|addr| {
            let octets = addr.octets();
            let suffix = Ipv4Addr::new(octets[12], octets[13], octets[14], octets[15]);
            WELL_KNOWN_IPV4.contains(&suffix)
        })
        .or_else(|| addrs.first())
        .map(|addr| Nat64Prefix::new(*addr))
}

// Resolves the discovery name through the system resolver.
pub struct SystemResolver<'a> {
    rt: &'a runtime::Runtime,
}

impl SystemResolver<'_> {
    pub fn new(rt: &runtime::Runtime) -> SystemResolver<'_> {
        SystemResolver { rt }
    }
}

impl PlatResolver for SystemResolver<'_> {
    fn plat_prefix(
        &mut self,
        hostname: &str,
        net_id: Option<NetId>,
    ) -> Result<Nat64Prefix, Dns64Error> {
        if let Some(net_id) = net_id {
            debug!(
                "System resolver has no per-network routing, ignoring {}",
                net_id
            );
        }
        // Use a predefined port just in case.
        let lookup = tokio::time::timeout(LOOKUP_TIMEOUT, tokio::net::lookup_host((hostname, 0)));
        let addrs = match self.rt.block_on(lookup) {
            Ok(addrs) => addrs?,
            Err(_) => return Err("DNS lookup timed out".into()),
        };
        let addrs = addrs
            .filter_map(|addr| match addr.ip() {
                IpAddr::V6(addr) => Some(addr),
                IpAddr::V4(_) => None,
            })
            .collect::<Vec<_>>();
        debug!("plat_prefix/dns({}) returned {:?}", hostname, addrs);
        select_plat_prefix(&addrs).ok_or_else(|| "No IPv6 addresses in response".into())
    }
}

#[derive(Debug)]
pub enum Dns64Error {
    Internal(&'static str),
    Io(io::Error),
}

impl fmt::Display for Dns64Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Internal(msg) => f.write_str(msg),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl error::Error for Dns64Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Internal(_msg) => None,
            Self::Io(err) => Some(err),
        }
    }
}

impl From<&'static str> for Dns64Error {
    fn from(msg: &'static str) -> Dns64Error {
        Self::Internal(msg)
    }
}

impl From<io::Error> for Dns64Error {
    fn from(err: io::Error) -> Dns64Error {
        Self::Io(err)
    }
}
