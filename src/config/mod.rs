use std::{
    error, fmt, io,
    net::{Ipv4Addr, Ipv6Addr},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use rand::RngCore;

use crate::{
    dns64::{self, Dns64Detection, NetId, PlatResolver},
    logger::Diagnostics,
    nat64::{self, Nat64Prefix},
    shutdown::{CancelToken, Sleeper},
    subnet::{self, InterfaceAddresses},
};

pub mod file;
pub mod items;

use file::{ConfigFile, ConfigSource};
use items::ConfigItems;

// RFC 7335 IPv4 Service Continuity Prefix.
const DEFAULT_IPV4_LOCAL_SUBNET: &str = "192.0.0.4";

/// Addresses and prefixes used by the translator.
///
/// A configuration is only built if every item is valid, and is never modified afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClatConfig {
    pub uplink_interface: String,
    // -1 means "not set".
    pub mtu: i16,
    pub ipv4_mtu: i16,
    pub ipv4_local_subnet: Ipv4Addr,
    pub ipv6_local_subnet: Ipv6Addr,
    pub plat_subnet: Nat64Prefix,
    pub ipv6_host_id: Ipv6Addr,
    // Only set if the PLAT prefix was discovered through DNS64.
    pub plat_hostname: Option<String>,
    pub net_id: Option<NetId>,
}

impl ClatConfig {
    // Checks if the uplink interface no longer has an address in ipv6_local_subnet.
    pub fn interface_prefix_changed(
        &self,
        interfaces: &dyn InterfaceAddresses,
    ) -> io::Result<bool> {
        let changed = match interfaces.ipv6_address(&self.uplink_interface)? {
            Some(current) => !nat64::ipv6_prefix_equal(&current.addr, &self.ipv6_local_subnet),
            None => true,
        };
        Ok(changed)
    }
}

impl fmt::Display for ClatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <-> {} on {}, PLAT prefix {}/96",
            self.ipv4_local_subnet,
            self.ipv6_local_subnet,
            self.uplink_interface,
            self.plat_subnet
        )
    }
}

pub struct LoadRequest<'a> {
    pub config_file: &'a Path,
    pub uplink_interface: &'a str,
    // Overrides plat_from_dns64 and plat_subnet.
    pub plat_prefix: Option<&'a str>,
    pub net_id: Option<NetId>,
}

// Collaborators used while loading the configuration.
pub struct Environment<'a> {
    pub resolver: &'a mut dyn PlatResolver,
    pub interfaces: &'a dyn InterfaceAddresses,
    pub sleeper: &'a mut dyn Sleeper,
    pub rng: &'a mut dyn RngCore,
    pub cancel: Option<&'a CancelToken>,
    pub diagnostics: Diagnostics<'a>,
}

pub fn load(request: &LoadRequest, env: &mut Environment) -> Result<ClatConfig, ConfigError> {
    let source = ConfigFile::read(request.config_file);
    if source.is_empty() {
        env.diagnostics.fatal(format_args!(
            "Could not read config file {}",
            request.config_file.display()
        ));
        return Err(ConfigError::ConfigFileUnreadable(
            request.config_file.to_path_buf(),
        ));
    }
    load_from_source(request, &source, env)
}

pub fn load_from_source(
    request: &LoadRequest,
    source: &dyn ConfigSource,
    env: &mut Environment,
) -> Result<ClatConfig, ConfigError> {
    let items = ConfigItems::new(source, env.diagnostics);
    let uplink_interface = request.uplink_interface.to_string();

    let mtu = items.int16("mtu", Some("-1"))?;
    let ipv4_mtu = items.int16("ipv4mtu", Some("-1"))?;
    let ipv4_local_subnet = items.ipv4("ipv4_local_subnet", Some(DEFAULT_IPV4_LOCAL_SUBNET))?;

    let (plat_subnet, plat_hostname) = resolve_plat_prefix(&items, request, env)?;

    let ipv6_host_id = items.ipv6("ipv6_host_id", Some("::"))?;
    let ipv6_local_subnet = subnet::subnet_from_interface(
        env.interfaces,
        &uplink_interface,
        &ipv6_host_id,
        &ipv4_local_subnet,
        &plat_subnet,
        env.rng,
        env.diagnostics,
    )?;

    Ok(ClatConfig {
        uplink_interface,
        mtu,
        ipv4_mtu,
        ipv4_local_subnet,
        ipv6_local_subnet,
        plat_subnet,
        ipv6_host_id,
        plat_hostname,
        net_id: request.net_id,
    })
}

fn resolve_plat_prefix(
    items: &ConfigItems,
    request: &LoadRequest,
    env: &mut Environment,
) -> Result<(Nat64Prefix, Option<String>), ConfigError> {
    if let Some(plat_prefix) = request.plat_prefix {
        return match Nat64Prefix::from_str(plat_prefix) {
            Ok(prefix) => Ok((prefix, None)),
            Err(_) => {
                env.diagnostics.fatal(format_args!(
                    "invalid IPv6 address specified for plat prefix: {}",
                    plat_prefix
                ));
                Err(ConfigError::InvalidAddress(
                    "plat_prefix",
                    plat_prefix.to_string(),
                ))
            }
        };
    }

    if !items.flag("plat_from_dns64", Some("yes"))? {
        return match items.ipv6("plat_subnet", None) {
            Ok(plat_subnet) => Ok((Nat64Prefix::new(plat_subnet), None)),
            Err(err) => {
                env.diagnostics.fatal(format_args!(
                    "plat_from_dns64 disabled, but no plat_subnet specified"
                ));
                Err(err)
            }
        };
    }

    let hostname = items.string(
        "plat_from_dns64_hostname",
        Some(dns64::DEFAULT_DNS64_DETECTION_HOSTNAME),
    )?;
    let detection = Dns64Detection::new(&hostname, request.net_id);
    match detection.run(env.resolver, env.sleeper, env.cancel, env.diagnostics) {
        Some(prefix) => Ok((prefix, Some(hostname))),
        None => {
            env.diagnostics
                .fatal(format_args!("PLAT prefix discovery was cancelled"));
            Err(ConfigError::Cancelled)
        }
    }
}

pub fn dump(config: &ClatConfig, diagnostics: Diagnostics) {
    diagnostics.debug(format_args!("mtu = {}", config.mtu));
    diagnostics.debug(format_args!("ipv4mtu = {}", config.ipv4_mtu));
    diagnostics.debug(format_args!(
        "ipv6_local_subnet = {}",
        config.ipv6_local_subnet
    ));
    diagnostics.debug(format_args!(
        "ipv4_local_subnet = {}",
        config.ipv4_local_subnet
    ));
    diagnostics.debug(format_args!("plat_subnet = {}", config.plat_subnet));
    if let Some(hostname) = &config.plat_hostname {
        diagnostics.debug(format_args!("plat_from_dns64_hostname = {}", hostname));
    }
    if let Some(net_id) = config.net_id {
        diagnostics.debug(format_args!("net_id = {}", net_id.0));
    }
    diagnostics.debug(format_args!(
        "default_pdp_interface = {}",
        config.uplink_interface
    ));
}

// Holds the active configuration. A new configuration replaces the active one only if it loads
// successfully.
#[derive(Default)]
pub struct ConfigSlot {
    current: Option<Arc<ClatConfig>>,
}

impl ConfigSlot {
    pub fn new() -> ConfigSlot {
        ConfigSlot::default()
    }

    pub fn load(
        &mut self,
        request: &LoadRequest,
        env: &mut Environment,
    ) -> Result<Arc<ClatConfig>, ConfigError> {
        let config = Arc::new(load(request, env)?);
        self.current = Some(config.clone());
        Ok(config)
    }

    pub fn current(&self) -> Option<Arc<ClatConfig>> {
        self.current.clone()
    }

    pub fn release(&mut self) {
        self.current = None;
    }
}

#[derive(Debug)]
pub enum ConfigError {
    MissingConfiguration(&'static str),
    NotNumeric(&'static str, String),
    OutOfRange(&'static str, i64),
    InvalidAddress(&'static str, String),
    NoInterfaceAddress(String),
    ConfigFileUnreadable(PathBuf),
    Cancelled,
    Io(io::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MissingConfiguration(name) => write!(f, "Missing config item {}", name),
            Self::NotNumeric(name, value) => {
                write!(f, "Config item {} is not numeric: {}", name, value)
            }
            Self::OutOfRange(name, value) => {
                write!(f, "Config item {} is out of range: {}", name, value)
            }
            Self::InvalidAddress(name, value) => {
                write!(f, "Invalid address specified for {}: {}", name, value)
            }
            Self::NoInterfaceAddress(interface) => {
                write!(f, "No IPv6 address on interface {}", interface)
            }
            Self::ConfigFileUnreadable(path) => {
                write!(f, "Could not read config file {}", path.display())
            }
            Self::Cancelled => f.write_str("Configuration loading was cancelled"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> ConfigError {
        Self::Io(err)
    }
}
