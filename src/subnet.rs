use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr},
};

use rand::RngCore;

use crate::{config::ConfigError, iid, logger::Diagnostics, nat64::Nat64Prefix};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterfaceAddress {
    pub addr: Ipv6Addr,
    pub prefix_len: u32,
}

pub trait InterfaceAddresses {
    // Returns the first global IPv6 address of `interface`, if any.
    fn ipv6_address(&self, interface: &str) -> io::Result<Option<InterfaceAddress>>;
}

pub struct SystemInterfaces {}

impl SystemInterfaces {
    pub fn new() -> SystemInterfaces {
        SystemInterfaces {}
    }
}

impl InterfaceAddresses for SystemInterfaces {
    fn ipv6_address(&self, interface: &str) -> io::Result<Option<InterfaceAddress>> {
        let addr = get_if_addrs::get_if_addrs()?
            .into_iter()
            .filter(|iface| iface.name == interface && !iface.is_loopback())
            .find_map(|iface| match iface.addr {
                get_if_addrs::IfAddr::V6(addr) if !is_link_local(&addr.ip) => {
                    Some(InterfaceAddress {
                        addr: addr.ip,
                        prefix_len: u128::from(addr.netmask).leading_ones(),
                    })
                }
                _ => None,
            });
        Ok(addr)
    }
}

fn is_link_local(addr: &Ipv6Addr) -> bool {
    addr.segments()[0] & 0xffc0 == 0xfe80
}

/// Builds the local IPv6 address of the translator from the /64 prefix of `interface`.
///
/// The interface identifier is copied from `host_id`, or, if `host_id` is `::`, generated to be
/// checksum-neutral for `ipv4_local_subnet` and `plat_subnet`.
pub fn subnet_from_interface(
    interfaces: &dyn InterfaceAddresses,
    interface: &str,
    host_id: &Ipv6Addr,
    ipv4_local_subnet: &Ipv4Addr,
    plat_subnet: &Nat64Prefix,
    rng: &mut dyn RngCore,
    diagnostics: Diagnostics,
) -> Result<Ipv6Addr, ConfigError> {
    let interface_addr = match interfaces.ipv6_address(interface) {
        Ok(Some(addr)) => addr,
        Ok(None) => {
            diagnostics.fatal(format_args!(
                "unable to find an ipv6 ip on interface {}",
                interface
            ));
            return Err(ConfigError::NoInterfaceAddress(interface.to_string()));
        }
        Err(err) => {
            diagnostics.fatal(format_args!(
                "Failed to query addresses of interface {}: {}",
                interface, err
            ));
            return Err(err.into());
        }
    };
    if interface_addr.prefix_len != 64 {
        diagnostics.warn(format_args!(
            "{}/{} on {} is not a /64 prefix, using the first 64 bits",
            interface_addr.addr, interface_addr.prefix_len, interface
        ));
    }

    let addr = if host_id.is_unspecified() {
        iid::generate_checksum_neutral_iid(interface_addr.addr, ipv4_local_subnet, plat_subnet, rng)
    } else {
        iid::apply_host_id(interface_addr.addr, host_id)
    };
    diagnostics.info(format_args!("Using {} on {}", addr, interface));
    Ok(addr)
}

#[cfg(test)]
pub mod testing {
    use std::{collections::HashMap, io};

    use super::{InterfaceAddress, InterfaceAddresses};

    #[derive(Default)]
    pub struct FakeInterfaces {
        pub addresses: HashMap<String, InterfaceAddress>,
        pub fail: bool,
    }

    impl FakeInterfaces {
        pub fn with_address(interface: &str, addr: &str, prefix_len: u32) -> FakeInterfaces {
            let mut interfaces = FakeInterfaces::default();
            interfaces.set_address(interface, addr, prefix_len);
            interfaces
        }

        pub fn set_address(&mut self, interface: &str, addr: &str, prefix_len: u32) {
            let addr = InterfaceAddress {
                addr: addr.parse().unwrap(),
                prefix_len,
            };
            self.addresses.insert(interface.to_string(), addr);
        }
    }

    impl InterfaceAddresses for FakeInterfaces {
        fn ipv6_address(&self, interface: &str) -> io::Result<Option<InterfaceAddress>> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::Other, "netlink failure"));
            }
            Ok(self.addresses.get(interface).copied())
        }
    }
}
