use std::{
    fmt,
    net::{AddrParseError, Ipv4Addr, Ipv6Addr},
    ops::Deref,
    str::FromStr,
};

// A /96 NAT64 (PLAT) prefix; remote IPv4 addresses are embedded into the last 32 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nat64Prefix([u8; 12]);

impl Nat64Prefix {
    pub fn new(prefix: Ipv6Addr) -> Nat64Prefix {
        let mut prefix_octets = [0u8; 12];
        prefix_octets[0..12].copy_from_slice(&prefix.octets()[0..12]);
        Nat64Prefix(prefix_octets)
    }

    pub fn map_ipv4(&self, addr: &Ipv4Addr) -> Ipv6Addr {
        let mut segments = [0u8; 16];
        segments[0..12].copy_from_slice(&self.0);
        segments[12..16].copy_from_slice(&addr.octets());
        segments.into()
    }

    pub fn addr(&self) -> Ipv6Addr {
        self.map_ipv4(&Ipv4Addr::UNSPECIFIED)
    }
}

impl Deref for Nat64Prefix {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromStr for Nat64Prefix {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Nat64Prefix, AddrParseError> {
        Ipv6Addr::from_str(s).map(Nat64Prefix::new)
    }
}

impl fmt::Display for Nat64Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.addr().fmt(f)
    }
}

/// Compares the /64 prefixes of two IPv6 addresses.
pub fn ipv6_prefix_equal(a1: &Ipv6Addr, a2: &Ipv6Addr) -> bool {
    a1.octets()[..8] == a2.octets()[..8]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discards_embedded_ipv4() {
        let prefix = Nat64Prefix::new("64:ff9b::c000:221".parse().unwrap());
        assert_eq!(prefix.addr(), "64:ff9b::".parse::<Ipv6Addr>().unwrap());
        assert_eq!(prefix.to_string(), "64:ff9b::");
    }

    #[test]
    fn maps_ipv4() {
        let prefix: Nat64Prefix = "2001:db8:64::".parse().unwrap();
        assert_eq!(
            prefix.map_ipv4(&Ipv4Addr::new(192, 0, 2, 33)),
            "2001:db8:64::c000:221".parse::<Ipv6Addr>().unwrap()
        );
    }

    #[test]
    fn rejects_malformed_prefix() {
        assert!("64:ff9b::/96".parse::<Nat64Prefix>().is_err());
        assert!("192.0.2.1".parse::<Nat64Prefix>().is_err());
        assert!("".parse::<Nat64Prefix>().is_err());
    }

    #[test]
    fn prefix_equal_ignores_iid() {
        let a1: Ipv6Addr = "2001:db8:1:2:aaaa:bbbb:cccc:dddd".parse().unwrap();
        let a2: Ipv6Addr = "2001:db8:1:2::1".parse().unwrap();
        assert!(ipv6_prefix_equal(&a1, &a2));
        assert!(ipv6_prefix_equal(&a2, &a1));
    }

    #[test]
    fn prefix_equal_detects_any_difference() {
        let base: Ipv6Addr = "2001:db8:1:2::1".parse().unwrap();
        for i in 0..8 {
            let mut octets = base.octets();
            octets[i] ^= 0x01;
            assert!(!ipv6_prefix_equal(&base, &Ipv6Addr::from(octets)));
        }
        for i in 8..16 {
            let mut octets = base.octets();
            octets[i] ^= 0xff;
            assert!(ipv6_prefix_equal(&base, &Ipv6Addr::from(octets)));
        }
    }
}
