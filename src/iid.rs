use std::net::{Ipv4Addr, Ipv6Addr};

use rand::RngCore;

use crate::{checksum::Checksum, nat64::Nat64Prefix};

// Octets 11 and 12 (bits 88-103) are adjusted to make the address checksum-neutral.
const ADJUSTABLE_FIELD: usize = 11;

/// Replaces the interface identifier (low 64 bits) of `addr` with random bits, adjusted so that
///
///   checksum(local IPv4) == checksum(local IPv6 | NAT64 prefix)
///
/// Since the remote IPv6 address is the NAT64 prefix followed by the remote IPv4 address, this
/// makes checksum(local IPv4 | remote IPv4) == checksum(local IPv6 | remote IPv6), and transport
/// checksums don't need to be updated when translating pseudo-headers.
pub fn generate_checksum_neutral_iid(
    addr: Ipv6Addr,
    ipv4_local_subnet: &Ipv4Addr,
    plat_subnet: &Nat64Prefix,
    rng: &mut dyn RngCore,
) -> Ipv6Addr {
    let mut octets = addr.octets();
    rng.fill_bytes(&mut octets[8..16]);

    // The field straddles two 16-bit words, so in a big-endian sum its bytes are swapped.
    let old_field = u16::from_le_bytes([octets[ADJUSTABLE_FIELD], octets[ADJUSTABLE_FIELD + 1]]);

    let c1 = Checksum::from_slice(&ipv4_local_subnet.octets());
    let c2 = Checksum::from_slice(plat_subnet) + Checksum::from_slice(&octets);

    let new_field = Checksum::adjust(old_field, c1, c2);
    octets[ADJUSTABLE_FIELD..ADJUSTABLE_FIELD + 2].copy_from_slice(&new_field.to_le_bytes());
    octets.into()
}

/// Replaces the interface identifier of `addr` with the one from `host_id`.
pub fn apply_host_id(addr: Ipv6Addr, host_id: &Ipv6Addr) -> Ipv6Addr {
    let mut octets = addr.octets();
    octets[8..16].copy_from_slice(&host_id.octets()[8..16]);
    octets.into()
}
