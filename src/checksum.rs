use std::ops;

// Ones' complement checksum arithmetic, as used by IP pseudo-headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checksum(u32);

impl Checksum {
    pub fn from_slice(data: &[u8]) -> Checksum {
        let mut checksum = Checksum(0);
        checksum.add_slice(data);
        checksum
    }

    #[inline]
    pub fn fold(&mut self) {
        let mut sum = self.0;
        // Two rounds are enough for any u32 that add_slice can produce.
        sum = (sum >> 16) + (sum & 0x0000ffffu32);
        sum = (sum >> 16) + (sum & 0x0000ffffu32);
        self.0 = sum;
    }

    pub fn add_slice(&mut self, add: &[u8]) {
        let mut iter = add.chunks_exact(2);
        let full_sum = iter
            .by_ref()
            .map(|bytes| ((bytes[0] as u32) << 8) | (bytes[1] as u32))
            .sum::<u32>();
        let remain_sum = match *iter.remainder() {
            [high] => (high as u32) << 8,
            [] => 0u32,
            _ => unreachable!("chunks_exact returned unexpected remainder size"),
        };

        self.0 += full_sum + remain_sum;
    }

    // Folded 16-bit running sum, without the final inversion.
    pub fn folded(&self) -> u16 {
        let mut checksum = *self;
        checksum.fold();
        (checksum.0 & 0x0000ffff) as u16
    }

    // Returns the updated checksum field after the covered data changed from `old_sum` to
    // `new_sum`, as in RFC 1624, Section 3 (Eqn. 3), with an end-around borrow.
    // For a plain data field the roles swap: passing the target sum as `old_sum` and the current
    // sum as `new_sum` returns the field value that moves the current sum to the target.
    pub fn adjust(field: u16, old_sum: Checksum, new_sum: Checksum) -> u16 {
        let folded_sum = Checksum((!field) as u32 + new_sum.0).folded();
        let folded_old = old_sum.folded();
        if folded_sum > folded_old {
            !(folded_sum - folded_old)
        } else {
            !(folded_sum.wrapping_sub(folded_old).wrapping_sub(1))
        }
    }
}

impl ops::Add for Checksum {
    type Output = Checksum;

    fn add(self, other: Checksum) -> Checksum {
        Checksum(self.0 + other.0)
    }
}
