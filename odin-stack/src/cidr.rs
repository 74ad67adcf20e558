//! IPv4 CIDR blocks and sequential subnet allocation

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CidrError {
    #[error("Invalid CIDR '{0}'")]
    Parse(String),

    #[error("CIDR '{0}' has host bits set")]
    HostBitsSet(String),

    #[error("Cannot carve a /{prefix} out of {parent}")]
    PrefixTooShort { parent: Ipv4Cidr, prefix: u8 },

    #[error("{parent} has no room left for another /{prefix}")]
    Exhausted { parent: Ipv4Cidr, prefix: u8 },
}

/// An IPv4 network in CIDR notation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ipv4Cidr {
    network: u32,
    prefix: u8,
}

impl Ipv4Cidr {
    pub fn new(address: Ipv4Addr, prefix: u8) -> Result<Self, CidrError> {
        if prefix > 32 {
            return Err(CidrError::Parse(format!("{}/{}", address, prefix)));
        }
        let network = u32::from(address);
        if network & !mask(prefix) != 0 {
            return Err(CidrError::HostBitsSet(format!("{}/{}", address, prefix)));
        }
        Ok(Self { network, prefix })
    }

    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network)
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Number of addresses in the block
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }

    fn first(&self) -> u64 {
        u64::from(self.network)
    }

    /// Last address, inclusive
    fn last(&self) -> u64 {
        self.first() + self.size() - 1
    }

    pub fn contains(&self, other: &Ipv4Cidr) -> bool {
        self.first() <= other.first() && other.last() <= self.last()
    }

    pub fn overlaps(&self, other: &Ipv4Cidr) -> bool {
        self.first() <= other.last() && other.first() <= self.last()
    }
}

fn mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

impl FromStr for Ipv4Cidr {
    type Err = CidrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, prefix) = s
            .split_once('/')
            .ok_or_else(|| CidrError::Parse(s.to_string()))?;
        let address: Ipv4Addr = address
            .parse()
            .map_err(|_| CidrError::Parse(s.to_string()))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| CidrError::Parse(s.to_string()))?;
        Self::new(address, prefix)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.prefix)
    }
}

/// Hands out consecutive, aligned blocks of a parent range
#[derive(Debug, Clone)]
pub struct CidrAllocator {
    parent: Ipv4Cidr,
    next: u64,
}

impl CidrAllocator {
    pub fn new(parent: Ipv4Cidr) -> Self {
        Self {
            parent,
            next: parent.first(),
        }
    }

    /// Next free `/prefix` block, aligned to its own size
    pub fn allocate(&mut self, prefix: u8) -> Result<Ipv4Cidr, CidrError> {
        if prefix < self.parent.prefix || prefix > 32 {
            return Err(CidrError::PrefixTooShort {
                parent: self.parent,
                prefix,
            });
        }
        let size = 1u64 << (32 - u32::from(prefix));
        let start = self.next.div_ceil(size) * size;
        if start + size - 1 > self.parent.last() {
            return Err(CidrError::Exhausted {
                parent: self.parent,
                prefix,
            });
        }
        self.next = start + size;

        let network = u32::try_from(start).map_err(|_| CidrError::Exhausted {
            parent: self.parent,
            prefix,
        })?;
        Ok(Ipv4Cidr { network, prefix })
    }
}
