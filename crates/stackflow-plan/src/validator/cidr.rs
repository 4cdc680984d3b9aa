//! IPv4 CIDR blocks

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// An IPv4 network in CIDR notation, e.g. `10.0.0.0/24`
///
/// Host bits are not required to be zero; `network()` masks them off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cidr {
    address: Ipv4Addr,
    prefix_length: u8,
}

/// Why a string is not a CIDR block
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CidrError {
    #[error("'{0}' has no /prefix")]
    MissingPrefix(String),

    #[error("'{0}' is not an IPv4 address")]
    InvalidAddress(String),

    #[error("'{0}' is not a prefix length between 0 and 32")]
    InvalidPrefixLength(String),
}

impl Cidr {
    pub fn new(cidr: impl AsRef<str>) -> Result<Self, CidrError> {
        let cidr = cidr.as_ref().trim();
        let (addr_str, prefix_str) = cidr
            .split_once('/')
            .ok_or_else(|| CidrError::MissingPrefix(cidr.to_string()))?;

        let address = Ipv4Addr::from_str(addr_str)
            .map_err(|_| CidrError::InvalidAddress(addr_str.to_string()))?;
        let prefix_length = prefix_str
            .parse::<u8>()
            .ok()
            .filter(|p| *p <= 32)
            .ok_or_else(|| CidrError::InvalidPrefixLength(prefix_str.to_string()))?;

        Ok(Self {
            address,
            prefix_length,
        })
    }

    pub fn prefix_length(&self) -> u8 {
        self.prefix_length
    }

    fn mask(&self) -> u32 {
        match self.prefix_length {
            0 => 0,
            p => u32::MAX << (32 - p),
        }
    }

    /// First address of the block
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.address) & self.mask())
    }

    /// Last address of the block
    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.address) | !self.mask())
    }

    /// `0.0.0.0/0`
    pub fn is_any(&self) -> bool {
        self.prefix_length == 0
    }

    /// Whether `other` lies entirely inside this block
    pub fn contains(&self, other: &Cidr) -> bool {
        other.prefix_length >= self.prefix_length
            && u32::from(other.address) & self.mask() == u32::from(self.network())
    }

    pub fn overlaps(&self, other: &Cidr) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// Lowest free `/prefix_length` block inside this one that overlaps none of `taken`
    ///
    /// Candidates are aligned to their own size.
    pub fn first_free(&self, prefix_length: u8, taken: &[Cidr]) -> Option<Cidr> {
        if prefix_length < self.prefix_length || prefix_length > 32 {
            return None;
        }
        let size = 1u64 << (32 - prefix_length);
        let end = u64::from(u32::from(self.broadcast()));
        let mut start = u64::from(u32::from(self.network()));

        while start + size - 1 <= end {
            let candidate = Cidr {
                address: Ipv4Addr::from(start as u32),
                prefix_length,
            };
            match taken.iter().find(|t| t.overlaps(&candidate)) {
                None => return Some(candidate),
                Some(t) => {
                    let next = u64::from(u32::from(t.broadcast())) + 1;
                    start = next.div_ceil(size) * size;
                }
            }
        }
        None
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_length)
    }
}

impl FromStr for Cidr {
    type Err = CidrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
