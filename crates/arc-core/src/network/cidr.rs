//! Successor arithmetic on IPv4 blocks

use crate::error::{CoreError, Result};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

pub fn parse(cidr: &str) -> Result<Ipv4Net> {
    cidr.parse::<Ipv4Net>()
        .map(|net| net.trunc())
        .map_err(|e| CoreError::Cidr(format!("{}: {}", cidr, e)))
}

/// The block of the same size immediately after `net`
pub fn successor(net: Ipv4Net) -> Result<Ipv4Net> {
    let size = 1u64 << (32 - u32::from(net.prefix_len()));
    let next = u64::from(u32::from(net.network())) + size;
    if next + size > 1u64 << 32 {
        return Err(CoreError::Cidr(format!("{} has no successor", net)));
    }
    Ipv4Net::new(Ipv4Addr::from(next as u32), net.prefix_len())
        .map_err(|e| CoreError::Cidr(e.to_string()))
}

/// `count` consecutive blocks starting at `base`
pub fn distribute(base: &str, count: usize) -> Result<Vec<Ipv4Net>> {
    let mut blocks = Vec::with_capacity(count);
    let mut current = parse(base)?;
    for i in 0..count {
        if i > 0 {
            current = successor(current)?;
        }
        blocks.push(current);
    }
    Ok(blocks)
}
