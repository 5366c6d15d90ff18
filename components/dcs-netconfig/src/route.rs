/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Route-destination validation and the legacy subnet-mask-to-prefix-length
//! conversion for callers that still pass a dotted mask instead of a
//! prefix length.

use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use log::warn;

use dcs_core::{Error, Result};

pub fn validate_dest_addr(dest_addr: &str) -> Result<IpAddr> {
    IpAddr::from_str(dest_addr).map_err(|_| Error::bad_parameter(format!("not an IPv4/IPv6 literal: {dest_addr}")))
}

/// Accepts a decimal prefix length (`0..=128`), a legacy dotted IPv4
/// subnet mask (e.g. `255.255.255.0`, converted with a warning since new
/// callers are expected to pass a prefix length), or an empty (or
/// all-whitespace) string meaning "host route" -- `None` is passed
/// through to the platform adapter verbatim rather than coerced to a
/// numeric prefix, since neither family's full-length prefix is quite the
/// same thing as the original's empty-string host route.
pub fn resolve_prefix_length(prefix_or_mask: &str, is_v6: bool) -> Result<Option<u8>> {
    if prefix_or_mask.trim().is_empty() {
        return Ok(None);
    }

    if let Ok(n) = prefix_or_mask.parse::<u8>() {
        let max = if is_v6 { 128 } else { 32 };
        if n > max {
            return Err(Error::bad_parameter(format!("prefix length {n} exceeds {max}")));
        }
        return Ok(Some(n));
    }

    let mask = Ipv4Addr::from_str(prefix_or_mask)
        .map_err(|_| Error::bad_parameter(format!("not a prefix length or subnet mask: {prefix_or_mask}")))?;
    if is_v6 {
        return Err(Error::bad_parameter("a dotted subnet mask cannot describe an IPv6 prefix"));
    }
    let prefix = mask_to_prefix_length(mask)?;
    warn!("route destination used a legacy subnet mask {prefix_or_mask}; converted to /{prefix}");
    Ok(Some(prefix))
}

fn mask_to_prefix_length(mask: Ipv4Addr) -> Result<u8> {
    let bits = u32::from_be_bytes(mask.octets());
    let ones = bits.count_ones();
    let expected = if ones == 0 { 0 } else { u32::MAX << (32 - ones) };
    if bits != expected {
        return Err(Error::bad_parameter(format!("{mask} is not a contiguous subnet mask")));
    }
    Ok(ones as u8)
}
