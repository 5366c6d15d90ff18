/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! DHCP lease file parsing: scans `option routers` / `option
//! domain-name-servers` lines the way a dhclient lease file writes them,
//! tokenises on whitespace and commas, and sorts the results by address
//! family.

use dcs_core::traits::Lease;

const MAX_GW_PER_FAMILY: usize = 1;
const MAX_DNS_PER_FAMILY: usize = 2;

fn tokens(rest: &str) -> impl Iterator<Item = &str> {
    rest.trim_end_matches(';').split([',', ' ', '\t']).filter(|t| !t.is_empty())
}

/// `None` entries in the returned `Lease` mean the option line was absent
/// or empty, not that parsing failed -- an incomplete lease is still a
/// usable one.
pub fn parse_lease_file(contents: &str) -> Lease {
    let mut lease = Lease::default();

    for line in contents.lines() {
        let line = line.trim();
        let Some(rest) = line.strip_prefix("option routers") else {
            if let Some(rest) = line.strip_prefix("option domain-name-servers") {
                push_dns(&mut lease, tokens(rest));
                continue;
            }
            continue;
        };
        push_gw(&mut lease, tokens(rest));
    }

    lease
}

fn push_gw<'a>(lease: &mut Lease, addrs: impl Iterator<Item = &'a str>) {
    for addr in addrs {
        if addr.contains(':') {
            if lease.gateway_v6.is_none() {
                lease.gateway_v6 = Some(addr.to_owned());
            }
        } else if lease.gateway_v4.is_none() {
            lease.gateway_v4 = Some(addr.to_owned());
        }
        if count_installed_gw(lease) >= MAX_GW_PER_FAMILY * 2 {
            break;
        }
    }
}

fn count_installed_gw(lease: &Lease) -> usize {
    lease.gateway_v4.is_some() as usize + lease.gateway_v6.is_some() as usize
}

fn push_dns<'a>(lease: &mut Lease, addrs: impl Iterator<Item = &'a str>) {
    for addr in addrs {
        if addr.contains(':') {
            if lease.dns_v6.len() < MAX_DNS_PER_FAMILY {
                lease.dns_v6.push(addr.to_owned());
            }
        } else if lease.dns_v4.len() < MAX_DNS_PER_FAMILY {
            lease.dns_v4.push(addr.to_owned());
        }
    }
}
