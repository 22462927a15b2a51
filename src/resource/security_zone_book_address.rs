// This file is part of the terraform-provider-junos project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tf_provider::{
    map,
    schema::{Block, Description, Schema},
    AttributePath, Diagnostics,
};

use crate::junos::{cut_prefix, cut_suffix, trim_quotes, ID_SEPARATOR};
use crate::utils::{
    flag, id_attribute, is_true, non_empty, optional_bool, optional_string, replace_if_changed,
    required_string, value_str, ValueBool, ValueStr, WithNormalize, WithSchema, WithValidate,
};
use crate::validate::{self, NameFormat};

use super::security_address_book::is_wildcard;
use super::{JunosResource, Requirement};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityZoneBookAddress {
    pub id: ValueStr,
    pub name: ValueStr,
    pub zone: ValueStr,
    pub cidr: ValueStr,
    pub description: ValueStr,
    pub dns_ipv4_only: ValueBool,
    pub dns_ipv6_only: ValueBool,
    pub dns_name: ValueStr,
    pub range_from: ValueStr,
    pub range_to: ValueStr,
    pub wildcard: ValueStr,
}

impl WithSchema for SecurityZoneBookAddress {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                description: Description::plain(
                    "Provides a security zone address-book address resource",
                ),
                attributes: map! {
                    "id" => id_attribute(),
                    "name" => required_string("The name of address"),
                    "zone" => required_string("The name of security zone"),
                    "cidr" => optional_string("CIDR value of address"),
                    "description" => optional_string("Description of address"),
                    "dns_ipv4_only" => optional_bool("IPv4 dns address"),
                    "dns_ipv6_only" => optional_bool("IPv6 dns address"),
                    "dns_name" => optional_string("DNS address name"),
                    "range_from" => optional_string("Lower limit of address range"),
                    "range_to" => optional_string("Upper limit of address range"),
                    "wildcard" => optional_string("Numeric IPv4 wildcard address with in the form of a.d.d.r/netmask"),
                },
                ..Default::default()
            },
        }
    }
}

impl WithValidate for SecurityZoneBookAddress {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        validate::name_object(
            diags,
            AttributePath::new("name"),
            &self.name,
            63,
            NameFormat::AddressName,
            &[],
        );
        validate::name_object(
            diags,
            AttributePath::new("zone"),
            &self.zone,
            63,
            NameFormat::Default,
            &[],
        );
        validate::cidr_network(diags, AttributePath::new("cidr"), &self.cidr);
        validate::no_double_quote(diags, AttributePath::new("description"), &self.description);
        validate::dns_address(diags, AttributePath::new("dns_name"), &self.dns_name);
        validate::ip_address(diags, AttributePath::new("range_from"), &self.range_from);
        validate::ip_address(diags, AttributePath::new("range_to"), &self.range_to);
        validate::matches(
            diags,
            AttributePath::new("wildcard"),
            &self.wildcard,
            is_wildcard,
            "a wildcard address <ip>/<mask>",
        );
        validate::bool_true(diags, AttributePath::new("dns_ipv4_only"), &self.dns_ipv4_only);
        validate::bool_true(diags, AttributePath::new("dns_ipv6_only"), &self.dns_ipv6_only);

        let kinds = [&self.cidr, &self.dns_name, &self.range_from, &self.wildcard];
        if kinds.iter().all(|kind| !kind.is_unknown()) {
            let set = kinds.iter().filter(|kind| !kind.is_null()).count();
            if set != 1 {
                diags.root_error_short(
                    "exactly one of cidr, dns_name, range_from or wildcard must be specified",
                );
            }
        }
        if self.range_from.is_null() != self.range_to.is_null() {
            diags.error_short(
                "range_from and range_to must be set together",
                AttributePath::new("range_from"),
            );
        }
        validate::conflicts(
            diags,
            AttributePath::new("dns_ipv4_only"),
            "dns_ipv4_only",
            "dns_ipv6_only",
            !self.dns_ipv4_only.is_null(),
            !self.dns_ipv6_only.is_null(),
        );
        for (name, value) in [
            ("dns_ipv4_only", &self.dns_ipv4_only),
            ("dns_ipv6_only", &self.dns_ipv6_only),
        ] {
            if !value.is_null() && self.dns_name.is_null() {
                diags.error_short(
                    format!("{name} requires dns_name to be set"),
                    AttributePath::new(name),
                );
            }
        }
    }
}

impl WithNormalize for SecurityZoneBookAddress {
    fn normalize(&mut self, _diags: &mut Diagnostics) {}
}

impl JunosResource for SecurityZoneBookAddress {
    const TYPE_NAME: &'static str = "security_zone_book_address";
    const ID_FORMAT: &'static str = "<zone>_-_<name>";
    const SECURITY_ONLY: bool = true;

    fn id_mut(&mut self) -> &mut ValueStr {
        &mut self.id
    }

    fn compute_id(&self) -> String {
        format!("{}{ID_SEPARATOR}{}", self.zone.as_str(), self.name.as_str())
    }

    fn from_id(id: &str) -> Option<Self> {
        let (zone, name) = id.split_once(ID_SEPARATOR)?;
        if zone.is_empty() || name.is_empty() || name.contains(ID_SEPARATOR) {
            return None;
        }
        Some(Self {
            id: value_str(id),
            name: value_str(name),
            zone: value_str(zone),
            ..Default::default()
        })
    }

    fn replace_triggers(&self, prior: &Self) -> Vec<AttributePath> {
        let mut triggers = Vec::new();
        replace_if_changed(&mut triggers, "name", &prior.name, &self.name);
        replace_if_changed(&mut triggers, "zone", &prior.zone, &self.zone);
        triggers
    }

    fn requirements(&self) -> Vec<Requirement> {
        vec![Requirement::SecurityZone(self.zone.as_str().to_owned())]
    }

    fn config_path(&self) -> String {
        format!(
            "security zones security-zone {} address-book address {}",
            self.zone.as_str(),
            self.name.as_str()
        )
    }

    fn set_lines(&self) -> Result<Vec<String>> {
        let set_prefix = format!("set {} ", self.config_path());
        let mut lines = Vec::new();

        if let Some(cidr) = non_empty(&self.cidr) {
            lines.push(format!("{set_prefix}{cidr}"));
        }
        if let Some(description) = non_empty(&self.description) {
            lines.push(format!("{set_prefix}description \"{description}\""));
        }
        if let Some(dns_name) = non_empty(&self.dns_name) {
            lines.push(format!("{set_prefix}dns-name {dns_name}"));
            if is_true(&self.dns_ipv4_only) {
                lines.push(format!("{set_prefix}dns-name {dns_name} ipv4-only"));
            }
            if is_true(&self.dns_ipv6_only) {
                lines.push(format!("{set_prefix}dns-name {dns_name} ipv6-only"));
            }
        }
        if let Some(from) = non_empty(&self.range_from) {
            let Some(to) = non_empty(&self.range_to) else {
                bail!("range_to must be set with range_from");
            };
            lines.push(format!("{set_prefix}range-address {from} to {to}"));
        }
        if let Some(wildcard) = non_empty(&self.wildcard) {
            lines.push(format!("{set_prefix}wildcard-address {wildcard}"));
        }
        Ok(lines)
    }

    fn parse_line(&mut self, mut line: &str) -> Result<()> {
        if cut_prefix(&mut line, "description ") {
            self.description = value_str(trim_quotes(line));
        } else if cut_prefix(&mut line, "dns-name ") {
            if cut_suffix(&mut line, " ipv4-only") {
                self.dns_ipv4_only = flag(true);
            } else if cut_suffix(&mut line, " ipv6-only") {
                self.dns_ipv6_only = flag(true);
            }
            self.dns_name = value_str(line);
        } else if cut_prefix(&mut line, "range-address ") {
            let Some((from, to)) = line.split_once(" to ") else {
                bail!("can't read values for range-address in {line:?}: not enough fields");
            };
            self.range_from = value_str(from);
            self.range_to = value_str(to);
        } else if cut_prefix(&mut line, "wildcard-address ") {
            self.wildcard = value_str(line);
        } else if line.contains('/') {
            self.cidr = value_str(line);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_parse_dns_address() {
        let mut address = SecurityZoneBookAddress::from_id("trust_-_www").unwrap();
        address.description = value_str("web");
        address.dns_name = value_str("www.example.com");
        address.dns_ipv6_only = flag(true);
        let prefix = "set security zones security-zone trust address-book address www";
        let lines = address.set_lines().unwrap();
        assert_eq!(
            lines,
            vec![
                format!("{prefix} description \"web\""),
                format!("{prefix} dns-name www.example.com"),
                format!("{prefix} dns-name www.example.com ipv6-only"),
            ]
        );

        let mut state = SecurityZoneBookAddress::from_id("trust_-_www").unwrap();
        for line in &lines {
            state
                .parse_line(line.strip_prefix(&format!("{prefix} ")).unwrap())
                .unwrap();
        }
        assert_eq!(state, address);
        assert_eq!(
            state.requirements(),
            vec![Requirement::SecurityZone("trust".to_owned())]
        );
    }

    #[test]
    fn parse_cidr_and_range() {
        let mut state = SecurityZoneBookAddress::from_id("trust_-_lan").unwrap();
        state.parse_line("192.0.2.0/24").unwrap();
        assert_eq!(state.cidr, value_str("192.0.2.0/24"));

        let mut state = SecurityZoneBookAddress::from_id("trust_-_pool").unwrap();
        state
            .parse_line("range-address 192.0.2.10 to 192.0.2.20")
            .unwrap();
        assert_eq!(state.range_from, value_str("192.0.2.10"));
        assert_eq!(state.range_to, value_str("192.0.2.20"));
        assert!(state.parse_line("range-address 192.0.2.10").is_err());
    }

    #[test]
    fn validation() {
        let mut diags = Diagnostics::default();
        let config = SecurityZoneBookAddress {
            name: value_str("addr1"),
            zone: value_str("trust"),
            cidr: value_str("192.0.2.0/24"),
            wildcard: value_str("192.0.2.0/255.255.0.255"),
            dns_ipv4_only: flag(true),
            ..Default::default()
        };
        config.validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 2);

        let mut diags = Diagnostics::default();
        let config = SecurityZoneBookAddress {
            name: value_str("addr1"),
            zone: value_str("trust"),
            range_from: value_str("192.0.2.10"),
            ..Default::default()
        };
        config.validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 1);
        assert!(SecurityZoneBookAddress::from_id("trust").is_none());
    }
}
