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

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tf_provider::{
    map,
    schema::{Block, Description, NestedBlock, Schema},
    value::{ValueList, ValueSet},
    AttributePath, Diagnostics, Value,
};

use crate::junos::{cut_prefix, cut_suffix, trim_quotes};
use crate::utils::{
    defaulted_string, flag, id_attribute, insert_str, is_true, non_empty, optional_bool,
    optional_list, optional_set, optional_string, push_str, replace_if_changed, required_string,
    set_blocks, set_strings, strings, update_set_block, upsert_set_block, value_str, ValueBool,
    ValueStr, WithNormalize, WithSchema, WithValidate,
};
use crate::validate::{self, NameFormat};

use super::JunosResource;

const GLOBAL: &str = "global";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityAddressBook {
    pub id: ValueStr,
    pub name: ValueStr,
    pub description: ValueStr,
    pub attach_zone: ValueList<ValueStr>,
    pub network_address: ValueSet<Value<NetworkAddress>>,
    pub wildcard_address: ValueSet<Value<NetworkAddress>>,
    pub dns_name: ValueSet<Value<DnsName>>,
    pub range_address: ValueSet<Value<RangeAddress>>,
    pub address_set: ValueSet<Value<AddressSet>>,
    /// Descriptions read before the address they belong to
    #[serde(skip)]
    pending_descriptions: BTreeMap<String, String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkAddress {
    pub name: ValueStr,
    pub value: ValueStr,
    pub description: ValueStr,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DnsName {
    pub name: ValueStr,
    pub value: ValueStr,
    pub description: ValueStr,
    pub ipv4_only: ValueBool,
    pub ipv6_only: ValueBool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RangeAddress {
    pub name: ValueStr,
    pub from: ValueStr,
    pub to: ValueStr,
    pub description: ValueStr,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AddressSet {
    pub name: ValueStr,
    pub address: ValueSet<ValueStr>,
    pub address_set: ValueSet<ValueStr>,
    pub description: ValueStr,
}

/// `<ip>/<mask>` with a dotted IPv4 mask
pub(super) fn is_wildcard(value: &str) -> bool {
    value.split_once('/').is_some_and(|(address, mask)| {
        address.parse::<std::net::Ipv4Addr>().is_ok() && mask.parse::<std::net::Ipv4Addr>().is_ok()
    })
}

fn address_block(description: &'static str, value: &'static str) -> NestedBlock {
    NestedBlock::Set(Block {
        description: Description::plain(description),
        attributes: map! {
            "name" => required_string("Name of address"),
            "value" => required_string(value),
            "description" => optional_string("Description of address"),
        },
        ..Default::default()
    })
}

impl SecurityAddressBook {
    /// Name of every address and address-set, in block order
    fn address_names(&self) -> Vec<&str> {
        set_blocks(&self.network_address)
            .chain(set_blocks(&self.wildcard_address))
            .map(|address| address.name.as_str())
            .chain(set_blocks(&self.dns_name).map(|address| address.name.as_str()))
            .chain(set_blocks(&self.range_address).map(|address| address.name.as_str()))
            .chain(set_blocks(&self.address_set).map(|address| address.name.as_str()))
            .collect()
    }

    fn set_description(&mut self, name: &str, description: &str) {
        let description = value_str(description);
        let found = update_set_block(
            &mut self.network_address,
            |address| address.name.as_str() == name,
            |address| address.description = description.clone(),
        ) || update_set_block(
            &mut self.wildcard_address,
            |address| address.name.as_str() == name,
            |address| address.description = description.clone(),
        ) || update_set_block(
            &mut self.dns_name,
            |address| address.name.as_str() == name,
            |address| address.description = description.clone(),
        ) || update_set_block(
            &mut self.range_address,
            |address| address.name.as_str() == name,
            |address| address.description = description.clone(),
        );
        if !found {
            self.pending_descriptions
                .insert(name.to_owned(), description.as_str().to_owned());
        }
    }

    fn take_description(&mut self, name: &str) -> ValueStr {
        match self.pending_descriptions.remove(name) {
            Some(description) => value_str(description),
            None => Value::Null,
        }
    }

    fn parse_address(&mut self, name: &str, mut line: &str) -> Result<()> {
        if cut_prefix(&mut line, "description ") {
            self.set_description(name, trim_quotes(line));
            return Ok(());
        }
        let description = self.take_description(name);
        if cut_prefix(&mut line, "wildcard-address ") {
            upsert_set_block(
                &mut self.wildcard_address,
                |address| address.name.as_str() == name,
                |address| {
                    address.name = value_str(name);
                    address.value = value_str(line);
                    address.description = description.clone();
                },
            );
        } else if cut_prefix(&mut line, "range-address ") {
            let Some((from, to)) = line.split_once(" to ") else {
                bail!("can't read values for range-address in {line:?}: not enough fields");
            };
            upsert_set_block(
                &mut self.range_address,
                |address| address.name.as_str() == name,
                |address| {
                    address.name = value_str(name);
                    address.from = value_str(from);
                    address.to = value_str(to);
                    address.description = description.clone();
                },
            );
        } else if cut_prefix(&mut line, "dns-name ") {
            let ipv4_only = cut_suffix(&mut line, " ipv4-only");
            let ipv6_only = !ipv4_only && cut_suffix(&mut line, " ipv6-only");
            upsert_set_block(
                &mut self.dns_name,
                |address| address.name.as_str() == name,
                |address| {
                    address.name = value_str(name);
                    address.value = value_str(line);
                    if ipv4_only {
                        address.ipv4_only = flag(true);
                    }
                    if ipv6_only {
                        address.ipv6_only = flag(true);
                    }
                    if !description.is_null() {
                        address.description = description.clone();
                    }
                },
            );
        } else {
            upsert_set_block(
                &mut self.network_address,
                |address| address.name.as_str() == name,
                |address| {
                    address.name = value_str(name);
                    address.value = value_str(line);
                    address.description = description.clone();
                },
            );
        }
        Ok(())
    }

    fn parse_address_set(&mut self, name: &str, line: &str) {
        upsert_set_block(
            &mut self.address_set,
            |address_set| address_set.name.as_str() == name,
            |address_set| {
                address_set.name = value_str(name);
                let mut line = line;
                if cut_prefix(&mut line, "description ") {
                    address_set.description = value_str(trim_quotes(line));
                } else if cut_prefix(&mut line, "address ") {
                    insert_str(&mut address_set.address, line);
                } else if cut_prefix(&mut line, "address-set ") {
                    insert_str(&mut address_set.address_set, line);
                }
            },
        );
    }
}

impl WithSchema for SecurityAddressBook {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                description: Description::plain("Provides a security address book resource"),
                attributes: map! {
                    "id" => id_attribute(),
                    "name" => defaulted_string("The name of address book, `global` by default"),
                    "description" => optional_string("Text description of address book"),
                    "attach_zone" => optional_list("List of zones to attach address book to"),
                },
                blocks: map! {
                    "network_address" => address_block("List of network address", "CIDR value of address"),
                    "wildcard_address" => address_block("List of wildcard address", "Wildcard address value, like `192.0.2.0/255.255.0.255`"),
                    "dns_name" => NestedBlock::Set(Block {
                        description: Description::plain("List of DNS name address"),
                        attributes: map! {
                            "name" => required_string("Name of address"),
                            "value" => required_string("DNS name string value"),
                            "description" => optional_string("Description of address"),
                            "ipv4_only" => optional_bool("IPv4 dns address"),
                            "ipv6_only" => optional_bool("IPv6 dns address"),
                        },
                        ..Default::default()
                    }),
                    "range_address" => NestedBlock::Set(Block {
                        description: Description::plain("List of range address"),
                        attributes: map! {
                            "name" => required_string("Name of address"),
                            "from" => required_string("IP address of start of range"),
                            "to" => required_string("IP address of end of range"),
                            "description" => optional_string("Description of address"),
                        },
                        ..Default::default()
                    }),
                    "address_set" => NestedBlock::Set(Block {
                        description: Description::plain("List of address sets"),
                        attributes: map! {
                            "name" => required_string("Name of address-set"),
                            "address" => optional_set("List of address names"),
                            "address_set" => optional_set("List of address-set names"),
                            "description" => optional_string("Description of address-set"),
                        },
                        ..Default::default()
                    }),
                },
                ..Default::default()
            },
        }
    }
}

impl WithValidate for SecurityAddressBook {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        validate::name_object(
            diags,
            AttributePath::new("name"),
            &self.name,
            63,
            NameFormat::Default,
            &[],
        );
        validate::no_double_quote(diags, AttributePath::new("description"), &self.description);
        if self.name.as_str() == GLOBAL && strings(&self.attach_zone).next().is_some() {
            diags.error_short(
                "cannot attach global address book to a zone",
                AttributePath::new("attach_zone"),
            );
        }
        if let Value::Value(zones) = &self.attach_zone {
            for (index, zone) in zones.iter().enumerate() {
                validate::name_object(
                    diags,
                    AttributePath::new("attach_zone").index(index as i64),
                    zone,
                    63,
                    NameFormat::Default,
                    &[],
                );
            }
        }

        let name_path = |block: &'static str| AttributePath::new(block).attribute("name");
        let check_name = |diags: &mut Diagnostics, block: &'static str, name: &ValueStr| {
            validate::name_object(diags, name_path(block), name, 63, NameFormat::AddressName, &[]);
        };
        let check_description =
            |diags: &mut Diagnostics, block: &'static str, description: &ValueStr| {
                let path = AttributePath::new(block).attribute("description");
                validate::no_double_quote(diags, path, description);
            };
        for address in set_blocks(&self.network_address) {
            check_name(diags, "network_address", &address.name);
            check_description(diags, "network_address", &address.description);
            validate::cidr_network(
                diags,
                AttributePath::new("network_address").attribute("value"),
                &address.value,
            );
        }
        for address in set_blocks(&self.wildcard_address) {
            check_name(diags, "wildcard_address", &address.name);
            check_description(diags, "wildcard_address", &address.description);
            validate::matches(
                diags,
                AttributePath::new("wildcard_address").attribute("value"),
                &address.value,
                is_wildcard,
                "a wildcard address <ip>/<mask>",
            );
        }
        for address in set_blocks(&self.dns_name) {
            check_name(diags, "dns_name", &address.name);
            check_description(diags, "dns_name", &address.description);
            validate::dns_address(
                diags,
                AttributePath::new("dns_name").attribute("value"),
                &address.value,
            );
            validate::bool_true(
                diags,
                AttributePath::new("dns_name").attribute("ipv4_only"),
                &address.ipv4_only,
            );
            validate::bool_true(
                diags,
                AttributePath::new("dns_name").attribute("ipv6_only"),
                &address.ipv6_only,
            );
            validate::conflicts(
                diags,
                AttributePath::new("dns_name").attribute("ipv4_only"),
                "ipv4_only",
                "ipv6_only",
                is_true(&address.ipv4_only),
                is_true(&address.ipv6_only),
            );
        }
        for address in set_blocks(&self.range_address) {
            check_name(diags, "range_address", &address.name);
            check_description(diags, "range_address", &address.description);
            validate::ip_address(
                diags,
                AttributePath::new("range_address").attribute("from"),
                &address.from,
            );
            validate::ip_address(
                diags,
                AttributePath::new("range_address").attribute("to"),
                &address.to,
            );
        }
        for address_set in set_blocks(&self.address_set) {
            check_name(diags, "address_set", &address_set.name);
            check_description(diags, "address_set", &address_set.description);
            let empty = |set: &ValueSet<ValueStr>| set.is_null() || set_strings(set).next().is_none();
            if !address_set.address.is_unknown()
                && !address_set.address_set.is_unknown()
                && empty(&address_set.address)
                && empty(&address_set.address_set)
            {
                diags.error_short(
                    format!(
                        "at least one of address or address_set is required in address_set {}",
                        address_set.name.as_str()
                    ),
                    AttributePath::new("address_set"),
                );
            }
        }

        let mut names = self.address_names();
        names.retain(|name| !name.is_empty());
        names.sort_unstable();
        for pair in names.windows(2) {
            if pair[0] == pair[1] {
                diags.error_short(
                    format!("multiple addresses or address-sets with the same name {}", pair[0]),
                    AttributePath::default(),
                );
            }
        }
    }
}

impl WithNormalize for SecurityAddressBook {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        if self.name.is_null() {
            self.name = value_str(GLOBAL);
        }
    }
}

impl JunosResource for SecurityAddressBook {
    const TYPE_NAME: &'static str = "security_address_book";
    const ID_FORMAT: &'static str = "<name>";
    const SECURITY_ONLY: bool = true;

    fn id_mut(&mut self) -> &mut ValueStr {
        &mut self.id
    }

    fn compute_id(&self) -> String {
        self.name.as_str().to_owned()
    }

    fn from_id(id: &str) -> Option<Self> {
        if id.is_empty() {
            return None;
        }
        Some(Self {
            id: value_str(id),
            name: value_str(id),
            ..Default::default()
        })
    }

    fn replace_triggers(&self, prior: &Self) -> Vec<AttributePath> {
        let mut triggers = Vec::new();
        replace_if_changed(&mut triggers, "name", &prior.name, &self.name);
        triggers
    }

    fn config_path(&self) -> String {
        format!("security address-book {}", self.name.as_str())
    }

    fn set_lines(&self) -> Result<Vec<String>> {
        let set_prefix = format!("set {} ", self.config_path());
        let mut lines = Vec::new();

        if let Some(description) = non_empty(&self.description) {
            lines.push(format!("{set_prefix}description \"{description}\""));
        }
        for zone in strings(&self.attach_zone) {
            if self.name.as_str() == GLOBAL {
                bail!("cannot attach global address book to a zone");
            }
            lines.push(format!("{set_prefix}attach zone {zone}"));
        }
        let description_line = |lines: &mut Vec<String>, prefix: &str, description: &ValueStr| {
            if let Some(description) = non_empty(description) {
                lines.push(format!("{prefix}description \"{description}\""));
            }
        };
        for address in set_blocks(&self.network_address) {
            let prefix = format!("{set_prefix}address {} ", address.name.as_str());
            lines.push(format!("{prefix}{}", address.value.as_str()));
            description_line(&mut lines, &prefix, &address.description);
        }
        for address in set_blocks(&self.wildcard_address) {
            let prefix = format!("{set_prefix}address {} ", address.name.as_str());
            lines.push(format!("{prefix}wildcard-address {}", address.value.as_str()));
            description_line(&mut lines, &prefix, &address.description);
        }
        for address in set_blocks(&self.dns_name) {
            let prefix = format!("{set_prefix}address {} ", address.name.as_str());
            let dns = format!("{prefix}dns-name {}", address.value.as_str());
            lines.push(dns.clone());
            if is_true(&address.ipv4_only) {
                lines.push(format!("{dns} ipv4-only"));
            }
            if is_true(&address.ipv6_only) {
                lines.push(format!("{dns} ipv6-only"));
            }
            description_line(&mut lines, &prefix, &address.description);
        }
        for address in set_blocks(&self.range_address) {
            let prefix = format!("{set_prefix}address {} ", address.name.as_str());
            lines.push(format!(
                "{prefix}range-address {} to {}",
                address.from.as_str(),
                address.to.as_str()
            ));
            description_line(&mut lines, &prefix, &address.description);
        }
        for address_set in set_blocks(&self.address_set) {
            let prefix = format!("{set_prefix}address-set {} ", address_set.name.as_str());
            if set_strings(&address_set.address).next().is_none()
                && set_strings(&address_set.address_set).next().is_none()
            {
                bail!(
                    "at least one of address or address_set is required in address_set {}",
                    address_set.name.as_str()
                );
            }
            for address in set_strings(&address_set.address) {
                lines.push(format!("{prefix}address {address}"));
            }
            for set in set_strings(&address_set.address_set) {
                lines.push(format!("{prefix}address-set {set}"));
            }
            description_line(&mut lines, &prefix, &address_set.description);
        }
        Ok(lines)
    }

    fn parse_line(&mut self, mut line: &str) -> Result<()> {
        if cut_prefix(&mut line, "description ") {
            self.description = value_str(trim_quotes(line));
        } else if cut_prefix(&mut line, "attach zone ") {
            push_str(&mut self.attach_zone, line);
        } else if cut_prefix(&mut line, "address-set ") {
            let (name, rest) = line.split_once(' ').unwrap_or((line, ""));
            self.parse_address_set(name, rest);
        } else if cut_prefix(&mut line, "address ") {
            let (name, rest) = line.split_once(' ').unwrap_or((line, ""));
            self.parse_address(name, rest)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address_book() -> SecurityAddressBook {
        let mut book = SecurityAddressBook::from_id("book1").unwrap();
        book.description = value_str("test book");
        push_str(&mut book.attach_zone, "trust");
        upsert_set_block(&mut book.network_address, |_| false, |address| {
            address.name = value_str("net1");
            address.value = value_str("192.0.2.0/24");
            address.description = value_str("lan");
        });
        upsert_set_block(&mut book.wildcard_address, |_| false, |address| {
            address.name = value_str("wild1");
            address.value = value_str("192.0.2.0/255.255.0.255");
        });
        upsert_set_block(&mut book.dns_name, |_| false, |address| {
            address.name = value_str("dns1");
            address.value = value_str("www.example.com");
            address.ipv4_only = flag(true);
        });
        upsert_set_block(&mut book.range_address, |_| false, |address| {
            address.name = value_str("range1");
            address.from = value_str("192.0.2.10");
            address.to = value_str("192.0.2.20");
        });
        upsert_set_block(&mut book.address_set, |_| false, |address_set| {
            address_set.name = value_str("set1");
            insert_str(&mut address_set.address, "net1");
            insert_str(&mut address_set.address, "range1");
        });
        book
    }

    #[test]
    fn set_lines() {
        let prefix = "set security address-book book1";
        assert_eq!(
            address_book().set_lines().unwrap(),
            vec![
                format!("{prefix} description \"test book\""),
                format!("{prefix} attach zone trust"),
                format!("{prefix} address net1 192.0.2.0/24"),
                format!("{prefix} address net1 description \"lan\""),
                format!("{prefix} address wild1 wildcard-address 192.0.2.0/255.255.0.255"),
                format!("{prefix} address dns1 dns-name www.example.com"),
                format!("{prefix} address dns1 dns-name www.example.com ipv4-only"),
                format!("{prefix} address range1 range-address 192.0.2.10 to 192.0.2.20"),
                format!("{prefix} address-set set1 address net1"),
                format!("{prefix} address-set set1 address range1"),
            ]
        );

        let mut global = address_book();
        global.name = value_str(GLOBAL);
        assert!(global.set_lines().is_err());
    }

    #[test]
    fn parse_lines_with_description_first() {
        let mut state = SecurityAddressBook::from_id("book1").unwrap();
        for line in [
            "description \"test book\"",
            "attach zone trust",
            "address net1 description \"lan\"",
            "address net1 192.0.2.0/24",
            "address wild1 wildcard-address 192.0.2.0/255.255.0.255",
            "address dns1 dns-name www.example.com ipv4-only",
            "address range1 range-address 192.0.2.10 to 192.0.2.20",
            "address-set set1 address net1",
            "address-set set1 address range1",
        ] {
            state.parse_line(line).unwrap();
        }
        assert_eq!(state, address_book());
        assert!(state
            .parse_line("address range2 range-address 192.0.2.10")
            .is_err());
    }

    #[test]
    fn validation() {
        let mut diags = Diagnostics::default();
        address_book().validate(&mut diags, AttributePath::default());
        assert!(diags.errors.is_empty(), "{:?}", diags.errors);

        let mut config = address_book();
        config.name = value_str(GLOBAL);
        upsert_set_block(&mut config.range_address, |_| false, |address| {
            address.name = value_str("net1");
            address.from = value_str("192.0.2.1");
            address.to = value_str("192.0.2.2");
        });
        upsert_set_block(&mut config.address_set, |_| false, |address_set| {
            address_set.name = value_str("set2");
        });
        config.validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 3);

        let mut quoted = address_book();
        update_set_block(&mut quoted.network_address, |_| true, |address| {
            address.description = value_str("the \"lan\"");
        });
        update_set_block(&mut quoted.address_set, |_| true, |address_set| {
            address_set.description = value_str("\"set\"");
        });
        let mut diags = Diagnostics::default();
        quoted.validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 2, "{:?}", diags.errors);

        let mut defaulted = SecurityAddressBook::default();
        defaulted.normalize(&mut diags);
        assert_eq!(defaulted.compute_id(), GLOBAL);
    }
}
