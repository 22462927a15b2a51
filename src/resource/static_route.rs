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

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tf_provider::{
    map,
    schema::{Block, Description, NestedBlock, Schema},
    value::{ValueList, ValueNumber},
    AttributePath, Diagnostics, Value,
};

use crate::junos::{cut_prefix, ID_SEPARATOR};
use crate::utils::{
    blocks, flag, id_attribute, is_true, list_block_mut, non_empty, normalize_block_list, number,
    optional_bool, optional_list, optional_number, optional_string, parse_number, push_str,
    replace_if_changed, required_string, strings, value_str, ValueBool, ValueStr, WithNormalize,
    WithSchema, WithValidate,
};

use super::route::{self, AsPath};
use super::{JunosResource, Requirement};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRoute {
    pub id: ValueStr,
    pub destination: ValueStr,
    pub routing_instance: ValueStr,
    pub active: ValueBool,
    pub as_path_aggregator_address: ValueStr,
    pub as_path_aggregator_as_number: ValueStr,
    pub as_path_atomic_aggregate: ValueBool,
    pub as_path_origin: ValueStr,
    pub as_path_path: ValueStr,
    pub community: ValueList<ValueStr>,
    pub discard: ValueBool,
    pub install: ValueBool,
    pub metric: ValueNumber,
    pub next_hop: ValueList<ValueStr>,
    pub next_table: ValueStr,
    pub no_install: ValueBool,
    pub no_readvertise: ValueBool,
    pub no_resolve: ValueBool,
    pub no_retain: ValueBool,
    pub passive: ValueBool,
    pub preference: ValueNumber,
    pub qualified_next_hop: ValueList<Value<QualifiedNextHop>>,
    pub readvertise: ValueBool,
    pub receive: ValueBool,
    pub reject: ValueBool,
    pub resolve: ValueBool,
    pub retain: ValueBool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualifiedNextHop {
    pub next_hop: ValueStr,
    pub interface: ValueStr,
    pub metric: ValueNumber,
    pub preference: ValueNumber,
}

impl StaticRoute {
    fn as_path(&self) -> AsPath {
        AsPath {
            aggregator_address: self.as_path_aggregator_address.clone(),
            aggregator_as_number: self.as_path_aggregator_as_number.clone(),
            atomic_aggregate: self.as_path_atomic_aggregate.clone(),
            origin: self.as_path_origin.clone(),
            path: self.as_path_path.clone(),
        }
    }

    fn set_as_path(&mut self, as_path: AsPath) {
        self.as_path_aggregator_address = as_path.aggregator_address;
        self.as_path_aggregator_as_number = as_path.aggregator_as_number;
        self.as_path_atomic_aggregate = as_path.atomic_aggregate;
        self.as_path_origin = as_path.origin;
        self.as_path_path = as_path.path;
    }

    fn flags(&self) -> [(&'static str, &ValueBool); 13] {
        [
            ("active", &self.active),
            ("discard", &self.discard),
            ("install", &self.install),
            ("no_install", &self.no_install),
            ("no_readvertise", &self.no_readvertise),
            ("no_resolve", &self.no_resolve),
            ("no_retain", &self.no_retain),
            ("passive", &self.passive),
            ("readvertise", &self.readvertise),
            ("receive", &self.receive),
            ("reject", &self.reject),
            ("resolve", &self.resolve),
            ("retain", &self.retain),
        ]
    }
}

impl WithSchema for StaticRoute {
    fn schema() -> Schema {
        let mut attributes = map! {
            "id" => id_attribute(),
            "active" => optional_bool("Remove inactive route from forwarding table"),
            "community" => optional_list("BGP community"),
            "discard" => optional_bool("Drop packets to destination; send no ICMP unreachables"),
            "install" => optional_bool("Install route into forwarding table"),
            "metric" => optional_number("Metric for static route"),
            "next_hop" => optional_list("Next-hop to destination"),
            "next_table" => optional_string("Next hop to another table"),
            "no_install" => optional_bool("Don't install route into forwarding table"),
            "no_readvertise" => optional_bool("Don't mark route as eligible to be readvertised"),
            "no_resolve" => optional_bool("Don't allow resolution of indirectly connected next hops"),
            "no_retain" => optional_bool("Don't always keep route in forwarding table"),
            "passive" => optional_bool("Retain inactive route in forwarding table"),
            "preference" => optional_number("Preference for static route"),
            "readvertise" => optional_bool("Mark route as eligible to be readvertised"),
            "receive" => optional_bool("Install a receive route for the destination"),
            "reject" => optional_bool("Drop packets to destination; send ICMP unreachables"),
            "resolve" => optional_bool("Allow resolution of indirectly connected next hops"),
            "retain" => optional_bool("Always keep route in forwarding table"),
        };
        attributes.extend(
            route::key_attributes()
                .into_iter()
                .chain(AsPath::attributes())
                .map(|(name, attribute)| (name.to_owned(), attribute)),
        );
        Schema {
            version: 1,
            block: Block {
                description: Description::plain("Provides a static route resource"),
                attributes,
                blocks: map! {
                    "qualified_next_hop" => NestedBlock::List(Block {
                        description: Description::plain("Next-hop with qualifiers"),
                        attributes: map! {
                            "next_hop" => required_string("Next-hop with qualifiers to destination"),
                            "interface" => optional_string("Interface of qualified next hop"),
                            "metric" => optional_number("Metric of qualified next hop"),
                            "preference" => optional_number("Preference of qualified next hop"),
                        },
                        ..Default::default()
                    }),
                },
                ..Default::default()
            },
        }
    }
}

impl WithValidate for StaticRoute {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        route::validate_keys(diags, &self.destination, &self.routing_instance);
        self.as_path().validate(diags);
        for (name, value) in self.flags() {
            crate::validate::bool_true(diags, AttributePath::new(name), value);
        }
        for (name, other, set, other_set) in [
            ("active", "passive", &self.active, &self.passive),
            ("install", "no_install", &self.install, &self.no_install),
            ("readvertise", "no_readvertise", &self.readvertise, &self.no_readvertise),
            ("resolve", "no_resolve", &self.resolve, &self.no_resolve),
            ("retain", "no_retain", &self.retain, &self.no_retain),
        ] {
            crate::validate::conflicts(
                diags,
                AttributePath::new(name),
                name,
                other,
                !set.is_null(),
                !other_set.is_null(),
            );
        }

        let has_next_hop =
            strings(&self.next_hop).next().is_some() || blocks(&self.qualified_next_hop).next().is_some();
        let targets = [
            ("discard", !self.discard.is_null()),
            ("receive", !self.receive.is_null()),
            ("reject", !self.reject.is_null()),
            ("next_table", !self.next_table.is_null()),
            ("next_hop", has_next_hop),
        ];
        let set: Vec<_> = targets
            .iter()
            .filter(|(_, set)| *set)
            .map(|(name, _)| *name)
            .collect();
        if set.len() > 1 {
            diags.error_short(
                format!("only one of {} can be set", set.join(", ")),
                AttributePath::new(set[0]),
            );
        }

        if let Value::Value(list) = &self.qualified_next_hop {
            let mut seen = Vec::new();
            for (index, block) in list.iter().enumerate() {
                let Value::Value(block) = block else {
                    continue;
                };
                let path = AttributePath::new("qualified_next_hop").index(index as i64);
                if let Value::Value(next_hop) = &block.next_hop {
                    if seen.contains(&next_hop) {
                        diags.error_short(
                            format!("multiple blocks qualified_next_hop with the same next_hop {next_hop}"),
                            path.clone().attribute("next_hop"),
                        );
                    }
                    seen.push(next_hop);
                }
                crate::validate::name_object(
                    diags,
                    path.attribute("interface"),
                    &block.interface,
                    250,
                    crate::validate::NameFormat::AddressName,
                    &[],
                );
            }
        }
    }
}

impl WithNormalize for StaticRoute {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        route::default_routing_instance(&mut self.routing_instance);
        normalize_block_list(&mut self.qualified_next_hop);
    }
}

impl JunosResource for StaticRoute {
    const TYPE_NAME: &'static str = "static_route";
    const ID_FORMAT: &'static str = "<destination>_-_<routing_instance>";

    fn id_mut(&mut self) -> &mut ValueStr {
        &mut self.id
    }

    fn compute_id(&self) -> String {
        format!(
            "{}{ID_SEPARATOR}{}",
            self.destination.as_str(),
            self.routing_instance.as_str()
        )
    }

    fn from_id(id: &str) -> Option<Self> {
        let (destination, routing_instance) = route::parse_route_id(id)?;
        let mut route = Self {
            id: value_str(id),
            destination: value_str(destination),
            routing_instance: value_str(routing_instance),
            ..Default::default()
        };
        normalize_block_list(&mut route.qualified_next_hop);
        Some(route)
    }

    fn replace_triggers(&self, prior: &Self) -> Vec<AttributePath> {
        let mut triggers = Vec::new();
        replace_if_changed(&mut triggers, "destination", &prior.destination, &self.destination);
        replace_if_changed(
            &mut triggers,
            "routing_instance",
            &prior.routing_instance,
            &self.routing_instance,
        );
        triggers
    }

    fn requirements(&self) -> Vec<Requirement> {
        vec![Requirement::RoutingInstance(
            self.routing_instance.as_str().to_owned(),
        )]
    }

    fn config_path(&self) -> String {
        route::route_path(
            "static",
            self.destination.as_str(),
            self.routing_instance.as_str(),
        )
    }

    fn set_lines(&self) -> Result<Vec<String>> {
        let set_prefix = format!("set {} ", self.config_path());
        let mut lines = Vec::new();

        if is_true(&self.active) {
            lines.push(format!("{set_prefix}active"));
        }
        lines.extend(self.as_path().set_lines(&set_prefix));
        for community in strings(&self.community) {
            lines.push(format!("{set_prefix}community {community}"));
        }
        if is_true(&self.discard) {
            lines.push(format!("{set_prefix}discard"));
        }
        if is_true(&self.install) {
            lines.push(format!("{set_prefix}install"));
        }
        if let Some(metric) = number(&self.metric) {
            lines.push(format!("{set_prefix}metric {metric}"));
        }
        for next_hop in strings(&self.next_hop) {
            lines.push(format!("{set_prefix}next-hop {next_hop}"));
        }
        if let Some(table) = non_empty(&self.next_table) {
            lines.push(format!("{set_prefix}next-table {table}"));
        }
        for (statement, value) in [
            ("no-install", &self.no_install),
            ("no-readvertise", &self.no_readvertise),
            ("no-resolve", &self.no_resolve),
            ("no-retain", &self.no_retain),
            ("passive", &self.passive),
        ] {
            if is_true(value) {
                lines.push(format!("{set_prefix}{statement}"));
            }
        }
        if let Some(preference) = number(&self.preference) {
            lines.push(format!("{set_prefix}preference {preference}"));
        }
        for qualified in blocks(&self.qualified_next_hop) {
            let Some(next_hop) = non_empty(&qualified.next_hop) else {
                continue;
            };
            let qualified_prefix = format!("{set_prefix}qualified-next-hop {next_hop} ");
            lines.push(qualified_prefix.trim_end().to_owned());
            if let Some(interface) = non_empty(&qualified.interface) {
                lines.push(format!("{qualified_prefix}interface {interface}"));
            }
            if let Some(metric) = number(&qualified.metric) {
                lines.push(format!("{qualified_prefix}metric {metric}"));
            }
            if let Some(preference) = number(&qualified.preference) {
                lines.push(format!("{qualified_prefix}preference {preference}"));
            }
        }
        for (statement, value) in [
            ("readvertise", &self.readvertise),
            ("receive", &self.receive),
            ("reject", &self.reject),
            ("resolve", &self.resolve),
            ("retain", &self.retain),
        ] {
            if is_true(value) {
                lines.push(format!("{set_prefix}{statement}"));
            }
        }
        Ok(lines)
    }

    fn parse_line(&mut self, mut line: &str) -> Result<()> {
        let mut as_path = self.as_path();
        if as_path.parse_line(line)? {
            self.set_as_path(as_path);
            return Ok(());
        }
        match line {
            "active" => self.active = flag(true),
            "discard" => self.discard = flag(true),
            "install" => self.install = flag(true),
            "no-install" => self.no_install = flag(true),
            "no-readvertise" => self.no_readvertise = flag(true),
            "no-resolve" => self.no_resolve = flag(true),
            "no-retain" => self.no_retain = flag(true),
            "passive" => self.passive = flag(true),
            "readvertise" => self.readvertise = flag(true),
            "receive" => self.receive = flag(true),
            "reject" => self.reject = flag(true),
            "resolve" => self.resolve = flag(true),
            "retain" => self.retain = flag(true),
            _ => {
                if cut_prefix(&mut line, "community ") {
                    push_str(&mut self.community, line);
                } else if cut_prefix(&mut line, "metric ") {
                    self.metric = parse_number(line)?;
                } else if cut_prefix(&mut line, "next-hop ") {
                    push_str(&mut self.next_hop, line);
                } else if cut_prefix(&mut line, "next-table ") {
                    self.next_table = value_str(line);
                } else if cut_prefix(&mut line, "preference ") {
                    self.preference = parse_number(line)?;
                } else if cut_prefix(&mut line, "qualified-next-hop ") {
                    let (next_hop, mut option) = line.split_once(' ').unwrap_or((line, ""));
                    let qualified = list_block_mut(&mut self.qualified_next_hop, |block| {
                        block.next_hop.as_str() == next_hop
                    });
                    qualified.next_hop = value_str(next_hop);
                    if cut_prefix(&mut option, "interface ") {
                        qualified.interface = value_str(option);
                    } else if cut_prefix(&mut option, "metric ") {
                        qualified.metric = parse_number(option)?;
                    } else if cut_prefix(&mut option, "preference ") {
                        qualified.preference = parse_number(option)?;
                    }
                }
            }
        }
        Ok(())
    }
}
