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
    schema::{Block, Description, Schema},
    value::{ValueList, ValueNumber},
    AttributePath, Diagnostics,
};

use crate::junos::{cut_prefix, ID_SEPARATOR};
use crate::utils::{
    flag, id_attribute, is_true, non_empty, number, optional_bool, optional_list,
    optional_number, optional_string, parse_number, push_str, replace_if_changed, strings,
    value_str, ValueBool, ValueStr, WithNormalize, WithSchema, WithValidate,
};
use crate::validate::{self, NameFormat};

use super::route::{self, AsPath};
use super::{JunosResource, Requirement};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRoute {
    pub id: ValueStr,
    pub destination: ValueStr,
    pub routing_instance: ValueStr,
    pub active: ValueBool,
    pub as_path_aggregator_address: ValueStr,
    pub as_path_aggregator_as_number: ValueStr,
    pub as_path_atomic_aggregate: ValueBool,
    pub as_path_origin: ValueStr,
    pub as_path_path: ValueStr,
    pub brief: ValueBool,
    pub community: ValueList<ValueStr>,
    pub discard: ValueBool,
    pub full: ValueBool,
    pub metric: ValueNumber,
    pub next_table: ValueStr,
    pub passive: ValueBool,
    pub policy: ValueList<ValueStr>,
    pub preference: ValueNumber,
}

impl GenerateRoute {
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
}

impl WithSchema for GenerateRoute {
    fn schema() -> Schema {
        let mut attributes = map! {
            "id" => id_attribute(),
            "active" => optional_bool("Remove inactive route from forwarding table"),
            "brief" => optional_bool("Include longest common sequences from contributing paths"),
            "community" => optional_list("BGP community"),
            "discard" => optional_bool("Use discard next hop"),
            "full" => optional_bool("Include all AS numbers from all contributing paths"),
            "metric" => optional_number("Metric for generate route"),
            "next_table" => optional_string("Next hop to another table"),
            "passive" => optional_bool("Retain inactive route in forwarding table"),
            "policy" => optional_list("Policy filter"),
            "preference" => optional_number("Preference for generate route"),
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
                description: Description::plain("Provides a generate route resource"),
                attributes,
                ..Default::default()
            },
        }
    }
}

impl WithValidate for GenerateRoute {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        route::validate_keys(diags, &self.destination, &self.routing_instance);
        self.as_path().validate(diags);
        for (name, value) in [
            ("active", &self.active),
            ("brief", &self.brief),
            ("discard", &self.discard),
            ("full", &self.full),
            ("passive", &self.passive),
        ] {
            validate::bool_true(diags, AttributePath::new(name), value);
        }
        validate::conflicts(
            diags,
            AttributePath::new("active"),
            "active",
            "passive",
            !self.active.is_null(),
            !self.passive.is_null(),
        );
        validate::conflicts(
            diags,
            AttributePath::new("brief"),
            "brief",
            "full",
            !self.brief.is_null(),
            !self.full.is_null(),
        );
        validate::conflicts(
            diags,
            AttributePath::new("discard"),
            "discard",
            "next_table",
            !self.discard.is_null(),
            !self.next_table.is_null(),
        );
        if let tf_provider::Value::Value(policies) = &self.policy {
            for (index, policy) in policies.iter().enumerate() {
                validate::name_object(
                    diags,
                    AttributePath::new("policy").index(index as i64),
                    policy,
                    63,
                    NameFormat::Default,
                    &[],
                );
            }
        }
    }
}

impl WithNormalize for GenerateRoute {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        route::default_routing_instance(&mut self.routing_instance);
    }
}

impl JunosResource for GenerateRoute {
    const TYPE_NAME: &'static str = "generate_route";
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
        Some(Self {
            id: value_str(id),
            destination: value_str(destination),
            routing_instance: value_str(routing_instance),
            ..Default::default()
        })
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
            "generate",
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
        if is_true(&self.brief) {
            lines.push(format!("{set_prefix}brief"));
        }
        for community in strings(&self.community) {
            lines.push(format!("{set_prefix}community {community}"));
        }
        if is_true(&self.discard) {
            lines.push(format!("{set_prefix}discard"));
        }
        if is_true(&self.full) {
            lines.push(format!("{set_prefix}full"));
        }
        if let Some(metric) = number(&self.metric).filter(|metric| *metric > 0) {
            lines.push(format!("{set_prefix}metric {metric}"));
        }
        if let Some(table) = non_empty(&self.next_table) {
            lines.push(format!("{set_prefix}next-table {table}"));
        }
        if is_true(&self.passive) {
            lines.push(format!("{set_prefix}passive"));
        }
        for policy in strings(&self.policy) {
            lines.push(format!("{set_prefix}policy {policy}"));
        }
        if let Some(preference) = number(&self.preference).filter(|preference| *preference > 0) {
            lines.push(format!("{set_prefix}preference {preference}"));
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
            "brief" => self.brief = flag(true),
            "discard" => self.discard = flag(true),
            "full" => self.full = flag(true),
            "passive" => self.passive = flag(true),
            _ => {
                if cut_prefix(&mut line, "community ") {
                    push_str(&mut self.community, line);
                } else if cut_prefix(&mut line, "metric ") {
                    self.metric = parse_number(line)?;
                } else if cut_prefix(&mut line, "next-table ") {
                    self.next_table = value_str(line);
                } else if cut_prefix(&mut line, "policy ") {
                    push_str(&mut self.policy, line);
                } else if cut_prefix(&mut line, "preference ") {
                    self.preference = parse_number(line)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tf_provider::Value;

    use super::*;

    fn generate_route() -> GenerateRoute {
        let mut route = GenerateRoute::from_id("192.0.2.0/24_-_vrf1").unwrap();
        route.active = flag(true);
        route.as_path_origin = value_str("igp");
        route.brief = flag(true);
        push_str(&mut route.community, "no-advertise");
        route.metric = Value::Value(5);
        route.next_table = value_str("vrf2.inet.0");
        push_str(&mut route.policy, "export_gen");
        route.preference = Value::Value(130);
        route
    }

    #[test]
    fn set_lines() {
        let prefix = "set routing-instances vrf1 routing-options generate route 192.0.2.0/24";
        assert_eq!(
            generate_route().set_lines().unwrap(),
            vec![
                format!("{prefix} active"),
                format!("{prefix} as-path origin igp"),
                format!("{prefix} brief"),
                format!("{prefix} community no-advertise"),
                format!("{prefix} metric 5"),
                format!("{prefix} next-table vrf2.inet.0"),
                format!("{prefix} policy export_gen"),
                format!("{prefix} preference 130"),
            ]
        );
        assert_eq!(
            generate_route().delete_lines(),
            vec!["delete routing-instances vrf1 routing-options generate route 192.0.2.0/24"]
        );
        assert_eq!(
            generate_route().requirements(),
            vec![Requirement::RoutingInstance("vrf1".to_owned())]
        );
    }

    #[test]
    fn parse_lines() {
        let mut state = GenerateRoute::from_id("192.0.2.0/24_-_vrf1").unwrap();
        for line in [
            "active",
            "as-path origin igp",
            "brief",
            "community no-advertise",
            "metric 5",
            "next-table vrf2.inet.0",
            "policy export_gen",
            "preference 130",
        ] {
            state.parse_line(line).unwrap();
        }
        assert_eq!(state, generate_route());
    }

    #[test]
    fn conflicts_and_default_instance() {
        let mut diags = Diagnostics::default();
        let mut config = generate_route();
        config.passive = flag(true);
        config.full = flag(true);
        config.discard = flag(true);
        config.validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 3);

        let mut config = GenerateRoute {
            destination: value_str("2001:db8::/32"),
            ..Default::default()
        };
        config.normalize(&mut diags);
        assert_eq!(config.routing_instance, value_str("default"));
        assert_eq!(config.compute_id(), "2001:db8::/32_-_default");
        assert_eq!(
            config.config_path(),
            "routing-options rib inet6.0 generate route 2001:db8::/32"
        );
    }
}
