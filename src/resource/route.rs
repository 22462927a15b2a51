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

//! Addressing and `as-path` statements shared by static and generate routes.

use anyhow::{bail, Result};
use tf_provider::{schema::Attribute, AttributePath, Diagnostics};

use crate::junos::{cut_prefix, trim_quotes, DEFAULT_WORD};
use crate::utils::{
    defaulted_string, flag, is_true, non_empty, optional_bool, optional_string, required_string,
    value_str, ValueBool, ValueStr,
};
use crate::validate::{self, NameFormat};

use super::routing_instance_prefix;

/// Hierarchy of a route of kind `static` or `generate`.
///
/// IPv6 destinations live in the `inet6.0` rib of their instance.
pub(super) fn route_path(kind: &str, destination: &str, routing_instance: &str) -> String {
    let instance = routing_instance_prefix(routing_instance);
    if !destination.contains(':') {
        format!("{instance}routing-options {kind} route {destination}")
    } else if instance.is_empty() {
        format!("routing-options rib inet6.0 {kind} route {destination}")
    } else {
        format!("{instance}routing-options rib {routing_instance}.inet6.0 {kind} route {destination}")
    }
}

pub(super) fn parse_route_id(id: &str) -> Option<(&str, &str)> {
    let mut parts = id.split(crate::junos::ID_SEPARATOR);
    let destination = parts.next().filter(|part| !part.is_empty())?;
    let routing_instance = parts.next().filter(|part| !part.is_empty())?;
    if parts.next().is_some() {
        return None;
    }
    Some((destination, routing_instance))
}

pub(super) fn key_attributes() -> [(&'static str, Attribute); 2] {
    [
        ("destination", required_string("The destination for the route")),
        (
            "routing_instance",
            defaulted_string("Routing instance for the route, `default` for the main instance"),
        ),
    ]
}

pub(super) fn validate_keys(
    diags: &mut Diagnostics,
    destination: &ValueStr,
    routing_instance: &ValueStr,
) {
    validate::cidr_network(diags, AttributePath::new("destination"), destination);
    validate::name_object(
        diags,
        AttributePath::new("routing_instance"),
        routing_instance,
        63,
        NameFormat::Default,
        &[],
    );
}

pub(super) fn default_routing_instance(routing_instance: &mut ValueStr) {
    if routing_instance.is_null() {
        *routing_instance = value_str(DEFAULT_WORD);
    }
}

/// `as-path` options of a route
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(super) struct AsPath {
    pub aggregator_address: ValueStr,
    pub aggregator_as_number: ValueStr,
    pub atomic_aggregate: ValueBool,
    pub origin: ValueStr,
    pub path: ValueStr,
}

impl AsPath {
    pub(super) fn attributes() -> [(&'static str, Attribute); 5] {
        [
            (
                "as_path_aggregator_address",
                optional_string("Address of BGP system to add AGGREGATOR path attribute to route"),
            ),
            (
                "as_path_aggregator_as_number",
                optional_string("AS number to add AGGREGATOR path attribute to route"),
            ),
            (
                "as_path_atomic_aggregate",
                optional_bool("Add ATOMIC_AGGREGATE path attribute to route"),
            ),
            ("as_path_origin", optional_string("Define origin")),
            ("as_path_path", optional_string("Path to as-path")),
        ]
    }

    pub(super) fn validate(&self, diags: &mut Diagnostics) {
        validate::ip_address(
            diags,
            AttributePath::new("as_path_aggregator_address"),
            &self.aggregator_address,
        );
        if self.aggregator_address.is_null() != self.aggregator_as_number.is_null() {
            diags.error_short(
                "as_path_aggregator_address and as_path_aggregator_as_number must be set together",
                AttributePath::new("as_path_aggregator_address"),
            );
        }
        validate::bool_true(
            diags,
            AttributePath::new("as_path_atomic_aggregate"),
            &self.atomic_aggregate,
        );
        validate::one_of(
            diags,
            AttributePath::new("as_path_origin"),
            &self.origin,
            &["egp", "igp", "incomplete"],
        );
    }

    pub(super) fn set_lines(&self, set_prefix: &str) -> Vec<String> {
        let mut lines = Vec::new();
        if let (Some(address), Some(as_number)) = (
            non_empty(&self.aggregator_address),
            non_empty(&self.aggregator_as_number),
        ) {
            lines.push(format!("{set_prefix}as-path aggregator {as_number} {address}"));
        }
        if is_true(&self.atomic_aggregate) {
            lines.push(format!("{set_prefix}as-path atomic-aggregate"));
        }
        if let Some(origin) = non_empty(&self.origin) {
            lines.push(format!("{set_prefix}as-path origin {origin}"));
        }
        if let Some(path) = non_empty(&self.path) {
            lines.push(format!("{set_prefix}as-path path \"{path}\""));
        }
        lines
    }

    /// Consume an `as-path` line, `false` for any other statement
    pub(super) fn parse_line(&mut self, mut line: &str) -> Result<bool> {
        if !cut_prefix(&mut line, "as-path ") {
            return Ok(false);
        }
        if cut_prefix(&mut line, "aggregator ") {
            let Some((as_number, address)) = line.split_once(' ') else {
                bail!("can't read values for as-path aggregator in {line:?}: not enough fields");
            };
            self.aggregator_as_number = value_str(as_number);
            self.aggregator_address = value_str(address);
        } else if line == "atomic-aggregate" {
            self.atomic_aggregate = flag(true);
        } else if cut_prefix(&mut line, "origin ") {
            self.origin = value_str(line);
        } else if cut_prefix(&mut line, "path ") {
            self.path = value_str(trim_quotes(line));
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use tf_provider::Value;

    use super::*;

    #[test]
    fn paths() {
        assert_eq!(
            route_path("static", "192.0.2.0/24", "default"),
            "routing-options static route 192.0.2.0/24"
        );
        assert_eq!(
            route_path("static", "192.0.2.0/24", "vrf1"),
            "routing-instances vrf1 routing-options static route 192.0.2.0/24"
        );
        assert_eq!(
            route_path("generate", "2001:db8::/32", "default"),
            "routing-options rib inet6.0 generate route 2001:db8::/32"
        );
        assert_eq!(
            route_path("static", "2001:db8::/32", "vrf1"),
            "routing-instances vrf1 routing-options rib vrf1.inet6.0 static route 2001:db8::/32"
        );
    }

    #[test]
    fn ids() {
        assert_eq!(
            parse_route_id("192.0.2.0/24_-_default"),
            Some(("192.0.2.0/24", "default"))
        );
        assert_eq!(parse_route_id("192.0.2.0/24"), None);
        assert_eq!(parse_route_id("192.0.2.0/24_-_a_-_b"), None);
    }

    #[test]
    fn as_path_lines() {
        let mut as_path = AsPath::default();
        for line in [
            "as-path aggregator 65000 192.0.2.1",
            "as-path atomic-aggregate",
            "as-path origin igp",
            "as-path path \"65000 65001\"",
        ] {
            assert!(as_path.parse_line(line).unwrap());
        }
        assert!(!as_path.parse_line("metric 5").unwrap());
        assert!(as_path.parse_line("as-path aggregator 65000").is_err());
        assert_eq!(
            as_path.set_lines("set "),
            vec![
                "set as-path aggregator 65000 192.0.2.1",
                "set as-path atomic-aggregate",
                "set as-path origin igp",
                "set as-path path \"65000 65001\"",
            ]
        );

        let mut diags = Diagnostics::default();
        as_path.aggregator_as_number = Value::Null;
        as_path.validate(&mut diags);
        assert_eq!(diags.errors.len(), 1);
    }
}
