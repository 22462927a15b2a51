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

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tf_provider::{
    map,
    schema::{Attribute, Block, Description, NestedBlock, Schema},
    value::{ValueList, ValueNumber},
    AttributePath, Diagnostics, Value,
};

use crate::junos::{
    cut_prefix, decode_junos_secret, quoted, trim_quotes, DEFAULT_WORD, ID_SEPARATOR,
};
use crate::utils::{
    block_mut, blocks, defaulted_string, flag, id_attribute, is_true, list_block_mut, non_empty,
    normalize_block_list, number, optional_bool, optional_list, optional_number, optional_string,
    parse_number, push_str, replace_if_changed, required_string, sensitive_string, strings,
    value_str, ValueBool, ValueStr, WithNormalize, WithSchema, WithValidate,
};
use crate::validate::{self, NameFormat};

use super::{routing_instance_prefix, JunosResource, Requirement};

const NLRI_TYPES: [&str; 5] = ["any", "flow", "labeled-unicast", "multicast", "unicast"];
const EVPN_NLRI_TYPES: [&str; 1] = ["signaling"];

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpNeighbor {
    pub id: ValueStr,
    pub ip: ValueStr,
    pub routing_instance: ValueStr,
    pub group: ValueStr,
    pub accept_remote_nexthop: ValueBool,
    pub advertise_external: ValueBool,
    pub advertise_external_conditional: ValueBool,
    pub advertise_inactive: ValueBool,
    pub advertise_peer_as: ValueBool,
    pub no_advertise_peer_as: ValueBool,
    pub as_override: ValueBool,
    pub authentication_algorithm: ValueStr,
    pub authentication_key: ValueStr,
    pub authentication_key_chain: ValueStr,
    pub cluster: ValueStr,
    pub damping: ValueBool,
    pub description: ValueStr,
    pub export: ValueList<ValueStr>,
    pub hold_time: ValueNumber,
    pub import: ValueList<ValueStr>,
    pub keep_all: ValueBool,
    pub keep_none: ValueBool,
    pub local_address: ValueStr,
    pub local_as: ValueStr,
    pub local_as_alias: ValueBool,
    pub local_as_loops: ValueNumber,
    pub local_as_no_prepend_global_as: ValueBool,
    pub local_as_private: ValueBool,
    pub local_interface: ValueStr,
    pub local_preference: ValueNumber,
    pub log_updown: ValueBool,
    pub metric_out: ValueNumber,
    pub metric_out_igp: ValueBool,
    pub metric_out_igp_delay_med_update: ValueBool,
    pub metric_out_igp_offset: ValueNumber,
    pub metric_out_minimum_igp: ValueBool,
    pub metric_out_minimum_igp_offset: ValueNumber,
    pub mtu_discovery: ValueBool,
    pub multihop: ValueBool,
    pub no_client_reflect: ValueBool,
    pub out_delay: ValueNumber,
    pub passive: ValueBool,
    pub peer_as: ValueStr,
    pub preference: ValueNumber,
    pub remove_private: ValueBool,
    pub tcp_aggressive_transmission: ValueBool,
    pub bfd_liveness_detection: Value<BfdLivenessDetection>,
    pub bgp_error_tolerance: Value<BgpErrorTolerance>,
    pub bgp_multipath: Value<BgpMultipath>,
    pub family_evpn: ValueList<Value<BgpFamily>>,
    pub family_inet: ValueList<Value<BgpFamily>>,
    pub family_inet6: ValueList<Value<BgpFamily>>,
    pub graceful_restart: Value<GracefulRestart>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BfdLivenessDetection {
    pub authentication_algorithm: ValueStr,
    pub authentication_key_chain: ValueStr,
    pub authentication_loose_check: ValueBool,
    pub detection_time_threshold: ValueNumber,
    pub holddown_interval: ValueNumber,
    pub minimum_interval: ValueNumber,
    pub minimum_receive_interval: ValueNumber,
    pub multiplier: ValueNumber,
    pub session_mode: ValueStr,
    pub transmit_interval_minimum_interval: ValueNumber,
    pub transmit_interval_threshold: ValueNumber,
    pub version: ValueStr,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpErrorTolerance {
    pub malformed_route_limit: ValueNumber,
    pub malformed_update_log_interval: ValueNumber,
    pub no_malformed_route_limit: ValueBool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpMultipath {
    pub allow_protection: ValueBool,
    pub disable: ValueBool,
    pub multiple_as: ValueBool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GracefulRestart {
    pub disable: ValueBool,
    pub restart_time: ValueNumber,
    pub stale_route_time: ValueNumber,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpFamily {
    pub nlri_type: ValueStr,
    pub accepted_prefix_limit: Value<PrefixLimit>,
    pub prefix_limit: Value<PrefixLimit>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixLimit {
    pub maximum: ValueNumber,
    pub teardown: ValueNumber,
    pub teardown_idle_timeout: ValueNumber,
    pub teardown_idle_timeout_forever: ValueBool,
}

/// `^\d+(\.\d+)?$`, plain or dotted AS number
fn is_as_number(value: &str) -> bool {
    let all_digits = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit());
    match value.split_once('.') {
        Some((high, low)) => all_digits(high) && all_digits(low),
        None => all_digits(value),
    }
}

impl BfdLivenessDetection {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn validate(&self, diags: &mut Diagnostics, path: AttributePath) {
        if self.is_empty() {
            diags.error_short("bfd_liveness_detection block is empty", path.clone());
        }
        validate::bool_true(
            diags,
            path.clone().attribute("authentication_loose_check"),
            &self.authentication_loose_check,
        );
        for (name, value, max) in [
            ("detection_time_threshold", &self.detection_time_threshold, 4_294_967_295),
            ("holddown_interval", &self.holddown_interval, 255_000),
            ("minimum_interval", &self.minimum_interval, 255_000),
            ("minimum_receive_interval", &self.minimum_receive_interval, 255_000),
            ("multiplier", &self.multiplier, 255),
            (
                "transmit_interval_minimum_interval",
                &self.transmit_interval_minimum_interval,
                255_000,
            ),
            ("transmit_interval_threshold", &self.transmit_interval_threshold, 4_294_967_295),
        ] {
            validate::int_between(diags, path.clone().attribute(name), value, 1, max);
        }
        validate::one_of(
            diags,
            path.clone().attribute("session_mode"),
            &self.session_mode,
            &["automatic", "multihop", "single-hop"],
        );
        validate::one_of(
            diags,
            path.attribute("version"),
            &self.version,
            &["0", "1", "automatic"],
        );
    }

    fn set_lines(&self, set_prefix: &str) -> Vec<String> {
        let set_prefix = format!("{set_prefix}bfd-liveness-detection ");
        let mut lines = Vec::new();
        if let Some(algorithm) = non_empty(&self.authentication_algorithm) {
            lines.push(format!("{set_prefix}authentication algorithm {algorithm}"));
        }
        if let Some(key_chain) = non_empty(&self.authentication_key_chain) {
            lines.push(format!("{set_prefix}authentication key-chain {key_chain}"));
        }
        if is_true(&self.authentication_loose_check) {
            lines.push(format!("{set_prefix}authentication loose-check"));
        }
        for (statement, value) in [
            ("detection-time threshold", &self.detection_time_threshold),
            ("holddown-interval", &self.holddown_interval),
            ("minimum-interval", &self.minimum_interval),
            ("minimum-receive-interval", &self.minimum_receive_interval),
            ("multiplier", &self.multiplier),
        ] {
            if let Some(value) = number(value) {
                lines.push(format!("{set_prefix}{statement} {value}"));
            }
        }
        if let Some(mode) = non_empty(&self.session_mode) {
            lines.push(format!("{set_prefix}session-mode {mode}"));
        }
        for (statement, value) in [
            ("transmit-interval minimum-interval", &self.transmit_interval_minimum_interval),
            ("transmit-interval threshold", &self.transmit_interval_threshold),
        ] {
            if let Some(value) = number(value) {
                lines.push(format!("{set_prefix}{statement} {value}"));
            }
        }
        if let Some(version) = non_empty(&self.version) {
            lines.push(format!("{set_prefix}version {version}"));
        }
        lines
    }

    fn parse_line(&mut self, mut line: &str) -> Result<()> {
        if cut_prefix(&mut line, "authentication algorithm ") {
            self.authentication_algorithm = value_str(line);
        } else if cut_prefix(&mut line, "authentication key-chain ") {
            self.authentication_key_chain = value_str(trim_quotes(line));
        } else if line == "authentication loose-check" {
            self.authentication_loose_check = flag(true);
        } else if cut_prefix(&mut line, "detection-time threshold ") {
            self.detection_time_threshold = parse_number(line)?;
        } else if cut_prefix(&mut line, "holddown-interval ") {
            self.holddown_interval = parse_number(line)?;
        } else if cut_prefix(&mut line, "minimum-interval ") {
            self.minimum_interval = parse_number(line)?;
        } else if cut_prefix(&mut line, "minimum-receive-interval ") {
            self.minimum_receive_interval = parse_number(line)?;
        } else if cut_prefix(&mut line, "multiplier ") {
            self.multiplier = parse_number(line)?;
        } else if cut_prefix(&mut line, "session-mode ") {
            self.session_mode = value_str(line);
        } else if cut_prefix(&mut line, "transmit-interval minimum-interval ") {
            self.transmit_interval_minimum_interval = parse_number(line)?;
        } else if cut_prefix(&mut line, "transmit-interval threshold ") {
            self.transmit_interval_threshold = parse_number(line)?;
        } else if cut_prefix(&mut line, "version ") {
            self.version = value_str(line);
        }
        Ok(())
    }
}

impl BgpErrorTolerance {
    fn validate(&self, diags: &mut Diagnostics, path: AttributePath) {
        validate::int_between(
            diags,
            path.clone().attribute("malformed_route_limit"),
            &self.malformed_route_limit,
            0,
            4_294_967_295,
        );
        validate::int_between(
            diags,
            path.clone().attribute("malformed_update_log_interval"),
            &self.malformed_update_log_interval,
            10,
            65535,
        );
        validate::bool_true(
            diags,
            path.clone().attribute("no_malformed_route_limit"),
            &self.no_malformed_route_limit,
        );
        validate::conflicts(
            diags,
            path.attribute("no_malformed_route_limit"),
            "malformed_route_limit",
            "no_malformed_route_limit",
            !self.malformed_route_limit.is_null(),
            !self.no_malformed_route_limit.is_null(),
        );
    }

    fn set_lines(&self, lines: &mut Vec<String>, set_prefix: &str) {
        let set_prefix = format!("{set_prefix}bgp-error-tolerance");
        lines.push(set_prefix.clone());
        if let Some(limit) = number(&self.malformed_route_limit) {
            lines.push(format!("{set_prefix} malformed-route-limit {limit}"));
        }
        if let Some(interval) = number(&self.malformed_update_log_interval) {
            lines.push(format!("{set_prefix} malformed-update-log-interval {interval}"));
        }
        if is_true(&self.no_malformed_route_limit) {
            lines.push(format!("{set_prefix} no-malformed-route-limit"));
        }
    }

    fn parse_line(&mut self, mut line: &str) -> Result<()> {
        if cut_prefix(&mut line, "malformed-route-limit ") {
            self.malformed_route_limit = parse_number(line)?;
        } else if cut_prefix(&mut line, "malformed-update-log-interval ") {
            self.malformed_update_log_interval = parse_number(line)?;
        } else if line == "no-malformed-route-limit" {
            self.no_malformed_route_limit = flag(true);
        }
        Ok(())
    }
}

impl BgpMultipath {
    fn options(&self) -> [(&'static str, &'static str, &ValueBool); 3] {
        [
            ("allow-protection", "allow_protection", &self.allow_protection),
            ("disable", "disable", &self.disable),
            ("multiple-as", "multiple_as", &self.multiple_as),
        ]
    }

    fn set_lines(&self, lines: &mut Vec<String>, set_prefix: &str) {
        let set_prefix = format!("{set_prefix}multipath");
        lines.push(set_prefix.clone());
        for (statement, _, value) in self.options() {
            if is_true(value) {
                lines.push(format!("{set_prefix} {statement}"));
            }
        }
    }

    fn parse_line(&mut self, line: &str) {
        match line {
            "allow-protection" => self.allow_protection = flag(true),
            "disable" => self.disable = flag(true),
            "multiple-as" => self.multiple_as = flag(true),
            _ => {}
        }
    }
}

impl GracefulRestart {
    fn validate(&self, diags: &mut Diagnostics, path: AttributePath) {
        validate::bool_true(diags, path.clone().attribute("disable"), &self.disable);
        for (name, value) in [
            ("restart_time", &self.restart_time),
            ("stale_route_time", &self.stale_route_time),
        ] {
            validate::int_between(diags, path.clone().attribute(name), value, 1, 600);
            validate::conflicts(
                diags,
                path.clone().attribute(name),
                name,
                "disable",
                !value.is_null(),
                !self.disable.is_null(),
            );
        }
    }

    fn set_lines(&self, lines: &mut Vec<String>, set_prefix: &str) {
        let set_prefix = format!("{set_prefix}graceful-restart");
        lines.push(set_prefix.clone());
        if is_true(&self.disable) {
            lines.push(format!("{set_prefix} disable"));
        }
        if let Some(time) = number(&self.restart_time) {
            lines.push(format!("{set_prefix} restart-time {time}"));
        }
        if let Some(time) = number(&self.stale_route_time) {
            lines.push(format!("{set_prefix} stale-routes-time {time}"));
        }
    }

    fn parse_line(&mut self, mut line: &str) -> Result<()> {
        if line == "disable" {
            self.disable = flag(true);
        } else if cut_prefix(&mut line, "restart-time ") {
            self.restart_time = parse_number(line)?;
        } else if cut_prefix(&mut line, "stale-routes-time ") {
            self.stale_route_time = parse_number(line)?;
        }
        Ok(())
    }
}

impl PrefixLimit {
    fn validate(&self, diags: &mut Diagnostics, path: AttributePath, block: &str, family: &str) {
        if self.maximum.is_null() {
            diags.error_short(
                format!("maximum must be specified in {block} block in {family} block"),
                path.clone().attribute("maximum"),
            );
        }
        validate::int_between(
            diags,
            path.clone().attribute("maximum"),
            &self.maximum,
            1,
            4_294_967_295,
        );
        validate::int_between(diags, path.clone().attribute("teardown"), &self.teardown, 1, 100);
        validate::int_between(
            diags,
            path.clone().attribute("teardown_idle_timeout"),
            &self.teardown_idle_timeout,
            1,
            2400,
        );
        validate::bool_true(
            diags,
            path.clone().attribute("teardown_idle_timeout_forever"),
            &self.teardown_idle_timeout_forever,
        );
        validate::conflicts(
            diags,
            path.attribute("teardown_idle_timeout"),
            "teardown_idle_timeout",
            "teardown_idle_timeout_forever",
            !self.teardown_idle_timeout.is_null(),
            !self.teardown_idle_timeout_forever.is_null(),
        );
    }

    fn set_lines(&self, lines: &mut Vec<String>, set_prefix: &str) {
        if let Some(maximum) = number(&self.maximum) {
            lines.push(format!("{set_prefix}maximum {maximum}"));
        }
        if let Some(teardown) = number(&self.teardown) {
            lines.push(format!("{set_prefix}teardown {teardown}"));
        }
        if let Some(timeout) = number(&self.teardown_idle_timeout) {
            lines.push(format!("{set_prefix}teardown idle-timeout {timeout}"));
        }
        if is_true(&self.teardown_idle_timeout_forever) {
            lines.push(format!("{set_prefix}teardown idle-timeout forever"));
        }
    }

    fn parse_line(&mut self, mut line: &str) -> Result<()> {
        if cut_prefix(&mut line, "maximum ") {
            self.maximum = parse_number(line)?;
        } else if line == "teardown idle-timeout forever" {
            self.teardown_idle_timeout_forever = flag(true);
        } else if cut_prefix(&mut line, "teardown idle-timeout ") {
            self.teardown_idle_timeout = parse_number(line)?;
        } else if cut_prefix(&mut line, "teardown ") {
            self.teardown = parse_number(line)?;
        }
        Ok(())
    }
}

impl BgpFamily {
    fn set_lines(&self, lines: &mut Vec<String>, set_prefix: &str) {
        let Some(nlri_type) = non_empty(&self.nlri_type) else {
            return;
        };
        let set_prefix = format!("{set_prefix}{nlri_type}");
        lines.push(set_prefix.clone());
        if let Value::Value(limit) = &self.accepted_prefix_limit {
            limit.set_lines(lines, &format!("{set_prefix} accepted-prefix-limit "));
        }
        if let Value::Value(limit) = &self.prefix_limit {
            limit.set_lines(lines, &format!("{set_prefix} prefix-limit "));
        }
    }

    fn parse_line(&mut self, mut line: &str) -> Result<()> {
        if cut_prefix(&mut line, "accepted-prefix-limit ") {
            block_mut(&mut self.accepted_prefix_limit).parse_line(line)?;
        } else if cut_prefix(&mut line, "prefix-limit ") {
            block_mut(&mut self.prefix_limit).parse_line(line)?;
        }
        Ok(())
    }
}

fn validate_families(
    diags: &mut Diagnostics,
    name: &'static str,
    families: &ValueList<Value<BgpFamily>>,
    nlri_types: &[&str],
) {
    let Value::Value(families) = families else {
        return;
    };
    let mut seen = Vec::new();
    for (index, family) in families.iter().enumerate() {
        let Value::Value(family) = family else {
            continue;
        };
        let path = AttributePath::new(name).index(index as i64);
        validate::one_of(
            diags,
            path.clone().attribute("nlri_type"),
            &family.nlri_type,
            nlri_types,
        );
        if let Value::Value(nlri_type) = &family.nlri_type {
            if seen.contains(&nlri_type) {
                diags.error_short(
                    format!("multiple {name} blocks with the same nlri_type {nlri_type:?}"),
                    path.clone().attribute("nlri_type"),
                );
            }
            seen.push(nlri_type);
        }
        if let Value::Value(limit) = &family.accepted_prefix_limit {
            limit.validate(
                diags,
                path.clone().attribute("accepted_prefix_limit"),
                "accepted_prefix_limit",
                name,
            );
        }
        if let Value::Value(limit) = &family.prefix_limit {
            limit.validate(diags, path.attribute("prefix_limit"), "prefix_limit", name);
        }
    }
}

fn parse_family(families: &mut ValueList<Value<BgpFamily>>, line: &str) -> Result<()> {
    let (nlri_type, rest) = line.split_once(' ').unwrap_or((line, ""));
    let family = list_block_mut(families, |family| family.nlri_type.as_str() == nlri_type);
    family.nlri_type = value_str(nlri_type);
    family.parse_line(rest)
}

fn family_block(description: &'static str, nlri_type: Attribute) -> NestedBlock {
    let prefix_limit = |description: &'static str| {
        NestedBlock::Single(Block {
            description: Description::plain(description),
            attributes: map! {
                "maximum" => optional_number("Maximum number of prefixes accepted from a peer"),
                "teardown" => optional_number("Clear peer connection on reaching limit with this percentage of prefix-limit to start warnings"),
                "teardown_idle_timeout" => optional_number("Timeout before attempting to restart peer"),
                "teardown_idle_timeout_forever" => optional_bool("Idle the peer until the user intervenes"),
            },
            ..Default::default()
        })
    };
    NestedBlock::List(Block {
        description: Description::plain(description),
        attributes: map! {
            "nlri_type" => nlri_type,
        },
        blocks: map! {
            "accepted_prefix_limit" => prefix_limit("Define maximum number of prefixes accepted from a peer"),
            "prefix_limit" => prefix_limit("Define maximum number of prefixes from a peer"),
        },
        ..Default::default()
    })
}

impl BgpNeighbor {
    /// Statement and attribute of every option without value
    fn flags(&self) -> [(&'static str, &'static str, &ValueBool); 22] {
        [
            ("accept-remote-nexthop", "accept_remote_nexthop", &self.accept_remote_nexthop),
            ("advertise-external", "advertise_external", &self.advertise_external),
            (
                "advertise-external conditional",
                "advertise_external_conditional",
                &self.advertise_external_conditional,
            ),
            ("advertise-inactive", "advertise_inactive", &self.advertise_inactive),
            ("advertise-peer-as", "advertise_peer_as", &self.advertise_peer_as),
            ("no-advertise-peer-as", "no_advertise_peer_as", &self.no_advertise_peer_as),
            ("as-override", "as_override", &self.as_override),
            ("damping", "damping", &self.damping),
            ("keep all", "keep_all", &self.keep_all),
            ("keep none", "keep_none", &self.keep_none),
            ("local-as alias", "local_as_alias", &self.local_as_alias),
            (
                "local-as no-prepend-global-as",
                "local_as_no_prepend_global_as",
                &self.local_as_no_prepend_global_as,
            ),
            ("local-as private", "local_as_private", &self.local_as_private),
            ("log-updown", "log_updown", &self.log_updown),
            ("metric-out igp", "metric_out_igp", &self.metric_out_igp),
            (
                "metric-out igp delay-med-update",
                "metric_out_igp_delay_med_update",
                &self.metric_out_igp_delay_med_update,
            ),
            ("metric-out minimum-igp", "metric_out_minimum_igp", &self.metric_out_minimum_igp),
            ("mtu-discovery", "mtu_discovery", &self.mtu_discovery),
            ("multihop", "multihop", &self.multihop),
            ("no-client-reflect", "no_client_reflect", &self.no_client_reflect),
            ("passive", "passive", &self.passive),
            ("remove-private", "remove_private", &self.remove_private),
        ]
    }

    fn flag_mut(&mut self, statement: &str) -> Option<&mut ValueBool> {
        Some(match statement {
            "accept-remote-nexthop" => &mut self.accept_remote_nexthop,
            "advertise-external" => &mut self.advertise_external,
            "advertise-inactive" => &mut self.advertise_inactive,
            "advertise-peer-as" => &mut self.advertise_peer_as,
            "no-advertise-peer-as" => &mut self.no_advertise_peer_as,
            "as-override" => &mut self.as_override,
            "damping" => &mut self.damping,
            "keep all" => &mut self.keep_all,
            "keep none" => &mut self.keep_none,
            "local-as alias" => &mut self.local_as_alias,
            "local-as no-prepend-global-as" => &mut self.local_as_no_prepend_global_as,
            "local-as private" => &mut self.local_as_private,
            "log-updown" => &mut self.log_updown,
            "metric-out minimum-igp" => &mut self.metric_out_minimum_igp,
            "mtu-discovery" => &mut self.mtu_discovery,
            "multihop" => &mut self.multihop,
            "no-client-reflect" => &mut self.no_client_reflect,
            "passive" => &mut self.passive,
            "remove-private" => &mut self.remove_private,
            "tcp-aggressive-transmission" => &mut self.tcp_aggressive_transmission,
            _ => return None,
        })
    }

    fn numbers(&self) -> [(&'static str, &'static str, &ValueNumber, i64, i64); 7] {
        [
            ("hold-time", "hold_time", &self.hold_time, 3, 65535),
            ("local-as loops", "local_as_loops", &self.local_as_loops, 1, 10),
            ("local-preference", "local_preference", &self.local_preference, 0, 4_294_967_295),
            ("metric-out", "metric_out", &self.metric_out, 0, 4_294_967_295),
            ("out-delay", "out_delay", &self.out_delay, 1, 65535),
            ("preference", "preference", &self.preference, 0, 4_294_967_295),
            (
                "metric-out igp",
                "metric_out_igp_offset",
                &self.metric_out_igp_offset,
                i32::MIN.into(),
                i32::MAX.into(),
            ),
        ]
    }

    fn set_prefix(&self) -> String {
        format!("set {} ", self.config_path())
    }
}

impl WithSchema for BgpNeighbor {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                description: Description::plain("Provides a bgp neighbor resource"),
                attributes: map! {
                    "id" => id_attribute(),
                    "ip" => required_string("IP of neighbor"),
                    "routing_instance" => defaulted_string("Routing instance for bgp protocol if not root level"),
                    "group" => required_string("Name of BGP group for this neighbor"),
                    "accept_remote_nexthop" => optional_bool("Allow import policy to specify a non-directly connected next-hop"),
                    "advertise_external" => optional_bool("Advertise best external routes"),
                    "advertise_external_conditional" => optional_bool("Route matches active route upto med-comparison rule"),
                    "advertise_inactive" => optional_bool("Advertise inactive routes"),
                    "advertise_peer_as" => optional_bool("Advertise routes received from the same autonomous system"),
                    "no_advertise_peer_as" => optional_bool("Don't advertise routes received from the same autonomous system"),
                    "as_override" => optional_bool("Replace neighbor AS number with our AS number"),
                    "authentication_algorithm" => optional_string("Authentication algorithm name"),
                    "authentication_key" => sensitive_string("MD5 authentication key"),
                    "authentication_key_chain" => optional_string("Key chain name"),
                    "cluster" => optional_string("Cluster identifier"),
                    "damping" => optional_bool("Enable route flap damping"),
                    "description" => optional_string("Text description"),
                    "export" => optional_list("Export policy list"),
                    "hold_time" => optional_number("Hold time used when negotiating with a peer"),
                    "import" => optional_list("Import policy list"),
                    "keep_all" => optional_bool("Retain all routes"),
                    "keep_none" => optional_bool("Retain no routes"),
                    "local_address" => optional_string("Address of local end of BGP session"),
                    "local_as" => optional_string("Local autonomous system number"),
                    "local_as_alias" => optional_bool("Treat this AS as an alias to the system AS"),
                    "local_as_loops" => optional_number("Maximum number of times this AS can be in an AS path"),
                    "local_as_no_prepend_global_as" => optional_bool("Do not prepend global autonomous-system number in advertised paths"),
                    "local_as_private" => optional_bool("Hide this local AS in paths learned from this peering"),
                    "local_interface" => optional_string("Local interface for IPv6 link local EBGP peering"),
                    "local_preference" => optional_number("Value of LOCAL_PREF path attribute"),
                    "log_updown" => optional_bool("Log a message for peer state transitions"),
                    "metric_out" => optional_number("Route metric sent in MED"),
                    "metric_out_igp" => optional_bool("Track the IGP metric"),
                    "metric_out_igp_delay_med_update" => optional_bool("Delay updating MED when IGP metric increases"),
                    "metric_out_igp_offset" => optional_number("Metric offset for MED"),
                    "metric_out_minimum_igp" => optional_bool("Track the minimum IGP metric"),
                    "metric_out_minimum_igp_offset" => optional_number("Metric offset for MED"),
                    "mtu_discovery" => optional_bool("Enable TCP path MTU discovery"),
                    "multihop" => optional_bool("Configure an EBGP multihop session"),
                    "no_client_reflect" => optional_bool("Disable intracluster route redistribution"),
                    "out_delay" => optional_number("How long before exporting routes from routing table"),
                    "passive" => optional_bool("Do not send open messages to a peer"),
                    "peer_as" => optional_string("Autonomous system number"),
                    "preference" => optional_number("Preference value"),
                    "remove_private" => optional_bool("Remove well-known private AS numbers"),
                    "tcp_aggressive_transmission" => optional_bool("Enable aggressive transmission of pure TCP ACKs and retransmissions"),
                },
                blocks: map! {
                    "bfd_liveness_detection" => NestedBlock::Single(Block {
                        description: Description::plain("Define Bidirectional Forwarding Detection (BFD) options"),
                        attributes: map! {
                            "authentication_algorithm" => optional_string("Authentication algorithm name"),
                            "authentication_key_chain" => optional_string("Authentication key chain name"),
                            "authentication_loose_check" => optional_bool("Verify authentication only if authentication is negotiated"),
                            "detection_time_threshold" => optional_number("High detection-time triggering a trap (milliseconds)"),
                            "holddown_interval" => optional_number("Time to hold the session-UP notification to the client (milliseconds)"),
                            "minimum_interval" => optional_number("Minimum transmit and receive interval (milliseconds)"),
                            "minimum_receive_interval" => optional_number("Minimum receive interval (milliseconds)"),
                            "multiplier" => optional_number("Detection time multiplier"),
                            "session_mode" => optional_string("BFD single-hop or multihop session-mode"),
                            "transmit_interval_minimum_interval" => optional_number("Minimum transmit interval (milliseconds)"),
                            "transmit_interval_threshold" => optional_number("High transmit interval triggering a trap (milliseconds)"),
                            "version" => optional_string("BFD protocol version number"),
                        },
                        ..Default::default()
                    }),
                    "bgp_error_tolerance" => NestedBlock::Single(Block {
                        description: Description::plain("Handle BGP malformed updates softly"),
                        attributes: map! {
                            "malformed_route_limit" => optional_number("Maximum number of malformed routes from a peer"),
                            "malformed_update_log_interval" => optional_number("Time used when logging malformed update (seconds)"),
                            "no_malformed_route_limit" => optional_bool("No malformed route limit"),
                        },
                        ..Default::default()
                    }),
                    "bgp_multipath" => NestedBlock::Single(Block {
                        description: Description::plain("Allow load sharing among multiple BGP paths"),
                        attributes: map! {
                            "allow_protection" => optional_bool("Allows the BGP multipath and protection to co-exist"),
                            "disable" => optional_bool("Disable Multipath"),
                            "multiple_as" => optional_bool("Use paths received from different ASs"),
                        },
                        ..Default::default()
                    }),
                    "family_evpn" => family_block(
                        "Configure EVPN address family options",
                        defaulted_string("NLRI type"),
                    ),
                    "family_inet" => family_block(
                        "Configure IPv4 address family options",
                        required_string("NLRI type"),
                    ),
                    "family_inet6" => family_block(
                        "Configure IPv6 address family options",
                        required_string("NLRI type"),
                    ),
                    "graceful_restart" => NestedBlock::Single(Block {
                        description: Description::plain("Define BGP graceful restart options"),
                        attributes: map! {
                            "disable" => optional_bool("Disable graceful restart"),
                            "restart_time" => optional_number("Restart time used when negotiating with a peer"),
                            "stale_route_time" => optional_number("Maximum time for which stale routes are kept"),
                        },
                        ..Default::default()
                    }),
                },
                ..Default::default()
            },
        }
    }
}

impl WithValidate for BgpNeighbor {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        validate::ip_address(diags, AttributePath::new("ip"), &self.ip);
        validate::name_object(
            diags,
            AttributePath::new("routing_instance"),
            &self.routing_instance,
            63,
            NameFormat::Default,
            &[],
        );
        validate::length_between(diags, AttributePath::new("group"), &self.group, 1, 250);
        validate::no_double_quote(diags, AttributePath::new("group"), &self.group);

        for (_, name, value) in self.flags() {
            validate::bool_true(diags, AttributePath::new(name), value);
        }
        validate::bool_true(
            diags,
            AttributePath::new("tcp_aggressive_transmission"),
            &self.tcp_aggressive_transmission,
        );
        for (_, name, value, min, max) in self.numbers() {
            validate::int_between(diags, AttributePath::new(name), value, min, max);
        }
        validate::int_between(
            diags,
            AttributePath::new("metric_out_minimum_igp_offset"),
            &self.metric_out_minimum_igp_offset,
            i32::MIN.into(),
            i32::MAX.into(),
        );

        validate::length_between(
            diags,
            AttributePath::new("authentication_key"),
            &self.authentication_key,
            1,
            126,
        );
        validate::length_between(
            diags,
            AttributePath::new("authentication_key_chain"),
            &self.authentication_key_chain,
            1,
            128,
        );
        validate::no_double_quote(
            diags,
            AttributePath::new("authentication_key_chain"),
            &self.authentication_key_chain,
        );
        validate::ipv4_address(diags, AttributePath::new("cluster"), &self.cluster);
        validate::length_between(
            diags,
            AttributePath::new("description"),
            &self.description,
            1,
            900,
        );
        validate::no_double_quote(diags, AttributePath::new("description"), &self.description);
        validate::ip_address(diags, AttributePath::new("local_address"), &self.local_address);
        for (name, value) in [("local_as", &self.local_as), ("peer_as", &self.peer_as)] {
            validate::matches(
                diags,
                AttributePath::new(name),
                value,
                is_as_number,
                r"in the format '^\d+(\.\d+)?$'",
            );
        }
        for (name, list) in [("export", &self.export), ("import", &self.import)] {
            if let Value::Value(policies) = list {
                for (index, policy) in policies.iter().enumerate() {
                    validate::name_object(
                        diags,
                        AttributePath::new(name).index(index as i64),
                        policy,
                        63,
                        NameFormat::Default,
                        &[],
                    );
                }
            }
        }

        if !self.advertise_external_conditional.is_null() && self.advertise_external.is_null() {
            diags.error_short(
                "advertise_external must be set with advertise_external_conditional",
                AttributePath::new("advertise_external_conditional"),
            );
        }
        for (name, set, parent, parent_set) in [
            (
                "metric_out_igp_delay_med_update",
                !self.metric_out_igp_delay_med_update.is_null(),
                "metric_out_igp",
                !self.metric_out_igp.is_null(),
            ),
            (
                "metric_out_igp_offset",
                !self.metric_out_igp_offset.is_null(),
                "metric_out_igp",
                !self.metric_out_igp.is_null(),
            ),
            (
                "metric_out_minimum_igp_offset",
                !self.metric_out_minimum_igp_offset.is_null(),
                "metric_out_minimum_igp",
                !self.metric_out_minimum_igp.is_null(),
            ),
        ] {
            if set && !parent_set {
                diags.error_short(
                    format!("{parent} must be set with {name}"),
                    AttributePath::new(name),
                );
            }
        }
        let conflicting = [
            (
                "advertise_peer_as",
                !self.advertise_peer_as.is_null(),
                "no_advertise_peer_as",
                !self.no_advertise_peer_as.is_null(),
            ),
            ("keep_all", !self.keep_all.is_null(), "keep_none", !self.keep_none.is_null()),
            (
                "authentication_algorithm",
                !self.authentication_algorithm.is_null(),
                "authentication_key",
                !self.authentication_key.is_null(),
            ),
            (
                "authentication_key_chain",
                !self.authentication_key_chain.is_null(),
                "authentication_key",
                !self.authentication_key.is_null(),
            ),
            (
                "local_as_alias",
                !self.local_as_alias.is_null(),
                "local_as_private",
                !self.local_as_private.is_null(),
            ),
            (
                "local_as_alias",
                !self.local_as_alias.is_null(),
                "local_as_no_prepend_global_as",
                !self.local_as_no_prepend_global_as.is_null(),
            ),
            (
                "local_as_private",
                !self.local_as_private.is_null(),
                "local_as_no_prepend_global_as",
                !self.local_as_no_prepend_global_as.is_null(),
            ),
        ];
        let metric_out = !self.metric_out.is_null();
        let igp = [
            ("metric_out_igp", !self.metric_out_igp.is_null()),
            ("metric_out_igp_delay_med_update", !self.metric_out_igp_delay_med_update.is_null()),
            ("metric_out_igp_offset", !self.metric_out_igp_offset.is_null()),
        ];
        let minimum_igp = [
            ("metric_out_minimum_igp", !self.metric_out_minimum_igp.is_null()),
            ("metric_out_minimum_igp_offset", !self.metric_out_minimum_igp_offset.is_null()),
        ];
        let metric_conflicts = igp
            .iter()
            .chain(&minimum_igp)
            .map(|&(name, set)| (name, set, "metric_out", metric_out))
            .chain(minimum_igp.iter().flat_map(|&(name, set)| {
                igp.iter()
                    .map(move |&(other, other_set)| (name, set, other, other_set))
            }));
        for (name, set, other, other_set) in conflicting.into_iter().chain(metric_conflicts) {
            validate::conflicts(diags, AttributePath::new(name), name, other, set, other_set);
        }

        if let Value::Value(bfd) = &self.bfd_liveness_detection {
            bfd.validate(diags, AttributePath::new("bfd_liveness_detection"));
        }
        if let Value::Value(tolerance) = &self.bgp_error_tolerance {
            tolerance.validate(diags, AttributePath::new("bgp_error_tolerance"));
        }
        if let Value::Value(multipath) = &self.bgp_multipath {
            for (_, name, value) in multipath.options() {
                validate::bool_true(
                    diags,
                    AttributePath::new("bgp_multipath").attribute(name),
                    value,
                );
            }
        }
        validate_families(diags, "family_evpn", &self.family_evpn, &EVPN_NLRI_TYPES);
        validate_families(diags, "family_inet", &self.family_inet, &NLRI_TYPES);
        validate_families(diags, "family_inet6", &self.family_inet6, &NLRI_TYPES);
        if let Value::Value(graceful_restart) = &self.graceful_restart {
            graceful_restart.validate(diags, AttributePath::new("graceful_restart"));
        }
    }
}

impl WithNormalize for BgpNeighbor {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        if self.routing_instance.is_null() {
            self.routing_instance = value_str(DEFAULT_WORD);
        }
        normalize_block_list(&mut self.family_evpn);
        normalize_block_list(&mut self.family_inet);
        normalize_block_list(&mut self.family_inet6);
        if let Value::Value(families) = &mut self.family_evpn {
            for family in families.iter_mut() {
                if let Value::Value(family) = family {
                    if family.nlri_type.is_null() {
                        family.nlri_type = value_str(EVPN_NLRI_TYPES[0]);
                    }
                }
            }
        }
    }
}

impl JunosResource for BgpNeighbor {
    const TYPE_NAME: &'static str = "bgp_neighbor";
    const ID_FORMAT: &'static str = "<ip>_-_<routing_instance>_-_<group>";

    fn id_mut(&mut self) -> &mut ValueStr {
        &mut self.id
    }

    fn compute_id(&self) -> String {
        [
            self.ip.as_str(),
            self.routing_instance.as_str(),
            self.group.as_str(),
        ]
        .join(ID_SEPARATOR)
    }

    fn from_id(id: &str) -> Option<Self> {
        let parts: Vec<&str> = id.split(ID_SEPARATOR).collect();
        let [ip, routing_instance, group] = parts[..] else {
            return None;
        };
        if ip.is_empty() || routing_instance.is_empty() || group.is_empty() {
            return None;
        }
        let mut neighbor = Self {
            id: value_str(id),
            ip: value_str(ip),
            routing_instance: value_str(routing_instance),
            group: value_str(group),
            ..Default::default()
        };
        normalize_block_list(&mut neighbor.family_evpn);
        normalize_block_list(&mut neighbor.family_inet);
        normalize_block_list(&mut neighbor.family_inet6);
        Some(neighbor)
    }

    fn replace_triggers(&self, prior: &Self) -> Vec<AttributePath> {
        let mut triggers = Vec::new();
        replace_if_changed(&mut triggers, "ip", &prior.ip, &self.ip);
        replace_if_changed(
            &mut triggers,
            "routing_instance",
            &prior.routing_instance,
            &self.routing_instance,
        );
        replace_if_changed(&mut triggers, "group", &prior.group, &self.group);
        triggers
    }

    fn requirements(&self) -> Vec<Requirement> {
        vec![Requirement::RoutingInstance(
            self.routing_instance.as_str().to_owned(),
        )]
    }

    fn config_path(&self) -> String {
        format!(
            "{}protocols bgp group {} neighbor {}",
            routing_instance_prefix(self.routing_instance.as_str()),
            quoted(self.group.as_str()),
            self.ip.as_str()
        )
    }

    fn set_lines(&self) -> Result<Vec<String>> {
        let set_prefix = self.set_prefix();
        let mut lines = vec![set_prefix.trim_end().to_owned()];

        for (statement, _, value) in self.flags() {
            if is_true(value) {
                lines.push(format!("{set_prefix}{statement}"));
            }
        }
        if is_true(&self.tcp_aggressive_transmission) {
            lines.push(format!("{set_prefix}tcp-aggressive-transmission"));
        }
        if let Some(algorithm) = non_empty(&self.authentication_algorithm) {
            lines.push(format!("{set_prefix}authentication-algorithm {algorithm}"));
        }
        if let Some(key) = non_empty(&self.authentication_key) {
            lines.push(format!("{set_prefix}authentication-key {}", quoted(key)));
        }
        if let Some(key_chain) = non_empty(&self.authentication_key_chain) {
            lines.push(format!("{set_prefix}authentication-key-chain {}", quoted(key_chain)));
        }
        if let Some(cluster) = non_empty(&self.cluster) {
            lines.push(format!("{set_prefix}cluster {cluster}"));
        }
        if let Some(description) = non_empty(&self.description) {
            lines.push(format!("{set_prefix}description {}", quoted(description)));
        }
        for policy in strings(&self.export) {
            lines.push(format!("{set_prefix}export {policy}"));
        }
        for policy in strings(&self.import) {
            lines.push(format!("{set_prefix}import {policy}"));
        }
        if let Some(address) = non_empty(&self.local_address) {
            lines.push(format!("{set_prefix}local-address {address}"));
        }
        if let Some(local_as) = non_empty(&self.local_as) {
            lines.push(format!("{set_prefix}local-as {local_as}"));
        }
        if let Some(interface) = non_empty(&self.local_interface) {
            lines.push(format!("{set_prefix}local-interface {interface}"));
        }
        for (statement, _, value, _, _) in self.numbers() {
            if let Some(value) = number(value) {
                lines.push(format!("{set_prefix}{statement} {value}"));
            }
        }
        if let Some(offset) = number(&self.metric_out_minimum_igp_offset) {
            lines.push(format!("{set_prefix}metric-out minimum-igp {offset}"));
        }
        if let Some(peer_as) = non_empty(&self.peer_as) {
            lines.push(format!("{set_prefix}peer-as {peer_as}"));
        }
        if let Value::Value(bfd) = &self.bfd_liveness_detection {
            if bfd.is_empty() {
                bail!("bfd_liveness_detection block is empty");
            }
            lines.extend(bfd.set_lines(&set_prefix));
        }
        if let Value::Value(tolerance) = &self.bgp_error_tolerance {
            tolerance.set_lines(&mut lines, &set_prefix);
        }
        if let Value::Value(multipath) = &self.bgp_multipath {
            multipath.set_lines(&mut lines, &set_prefix);
        }
        for (name, families) in [
            ("evpn", &self.family_evpn),
            ("inet", &self.family_inet),
            ("inet6", &self.family_inet6),
        ] {
            let mut nlri_types = Vec::new();
            for family in blocks(families) {
                let nlri_type = family.nlri_type.as_str();
                if nlri_types.contains(&nlri_type) {
                    bail!("multiple family_{name} blocks with the same nlri_type {nlri_type:?}");
                }
                nlri_types.push(nlri_type);
                family.set_lines(&mut lines, &format!("{set_prefix}family {name} "));
            }
        }
        if let Value::Value(graceful_restart) = &self.graceful_restart {
            graceful_restart.set_lines(&mut lines, &set_prefix);
        }
        Ok(lines)
    }

    /// Only the options are removed, the neighbor stays in its group
    fn update_delete_lines(&self) -> Vec<String> {
        let delete_prefix = format!("delete {} ", self.config_path());
        [
            "accept-remote-nexthop",
            "advertise-external",
            "advertise-inactive",
            "advertise-peer-as",
            "no-advertise-peer-as",
            "as-override",
            "authentication-algorithm",
            "authentication-key",
            "authentication-key-chain",
            "cluster",
            "damping",
            "description",
            "export",
            "hold-time",
            "import",
            "keep",
            "local-address",
            "local-as",
            "local-interface",
            "local-preference",
            "log-updown",
            "metric-out",
            "mtu-discovery",
            "multihop",
            "no-client-reflect",
            "out-delay",
            "passive",
            "peer-as",
            "preference",
            "remove-private",
            "tcp-aggressive-transmission",
            "bfd-liveness-detection",
            "bgp-error-tolerance",
            "multipath",
            "family evpn",
            "family inet",
            "family inet6",
            "graceful-restart",
        ]
        .iter()
        .map(|statement| format!("{delete_prefix}{statement}"))
        .collect()
    }

    fn parse_line(&mut self, mut line: &str) -> Result<()> {
        if line == "advertise-external conditional" {
            self.advertise_external = flag(true);
            self.advertise_external_conditional = flag(true);
            return Ok(());
        }
        if let Some(value) = self.flag_mut(line) {
            *value = flag(true);
            return Ok(());
        }
        if cut_prefix(&mut line, "authentication-algorithm ") {
            self.authentication_algorithm = value_str(line);
        } else if cut_prefix(&mut line, "authentication-key ") {
            let key = trim_quotes(line);
            self.authentication_key = if key.starts_with("$9$") {
                value_str(
                    decode_junos_secret(key).context("decoding authentication-key")?,
                )
            } else {
                value_str(key)
            };
        } else if cut_prefix(&mut line, "authentication-key-chain ") {
            self.authentication_key_chain = value_str(trim_quotes(line));
        } else if cut_prefix(&mut line, "cluster ") {
            self.cluster = value_str(line);
        } else if cut_prefix(&mut line, "description ") {
            self.description = value_str(trim_quotes(line));
        } else if cut_prefix(&mut line, "export ") {
            push_str(&mut self.export, line);
        } else if cut_prefix(&mut line, "hold-time ") {
            self.hold_time = parse_number(line)?;
        } else if cut_prefix(&mut line, "import ") {
            push_str(&mut self.import, line);
        } else if cut_prefix(&mut line, "local-address ") {
            self.local_address = value_str(line);
        } else if cut_prefix(&mut line, "local-as loops ") {
            self.local_as_loops = parse_number(line)?;
        } else if cut_prefix(&mut line, "local-as ") {
            self.local_as = value_str(line);
        } else if cut_prefix(&mut line, "local-interface ") {
            self.local_interface = value_str(line);
        } else if cut_prefix(&mut line, "local-preference ") {
            self.local_preference = parse_number(line)?;
        } else if cut_prefix(&mut line, "metric-out ") {
            if cut_prefix(&mut line, "igp") {
                self.metric_out_igp = flag(true);
                if line == " delay-med-update" {
                    self.metric_out_igp_delay_med_update = flag(true);
                } else if cut_prefix(&mut line, " ") {
                    self.metric_out_igp_offset = parse_number(line)?;
                }
            } else if cut_prefix(&mut line, "minimum-igp") {
                self.metric_out_minimum_igp = flag(true);
                if cut_prefix(&mut line, " ") {
                    self.metric_out_minimum_igp_offset = parse_number(line)?;
                }
            } else {
                self.metric_out = parse_number(line)?;
            }
        } else if cut_prefix(&mut line, "out-delay ") {
            self.out_delay = parse_number(line)?;
        } else if cut_prefix(&mut line, "peer-as ") {
            self.peer_as = value_str(line);
        } else if cut_prefix(&mut line, "preference ") {
            self.preference = parse_number(line)?;
        } else if cut_prefix(&mut line, "bfd-liveness-detection ") {
            block_mut(&mut self.bfd_liveness_detection).parse_line(line)?;
        } else if cut_prefix(&mut line, "bgp-error-tolerance") {
            let tolerance = block_mut(&mut self.bgp_error_tolerance);
            if cut_prefix(&mut line, " ") {
                tolerance.parse_line(line)?;
            }
        } else if cut_prefix(&mut line, "multipath") {
            let multipath = block_mut(&mut self.bgp_multipath);
            if cut_prefix(&mut line, " ") {
                multipath.parse_line(line);
            }
        } else if cut_prefix(&mut line, "family evpn ") {
            parse_family(&mut self.family_evpn, line)?;
        } else if cut_prefix(&mut line, "family inet ") {
            parse_family(&mut self.family_inet, line)?;
        } else if cut_prefix(&mut line, "family inet6 ") {
            parse_family(&mut self.family_inet6, line)?;
        } else if cut_prefix(&mut line, "graceful-restart") {
            let graceful_restart = block_mut(&mut self.graceful_restart);
            if cut_prefix(&mut line, " ") {
                graceful_restart.parse_line(line)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neighbor() -> BgpNeighbor {
        let mut neighbor = BgpNeighbor::from_id("192.0.2.4_-_default_-_peers").unwrap();
        neighbor.advertise_external = flag(true);
        neighbor.advertise_external_conditional = flag(true);
        neighbor.keep_all = flag(true);
        neighbor.authentication_key = value_str("testacc");
        neighbor.description = value_str("peer 1");
        push_str(&mut neighbor.export, "export_bgp");
        neighbor.hold_time = Value::Value(30);
        neighbor.local_as = value_str("65000");
        neighbor.local_as_loops = Value::Value(2);
        neighbor.metric_out_igp = flag(true);
        neighbor.metric_out_igp_offset = Value::Value(-10);
        neighbor.peer_as = value_str("65001.1");
        neighbor.bfd_liveness_detection = Value::Value(BfdLivenessDetection {
            minimum_interval: Value::Value(300),
            multiplier: Value::Value(3),
            session_mode: value_str("automatic"),
            ..Default::default()
        });
        neighbor.family_inet = Value::Value(vec![
            Value::Value(BgpFamily {
                nlri_type: value_str("unicast"),
                accepted_prefix_limit: Value::Value(PrefixLimit {
                    maximum: Value::Value(1000),
                    teardown: Value::Value(80),
                    teardown_idle_timeout_forever: flag(true),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            Value::Value(BgpFamily {
                nlri_type: value_str("flow"),
                ..Default::default()
            }),
        ]);
        neighbor
    }

    #[test]
    fn set_lines() {
        let prefix = "set protocols bgp group \"peers\" neighbor 192.0.2.4";
        assert_eq!(
            neighbor().set_lines().unwrap(),
            vec![
                prefix.to_owned(),
                format!("{prefix} advertise-external"),
                format!("{prefix} advertise-external conditional"),
                format!("{prefix} keep all"),
                format!("{prefix} metric-out igp"),
                format!("{prefix} authentication-key \"testacc\""),
                format!("{prefix} description \"peer 1\""),
                format!("{prefix} export export_bgp"),
                format!("{prefix} local-as 65000"),
                format!("{prefix} hold-time 30"),
                format!("{prefix} local-as loops 2"),
                format!("{prefix} metric-out igp -10"),
                format!("{prefix} peer-as 65001.1"),
                format!("{prefix} bfd-liveness-detection minimum-interval 300"),
                format!("{prefix} bfd-liveness-detection multiplier 3"),
                format!("{prefix} bfd-liveness-detection session-mode automatic"),
                format!("{prefix} family inet unicast"),
                format!("{prefix} family inet unicast accepted-prefix-limit maximum 1000"),
                format!("{prefix} family inet unicast accepted-prefix-limit teardown 80"),
                format!("{prefix} family inet unicast accepted-prefix-limit teardown idle-timeout forever"),
                format!("{prefix} family inet flow"),
            ]
        );
    }

    #[test]
    fn parse_lines_decodes_key() {
        let mut state = BgpNeighbor::from_id("192.0.2.4_-_default_-_peers").unwrap();
        for line in [
            "advertise-external conditional",
            "authentication-key \"$9$Qabcz9pIRSeMXcylMXxws4aZ\"",
            "bfd-liveness-detection minimum-interval 300",
            "bfd-liveness-detection multiplier 3",
            "bfd-liveness-detection session-mode automatic",
            "description \"peer 1\"",
            "export export_bgp",
            "family inet unicast accepted-prefix-limit maximum 1000",
            "family inet unicast accepted-prefix-limit teardown 80",
            "family inet unicast accepted-prefix-limit teardown idle-timeout forever",
            "family inet flow",
            "hold-time 30",
            "keep all",
            "local-as 65000",
            "local-as loops 2",
            "metric-out igp -10",
            "peer-as 65001.1",
        ] {
            state.parse_line(line).unwrap();
        }
        assert_eq!(state, neighbor());
    }

    fn option_lines(neighbor: &BgpNeighbor) -> Vec<String> {
        let prefix = "set protocols bgp group \"peers\" neighbor 192.0.2.4 ";
        neighbor
            .set_lines()
            .unwrap()
            .iter()
            .filter_map(|line| line.strip_prefix(prefix))
            .map(str::to_owned)
            .collect()
    }

    fn read_back(lines: &[String]) -> BgpNeighbor {
        let mut state = BgpNeighbor::from_id("192.0.2.4_-_default_-_peers").unwrap();
        for line in lines {
            state.parse_line(line).unwrap();
        }
        state
    }

    #[test]
    fn error_tolerance_lines() {
        let mut neighbor = BgpNeighbor::from_id("192.0.2.4_-_default_-_peers").unwrap();
        neighbor.bgp_error_tolerance = Value::Value(BgpErrorTolerance {
            malformed_route_limit: Value::Value(5),
            malformed_update_log_interval: Value::Value(30),
            ..Default::default()
        });
        let lines = option_lines(&neighbor);
        assert_eq!(
            lines,
            vec![
                "bgp-error-tolerance",
                "bgp-error-tolerance malformed-route-limit 5",
                "bgp-error-tolerance malformed-update-log-interval 30",
            ]
        );
        assert_eq!(read_back(&lines), neighbor);

        neighbor.bgp_error_tolerance = Value::Value(BgpErrorTolerance::default());
        let lines = option_lines(&neighbor);
        assert_eq!(lines, vec!["bgp-error-tolerance"]);
        assert_eq!(read_back(&lines), neighbor);
    }

    #[test]
    fn multipath_lines() {
        let mut neighbor = BgpNeighbor::from_id("192.0.2.4_-_default_-_peers").unwrap();
        neighbor.bgp_multipath = Value::Value(BgpMultipath {
            allow_protection: flag(true),
            multiple_as: flag(true),
            ..Default::default()
        });
        let lines = option_lines(&neighbor);
        assert_eq!(
            lines,
            vec!["multipath", "multipath allow-protection", "multipath multiple-as"]
        );
        assert_eq!(read_back(&lines), neighbor);
    }

    #[test]
    fn family_evpn_lines() {
        let mut neighbor = BgpNeighbor::from_id("192.0.2.4_-_default_-_peers").unwrap();
        neighbor.family_evpn = Value::Value(vec![Value::Value(BgpFamily {
            nlri_type: Value::Null,
            prefix_limit: Value::Value(PrefixLimit {
                maximum: Value::Value(200),
                teardown_idle_timeout: Value::Value(30),
                ..Default::default()
            }),
            ..Default::default()
        })]);
        neighbor.normalize(&mut Diagnostics::default());
        let lines = option_lines(&neighbor);
        assert_eq!(
            lines,
            vec![
                "family evpn signaling",
                "family evpn signaling prefix-limit maximum 200",
                "family evpn signaling prefix-limit teardown idle-timeout 30",
            ]
        );
        assert_eq!(read_back(&lines), neighbor);
    }

    #[test]
    fn graceful_restart_lines() {
        let mut neighbor = BgpNeighbor::from_id("192.0.2.4_-_default_-_peers").unwrap();
        neighbor.graceful_restart = Value::Value(GracefulRestart {
            restart_time: Value::Value(120),
            stale_route_time: Value::Value(300),
            ..Default::default()
        });
        let lines = option_lines(&neighbor);
        assert_eq!(
            lines,
            vec![
                "graceful-restart",
                "graceful-restart restart-time 120",
                "graceful-restart stale-routes-time 300",
            ]
        );
        assert_eq!(read_back(&lines), neighbor);

        neighbor.graceful_restart = Value::Value(GracefulRestart {
            disable: flag(true),
            ..Default::default()
        });
        let lines = option_lines(&neighbor);
        assert_eq!(lines, vec!["graceful-restart", "graceful-restart disable"]);
        assert_eq!(read_back(&lines), neighbor);
    }

    #[test]
    fn nested_block_validation() {
        let mut config = BgpNeighbor::from_id("192.0.2.4_-_default_-_peers").unwrap();
        config.bgp_error_tolerance = Value::Value(BgpErrorTolerance {
            malformed_route_limit: Value::Value(5),
            malformed_update_log_interval: Value::Value(5),
            no_malformed_route_limit: flag(true),
        });
        config.bgp_multipath = Value::Value(BgpMultipath {
            disable: Value::Value(false),
            ..Default::default()
        });
        config.family_evpn = Value::Value(vec![Value::Value(BgpFamily {
            nlri_type: value_str("unicast"),
            ..Default::default()
        })]);
        config.graceful_restart = Value::Value(GracefulRestart {
            disable: flag(true),
            restart_time: Value::Value(900),
            stale_route_time: Value::Value(60),
        });
        let mut diags = Diagnostics::default();
        config.validate(&mut diags, AttributePath::default());
        // log interval, route limit conflict, multipath disable false, evpn nlri_type,
        // restart_time range, restart_time and stale_route_time conflicts
        assert_eq!(diags.errors.len(), 7, "{:?}", diags.errors);
    }

    #[test]
    fn update_keeps_neighbor() {
        let mut neighbor = BgpNeighbor::from_id("192.0.2.4_-_vrf1_-_peers").unwrap();
        neighbor.normalize(&mut Diagnostics::default());
        let lines = neighbor.update_delete_lines();
        for statement in ["bgp-error-tolerance", "multipath", "family evpn", "graceful-restart"] {
            assert!(lines.iter().any(|line| line.ends_with(&format!(" {statement}"))));
        }
        assert!(lines.iter().all(|line| line.starts_with(
            "delete routing-instances vrf1 protocols bgp group \"peers\" neighbor 192.0.2.4 "
        )));
        assert_eq!(
            neighbor.delete_lines(),
            vec!["delete routing-instances vrf1 protocols bgp group \"peers\" neighbor 192.0.2.4"]
        );
        assert_eq!(neighbor.compute_id(), "192.0.2.4_-_vrf1_-_peers");
        assert!(BgpNeighbor::from_id("192.0.2.4_-_vrf1").is_none());
    }

    #[test]
    fn validation() {
        let mut diags = Diagnostics::default();
        neighbor().validate(&mut diags, AttributePath::default());
        assert!(diags.errors.is_empty(), "{:?}", diags.errors);

        let mut config = neighbor();
        config.keep_none = flag(true);
        config.metric_out = Value::Value(10);
        config.peer_as = value_str("AS65001");
        config.bfd_liveness_detection = Value::Value(BfdLivenessDetection::default());
        if let Value::Value(families) = &mut config.family_inet {
            families.push(Value::Value(BgpFamily {
                nlri_type: value_str("flow"),
                prefix_limit: Value::Value(PrefixLimit::default()),
                ..Default::default()
            }));
        }
        config.validate(&mut diags, AttributePath::default());
        // keep, metric_out twice, peer_as, empty bfd, duplicate flow, missing maximum
        assert_eq!(diags.errors.len(), 7);
        assert!(is_as_number("65000.12"));
        assert!(!is_as_number("65000."));
    }
}
