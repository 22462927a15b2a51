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
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use tf_provider::{
    map,
    schema::{Block, Description, NestedBlock, Schema},
    value::{ValueList, ValueNumber, ValueSet},
    AttributePath, Diagnostics, Value,
};

use crate::junos::{cut_prefix, decode_junos_secret, quoted, trim_quotes};
use crate::utils::{
    block_mut, blocks, defaulted_string, flag, id_attribute, insert_str, is_true, list_block_mut,
    non_empty, normalize_block_list, number, optional_bool, optional_number, optional_set,
    optional_string, parse_number, replace_if_changed, required_string, sensitive_string,
    set_strings, value_str, ValueBool, ValueStr, WithNormalize, WithSchema, WithValidate,
};
use crate::validate::{self, NameFormat};

use super::JunosResource;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityIpsecVpn {
    pub id: ValueStr,
    pub name: ValueStr,
    pub bind_interface: ValueStr,
    pub copy_outer_dscp: ValueBool,
    pub df_bit: ValueStr,
    pub establish_tunnels: ValueStr,
    pub multi_sa_forwarding_class: ValueSet<ValueStr>,
    pub ike: Value<IpsecIke>,
    pub manual: Value<IpsecManual>,
    pub traffic_selector: ValueList<Value<TrafficSelector>>,
    pub udp_encapsulate: Value<UdpEncapsulate>,
    pub vpn_monitor: Value<VpnMonitor>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpsecIke {
    pub gateway: ValueStr,
    pub policy: ValueStr,
    pub identity_local: ValueStr,
    pub identity_remote: ValueStr,
    pub identity_service: ValueStr,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpsecManual {
    pub external_interface: ValueStr,
    pub protocol: ValueStr,
    pub spi: ValueNumber,
    pub authentication_algorithm: ValueStr,
    pub authentication_key_hexa: ValueStr,
    pub authentication_key_text: ValueStr,
    pub encryption_algorithm: ValueStr,
    pub encryption_key_hexa: ValueStr,
    pub encryption_key_text: ValueStr,
    pub gateway: ValueStr,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficSelector {
    pub name: ValueStr,
    pub local_ip: ValueStr,
    pub remote_ip: ValueStr,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdpEncapsulate {
    pub dest_port: ValueNumber,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpnMonitor {
    pub destination_ip: ValueStr,
    pub optimized: ValueBool,
    pub source_interface: ValueStr,
    /// Not stored on the device, `source_interface` follows `bind_interface`
    pub source_interface_auto: ValueBool,
}

fn is_cidr(value: &str) -> bool {
    value.parse::<IpNet>().is_ok()
}

fn secret(value: &str, statement: &str) -> Result<ValueStr> {
    let value = trim_quotes(value);
    if value.starts_with("$9$") {
        Ok(value_str(
            decode_junos_secret(value).with_context(|| format!("decoding {statement}"))?,
        ))
    } else {
        Ok(value_str(value))
    }
}

impl IpsecIke {
    fn validate(&self, diags: &mut Diagnostics) {
        let path = |name: &'static str| AttributePath::new("ike").attribute(name);
        for (name, value) in [("gateway", &self.gateway), ("policy", &self.policy)] {
            if value.is_null() {
                diags.error_short(format!("{name} must be specified in ike block"), path(name));
            }
            validate::name_object(diags, path(name), value, 32, NameFormat::Default, &[]);
        }
        for (name, value) in [
            ("identity_local", &self.identity_local),
            ("identity_remote", &self.identity_remote),
        ] {
            validate::matches(diags, path(name), value, is_cidr, "a CIDR address");
        }
        validate::no_double_quote(diags, path("identity_service"), &self.identity_service);
    }

    fn set_lines(&self, lines: &mut Vec<String>, set_prefix: &str) -> Result<()> {
        let set_prefix = format!("{set_prefix}ike ");
        let Some(gateway) = non_empty(&self.gateway) else {
            bail!("gateway must be not empty in ike block");
        };
        let Some(policy) = non_empty(&self.policy) else {
            bail!("policy must be not empty in ike block");
        };
        lines.push(format!("{set_prefix}gateway {}", quoted(gateway)));
        lines.push(format!("{set_prefix}ipsec-policy {policy}"));
        if let Some(local) = non_empty(&self.identity_local) {
            lines.push(format!("{set_prefix}proxy-identity local {local}"));
        }
        if let Some(remote) = non_empty(&self.identity_remote) {
            lines.push(format!("{set_prefix}proxy-identity remote {remote}"));
        }
        if let Some(service) = non_empty(&self.identity_service) {
            lines.push(format!("{set_prefix}proxy-identity service {}", quoted(service)));
        }
        Ok(())
    }

    fn parse_line(&mut self, mut line: &str) {
        if cut_prefix(&mut line, "gateway ") {
            self.gateway = value_str(trim_quotes(line));
        } else if cut_prefix(&mut line, "ipsec-policy ") {
            self.policy = value_str(line);
        } else if cut_prefix(&mut line, "proxy-identity local ") {
            self.identity_local = value_str(line);
        } else if cut_prefix(&mut line, "proxy-identity remote ") {
            self.identity_remote = value_str(line);
        } else if cut_prefix(&mut line, "proxy-identity service ") {
            self.identity_service = value_str(trim_quotes(line));
        }
    }
}

impl IpsecManual {
    fn validate(&self, diags: &mut Diagnostics) {
        let path = |name: &'static str| AttributePath::new("manual").attribute(name);
        for (name, value) in [
            ("external_interface", self.external_interface.is_null()),
            ("protocol", self.protocol.is_null()),
            ("spi", self.spi.is_null()),
        ] {
            if value {
                diags.error_short(format!("{name} must be specified in manual block"), path(name));
            }
        }
        validate::one_of(diags, path("protocol"), &self.protocol, &["ah", "esp"]);
        validate::int_between(diags, path("spi"), &self.spi, 256, 16639);
        validate::ip_address(diags, path("gateway"), &self.gateway);
        match self.protocol.as_str() {
            "ah" if self.authentication_algorithm.is_null() => diags.error_short(
                "authentication_algorithm must be specified with protocol set to \"ah\" in manual block",
                path("protocol"),
            ),
            "esp"
                if self.authentication_algorithm.is_null()
                    && self.encryption_algorithm.is_null() =>
            {
                diags.error_short(
                    "at least one of authentication_algorithm or encryption_algorithm must be specified with protocol set to \"esp\" in manual block",
                    path("protocol"),
                )
            }
            _ => {}
        }
        for (kind, algorithm, hexa, text) in [
            (
                "authentication",
                &self.authentication_algorithm,
                &self.authentication_key_hexa,
                &self.authentication_key_text,
            ),
            (
                "encryption",
                &self.encryption_algorithm,
                &self.encryption_key_hexa,
                &self.encryption_key_text,
            ),
        ] {
            if !algorithm.is_null() && hexa.is_null() && text.is_null() {
                diags.error_short(
                    format!("one of {kind}_key_hexa or {kind}_key_text must be specified when {kind}_algorithm is specified in manual block"),
                    AttributePath::new("manual").attribute(format!("{kind}_algorithm")),
                );
            }
            if !hexa.is_null() && !text.is_null() {
                diags.error_short(
                    format!("only one of {kind}_key_hexa or {kind}_key_text can be specified in manual block"),
                    AttributePath::new("manual").attribute(format!("{kind}_key_text")),
                );
            }
            validate::no_double_quote(
                diags,
                AttributePath::new("manual").attribute(format!("{kind}_key_text")),
                text,
            );
        }
    }

    fn set_lines(&self, lines: &mut Vec<String>, set_prefix: &str) -> Result<()> {
        let set_prefix = format!("{set_prefix}manual ");
        let Some(interface) = non_empty(&self.external_interface) else {
            bail!("external_interface must be not empty in manual block");
        };
        let Some(protocol) = non_empty(&self.protocol) else {
            bail!("protocol must be not empty in manual block");
        };
        let Some(spi) = number(&self.spi) else {
            bail!("spi must be specified in manual block");
        };
        lines.push(format!("{set_prefix}external-interface {interface}"));
        lines.push(format!("{set_prefix}protocol {protocol}"));
        lines.push(format!("{set_prefix}spi {spi}"));
        for (kind, algorithm, hexa, text) in [
            (
                "authentication",
                &self.authentication_algorithm,
                &self.authentication_key_hexa,
                &self.authentication_key_text,
            ),
            (
                "encryption",
                &self.encryption_algorithm,
                &self.encryption_key_hexa,
                &self.encryption_key_text,
            ),
        ] {
            if let Some(algorithm) = non_empty(algorithm) {
                lines.push(format!("{set_prefix}{kind} algorithm {algorithm}"));
            }
            if let Some(key) = non_empty(hexa) {
                lines.push(format!("{set_prefix}{kind} key hexadecimal {key}"));
            }
            if let Some(key) = non_empty(text) {
                lines.push(format!("{set_prefix}{kind} key ascii-text {}", quoted(key)));
            }
        }
        if let Some(gateway) = non_empty(&self.gateway) {
            lines.push(format!("{set_prefix}gateway {gateway}"));
        }
        Ok(())
    }

    fn parse_line(&mut self, mut line: &str) -> Result<()> {
        if cut_prefix(&mut line, "external-interface ") {
            self.external_interface = value_str(line);
        } else if cut_prefix(&mut line, "protocol ") {
            self.protocol = value_str(trim_quotes(line));
        } else if cut_prefix(&mut line, "spi ") {
            self.spi = parse_number(line)?;
        } else if cut_prefix(&mut line, "authentication algorithm ") {
            self.authentication_algorithm = value_str(line);
        } else if cut_prefix(&mut line, "authentication key hexadecimal ") {
            self.authentication_key_hexa = secret(line, "authentication key hexadecimal")?;
        } else if cut_prefix(&mut line, "authentication key ascii-text ") {
            self.authentication_key_text = secret(line, "authentication key ascii-text")?;
        } else if cut_prefix(&mut line, "encryption algorithm ") {
            self.encryption_algorithm = value_str(line);
        } else if cut_prefix(&mut line, "encryption key hexadecimal ") {
            self.encryption_key_hexa = secret(line, "encryption key hexadecimal")?;
        } else if cut_prefix(&mut line, "encryption key ascii-text ") {
            self.encryption_key_text = secret(line, "encryption key ascii-text")?;
        } else if cut_prefix(&mut line, "gateway ") {
            self.gateway = value_str(trim_quotes(line));
        }
        Ok(())
    }
}

impl WithSchema for SecurityIpsecVpn {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                description: Description::plain("Provides a security ipsec vpn resource"),
                attributes: map! {
                    "id" => id_attribute(),
                    "name" => required_string("The name of vpn"),
                    "bind_interface" => optional_string("Interface to bind vpn for route-based vpn"),
                    "copy_outer_dscp" => optional_bool("Enable copying outer IP header DSCP and ECN to inner IP header"),
                    "df_bit" => optional_string("Specifies how to handle the Don't Fragment bit"),
                    "establish_tunnels" => optional_string("When the VPN comes up"),
                    "multi_sa_forwarding_class" => optional_set("Negotiate multiple SAs with forwarding-classes"),
                },
                blocks: map! {
                    "ike" => NestedBlock::Single(Block {
                        description: Description::plain("Declare IKE-keyed configuration"),
                        attributes: map! {
                            "gateway" => optional_string("The name of security IKE gateway (phase-1)"),
                            "policy" => optional_string("The name of IPSec policy"),
                            "identity_local" => optional_string("IPSec proxy-id local parameter"),
                            "identity_remote" => optional_string("IPSec proxy-id remote parameter"),
                            "identity_service" => optional_string("IPSec proxy-id service parameter"),
                        },
                        ..Default::default()
                    }),
                    "manual" => NestedBlock::Single(Block {
                        description: Description::plain("Define a manual security association"),
                        attributes: map! {
                            "external_interface" => optional_string("External interface for the security association"),
                            "protocol" => optional_string("Define an IPSec protocol for the security association"),
                            "spi" => optional_number("Define security parameter index (256..16639)"),
                            "authentication_algorithm" => optional_string("Define authentication algorithm"),
                            "authentication_key_hexa" => sensitive_string("Define an authentication key with format as hexadecimal"),
                            "authentication_key_text" => sensitive_string("Define an authentication key with format as text"),
                            "encryption_algorithm" => optional_string("Define encryption algorithm"),
                            "encryption_key_hexa" => sensitive_string("Define an encryption key with format as hexadecimal"),
                            "encryption_key_text" => sensitive_string("Define an encryption key with format as text"),
                            "gateway" => optional_string("Define the IPSec peer"),
                        },
                        ..Default::default()
                    }),
                    "traffic_selector" => NestedBlock::List(Block {
                        description: Description::plain("For each name of traffic-selector to declare"),
                        attributes: map! {
                            "name" => required_string("Name of traffic-selector"),
                            "local_ip" => required_string("CIDR for IP addresses of local traffic-selector"),
                            "remote_ip" => required_string("CIDR for IP addresses of remote traffic-selector"),
                        },
                        ..Default::default()
                    }),
                    "udp_encapsulate" => NestedBlock::Single(Block {
                        description: Description::plain("UDP encapsulation of IPsec data traffic"),
                        attributes: map! {
                            "dest_port" => optional_number("UDP destination port (1025..65536)"),
                        },
                        ..Default::default()
                    }),
                    "vpn_monitor" => NestedBlock::Single(Block {
                        description: Description::plain("Declare VPN monitor liveness configuration"),
                        attributes: map! {
                            "destination_ip" => optional_string("IP destination for monitor message"),
                            "optimized" => optional_bool("Optimize for scalability"),
                            "source_interface" => defaulted_string("Set source interface for monitor message"),
                            "source_interface_auto" => optional_bool("Compute the source_interface to `bind_interface`"),
                        },
                        ..Default::default()
                    }),
                },
                ..Default::default()
            },
        }
    }
}

impl WithValidate for SecurityIpsecVpn {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        validate::name_object(
            diags,
            AttributePath::new("name"),
            &self.name,
            32,
            NameFormat::Default,
            &[],
        );
        validate::matches(
            diags,
            AttributePath::new("bind_interface"),
            &self.bind_interface,
            |value| value.starts_with("st0."),
            "an st0 logical interface",
        );
        validate::bool_true(diags, AttributePath::new("copy_outer_dscp"), &self.copy_outer_dscp);
        validate::one_of(
            diags,
            AttributePath::new("df_bit"),
            &self.df_bit,
            &["clear", "copy", "set"],
        );
        validate::one_of(
            diags,
            AttributePath::new("establish_tunnels"),
            &self.establish_tunnels,
            &["immediately", "on-traffic"],
        );

        match (&self.ike, &self.manual) {
            (Value::Null, Value::Null) => {
                diags.root_error_short("one of ike or manual must be specified");
            }
            (Value::Value(_), Value::Value(_)) => {
                diags.error_short(
                    "only one of ike or manual must be specified",
                    AttributePath::new("ike"),
                );
            }
            _ => {}
        }
        if let Value::Value(ike) = &self.ike {
            ike.validate(diags);
        }
        if let Value::Value(manual) = &self.manual {
            if !self.establish_tunnels.is_null() {
                diags.error_short(
                    "cannot set establish_tunnels if manual is used",
                    AttributePath::new("establish_tunnels"),
                );
            }
            manual.validate(diags);
        }

        if let Value::Value(selectors) = &self.traffic_selector {
            if !selectors.is_empty() {
                if let Value::Value(ike) = &self.ike {
                    for (name, value) in [
                        ("identity_local", &ike.identity_local),
                        ("identity_remote", &ike.identity_remote),
                        ("identity_service", &ike.identity_service),
                    ] {
                        if !value.is_null() {
                            diags.error_short(
                                format!("ike.{name} should not be specified when traffic_selector is used"),
                                AttributePath::new("ike").attribute(name),
                            );
                        }
                    }
                }
                if !self.vpn_monitor.is_null() {
                    diags.error_short(
                        "vpn_monitor should not be specified when traffic_selector is used",
                        AttributePath::new("vpn_monitor"),
                    );
                }
            }
            let mut names = Vec::new();
            for (index, selector) in selectors.iter().enumerate() {
                let Value::Value(selector) = selector else {
                    continue;
                };
                let path = AttributePath::new("traffic_selector").index(index as i64);
                validate::name_object(
                    diags,
                    path.clone().attribute("name"),
                    &selector.name,
                    32,
                    NameFormat::Default,
                    &[],
                );
                if let Value::Value(name) = &selector.name {
                    if names.contains(&name) {
                        diags.error_short(
                            format!("multiple traffic_selector blocks with the same name {name:?}"),
                            path.clone().attribute("name"),
                        );
                    }
                    names.push(name);
                }
                for (name, value) in [("local_ip", &selector.local_ip), ("remote_ip", &selector.remote_ip)] {
                    validate::matches(diags, path.clone().attribute(name), value, is_cidr, "a CIDR address");
                }
            }
        }
        if let Value::Value(classes) = &self.multi_sa_forwarding_class {
            for class in classes {
                validate::length_between(
                    diags,
                    AttributePath::new("multi_sa_forwarding_class"),
                    class,
                    1,
                    32,
                );
            }
            if !classes.is_empty() && !self.vpn_monitor.is_null() {
                diags.error_short(
                    "vpn_monitor should not be specified when multi_sa_forwarding_class is specified",
                    AttributePath::new("vpn_monitor"),
                );
            }
        }
        if let Value::Value(udp) = &self.udp_encapsulate {
            validate::int_between(
                diags,
                AttributePath::new("udp_encapsulate").attribute("dest_port"),
                &udp.dest_port,
                1025,
                65536,
            );
        }
        if let Value::Value(monitor) = &self.vpn_monitor {
            let path = |name: &'static str| AttributePath::new("vpn_monitor").attribute(name);
            validate::ip_address(diags, path("destination_ip"), &monitor.destination_ip);
            validate::bool_true(diags, path("optimized"), &monitor.optimized);
            validate::bool_true(
                diags,
                path("source_interface_auto"),
                &monitor.source_interface_auto,
            );
            if let Value::Value(interface) = &monitor.source_interface {
                if !is_true(&monitor.source_interface_auto) && !interface.contains('.') {
                    diags.error_short(
                        "source_interface must be a logical interface",
                        path("source_interface"),
                    );
                }
            }
            validate::conflicts(
                diags,
                path("source_interface_auto"),
                "source_interface",
                "source_interface_auto",
                !monitor.source_interface.is_null() && !monitor.source_interface.is_unknown(),
                !monitor.source_interface_auto.is_null(),
            );
        }
    }
}

impl WithNormalize for SecurityIpsecVpn {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        normalize_block_list(&mut self.traffic_selector);
        let bind_interface = &self.bind_interface;
        if let Value::Value(monitor) = &mut self.vpn_monitor {
            if is_true(&monitor.source_interface_auto) {
                monitor.source_interface = bind_interface.clone();
            } else if monitor.source_interface.is_unknown() {
                monitor.source_interface = Value::Null;
            }
        }
    }
}

impl JunosResource for SecurityIpsecVpn {
    const TYPE_NAME: &'static str = "security_ipsec_vpn";
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
        let mut vpn = Self {
            id: value_str(id),
            name: value_str(id),
            ..Default::default()
        };
        normalize_block_list(&mut vpn.traffic_selector);
        Some(vpn)
    }

    fn replace_triggers(&self, prior: &Self) -> Vec<AttributePath> {
        let mut triggers = Vec::new();
        replace_if_changed(&mut triggers, "name", &prior.name, &self.name);
        triggers
    }

    fn config_path(&self) -> String {
        format!("security ipsec vpn {}", quoted(self.name.as_str()))
    }

    fn keep_from_prior(&mut self, prior: &Self) {
        if let (Value::Value(monitor), Value::Value(prior)) =
            (&mut self.vpn_monitor, &prior.vpn_monitor)
        {
            monitor.source_interface_auto = prior.source_interface_auto.clone();
        }
    }

    fn set_lines(&self) -> Result<Vec<String>> {
        let set_prefix = format!("set {} ", self.config_path());
        let mut lines = Vec::new();

        if let Some(interface) = non_empty(&self.bind_interface) {
            lines.push(format!("{set_prefix}bind-interface {interface}"));
        }
        if is_true(&self.copy_outer_dscp) {
            lines.push(format!("{set_prefix}copy-outer-dscp"));
        }
        if let Some(df_bit) = non_empty(&self.df_bit) {
            lines.push(format!("{set_prefix}df-bit {df_bit}"));
        }
        if let Some(establish) = non_empty(&self.establish_tunnels) {
            lines.push(format!("{set_prefix}establish-tunnels {establish}"));
        }
        if let Value::Value(ike) = &self.ike {
            ike.set_lines(&mut lines, &set_prefix)?;
        }
        if let Value::Value(manual) = &self.manual {
            manual.set_lines(&mut lines, &set_prefix)?;
        }
        let mut names = Vec::new();
        for selector in blocks(&self.traffic_selector) {
            let name = selector.name.as_str();
            if names.contains(&name) {
                bail!("multiple traffic_selector blocks with the same name {name:?}");
            }
            names.push(name);
            let prefix = format!("{set_prefix}traffic-selector {} ", quoted(name));
            lines.push(format!("{prefix}local-ip {}", selector.local_ip.as_str()));
            lines.push(format!("{prefix}remote-ip {}", selector.remote_ip.as_str()));
        }
        for class in set_strings(&self.multi_sa_forwarding_class) {
            lines.push(format!("{set_prefix}multi-sa forwarding-class {}", quoted(class)));
        }
        if let Value::Value(udp) = &self.udp_encapsulate {
            lines.push(format!("{set_prefix}udp-encapsulate"));
            if let Some(port) = number(&udp.dest_port) {
                lines.push(format!("{set_prefix}udp-encapsulate dest-port {port}"));
            }
        }
        if let Value::Value(monitor) = &self.vpn_monitor {
            lines.push(format!("{set_prefix}vpn-monitor"));
            if let Some(destination) = non_empty(&monitor.destination_ip) {
                lines.push(format!("{set_prefix}vpn-monitor destination-ip {destination}"));
            }
            if is_true(&monitor.optimized) {
                lines.push(format!("{set_prefix}vpn-monitor optimized"));
            }
            if let Some(interface) = non_empty(&monitor.source_interface) {
                lines.push(format!("{set_prefix}vpn-monitor source-interface {interface}"));
            }
        }
        Ok(lines)
    }

    fn parse_line(&mut self, mut line: &str) -> Result<()> {
        if cut_prefix(&mut line, "bind-interface ") {
            self.bind_interface = value_str(line);
        } else if line == "copy-outer-dscp" {
            self.copy_outer_dscp = flag(true);
        } else if cut_prefix(&mut line, "df-bit ") {
            self.df_bit = value_str(line);
        } else if cut_prefix(&mut line, "establish-tunnels ") {
            self.establish_tunnels = value_str(line);
        } else if cut_prefix(&mut line, "ike ") {
            block_mut(&mut self.ike).parse_line(line);
        } else if cut_prefix(&mut line, "manual ") {
            block_mut(&mut self.manual).parse_line(line)?;
        } else if cut_prefix(&mut line, "multi-sa forwarding-class ") {
            insert_str(&mut self.multi_sa_forwarding_class, trim_quotes(line));
        } else if cut_prefix(&mut line, "udp-encapsulate") {
            let udp = block_mut(&mut self.udp_encapsulate);
            if cut_prefix(&mut line, " dest-port ") {
                udp.dest_port = parse_number(line)?;
            }
        } else if cut_prefix(&mut line, "traffic-selector ") {
            let (name, rest) = line.split_once(' ').unwrap_or((line, ""));
            let name = trim_quotes(name);
            let selector =
                list_block_mut(&mut self.traffic_selector, |selector| selector.name.as_str() == name);
            selector.name = value_str(name);
            let mut rest = rest;
            if cut_prefix(&mut rest, "local-ip ") {
                selector.local_ip = value_str(rest);
            } else if cut_prefix(&mut rest, "remote-ip ") {
                selector.remote_ip = value_str(rest);
            }
        } else if cut_prefix(&mut line, "vpn-monitor") {
            let monitor = block_mut(&mut self.vpn_monitor);
            if cut_prefix(&mut line, " destination-ip ") {
                monitor.destination_ip = value_str(line);
            } else if line == " optimized" {
                monitor.optimized = flag(true);
            } else if cut_prefix(&mut line, " source-interface ") {
                monitor.source_interface = value_str(line);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ike_vpn() -> SecurityIpsecVpn {
        let mut vpn = SecurityIpsecVpn::from_id("vpn1").unwrap();
        vpn.bind_interface = value_str("st0.0");
        vpn.df_bit = value_str("clear");
        vpn.establish_tunnels = value_str("immediately");
        vpn.ike = Value::Value(IpsecIke {
            gateway: value_str("gw1"),
            policy: value_str("policy1"),
            identity_local: value_str("192.0.2.0/24"),
            identity_remote: value_str("198.51.100.0/24"),
            identity_service: value_str("any"),
        });
        vpn.udp_encapsulate = Value::Value(UdpEncapsulate::default());
        vpn.vpn_monitor = Value::Value(VpnMonitor {
            destination_ip: value_str("192.0.2.254"),
            optimized: flag(true),
            source_interface: value_str("st0.0"),
            ..Default::default()
        });
        vpn
    }

    #[test]
    fn set_lines() {
        let prefix = "set security ipsec vpn \"vpn1\"";
        assert_eq!(
            ike_vpn().set_lines().unwrap(),
            vec![
                format!("{prefix} bind-interface st0.0"),
                format!("{prefix} df-bit clear"),
                format!("{prefix} establish-tunnels immediately"),
                format!("{prefix} ike gateway \"gw1\""),
                format!("{prefix} ike ipsec-policy policy1"),
                format!("{prefix} ike proxy-identity local 192.0.2.0/24"),
                format!("{prefix} ike proxy-identity remote 198.51.100.0/24"),
                format!("{prefix} ike proxy-identity service \"any\""),
                format!("{prefix} udp-encapsulate"),
                format!("{prefix} vpn-monitor"),
                format!("{prefix} vpn-monitor destination-ip 192.0.2.254"),
                format!("{prefix} vpn-monitor optimized"),
                format!("{prefix} vpn-monitor source-interface st0.0"),
            ]
        );

        let mut missing_policy = ike_vpn();
        block_mut(&mut missing_policy.ike).policy = Value::Null;
        assert!(missing_policy.set_lines().is_err());
    }

    #[test]
    fn parse_lines() {
        let mut state = SecurityIpsecVpn::from_id("vpn1").unwrap();
        for line in [
            "bind-interface st0.0",
            "df-bit clear",
            "establish-tunnels immediately",
            "ike gateway \"gw1\"",
            "ike ipsec-policy policy1",
            "ike proxy-identity local 192.0.2.0/24",
            "ike proxy-identity remote 198.51.100.0/24",
            "ike proxy-identity service \"any\"",
            "udp-encapsulate",
            "vpn-monitor destination-ip 192.0.2.254",
            "vpn-monitor optimized",
            "vpn-monitor source-interface st0.0",
        ] {
            state.parse_line(line).unwrap();
        }
        assert_eq!(state, ike_vpn());
    }

    #[test]
    fn manual_keys_and_selectors() {
        let mut vpn = SecurityIpsecVpn::from_id("vpn2").unwrap();
        vpn.manual = Value::Value(IpsecManual {
            external_interface: value_str("ge-0/0/0.0"),
            protocol: value_str("esp"),
            spi: Value::Value(300),
            encryption_algorithm: value_str("aes-128-cbc"),
            encryption_key_text: value_str("testacc"),
            gateway: value_str("192.0.2.1"),
            ..Default::default()
        });
        vpn.traffic_selector = Value::Value(vec![Value::Value(TrafficSelector {
            name: value_str("ts1"),
            local_ip: value_str("192.0.2.0/24"),
            remote_ip: value_str("198.51.100.0/24"),
        })]);
        insert_str(&mut vpn.multi_sa_forwarding_class, "best-effort");
        let prefix = "set security ipsec vpn \"vpn2\"";
        assert_eq!(
            vpn.set_lines().unwrap(),
            vec![
                format!("{prefix} manual external-interface ge-0/0/0.0"),
                format!("{prefix} manual protocol esp"),
                format!("{prefix} manual spi 300"),
                format!("{prefix} manual encryption algorithm aes-128-cbc"),
                format!("{prefix} manual encryption key ascii-text \"testacc\""),
                format!("{prefix} manual gateway 192.0.2.1"),
                format!("{prefix} traffic-selector \"ts1\" local-ip 192.0.2.0/24"),
                format!("{prefix} traffic-selector \"ts1\" remote-ip 198.51.100.0/24"),
                format!("{prefix} multi-sa forwarding-class \"best-effort\""),
            ]
        );

        let mut state = SecurityIpsecVpn::from_id("vpn2").unwrap();
        for line in [
            "manual external-interface ge-0/0/0.0",
            "manual protocol esp",
            "manual spi 300",
            "manual encryption algorithm aes-128-cbc",
            "manual encryption key ascii-text \"$9$Qabcz9pIRSeMXcylMXxws4aZ\"",
            "manual gateway 192.0.2.1",
            "multi-sa forwarding-class \"best-effort\"",
            "traffic-selector \"ts1\" local-ip 192.0.2.0/24",
            "traffic-selector \"ts1\" remote-ip 198.51.100.0/24",
        ] {
            state.parse_line(line).unwrap();
        }
        assert_eq!(state, vpn);
    }

    #[test]
    fn source_interface_follows_bind_interface() {
        let mut plan = ike_vpn();
        if let Value::Value(monitor) = &mut plan.vpn_monitor {
            monitor.source_interface = Value::Unknown;
            monitor.source_interface_auto = flag(true);
        }
        plan.bind_interface = value_str("st0.1");
        plan.normalize(&mut Diagnostics::default());
        let Value::Value(monitor) = &plan.vpn_monitor else {
            panic!("vpn_monitor block lost");
        };
        assert_eq!(monitor.source_interface, value_str("st0.1"));

        // read back from the device, where the auto flag isn't stored
        let mut state = SecurityIpsecVpn::from_id("vpn1").unwrap();
        state.parse_line("vpn-monitor source-interface st0.1").unwrap();
        state.keep_from_prior(&plan);
        let Value::Value(monitor) = &state.vpn_monitor else {
            panic!("vpn_monitor block lost");
        };
        assert!(is_true(&monitor.source_interface_auto));
    }

    #[test]
    fn validation() {
        let mut diags = Diagnostics::default();
        ike_vpn().validate(&mut diags, AttributePath::default());
        assert!(diags.errors.is_empty(), "{:?}", diags.errors);

        let mut config = ike_vpn();
        config.bind_interface = value_str("ge-0/0/0.0");
        config.manual = Value::Value(IpsecManual {
            protocol: value_str("ah"),
            ..Default::default()
        });
        config.traffic_selector = Value::Value(vec![Value::Value(TrafficSelector {
            name: value_str("ts1"),
            local_ip: value_str("192.0.2.0/24"),
            remote_ip: value_str("198.51.100.0/24"),
        })]);
        let mut diags = Diagnostics::default();
        config.validate(&mut diags, AttributePath::default());
        // bind_interface, ike with manual, establish_tunnels with manual,
        // external_interface, spi, ah without algorithm, three ike identities, vpn_monitor
        assert_eq!(diags.errors.len(), 10, "{:?}", diags.errors);

        let mut diags = Diagnostics::default();
        SecurityIpsecVpn::from_id("vpn3")
            .unwrap()
            .validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 1);
    }
}
