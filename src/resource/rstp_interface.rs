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
    value::ValueNumber,
    AttributePath, Diagnostics, Value,
};

use crate::junos::{cut_prefix, DEFAULT_WORD, ID_SEPARATOR};
use crate::utils::{
    defaulted_string, flag, id_attribute, is_true, non_empty, number, optional_bool,
    optional_number, optional_string, parse_number, replace_if_changed, required_string,
    value_str, ValueBool, ValueStr, WithNormalize, WithSchema, WithValidate,
};
use crate::validate::{self, NameFormat};

use super::{routing_instance_prefix, JunosResource, Requirement};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RstpInterface {
    pub id: ValueStr,
    pub name: ValueStr,
    pub routing_instance: ValueStr,
    pub access_trunk: ValueBool,
    pub bpdu_timeout_action_alarm: ValueBool,
    pub bpdu_timeout_action_block: ValueBool,
    pub cost: ValueNumber,
    pub edge: ValueBool,
    pub mode: ValueStr,
    pub no_root_port: ValueBool,
    pub priority: ValueNumber,
}

impl WithSchema for RstpInterface {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                description: Description::plain("Provides a RSTP interface resource"),
                attributes: map! {
                    "id" => id_attribute(),
                    "name" => required_string("Interface name or `all`"),
                    "routing_instance" => defaulted_string("Routing instance for the interface, `default` for the main instance"),
                    "access_trunk" => optional_bool("Send/Receive untagged RSTP BPDUs on this interface"),
                    "bpdu_timeout_action_alarm" => optional_bool("Generate an alarm on BPDU expiry (Loop Protect)"),
                    "bpdu_timeout_action_block" => optional_bool("Block the interface on BPDU expiry (Loop Protect)"),
                    "cost" => optional_number("Cost of the interface (1..200000000)"),
                    "edge" => optional_bool("Port is an edge port"),
                    "mode" => optional_string("Interface mode (P2P or shared)"),
                    "no_root_port" => optional_bool("Do not allow the interface to become root (Root Protect)"),
                    "priority" => optional_number("Interface priority (in increments of 16 - 0,16,..240)"),
                },
                ..Default::default()
            },
        }
    }
}

impl WithValidate for RstpInterface {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        validate::matches(
            diags,
            AttributePath::new("name"),
            &self.name,
            |name| !name.is_empty() && !name.contains('.'),
            "an interface name without dot",
        );
        validate::name_object(
            diags,
            AttributePath::new("routing_instance"),
            &self.routing_instance,
            63,
            NameFormat::Default,
            &[],
        );
        for (name, value) in [
            ("access_trunk", &self.access_trunk),
            ("bpdu_timeout_action_alarm", &self.bpdu_timeout_action_alarm),
            ("bpdu_timeout_action_block", &self.bpdu_timeout_action_block),
            ("edge", &self.edge),
            ("no_root_port", &self.no_root_port),
        ] {
            validate::bool_true(diags, AttributePath::new(name), value);
        }
        validate::int_between(diags, AttributePath::new("cost"), &self.cost, 1, 200_000_000);
        validate::one_of(
            diags,
            AttributePath::new("mode"),
            &self.mode,
            &["point-to-point", "shared"],
        );
        validate::int_between(diags, AttributePath::new("priority"), &self.priority, 0, 240);
        if let Value::Value(priority) = self.priority {
            if priority % 16 != 0 {
                diags.error_short(
                    format!("priority must be a multiple of 16, got {priority}"),
                    AttributePath::new("priority"),
                );
            }
        }
    }
}

impl WithNormalize for RstpInterface {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        if self.routing_instance.is_null() {
            self.routing_instance = value_str(DEFAULT_WORD);
        }
    }
}

impl JunosResource for RstpInterface {
    const TYPE_NAME: &'static str = "rstp_interface";
    const ID_FORMAT: &'static str = "<name>_-_<routing_instance>";

    fn id_mut(&mut self) -> &mut ValueStr {
        &mut self.id
    }

    fn compute_id(&self) -> String {
        format!(
            "{}{ID_SEPARATOR}{}",
            self.name.as_str(),
            self.routing_instance.as_str()
        )
    }

    fn from_id(id: &str) -> Option<Self> {
        let (name, routing_instance) = id.split_once(ID_SEPARATOR)?;
        if name.is_empty() || routing_instance.is_empty() || routing_instance.contains(ID_SEPARATOR)
        {
            return None;
        }
        Some(Self {
            id: value_str(id),
            name: value_str(name),
            routing_instance: value_str(routing_instance),
            ..Default::default()
        })
    }

    fn replace_triggers(&self, prior: &Self) -> Vec<AttributePath> {
        let mut triggers = Vec::new();
        replace_if_changed(&mut triggers, "name", &prior.name, &self.name);
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
        format!(
            "{}protocols rstp interface {}",
            routing_instance_prefix(self.routing_instance.as_str()),
            self.name.as_str()
        )
    }

    fn set_lines(&self) -> Result<Vec<String>> {
        let set_path = format!("set {}", self.config_path());
        let mut lines = vec![set_path.clone()];

        if is_true(&self.access_trunk) {
            lines.push(format!("{set_path} access-trunk"));
        }
        if is_true(&self.bpdu_timeout_action_alarm) {
            lines.push(format!("{set_path} bpdu-timeout-action alarm"));
        }
        if is_true(&self.bpdu_timeout_action_block) {
            lines.push(format!("{set_path} bpdu-timeout-action block"));
        }
        if let Some(cost) = number(&self.cost) {
            lines.push(format!("{set_path} cost {cost}"));
        }
        if is_true(&self.edge) {
            lines.push(format!("{set_path} edge"));
        }
        if let Some(mode) = non_empty(&self.mode) {
            lines.push(format!("{set_path} mode {mode}"));
        }
        if is_true(&self.no_root_port) {
            lines.push(format!("{set_path} no-root-port"));
        }
        if let Some(priority) = number(&self.priority) {
            lines.push(format!("{set_path} priority {priority}"));
        }
        Ok(lines)
    }

    fn parse_line(&mut self, mut line: &str) -> Result<()> {
        match line {
            "access-trunk" => self.access_trunk = flag(true),
            "bpdu-timeout-action alarm" => self.bpdu_timeout_action_alarm = flag(true),
            "bpdu-timeout-action block" => self.bpdu_timeout_action_block = flag(true),
            "edge" => self.edge = flag(true),
            "no-root-port" => self.no_root_port = flag(true),
            _ => {
                if cut_prefix(&mut line, "cost ") {
                    self.cost = parse_number(line)?;
                } else if cut_prefix(&mut line, "mode ") {
                    self.mode = value_str(line);
                } else if cut_prefix(&mut line, "priority ") {
                    self.priority = parse_number(line)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_lines_in_routing_instance() {
        let mut interface = RstpInterface::from_id("ge-0/0/3_-_vs1").unwrap();
        interface.bpdu_timeout_action_block = flag(true);
        interface.cost = Value::Value(1000);
        interface.mode = value_str("shared");
        interface.priority = Value::Value(0);
        let prefix = "set routing-instances vs1 protocols rstp interface ge-0/0/3";
        assert_eq!(
            interface.set_lines().unwrap(),
            vec![
                prefix.to_owned(),
                format!("{prefix} bpdu-timeout-action block"),
                format!("{prefix} cost 1000"),
                format!("{prefix} mode shared"),
                format!("{prefix} priority 0"),
            ]
        );
        assert_eq!(
            interface.delete_lines(),
            vec!["delete routing-instances vs1 protocols rstp interface ge-0/0/3"]
        );
    }

    #[test]
    fn parse_lines() {
        let mut state = RstpInterface::from_id("all_-_default").unwrap();
        for line in ["access-trunk", "edge", "no-root-port", "priority 16"] {
            state.parse_line(line).unwrap();
        }
        assert_eq!(state.config_path(), "protocols rstp interface all");
        assert_eq!(state.access_trunk, flag(true));
        assert_eq!(state.edge, flag(true));
        assert_eq!(state.no_root_port, flag(true));
        assert_eq!(state.priority, Value::Value(16));
        assert_eq!(state.cost, Value::Null);
        assert!(state.parse_line("cost abc").is_err());
    }

    #[test]
    fn validation() {
        let mut diags = Diagnostics::default();
        let config = RstpInterface {
            name: value_str("ge-0/0/3.0"),
            routing_instance: value_str("default"),
            cost: Value::Value(0),
            mode: value_str("p2p"),
            priority: Value::Value(20),
            edge: Value::Value(false),
            ..Default::default()
        };
        config.validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 5);
        assert!(RstpInterface::from_id("ge-0/0/3").is_none());
    }
}
