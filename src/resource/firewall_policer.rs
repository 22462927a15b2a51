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
    value::ValueNumber,
    AttributePath, Diagnostics, Value,
};

use crate::junos::cut_prefix;
use crate::utils::{
    block_mut, flag, id_attribute, is_true, non_empty, number, optional_bool, optional_number,
    optional_string, parse_number, replace_if_changed, required_string, value_str, ValueBool,
    ValueStr, WithNormalize, WithSchema, WithValidate,
};
use crate::validate::{self, NameFormat};

use super::JunosResource;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallPolicer {
    pub id: ValueStr,
    pub name: ValueStr,
    pub filter_specific: ValueBool,
    pub if_exceeding: Value<IfExceeding>,
    pub then: Value<PolicerThen>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IfExceeding {
    pub burst_size_limit: ValueStr,
    pub bandwidth_percent: ValueNumber,
    pub bandwidth_limit: ValueStr,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicerThen {
    pub discard: ValueBool,
    pub forwarding_class: ValueStr,
    pub loss_priority: ValueStr,
    pub out_of_profile: ValueBool,
}

impl PolicerThen {
    fn is_empty(&self) -> bool {
        self.discard.is_null()
            && self.forwarding_class.is_null()
            && self.loss_priority.is_null()
            && self.out_of_profile.is_null()
    }
}

impl WithSchema for FirewallPolicer {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                description: Description::plain("Provides a firewall policer resource"),
                attributes: map! {
                    "id" => id_attribute(),
                    "name" => required_string("Policer name"),
                    "filter_specific" => optional_bool("Policer is filter-specific"),
                },
                blocks: map! {
                    "if_exceeding" => NestedBlock::Single(Block {
                        description: Description::plain("Define rate limits options"),
                        attributes: map! {
                            "burst_size_limit" => required_string("Burst size limit in bytes"),
                            "bandwidth_percent" => optional_number("Bandwidth limit in percentage (1..100 percent)"),
                            "bandwidth_limit" => optional_string("Bandwidth limit in bits/second"),
                        },
                        ..Default::default()
                    }),
                    "then" => NestedBlock::Single(Block {
                        description: Description::plain("Define action to take if the rate limits are exceeded"),
                        attributes: map! {
                            "discard" => optional_bool("Discard the packet"),
                            "forwarding_class" => optional_string("Classify packet to forwarding class"),
                            "loss_priority" => optional_string("Packet's loss priority"),
                            "out_of_profile" => optional_bool("Discard packets only if both congested and over threshold"),
                        },
                        ..Default::default()
                    }),
                },
                ..Default::default()
            },
        }
    }
}

impl WithValidate for FirewallPolicer {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        validate::length_between(diags, AttributePath::new("name"), &self.name, 1, 250);
        validate::no_double_quote(diags, AttributePath::new("name"), &self.name);
        validate::bool_true(
            diags,
            AttributePath::new("filter_specific"),
            &self.filter_specific,
        );

        if let Value::Value(if_exceeding) = &self.if_exceeding {
            let path = AttributePath::new("if_exceeding");
            for (name, value) in [
                ("burst_size_limit", &if_exceeding.burst_size_limit),
                ("bandwidth_limit", &if_exceeding.bandwidth_limit),
            ] {
                validate::matches(
                    diags,
                    path.clone().attribute(name),
                    value,
                    validate::is_bandwidth,
                    r"a bandwidth ^(\d)+(m|k|g)?$",
                );
            }
            validate::int_between(
                diags,
                path.clone().attribute("bandwidth_percent"),
                &if_exceeding.bandwidth_percent,
                1,
                100,
            );
            validate::conflicts(
                diags,
                path.attribute("bandwidth_percent"),
                "bandwidth_percent",
                "bandwidth_limit",
                !if_exceeding.bandwidth_percent.is_null(),
                !if_exceeding.bandwidth_limit.is_null(),
            );
        }

        match &self.then {
            Value::Value(then) => {
                let path = AttributePath::new("then");
                if then.is_empty() {
                    diags.error_short("then block is empty", path.clone());
                }
                validate::bool_true(diags, path.clone().attribute("discard"), &then.discard);
                validate::bool_true(
                    diags,
                    path.clone().attribute("out_of_profile"),
                    &then.out_of_profile,
                );
                validate::name_object(
                    diags,
                    path.clone().attribute("forwarding_class"),
                    &then.forwarding_class,
                    63,
                    NameFormat::Default,
                    &[],
                );
                validate::one_of(
                    diags,
                    path.clone().attribute("loss_priority"),
                    &then.loss_priority,
                    &["high", "low", "medium-high", "medium-low"],
                );
                let discard = !then.discard.is_null();
                for (name, set) in [
                    ("forwarding_class", !then.forwarding_class.is_null()),
                    ("loss_priority", !then.loss_priority.is_null()),
                    ("out_of_profile", !then.out_of_profile.is_null()),
                ] {
                    validate::conflicts(
                        diags,
                        path.clone().attribute(name),
                        "discard",
                        name,
                        discard,
                        set,
                    );
                }
            }
            Value::Null => diags.error_short(
                "then block must be specified",
                AttributePath::new("then"),
            ),
            Value::Unknown => (),
        }
    }
}

impl WithNormalize for FirewallPolicer {
    fn normalize(&mut self, _diags: &mut Diagnostics) {}
}

impl JunosResource for FirewallPolicer {
    const TYPE_NAME: &'static str = "firewall_policer";
    const ID_FORMAT: &'static str = "<name>";

    fn id_mut(&mut self) -> &mut ValueStr {
        &mut self.id
    }

    fn compute_id(&self) -> String {
        self.name.as_str().to_owned()
    }

    fn from_id(id: &str) -> Option<Self> {
        if id.is_empty() || id.contains('"') {
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
        format!("firewall policer \"{}\"", self.name.as_str())
    }

    fn set_lines(&self) -> Result<Vec<String>> {
        let set_prefix = format!("set {} ", self.config_path());
        let mut lines = Vec::new();

        if is_true(&self.filter_specific) {
            lines.push(format!("{set_prefix}filter-specific"));
        }
        if let Value::Value(if_exceeding) = &self.if_exceeding {
            if let Some(burst) = non_empty(&if_exceeding.burst_size_limit) {
                lines.push(format!("{set_prefix}if-exceeding burst-size-limit {burst}"));
            }
            if let Some(percent) = number(&if_exceeding.bandwidth_percent) {
                lines.push(format!("{set_prefix}if-exceeding bandwidth-percent {percent}"));
            }
            if let Some(limit) = non_empty(&if_exceeding.bandwidth_limit) {
                lines.push(format!("{set_prefix}if-exceeding bandwidth-limit {limit}"));
            }
        }
        if let Value::Value(then) = &self.then {
            if is_true(&then.discard) {
                lines.push(format!("{set_prefix}then discard"));
            }
            if let Some(class) = non_empty(&then.forwarding_class) {
                lines.push(format!("{set_prefix}then forwarding-class {class}"));
            }
            if let Some(priority) = non_empty(&then.loss_priority) {
                lines.push(format!("{set_prefix}then loss-priority {priority}"));
            }
            if is_true(&then.out_of_profile) {
                lines.push(format!("{set_prefix}then out-of-profile"));
            }
        }
        Ok(lines)
    }

    fn parse_line(&mut self, mut line: &str) -> Result<()> {
        if line == "filter-specific" {
            self.filter_specific = flag(true);
        } else if cut_prefix(&mut line, "if-exceeding ") {
            let if_exceeding = block_mut(&mut self.if_exceeding);
            if cut_prefix(&mut line, "burst-size-limit ") {
                if_exceeding.burst_size_limit = value_str(line);
            } else if cut_prefix(&mut line, "bandwidth-percent ") {
                if_exceeding.bandwidth_percent = parse_number(line)?;
            } else if cut_prefix(&mut line, "bandwidth-limit ") {
                if_exceeding.bandwidth_limit = value_str(line);
            }
        } else if cut_prefix(&mut line, "then ") {
            let then = block_mut(&mut self.then);
            if line == "discard" {
                then.discard = flag(true);
            } else if cut_prefix(&mut line, "forwarding-class ") {
                then.forwarding_class = value_str(line);
            } else if cut_prefix(&mut line, "loss-priority ") {
                then.loss_priority = value_str(line);
            } else if line == "out-of-profile" {
                then.out_of_profile = flag(true);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policer() -> FirewallPolicer {
        FirewallPolicer {
            id: value_str("pol1"),
            name: value_str("pol1"),
            filter_specific: flag(true),
            if_exceeding: Value::Value(IfExceeding {
                burst_size_limit: value_str("50k"),
                bandwidth_percent: Value::Value(80),
                bandwidth_limit: Value::Null,
            }),
            then: Value::Value(PolicerThen {
                forwarding_class: value_str("best-effort"),
                loss_priority: value_str("high"),
                out_of_profile: flag(true),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn set_lines() {
        assert_eq!(
            policer().set_lines().unwrap(),
            vec![
                "set firewall policer \"pol1\" filter-specific",
                "set firewall policer \"pol1\" if-exceeding burst-size-limit 50k",
                "set firewall policer \"pol1\" if-exceeding bandwidth-percent 80",
                "set firewall policer \"pol1\" then forwarding-class best-effort",
                "set firewall policer \"pol1\" then loss-priority high",
                "set firewall policer \"pol1\" then out-of-profile",
            ]
        );
        assert_eq!(
            policer().delete_lines(),
            vec!["delete firewall policer \"pol1\""]
        );
    }

    #[test]
    fn parse_lines() {
        let mut state = FirewallPolicer::from_id("pol1").unwrap();
        for line in [
            "filter-specific",
            "if-exceeding bandwidth-percent 80",
            "if-exceeding burst-size-limit 50k",
            "then forwarding-class best-effort",
            "then loss-priority high",
            "then out-of-profile",
        ] {
            state.parse_line(line).unwrap();
        }
        assert_eq!(state, policer());
        assert!(state
            .parse_line("if-exceeding bandwidth-percent eighty")
            .is_err());
    }

    #[test]
    fn validation() {
        let mut diags = Diagnostics::default();
        policer().validate(&mut diags, AttributePath::default());
        assert!(diags.errors.is_empty());

        let mut config = policer();
        config.then = Value::Value(PolicerThen {
            discard: flag(true),
            loss_priority: value_str("high"),
            ..Default::default()
        });
        if let Value::Value(if_exceeding) = &mut config.if_exceeding {
            if_exceeding.bandwidth_limit = value_str("10m");
            if_exceeding.burst_size_limit = value_str("lots");
        }
        config.validate(&mut diags, AttributePath::default());
        // discard with loss_priority, percent with limit, bad burst size
        assert_eq!(diags.errors.len(), 3);

        let mut diags = Diagnostics::default();
        let mut config = policer();
        config.then = Value::Null;
        config.validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 1);

        let mut diags = Diagnostics::default();
        let mut config = policer();
        config.then = Value::Value(PolicerThen::default());
        config.validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 1);
    }
}
