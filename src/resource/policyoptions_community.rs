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
    value::ValueList,
    AttributePath, Diagnostics, Value,
};

use crate::junos::{cut_prefix, quoted, trim_quotes};
use crate::utils::{
    flag, id_attribute, is_true, optional_bool, push_str, replace_if_changed, required_list,
    required_string, strings, value_str, ValueBool, ValueStr, WithNormalize, WithSchema,
    WithValidate,
};
use crate::validate::{self, NameFormat};

use super::JunosResource;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyoptionsCommunity {
    pub id: ValueStr,
    pub name: ValueStr,
    pub members: ValueList<ValueStr>,
    pub invert_match: ValueBool,
}

impl WithSchema for PolicyoptionsCommunity {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                description: Description::plain("Provides a policy-options community resource"),
                attributes: map! {
                    "id" => id_attribute(),
                    "name" => required_string("Name to identify the community"),
                    "members" => required_list("Community members"),
                    "invert_match" => optional_bool("Invert the result of the community expression matching"),
                },
                ..Default::default()
            },
        }
    }
}

impl WithValidate for PolicyoptionsCommunity {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        validate::name_object(
            diags,
            AttributePath::new("name"),
            &self.name,
            63,
            NameFormat::Default,
            &[],
        );
        if let Value::Value(members) = &self.members {
            if members.is_empty() {
                diags.error_short("at least one member is required", AttributePath::new("members"));
            }
        }
    }
}

impl WithNormalize for PolicyoptionsCommunity {
    fn normalize(&mut self, _diags: &mut Diagnostics) {}
}

impl JunosResource for PolicyoptionsCommunity {
    const TYPE_NAME: &'static str = "policyoptions_community";
    const ID_FORMAT: &'static str = "<name>";

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
        format!("policy-options community {}", self.name.as_str())
    }

    fn set_lines(&self) -> Result<Vec<String>> {
        let set_prefix = format!("set {} ", self.config_path());
        let mut lines = strings(&self.members)
            .map(|member| format!("{set_prefix}members {}", quoted(member)))
            .collect::<Vec<_>>();
        if is_true(&self.invert_match) {
            lines.push(format!("{set_prefix}invert-match"));
        }
        Ok(lines)
    }

    fn parse_line(&mut self, mut line: &str) -> Result<()> {
        if cut_prefix(&mut line, "members ") {
            push_str(&mut self.members, trim_quotes(line));
        } else if line == "invert-match" {
            self.invert_match = flag(true);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn community() -> PolicyoptionsCommunity {
        let mut community = PolicyoptionsCommunity::from_id("c1").unwrap();
        push_str(&mut community.members, "65000:100");
        push_str(&mut community.members, "^65000:.*$");
        community.invert_match = flag(true);
        community
    }

    #[test]
    fn set_lines() {
        assert_eq!(
            community().set_lines().unwrap(),
            vec![
                "set policy-options community c1 members \"65000:100\"",
                "set policy-options community c1 members \"^65000:.*$\"",
                "set policy-options community c1 invert-match",
            ]
        );
        assert_eq!(
            community().delete_lines(),
            vec!["delete policy-options community c1"]
        );
    }

    #[test]
    fn parse_lines() {
        let mut state = PolicyoptionsCommunity::from_id("c1").unwrap();
        for line in ["members 65000:100", "members \"^65000:.*$\"", "invert-match"] {
            state.parse_line(line).unwrap();
        }
        assert_eq!(state, community());
    }

    #[test]
    fn validation() {
        let mut diags = Diagnostics::default();
        let mut config = community();
        config.name = value_str("bad name");
        config.members = Value::Value(Vec::new());
        config.validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 2);
    }

    #[test]
    fn name_change_replaces() {
        let prior = community();
        let mut plan = community();
        plan.invert_match = Value::Null;
        assert!(plan.replace_triggers(&prior).is_empty());
        plan.name = value_str("c2");
        assert_eq!(plan.replace_triggers(&prior).len(), 1);
    }
}
