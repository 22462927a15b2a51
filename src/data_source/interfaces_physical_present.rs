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

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tf_provider::{
    map,
    schema::{AttributeType, Block, Description, Schema},
    value::ValueList,
    AttributePath, DataSource, Diagnostics, Value, ValueEmpty,
};
use tracing::debug;

use crate::junos::{mutex_lock, Session, ID_SEPARATOR, RPC_GET_INTERFACES_INFORMATION_TERSE};
use crate::junos_provider::SharedClient;
use crate::utils::{
    computed_list, computed_string, is_true, optional_bool, optional_string, value_str,
    ValueBool, ValueStr, WithSchema, WithValidate,
};
use crate::validate;

/// Physical interfaces present on the device, filtered by name and status
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfacesPhysicalPresent {
    pub id: ValueStr,
    pub match_name: ValueStr,
    pub match_admin_up: ValueBool,
    pub match_oper_up: ValueBool,
    pub interface_names: ValueList<ValueStr>,
    pub interface_statuses: ValueList<Value<InterfaceStatus>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceStatus {
    pub name: ValueStr,
    pub admin_status: ValueStr,
    pub oper_status: ValueStr,
}

#[derive(Debug, Default, Deserialize)]
struct InterfaceInformationReply {
    #[serde(rename = "interface-information", default)]
    interface_information: InterfaceInformation,
}

#[derive(Debug, Default, Deserialize)]
struct InterfaceInformation {
    #[serde(rename = "physical-interface", default)]
    physical_interface: Vec<PhysicalInterface>,
}

#[derive(Debug, Default, Deserialize)]
struct PhysicalInterface {
    #[serde(default)]
    name: String,
    #[serde(rename = "admin-status", default)]
    admin_status: String,
    #[serde(rename = "oper-status", default)]
    oper_status: String,
}

impl WithSchema for InterfacesPhysicalPresent {
    fn schema() -> Schema {
        let status = AttributeType::Object(
            ["name", "admin_status", "oper_status"]
                .into_iter()
                .map(|name| (name.to_owned(), AttributeType::String))
                .collect(),
        );
        Schema {
            version: 1,
            block: Block {
                description: Description::plain(
                    "Get list of all of filtered physical interfaces present on device",
                ),
                attributes: map! {
                    "id" => computed_string("An identifier for the data source"),
                    "match_name" => optional_string("A regexp to apply filter on name"),
                    "match_admin_up" => optional_bool("Filter on interfaces that have admin status `up`"),
                    "match_oper_up" => optional_bool("Filter on interfaces that have operational status `up`"),
                    "interface_names" => computed_list(AttributeType::String, "List of interface names found"),
                    "interface_statuses" => computed_list(status, "For each interface name"),
                },
                ..Default::default()
            },
        }
    }
}

impl WithValidate for InterfacesPhysicalPresent {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        validate::regex(diags, AttributePath::new("match_name"), &self.match_name);
        validate::bool_true(diags, AttributePath::new("match_admin_up"), &self.match_admin_up);
        validate::bool_true(diags, AttributePath::new("match_oper_up"), &self.match_oper_up);
    }
}

impl InterfacesPhysicalPresent {
    fn compute_id(&self) -> String {
        let mut id = format!("match={}", self.match_name.as_str());
        if is_true(&self.match_admin_up) {
            id.push_str(ID_SEPARATOR);
            id.push_str("admin_up=true");
        }
        if is_true(&self.match_oper_up) {
            id.push_str(ID_SEPARATOR);
            id.push_str("oper_up=true");
        }
        id
    }

    /// Keep the interfaces of `interfaces` matching the filters
    fn fill(&mut self, interfaces: Vec<PhysicalInterface>) -> Result<()> {
        let matcher = match self.match_name.as_str() {
            "" => None,
            pattern => Some(
                Regex::new(pattern)
                    .with_context(|| format!("matching with regexp {pattern:?}"))?,
            ),
        };
        let mut names = Vec::new();
        let mut statuses = Vec::new();
        for interface in interfaces {
            let name = interface.name.trim();
            let admin_status = interface.admin_status.trim();
            let oper_status = interface.oper_status.trim();
            if matcher.as_ref().is_some_and(|matcher| !matcher.is_match(name)) {
                continue;
            }
            if is_true(&self.match_admin_up) && admin_status != "up" {
                continue;
            }
            if is_true(&self.match_oper_up) && oper_status != "up" {
                continue;
            }
            names.push(value_str(name));
            statuses.push(Value::Value(InterfaceStatus {
                name: value_str(name),
                admin_status: value_str(admin_status),
                oper_status: value_str(oper_status),
            }));
        }
        self.interface_names = Value::Value(names);
        self.interface_statuses = Value::Value(statuses);
        self.id = value_str(self.compute_id());
        Ok(())
    }

    async fn read(&mut self, session: &mut Session) -> Result<()> {
        let reply = session
            .command_xml(RPC_GET_INTERFACES_INFORMATION_TERSE)
            .await?;
        let interfaces = reply.deserialize::<InterfaceInformationReply>()?;
        debug!(
            count = interfaces.interface_information.physical_interface.len(),
            "physical interfaces read"
        );
        self.fill(interfaces.interface_information.physical_interface)
    }
}

#[derive(Debug)]
pub struct InterfacesPhysicalPresentDataSource {
    client: SharedClient,
}

impl InterfacesPhysicalPresentDataSource {
    pub fn new(client: SharedClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSource for InterfacesPhysicalPresentDataSource {
    type State<'a> = Value<InterfacesPhysicalPresent>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(InterfacesPhysicalPresent::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if let Value::Value(config) = &config {
            config.validate(diags, AttributePath::default());
        }

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let Value::Value(mut state) = config else {
            diags.root_error_short("Configuration of the data source must be known");
            return None;
        };
        let client = self.client.get(diags)?;

        let guard = mutex_lock().await;
        let mut session = match client.start_new_session().await {
            Ok(session) => session,
            Err(err) => {
                diags.root_error("Failed to start netconf session", format!("{err:#}"));
                return None;
            }
        };
        let result = state.read(&mut session).await;
        session.close().await;
        drop(guard);

        if let Err(err) = result {
            diags.root_error(
                "Failed to read junos_interfaces_physical_present",
                format!("{err:#}"),
            );
            return None;
        }
        Some(Value::Value(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::junos::fake_session;
    use crate::utils::flag;

    const TERSE_REPLY: &str = r#"<rpc-reply>
<interface-information style="terse">
<physical-interface>
<name>
ge-0/0/0
</name>
<admin-status>
up
</admin-status>
<oper-status>
up
</oper-status>
<logical-interface>
<name>
ge-0/0/0.0
</name>
</logical-interface>
</physical-interface>
<physical-interface>
<name>
ge-0/0/1
</name>
<admin-status>
up
</admin-status>
<oper-status>
down
</oper-status>
</physical-interface>
<physical-interface>
<name>
xe-0/1/0
</name>
<admin-status>
down
</admin-status>
<oper-status>
down
</oper-status>
</physical-interface>
</interface-information>
</rpc-reply>"#;

    fn names(state: &InterfacesPhysicalPresent) -> Vec<&str> {
        let Value::Value(names) = &state.interface_names else {
            return Vec::new();
        };
        names.iter().map(|name| name.as_str()).collect()
    }

    #[tokio::test]
    async fn read_filters_interfaces() {
        let (mut session, received) = fake_session("mx240", |_| TERSE_REPLY.to_owned()).await;

        let mut all = InterfacesPhysicalPresent::default();
        all.read(&mut session).await.unwrap();
        assert_eq!(names(&all), vec!["ge-0/0/0", "ge-0/0/1", "xe-0/1/0"]);
        assert_eq!(all.id, value_str("match="));

        let mut up = InterfacesPhysicalPresent {
            match_name: value_str("^ge-"),
            match_oper_up: flag(true),
            ..Default::default()
        };
        up.read(&mut session).await.unwrap();
        assert_eq!(names(&up), vec!["ge-0/0/0"]);
        assert_eq!(
            up.interface_statuses,
            Value::Value(vec![Value::Value(InterfaceStatus {
                name: value_str("ge-0/0/0"),
                admin_status: value_str("up"),
                oper_status: value_str("up"),
            })])
        );
        assert_eq!(up.id, value_str("match=^ge-_-_oper_up=true"));

        let mut admin = InterfacesPhysicalPresent {
            match_admin_up: flag(true),
            ..Default::default()
        };
        admin.read(&mut session).await.unwrap();
        assert_eq!(names(&admin), vec!["ge-0/0/0", "ge-0/0/1"]);
        assert_eq!(admin.id, value_str("match=_-_admin_up=true"));

        session.close().await;
        assert!(received.lock().unwrap()[0].contains(RPC_GET_INTERFACES_INFORMATION_TERSE));
    }

    #[test]
    fn invalid_regex() {
        let mut state = InterfacesPhysicalPresent {
            match_name: value_str("ge-("),
            ..Default::default()
        };
        assert!(state.fill(Vec::new()).is_err());

        let mut diags = Diagnostics::default();
        state.validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 1);
    }

    #[test]
    fn no_interface_gives_empty_lists() {
        let mut state = InterfacesPhysicalPresent::default();
        state.fill(Vec::new()).unwrap();
        assert_eq!(state.interface_names, Value::Value(Vec::new()));
        assert_eq!(state.interface_statuses, Value::Value(Vec::new()));
    }
}
