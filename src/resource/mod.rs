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

//! Terraform resources, one Junos configuration object each.

use std::fmt::Debug;

use anyhow::{bail, Result};
use serde::{de::DeserializeOwned, Serialize};
use tf_provider::AttributePath;

use crate::junos::{Session, DEFAULT_WORD, ROUTING_INSTANCES_WS};
use crate::utils::{ValueStr, WithNormalize, WithSchema, WithValidate};

mod bgp_neighbor;
mod eventoptions_policy;
mod firewall_policer;
mod generate_route;
mod generic;
mod policyoptions_community;
mod route;
mod rstp_interface;
mod security_address_book;
mod security_ipsec_vpn;
mod security_zone_book_address;
mod static_route;

pub use bgp_neighbor::BgpNeighbor;
pub use eventoptions_policy::EventoptionsPolicy;
pub use firewall_policer::FirewallPolicer;
pub use generate_route::GenerateRoute;
pub use generic::JunosResourceAdapter;
pub use policyoptions_community::PolicyoptionsCommunity;
pub use rstp_interface::RstpInterface;
pub use security_address_book::SecurityAddressBook;
pub use security_ipsec_vpn::SecurityIpsecVpn;
pub use security_zone_book_address::SecurityZoneBookAddress;
pub use static_route::StaticRoute;

/// Object that must be configured before a resource can be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    RoutingInstance(String),
    SecurityZone(String),
}

impl Requirement {
    pub async fn check(&self, session: &mut Session) -> Result<()> {
        match self {
            Requirement::RoutingInstance(name) => {
                if name != DEFAULT_WORD
                    && session
                        .show_config(&format!("{ROUTING_INSTANCES_WS}{name}"))
                        .await?
                        .is_none()
                {
                    bail!("routing instance {name} doesn't exist");
                }
            }
            Requirement::SecurityZone(name) => {
                if session
                    .show_config(&format!("security zones security-zone {name}"))
                    .await?
                    .is_none()
                {
                    bail!("security zone {name} doesn't exist");
                }
            }
        }
        Ok(())
    }
}

/// A Junos configuration object managed through set lines
pub trait JunosResource:
    WithSchema
    + WithValidate
    + WithNormalize
    + Serialize
    + DeserializeOwned
    + Clone
    + Debug
    + Default
    + PartialEq
    + Send
    + Sync
    + 'static
{
    /// Resource type name, without the `junos_` prefix
    const TYPE_NAME: &'static str;
    /// Shape of the import id, shown when an id can't be parsed
    const ID_FORMAT: &'static str;
    /// Only available on SRX platforms
    const SECURITY_ONLY: bool = false;

    fn id_mut(&mut self) -> &mut ValueStr;

    /// Id derived from the key attributes
    fn compute_id(&self) -> String;

    /// State holding only the key attributes (and the id) parsed from `id`
    fn from_id(id: &str) -> Option<Self>;

    /// Key attributes whose change replaces the object
    fn replace_triggers(&self, prior: &Self) -> Vec<AttributePath>;

    fn requirements(&self) -> Vec<Requirement> {
        Vec::new()
    }

    /// Hierarchy of the object, without `set`/`delete`/`show configuration`
    fn config_path(&self) -> String;

    fn set_lines(&self) -> Result<Vec<String>>;

    fn delete_lines(&self) -> Vec<String> {
        vec![format!("delete {}", self.config_path())]
    }

    /// Lines run before `set_lines` when updating in place
    fn update_delete_lines(&self) -> Vec<String> {
        self.delete_lines()
    }

    /// Fill the state from one line of `display set relative`, without its `set `
    fn parse_line(&mut self, line: &str) -> Result<()>;

    /// Copy from the prior state the attributes the device doesn't store
    fn keep_from_prior(&mut self, _prior: &Self) {}
}

/// Name of a routing instance in a composite id, `default` for the main instance
pub(crate) fn routing_instance_prefix(routing_instance: &str) -> String {
    if routing_instance.is_empty() || routing_instance == DEFAULT_WORD {
        String::new()
    } else {
        format!("{ROUTING_INSTANCES_WS}{routing_instance} ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::junos::fake_session;

    #[test]
    fn prefix_of_routing_instance() {
        assert_eq!(routing_instance_prefix("default"), "");
        assert_eq!(routing_instance_prefix(""), "");
        assert_eq!(routing_instance_prefix("vrf1"), "routing-instances vrf1 ");
    }

    #[tokio::test]
    async fn requirements_checked_on_device() {
        let (mut session, received) = fake_session("srx300", |rpc| {
            if rpc.contains("routing-instances vrf1") || rpc.contains("security-zone trust") {
                "<rpc-reply><configuration-output>\nset routing-instances vrf1 instance-type vrf\n</configuration-output></rpc-reply>"
                    .to_owned()
            } else {
                "<rpc-reply><configuration-output>\n</configuration-output></rpc-reply>".to_owned()
            }
        })
        .await;

        Requirement::RoutingInstance("default".to_owned())
            .check(&mut session)
            .await
            .unwrap();
        Requirement::RoutingInstance("vrf1".to_owned())
            .check(&mut session)
            .await
            .unwrap();
        Requirement::SecurityZone("trust".to_owned())
            .check(&mut session)
            .await
            .unwrap();
        let err = Requirement::SecurityZone("dmz".to_owned())
            .check(&mut session)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "security zone dmz doesn't exist");
        // `default` never reaches the device
        assert_eq!(received.lock().unwrap().len(), 3);
    }
}
