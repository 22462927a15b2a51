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

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::{
    map,
    schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema},
    value::{ValueList, ValueNumber},
    AttributePath, Diagnostics, Provider, Value, ValueEmpty,
};
use tracing::info;

use crate::data_source::InterfacesPhysicalPresentDataSource;
use crate::junos::{Client, ClientOptions, SUPPORTED_CIPHERS};
use crate::resource::{
    BgpNeighbor, EventoptionsPolicy, FirewallPolicer, GenerateRoute, JunosResourceAdapter,
    PolicyoptionsCommunity, RstpInterface, SecurityAddressBook, SecurityIpsecVpn,
    SecurityZoneBookAddress, StaticRoute,
};
use crate::utils::{strings, ValueBool, ValueStr};
use crate::validate;

/// Client filled by `configure`, handed to resources before it exists
#[derive(Debug, Clone, Default)]
pub struct SharedClient(Arc<OnceLock<Arc<Client>>>);

impl SharedClient {
    pub fn get(&self, diags: &mut Diagnostics) -> Option<Arc<Client>> {
        match self.0.get() {
            Some(client) => Some(client.clone()),
            None => {
                diags.root_error(
                    "Provider not configured",
                    "the junos provider must be configured before its resources are used",
                );
                None
            }
        }
    }

    /// `false` when a client was already set
    pub fn set(&self, client: Client) -> bool {
        self.0.set(Arc::new(client)).is_ok()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub ip: ValueStr,
    pub port: ValueNumber,
    pub username: ValueStr,
    pub password: ValueStr,
    pub sshkey_pem: ValueStr,
    pub sshkey_file: ValueStr,
    pub keypass: ValueStr,
    pub cmd_sleep_short: ValueNumber,
    pub cmd_sleep_lock: ValueNumber,
    pub ssh_sleep_closed: ValueNumber,
    pub ssh_ciphers: ValueList<ValueStr>,
    pub ssh_timeout_to_establish: ValueNumber,
    pub ssh_retry_to_establish: ValueNumber,
    pub file_permission: ValueStr,
    pub debug_netconf_log_path: ValueStr,
    pub fake_create_with_setfile: ValueStr,
    pub fake_update_also: ValueBool,
    pub fake_delete_also: ValueBool,
}

impl ProviderConfig {
    /// Value of the attribute `name` rendered as a string, `None` when unset
    fn lookup(&self, name: &str) -> Option<String> {
        fn string(value: &ValueStr) -> Option<String> {
            match value {
                Value::Value(value) => Some(value.to_string()),
                _ => None,
            }
        }
        fn number(value: &ValueNumber) -> Option<String> {
            match value {
                Value::Value(value) => Some(value.to_string()),
                _ => None,
            }
        }
        fn boolean(value: &ValueBool) -> Option<String> {
            match value {
                Value::Value(value) => Some(value.to_string()),
                _ => None,
            }
        }
        match name {
            "ip" => string(&self.ip),
            "port" => number(&self.port),
            "username" => string(&self.username),
            "password" => string(&self.password),
            "sshkey_pem" => string(&self.sshkey_pem),
            "sshkey_file" => string(&self.sshkey_file),
            "keypass" => string(&self.keypass),
            "cmd_sleep_short" => number(&self.cmd_sleep_short),
            "cmd_sleep_lock" => number(&self.cmd_sleep_lock),
            "ssh_sleep_closed" => number(&self.ssh_sleep_closed),
            "ssh_ciphers" => match &self.ssh_ciphers {
                Value::Value(_) => Some(strings(&self.ssh_ciphers).collect::<Vec<_>>().join(",")),
                _ => None,
            },
            "ssh_timeout_to_establish" => number(&self.ssh_timeout_to_establish),
            "ssh_retry_to_establish" => number(&self.ssh_retry_to_establish),
            "file_permission" => string(&self.file_permission),
            "debug_netconf_log_path" => string(&self.debug_netconf_log_path),
            "fake_create_with_setfile" => string(&self.fake_create_with_setfile),
            "fake_update_also" => boolean(&self.fake_update_also),
            "fake_delete_also" => boolean(&self.fake_delete_also),
            _ => None,
        }
    }

    /// Merge with the environment looked up through `env`
    fn options(
        &self,
        diags: &mut Diagnostics,
        env: impl Fn(&str) -> Option<String>,
    ) -> Option<ClientOptions> {
        match ClientOptions::resolve(|name| self.lookup(name), env) {
            Ok(options) => Some(options),
            Err(err) => {
                match err.attribute {
                    Some(attribute) => diags.error(
                        "Invalid provider configuration",
                        err.message,
                        AttributePath::new(attribute),
                    ),
                    None => diags.root_error("Invalid provider configuration", err.message),
                }
                None
            }
        }
    }
}

fn provider_attribute(
    attr_type: AttributeType,
    description: &'static str,
    sensitive: bool,
) -> Attribute {
    Attribute {
        attr_type,
        description: Description::plain(description),
        constraint: AttributeConstraint::Optional,
        sensitive,
        deprecated: false,
    }
}

#[derive(Debug, Default, Clone)]
pub struct JunosProvider {
    client: SharedClient,
}

#[async_trait]
impl Provider for JunosProvider {
    type Config<'a> = Value<ProviderConfig>;
    type MetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        let string = |description| provider_attribute(AttributeType::String, description, false);
        let secret = |description| provider_attribute(AttributeType::String, description, true);
        let number = |description| provider_attribute(AttributeType::Number, description, false);
        let boolean = |description| provider_attribute(AttributeType::Bool, description, false);
        Some(Schema {
            version: 1,
            block: Block {
                description: Description::plain("Junos devices configured through NETCONF over SSH"),
                attributes: map! {
                    "ip" => string("This is the target for Netconf session (ip or dns name)"),
                    "port" => number("This is the tcp port for ssh connection"),
                    "username" => string("This is the username for ssh connection"),
                    "password" => secret("This is a password for ssh connection"),
                    "sshkey_pem" => secret("This is the ssh key in PEM format for establish ssh connection"),
                    "sshkey_file" => string("This is the path to ssh key for establish ssh connection"),
                    "keypass" => secret("This is the passphrase for open `sshkey_file` or `sshkey_pem`"),
                    "cmd_sleep_short" => number("Milliseconds to wait after Terraform provider executed an action on the Junos device"),
                    "cmd_sleep_lock" => number("Seconds of wait to lock configuration if first try failed"),
                    "ssh_sleep_closed" => number("Seconds to wait after Terraform provider closed a ssh connection"),
                    "ssh_ciphers" => provider_attribute(
                        AttributeType::List(Box::new(AttributeType::String)),
                        "Ciphers used in SSH connection",
                        false,
                    ),
                    "ssh_timeout_to_establish" => number("Seconds to wait for establishing TCP connections when initiating SSH connections"),
                    "ssh_retry_to_establish" => number("Number of retries to establish SSH connections"),
                    "file_permission" => string("The permission to set for the created file (debug, setfile)"),
                    "debug_netconf_log_path" => string("More detailed log (netconf) in the specified file"),
                    "fake_create_with_setfile" => string("The normal process to create resources skipped to generate set lines, append them to the specified file"),
                    "fake_update_also" => boolean("The normal process to update resources skipped to generate set/delete lines, append them to the same file as `fake_create_with_setfile`"),
                    "fake_delete_also" => boolean("The normal process to delete resources skipped to generate delete lines, append them to the same file as `fake_create_with_setfile`"),
                },
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::Config<'a>) -> Option<()> {
        if let Value::Value(config) = &config {
            validate::int_between(
                diags,
                AttributePath::new("ssh_retry_to_establish"),
                &config.ssh_retry_to_establish,
                1,
                30,
            );
            validate::int_between(diags, AttributePath::new("port"), &config.port, 1, 65535);
            if let Value::Value(ciphers) = &config.ssh_ciphers {
                for (index, cipher) in ciphers.iter().enumerate() {
                    validate::one_of(
                        diags,
                        AttributePath::new("ssh_ciphers").index(index as i64),
                        cipher,
                        SUPPORTED_CIPHERS,
                    );
                }
            }
            validate::matches(
                diags,
                AttributePath::new("file_permission"),
                &config.file_permission,
                |mode| u32::from_str_radix(mode, 8).is_ok_and(|mode| mode <= 0o7777),
                "an octal file mode",
            );
        }

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn configure<'a>(
        &self,
        diags: &mut Diagnostics,
        terraform_version: String,
        config: Self::Config<'a>,
    ) -> Option<()> {
        let config = match config {
            Value::Value(config) => config,
            _ => ProviderConfig::default(),
        };
        let options = config.options(diags, |var| std::env::var(var).ok())?;
        info!(
            %terraform_version,
            host = %options.host,
            port = options.port,
            "configuring junos provider"
        );

        if !self.client.set(Client::new(options)) {
            diags.root_warning(
                "Provider already configured",
                "the first configuration of the junos provider is kept",
            );
        }
        Some(())
    }

    fn get_resources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<std::collections::HashMap<String, Box<dyn tf_provider::resource::DynamicResource>>>
    {
        let client = &self.client;
        Some(map! {
            "bgp_neighbor" => JunosResourceAdapter::<BgpNeighbor>::new(client.clone()),
            "eventoptions_policy" => JunosResourceAdapter::<EventoptionsPolicy>::new(client.clone()),
            "firewall_policer" => JunosResourceAdapter::<FirewallPolicer>::new(client.clone()),
            "generate_route" => JunosResourceAdapter::<GenerateRoute>::new(client.clone()),
            "policyoptions_community" => JunosResourceAdapter::<PolicyoptionsCommunity>::new(client.clone()),
            "rstp_interface" => JunosResourceAdapter::<RstpInterface>::new(client.clone()),
            "security_address_book" => JunosResourceAdapter::<SecurityAddressBook>::new(client.clone()),
            "security_ipsec_vpn" => JunosResourceAdapter::<SecurityIpsecVpn>::new(client.clone()),
            "security_zone_book_address" => JunosResourceAdapter::<SecurityZoneBookAddress>::new(client.clone()),
            "static_route" => JunosResourceAdapter::<StaticRoute>::new(client.clone()),
        })
    }

    fn get_data_sources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<
        std::collections::HashMap<String, Box<dyn tf_provider::data_source::DynamicDataSource>>,
    > {
        Some(map! {
            "interfaces_physical_present" => InterfacesPhysicalPresentDataSource::new(self.client.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::utils::value_str;

    fn env(vars: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<&str, &str> = vars.iter().copied().collect();
        move |var| vars.get(var).map(|value| value.to_string())
    }

    #[test]
    fn config_merged_with_env() {
        let config = ProviderConfig {
            ip: value_str("192.0.2.1"),
            port: Value::Value(2222),
            ssh_ciphers: Value::Value(vec![value_str("aes256-ctr"), value_str("aes128-ctr")]),
            fake_create_with_setfile: value_str("/tmp/set.txt"),
            fake_update_also: Value::Value(true),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        let options = config
            .options(&mut diags, env(&[("JUNOS_HOST", "192.0.2.9"), ("JUNOS_PASSWORD", "pass")]))
            .unwrap();
        assert!(diags.errors.is_empty());
        assert_eq!(options.host, "192.0.2.1");
        assert_eq!(options.port, 2222);
        assert_eq!(options.password.as_deref(), Some("pass"));
        assert_eq!(options.ssh_ciphers, vec!["aes256-ctr", "aes128-ctr"]);
        assert!(options.fake_update_also);
    }

    #[test]
    fn invalid_config_reported_on_attribute() {
        let config = ProviderConfig {
            password: value_str("pass"),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        assert!(config.options(&mut diags, env(&[])).is_none());
        assert_eq!(diags.errors.len(), 1);

        let config = ProviderConfig {
            ip: value_str("192.0.2.1"),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        assert!(config.options(&mut diags, env(&[])).is_none());
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn validate_provider_block() {
        let provider = JunosProvider::default();
        let config = ProviderConfig {
            ssh_retry_to_establish: Value::Value(31),
            ssh_ciphers: Value::Value(vec![value_str("3des-cbc")]),
            file_permission: value_str("0689"),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        assert!(provider.validate(&mut diags, Value::Value(config)).await.is_none());
        assert_eq!(diags.errors.len(), 3);
    }

    #[tokio::test]
    async fn client_shared_after_configure() {
        let provider = JunosProvider::default();
        let mut diags = Diagnostics::default();
        assert!(provider.client.get(&mut diags).is_none());
        assert_eq!(diags.errors.len(), 1);

        let config = ProviderConfig {
            ip: value_str("192.0.2.1"),
            password: value_str("pass"),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        provider
            .configure(&mut diags, "1.6.0".to_owned(), Value::Value(config))
            .await
            .unwrap();
        let resources = provider.get_resources(&mut diags).unwrap();
        assert_eq!(resources.len(), 10);
        let client = provider.client.get(&mut diags).unwrap();
        assert_eq!(client.options().host, "192.0.2.1");
        assert!(diags.errors.is_empty());
    }
}
