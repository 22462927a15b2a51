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

use std::marker::PhantomData;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tf_provider::{
    schema::Schema, AttributePath, Diagnostics, Resource, Value, ValueEmpty,
};
use tracing::{debug, info};

use crate::junos::{config_lines, mutex_lock, Client, Session};
use crate::junos_provider::SharedClient;
use crate::utils::{value_str, WithNormalize, WithSchema, WithValidate};

use super::JunosResource;

/// Terraform lifecycle shared by every Junos resource
#[derive(Debug)]
pub struct JunosResourceAdapter<R> {
    client: SharedClient,
    _resource: PhantomData<fn() -> R>,
}

impl<R: JunosResource> JunosResourceAdapter<R> {
    pub fn new(client: SharedClient) -> Self {
        Self {
            client,
            _resource: PhantomData,
        }
    }

    fn type_name() -> String {
        format!("junos_{}", R::TYPE_NAME)
    }

    async fn start_session(&self, diags: &mut Diagnostics, client: &Client) -> Option<Session> {
        match client.start_new_session().await {
            Ok(session) => Some(session),
            Err(err) => {
                diags.root_error("Failed to start netconf session", format!("{err:#}"));
                None
            }
        }
    }

    /// Write `lines` to the fake set file
    async fn write_fake(&self, diags: &mut Diagnostics, client: &Client, lines: &[String]) -> Option<()> {
        let mut session = client.new_session_without_netconf();
        match session.config_set(lines).await {
            Ok(()) => Some(()),
            Err(err) => {
                diags.root_error("Failed to write set file", format!("{err:#}"));
                None
            }
        }
    }

    /// Lock, run the pre-checks of `create_checks` if any, load the lines then commit.
    /// The candidate configuration is cleared on failure.
    async fn commit_lines(
        &self,
        diags: &mut Diagnostics,
        session: &mut Session,
        create_checks: Option<&R>,
        lines: Vec<String>,
        action: &str,
    ) -> Option<()> {
        if let Err(err) = session.config_lock().await {
            diags.root_error("Failed to lock candidate configuration", format!("{err:#}"));
            return None;
        }

        let loaded: Result<()> = async {
            if let Some(plan) = create_checks {
                pre_create_checks(session, plan).await?;
            }
            session.config_set(&lines).await
        }
        .await;
        if let Err(err) = loaded {
            clear(diags, session).await;
            diags.root_error(
                format!("Failed to {action} {}", Self::type_name()),
                format!("{err:#}"),
            );
            return None;
        }

        let (warnings, committed) = session
            .commit_conf(&format!("{action} resource {}", Self::type_name()))
            .await;
        for warning in warnings {
            diags.root_warning("Warning from commit", warning);
        }
        if let Err(err) = committed {
            clear(diags, session).await;
            diags.root_error(
                format!("Failed to commit {action} of {}", Self::type_name()),
                format!("{err:#}"),
            );
            return None;
        }
        info!(resource = %Self::type_name(), action, "configuration committed");
        Some(())
    }

    async fn create_on_device(
        &self,
        diags: &mut Diagnostics,
        session: &mut Session,
        plan: &R,
    ) -> Option<()> {
        let lines = match plan.set_lines() {
            Ok(lines) => lines,
            Err(err) => {
                diags.root_error("Invalid configuration", format!("{err:#}"));
                return None;
            }
        };
        self.commit_lines(diags, session, Some(plan), lines, "create")
            .await?;

        match session.show_config(&plan.config_path()).await {
            Ok(Some(_)) => Some(()),
            Ok(None) => {
                diags.root_error_short(format!(
                    "{} not exists after commit => check your config",
                    plan.config_path()
                ));
                None
            }
            Err(err) => {
                diags.root_error("Failed to read configuration", format!("{err:#}"));
                None
            }
        }
    }
}

async fn pre_create_checks<R: JunosResource>(session: &mut Session, plan: &R) -> Result<()> {
    if R::SECURITY_ONLY && !session.check_compatibility_security() {
        bail!(
            "junos_{} not compatible with Junos device {:?}",
            R::TYPE_NAME,
            session.system_information.hardware_model
        );
    }
    for requirement in plan.requirements() {
        requirement.check(session).await?;
    }
    if session.show_config(&plan.config_path()).await?.is_some() {
        bail!("{} already exists", plan.config_path());
    }
    Ok(())
}

async fn clear(diags: &mut Diagnostics, session: &mut Session) {
    for warning in session.config_clear().await {
        diags.root_warning("Failed to clear candidate configuration", warning);
    }
}

/// Read the object designated by the keys of `keys`, `None` when it isn't configured
pub(crate) async fn read_resource<R: JunosResource>(
    session: &mut Session,
    keys: &R,
) -> Result<Option<R>> {
    let id = keys.compute_id();
    let Some(output) = session.show_config_relative(&keys.config_path()).await? else {
        return Ok(None);
    };
    let mut state = R::from_id(&id).ok_or_else(|| anyhow!("unable to parse id {id:?}"))?;
    for line in config_lines(&output) {
        state
            .parse_line(line)
            .with_context(|| format!("parsing configuration line {line:?}"))?;
    }
    Ok(Some(state))
}

#[async_trait]
impl<R: JunosResource> Resource for JunosResourceAdapter<R> {
    type State<'a> = Value<R>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(R::schema())
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
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let Value::Value(prior) = state else {
            return Some((state, private_state));
        };
        let client = self.client.get(diags)?;

        let guard = mutex_lock().await;
        let mut session = self.start_session(diags, &client).await?;
        let result = read_resource(&mut session, &prior).await;
        session.close().await;
        drop(guard);

        match result {
            Ok(Some(mut state)) => {
                state.keep_from_prior(&prior);
                state.normalize(diags);
                Some((Value::Value(state), private_state))
            }
            Ok(None) => {
                debug!(resource = %Self::type_name(), id = %prior.compute_id(), "not found, removing from state");
                Some((Value::Null, private_state))
            }
            Err(err) => {
                diags.root_error(
                    format!("Failed to read {}", Self::type_name()),
                    format!("{err:#}"),
                );
                None
            }
        }
    }

    async fn plan_create<'a>(
        &self,
        diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        if let Value::Value(state) = &mut state {
            state.normalize(diags);
            *state.id_mut() = Value::Unknown;
        }

        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(
        Self::State<'a>,
        Self::PrivateState<'a>,
        Vec<tf_provider::AttributePath>,
    )> {
        let mut state = proposed_state;
        let mut trigger_replace = Vec::new();
        if let (Value::Value(state), Value::Value(prior)) = (&mut state, &prior_state) {
            state.normalize(diags);
            trigger_replace = state.replace_triggers(prior);
            *state.id_mut() = if trigger_replace.is_empty() {
                value_str(prior.compute_id())
            } else {
                Value::Unknown
            };
        }

        Some((state, prior_private_state, trigger_replace))
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        _prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        Some(())
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let Value::Value(mut state) = planned_state else {
            diags.root_error_short("Planned state of a new resource must be known");
            return None;
        };
        state.normalize(diags);
        let client = self.client.get(diags)?;

        if client.fake_create_set_file() {
            let lines = match state.set_lines() {
                Ok(lines) => lines,
                Err(err) => {
                    diags.root_error("Invalid configuration", format!("{err:#}"));
                    return None;
                }
            };
            self.write_fake(diags, &client, &lines).await?;
        } else {
            let mut session = self.start_session(diags, &client).await?;
            let created = self.create_on_device(diags, &mut session, &state).await;
            session.close().await;
            created?;
        }

        *state.id_mut() = value_str(state.compute_id());
        Some((Value::Value(state), private_state))
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let Value::Value(mut state) = planned_state else {
            diags.root_error_short("Planned state of an updated resource must be known");
            return None;
        };
        state.normalize(diags);
        let client = self.client.get(diags)?;

        let mut lines = state.update_delete_lines();
        match state.set_lines() {
            Ok(set_lines) => lines.extend(set_lines),
            Err(err) => {
                diags.root_error("Invalid configuration", format!("{err:#}"));
                return None;
            }
        }

        if client.fake_update_also() {
            self.write_fake(diags, &client, &lines).await?;
        } else {
            let mut session = self.start_session(diags, &client).await?;
            let updated = self
                .commit_lines(diags, &mut session, None, lines, "update")
                .await;
            session.close().await;
            updated?;
        }

        *state.id_mut() = value_str(state.compute_id());
        Some((Value::Value(state), private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let Value::Value(state) = state else {
            return Some(());
        };
        let client = self.client.get(diags)?;
        let lines = state.delete_lines();

        if client.fake_delete_also() {
            return self.write_fake(diags, &client, &lines).await;
        }
        let mut session = self.start_session(diags, &client).await?;
        let deleted = self
            .commit_lines(diags, &mut session, None, lines, "delete")
            .await;
        session.close().await;
        deleted
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let Some(keys) = R::from_id(&id) else {
            diags.root_error(
                format!("Malformed id {id:?}"),
                format!("id must be {}", R::ID_FORMAT),
            );
            return None;
        };
        let client = self.client.get(diags)?;

        let mut session = self.start_session(diags, &client).await?;
        let result = if R::SECURITY_ONLY && !session.check_compatibility_security() {
            Err(anyhow!(
                "{} not compatible with Junos device {:?}",
                Self::type_name(),
                session.system_information.hardware_model
            ))
        } else {
            read_resource(&mut session, &keys).await
        };
        session.close().await;

        match result {
            Ok(Some(mut state)) => {
                state.normalize(diags);
                Some((Value::Value(state), Default::default()))
            }
            Ok(None) => {
                diags.root_error_short(format!(
                    "don't find {} with id {id:?} (id must be {})",
                    Self::type_name(),
                    R::ID_FORMAT
                ));
                None
            }
            Err(err) => {
                diags.root_error(
                    format!("Failed to import {}", Self::type_name()),
                    format!("{err:#}"),
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::junos::fake_session;
    use crate::resource::PolicyoptionsCommunity;
    use crate::utils::strings;

    #[tokio::test]
    async fn read_missing_is_none() {
        let (mut session, _) = fake_session("mx240", |_| {
            "<rpc-reply><configuration-output>\n</configuration-output></rpc-reply>".to_owned()
        })
        .await;
        let keys = PolicyoptionsCommunity::from_id("c1").unwrap();
        assert!(read_resource(&mut session, &keys).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn read_rebuilds_state_from_lines() {
        let (mut session, received) = fake_session("mx240", |_| {
            "<rpc-reply><configuration-output>\nset members 65000:100\nset members \"^65000:.*$\"\nset invert-match\n</configuration-output></rpc-reply>"
                .to_owned()
        })
        .await;
        let keys = PolicyoptionsCommunity::from_id("c1").unwrap();
        let state = read_resource(&mut session, &keys).await.unwrap().unwrap();
        assert_eq!(state.id, value_str("c1"));
        assert_eq!(
            strings(&state.members).collect::<Vec<_>>(),
            vec!["65000:100", "^65000:.*$"]
        );
        assert_eq!(state.invert_match, Value::Value(true));
        assert!(received.lock().unwrap()[0]
            .contains("show configuration policy-options community c1 | display set relative"));
    }

    #[tokio::test]
    async fn pre_checks_refuse_existing_object() {
        let (mut session, _) = fake_session("mx240", |_| {
            "<rpc-reply><configuration-output>\nset policy-options community c1 members 65000:1\n</configuration-output></rpc-reply>"
                .to_owned()
        })
        .await;
        let plan = PolicyoptionsCommunity::from_id("c1").unwrap();
        let err = pre_create_checks(&mut session, &plan).await.unwrap_err();
        assert_eq!(err.to_string(), "policy-options community c1 already exists");
    }
}
