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

use std::{borrow::Cow, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use russh::{
    cipher,
    client::{self, Handle, Handler, Msg},
    ChannelStream, Disconnect, Preferred,
};
use russh_keys::key::{KeyPair, PublicKey};
use tracing::{debug, info, warn};

use super::ClientOptions;

/// Accepts any host key, logging its fingerprint
#[derive(Debug, Clone)]
pub(super) struct AcceptHandler {
    host: String,
}

#[async_trait]
impl Handler for AcceptHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        info!(
            host = %self.host,
            fingerprint = %server_public_key.fingerprint(),
            "accepting host key"
        );
        Ok(true)
    }
}

pub(super) type SshHandle = Handle<AcceptHandler>;

/// Map cipher names to their russh counterpart
pub(super) fn cipher_name(name: &str) -> Option<cipher::Name> {
    match name {
        "aes128-ctr" => Some(cipher::AES_128_CTR),
        "aes192-ctr" => Some(cipher::AES_192_CTR),
        "aes256-ctr" => Some(cipher::AES_256_CTR),
        "aes256-gcm@openssh.com" => Some(cipher::AES_256_GCM),
        "chacha20-poly1305@openssh.com" => Some(cipher::CHACHA20_POLY1305),
        _ => None,
    }
}

fn ssh_config(options: &ClientOptions) -> client::Config {
    let mut config = client::Config::default();
    let ciphers = options
        .ssh_ciphers
        .iter()
        .filter_map(|name| cipher_name(name))
        .collect::<Vec<_>>();
    if !ciphers.is_empty() {
        config.preferred = Preferred {
            cipher: Cow::Owned(ciphers),
            ..Default::default()
        };
    }
    config
}

/// Open an SSH connection and start the netconf subsystem, retrying as configured
pub(super) async fn open_netconf(
    options: &ClientOptions,
) -> Result<(SshHandle, ChannelStream<Msg>)> {
    let config = Arc::new(ssh_config(options));
    let mut attempt = 1;
    loop {
        let connection = connect(options, config.clone());
        let result = match options.ssh_timeout {
            Some(timeout) => tokio::time::timeout(timeout, connection)
                .await
                .unwrap_or_else(|_| {
                    Err(anyhow!(
                        "timeout of {}s reached while connecting",
                        timeout.as_secs()
                    ))
                }),
            None => connection.await,
        };
        match result {
            Ok(handle) => return open_subsystem(handle).await,
            Err(err) if attempt < options.ssh_retry => {
                warn!(
                    host = %options.host,
                    attempt,
                    "failed to establish ssh connection: {err:#}"
                );
                tokio::time::sleep(Duration::from_secs(attempt.into())).await;
                attempt += 1;
            }
            Err(err) => {
                return Err(err.context(format!(
                    "failed to connect to {}:{} after {attempt} attempt(s)",
                    options.host, options.port
                )))
            }
        }
    }
}

async fn connect(options: &ClientOptions, config: Arc<client::Config>) -> Result<SshHandle> {
    let handler = AcceptHandler {
        host: options.host.clone(),
    };
    debug!(host = %options.host, port = options.port, "connecting");
    let mut handle = client::connect(config, (options.host.as_str(), options.port), handler)
        .await
        .with_context(|| format!("ssh handshake with {}:{}", options.host, options.port))?;

    if authenticate(&mut handle, options).await? {
        Ok(handle)
    } else {
        Err(anyhow!(
            "ssh authentication failed for user {}",
            options.username
        ))
    }
}

async fn authenticate(handle: &mut SshHandle, options: &ClientOptions) -> Result<bool> {
    let user = options.username.as_str();
    let keypass = options.keypass.as_deref();

    if let Some(pem) = &options.sshkey_pem {
        let key = russh_keys::decode_secret_key(pem, keypass).context("decoding sshkey_pem")?;
        if try_key(handle, user, key).await? {
            return Ok(true);
        }
    }
    if let Some(path) = &options.sshkey_file {
        let key = russh_keys::load_secret_key(path, keypass)
            .with_context(|| format!("loading ssh key {}", path.display()))?;
        if try_key(handle, user, key).await? {
            return Ok(true);
        }
    }
    if let Some(password) = &options.password {
        if handle.authenticate_password(user, password).await? {
            debug!(user, "authenticated with password");
            return Ok(true);
        }
    }
    Ok(false)
}

async fn try_key(handle: &mut SshHandle, user: &str, key: KeyPair) -> Result<bool> {
    let accepted = handle.authenticate_publickey(user, Arc::new(key)).await?;
    if accepted {
        debug!(user, "authenticated with public key");
    }
    Ok(accepted)
}

async fn open_subsystem(handle: SshHandle) -> Result<(SshHandle, ChannelStream<Msg>)> {
    let channel = handle
        .channel_open_session()
        .await
        .context("opening ssh session channel")?;
    channel
        .request_subsystem(true, "netconf")
        .await
        .context("requesting netconf subsystem")?;
    Ok((handle, channel.into_stream()))
}

pub(super) async fn disconnect(handle: &SshHandle) {
    if let Err(err) = handle
        .disconnect(Disconnect::ByApplication, "netconf session closed", "en")
        .await
    {
        debug!("ssh disconnect: {err}");
    }
}
