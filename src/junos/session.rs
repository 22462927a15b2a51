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

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::{
    fs::OpenOptions,
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
};
use tracing::{debug, info, warn};

use super::{
    client::DebugLog,
    netconf::{escape, NetconfStream, RpcReply},
    ssh::{self, SshHandle},
    NetconfError, CMD_SHOW_CONFIG, PIPE_DISPLAY_SET, PIPE_DISPLAY_SET_RELATIVE,
};

/// Byte stream carrying the netconf conversation
pub(super) trait Transport: AsyncRead + AsyncWrite + Unpin + Send + Sync {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + Sync> Transport for T {}

const RPC_COMMAND_START: &str = "<command format=\"text\">";
const RPC_COMMAND_END: &str = "</command>";
const RPC_SYSTEM_INFORMATION: &str = "<get-system-information/>";
const RPC_LOCK: &str = "<lock><target><candidate/></target></lock>";
const RPC_UNLOCK: &str = "<unlock><target><candidate/></target></unlock>";
const RPC_DISCARD_CHANGES: &str = "<discard-changes/>";
const RPC_CLOSE_SESSION: &str = "<close-session/>";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct SystemInformation {
    pub hardware_model: String,
    pub os_name: String,
    pub os_version: String,
    pub serial_number: String,
    pub host_name: String,
}

impl SystemInformation {
    /// SRX and vSRX platforms carry the `security` hierarchy
    pub fn is_security(&self) -> bool {
        let model = self.hardware_model.to_ascii_lowercase();
        model.starts_with("srx") || model.starts_with("vsrx")
    }
}

#[derive(Deserialize)]
struct SystemInformationReply {
    #[serde(rename = "system-information", default)]
    system_information: SystemInformation,
}

pub(super) struct SessionSettings {
    pub(super) sleep_short: Duration,
    pub(super) sleep_lock: Duration,
    pub(super) sleep_ssh_closed: Duration,
    pub(super) fake_set_file: Option<PathBuf>,
    pub(super) file_permission: u32,
    pub(super) log: Arc<DebugLog>,
}

/// One netconf session on the device
pub struct Session {
    netconf: Option<NetconfStream<Box<dyn Transport>>>,
    ssh: Option<SshHandle>,
    settings: SessionSettings,
    pub system_information: SystemInformation,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("netconf", &self.netconf.is_some())
            .field("system_information", &self.system_information)
            .finish()
    }
}

impl Session {
    pub(super) async fn start(
        transport: Box<dyn Transport>,
        ssh: Option<SshHandle>,
        settings: SessionSettings,
    ) -> Result<Self> {
        let netconf = match NetconfStream::open(transport).await {
            Ok(netconf) => netconf,
            Err(err) => {
                if let Some(handle) = &ssh {
                    ssh::disconnect(handle).await;
                }
                return Err(err.context("netconf hello exchange"));
            }
        };
        let mut session = Self {
            netconf: Some(netconf),
            ssh,
            settings,
            system_information: SystemInformation::default(),
        };

        let information: Result<SystemInformation> = async {
            let reply = session.command_xml(RPC_SYSTEM_INFORMATION).await?;
            let information = reply.deserialize::<SystemInformationReply>()?;
            if information.system_information.hardware_model.is_empty() {
                return Err(NetconfError::MissingHardwareModel.into());
            }
            Ok(information.system_information)
        }
        .await;
        match information {
            Ok(information) => session.system_information = information,
            Err(err) => {
                session.close().await;
                return Err(err);
            }
        }
        info!(
            model = %session.system_information.hardware_model,
            version = %session.system_information.os_version,
            "netconf session started"
        );
        Ok(session)
    }

    pub(super) fn without_netconf(settings: SessionSettings) -> Self {
        Self {
            netconf: None,
            ssh: None,
            settings,
            system_information: SystemInformation::default(),
        }
    }

    async fn log_file(&self, message: &str) {
        self.settings.log.write(message).await
    }

    async fn exec(&mut self, rpc: &str) -> Result<RpcReply> {
        let netconf = self.netconf.as_mut().ok_or(NetconfError::WithoutNetconf)?;
        netconf.exec(rpc).await
    }

    /// Run a CLI command and return its text output, trimmed
    pub async fn command(&mut self, cmd: &str) -> Result<String> {
        let reply = self
            .exec(&format!("{RPC_COMMAND_START}{}{RPC_COMMAND_END}", escape(cmd)))
            .await?;
        self.log_file(&format!("[command] cmd: {cmd}")).await;
        self.log_file(&format!("[command] reply: {:?}", reply.output))
            .await;
        if let Err(err) = reply.check() {
            self.log_file(&format!("[command] error: {err}")).await;
            return Err(err.into());
        }
        tokio::time::sleep(self.settings.sleep_short).await;
        Ok(reply.output)
    }

    /// `show configuration <path> | display set`, `None` when nothing is configured
    pub async fn show_config(&mut self, path: &str) -> Result<Option<String>> {
        let output = self
            .command(&format!("{CMD_SHOW_CONFIG}{path}{PIPE_DISPLAY_SET}"))
            .await?;
        Ok((!output.is_empty()).then_some(output))
    }

    /// `show configuration <path> | display set relative`, `None` when nothing is configured
    pub async fn show_config_relative(&mut self, path: &str) -> Result<Option<String>> {
        let output = self
            .command(&format!("{CMD_SHOW_CONFIG}{path}{PIPE_DISPLAY_SET_RELATIVE}"))
            .await?;
        Ok((!output.is_empty()).then_some(output))
    }

    /// Send a raw rpc, the reply is meant to be deserialized
    pub async fn command_xml(&mut self, rpc: &str) -> Result<RpcReply> {
        let reply = self.exec(rpc).await?;
        self.log_file(&format!("[command_xml] rpc: {rpc}")).await;
        if let Err(err) = reply.check() {
            self.log_file(&format!("[command_xml] error: {err}")).await;
            return Err(err.into());
        }
        Ok(reply)
    }

    /// Load set/delete lines in the candidate configuration,
    /// or append them to the fake set file
    pub async fn config_set(&mut self, lines: &[String]) -> Result<()> {
        if let Some(path) = &self.settings.fake_set_file {
            let mut content = String::new();
            for line in lines {
                content.push_str(line);
                content.push('\n');
            }
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .mode(self.settings.file_permission)
                .open(path)
                .await
                .with_context(|| format!("opening fake set file {}", path.display()))?;
            file.write_all(content.as_bytes())
                .await
                .with_context(|| format!("writing fake set file {}", path.display()))?;
            self.log_file(&format!(
                "[config_set] {} line(s) written to {}",
                lines.len(),
                path.display()
            ))
            .await;
            return Ok(());
        }

        let rpc = format!(
            "<load-configuration action=\"set\" format=\"text\"><configuration-set>{}</configuration-set></load-configuration>",
            escape(&lines.join("\n"))
        );
        let reply = self.exec(&rpc).await?;
        self.log_file(&format!("[config_set] lines: {lines:?}")).await;
        if let Err(err) = reply.check() {
            self.log_file(&format!("[config_set] error: {err}")).await;
            return Err(err.into());
        }
        tokio::time::sleep(self.settings.sleep_short).await;
        Ok(())
    }

    /// Lock the candidate configuration, waiting as long as someone else holds it
    pub async fn config_lock(&mut self) -> Result<()> {
        loop {
            let reply = self.exec(RPC_LOCK).await?;
            match reply.check() {
                Ok(()) => {
                    self.log_file("[config_lock] config locked").await;
                    tokio::time::sleep(self.settings.sleep_short).await;
                    return Ok(());
                }
                Err(err) => {
                    self.log_file(&format!("[config_lock] locked by another session: {err}"))
                        .await;
                    warn!(
                        "candidate configuration locked, retrying in {:?}",
                        self.settings.sleep_lock
                    );
                    tokio::time::sleep(self.settings.sleep_lock).await;
                }
            }
        }
    }

    async fn config_unlock(&mut self) -> Result<()> {
        let reply = self.exec(RPC_UNLOCK).await?;
        reply.check()?;
        self.log_file("[config_unlock] config unlocked").await;
        tokio::time::sleep(self.settings.sleep_short).await;
        Ok(())
    }

    /// Commit the candidate configuration then release the lock.
    ///
    /// Warnings of the commit are returned whatever the outcome.
    pub async fn commit_conf(&mut self, log: &str) -> (Vec<String>, Result<()>) {
        let rpc = format!(
            "<commit-configuration><log>{}</log></commit-configuration>",
            escape(log)
        );
        let reply = match self.exec(&rpc).await {
            Ok(reply) => reply,
            Err(err) => return (Vec::new(), Err(err)),
        };
        let warnings = reply
            .warnings()
            .map(|warning| warning.message.clone())
            .collect::<Vec<_>>();
        for warning in &warnings {
            self.log_file(&format!("[commit_conf] warning: {warning}"))
                .await;
        }
        if let Err(err) = reply.check() {
            self.log_file(&format!("[commit_conf] error: {err}")).await;
            return (warnings, Err(err.into()));
        }
        self.log_file(&format!("[commit_conf] committed with log {log:?}"))
            .await;
        (warnings, self.config_unlock().await)
    }

    /// Discard uncommitted changes and release the lock, failures are only warnings
    pub async fn config_clear(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();
        for rpc in [RPC_DISCARD_CHANGES, RPC_UNLOCK] {
            match self.exec(rpc).await {
                Ok(reply) => warnings.extend(
                    reply
                        .errors
                        .iter()
                        .map(|error| error.message.clone())
                        .filter(|message| !message.is_empty()),
                ),
                Err(err) => warnings.push(format!("{err:#}")),
            }
        }
        for warning in &warnings {
            self.log_file(&format!("[config_clear] {warning}")).await;
        }
        tokio::time::sleep(self.settings.sleep_short).await;
        warnings
    }

    /// Close the netconf session and the ssh connection
    pub async fn close(&mut self) {
        if let Some(mut netconf) = self.netconf.take() {
            if let Err(err) = netconf.exec(RPC_CLOSE_SESSION).await {
                debug!("close-session: {err:#}");
            }
            if let Err(err) = netconf.shutdown().await {
                debug!("closing netconf stream: {err:#}");
            }
            if let Some(handle) = self.ssh.take() {
                ssh::disconnect(&handle).await;
            }
            self.log_file("[close] session closed").await;
            tokio::time::sleep(self.settings.sleep_ssh_closed).await;
        }
    }

    pub fn check_compatibility_security(&self) -> bool {
        self.system_information.is_security()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex as StdMutex;

    use tokio::io::duplex;

    use super::*;
    use crate::junos::netconf::tests::{device_read, device_write, SERVER_HELLO};

    pub(crate) fn settings(log: Option<PathBuf>) -> SessionSettings {
        SessionSettings {
            sleep_short: Duration::ZERO,
            sleep_lock: Duration::from_millis(1),
            sleep_ssh_closed: Duration::ZERO,
            fake_set_file: None,
            file_permission: 0o644,
            log: Arc::new(DebugLog::new(log, 0o644)),
        }
    }

    pub(crate) fn system_information_reply(model: &str) -> String {
        format!(
            "<rpc-reply><system-information>\
             <hardware-model>{model}</hardware-model>\
             <os-name>junos</os-name><os-version>21.4R3</os-version>\
             <host-name>router1</host-name>\
             </system-information></rpc-reply>"
        )
    }

    /// Start a session against an in-process device answering every rpc with `respond`
    pub(crate) async fn fake_session<F>(model: &str, respond: F) -> (Session, Arc<StdMutex<Vec<String>>>)
    where
        F: Fn(&str) -> String + Send + 'static,
    {
        let (client, mut device) = duplex(1 << 16);
        let received = Arc::new(StdMutex::new(Vec::new()));
        let log = received.clone();
        let model = model.to_owned();
        tokio::spawn(async move {
            let mut buffer = Vec::new();
            device_write(&mut device, SERVER_HELLO).await;
            if device_read(&mut device, &mut buffer).await.is_none() {
                return;
            }
            while let Some(rpc) = device_read(&mut device, &mut buffer).await {
                let reply = if rpc.contains(RPC_SYSTEM_INFORMATION) {
                    system_information_reply(&model)
                } else if rpc.contains(RPC_CLOSE_SESSION) {
                    "<rpc-reply><ok/></rpc-reply>".to_owned()
                } else {
                    log.lock().unwrap().push(rpc.clone());
                    respond(&rpc)
                };
                device_write(&mut device, &reply).await;
            }
        });
        let transport: Box<dyn Transport> = Box::new(client);
        let session = Session::start(transport, None, settings(None)).await.unwrap();
        (session, received)
    }

    const OK: &str = "<rpc-reply><ok/></rpc-reply>";

    fn rpc_error(severity: &str, message: &str) -> String {
        format!(
            "<rpc-reply><rpc-error><error-severity>{severity}</error-severity>\
             <error-message>{message}</error-message></rpc-error></rpc-reply>"
        )
    }

    #[tokio::test]
    async fn start_reads_system_information() {
        let (mut session, _) = fake_session("vSRX", |_| OK.to_owned()).await;
        assert_eq!(session.system_information.hardware_model, "vSRX");
        assert_eq!(session.system_information.host_name, "router1");
        assert!(session.check_compatibility_security());
        session.close().await;

        let (session, _) = fake_session("mx240", |_| OK.to_owned()).await;
        assert!(!session.check_compatibility_security());
    }

    /// Start against a device answering system information with `reply`,
    /// returning the error and every rpc the device received after hello
    async fn failed_start(reply: String) -> (anyhow::Error, Vec<String>) {
        let (client, mut device) = duplex(1 << 16);
        let device = tokio::spawn(async move {
            let mut received = Vec::new();
            let mut buffer = Vec::new();
            device_write(&mut device, SERVER_HELLO).await;
            if device_read(&mut device, &mut buffer).await.is_none() {
                return received;
            }
            while let Some(rpc) = device_read(&mut device, &mut buffer).await {
                let answer = if rpc.contains(RPC_SYSTEM_INFORMATION) {
                    reply.clone()
                } else {
                    OK.to_owned()
                };
                received.push(rpc);
                device_write(&mut device, &answer).await;
            }
            received
        });
        let transport: Box<dyn Transport> = Box::new(client);
        let err = Session::start(transport, None, settings(None))
            .await
            .err()
            .unwrap();
        (err, device.await.unwrap())
    }

    #[tokio::test]
    async fn failed_start_closes_session() {
        let (err, received) = failed_start(
            "<rpc-reply><system-information></system-information></rpc-reply>".to_owned(),
        )
        .await;
        assert!(matches!(
            err.downcast_ref::<NetconfError>(),
            Some(NetconfError::MissingHardwareModel)
        ));
        assert!(received.last().unwrap().contains(RPC_CLOSE_SESSION));

        let (_, received) =
            failed_start("<rpc-reply><system-information><hardware-model>".to_owned()).await;
        assert!(received[0].contains(RPC_SYSTEM_INFORMATION));
        assert!(received.last().unwrap().contains(RPC_CLOSE_SESSION));

        let (_, received) = failed_start(rpc_error("error", "permission denied")).await;
        assert!(received.last().unwrap().contains(RPC_CLOSE_SESSION));
    }

    #[tokio::test]
    async fn show_config_empty_is_none() {
        let (mut session, received) = fake_session("mx240", |rpc| {
            if rpc.contains("community c1") {
                "<rpc-reply><configuration-output>\nset members 65000:1\n</configuration-output></rpc-reply>"
                    .to_owned()
            } else {
                "<rpc-reply><configuration-output>\n</configuration-output></rpc-reply>".to_owned()
            }
        })
        .await;
        assert_eq!(
            session
                .show_config_relative("policy-options community c1")
                .await
                .unwrap()
                .as_deref(),
            Some("set members 65000:1")
        );
        assert_eq!(
            session
                .show_config_relative("policy-options community c2")
                .await
                .unwrap(),
            None
        );
        let received = received.lock().unwrap();
        assert!(received[0].contains(
            "<command format=\"text\">show configuration policy-options community c1 | display set relative</command>"
        ));
    }

    #[tokio::test]
    async fn command_error_is_raised() {
        let (mut session, _) =
            fake_session("mx240", |_| rpc_error("error", "syntax error")).await;
        let err = session.command("show foo").await.unwrap_err();
        assert_eq!(err.to_string(), "syntax error");
    }

    #[tokio::test]
    async fn config_set_escapes_lines() {
        let (mut session, received) = fake_session("mx240", |_| {
            "<rpc-reply><load-configuration-results><ok/></load-configuration-results></rpc-reply>"
                .to_owned()
        })
        .await;
        session
            .config_set(&[
                "set firewall policer \"p<1>\" then discard".to_owned(),
                "set firewall policer \"p<1>\" filter-specific".to_owned(),
            ])
            .await
            .unwrap();
        let received = received.lock().unwrap();
        assert_eq!(
            received[0],
            "<rpc xmlns=\"urn:ietf:params:xml:ns:netconf:base:1.0\" message-id=\"2\">\
             <load-configuration action=\"set\" format=\"text\"><configuration-set>\
             set firewall policer &quot;p&lt;1&gt;&quot; then discard\n\
             set firewall policer &quot;p&lt;1&gt;&quot; filter-specific\
             </configuration-set></load-configuration></rpc>"
        );
    }

    #[tokio::test]
    async fn config_lock_retries_until_free() {
        let attempts = Arc::new(StdMutex::new(0));
        let counter = attempts.clone();
        let (mut session, _) = fake_session("mx240", move |rpc| {
            if rpc.contains(RPC_LOCK) {
                let mut count = counter.lock().unwrap();
                *count += 1;
                if *count < 3 {
                    return rpc_error("error", "configuration database locked by user admin");
                }
            }
            OK.to_owned()
        })
        .await;
        session.config_lock().await.unwrap();
        assert_eq!(*attempts.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn commit_returns_warnings() {
        let (mut session, received) = fake_session("mx240", |rpc| {
            if rpc.contains("<commit-configuration>") {
                "<rpc-reply><commit-results><routing-engine>\
                 <rpc-error><error-severity>warning</error-severity>\
                 <error-message>mgd: statement has no contents; ignored</error-message></rpc-error>\
                 <commit-success/></routing-engine></commit-results></rpc-reply>"
                    .to_owned()
            } else {
                OK.to_owned()
            }
        })
        .await;
        let (warnings, result) = session
            .commit_conf("create resource junos_static_route")
            .await;
        result.unwrap();
        assert_eq!(warnings, vec!["mgd: statement has no contents; ignored"]);
        let received = received.lock().unwrap();
        assert!(received[0]
            .contains("<commit-configuration><log>create resource junos_static_route</log></commit-configuration>"));
        assert!(received[1].contains(RPC_UNLOCK));
    }

    #[tokio::test]
    async fn commit_error_keeps_lock() {
        let (mut session, received) = fake_session("mx240", |rpc| {
            if rpc.contains("<commit-configuration>") {
                rpc_error("error", "commit failed")
            } else {
                OK.to_owned()
            }
        })
        .await;
        let (warnings, result) = session.commit_conf("update resource junos_x").await;
        assert!(warnings.is_empty());
        assert_eq!(result.unwrap_err().to_string(), "commit failed");
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn config_clear_never_fails() {
        let (mut session, received) = fake_session("mx240", |rpc| {
            if rpc.contains(RPC_UNLOCK) {
                rpc_error("error", "configuration database not locked")
            } else {
                OK.to_owned()
            }
        })
        .await;
        let warnings = session.config_clear().await;
        assert_eq!(warnings, vec!["configuration database not locked"]);
        let received = received.lock().unwrap();
        assert!(received[0].contains(RPC_DISCARD_CHANGES));
        assert!(received[1].contains(RPC_UNLOCK));
    }

    #[tokio::test]
    async fn closed_session_refuses_commands() {
        let (mut session, _) = fake_session("mx240", |_| OK.to_owned()).await;
        session.close().await;
        let err = session.command("show version").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NetconfError>(),
            Some(NetconfError::WithoutNetconf)
        ));
    }
}
