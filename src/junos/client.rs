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

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};
use tracing::{debug, warn};

use super::{
    session::{SessionSettings, Transport},
    ssh, ClientOptions, Session,
};

/// Debug trace of the exchanges with the device
#[derive(Debug)]
pub(super) struct DebugLog {
    path: Option<PathBuf>,
    mode: u32,
    lock: Mutex<()>,
}

impl DebugLog {
    pub(super) fn new(path: Option<PathBuf>, mode: u32) -> Self {
        Self {
            path,
            mode,
            lock: Mutex::new(()),
        }
    }

    pub(super) async fn write(&self, message: &str) {
        debug!("{message}");
        let Some(path) = &self.path else {
            return;
        };
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let line = format!("{timestamp} {message}\n");

        let _guard = self.lock.lock().await;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(self.mode)
            .open(path)
            .await;
        let result = match file {
            Ok(mut file) => file.write_all(line.as_bytes()).await,
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            warn!(path = %path.display(), "unable to write debug log: {err}");
        }
    }
}

/// Entry point to a Junos device, shared by every resource of the provider
#[derive(Debug)]
pub struct Client {
    options: ClientOptions,
    log: Arc<DebugLog>,
}

impl Client {
    pub fn new(options: ClientOptions) -> Self {
        let log = DebugLog::new(options.log_path.clone(), options.file_permission);
        Self {
            options,
            log: Arc::new(log),
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn fake_create_set_file(&self) -> bool {
        self.options.fake_create_set_file.is_some()
    }

    pub fn fake_update_also(&self) -> bool {
        self.options.fake_update_also
    }

    pub fn fake_delete_also(&self) -> bool {
        self.options.fake_delete_also
    }

    pub async fn log_file(&self, message: &str) {
        self.log.write(message).await
    }

    fn settings(&self) -> SessionSettings {
        SessionSettings {
            sleep_short: self.options.sleep_short,
            sleep_lock: self.options.sleep_lock,
            sleep_ssh_closed: self.options.sleep_ssh_closed,
            fake_set_file: self.options.fake_create_set_file.clone(),
            file_permission: self.options.file_permission,
            log: self.log.clone(),
        }
    }

    /// Connect to the device and open a netconf session
    pub async fn start_new_session(&self) -> Result<Session> {
        let (handle, stream) = ssh::open_netconf(&self.options).await?;
        let transport: Box<dyn Transport> = Box::new(stream);
        let session = Session::start(transport, Some(handle), self.settings()).await?;
        self.log_file("[start_new_session] started").await;
        Ok(session)
    }

    /// Session only able to append set lines to the fake set file
    pub fn new_session_without_netconf(&self) -> Session {
        Session::without_netconf(self.settings())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_file_appends_timestamped_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("netconf.log");
        let client = Client::new(ClientOptions {
            log_path: Some(path.clone()),
            ..Default::default()
        });
        client.log_file("[command] show version").await;
        client.log_file("[close] closed").await;

        let content = std::fs::read_to_string(&path).unwrap();
        let lines = content.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" [command] show version"));
        assert!(lines[1].ends_with(" [close] closed"));
        // RFC 3339 timestamps start with the year
        assert!(lines[0].starts_with("20"));
    }

    #[tokio::test]
    async fn fake_session_writes_set_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.set");
        let client = Client::new(ClientOptions {
            fake_create_set_file: Some(path.clone()),
            ..Default::default()
        });
        assert!(client.fake_create_set_file());
        assert!(!client.fake_update_also());

        let mut session = client.new_session_without_netconf();
        session
            .config_set(&["set policy-options community c1 members 65000:1".to_owned()])
            .await
            .unwrap();
        session
            .config_set(&["set policy-options community c2 members 65000:2".to_owned()])
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "set policy-options community c1 members 65000:1\n\
             set policy-options community c2 members 65000:2\n"
        );
        assert!(session.command("show version").await.is_err());
    }
}
