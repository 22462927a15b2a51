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

use std::{fmt, path::PathBuf, time::Duration};

use thiserror::Error;

/// Cipher names accepted by `ssh_ciphers`
pub const SUPPORTED_CIPHERS: &[&str] = &[
    "aes128-ctr",
    "aes192-ctr",
    "aes256-ctr",
    "aes256-gcm@openssh.com",
    "chacha20-poly1305@openssh.com",
];

/// Provider attribute names with the environment variable used as fallback
pub const ENV_FALLBACKS: &[(&str, &str)] = &[
    ("ip", "JUNOS_HOST"),
    ("port", "JUNOS_PORT"),
    ("username", "JUNOS_USERNAME"),
    ("password", "JUNOS_PASSWORD"),
    ("sshkey_pem", "JUNOS_SSH_KEY_PEM"),
    ("sshkey_file", "JUNOS_SSH_KEY_FILE"),
    ("keypass", "JUNOS_KEYPASS"),
    ("cmd_sleep_short", "JUNOS_SLEEP_SHORT"),
    ("cmd_sleep_lock", "JUNOS_SLEEP_LOCK"),
    ("ssh_sleep_closed", "JUNOS_SLEEP_SSH_CLOSED"),
    ("ssh_ciphers", "JUNOS_SSH_CIPHERS"),
    ("ssh_timeout_to_establish", "JUNOS_SSH_TIMEOUT_TO_ESTABLISH"),
    ("ssh_retry_to_establish", "JUNOS_SSH_RETRY_TO_ESTABLISH"),
    ("file_permission", "JUNOS_FILE_PERMISSION"),
    ("debug_netconf_log_path", "JUNOS_LOG_PATH"),
    ("fake_create_with_setfile", "JUNOS_FAKECREATE_SETFILE"),
    ("fake_update_also", "JUNOS_FAKEUPDATE_ALSO"),
    ("fake_delete_also", "JUNOS_FAKEDELETE_ALSO"),
];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct OptionError {
    /// Provider attribute the error relates to, `None` for the whole block
    pub attribute: Option<&'static str>,
    pub message: String,
}

impl OptionError {
    fn attribute(attribute: &'static str, message: impl Into<String>) -> Self {
        Self {
            attribute: Some(attribute),
            message: message.into(),
        }
    }
}

/// Fully resolved settings of the provider
#[derive(Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub sshkey_pem: Option<String>,
    pub sshkey_file: Option<PathBuf>,
    pub keypass: Option<String>,
    pub sleep_short: Duration,
    pub sleep_lock: Duration,
    pub sleep_ssh_closed: Duration,
    pub ssh_ciphers: Vec<String>,
    pub ssh_timeout: Option<Duration>,
    pub ssh_retry: u32,
    pub file_permission: u32,
    pub log_path: Option<PathBuf>,
    pub fake_create_set_file: Option<PathBuf>,
    pub fake_update_also: bool,
    pub fake_delete_also: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 830,
            username: "netconf".to_owned(),
            password: None,
            sshkey_pem: None,
            sshkey_file: None,
            keypass: None,
            sleep_short: Duration::from_millis(100),
            sleep_lock: Duration::from_secs(10),
            sleep_ssh_closed: Duration::ZERO,
            ssh_ciphers: Vec::new(),
            ssh_timeout: None,
            ssh_retry: 1,
            file_permission: 0o644,
            log_path: None,
            fake_create_set_file: None,
            fake_update_also: false,
            fake_delete_also: false,
        }
    }
}

// Secrets stay out of logs
impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(value: &Option<String>) -> &'static str {
            if value.is_some() {
                "<redacted>"
            } else {
                "<unset>"
            }
        }
        f.debug_struct("ClientOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("sshkey_pem", &redact(&self.sshkey_pem))
            .field("sshkey_file", &self.sshkey_file)
            .field("keypass", &redact(&self.keypass))
            .field("sleep_short", &self.sleep_short)
            .field("sleep_lock", &self.sleep_lock)
            .field("sleep_ssh_closed", &self.sleep_ssh_closed)
            .field("ssh_ciphers", &self.ssh_ciphers)
            .field("ssh_timeout", &self.ssh_timeout)
            .field("ssh_retry", &self.ssh_retry)
            .field("file_permission", &format_args!("{:#o}", self.file_permission))
            .field("log_path", &self.log_path)
            .field("fake_create_set_file", &self.fake_create_set_file)
            .field("fake_update_also", &self.fake_update_also)
            .field("fake_delete_also", &self.fake_delete_also)
            .finish()
    }
}

impl ClientOptions {
    /// Resolve every option from the provider block, then the environment, then the default.
    ///
    /// `config` returns the provider block value of an attribute rendered as a string,
    /// `env` looks up an environment variable.
    pub fn resolve<C, E>(config: C, env: E) -> Result<Self, OptionError>
    where
        C: Fn(&str) -> Option<String>,
        E: Fn(&str) -> Option<String>,
    {
        let lookup = |attribute: &'static str| -> Option<String> {
            config(attribute)
                .or_else(|| {
                    ENV_FALLBACKS
                        .iter()
                        .find(|(name, _)| *name == attribute)
                        .and_then(|(_, var)| env(var))
                })
                .filter(|value| !value.is_empty())
        };

        let mut options = Self::default();

        if let Some(host) = lookup("ip") {
            options.host = host;
        }
        if let Some(port) = lookup("port") {
            options.port = parse_number("port", &port)?;
        }
        if let Some(username) = lookup("username") {
            options.username = username;
        }
        options.password = lookup("password");
        options.sshkey_pem = lookup("sshkey_pem");
        options.sshkey_file = lookup("sshkey_file").map(|path| expand_home(&path));
        options.keypass = lookup("keypass");
        if let Some(ms) = lookup("cmd_sleep_short") {
            options.sleep_short = Duration::from_millis(parse_number("cmd_sleep_short", &ms)?);
        }
        if let Some(secs) = lookup("cmd_sleep_lock") {
            options.sleep_lock = Duration::from_secs(parse_number("cmd_sleep_lock", &secs)?);
        }
        if let Some(secs) = lookup("ssh_sleep_closed") {
            options.sleep_ssh_closed =
                Duration::from_secs(parse_number("ssh_sleep_closed", &secs)?);
        }
        if let Some(ciphers) = lookup("ssh_ciphers") {
            options.ssh_ciphers = ciphers
                .split(',')
                .map(str::trim)
                .filter(|cipher| !cipher.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Some(secs) = lookup("ssh_timeout_to_establish") {
            let secs: u64 = parse_number("ssh_timeout_to_establish", &secs)?;
            options.ssh_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(retry) = lookup("ssh_retry_to_establish") {
            options.ssh_retry = parse_number("ssh_retry_to_establish", &retry)?;
        }
        if let Some(mode) = lookup("file_permission") {
            options.file_permission = u32::from_str_radix(&mode, 8).map_err(|_| {
                OptionError::attribute(
                    "file_permission",
                    format!("{mode:?} is not an octal file mode"),
                )
            })?;
        }
        options.log_path = lookup("debug_netconf_log_path").map(|path| expand_home(&path));
        options.fake_create_set_file =
            lookup("fake_create_with_setfile").map(|path| expand_home(&path));
        if let Some(flag) = lookup("fake_update_also") {
            options.fake_update_also = parse_bool("fake_update_also", &flag)?;
        }
        if let Some(flag) = lookup("fake_delete_also") {
            options.fake_delete_also = parse_bool("fake_delete_also", &flag)?;
        }

        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), OptionError> {
        if !(1..=30).contains(&self.ssh_retry) {
            return Err(OptionError::attribute(
                "ssh_retry_to_establish",
                format!("expected to be in the range (1 - 30), got {}", self.ssh_retry),
            ));
        }
        if self.file_permission > 0o7777 {
            return Err(OptionError::attribute(
                "file_permission",
                format!("{:o} is not a file mode", self.file_permission),
            ));
        }
        if let Some(cipher) = self
            .ssh_ciphers
            .iter()
            .find(|cipher| !SUPPORTED_CIPHERS.contains(&cipher.as_str()))
        {
            return Err(OptionError::attribute(
                "ssh_ciphers",
                format!(
                    "unsupported cipher {cipher:?}, expected one of {}",
                    SUPPORTED_CIPHERS.join(", ")
                ),
            ));
        }
        if self.fake_create_set_file.is_none() {
            if self.fake_update_also {
                return Err(OptionError::attribute(
                    "fake_update_also",
                    "fake_update_also requires fake_create_with_setfile",
                ));
            }
            if self.fake_delete_also {
                return Err(OptionError::attribute(
                    "fake_delete_also",
                    "fake_delete_also requires fake_create_with_setfile",
                ));
            }
        }
        if self.host.is_empty() {
            return Err(OptionError::attribute(
                "ip",
                "ip is not set in the provider block nor in JUNOS_HOST",
            ));
        }
        let fake_everything =
            self.fake_create_set_file.is_some() && self.fake_update_also && self.fake_delete_also;
        if !fake_everything
            && self.password.is_none()
            && self.sshkey_pem.is_none()
            && self.sshkey_file.is_none()
        {
            return Err(OptionError {
                attribute: None,
                message: "one of password, sshkey_pem or sshkey_file must be set".to_owned(),
            });
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(attribute: &'static str, value: &str) -> Result<T, OptionError> {
    value
        .trim()
        .parse()
        .map_err(|_| OptionError::attribute(attribute, format!("{value:?} is not a valid number")))
}

fn parse_bool(attribute: &'static str, value: &str) -> Result<bool, OptionError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "t" => Ok(true),
        "false" | "0" | "f" => Ok(false),
        _ => Err(OptionError::attribute(
            attribute,
            format!("{value:?} is not a valid boolean"),
        )),
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn resolve(config: &[(&str, &str)], env: &[(&str, &str)]) -> Result<ClientOptions, OptionError> {
        let config: HashMap<String, String> = config
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientOptions::resolve(|name| config.get(name).cloned(), |var| env.get(var).cloned())
    }

    #[test]
    fn defaults() {
        let options = resolve(&[("ip", "192.0.2.1"), ("password", "pass")], &[]).unwrap();
        assert_eq!(options.port, 830);
        assert_eq!(options.username, "netconf");
        assert_eq!(options.sleep_short, Duration::from_millis(100));
        assert_eq!(options.sleep_lock, Duration::from_secs(10));
        assert_eq!(options.ssh_retry, 1);
        assert_eq!(options.ssh_timeout, None);
        assert_eq!(options.file_permission, 0o644);
    }

    #[test]
    fn config_wins_over_env() {
        let options = resolve(
            &[("ip", "192.0.2.1"), ("port", "2222")],
            &[
                ("JUNOS_HOST", "192.0.2.99"),
                ("JUNOS_PORT", "22"),
                ("JUNOS_USERNAME", "admin"),
                ("JUNOS_PASSWORD", "pass"),
                ("JUNOS_SSH_CIPHERS", "aes256-ctr, aes128-ctr"),
                ("JUNOS_SSH_TIMEOUT_TO_ESTABLISH", "5"),
            ],
        )
        .unwrap();
        assert_eq!(options.host, "192.0.2.1");
        assert_eq!(options.port, 2222);
        assert_eq!(options.username, "admin");
        assert_eq!(options.password.as_deref(), Some("pass"));
        assert_eq!(options.ssh_ciphers, vec!["aes256-ctr", "aes128-ctr"]);
        assert_eq!(options.ssh_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn invalid_values() {
        let base = [("ip", "192.0.2.1"), ("password", "pass")];

        let err = resolve(&[base[0], base[1], ("ssh_retry_to_establish", "31")], &[]).unwrap_err();
        assert_eq!(err.attribute, Some("ssh_retry_to_establish"));

        let err = resolve(&[base[0], base[1], ("file_permission", "0689")], &[]).unwrap_err();
        assert_eq!(err.attribute, Some("file_permission"));

        let err = resolve(&[base[0], base[1], ("ssh_ciphers", "3des-cbc")], &[]).unwrap_err();
        assert_eq!(err.attribute, Some("ssh_ciphers"));

        let err = resolve(&[base[0], base[1], ("fake_update_also", "true")], &[]).unwrap_err();
        assert_eq!(err.attribute, Some("fake_update_also"));

        let err = resolve(&[base[0], base[1], ("port", "abc")], &[]).unwrap_err();
        assert_eq!(err.attribute, Some("port"));
    }

    #[test]
    fn host_and_auth_required() {
        let err = resolve(&[("password", "pass")], &[]).unwrap_err();
        assert_eq!(err.attribute, Some("ip"));

        let err = resolve(&[("ip", "192.0.2.1")], &[]).unwrap_err();
        assert_eq!(err.attribute, None);

        let options = resolve(
            &[
                ("ip", "192.0.2.1"),
                ("fake_create_with_setfile", "/tmp/junos.set"),
                ("fake_update_also", "true"),
                ("fake_delete_also", "true"),
            ],
            &[],
        )
        .unwrap();
        assert_eq!(
            options.fake_create_set_file,
            Some(PathBuf::from("/tmp/junos.set"))
        );
    }

    #[test]
    fn debug_hides_secrets() {
        let options = resolve(
            &[("ip", "192.0.2.1"), ("password", "hunter2"), ("keypass", "k3y")],
            &[],
        )
        .unwrap();
        let debug = format!("{options:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("k3y"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("0o644"));
    }
}
