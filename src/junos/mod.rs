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

//! Session layer talking to a Junos device over SSH and NETCONF.

use lazy_static::lazy_static;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

mod client;
mod crypt;
mod lines;
mod netconf;
mod options;
mod session;
mod ssh;

pub use client::Client;
pub use crypt::decode_junos_secret;
pub use lines::{config_lines, cut_prefix, cut_suffix, quoted, trim_quotes};
pub use options::{ClientOptions, SUPPORTED_CIPHERS};
pub use session::Session;

#[cfg(test)]
pub(crate) use session::tests::fake_session;

/// Separator between the parts of a composite resource id
pub const ID_SEPARATOR: &str = "_-_";
pub const DEFAULT_WORD: &str = "default";
pub const CMD_SHOW_CONFIG: &str = "show configuration ";
pub const PIPE_DISPLAY_SET: &str = " | display set";
pub const PIPE_DISPLAY_SET_RELATIVE: &str = " | display set relative";
pub const SET_LINE_START: &str = "set ";
pub const ROUTING_INSTANCES_WS: &str = "routing-instances ";

pub const RPC_GET_INTERFACES_INFORMATION_TERSE: &str =
    "<get-interface-information><terse/></get-interface-information>";

#[derive(Debug, Error)]
pub enum NetconfError {
    #[error("{0}")]
    Rpc(String),
    #[error("connection closed by device before end of message")]
    Eof,
    #[error("can't read model of device with <get-system-information/> netconf command")]
    MissingHardwareModel,
    #[error("no netconf session available in this context")]
    WithoutNetconf,
}

lazy_static! {
    static ref DEVICE_MUTEX: Mutex<()> = Mutex::new(());
}

/// Serialize reads of the device configuration across the whole provider
pub async fn mutex_lock() -> MutexGuard<'static, ()> {
    DEVICE_MUTEX.lock().await
}
