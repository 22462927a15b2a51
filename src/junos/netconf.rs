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
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::NetconfError;

/// End-of-message marker of the NETCONF 1.0 framing
pub(super) const DELIMITER: &[u8] = b"]]>]]>";
const BASE_NAMESPACE: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";
const BASE_CAPABILITY: &str = "urn:ietf:params:netconf:base:1.0";
const READ_CHUNK: usize = 8192;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpcError {
    pub severity: String,
    pub message: String,
}

impl RpcError {
    pub fn is_warning(&self) -> bool {
        self.severity == "warning"
    }
}

#[derive(Debug, Clone, Default)]
pub struct RpcReply {
    pub raw: String,
    pub errors: Vec<RpcError>,
    pub output: String,
}

impl RpcReply {
    pub fn parse(raw: String) -> Result<Self> {
        let mut reader = Reader::from_str(&raw);
        reader.trim_text(true);

        let mut errors = Vec::new();
        let mut output = String::new();
        let mut stack: Vec<Vec<u8>> = Vec::new();
        let mut current: Option<RpcError> = None;

        loop {
            match reader
                .read_event()
                .context("malformed xml in netconf reply")?
            {
                Event::Start(e) => {
                    let name = e.local_name().as_ref().to_vec();
                    if name == b"rpc-error" {
                        current = Some(RpcError::default());
                    }
                    stack.push(name);
                }
                Event::Empty(e) => {
                    if e.local_name().as_ref() == b"rpc-error" {
                        errors.push(RpcError::default());
                    }
                }
                Event::End(e) => {
                    if e.local_name().as_ref() == b"rpc-error" {
                        if let Some(error) = current.take() {
                            errors.push(error);
                        }
                    }
                    stack.pop();
                }
                Event::Text(e) => {
                    let text = e.unescape().context("bad escape in netconf reply")?;
                    match (stack.last().map(Vec::as_slice), current.as_mut()) {
                        (Some(b"error-severity"), Some(error)) => {
                            error.severity = text.trim().to_owned();
                        }
                        (Some(b"error-message"), Some(error)) => {
                            error.message = text.trim().to_owned();
                        }
                        (Some(b"output" | b"configuration-output"), None) => {
                            output.push_str(&text);
                        }
                        _ => (),
                    }
                }
                Event::CData(e) => {
                    if let Some(b"output" | b"configuration-output") = stack.last().map(Vec::as_slice) {
                        output.push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => (),
            }
        }

        Ok(Self {
            raw,
            errors,
            output: output.trim().to_owned(),
        })
    }

    /// Errors that are not simple warnings
    pub fn hard_errors(&self) -> impl Iterator<Item = &RpcError> {
        self.errors.iter().filter(|error| !error.is_warning())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &RpcError> {
        self.errors.iter().filter(|error| error.is_warning())
    }

    /// Fail with all error messages joined when the reply holds an error
    pub fn check(&self) -> Result<(), NetconfError> {
        let messages = self
            .hard_errors()
            .map(|error| error.message.as_str())
            .collect::<Vec<_>>();
        if messages.is_empty() {
            Ok(())
        } else {
            Err(NetconfError::Rpc(messages.join("\n")))
        }
    }

    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        quick_xml::de::from_str(&self.raw)
            .with_context(|| format!("unmarshaling xml reply {:?}", self.raw))
    }
}

/// A NETCONF 1.0 conversation over any byte stream
pub(super) struct NetconfStream<S> {
    stream: S,
    buffer: Vec<u8>,
    message_id: u64,
    pub(super) server_capabilities: Vec<String>,
}

impl<S> NetconfStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Exchange hello messages with the device
    pub(super) async fn open(stream: S) -> Result<Self> {
        let mut netconf = Self {
            stream,
            buffer: Vec::new(),
            message_id: 0,
            server_capabilities: Vec::new(),
        };

        let hello = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <hello xmlns=\"{BASE_NAMESPACE}\"><capabilities>\
             <capability>{BASE_CAPABILITY}</capability>\
             </capabilities></hello>"
        );
        netconf.write_message(&hello).await?;
        let server_hello = netconf.read_message().await?;
        netconf.server_capabilities = parse_capabilities(&server_hello)?;

        Ok(netconf)
    }

    /// Send one rpc and wait for its reply
    pub(super) async fn exec(&mut self, method: &str) -> Result<RpcReply> {
        self.message_id += 1;
        let rpc = format!(
            "<rpc xmlns=\"{BASE_NAMESPACE}\" message-id=\"{}\">{method}</rpc>",
            self.message_id
        );
        self.write_message(&rpc).await?;
        let reply = self.read_message().await?;
        RpcReply::parse(reply)
    }

    pub(super) async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    async fn write_message(&mut self, message: &str) -> Result<()> {
        self.stream.write_all(message.as_bytes()).await?;
        self.stream.write_all(DELIMITER).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_message(&mut self) -> Result<String> {
        let mut chunk = vec![0; READ_CHUNK];
        loop {
            if let Some(pos) = find_delimiter(&self.buffer) {
                let mut message: Vec<u8> = self.buffer.drain(..pos + DELIMITER.len()).collect();
                message.truncate(pos);
                return String::from_utf8(message).context("netconf message is not utf-8");
            }
            let read = self.stream.read(&mut chunk).await?;
            if read == 0 {
                return Err(NetconfError::Eof.into());
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }
}

fn find_delimiter(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(DELIMITER.len())
        .position(|window| window == DELIMITER)
}

fn parse_capabilities(hello: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(hello);
    reader.trim_text(true);
    let mut in_capability = false;
    let mut capabilities = Vec::new();
    loop {
        match reader.read_event().context("malformed xml in netconf hello")? {
            Event::Start(e) => in_capability = e.local_name().as_ref() == b"capability",
            Event::End(_) => in_capability = false,
            Event::Text(e) if in_capability => {
                capabilities.push(e.unescape()?.into_owned());
            }
            Event::Eof => break,
            _ => (),
        }
    }
    Ok(capabilities)
}

/// Escape a value placed between XML tags
pub(super) fn escape(value: &str) -> String {
    quick_xml::escape::escape(value).into_owned()
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use tokio::io::{duplex, DuplexStream};

    pub(crate) const SERVER_HELLO: &str = "<hello xmlns=\"urn:ietf:params:xml:ns:netconf:base:1.0\">\
        <capabilities>\
        <capability>urn:ietf:params:netconf:base:1.0</capability>\
        <capability>http://xml.juniper.net/netconf/junos/1.0</capability>\
        </capabilities><session-id>1234</session-id></hello>";

    /// Read one framed message from the device side of a duplex
    /// `None` once the client side is closed
    pub(crate) async fn device_read(
        stream: &mut DuplexStream,
        buffer: &mut Vec<u8>,
    ) -> Option<String> {
        let mut chunk = [0u8; 1024];
        loop {
            if let Some(pos) = find_delimiter(buffer) {
                let message: Vec<u8> = buffer.drain(..pos + DELIMITER.len()).collect();
                return Some(String::from_utf8_lossy(&message[..pos]).into_owned());
            }
            let read = stream.read(&mut chunk).await.unwrap_or(0);
            if read == 0 {
                return None;
            }
            buffer.extend_from_slice(&chunk[..read]);
        }
    }

    pub(crate) async fn device_write(stream: &mut DuplexStream, message: &str) {
        stream.write_all(message.as_bytes()).await.unwrap();
        stream.write_all(DELIMITER).await.unwrap();
    }

    #[test]
    fn parse_configuration_output() {
        let reply = RpcReply::parse(
            "<rpc-reply xmlns:junos=\"http://xml.juniper.net/junos/21.4R0/junos\">\
             <configuration-output>\nset members 65000:100\nset description \"a &amp; b\"\n</configuration-output>\
             </rpc-reply>"
                .to_owned(),
        )
        .unwrap();
        assert!(reply.errors.is_empty());
        assert_eq!(
            reply.output,
            "set members 65000:100\nset description \"a & b\""
        );
    }

    #[test]
    fn parse_nested_commit_errors_and_warnings() {
        let reply = RpcReply::parse(
            "<rpc-reply><commit-results><routing-engine><name>re0</name>\
             <rpc-error><error-severity>warning</error-severity>\
             <error-message>statement has no contents; ignored</error-message></rpc-error>\
             <rpc-error><error-severity>error</error-severity>\
             <error-message>\nconfiguration check-out failed\n</error-message></rpc-error>\
             </routing-engine></commit-results></rpc-reply>"
                .to_owned(),
        )
        .unwrap();
        assert_eq!(reply.errors.len(), 2);
        assert_eq!(reply.warnings().count(), 1);
        let err = reply.check().unwrap_err();
        assert_eq!(err.to_string(), "configuration check-out failed");
    }

    #[test]
    fn empty_output_is_empty_string() {
        let reply =
            RpcReply::parse("<rpc-reply><configuration-output>\n</configuration-output></rpc-reply>".to_owned())
                .unwrap();
        assert_eq!(reply.output, "");
        assert!(reply.check().is_ok());
    }

    #[tokio::test]
    async fn hello_then_rpc_roundtrip() {
        let (client, mut device) = duplex(4096);
        let device_task = tokio::spawn(async move {
            let mut buffer = Vec::new();
            device_write(&mut device, SERVER_HELLO).await;
            let hello = device_read(&mut device, &mut buffer).await.unwrap();
            assert!(hello.contains("<capability>urn:ietf:params:netconf:base:1.0</capability>"));
            let rpc = device_read(&mut device, &mut buffer).await.unwrap();
            assert!(rpc.contains("message-id=\"1\""));
            assert!(rpc.contains("<get-system-information/>"));
            device_write(
                &mut device,
                "<rpc-reply><system-information><hardware-model>srx300</hardware-model></system-information></rpc-reply>",
            )
            .await;
        });

        let mut netconf = NetconfStream::open(client).await.unwrap();
        assert_eq!(netconf.server_capabilities.len(), 2);
        let reply = netconf.exec("<get-system-information/>").await.unwrap();
        assert!(reply.raw.contains("srx300"));
        device_task.await.unwrap();
    }

    #[tokio::test]
    async fn eof_before_delimiter() {
        let (client, mut device) = duplex(4096);
        tokio::spawn(async move {
            let mut buffer = Vec::new();
            device.write_all(b"<hello>").await.unwrap();
            device_read(&mut device, &mut buffer).await;
        });
        let err = NetconfStream::open(client).await.err().unwrap();
        assert!(matches!(
            err.downcast_ref::<NetconfError>(),
            Some(NetconfError::Eof)
        ));
    }

    #[test]
    fn escape_command() {
        assert_eq!(escape("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
    }
}
