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

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tf_provider::{
    map,
    schema::{Block, Description, NestedBlock, Schema},
    value::{ValueList, ValueNumber, ValueSet},
    AttributePath, Diagnostics, Value,
};

use crate::junos::{cut_prefix, quoted, trim_quotes};
use crate::utils::{
    block_mut, blocks, flag, id_attribute, insert_str, is_true, list_block_mut, non_empty,
    normalize_block_list, number, optional_bool, optional_number, optional_set, optional_string,
    parse_number, push_str, replace_if_changed, required_list, required_string, set_strings,
    strings, value_str, ValueBool, ValueStr, WithNormalize, WithSchema, WithValidate,
};
use crate::validate;

use super::JunosResource;

const FACILITIES: [&str; 14] = [
    "authorization",
    "change-log",
    "conflict-log",
    "daemon",
    "dfc",
    "external",
    "firewall",
    "ftp",
    "interactive-commands",
    "kernel",
    "ntp",
    "pfe",
    "security",
    "user",
];
const SEVERITIES: [&str; 7] = [
    "alert",
    "critical",
    "emergency",
    "error",
    "info",
    "notice",
    "warning",
];
const MAX_U32: i64 = 4_294_967_295;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventoptionsPolicy {
    pub id: ValueStr,
    pub name: ValueStr,
    pub events: ValueSet<ValueStr>,
    pub then: Value<PolicyThen>,
    pub attributes_match: ValueList<Value<AttributesMatch>>,
    pub within: ValueList<Value<Within>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyThen {
    pub change_configuration: Value<ChangeConfiguration>,
    pub event_script: ValueList<Value<EventScript>>,
    pub execute_commands: Value<ExecuteCommands>,
    pub ignore: ValueBool,
    pub priority_override_facility: ValueStr,
    pub priority_override_severity: ValueStr,
    pub raise_trap: ValueBool,
    pub upload: ValueList<Value<Upload>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeConfiguration {
    pub commands: ValueList<ValueStr>,
    pub commit_options_check: ValueBool,
    pub commit_options_check_synchronize: ValueBool,
    pub commit_options_force: ValueBool,
    pub commit_options_log: ValueStr,
    pub commit_options_synchronize: ValueBool,
    pub retry_count: ValueNumber,
    pub retry_interval: ValueNumber,
    pub user_name: ValueStr,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventScript {
    pub filename: ValueStr,
    pub arguments: ValueList<Value<ScriptArgument>>,
    pub destination: Value<Destination>,
    pub output_filename: ValueStr,
    pub output_format: ValueStr,
    pub user_name: ValueStr,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptArgument {
    pub name: ValueStr,
    pub value: ValueStr,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteCommands {
    pub commands: ValueList<ValueStr>,
    pub destination: Value<Destination>,
    pub output_filename: ValueStr,
    pub output_format: ValueStr,
    pub user_name: ValueStr,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub name: ValueStr,
    pub retry_count: ValueNumber,
    pub retry_interval: ValueNumber,
    pub transfer_delay: ValueNumber,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    pub filename: ValueStr,
    pub destination: ValueStr,
    pub retry_count: ValueNumber,
    pub retry_interval: ValueNumber,
    pub transfer_delay: ValueNumber,
    pub user_name: ValueStr,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributesMatch {
    pub from: ValueStr,
    pub compare: ValueStr,
    pub to: ValueStr,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Within {
    pub time_interval: ValueNumber,
    pub events: ValueSet<ValueStr>,
    pub not_events: ValueSet<ValueStr>,
    pub trigger_count: ValueNumber,
    pub trigger_when: ValueStr,
}

fn no_space(diags: &mut Diagnostics, attr_path: AttributePath, value: &ValueStr) {
    validate::matches(diags, attr_path, value, |value| !value.contains(' '), "a value without space");
}

/// `retry_count` and `retry_interval` go together
fn validate_retry(
    diags: &mut Diagnostics,
    path: &AttributePath,
    count: &ValueNumber,
    interval: &ValueNumber,
) {
    validate::int_between(diags, path.clone().attribute("retry_count"), count, 0, 10);
    validate::int_between(diags, path.clone().attribute("retry_interval"), interval, 0, MAX_U32);
    if count.is_null() != interval.is_null() {
        let (missing, set) = if count.is_null() {
            ("retry_count", "retry_interval")
        } else {
            ("retry_interval", "retry_count")
        };
        diags.error_short(
            format!("{missing} must be set with {set}"),
            path.clone().attribute(set),
        );
    }
}

/// Value of `retry-count <count> retry-interval <interval>`
fn retry_line(count: &ValueNumber, interval: &ValueNumber) -> Result<Option<String>> {
    match (number(count), number(interval)) {
        (Some(count), Some(interval)) => Ok(Some(format!(
            "retry-count {count} retry-interval {interval}"
        ))),
        (Some(_), None) => bail!("retry_interval must be set with retry_count"),
        (None, Some(_)) => bail!("retry_count must be set with retry_interval"),
        (None, None) => Ok(None),
    }
}

/// Read `<count> [retry-interval <interval>]` after `retry-count `
fn parse_retry(line: &str, count: &mut ValueNumber, interval: &mut ValueNumber) -> Result<()> {
    match line.split_once(" retry-interval ") {
        Some((value, other)) => {
            *count = parse_number(value)?;
            *interval = parse_number(other)?;
        }
        None => *count = parse_number(line)?,
    }
    Ok(())
}

fn validate_output_format(diags: &mut Diagnostics, attr_path: AttributePath, value: &ValueStr) {
    validate::one_of(diags, attr_path, value, &["text", "xml"]);
}

impl Destination {
    fn validate(&self, diags: &mut Diagnostics, path: AttributePath) {
        no_space(diags, path.clone().attribute("name"), &self.name);
        validate_retry(diags, &path, &self.retry_count, &self.retry_interval);
        validate::int_between(
            diags,
            path.attribute("transfer_delay"),
            &self.transfer_delay,
            0,
            MAX_U32,
        );
    }

    fn set_lines(&self, lines: &mut Vec<String>, set_prefix: &str) -> Result<()> {
        let set_prefix = format!("{set_prefix}destination {} ", quoted(self.name.as_str()));
        lines.push(set_prefix.trim_end().to_owned());
        if let Some(retry) = retry_line(&self.retry_count, &self.retry_interval)? {
            lines.push(format!("{set_prefix}{retry}"));
        }
        if let Some(delay) = number(&self.transfer_delay) {
            lines.push(format!("{set_prefix}transfer-delay {delay}"));
        }
        Ok(())
    }

    /// `line` follows `destination `
    fn parse_line(&mut self, line: &str) -> Result<()> {
        let (name, mut rest) = line.split_once(' ').unwrap_or((line, ""));
        self.name = value_str(trim_quotes(name));
        if cut_prefix(&mut rest, "retry-count ") {
            parse_retry(rest, &mut self.retry_count, &mut self.retry_interval)?;
        } else if cut_prefix(&mut rest, "retry-interval ") {
            self.retry_interval = parse_number(rest)?;
        } else if cut_prefix(&mut rest, "transfer-delay ") {
            self.transfer_delay = parse_number(rest)?;
        }
        Ok(())
    }
}

fn destination_block() -> NestedBlock {
    NestedBlock::Single(Block {
        description: Description::plain("Location to which to output file"),
        attributes: map! {
            "name" => optional_string("Name of destination"),
            "retry_count" => optional_number("Number of retry attempts"),
            "retry_interval" => optional_number("Time interval between each retry"),
            "transfer_delay" => optional_number("Delay before uploading file to the destination"),
        },
        ..Default::default()
    })
}

impl ChangeConfiguration {
    fn validate(&self, diags: &mut Diagnostics, path: AttributePath) {
        if strings(&self.commands).next().is_none() && !self.commands.is_unknown() {
            diags.error_short(
                "at least one command is required in change_configuration block",
                path.clone().attribute("commands"),
            );
        }
        validate::bool_true(
            diags,
            path.clone().attribute("commit_options_check"),
            &self.commit_options_check,
        );
        validate::bool_true(
            diags,
            path.clone().attribute("commit_options_check_synchronize"),
            &self.commit_options_check_synchronize,
        );
        if is_true(&self.commit_options_check_synchronize) && !is_true(&self.commit_options_check) {
            diags.error_short(
                "commit_options_check must be set with commit_options_check_synchronize",
                path.clone().attribute("commit_options_check_synchronize"),
            );
        }
        for (name, set) in [
            ("commit_options_force", !self.commit_options_force.is_null()),
            ("commit_options_log", !self.commit_options_log.is_null()),
            ("commit_options_synchronize", !self.commit_options_synchronize.is_null()),
        ] {
            validate::conflicts(
                diags,
                path.clone().attribute(name),
                name,
                "commit_options_check",
                set,
                !self.commit_options_check.is_null(),
            );
        }
        validate::bool_true(
            diags,
            path.clone().attribute("commit_options_force"),
            &self.commit_options_force,
        );
        validate::bool_true(
            diags,
            path.clone().attribute("commit_options_synchronize"),
            &self.commit_options_synchronize,
        );
        validate::no_double_quote(
            diags,
            path.clone().attribute("commit_options_log"),
            &self.commit_options_log,
        );
        validate_retry(diags, &path, &self.retry_count, &self.retry_interval);
    }

    fn set_lines(&self, lines: &mut Vec<String>, set_prefix: &str) -> Result<()> {
        let set_prefix = format!("{set_prefix}change-configuration ");
        for command in strings(&self.commands) {
            lines.push(format!("{set_prefix}commands {}", quoted(command)));
        }
        if is_true(&self.commit_options_check) {
            lines.push(format!("{set_prefix}commit-options check"));
            if is_true(&self.commit_options_check_synchronize) {
                lines.push(format!("{set_prefix}commit-options check synchronize"));
            }
        } else if is_true(&self.commit_options_check_synchronize) {
            bail!("commit_options_check must be set with commit_options_check_synchronize");
        }
        if is_true(&self.commit_options_force) {
            lines.push(format!("{set_prefix}commit-options force"));
        }
        if let Some(log) = non_empty(&self.commit_options_log) {
            lines.push(format!("{set_prefix}commit-options log {}", quoted(log)));
        }
        if is_true(&self.commit_options_synchronize) {
            lines.push(format!("{set_prefix}commit-options synchronize"));
        }
        match (number(&self.retry_count), number(&self.retry_interval)) {
            (Some(count), Some(interval)) => {
                lines.push(format!("{set_prefix}retry count {count} interval {interval}"));
            }
            (None, None) => {}
            _ => bail!("retry_count and retry_interval must be set together in change_configuration"),
        }
        if let Some(user) = non_empty(&self.user_name) {
            lines.push(format!("{set_prefix}user-name {user}"));
        }
        Ok(())
    }

    fn parse_line(&mut self, mut line: &str) -> Result<()> {
        if cut_prefix(&mut line, "commands ") {
            push_str(&mut self.commands, trim_quotes(line));
        } else if line == "commit-options check" {
            self.commit_options_check = flag(true);
        } else if line == "commit-options check synchronize" {
            self.commit_options_check = flag(true);
            self.commit_options_check_synchronize = flag(true);
        } else if line == "commit-options force" {
            self.commit_options_force = flag(true);
        } else if cut_prefix(&mut line, "commit-options log ") {
            self.commit_options_log = value_str(trim_quotes(line));
        } else if line == "commit-options synchronize" {
            self.commit_options_synchronize = flag(true);
        } else if cut_prefix(&mut line, "retry count ") {
            match line.split_once(" interval ") {
                Some((count, interval)) => {
                    self.retry_count = parse_number(count)?;
                    self.retry_interval = parse_number(interval)?;
                }
                None => self.retry_count = parse_number(line)?,
            }
        } else if cut_prefix(&mut line, "retry interval ") {
            self.retry_interval = parse_number(line)?;
        } else if cut_prefix(&mut line, "user-name ") {
            self.user_name = value_str(line);
        }
        Ok(())
    }
}

impl EventScript {
    fn validate(&self, diags: &mut Diagnostics, path: AttributePath) {
        no_space(diags, path.clone().attribute("filename"), &self.filename);
        if let Value::Value(arguments) = &self.arguments {
            let mut names = Vec::new();
            for (index, argument) in arguments.iter().enumerate() {
                let Value::Value(argument) = argument else {
                    continue;
                };
                let path = path.clone().attribute("arguments").index(index as i64);
                no_space(diags, path.clone().attribute("name"), &argument.name);
                no_space(diags, path.clone().attribute("value"), &argument.value);
                if let Value::Value(name) = &argument.name {
                    if names.contains(&name) {
                        diags.error_short(
                            format!("multiple arguments blocks with the same name {name:?}"),
                            path.attribute("name"),
                        );
                    }
                    names.push(name);
                }
            }
        }
        if let Value::Value(destination) = &self.destination {
            destination.validate(diags, path.clone().attribute("destination"));
        }
        validate_output_format(diags, path.attribute("output_format"), &self.output_format);
    }

    fn set_lines(&self, lines: &mut Vec<String>, set_prefix: &str) -> Result<()> {
        let set_prefix = format!("{set_prefix}event-script {} ", quoted(self.filename.as_str()));
        lines.push(set_prefix.trim_end().to_owned());
        let mut names = Vec::new();
        for argument in blocks(&self.arguments) {
            let name = argument.name.as_str();
            if names.contains(&name) {
                bail!("multiple arguments blocks with the same name {name:?}");
            }
            names.push(name);
            lines.push(format!(
                "{set_prefix}arguments {} {}",
                quoted(name),
                quoted(argument.value.as_str())
            ));
        }
        if let Value::Value(destination) = &self.destination {
            destination.set_lines(lines, &set_prefix)?;
        }
        if let Some(filename) = non_empty(&self.output_filename) {
            lines.push(format!("{set_prefix}output-filename {}", quoted(filename)));
        }
        if let Some(format) = non_empty(&self.output_format) {
            lines.push(format!("{set_prefix}output-format {format}"));
        }
        if let Some(user) = non_empty(&self.user_name) {
            lines.push(format!("{set_prefix}user-name {user}"));
        }
        Ok(())
    }

    fn parse_line(&mut self, mut line: &str) -> Result<()> {
        if cut_prefix(&mut line, "arguments ") {
            let Some((name, value)) = line.split_once(' ') else {
                bail!("can't read values for arguments in {line:?}: not enough fields");
            };
            let name = trim_quotes(name);
            let argument = list_block_mut(&mut self.arguments, |argument| {
                argument.name.as_str() == name
            });
            argument.name = value_str(name);
            argument.value = value_str(trim_quotes(value));
        } else if cut_prefix(&mut line, "destination ") {
            block_mut(&mut self.destination).parse_line(line)?;
        } else if cut_prefix(&mut line, "output-filename ") {
            self.output_filename = value_str(trim_quotes(line));
        } else if cut_prefix(&mut line, "output-format ") {
            self.output_format = value_str(line);
        } else if cut_prefix(&mut line, "user-name ") {
            self.user_name = value_str(line);
        }
        Ok(())
    }
}

impl ExecuteCommands {
    fn validate(&self, diags: &mut Diagnostics, path: AttributePath) {
        if strings(&self.commands).next().is_none() && !self.commands.is_unknown() {
            diags.error_short(
                "at least one command is required in execute_commands block",
                path.clone().attribute("commands"),
            );
        }
        if self.destination.is_null() != self.output_filename.is_null() {
            diags.error_short(
                "destination and output_filename must be set together in execute_commands block",
                path.clone().attribute("output_filename"),
            );
        }
        if let Value::Value(destination) = &self.destination {
            destination.validate(diags, path.clone().attribute("destination"));
        }
        validate_output_format(diags, path.attribute("output_format"), &self.output_format);
    }

    fn set_lines(&self, lines: &mut Vec<String>, set_prefix: &str) -> Result<()> {
        let set_prefix = format!("{set_prefix}execute-commands ");
        for command in strings(&self.commands) {
            lines.push(format!("{set_prefix}commands {}", quoted(command)));
        }
        if let Value::Value(destination) = &self.destination {
            destination.set_lines(lines, &set_prefix)?;
        }
        if let Some(filename) = non_empty(&self.output_filename) {
            lines.push(format!("{set_prefix}output-filename {}", quoted(filename)));
        }
        if let Some(format) = non_empty(&self.output_format) {
            lines.push(format!("{set_prefix}output-format {format}"));
        }
        if let Some(user) = non_empty(&self.user_name) {
            lines.push(format!("{set_prefix}user-name {user}"));
        }
        Ok(())
    }

    fn parse_line(&mut self, mut line: &str) -> Result<()> {
        if cut_prefix(&mut line, "commands ") {
            push_str(&mut self.commands, trim_quotes(line));
        } else if cut_prefix(&mut line, "destination ") {
            block_mut(&mut self.destination).parse_line(line)?;
        } else if cut_prefix(&mut line, "output-filename ") {
            self.output_filename = value_str(trim_quotes(line));
        } else if cut_prefix(&mut line, "output-format ") {
            self.output_format = value_str(line);
        } else if cut_prefix(&mut line, "user-name ") {
            self.user_name = value_str(line);
        }
        Ok(())
    }
}

impl Upload {
    fn set_lines(&self, lines: &mut Vec<String>, set_prefix: &str) -> Result<()> {
        let set_prefix = format!(
            "{set_prefix}upload filename {} destination {} ",
            quoted(self.filename.as_str()),
            quoted(self.destination.as_str())
        );
        lines.push(set_prefix.trim_end().to_owned());
        if let Some(retry) = retry_line(&self.retry_count, &self.retry_interval)? {
            lines.push(format!("{set_prefix}{retry}"));
        }
        if let Some(delay) = number(&self.transfer_delay) {
            lines.push(format!("{set_prefix}transfer-delay {delay}"));
        }
        if let Some(user) = non_empty(&self.user_name) {
            lines.push(format!("{set_prefix}user-name {user}"));
        }
        Ok(())
    }

    /// `rest` follows `upload filename <filename> destination <destination> `
    fn parse_line(&mut self, mut rest: &str) -> Result<()> {
        if cut_prefix(&mut rest, "retry-count ") {
            parse_retry(rest, &mut self.retry_count, &mut self.retry_interval)?;
        } else if cut_prefix(&mut rest, "retry-interval ") {
            self.retry_interval = parse_number(rest)?;
        } else if cut_prefix(&mut rest, "transfer-delay ") {
            self.transfer_delay = parse_number(rest)?;
        } else if cut_prefix(&mut rest, "user-name ") {
            self.user_name = value_str(rest);
        }
        Ok(())
    }
}

impl PolicyThen {
    fn actions(&self) -> [(&'static str, bool); 7] {
        [
            ("change_configuration", !self.change_configuration.is_null()),
            (
                "event_script",
                blocks(&self.event_script).next().is_some() || self.event_script.is_unknown(),
            ),
            ("execute_commands", !self.execute_commands.is_null()),
            ("priority_override_facility", !self.priority_override_facility.is_null()),
            ("priority_override_severity", !self.priority_override_severity.is_null()),
            ("raise_trap", !self.raise_trap.is_null()),
            (
                "upload",
                blocks(&self.upload).next().is_some() || self.upload.is_unknown(),
            ),
        ]
    }

    fn validate(&self, diags: &mut Diagnostics) {
        let path = |name: &'static str| AttributePath::new("then").attribute(name);
        let actions = self.actions();
        if self.ignore.is_null() && actions.iter().all(|&(_, set)| !set) {
            diags.error_short(
                "at least one action is required in then block",
                AttributePath::new("then"),
            );
        }
        validate::bool_true(diags, path("ignore"), &self.ignore);
        validate::bool_true(diags, path("raise_trap"), &self.raise_trap);
        for (name, set) in actions {
            validate::conflicts(diags, path("ignore"), "ignore", name, !self.ignore.is_null(), set);
        }
        if let Value::Value(change) = &self.change_configuration {
            change.validate(diags, path("change_configuration"));
        }
        if let Value::Value(scripts) = &self.event_script {
            let mut filenames = Vec::new();
            for (index, script) in scripts.iter().enumerate() {
                let Value::Value(script) = script else {
                    continue;
                };
                let path = path("event_script").index(index as i64);
                if let Value::Value(filename) = &script.filename {
                    if filenames.contains(&filename) {
                        diags.error_short(
                            format!("multiple event_script blocks with the same filename {filename:?}"),
                            path.clone().attribute("filename"),
                        );
                    }
                    filenames.push(filename);
                }
                script.validate(diags, path);
            }
        }
        if let Value::Value(execute) = &self.execute_commands {
            execute.validate(diags, path("execute_commands"));
        }
        validate::one_of(
            diags,
            path("priority_override_facility"),
            &self.priority_override_facility,
            &FACILITIES,
        );
        validate::one_of(
            diags,
            path("priority_override_severity"),
            &self.priority_override_severity,
            &SEVERITIES,
        );
        if let Value::Value(uploads) = &self.upload {
            let mut keys = Vec::new();
            for (index, upload) in uploads.iter().enumerate() {
                let Value::Value(upload) = upload else {
                    continue;
                };
                let path = path("upload").index(index as i64);
                no_space(diags, path.clone().attribute("filename"), &upload.filename);
                no_space(diags, path.clone().attribute("destination"), &upload.destination);
                validate_retry(diags, &path, &upload.retry_count, &upload.retry_interval);
                validate::int_between(
                    diags,
                    path.clone().attribute("transfer_delay"),
                    &upload.transfer_delay,
                    0,
                    MAX_U32,
                );
                if let (Value::Value(filename), Value::Value(destination)) =
                    (&upload.filename, &upload.destination)
                {
                    if keys.contains(&(filename, destination)) {
                        diags.error_short(
                            format!("multiple upload blocks with the same filename {filename:?} and destination {destination:?}"),
                            path,
                        );
                    }
                    keys.push((filename, destination));
                }
            }
        }
    }

    fn set_lines(&self, lines: &mut Vec<String>, set_prefix: &str) -> Result<()> {
        let set_prefix = format!("{set_prefix}then ");
        if let Value::Value(change) = &self.change_configuration {
            change.set_lines(lines, &set_prefix)?;
        }
        let mut filenames = Vec::new();
        for script in blocks(&self.event_script) {
            let filename = script.filename.as_str();
            if filenames.contains(&filename) {
                bail!("multiple event_script blocks with the same filename {filename:?}");
            }
            filenames.push(filename);
            script.set_lines(lines, &set_prefix)?;
        }
        if let Value::Value(execute) = &self.execute_commands {
            execute.set_lines(lines, &set_prefix)?;
        }
        if is_true(&self.ignore) {
            lines.push(format!("{set_prefix}ignore"));
        }
        if let Some(facility) = non_empty(&self.priority_override_facility) {
            lines.push(format!("{set_prefix}priority-override facility {facility}"));
        }
        if let Some(severity) = non_empty(&self.priority_override_severity) {
            lines.push(format!("{set_prefix}priority-override severity {severity}"));
        }
        if is_true(&self.raise_trap) {
            lines.push(format!("{set_prefix}raise-trap"));
        }
        let mut keys = Vec::new();
        for upload in blocks(&self.upload) {
            let key = (upload.filename.as_str(), upload.destination.as_str());
            if keys.contains(&key) {
                bail!(
                    "multiple upload blocks with the same filename {:?} and destination {:?}",
                    key.0,
                    key.1
                );
            }
            keys.push(key);
            upload.set_lines(lines, &set_prefix)?;
        }
        Ok(())
    }

    fn parse_line(&mut self, mut line: &str) -> Result<()> {
        if cut_prefix(&mut line, "change-configuration ") {
            block_mut(&mut self.change_configuration).parse_line(line)?;
        } else if cut_prefix(&mut line, "event-script ") {
            let (filename, rest) = line.split_once(' ').unwrap_or((line, ""));
            let filename = trim_quotes(filename);
            let script = list_block_mut(&mut self.event_script, |script| {
                script.filename.as_str() == filename
            });
            script.filename = value_str(filename);
            if !rest.is_empty() {
                script.parse_line(rest)?;
            }
        } else if cut_prefix(&mut line, "execute-commands ") {
            block_mut(&mut self.execute_commands).parse_line(line)?;
        } else if line == "ignore" {
            self.ignore = flag(true);
        } else if cut_prefix(&mut line, "priority-override facility ") {
            self.priority_override_facility = value_str(line);
        } else if cut_prefix(&mut line, "priority-override severity ") {
            self.priority_override_severity = value_str(line);
        } else if line == "raise-trap" {
            self.raise_trap = flag(true);
        } else if cut_prefix(&mut line, "upload filename ") {
            let fields: Vec<&str> = line.splitn(4, ' ').collect();
            let [filename, "destination", destination, ..] = fields[..] else {
                bail!("can't read values for upload filename in {line:?}: not enough fields");
            };
            let (filename, destination) = (trim_quotes(filename), trim_quotes(destination));
            let upload = list_block_mut(&mut self.upload, |upload| {
                upload.filename.as_str() == filename && upload.destination.as_str() == destination
            });
            upload.filename = value_str(filename);
            upload.destination = value_str(destination);
            if let Some(rest) = fields.get(3) {
                upload.parse_line(rest)?;
            }
        }
        Ok(())
    }

    fn normalize(&mut self) {
        normalize_block_list(&mut self.event_script);
        normalize_block_list(&mut self.upload);
        if let Value::Value(scripts) = &mut self.event_script {
            for script in scripts.iter_mut() {
                if let Value::Value(script) = script {
                    normalize_block_list(&mut script.arguments);
                }
            }
        }
    }
}

impl Within {
    fn set_lines(&self, lines: &mut Vec<String>, set_prefix: &str) -> Result<()> {
        let Some(interval) = number(&self.time_interval) else {
            bail!("time_interval must be set in within block");
        };
        let set_prefix = format!("{set_prefix}within {interval} ");
        let start = lines.len();
        for event in set_strings(&self.events) {
            lines.push(format!("{set_prefix}events {}", quoted(event)));
        }
        for event in set_strings(&self.not_events) {
            lines.push(format!("{set_prefix}not events {}", quoted(event)));
        }
        match (non_empty(&self.trigger_when), number(&self.trigger_count)) {
            (Some(when), Some(count)) => lines.push(format!("{set_prefix}trigger {when} {count}")),
            (Some(_), None) => bail!("trigger_count must be set with trigger_when"),
            (None, Some(_)) => bail!("trigger_when must be set with trigger_count"),
            (None, None) => {}
        }
        if lines.len() == start {
            bail!("missing argument for within (time_interval={interval})");
        }
        Ok(())
    }

    /// `line` follows `within <time_interval> `
    fn parse_line(&mut self, mut line: &str) -> Result<()> {
        if cut_prefix(&mut line, "events ") {
            insert_str(&mut self.events, trim_quotes(line));
        } else if cut_prefix(&mut line, "not events ") {
            insert_str(&mut self.not_events, trim_quotes(line));
        } else if cut_prefix(&mut line, "trigger ") {
            for field in line.split(' ') {
                match field {
                    "after" | "on" | "until" => self.trigger_when = value_str(field),
                    count => self.trigger_count = parse_number(count)?,
                }
            }
        }
        Ok(())
    }
}

impl WithSchema for EventoptionsPolicy {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                description: Description::plain("Provides an event-options policy resource"),
                attributes: map! {
                    "id" => id_attribute(),
                    "name" => required_string("Name of policy"),
                    "events" => optional_set("List of events that trigger this policy"),
                },
                blocks: map! {
                    "then" => NestedBlock::Single(Block {
                        description: Description::plain("List of actions to take for this policy"),
                        attributes: map! {
                            "ignore" => optional_bool("Do not log event or perform any other action"),
                            "priority_override_facility" => optional_string("Change syslog priority facility value"),
                            "priority_override_severity" => optional_string("Change syslog priority severity value"),
                            "raise_trap" => optional_bool("Raise SNMP trap"),
                        },
                        blocks: map! {
                            "change_configuration" => NestedBlock::Single(Block {
                                description: Description::plain("Change configuration"),
                                attributes: map! {
                                    "commands" => required_list("List of configuration commands"),
                                    "commit_options_check" => optional_bool("Check correctness of syntax; do not apply changes"),
                                    "commit_options_check_synchronize" => optional_bool("Synchronize commit check on both Routing Engines"),
                                    "commit_options_force" => optional_bool("Force commit on other Routing Engine (ignore warnings)"),
                                    "commit_options_log" => optional_string("Message to write to commit log"),
                                    "commit_options_synchronize" => optional_bool("Synchronize commit on both Routing Engines"),
                                    "retry_count" => optional_number("Number of times to retry committing the configuration"),
                                    "retry_interval" => optional_number("Time interval between each retry"),
                                    "user_name" => optional_string("User under whose privileges configuration should be changed"),
                                },
                                ..Default::default()
                            }),
                            "event_script" => NestedBlock::List(Block {
                                description: Description::plain("Invoke event scripts"),
                                attributes: map! {
                                    "filename" => required_string("Local filename of the script file"),
                                    "output_filename" => optional_string("Name of file in which to write event script output"),
                                    "output_format" => optional_string("Format of output from event-script"),
                                    "user_name" => optional_string("User under whose privileges event script will execute"),
                                },
                                blocks: map! {
                                    "arguments" => NestedBlock::List(Block {
                                        description: Description::plain("Command line argument to the script"),
                                        attributes: map! {
                                            "name" => required_string("Name of the argument"),
                                            "value" => required_string("Value of the argument"),
                                        },
                                        ..Default::default()
                                    }),
                                    "destination" => destination_block(),
                                },
                                ..Default::default()
                            }),
                            "execute_commands" => NestedBlock::Single(Block {
                                description: Description::plain("Issue one or more CLI commands"),
                                attributes: map! {
                                    "commands" => required_list("List of CLI commands to issue"),
                                    "output_filename" => optional_string("Name of file in which to write command output"),
                                    "output_format" => optional_string("Format of output from CLI commands"),
                                    "user_name" => optional_string("User under whose privileges command will execute"),
                                },
                                blocks: map! {
                                    "destination" => destination_block(),
                                },
                                ..Default::default()
                            }),
                            "upload" => NestedBlock::List(Block {
                                description: Description::plain("Upload file to specified destination"),
                                attributes: map! {
                                    "filename" => required_string("Name of file to upload"),
                                    "destination" => required_string("Location to which to output file"),
                                    "retry_count" => optional_number("Number of upload retry attempts"),
                                    "retry_interval" => optional_number("Time interval between each retry"),
                                    "transfer_delay" => optional_number("Delay before uploading file to the destination"),
                                    "user_name" => optional_string("User under whose privileges upload action will execute"),
                                },
                                ..Default::default()
                            }),
                        },
                        ..Default::default()
                    }),
                    "attributes_match" => NestedBlock::List(Block {
                        description: Description::plain("List of attributes to compare for two events"),
                        attributes: map! {
                            "from" => required_string("First attribute to compare"),
                            "compare" => required_string("Type to compare"),
                            "to" => required_string("Second attribute or value to compare"),
                        },
                        ..Default::default()
                    }),
                    "within" => NestedBlock::List(Block {
                        description: Description::plain("List of events correlated with triggering events"),
                        attributes: map! {
                            "time_interval" => optional_number("Time within which correlated events must occur (seconds)"),
                            "events" => optional_set("Events which must occur within time interval"),
                            "not_events" => optional_set("Events must not occur within time interval"),
                            "trigger_count" => optional_number("Number of occurrences of triggering event"),
                            "trigger_when" => optional_string("To match against occurrences of triggering event"),
                        },
                        ..Default::default()
                    }),
                },
                ..Default::default()
            },
        }
    }
}

impl WithValidate for EventoptionsPolicy {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        validate::no_double_quote(diags, AttributePath::new("name"), &self.name);
        validate::length_between(diags, AttributePath::new("name"), &self.name, 1, 250);
        if set_strings(&self.events).next().is_none() && !self.events.is_unknown() {
            diags.error_short("at least one event is required", AttributePath::new("events"));
        }
        if let Value::Value(events) = &self.events {
            for event in events {
                validate::no_double_quote(diags, AttributePath::new("events"), event);
            }
        }
        match &self.then {
            Value::Value(then) => then.validate(diags),
            Value::Null => diags.error_short("then block is required", AttributePath::new("then")),
            Value::Unknown => {}
        }

        if let Value::Value(matches) = &self.attributes_match {
            let mut seen = Vec::new();
            for (index, matching) in matches.iter().enumerate() {
                let Value::Value(matching) = matching else {
                    continue;
                };
                let path = AttributePath::new("attributes_match").index(index as i64);
                no_space(diags, path.clone().attribute("from"), &matching.from);
                no_space(diags, path.clone().attribute("to"), &matching.to);
                validate::one_of(
                    diags,
                    path.clone().attribute("compare"),
                    &matching.compare,
                    &["equals", "matches", "starts-with"],
                );
                if seen.contains(&matching) {
                    diags.error_short(
                        format!(
                            "multiple attributes_match blocks with the same from {:?}, compare {:?} and to {:?}",
                            matching.from.as_str(),
                            matching.compare.as_str(),
                            matching.to.as_str()
                        ),
                        path,
                    );
                }
                seen.push(matching);
            }
        }

        if let Value::Value(withins) = &self.within {
            let mut intervals = Vec::new();
            for (index, within) in withins.iter().enumerate() {
                let Value::Value(within) = within else {
                    continue;
                };
                let path = AttributePath::new("within").index(index as i64);
                if within.time_interval.is_null() {
                    diags.error_short(
                        "time_interval must be specified in within block",
                        path.clone().attribute("time_interval"),
                    );
                }
                validate::int_between(
                    diags,
                    path.clone().attribute("time_interval"),
                    &within.time_interval,
                    1,
                    604_800,
                );
                if let Value::Value(interval) = &within.time_interval {
                    if intervals.contains(&interval) {
                        diags.error_short(
                            format!("multiple within blocks with the same time_interval {interval}"),
                            path.clone().attribute("time_interval"),
                        );
                    }
                    intervals.push(interval);
                }
                validate::int_between(
                    diags,
                    path.clone().attribute("trigger_count"),
                    &within.trigger_count,
                    0,
                    MAX_U32,
                );
                validate::one_of(
                    diags,
                    path.clone().attribute("trigger_when"),
                    &within.trigger_when,
                    &["after", "on", "until"],
                );
                if within.trigger_count.is_null() != within.trigger_when.is_null() {
                    diags.error_short(
                        "trigger_count and trigger_when must be set together in within block",
                        path.clone().attribute("trigger_when"),
                    );
                }
                if set_strings(&within.events).next().is_none()
                    && set_strings(&within.not_events).next().is_none()
                    && within.trigger_when.is_null()
                    && !within.events.is_unknown()
                    && !within.not_events.is_unknown()
                {
                    diags.error_short(
                        "at least one of events, not_events or trigger_when is required in within block",
                        path,
                    );
                }
            }
        }
    }
}

impl WithNormalize for EventoptionsPolicy {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        normalize_block_list(&mut self.attributes_match);
        normalize_block_list(&mut self.within);
        if let Value::Value(then) = &mut self.then {
            then.normalize();
        }
    }
}

impl JunosResource for EventoptionsPolicy {
    const TYPE_NAME: &'static str = "eventoptions_policy";
    const ID_FORMAT: &'static str = "<name>";

    fn id_mut(&mut self) -> &mut ValueStr {
        &mut self.id
    }

    fn compute_id(&self) -> String {
        self.name.as_str().to_owned()
    }

    fn from_id(id: &str) -> Option<Self> {
        if id.is_empty() {
            return None;
        }
        let mut policy = Self {
            id: value_str(id),
            name: value_str(id),
            ..Default::default()
        };
        normalize_block_list(&mut policy.attributes_match);
        normalize_block_list(&mut policy.within);
        Some(policy)
    }

    fn replace_triggers(&self, prior: &Self) -> Vec<AttributePath> {
        let mut triggers = Vec::new();
        replace_if_changed(&mut triggers, "name", &prior.name, &self.name);
        triggers
    }

    fn config_path(&self) -> String {
        format!("event-options policy {}", quoted(self.name.as_str()))
    }

    fn set_lines(&self) -> Result<Vec<String>> {
        let set_prefix = format!("set {} ", self.config_path());
        let mut lines = Vec::new();

        for event in set_strings(&self.events) {
            lines.push(format!("{set_prefix}events {}", quoted(event)));
        }
        if let Value::Value(then) = &self.then {
            then.set_lines(&mut lines, &set_prefix)?;
        }
        let mut seen = Vec::new();
        for matching in blocks(&self.attributes_match) {
            let line = format!(
                "{set_prefix}attributes-match {} {} {}",
                quoted(matching.from.as_str()),
                matching.compare.as_str(),
                quoted(matching.to.as_str())
            );
            if seen.contains(&line) {
                bail!(
                    "multiple attributes_match blocks with the same from {:?}, compare {:?} and to {:?}",
                    matching.from.as_str(),
                    matching.compare.as_str(),
                    matching.to.as_str()
                );
            }
            seen.push(line.clone());
            lines.push(line);
        }
        let mut intervals = Vec::new();
        for within in blocks(&self.within) {
            if intervals.contains(&within.time_interval) {
                bail!(
                    "multiple within blocks with the same time_interval {}",
                    number(&within.time_interval).unwrap_or_default()
                );
            }
            intervals.push(within.time_interval.clone());
            within.set_lines(&mut lines, &set_prefix)?;
        }
        Ok(lines)
    }

    fn parse_line(&mut self, mut line: &str) -> Result<()> {
        if cut_prefix(&mut line, "events ") {
            insert_str(&mut self.events, trim_quotes(line));
        } else if cut_prefix(&mut line, "then ") {
            block_mut(&mut self.then).parse_line(line)?;
        } else if cut_prefix(&mut line, "attributes-match ") {
            let fields: Vec<&str> = line.split(' ').collect();
            let [from, compare, to, ..] = fields[..] else {
                bail!("can't read values for attributes-match in {line:?}: not enough fields");
            };
            block_mut(&mut self.attributes_match).push(Value::Value(AttributesMatch {
                from: value_str(trim_quotes(from)),
                compare: value_str(compare),
                to: value_str(trim_quotes(to)),
            }));
        } else if cut_prefix(&mut line, "within ") {
            let (interval, rest) = line.split_once(' ').unwrap_or((line, ""));
            let interval = parse_number(interval)?;
            let within =
                list_block_mut(&mut self.within, |within| within.time_interval == interval);
            within.time_interval = interval;
            within.parse_line(rest)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> EventoptionsPolicy {
        let mut policy = EventoptionsPolicy::from_id("policy1").unwrap();
        insert_str(&mut policy.events, "ui_commit");
        insert_str(&mut policy.events, "ui_commit_completed");
        let mut change = ChangeConfiguration::default();
        push_str(&mut change.commands, "set system host-name router1");
        change.commit_options_log = value_str("auto change");
        change.retry_count = Value::Value(2);
        change.retry_interval = Value::Value(10);
        let mut script = EventScript {
            filename: value_str("script.slax"),
            destination: Value::Value(Destination {
                name: value_str("archive"),
                retry_count: Value::Value(3),
                retry_interval: Value::Value(30),
                ..Default::default()
            }),
            output_format: value_str("xml"),
            ..Default::default()
        };
        script.arguments = Value::Value(vec![Value::Value(ScriptArgument {
            name: value_str("mode"),
            value: value_str("fast"),
        })]);
        policy.then = Value::Value(PolicyThen {
            change_configuration: Value::Value(change),
            event_script: Value::Value(vec![Value::Value(script)]),
            raise_trap: flag(true),
            upload: Value::Value(vec![Value::Value(Upload {
                filename: value_str("/var/log/messages"),
                destination: value_str("archive"),
                transfer_delay: Value::Value(5),
                ..Default::default()
            })]),
            ..Default::default()
        });
        policy.attributes_match = Value::Value(vec![Value::Value(AttributesMatch {
            from: value_str("ui_commit.user-name"),
            compare: value_str("equals"),
            to: value_str("admin"),
        })]);
        let mut within = Within {
            time_interval: Value::Value(60),
            trigger_count: Value::Value(2),
            trigger_when: value_str("after"),
            ..Default::default()
        };
        insert_str(&mut within.not_events, "ui_logout");
        policy.within = Value::Value(vec![Value::Value(within)]);
        policy.normalize(&mut Diagnostics::default());
        policy
    }

    #[test]
    fn set_lines() {
        let prefix = "set event-options policy \"policy1\"";
        assert_eq!(
            policy().set_lines().unwrap(),
            vec![
                format!("{prefix} events \"ui_commit\""),
                format!("{prefix} events \"ui_commit_completed\""),
                format!("{prefix} then change-configuration commands \"set system host-name router1\""),
                format!("{prefix} then change-configuration commit-options log \"auto change\""),
                format!("{prefix} then change-configuration retry count 2 interval 10"),
                format!("{prefix} then event-script \"script.slax\""),
                format!("{prefix} then event-script \"script.slax\" arguments \"mode\" \"fast\""),
                format!("{prefix} then event-script \"script.slax\" destination \"archive\""),
                format!("{prefix} then event-script \"script.slax\" destination \"archive\" retry-count 3 retry-interval 30"),
                format!("{prefix} then event-script \"script.slax\" output-format xml"),
                format!("{prefix} then raise-trap"),
                format!("{prefix} then upload filename \"/var/log/messages\" destination \"archive\""),
                format!("{prefix} then upload filename \"/var/log/messages\" destination \"archive\" transfer-delay 5"),
                format!("{prefix} attributes-match \"ui_commit.user-name\" equals \"admin\""),
                format!("{prefix} within 60 not events \"ui_logout\""),
                format!("{prefix} within 60 trigger after 2"),
            ]
        );

        let mut empty_within = policy();
        empty_within.within = Value::Value(vec![Value::Value(Within {
            time_interval: Value::Value(30),
            ..Default::default()
        })]);
        assert!(empty_within.set_lines().is_err());
    }

    #[test]
    fn parse_lines() {
        let mut state = EventoptionsPolicy::from_id("policy1").unwrap();
        for line in [
            "events ui_commit",
            "events ui_commit_completed",
            "then change-configuration commands \"set system host-name router1\"",
            "then change-configuration commit-options log \"auto change\"",
            "then change-configuration retry count 2",
            "then change-configuration retry interval 10",
            "then event-script script.slax arguments mode fast",
            "then event-script script.slax destination archive retry-count 3 retry-interval 30",
            "then event-script script.slax output-format xml",
            "then raise-trap",
            "then upload filename /var/log/messages destination archive transfer-delay 5",
            "attributes-match ui_commit.user-name equals admin",
            "within 60 trigger after",
            "within 60 trigger 2",
            "within 60 not events ui_logout",
        ] {
            state.parse_line(line).unwrap();
        }
        state.normalize(&mut Diagnostics::default());
        assert_eq!(state, policy());

        assert!(state.parse_line("attributes-match ui_commit equals").is_err());
        assert!(state.parse_line("then upload filename /tmp/x").is_err());
    }

    #[test]
    fn validation() {
        let mut diags = Diagnostics::default();
        policy().validate(&mut diags, AttributePath::default());
        assert!(diags.errors.is_empty(), "{:?}", diags.errors);

        let mut config = policy();
        config.events = Value::Null;
        if let Value::Value(then) = &mut config.then {
            then.ignore = flag(true);
            then.priority_override_severity = value_str("debug");
            if let Value::Value(change) = &mut then.change_configuration {
                change.retry_interval = Value::Null;
                change.commit_options_check_synchronize = flag(true);
            }
        }
        if let Value::Value(withins) = &mut config.within {
            withins.push(Value::Value(Within {
                time_interval: Value::Value(60),
                ..Default::default()
            }));
        }
        let mut diags = Diagnostics::default();
        config.validate(&mut diags, AttributePath::default());
        // events, ignore with change_configuration, event_script, severity, raise_trap and upload,
        // severity value, retry_interval, check_synchronize, duplicate within, empty within
        assert_eq!(diags.errors.len(), 11, "{:?}", diags.errors);

        let mut diags = Diagnostics::default();
        EventoptionsPolicy::from_id("policy2")
            .unwrap()
            .validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 2);
    }
}
