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

//! Attribute validators, each one reporting into the diagnostics at the given path.
//!
//! Null and unknown values are never reported.

use std::net::IpAddr;

use ipnet::IpNet;
use regex::Regex;
use tf_provider::{value::ValueNumber, AttributePath, Diagnostics, Value};

use crate::utils::{ValueBool, ValueStr};

/// Characters allowed in a Junos object name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameFormat {
    /// Letters, digits, `-` and `_`
    Default,
    /// Also `:`, `.` and `/`
    AddressName,
}

impl NameFormat {
    fn accepts(self, c: char) -> bool {
        c.is_ascii_alphanumeric()
            || c == '-'
            || c == '_'
            || match self {
                NameFormat::Default => false,
                NameFormat::AddressName => matches!(c, ':' | '.' | '/'),
            }
    }
}

fn known(value: &ValueStr) -> Option<&str> {
    match value {
        Value::Value(value) => Some(value.as_ref()),
        _ => None,
    }
}

pub fn name_object(
    diags: &mut Diagnostics,
    attr_path: AttributePath,
    value: &ValueStr,
    max_length: usize,
    format: NameFormat,
    exclude: &[&str],
) {
    let Some(value) = known(value) else {
        return;
    };
    if value.is_empty() || value.chars().count() > max_length {
        diags.error_short(
            format!("{value:?} invalid name (length must be 1 to {max_length})"),
            attr_path.clone(),
        );
    }
    if !value.chars().all(|c| format.accepts(c)) {
        diags.error_short(
            format!("{value:?} invalid name (bad character)"),
            attr_path.clone(),
        );
    }
    if exclude.contains(&value) {
        diags.error_short(
            format!(
                "expected value to not be one of [{}], got {value:?}",
                exclude.join(", ")
            ),
            attr_path,
        );
    }
}

/// Network address with prefix length and no host bits, like `192.0.2.0/24`
pub fn cidr_network(diags: &mut Diagnostics, attr_path: AttributePath, value: &ValueStr) {
    let Some(value) = known(value) else {
        return;
    };
    match value.parse::<IpNet>() {
        Ok(net) if net.trunc() == net => (),
        Ok(_) => diags.error_short(
            format!("{value:?} is not a valid network CIDR"),
            attr_path,
        ),
        Err(_) => diags.error_short(format!("{value:?} is not a valid CIDR"), attr_path),
    }
}

pub fn ip_address(diags: &mut Diagnostics, attr_path: AttributePath, value: &ValueStr) {
    let Some(value) = known(value) else {
        return;
    };
    if value.parse::<IpAddr>().is_err() {
        diags.error_short(format!("{value:?} is not a valid IP address"), attr_path);
    }
}

pub fn ipv4_address(diags: &mut Diagnostics, attr_path: AttributePath, value: &ValueStr) {
    let Some(value) = known(value) else {
        return;
    };
    if !matches!(value.parse::<IpAddr>(), Ok(IpAddr::V4(_))) {
        diags.error_short(format!("{value:?} is not a valid IPv4 address"), attr_path);
    }
}

/// DNS name made of lowercase letters, digits, `-` and `.`
pub fn dns_address(diags: &mut Diagnostics, attr_path: AttributePath, value: &ValueStr) {
    let Some(value) = known(value) else {
        return;
    };
    if !value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        diags.error_short(format!("{value:?} invalid address (bad character)"), attr_path);
    }
}

pub fn one_of(
    diags: &mut Diagnostics,
    attr_path: AttributePath,
    value: &ValueStr,
    allowed: &[&str],
) {
    let Some(value) = known(value) else {
        return;
    };
    if !allowed.contains(&value) {
        diags.error_short(
            format!(
                "expected value to be one of [{}], got {value:?}",
                allowed.join(", ")
            ),
            attr_path,
        );
    }
}

pub fn length_between(
    diags: &mut Diagnostics,
    attr_path: AttributePath,
    value: &ValueStr,
    min: usize,
    max: usize,
) {
    let Some(value) = known(value) else {
        return;
    };
    let length = value.chars().count();
    if length < min || length > max {
        diags.error_short(
            format!("expected length to be in the range ({min} - {max}), got {length}"),
            attr_path,
        );
    }
}

pub fn int_between(
    diags: &mut Diagnostics,
    attr_path: AttributePath,
    value: &ValueNumber,
    min: i64,
    max: i64,
) {
    if let Value::Value(value) = value {
        if !(min..=max).contains(value) {
            diags.error_short(
                format!("expected to be in the range ({min} - {max}), got {value}"),
                attr_path,
            );
        }
    }
}

pub fn regex(diags: &mut Diagnostics, attr_path: AttributePath, value: &ValueStr) {
    let Some(value) = known(value) else {
        return;
    };
    if let Err(err) = Regex::new(value) {
        diags.error(
            format!("{value:?} is not a valid regular expression"),
            err.to_string(),
            attr_path,
        );
    }
}

/// Digits with an optional `k`, `m` or `g` unit
pub fn is_bandwidth(value: &str) -> bool {
    let digits = value.strip_suffix(['k', 'm', 'g']).unwrap_or(value);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Boolean statements only accept `true`, removing the attribute disables them
pub fn bool_true(diags: &mut Diagnostics, attr_path: AttributePath, value: &ValueBool) {
    if let Value::Value(false) = value {
        diags.error_short(
            "only true is accepted, remove the attribute instead of setting false",
            attr_path,
        );
    }
}

pub fn no_double_quote(diags: &mut Diagnostics, attr_path: AttributePath, value: &ValueStr) {
    let Some(value) = known(value) else {
        return;
    };
    if value.contains('"') {
        diags.error_short(format!("{value:?} contains a double quote"), attr_path);
    }
}

pub fn matches(
    diags: &mut Diagnostics,
    attr_path: AttributePath,
    value: &ValueStr,
    check: impl Fn(&str) -> bool,
    expected: &str,
) {
    let Some(value) = known(value) else {
        return;
    };
    if !check(value) {
        diags.error_short(format!("{value:?} must be {expected}"), attr_path);
    }
}

/// Report `name` when both values are set
pub fn conflicts(
    diags: &mut Diagnostics,
    attr_path: AttributePath,
    name: &str,
    other: &str,
    set: bool,
    other_set: bool,
) {
    if set && other_set {
        diags.error_short(format!("{name} and {other} can't be set together"), attr_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::value_str;

    fn errors(check: impl FnOnce(&mut Diagnostics)) -> usize {
        let mut diags = Diagnostics::default();
        check(&mut diags);
        diags.errors.len()
    }

    #[test]
    fn names() {
        let path = || AttributePath::new("name");
        assert_eq!(
            errors(|d| name_object(d, path(), &value_str("peer_1-a"), 63, NameFormat::Default, &[])),
            0
        );
        assert_eq!(
            errors(|d| name_object(d, path(), &value_str("a.b"), 63, NameFormat::Default, &[])),
            1
        );
        assert_eq!(
            errors(|d| name_object(
                d,
                path(),
                &value_str("2001:db8::/32"),
                63,
                NameFormat::AddressName,
                &[]
            )),
            0
        );
        assert_eq!(
            errors(|d| name_object(d, path(), &value_str(&"x".repeat(64)), 63, NameFormat::Default, &[])),
            1
        );
        assert_eq!(
            errors(|d| name_object(d, path(), &value_str("all"), 63, NameFormat::Default, &["all"])),
            1
        );
        assert_eq!(
            errors(|d| name_object(d, path(), &Value::Unknown, 63, NameFormat::Default, &[])),
            0
        );
    }

    #[test]
    fn networks_and_addresses() {
        let path = || AttributePath::new("value");
        assert_eq!(errors(|d| cidr_network(d, path(), &value_str("192.0.2.0/24"))), 0);
        assert_eq!(errors(|d| cidr_network(d, path(), &value_str("192.0.2.1/24"))), 1);
        assert_eq!(errors(|d| cidr_network(d, path(), &value_str("192.0.2.1"))), 1);
        assert_eq!(errors(|d| cidr_network(d, path(), &value_str("2001:db8::/32"))), 0);
        assert_eq!(errors(|d| ip_address(d, path(), &value_str("2001:db8::1"))), 0);
        assert_eq!(errors(|d| ipv4_address(d, path(), &value_str("2001:db8::1"))), 1);
        assert_eq!(errors(|d| dns_address(d, path(), &value_str("www.example.com"))), 0);
        assert_eq!(errors(|d| dns_address(d, path(), &value_str("WWW.example.com"))), 1);
    }

    #[test]
    fn ranges_and_choices() {
        let path = || AttributePath::new("mode");
        assert_eq!(
            errors(|d| one_of(d, path(), &value_str("shared"), &["point-to-point", "shared"])),
            0
        );
        assert_eq!(
            errors(|d| one_of(d, path(), &value_str("p2p"), &["point-to-point", "shared"])),
            1
        );
        assert_eq!(errors(|d| int_between(d, path(), &Value::Value(241), 0, 240)), 1);
        assert_eq!(errors(|d| int_between(d, path(), &Value::Value(240), 0, 240)), 0);
        assert_eq!(errors(|d| length_between(d, path(), &value_str(""), 1, 900)), 1);
        assert_eq!(errors(|d| regex(d, path(), &value_str("^ge-0/0/[0-9]+$"))), 0);
        assert_eq!(errors(|d| regex(d, path(), &value_str("ge-("))), 1);
        assert_eq!(errors(|d| conflicts(d, path(), "a", "b", true, true)), 1);
        assert_eq!(errors(|d| conflicts(d, path(), "a", "b", true, false)), 0);
        assert_eq!(errors(|d| bool_true(d, path(), &Value::Value(false))), 1);
        assert_eq!(errors(|d| bool_true(d, path(), &Value::Value(true))), 0);
        assert_eq!(errors(|d| no_double_quote(d, path(), &value_str("a\"b"))), 1);
        assert_eq!(
            errors(|d| matches(d, path(), &value_str("50k"), is_bandwidth, "a bandwidth")),
            0
        );
        assert_eq!(
            errors(|d| matches(d, path(), &value_str("50kb"), is_bandwidth, "a bandwidth")),
            1
        );
        assert!(is_bandwidth("1500"));
        assert!(!is_bandwidth("k"));
    }
}
