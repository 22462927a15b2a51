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

use super::SET_LINE_START;

const XML_START_TAG_CONFIG_OUT: &str = "<configuration-output>";
const XML_END_TAG_CONFIG_OUT: &str = "</configuration-output>";

/// Iterate over the statements of a `display set relative` output,
/// each one stripped of its leading `set `.
pub fn config_lines(show_config: &str) -> impl Iterator<Item = &str> {
    show_config
        .lines()
        .take_while(|line| !line.contains(XML_END_TAG_CONFIG_OUT))
        .filter(|line| !line.contains(XML_START_TAG_CONFIG_OUT))
        .map(str::trim_end)
        .map(|line| match line.strip_prefix(SET_LINE_START) {
            Some(rest) => rest,
            None if line == "set" => "",
            None => line,
        })
        .filter(|line| !line.is_empty())
}

/// Remove `prefix` from `item` if present, and report whether it was.
pub fn cut_prefix(item: &mut &str, prefix: &str) -> bool {
    match item.strip_prefix(prefix) {
        Some(rest) => {
            *item = rest;
            true
        }
        None => false,
    }
}

/// Remove `suffix` from `item` if present, and report whether it was.
pub fn cut_suffix(item: &mut &str, suffix: &str) -> bool {
    match item.strip_suffix(suffix) {
        Some(rest) => {
            *item = rest;
            true
        }
        None => false,
    }
}

pub fn trim_quotes(value: &str) -> &str {
    value.trim_matches('"')
}

pub fn quoted(value: &str) -> String {
    format!("\"{value}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_lines_strip_set_and_skip_tags() {
        let output = "<configuration-output>\nset members 65000:100\nset invert-match\nset\n\n</configuration-output>\nset ignored\n";
        let lines: Vec<_> = config_lines(output).collect();
        assert_eq!(lines, vec!["members 65000:100", "invert-match"]);
    }

    #[test]
    fn config_lines_without_tags() {
        let lines: Vec<_> = config_lines("set then discard\r\nset filter-specific").collect();
        assert_eq!(lines, vec!["then discard", "filter-specific"]);
    }

    #[test]
    fn cut_prefix_only_on_match() {
        let mut item = "if-exceeding burst-size-limit 50k";
        assert!(!cut_prefix(&mut item, "then "));
        assert!(cut_prefix(&mut item, "if-exceeding "));
        assert_eq!(item, "burst-size-limit 50k");
    }

    #[test]
    fn cut_suffix_dns_name() {
        let mut item = "www.example.com ipv4-only";
        assert!(cut_suffix(&mut item, " ipv4-only"));
        assert_eq!(item, "www.example.com");
        assert!(!cut_suffix(&mut item, " ipv6-only"));
    }

    #[test]
    fn quotes() {
        assert_eq!(quoted("a b"), "\"a b\"");
        assert_eq!(trim_quotes("\"a b\""), "a b");
        assert_eq!(trim_quotes("plain"), "plain");
    }
}
