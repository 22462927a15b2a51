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

use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use lazy_static::lazy_static;

const MAGIC: &str = "$9$";
const FAMILY: [&str; 4] = [
    "QzF3n6/9CAtpu0O",
    "B1IREhcSyrleKvMW8LXx",
    "7N-dVbwsY2g4oaJZGUDj",
    "iHkq.mPf5T",
];
const ENCODING: [&[i64]; 7] = [
    &[1, 4, 32],
    &[1, 16, 32],
    &[1, 8, 32],
    &[1, 64],
    &[1, 32],
    &[1, 4, 16, 128],
    &[1, 32, 64],
];

lazy_static! {
    static ref NUM_ALPHA: Vec<char> = FAMILY.concat().chars().collect();
    static ref ALPHA_NUM: HashMap<char, i64> = NUM_ALPHA
        .iter()
        .enumerate()
        .map(|(i, c)| (*c, i as i64))
        .collect();
    static ref EXTRA: HashMap<char, usize> = FAMILY
        .iter()
        .enumerate()
        .flat_map(|(i, family)| family.chars().map(move |c| (c, 3 - i)))
        .collect();
}

/// Decode a secret stored by Junos with the `$9$` obfuscation
pub fn decode_junos_secret(encoded: &str) -> Result<String> {
    let Some(chars) = encoded.strip_prefix(MAGIC) else {
        bail!("{encoded:?} is not a $9$ encoded secret");
    };
    let chars: Vec<char> = chars.chars().collect();
    let Some(&first) = chars.first() else {
        bail!("$9$ secret is empty");
    };
    let toss = *EXTRA
        .get(&first)
        .ok_or_else(|| anyhow!("bad character {first:?} in $9$ secret"))?;
    let mut remaining = chars
        .get(1 + toss..)
        .ok_or_else(|| anyhow!("$9$ secret is too short"))?;

    let mut prev = first;
    let mut decoded = String::new();
    let mut position = 0;
    while !remaining.is_empty() {
        let weights = ENCODING[position % ENCODING.len()];
        if remaining.len() < weights.len() {
            bail!("$9$ secret has a truncated trailing group");
        }
        let (nibble, rest) = remaining.split_at(weights.len());
        remaining = rest;

        let mut value = 0;
        for (c, weight) in nibble.iter().zip(weights.iter()) {
            value += gap(prev, *c)? * weight;
            prev = *c;
        }
        decoded.push(char::from(value.rem_euclid(256) as u8));
        position += 1;
    }

    Ok(decoded)
}

fn gap(from: char, to: char) -> Result<i64> {
    let index = |c: char| {
        ALPHA_NUM
            .get(&c)
            .copied()
            .ok_or_else(|| anyhow!("bad character {c:?} in $9$ secret"))
    };
    Ok((index(to)? - index(from)?).rem_euclid(NUM_ALPHA.len() as i64) - 1)
}

#[cfg(test)]
mod tests {
    use super::decode_junos_secret;

    #[test]
    fn decode_known_secrets() {
        assert_eq!(
            decode_junos_secret("$9$Qabcz9pIRSeMXcylMXxws4aZ").unwrap(),
            "testacc"
        );
        assert_eq!(
            decode_junos_secret("$9$HmQ39ApB1h/COREcMWLx7VsgGUHqfz").unwrap(),
            "S3cret!Key"
        );
    }

    #[test]
    fn reject_malformed_secrets() {
        assert!(decode_junos_secret("plain-text").is_err());
        assert!(decode_junos_secret("$9$").is_err());
        assert!(decode_junos_secret("$9$Qab").is_err());
        assert!(decode_junos_secret("$9$Qabcz9").is_err());
    }
}
