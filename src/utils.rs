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

use std::borrow::Cow;
use std::collections::BTreeSet;

use tf_provider::{
    schema::{Attribute, AttributeConstraint, AttributeType, Description},
    value::{ValueList, ValueNumber, ValueSet, ValueString},
    AttributePath, Diagnostics, Schema, Value,
};

/// String value owning its content, as stored in every resource state
pub type ValueStr = ValueString<'static>;
pub type ValueBool = Value<bool>;

pub(crate) trait WithSchema {
    fn schema() -> Schema;
}

pub(crate) trait WithValidate {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath);
}

pub(crate) trait WithNormalize {
    fn normalize(&mut self, diags: &mut Diagnostics);
}

pub fn value_str(value: impl Into<String>) -> ValueStr {
    Value::Value(Cow::Owned(value.into()))
}

pub fn is_true(value: &ValueBool) -> bool {
    matches!(value, Value::Value(true))
}

/// `true` when the statement is present, null otherwise
pub fn flag(present: bool) -> ValueBool {
    if present {
        Value::Value(true)
    } else {
        Value::Null
    }
}

/// Known and non-empty string
pub fn non_empty(value: &ValueStr) -> Option<&str> {
    match value {
        Value::Value(value) if !value.is_empty() => Some(value.as_ref()),
        _ => None,
    }
}

pub fn number(value: &ValueNumber) -> Option<i64> {
    match value {
        Value::Value(value) => Some(*value),
        _ => None,
    }
}

pub fn parse_number(value: &str) -> anyhow::Result<ValueNumber> {
    value
        .trim()
        .parse()
        .map(Value::Value)
        .map_err(|_| anyhow::anyhow!("unable to parse {value:?} as a number"))
}

/// Known strings of a list, skipping null and unknown items
pub fn strings<'b>(list: &'b ValueList<ValueStr>) -> impl Iterator<Item = &'b str> {
    list.iter().flatten().filter_map(non_empty)
}

pub fn set_strings<'b>(set: &'b ValueSet<ValueStr>) -> impl Iterator<Item = &'b str> {
    set.iter().flatten().filter_map(non_empty)
}

pub fn push_str(list: &mut ValueList<ValueStr>, value: &str) {
    if !matches!(list, Value::Value(_)) {
        *list = Value::Value(Vec::new());
    }
    if let Value::Value(list) = list {
        list.push(value_str(value));
    }
}

pub fn insert_str(set: &mut ValueSet<ValueStr>, value: &str) {
    if !matches!(set, Value::Value(_)) {
        *set = Value::Value(BTreeSet::new());
    }
    if let Value::Value(set) = set {
        set.insert(value_str(value));
    }
}

/// Inner value of a single block, created empty when missing
pub fn block_mut<T: Default>(block: &mut Value<T>) -> &mut T {
    match block {
        Value::Value(inner) => inner,
        _ => {
            *block = Value::Value(T::default());
            block_mut(block)
        }
    }
}

/// Blocks of a known list, skipping null and unknown elements
pub fn blocks<T>(list: &ValueList<Value<T>>) -> impl Iterator<Item = &T> {
    list.iter().flatten().flatten()
}

pub fn set_blocks<T>(set: &ValueSet<Value<T>>) -> impl Iterator<Item = &T> {
    set.iter().flatten().flatten()
}

/// Block of a list matching `is_key`, appended empty when missing
pub fn list_block_mut<T: Default>(
    list: &mut ValueList<Value<T>>,
    is_key: impl Fn(&T) -> bool,
) -> &mut T {
    let list = block_mut(list);
    let position = list
        .iter()
        .position(|block| matches!(block, Value::Value(block) if is_key(block)));
    let index = match position {
        Some(index) => index,
        None => {
            list.push(Value::Value(T::default()));
            list.len() - 1
        }
    };
    block_mut(&mut list[index])
}

/// Apply `update` to the block of a set matching `is_key`, `false` when there is none
pub fn update_set_block<T: Ord + Clone>(
    set: &mut ValueSet<Value<T>>,
    is_key: impl Fn(&T) -> bool,
    update: impl FnOnce(&mut T),
) -> bool {
    let Value::Value(set) = set else {
        return false;
    };
    let current = set.iter().find_map(|block| match block {
        Value::Value(block) if is_key(block) => Some(block.clone()),
        _ => None,
    });
    let Some(mut block) = current else {
        return false;
    };
    set.remove(&Value::Value(block.clone()));
    update(&mut block);
    set.insert(Value::Value(block));
    true
}

/// Same as [`update_set_block`], starting from a default block when none matches
pub fn upsert_set_block<T: Ord + Clone + Default>(
    set: &mut ValueSet<Value<T>>,
    is_key: impl Fn(&T) -> bool,
    update: impl Fn(&mut T),
) {
    if !update_set_block(set, is_key, &update) {
        let mut block = T::default();
        update(&mut block);
        block_mut(set).insert(Value::Value(block));
    }
}

/// Block lists are never null in state
pub fn normalize_block_list<T>(list: &mut ValueList<Value<T>>) {
    if list.is_null() {
        *list = Value::Value(Vec::new());
    }
}

/// Record `name` as a replacement trigger when its value changed
pub fn replace_if_changed<T: PartialEq>(
    triggers: &mut Vec<AttributePath>,
    name: &'static str,
    prior: &T,
    planned: &T,
) {
    if prior != planned {
        triggers.push(AttributePath::new(name));
    }
}

fn attribute(
    attr_type: AttributeType,
    constraint: AttributeConstraint,
    description: &'static str,
) -> Attribute {
    Attribute {
        attr_type,
        description: Description::plain(description),
        constraint,
        sensitive: false,
        deprecated: false,
    }
}

pub fn id_attribute() -> Attribute {
    attribute(
        AttributeType::String,
        AttributeConstraint::Computed,
        "An identifier for the resource",
    )
}

pub fn required_string(description: &'static str) -> Attribute {
    attribute(
        AttributeType::String,
        AttributeConstraint::Required,
        description,
    )
}

pub fn optional_string(description: &'static str) -> Attribute {
    attribute(
        AttributeType::String,
        AttributeConstraint::Optional,
        description,
    )
}

/// Optional string filled with a default value when unset
pub fn defaulted_string(description: &'static str) -> Attribute {
    attribute(
        AttributeType::String,
        AttributeConstraint::OptionalComputed,
        description,
    )
}

pub fn computed_string(description: &'static str) -> Attribute {
    attribute(
        AttributeType::String,
        AttributeConstraint::Computed,
        description,
    )
}

pub fn sensitive_string(description: &'static str) -> Attribute {
    Attribute {
        sensitive: true,
        ..optional_string(description)
    }
}

pub fn optional_bool(description: &'static str) -> Attribute {
    attribute(
        AttributeType::Bool,
        AttributeConstraint::Optional,
        description,
    )
}

pub fn optional_number(description: &'static str) -> Attribute {
    attribute(
        AttributeType::Number,
        AttributeConstraint::Optional,
        description,
    )
}

pub fn required_list(description: &'static str) -> Attribute {
    attribute(
        AttributeType::List(Box::new(AttributeType::String)),
        AttributeConstraint::Required,
        description,
    )
}

pub fn optional_list(description: &'static str) -> Attribute {
    attribute(
        AttributeType::List(Box::new(AttributeType::String)),
        AttributeConstraint::Optional,
        description,
    )
}

pub fn optional_set(description: &'static str) -> Attribute {
    attribute(
        AttributeType::Set(Box::new(AttributeType::String)),
        AttributeConstraint::Optional,
        description,
    )
}

pub fn computed_list(attr_type: AttributeType, description: &'static str) -> Attribute {
    attribute(
        AttributeType::List(Box::new(attr_type)),
        AttributeConstraint::Computed,
        description,
    )
}
