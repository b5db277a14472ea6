//! Terraform Schema Types
//!
//! Declarative attribute and block definitions consumed by the host, plus the
//! config-side passes the dispatcher runs over them: normalization, defaults,
//! validation, computed carry-over and replacement detection.

use crate::protocol::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Attribute type for schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Number,
    Bool,
    List(Box<AttributeType>),
    Set(Box<AttributeType>),
    Map(Box<AttributeType>),
    Object(BTreeMap<String, AttributeType>),
}

/// Schema attribute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaAttribute {
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub sensitive: bool,
    /// Changing the value destroys and recreates the remote object.
    #[serde(default)]
    pub force_new: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
}

impl SchemaAttribute {
    fn of(attr_type: AttributeType) -> Self {
        Self {
            attr_type,
            description: None,
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            force_new: false,
            default: None,
            allowed_values: None,
        }
    }

    pub fn string() -> Self {
        Self::of(AttributeType::String)
    }

    pub fn number() -> Self {
        Self::of(AttributeType::Number)
    }

    pub fn bool() -> Self {
        Self::of(AttributeType::Bool)
    }

    pub fn list(element_type: AttributeType) -> Self {
        Self::of(AttributeType::List(Box::new(element_type)))
    }

    pub fn set(element_type: AttributeType) -> Self {
        Self::of(AttributeType::Set(Box::new(element_type)))
    }

    pub fn map(element_type: AttributeType) -> Self {
        Self::of(AttributeType::Map(Box::new(element_type)))
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Restrict a string attribute to a fixed set of values.
    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.allowed_values = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }

    fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

/// Block type for nested blocks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaBlock {
    pub attributes: BTreeMap<String, SchemaAttribute>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub blocks: BTreeMap<String, NestedBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SchemaBlock {
    pub fn new() -> Self {
        Self {
            attributes: BTreeMap::new(),
            blocks: BTreeMap::new(),
            description: None,
        }
    }

    pub fn with_attribute(mut self, name: &str, attr: SchemaAttribute) -> Self {
        self.attributes.insert(name.to_string(), attr);
        self
    }

    pub fn with_block(mut self, name: &str, block: NestedBlock) -> Self {
        self.blocks.insert(name.to_string(), block);
        self
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    /// Bring a raw config object into canonical shape: every attribute and
    /// block present, list/set blocks always arrays (a bare object becomes a
    /// one-element list), unknown keys dropped.
    pub fn normalize(&self, config: &Value) -> Map<String, Value> {
        let empty = Map::new();
        let source = config.as_object().unwrap_or(&empty);
        let mut out = Map::new();

        for name in self.attributes.keys() {
            let value = source.get(name).cloned().unwrap_or(Value::Null);
            out.insert(name.clone(), value);
        }

        for (name, nested) in &self.blocks {
            let raw = source.get(name).unwrap_or(&Value::Null);
            out.insert(name.clone(), nested.normalize(raw));
        }

        out
    }

    /// Fill schema defaults into null attributes, recursively.
    pub fn apply_defaults(&self, obj: &mut Map<String, Value>) {
        for (name, attr) in &self.attributes {
            if let Some(default) = &attr.default {
                let slot = obj.entry(name.clone()).or_insert(Value::Null);
                if slot.is_null() {
                    *slot = default.clone();
                }
            }
        }

        for (name, nested) in &self.blocks {
            if let Some(value) = obj.get_mut(name) {
                nested.for_each_element_mut(value, |element| nested.block.apply_defaults(element));
            }
        }
    }

    /// Validate raw config as written by the user. Unknown top-level keys are
    /// kept so they can be reported.
    pub fn validate_config(&self, raw: &Value) -> Vec<Diagnostic> {
        let mut obj = self.normalize(raw);
        if let Some(source) = raw.as_object() {
            for (key, value) in source {
                obj.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        self.validate(&obj, &[])
    }

    /// Validate a normalized config object.
    pub fn validate(&self, obj: &Map<String, Value>, path: &[String]) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        for key in obj.keys() {
            if key != "id" && !self.attributes.contains_key(key) && !self.blocks.contains_key(key)
            {
                diagnostics.push(
                    Diagnostic::error("Unsupported argument")
                        .with_detail(&format!("An argument named {:?} is not expected here", key))
                        .with_attribute(child_path(path, key)),
                );
            }
        }

        for (name, attr) in &self.attributes {
            let value = obj.get(name).unwrap_or(&Value::Null);

            if attr.required && value.is_null() {
                diagnostics.push(
                    Diagnostic::error("Missing required argument")
                        .with_detail(&format!("The argument {:?} is required", name))
                        .with_attribute(child_path(path, name)),
                );
                continue;
            }

            if attr.is_computed_only() && !value.is_null() {
                diagnostics.push(
                    Diagnostic::error("Value for unconfigurable attribute")
                        .with_detail(&format!("{:?} is computed and cannot be set", name))
                        .with_attribute(child_path(path, name)),
                );
            }

            if let (Some(allowed), Some(actual)) = (&attr.allowed_values, value.as_str()) {
                if !allowed.iter().any(|a| a == actual) {
                    diagnostics.push(
                        Diagnostic::error("Invalid value")
                            .with_detail(&format!(
                                "expected {} to be one of {:?}, got {}",
                                name, allowed, actual
                            ))
                            .with_attribute(child_path(path, name)),
                    );
                }
            }
        }

        for (name, nested) in &self.blocks {
            let value = obj.get(name).unwrap_or(&Value::Null);
            let count = nested.element_count(value);
            let block_path = child_path(path, name);

            if let Some(min) = nested.min_items {
                if (count as i64) < min {
                    diagnostics.push(
                        Diagnostic::error("Insufficient blocks")
                            .with_detail(&format!(
                                "At least {} {:?} block(s) are required",
                                min, name
                            ))
                            .with_attribute(block_path.clone()),
                    );
                }
            }

            if let Some(max) = nested.max_items {
                if (count as i64) > max {
                    diagnostics.push(
                        Diagnostic::error("Too many blocks")
                            .with_detail(&format!("No more than {} {:?} block(s) are allowed", max, name))
                            .with_attribute(block_path.clone()),
                    );
                }
            }

            for (index, element) in nested.elements(value) {
                let element_path = child_path(&block_path, &index);
                diagnostics.extend(nested.block.validate(element, &element_path));
            }
        }

        diagnostics
    }

    /// Copy computed values the plan leaves unset from the prior state.
    pub fn carry_computed(&self, prior: &Map<String, Value>, planned: &mut Map<String, Value>) {
        for (name, attr) in &self.attributes {
            if !attr.computed {
                continue;
            }
            let slot = planned.entry(name.clone()).or_insert(Value::Null);
            if slot.is_null() {
                if let Some(previous) = prior.get(name) {
                    *slot = previous.clone();
                }
            }
        }

        for (name, nested) in &self.blocks {
            let (Some(Value::Array(before)), Some(Value::Array(after))) =
                (prior.get(name), planned.get_mut(name))
            else {
                continue;
            };

            if nested.max_items == Some(1) {
                if let (Some(old), Some(new)) = (
                    before.first().and_then(Value::as_object),
                    after.first_mut().and_then(Value::as_object_mut),
                ) {
                    nested.block.carry_computed(old, new);
                }
                continue;
            }

            // list elements only inherit from a prior element with the same
            // configured values, wherever it sits in the list
            let mut taken = vec![false; before.len()];
            for new in after.iter_mut().filter_map(Value::as_object_mut) {
                let matched = before.iter().enumerate().find_map(|(i, old)| {
                    let old = old.as_object()?;
                    (!taken[i] && nested.block.same_configured(old, new)).then_some((i, old))
                });
                if let Some((i, old)) = matched {
                    taken[i] = true;
                    nested.block.carry_computed(old, new);
                }
            }
        }
    }

    fn same_configured(&self, a: &Map<String, Value>, b: &Map<String, Value>) -> bool {
        let value =
            |m: &Map<String, Value>, name: &str| m.get(name).cloned().unwrap_or(Value::Null);
        let attributes_match = self
            .attributes
            .iter()
            .filter(|(_, attr)| !attr.computed)
            .all(|(name, _)| value(a, name) == value(b, name));

        attributes_match
            && self.blocks.iter().all(|(name, nested)| {
                let empty = Vec::new();
                let left = a.get(name).and_then(Value::as_array).unwrap_or(&empty);
                let right = b.get(name).and_then(Value::as_array).unwrap_or(&empty);
                left.len() == right.len()
                    && left.iter().zip(right).all(|(l, r)| match (l.as_object(), r.as_object()) {
                        (Some(l), Some(r)) => nested.block.same_configured(l, r),
                        _ => l == r,
                    })
            })
    }

    /// Attribute paths whose change forces the object to be replaced.
    pub fn requires_replace(
        &self,
        prior: &Map<String, Value>,
        planned: &Map<String, Value>,
    ) -> Vec<Vec<String>> {
        let mut paths = Vec::new();
        self.collect_replacements(prior, planned, &[], &mut paths);
        paths
    }

    fn collect_replacements(
        &self,
        prior: &Map<String, Value>,
        planned: &Map<String, Value>,
        path: &[String],
        out: &mut Vec<Vec<String>>,
    ) {
        for (name, attr) in &self.attributes {
            if attr.force_new && value_at(prior, name) != value_at(planned, name) {
                out.push(child_path(path, name));
            }
        }

        for (name, nested) in &self.blocks {
            let before = value_at(prior, name);
            let after = value_at(planned, name);
            let block_path = child_path(path, name);

            if nested.force_new {
                if before != after {
                    out.push(block_path);
                }
                continue;
            }

            if let (Value::Array(before), Value::Array(after)) = (before, after) {
                for (index, (old, new)) in before.iter().zip(after.iter()).enumerate() {
                    if let (Some(old), Some(new)) = (old.as_object(), new.as_object()) {
                        let element_path = child_path(&block_path, &index.to_string());
                        nested.block.collect_replacements(old, new, &element_path, out);
                    }
                }
            }
        }
    }

    /// Copy of `obj` with sensitive values masked, for logging.
    pub fn redact(&self, obj: &Map<String, Value>) -> Value {
        let mut out = obj.clone();
        for (name, attr) in &self.attributes {
            if attr.sensitive {
                if let Some(slot) = out.get_mut(name) {
                    if !slot.is_null() {
                        *slot = Value::String("(sensitive value)".to_string());
                    }
                }
            }
        }
        Value::Object(out)
    }
}

impl Default for SchemaBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// Nested block type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NestedBlock {
    pub nesting_mode: NestingMode,
    pub block: SchemaBlock,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<i64>,
    #[serde(default)]
    pub force_new: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestingMode {
    Single,
    List,
    Set,
    Map,
}

impl NestedBlock {
    pub fn new(nesting_mode: NestingMode, block: SchemaBlock) -> Self {
        Self {
            nesting_mode,
            block,
            min_items: None,
            max_items: None,
            force_new: false,
        }
    }

    pub fn list(block: SchemaBlock) -> Self {
        Self::new(NestingMode::List, block)
    }

    pub fn set(block: SchemaBlock) -> Self {
        Self::new(NestingMode::Set, block)
    }

    pub fn with_min_items(mut self, min: i64) -> Self {
        self.min_items = Some(min);
        self
    }

    pub fn with_max_items(mut self, max: i64) -> Self {
        self.max_items = Some(max);
        self
    }

    pub fn required(self) -> Self {
        self.with_min_items(1)
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    fn normalize(&self, raw: &Value) -> Value {
        match self.nesting_mode {
            NestingMode::Single => match raw {
                Value::Null => Value::Null,
                Value::Array(items) => items
                    .first()
                    .map(|item| Value::Object(self.block.normalize(item)))
                    .unwrap_or(Value::Null),
                other => Value::Object(self.block.normalize(other)),
            },
            NestingMode::List | NestingMode::Set => match raw {
                Value::Null => Value::Array(Vec::new()),
                Value::Array(items) => Value::Array(
                    items
                        .iter()
                        .map(|item| Value::Object(self.block.normalize(item)))
                        .collect(),
                ),
                other => Value::Array(vec![Value::Object(self.block.normalize(other))]),
            },
            NestingMode::Map => match raw {
                Value::Object(entries) => Value::Object(
                    entries
                        .iter()
                        .map(|(k, v)| (k.clone(), Value::Object(self.block.normalize(v))))
                        .collect(),
                ),
                _ => Value::Object(Map::new()),
            },
        }
    }

    fn element_count(&self, value: &Value) -> usize {
        match value {
            Value::Array(items) => items.len(),
            Value::Object(entries) if self.nesting_mode == NestingMode::Map => entries.len(),
            Value::Object(_) => 1,
            _ => 0,
        }
    }

    fn elements<'a>(&self, value: &'a Value) -> Vec<(String, &'a Map<String, Value>)> {
        match value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| item.as_object().map(|obj| (i.to_string(), obj)))
                .collect(),
            Value::Object(entries) if self.nesting_mode == NestingMode::Map => entries
                .iter()
                .filter_map(|(k, item)| item.as_object().map(|obj| (k.clone(), obj)))
                .collect(),
            Value::Object(obj) => vec![("0".to_string(), obj)],
            _ => Vec::new(),
        }
    }

    fn for_each_element_mut(&self, value: &mut Value, mut f: impl FnMut(&mut Map<String, Value>)) {
        match value {
            Value::Array(items) => {
                for item in items.iter_mut() {
                    if let Some(obj) = item.as_object_mut() {
                        f(obj);
                    }
                }
            }
            Value::Object(entries) if self.nesting_mode == NestingMode::Map => {
                for item in entries.values_mut() {
                    if let Some(obj) = item.as_object_mut() {
                        f(obj);
                    }
                }
            }
            Value::Object(obj) => f(obj),
            _ => {}
        }
    }
}

/// Resource schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSchema {
    pub version: i64,
    pub block: SchemaBlock,
}

impl ResourceSchema {
    /// Every resource carries a computed `id`.
    pub fn new(version: i64, mut block: SchemaBlock) -> Self {
        block
            .attributes
            .entry("id".to_string())
            .or_insert_with(|| SchemaAttribute::string().optional().computed());
        Self { version, block }
    }
}

/// Provider schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSchema {
    pub provider: SchemaBlock,
    pub resource_schemas: BTreeMap<String, ResourceSchema>,
    pub data_source_schemas: BTreeMap<String, ResourceSchema>,
}

impl ProviderSchema {
    pub fn new(provider: SchemaBlock) -> Self {
        Self {
            provider,
            resource_schemas: BTreeMap::new(),
            data_source_schemas: BTreeMap::new(),
        }
    }

    pub fn with_resource(mut self, name: &str, schema: ResourceSchema) -> Self {
        self.resource_schemas.insert(name.to_string(), schema);
        self
    }
}

fn child_path(path: &[String], name: &str) -> Vec<String> {
    let mut out = path.to_vec();
    out.push(name.to_string());
    out
}

fn value_at<'a>(obj: &'a Map<String, Value>, key: &str) -> &'a Value {
    obj.get(key).unwrap_or(&Value::Null)
}
