//! In-memory provider used by the dispatcher and harness tests.

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{Provider, ProviderDefinition};
use crate::resource::Resource;
use crate::schema::{AttributeType, ResourceSchema, SchemaAttribute, SchemaBlock};
use crate::state::{ResourceData, ResourceState};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

pub const MEMORY_THING: &str = "memory_thing";

pub struct MemoryStore {
    pub region: String,
    pub objects: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn get(&self, name: &str) -> Option<Value> {
        self.objects.lock().unwrap().get(name).cloned()
    }
}

pub struct MemoryProvider;

#[async_trait]
impl ProviderDefinition for MemoryProvider {
    type Meta = MemoryStore;

    fn name(&self) -> &str {
        "memory"
    }

    fn schema(&self) -> SchemaBlock {
        SchemaBlock::new().with_attribute(
            "region",
            SchemaAttribute::string()
                .optional()
                .with_default(json!("mem-1")),
        )
    }

    fn resources(&self) -> Vec<Box<dyn Resource<MemoryStore>>> {
        vec![Box::new(MemoryThing)]
    }

    async fn configure(&self, config: &ResourceState) -> ProviderResult<MemoryStore> {
        Ok(MemoryStore {
            region: config.get_string("region").unwrap_or_default(),
            objects: Mutex::new(HashMap::new()),
        })
    }
}

pub fn memory_provider() -> Provider<MemoryProvider> {
    Provider::new(MemoryProvider).unwrap()
}

struct MemoryThing;

#[async_trait]
impl Resource<MemoryStore> for MemoryThing {
    fn type_name(&self) -> &str {
        MEMORY_THING
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(
            0,
            SchemaBlock::new()
                .with_attribute("name", SchemaAttribute::string().required().force_new())
                .with_attribute(
                    "description",
                    SchemaAttribute::string()
                        .optional()
                        .with_default(json!("managed")),
                )
                .with_attribute(
                    "labels",
                    SchemaAttribute::map(AttributeType::String).optional(),
                )
                .with_attribute("fingerprint", SchemaAttribute::string().computed())
                .with_attribute("region", SchemaAttribute::string().computed()),
        )
    }

    async fn create(&self, d: &mut ResourceData, meta: &MemoryStore) -> ProviderResult<()> {
        let name = d.get_string("name").unwrap_or_default();
        let object = json!({
            "description": d.get_string("description"),
            "labels": d.get_string_map("labels"),
            "generation": 1,
        });
        meta.objects.lock().unwrap().insert(name.clone(), object);
        d.set_id(name);
        self.read(d, meta).await
    }

    async fn read(&self, d: &mut ResourceData, meta: &MemoryStore) -> ProviderResult<()> {
        let Some(object) = meta.get(d.id()) else {
            d.set_id("");
            return Ok(());
        };
        let id = d.id().to_string();
        d.set("name", json!(id));
        d.set("description", object["description"].clone());
        d.set("labels", object["labels"].clone());
        d.set(
            "fingerprint",
            json!(format!("fp-{}", object["generation"].as_i64().unwrap_or(0))),
        );
        d.set("region", json!(meta.region));
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData, meta: &MemoryStore) -> ProviderResult<()> {
        let id = d.id().to_string();
        d.partial(true);

        if d.has_change("labels") {
            let labels = json!(d.get_string_map("labels"));
            if let Some(object) = meta.objects.lock().unwrap().get_mut(&id) {
                object["labels"] = labels;
                let generation = object["generation"].as_i64().unwrap_or(0) + 1;
                object["generation"] = json!(generation);
            }
            d.set_partial("labels");
        }

        if d.has_change("description") {
            let description = d.get_string("description");
            if description.as_deref() == Some("fail") {
                return Err(ProviderError::Other("description rejected".to_string()));
            }
            if let Some(object) = meta.objects.lock().unwrap().get_mut(&id) {
                object["description"] = json!(description);
            }
            d.set_partial("description");
        }

        d.partial(false);
        self.read(d, meta).await
    }

    async fn delete(&self, d: &mut ResourceData, meta: &MemoryStore) -> ProviderResult<()> {
        meta.objects.lock().unwrap().remove(d.id());
        d.set_id("");
        Ok(())
    }

    async fn exists(&self, d: &mut ResourceData, meta: &MemoryStore) -> ProviderResult<bool> {
        Ok(meta.get(d.id()).is_some())
    }
}
