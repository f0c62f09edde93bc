//! The served `/openapi.json` document, assembled from operation specs.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

const OPENAPI_VERSION: &str = "3.0.3";

#[derive(Serialize)]
pub struct Document {
    openapi: &'static str,
    info: Info,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<Tag>,
    paths: BTreeMap<String, BTreeMap<String, Value>>,
    components: Components,
}

#[derive(Serialize)]
struct Info {
    title: &'static str,
    version: &'static str,
    description: &'static str,
}

#[derive(Serialize)]
struct Tag {
    name: String,
}

#[derive(Serialize, Default)]
struct Components {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    schemas: BTreeMap<String, Value>,
}

/// Collects paths, tags and component schemas; paths and tags come out sorted.
#[derive(Default)]
pub struct DocumentBuilder {
    paths: BTreeMap<String, BTreeMap<String, Value>>,
    tags: BTreeSet<String>,
    schemas: BTreeMap<String, Value>,
}

impl DocumentBuilder {
    pub fn operation(&mut self, path: &str, method: &str, tags: &[String], operation: Value) {
        self.tags.extend(tags.iter().cloned());
        self.paths
            .entry(path.to_string())
            .or_default()
            .insert(method.to_lowercase(), operation);
    }

    pub fn schema(&mut self, name: &str, schema: Value) {
        self.schemas.insert(name.to_string(), schema);
    }

    pub fn finish(self) -> Document {
        Document {
            openapi: OPENAPI_VERSION,
            info: Info {
                title: "Voucher Server API",
                version: env!("CARGO_PKG_VERSION"),
                description: "Voucher management REST API",
            },
            tags: self.tags.into_iter().map(|name| Tag { name }).collect(),
            paths: self.paths,
            components: Components {
                schemas: self.schemas,
            },
        }
    }
}
