use std::collections::BTreeMap;

use utoipa::openapi::{schema::Schema, RefOr};

/// Outcome of registering one component schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaInsert {
    Inserted,
    Identical,
    /// Same name, different content; the first registration is kept.
    Conflict,
}

#[derive(Debug, Default, Clone)]
pub struct ComponentsRegistry {
    /// Component name -> schema (serialized to components.schemas)
    pub schemas: BTreeMap<String, RefOr<Schema>>,
}

impl ComponentsRegistry {
    /// Insert with conflict detection by JSON comparison.
    pub fn register_schema(&mut self, name: &str, schema: RefOr<Schema>) -> SchemaInsert {
        let Some(existing) = self.schemas.get(name) else {
            self.schemas.insert(name.to_string(), schema);
            return SchemaInsert::Inserted;
        };

        let same = match (serde_json::to_value(existing), serde_json::to_value(&schema)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if same {
            SchemaInsert::Identical
        } else {
            SchemaInsert::Conflict
        }
    }

    pub fn has_schema(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::openapi::schema::{ObjectBuilder, Type};

    fn object(prop: &str) -> RefOr<Schema> {
        RefOr::T(Schema::Object(
            ObjectBuilder::new()
                .property(prop, ObjectBuilder::new().schema_type(Type::String))
                .build(),
        ))
    }

    #[test]
    fn first_registration_wins_on_conflict() {
        let mut reg = ComponentsRegistry::default();
        assert_eq!(reg.register_schema("Dto", object("a")), SchemaInsert::Inserted);
        assert_eq!(reg.register_schema("Dto", object("a")), SchemaInsert::Identical);
        assert_eq!(reg.register_schema("Dto", object("b")), SchemaInsert::Conflict);

        let kept = serde_json::to_value(&reg.schemas["Dto"]).unwrap();
        assert!(kept["properties"].get("a").is_some());
        assert!(reg.has_schema("Dto"));
    }
}
