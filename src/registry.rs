//! A set of resource schemas keyed by type name.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use log::debug;

use crate::error::SchemaError;
use crate::loader::{collect_json_files, load_resource_schema};
use crate::resource::ResourceSchema;

/// Resource schemas by `typeName`.
///
/// Schemas are shared behind `Arc` so lookups can outlive the borrow of the
/// registry.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<ResourceSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `.json` file under `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self, SchemaError> {
        let mut registry = Self::new();
        registry.load_dir(dir)?;
        Ok(registry)
    }

    /// Register a schema.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::DuplicateType` if the type is already registered.
    pub fn insert(&mut self, schema: ResourceSchema) -> Result<Arc<ResourceSchema>, SchemaError> {
        if self.schemas.contains_key(schema.type_name()) {
            return Err(SchemaError::DuplicateType {
                type_name: schema.type_name().to_string(),
            });
        }
        let schema = Arc::new(schema);
        self.schemas
            .insert(schema.type_name().to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    /// Register a schema, returning the one it replaced.
    pub fn insert_or_replace(&mut self, schema: ResourceSchema) -> Option<Arc<ResourceSchema>> {
        self.schemas
            .insert(schema.type_name().to_string(), Arc::new(schema))
    }

    /// Parse and register a schema from JSON text.
    pub fn load_str(&mut self, content: &str) -> Result<Arc<ResourceSchema>, SchemaError> {
        self.insert(ResourceSchema::from_json_str(content)?)
    }

    /// Load and register a schema file.
    pub fn load_file(&mut self, path: &Path) -> Result<Arc<ResourceSchema>, SchemaError> {
        let schema = self.insert(load_resource_schema(path)?)?;
        debug!("registered {} from {}", schema.type_name(), path.display());
        Ok(schema)
    }

    /// Load every `.json` file under `dir`; stops at the first failure.
    ///
    /// Returns the number of schemas loaded.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, SchemaError> {
        if !dir.exists() {
            return Err(SchemaError::FileNotFound {
                path: dir.to_path_buf(),
            });
        }
        let files = collect_json_files(dir);
        for file in &files {
            self.load_file(file)?;
        }
        Ok(files.len())
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<ResourceSchema>> {
        self.schemas.get(type_name).cloned()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.schemas.contains_key(type_name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
