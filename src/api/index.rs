//! Purpose: Describe server-side indexes and build their definitions from a task.
//! Exports: `IndexDefinition`, `IndexCreationTask`, `IndexDefinitionBuilder`, field option enums.
//! Role: Produces the JSON shape the put-indexes command ships to the server.
//! Invariants: Task names map `_` to `/`; an empty name is rejected at construction.
//! Invariants: A single-map task must carry a map; multi-map tasks are not validated.
//! Invariants: Field maps are ordered so the produced definition is deterministic.
#![allow(clippy::result_large_err)]

use super::command::PutIndexResult;
use super::operations::PutIndexesOperation;
use super::store::DocumentStore;
use crate::core::conventions::DocumentConventions;
use crate::core::error::{ApiResult, Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Field name that applies an option to every field of the index.
pub const ALL_FIELDS: &str = "__all_fields";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum FieldStorage {
    Yes,
    No,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum FieldIndexing {
    No,
    Search,
    Exact,
    Default,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum FieldTermVector {
    No,
    Yes,
    WithPositions,
    WithOffsets,
    WithPositionsAndOffsets,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum IndexPriority {
    Low,
    #[default]
    Normal,
    High,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum IndexLockMode {
    #[default]
    Unlock,
    LockedIgnore,
    LockedError,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum IndexType {
    #[default]
    None,
    AutoMap,
    AutoMapReduce,
    Map,
    MapReduce,
    Faulty,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SpatialFieldType {
    Geography,
    Cartesian,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SpatialSearchStrategy {
    GeohashPrefixTree,
    QuadPrefixTree,
    BoundingBox,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SpatialUnits {
    Kilometers,
    Miles,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpatialOptions {
    #[serde(rename = "Type")]
    pub field_type: SpatialFieldType,
    pub strategy: SpatialSearchStrategy,
    pub max_tree_level: u32,
    #[serde(rename = "MinX")]
    pub min_x: f64,
    #[serde(rename = "MaxX")]
    pub max_x: f64,
    #[serde(rename = "MinY")]
    pub min_y: f64,
    #[serde(rename = "MaxY")]
    pub max_y: f64,
    pub units: SpatialUnits,
}

impl SpatialOptions {
    /// Latitude/longitude on a geohash tree, distances in kilometers.
    pub fn geography() -> Self {
        Self {
            field_type: SpatialFieldType::Geography,
            strategy: SpatialSearchStrategy::GeohashPrefixTree,
            max_tree_level: 9,
            min_x: -180.0,
            max_x: 180.0,
            min_y: -90.0,
            max_y: 90.0,
            units: SpatialUnits::Kilometers,
        }
    }

    pub fn cartesian(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            field_type: SpatialFieldType::Cartesian,
            strategy: SpatialSearchStrategy::QuadPrefixTree,
            max_tree_level: 12,
            min_x,
            max_x,
            min_y,
            max_y,
            units: SpatialUnits::Kilometers,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IndexFieldOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<FieldStorage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexing: Option<FieldIndexing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_vector: Option<FieldTermVector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spatial: Option<SpatialOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,
    #[serde(default)]
    pub suggestions: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IndexDefinition {
    pub name: String,
    #[serde(default)]
    pub priority: IndexPriority,
    #[serde(default)]
    pub lock_mode: IndexLockMode,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_sources: BTreeMap<String, String>,
    #[serde(default)]
    pub maps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduce: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, IndexFieldOptions>,
    #[serde(default, rename = "Type")]
    pub index_type: IndexType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_reduce_to_collection: Option<String>,
}

impl IndexDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn detect_type(&self) -> IndexType {
        if self.reduce.as_deref().is_some_and(|reduce| !reduce.trim().is_empty()) {
            IndexType::MapReduce
        } else {
            IndexType::Map
        }
    }
}

/// Collects per-field options and folds them into one `IndexDefinition`.
#[derive(Clone, Debug, Default)]
pub struct IndexDefinitionBuilder {
    name: String,
    pub map: Option<String>,
    pub reduce: Option<String>,
    pub stores: BTreeMap<String, FieldStorage>,
    pub indexes: BTreeMap<String, FieldIndexing>,
    pub analyzers: BTreeMap<String, String>,
    pub suggestions: BTreeSet<String>,
    pub term_vectors: BTreeMap<String, FieldTermVector>,
    pub spatial: BTreeMap<String, SpatialOptions>,
    pub additional_sources: BTreeMap<String, String>,
    pub output_reduce_to_collection: Option<String>,
    pub priority: IndexPriority,
    pub lock_mode: IndexLockMode,
}

impl IndexDefinitionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn to_index_definition(&self, validate_map: bool) -> ApiResult<IndexDefinition> {
        let map = self.map.as_deref().filter(|map| !map.trim().is_empty());
        if validate_map && map.is_none() {
            return Err(Error::new(ErrorKind::Usage).with_message(format!(
                "map is required to generate an index, cannot create an index without a valid map property (in index {})",
                self.name
            )));
        }

        let mut definition = IndexDefinition::new(self.name.clone());
        definition.maps.extend(map.map(str::to_string));
        definition.reduce = self.reduce.clone().filter(|reduce| !reduce.trim().is_empty());
        definition.priority = self.priority;
        definition.lock_mode = self.lock_mode;
        definition.additional_sources = self.additional_sources.clone();
        definition.output_reduce_to_collection = self
            .output_reduce_to_collection
            .clone()
            .filter(|collection| !collection.is_empty());
        definition.fields = self.fields();
        definition.index_type = definition.detect_type();
        Ok(definition)
    }

    fn fields(&self) -> BTreeMap<String, IndexFieldOptions> {
        let mut fields: BTreeMap<String, IndexFieldOptions> = BTreeMap::new();
        for (field, storage) in &self.stores {
            fields.entry(field.clone()).or_default().storage = Some(*storage);
        }
        for (field, indexing) in &self.indexes {
            fields.entry(field.clone()).or_default().indexing = Some(*indexing);
        }
        for (field, term_vector) in &self.term_vectors {
            fields.entry(field.clone()).or_default().term_vector = Some(*term_vector);
        }
        for (field, spatial) in &self.spatial {
            fields.entry(field.clone()).or_default().spatial = Some(spatial.clone());
        }
        for field in &self.suggestions {
            fields.entry(field.clone()).or_default().suggestions = true;
        }
        for (field, analyzer) in &self.analyzers {
            let options = fields.entry(field.clone()).or_default();
            options.analyzer = Some(analyzer.clone());
            if options.indexing.is_none() {
                options.indexing = Some(FieldIndexing::Search);
            }
        }
        fields
    }
}

/// A named, user-authored index. Set `map` for a single-map index or push
/// onto `maps` for a multi-map one.
#[derive(Clone, Debug)]
pub struct IndexCreationTask {
    name: String,
    pub map: Option<String>,
    pub maps: Vec<String>,
    pub reduce: Option<String>,
    pub conventions: Option<DocumentConventions>,
    pub additional_sources: BTreeMap<String, String>,
    pub priority: IndexPriority,
    pub lock_mode: IndexLockMode,
    pub output_reduce_to_collection: Option<String>,
    fields: IndexDefinitionBuilder,
}

impl IndexCreationTask {
    pub fn new(name: impl Into<String>) -> ApiResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("index name cannot be empty"));
        }
        Ok(Self {
            fields: IndexDefinitionBuilder::new(name.clone()),
            name,
            map: None,
            maps: Vec::new(),
            reduce: None,
            conventions: None,
            additional_sources: BTreeMap::new(),
            priority: IndexPriority::default(),
            lock_mode: IndexLockMode::default(),
            output_reduce_to_collection: None,
        })
    }

    /// `Orders_Totals` is published as `Orders/Totals`.
    pub fn index_name(&self) -> String {
        self.name.replace('_', "/")
    }

    pub fn is_map_reduce(&self) -> bool {
        self.reduce.as_deref().is_some_and(|reduce| !reduce.is_empty())
    }

    pub fn index(&mut self, field: impl Into<String>, indexing: FieldIndexing) -> &mut Self {
        self.fields.indexes.insert(field.into(), indexing);
        self
    }

    pub fn store(&mut self, field: impl Into<String>, storage: FieldStorage) -> &mut Self {
        self.fields.stores.insert(field.into(), storage);
        self
    }

    pub fn store_all_fields(&mut self, storage: FieldStorage) -> &mut Self {
        self.store(ALL_FIELDS, storage)
    }

    pub fn analyze(&mut self, field: impl Into<String>, analyzer: impl Into<String>) -> &mut Self {
        self.fields.analyzers.insert(field.into(), analyzer.into());
        self
    }

    pub fn term_vector(&mut self, field: impl Into<String>, term_vector: FieldTermVector) -> &mut Self {
        self.fields.term_vectors.insert(field.into(), term_vector);
        self
    }

    pub fn spatial(&mut self, field: impl Into<String>, options: SpatialOptions) -> &mut Self {
        self.fields.spatial.insert(field.into(), options);
        self
    }

    pub fn suggestion(&mut self, field: impl Into<String>) -> &mut Self {
        self.fields.suggestions.insert(field.into());
        self
    }

    pub fn create_index_definition(&self) -> ApiResult<IndexDefinition> {
        let mut builder = self.fields.clone();
        builder.name = self.index_name();
        builder.map = self.map.clone();
        builder.reduce = self.reduce.clone();
        builder.additional_sources = self.additional_sources.clone();
        builder.output_reduce_to_collection = self.output_reduce_to_collection.clone();
        builder.priority = self.priority;
        builder.lock_mode = self.lock_mode;

        let mut definition = builder.to_index_definition(self.maps.is_empty())?;
        definition.maps.extend(self.maps.iter().cloned());
        Ok(definition)
    }

    /// Publishes the index. Conventions resolve explicit, then the task's own,
    /// then the store's; the database falls back to the store default.
    pub fn execute(
        &self,
        store: &DocumentStore,
        conventions: Option<&DocumentConventions>,
        database: Option<&str>,
    ) -> ApiResult<Vec<PutIndexResult>> {
        let conventions = conventions
            .or(self.conventions.as_ref())
            .unwrap_or_else(|| store.conventions())
            .clone();
        let definition = self.create_index_definition()?;

        let mut maintenance = store.maintenance().with_conventions(conventions);
        if let Some(database) = database.filter(|name| !name.is_empty()) {
            maintenance = maintenance.for_database(database);
        }
        let results = maintenance.send(&PutIndexesOperation::new(vec![definition]))?;
        Ok(results.unwrap_or_default())
    }
}
