//! Purpose: Map a runtime value to the extractor that knows its shape.
//! Exports: `Registry`, `ExtractorDescriptor`, `TypeKey`, `Dispatch`.
//! Role: Injected dispatch table; consulted once per node by the serializer and write-back.
//! Invariants: Resolution never fails; objects fall back to the bean extractor.
//! Invariants: Re-registering a key replaces the earlier extractor (last wins).
//! Notes: Registration swaps a copied table; readers work on an `Arc` snapshot.
use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::core::extract::Extractor;
use crate::core::extract::bean::BeanExtractor;
use crate::core::extract::collection::{LeafExtractor, ListExtractor, MapExtractor};
use crate::core::extract::simplifiers;
use crate::core::value::{HostObject, Value};

type Matcher = Arc<dyn Fn(&dyn HostObject) -> bool + Send + Sync>;

struct ExactEntry {
    type_name: &'static str,
    extractor: Arc<dyn Extractor>,
}

struct MatcherEntry {
    name: String,
    specificity: u32,
    seq: u64,
    test: Matcher,
    extractor: Arc<dyn Extractor>,
}

#[derive(Clone, Default)]
struct Table {
    exact: HashMap<TypeId, Arc<ExactEntry>>,
    matchers: Vec<Arc<MatcherEntry>>,
    next_seq: u64,
}

/// Key under which an extractor was registered.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeKey {
    Exact { type_name: String },
    Matcher { name: String, specificity: u32 },
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ExtractorDescriptor {
    pub key: TypeKey,
    pub extractor: String,
    pub writable: bool,
}

pub struct Registry {
    table: RwLock<Arc<Table>>,
    leaf: Arc<dyn Extractor>,
    list: Arc<dyn Extractor>,
    map: Arc<dyn Extractor>,
    bean: Arc<dyn Extractor>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            table: RwLock::new(Arc::new(Table::default())),
            leaf: Arc::new(LeafExtractor),
            list: Arc::new(ListExtractor),
            map: Arc::new(MapExtractor),
            bean: Arc::new(BeanExtractor),
        }
    }

    pub fn with_defaults() -> Self {
        let registry = Self::empty();
        simplifiers::register_defaults(&registry);
        registry
    }

    /// Registers `extractor` for the exact host type `T`.
    pub fn register<T: HostObject>(&self, extractor: impl Extractor + 'static) {
        let extractor: Arc<dyn Extractor> = Arc::new(extractor);
        tracing::debug!(
            host_type = type_name::<T>(),
            extractor = extractor.name(),
            "registered extractor"
        );
        self.update(|table| {
            table.exact.insert(
                TypeId::of::<T>(),
                Arc::new(ExactEntry {
                    type_name: type_name::<T>(),
                    extractor,
                }),
            );
        });
    }

    /// Registers a predicate-based extractor for a family of host types.
    /// Higher `specificity` wins; equal specificity goes to the later registration.
    pub fn register_matcher<F>(
        &self,
        name: impl Into<String>,
        specificity: u32,
        test: F,
        extractor: impl Extractor + 'static,
    ) where
        F: Fn(&dyn HostObject) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        let extractor: Arc<dyn Extractor> = Arc::new(extractor);
        tracing::debug!(
            matcher = %name,
            specificity,
            extractor = extractor.name(),
            "registered matcher"
        );
        self.update(|table| {
            table.matchers.retain(|entry| entry.name != name);
            let seq = table.next_seq;
            table.next_seq += 1;
            table.matchers.push(Arc::new(MatcherEntry {
                name,
                specificity,
                seq,
                test: Arc::new(test),
                extractor,
            }));
            table
                .matchers
                .sort_by(|a, b| b.specificity.cmp(&a.specificity).then(b.seq.cmp(&a.seq)));
        });
    }

    pub fn resolve(&self, value: &Value) -> Arc<dyn Extractor> {
        self.snapshot().resolve(value)
    }

    /// Frozen view of the current table for one top-level call.
    pub fn snapshot(&self) -> Dispatch {
        Dispatch {
            table: self.table.read().clone(),
            leaf: self.leaf.clone(),
            list: self.list.clone(),
            map: self.map.clone(),
            bean: self.bean.clone(),
        }
    }

    pub fn descriptors(&self) -> Vec<ExtractorDescriptor> {
        let table = self.table.read().clone();
        let mut out: Vec<ExtractorDescriptor> = table
            .exact
            .values()
            .map(|entry| ExtractorDescriptor {
                key: TypeKey::Exact {
                    type_name: entry.type_name.to_string(),
                },
                extractor: entry.extractor.name().to_string(),
                writable: entry.extractor.supports_write(),
            })
            .collect();
        out.sort_by(|a, b| a.extractor.cmp(&b.extractor));
        out.extend(table.matchers.iter().map(|entry| ExtractorDescriptor {
            key: TypeKey::Matcher {
                name: entry.name.clone(),
                specificity: entry.specificity,
            },
            extractor: entry.extractor.name().to_string(),
            writable: entry.extractor.supports_write(),
        }));
        out
    }

    fn update(&self, apply: impl FnOnce(&mut Table)) {
        let mut guard = self.table.write();
        let mut next = Table::clone(&guard);
        apply(&mut next);
        *guard = Arc::new(next);
    }
}

/// Immutable dispatch table captured at the start of a call.
#[derive(Clone)]
pub struct Dispatch {
    table: Arc<Table>,
    leaf: Arc<dyn Extractor>,
    list: Arc<dyn Extractor>,
    map: Arc<dyn Extractor>,
    bean: Arc<dyn Extractor>,
}

impl Dispatch {
    pub fn resolve(&self, value: &Value) -> Arc<dyn Extractor> {
        match value {
            Value::List(_) => self.list.clone(),
            Value::Map(_) => self.map.clone(),
            Value::Object(object) => self.resolve_object(object.as_ref()),
            _ => self.leaf.clone(),
        }
    }

    fn resolve_object(&self, object: &dyn HostObject) -> Arc<dyn Extractor> {
        if let Some(entry) = self.table.exact.get(&object.as_any().type_id()) {
            return entry.extractor.clone();
        }
        self.table
            .matchers
            .iter()
            .find(|entry| (entry.test)(object))
            .map(|entry| entry.extractor.clone())
            .unwrap_or_else(|| self.bean.clone())
    }
}
