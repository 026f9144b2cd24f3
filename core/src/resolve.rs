//! Inlining of JSON:API relationships from the `included` side-load list.
//!
//! # Design
//! A response carries `relationships` as bare `{type, id}` linkage and the
//! related resources once each in top-level `included`. Inlining replaces every
//! linkage with the full resource, whose own relationships are inlined the same
//! way, depth-first:
//!
//! - to-many becomes an object keyed by id; references missing from
//!   `included` are dropped;
//! - to-one becomes the resource, or `{}` when it is missing;
//! - empty or absent linkage becomes `{}`.
//!
//! Nothing here returns an error: an unresolvable reference just yields an
//! empty result. Each resource is expanded at most once per top-level
//! resource: any later reference to it (including a cycle back to one being
//! expanded) is inlined with its linkage left as stubs, so output grows
//! linearly with `included`. Nesting also stops at `MAX_INLINE_DEPTH` levels.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::trace;

use crate::types::{Linkage, ResourceIdentifier};

/// Deepest chain of nested inlined resources below a top-level resource.
pub const MAX_INLINE_DEPTH: usize = 8;

/// `included` resources indexed by type, then id.
#[derive(Debug, Default)]
pub struct IncludedIndex<'a> {
    by_type: HashMap<String, HashMap<String, &'a Value>>,
}

impl<'a> IncludedIndex<'a> {
    /// Index `included`. Entries lacking `type` or `id` are skipped; on
    /// duplicates the last one wins.
    pub fn new(included: &'a [Value]) -> Self {
        let mut by_type: HashMap<String, HashMap<String, &'a Value>> = HashMap::new();
        for resource in included {
            let Some(ident) = ResourceIdentifier::from_value(resource) else {
                continue;
            };
            by_type.entry(ident.kind).or_default().insert(ident.id, resource);
        }
        Self { by_type }
    }

    pub fn get(&self, ident: &ResourceIdentifier) -> Option<&'a Value> {
        self.by_type.get(ident.kind.as_str())?.get(&ident.id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_type.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Resolver<'i, 'a> {
    index: &'i IncludedIndex<'a>,
    expanded: HashSet<ResourceIdentifier>,
    depth: usize,
}

impl<'i, 'a> Resolver<'i, 'a> {
    fn new(index: &'i IncludedIndex<'a>) -> Self {
        Self {
            index,
            expanded: HashSet::new(),
            depth: 0,
        }
    }

    fn resolve_map(&mut self, relationships: &Map<String, Value>) -> Map<String, Value> {
        relationships
            .iter()
            .map(|(name, relationship)| {
                let linkage = Linkage::from_relationship(relationship);
                (name.clone(), self.resolve_linkage(&linkage))
            })
            .collect()
    }

    fn resolve_linkage(&mut self, linkage: &Linkage) -> Value {
        match linkage {
            Linkage::Many(idents) => {
                let mut resolved = Map::new();
                for ident in idents {
                    if let Some(resource) = self.inline(ident) {
                        resolved.insert(ident.id.clone(), resource);
                    }
                }
                Value::Object(resolved)
            }
            Linkage::One(ident) => self.inline(ident).unwrap_or_else(empty_object),
            Linkage::Empty => empty_object(),
        }
    }

    fn inline(&mut self, ident: &ResourceIdentifier) -> Option<Value> {
        let resource = self.index.get(ident)?;
        let mut inlined = resource.clone();

        let Some(relationships) = resource.get("relationships").and_then(Value::as_object) else {
            return Some(inlined);
        };
        if relationships.is_empty() {
            return Some(inlined);
        }
        if self.depth >= MAX_INLINE_DEPTH || self.expanded.contains(ident) {
            trace!(kind = %ident.kind, id = %ident.id, depth = self.depth, "not descending into resource");
            return Some(inlined);
        }

        self.expanded.insert(ident.clone());
        self.depth += 1;
        let resolved = self.resolve_map(relationships);
        self.depth -= 1;

        inlined["relationships"] = Value::Object(resolved);
        Some(inlined)
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Inline `relationships` against the resources in `included`.
pub fn resolve_relationships(
    relationships: &Map<String, Value>,
    included: &[Value],
) -> Map<String, Value> {
    let index = IncludedIndex::new(included);
    Resolver::new(&index).resolve_map(relationships)
}

/// Replace `resource.relationships` in place with its inlined form. A
/// resource without relationships is left untouched.
pub fn resolve_resource(resource: &mut Value, index: &IncludedIndex<'_>) {
    let Some(relationships) = resource.get("relationships").and_then(Value::as_object) else {
        return;
    };
    if relationships.is_empty() {
        return;
    }

    let mut resolver = Resolver::new(index);
    if let Some(ident) = ResourceIdentifier::from_value(resource) {
        resolver.expanded.insert(ident);
    }
    let resolved = resolver.resolve_map(relationships);
    resource["relationships"] = Value::Object(resolved);
}

/// Normalize a whole response envelope: inline the relationships of `data`
/// (a single resource or each element of a list) and remove `included`.
///
/// When `included` is missing or empty the linkage in `data` is kept as is.
pub fn resolve_document(document: &mut Value) {
    let included = match document.as_object_mut().and_then(|doc| doc.remove("included")) {
        Some(Value::Array(items)) => items,
        _ => return,
    };
    if included.is_empty() {
        return;
    }

    let index = IncludedIndex::new(&included);
    match document.get_mut("data") {
        Some(Value::Array(items)) => {
            for item in items {
                resolve_resource(item, &index);
            }
        }
        Some(data) if data.is_object() => resolve_resource(data, &index),
        _ => {}
    }
}
