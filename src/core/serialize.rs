//! Purpose: Forward direction: walk a runtime graph into a bounded `StructuredValue`.
//! Exports: `Serializer`, `Request`, `Serialized`.
//! Role: Single recursive traversal shared by whole reads, partial reads and wildcards.
//! Invariants: Each call owns its budget, visited set and fault handler.
//! Invariants: Faults are handled once, where they arise; an `Err` leaving a node aborts the call.
//! Invariants: Addressed steps mark their node visited but do not consume depth.
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::core::budget::{Budget, Limits, Marker, MarkerKind, Truncation, Visited};
use crate::core::error::{Error, ErrorKind};
use crate::core::extract::{Extractor, Shape};
use crate::core::fault::{FaultHandler, FaultMode};
use crate::core::path::{Path, Segment};
use crate::core::registry::{Dispatch, Registry};
use crate::core::value::{StructuredValue, Value};

/// Per-call configuration: bounds plus the fault policy.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Request {
    pub limits: Limits,
    pub fault: FaultMode,
    #[serde(skip)]
    handler: Option<Arc<dyn FaultHandler>>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_fault(mut self, fault: FaultMode) -> Self {
        self.fault = fault;
        self
    }

    /// Replaces the built-in handler selected by `fault`.
    pub fn with_handler(mut self, handler: Arc<dyn FaultHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn suppressing() -> Self {
        Self::default().with_fault(FaultMode::Suppress)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("limits", &self.limits)
            .field("fault", &self.fault)
            .field("custom_handler", &self.handler.is_some())
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Serialized {
    pub value: StructuredValue,
    /// Every child of the addressed node was omitted by the fault policy.
    pub filtered: bool,
    pub truncations: Vec<Truncation>,
}

pub struct Serializer {
    registry: Arc<Registry>,
}

impl Serializer {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn serialize(
        &self,
        value: &Value,
        path: &Path,
        request: &Request,
    ) -> Result<Serialized, Error> {
        request.limits.validate()?;
        let faults: &dyn FaultHandler = match &request.handler {
            Some(handler) => handler.as_ref(),
            None => request.fault.handler(),
        };
        let mut traversal = Traversal {
            dispatch: self.registry.snapshot(),
            budget: Budget::new(request.limits),
            visited: Visited::new(),
            faults,
            location: Vec::with_capacity(path.len()),
        };
        let node = traversal.walk(value, path.segments(), 0)?;
        let (value, filtered) = match node {
            Node::Value(value) => (value, false),
            Node::Filtered(empty) => (empty, true),
        };
        Ok(Serialized {
            value,
            filtered,
            truncations: traversal.budget.into_truncations(),
        })
    }
}

enum Node {
    Value(StructuredValue),
    /// The node was omitted; carries the empty stand-in of its shape.
    Filtered(StructuredValue),
}

struct Traversal<'a> {
    dispatch: Dispatch,
    budget: Budget,
    visited: Visited,
    faults: &'a dyn FaultHandler,
    location: Vec<Segment>,
}

impl Traversal<'_> {
    fn here(&self) -> Path {
        Path::from_segments(self.location.clone())
    }

    /// Hands an incidental failure to the policy; addressed failures always surface.
    fn fault(&self, err: Error) -> Result<(), Error> {
        let here = self.here();
        if err.is_addressed() {
            return Err(err.or_path(&here));
        }
        self.faults.handle(err, &here)
    }

    fn not_found(&self, segment: &Segment, detail: String) -> Error {
        let mut at = self.location.clone();
        at.push(segment.clone());
        Error::new(ErrorKind::PathNotFound)
            .with_message(detail)
            .with_path(Path::from_segments(at))
    }

    fn walk(&mut self, value: &Value, rest: &[Segment], depth: usize) -> Result<Node, Error> {
        if value.is_null() {
            return Ok(Node::Value(StructuredValue::Null));
        }
        let Some((head, tail)) = rest.split_first() else {
            return self.whole(value, depth);
        };
        if value.is_scalar() {
            return Err(self.not_found(
                head,
                format!("{} value has no children", value.type_name()),
            ));
        }
        let extractor = self.dispatch.resolve(value);
        if !extractor.supports_segments() {
            return self.whole(value, depth);
        }
        let identity = value.identity().unwrap_or_default();
        let entered = self.visited.enter(identity);
        let result = match head {
            Segment::Key(key) => self.step(value, extractor.as_ref(), head, key, tail, depth),
            Segment::Wildcard => self.expand_wildcard(value, extractor.as_ref(), tail, depth),
        };
        if entered {
            self.visited.leave(identity);
        }
        result
    }

    fn step(
        &mut self,
        value: &Value,
        extractor: &dyn Extractor,
        head: &Segment,
        key: &str,
        tail: &[Segment],
        depth: usize,
    ) -> Result<Node, Error> {
        let child = match extractor.child(value, key) {
            Ok(Some(child)) => child,
            Ok(None) => {
                return Err(self.not_found(
                    head,
                    format!("no `{key}` under {}", value.type_name()),
                ));
            }
            // An addressed child that cannot be read fails the call under every fault mode.
            Err(err) => return Err(err.or_path(&self.here().child(head.clone()))),
        };
        self.location.push(head.clone());
        let result = self.walk(&child, tail, depth);
        self.location.pop();
        result
    }

    fn expand_wildcard(
        &mut self,
        value: &Value,
        extractor: &dyn Extractor,
        tail: &[Segment],
        depth: usize,
    ) -> Result<Node, Error> {
        let limits = self.budget.limits();
        if let Some(kind) = self.budget.admit(depth) {
            let marker = Marker::new(kind, &limits, value.type_name());
            return Ok(Node::Value(marker.to_structured()));
        }
        let shape = match extractor.shape(value, limits.max_collection_size) {
            Ok(shape) => shape,
            Err(err) => {
                self.fault(err)?;
                return Ok(Node::Filtered(StructuredValue::Null));
            }
        };
        self.budget.open_container();
        match shape {
            Shape::Leaf(_) => Err(self.not_found(
                &Segment::Wildcard,
                format!("{} value has no children to expand", value.type_name()),
            )),
            Shape::Record { entries, total } => {
                let here = self.here().child(Segment::Wildcard);
                self.budget.retain(&here, total);
                let mut out = Map::new();
                for (name, read) in entries {
                    if out.contains_key(&name) {
                        continue;
                    }
                    self.location.push(Segment::Key(name.clone()));
                    let kept = match read {
                        Ok(child) => self.wildcard_child(&child, tail, depth),
                        Err(err) => self.fault(err).map(|()| None),
                    };
                    self.location.pop();
                    if let Some(kept) = kept? {
                        out.insert(name, kept);
                    }
                }
                Ok(filter_empty(StructuredValue::Object(out)))
            }
            Shape::Sequence { items, total } => {
                let here = self.here().child(Segment::Wildcard);
                self.budget.retain(&here, total);
                let mut out = Vec::new();
                for (index, child) in items.iter().enumerate() {
                    self.location.push(Segment::Key(index.to_string()));
                    let kept = self.wildcard_child(child, tail, depth);
                    self.location.pop();
                    if let Some(kept) = kept? {
                        out.push(kept);
                    }
                }
                Ok(filter_empty(StructuredValue::Array(out)))
            }
        }
    }

    /// A child the remaining path does not reach is skipped, not an error.
    fn wildcard_child(
        &mut self,
        child: &Value,
        tail: &[Segment],
        depth: usize,
    ) -> Result<Option<StructuredValue>, Error> {
        match self.walk(child, tail, depth + 1) {
            Ok(Node::Value(value)) => Ok(Some(value)),
            Ok(Node::Filtered(_)) => Ok(None),
            Err(err) if err.kind() == ErrorKind::PathNotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn whole(&mut self, value: &Value, depth: usize) -> Result<Node, Error> {
        if let Some(scalar) = value.scalar_to_structured() {
            self.budget.emit_leaf();
            return Ok(Node::Value(scalar));
        }
        let identity = value.identity().unwrap_or_default();
        let limits = self.budget.limits();
        if let Some(kind) = self.budget.admit(depth) {
            let marker = Marker::new(kind, &limits, value.type_name());
            return Ok(Node::Value(marker.to_structured()));
        }
        if !self.visited.enter(identity) {
            let marker = Marker::new(MarkerKind::Cycle, &limits, value.type_name());
            return Ok(Node::Value(marker.to_structured()));
        }
        self.budget.open_container();
        let extractor = self.dispatch.resolve(value);
        let result = self.expand(value, extractor.as_ref(), depth);
        self.visited.leave(identity);
        result
    }

    fn expand(
        &mut self,
        value: &Value,
        extractor: &dyn Extractor,
        depth: usize,
    ) -> Result<Node, Error> {
        let max = self.budget.limits().max_collection_size;
        let shape = match extractor.shape(value, max) {
            Ok(shape) => shape,
            Err(err) => {
                self.fault(err)?;
                return Ok(Node::Filtered(StructuredValue::Null));
            }
        };
        match shape {
            Shape::Leaf(leaf) => Ok(Node::Value(leaf)),
            Shape::Record { entries, total } => {
                let here = self.here();
                self.budget.retain(&here, total);
                let mut out = Map::new();
                let mut omitted = 0usize;
                for (name, read) in entries {
                    // Keys that collide after stringification keep the first entry.
                    if out.contains_key(&name) {
                        continue;
                    }
                    self.location.push(Segment::Key(name.clone()));
                    let settled = match read {
                        Ok(child) => {
                            let node = self.whole(&child, depth + 1);
                            settle(node)
                        }
                        Err(err) => self.fault(err).map(|()| None),
                    };
                    self.location.pop();
                    match settled? {
                        Some(kept) => {
                            out.insert(name, kept);
                        }
                        None => omitted += 1,
                    }
                }
                if omitted > 0 && out.is_empty() {
                    return Ok(Node::Filtered(StructuredValue::Object(out)));
                }
                Ok(Node::Value(StructuredValue::Object(out)))
            }
            Shape::Sequence { items, total } => {
                let here = self.here();
                self.budget.retain(&here, total);
                let mut out = Vec::with_capacity(items.len());
                let mut omitted = 0usize;
                for (index, child) in items.iter().enumerate() {
                    self.location.push(Segment::Key(index.to_string()));
                    let node = self.whole(child, depth + 1);
                    self.location.pop();
                    match settle(node)? {
                        Some(kept) => out.push(kept),
                        None => omitted += 1,
                    }
                }
                if omitted > 0 && out.is_empty() {
                    return Ok(Node::Filtered(StructuredValue::Array(out)));
                }
                Ok(Node::Value(StructuredValue::Array(out)))
            }
        }
    }
}

fn settle(node: Result<Node, Error>) -> Result<Option<StructuredValue>, Error> {
    match node? {
        Node::Value(value) => Ok(Some(value)),
        Node::Filtered(_) => Ok(None),
    }
}

fn filter_empty(container: StructuredValue) -> Node {
    let empty = match &container {
        StructuredValue::Object(map) => map.is_empty(),
        StructuredValue::Array(items) => items.is_empty(),
        _ => false,
    };
    if empty {
        Node::Filtered(container)
    } else {
        Node::Value(container)
    }
}

#[cfg(test)]
mod tests {
    use super::{Request, Serializer};
    use crate::core::budget::{Limits, Marker, MarkerKind};
    use crate::core::error::{Error, ErrorKind};
    use crate::core::path::Path;
    use crate::core::registry::Registry;
    use crate::core::value::{PropertyBean, Value};
    use serde_json::json;
    use std::sync::Arc;

    fn serializer() -> Serializer {
        Serializer::new(Arc::new(Registry::with_defaults()))
    }

    fn path(text: &str) -> Path {
        Path::parse(text).expect("path")
    }

    #[test]
    fn whole_document_serializes_in_order() {
        let doc = Value::from_structured(&json!({"b": [1, 2.5, "x"], "a": {"c": null}}));
        let out = serializer()
            .serialize(&doc, &Path::root(), &Request::new())
            .expect("serialize");
        assert_eq!(out.value, json!({"b": [1, 2.5, "x"], "a": {"c": null}}));
        assert!(!out.filtered);
        assert!(out.truncations.is_empty());
    }

    #[test]
    fn partial_read_selects_one_child() {
        let doc = Value::from_structured(&json!({"a": {"b": [10, 20]}}));
        let out = serializer()
            .serialize(&doc, &path("a.b.1"), &Request::new())
            .expect("serialize");
        assert_eq!(out.value, json!(20));
    }

    #[test]
    fn missing_segment_is_not_found_with_path() {
        let doc = Value::from_structured(&json!({"a": {"b": 1}}));
        let err = serializer()
            .serialize(&doc, &path("a.x.y"), &Request::suppressing())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathNotFound);
        assert_eq!(err.path().map(ToString::to_string).as_deref(), Some("a.x"));
    }

    #[test]
    fn path_into_scalar_is_not_found_and_into_null_is_null() {
        let doc = Value::from_structured(&json!({"n": 1, "z": null}));
        let err = serializer()
            .serialize(&doc, &path("n.deeper"), &Request::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathNotFound);
        let out = serializer()
            .serialize(&doc, &path("z.deeper"), &Request::new())
            .expect("null");
        assert_eq!(out.value, json!(null));
    }

    #[test]
    fn depth_limit_replaces_deep_containers_with_marker() {
        let doc = Value::from_structured(&json!({"a": {"b": {"c": 1}}}));
        let request = Request::new().with_limits(Limits::default().with_max_depth(2));
        let out = serializer()
            .serialize(&doc, &Path::root(), &request)
            .expect("serialize");
        assert_eq!(out.value, json!({"a": {"b": "[Depth limit 2 reached: map]"}}));
    }

    #[test]
    fn object_limit_caps_emitted_nodes() {
        let doc = Value::from_structured(&json!([[1], [2], [3]]));
        let request = Request::new().with_limits(Limits::default().with_max_objects(3));
        let out = serializer()
            .serialize(&doc, &Path::root(), &request)
            .expect("serialize");
        assert_eq!(
            out.value,
            json!([[1], "[Object limit 3 reached: list]", "[Object limit 3 reached: list]"])
        );
    }

    #[test]
    fn collection_truncation_is_reported() {
        let doc = Value::from_structured(&json!({"xs": [1, 2, 3, 4, 5]}));
        let request = Request::new().with_limits(Limits::default().with_max_collection_size(2));
        let out = serializer()
            .serialize(&doc, &Path::root(), &request)
            .expect("serialize");
        assert_eq!(out.value, json!({"xs": [1, 2]}));
        assert_eq!(out.truncations.len(), 1);
        assert_eq!(out.truncations[0].path, "xs");
        assert_eq!(out.truncations[0].original_len, 5);
        assert_eq!(out.truncations[0].retained, 2);
    }

    #[test]
    fn map_truncation_is_reported() {
        let doc = Value::from_structured(&json!({"m": {"a": 1, "b": 2, "c": 3, "d": 4, "e": 5}}));
        let request = Request::new().with_limits(Limits::default().with_max_collection_size(2));
        let out = serializer()
            .serialize(&doc, &Path::root(), &request)
            .expect("serialize");
        assert_eq!(out.value, json!({"m": {"a": 1, "b": 2}}));
        assert_eq!(out.truncations.len(), 1);
        assert_eq!(out.truncations[0].path, "m");
        assert_eq!(out.truncations[0].original_len, 5);
        assert_eq!(out.truncations[0].retained, 2);

        let out = serializer()
            .serialize(&doc, &path("m.*"), &request)
            .expect("wildcard");
        assert_eq!(out.value, json!({"a": 1, "b": 2}));
        assert_eq!(out.truncations.len(), 1);
        assert_eq!(out.truncations[0].path, "m.*");
    }

    #[test]
    fn self_reference_becomes_cycle_marker() {
        let list = Value::list(vec![Value::Int(1)]);
        if let Value::List(inner) = &list {
            inner.write().push(list.clone());
        }
        let out = serializer()
            .serialize(&list, &Path::root(), &Request::new())
            .expect("serialize");
        assert_eq!(out.value, json!([1, "[Reference cycle: list]"]));
        assert_eq!(
            Marker::parse(&out.value[1]).map(|m| m.kind),
            Some(MarkerKind::Cycle)
        );
    }

    #[test]
    fn suppressed_faults_omit_nodes_and_filter_empty_parents() {
        let failing = || Err(Error::new(ErrorKind::Access).with_message("offline"));
        let bean = Value::object(
            PropertyBean::new("Probe")
                .with("ok", 1)
                .with_getter("bad", failing)
                .with("inner", Value::object(PropertyBean::new("Inner").with_getter("x", failing))),
        );
        let out = serializer()
            .serialize(&bean, &Path::root(), &Request::suppressing())
            .expect("serialize");
        assert_eq!(out.value, json!({"ok": 1}));

        let err = serializer()
            .serialize(&bean, &Path::root(), &Request::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Access);
        assert_eq!(err.path().map(ToString::to_string).as_deref(), Some("bad"));
    }

    #[test]
    fn entirely_filtered_root_returns_empty_container() {
        let bean = Value::object(
            PropertyBean::new("Broken")
                .with_getter("a", || Err(Error::new(ErrorKind::Access)))
                .with_getter("b", || Err(Error::new(ErrorKind::Access))),
        );
        let out = serializer()
            .serialize(&bean, &Path::root(), &Request::suppressing())
            .expect("serialize");
        assert_eq!(out.value, json!({}));
        assert!(out.filtered);
    }

    #[test]
    fn wildcard_applies_rest_to_every_child() {
        let doc = Value::from_structured(&json!({
            "x": {"port": 1, "host": "a"},
            "y": {"host": "b"},
            "z": {"port": 3}
        }));
        let out = serializer()
            .serialize(&doc, &path("*.port"), &Request::new())
            .expect("serialize");
        assert_eq!(out.value, json!({"x": 1, "z": 3}));

        let out = serializer()
            .serialize(&doc, &path("*.missing"), &Request::new())
            .expect("serialize");
        assert!(out.filtered);
        assert_eq!(out.value, json!({}));
    }

    #[test]
    fn addressed_read_failure_surfaces_under_suppression() {
        let bean = Value::object(
            PropertyBean::new("Probe")
                .with("ok", 1)
                .with_getter("status", || Err(Error::new(ErrorKind::Access).with_message("down"))),
        );
        let err = serializer()
            .serialize(&bean, &path("status"), &Request::suppressing())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Access);
        assert_eq!(err.path().map(ToString::to_string).as_deref(), Some("status"));
    }

    #[test]
    fn wildcard_levels_are_budgeted_like_containers() {
        let doc = Value::from_structured(&json!({"a": {"x": 1}, "b": {"y": 2}}));
        let request = Request::new().with_limits(Limits::default().with_max_objects(1));
        let out = serializer()
            .serialize(&doc, &path("*.*"), &request)
            .expect("objects");
        assert_eq!(
            out.value,
            json!({"a": "[Object limit 1 reached: map]", "b": "[Object limit 1 reached: map]"})
        );

        let request = Request::new().with_limits(Limits::default().with_max_depth(1));
        let whole = serializer()
            .serialize(&doc, &Path::root(), &request)
            .expect("whole");
        let expanded = serializer()
            .serialize(&doc, &path("*"), &request)
            .expect("wildcard");
        assert_eq!(expanded.value, whole.value);
        assert_eq!(expanded.value, json!({"a": "[Depth limit 1 reached: map]", "b": "[Depth limit 1 reached: map]"}));
        let nested = serializer()
            .serialize(&doc, &path("*.*"), &request)
            .expect("nested");
        assert_eq!(nested.value, expanded.value);
    }

    #[test]
    fn wildcard_over_sequence_keeps_shape() {
        let doc = Value::from_structured(&json!([{"id": 1}, {"id": 2}, {"other": 0}]));
        let out = serializer()
            .serialize(&doc, &path("*.id"), &Request::new())
            .expect("serialize");
        assert_eq!(out.value, json!([1, 2]));
    }

    #[test]
    fn simplified_objects_serialize_as_attribute_records() {
        let addr: std::net::SocketAddr = "10.0.0.1:80".parse().expect("addr");
        let doc = Value::record([("listen", Value::object(addr))]);
        let out = serializer()
            .serialize(&doc, &path("listen"), &Request::new())
            .expect("serialize");
        assert_eq!(
            out.value,
            json!({
                "ip": {"address": "10.0.0.1", "ipv6": false, "loopback": false},
                "port": 80,
                "ipv6": false,
                "loopback": false
            })
        );
        let err = serializer()
            .serialize(&doc, &path("listen.nope"), &Request::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathNotFound);
        assert_eq!(
            err.path().map(ToString::to_string).as_deref(),
            Some("listen.nope")
        );
    }

    #[test]
    fn zero_limits_are_rejected() {
        let request = Request::new().with_limits(Limits::default().with_max_depth(0));
        let err = serializer()
            .serialize(&Value::Null, &Path::root(), &request)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }
}
