//! Evaluation context for a block being rendered
//!
//! A context is a root mapping (the caller's data, or the current loop element)
//! plus a stack of binding frames. `<let>` bindings go into the innermost frame.
//! Conditional branches push a frame that is popped when the branch finishes,
//! and loop iterations get a brand new context, so bindings never leak into a
//! sibling branch, a sibling iteration or the enclosing block.

use crate::ast::Path;
use crate::value::Mapping;
use serde_json::Value;
use std::borrow::Cow;

/// What opened a binding frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Root,      // top-level render call
    Iteration, // one element of a loop
    Branch,    // selected conditional branch
}

#[derive(Debug, Clone)]
struct Frame {
    kind: ScopeKind,
    bindings: Mapping,
}

impl Frame {
    fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            bindings: Mapping::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Context<'a> {
    root: Option<&'a Mapping>,
    frames: Vec<Frame>,
    // Item variable of the enclosing loop; `item.` prefixes are stripped from paths
    item_name: Option<String>,
}

impl<'a> Context<'a> {
    pub fn new(root: &'a Mapping) -> Self {
        Self {
            root: Some(root),
            frames: vec![Frame::new(ScopeKind::Root)],
            item_name: None,
        }
    }

    /// Context for one loop iteration: the element itself (when it is a
    /// mapping) with the optional index variable bound on top.
    pub fn for_iteration(element: &'a Value, item_name: &str, index: Option<(&str, usize)>) -> Self {
        let mut frame = Frame::new(ScopeKind::Iteration);
        if let Some((index_name, position)) = index {
            frame.bindings.insert(index_name.to_string(), Value::from(position));
        }

        Self {
            root: element.as_object(),
            frames: vec![frame],
            item_name: Some(item_name.to_string()),
        }
    }

    pub fn item_name(&self) -> Option<&str> {
        self.item_name.as_deref()
    }

    /// Kind of the innermost frame
    pub fn scope_kind(&self) -> ScopeKind {
        self.frames.last().map_or(ScopeKind::Root, |frame| frame.kind)
    }

    /// Bind a name in the innermost frame
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.bindings.insert(name.into(), value);
        }
    }

    /// Run `f` inside a fresh branch frame; its bindings are dropped afterwards
    pub fn with_branch<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.frames.push(Frame::new(ScopeKind::Branch));
        let result = f(self);
        self.frames.pop();
        result
    }

    /// Look up a top-level name, searching from the innermost frame to the root
    pub fn get(&self, name: &str) -> Option<&Value> {
        for frame in self.frames.iter().rev() {
            if let Some(value) = frame.bindings.get(name) {
                return Some(value);
            }
        }
        self.root.and_then(|root| root.get(name))
    }

    /// Resolve a path against the context. `None` means absent: a missing key,
    /// an index out of range, or a step through `null` or a scalar.
    pub fn resolve(&self, path: &Path) -> Option<Cow<'_, Value>> {
        let mut segments = path.segments.as_slice();
        if let (Some(item), [first, rest @ ..]) = (self.item_name(), segments) {
            if first == item && !rest.is_empty() {
                segments = rest;
            }
        }

        let (first, rest) = segments.split_first()?;
        let mut current = Cow::Borrowed(self.get(first)?);
        for segment in rest {
            current = match current {
                Cow::Borrowed(value) => step(value, segment)?,
                Cow::Owned(value) => Cow::Owned(step(&value, segment)?.into_owned()),
            };
        }

        log::trace!("Resolved '{}' -> {}", path, current);
        Some(current)
    }

    /// Names bound in the innermost frame (for debugging)
    pub fn get_current_scope_bindings(&self) -> Vec<String> {
        self.frames
            .last()
            .map(|frame| frame.bindings.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// One traversal step. `length` is a computed property of sequences and strings.
fn step<'v>(value: &'v Value, segment: &str) -> Option<Cow<'v, Value>> {
    match value {
        Value::Object(map) => map.get(segment).map(Cow::Borrowed),
        Value::Array(items) => {
            if segment == "length" {
                return Some(Cow::Owned(Value::from(items.len())));
            }
            let index = segment.parse::<usize>().ok()?;
            items.get(index).map(Cow::Borrowed)
        }
        Value::String(s) if segment == "length" => Some(Cow::Owned(Value::from(s.chars().count()))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(text: &str) -> Path {
        Path::new(text.split('.').map(str::to_string).collect())
    }

    fn mapping(value: Value) -> Mapping {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_resolve_nested_paths() {
        let data = mapping(json!({
            "user": {"profile": {"name": "Ada"}},
            "items": [{"name": "first"}, {"name": "second"}],
            "gone": null
        }));
        let ctx = Context::new(&data);

        assert_eq!(ctx.resolve(&path("user.profile.name")).as_deref(), Some(&json!("Ada")));
        assert_eq!(ctx.resolve(&path("items.1.name")).as_deref(), Some(&json!("second")));
        assert_eq!(ctx.resolve(&path("items.length")).as_deref(), Some(&json!(2)));
        assert!(ctx.resolve(&path("items.5.name")).is_none());
        assert!(ctx.resolve(&path("gone.deeper")).is_none());
        assert!(ctx.resolve(&path("missing")).is_none());
    }

    #[test]
    fn test_branch_bindings_are_discarded() {
        let data = mapping(json!({"a": 1}));
        let mut ctx = Context::new(&data);
        ctx.bind("outer", json!("kept"));

        ctx.with_branch(|scope| {
            scope.bind("inner", json!("temporary"));
            assert_eq!(scope.scope_kind(), ScopeKind::Branch);
            assert_eq!(scope.get("outer"), Some(&json!("kept")));
            assert_eq!(scope.get("inner"), Some(&json!("temporary")));
        });

        assert_eq!(ctx.scope_kind(), ScopeKind::Root);
        assert!(ctx.get("inner").is_none());
        assert_eq!(ctx.get("outer"), Some(&json!("kept")));
    }

    #[test]
    fn test_iteration_strips_item_prefix() {
        let element = json!({"name": "Ada", "role": "admin"});
        let ctx = Context::for_iteration(&element, "emp", Some(("ix", 3)));

        assert_eq!(ctx.resolve(&path("emp.name")).as_deref(), Some(&json!("Ada")));
        assert_eq!(ctx.resolve(&path("role")).as_deref(), Some(&json!("admin")));
        assert_eq!(ctx.resolve(&path("ix")).as_deref(), Some(&json!(3)));
        // A bare item reference is looked up as an ordinary key
        assert!(ctx.resolve(&path("emp")).is_none());
    }

    #[test]
    fn test_iteration_over_scalar_has_empty_root() {
        let element = json!("plain");
        let ctx = Context::for_iteration(&element, "tag", None);
        assert!(ctx.resolve(&path("tag")).is_none());
        assert!(ctx.resolve(&path("tag.length")).is_none());
    }

    #[test]
    fn test_bindings_shadow_root() {
        let data = mapping(json!({"name": "data"}));
        let mut ctx = Context::new(&data);
        ctx.bind("name", json!("bound"));
        assert_eq!(ctx.get("name"), Some(&json!("bound")));
        assert_eq!(ctx.get_current_scope_bindings(), vec!["name".to_string()]);
    }
}
