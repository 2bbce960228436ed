use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::runtime_value::Value;

/// A shared, mutable mapping from names to values.
///
/// Cloning a `Namespace` yields another handle to the same mapping; use
/// [`Namespace::copy`] for an independent snapshot.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    variables: Rc<RefCell<BTreeMap<String, Value>>>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.variables.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.borrow().contains_key(name)
    }

    pub fn insert(&self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.variables.borrow_mut().insert(name.into(), value)
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.variables.borrow_mut().remove(name)
    }

    pub fn clear(&self) {
        self.variables.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.variables.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.borrow().is_empty()
    }

    /// Names currently bound, in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.variables.borrow().keys().cloned().collect()
    }

    /// An independent shallow copy of this namespace.
    pub fn copy(&self) -> Namespace {
        Namespace {
            variables: Rc::new(RefCell::new(self.variables.borrow().clone())),
        }
    }

    /// True if both handles refer to the same mapping.
    pub fn same_as(&self, other: &Namespace) -> bool {
        Rc::ptr_eq(&self.variables, &other.variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_and_copies_do_not() {
        let namespace = Namespace::new();
        let shared = namespace.clone();
        let snapshot = namespace.copy();
        shared.insert("x", Value::Integer(1));
        assert_eq!(namespace.get("x"), Some(Value::Integer(1)));
        assert!(snapshot.is_empty());
        assert!(shared.same_as(&namespace));
        assert!(!snapshot.same_as(&namespace));
    }

    #[test]
    fn clear_and_remove() {
        let namespace = Namespace::new();
        namespace.insert("a", Value::None);
        namespace.insert("b", Value::None);
        assert_eq!(namespace.keys(), vec!["a".to_string(), "b".to_string()]);
        namespace.remove("a");
        assert_eq!(namespace.len(), 1);
        namespace.clear();
        assert!(namespace.is_empty());
    }
}
