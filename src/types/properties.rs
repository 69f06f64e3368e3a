//! Hierarchical name/value property store
//!
//! [`Properties`] is an ordered, multi-valued table of string values. A store may
//! have a parent: lookups that miss locally fall through to it, and name
//! iteration yields local names first, then the parent's. Services receive their
//! configured properties in this form and portlets their init parameters.

use std::fmt;
use std::sync::Arc;

use crate::types::error::{Error, Result};

/// A single name with one or more values
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    name: String,
    values: Vec<String>,
}

/// Ordered multi-valued property table with parent fallback
#[derive(Debug, Clone, Default)]
pub struct Properties {
    entries: Vec<Entry>,
    parent: Option<Arc<Properties>>,
}

impl Properties {
    /// Create an empty property table without a parent
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty property table delegating misses to `parent`
    pub fn with_parent(parent: Arc<Properties>) -> Self {
        Self {
            entries: Vec::new(),
            parent: Some(parent),
        }
    }

    /// Replace the parent table
    pub fn set_parent(&mut self, parent: Option<Arc<Properties>>) {
        self.parent = parent;
    }

    /// Parent table, if any
    pub fn parent(&self) -> Option<&Arc<Properties>> {
        self.parent.as_ref()
    }

    /// Number of local names. A name with several values counts once.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no local entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a value, appending to the values of an existing local entry
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.add_all(name, [value.into()]);
    }

    /// Add several values for one name
    pub fn add_all<I, V>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let name = name.into();
        let values = values.into_iter().map(Into::into);
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.values.extend(values),
            None => self.entries.push(Entry {
                name,
                values: values.collect(),
            }),
        }
    }

    /// Remove a name locally; if it is not local, remove it from the parent
    /// chain when that parent is not shared.
    ///
    /// Returns true if an entry was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        if let Some(pos) = self.entries.iter().position(|entry| entry.name == name) {
            self.entries.remove(pos);
            return true;
        }
        match self.parent.as_mut().and_then(Arc::get_mut) {
            Some(parent) => parent.remove(name),
            None => false,
        }
    }

    /// True if the name resolves locally or through a parent
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// First value for the name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.find(name)
            .and_then(|entry| entry.values.first())
            .map(String::as_str)
    }

    /// First value for the name as an owned string
    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get(name).map(str::to_string)
    }

    /// First value for the name, or `default`
    pub fn get_string_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or(default).to_string()
    }

    /// All values for the name
    pub fn get_strings(&self, name: &str) -> Option<&[String]> {
        self.find(name).map(|entry| entry.values.as_slice())
    }

    /// First value parsed as an integer
    pub fn get_integer(&self, name: &str) -> Result<Option<i64>> {
        self.get(name)
            .map(|value| {
                value.trim().parse::<i64>().map_err(|e| {
                    Error::config(format!("Property '{}' is not an integer ({}): {}", name, value, e))
                })
            })
            .transpose()
    }

    /// First value parsed as an integer, or `default` when absent
    pub fn get_integer_or(&self, name: &str, default: i64) -> Result<i64> {
        Ok(self.get_integer(name)?.unwrap_or(default))
    }

    /// First value interpreted as a boolean
    pub fn get_boolean(&self, name: &str) -> Result<Option<bool>> {
        self.get(name)
            .map(|value| {
                parse_boolean(value).ok_or_else(|| {
                    Error::config(format!("Property '{}' is not a boolean: {}", name, value))
                })
            })
            .transpose()
    }

    /// First value interpreted as a boolean, or `default` when absent
    pub fn get_boolean_or(&self, name: &str, default: bool) -> Result<bool> {
        Ok(self.get_boolean(name)?.unwrap_or(default))
    }

    /// Names in order: local entries first, then the parent's
    pub fn names(&self) -> Names<'_> {
        Names {
            current: Some(self),
            index: 0,
        }
    }

    /// Build a table from a TOML table, keeping document order.
    ///
    /// Strings, integers, floats and booleans become single values; arrays of
    /// those become multiple values.
    pub fn from_toml(table: &toml::Table) -> Result<Self> {
        let mut properties = Properties::new();
        for (name, value) in table {
            match value {
                toml::Value::Array(items) => {
                    let values = items
                        .iter()
                        .map(|item| scalar_to_string(name, item))
                        .collect::<Result<Vec<_>>>()?;
                    properties.add_all(name.as_str(), values);
                }
                scalar => properties.add(name.as_str(), scalar_to_string(name, scalar)?),
            }
        }
        Ok(properties)
    }

    fn find(&self, name: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.find(name)))
    }
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} = {}", entry.name, entry.values.join(", "))?;
        }
        write!(f, "]")
    }
}

/// Iterator over property names, walking up the parent chain
pub struct Names<'a> {
    current: Option<&'a Properties>,
    index: usize,
}

impl<'a> Iterator for Names<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let props = self.current?;
            if let Some(entry) = props.entries.get(self.index) {
                self.index += 1;
                return Some(entry.name.as_str());
            }
            self.current = props.parent.as_deref();
            self.index = 0;
        }
    }
}

fn parse_boolean(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn scalar_to_string(name: &str, value: &toml::Value) -> Result<String> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        toml::Value::Datetime(d) => Ok(d.to_string()),
        other => Err(Error::config(format!(
            "Property '{}' has unsupported type {}",
            name,
            other.type_str()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_add_appends_to_existing_entry() {
        let mut props = Properties::new();
        props.add("locale", "en");
        props.add("locale", "fr");
        props.add("title", "Home");

        assert_eq!(props.size(), 2);
        assert_eq!(props.get("locale"), Some("en"));
        assert_eq!(
            props.get_strings("locale"),
            Some(&["en".to_string(), "fr".to_string()][..])
        );
    }

    #[test]
    fn test_parent_lookup_and_names() {
        let mut parent = Properties::new();
        parent.add("shared", "p");
        parent.add("timeout", "30");
        let mut child = Properties::with_parent(Arc::new(parent));
        child.add("timeout", "5");
        child.add("own", "c");

        assert_eq!(child.get("shared"), Some("p"));
        assert_eq!(child.get_integer("timeout").unwrap(), Some(5));
        assert_eq!(child.size(), 2);
        let names: Vec<_> = child.names().collect();
        assert_eq!(names, vec!["timeout", "own", "shared", "timeout"]);
    }

    #[test]
    fn test_typed_getters() {
        let mut props = Properties::new();
        props.add("enabled", "Yes");
        props.add("count", "12");
        props.add("broken", "twelve");

        assert_eq!(props.get_boolean("enabled").unwrap(), Some(true));
        assert!(props.get_boolean_or("missing", false).is_ok_and(|b| !b));
        assert_eq!(props.get_integer_or("count", 0).unwrap(), 12);
        assert_eq!(props.get_integer_or("missing", 7).unwrap(), 7);
        assert!(matches!(props.get_integer("broken"), Err(Error::Config(_))));
        assert!(props.get_boolean("count").is_err());
        assert_eq!(props.get_string_or("missing", "x"), "x");
    }

    #[test]
    fn test_remove_falls_through_to_unshared_parent() {
        let mut parent = Properties::new();
        parent.add("a", "1");
        let mut child = Properties::with_parent(Arc::new(parent));
        assert!(child.remove("a"));
        assert!(!child.contains("a"));
        assert!(!child.remove("a"));
    }

    #[test]
    fn test_from_toml_keeps_order_and_arrays() {
        let table: toml::Table = toml::from_str(
            r#"
            zeta = "last-alpha-first-in-doc"
            retries = 3
            verbose = true
            hosts = ["a", "b"]
            "#,
        )
        .unwrap();
        let props = Properties::from_toml(&table).unwrap();

        let names: Vec<_> = props.names().collect();
        assert_eq!(names, vec!["zeta", "retries", "verbose", "hosts"]);
        assert_eq!(props.get_integer("retries").unwrap(), Some(3));
        assert_eq!(props.get_boolean("verbose").unwrap(), Some(true));
        assert_eq!(props.get_strings("hosts").map(|v| v.len()), Some(2));
        assert_eq!(props.to_string(), "[zeta = last-alpha-first-in-doc, retries = 3, verbose = true, hosts = a, b]");
    }

    #[test]
    fn test_from_toml_rejects_nested_tables() {
        let table: toml::Table = toml::from_str("[nested]\nkey = 1").unwrap();
        assert!(Properties::from_toml(&table).is_err());
    }

    proptest! {
        #[test]
        fn prop_names_follow_first_insertion_order(keys in proptest::collection::vec("[a-e]", 1..20)) {
            let mut props = Properties::new();
            for key in &keys {
                props.add(key.as_str(), "v");
            }
            let mut expected: Vec<&str> = Vec::new();
            for key in &keys {
                if !expected.contains(&key.as_str()) {
                    expected.push(key.as_str());
                }
            }
            let names: Vec<&str> = props.names().collect();
            prop_assert_eq!(names, expected);
            prop_assert_eq!(props.size(), props.names().count());
        }
    }
}
