//! Field-selection trees handed over by the query-language layer.
//!
//! A selection set is an ordered list of selected fields. Each field may carry
//! a child selection; a field with an empty child selection is a leaf. Field
//! names are unique within one set: selecting the same name twice merges the
//! two selections, keeping the position of the first occurrence.

use serde::{Deserialize, Serialize};

/// An ordered set of selected fields at one level of the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSet {
    fields: Vec<SelectedField>,
}

/// One selected field and its child selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedField {
    name: String,
    selection: SelectionSet,
}

impl SelectionSet {
    /// Create an empty selection set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a leaf field.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.push(SelectedField::leaf(name));
        self
    }

    /// Add several leaf fields in order.
    pub fn fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.push(SelectedField::leaf(name));
        }
        self
    }

    /// Add a field with a child selection.
    pub fn relation(mut self, name: impl Into<String>, selection: SelectionSet) -> Self {
        self.push(SelectedField::new(name, selection));
        self
    }

    /// Add a selected field, merging it into an existing field of the same name.
    pub fn push(&mut self, field: SelectedField) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => existing.selection.merge(field.selection),
            None => self.fields.push(field),
        }
    }

    /// Merge another selection set into this one.
    pub fn merge(&mut self, other: SelectionSet) {
        for field in other.fields {
            self.push(field);
        }
    }

    /// Selected fields in request order.
    pub fn iter(&self) -> impl Iterator<Item = &SelectedField> {
        self.fields.iter()
    }

    /// Look up a selected field by name.
    pub fn get(&self, name: &str) -> Option<&SelectedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check whether a field is selected at this level.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl SelectedField {
    /// Create a field with a child selection.
    pub fn new(name: impl Into<String>, selection: SelectionSet) -> Self {
        Self {
            name: name.into(),
            selection,
        }
    }

    /// Create a leaf field.
    pub fn leaf(name: impl Into<String>) -> Self {
        Self::new(name, SelectionSet::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    /// A field with no child selection.
    pub fn is_leaf(&self) -> bool {
        self.selection.is_empty()
    }
}

impl<'a> IntoIterator for &'a SelectionSet {
    type Item = &'a SelectedField;
    type IntoIter = std::slice::Iter<'a, SelectedField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        SelectionSet::new().fields(iter)
    }
}
