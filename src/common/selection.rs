use crate::common;

use indexmap::IndexMap;
use std::{collections, hash};

/// Attributes to return from a read (projection expression).
///
/// ```rust
/// use drive_data::common::selection;
///
/// let gps = selection::SelectionMap::from_attributes(["GPS_Lat", "GPS_Lon", "GPS_Alt"]);
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SelectionMap {
    /// A flat list of attribute names.
    Leaves(Vec<String>),
    /// Nested selection for map attributes, keyed by the parent attribute name.
    Node(IndexMap<String, SelectionMap>),
}

impl hash::Hash for SelectionMap {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        match self {
            Self::Leaves(leaves) => leaves.hash(state),
            Self::Node(map) => map.iter().for_each(|(key, value)| {
                key.hash(state);
                value.hash(state);
            }),
        }
    }
}

impl SelectionMap {
    /// Flat selection of top level attributes.
    pub fn from_attributes<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Leaves(attributes.into_iter().map(Into::into).collect())
    }

    /// Top level attribute names the projection returns.
    pub fn top_level_attributes(&self) -> Vec<&str> {
        match self {
            Self::Leaves(leaves) => leaves.iter().map(String::as_str).collect(),
            Self::Node(map) => map.keys().map(String::as_str).collect(),
        }
    }

    /// Compile into a projection expression, binding placeholders in `names`.
    fn compile(
        self,
        path: &[String],
        names: &mut collections::HashMap<String, String>,
    ) -> String {
        let expressions: Vec<String> = match self {
            Self::Leaves(leaves) => leaves
                .iter()
                .map(|leaf| common::add_placeholder(names, path, leaf).1.join("."))
                .collect(),
            Self::Node(map) => map
                .into_iter()
                .map(|(parent, children)| {
                    let (_, child_path) = common::add_placeholder(names, path, &parent);
                    children.compile(&child_path, names)
                })
                .filter(|expression| !expression.is_empty())
                .collect(),
        };
        expressions.join(", ")
    }
}

impl From<SelectionMap> for common::ExpressionInput {
    fn from(selection_map: SelectionMap) -> Self {
        let mut expression_attribute_names = collections::HashMap::new();
        let expression = selection_map.compile(&[], &mut expression_attribute_names);
        Self {
            expression,
            expression_attribute_names,
            ..Default::default()
        }
    }
}
