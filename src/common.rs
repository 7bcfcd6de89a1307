//! Expression building shared by the readers.
//!
//! Key conditions and projections are described with structured types and compiled
//! into DynamoDB expression strings with `#name` and `:value` placeholders.

/// Key conditions for the partition and sort key.
pub mod condition;

/// Named key attributes.
pub mod key;

/// Attribute selection for projection expressions.
pub mod selection;

use aws_sdk_dynamodb::types;
use std::collections;

/// Placeholder-safe form of an attribute name.
pub(crate) fn sanitize(identifier: &str) -> String {
    identifier
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Bind `identifier` to a `#name` placeholder in `names` and extend `path` with it.
///
/// An identifier that is already bound keeps its placeholder. Distinct identifiers that
/// sanitize to the same text get a numeric suffix, so no two names share a placeholder.
pub(crate) fn add_placeholder(
    names: &mut collections::HashMap<String, String>,
    path: &[String],
    identifier: &str,
) -> (String, Vec<String>) {
    let bound = names
        .iter()
        .find(|(_, name)| name.as_str() == identifier)
        .map(|(placeholder, _)| placeholder.clone());
    let placeholder = match bound {
        Some(placeholder) => placeholder,
        None => {
            let base = format!("#{}", sanitize(identifier));
            let mut placeholder = base.clone();
            let mut suffix = 0;
            while names.contains_key(&placeholder) {
                suffix += 1;
                placeholder = format!("{base}{suffix}");
            }
            names.insert(placeholder.clone(), identifier.to_string());
            placeholder
        }
    };
    let mut new_path = Vec::with_capacity(path.len() + 1);
    new_path.extend_from_slice(path);
    new_path.push(placeholder.clone());
    (placeholder, new_path)
}

/// A compiled expression together with the placeholders it references.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ExpressionInput {
    pub(crate) expression: String,
    pub(crate) expression_attribute_names: collections::HashMap<String, String>,
    pub(crate) expression_attribute_values: collections::HashMap<String, types::AttributeValue>,
}

impl ExpressionInput {
    pub(crate) fn merge(separator: &str, items: Vec<Self>) -> Self {
        let mut merged = Self::default();
        let mut expressions = Vec::with_capacity(items.len());
        for item in items {
            merged
                .expression_attribute_names
                .extend(item.expression_attribute_names);
            merged
                .expression_attribute_values
                .extend(item.expression_attribute_values);
            if !item.expression.is_empty() {
                expressions.push(item.expression);
            }
        }
        merged.expression = expressions.join(separator);
        merged
    }

    /// Move the placeholders into request level maps and return the bare expression.
    pub(crate) fn merge_into(
        self,
        names: &mut Option<collections::HashMap<String, String>>,
        values: &mut Option<collections::HashMap<String, types::AttributeValue>>,
    ) -> String {
        if !self.expression_attribute_names.is_empty() {
            names
                .get_or_insert_with(Default::default)
                .extend(self.expression_attribute_names);
        }
        if !self.expression_attribute_values.is_empty() {
            values
                .get_or_insert_with(Default::default)
                .extend(self.expression_attribute_values);
        }
        self.expression
    }
}
