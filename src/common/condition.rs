use crate::common;

use aws_sdk_dynamodb::types;
use serde::Serialize;
use serde_dynamo::{Result, to_attribute_value};
use std::collections;

/// Comparisons allowed in a key condition expression.
///
/// The partition key only accepts [`Condition::Equals`]; the sort key accepts all of them.
///
/// ```rust
/// use drive_data::common::condition;
///
/// let at = condition::Condition::Equals(1376395);
/// let window = condition::Condition::Between(1376000, 1377000);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Condition<T> {
    /// The attribute begins with a prefix (string keys only).
    BeginsWith(String),
    /// The attribute lies between two values, inclusive.
    Between(T, T),
    /// The attribute equals a value.
    Equals(T),
    /// The attribute is greater than a value.
    GreaterThan(T),
    /// The attribute is greater than or equal to a value.
    GreaterThanOrEqual(T),
    /// The attribute is less than a value.
    LessThan(T),
    /// The attribute is less than or equal to a value.
    LessThanOrEqual(T),
}

impl<T: Serialize> Condition<T> {
    fn compile(
        self,
        name_placeholder: &str,
        value_prefix: &str,
        index: &mut usize,
    ) -> Result<(String, collections::HashMap<String, types::AttributeValue>)> {
        let mut values = collections::HashMap::new();
        let mut bind = |suffix: &str, value: types::AttributeValue| {
            let placeholder = format!(":{value_prefix}_{suffix}{index}");
            *index += 1;
            values.insert(placeholder.clone(), value);
            placeholder
        };
        let expression = match self {
            Self::BeginsWith(prefix) => {
                let value = bind("begins_with", types::AttributeValue::S(prefix));
                format!("begins_with({name_placeholder}, {value})")
            }
            Self::Between(low, high) => {
                let low = bind("between", to_attribute_value(low)?);
                let high = bind("between", to_attribute_value(high)?);
                format!("{name_placeholder} BETWEEN {low} AND {high}")
            }
            Self::Equals(value) => {
                let value = bind("eq", to_attribute_value(value)?);
                format!("{name_placeholder} = {value}")
            }
            Self::GreaterThan(value) => {
                let value = bind("gt", to_attribute_value(value)?);
                format!("{name_placeholder} > {value}")
            }
            Self::GreaterThanOrEqual(value) => {
                let value = bind("gte", to_attribute_value(value)?);
                format!("{name_placeholder} >= {value}")
            }
            Self::LessThan(value) => {
                let value = bind("lt", to_attribute_value(value)?);
                format!("{name_placeholder} < {value}")
            }
            Self::LessThanOrEqual(value) => {
                let value = bind("lte", to_attribute_value(value)?);
                format!("{name_placeholder} <= {value}")
            }
        };
        Ok((expression, values))
    }
}

/// Condition applied to a key attribute.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyCondition<T> {
    /// The condition to apply to the attribute.
    pub condition: Condition<T>,
    /// The name of the key attribute.
    pub name: String,
}

impl<T> KeyCondition<T> {
    /// Equality on a key attribute.
    pub fn equals(name: impl Into<String>, value: T) -> Self {
        Self {
            condition: Condition::Equals(value),
            name: name.into(),
        }
    }
}

impl<T: Serialize> KeyCondition<T> {
    /// Compile the conditions into one expression joined with `AND`.
    ///
    /// Attribute names are bound in `names`, next to any placeholders the request
    /// already uses; the returned input only carries the expression and its values.
    pub(crate) fn get_expression_operation(
        keys: Vec<Self>,
        names: &mut collections::HashMap<String, String>,
    ) -> Result<common::ExpressionInput> {
        let mut index = 0;
        let mut operations = Vec::with_capacity(keys.len());
        for key in keys {
            let (placeholder, _) = common::add_placeholder(names, &[], &key.name);
            let value_prefix = common::sanitize(&key.name);
            let (expression, expression_attribute_values) =
                key.condition
                    .compile(&placeholder, &value_prefix, &mut index)?;
            operations.push(common::ExpressionInput {
                expression,
                expression_attribute_values,
                ..Default::default()
            });
        }
        Ok(common::ExpressionInput::merge(" AND ", operations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;
    use serde_json::Value;

    fn number(value: u64) -> Value {
        Value::Number(value.into())
    }

    #[rstest]
    #[case::partition_key_only(
        vec![
            KeyCondition::equals("driveid", number(20181120104743)),
        ],
        common::ExpressionInput {
            expression: "#driveid = :driveid_eq0".to_string(),
            expression_attribute_names: collections::HashMap::from(
                [
                    ("#driveid".to_string(), "driveid".to_string()),
                ]
            ),
            expression_attribute_values: collections::HashMap::from(
                [
                    (
                        ":driveid_eq0".to_string(),
                        types::AttributeValue::N(
                            "20181120104743".to_string()
                        )
                    ),
                ]
            ),
        }
    )]
    #[case::point_lookup(
        vec![
            KeyCondition::equals("driveid", number(20181120104743)),
            KeyCondition::equals("logtime", number(1376395)),
        ],
        common::ExpressionInput {
            expression: "#driveid = :driveid_eq0 AND #logtime = :logtime_eq1".to_string(),
            expression_attribute_names: collections::HashMap::from(
                [
                    ("#driveid".to_string(), "driveid".to_string()),
                    ("#logtime".to_string(), "logtime".to_string()),
                ]
            ),
            expression_attribute_values: collections::HashMap::from(
                [
                    (
                        ":driveid_eq0".to_string(),
                        types::AttributeValue::N(
                            "20181120104743".to_string()
                        )
                    ),
                    (
                        ":logtime_eq1".to_string(),
                        types::AttributeValue::N(
                            "1376395".to_string()
                        )
                    ),
                ]
            ),
        }
    )]
    #[case::between(
        vec![
            KeyCondition::equals("a", Value::String("b".to_string())),
            KeyCondition {
                name: "c".to_string(),
                condition: Condition::Between(number(1), number(9)),
            },
        ],
        common::ExpressionInput {
            expression: "#a = :a_eq0 AND #c BETWEEN :c_between1 AND :c_between2".to_string(),
            expression_attribute_names: collections::HashMap::from(
                [
                    ("#a".to_string(), "a".to_string()),
                    ("#c".to_string(), "c".to_string()),
                ]
            ),
            expression_attribute_values: collections::HashMap::from(
                [
                    (":a_eq0".to_string(), types::AttributeValue::S("b".to_string())),
                    (":c_between1".to_string(), types::AttributeValue::N("1".to_string())),
                    (":c_between2".to_string(), types::AttributeValue::N("9".to_string())),
                ]
            ),
        }
    )]
    #[case::begins_with_dashed_name(
        vec![
            KeyCondition::equals("a", Value::String("b".to_string())),
            KeyCondition {
                name: "file-name".to_string(),
                condition: Condition::BeginsWith("Recfile".to_string()),
            },
        ],
        common::ExpressionInput {
            expression: "#a = :a_eq0 AND begins_with(#file_name, :file_name_begins_with1)"
                .to_string(),
            expression_attribute_names: collections::HashMap::from(
                [
                    ("#a".to_string(), "a".to_string()),
                    ("#file_name".to_string(), "file-name".to_string()),
                ]
            ),
            expression_attribute_values: collections::HashMap::from(
                [
                    (":a_eq0".to_string(), types::AttributeValue::S("b".to_string())),
                    (
                        ":file_name_begins_with1".to_string(),
                        types::AttributeValue::S("Recfile".to_string())
                    ),
                ]
            ),
        }
    )]
    #[case::comparisons(
        vec![
            KeyCondition {
                name: "a".to_string(),
                condition: Condition::GreaterThan(number(1)),
            },
            KeyCondition {
                name: "b".to_string(),
                condition: Condition::GreaterThanOrEqual(number(2)),
            },
            KeyCondition {
                name: "c".to_string(),
                condition: Condition::LessThan(number(3)),
            },
            KeyCondition {
                name: "d".to_string(),
                condition: Condition::LessThanOrEqual(number(4)),
            },
        ],
        common::ExpressionInput {
            expression: "#a > :a_gt0 AND #b >= :b_gte1 AND #c < :c_lt2 AND #d <= :d_lte3"
                .to_string(),
            expression_attribute_names: collections::HashMap::from(
                [
                    ("#a".to_string(), "a".to_string()),
                    ("#b".to_string(), "b".to_string()),
                    ("#c".to_string(), "c".to_string()),
                    ("#d".to_string(), "d".to_string()),
                ]
            ),
            expression_attribute_values: collections::HashMap::from(
                [
                    (":a_gt0".to_string(), types::AttributeValue::N("1".to_string())),
                    (":b_gte1".to_string(), types::AttributeValue::N("2".to_string())),
                    (":c_lt2".to_string(), types::AttributeValue::N("3".to_string())),
                    (":d_lte3".to_string(), types::AttributeValue::N("4".to_string())),
                ]
            ),
        }
    )]
    #[case::colliding_names(
        vec![
            KeyCondition::equals("drive-id", number(1)),
            KeyCondition::equals("drive_id", number(2)),
        ],
        common::ExpressionInput {
            expression: "#drive_id = :drive_id_eq0 AND #drive_id1 = :drive_id_eq1".to_string(),
            expression_attribute_names: collections::HashMap::from(
                [
                    ("#drive_id".to_string(), "drive-id".to_string()),
                    ("#drive_id1".to_string(), "drive_id".to_string()),
                ]
            ),
            expression_attribute_values: collections::HashMap::from(
                [
                    (":drive_id_eq0".to_string(), types::AttributeValue::N("1".to_string())),
                    (":drive_id_eq1".to_string(), types::AttributeValue::N("2".to_string())),
                ]
            ),
        }
    )]
    fn test_key_conditions(
        #[case] keys: Vec<KeyCondition<Value>>,
        #[case] expected: common::ExpressionInput,
    ) {
        let mut names = collections::HashMap::new();
        let mut actual = KeyCondition::get_expression_operation(keys, &mut names).unwrap();
        actual.expression_attribute_names = names;
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_key_condition_avoids_bound_placeholders() {
        let mut names = collections::HashMap::from([(
            "#logtime".to_string(),
            "log-time".to_string(),
        )]);
        let keys = vec![
            KeyCondition::equals("driveid", number(20181120104743)),
            KeyCondition::equals("logtime", number(1376395)),
        ];
        let actual = KeyCondition::get_expression_operation(keys, &mut names).unwrap();
        assert_eq!(
            actual.expression,
            "#driveid = :driveid_eq0 AND #logtime1 = :logtime_eq1"
        );
        assert_eq!(
            names,
            collections::HashMap::from([
                ("#logtime".to_string(), "log-time".to_string()),
                ("#driveid".to_string(), "driveid".to_string()),
                ("#logtime1".to_string(), "logtime".to_string()),
            ])
        );
    }
}
