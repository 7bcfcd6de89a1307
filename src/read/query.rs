use crate::error::{Error, Result};
use crate::read::common::{self as read_common, Item, Page, PageSource, ReadOutput, ReadRequest};
use crate::{common, read};

use aws_sdk_dynamodb::types;
use futures::Stream;
use serde::Serialize;

/// Query request in wire form.
///
/// Usually produced from a [`Query`], but it can also be written by hand with a raw
/// key condition expression. Placeholders are checked before the first page is
/// requested.
///
/// ```rust
/// use aws_sdk_dynamodb::types::AttributeValue;
/// use drive_data::read::query::QueryRequest;
///
/// let request = QueryRequest::new("honda-hackathon1", "driveid = :dId")
///     .bind_value(":dId", AttributeValue::N("20181120104743".to_string()));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryRequest {
    /// Key condition expression, e.g. `#driveid = :driveid_eq0`.
    pub key_condition_expression: String,
    /// Fields shared with scans.
    pub read: ReadRequest,
    /// Ascending (`true`, the default) or descending sort key order.
    pub scan_index_forward: Option<bool>,
}

impl QueryRequest {
    /// Create a request from a table name and a key condition expression.
    pub fn new(table_name: impl Into<String>, key_condition_expression: impl Into<String>) -> Self {
        Self {
            key_condition_expression: key_condition_expression.into(),
            read: ReadRequest::new(table_name),
            ..Default::default()
        }
    }

    /// Bind a `#name` placeholder to an attribute name.
    pub fn bind_name(mut self, placeholder: impl Into<String>, name: impl Into<String>) -> Self {
        self.read
            .expression_attribute_names
            .get_or_insert_with(Default::default)
            .insert(placeholder.into(), name.into());
        self
    }

    /// Bind a `:value` placeholder to a value.
    pub fn bind_value(
        mut self,
        placeholder: impl Into<String>,
        value: types::AttributeValue,
    ) -> Self {
        self.read
            .expression_attribute_values
            .get_or_insert_with(Default::default)
            .insert(placeholder.into(), value);
        self
    }

    /// Restrict the returned attributes with a raw projection expression.
    pub fn projection(mut self, projection_expression: impl Into<String>) -> Self {
        self.read.projection_expression = Some(projection_expression.into());
        self
    }

    /// Lazily fetch every page, starting from the first one on each call.
    pub fn pages<'a, S: PageSource>(&self, source: &'a S) -> impl Stream<Item = Result<Page>> + 'a {
        read_common::paginate(Ok(self.clone()), move |request| source.query_page(request))
    }

    /// Lazily fetch every item across all pages.
    pub fn items<'a, S: PageSource>(&self, source: &'a S) -> impl Stream<Item = Result<Item>> + 'a {
        read_common::flatten_items(self.pages(source))
    }

    /// Fetch every page and collect the items.
    pub async fn send<S: PageSource>(&self, source: &S) -> Result<ReadOutput> {
        read_common::collect_pages(self.pages(source)).await
    }
}

impl read_common::Paginated for QueryRequest {
    fn validate(&self) -> Result<()> {
        if self.key_condition_expression.is_empty() {
            return Err(Error::invalid("key condition expression must not be empty"));
        }
        self.read.validate(&[&self.key_condition_expression])
    }

    fn set_exclusive_start_key(&mut self, key: Item) {
        self.read.exclusive_start_key = Some(key);
    }
}

/// Query operation.
///
/// The partition key is always matched with equality; the sort key accepts any
/// [`Condition`](common::condition::Condition).
///
/// ```rust,no_run
/// use aws_sdk_dynamodb::Client;
/// use drive_data::{common, read};
///
/// # async fn example(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
/// let query = read::query::Query {
///     partition_key: common::key::Key::new("driveid", 20181120104743_u64),
///     sort_key_condition: Some(common::condition::KeyCondition::equals("logtime", 1376395)),
///     read_args: read::common::ReadArgs {
///         table_name: "honda-hackathon1".to_string(),
///         ..Default::default()
///     },
///     ..Default::default()
/// };
/// let output = query.send(client).await?;
/// println!("Retrieved {} logs", output.count());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query<T> {
    /// The partition key value to query for.
    pub partition_key: common::key::Key<T>,
    /// Table, projection, index and paging arguments.
    pub read_args: read::common::ReadArgs<T>,
    /// Ascending (`true`, the default) or descending sort key order.
    pub scan_index_forward: Option<bool>,
    /// Optional condition on the sort key.
    pub sort_key_condition: Option<common::condition::KeyCondition<T>>,
}

impl<T: Serialize> TryFrom<Query<T>> for QueryRequest {
    type Error = Error;

    fn try_from(query: Query<T>) -> Result<Self> {
        let mut read: ReadRequest = query.read_args.try_into()?;
        let partition_key = common::condition::KeyCondition::equals(
            query.partition_key.name,
            query.partition_key.value,
        );
        let keys = std::iter::once(partition_key)
            .chain(query.sort_key_condition)
            .collect();
        let names = read
            .expression_attribute_names
            .get_or_insert_with(Default::default);
        let key_condition = common::condition::KeyCondition::get_expression_operation(keys, names)?;
        let key_condition_expression = key_condition.merge_into(
            &mut read.expression_attribute_names,
            &mut read.expression_attribute_values,
        );
        Ok(Self {
            key_condition_expression,
            read,
            scan_index_forward: query.scan_index_forward,
        })
    }
}

impl<T: Serialize + Clone> Query<T> {
    /// Lazily fetch every page, starting from the first one on each call.
    pub fn pages<'a, S: PageSource>(&self, source: &'a S) -> impl Stream<Item = Result<Page>> + 'a {
        let request = QueryRequest::try_from(self.clone());
        read_common::paginate(request, move |request| source.query_page(request))
    }

    /// Lazily fetch every item across all pages.
    pub fn items<'a, S: PageSource>(&self, source: &'a S) -> impl Stream<Item = Result<Item>> + 'a {
        read_common::flatten_items(self.pages(source))
    }

    /// Execute the query, following continuation tokens until the last page.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "drive_data.query",
            skip_all,
            fields(table = %self.read_args.table_name, partition_key = %self.partition_key.name),
            err
        )
    )]
    pub async fn send<S: PageSource>(&self, source: &S) -> Result<ReadOutput> {
        read_common::collect_pages(self.pages(source)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::common::testing::{ScriptedPages, item, token};

    use futures::TryStreamExt;
    use rstest::rstest;
    use serde_json::Value;
    use std::collections;

    const TABLE: &str = "honda-hackathon1";
    const DRIVE_ID: u64 = 20181120104743;

    fn number(value: u64) -> Value {
        Value::Number(value.into())
    }

    fn drive_query() -> Query<Value> {
        Query {
            partition_key: common::key::Key::new("driveid", number(DRIVE_ID)),
            read_args: read::common::ReadArgs {
                table_name: TABLE.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[rstest]
    #[case::drive_scenario(
        drive_query(),
        QueryRequest {
            key_condition_expression: "#driveid = :driveid_eq0".to_string(),
            read: ReadRequest {
                expression_attribute_names: Some(
                    collections::HashMap::from(
                        [
                            ("#driveid".to_string(), "driveid".to_string()),
                        ]
                    )
                ),
                expression_attribute_values: Some(
                    collections::HashMap::from(
                        [
                            (
                                ":driveid_eq0".to_string(),
                                types::AttributeValue::N(
                                    "20181120104743".to_string()
                                )
                            ),
                        ]
                    )
                ),
                table_name: TABLE.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    )]
    #[case::specific_timestamp(
        Query {
            sort_key_condition: Some(
                common::condition::KeyCondition::equals("logtime", number(1376395))
            ),
            ..drive_query()
        },
        QueryRequest {
            key_condition_expression: "#driveid = :driveid_eq0 AND #logtime = :logtime_eq1"
                .to_string(),
            read: ReadRequest {
                expression_attribute_names: Some(
                    collections::HashMap::from(
                        [
                            ("#driveid".to_string(), "driveid".to_string()),
                            ("#logtime".to_string(), "logtime".to_string()),
                        ]
                    )
                ),
                expression_attribute_values: Some(
                    collections::HashMap::from(
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
                    )
                ),
                table_name: TABLE.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    )]
    #[case::gps_projection(
        Query {
            read_args: read::common::ReadArgs {
                selection: Some(
                    common::selection::SelectionMap::from_attributes(
                        ["GPS_Lat", "GPS_Lon", "GPS_Alt"]
                    )
                ),
                table_name: TABLE.to_string(),
                ..Default::default()
            },
            scan_index_forward: Some(false),
            ..drive_query()
        },
        QueryRequest {
            key_condition_expression: "#driveid = :driveid_eq0".to_string(),
            read: ReadRequest {
                expression_attribute_names: Some(
                    collections::HashMap::from(
                        [
                            ("#GPS_Alt".to_string(), "GPS_Alt".to_string()),
                            ("#GPS_Lat".to_string(), "GPS_Lat".to_string()),
                            ("#GPS_Lon".to_string(), "GPS_Lon".to_string()),
                            ("#driveid".to_string(), "driveid".to_string()),
                        ]
                    )
                ),
                expression_attribute_values: Some(
                    collections::HashMap::from(
                        [
                            (
                                ":driveid_eq0".to_string(),
                                types::AttributeValue::N(
                                    "20181120104743".to_string()
                                )
                            ),
                        ]
                    )
                ),
                projection_expression: Some(
                    "#GPS_Lat, #GPS_Lon, #GPS_Alt".to_string()
                ),
                table_name: TABLE.to_string(),
                ..Default::default()
            },
            scan_index_forward: Some(false),
        }
    )]
    #[case::projection_collides_with_key(
        Query {
            read_args: read::common::ReadArgs {
                selection: Some(
                    common::selection::SelectionMap::from_attributes(["drive_id", "logtime"])
                ),
                table_name: TABLE.to_string(),
                ..Default::default()
            },
            ..Query {
                partition_key: common::key::Key::new("drive-id", number(DRIVE_ID)),
                sort_key_condition: Some(
                    common::condition::KeyCondition::equals("logtime", number(1376395))
                ),
                ..drive_query()
            }
        },
        QueryRequest {
            key_condition_expression: "#drive_id1 = :drive_id_eq0 AND #logtime = :logtime_eq1"
                .to_string(),
            read: ReadRequest {
                expression_attribute_names: Some(
                    collections::HashMap::from(
                        [
                            ("#drive_id".to_string(), "drive_id".to_string()),
                            ("#drive_id1".to_string(), "drive-id".to_string()),
                            ("#logtime".to_string(), "logtime".to_string()),
                        ]
                    )
                ),
                expression_attribute_values: Some(
                    collections::HashMap::from(
                        [
                            (
                                ":drive_id_eq0".to_string(),
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
                    )
                ),
                projection_expression: Some(
                    "#drive_id, #logtime".to_string()
                ),
                table_name: TABLE.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    )]
    fn test_query(#[case] query: Query<Value>, #[case] expected: QueryRequest) {
        let actual: QueryRequest = query.try_into().unwrap();
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn test_drive_scenario_counts_every_page() {
        let source = ScriptedPages::with_page_sizes(&[500, 500, 37]);
        let output = drive_query().send(&source).await.unwrap();
        assert_eq!(output.count(), 1037);
        assert_eq!(output.pages, 3);
        assert_eq!(source.fetches(), 3);
    }

    #[rstest]
    #[case::found(vec![item(1376395)])]
    #[case::missing(vec![])]
    #[tokio::test]
    async fn test_specific_timestamp_returns_at_most_one_item(#[case] items: Vec<Item>) {
        let source = ScriptedPages::new(vec![Ok(Page {
            items: items.clone(),
            last_evaluated_key: None,
        })]);
        let query = Query {
            sort_key_condition: Some(common::condition::KeyCondition::equals(
                "logtime",
                number(1376395),
            )),
            ..drive_query()
        };
        let output = query.send(&source).await.unwrap();
        assert!(output.count() <= 1);
        assert_eq!(output.items, items);
    }

    #[tokio::test]
    async fn test_projection_is_sent_with_every_page() {
        let gps_item = |lat: &str| {
            collections::HashMap::from([
                ("GPS_Lat".to_string(), types::AttributeValue::N(lat.to_string())),
                ("GPS_Lon".to_string(), types::AttributeValue::N("-83.1".to_string())),
                ("GPS_Alt".to_string(), types::AttributeValue::N("271.2".to_string())),
            ])
        };
        let source = ScriptedPages::new(vec![
            Ok(Page {
                items: vec![gps_item("40.1")],
                last_evaluated_key: Some(token(0)),
            }),
            Ok(Page {
                items: vec![gps_item("40.2")],
                last_evaluated_key: None,
            }),
        ]);
        let selection = common::selection::SelectionMap::from_attributes([
            "GPS_Lat", "GPS_Lon", "GPS_Alt",
        ]);
        let allowed = selection.top_level_attributes();
        let query = Query {
            read_args: read::common::ReadArgs {
                selection: Some(selection.clone()),
                table_name: TABLE.to_string(),
                ..Default::default()
            },
            ..drive_query()
        };
        let output = query.send(&source).await.unwrap();
        assert_eq!(output.count(), 2);
        for item in &output.items {
            assert!(item.keys().all(|name| allowed.contains(&name.as_str())));
        }
        assert_eq!(
            *source.projections.lock().unwrap(),
            vec![Some("#GPS_Lat, #GPS_Lon, #GPS_Alt".to_string()); 2]
        );
    }

    #[tokio::test]
    async fn test_pages_restart_from_first_page() {
        let query = drive_query();
        let run = |first: u64, second: u64| {
            [
                Ok(Page {
                    items: vec![item(first)],
                    last_evaluated_key: Some(token(0)),
                }),
                Ok(Page {
                    items: vec![item(second)],
                    last_evaluated_key: None,
                }),
            ]
        };
        let source = ScriptedPages::new(run(1, 2).into_iter().chain(run(3, 4)).collect());
        let first: Vec<Item> = query.items(&source).try_collect().await.unwrap();
        let second: Vec<Item> = query.items(&source).try_collect().await.unwrap();
        assert_eq!(first, vec![item(1), item(2)]);
        assert_eq!(second, vec![item(3), item(4)]);
        assert_eq!(
            *source.start_keys.lock().unwrap(),
            vec![None, Some(token(0)), None, Some(token(0))]
        );
    }

    #[tokio::test]
    async fn test_similar_key_names_keep_separate_placeholders() {
        let source = ScriptedPages::with_page_sizes(&[1]);
        let query = Query {
            partition_key: common::key::Key::new("drive-id", number(1)),
            sort_key_condition: Some(common::condition::KeyCondition::equals(
                "drive_id",
                number(2),
            )),
            ..drive_query()
        };
        let request = QueryRequest::try_from(query.clone()).unwrap();
        let names = request.read.expression_attribute_names.unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(names.get("#drive_id").map(String::as_str), Some("drive-id"));
        assert_eq!(names.get("#drive_id1").map(String::as_str), Some("drive_id"));
        assert_eq!(query.send(&source).await.unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_raw_request_with_unbound_placeholder_fetches_nothing() {
        let source = ScriptedPages::with_page_sizes(&[1]);
        let request = QueryRequest::new(TABLE, "driveid = :dId and logtime = :t")
            .bind_value(":dId", types::AttributeValue::N(DRIVE_ID.to_string()));
        let result = request.send(&source).await;
        assert!(matches!(result, Err(Error::InvalidRequest { .. })));
        assert_eq!(source.fetches(), 0);
    }

    #[tokio::test]
    async fn test_raw_request_with_projection() {
        let source = ScriptedPages::with_page_sizes(&[2, 2]);
        let request = QueryRequest::new(TABLE, "driveid = :dId")
            .bind_value(":dId", types::AttributeValue::N(DRIVE_ID.to_string()))
            .projection("GPS_Lat, GPS_Lon, GPS_Alt");
        let output = request.send(&source).await.unwrap();
        assert_eq!(output.count(), 4);
        assert_eq!(source.fetches(), 2);
    }
}
