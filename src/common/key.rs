/// Named key attribute.
///
/// ```rust
/// use drive_data::common::key;
///
/// let key = key::Key {
///     name: "driveid".to_string(),
///     value: 20181120104743_u64,
/// };
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Key<T> {
    /// The attribute name of the key.
    pub name: String,
    /// The value of the key.
    pub value: T,
}

impl<T> Key<T> {
    /// Create a key from a name and a value.
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}
