//! The value model and record interface the engine operates on.
//!
//! Hosts adapt their concrete record types into this model before evaluation:
//! a [`Record`] is a schema-carrying mapping from named fields to values, and
//! a [`Value`] is either an owned scalar or a shared handle to a record, map,
//! or array. Aggregates sit behind `Rc<RefCell<..>>` so that field values
//! produced by path evaluation can write through to the backing storage the
//! host handed in.
//!
//! Dates are a single concept of "moment": milliseconds since the Unix epoch.

use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

/// Shared handle to a mutable [`Record`].
pub type RecordRef = Rc<RefCell<Record>>;

/// Shared handle to a mutable string-keyed map. Iteration follows insertion order.
pub type MapRef = Rc<RefCell<IndexMap<String, Value>>>;

/// Shared handle to a mutable array.
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

/// Shared handle to an immutable [`Schema`].
pub type SchemaRef = Rc<Schema>;

/// The data type of a record field slot.
#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Decimal,
    String,
    Date,
    Time,
    Timestamp,
    Uuid,
    Char,
    /// An array whose elements share one type.
    Array(Box<DataType>),
    /// A map from string keys to values of one type.
    Map(Box<DataType>),
    /// A nested record. The schema may be absent when it is not known
    /// statically (e.g. synthesized descriptors for parsed JSON).
    Record(Option<SchemaRef>),
    /// A value that may take any of several types.
    Choice(Vec<DataType>),
    /// The absent/null marker type.
    Null,
}

/// Describes one named, typed slot of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    name: String,
    data_type: DataType,
    nullable: bool,
}

impl FieldDescriptor {
    /// Creates a nullable field descriptor.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    /// Creates a descriptor with explicit nullability.
    pub fn with_nullable(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }
}

/// An ordered list of field descriptors.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    /// Wraps this schema in a shared handle.
    pub fn into_ref(self) -> SchemaRef {
        Rc::new(self)
    }

    /// The descriptors in schema order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up a descriptor by field name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A runtime value: an owned scalar or a shared handle to an aggregate.
///
/// Scalars are stored inline. Records, maps, and arrays are `Rc<RefCell<..>>`
/// handles, so cloning a `Value` never deep-copies an aggregate and mutations
/// through one handle are visible through every other.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    /// All integral types (byte through long, and char codepoints) collapse
    /// to `i64` at runtime; the slot's [`DataType`] keeps the declared width.
    Long(i64),
    /// Float and double collapse to `f64` at runtime.
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    /// A moment: milliseconds since the Unix epoch.
    Date(i64),
    Record(RecordRef),
    Array(ArrayRef),
    Map(MapRef),
}

impl Value {
    /// Builds an array value from owned elements.
    pub fn array(elements: Vec<Value>) -> Self {
        Self::Array(Rc::new(RefCell::new(elements)))
    }

    /// Builds a map value from owned entries, preserving their order.
    pub fn map(entries: IndexMap<String, Value>) -> Self {
        Self::Map(Rc::new(RefCell::new(entries)))
    }

    /// Builds a record value from an owned record.
    pub fn record(record: Record) -> Self {
        Self::Record(record.into_ref())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Infers the data type of this value.
    ///
    /// Integral values report `Long` and floating values `Double`; the
    /// declared slot type lives on the field descriptor, not here.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Null => DataType::Null,
            Self::Boolean(_) => DataType::Boolean,
            Self::Long(_) => DataType::Long,
            Self::Double(_) => DataType::Double,
            Self::String(_) => DataType::String,
            Self::Bytes(_) => DataType::Array(Box::new(DataType::Byte)),
            Self::Date(_) => DataType::Timestamp,
            Self::Record(rec) => DataType::Record(Some(rec.borrow().schema().clone())),
            Self::Array(arr) => {
                let element = arr.borrow().first().map_or(DataType::Null, Value::data_type);
                DataType::Array(Box::new(element))
            }
            Self::Map(map) => {
                let element = map
                    .borrow()
                    .values()
                    .next()
                    .map_or(DataType::Null, Value::data_type);
                DataType::Map(Box::new(element))
            }
        }
    }

    /// A short name for the value's runtime type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Long(_) => "long",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Date(_) => "date",
            Self::Record(_) => "record",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Long(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

/// A schema-carrying mapping from named fields to values.
///
/// `get_value` distinguishes an absent field (`None`) from a field set to
/// null (`Some(Value::Null)`); path evaluation relies on that distinction.
/// Field enumeration follows schema order regardless of insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: SchemaRef,
    values: IndexMap<String, Value>,
}

impl Record {
    /// Creates an empty record over the given schema.
    pub fn new(schema: SchemaRef) -> Self {
        Self {
            schema,
            values: IndexMap::new(),
        }
    }

    /// Creates a record and populates it from `(name, value)` pairs.
    pub fn with_values<N: Into<String>>(schema: SchemaRef, values: impl IntoIterator<Item = (N, Value)>) -> Self {
        let mut record = Self::new(schema);
        for (name, value) in values {
            record.set_value(name, value);
        }
        record
    }

    /// Wraps this record in a shared handle.
    pub fn into_ref(self) -> RecordRef {
        Rc::new(RefCell::new(self))
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Reads a field by name. `None` means the field has never been set.
    pub fn get_value(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    /// Writes a field by name, inserting or overwriting.
    pub fn set_value(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// True if the field has been set (possibly to null).
    pub fn has_value(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_schema() -> SchemaRef {
        Schema::new(vec![
            FieldDescriptor::new("id", DataType::Int),
            FieldDescriptor::new("name", DataType::String),
        ])
        .into_ref()
    }

    #[test]
    fn get_value_distinguishes_absent_from_null() {
        let mut record = Record::new(person_schema());
        assert_eq!(record.get_value("id"), None, "unset field should read as absent");

        record.set_value("id", Value::Null);
        assert_eq!(
            record.get_value("id"),
            Some(Value::Null),
            "a field set to null is present"
        );
    }

    #[test]
    fn aggregate_values_share_backing_storage() {
        let array = Value::array(vec![Value::Long(1), Value::Long(2)]);
        let alias = array.clone();

        if let Value::Array(arr) = &array {
            arr.borrow_mut()[0] = Value::Long(99);
        }
        if let Value::Array(arr) = &alias {
            assert_eq!(arr.borrow()[0], Value::Long(99), "clone should alias the same array");
        }
    }

    #[test]
    fn data_type_inference_covers_aggregates() {
        let array = Value::array(vec![Value::Long(1)]);
        assert_eq!(array.data_type(), DataType::Array(Box::new(DataType::Long)));

        let record = Record::new(person_schema());
        let value = Value::record(record);
        assert!(matches!(value.data_type(), DataType::Record(Some(_))));
    }

    #[test]
    fn schema_lookup_by_name() {
        let schema = person_schema();
        assert_eq!(schema.field("name").map(FieldDescriptor::name), Some("name"));
        assert_eq!(schema.field("missing"), None);
    }
}
