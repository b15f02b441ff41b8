//! Field values: the transient unit produced by path evaluation.
//!
//! A field value pairs a value with the descriptor of the slot it was read
//! from, an owning chain of ancestor field values, and a writeback target.
//! The writeback target is a tagged variant covering the three shapes of
//! backing storage (record slot, map entry, array slot) plus `None` for
//! values with no backing slot (the root, literals, function results).
//!
//! Field values are ephemeral: they are valid for the lifetime of the result
//! stream that produced them, and updating one writes through to the
//! host-owned backing storage immediately.

use std::rc::Rc;

use crate::{
    error::{PathError, PathErrorKind, PathResult},
    record::{ArrayRef, DataType, FieldDescriptor, MapRef, RecordRef, Value},
};

/// A value produced by path evaluation, with enough context to update it
/// in place.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    value: Value,
    descriptor: Rc<FieldDescriptor>,
    parent: Option<Rc<FieldValue>>,
    writeback: Writeback,
}

/// Where an updated value is written.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Writeback {
    /// No backing slot: the root record, literals, and function results.
    None,
    /// A named field of a record.
    RecordField { record: RecordRef, field: String },
    /// A keyed entry of a map.
    MapEntry { map: MapRef, key: String },
    /// An indexed slot of an array.
    ArrayElement { array: ArrayRef, index: usize },
}

impl FieldValue {
    /// Wraps the root record of an evaluation. The root has no parent and no
    /// writeback target.
    pub(crate) fn root(record: RecordRef) -> Self {
        let schema = record.borrow().schema().clone();
        Self {
            value: Value::Record(record),
            descriptor: Rc::new(FieldDescriptor::new("root", DataType::Record(Some(schema)))),
            parent: None,
            writeback: Writeback::None,
        }
    }

    pub(crate) fn new(
        value: Value,
        descriptor: Rc<FieldDescriptor>,
        parent: Option<Rc<FieldValue>>,
        writeback: Writeback,
    ) -> Self {
        Self {
            value,
            descriptor,
            parent,
            writeback,
        }
    }

    /// A standalone value with no slot identity: literals and built values.
    pub(crate) fn standalone(value: Value, name: &str) -> Self {
        let descriptor = Rc::new(FieldDescriptor::new(name, value.data_type()));
        Self {
            value,
            descriptor,
            parent: None,
            writeback: Writeback::None,
        }
    }

    /// The result of applying a function to this field value: keeps the slot
    /// name and ancestry, retypes the descriptor from the new value, and has
    /// no writeback target.
    pub(crate) fn with_function_result(&self, value: Value) -> Self {
        let descriptor = Rc::new(FieldDescriptor::new(self.descriptor.name(), value.data_type()));
        Self {
            value,
            descriptor,
            parent: self.parent.clone(),
            writeback: Writeback::None,
        }
    }

    /// The current value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consumes the field value, returning the value alone.
    pub fn into_value(self) -> Value {
        self.value
    }

    /// The descriptor of the slot this value was read from. For map entries
    /// and array elements the descriptor is synthesized from the container's
    /// element type and carries the container field's name.
    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    /// The enclosing field value, if any.
    pub fn parent(&self) -> Option<&FieldValue> {
        self.parent.as_deref()
    }

    /// The nearest enclosing record, found by walking the parent chain.
    pub fn parent_record(&self) -> Option<RecordRef> {
        let mut current = self.parent.as_deref();
        while let Some(ancestor) = current {
            if let Value::Record(record) = ancestor.value() {
                return Some(record.clone());
            }
            current = ancestor.parent.as_deref();
        }
        None
    }

    /// The element index, present iff this field value names an array element.
    pub fn array_index(&self) -> Option<usize> {
        match &self.writeback {
            Writeback::ArrayElement { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Writes a new value through to the backing storage this field value was
    /// read from. The engine performs no coercion here; type compatibility
    /// with the slot is the host's concern.
    pub fn update_value(&self, new_value: Value) -> PathResult<()> {
        match &self.writeback {
            Writeback::None => Err(PathError::eval(
                PathErrorKind::NoWriteback,
                format!("field '{}' has no backing slot to update", self.descriptor.name()),
            )),
            Writeback::RecordField { record, field } => {
                record.borrow_mut().set_value(field.clone(), new_value);
                Ok(())
            }
            Writeback::MapEntry { map, key } => {
                map.borrow_mut().insert(key.clone(), new_value);
                Ok(())
            }
            Writeback::ArrayElement { array, index } => {
                let mut array = array.borrow_mut();
                match array.get_mut(*index) {
                    Some(slot) => {
                        *slot = new_value;
                        Ok(())
                    }
                    None => Err(PathError::eval(
                        PathErrorKind::NoWriteback,
                        format!("array slot {index} no longer exists"),
                    )),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::record::{Record, Schema};

    fn sample_record() -> RecordRef {
        let schema = Schema::new(vec![FieldDescriptor::new("name", DataType::String)]).into_ref();
        Record::with_values(schema, [("name", Value::from("John"))]).into_ref()
    }

    #[test]
    fn updating_the_root_fails_with_no_writeback() {
        let root = FieldValue::root(sample_record());
        let err = root
            .update_value(Value::Null)
            .expect_err("root has no backing slot");
        assert_eq!(err.kind(), PathErrorKind::NoWriteback);
    }

    #[test]
    fn record_field_writeback_updates_the_record() {
        let record = sample_record();
        let root = Rc::new(FieldValue::root(record.clone()));
        let field = FieldValue::new(
            Value::from("John"),
            Rc::new(FieldDescriptor::new("name", DataType::String)),
            Some(root),
            Writeback::RecordField {
                record: record.clone(),
                field: "name".to_owned(),
            },
        );

        field.update_value(Value::from("Jane")).expect("update should succeed");
        assert_eq!(record.borrow().get_value("name"), Some(Value::from("Jane")));
    }

    #[test]
    fn parent_record_walks_past_non_record_ancestors() {
        let record = sample_record();
        let root = Rc::new(FieldValue::root(record.clone()));
        let array = Value::array(vec![Value::Long(1)]);
        let array_field = Rc::new(FieldValue::new(
            array.clone(),
            Rc::new(FieldDescriptor::new("numbers", DataType::Array(Box::new(DataType::Long)))),
            Some(root),
            Writeback::None,
        ));
        let Value::Array(array_ref) = array else { unreachable!() };
        let element = FieldValue::new(
            Value::Long(1),
            Rc::new(FieldDescriptor::new("numbers", DataType::Long)),
            Some(array_field),
            Writeback::ArrayElement {
                array: array_ref,
                index: 0,
            },
        );

        assert_eq!(element.array_index(), Some(0));
        let parent_record = element.parent_record().expect("element should find the root record");
        assert_eq!(parent_record.borrow().get_value("name"), Some(Value::from("John")));
    }
}
