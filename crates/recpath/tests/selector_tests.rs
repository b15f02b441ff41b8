//! End-to-end coverage of the selector vocabulary: children, wildcards,
//! descendants, parents, array indices and ranges, map keys, and the
//! writeback behavior of each.

use pretty_assertions::assert_eq;
use recpath::{
    DataType, FieldDescriptor, PathErrorKind, Record, RecordPath, RecordRef, Schema, Value,
};

/// `{id: 48, name: "John Doe", mainAccount: {id: 1, balance: 123.45}}`
fn account_record() -> RecordRef {
    let account_schema = Schema::new(vec![
        FieldDescriptor::new("id", DataType::Int),
        FieldDescriptor::new("balance", DataType::Double),
    ])
    .into_ref();
    let account = Record::with_values(
        account_schema.clone(),
        [("id", Value::Long(1)), ("balance", Value::Double(123.45))],
    );
    let schema = Schema::new(vec![
        FieldDescriptor::new("id", DataType::Int),
        FieldDescriptor::new("name", DataType::String),
        FieldDescriptor::new("mainAccount", DataType::Record(Some(account_schema))),
    ])
    .into_ref();
    Record::with_values(
        schema,
        [
            ("id", Value::Long(48)),
            ("name", Value::from("John Doe")),
            ("mainAccount", Value::record(account)),
        ],
    )
    .into_ref()
}

/// `{numbers: [0, 1, 2, 3, 4, 5, 6, 7, 8, 9]}`
fn numbers_record() -> RecordRef {
    let schema = Schema::new(vec![FieldDescriptor::new(
        "numbers",
        DataType::Array(Box::new(DataType::Int)),
    )])
    .into_ref();
    let numbers = Value::array((0..10).map(Value::Long).collect());
    Record::with_values(schema, [("numbers", numbers)]).into_ref()
}

/// `{attrs: {city: "NY", state: "NY"}}`
fn attrs_record() -> RecordRef {
    let schema = Schema::new(vec![FieldDescriptor::new(
        "attrs",
        DataType::Map(Box::new(DataType::String)),
    )])
    .into_ref();
    let mut entries = indexmap::IndexMap::new();
    entries.insert("city".to_owned(), Value::from("NY"));
    entries.insert("state".to_owned(), Value::from("NY"));
    Record::with_values(schema, [("attrs", Value::map(entries))]).into_ref()
}

fn values_of(path: &str, record: &RecordRef) -> Vec<Value> {
    RecordPath::compile(path)
        .expect("path should compile")
        .evaluate(record)
        .collect_fields()
        .expect("evaluation should succeed")
        .into_iter()
        .map(|fv| fv.value().clone())
        .collect()
}

#[test]
fn child_path_selects_the_named_field() {
    let record = account_record();
    let fields = RecordPath::compile("/name")
        .expect("path should compile")
        .evaluate(&record)
        .collect_fields()
        .expect("evaluation should succeed");

    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].value(), &Value::from("John Doe"));
    assert_eq!(fields[0].descriptor().name(), "name");

    // Round trip: the parent record resolves the same value by name.
    let parent = fields[0].parent_record().expect("field should have a parent record");
    assert_eq!(parent.borrow().get_value("name"), Some(Value::from("John Doe")));
}

#[test]
fn missing_fields_produce_an_empty_result_not_null() {
    let record = account_record();
    assert_eq!(values_of("/nope", &record), Vec::<Value>::new());

    // A field explicitly set to null is present, and distinguishable.
    record.borrow_mut().set_value("name", Value::Null);
    assert_eq!(values_of("/name", &record), vec![Value::Null]);
}

#[test]
fn a_schema_field_never_set_reads_as_null_and_accepts_updates() {
    let schema = Schema::new(vec![FieldDescriptor::new("pending", DataType::String)]).into_ref();
    let record = Record::new(schema).into_ref();

    let fields = RecordPath::compile("/pending")
        .expect("path should compile")
        .evaluate(&record)
        .collect_fields()
        .expect("evaluation should succeed");
    assert_eq!(fields.len(), 1, "schema fields are addressable before first write");
    assert_eq!(fields[0].value(), &Value::Null);

    fields[0]
        .update_value(Value::from("set"))
        .expect("update should write through");
    assert_eq!(record.borrow().get_value("pending"), Some(Value::from("set")));
}

#[test]
fn the_root_path_selects_the_root_and_rejects_updates() {
    let record = account_record();
    let fields = RecordPath::compile("/")
        .expect("root path should compile")
        .evaluate(&record)
        .collect_fields()
        .expect("evaluation should succeed");

    assert_eq!(fields.len(), 1);
    assert!(matches!(fields[0].value(), Value::Record(_)));
    assert!(fields[0].parent().is_none());

    let err = fields[0]
        .update_value(Value::Null)
        .expect_err("the root has no backing slot");
    assert_eq!(err.kind(), PathErrorKind::NoWriteback);
}

#[test]
fn wildcard_iterates_record_fields_in_schema_order() {
    let record = account_record();
    let fields = RecordPath::compile("/*")
        .expect("path should compile")
        .evaluate(&record)
        .collect_fields()
        .expect("evaluation should succeed");

    let names: Vec<_> = fields.iter().map(|fv| fv.descriptor().name().to_owned()).collect();
    assert_eq!(names, vec!["id", "name", "mainAccount"]);
    assert_eq!(fields[0].value(), &Value::Long(48));
}

#[test]
fn descendant_selection_walks_in_pre_order() {
    // Scenario: //id over the account record yields 48 then 1.
    let record = account_record();
    let fields = RecordPath::compile("//id")
        .expect("path should compile")
        .evaluate(&record)
        .collect_fields()
        .expect("evaluation should succeed");

    let values: Vec<_> = fields.iter().map(|fv| fv.value().clone()).collect();
    assert_eq!(values, vec![Value::Long(48), Value::Long(1)]);

    // The shallow match hangs off the root; the deep one off mainAccount.
    assert!(fields[0].parent().is_some_and(|p| p.parent().is_none()));
    let deep_parent = fields[1].parent().expect("nested id should have a parent");
    assert_eq!(deep_parent.descriptor().name(), "mainAccount");
}

#[test]
fn parent_step_climbs_back_up() {
    let record = account_record();
    assert_eq!(
        values_of("/mainAccount/id/../balance", &record),
        vec![Value::Double(123.45)]
    );
    // The parent of a top-level field is the root record itself.
    let root_values = values_of("/name/..", &record);
    assert_eq!(root_values.len(), 1);
    assert!(matches!(root_values[0], Value::Record(_)));
}

#[test]
fn array_index_list_selects_in_listed_order_with_negatives() {
    // Scenario: /numbers[3,6,-1,-2] yields 3, 6, 9, 8; updating each with 99
    // leaves [0,1,2,99,4,5,99,7,99,99].
    let record = numbers_record();
    let fields = RecordPath::compile("/numbers[3,6,-1,-2]")
        .expect("path should compile")
        .evaluate(&record)
        .collect_fields()
        .expect("evaluation should succeed");

    let values: Vec<_> = fields.iter().map(|fv| fv.value().clone()).collect();
    assert_eq!(
        values,
        vec![Value::Long(3), Value::Long(6), Value::Long(9), Value::Long(8)]
    );
    assert_eq!(fields[0].array_index(), Some(3));
    assert_eq!(fields[2].array_index(), Some(9));

    for field in &fields {
        field.update_value(Value::Long(99)).expect("update should write through");
    }
    let expected: Vec<Value> = [0_i64, 1, 2, 99, 4, 5, 99, 7, 99, 99].into_iter().map(Value::Long).collect();
    assert_eq!(record.borrow().get_value("numbers"), Some(Value::array(expected)));
}

#[test]
fn full_range_wildcard_and_enumeration_agree() {
    let record = numbers_record();
    let by_range = values_of("/numbers[0..-1]", &record);
    let by_wildcard = values_of("/numbers[*]", &record);
    let by_enumeration = values_of("/numbers[0,1,2,3,4,5,6,7,8,9]", &record);

    let expected: Vec<Value> = (0..10).map(Value::Long).collect();
    assert_eq!(by_range, expected);
    assert_eq!(by_wildcard, expected);
    assert_eq!(by_enumeration, expected);
}

#[test]
fn reversed_and_out_of_range_selectors_are_empty() {
    let record = numbers_record();
    assert_eq!(values_of("/numbers[5..2]", &record), Vec::<Value>::new());
    assert_eq!(values_of("/numbers[99]", &record), Vec::<Value>::new());
    assert_eq!(values_of("/numbers[-99]", &record), Vec::<Value>::new());
    // Ranges clip to the array bounds.
    assert_eq!(values_of("/numbers[8..99]", &record), vec![Value::Long(8), Value::Long(9)]);
}

#[test]
fn index_selectors_on_non_arrays_contribute_nothing() {
    let record = account_record();
    assert_eq!(values_of("/name[0]", &record), Vec::<Value>::new());
}

#[test]
fn map_wildcard_selects_and_updates_every_entry() {
    // Scenario: /attrs[*] updated to "Unknown" rewrites both entries.
    let record = attrs_record();
    let fields = RecordPath::compile("/attrs[*]")
        .expect("path should compile")
        .evaluate(&record)
        .collect_fields()
        .expect("evaluation should succeed");
    assert_eq!(fields.len(), 2);

    for field in &fields {
        field
            .update_value(Value::from("Unknown"))
            .expect("map entries should be updatable");
    }
    let Some(Value::Map(map)) = record.borrow().get_value("attrs") else {
        panic!("attrs should still be a map");
    };
    assert_eq!(map.borrow().get("city"), Some(&Value::from("Unknown")));
    assert_eq!(map.borrow().get("state"), Some(&Value::from("Unknown")));
}

#[test]
fn map_key_list_selects_the_named_entries_in_order() {
    let record = attrs_record();
    let fields = RecordPath::compile("/attrs['city','state']")
        .expect("path should compile")
        .evaluate(&record)
        .collect_fields()
        .expect("evaluation should succeed");
    assert_eq!(fields.len(), 2);

    for field in &fields {
        field
            .update_value(Value::from("Unknown"))
            .expect("map entries should be updatable");
    }
    let Some(Value::Map(map)) = record.borrow().get_value("attrs") else {
        panic!("attrs should still be a map");
    };
    assert_eq!(map.borrow().get("city"), Some(&Value::from("Unknown")));
    assert_eq!(map.borrow().get("state"), Some(&Value::from("Unknown")));
}

#[test]
fn missing_map_keys_contribute_nothing() {
    let record = attrs_record();
    let values = values_of("/attrs['city','country']", &record);
    assert_eq!(values, vec![Value::from("NY")], "only the present key is selected");
}

#[test]
fn map_entries_inherit_the_container_field_name() {
    // The descriptor of a map entry carries the map field's own name; array
    // elements do the same but additionally carry their index.
    let record = attrs_record();
    let fields = RecordPath::compile("/attrs[*]")
        .expect("path should compile")
        .evaluate(&record)
        .collect_fields()
        .expect("evaluation should succeed");
    for field in &fields {
        assert_eq!(field.descriptor().name(), "attrs");
        assert_eq!(field.array_index(), None);
    }

    let record = numbers_record();
    let fields = RecordPath::compile("/numbers[0]")
        .expect("path should compile")
        .evaluate(&record)
        .collect_fields()
        .expect("evaluation should succeed");
    assert_eq!(fields[0].descriptor().name(), "numbers");
    assert_eq!(fields[0].array_index(), Some(0));
}

#[test]
fn evaluation_is_deterministic_across_runs() {
    let record = account_record();
    let path = RecordPath::compile("//id").expect("path should compile");

    let first: Vec<Value> = path
        .evaluate(&record)
        .collect_fields()
        .expect("evaluation should succeed")
        .into_iter()
        .map(recpath::FieldValue::into_value)
        .collect();
    let second: Vec<Value> = path
        .evaluate(&record)
        .collect_fields()
        .expect("evaluation should succeed")
        .into_iter()
        .map(recpath::FieldValue::into_value)
        .collect();
    assert_eq!(first, second);
}

#[test]
fn updates_are_visible_to_a_fresh_evaluation() {
    let record = account_record();
    let path = RecordPath::compile("/name").expect("path should compile");

    let fields = path
        .evaluate(&record)
        .collect_fields()
        .expect("evaluation should succeed");
    fields[0]
        .update_value(Value::from("Jane Doe"))
        .expect("update should write through");

    assert_eq!(values_of("/name", &record), vec![Value::from("Jane Doe")]);
}

#[test]
fn evaluation_with_an_explicit_context_resolves_relative_paths() {
    let record = account_record();
    let account_field = RecordPath::compile("/mainAccount")
        .expect("path should compile")
        .evaluate(&record)
        .collect_fields()
        .expect("evaluation should succeed")
        .remove(0);

    let fields = RecordPath::compile("./balance")
        .expect("relative path should compile")
        .evaluate_with_context(&record, account_field)
        .collect_fields()
        .expect("evaluation should succeed");
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].value(), &Value::Double(123.45));
}

#[test]
fn lazy_consumers_can_stop_early() {
    let record = numbers_record();
    let path = RecordPath::compile("/numbers[*]").expect("path should compile");

    let first_two: Vec<Value> = path
        .evaluate(&record)
        .selected_fields()
        .take(2)
        .map(|item| item.map(recpath::FieldValue::into_value))
        .collect::<Result<_, _>>()
        .expect("evaluation should succeed");
    assert_eq!(first_two, vec![Value::Long(0), Value::Long(1)]);
}
