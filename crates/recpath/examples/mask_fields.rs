//! Selects and masks fields of a record in place, then prints the result as
//! JSON. Run with `cargo run --example mask_fields`.

use recpath::{DataType, FieldDescriptor, PathResult, Record, RecordPath, Schema, Value};

fn main() -> PathResult<()> {
    let account_schema = Schema::new(vec![
        FieldDescriptor::new("id", DataType::Int),
        FieldDescriptor::new("balance", DataType::Double),
    ])
    .into_ref();
    let schema = Schema::new(vec![
        FieldDescriptor::new("id", DataType::Int),
        FieldDescriptor::new("name", DataType::String),
        FieldDescriptor::new("ssn", DataType::String),
        FieldDescriptor::new("mainAccount", DataType::Record(Some(account_schema.clone()))),
    ])
    .into_ref();

    let account = Record::with_values(
        account_schema,
        [("id", Value::Long(1)), ("balance", Value::Double(123.45))],
    );
    let record = Record::with_values(
        schema,
        [
            ("id", Value::Long(48)),
            ("name", Value::from("John Doe")),
            ("ssn", Value::from("078-05-1120")),
            ("mainAccount", Value::record(account)),
        ],
    )
    .into_ref();

    // Mask the SSN with its SHA-256 digest, writing through the original slot.
    let select_ssn = RecordPath::compile("/ssn")?;
    let digest_ssn = RecordPath::compile("hash(/ssn, 'SHA-256')")?;
    let digests = digest_ssn.evaluate(&record).collect_fields()?;
    for (slot, digest) in select_ssn
        .evaluate(&record)
        .collect_fields()?
        .iter()
        .zip(digests)
    {
        slot.update_value(digest.into_value())?;
    }

    // Every id, wherever it nests.
    let ids = RecordPath::compile("//id")?;
    for field in ids.evaluate(&record).selected_fields() {
        let field = field?;
        println!("{} = {:?}", field.descriptor().name(), field.value());
    }

    let render = RecordPath::compile("escapeJson(.)")?;
    for field in render.evaluate(&record).selected_fields() {
        if let Value::String(json) = field?.value() {
            println!("{json}");
        }
    }
    Ok(())
}
