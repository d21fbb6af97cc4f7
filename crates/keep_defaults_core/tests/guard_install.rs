use keep_defaults_core::guard::keeps_defaults;
use keep_defaults_core::{
    AttributeError, ColumnDescriptor, ColumnType, GuardError, InstallOutcome, Record,
    RecordTypeBuilder, StaticSchema, TypeRegistry, Value,
};

fn foo_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new("id", ColumnType::Integer).primary_key(),
        ColumnDescriptor::new("foo", ColumnType::Integer)
            .not_null()
            .with_default(0),
        ColumnDescriptor::new("bar", ColumnType::Text)
            .not_null()
            .with_default("foo"),
        ColumnDescriptor::new("baz", ColumnType::Text).not_null(),
        ColumnDescriptor::new("zzz", ColumnType::Integer).with_default(99),
    ]
}

fn registry() -> TypeRegistry<StaticSchema> {
    TypeRegistry::new(
        StaticSchema::new()
            .with_table("foo", foo_columns())
            .with_table("widgets", foo_columns()),
    )
}

#[test]
fn unguarded_type_lets_null_through() {
    let mut registry = registry();
    let plain = registry
        .define(RecordTypeBuilder::new("Plain").table("foo"))
        .unwrap();

    let mut record = Record::with_attributes(&plain, [("foo", Value::Null)]).unwrap();
    assert_eq!(record["foo"], Value::Null);

    record.write_attribute("bar", Value::Null).unwrap();
    assert_eq!(record["bar"], Value::Null);
}

#[test]
fn include_on_defined_type_installs_once() {
    let mut registry = registry();
    registry
        .define(RecordTypeBuilder::new("Foo").table("foo"))
        .unwrap();

    let first = registry.include_keep_defaults("Foo").unwrap();
    assert_eq!(first, InstallOutcome::Installed { wrapped: 2 });

    let second = registry.include_keep_defaults("Foo").unwrap();
    assert_eq!(second, InstallOutcome::AlreadyInstalled);
    assert_eq!(registry.install_ledger().len(), 1);

    let foo = registry.get("Foo").unwrap();
    assert!(foo.setter("foo").unwrap().is_wrapped());
    assert!(foo.setter("bar").unwrap().is_wrapped());
    assert!(!foo.setter("baz").unwrap().is_wrapped());
    assert!(!foo.setter("zzz").unwrap().is_wrapped());

    let record = Record::with_attributes(&foo, [("foo", Value::Null)]).unwrap();
    assert_eq!(record["foo"], Value::Integer(0));
}

#[test]
fn records_built_before_include_keep_the_old_definition() {
    let mut registry = registry();
    let before = registry
        .define(RecordTypeBuilder::new("Foo").table("foo"))
        .unwrap();
    let mut early = Record::new(&before).unwrap();

    registry.include_keep_defaults("Foo").unwrap();

    early.set("foo", Value::Null).unwrap();
    assert_eq!(early["foo"], Value::Null);

    let mut late = Record::new(&registry.get("Foo").unwrap()).unwrap();
    late.set("foo", Value::Null).unwrap();
    assert_eq!(late["foo"], Value::Integer(0));
}

#[test]
fn include_on_unknown_type_is_a_usage_error() {
    let mut registry = registry();
    let err = registry
        .include_keep_defaults("NotAModel")
        .expect_err("unknown types cannot include the guard");
    assert_eq!(err, GuardError::NotARecordType("NotAModel".to_string()));
}

#[test]
fn concrete_child_of_abstract_guarded_type_installs_for_itself() {
    let mut registry = registry();
    let base = registry
        .define(
            RecordTypeBuilder::new("Base")
                .abstract_class()
                .keep_defaults(),
        )
        .unwrap();
    assert!(base.installs_on_inherit());
    assert!(registry.install_ledger().is_empty());

    let child = registry
        .define(RecordTypeBuilder::new("Child").inherits("Base").table("foo"))
        .unwrap();
    assert!(registry.install_ledger().contains("Child"));
    assert!(child.setter("foo").unwrap().is_wrapped());

    let mut record = Record::with_attributes(&child, [("foo", Value::Null)]).unwrap();
    assert_eq!(record["foo"], Value::Integer(0));
    record.set("bar", Value::Null).unwrap();
    assert_eq!(record["bar"], Value::from("foo"));
}

#[test]
fn abstract_intermediate_passes_install_hook_to_grandchildren() {
    let mut registry = registry();
    registry
        .define(
            RecordTypeBuilder::new("Base")
                .abstract_class()
                .keep_defaults(),
        )
        .unwrap();
    let middle = registry
        .define(
            RecordTypeBuilder::new("Middle")
                .inherits("Base")
                .abstract_class(),
        )
        .unwrap();
    assert!(middle.installs_on_inherit());

    let leaf = registry
        .define(RecordTypeBuilder::new("Leaf").inherits("Middle").table("widgets"))
        .unwrap();

    let mut record = Record::new(&leaf).unwrap();
    record.write_attribute("foo", Value::Null).unwrap();
    assert_eq!(record["foo"], Value::Integer(0));
    assert_eq!(registry.install_ledger().len(), 1);
}

#[test]
fn unbacked_concrete_type_defers_to_backed_children() {
    let mut registry = registry();
    let pending = registry
        .define(
            RecordTypeBuilder::new("Pending")
                .table("not_created_yet")
                .keep_defaults(),
        )
        .unwrap();
    assert!(!pending.is_backed());
    assert!(pending.installs_on_inherit());

    let err = Record::new(&pending).expect_err("unbacked types cannot be instantiated");
    assert_eq!(err, AttributeError::AbstractType("Pending".to_string()));

    let widget = registry
        .define(
            RecordTypeBuilder::new("Widget")
                .inherits("Pending")
                .table("widgets"),
        )
        .unwrap();
    let record = Record::with_attributes(&widget, [("bar", Value::Null)]).unwrap();
    assert_eq!(record["bar"], Value::from("foo"));
}

#[test]
fn single_table_subtype_inherits_wrapped_setters_without_rewrapping() {
    let mut registry = registry();
    registry
        .define(RecordTypeBuilder::new("Foo").table("foo").keep_defaults())
        .unwrap();
    let special = registry
        .define(RecordTypeBuilder::new("SpecialFoo").inherits("Foo"))
        .unwrap();

    assert!(special.setter("foo").unwrap().is_wrapped());
    assert!(!registry.install_ledger().contains("SpecialFoo"));
    assert_eq!(registry.install_ledger().len(), 1);

    let mut record = Record::new(&special).unwrap();
    record.set("foo", 7).unwrap();
    record.set("foo", Value::Null).unwrap();
    assert_eq!(record["foo"], Value::Integer(0));
    record.write_attribute("bar", Value::Null).unwrap();
    assert_eq!(record["bar"], Value::from("foo"));
}

#[test]
fn overrides_chain_parent_first_and_reach_the_guard() {
    let mut registry = registry();
    registry
        .define(
            RecordTypeBuilder::new("Foo")
                .table("foo")
                .keep_defaults()
                .override_setter("bar", |record, value, setter| match value {
                    Value::Text(text) => setter.call(record, Value::Text(format!("{text}-parent"))),
                    other => setter.call(record, other),
                }),
        )
        .unwrap();
    let child = registry
        .define(
            RecordTypeBuilder::new("ChildFoo")
                .inherits("Foo")
                .override_setter("bar", |record, value, setter| match value {
                    Value::Text(text) => setter.call(record, Value::Text(format!("{text}-child"))),
                    other => setter.call(record, other),
                }),
        )
        .unwrap();

    let mut record = Record::new(&child).unwrap();
    record.set("bar", "x").unwrap();
    assert_eq!(record["bar"], Value::from("x-child-parent"));

    record.set("bar", Value::Null).unwrap();
    assert_eq!(record["bar"], Value::from("foo"));
}

#[test]
fn override_that_clears_the_value_still_gets_the_default() {
    let mut registry = registry();
    let foo = registry
        .define(
            RecordTypeBuilder::new("Foo")
                .table("foo")
                .keep_defaults()
                .override_setter("foo", |record, value, setter| {
                    let value = match value {
                        Value::Integer(n) if n < 0 => Value::Null,
                        other => other,
                    };
                    setter.call(record, value)
                }),
        )
        .unwrap();

    let mut record = Record::new(&foo).unwrap();
    record.set("foo", -5).unwrap();
    assert_eq!(record["foo"], Value::Integer(0));
    record.set("foo", 5).unwrap();
    assert_eq!(record["foo"], Value::Integer(5));
}

#[test]
fn alias_assignments_are_substituted_on_both_paths() {
    let mut registry = registry();
    let foo = registry
        .define(
            RecordTypeBuilder::new("Foo")
                .table("foo")
                .keep_defaults()
                .alias_attribute("amount", "foo"),
        )
        .unwrap();
    assert_eq!(foo.canonical_name("amount"), "foo");

    let mut record = Record::with_attributes(&foo, [("amount", 12)]).unwrap();
    assert_eq!(record["foo"], Value::Integer(12));

    record.set("amount", Value::Null).unwrap();
    assert_eq!(record["foo"], Value::Integer(0));

    record.write_attribute("amount", 4).unwrap();
    record.write_attribute("amount", Value::Null).unwrap();
    assert_eq!(record.read_attribute("amount").unwrap(), &Value::Integer(0));
    assert_eq!(record.get("amount").unwrap(), Value::Integer(0));
}

#[test]
fn cast_errors_propagate_through_the_guard() {
    let mut registry = registry();
    let foo = registry
        .define(RecordTypeBuilder::new("Foo").table("foo").keep_defaults())
        .unwrap();

    let mut record = Record::with_attributes(&foo, [("foo", 9)]).unwrap();
    let err = record.set("foo", "nine").expect_err("text is not an integer");
    assert!(matches!(err, AttributeError::Cast(_)));
    assert_eq!(record["foo"], Value::Integer(9));

    let err = record
        .write_attribute("foo", "nine")
        .expect_err("keyed write casts too");
    assert!(matches!(err, AttributeError::Cast(_)));
}

#[test]
fn unknown_attributes_are_rejected() {
    let mut registry = registry();
    let foo = registry
        .define(RecordTypeBuilder::new("Foo").table("foo").keep_defaults())
        .unwrap();

    let mut record = Record::new(&foo).unwrap();
    let err = record.set("nope", 1).expect_err("unknown setter");
    assert_eq!(
        err,
        AttributeError::UnknownAttribute {
            record_type: "Foo".to_string(),
            attribute: "nope".to_string(),
        }
    );
    assert!(record.write_attribute("nope", Value::Null).is_err());
    assert!(record.get("nope").is_err());
}

#[test]
fn abstract_types_cannot_be_instantiated() {
    let mut registry = registry();
    let base = registry
        .define(
            RecordTypeBuilder::new("Base")
                .abstract_class()
                .keep_defaults(),
        )
        .unwrap();

    let err = Record::new(&base).expect_err("abstract types have no records");
    assert_eq!(err, AttributeError::AbstractType("Base".to_string()));
}

#[test]
fn child_with_own_table_of_concrete_guarded_type_guards_both_paths() {
    let mut registry = registry();
    registry
        .define(RecordTypeBuilder::new("Foo").table("foo").keep_defaults())
        .unwrap();
    let child = registry
        .define(RecordTypeBuilder::new("Child").inherits("Foo").table("widgets"))
        .unwrap();

    assert!(keeps_defaults(&child));
    assert!(child.setter("foo").unwrap().is_wrapped());
    assert!(registry.install_ledger().contains("Child"));

    let mut keyed = Record::with_attributes(&child, [("foo", 3)]).unwrap();
    keyed.write_attribute("foo", Value::Null).unwrap();
    let mut named = Record::with_attributes(&child, [("foo", 3)]).unwrap();
    named.set("foo", Value::Null).unwrap();

    assert_eq!(keyed["foo"], Value::Integer(0));
    assert_eq!(named["foo"], keyed["foo"]);
}

#[test]
fn abstract_child_of_concrete_guarded_type_arms_its_subtypes() {
    let mut registry = registry();
    registry
        .define(RecordTypeBuilder::new("Foo").table("foo").keep_defaults())
        .unwrap();
    let middle = registry
        .define(
            RecordTypeBuilder::new("Middle")
                .inherits("Foo")
                .table("widgets")
                .abstract_class(),
        )
        .unwrap();
    assert!(middle.installs_on_inherit());
    assert!(!registry.install_ledger().contains("Middle"));

    let leaf = registry
        .define(RecordTypeBuilder::new("Leaf").inherits("Middle"))
        .unwrap();
    assert_eq!(leaf.table_name(), Some("widgets"));

    let mut record = Record::new(&leaf).unwrap();
    record.set("bar", Value::Null).unwrap();
    assert_eq!(record["bar"], Value::from("foo"));
    assert!(registry.install_ledger().contains("Leaf"));
}

#[test]
fn repeated_include_on_abstract_type_reports_already_installed() {
    let mut registry = registry();
    registry
        .define(RecordTypeBuilder::new("Base").abstract_class())
        .unwrap();

    let first = registry.include_keep_defaults("Base").unwrap();
    assert_eq!(first, InstallOutcome::Deferred);
    let second = registry.include_keep_defaults("Base").unwrap();
    assert_eq!(second, InstallOutcome::AlreadyInstalled);
    assert!(registry.install_ledger().is_empty());
}
