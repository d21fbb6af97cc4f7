//! Substitution rule shared by both assignment paths.

use crate::model::value::Value;
use crate::registry::RecordType;
use log::debug;

/// Name under which the guard registers its keyed-write hook.
pub const KEYED_WRITE_HOOK: &str = "keep_defaults";

/// Replaces a null `value` with the declared default of `column`.
///
/// Substitutes only when the column is non-nullable and declares a non-null
/// default; every other value, and every unknown column, passes through.
pub fn substitute_default(record_type: &RecordType, column: &str, value: Value) -> Value {
    if !value.is_null() {
        return value;
    }

    let Some(descriptor) = record_type.column(column) else {
        return value;
    };
    if descriptor.nullable {
        return value;
    }

    match descriptor.declared_default() {
        Some(default) => {
            debug!(
                "event=default_substituted module=guard type={} column={} default={}",
                record_type.name(),
                column,
                default
            );
            default.clone()
        }
        None => value,
    }
}

/// Whether the keyed-write guard is active for `record_type`.
pub fn keeps_defaults(record_type: &RecordType) -> bool {
    record_type.has_write_hook(KEYED_WRITE_HOOK)
}

/// Registers the keyed-write guard. Returns `false` when already present.
pub(crate) fn register(record_type: &mut RecordType) -> bool {
    record_type.add_write_hook(KEYED_WRITE_HOOK, substitute_default)
}

#[cfg(test)]
mod tests {
    use super::{keeps_defaults, register, substitute_default};
    use crate::model::column::{ColumnDescriptor, ColumnType};
    use crate::model::value::Value;
    use crate::registry::{RecordTypeBuilder, TypeRegistry};
    use crate::schema::StaticSchema;

    fn foo_type() -> crate::registry::RecordType {
        let schema = StaticSchema::new().with_table(
            "foo",
            vec![
                ColumnDescriptor::new("foo", ColumnType::Integer)
                    .not_null()
                    .with_default(0),
                ColumnDescriptor::new("baz", ColumnType::Text).not_null(),
                ColumnDescriptor::new("zzz", ColumnType::Integer).with_default(99),
            ],
        );
        let mut registry = TypeRegistry::new(schema);
        let foo = registry
            .define(RecordTypeBuilder::new("Foo").table("foo"))
            .expect("Foo should define");
        (*foo).clone()
    }

    #[test]
    fn substitutes_only_null_on_guarded_columns() {
        let record_type = foo_type();

        assert_eq!(
            substitute_default(&record_type, "foo", Value::Null),
            Value::Integer(0)
        );
        assert_eq!(
            substitute_default(&record_type, "foo", Value::Integer(5)),
            Value::Integer(5)
        );
        assert_eq!(
            substitute_default(&record_type, "baz", Value::Null),
            Value::Null
        );
        assert_eq!(
            substitute_default(&record_type, "zzz", Value::Null),
            Value::Null
        );
        assert_eq!(
            substitute_default(&record_type, "missing", Value::Null),
            Value::Null
        );
    }

    #[test]
    fn registers_hook_once() {
        let mut record_type = foo_type();
        assert!(!keeps_defaults(&record_type));

        assert!(register(&mut record_type));
        assert!(!register(&mut record_type));
        assert!(keeps_defaults(&record_type));
        assert_eq!(record_type.write_hooks.len(), 1);
    }
}
