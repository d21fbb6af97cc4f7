//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `keep_defaults_core` linkage.
//! - With `demo`, show null assignments replaced by column defaults.

use keep_defaults_core::db::{open_db_in_memory, Migration};
use keep_defaults_core::{
    LoggingConfig, Record, RecordTypeBuilder, SqliteSchema, TypeRegistry, Value,
};
use log::info;
use std::error::Error;
use std::process::ExitCode;

const DEMO_MIGRATIONS: &[Migration] = &[Migration::new(1, include_str!("demo_schema.sql"))];

fn main() -> ExitCode {
    println!(
        "keep_defaults_core version={}",
        keep_defaults_core::core_version()
    );

    match LoggingConfig::from_env() {
        Ok(Some(config)) => {
            if let Err(err) = keep_defaults_core::logging::init_logging_with(config) {
                eprintln!("logging disabled: {err}");
            }
        }
        Ok(None) => {}
        Err(err) => eprintln!("logging disabled: {err}"),
    }

    let Some(command) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };
    let result = match command.as_str() {
        "demo" => run_demo(),
        other => Err(format!("unknown command `{other}`; expected `demo`").into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_demo() -> Result<(), Box<dyn Error>> {
    let conn = open_db_in_memory(DEMO_MIGRATIONS)?;
    let mut registry = TypeRegistry::new(SqliteSchema::new(&conn));
    let widget = registry.define(
        RecordTypeBuilder::new("Widget")
            .table("widgets")
            .keep_defaults(),
    )?;

    let record = Record::with_attributes(
        &widget,
        [
            ("quantity", Value::Null),
            ("label", Value::Null),
            ("archived", Value::Null),
            ("sku", Value::from("W-1")),
            ("weight", Value::Null),
        ],
    )?;
    info!("event=demo module=cli status=ok type={}", widget.name());

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
