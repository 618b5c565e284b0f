//! Matrix command - export the role-permission matrix.

use anyhow::Result;
use comfy_table::{Cell, Color, Table, presets::UTF8_FULL};
use wardstone::RoleCatalog;

pub fn run(json: bool) -> Result<()> {
    let matrix = RoleCatalog::builtin().export_permission_matrix();

    if json {
        println!("{}", serde_json::to_string_pretty(&matrix)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Role").fg(Color::Cyan),
        Cell::new("Permission").fg(Color::Cyan),
        Cell::new("Scope").fg(Color::Cyan),
        Cell::new("Time").fg(Color::Cyan),
        Cell::new("Conditions").fg(Color::Cyan),
    ]);

    for role in &matrix.roles {
        for entry in &role.permissions {
            table.add_row(vec![
                Cell::new(role.id.as_str()),
                Cell::new(&entry.permission),
                Cell::new(entry.scope.key()),
                Cell::new(entry.time.key()),
                Cell::new(entry.conditions),
            ]);
        }
    }

    println!("{table}");

    Ok(())
}
