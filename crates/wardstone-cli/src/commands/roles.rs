//! Roles command - list the built-in catalog.

use anyhow::Result;
use comfy_table::{Cell, Color, Table, presets::UTF8_FULL};
use wardstone::RoleCatalog;

pub fn run() -> Result<()> {
    let catalog = RoleCatalog::builtin();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Role").fg(Color::Cyan),
        Cell::new("Name").fg(Color::Cyan),
        Cell::new("Priority").fg(Color::Cyan),
        Cell::new("Inherits").fg(Color::Cyan),
        Cell::new("Permissions").fg(Color::Cyan),
    ]);

    let mut roles: Vec<_> = catalog.roles().collect();
    roles.sort_by_key(|role| role.priority);

    for role in roles {
        let inherits = if role.parent_roles.is_empty() {
            "-".to_string()
        } else {
            role.parent_roles
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        table.add_row(vec![
            Cell::new(role.id.as_str()),
            Cell::new(&role.name),
            Cell::new(role.priority),
            Cell::new(inherits),
            Cell::new(role.permissions.len()),
        ]);
    }

    println!("{table}");
    println!();
    println!("Conflicting pairs (separation of duties):");
    for (left, right) in catalog.conflicts() {
        println!("  {left} <-> {right}");
    }

    Ok(())
}
