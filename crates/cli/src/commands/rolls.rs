use std::collections::HashMap;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use filmlog_core::domain::{Gear, GearKind, Roll};
use filmlog_core::Logbook;

use super::{format_date, or_blank, parse_date};

pub fn list(logbook: &Logbook) -> Result<()> {
    let rolls = logbook.list_rolls()?;
    if rolls.is_empty() {
        println!("No rolls yet. Use `filmlog rolls add <name>` to load one.");
        return Ok(());
    }

    let cameras: HashMap<i64, String> = logbook
        .list_gear(GearKind::Camera)?
        .iter()
        .map(|g| (g.id(), g.name()))
        .collect();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID"),
        Cell::new("Name"),
        Cell::new("Date"),
        Cell::new("Camera"),
        Cell::new("ISO"),
        Cell::new("Frames"),
        Cell::new("Note"),
    ]);

    for roll in &rolls {
        let camera = roll
            .camera_id
            .and_then(|id| cameras.get(&id))
            .map(String::as_str)
            .unwrap_or("");
        table.add_row(vec![
            Cell::new(roll.id),
            Cell::new(&roll.name),
            Cell::new(format_date(roll.date)),
            Cell::new(camera),
            Cell::new(roll.iso.map(|iso| iso.to_string()).unwrap_or_default()),
            Cell::new(logbook.frame_count(roll.id)?),
            Cell::new(or_blank(&roll.note)),
        ]);
    }

    println!("{table}");
    Ok(())
}

pub fn add(
    logbook: &Logbook,
    name: String,
    camera: Option<i64>,
    date: Option<String>,
    iso: Option<u32>,
    note: Option<String>,
) -> Result<()> {
    let roll = Roll {
        id: 0,
        name,
        date: date.as_deref().map(parse_date).transpose()?,
        note,
        camera_id: camera,
        iso,
    };
    let id = logbook.add_roll(&roll)?;

    let camera_name = match roll.camera_id {
        Some(id) => logbook
            .catalog()
            .get_camera(id)?
            .map(|c| Gear::Camera(c).name()),
        None => None,
    };
    match camera_name {
        Some(camera) => println!("Added roll {id}: {} ({camera})", roll.name),
        None => println!("Added roll {id}: {}", roll.name),
    }
    Ok(())
}

pub fn rm(logbook: &mut Logbook, id: i64) -> Result<()> {
    let roll = logbook.roll(id)?;
    let frames = logbook.delete_roll(id)?;
    println!("Deleted roll {id}: {} ({frames} frames)", roll.name);
    if frames > 0 {
        println!("Run `filmlog pictures gc` to remove pictures of deleted frames.");
    }
    Ok(())
}
