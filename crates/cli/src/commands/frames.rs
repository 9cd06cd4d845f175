use std::collections::HashMap;

use anyhow::{bail, Result};
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use filmlog_core::domain::{Frame, FrameSortMode, Gear, GearKind, Location};
use filmlog_core::Logbook;

use super::{format_date, or_blank, parse_date};

#[derive(Args)]
pub struct NewFrame {
    /// Roll id
    roll: i64,
    /// Frame number on the roll (default: next free number)
    #[arg(long)]
    count: Option<i32>,
    /// "YYYY-MM-DD HH:MM"
    #[arg(long)]
    date: Option<String>,
    /// e.g. "1/125"
    #[arg(long)]
    shutter: Option<String>,
    /// e.g. "5.6"
    #[arg(long)]
    aperture: Option<String>,
    /// Lens id; must be mountable to the roll's camera
    #[arg(long)]
    lens: Option<i64>,
    /// Filter id; must be mountable to the lens
    #[arg(long)]
    filter: Option<i64>,
    #[arg(long, default_value_t = 0)]
    focal_length: u32,
    #[arg(long)]
    exposure_comp: Option<String>,
    /// "<lat> <lng>"
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    note: Option<String>,
}

pub fn list(logbook: &Logbook, roll_id: i64, sort: FrameSortMode) -> Result<()> {
    let roll = logbook.roll(roll_id)?;
    let frames = logbook.list_frames(roll_id, sort)?;

    println!();
    println!("  {} ({} frames)", roll.name, frames.len());
    if frames.is_empty() {
        return Ok(());
    }

    let lenses = names(logbook, GearKind::Lens)?;
    let filters = names(logbook, GearKind::Filter)?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#"),
        Cell::new("ID"),
        Cell::new("Date"),
        Cell::new("Shutter"),
        Cell::new("Aperture"),
        Cell::new("Lens"),
        Cell::new("Filter"),
        Cell::new("Location"),
        Cell::new("Picture"),
    ]);

    for frame in &frames {
        table.add_row(vec![
            Cell::new(frame.count),
            Cell::new(frame.id),
            Cell::new(format_date(frame.date)),
            Cell::new(or_blank(&frame.shutter)),
            Cell::new(or_blank(&frame.aperture)),
            Cell::new(lookup(&lenses, frame.lens_id)),
            Cell::new(lookup(&filters, frame.filter_id)),
            Cell::new(location_display(frame)),
            Cell::new(or_blank(&frame.picture_filename)),
        ]);
    }

    println!("{table}");
    Ok(())
}

pub fn add(logbook: &Logbook, new: NewFrame) -> Result<()> {
    let location = match new.location.as_deref() {
        Some(raw) => match Location::parse(raw) {
            Some(location) => Some(location),
            None => bail!("invalid location {raw:?}, expected \"<lat> <lng>\""),
        },
        None => None,
    };
    let count = match new.count {
        Some(count) => count,
        None => next_count(logbook, new.roll)?,
    };

    let frame = Frame {
        id: 0,
        roll_id: new.roll,
        count,
        date: new.date.as_deref().map(parse_date).transpose()?,
        shutter: new.shutter,
        aperture: new.aperture,
        note: new.note,
        location,
        formatted_address: None,
        focal_length: new.focal_length,
        exposure_comp: new.exposure_comp,
        lens_id: new.lens,
        filter_id: new.filter,
        picture_filename: None,
    };
    let id = logbook.add_frame(&frame)?;
    println!("Added frame #{count} (id {id}) to roll {}", new.roll);
    Ok(())
}

pub fn rm(logbook: &Logbook, id: i64) -> Result<()> {
    let frame = logbook.frame(id)?;
    logbook.delete_frame(id)?;
    println!("Deleted frame #{} (id {id})", frame.count);
    if frame.picture_filename.is_some() {
        println!("Run `filmlog pictures gc` to remove its picture.");
    }
    Ok(())
}

fn next_count(logbook: &Logbook, roll_id: i64) -> Result<i32> {
    let frames = logbook.list_frames(roll_id, FrameSortMode::FrameCount)?;
    Ok(frames.iter().map(|f| f.count).max().map_or(1, |max| max + 1))
}

fn names(logbook: &Logbook, kind: GearKind) -> Result<HashMap<i64, String>> {
    Ok(logbook
        .list_gear(kind)?
        .iter()
        .map(|g: &Gear| (g.id(), g.name()))
        .collect())
}

fn lookup(names: &HashMap<i64, String>, id: Option<i64>) -> &str {
    id.and_then(|id| names.get(&id))
        .map(String::as_str)
        .unwrap_or("")
}

fn location_display(frame: &Frame) -> String {
    match (&frame.formatted_address, frame.location) {
        (Some(address), _) if !address.is_empty() => address.clone(),
        (_, Some(location)) => format!("{:.5}, {:.5}", location.lat, location.lng),
        _ => String::new(),
    }
}
