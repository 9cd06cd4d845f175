use anyhow::Result;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use filmlog_core::domain::{Camera, Filter, Gear, GearKey, GearKind, Lens};
use filmlog_core::error::Error;
use filmlog_core::Logbook;

#[derive(Subcommand)]
pub enum NewGear {
    /// Add a camera body
    Camera {
        make: String,
        model: String,
        #[arg(long)]
        serial: Option<String>,
        /// Slowest shutter speed, e.g. "1"
        #[arg(long)]
        min_shutter: Option<String>,
        /// Fastest shutter speed, e.g. "1/1000"
        #[arg(long)]
        max_shutter: Option<String>,
    },
    /// Add a lens
    Lens {
        make: String,
        model: String,
        #[arg(long)]
        serial: Option<String>,
        /// Smallest aperture, e.g. "22"
        #[arg(long)]
        min_aperture: Option<String>,
        /// Largest aperture, e.g. "1.8"
        #[arg(long)]
        max_aperture: Option<String>,
        /// Focal length in mm (zooms: shortest end)
        #[arg(long, default_value_t = 0)]
        min_focal: u32,
        /// Longest focal length of a zoom, in mm
        #[arg(long)]
        max_focal: Option<u32>,
    },
    /// Add a filter
    Filter { make: String, model: String },
}

impl From<NewGear> for Gear {
    fn from(new: NewGear) -> Self {
        match new {
            NewGear::Camera {
                make,
                model,
                serial,
                min_shutter,
                max_shutter,
            } => Gear::Camera(Camera {
                make,
                model,
                serial_number: serial,
                min_shutter,
                max_shutter,
                ..Default::default()
            }),
            NewGear::Lens {
                make,
                model,
                serial,
                min_aperture,
                max_aperture,
                min_focal,
                max_focal,
            } => Gear::Lens(Lens {
                make,
                model,
                serial_number: serial,
                min_aperture,
                max_aperture,
                min_focal_length: min_focal,
                max_focal_length: max_focal.unwrap_or(min_focal),
                ..Default::default()
            }),
            NewGear::Filter { make, model } => Gear::Filter(Filter {
                make,
                model,
                ..Default::default()
            }),
        }
    }
}

pub fn list(logbook: &Logbook, kind: Option<GearKind>) -> Result<()> {
    let kinds = match kind {
        Some(kind) => vec![kind],
        None => vec![GearKind::Camera, GearKind::Lens, GearKind::Filter],
    };

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Kind"),
        Cell::new("ID"),
        Cell::new("Name"),
        Cell::new("Details"),
        Cell::new("Mounts"),
    ]);

    let mut rows = 0;
    for kind in kinds {
        for gear in logbook.list_gear(kind)? {
            let mounts = logbook.mountables_of(gear.key())?.len();
            table.add_row(vec![
                Cell::new(kind),
                Cell::new(gear.id()),
                Cell::new(gear.name()),
                Cell::new(details(&gear)),
                Cell::new(mounts),
            ]);
            rows += 1;
        }
    }

    if rows == 0 {
        println!("No gear yet. Use `filmlog gear add` to add some.");
        return Ok(());
    }
    println!("{table}");
    Ok(())
}

pub fn add(logbook: &Logbook, gear: NewGear) -> Result<()> {
    let gear = logbook.add_gear(gear.into())?;
    println!("Added {} {}: {}", gear.kind(), gear.id(), gear.name());
    Ok(())
}

pub fn rm(logbook: &mut Logbook, kind: GearKind, id: i64) -> Result<()> {
    let key = GearKey { kind, id };
    match logbook.delete_gear(key) {
        Ok(true) => println!("Deleted {key}"),
        Ok(false) => println!("No {kind} with id {id}"),
        Err(Error::GearInUse(key)) => {
            let name = logbook.gear(key).map(|g| g.name()).unwrap_or_default();
            println!("{name} is being used and cannot be deleted");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

pub fn mount(logbook: &Logbook, a: (GearKind, i64), b: (GearKind, i64)) -> Result<()> {
    let (a, b) = (key(a), key(b));
    logbook.add_mount(a, b)?;
    if logbook.is_mounted(a, b)? {
        println!("Mounted {a} to {b}");
    } else {
        println!("Nothing mounted: {a} or {b} does not exist");
    }
    Ok(())
}

pub fn unmount(logbook: &Logbook, a: (GearKind, i64), b: (GearKind, i64)) -> Result<()> {
    let (a, b) = (key(a), key(b));
    logbook.remove_mount(a, b)?;
    println!("Unmounted {a} from {b}");
    Ok(())
}

pub fn mounts(logbook: &Logbook, kind: GearKind, id: i64) -> Result<()> {
    let anchor = logbook.gear(GearKey { kind, id })?;
    let mountables = logbook.mountables_of(anchor.key())?;

    println!();
    println!("  {} ({})", anchor.name(), anchor.key());
    if mountables.is_empty() {
        println!("  No mountable gear.");
        return Ok(());
    }
    for gear in &mountables {
        println!("    {:<8} {:>4}  {}", gear.kind(), gear.id(), gear.name());
    }
    Ok(())
}

pub fn set_mounts(
    logbook: &mut Logbook,
    kind: GearKind,
    id: i64,
    of: GearKind,
    ids: &[i64],
) -> Result<()> {
    let anchor = GearKey { kind, id };
    logbook.gear(anchor)?;
    let change = logbook.set_mounts_of_kind(anchor, of, ids)?;
    println!(
        "Updated {anchor}: {} mounted, {} unmounted",
        change.added, change.removed
    );
    Ok(())
}

fn key((kind, id): (GearKind, i64)) -> GearKey {
    GearKey { kind, id }
}

fn details(gear: &Gear) -> String {
    match gear {
        Gear::Camera(c) => match (&c.min_shutter, &c.max_shutter) {
            (Some(min), Some(max)) => format!("{min} - {max} s"),
            (Some(s), None) | (None, Some(s)) => format!("{s} s"),
            (None, None) => String::new(),
        },
        Gear::Lens(l) => {
            let focal = match (l.min_focal_length, l.max_focal_length) {
                (0, 0) => String::new(),
                (min, max) if max > min => format!("{min}-{max}mm"),
                (min, _) => format!("{min}mm"),
            };
            match &l.max_aperture {
                Some(ap) if focal.is_empty() => format!("f/{ap}"),
                Some(ap) => format!("{focal} f/{ap}"),
                None => focal,
            }
        }
        Gear::Filter(_) => String::new(),
    }
}
