mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use filmlog_core::domain::{FrameSortMode, GearKind};
use filmlog_core::Logbook;

/// filmlog: a logbook for film cameras, lenses, filters, rolls and frames
#[derive(Parser)]
#[command(name = "filmlog", version, about)]
struct Cli {
    /// Directory holding the catalog and the picture store
    #[arg(long, default_value_t = default_data_dir())]
    data_dir: String,

    /// Log what the logbook is doing
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage cameras, lenses and filters and which of them fit together
    Gear {
        #[command(subcommand)]
        action: GearAction,
    },
    /// Manage rolls of film (lists rolls when no action is given)
    Rolls {
        #[command(subcommand)]
        action: Option<RollsAction>,
    },
    /// Manage the frames of a roll
    Frames {
        #[command(subcommand)]
        action: FramesAction,
    },
    /// Manage complementary pictures: attach, compress, clean up, export, import
    Pictures {
        #[command(subcommand)]
        action: PicturesAction,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    Camera,
    Lens,
    Filter,
}

impl From<KindArg> for GearKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Camera => GearKind::Camera,
            KindArg::Lens => GearKind::Lens,
            KindArg::Filter => GearKind::Filter,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SortArg {
    Count,
    Date,
    FStop,
    Shutter,
    Lens,
}

impl From<SortArg> for FrameSortMode {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::Count => FrameSortMode::FrameCount,
            SortArg::Date => FrameSortMode::Date,
            SortArg::FStop => FrameSortMode::FStop,
            SortArg::Shutter => FrameSortMode::ShutterSpeed,
            SortArg::Lens => FrameSortMode::Lens,
        }
    }
}

#[derive(Subcommand)]
enum GearAction {
    /// List gear, optionally of one kind
    List {
        kind: Option<KindArg>,
    },
    /// Add a camera, lens or filter
    Add {
        #[command(subcommand)]
        gear: commands::gear::NewGear,
    },
    /// Delete gear (refused while a roll or frame uses it)
    Rm {
        kind: KindArg,
        id: i64,
    },
    /// Mark two pieces of gear as compatible
    Mount {
        kind_a: KindArg,
        id_a: i64,
        kind_b: KindArg,
        id_b: i64,
    },
    /// Remove a compatibility relation
    Unmount {
        kind_a: KindArg,
        id_a: i64,
        kind_b: KindArg,
        id_b: i64,
    },
    /// Show the gear mountable to a piece of gear
    Mounts {
        kind: KindArg,
        id: i64,
    },
    /// Replace the mounts of one kind: the given ids become exactly the mounted set
    SetMounts {
        kind: KindArg,
        id: i64,
        /// Kind of gear being selected
        #[arg(long = "kind")]
        of: KindArg,
        /// Ids to keep mounted; every other gear of that kind is unmounted
        ids: Vec<i64>,
    },
}

#[derive(Subcommand)]
enum RollsAction {
    /// List all rolls, newest first
    List,
    /// Load a new roll
    Add {
        name: String,
        /// Camera id
        #[arg(long)]
        camera: Option<i64>,
        /// Date loaded, "YYYY-MM-DD HH:MM"
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        iso: Option<u32>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Delete a roll and all of its frames
    Rm {
        id: i64,
    },
}

#[derive(Subcommand)]
enum FramesAction {
    /// List the frames of a roll
    List {
        roll: i64,
        #[arg(long, value_enum, default_value_t = SortArg::Count)]
        sort: SortArg,
    },
    /// Record a frame
    Add(commands::frames::NewFrame),
    /// Delete a frame
    Rm {
        id: i64,
    },
}

#[derive(Subcommand)]
enum PicturesAction {
    /// Reserve a path for a new picture and print it
    New,
    /// Compress an image and attach it to a frame (copied into the store unless made by `pictures new`)
    Attach {
        frame: i64,
        file: PathBuf,
    },
    /// Unlink a frame's picture (the file is removed by `gc`)
    Detach {
        frame: i64,
    },
    /// Compress one stored picture, or every referenced picture
    Compress {
        filename: Option<String>,
    },
    /// Delete pictures no frame references
    Gc,
    /// Zip all referenced pictures into a directory (default: the export path)
    Export {
        dir: Option<PathBuf>,
    },
    /// Restore pictures from a zip archive
    Import {
        archive: PathBuf,
    },
    /// Copy a picture into a public directory
    Gallery {
        filename: String,
        dir: PathBuf,
    },
    /// Set the default export directory
    ExportSet {
        path: PathBuf,
    },
    /// Show the default export directory
    ExportShow,
    /// Show or set the longest side of stored pictures
    MaxDimension {
        value: Option<u32>,
    },
}

fn default_data_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".filmlog")
        .to_string_lossy()
        .to_string()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let mut logbook = Logbook::open(&PathBuf::from(&cli.data_dir))?;

    match cli.command {
        Commands::Gear { action } => match action {
            GearAction::List { kind } => commands::gear::list(&logbook, kind.map(Into::into))?,
            GearAction::Add { gear } => commands::gear::add(&logbook, gear)?,
            GearAction::Rm { kind, id } => commands::gear::rm(&mut logbook, kind.into(), id)?,
            GearAction::Mount {
                kind_a,
                id_a,
                kind_b,
                id_b,
            } => commands::gear::mount(&logbook, (kind_a.into(), id_a), (kind_b.into(), id_b))?,
            GearAction::Unmount {
                kind_a,
                id_a,
                kind_b,
                id_b,
            } => {
                commands::gear::unmount(&logbook, (kind_a.into(), id_a), (kind_b.into(), id_b))?
            }
            GearAction::Mounts { kind, id } => commands::gear::mounts(&logbook, kind.into(), id)?,
            GearAction::SetMounts { kind, id, of, ids } => {
                commands::gear::set_mounts(&mut logbook, kind.into(), id, of.into(), &ids)?
            }
        },
        Commands::Rolls { action } => match action {
            None | Some(RollsAction::List) => commands::rolls::list(&logbook)?,
            Some(RollsAction::Add {
                name,
                camera,
                date,
                iso,
                note,
            }) => commands::rolls::add(&logbook, name, camera, date, iso, note)?,
            Some(RollsAction::Rm { id }) => commands::rolls::rm(&mut logbook, id)?,
        },
        Commands::Frames { action } => match action {
            FramesAction::List { roll, sort } => {
                commands::frames::list(&logbook, roll, sort.into())?
            }
            FramesAction::Add(frame) => commands::frames::add(&logbook, frame)?,
            FramesAction::Rm { id } => commands::frames::rm(&logbook, id)?,
        },
        Commands::Pictures { action } => match action {
            PicturesAction::New => commands::pictures::new(&logbook)?,
            PicturesAction::Attach { frame, file } => {
                commands::pictures::attach(&logbook, frame, file)?
            }
            PicturesAction::Detach { frame } => commands::pictures::detach(&logbook, frame)?,
            PicturesAction::Compress { filename } => {
                commands::pictures::compress(&logbook, filename)?
            }
            PicturesAction::Gc => commands::pictures::gc(&logbook)?,
            PicturesAction::Export { dir } => commands::pictures::export(&logbook, dir)?,
            PicturesAction::Import { archive } => commands::pictures::import(&logbook, archive)?,
            PicturesAction::Gallery { filename, dir } => {
                commands::pictures::gallery(&logbook, &filename, dir)?
            }
            PicturesAction::ExportSet { path } => commands::pictures::export_set(&logbook, path)?,
            PicturesAction::ExportShow => commands::pictures::export_show(&logbook)?,
            PicturesAction::MaxDimension { value } => {
                commands::pictures::max_dimension(&logbook, value)?
            }
        },
    }

    Ok(())
}
