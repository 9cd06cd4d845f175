use std::fs;
use std::path::Path;

use filmlog_core::domain::*;
use filmlog_core::error::Error;
use filmlog_core::pictures::archive::ArchiveEvent;
use filmlog_core::pictures::CompressOutcome;
use filmlog_core::Logbook;

fn create_jpeg(path: &Path, w: u32, h: u32) {
    let img = image::RgbImage::from_fn(w, h, |x, y| {
        image::Rgb([(x % 251) as u8, (y % 241) as u8, ((x + y) % 239) as u8])
    });
    img.save(path).unwrap();
}

fn camera(make: &str, model: &str) -> Camera {
    Camera {
        make: make.to_string(),
        model: model.to_string(),
        ..Default::default()
    }
}

fn lens(make: &str, model: &str) -> Lens {
    Lens {
        make: make.to_string(),
        model: model.to_string(),
        ..Default::default()
    }
}

fn filter(make: &str, model: &str) -> Filter {
    Filter {
        make: make.to_string(),
        model: model.to_string(),
        ..Default::default()
    }
}

fn roll(name: &str, camera_id: Option<i64>) -> Roll {
    Roll {
        name: name.to_string(),
        camera_id,
        ..Default::default()
    }
}

/// A logbook with one frame, returning (logbook, frame id).
fn logbook_with_frame(data_dir: &Path) -> (Logbook, i64) {
    let logbook = Logbook::open(data_dir).unwrap();
    let roll_id = logbook.add_roll(&roll("Tri-X", None)).unwrap();
    let frame_id = logbook
        .add_frame(&Frame {
            roll_id,
            count: 1,
            ..Default::default()
        })
        .unwrap();
    (logbook, frame_id)
}

// ── Logbook::open ────────────────────────────────────────────────

#[test]
fn test_open_creates_catalog() {
    let tmp = tempfile::tempdir().unwrap();
    let data_dir = tmp.path().join("sub/filmlog");

    let _logbook = Logbook::open(&data_dir).unwrap();
    assert!(data_dir.join("catalog.db").exists());
}

#[test]
fn test_reopen_persists_gear_and_mounts() {
    let tmp = tempfile::tempdir().unwrap();
    let (cam, len) = {
        let logbook = Logbook::open(tmp.path()).unwrap();
        let cam = GearKey::camera(logbook.add_camera(camera("Nikon", "FE")).unwrap());
        let len = GearKey::lens(logbook.add_lens(lens("Nikon", "Series E 50mm")).unwrap());
        logbook.add_mount(cam, len).unwrap();
        (cam, len)
    };

    let logbook = Logbook::open(tmp.path()).unwrap();
    assert!(logbook.is_mounted(len, cam).unwrap());
    assert_eq!(logbook.list_gear(GearKind::Camera).unwrap().len(), 1);
}

// ── Gear deletion ────────────────────────────────────────────────

#[test]
fn test_delete_gear_cascades_mounts() {
    let tmp = tempfile::tempdir().unwrap();
    let mut logbook = Logbook::open_in_memory(tmp.path()).unwrap();
    let cam = GearKey::camera(logbook.add_camera(camera("Canon", "AE-1")).unwrap());
    let len = GearKey::lens(logbook.add_lens(lens("Canon", "FD 50mm")).unwrap());
    let fil = GearKey::filter(logbook.add_filter(filter("Hoya", "UV")).unwrap());
    logbook.add_mount(cam, len).unwrap();
    logbook.add_mount(fil, len).unwrap();

    assert!(logbook.delete_gear(len).unwrap());
    assert!(logbook.mountables_of(cam).unwrap().is_empty());
    assert!(logbook.mountables_of(fil).unwrap().is_empty());
}

#[test]
fn test_delete_gear_in_use_is_refused() {
    let tmp = tempfile::tempdir().unwrap();
    let mut logbook = Logbook::open_in_memory(tmp.path()).unwrap();
    let cam = GearKey::camera(logbook.add_camera(camera("Leica", "M3")).unwrap());
    let len = GearKey::lens(logbook.add_lens(lens("Leica", "Summaron")).unwrap());
    logbook.add_mount(cam, len).unwrap();
    let roll_id = logbook.add_roll(&roll("HP5", Some(cam.id))).unwrap();

    let err = logbook.delete_gear(cam).unwrap_err();
    assert!(matches!(err, Error::GearInUse(k) if k == cam));
    assert!(err.to_string().contains("is being used"));
    // Nothing changed
    assert!(logbook.is_mounted(cam, len).unwrap());

    logbook.delete_roll(roll_id).unwrap();
    assert!(logbook.delete_gear(cam).unwrap());
}

// ── Mount selection ──────────────────────────────────────────────

#[test]
fn test_set_mounts_of_kind() {
    let tmp = tempfile::tempdir().unwrap();
    let mut logbook = Logbook::open_in_memory(tmp.path()).unwrap();
    let len = GearKey::lens(logbook.add_lens(lens("Zeiss", "Tessar")).unwrap());
    let a = logbook.add_camera(camera("Contax", "139")).unwrap();
    let b = logbook.add_camera(camera("Contax", "RTS")).unwrap();
    let f = logbook.add_filter(filter("B+W", "Yellow")).unwrap();
    logbook.add_mount(len, GearKey::camera(a)).unwrap();
    logbook.add_mount(len, GearKey::filter(f)).unwrap();

    let change = logbook.set_mounts_of_kind(len, GearKind::Camera, &[b]).unwrap();
    assert_eq!(change, MountChange { added: 1, removed: 1 });

    let names: Vec<String> = logbook
        .mountables_of(len)
        .unwrap()
        .iter()
        .map(Gear::name)
        .collect();
    // Filter relations are outside the camera candidates and survive
    assert_eq!(names, vec!["Contax RTS", "B+W Yellow"]);

    assert!(matches!(
        logbook.set_mounts_of_kind(len, GearKind::Lens, &[]).unwrap_err(),
        Error::Validation(_)
    ));
}

// ── Frame validation ─────────────────────────────────────────────

#[test]
fn test_frame_gear_must_be_mounted() {
    let tmp = tempfile::tempdir().unwrap();
    let logbook = Logbook::open_in_memory(tmp.path()).unwrap();
    let cam = GearKey::camera(logbook.add_camera(camera("Pentax", "LX")).unwrap());
    let len = GearKey::lens(logbook.add_lens(lens("Pentax", "FA 43mm")).unwrap());
    let fil = GearKey::filter(logbook.add_filter(filter("Hoya", "Orange")).unwrap());
    let roll_id = logbook.add_roll(&roll("Ektar", Some(cam.id))).unwrap();

    let frame = Frame {
        roll_id,
        count: 1,
        lens_id: Some(len.id),
        filter_id: Some(fil.id),
        ..Default::default()
    };

    assert!(matches!(logbook.add_frame(&frame).unwrap_err(), Error::Validation(_)));

    logbook.add_mount(cam, len).unwrap();
    assert!(matches!(logbook.add_frame(&frame).unwrap_err(), Error::Validation(_)));

    logbook.add_mount(fil, len).unwrap();
    let id = logbook.add_frame(&frame).unwrap();
    assert_eq!(logbook.frame(id).unwrap().lens_id, Some(len.id));
}

#[test]
fn test_frame_requires_existing_roll() {
    let tmp = tempfile::tempdir().unwrap();
    let logbook = Logbook::open_in_memory(tmp.path()).unwrap();
    let err = logbook
        .add_frame(&Frame {
            roll_id: 77,
            count: 1,
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn test_list_frames_sorted_by_lens() {
    let tmp = tempfile::tempdir().unwrap();
    let logbook = Logbook::open_in_memory(tmp.path()).unwrap();
    let zeiss = logbook.add_lens(lens("Zeiss", "Biogon")).unwrap();
    let canon = logbook.add_lens(lens("Canon", "FD 35mm")).unwrap();
    let roll_id = logbook.add_roll(&roll("Portra", None)).unwrap();
    for (count, lens_id) in [(1, Some(zeiss)), (2, None), (3, Some(canon))] {
        logbook
            .add_frame(&Frame {
                roll_id,
                count,
                lens_id,
                ..Default::default()
            })
            .unwrap();
    }

    let counts: Vec<i32> = logbook
        .list_frames(roll_id, FrameSortMode::Lens)
        .unwrap()
        .iter()
        .map(|f| f.count)
        .collect();
    assert_eq!(counts, vec![3, 1, 2]);
}

// ── Pictures ─────────────────────────────────────────────────────

#[test]
fn test_import_picture_compresses_and_attaches() {
    let tmp = tempfile::tempdir().unwrap();
    let (logbook, frame_id) = logbook_with_frame(&tmp.path().join("data"));
    let source = tmp.path().join("capture.jpg");
    create_jpeg(&source, 2048, 1536);

    let filename = logbook.import_picture(frame_id, &source).unwrap();

    let stored = logbook.picture_path(&filename);
    assert_eq!(image::image_dimensions(&stored).unwrap(), (1024, 768));
    assert_eq!(
        logbook.frame(frame_id).unwrap().picture_filename.as_deref(),
        Some(filename.as_str())
    );
    // Source is left alone
    assert_eq!(image::image_dimensions(&source).unwrap(), (2048, 1536));
}

#[test]
fn test_picture_max_dimension_config() {
    let tmp = tempfile::tempdir().unwrap();
    let (logbook, frame_id) = logbook_with_frame(tmp.path());
    assert_eq!(logbook.picture_max_dimension().unwrap(), 1024);

    logbook.set_picture_max_dimension(200).unwrap();
    let source = tmp.path().join("wide.jpg");
    create_jpeg(&source, 400, 100);
    let filename = logbook.import_picture(frame_id, &source).unwrap();
    assert_eq!(
        image::image_dimensions(logbook.picture_path(&filename)).unwrap(),
        (200, 50)
    );

    logbook.set_picture_max_dimension(100).unwrap();
    assert_eq!(
        logbook.compress_picture(&filename).unwrap(),
        CompressOutcome::Compressed { width: 100, height: 25 }
    );
    assert_eq!(logbook.compress_all_pictures().unwrap(), 0);
}

#[test]
fn test_attach_new_picture_compresses_in_place() {
    let tmp = tempfile::tempdir().unwrap();
    let (logbook, frame_id) = logbook_with_frame(tmp.path());

    let path = logbook.new_picture().unwrap();
    create_jpeg(&path, 3000, 1500);
    let filename = path.file_name().unwrap().to_str().unwrap().to_string();
    logbook.attach_picture(frame_id, &filename).unwrap();

    assert_eq!(image::image_dimensions(&path).unwrap(), (1024, 512));
    assert_eq!(
        logbook.frame(frame_id).unwrap().picture_filename.as_deref(),
        Some(filename.as_str())
    );
    // The stored file is the attached one, nothing left to reclaim
    assert!(logbook.reclaim_orphans().unwrap().is_empty());
}

#[test]
fn test_import_small_png_is_stored_as_jpeg() {
    let tmp = tempfile::tempdir().unwrap();
    let (logbook, frame_id) = logbook_with_frame(&tmp.path().join("data"));
    let source = tmp.path().join("small.png");
    image::RgbImage::from_fn(50, 30, |x, _| image::Rgb([x as u8, 80, 160]))
        .save(&source)
        .unwrap();

    let filename = logbook.import_picture(frame_id, &source).unwrap();

    let stored = logbook.picture_path(&filename);
    let format = image::ImageReader::open(&stored)
        .unwrap()
        .with_guessed_format()
        .unwrap()
        .format();
    assert_eq!(format, Some(image::ImageFormat::Jpeg));
    assert_eq!(image::image_dimensions(&stored).unwrap(), (50, 30));
}

#[test]
fn test_picture_attached_to_one_frame_only() {
    let tmp = tempfile::tempdir().unwrap();
    let (logbook, frame_id) = logbook_with_frame(tmp.path());
    let roll_id = logbook.frame(frame_id).unwrap().roll_id;
    let other = logbook
        .add_frame(&Frame {
            roll_id,
            count: 2,
            ..Default::default()
        })
        .unwrap();

    let path = logbook.new_picture().unwrap();
    create_jpeg(&path, 32, 32);
    let filename = path.file_name().unwrap().to_str().unwrap().to_string();

    logbook.attach_picture(frame_id, &filename).unwrap();
    assert!(matches!(
        logbook.attach_picture(other, &filename).unwrap_err(),
        Error::Validation(_)
    ));
    assert!(matches!(
        logbook.attach_picture(other, "missing.jpg").unwrap_err(),
        Error::PictureNotFound(_)
    ));
}

#[test]
fn test_frame_picture_owned_by_one_frame_on_add_and_update() {
    let tmp = tempfile::tempdir().unwrap();
    let logbook = Logbook::open(tmp.path()).unwrap();
    let roll_id = logbook.add_roll(&roll("Portra 400", None)).unwrap();
    let owned = Frame {
        roll_id,
        count: 1,
        picture_filename: Some("p.jpg".to_string()),
        ..Default::default()
    };
    let owner = logbook.add_frame(&owned).unwrap();

    let duplicate = Frame {
        count: 2,
        ..owned.clone()
    };
    assert!(matches!(
        logbook.add_frame(&duplicate).unwrap_err(),
        Error::Validation(_)
    ));

    let other = logbook
        .add_frame(&Frame {
            roll_id,
            count: 2,
            ..Default::default()
        })
        .unwrap();
    let mut stolen = logbook.frame(other).unwrap();
    stolen.picture_filename = Some("p.jpg".to_string());
    assert!(matches!(
        logbook.update_frame(&stolen).unwrap_err(),
        Error::Validation(_)
    ));
    assert_eq!(logbook.frame(other).unwrap().picture_filename, None);

    // The owner may be rewritten with its own picture
    let mut kept = logbook.frame(owner).unwrap();
    kept.note = Some("pushed one stop".to_string());
    logbook.update_frame(&kept).unwrap();
    assert_eq!(
        logbook.frame(owner).unwrap().picture_filename.as_deref(),
        Some("p.jpg")
    );
}

#[test]
fn test_reclaim_orphans_after_roll_delete() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut logbook, frame_id) = logbook_with_frame(tmp.path());
    let roll_id = logbook.frame(frame_id).unwrap().roll_id;

    let kept_roll = logbook.add_roll(&roll("Kept", None)).unwrap();
    let kept_frame = logbook
        .add_frame(&Frame {
            roll_id: kept_roll,
            count: 1,
            ..Default::default()
        })
        .unwrap();

    let source = tmp.path().join("src.jpg");
    create_jpeg(&source, 64, 64);
    let doomed = logbook.import_picture(frame_id, &source).unwrap();
    let kept = logbook.import_picture(kept_frame, &source).unwrap();

    logbook.delete_roll(roll_id).unwrap();
    let deleted = logbook.reclaim_orphans().unwrap();

    assert_eq!(deleted, vec![logbook.picture_path(&doomed)]);
    assert!(logbook.picture_path(&kept).exists());
    assert!(!logbook.picture_path(&doomed).exists());
}

#[test]
fn test_detach_picture_leaves_orphan() {
    let tmp = tempfile::tempdir().unwrap();
    let (logbook, frame_id) = logbook_with_frame(tmp.path());
    let source = tmp.path().join("src.jpg");
    create_jpeg(&source, 16, 16);
    let filename = logbook.import_picture(frame_id, &source).unwrap();

    assert_eq!(logbook.detach_picture(frame_id).unwrap(), Some(filename.clone()));
    assert!(logbook.picture_path(&filename).exists());
    assert_eq!(logbook.reclaim_orphans().unwrap().len(), 1);
}

// ── Export / import ──────────────────────────────────────────────

#[test]
fn test_export_then_import_restores_pictures() {
    let tmp = tempfile::tempdir().unwrap();
    let (logbook, frame_id) = logbook_with_frame(&tmp.path().join("data"));
    let source = tmp.path().join("src.jpg");
    create_jpeg(&source, 80, 60);
    let filename = logbook.import_picture(frame_id, &source).unwrap();
    let original = fs::read(logbook.picture_path(&filename)).unwrap();

    // An unreferenced file is not exported
    fs::write(logbook.pictures().dir().join("stray.jpg"), b"stray").unwrap();

    let export_dir = tmp.path().join("exports");
    fs::create_dir_all(&export_dir).unwrap();
    logbook.set_export_path(&export_dir).unwrap();

    let events: Vec<ArchiveEvent> = logbook.export_pictures(None).unwrap().collect();
    assert_eq!(events.first(), Some(&ArchiveEvent::Started { total: 1 }));
    let archive = match events.last() {
        Some(ArchiveEvent::Finished(outcome)) => {
            assert!(outcome.success);
            assert_eq!(outcome.completed, 1);
            outcome.archive.clone().unwrap()
        }
        other => panic!("expected Finished, got {other:?}"),
    };
    let archive_name = archive.file_name().unwrap().to_str().unwrap();
    assert!(archive_name.starts_with("filmlog_pictures_"));
    assert!(archive_name.ends_with(".zip"));

    // Restore into a fresh logbook
    let (restored, _) = logbook_with_frame(&tmp.path().join("restored"));
    let outcome = restored.import_pictures(&archive).wait();
    assert!(outcome.success);
    assert_eq!(outcome.completed, 1);
    assert_eq!(fs::read(restored.picture_path(&filename)).unwrap(), original);
    assert!(!restored.picture_path("stray.jpg").exists());
}

#[test]
fn test_export_requires_path() {
    let tmp = tempfile::tempdir().unwrap();
    let logbook = Logbook::open(tmp.path()).unwrap();

    assert!(matches!(
        logbook.export_pictures(None).unwrap_err(),
        Error::ExportPathNotSet
    ));
    assert!(matches!(
        logbook
            .export_pictures(Some(&tmp.path().join("missing")))
            .unwrap_err(),
        Error::ExportPathNotFound(_)
    ));
    assert!(matches!(
        logbook.set_export_path(&tmp.path().join("missing")).unwrap_err(),
        Error::ExportPathNotFound(_)
    ));
}

#[test]
fn test_export_with_no_pictures() {
    let tmp = tempfile::tempdir().unwrap();
    let logbook = Logbook::open(&tmp.path().join("data")).unwrap();

    let outcome = logbook.export_pictures(Some(tmp.path())).unwrap().wait();
    assert!(outcome.success);
    assert_eq!(outcome.completed, 0);
    assert_eq!(outcome.archive, None);
}

#[test]
fn test_copy_picture_to_gallery() {
    let tmp = tempfile::tempdir().unwrap();
    let (logbook, frame_id) = logbook_with_frame(&tmp.path().join("data"));
    let source = tmp.path().join("src.jpg");
    create_jpeg(&source, 16, 16);
    let filename = logbook.import_picture(frame_id, &source).unwrap();

    let gallery = tmp.path().join("Pictures/filmlog");
    let copy = logbook.copy_picture_to_gallery(&filename, &gallery).unwrap();
    assert_eq!(copy, gallery.join(&filename));
    assert!(copy.exists());
}
