use image_folder_packer::archive::write_archive;
use image_folder_packer::media::MediaType;
use image_folder_packer::{BatchDriver, Normalizer, RasterCodec, Selection, Session, Settings};
use std::fs;
use std::io::Cursor;
use std::path::Path;

fn noisy_png(path: &Path, size: u32) {
    let mut seed = 7u32;
    let img = image::RgbImage::from_fn(size, size, |_, _| {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
        let v = (seed >> 16) as u8;
        image::Rgb([v, v.wrapping_add(85), v.wrapping_mul(7)])
    });
    img.save(path).unwrap();
}

fn flat_png(path: &Path) {
    image::RgbImage::from_pixel(16, 16, image::Rgb([200, 40, 40]))
        .save(path)
        .unwrap();
}

/// Trip/{a.png, b.txt}, Pets/c.png
fn fixture(root: &Path) -> Vec<std::path::PathBuf> {
    let trip = root.join("Trip");
    let pets = root.join("Pets");
    fs::create_dir_all(&trip).unwrap();
    fs::create_dir_all(&pets).unwrap();
    noisy_png(&trip.join("a.png"), 160);
    fs::write(trip.join("b.txt"), "itinerary").unwrap();
    flat_png(&pets.join("c.png"));
    vec![trip, pets]
}

fn small_budget() -> Settings {
    Settings {
        size_budget: 4 * 1024,
        max_output_bytes: 4 * 1024,
        ..Settings::default()
    }
}

fn entry_names(bytes: Vec<u8>) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

#[test]
fn folders_become_archive_directories() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = fixture(dir.path());

    let settings = small_budget();
    let driver = BatchDriver::new(Normalizer::new(RasterCodec::new(settings.background), settings));
    let mut session = Session::new(Selection::read(&inputs).unwrap());
    let batch = driver.run(&mut session, |_| {});

    let trip = &batch.groups[0];
    assert_eq!(trip.name, "Trip");
    assert_eq!(trip.files[0].name, "a.jpg");
    assert_eq!(trip.files[0].media_type, MediaType::jpeg());
    assert!(trip.files[0].converted);
    assert!(trip.files[0].is_compressed);
    assert!(trip.files[0].attempts >= 1 && trip.files[0].attempts <= 5);
    assert!(trip.files[0].compressed_size < trip.files[0].original_size);

    assert_eq!(trip.files[1].name, "b.txt");
    assert!(!trip.files[1].is_compressed);
    assert_eq!(trip.files[1].data, b"itinerary");

    let pets = &batch.groups[1];
    assert_eq!(pets.name, "Pets");
    assert_eq!(pets.files[0].name, "c.jpg");
    assert!(!pets.files[0].is_compressed);

    let bytes = write_archive(&batch, Cursor::new(Vec::new())).unwrap().into_inner();
    assert_eq!(
        entry_names(bytes),
        vec!["Trip/", "Trip/a.jpg", "Trip/b.txt", "Pets/", "Pets/c.jpg"]
    );
}

#[test]
fn excluded_group_is_absent_from_output() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = fixture(dir.path());

    let mut selection = Selection::read(&inputs).unwrap();
    assert!(selection.remove_group("Trip").is_some());

    let driver = BatchDriver::new(Normalizer::new(RasterCodec::default(), small_budget()));
    let mut session = Session::new(selection);
    let batch = driver.run(&mut session, |_| {});

    assert_eq!(batch.file_count(), 1);
    assert!(session.log().entries().iter().all(|e| !e.contains("Trip")));

    let bytes = write_archive(&batch, Cursor::new(Vec::new())).unwrap().into_inner();
    assert_eq!(entry_names(bytes), vec!["Pets/", "Pets/c.jpg"]);
}

#[test]
fn corrupt_png_is_packed_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().join("Broken");
    fs::create_dir_all(&folder).unwrap();
    fs::write(folder.join("bad.png"), b"definitely not a png").unwrap();

    let driver = BatchDriver::new(Normalizer::new(RasterCodec::default(), Settings::default()));
    let mut session = Session::new(Selection::read(&[folder]).unwrap());
    let batch = driver.run(&mut session, |_| {});

    let file = &batch.groups[0].files[0];
    assert_eq!(file.name, "bad.png");
    assert_eq!(file.data, b"definitely not a png");
    assert!(file.is_degraded());
}

#[test]
fn default_budget_brings_large_png_under_500_kib() {
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().join("Scans");
    fs::create_dir_all(&folder).unwrap();
    flat_png(&folder.join("small.png"));
    noisy_png(&folder.join("big.png"), 1000);

    let driver = BatchDriver::new(Normalizer::new(RasterCodec::default(), Settings::default()));
    let mut session = Session::new(Selection::read(&[folder]).unwrap());
    let batch = driver.run(&mut session, |_| {});

    let files = &batch.groups[0].files;
    assert_eq!(files[0].name, "big.jpg");
    assert!(files[0].original_size > 512_000);
    assert!(files[0].is_compressed);
    assert!(files[0].compressed_size <= 512_000, "got {} bytes", files[0].compressed_size);
    assert!(files[0].degradation.is_none());
    assert_eq!(image::guess_format(&files[0].data).unwrap(), image::ImageFormat::Jpeg);

    assert_eq!(files[1].name, "small.jpg");
    assert!(files[1].converted);
    assert!(!files[1].is_compressed);
}
