use std::{env, fs, io::Write, path::PathBuf};

use glam::DVec3;
use isosource_core::{
    emission::worker_rng,
    messenger::SourceMessenger,
    metrics::EmissionTally,
    AssemblyConfig, ConeSampler, EmissionDriver, EnergySpectrum, FnSink, ParticleState,
    SourceError, SourceTable,
};

fn single_source_config(shift: DVec3) -> AssemblyConfig {
    let mut cfg = AssemblyConfig {
        iso_radius: Some(100.0),
        polar_start: Some(1.0),
        polar_stop: Some(1.0),
        rot_start: Some(0.0),
        rot_stop: Some(0.0),
        ..Default::default()
    };
    cfg.set_shift(shift);
    cfg
}

#[test]
fn single_on_axis_source_lands_at_minus_radius() {
    let table = SourceTable::new([(0.0, 0.0)]);
    let mut driver =
        EmissionDriver::cone(&single_source_config(DVec3::ZERO), table, worker_rng(11, 0))
            .expect("config is complete");

    for _ in 0..32 {
        let mut primaries = Vec::new();
        driver.emit_event(&mut primaries);
        assert_eq!(primaries.len(), 1);
        let p = primaries[0];
        assert!((p.position - DVec3::new(-100.0, 0.0, 0.0)).length() < 1e-12);
        assert!((p.direction - DVec3::X).length() < 1e-12);
        assert!(p.energy == 1.17 || p.energy == 1.33);
    }
}

#[test]
fn lab_shift_offsets_emission_point() {
    let table = SourceTable::new([(0.0, 0.0)]);
    let mut driver = EmissionDriver::cone(
        &single_source_config(DVec3::new(5.0, -2.0, 0.0)),
        table,
        worker_rng(12, 0),
    )
    .unwrap();
    let mut primaries = Vec::new();
    driver.emit_event(&mut primaries);
    assert!((primaries[0].position - DVec3::new(-95.0, -2.0, 0.0)).length() < 1e-12);
}

#[test]
fn sink_is_called_once_per_source() {
    for n in [0usize, 1, 6, 30] {
        let table = SourceTable::new((0..n).map(|i| (10.0, i as f64 * 12.0)));
        let mut driver =
            EmissionDriver::cone(&single_source_config(DVec3::ZERO), table, worker_rng(1, 0))
                .unwrap();
        let mut calls = 0usize;
        let mut sink = FnSink(|_: &ParticleState| calls += 1);
        let emitted = driver.emit_event(&mut sink);
        drop(sink);
        assert_eq!(emitted, n);
        assert_eq!(calls, n);
    }
}

#[test]
fn same_seed_reproduces_run() {
    let mut cfg = single_source_config(DVec3::ZERO);
    cfg.set_src_angle(5.0);
    cfg.rot_stop = Some(360.0);
    let table = SourceTable::new([(20.0, 0.0), (20.0, 120.0), (20.0, 240.0)]);

    let run = |worker: u64| {
        let mut driver = EmissionDriver::cone(&cfg, table.clone(), worker_rng(77, worker)).unwrap();
        let mut primaries = Vec::new();
        for _ in 0..50 {
            driver.emit_event(&mut primaries);
        }
        primaries
    };

    assert_eq!(run(0), run(0));
    assert_ne!(run(0), run(1));
}

#[test]
fn cone_opening_bounds_angle_to_isocentre() {
    let mut cfg = single_source_config(DVec3::ZERO);
    cfg.set_src_angle(3.0);
    cfg.rot_stop = Some(360.0);
    let table = SourceTable::new([(0.0, 0.0), (45.0, 90.0), (-30.0, 200.0)]);
    let mut driver = EmissionDriver::new(
        &cfg,
        table,
        ConeSampler::new(3f64.to_radians().cos(), 1.0, EnergySpectrum::Monoenergetic(1.25)),
        worker_rng(3, 2),
    )
    .unwrap();

    let mut primaries = Vec::new();
    for _ in 0..500 {
        driver.emit_event(&mut primaries);
    }
    let max_cos = 3f64.to_radians().cos();
    for p in &primaries {
        assert!((p.position.length() - 100.0).abs() < 1e-9);
        assert!((p.direction.length() - 1.0).abs() < 1e-12);
        let to_iso = (-p.position).normalize();
        assert!(to_iso.dot(p.direction) >= max_cos - 1e-12);
        assert_eq!(p.energy, 1.25);
    }
}

#[test]
fn macro_and_table_file_drive_a_run() {
    let table_path = temp_file_path("table", "txt");
    {
        let mut file = fs::File::create(&table_path).unwrap();
        writeln!(file, "grid 2 3").unwrap();
        writeln!(file, "10 0 10 120 10 240").unwrap();
        writeln!(file, "30 60 30 180 30 300").unwrap();
    }
    let macro_text = format!(
        "/GP/source/iso_radius 40 cm\n\
         /GP/source/src_angle 2\n\
         /GP/source/rot_start 0\n\
         /GP/source/rot_stop 360\n\
         /GP/source/shift_x 0\n\
         /GP/source/shift_y 0\n\
         /GP/source/shift_z 0\n\
         /GP/source/src_fname {}\n\
         /run/beamOn 10\n",
        table_path.display()
    );

    let mut messenger = SourceMessenger::default();
    let foreign = messenger.apply_macro(macro_text.as_bytes()).unwrap();
    fs::remove_file(&table_path).ok();
    assert_eq!(foreign, vec!["/run/beamOn 10"]);

    let (config, sources) = messenger.into_parts();
    assert_eq!(sources.len(), 6);
    let mut driver = EmissionDriver::cone(&config, sources, worker_rng(5, 0)).unwrap();
    let mut tally = EmissionTally::default();
    for _ in 0..10 {
        driver.emit_event(&mut tally);
        tally.record_event();
    }
    assert_eq!(tally.events, 10);
    assert_eq!(tally.primaries, 60);
    assert!(tally.position_max.unwrap().max_element() <= 400.0 + 1e-9);
    assert!(tally.position_min.unwrap().min_element() >= -400.0 - 1e-9);
}

#[test]
fn missing_settings_fail_before_first_event() {
    let table = SourceTable::new([(0.0, 0.0)]);
    let mut cfg = single_source_config(DVec3::ZERO);
    cfg.rot_stop = None;
    let err = EmissionDriver::cone(&cfg, table, worker_rng(0, 0)).err().unwrap();
    assert!(matches!(err, SourceError::Unset("rot_stop")));
    assert!(err.is_configuration());
}

fn temp_file_path(stem: &str, ext: &str) -> PathBuf {
    let mut path = env::temp_dir();
    let unique = format!(
        "isosource_{stem}_{}_{}.{ext}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    );
    path.push(unique);
    path
}
