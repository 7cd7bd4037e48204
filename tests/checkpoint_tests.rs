mod common;

use std::time::Duration;

use common::{linear_tree, regression_pset, MockBackend};
use evopipe::engines::checkpoint::{render_pipeline_export, CheckpointWriter};
use evopipe::engines::generation::Individual;

fn temp_folder(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("evopipe-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn archive_member() -> Individual {
    let pset = regression_pset();
    let mut member = Individual::new(linear_tree(&pset, &["RidgeModel", "ScaleUnit"]));
    member.fitness = Some([0.8, 0.7, 0.25]);
    member
}

#[test]
fn periodic_save_writes_one_file_per_member_and_skips_reexports() {
    let folder = temp_folder("ckpt");
    let pset = regression_pset();
    let backend = MockBackend::new();
    let member = archive_member();

    let mut writer =
        CheckpointWriter::new(folder.clone(), Some(42)).with_min_interval(Duration::ZERO);
    writer.maybe_save(1, std::slice::from_ref(&member), &backend, &pset);

    let files: Vec<String> = std::fs::read_dir(&folder)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("pipeline_gen_1_idx_0_"));
    assert!(files[0].ends_with(".txt"));

    let contents = std::fs::read_to_string(folder.join(&files[0])).unwrap();
    assert!(contents.contains("Pipeline:"));
    assert!(contents.contains("make_pipeline(RidgeModel, ScaleUnit)"));
    assert!(contents.contains("Provenance:"));
    assert!(contents.contains("\"random_seed\": 42"));

    // The same pipeline in a later generation is not written twice.
    writer.maybe_save(2, std::slice::from_ref(&member), &backend, &pset);
    assert_eq!(std::fs::read_dir(&folder).unwrap().count(), 1);

    std::fs::remove_dir_all(&folder).ok();
}

#[test]
fn rate_limit_suppresses_saves_inside_the_interval() {
    let folder = temp_folder("ckpt-rate");
    let pset = regression_pset();
    let backend = MockBackend::new();
    let member = archive_member();

    // Default 30-second interval, freshly reset: nothing may be written.
    let mut writer = CheckpointWriter::new(folder.clone(), None);
    writer.mark_run_start();
    writer.maybe_save(1, std::slice::from_ref(&member), &backend, &pset);
    assert!(!folder.exists());
}

#[test]
fn export_renders_scores_expression_and_provenance() {
    let pset = regression_pset();
    let backend = MockBackend::new();
    let member = archive_member();

    let text = render_pipeline_export(&member, &backend, &pset, Some(7));
    assert!(text.contains("# Score on dataset 1: 0.8"));
    assert!(text.contains("# Score on dataset 2: 0.7"));
    assert!(text.contains("make_pipeline(RidgeModel, ScaleUnit)"));
    assert!(text.contains(&member.tree.canonical_string(&pset)));
    assert!(text.contains("\"mutation_count\": 0"));
}
