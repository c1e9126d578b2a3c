use std::path::PathBuf;

use popdyn::{
    project,
    scenario::{ControlConfig, Relationship, ScenarioLoader},
    snapshot::RunWriter,
    summary::ProjectionSummary,
    FishingControl,
};

fn scenario_loader() -> ScenarioLoader {
    ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"))
}

fn scenario_path() -> PathBuf {
    PathBuf::from("scenarios/two_area_stock.yaml")
}

#[test]
fn scenario_loader_reads_fixture() {
    let scenario = scenario_loader().load(scenario_path()).expect("scenario parses");

    assert_eq!(scenario.name, "two_area_stock");
    assert_eq!(scenario.areas.len(), 2);
    assert_eq!(scenario.biology.ages, 12);
    assert!(scenario.plus_group);
    assert_eq!(scenario.closures.len(), 1);
    assert!(matches!(
        scenario.fishery.control,
        ControlConfig::Effort { .. }
    ));
}

#[test]
fn missing_scenario_reports_path() {
    let err = scenario_loader().load("scenarios/missing.yaml").unwrap_err();
    assert!(format!("{err:#}").contains("missing.yaml"));
}

#[test]
fn fixture_projects_deterministically() {
    let scenario = scenario_loader().load(scenario_path()).unwrap();
    let years = scenario.years(None);

    let first = project(&scenario.build_inputs(years, 0).unwrap()).unwrap();
    let second = project(&scenario.build_inputs(years, 0).unwrap()).unwrap();
    let other_replicate = project(&scenario.build_inputs(years, 1).unwrap()).unwrap();

    assert_eq!(first, second);
    assert_ne!(first.numbers, other_replicate.numbers);
    assert_eq!(first.years(), 30);
    assert_eq!(first.areas(), 2);
}

#[test]
fn fixture_closure_stops_offshore_fishing() {
    let scenario = scenario_loader().load(scenario_path()).unwrap();
    let out = project(&scenario.build_inputs(20, 0).unwrap()).unwrap();

    assert!(out.fishing_mortality[(11, 5, 1)] > 0.0);
    for year in 11..20 {
        assert_eq!(out.fishing_mortality[(11, year, 1)], 0.0);
        assert!(out.fishing_mortality[(11, year, 0)] > 0.0);
    }
}

#[test]
fn summary_starts_at_unfished_reference() {
    let scenario = scenario_loader().load(scenario_path()).unwrap();
    let out = project(&scenario.build_inputs(15, 0).unwrap()).unwrap();
    let summary = ProjectionSummary::from_output(&out, Some(scenario.ssb0()));

    assert_eq!(summary.years.len(), 15);
    let first = &summary.years[0];
    assert!((first.depletion.unwrap() - 1.0).abs() < 1e-9);
    assert!((first.recruitment - 1000.0).abs() < 1e-9);
    for year in &summary.years {
        assert!(year.max_fishing_mortality > 0.0);
        assert!(year.max_fishing_mortality <= scenario.fishery.max_f);
        assert!(year.spawning_biomass > 0.0);
    }
    assert!(ProjectionSummary::from_output(&out, None).years[0]
        .depletion
        .is_none());
}

#[test]
fn unfished_control_holds_equilibrium() {
    let mut scenario = scenario_loader().load(scenario_path()).unwrap();
    scenario.areas.truncate(1);
    scenario.closures.clear();
    scenario.recruitment = None;
    scenario.fishery.control = ControlConfig::Unfished;

    for relationship in [Relationship::BevertonHolt, Relationship::Ricker] {
        scenario.biology.relationship = relationship;
        let inputs = scenario.build_inputs(12, 0).unwrap();
        assert!(matches!(
            inputs.control,
            FishingControl::UnfishedReference { .. }
        ));
        let out = project(&inputs).unwrap();

        assert_eq!(out.fishing_mortality.max(), 0.0);
        for year in 1..12 {
            for age in 0..12 {
                let start = out.numbers[(age, 0, 0)];
                let now = out.numbers[(age, year, 0)];
                assert!(
                    (now - start).abs() <= 1e-6 * start,
                    "{relationship:?} age {age} year {year}: {now} vs {start}"
                );
            }
        }
    }
}

#[test]
fn run_writer_exports_projection() {
    let scenario = scenario_loader().load(scenario_path()).unwrap();
    let out = project(&scenario.build_inputs(5, 0).unwrap()).unwrap();
    let summary = ProjectionSummary::from_output(&out, Some(scenario.ssb0()));
    let temp_dir = tempfile::tempdir().unwrap();

    let metadata = RunWriter::metadata(&scenario.name, scenario.seed, 0, &out);
    let dir = RunWriter::new(temp_dir.path())
        .write(&metadata, &out, &summary)
        .unwrap();

    let expected = dir.join("projection.json");
    assert!(
        expected.exists(),
        "expected projection {} to exist",
        expected.display()
    );
    let data = std::fs::read_to_string(expected).unwrap();
    assert!(
        data.contains("\"scenario\": \"two_area_stock\""),
        "projection should contain scenario metadata"
    );
    assert!(data.contains("\"spawning_biomass\""));

    let summary_json = std::fs::read_to_string(dir.join("summary.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&summary_json).unwrap();
    assert_eq!(parsed["summary"]["years"].as_array().unwrap().len(), 5);
}
