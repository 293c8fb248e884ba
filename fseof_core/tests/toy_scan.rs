use std::path::PathBuf;

use fseof_core::flux_analysis::{FluxModel, SolveMode};
use fseof_core::fseof::classify::{ClassificationStrategy, ReactionClass};
use fseof_core::fseof::report::{DOWN, KNOCKOUT, UP};
use fseof_core::fseof::{run_fseof, FseofConfigBuilder, FseofError};
use fseof_core::metabolic_model::model::Model;

fn toy_model() -> Model {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test_data")
        .join("test_models")
        .join("toy_network.json");
    Model::read_json(path).unwrap()
}

fn section_ids(result: &fseof_core::fseof::FseofResult, section: &str) -> Vec<String> {
    result.report.sections[section]
        .iter()
        .map(|row| row.reaction_id.clone())
        .collect()
}

#[test]
fn product_competes_with_growth() {
    let mut model = toy_model();
    let config = FseofConfigBuilder::default()
        .target("EX_prod")
        .biomass("BIOMASS")
        .build()
        .unwrap();
    let result = run_fseof(&mut model, &config).unwrap();

    assert!((result.maximum - 20.).abs() < 1e-4);
    assert_eq!(result.levels.len(), 10);
    assert!((result.levels[9] - 18.).abs() < 1e-4);
    assert!(result.summary.infeasible_levels.is_empty());

    let up = section_ids(&result, UP);
    let down = section_ids(&result, DOWN);
    assert!(up.contains(&"PROD".to_string()));
    assert!(down.contains(&"BIOMASS".to_string()));
    // Exchange and transport of the product are filtered out
    assert!(!up.contains(&"EX_prod".to_string()));
    assert!(!up.contains(&"PRODt".to_string()));
    assert!(result.report.sections[KNOCKOUT].is_empty());

    let growth = &result.matrix.get("BIOMASS").unwrap().trajectory.values;
    for (value, level) in growth.iter().zip(&result.levels) {
        assert!((value - (20. - level)).abs() < 1e-3);
    }
    // The unused bypass carries no flux under parsimonious FBA
    assert!(!result.matrix.contains("ALT1"));

    let prod = result.report.sections[UP]
        .iter()
        .find(|row| row.reaction_id == "PROD")
        .unwrap();
    assert_eq!(prod.genes, vec!["g0004", "g0005"]);
    assert_eq!(prod.reaction, "pyr_c --> prod_c");

    assert_eq!(model.bounds("EX_prod").unwrap(), (0., 1000.));
    assert_eq!(model.bounds("BIOMASS").unwrap(), (0., 1000.));
}

#[test]
fn growth_cap_flattens_early_growth() {
    let mut model = toy_model();
    let config = FseofConfigBuilder::default()
        .target("EX_prod")
        .biomass("BIOMASS")
        .growth_cap(0.5_f64)
        .build()
        .unwrap();
    let result = run_fseof(&mut model, &config).unwrap();
    let growth = &result.matrix.get("BIOMASS").unwrap().trajectory.values;
    assert!(growth.iter().all(|v| *v <= 10. + 1e-4));
    assert!((growth[0] - 10.).abs() < 1e-3);
    assert_eq!(model.bounds("BIOMASS").unwrap(), (0., 1000.));
}

#[test]
fn variability_with_slope_strategy() {
    let mut model = toy_model();
    let config = FseofConfigBuilder::default()
        .target("EX_prod")
        .biomass("BIOMASS")
        .steps(5_usize)
        .mode(SolveMode::variability())
        .strategy(ClassificationStrategy::Slope)
        .build()
        .unwrap();
    let result = run_fseof(&mut model, &config).unwrap();
    assert_eq!(result.report.strategy, "slope");
    assert!(!result.report.sections.contains_key(KNOCKOUT));
    let prod = result.report.sections[UP]
        .iter()
        .find(|row| row.reaction_id == "PROD")
        .unwrap();
    assert_eq!(prod.reaction_class, Some(ReactionClass::Coupled));
    assert_eq!(prod.lower_bounds.as_ref().map(Vec::len), Some(5));
    assert!(section_ids(&result, DOWN).contains(&"BIOMASS".to_string()));
}

#[test]
fn unknown_target() {
    let mut model = toy_model();
    let config = FseofConfigBuilder::default()
        .target("EX_missing")
        .biomass("BIOMASS")
        .build()
        .unwrap();
    assert!(matches!(
        run_fseof(&mut model, &config),
        Err(FseofError::UnknownReaction(id)) if id == "EX_missing"
    ));
}

#[test]
fn blocked_target_has_no_baseline() {
    let mut model = toy_model();
    model.set_bounds("PROD", 0., 0.).unwrap();
    let config = FseofConfigBuilder::default()
        .target("EX_prod")
        .biomass("BIOMASS")
        .build()
        .unwrap();
    assert!(matches!(
        run_fseof(&mut model, &config),
        Err(FseofError::InfeasibleBaseline { reaction, .. }) if reaction == "EX_prod"
    ));
}
