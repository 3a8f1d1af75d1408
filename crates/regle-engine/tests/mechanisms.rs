//! End-to-end behavior of the computation mechanisms.

use regle_engine::{parse_unit, Engine, EngineError, Logger, NodeValue};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

fn engine(raw: serde_json::Value) -> Engine {
    Engine::new(&raw).expect("failed to build engine")
}

fn value_of(engine: &Engine, name: &str) -> NodeValue {
    engine.evaluate(name).expect("evaluation failed").value
}

#[derive(Clone, Default)]
struct CollectingLogger(Rc<RefCell<Vec<String>>>);

impl Logger for CollectingLogger {
    fn warn(&self, message: &str) {
        self.0.borrow_mut().push(message.to_string());
    }
}

// ── Operations ────────────────────────────────────────────────────────────

#[test]
fn two_plus_two_makes_four() {
    let engine = engine(json!({ "calcul": { "+": [2, 2] } }));
    let result = engine.evaluate("calcul").unwrap();
    assert_eq!(result.value, NodeValue::Number(4.0));
    assert!(result.missing_variables.is_empty());
}

#[test]
fn an_unknown_operand_makes_the_operation_unknown() {
    let engine = engine(json!({
        "calcul": { "+": [2, "ko"] },
        "ko": {},
    }));
    let result = engine.evaluate("calcul").unwrap();
    assert_eq!(result.value, NodeValue::Unknown);
    assert_eq!(result.missing_variables.weight("ko"), Some(1));
}

#[test]
fn date_strings_compare_as_dates() {
    // Lexicographically "02/01/2020" > "01/02/2020"; as dates it is earlier.
    let engine = engine(json!({
        "avant": { "<": ["02/01/2020", "01/02/2020"] },
        "égal": { "=": ["01/01/2020", "01/01/2020"] },
    }));
    assert_eq!(value_of(&engine, "avant"), NodeValue::Bool(true));
    assert_eq!(value_of(&engine, "égal"), NodeValue::Bool(true));
}

#[test]
fn string_literals_compare_by_equality() {
    let engine = engine(json!({ "calcul": { "=": ["'abc'", "'abc'"] } }));
    assert_eq!(value_of(&engine, "calcul"), NodeValue::Bool(true));
}

#[test]
fn null_coerces_to_false_in_equality() {
    let engine = engine(json!({
        "inapp": { "valeur": "oui", "non applicable si": "oui" },
        "calcul": { "=": ["inapp", "non"] },
    }));
    assert_eq!(value_of(&engine, "calcul"), NodeValue::Bool(true));
}

#[test]
fn null_counts_as_zero_in_arithmetic() {
    let engine = engine(json!({
        "inapp": { "valeur": "oui", "non applicable si": "oui" },
        "calcul": { "+": ["inapp", 3] },
    }));
    assert_eq!(value_of(&engine, "calcul"), NodeValue::Number(3.0));
}

#[test]
fn relational_operators_on_booleans_are_false() {
    let engine = engine(json!({ "calcul": { "<": ["oui", "non"] } }));
    assert_eq!(value_of(&engine, "calcul"), NodeValue::Bool(false));
}

#[test]
fn operands_align_on_the_left_unit() {
    let engine = engine(json!({ "durée": { "+": ["6 mois", "1 an"] } }));
    let result = engine.evaluate("durée").unwrap();
    assert_eq!(result.value, NodeValue::Number(18.0));
    assert_eq!(result.unit, Some(parse_unit("mois")));
}

#[test]
fn multiplication_composes_units_without_converting() {
    let engine = engine(json!({ "montant": { "*": ["10 €/jour", "2 jour"] } }));
    let result = engine.evaluate("montant").unwrap();
    assert_eq!(result.value, NodeValue::Number(20.0));
    assert_eq!(result.unit, Some(parse_unit("€")));
}

#[test]
fn incompatible_units_warn_and_compute_on_raw_magnitudes() {
    let logger = CollectingLogger::default();
    let engine = Engine::with_logger(
        &json!({ "calcul": { "+": ["1 €", "1 jour"] } }),
        Box::new(logger.clone()),
    )
    .unwrap();
    let result = engine.evaluate("calcul").unwrap();
    assert_eq!(result.value, NodeValue::Number(2.0));
    let warnings = logger.0.borrow();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("not convertible"));
}

#[test]
fn comparisons_carry_no_unit() {
    let engine = engine(json!({ "calcul": { "<": ["1 mois", "1 an"] } }));
    let result = engine.evaluate("calcul").unwrap();
    assert_eq!(result.value, NodeValue::Bool(true));
    assert_eq!(result.unit, None);
}

// ── Progressive rate schedules ────────────────────────────────────────────

#[test]
fn the_unbounded_top_tier_applies_beyond_the_last_ceiling() {
    let engine = engine(json!({
        "taux": {
            "taux progressif": {
                "assiette": 2,
                "tranches": [{ "plafond": 1, "taux": 0.1 }, { "taux": 10 }],
            },
        },
    }));
    let result = engine.evaluate("taux").unwrap();
    assert_eq!(result.value, NodeValue::Number(10.0));
    assert_eq!(result.unit, Some(parse_unit("%")));
    assert!(result.missing_variables.is_empty());
}

#[test]
fn a_bounded_schedule_overrun_takes_the_last_rate() {
    let engine = engine(json!({
        "taux": {
            "taux progressif": {
                "assiette": 2,
                "tranches": [{ "plafond": 1, "taux": 5 }],
            },
        },
    }));
    assert_eq!(value_of(&engine, "taux"), NodeValue::Number(5.0));
}

#[test]
fn interior_tiers_interpolate_linearly_between_adjacent_rates() {
    let schedule = |assiette: f64| {
        json!({
            "taux": {
                "taux progressif": {
                    "assiette": assiette,
                    "tranches": [
                        { "plafond": 10, "taux": 0 },
                        { "plafond": 20, "taux": 10 },
                        { "taux": 20 },
                    ],
                },
            },
        })
    };
    // Halfway through the second tier: halfway between 0 and 10.
    assert_eq!(value_of(&engine(schedule(15.0)), "taux"), NodeValue::Number(5.0));
    // Monotonic along the tier.
    assert_eq!(value_of(&engine(schedule(18.0)), "taux"), NodeValue::Number(8.0));
    // The first tier has no predecessor: its own rate applies flat.
    assert_eq!(value_of(&engine(schedule(5.0)), "taux"), NodeValue::Number(0.0));
}

#[test]
fn the_multiplier_scales_tier_bounds() {
    let engine = engine(json!({
        "taux": {
            "taux progressif": {
                "assiette": 130,
                "multiplicateur": 10,
                "tranches": [
                    { "plafond": 5, "taux": 0 },
                    { "plafond": 21, "taux": 10 },
                    { "taux": 20 },
                ],
            },
        },
    }));
    // Bounds become [0, 50) and [50, 210): 130 sits halfway up the ramp.
    assert_eq!(value_of(&engine, "taux"), NodeValue::Number(5.0));
}

#[test]
fn undecidable_activation_reports_every_tier() {
    let engine = engine(json!({
        "taux": {
            "taux progressif": {
                "assiette": "montant",
                "tranches": [{ "plafond": 1, "taux": "r1" }, { "taux": "r2" }],
            },
        },
        "montant": {},
        "r1": {},
        "r2": {},
    }));
    let result = engine.evaluate("taux").unwrap();
    assert_eq!(result.value, NodeValue::Unknown);
    let names: Vec<&str> = result.missing_variables.names().collect();
    assert_eq!(names, vec!["montant", "r1", "r2"]);
}

// ── Interpolated text ─────────────────────────────────────────────────────

#[test]
fn texts_interpolate_formatted_values() {
    let engine = engine(json!({
        "salaire": "1200 €/mois",
        "phrase": { "texte": "Vous gagnez {{ salaire }}." },
    }));
    assert_eq!(
        value_of(&engine, "phrase"),
        NodeValue::Str("Vous gagnez 1200 €/mois.".into())
    );
}

#[test]
fn texts_merge_missing_variables_of_embedded_expressions() {
    let engine = engine(json!({
        "inconnu": {},
        "phrase": { "texte": "Il manque {{ inconnu }} ici" },
    }));
    let result = engine.evaluate("phrase").unwrap();
    assert_eq!(result.value, NodeValue::Str("Il manque ? ici".into()));
    assert_eq!(result.missing_variables.weight("inconnu"), Some(1));
}

// ── Forced choice ─────────────────────────────────────────────────────────

#[test]
fn a_mandatory_choice_still_reports_only_itself() {
    let engine = engine(json!({
        "couleur": {
            "formule": {
                "une possibilité": {
                    "choix obligatoire": "oui",
                    "possibilités": ["couleur . bleu", "couleur . rouge"],
                },
            },
        },
        "couleur . bleu": {},
        "couleur . rouge": {},
    }));
    let result = engine.evaluate("couleur").unwrap();
    assert_eq!(result.value, NodeValue::Unknown);
    let names: Vec<&str> = result.missing_variables.names().collect();
    assert_eq!(names, vec!["couleur"]);
}

// ── Sums and combinators ──────────────────────────────────────────────────

#[test]
fn sums_treat_inapplicable_terms_as_zero() {
    let engine = engine(json!({
        "inapp": { "valeur": 7, "non applicable si": "oui" },
        "total": { "somme": ["inapp", 5] },
    }));
    assert_eq!(value_of(&engine, "total"), NodeValue::Number(5.0));
}

#[test]
fn an_unknown_term_makes_the_sum_unknown() {
    let engine = engine(json!({
        "ko": {},
        "total": { "somme": [1, "ko", 2] },
    }));
    let result = engine.evaluate("total").unwrap();
    assert_eq!(result.value, NodeValue::Unknown);
    assert_eq!(result.missing_variables.weight("ko"), Some(1));
}

#[test]
fn a_failing_conjunct_suppresses_later_conditions() {
    let engine = engine(json!({
        "ko": {},
        "toutes": { "toutes ces conditions": [{ ">": [2, 3] }, "ko"] },
    }));
    let result = engine.evaluate("toutes").unwrap();
    assert_eq!(result.value, NodeValue::Bool(false));
    assert!(result.missing_variables.is_empty());
}

#[test]
fn an_undecided_conjunct_keeps_the_conjunction_unknown() {
    let engine = engine(json!({
        "ko": {},
        "toutes": { "toutes ces conditions": ["ko", { ">": [3, 2] }] },
    }));
    let result = engine.evaluate("toutes").unwrap();
    assert_eq!(result.value, NodeValue::Unknown);
    assert_eq!(result.missing_variables.weight("ko"), Some(1));
}

// ── Recalcul ──────────────────────────────────────────────────────────────

#[test]
fn recalcul_evaluates_the_target_under_an_amended_situation() {
    let engine = engine(json!({
        "brut": { "question": "?", "par défaut": 2000 },
        "net": { "*": ["brut", 0.5] },
        "net au smic": { "recalcul": { "règle": "net", "avec": { "brut": 1500 } } },
    }));
    let amended = engine.evaluate("net au smic").unwrap();
    assert_eq!(amended.value, NodeValue::Number(750.0));
    assert!(amended.missing_variables.is_empty());
    // The amendment is scoped: the plain rule still uses the default.
    let plain = engine.evaluate("net").unwrap();
    assert_eq!(plain.value, NodeValue::Number(1000.0));
    assert_eq!(plain.missing_variables.weight("brut"), Some(1));
}

// ── Engine surface ────────────────────────────────────────────────────────

#[test]
fn querying_an_absent_rule_is_an_error() {
    let engine = engine(json!({ "a": 1 }));
    assert!(matches!(
        engine.evaluate("absente"),
        Err(EngineError::UnknownRule(name)) if name == "absente"
    ));
}

#[test]
fn situations_reject_absent_rules() {
    let mut engine = engine(json!({ "a": 1 }));
    assert!(engine.set_situation(&json!({ "b": 2 })).is_err());
}
