//! Missing-variable reporting across applicability, formulas, namespaces,
//! and aggregations: the engine must surface exactly the follow-up
//! questions relevant to the evaluation path actually taken.

use regle_engine::{Engine, Evaluated, NodeValue};
use serde_json::json;

fn engine(raw: serde_json::Value) -> Engine {
    Engine::new(&raw).expect("failed to build engine")
}

fn missing_names(evaluated: &Evaluated) -> Vec<&str> {
    evaluated.missing_variables.names().collect()
}

#[test]
fn identifies_missing_variables_in_applicability() {
    let engine = engine(json!({
        "startHere": { "valeur": 2, "non applicable si": "ko" },
        "ko": {},
    }));
    let result = engine.evaluate("startHere").unwrap();
    assert_eq!(result.value, NodeValue::Unknown);
    assert_eq!(missing_names(&result), vec!["ko"]);
}

#[test]
fn identifies_missing_variables_in_formulas() {
    let engine = engine(json!({
        "startHere": { "+": [2, "ko"] },
        "ko": {},
    }));
    let result = engine.evaluate("startHere").unwrap();
    assert_eq!(result.value, NodeValue::Unknown);
    assert_eq!(missing_names(&result), vec!["ko"]);
}

#[test]
fn identifies_missing_variables_along_the_namespace_tree() {
    let engine = engine(json!({
        "startHere": { "valeur": 2, "non applicable si": "evt . ko" },
        "evt": {
            "formule": { "une possibilité": ["evt . ko"] },
            "titre": "Truc",
            "question": "?",
            "par défaut": "oui",
        },
        "evt . ko": {},
    }));
    let result = engine.evaluate("startHere").unwrap();
    assert_eq!(missing_names(&result), vec!["evt", "evt . ko"]);
}

#[test]
fn does_not_identify_missing_variables_from_static_rules() {
    let engine = engine(json!({
        "startHere": { "valeur": 2, "non applicable si": "evt . welldefined . ko" },
        "evt": "oui",
        "evt . welldefined": { "formule": 2, "titre": "Truc", "question": "?" },
        "evt . welldefined . ko": {},
    }));
    let result = engine.evaluate("startHere").unwrap();
    assert_eq!(missing_names(&result), vec!["evt . welldefined . ko"]);
}

#[test]
fn identifies_missing_variables_mentioned_in_expressions() {
    let engine = engine(json!({
        "sum": "oui",
        "sum . evt": "oui",
        "sum . startHere": {
            "valeur": 2,
            "non applicable si": { ">": ["sum . evt . nyet", "sum . evt . nope"] },
        },
        "sum . evt . nope": {},
        "sum . evt . nyet": {},
    }));
    let result = engine.evaluate("sum . startHere").unwrap();
    let names = missing_names(&result);
    assert!(names.contains(&"sum . evt . nyet"));
    assert!(names.contains(&"sum . evt . nope"));
}

#[test]
fn ignores_missing_variables_in_the_formula_if_not_applicable() {
    let engine = engine(json!({
        "sum": "oui",
        "sum . startHere": {
            "valeur": "sum . trois",
            "non applicable si": { ">": [3, 2] },
        },
        "sum . trois": {},
    }));
    let result = engine.evaluate("sum . startHere").unwrap();
    assert_eq!(result.value, NodeValue::Null);
    assert!(result.missing_variables.is_empty());
}

#[test]
fn does_not_report_missing_variables_when_a_disjunction_short_circuits() {
    let engine = engine(json!({
        "sum": "oui",
        "sum . startHere": {
            "valeur": "sum . trois",
            "non applicable si": {
                "une de ces conditions": [{ ">": [3, 2] }, "sum . trois"],
            },
        },
        "sum . trois": {},
    }));
    let result = engine.evaluate("sum . startHere").unwrap();
    assert!(result.missing_variables.is_empty());
}

#[test]
fn a_forced_choice_reports_itself_even_though_it_has_a_formula() {
    let engine = engine(json!({
        "top": "oui",
        "ko": "oui",
        "top . startHere": { "valeur": "top . trois" },
        "top . trois": { "formule": { "une possibilité": ["ko"] } },
    }));
    let result = engine.evaluate("top . startHere").unwrap();
    assert_eq!(result.value, NodeValue::Unknown);
    assert_eq!(missing_names(&result), vec!["top . trois"]);
}

#[test]
fn an_inapplicable_forced_choice_reports_nothing() {
    let engine = engine(json!({
        "top": "oui",
        "ko": "oui",
        "top . startHere": { "valeur": "top . trois" },
        "top . trois": {
            "formule": { "une possibilité": ["ko"] },
            "non applicable si": "oui",
        },
    }));
    let result = engine.evaluate("top . startHere").unwrap();
    assert!(result.missing_variables.is_empty());
}

#[test]
fn an_answered_forced_choice_reports_nothing() {
    let mut engine = engine(json!({
        "top": "oui",
        "ko": "oui",
        "top . startHere": { "valeur": "top . trois" },
        "top . trois": { "formule": { "une possibilité": ["ko"] } },
    }));
    engine.set_situation(&json!({ "top . trois": "'ko'" })).unwrap();
    let result = engine.evaluate("top . startHere").unwrap();
    assert!(result.missing_variables.is_empty());
    assert_eq!(result.value, NodeValue::Str("ko".into()));
}

#[test]
fn a_decided_variation_reports_nothing() {
    let engine = engine(json!({
        "somme": { "somme": ["a", "b"] },
        "a": 10,
        "b": {
            "formule": {
                "variations": [
                    { "si": { ">": ["a", 100] }, "alors": "c" },
                    { "sinon": 0 },
                ],
            },
        },
        "c": { "question": "Alors ?" },
    }));
    let result = engine.evaluate("somme").unwrap();
    assert!(result.missing_variables.is_empty());
    assert_eq!(result.value, NodeValue::Number(10.0));
}

#[test]
fn an_undecided_variation_reports_its_whole_branch() {
    let engine = engine(json!({
        "startHere": { "somme": ["variations"] },
        "variations": {
            "formule": {
                "variations": [
                    {
                        "si": "dix",
                        "alors": {
                            "taux progressif": {
                                "assiette": 2008,
                                "multiplicateur": "deux",
                                "tranches": [
                                    { "plafond": 1, "taux": 0.1 },
                                    { "plafond": 2, "taux": "trois" },
                                    { "taux": 10 },
                                ],
                            },
                        },
                    },
                    {
                        "si": { ">": [3, 4] },
                        "alors": {
                            "taux progressif": {
                                "assiette": 2008,
                                "multiplicateur": "quatre",
                                "tranches": [
                                    { "plafond": 1, "taux": 0.1 },
                                    { "plafond": 2, "taux": 1.8 },
                                    { "taux": 10 },
                                ],
                            },
                        },
                    },
                ],
            },
        },
        "dix": {},
        "deux": {},
        "trois": {},
        "quatre": {},
    }));
    let result = engine.evaluate("startHere").unwrap();
    let names = missing_names(&result);
    assert!(names.contains(&"dix"));
    assert!(names.contains(&"deux"));
    assert!(names.contains(&"trois"));
    assert!(!names.contains(&"quatre"));
}

// ── Follow-up question generation ─────────────────────────────────────────

#[test]
fn generates_questions_for_simple_situations() {
    let engine = engine(json!({
        "top": "oui",
        "top . sum": { "valeur": "top . deux" },
        "top . deux": { "valeur": 2, "non applicable si": "top . sum . evt" },
        "top . sum . evt": { "titre": "Truc", "question": "?" },
    }));
    let result = engine.evaluate("top . sum").unwrap();
    assert_eq!(missing_names(&result), vec!["top . sum . evt"]);
}

#[test]
fn generates_questions_from_forced_choice_conditions() {
    let engine = engine(json!({
        "top": "oui",
        "top . sum": { "somme": [2, "top . deux"] },
        "top . deux": {
            "valeur": 2,
            "non applicable si": { "=": ["top . sum . evt", "'ko'"] },
        },
        "top . sum . evt": {
            "formule": { "une possibilité": ["top . sum . evt . ko"] },
            "titre": "Truc",
            "question": "?",
        },
        "top . sum . evt . ko": {},
    }));
    let result = engine.evaluate("top . sum").unwrap();
    assert_eq!(missing_names(&result), vec!["top . sum . evt"]);
}

#[test]
fn sibling_subtrees_of_a_sum_are_not_reported() {
    let engine = engine(json!({
        "transport": { "somme": ["transport . voiture", "transport . avion"] },
        "transport . voiture": {
            "*": ["transport . voiture . empreinte", "transport . voiture . km"],
        },
        "transport . voiture . empreinte": 0.12,
        "transport . voiture . km": { "question": "COMBIENKM", "par défaut": 1000 },
        "transport . avion": {
            "applicable si": "transport . avion . usager",
            "valeur": { "*": ["transport . avion . empreinte", "transport . avion . km"] },
        },
        "transport . avion . km": { "question": "COMBIENKM", "par défaut": 10000 },
        "transport . avion . empreinte": 0.25,
        "transport . avion . usager": { "question": "Prenez-vous l'avion ?", "par défaut": "oui" },
    }));
    let result = engine.evaluate("transport . avion").unwrap();
    assert_eq!(
        missing_names(&result),
        vec!["transport . avion . km", "transport . avion . usager"]
    );
    assert_eq!(result.value, NodeValue::Number(2500.0));
}

#[test]
fn decided_conditions_still_report_their_defaulted_inputs() {
    let engine = engine(json!({
        "transport": { "somme": ["transport . voiture", "transport . avion"] },
        "transport . voiture": {
            "*": ["transport . voiture . empreinte", "transport . voiture . km"],
        },
        "transport . voiture . gabarit": { "question": "Quel gabarit ?", "par défaut": 2 },
        "transport . voiture . empreinte": {
            "formule": {
                "variations": [
                    { "si": { ">": ["transport . voiture . gabarit", 3] }, "alors": 800 },
                    { "sinon": 500 },
                ],
            },
        },
        "transport . voiture . km": { "question": "COMBIENKM", "par défaut": 1000 },
        "transport . avion": {
            "applicable si": "transport . avion . usager",
            "valeur": { "*": ["transport . avion . empreinte", "transport . avion . km"] },
        },
        "transport . avion . km": { "question": "COMBIENKM", "par défaut": 10000 },
        "transport . avion . empreinte": 0.3,
        "transport . avion . usager": { "question": "Prenez-vous l'avion ?", "par défaut": "oui" },
    }));
    let result = engine.evaluate("transport . voiture").unwrap();
    assert_eq!(
        missing_names(&result),
        vec!["transport . voiture . gabarit", "transport . voiture . km"]
    );
}

#[test]
fn a_nullable_ancestor_is_reported_by_its_descendants() {
    let engine = engine(json!({
        "avion": { "question": "prenez-vous l'avion ?", "par défaut": "oui" },
        "avion . impact": { "somme": ["avion . impact . au sol", "avion . impact . en vol"] },
        "avion . impact . en vol": {
            "question": "Combien de temps passé en vol ?",
            "par défaut": 10,
        },
        "avion . impact . au sol": 5,
    }));
    let result = engine.evaluate("avion . impact . au sol").unwrap();
    assert_eq!(missing_names(&result), vec!["avion"]);
    assert_eq!(result.value, NodeValue::Number(5.0));
}

#[test]
fn sums_reached_through_applicability_do_report_their_inputs() {
    let engine = engine(json!({
        "a": { "applicable si": { ">": ["d", 3] }, "valeur": "oui" },
        "d": { "somme": ["e", 8] },
        "e": { "question": "Vous venez à combien à la soirée ?", "par défaut": 3 },
        "a . b": { "+": [20, 9] },
    }));
    let result = engine.evaluate("a . b").unwrap();
    assert_eq!(missing_names(&result), vec!["e"]);
    assert_eq!(result.value, NodeValue::Number(29.0));
}
