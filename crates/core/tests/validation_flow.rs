use jn_core::{
    FlatStore, LotMode, NoCpvRules, RulesConfig, Schema, StaticCpvRules, ValidationEngine,
    export_document, import_document,
};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn schema() -> Schema {
    Schema::from_json_str(include_str!("fixtures/schema.json")).expect("fixture schema must load")
}

fn fill(store: &mut FlatStore, values: Value) {
    let Value::Object(map) = values else {
        panic!("expected an object of flat keys");
    };
    for (key, value) in map {
        store.insert(key, value).expect("fixture keys are valid");
    }
}

fn temp_dir(label: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be monotonic enough for tests")
        .as_nanos();
    path.push(format!("jn-core-{label}-{}-{nanos}", std::process::id()));
    std::fs::create_dir_all(&path).expect("temp dir must be creatable");
    path
}

#[test]
fn wizard_steps_pass_once_filled_in() {
    let schema = schema();
    let rules = RulesConfig::embedded().expect("embedded rules parse");
    let engine = ValidationEngine::new(&schema, &rules, &NoCpvRules);
    let mut store = schema.defaults();
    assert_eq!(store.get("orderType.orderType"), Some(&json!("--Select--")));

    let result = engine.validate(&store, &["projectInfo"]).expect("valid step");
    assert_eq!(result.errors, vec!["Polje 'Naziv projekta' je obvezno."]);

    let result = engine.validate(&store, &["clientInfo"]).expect("valid step");
    assert_eq!(
        result.errors,
        vec![
            "Polje 'Naziv naročnika' je obvezno.",
            "Polje 'Zakoniti zastopnik' je obvezno.",
            "Polje 'Naslov naročnika' je obvezno.",
        ]
    );

    let result = engine.validate(&store, &["orderType"]).expect("valid step");
    assert_eq!(
        result.errors,
        vec![
            "Polje 'Ocenjena vrednost' je obvezno.",
            "Polje 'Vrsta naročila' je obvezno.",
        ]
    );

    fill(
        &mut store,
        json!({
            "projectInfo.projectName": "Vzdrževanje javne razsvetljave",
            "clientInfo.name": "Občina Vrhnika",
            "clientInfo.streetAddress": "Tržaška cesta 1",
            "clientInfo.representative.fullName": "Ana Novak",
            "orderType.orderType": "storitve",
            "orderType.estimatedValue": 45000,
            "selectionCriteria.price": true,
            "selectionCriteria.priceRatio": 70,
            "selectionCriteria.shorterDeadline": "da",
            "selectionCriteria.shorterDeadlineRatio": "30"
        }),
    );

    let steps: [&[&str]; 5] = [
        &["projectInfo"],
        &["clientInfo"],
        &["orderType"],
        &["selectionCriteria"],
        &["projectInfo", "clientInfo"],
    ];
    for step in steps {
        let result = engine.validate(&store, step).expect("valid step");
        assert!(result.is_valid, "{step:?}: {:?}", result.errors);
        assert!(result.warnings.is_empty(), "{step:?}: {:?}", result.warnings);
    }
}

#[test]
fn saved_document_validates_like_the_session() {
    let schema = schema();
    let rules = RulesConfig::embedded().expect("embedded rules parse");
    let engine = ValidationEngine::new(&schema, &rules, &NoCpvRules);
    let mut store = schema.defaults();
    fill(
        &mut store,
        json!({
            "projectInfo.projectName": "Nakup vozil",
            "contractInfo.type": "okvirni sporazum",
            "contractInfo.frameworkDuration": "6 let",
            "contractInfo.frameworkType": "z odpiranjem konkurence"
        }),
    );

    let document = export_document(&store).expect("exportable");
    assert_eq!(document["contractInfo"]["frameworkDuration"], json!("6 let"));
    let reopened = import_document(&document);
    assert_eq!(reopened, store);

    let before = engine.validate(&store, &["contractInfo"]).expect("valid step");
    let after = engine.validate(&reopened, &["contractInfo"]).expect("valid step");
    assert_eq!(before, after);
    assert_eq!(
        before.errors,
        vec![
            "Pri okvirnem sporazumu z odpiranjem konkurence navedite pogostost odpiranja konkurence.",
            "Okvirni sporazum lahko traja največ 48 mesecev (4 leta).",
        ]
    );
}

#[test]
fn lots_are_saved_and_validated_separately() {
    let schema = schema();
    let rules = RulesConfig::embedded().expect("embedded rules parse");
    let engine = ValidationEngine::new(&schema, &rules, &NoCpvRules);
    let mut store = FlatStore::new();
    fill(
        &mut store,
        json!({
            "projectInfo.projectName": "Vzdrževanje cest",
            "lotsInfo.hasLots": true,
            "lotsInfo.lotNames.0.name": "Sever",
            "lotsInfo.lotNames.1.name": "Jug",
            "lot_0.selectionCriteria.price": true,
            "lot_0.selectionCriteria.priceRatio": 100,
            "lot_1.selectionCriteria.price": true,
            "lot_1.selectionCriteria.priceRatio": 60,
            "lot_1.selectionCriteria.shorterDeadline": true,
            "lot_1.selectionCriteria.shorterDeadlineRatio": 40
        }),
    );

    let document = export_document(&store).expect("exportable");
    assert_eq!(
        document["lots"],
        json!([
            {"selectionCriteria": {"price": true, "priceRatio": 100}},
            {"selectionCriteria": {
                "price": true,
                "priceRatio": 60,
                "shorterDeadline": true,
                "shorterDeadlineRatio": 40
            }}
        ])
    );
    assert_eq!(
        document["lotsInfo"]["lotNames"],
        json!([{"name": "Sever"}, {"name": "Jug"}])
    );
    assert_eq!(import_document(&document), store);

    let outcome = engine
        .validate_lots(&store, &["selectionCriteria"])
        .expect("valid step");
    assert_eq!(outcome.mode, LotMode::Multiple);
    assert!(outcome.combined.is_valid, "{:?}", outcome.combined.errors);
    assert_eq!(
        outcome.combined.warnings,
        vec!["Sklop 1: Cena je edino izbrano merilo. Priporočamo dodatna kakovostna merila."]
    );
}

#[test]
fn cpv_rules_from_yaml_demand_social_criteria() {
    let schema = schema();
    let rules = RulesConfig::embedded().expect("embedded rules parse");
    let cpv = StaticCpvRules::from_yaml_str(
        "social_required:\n  - \"79700000-1\"\nprice_only_forbidden:\n  - \"71000000-8\"\n",
    )
    .expect("cpv rules parse");
    let engine = ValidationEngine::new(&schema, &rules, &cpv);

    let mut store = FlatStore::new();
    fill(
        &mut store,
        json!({
            "projectInfo.cpvCodes": ["79710000-4"],
            "selectionCriteria.price": true,
            "selectionCriteria.priceRatio": 70,
            "selectionCriteria.shorterDeadline": true,
            "selectionCriteria.shorterDeadlineRatio": 30
        }),
    );
    let result = engine
        .validate(&store, &["selectionCriteria"])
        .expect("valid step");
    assert_eq!(
        result.errors,
        vec!["Izbrane CPV kode (79710000-4) zahtevajo uporabo socialnih meril."]
    );

    fill(
        &mut store,
        json!({
            "selectionCriteria.shorterDeadlineRatio": 20,
            "selectionCriteria.socialCriteria": true,
            "selectionCriteria.socialCriteriaYoung": true,
            "selectionCriteria.socialCriteriaYoungRatio": 10
        }),
    );
    let result = engine
        .validate(&store, &["selectionCriteria"])
        .expect("valid step");
    assert!(result.is_valid, "{:?}", result.errors);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
}

#[test]
fn rules_loaded_from_disk_drive_messages() {
    let mut rules = RulesConfig::embedded().expect("embedded rules parse");
    rules.criteria.expected_total = 60.0;
    rules.messages.total_mismatch = "Točke: {total} od {expected}".to_string();

    let dir = temp_dir("rules");
    let path = dir.join("rules.yaml");
    let raw = serde_yaml::to_string(&rules).expect("rules serialize");
    std::fs::write(&path, raw).expect("rules file must be writable");
    let loaded = RulesConfig::load(&path).expect("rules load");
    assert_eq!(loaded, rules);

    let schema = schema();
    let engine = ValidationEngine::new(&schema, &loaded, &NoCpvRules);
    let mut store = FlatStore::new();
    fill(
        &mut store,
        json!({
            "selectionCriteria.price": true,
            "selectionCriteria.priceRatio": 50,
            "selectionCriteria.additionalReferences": true,
            "selectionCriteria.additionalReferencesRatio": 50
        }),
    );
    let result = engine.validate_criteria(&store, "selectionCriteria");
    assert!(result.is_valid);
    assert_eq!(result.warnings, vec!["Točke: 100 od 60"]);
}
