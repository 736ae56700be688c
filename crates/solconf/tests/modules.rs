mod common;

use common::Package;
use pretty_assertions::assert_eq;
use serde_json::json;
use solconf::error::{Error, LoadError, OverrideUsageError, PromotionError, ResolutionError};
use solconf::{ConfigOptions, LoaderContext};

const PROMOTED_MODEL: &str = r#"
Model {
  size = 3
  kind = "dense"
}

helper = 1

modifiers {
  Model = promoted
}
"#;

#[test]
fn promoted_member_is_the_public_face() {
    common::init_tracing();
    let package = Package::new(&[
        (
            "main.solconf",
            "model = load(\".model\")\nfull = load(\".model\", { promoted = false })\n",
        ),
        ("model.solconf", PROMOTED_MODEL),
    ]);

    insta::assert_json_snapshot!(package.load(&["model.size = 5"]).unwrap(), @r#"
    {
      "model": {
        "size": 5,
        "kind": "dense"
      },
      "full": {
        "size": 5,
        "kind": "dense"
      }
    }
    "#);
}

#[test]
fn promotion_removes_a_path_segment() {
    let package = Package::new(&[
        ("main.solconf", "model = load(\".model\")\n"),
        ("model.solconf", PROMOTED_MODEL),
    ]);

    for unused in ["model.Model.size = 5", "model.helper = 2"] {
        assert!(
            matches!(
                package.load(&[unused]),
                Err(Error::OverrideUsage(OverrideUsageError::Unused(_)))
            ),
            "{unused}"
        );
    }
}

#[test]
fn promoted_root_module() {
    let package = Package::new(&[(
        "main.solconf",
        "x = 1\n\nOut {\n  v = x\n}\n\nmodifiers {\n  Out = promoted\n}\n",
    )]);

    assert_eq!(package.json(&[]), json!({"v": 1}));
    assert_eq!(package.json(&["v = 2"]), json!({"v": 2}));
}

#[test]
fn resolution_target_keeps_addressing() {
    let package = Package::new(&[
        ("main.solconf", "m = load(\".m\")\n"),
        ("m.solconf", "a = 1\nb = a + 1\n\nmodifiers {\n  b = resolves\n}\n"),
    ]);

    assert_eq!(package.json(&[]), json!({"m": 2}));
    assert_eq!(package.json(&["m.a = 5"]), json!({"m": 6}));
}

#[test]
fn promotion_errors() {
    let both = Package::new(&[
        ("main.solconf", "m = load(\".m\", { promoted = false })\n"),
        (
            "m.solconf",
            "a = 1\nb = 2\n\nmodifiers {\n  a = promoted\n  b = resolves\n}\n",
        ),
    ]);
    assert!(matches!(
        both.load(&[]).unwrap_err().root_cause(),
        Error::Promotion(PromotionError::PromotedAndResolves { .. })
    ));

    let multiple = Package::new(&[(
        "main.solconf",
        "a = 1\nb = 2\n\nmodifiers {\n  a = promoted\n  b = promoted\n}\n",
    )]);
    assert!(matches!(
        multiple.load(&[]),
        Err(Error::Promotion(PromotionError::Multiple { members, .. })) if members == vec!["a", "b"]
    ));

    let nested = Package::new(&[(
        "main.solconf",
        "A {\n  x = 1\n\n  modifiers {\n    x = promoted\n  }\n}\n",
    )]);
    assert!(matches!(
        nested.load(&[]),
        Err(Error::Promotion(PromotionError::NotRoot { path, .. })) if path == "A.x"
    ));

    let submodule = Package::new(&[
        ("main.solconf", "m = submodule(\"x\")\n\nmodifiers {\n  m = promoted\n}\n"),
        ("m/x.solconf", "a = 1\n"),
    ]);
    assert!(matches!(
        submodule.load(&[]).unwrap_err().root_cause(),
        Error::Promotion(PromotionError::PromotedSubmodule(name)) if name == "m"
    ));
}

#[test]
fn required_values() {
    let provided = Package::new(&[
        ("main.solconf", "m = load(\".m\", { reqs = { size = 3 } })\n"),
        ("m.solconf", "size = req()\nwidth = size * 2\n"),
    ]);
    assert_eq!(provided.json(&[]), json!({"m": {"size": 3, "width": 6}}));
    assert_eq!(
        provided.json(&["m.size = 4"]),
        json!({"m": {"size": 4, "width": 8}})
    );

    let missing = Package::new(&[
        ("main.solconf", "m = load(\".m\")\n"),
        ("m.solconf", "size = req()\nwidth = size * 2\nother = req()\n"),
    ]);
    assert!(matches!(
        missing.load(&[]).unwrap_err().root_cause(),
        Error::Resolution(ResolutionError::MissingRequired { names, .. })
            if names == &vec!["m.size", "m.other"]
    ));
    assert_eq!(
        missing.json(&["m.size = 1", "m.other = \"x\""]),
        json!({"m": {"size": 1, "width": 2, "other": "x"}})
    );

    let misspelled = Package::new(&[
        ("main.solconf", "m = load(\".m\", { reqs = { size = 3, sizee = 4 } })\n"),
        ("m.solconf", "size = req()\n"),
    ]);
    assert!(matches!(
        misspelled.load(&[]).unwrap_err().root_cause(),
        Error::OverrideUsage(OverrideUsageError::UnusedReqs { reqs, .. }) if reqs == &vec!["sizee = 4"]
    ));
}

#[test]
fn required_values_of_the_root_module() {
    let package = Package::new(&[("main.solconf", "n = req()\n")]);
    let value = LoaderContext::default()
        .load_config(
            &package.path("main.solconf"),
            ConfigOptions {
                reqs: vec!["n = 5".into()],
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(serde_json::to_value(&value).unwrap(), json!({"n": 5}));
}

#[test]
fn submodule_selection() {
    let package = Package::new(&[
        ("main.solconf", "model = submodule(\"small\")\n"),
        ("model/small.solconf", "size = 1\n"),
        ("model/large.solconf", "size = 10\n"),
    ]);

    assert_eq!(package.json(&[]), json!({"model": {"size": 1}}));
    assert_eq!(
        package.json(&["model = \"large\""]),
        json!({"model": {"size": 10}})
    );
    assert_eq!(package.json(&["model.size = 5"]), json!({"model": {"size": 5}}));
    assert!(matches!(
        package.load(&["model = \"huge\""]).unwrap_err().root_cause(),
        Error::Load(LoadError::ModuleNotFound { name, .. }) if name.ends_with(".model.huge")
    ));
}

#[test]
fn choices() {
    let package = Package::new(&[(
        "main.solconf",
        "act = choices({ relu = \"r\", tanh = \"t\" }, \"relu\")\n",
    )]);

    assert_eq!(package.json(&[]), json!({"act": "r"}));
    assert_eq!(package.json(&["act = \"tanh\""]), json!({"act": "t"}));
    assert!(package.load(&["act = \"sigmoid\""]).is_err());
}

#[test]
fn modules_are_shared() {
    let package = Package::new(&[
        ("main.solconf", "a = load(\".shared\")\nb = load(\".shared\")\n"),
        ("shared.solconf", "x = 1\n"),
    ]);

    let context = LoaderContext::default();
    let value = package.load_with(&context, &["a.x = 2"]).unwrap();
    assert_eq!(
        serde_json::to_value(&value).unwrap(),
        json!({"a": {"x": 2}, "b": {"x": 2}})
    );
}

#[test]
fn cross_references_and_cycles() {
    let partial = Package::new(&[
        ("main.solconf", "a = 1\nm = load(\".m\")\n"),
        ("m.solconf", "b = load(\".main\").a + 1\n"),
    ]);
    assert_eq!(partial.json(&[]), json!({"a": 1, "m": {"b": 2}}));

    let eager = Package::new(&[
        ("main.solconf", "a = 1\nm = load(\".m\")\nz = 3\n"),
        ("m.solconf", "x = resolve(load(\".main\"))\n"),
    ]);
    assert!(matches!(
        eager.load(&[]).unwrap_err().root_cause(),
        Error::Resolution(ResolutionError::StillExecuting(name)) if name.ends_with(".main")
    ));

    let cycle = Package::new(&[
        ("main.solconf", "m = load(\".m\")\n"),
        ("m.solconf", "back = load(\".main\")\n"),
    ]);
    let err = cycle.load(&[]).unwrap_err();
    assert!(matches!(err, Error::Resolution(ResolutionError::Nested { .. })));
    assert!(matches!(
        err.root_cause(),
        Error::Resolution(ResolutionError::Cycle(chain)) if chain.len() == 3
    ));
}

#[test]
fn load_errors() {
    let reserved = Package::new(&[("main.solconf", "x = 1\nload = 2\n")]);
    assert!(matches!(
        reserved.load(&[]),
        Err(Error::Load(LoadError::ReservedName { name, location }))
            if name == "load" && location.ends_with("main.solconf:2")
    ));

    let missing = Package::new(&[("main.solconf", "m = load(\".missing\")\n")]);
    assert!(matches!(
        missing.load(&[]).unwrap_err().root_cause(),
        Error::Load(LoadError::ModuleNotFound { .. })
    ));

    let beyond = Package::new(&[("main.solconf", "m = load(\"..up\")\n")]);
    assert!(matches!(
        beyond.load(&[]).unwrap_err().root_cause(),
        Error::Addressing(solconf::error::AddressingError::BeyondRoot(_))
    ));
}
