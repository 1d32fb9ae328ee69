use arbor_core::artifact::Artifact;
use arbor_core::dependency::{scope, Dependency, Exclusion};

#[test]
fn artifact_parse_valid() {
    let a = Artifact::parse("com.example:my-lib:1.0.0").unwrap();
    assert_eq!(a.group_id, "com.example");
    assert_eq!(a.artifact_id, "my-lib");
    assert_eq!(a.extension, "jar");
    assert_eq!(a.classifier, "");
    assert_eq!(a.version, "1.0.0");
}

#[test]
fn artifact_parse_two_parts_returns_none() {
    assert!(Artifact::parse("group:artifact").is_none());
}

#[test]
fn artifact_parse_empty_string() {
    assert!(Artifact::parse("").is_none());
}

#[test]
fn artifact_parse_six_parts_returns_none() {
    assert!(Artifact::parse("g:a:jar:cls:1.0:extra").is_none());
}

#[test]
fn artifact_display_roundtrip() {
    let s = "com.example:my-lib:pom:1.0.0";
    let a = Artifact::parse(s).unwrap();
    assert_eq!(a.to_string(), s);
}

#[test]
fn dependency_parse_defaults_to_compile() {
    let dep = Dependency::parse("com.example:my-lib:[1.0,2.0)").unwrap();
    assert_eq!(dep.scope, scope::COMPILE);
    assert_eq!(dep.artifact.version, "[1.0,2.0)");
    assert!(!dep.optional);
}

#[test]
fn dependency_from_toml_defaults() {
    let dep: Dependency = toml::from_str(
        r#"
[artifact]
group_id = "org.example"
artifact_id = "lib"
version = "1.0"
"#,
    )
    .unwrap();
    assert_eq!(dep.scope, "compile");
    assert_eq!(dep.artifact.extension, "jar");
    assert!(dep.exclusions.is_empty());
}

#[test]
fn exclusion_wildcards() {
    let lib = Artifact::new("org.example", "lib", "1.0");
    assert!(Exclusion::new("org.example", "*").matches(&lib));
    assert!(Exclusion::new("org.example", "lib").matches(&lib));
    assert!(!Exclusion::new("org.example", "other").matches(&lib));
    assert!(!Exclusion::new("org.other", "*").matches(&lib));
}

#[test]
fn scope_propagation() {
    assert_eq!(scope::propagate("compile", "compile"), Some("compile"));
    assert_eq!(scope::propagate("compile", "runtime"), Some("runtime"));
    assert_eq!(scope::propagate("runtime", "compile"), Some("runtime"));
    assert_eq!(scope::propagate("test", "compile"), Some("test"));
    assert_eq!(scope::propagate("provided", "runtime"), Some("provided"));
    assert_eq!(scope::propagate("compile", "test"), None);
    assert_eq!(scope::propagate("compile", "provided"), None);
}

#[test]
fn scope_strength_order() {
    assert!(scope::strength("compile") > scope::strength("runtime"));
    assert!(scope::strength("runtime") > scope::strength("system"));
    assert!(scope::strength("system") > scope::strength("provided"));
    assert!(scope::strength("provided") > scope::strength("test"));
}
