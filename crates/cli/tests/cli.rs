use assert_cmd::Command;

#[test]
fn openapi_prints_every_module() {
    let output = Command::cargo_bin("shelf")
        .unwrap()
        .arg("openapi")
        .env("SHELF_ENV", "local")
        .output()
        .unwrap();

    assert!(output.status.success());
    let document: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let paths = document["paths"].as_object().unwrap();
    assert!(paths.contains_key("/api/books"));
    assert!(paths.contains_key("/api/books/{id}/reviews"));
    assert!(paths.contains_key("/api/reviews/{id}"));
    assert!(paths.contains_key("/api/auth/login"));
}

#[test]
fn unknown_subcommand_fails() {
    Command::cargo_bin("shelf")
        .unwrap()
        .arg("frobnicate")
        .assert()
        .failure();
}
