#[path = "../src/bundle.rs"]
#[allow(dead_code)]
mod bundle;
mod test_support;

use serde_json::json;
use test_support::{
    entry, error_code, request_err, request_ok, select_workspace, spawn_sidecar, temp_dir,
};

#[test]
fn exported_bundle_restores_timetables_and_setup_elsewhere() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = select_workspace(&mut stdin, &mut reader, "timetabled-bundle-src");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "timetable.save",
        json!({ "grade_level": "SS2", "classes": [entry("Tuesday", "09:20", "10:00", "Chemistry")] }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "timetable.save",
        json!({ "grade_level": "JSS1", "classes": [entry("Monday", "08:00", "08:40", "Maths")] }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "setup.update",
        json!({ "section": "periods", "patch": { "periodMinutes": 45 } }),
    );

    let out = temp_dir("timetabled-bundle-out").join("week.zip");
    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "timetable.exportBundle",
        json!({ "outPath": out.to_string_lossy() }),
    );
    assert_eq!(exported["bundleFormat"], "timetable-bundle-v1");
    assert_eq!(exported["gradeLevels"], json!(["JSS1", "SS2"]));
    assert!(out.is_file());

    let _ = select_workspace(&mut stdin, &mut reader, "timetabled-bundle-dst");
    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "timetable.importBundle",
        json!({ "inPath": out.to_string_lossy() }),
    );
    assert_eq!(imported["saved"], 2);
    assert_eq!(imported["setupApplied"], true);

    let got = request_ok(&mut stdin, &mut reader, "6", "timetable.get", json!({ "gradeLevel": "SS2" }));
    assert_eq!(got["days"]["Tuesday"][0]["subject"], "Chemistry");
    let setup = request_ok(&mut stdin, &mut reader, "7", "setup.get", json!({}));
    assert_eq!(setup["periods"]["periodMinutes"], 45);
}

#[test]
fn export_can_be_narrowed_to_some_grades() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = select_workspace(&mut stdin, &mut reader, "timetabled-bundle-some");
    for (i, grade) in ["JSS1", "SS2"].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("s{}", i),
            "timetable.save",
            json!({ "grade_level": grade, "classes": [entry("Monday", "08:00", "08:40", "Maths")] }),
        );
    }
    let out = temp_dir("timetabled-bundle-some-out").join("ss2.zip");

    let error = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "timetable.exportBundle",
        json!({ "outPath": out.to_string_lossy(), "gradeLevels": ["SS3"] }),
    );
    assert_eq!(error_code(&error), "not_found");
    assert!(!out.exists());

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "timetable.exportBundle",
        json!({ "outPath": out.to_string_lossy(), "gradeLevels": ["SS2", "SS2"] }),
    );
    assert_eq!(exported["gradeLevels"], json!(["SS2"]));

    let _ = select_workspace(&mut stdin, &mut reader, "timetabled-bundle-some-dst");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "timetable.importBundle",
        json!({ "inPath": out.to_string_lossy() }),
    );
    let levels = request_ok(&mut stdin, &mut reader, "4", "timetable.gradeLevels", json!({}));
    assert_eq!(levels["gradeLevels"].as_array().map(|v| v.len()), Some(1));
    assert_eq!(levels["gradeLevels"][0]["gradeLevel"], "SS2");
}

#[test]
fn non_bundle_file_leaves_the_workspace_intact() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let ws = select_workspace(&mut stdin, &mut reader, "timetabled-bundle-notes");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "timetable.save",
        json!({ "grade_level": "SS2", "classes": [entry("Monday", "08:00", "08:40", "Maths")] }),
    );
    let db_before = std::fs::read(ws.join("timetable.sqlite3")).expect("read db");

    let notes = ws.join("notes.txt");
    std::fs::write(&notes, "just some notes, not a database").expect("write notes");
    let error = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "timetable.importBundle",
        json!({ "inPath": notes.to_string_lossy() }),
    );
    assert_eq!(error_code(&error), "bad_bundle");
    assert!(!error["message"].as_str().unwrap_or("").contains('\n'));

    let junk = ws.join("junk.zip");
    std::fs::write(&junk, [0x50, 0x4B, 0x03, 0x04, 0, 0, 0]).expect("write junk");
    let error = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "timetable.importBundle",
        json!({ "inPath": junk.to_string_lossy() }),
    );
    assert_eq!(error_code(&error), "bad_bundle");

    let error = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "timetable.importBundle",
        json!({ "inPath": ws.join("missing.zip").to_string_lossy() }),
    );
    assert_eq!(error_code(&error), "not_found");

    let got = request_ok(&mut stdin, &mut reader, "5", "timetable.get", json!({ "gradeLevel": "SS2" }));
    assert_eq!(got["days"]["Monday"][0]["subject"], "Maths");
    let db_after = std::fs::read(ws.join("timetable.sqlite3")).expect("read db");
    assert_eq!(db_before, db_after);
}

#[test]
fn invalid_bundled_timetable_rejects_the_whole_import() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let ws = select_workspace(&mut stdin, &mut reader, "timetabled-bundle-invalid");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "timetable.save",
        json!({ "grade_level": "JSS1", "classes": [entry("Monday", "08:00", "08:40", "Maths")] }),
    );

    let path = ws.join("hand-made.zip");
    bundle::write_bundle(
        &path,
        &bundle::Bundle {
            timetables: vec![
                json!({ "grade_level": "JSS1", "classes": [entry("Friday", "08:00", "08:40", "Art")] }),
                json!({ "grade_level": "SS1", "classes": [entry("Sunday", "08:00", "08:40", "Art")] }),
                json!({ "grade_level": "JSS1", "classes": [entry("Monday", "09:00", "09:40", "Art")] }),
            ],
            setup: Some(json!({ "calendar": { "hourRowHeight": 2 } })),
        },
    )
    .expect("write bundle");

    let error = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "timetable.importBundle",
        json!({ "inPath": path.to_string_lossy() }),
    );
    assert_eq!(error_code(&error), "validation_failed");
    let fields = &error["details"]["fields"];
    assert!(fields.get("timetables.1.classes.0.day").is_some(), "{}", fields);
    assert!(fields.get("timetables.2.grade_level").is_some(), "{}", fields);
    assert!(fields.get("setup").is_some(), "{}", fields);
    assert!(fields.get("timetables.0.grade_level").is_none(), "{}", fields);

    let got = request_ok(&mut stdin, &mut reader, "3", "timetable.get", json!({ "gradeLevel": "JSS1" }));
    assert_eq!(got["days"]["Monday"][0]["subject"], "Maths");
    assert_eq!(got["days"]["Friday"], json!([]));
    let levels = request_ok(&mut stdin, &mut reader, "4", "timetable.gradeLevels", json!({}));
    assert_eq!(levels["gradeLevels"].as_array().map(|v| v.len()), Some(1));
}

#[test]
fn import_only_replaces_bundled_grades() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let ws = select_workspace(&mut stdin, &mut reader, "timetabled-bundle-merge");
    for (i, grade) in ["JSS1", "SS2"].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("s{}", i),
            "timetable.save",
            json!({ "grade_level": grade, "classes": [entry("Monday", "08:00", "08:40", "Maths")] }),
        );
    }

    let path = ws.join("jss1.zip");
    bundle::write_bundle(
        &path,
        &bundle::Bundle {
            timetables: vec![json!({
                "grade_level": "JSS1",
                "classes": [entry("Wednesday", "11:20", "12:00", "Music")]
            })],
            setup: None,
        },
    )
    .expect("write bundle");
    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "timetable.importBundle",
        json!({ "inPath": path.to_string_lossy() }),
    );
    assert_eq!(imported["setupApplied"], false);

    let jss1 = request_ok(&mut stdin, &mut reader, "2", "timetable.get", json!({ "gradeLevel": "JSS1" }));
    assert_eq!(jss1["days"]["Monday"], json!([]));
    assert_eq!(jss1["days"]["Wednesday"][0]["subject"], "Music");
    let ss2 = request_ok(&mut stdin, &mut reader, "3", "timetable.get", json!({ "gradeLevel": "SS2" }));
    assert_eq!(ss2["days"]["Monday"][0]["subject"], "Maths");
}
