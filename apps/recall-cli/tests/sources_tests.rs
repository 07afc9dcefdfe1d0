use std::fs;

use recall_cli::sources::{category, doc_id, ingest_item, list_txt_files, read_text};
use recall_core::MetaValue;

#[test]
fn lists_only_txt_files_in_path_order() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    fs::create_dir_all(dir.path().join("policies/travel"))?;
    fs::write(dir.path().join("b.txt"), "b")?;
    fs::write(dir.path().join("a.txt"), "a")?;
    fs::write(dir.path().join("notes.md"), "skip")?;
    fs::write(dir.path().join("policies/travel/per-diem.txt"), "meals")?;

    let names: Vec<String> = list_txt_files(dir.path())
        .iter()
        .map(|p| p.strip_prefix(dir.path()).map(|r| r.to_string_lossy().into_owned()).unwrap_or_default())
        .collect();
    assert_eq!(names, vec!["a.txt", "b.txt", "policies/travel/per-diem.txt"]);

    let single = dir.path().join("a.txt");
    assert_eq!(list_txt_files(&single), vec![single.clone()]);
    Ok(())
}

#[test]
fn metadata_comes_from_the_path() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    fs::create_dir_all(root.join("policies/travel"))?;
    let file = root.join("policies/travel/per-diem.txt");
    fs::write(&file, "Employees may expense up to $50 for meals.")?;

    assert_eq!(doc_id(&file), "per-diem");
    assert_eq!(category(&file, root), "policies/travel");
    assert_eq!(category(&root.join("top.txt"), root), "misc");

    let item = ingest_item(&file, root, None)?;
    assert_eq!(item.text, "Employees may expense up to $50 for meals.");
    assert_eq!(item.metadata["doc_id"], MetaValue::from("per-diem"));
    assert_eq!(item.metadata["category"], MetaValue::from("policies/travel"));
    let keys: Vec<&str> = item.metadata.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["category", "doc_id", "doc_path"]);

    let overridden = ingest_item(&file, root, Some("finance"))?;
    assert_eq!(overridden.metadata["category"], MetaValue::from("finance"));
    Ok(())
}

#[test]
fn invalid_utf8_is_replaced_not_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("latin1.txt");
    fs::write(&file, b"caf\xe9 receipts")?;
    assert_eq!(read_text(&file)?, "caf\u{fffd} receipts");
    Ok(())
}
