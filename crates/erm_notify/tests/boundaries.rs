use std::fs;
use std::path::{Path, PathBuf};

fn collect_rs_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(p) = stack.pop() {
        let entries = match fs::read_dir(&p) {
            Ok(e) => e,
            Err(_) => continue,
        };
        for ent in entries.flatten() {
            let path = ent.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|s| s.to_str()) == Some("rs") {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}

#[test]
fn erm_notify_never_touches_the_record_store() {
    // Guardrail: delivery runs after commit and must not read or write incident state.
    let src_root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src");
    let files = collect_rs_files(&src_root);
    assert!(!files.is_empty());

    for f in files {
        let text = fs::read_to_string(&f).unwrap_or_default();
        for forbidden in ["rusqlite", "erm_core::repo", "erm_core::lifecycle", "erm_core::db"] {
            assert!(
                !text.contains(forbidden),
                "forbidden dependency {forbidden} found in {}",
                f.display()
            );
        }
    }
}
