use std::path::Path;
use std::process::Command;

/// Version suffix for `tally --version`. Packagers building outside a git
/// checkout can pin it with `TALLY_BUILD_SHA`.
fn build_sha(repo_root: &Path) -> String {
    if let Some(pinned) = std::env::var("TALLY_BUILD_SHA").ok().filter(|s| !s.trim().is_empty()) {
        return pinned.trim().to_string();
    }
    let git = |args: &[&str]| {
        Command::new("git")
            .arg("-C")
            .arg(repo_root)
            .args(args)
            .output()
            .ok()
            .filter(|o| o.status.success())
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
    };

    match git(&["rev-parse", "--short", "HEAD"]).filter(|s| !s.is_empty()) {
        Some(sha) => {
            let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
                .is_some_and(|out| !out.is_empty());
            if dirty { format!("{sha}-dirty") } else { sha }
        }
        None => "dev".to_string(),
    }
}

fn main() {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let repo_root = Path::new(&manifest_dir).join("..");

    println!("cargo:rustc-env=TALLY_BUILD_SHA={}", build_sha(&repo_root));
    println!("cargo:rerun-if-env-changed=TALLY_BUILD_SHA");
    // HEAD only changes on checkout; the ref it points at moves on commit.
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=../.git/refs/heads");
}
