use std::path::Path;
use std::process::Command;

const HASH_VAR: &str = "LENSGRAB_GIT_HASH";

fn main() {
    // Packagers building from a tarball can supply the hash themselves.
    println!("cargo:rerun-if-env-changed={HASH_VAR}");
    let hash = std::env::var(HASH_VAR)
        .ok()
        .filter(|hash| !hash.trim().is_empty())
        .or_else(|| git(&["rev-parse", "--short", "HEAD"]))
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env={HASH_VAR}={hash}");

    // Rebuild when HEAD moves, whether it is detached or follows a branch.
    if let Some(head) = git(&["rev-parse", "--git-path", "HEAD"]) {
        watch(Path::new(&head));
    }
    if let Some(branch) = git(&["symbolic-ref", "-q", "HEAD"])
        && let Some(reference) = git(&["rev-parse", "--git-path", &branch])
    {
        watch(Path::new(&reference));
    }
    if let Some(packed) = git(&["rev-parse", "--git-path", "packed-refs"]) {
        watch(Path::new(&packed));
    }
}

/// Trimmed stdout of a successful git invocation.
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn watch(path: &Path) {
    if path.exists() {
        println!("cargo:rerun-if-changed={}", path.display());
    }
}
