//! End-to-end tests for the merge engine.
//!
//! Every test builds a real repository in a temporary directory:
//! - trees are assembled from blobs with `TreeUpdateBuilder`
//! - commits are written directly, then `main` is checked out so the working
//!   tree and index match HEAD before the merge runs
//!
//! No network I/O: the bootstrap test fetches over `file://`.

use std::path::Path;

use git2::build::{CheckoutBuilder, TreeUpdateBuilder};
use git2::{FileMode, Oid, Repository, RepositoryState, Signature, StatusOptions, Time};
use tempfile::TempDir;

use gbwf_core::errors::MergeError;
use gbwf_core::git::GitClient;
use gbwf_core::merge::{self, MergeCase, MergeOptions, MergeReport, MergeState, MergeStrategy};

// ===========================================================================
// Helpers
// ===========================================================================

struct Fixture {
    dir: TempDir,
    repo: Repository,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        Self { dir, repo }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Tree holding exactly `files`.
    fn tree(&self, files: &[(&str, &str)]) -> Oid {
        let files: Vec<_> = files.iter().map(|(p, c)| (*p, *c, FileMode::Blob)).collect();
        self.tree_with_modes(&files)
    }

    /// Tree holding exactly `files`; a link's content is its target.
    fn tree_with_modes(&self, files: &[(&str, &str, FileMode)]) -> Oid {
        let empty = self.repo.treebuilder(None).unwrap().write().unwrap();
        let empty = self.repo.find_tree(empty).unwrap();
        let mut builder = TreeUpdateBuilder::new();
        for (path, content, mode) in files {
            let blob = self.repo.blob(content.as_bytes()).unwrap();
            builder.upsert(*path, blob, *mode);
        }
        builder.create_updated(&self.repo, &empty).unwrap()
    }

    fn commit_as(&self, who: &str, files: &[(&str, &str)], parents: &[Oid], msg: &str) -> Oid {
        self.commit_tree(who, self.tree(files), parents, msg)
    }

    fn commit_with_modes(&self, files: &[(&str, &str, FileMode)], parents: &[Oid], msg: &str) -> Oid {
        self.commit_tree("Ours", self.tree_with_modes(files), parents, msg)
    }

    fn commit_tree(&self, who: &str, tree: Oid, parents: &[Oid], msg: &str) -> Oid {
        let email = format!("{}@example.com", who.to_lowercase());
        let sig = Signature::new(who, &email, &Time::new(1_700_000_000, 0)).unwrap();
        let tree = self.repo.find_tree(tree).unwrap();
        let parents: Vec<git2::Commit<'_>> = parents
            .iter()
            .map(|p| self.repo.find_commit(*p).unwrap())
            .collect();
        let parents: Vec<&git2::Commit<'_>> = parents.iter().collect();
        self.repo.commit(None, &sig, &sig, msg, &tree, &parents).unwrap()
    }

    fn commit(&self, files: &[(&str, &str)], parents: &[Oid], msg: &str) -> Oid {
        self.commit_as("Ours", files, parents, msg)
    }

    /// Point `main` at `oid` and check it out.
    fn checkout_main(&self, oid: Oid) {
        self.repo.reference("refs/heads/main", oid, true, "test").unwrap();
        self.repo.set_head("refs/heads/main").unwrap();
        self.repo
            .checkout_head(Some(CheckoutBuilder::new().force()))
            .unwrap();
    }

    fn branch(&self, name: &str, oid: Oid) {
        self.repo
            .reference(&format!("refs/heads/{name}"), oid, true, "test")
            .unwrap();
    }

    fn merge(
        &self,
        target: &str,
        strategy: MergeStrategy,
    ) -> (Result<MergeReport, MergeError>, String) {
        let reference = self
            .repo
            .find_reference(&format!("refs/heads/{target}"))
            .unwrap();
        let options = MergeOptions {
            strategy,
            ..MergeOptions::default()
        };
        let mut out = Vec::new();
        let result = merge::merge(&self.repo, &reference, &options, Some(&mut out));
        (result, String::from_utf8(out).unwrap())
    }

    fn head(&self) -> Oid {
        self.repo.head().unwrap().peel_to_commit().unwrap().id()
    }

    fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.path().join(path)).unwrap()
    }

    fn head_file(&self, path: &str) -> Option<String> {
        let tree = self.repo.head().unwrap().peel_to_tree().unwrap();
        let entry = tree.get_path(Path::new(path)).ok()?;
        let blob = self.repo.find_blob(entry.id()).unwrap();
        Some(String::from_utf8(blob.content().to_vec()).unwrap())
    }

    /// Raw file mode of `path` in HEAD's tree.
    fn head_mode(&self, path: &str) -> Option<i32> {
        let tree = self.repo.head().unwrap().peel_to_tree().unwrap();
        let entry = tree.get_path(Path::new(path)).ok()?;
        Some(entry.filemode())
    }

    /// Changed tracked paths, untracked files ignored.
    fn dirty_paths(&self) -> Vec<String> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(false);
        let statuses = self.repo.statuses(Some(&mut opts)).unwrap();
        statuses
            .iter()
            .filter(|e| !e.status().is_empty())
            .filter_map(|e| e.path().map(str::to_owned))
            .collect()
    }
}

// ===========================================================================
// Fast-forward
// ===========================================================================

#[test]
fn test_fast_forward_moves_reference_without_new_commit() {
    for strategy in [
        MergeStrategy::FastForwardOnly,
        MergeStrategy::FastForwardMerge,
        MergeStrategy::OrtMerge,
    ] {
        let fx = Fixture::new();
        let base = fx.commit(&[("f", "one\n")], &[], "base");
        let mid = fx.commit(&[("f", "two\n")], &[base], "mid");
        let tip = fx.commit(&[("f", "two\n"), ("g", "new\n")], &[mid], "tip");
        fx.checkout_main(base);
        fx.branch("theirs", tip);

        let (result, out) = fx.merge("theirs", strategy);
        let report = result.unwrap();

        assert_eq!(report.state, MergeState::FastForwarded, "strategy {strategy}");
        assert_eq!(report.head, tip);
        assert_eq!(fx.head(), tip);
        assert!(report.paths.is_empty());
        assert_eq!(fx.read("f"), "two\n");
        assert_eq!(fx.read("g"), "new\n");
        assert!(fx.dirty_paths().is_empty());
        assert!(out.starts_with("Fast-forward "));
    }
}

#[test]
fn test_merging_head_itself_is_up_to_date() {
    let fx = Fixture::new();
    let base = fx.commit(&[("f", "one\n")], &[], "base");
    fx.checkout_main(base);
    fx.branch("theirs", base);

    let (result, out) = fx.merge("theirs", MergeStrategy::FastForwardMerge);
    let report = result.unwrap();
    assert_eq!(report.state, MergeState::UpToDate);
    assert_eq!(fx.head(), base);
    assert_eq!(out, "Already up to date.\n");
}

#[test]
fn test_fast_forward_only_refuses_diverged_history() {
    let fx = Fixture::new();
    let base = fx.commit(&[("f", "x\n")], &[], "base");
    let ours = fx.commit(&[("f", "x\n"), ("o", "o\n")], &[base], "ours");
    let theirs = fx.commit(&[("f", "x\n"), ("t", "t\n")], &[base], "theirs");
    fx.checkout_main(ours);
    fx.branch("theirs", theirs);

    let (result, _) = fx.merge("theirs", MergeStrategy::FastForwardOnly);
    assert!(matches!(result, Err(MergeError::FastForwardNotPossible)));
    assert_eq!(fx.head(), ours);
    assert!(!fx.path().join("t").exists());
    assert_eq!(fx.repo.state(), RepositoryState::Clean);
}

// ===========================================================================
// Three-way
// ===========================================================================

#[test]
fn test_disjoint_changes_merge_cleanly() {
    let fx = Fixture::new();
    let base = fx.commit(&[("shared", "s\n"), ("a/old", "gone\n")], &[], "base");
    let ours = fx.commit(
        &[("shared", "s\n"), ("a/old", "gone\n"), ("ours.txt", "o\n")],
        &[base],
        "ours",
    );
    let theirs = fx.commit_as(
        "Theirs",
        &[("shared", "s\n"), ("dir/theirs.txt", "t\n")],
        &[base],
        "theirs",
    );
    fx.checkout_main(ours);
    fx.branch("theirs", theirs);

    let (result, out) = fx.merge("theirs", MergeStrategy::FastForwardMerge);
    let report = result.unwrap();

    assert_eq!(report.state, MergeState::Committed);
    assert!(report.paths.iter().all(|p| !p.conflict && !p.text_merged));
    assert_eq!(out, "Merge made by the 'ort' strategy.\n");

    let expected = fx.tree(&[
        ("shared", "s\n"),
        ("ours.txt", "o\n"),
        ("dir/theirs.txt", "t\n"),
    ]);
    let head = fx.repo.find_commit(fx.head()).unwrap();
    assert_eq!(head.tree_id(), expected);
    assert!(!fx.path().join("a/old").exists());
    assert_eq!(fx.read("dir/theirs.txt"), "t\n");
    assert!(fx.dirty_paths().is_empty());
    assert_eq!(fx.repo.state(), RepositoryState::Clean);
}

#[test]
fn test_merge_commit_parents_and_author() {
    let fx = Fixture::new();
    let base = fx.commit(&[("f", "x\n")], &[], "base");
    let ours = fx.commit(&[("f", "x\n"), ("o", "o\n")], &[base], "ours");
    let theirs = fx.commit_as("Theirs", &[("f", "x\n"), ("t", "t\n")], &[base], "theirs");
    fx.checkout_main(ours);
    fx.branch("theirs", theirs);

    let (result, _) = fx.merge("theirs", MergeStrategy::OrtMerge);
    let report = result.unwrap();

    let commit = fx.repo.find_commit(report.head).unwrap();
    let parents: Vec<Oid> = commit.parent_ids().collect();
    assert_eq!(parents, vec![ours, theirs]);
    assert_eq!(commit.author().name(), Some("Ours"));
    assert_eq!(commit.committer().name(), Some("Ours"));
    assert!(commit.message().unwrap().starts_with("Merge theirs ("));
    assert_eq!(fx.repo.find_reference("refs/heads/main").unwrap().target(), Some(report.head));
}

#[test]
fn test_identical_change_skips_text_merge() {
    let fx = Fixture::new();
    let base = fx.commit(&[("f", "x\n")], &[], "base");
    let ours = fx.commit(&[("f", "same\n"), ("o", "o\n")], &[base], "ours");
    let theirs = fx.commit(&[("f", "same\n"), ("t", "t\n")], &[base], "theirs");
    fx.checkout_main(ours);
    fx.branch("theirs", theirs);

    let (result, out) = fx.merge("theirs", MergeStrategy::FastForwardMerge);
    let report = result.unwrap();

    let f = report.paths.iter().find(|p| p.path == "f").unwrap();
    assert_eq!(f.case, MergeCase::BothChanged);
    assert!(!f.text_merged);
    assert!(!f.conflict);
    assert!(!out.contains("Auto-merging"));
    assert_eq!(fx.head_file("f").as_deref(), Some("same\n"));
}

#[test]
fn test_non_overlapping_edits_in_one_file() {
    let fx = Fixture::new();
    let base = fx.commit(&[("f", "a\nb\nc\n")], &[], "base");
    let ours = fx.commit(&[("f", "a\nB\nc\n")], &[base], "ours");
    let theirs = fx.commit(&[("f", "a\nb\nC\n")], &[base], "theirs");
    fx.checkout_main(ours);
    fx.branch("theirs", theirs);

    let (result, out) = fx.merge("theirs", MergeStrategy::FastForwardMerge);
    let report = result.unwrap();

    assert_eq!(report.state, MergeState::Committed);
    assert_eq!(report.paths.len(), 1);
    assert!(report.paths[0].text_merged);
    assert!(!report.paths[0].conflict);
    assert_eq!(fx.read("f"), "a\nB\nC\n");
    assert_eq!(fx.head_file("f").as_deref(), Some("a\nB\nC\n"));
    assert!(out.contains("Auto-merging f\n"));
    assert!(fx.dirty_paths().is_empty());
}

#[test]
fn test_conflict_is_contained_and_resumable() {
    let fx = Fixture::new();
    let base = fx.commit(&[("f", "x\n"), ("g", "g\n")], &[], "base");
    let ours = fx.commit(&[("f", "ours\n"), ("g", "g\n")], &[base], "ours");
    let theirs = fx.commit(&[("f", "theirs\n"), ("g", "g\n"), ("t", "t\n")], &[base], "theirs");
    fx.checkout_main(ours);
    fx.branch("theirs", theirs);

    let (result, out) = fx.merge("theirs", MergeStrategy::FastForwardMerge);
    match result {
        Err(MergeError::Conflict { paths }) => assert_eq!(paths, vec!["f".to_string()]),
        other => panic!("expected conflict, got {other:?}"),
    }

    // Exactly one region, bounded by the three markers.
    let content = fx.read("f");
    assert_eq!(content, "<<<<<<< main\nours\n=======\ntheirs\n>>>>>>> theirs\n");
    assert_eq!(content.matches("<<<<<<<").count(), 1);
    assert_eq!(content.matches("=======").count(), 1);
    assert_eq!(content.matches(">>>>>>>").count(), 1);

    // The merged file is not staged; the clean path is.
    let index = fx.repo.index().unwrap();
    let staged_f = index.get_path(Path::new("f"), 0).unwrap();
    assert_eq!(staged_f.id, fx.repo.blob(b"ours\n").unwrap());
    let staged_t = index.get_path(Path::new("t"), 0).unwrap();
    assert_eq!(staged_t.id, fx.repo.blob(b"t\n").unwrap());

    // No commit was made, and the merge can be finished with git.
    assert_eq!(fx.head(), ours);
    assert_eq!(
        fx.repo.find_reference("MERGE_HEAD").unwrap().target(),
        Some(theirs)
    );
    assert_eq!(fx.repo.state(), RepositoryState::Merge);
    let msg = std::fs::read_to_string(fx.repo.path().join("MERGE_MSG")).unwrap();
    assert!(msg.contains("#\tf\n"));

    assert!(out.contains("CONFLICT (content): Merge conflict in f\n"));
    assert_eq!(fx.dirty_paths(), vec!["f".to_string(), "t".to_string()]);
}

#[test]
fn test_conflict_labels_can_be_overridden() {
    let fx = Fixture::new();
    let base = fx.commit(&[("f", "x\n")], &[], "base");
    let ours = fx.commit(&[("f", "ours\n")], &[base], "ours");
    let theirs = fx.commit(&[("f", "theirs\n")], &[base], "theirs");
    fx.checkout_main(ours);
    fx.branch("theirs", theirs);

    let reference = fx.repo.find_reference("refs/heads/theirs").unwrap();
    let options = MergeOptions {
        strategy: MergeStrategy::OrtMerge,
        ours_label: Some("workspace".into()),
        theirs_label: Some("plugin".into()),
    };
    let result = merge::merge(&fx.repo, &reference, &options, None);

    assert!(result.unwrap_err().is_conflict());
    assert_eq!(
        fx.read("f"),
        "<<<<<<< workspace\nours\n=======\ntheirs\n>>>>>>> plugin\n"
    );
}

#[test]
fn test_delete_versus_modify_keeps_modification() {
    // Theirs modifies what ours deleted.
    let fx = Fixture::new();
    let base = fx.commit(&[("f", "x\n"), ("g", "g\n")], &[], "base");
    let ours = fx.commit(&[("g", "g\n")], &[base], "ours");
    let theirs = fx.commit(&[("f", "y\n"), ("g", "g\n")], &[base], "theirs");
    fx.checkout_main(ours);
    fx.branch("theirs", theirs);

    let (result, _) = fx.merge("theirs", MergeStrategy::FastForwardMerge);
    let report = result.unwrap();
    assert_eq!(report.state, MergeState::Committed);
    assert_eq!(report.paths[0].case, MergeCase::TheirsOverDelete);
    assert_eq!(fx.read("f"), "y\n");
    assert_eq!(fx.head_file("f").as_deref(), Some("y\n"));
    assert!(fx.dirty_paths().is_empty());

    // Ours modifies what theirs deleted.
    let fx = Fixture::new();
    let base = fx.commit(&[("f", "x\n")], &[], "base");
    let ours = fx.commit(&[("f", "mine\n")], &[base], "ours");
    let theirs = fx.commit(&[("t", "t\n")], &[base], "theirs");
    fx.checkout_main(ours);
    fx.branch("theirs", theirs);

    let (result, _) = fx.merge("theirs", MergeStrategy::FastForwardMerge);
    let report = result.unwrap();
    let f = report.paths.iter().find(|p| p.path == "f").unwrap();
    assert_eq!(f.case, MergeCase::OursOverDelete);
    assert!(!f.conflict);
    assert_eq!(fx.head_file("f").as_deref(), Some("mine\n"));
    assert_eq!(fx.head_file("t").as_deref(), Some("t\n"));
}

#[test]
fn test_both_deleted_is_idempotent() {
    let fx = Fixture::new();
    let base = fx.commit(&[("f", "x\n"), ("g", "g\n")], &[], "base");
    let ours = fx.commit(&[("g", "g\n"), ("o", "o\n")], &[base], "ours");
    let theirs = fx.commit(&[("g", "g\n"), ("t", "t\n")], &[base], "theirs");
    fx.checkout_main(ours);
    fx.branch("theirs", theirs);
    // Ours' checkout already dropped `f` from disk and index.
    assert!(!fx.path().join("f").exists());
    assert!(fx.repo.index().unwrap().get_path(Path::new("f"), 0).is_none());

    let (result, _) = fx.merge("theirs", MergeStrategy::FastForwardMerge);
    let report = result.unwrap();

    assert_eq!(report.state, MergeState::Committed);
    let f = report.paths.iter().find(|p| p.path == "f").unwrap();
    assert_eq!(f.case, MergeCase::BothDeleted);
    assert!(!f.conflict);
    assert_eq!(fx.head_file("f"), None);
    assert_eq!(fx.head_file("t").as_deref(), Some("t\n"));
    assert!(!fx.path().join("f").exists());
    assert!(fx.dirty_paths().is_empty());
}

#[test]
fn test_no_op_merge_creates_no_commit() {
    // Theirs only carries a change ours already has.
    let fx = Fixture::new();
    let base = fx.commit(&[("f", "x\n")], &[], "base");
    let ours = fx.commit(&[("f", "y\n"), ("o", "o\n")], &[base], "ours");
    let theirs = fx.commit(&[("f", "y\n")], &[base], "theirs");
    fx.checkout_main(ours);
    fx.branch("theirs", theirs);

    let (result, out) = fx.merge("theirs", MergeStrategy::FastForwardMerge);
    let report = result.unwrap();
    assert_eq!(report.state, MergeState::UpToDate);
    assert_eq!(report.head, ours);
    assert_eq!(fx.head(), ours);
    assert!(fx.dirty_paths().is_empty());
    assert_eq!(out, "Already up to date.\n");

    // Theirs is already part of our history.
    let fx = Fixture::new();
    let base = fx.commit(&[("f", "x\n")], &[], "base");
    let ours = fx.commit(&[("f", "x\n"), ("o", "o\n")], &[base], "ours");
    fx.checkout_main(ours);
    fx.branch("theirs", base);

    let (result, _) = fx.merge("theirs", MergeStrategy::OrtMerge);
    let report = result.unwrap();
    assert_eq!(report.state, MergeState::UpToDate);
    assert_eq!(fx.head(), ours);
}

// ===========================================================================
// File modes
// ===========================================================================

const MODE_EXECUTABLE: i32 = 0o100755;
const MODE_LINK: i32 = 0o120000;

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).unwrap().permissions().mode() & 0o111 != 0
}

#[cfg(unix)]
#[test]
fn test_ours_symlink_is_not_written_through() {
    let fx = Fixture::new();
    let base = fx.commit(&[("t.txt", "data\n")], &[], "base");
    let ours = fx.commit_with_modes(
        &[("t.txt", "data\n", FileMode::Blob), ("l", "t.txt", FileMode::Link)],
        &[base],
        "ours",
    );
    let theirs = fx.commit(&[("t.txt", "data\n"), ("x", "x\n")], &[base], "theirs");
    fx.checkout_main(ours);
    fx.branch("theirs", theirs);

    let (result, _) = fx.merge("theirs", MergeStrategy::OrtMerge);
    assert_eq!(result.unwrap().state, MergeState::Committed);

    assert_eq!(fx.read("t.txt"), "data\n");
    assert_eq!(
        std::fs::read_link(fx.path().join("l")).unwrap(),
        Path::new("t.txt")
    );
    assert_eq!(fx.head_mode("l"), Some(MODE_LINK));
    assert_eq!(fx.head_file("t.txt").as_deref(), Some("data\n"));
    assert!(fx.dirty_paths().is_empty());
}

#[cfg(unix)]
#[test]
fn test_theirs_symlink_is_committed_as_link() {
    let fx = Fixture::new();
    let base = fx.commit(&[("t.txt", "data\n")], &[], "base");
    let ours = fx.commit(&[("t.txt", "data\n"), ("o", "o\n")], &[base], "ours");
    let theirs = fx.commit_with_modes(
        &[("t.txt", "data\n", FileMode::Blob), ("l", "t.txt", FileMode::Link)],
        &[base],
        "theirs",
    );
    fx.checkout_main(ours);
    fx.branch("theirs", theirs);

    let (result, _) = fx.merge("theirs", MergeStrategy::OrtMerge);
    assert_eq!(result.unwrap().state, MergeState::Committed);

    let meta = std::fs::symlink_metadata(fx.path().join("l")).unwrap();
    assert!(meta.file_type().is_symlink());
    assert_eq!(fx.read("l"), "data\n");
    assert_eq!(fx.head_mode("l"), Some(MODE_LINK));
    assert_eq!(fx.head_file("l").as_deref(), Some("t.txt"));
    assert!(fx.dirty_paths().is_empty());
}

#[cfg(unix)]
#[test]
fn test_executable_bit_survives_one_sided_changes() {
    let fx = Fixture::new();
    let base = fx.commit_with_modes(
        &[("keep.sh", "v1\n", FileMode::BlobExecutable), ("g", "g\n", FileMode::Blob)],
        &[],
        "base",
    );
    // Ours adds a script and deletes keep.sh; theirs adds a script and edits keep.sh.
    let ours = fx.commit_with_modes(
        &[("g", "g\n", FileMode::Blob), ("ours.sh", "o\n", FileMode::BlobExecutable)],
        &[base],
        "ours",
    );
    let theirs = fx.commit_with_modes(
        &[
            ("keep.sh", "v2\n", FileMode::BlobExecutable),
            ("g", "g\n", FileMode::Blob),
            ("theirs.sh", "t\n", FileMode::BlobExecutable),
        ],
        &[base],
        "theirs",
    );
    fx.checkout_main(ours);
    fx.branch("theirs", theirs);

    let (result, _) = fx.merge("theirs", MergeStrategy::FastForwardMerge);
    let report = result.unwrap();
    assert_eq!(report.state, MergeState::Committed);

    let keep = report.paths.iter().find(|p| p.path == "keep.sh").unwrap();
    assert_eq!(keep.case, MergeCase::TheirsOverDelete);
    for path in ["ours.sh", "theirs.sh", "keep.sh"] {
        assert_eq!(fx.head_mode(path), Some(MODE_EXECUTABLE), "{path}");
        assert!(is_executable(&fx.path().join(path)), "{path}");
    }
    assert_eq!(fx.read("keep.sh"), "v2\n");
    assert!(fx.dirty_paths().is_empty());
}

#[cfg(unix)]
#[test]
fn test_text_merge_keeps_theirs_mode_change() {
    let fx = Fixture::new();
    let base = fx.commit(&[("run", "a\nb\nc\n")], &[], "base");
    let ours = fx.commit(&[("run", "A\nb\nc\n")], &[base], "ours");
    let theirs = fx.commit_with_modes(
        &[("run", "a\nb\nC\n", FileMode::BlobExecutable)],
        &[base],
        "theirs",
    );
    fx.checkout_main(ours);
    fx.branch("theirs", theirs);

    let (result, _) = fx.merge("theirs", MergeStrategy::FastForwardMerge);
    let report = result.unwrap();
    assert_eq!(report.state, MergeState::Committed);
    assert!(report.paths[0].text_merged);

    assert_eq!(fx.head_file("run").as_deref(), Some("A\nb\nC\n"));
    assert_eq!(fx.head_mode("run"), Some(MODE_EXECUTABLE));
    assert!(is_executable(&fx.path().join("run")));
    assert!(fx.dirty_paths().is_empty());
}

#[test]
fn test_unrelated_histories_have_no_common_ancestor() {
    let fx = Fixture::new();
    let ours = fx.commit(&[("f", "ours\n")], &[], "ours root");
    let theirs = fx.commit(&[("g", "theirs\n")], &[], "theirs root");
    fx.checkout_main(ours);
    fx.branch("theirs", theirs);

    let (result, _) = fx.merge("theirs", MergeStrategy::FastForwardMerge);
    assert!(matches!(result, Err(MergeError::NoCommonAncestor { .. })));
    assert_eq!(fx.head(), ours);
    assert!(!fx.path().join("g").exists());
}

#[test]
fn test_strategy_selector_rejects_unknown_names() {
    assert!(matches!(
        "octopus".parse::<MergeStrategy>(),
        Err(MergeError::UnsupportedStrategy(ref s)) if s == "octopus"
    ));
}

// ===========================================================================
// Bootstrap flow
// ===========================================================================

#[test]
fn test_bootstrap_base_then_plugin() {
    // A base template and a plugin forked from it.
    let upstream = Fixture::new();
    let root = upstream.commit(&[("README.md", "base\n")], &[], "base");
    upstream.checkout_main(root);
    let plugin_tip = upstream.commit(
        &[("README.md", "base\n"), ("plugin.txt", "plugin\n")],
        &[root],
        "plugin",
    );
    upstream.branch("plugin", plugin_tip);
    let url = format!("file://{}", upstream.path().display());

    let work = tempfile::tempdir().unwrap();
    let client = GitClient::init(work.path()).unwrap();
    client.ensure_remote("gbwf", &url).unwrap();

    client
        .fetch("gbwf", "+refs/heads/main:refs/remotes/gbwf/main", 0, &mut |_| {})
        .unwrap();
    let base = client.resolve_ref("refs/remotes/gbwf/main").unwrap();
    client.adopt(base).unwrap();
    assert_eq!(client.head_commit().unwrap(), Some(root));

    client
        .fetch("gbwf", "+refs/heads/plugin:refs/remotes/gbwf/plugin", 0, &mut |_| {})
        .unwrap();
    assert!(client.is_clean().unwrap());

    let mut out = Vec::new();
    let report = client
        .merge("refs/remotes/gbwf/plugin", &MergeOptions::default(), Some(&mut out))
        .unwrap();

    assert_eq!(report.state, MergeState::FastForwarded);
    assert_eq!(client.head_commit().unwrap(), Some(plugin_tip));
    assert_eq!(
        std::fs::read_to_string(work.path().join("plugin.txt")).unwrap(),
        "plugin\n"
    );
    assert!(client.is_clean().unwrap());
}
