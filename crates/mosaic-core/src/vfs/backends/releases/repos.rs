//! Repository structure parsing.
//!
//! One mount per line, either `path:owner/name` or a bare `owner/name`
//! mounted at the driver root:
//!
//! ```text
//! /tools/rg:BurntSushi/ripgrep
//! /tools/fd:sharkdp/fd
//! cli/cli
//! ```

use tracing::warn;

use mosaic_types::path::clean_path;

/// A repository bound to a virtual path inside the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoMount {
    pub point: String,
    pub repo: String,
}

/// Parse a repository structure. Malformed lines are skipped.
pub fn parse_repo_structure(text: &str) -> Vec<RepoMount> {
    text.lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let parsed = parse_line(line);
            if parsed.is_none() {
                warn!(line = index + 1, content = %line, "invalid repository line, skipping");
            }
            parsed
        })
        .collect()
}

fn parse_line(line: &str) -> Option<RepoMount> {
    let (point, repo) = match line.split(':').collect::<Vec<_>>().as_slice() {
        [repo] => ("/", *repo),
        [point, repo] => (*point, *repo),
        _ => return None,
    };
    let repo = repo.trim();
    let (owner, name) = repo.split_once('/')?;
    if owner.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some(RepoMount {
        point: clean_path(point.trim()),
        repo: repo.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lines() {
        let mounts = parse_repo_structure(
            "/tools/rg:BurntSushi/ripgrep\n\n  cli/cli  \n# comment\n/bad:nope\na:b:c/d\n",
        );
        assert_eq!(
            mounts,
            vec![
                RepoMount {
                    point: "/tools/rg".into(),
                    repo: "BurntSushi/ripgrep".into()
                },
                RepoMount {
                    point: "/".into(),
                    repo: "cli/cli".into()
                },
            ]
        );
    }

    #[test]
    fn test_point_is_cleaned() {
        let mounts = parse_repo_structure("gh/x/:o/r");
        assert_eq!(mounts[0].point, "/gh/x");
    }
}
