// SPDX-License-Identifier: MIT OR Apache-2.0
//! Path-string classification.

use regex::Regex;
use std::sync::OnceLock;

/// What kind of location a path-like string denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathKind {
    /// POSIX-style filesystem path.
    UnixPath,
    /// Windows drive or UNC path.
    WindowsPath,
    /// URL with a scheme (`https://`, `s3://`, `gs://`, ...).
    Url,
    /// Container image reference.
    DockerImage,
    /// Conda environment file or named environment.
    CondaEnv,
    /// None of the above.
    Unknown,
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9+.-]*://").expect("static regex"))
}

fn docker_image_re() -> &'static Regex {
    // repo/name:tag or registry/org/name:tag, without a scheme.
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9._-]*(/[a-z0-9][a-z0-9._-]*)+:[A-Za-z0-9._-]+$")
            .expect("static regex")
    })
}

fn windows_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z]:[\\/]|^\\\\").expect("static regex"))
}

/// Classify a path-like string.
///
/// `docker://` URLs classify as container images, not generic URLs;
/// `environment.yml`/`environment.yaml` files classify as conda
/// environments.
#[must_use]
pub fn classify_path(path: &str) -> PathKind {
    if path.is_empty() {
        return PathKind::Unknown;
    }
    if path.starts_with("docker://") {
        return PathKind::DockerImage;
    }
    if path.starts_with("conda://") {
        return PathKind::CondaEnv;
    }
    if url_re().is_match(path) {
        return PathKind::Url;
    }
    if windows_re().is_match(path) {
        return PathKind::WindowsPath;
    }
    let file_name = path.rsplit('/').next().unwrap_or(path);
    if file_name == "environment.yml" || file_name == "environment.yaml" {
        return PathKind::CondaEnv;
    }
    if docker_image_re().is_match(path) && !path.contains("..") {
        return PathKind::DockerImage;
    }
    if path.starts_with('/') || path.starts_with("./") || path.starts_with("../") || path.contains('/')
    {
        return PathKind::UnixPath;
    }
    PathKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_paths() {
        assert_eq!(classify_path("/data/ref.fa"), PathKind::UnixPath);
        assert_eq!(classify_path("./out/result.bam"), PathKind::UnixPath);
        assert_eq!(classify_path("../shared/ref.fa"), PathKind::UnixPath);
    }

    #[test]
    fn windows_paths() {
        assert_eq!(classify_path(r"C:\data\ref.fa"), PathKind::WindowsPath);
        assert_eq!(classify_path("D:/scratch/x.txt"), PathKind::WindowsPath);
        assert_eq!(classify_path(r"\\fileserver\share"), PathKind::WindowsPath);
    }

    #[test]
    fn urls() {
        assert_eq!(classify_path("https://example.org/ref.fa"), PathKind::Url);
        assert_eq!(classify_path("s3://bucket/key"), PathKind::Url);
        assert_eq!(classify_path("gs://bucket/key"), PathKind::Url);
    }

    #[test]
    fn docker_images() {
        assert_eq!(
            classify_path("docker://biocontainers/bwa:0.7.17"),
            PathKind::DockerImage
        );
        assert_eq!(classify_path("biocontainers/bwa:0.7.17"), PathKind::DockerImage);
        assert_eq!(
            classify_path("quay.io/biocontainers/samtools:1.19"),
            PathKind::DockerImage
        );
    }

    #[test]
    fn conda_envs() {
        assert_eq!(classify_path("envs/environment.yml"), PathKind::CondaEnv);
        assert_eq!(classify_path("environment.yaml"), PathKind::CondaEnv);
        assert_eq!(classify_path("conda://bioinfo"), PathKind::CondaEnv);
    }

    #[test]
    fn unknown() {
        assert_eq!(classify_path(""), PathKind::Unknown);
        assert_eq!(classify_path("just-a-name"), PathKind::Unknown);
    }
}
