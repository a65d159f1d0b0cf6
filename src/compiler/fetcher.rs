use crate::{
    cache::{LoadFailure, ResultCache},
    consts::COMPILER_EXECUTABLE,
    mismatch::Mismatch,
    release_index::CompilerBuild,
    version::CompilerVersion,
};
use bytes::Bytes;
use primitive_types::H256;
use sha2::{Digest, Sha256};
use std::{
    fs::{File, OpenOptions},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("couldn't fetch the file: {0}")]
    Fetch(String),
    #[error("hashsum of fetched file mismatch: {0}")]
    HashMismatch(#[from] Mismatch<H256>),
    #[error("couldn't create file: {0}")]
    File(String),
    #[error("tokio sheduling error: {0}")]
    Schedule(String),
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::File(err.to_string())
    }
}

impl From<tokio::task::JoinError> for FetchError {
    fn from(err: tokio::task::JoinError) -> Self {
        FetchError::Schedule(err.to_string())
    }
}

/// Downloads compiler builds into `dir`, once per version.
pub struct CompilerFetcher {
    dir: PathBuf,
    downloads: ResultCache<CompilerVersion, PathBuf, FetchError, CompilerBuild>,
}

impl CompilerFetcher {
    pub fn new(dir: PathBuf) -> Self {
        let downloads = {
            let dir = dir.clone();
            ResultCache::new("compiler_fetcher", move |_version, build: CompilerBuild| {
                let dir = dir.clone();
                async move { fetch_build(&dir, &build).await }
            })
        };
        Self { dir, downloads }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path to the executable of `build`, downloading it if needed.
    /// A failed download is forgotten, so the next call tries again.
    pub async fn fetch(&self, build: &CompilerBuild) -> Result<PathBuf, FetchError> {
        match self
            .downloads
            .lookup(build.version.clone(), build.clone())
            .await
        {
            Ok(path) => Ok(path),
            Err(err) => {
                // a newer download started by another caller stays untouched
                self.downloads.clear_failed(&build.version);
                match err.into_failure() {
                    LoadFailure::Loader(err) => Err(err),
                    LoadFailure::Aborted(message) => Err(FetchError::Schedule(message)),
                }
            }
        }
    }
}

#[tracing::instrument(skip_all, fields(version = %build.version), err)]
async fn fetch_build(dir: &Path, build: &CompilerBuild) -> Result<PathBuf, FetchError> {
    let file = executable_path(dir, &build.version);
    match tokio::fs::read(&file).await {
        Ok(existing) => {
            let existing = Bytes::from(existing);
            let sha256 = build.sha256;
            match tokio::task::spawn_blocking(move || validate_checksum(&existing, sha256)).await? {
                Ok(()) => {
                    tracing::info!(target: "compiler_fetcher", "found compiler at {}", file.display());
                    return Ok(file);
                }
                Err(mismatch) => {
                    tracing::warn!(target: "compiler_fetcher", "stored compiler is corrupted: {mismatch}");
                }
            }
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }

    tracing::info!(target: "compiler_fetcher", url = %build.url, "downloading compiler");
    let data = reqwest::get(build.url.as_str())
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|err| FetchError::Fetch(err.to_string()))?
        .bytes()
        .await
        .map_err(|err| FetchError::Fetch(err.to_string()))?;
    write_executable(data, build.sha256, dir, &build.version).await
}

fn executable_path(dir: &Path, version: &CompilerVersion) -> PathBuf {
    dir.join(version.to_string()).join(COMPILER_EXECUTABLE)
}

#[cfg(target_family = "unix")]
fn create_executable(path: &Path) -> Result<File, std::io::Error> {
    use std::os::unix::prelude::OpenOptionsExt;
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o777)
        .open(path)
}

#[cfg(not(target_family = "unix"))]
fn create_executable(path: &Path) -> Result<File, std::io::Error> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
}

pub fn validate_checksum(bytes: &Bytes, expected: H256) -> Result<(), Mismatch<H256>> {
    let start = std::time::Instant::now();

    let found = Sha256::digest(bytes);
    let found = H256::from_slice(&found);

    tracing::debug!(
        "check hashsum of {} bytes took {:?}",
        bytes.len(),
        start.elapsed()
    );
    if expected != found {
        Err(Mismatch::new(expected, found))
    } else {
        Ok(())
    }
}

pub async fn write_executable(
    data: Bytes,
    sha: H256,
    dir: &Path,
    version: &CompilerVersion,
) -> Result<PathBuf, FetchError> {
    let file = executable_path(dir, version);
    let folder = file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| dir.to_path_buf());

    let save_result = {
        let file = file.clone();
        let data = data.clone();
        tokio::task::spawn_blocking(move || -> Result<(), FetchError> {
            std::fs::create_dir_all(&folder)?;
            std::fs::remove_file(file.as_path()).or_else(|e| {
                if e.kind() == ErrorKind::NotFound {
                    Ok(())
                } else {
                    Err(e)
                }
            })?;
            let mut file = create_executable(file.as_path())?;
            std::io::copy(&mut data.as_ref(), &mut file)?;
            Ok(())
        })
    };
    let check_result = tokio::task::spawn_blocking(move || validate_checksum(&data, sha));

    let (check_result, save_result) = futures::join!(check_result, save_result);
    check_result??;
    save_result??;

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;
    use url::Url;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    const BINARY: &str = "this is a compiler binary";

    fn sha256_of(data: &[u8]) -> H256 {
        H256::from_slice(&Sha256::digest(data))
    }

    fn build(url: Url, sha256: H256) -> CompilerBuild {
        CompilerBuild::new(
            CompilerVersion::from_str("0.8.18+commit.87f61d96").unwrap(),
            url,
            sha256,
        )
    }

    #[tokio::test]
    async fn write_text_executable() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let version = CompilerVersion::from_str("v0.4.10+commit.f0d539ae").unwrap();
        let file = write_executable(
            Bytes::from_static(BINARY.as_bytes()),
            sha256_of(BINARY.as_bytes()),
            tmp_dir.path(),
            &version,
        )
        .await
        .unwrap();
        assert_eq!(file, tmp_dir.path().join("v0.4.10+commit.f0d539ae").join("solc"));
        let content = tokio::fs::read_to_string(file).await.unwrap();
        assert_eq!(BINARY, content);
    }

    #[tokio::test]
    async fn corrupted_binary_is_rejected() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let version = CompilerVersion::from_str("v0.4.10+commit.f0d539ae").unwrap();
        let err = write_executable(
            Bytes::from_static(BINARY.as_bytes()),
            H256::zero(),
            tmp_dir.path(),
            &version,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FetchError::HashMismatch(_)), "{err:?}");
    }

    #[tokio::test]
    async fn binary_is_downloaded_once() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/solc-v0.8.18"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(BINARY.as_bytes()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let tmp_dir = tempfile::tempdir().unwrap();
        let fetcher = CompilerFetcher::new(tmp_dir.path().to_path_buf());
        let url = Url::parse(&format!("{}/solc-v0.8.18", mock_server.uri())).unwrap();
        let build = build(url, sha256_of(BINARY.as_bytes()));

        let (first, second) = futures::join!(fetcher.fetch(&build), fetcher.fetch(&build));
        assert_eq!(first.unwrap(), second.unwrap());
        let third = fetcher.fetch(&build).await.unwrap();
        assert_eq!(tokio::fs::read_to_string(third).await.unwrap(), BINARY);
    }

    #[tokio::test]
    async fn stored_binary_is_reused() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(BINARY.as_bytes()))
            .expect(0)
            .mount(&mock_server)
            .await;

        let tmp_dir = tempfile::tempdir().unwrap();
        let url = Url::parse(&format!("{}/solc-v0.8.18", mock_server.uri())).unwrap();
        let build = build(url, sha256_of(BINARY.as_bytes()));
        write_executable(
            Bytes::from_static(BINARY.as_bytes()),
            build.sha256,
            tmp_dir.path(),
            &build.version,
        )
        .await
        .unwrap();

        let fetcher = CompilerFetcher::new(tmp_dir.path().to_path_buf());
        fetcher.fetch(&build).await.expect("stored binary should be used");
    }

    #[tokio::test]
    async fn failed_download_is_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(2)
            .mount(&mock_server)
            .await;

        let tmp_dir = tempfile::tempdir().unwrap();
        let fetcher = CompilerFetcher::new(tmp_dir.path().to_path_buf());
        let url = Url::parse(&format!("{}/solc-v0.8.18", mock_server.uri())).unwrap();
        let build = build(url, sha256_of(BINARY.as_bytes()));

        let err = fetcher.fetch(&build).await.unwrap_err();
        assert!(matches!(err, FetchError::Fetch(_)), "{err:?}");
        fetcher.fetch(&build).await.unwrap_err();
    }

    #[tokio::test]
    async fn concurrent_failures_clear_the_entry_once() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&mock_server)
            .await;

        let tmp_dir = tempfile::tempdir().unwrap();
        let fetcher = CompilerFetcher::new(tmp_dir.path().to_path_buf());
        let url = Url::parse(&format!("{}/solc-v0.8.18", mock_server.uri())).unwrap();
        let build = build(url, sha256_of(BINARY.as_bytes()));

        let (first, second) = futures::join!(fetcher.fetch(&build), fetcher.fetch(&build));
        assert_eq!(first.unwrap_err(), second.unwrap_err());
        assert!(fetcher.downloads.is_empty());

        fetcher.fetch(&build).await.unwrap_err();
    }
}
