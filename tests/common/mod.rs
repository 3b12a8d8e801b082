#![allow(dead_code)]

use async_trait::async_trait;
use nexis_downloader::civitai::MetadataResolver;
use nexis_downloader::config::Config;
use nexis_downloader::error::ToolError;
use nexis_downloader::http::RetryingClient;
use nexis_downloader::models::{FileFetcher, StagingLayout};
use nexis_downloader::tools::{ChecksumVerifier, CommandOutput, CommandRunner, CommandSpec};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// SHA-256 of the bytes `test content`
pub const TEST_CONTENT_SHA256: &str =
    "6ae8a75555209fd6c44157c0aed8016e763ff435a19cf186f76863140143ff72";
/// SHA-256 of zero bytes
pub const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

type Handler = dyn Fn(&CommandSpec) -> Result<CommandOutput, ToolError> + Send + Sync;

/// Records every command and answers through a closure
pub struct FakeRunner {
    calls: Mutex<Vec<CommandSpec>>,
    handler: Box<Handler>,
}

impl FakeRunner {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&CommandSpec) -> Result<CommandOutput, ToolError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        })
    }

    /// Behaves like a healthy aria2c / sha256sum / huggingface-cli / du
    pub fn healthy(content: &'static str, digest: &'static str) -> Arc<Self> {
        Self::new(move |spec| match spec.program.as_str() {
            "aria2c" => {
                write_download(spec, content);
                Ok(ok(""))
            }
            "sha256sum" => Ok(ok(&format!("{digest}  {}\n", spec.args[0]))),
            "du" => Ok(ok("12K\t/stage\n")),
            _ => Ok(ok("")),
        })
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, program: &str) -> Vec<CommandSpec> {
        self.calls()
            .into_iter()
            .filter(|c| c.program == program)
            .collect()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ToolError> {
        self.calls.lock().unwrap().push(spec.clone());
        (self.handler)(spec)
    }
}

pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

pub fn failed(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// Value of a `--name=value` argument
pub fn flag_value(spec: &CommandSpec, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    spec.args
        .iter()
        .find_map(|a| a.strip_prefix(prefix.as_str()).map(ToString::to_string))
}

/// Where an aria2c invocation writes its file
pub fn download_target(spec: &CommandSpec) -> PathBuf {
    let dir = flag_value(spec, "--dir").expect("--dir");
    let out = flag_value(spec, "--out").expect("--out");
    Path::new(&dir).join(out)
}

/// Simulate aria2c writing its output file
pub fn write_download(spec: &CommandSpec, content: &str) {
    std::fs::write(download_target(spec), content).unwrap();
}

/// Config pointing at a mock Civitai server and a temporary staging root
pub fn test_config(server_url: &str, root: &Path) -> Config {
    let mut config = Config::default();
    config.staging.root = root.to_path_buf();
    config.civitai.api_base = format!("{server_url}/api/v1");
    config.civitai.download_base = format!("{server_url}/api/download");
    config.http.backoff_factor_ms = 0;
    config
}

pub fn fetcher(config: &Config, runner: Arc<FakeRunner>) -> FileFetcher {
    let runner: Arc<dyn CommandRunner> = runner;
    let resolver = MetadataResolver::new(
        RetryingClient::new(config.retry_policy()),
        config.civitai.api_base.as_str(),
        config.civitai.download_base.as_str(),
        config.request_timeout(),
    );
    FileFetcher::new(
        resolver,
        runner.clone(),
        ChecksumVerifier::new(runner, config.checksum.program.as_str()),
        StagingLayout::new(config.staging.root.clone()),
        config.downloader.clone(),
        config.debug,
    )
}

/// Model-version payload with one file
pub fn version_body(name: &str, sha256: Option<&str>) -> String {
    match sha256 {
        Some(hash) => format!(
            r#"{{"id": 1, "files": [{{"name": "{name}", "hashes": {{"SHA256": "{hash}"}}}}]}}"#
        ),
        None => format!(r#"{{"id": 1, "files": [{{"name": "{name}", "hashes": {{}}}}]}}"#),
    }
}
