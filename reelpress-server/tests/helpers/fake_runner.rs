//! In-process stand-in for the encoder and downloader

use async_trait::async_trait;
use reelpress_server::services::{ProcessError, ProcessRunner};
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Mutex;

/// What the fake process does when invoked
#[derive(Debug, Clone)]
pub enum FakeBehavior {
    /// Exit 0, optionally writing `contents` to the output path
    Succeed { output: Option<Vec<u8>> },
    /// Exit with a non-zero status
    Exit(i32),
    /// Fail to start, as if the binary were missing
    Missing,
    /// Never finish
    Hang,
}

/// Records every invocation and plays back a fixed behavior
pub struct FakeRunner {
    behavior: FakeBehavior,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeRunner {
    pub fn new(behavior: FakeBehavior) -> Self {
        Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Succeeds and writes `contents` where the output would go
    pub fn producing(contents: &[u8]) -> Self {
        Self::new(FakeBehavior::Succeed {
            output: Some(contents.to_vec()),
        })
    }

    /// Succeeds without writing anything
    pub fn silent() -> Self {
        Self::new(FakeBehavior::Succeed { output: None })
    }

    pub fn failing(code: i32) -> Self {
        Self::new(FakeBehavior::Exit(code))
    }

    pub fn missing() -> Self {
        Self::new(FakeBehavior::Missing)
    }

    pub fn hanging() -> Self {
        Self::new(FakeBehavior::Hang)
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Downloader output follows `-o` with the extension template filled in;
    /// encoder output is the last argument.
    fn output_path(args: &[String]) -> Option<PathBuf> {
        if let Some(pos) = args.iter().position(|a| a == "-o") {
            return args
                .get(pos + 1)
                .map(|template| PathBuf::from(template.replace("%(ext)s", "mp3")));
        }
        args.last().map(PathBuf::from)
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, program: &str, args: &[OsString]) -> Result<(), ProcessError> {
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.clone()));

        match &self.behavior {
            FakeBehavior::Succeed { output } => {
                if let (Some(contents), Some(path)) = (output, Self::output_path(&args)) {
                    tokio::fs::write(&path, contents).await.unwrap();
                }
                Ok(())
            }
            FakeBehavior::Exit(code) => Err(ProcessError::Exit {
                program: program.to_string(),
                code: Some(*code),
            }),
            FakeBehavior::Missing => Err(ProcessError::Spawn {
                program: program.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            }),
            FakeBehavior::Hang => std::future::pending().await,
        }
    }
}
