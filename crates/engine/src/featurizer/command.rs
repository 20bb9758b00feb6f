//! Featurizer backed by an external program.
//!
//! # Protocol
//!
//! ```text
//! stdin:  one key per line, UTF-8, '\n' terminated
//! stdout: keys.len() * dim f32 values, little-endian, row-major
//! exit:   0 on success; anything else fails the whole call
//! ```

use super::Featurizer;
use byteorder::{ByteOrder, LittleEndian};
use featstore_core::{EmbeddingMatrix, FeatureStoreError, Result};
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;
use tracing::debug;

/// Runs an external featurization program once per `embed` call.
///
/// No timeout is applied: a program that never exits blocks the caller.
#[derive(Debug, Clone)]
pub struct CommandFeaturizer {
    program: String,
    args: Vec<String>,
    dim: usize,
}

impl CommandFeaturizer {
    /// Create a featurizer that runs `program` and expects rows of width `dim`
    pub fn new(program: impl Into<String>, dim: usize) -> Self {
        CommandFeaturizer {
            program: program.into(),
            args: Vec::new(),
            dim,
        }
    }

    /// Add an argument passed to the program
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several arguments passed to the program
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Program name or path
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Featurizer for CommandFeaturizer {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, keys: &[String]) -> Result<EmbeddingMatrix> {
        if keys.is_empty() {
            return Ok(EmbeddingMatrix::empty(self.dim));
        }
        if let Some(key) = keys.iter().find(|k| k.contains('\n')) {
            return Err(FeatureStoreError::featurization(format!(
                "key {:?} contains a newline",
                key
            )));
        }

        let mut input = String::with_capacity(keys.iter().map(|k| k.len() + 1).sum());
        for key in keys {
            input.push_str(key);
            input.push('\n');
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                FeatureStoreError::featurization(format!(
                    "failed to start '{}': {}",
                    self.program, e
                ))
            })?;

        // Feed stdin from a separate thread so a program that writes output
        // before consuming all of its input cannot deadlock us.
        let mut stdin = child.stdin.take().ok_or_else(|| {
            FeatureStoreError::featurization(format!("no stdin pipe for '{}'", self.program))
        })?;
        let writer = thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child.wait_with_output()?;

        match writer.join() {
            Ok(Ok(())) => {}
            // The exit status below decides whether this matters
            Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(FeatureStoreError::featurization(
                    "stdin writer thread panicked",
                ))
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FeatureStoreError::featurization(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let expected = keys.len() * self.dim * 4;
        if output.stdout.len() != expected {
            return Err(FeatureStoreError::featurization(format!(
                "'{}' wrote {} bytes for {} keys, expected {}",
                self.program,
                output.stdout.len(),
                keys.len(),
                expected
            )));
        }

        let mut data = vec![0f32; keys.len() * self.dim];
        LittleEndian::read_f32_into(&output.stdout, &mut data);

        debug!(
            target: "featstore::featurizer",
            program = %self.program,
            rows = keys.len(),
            "External featurizer finished"
        );

        EmbeddingMatrix::new(keys.len(), self.dim, data)
    }
}
